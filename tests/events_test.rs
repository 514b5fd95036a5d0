//! Event binding and delegation through `ElementWrapper`.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use elementkit::{
    Document, ElementWrapper, Event, EventHandler, EventInit, EventPhase, Listener,
};

fn click() -> Event {
    Event::with_init(
        "click",
        EventInit {
            bubbles: true,
            cancelable: true,
        },
    )
}

fn counter() -> (Rc<Cell<u32>>, Listener) {
    let hits = Rc::new(Cell::new(0));
    let listener = {
        let hits = hits.clone();
        Listener::new(move |_| hits.set(hits.get() + 1))
    };
    (hits, listener)
}

const LIST: &str = r#"<ul id="list"><li class="item"><span>One</span></li><li class="other">Two</li></ul>"#;

#[test]
fn test_delegate_fires_once_for_matching_target() {
    let doc = Document::parse(LIST);
    let list = ElementWrapper::query(&doc, "#list").unwrap();
    let (hits, listener) = counter();
    list.add_event_delegate(".item", "click", &listener).unwrap();

    let item = doc.query_selector(".item").unwrap().unwrap();
    item.dispatch_event(&click());
    assert_eq!(hits.get(), 1);
}

#[test]
fn test_delegate_swallows_non_matching_targets() {
    let doc = Document::parse(LIST);
    let list = ElementWrapper::query(&doc, "#list").unwrap();
    let (hits, listener) = counter();
    list.add_event_delegate(".item", "click", &listener).unwrap();

    doc.query_selector(".other").unwrap().unwrap().dispatch_event(&click());
    // The target is the span, not the `.item` that contains it.
    doc.query_selector("span").unwrap().unwrap().dispatch_event(&click());
    list.element().unwrap().dispatch_event(&click());
    assert_eq!(hits.get(), 0);
}

#[test]
fn test_delegate_rematches_on_every_event() {
    let doc = Document::parse(LIST);
    let list = ElementWrapper::query(&doc, "#list").unwrap();
    let (hits, listener) = counter();
    list.add_event_delegate(".item", "click", &listener).unwrap();

    let other = ElementWrapper::query(&doc, ".other").unwrap();
    other.element().unwrap().dispatch_event(&click());
    assert_eq!(hits.get(), 0);

    other.add_class("item").unwrap();
    other.element().unwrap().dispatch_event(&click());
    assert_eq!(hits.get(), 1);

    other.remove_class("item").unwrap();
    other.element().unwrap().dispatch_event(&click());
    assert_eq!(hits.get(), 1);
}

#[test]
fn test_delegate_invokes_object_listener() {
    struct Collector(RefCell<Vec<String>>);

    impl EventHandler for Collector {
        fn handle_event(&self, event: &Event) {
            let target = event.target().map(|t| t.text_content()).unwrap_or_default();
            self.0.borrow_mut().push(target);
        }
    }

    let doc = Document::parse(LIST);
    let collector = Rc::new(Collector(RefCell::new(Vec::new())));
    ElementWrapper::query(&doc, "#list")
        .unwrap()
        .add_event_delegate("li", "click", &Listener::from_handler(collector.clone()))
        .unwrap();

    for li in doc.query_selector_all("li").unwrap() {
        li.dispatch_event(&click());
    }
    assert_eq!(*collector.0.borrow(), vec!["One", "Two"]);
}

#[test]
fn test_delegate_rejects_invalid_selector() {
    let doc = Document::parse(LIST);
    let list = ElementWrapper::query(&doc, "#list").unwrap();
    let (_, listener) = counter();
    assert!(matches!(
        list.add_event_delegate("li[", "click", &listener),
        Err(elementkit::Error::InvalidSelector(_))
    ));
}

#[test]
fn test_on_off_trigger() {
    let doc = Document::parse(LIST);
    let item = ElementWrapper::query(&doc, ".item").unwrap();
    let phases = Rc::new(RefCell::new(Vec::new()));
    let listener = {
        let phases = phases.clone();
        Listener::new(move |event: &Event| {
            phases
                .borrow_mut()
                .push((event.event_type().to_string(), event.phase(), event.bubbles()));
        })
    };

    item.on("refresh", &listener).on("refresh", &listener).trigger("refresh");
    assert_eq!(
        *phases.borrow(),
        vec![("refresh".to_string(), EventPhase::AtTarget, false)]
    );

    item.off("refresh", &listener).trigger("refresh");
    assert_eq!(phases.borrow().len(), 1);
}

#[test]
fn test_listeners_run_in_registration_order() {
    let doc = Document::parse(LIST);
    let item = ElementWrapper::query(&doc, ".item").unwrap();
    let order = Rc::new(RefCell::new(Vec::new()));

    for name in ["first", "second", "third"] {
        let order = order.clone();
        item.on("ping", &Listener::new(move |_| order.borrow_mut().push(name)));
    }
    item.trigger("ping");
    assert_eq!(*order.borrow(), vec!["first", "second", "third"]);
}

#[test]
fn test_prevent_default_and_immediate_stop() {
    let doc = Document::parse(LIST);
    let item = doc.query_selector(".item").unwrap().unwrap();
    let (hits, late) = counter();

    item.add_event_listener(
        "click",
        &Listener::new(|event| {
            event.prevent_default();
            event.stop_immediate_propagation();
        }),
    );
    item.add_event_listener("click", &late);

    let event = click();
    assert!(!item.dispatch_event(&event));
    assert!(event.default_prevented());
    assert_eq!(hits.get(), 0);
    assert_eq!(event.phase(), EventPhase::None);
    assert_eq!(event.target(), Some(item));
}
