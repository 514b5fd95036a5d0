//! Events, listeners and dispatch.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::dom::arena::NodeId;
use crate::dom::{Document, Element};

/// Phase of an event while it is being dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventPhase {
    #[default]
    None,
    AtTarget,
    Bubbling,
}

/// Construction flags for [`Event::with_init`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventInit {
    pub bubbles: bool,
    pub cancelable: bool,
}

/// A synthetic event.
///
/// Listeners receive `&Event`; the propagation and cancellation flags use
/// interior mutability so listeners can still set them.
pub struct Event {
    event_type: String,
    bubbles: bool,
    cancelable: bool,
    target: RefCell<Option<Element>>,
    current_target: RefCell<Option<Element>>,
    phase: Cell<EventPhase>,
    propagation_stopped: Cell<bool>,
    immediate_propagation_stopped: Cell<bool>,
    canceled: Cell<bool>,
}

impl Event {
    /// A non-bubbling, non-cancelable event, like `new Event(type)`.
    pub fn new(event_type: &str) -> Self {
        Self::with_init(event_type, EventInit::default())
    }

    pub fn with_init(event_type: &str, init: EventInit) -> Self {
        Self {
            event_type: event_type.to_string(),
            bubbles: init.bubbles,
            cancelable: init.cancelable,
            target: RefCell::new(None),
            current_target: RefCell::new(None),
            phase: Cell::new(EventPhase::None),
            propagation_stopped: Cell::new(false),
            immediate_propagation_stopped: Cell::new(false),
            canceled: Cell::new(false),
        }
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn bubbles(&self) -> bool {
        self.bubbles
    }

    pub fn cancelable(&self) -> bool {
        self.cancelable
    }

    /// The element the event was dispatched to.
    pub fn target(&self) -> Option<Element> {
        self.target.borrow().clone()
    }

    /// The element whose listeners are currently running.
    pub fn current_target(&self) -> Option<Element> {
        self.current_target.borrow().clone()
    }

    pub fn phase(&self) -> EventPhase {
        self.phase.get()
    }

    pub fn prevent_default(&self) {
        if self.cancelable {
            self.canceled.set(true);
        }
    }

    pub fn default_prevented(&self) -> bool {
        self.canceled.get()
    }

    pub fn stop_propagation(&self) {
        self.propagation_stopped.set(true);
    }

    pub fn stop_immediate_propagation(&self) {
        self.propagation_stopped.set(true);
        self.immediate_propagation_stopped.set(true);
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("type", &self.event_type)
            .field("bubbles", &self.bubbles)
            .field("cancelable", &self.cancelable)
            .field("phase", &self.phase.get())
            .field("default_prevented", &self.canceled.get())
            .finish()
    }
}

/// Object-style listener, the counterpart of a DOM `EventListener` object.
pub trait EventHandler {
    fn handle_event(&self, event: &Event);
}

/// A listener as registered with `add_event_listener`.
///
/// Equality is identity: two `Listener`s are equal when they wrap the same
/// closure or handler allocation. Keep a clone of the listener you register
/// if you intend to remove it later.
///
/// A registered closure that captures a node handle keeps the whole document
/// alive until it is removed.
#[derive(Clone)]
pub enum Listener {
    Function(Rc<dyn Fn(&Event)>),
    Object(Rc<dyn EventHandler>),
}

impl Listener {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&Event) + 'static,
    {
        Listener::Function(Rc::new(callback))
    }

    pub fn from_handler(handler: Rc<dyn EventHandler>) -> Self {
        Listener::Object(handler)
    }

    /// Call the closure directly, or the handler's `handle_event`.
    pub fn invoke(&self, event: &Event) {
        match self {
            Listener::Function(callback) => callback(event),
            Listener::Object(handler) => handler.handle_event(event),
        }
    }
}

impl PartialEq for Listener {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Listener::Function(a), Listener::Function(b)) => Rc::ptr_eq(a, b),
            (Listener::Object(a), Listener::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Eq for Listener {}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Listener::Function(_) => f.write_str("Listener::Function"),
            Listener::Object(_) => f.write_str("Listener::Object"),
        }
    }
}

pub(crate) struct RegisteredListener {
    event_type: String,
    listener: Listener,
    removed: Cell<bool>,
}

pub(crate) fn add_listener(doc: &Document, node: NodeId, event_type: &str, listener: &Listener) {
    let mut listeners = doc.inner().listeners.borrow_mut();
    let entries = listeners.entry(node).or_default();
    let duplicate = entries
        .iter()
        .any(|e| e.event_type == event_type && e.listener == *listener);
    if !duplicate {
        entries.push(Rc::new(RegisteredListener {
            event_type: event_type.to_string(),
            listener: listener.clone(),
            removed: Cell::new(false),
        }));
    }
}

pub(crate) fn remove_listener(doc: &Document, node: NodeId, event_type: &str, listener: &Listener) {
    let mut listeners = doc.inner().listeners.borrow_mut();
    let Some(entries) = listeners.get_mut(&node) else {
        return;
    };
    if let Some(index) = entries
        .iter()
        .position(|e| e.event_type == event_type && e.listener == *listener)
    {
        // A dispatch in progress may hold a snapshot that still contains it.
        entries[index].removed.set(true);
        entries.remove(index);
    }
}

/// Dispatch `event` at `target`, returning `false` if it was canceled.
pub(crate) fn dispatch(target: &Element, event: &Event) -> bool {
    let doc = target.owner_document();
    // Handles, not ids: listeners may detach and drop parts of the path.
    let path: Vec<Element> = {
        let dom = doc.inner().dom.borrow();
        let mut path = vec![target.clone()];
        let mut current = target.id();
        while let Some(parent) = dom.parent_element(current) {
            path.push(doc.element(parent));
            current = parent;
        }
        path
    };

    tracing::trace!(event = %event.event_type, depth = path.len(), "dispatching event");

    *event.target.borrow_mut() = Some(target.clone());
    for (index, node) in path.iter().enumerate() {
        if index > 0 && !event.bubbles {
            break;
        }
        event.phase.set(if index == 0 {
            EventPhase::AtTarget
        } else {
            EventPhase::Bubbling
        });
        *event.current_target.borrow_mut() = Some(node.clone());
        invoke_listeners(&doc, node.id(), event);
        if event.propagation_stopped.get() {
            break;
        }
    }

    event.phase.set(EventPhase::None);
    *event.current_target.borrow_mut() = None;
    !event.default_prevented()
}

fn invoke_listeners(doc: &Document, node: NodeId, event: &Event) {
    let snapshot: Vec<Rc<RegisteredListener>> = match doc.inner().listeners.borrow().get(&node) {
        Some(entries) => entries
            .iter()
            .filter(|e| e.event_type == event.event_type)
            .cloned()
            .collect(),
        None => return,
    };

    for entry in snapshot {
        if entry.removed.get() {
            continue;
        }
        entry.listener.invoke(event);
        if event.immediate_propagation_stopped.get() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    struct Recorder(RefCell<Vec<String>>);

    impl EventHandler for Recorder {
        fn handle_event(&self, event: &Event) {
            self.0.borrow_mut().push(event.event_type().to_string());
        }
    }

    #[test]
    fn test_listener_identity() {
        let a = Listener::new(|_| {});
        let b = Listener::new(|_| {});
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn test_prevent_default_requires_cancelable() {
        let plain = Event::new("x");
        plain.prevent_default();
        assert!(!plain.default_prevented());

        let cancelable = Event::with_init(
            "x",
            EventInit {
                cancelable: true,
                ..Default::default()
            },
        );
        cancelable.prevent_default();
        assert!(cancelable.default_prevented());
    }

    #[test]
    fn test_object_listener_receives_event() {
        let doc = Document::parse("<button>go</button>");
        let button = doc.query_selector("button").unwrap().unwrap();
        let recorder = Rc::new(Recorder(RefCell::new(Vec::new())));

        button.add_event_listener("click", &Listener::from_handler(recorder.clone()));
        button.dispatch_event(&Event::new("click"));

        assert_eq!(*recorder.0.borrow(), vec!["click".to_string()]);
    }

    #[test]
    fn test_duplicate_registration_ignored() {
        let doc = Document::parse("<button>go</button>");
        let button = doc.query_selector("button").unwrap().unwrap();
        let hits = Rc::new(Cell::new(0));
        let listener = {
            let hits = hits.clone();
            Listener::new(move |_| hits.set(hits.get() + 1))
        };

        button.add_event_listener("click", &listener);
        button.add_event_listener("click", &listener);
        button.dispatch_event(&Event::new("click"));
        assert_eq!(hits.get(), 1);

        button.remove_event_listener("click", &listener);
        button.dispatch_event(&Event::new("click"));
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_bubbling_and_stop_propagation() {
        let doc = Document::parse("<div id=outer><span id=inner></span></div>");
        let outer = doc.query_selector("#outer").unwrap().unwrap();
        let inner = doc.query_selector("#inner").unwrap().unwrap();
        let log = Rc::new(RefCell::new(Vec::new()));

        {
            let log = log.clone();
            outer.add_event_listener(
                "ping",
                &Listener::new(move |e| {
                    log.borrow_mut().push(("outer", e.phase()));
                }),
            );
        }

        inner.dispatch_event(&Event::new("ping"));
        assert!(log.borrow().is_empty());

        let bubbling = EventInit {
            bubbles: true,
            ..Default::default()
        };
        inner.dispatch_event(&Event::with_init("ping", bubbling));
        assert_eq!(*log.borrow(), vec![("outer", EventPhase::Bubbling)]);

        inner.add_event_listener("ping", &Listener::new(|e| e.stop_propagation()));
        inner.dispatch_event(&Event::with_init("ping", bubbling));
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn test_listener_removed_during_dispatch_is_skipped() {
        let doc = Document::parse("<button>go</button>");
        let button = doc.query_selector("button").unwrap().unwrap();
        let hits = Rc::new(Cell::new(0));

        let second = {
            let hits = hits.clone();
            Listener::new(move |_| hits.set(hits.get() + 1))
        };
        let first = {
            let button = button.clone();
            let second = second.clone();
            Listener::new(move |_| button.remove_event_listener("click", &second))
        };

        button.add_event_listener("click", &first);
        button.add_event_listener("click", &second);
        button.dispatch_event(&Event::new("click"));
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn test_captured_handle_keeps_document_alive() {
        let doc = Document::parse("<button>go</button>");
        let inner = Rc::downgrade(doc.inner());
        let button = doc.query_selector("button").unwrap().unwrap();

        let captured = button.clone();
        button.add_event_listener(
            "click",
            &Listener::new(move |_| {
                captured.set_text_content("clicked");
            }),
        );
        button.add_event_listener(
            "focus",
            &Listener::new(|event| {
                if let Some(target) = event.current_target() {
                    target.set_text_content("focused");
                }
            }),
        );
        drop(button);
        drop(doc);

        let leaked = inner.upgrade().expect("cycle through the click listener");
        let removed = std::mem::take(&mut *leaked.listeners.borrow_mut());
        drop(leaked);
        drop(removed);
        assert!(inner.upgrade().is_none());
    }
}
