//! Wire names of the option types. Run with `--features serde`.
#![cfg(feature = "serde")]

use elementkit::{
    Document, InsertPosition, MutationKind, MutationObserver, MutationObserverInit,
    ScrollBehavior, ScrollIntoViewOptions, ScrollLogicalPosition,
};
use serde_json::json;

#[test]
fn test_observer_init_uses_dom_field_names() {
    let init: MutationObserverInit = serde_json::from_value(json!({
        "childList": true,
        "subtree": true,
        "attributeOldValue": true,
        "attributeFilter": ["class"]
    }))
    .unwrap();
    assert_eq!(
        init,
        MutationObserverInit::subtree_child_list()
            .with_attribute_old_value()
            .with_attribute_filter(["class"])
    );

    let value = serde_json::to_value(&init).unwrap();
    assert_eq!(value["childList"], json!(true));
    assert_eq!(value["attributeOldValue"], json!(true));
    assert_eq!(value["attributeFilter"], json!(["class"]));
    assert!(value["characterData"].is_null());
    assert!(value.get("child_list").is_none());
}

#[test]
fn test_deserialized_init_observes() {
    let doc = Document::parse(r#"<div id="box" class="a"></div>"#);
    let div = doc.query_selector("#box").unwrap().unwrap();
    let init: MutationObserverInit =
        serde_json::from_value(json!({ "attributeOldValue": true })).unwrap();

    let observer = MutationObserver::new(|_, _| {});
    observer.observe(&div, &init).unwrap();
    div.set_attribute("class", "b").unwrap();

    let records = observer.take_records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].kind, MutationKind::Attributes);
    assert_eq!(records[0].old_value.as_deref(), Some("a"));
}

#[test]
fn test_record_kinds_match_dom_strings() {
    let kinds = [
        MutationKind::ChildList,
        MutationKind::Attributes,
        MutationKind::CharacterData,
    ];
    let names: Vec<_> = kinds
        .iter()
        .map(|k| serde_json::to_value(k).unwrap())
        .collect();
    assert_eq!(names, vec![json!("childList"), json!("attributes"), json!("characterData")]);
}

#[test]
fn test_insert_position_is_lowercase() {
    assert_eq!(
        serde_json::to_value(InsertPosition::BeforeEnd).unwrap(),
        json!("beforeend")
    );
    let position: InsertPosition = serde_json::from_value(json!("afterbegin")).unwrap();
    assert_eq!(position, InsertPosition::AfterBegin);
    assert!(serde_json::from_value::<InsertPosition>(json!("middle")).is_err());
}

#[test]
fn test_scroll_options_fill_missing_fields() {
    let options: ScrollIntoViewOptions =
        serde_json::from_value(json!({ "block": "center", "behavior": "smooth" })).unwrap();
    assert_eq!(options.block, ScrollLogicalPosition::Center);
    assert_eq!(options.behavior, ScrollBehavior::Smooth);
    assert_eq!(options.inline, ScrollLogicalPosition::Nearest);

    assert_eq!(
        serde_json::to_value(ScrollIntoViewOptions::default()).unwrap(),
        json!({ "behavior": "auto", "block": "start", "inline": "nearest" })
    );
}
