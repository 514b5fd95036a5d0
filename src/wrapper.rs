//! The chainable element wrapper.

use std::collections::BTreeMap;

use crate::dom::{Element, InsertPosition, Node, QueryRoot, SelectorList};
use crate::error::Result;
use crate::event::{Event, Listener};
use crate::observer::{MutationObserver, MutationObserverInit, MutationRecord};
use crate::scroll::ScrollIntoViewOptions;

/// Chainable, null-safe handle to at most one element.
///
/// Every method forwards to the corresponding [`Element`] operation. When no
/// element is held the method does nothing: accessors return an empty value
/// and mutators return the wrapper unchanged. Errors raised by the document
/// (an invalid selector, class token or attribute name, a hierarchy
/// violation) are returned as-is.
///
/// The held element is fixed at construction. After [`remove`](Self::remove)
/// or [`replace_with`](Self::replace_with) the wrapper keeps pointing at the
/// detached element.
///
/// ```
/// use elementkit::{Document, ElementWrapper};
///
/// let doc = Document::parse(r#"<ul id="menu"><li>Home</li></ul>"#);
/// let menu = ElementWrapper::query(&doc, "#menu")?;
///
/// menu.add_class("open")?
///     .set_attribute("aria-expanded", "true")?
///     .insert_html("beforeend".parse()?, "<li>About</li>")?;
///
/// assert!(menu.has_class("open"));
/// assert_eq!(menu.get_children().len(), 2);
///
/// // A selector that matches nothing gives an empty wrapper; calls are no-ops.
/// let missing = ElementWrapper::query(&doc, "#nope")?;
/// missing.add_class("x")?.remove();
/// assert_eq!(missing.get_attribute("id"), None);
/// # Ok::<(), elementkit::Error>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementWrapper {
    element: Option<Element>,
}

impl ElementWrapper {
    /// Wrap the first element under `root` that matches `selector`.
    ///
    /// The lookup happens once, here. No match gives an empty wrapper.
    pub fn query<R>(root: &R, selector: &str) -> Result<Self>
    where
        R: QueryRoot + ?Sized,
    {
        let element = root.query_selector(selector)?;
        if element.is_none() {
            tracing::debug!(selector, "no element matched, wrapper is empty");
        }
        Ok(Self { element })
    }

    /// Wrap an element directly. It does not have to be in a document.
    pub fn new(element: Element) -> Self {
        Self {
            element: Some(element),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn element(&self) -> Option<&Element> {
        self.element.as_ref()
    }

    pub fn is_present(&self) -> bool {
        self.element.is_some()
    }

    fn with_element<T: Default>(&self, f: impl FnOnce(&Element) -> T) -> T {
        self.element.as_ref().map(f).unwrap_or_default()
    }

    fn chain(&self, f: impl FnOnce(&Element)) -> &Self {
        if let Some(element) = &self.element {
            f(element);
        }
        self
    }

    fn try_chain(&self, f: impl FnOnce(&Element) -> Result<()>) -> Result<&Self> {
        if let Some(element) = &self.element {
            f(element)?;
        }
        Ok(self)
    }

    pub fn add_class(&self, class_name: &str) -> Result<&Self> {
        self.try_chain(|e| e.class_list().add(&[class_name]))
    }

    pub fn remove_class(&self, class_name: &str) -> Result<&Self> {
        self.try_chain(|e| e.class_list().remove(&[class_name]))
    }

    pub fn toggle_class(&self, class_name: &str) -> Result<&Self> {
        self.try_chain(|e| e.class_list().toggle(class_name, None).map(|_| ()))
    }

    pub fn has_class(&self, class_name: &str) -> bool {
        self.with_element(|e| e.class_list().contains(class_name))
    }

    /// Append `child` as the last child, moving it from its current parent.
    pub fn append(&self, child: &Node) -> Result<&Self> {
        self.try_chain(|e| e.append_child(child))
    }

    /// Insert `child` before the current first child.
    pub fn prepend(&self, child: &Node) -> Result<&Self> {
        self.try_chain(|e| e.prepend(child))
    }

    pub fn insert_html(&self, position: InsertPosition, html: &str) -> Result<&Self> {
        self.try_chain(|e| e.insert_adjacent_html(position, html))
    }

    pub fn get_children(&self) -> Vec<Element> {
        self.with_element(Element::children)
    }

    /// The parent's element children other than the held element.
    pub fn get_siblings(&self) -> Vec<Element> {
        self.with_element(|e| match e.parent_element() {
            Some(parent) => parent
                .children()
                .into_iter()
                .filter(|child| child != e)
                .collect(),
            None => Vec::new(),
        })
    }

    pub fn remove(&self) -> &Self {
        self.chain(|e| e.remove())
    }

    pub fn set_text_content(&self, text: &str) -> &Self {
        self.chain(|e| e.set_text_content(text))
    }

    /// Replace the children with parsed `html`. The markup is not sanitized.
    pub fn set_html_content(&self, html: &str) -> &Self {
        self.chain(|e| e.set_inner_html(html))
    }

    pub fn get_attribute(&self, name: &str) -> Option<String> {
        self.with_element(|e| e.get_attribute(name))
    }

    pub fn set_attribute(&self, name: &str, value: &str) -> Result<&Self> {
        self.try_chain(|e| e.set_attribute(name, value))
    }

    pub fn remove_attribute(&self, name: &str) -> &Self {
        self.chain(|e| e.remove_attribute(name))
    }

    /// Value of the `data-<name>` attribute.
    pub fn get_data(&self, name: &str) -> Option<String> {
        self.get_attribute(&format!("data-{name}"))
    }

    /// Snapshot of every `data-*` attribute, keyed by camel-cased name.
    pub fn get_all_data(&self) -> BTreeMap<String, String> {
        self.with_element(Element::dataset)
    }

    /// Register `listener` for `event_type`.
    ///
    /// The wrapper does not remember the registration; keep the listener if
    /// you need to pass it to [`off`](Self::off) later.
    ///
    /// The document owns its listeners. A closure that captures an
    /// [`Element`] or [`Document`](crate::Document) forms an `Rc` cycle
    /// and keeps the document alive until the listener is removed; use
    /// [`Event::current_target`] instead.
    pub fn on(&self, event_type: &str, listener: &Listener) -> &Self {
        self.chain(|e| e.add_event_listener(event_type, listener))
    }

    pub fn off(&self, event_type: &str, listener: &Listener) -> &Self {
        self.chain(|e| e.remove_event_listener(event_type, listener))
    }

    /// Dispatch a plain, non-bubbling event of `event_type`.
    pub fn trigger(&self, event_type: &str) -> &Self {
        self.chain(|e| {
            e.dispatch_event(&Event::new(event_type));
        })
    }

    /// Listen for `event_type` on the held element and forward only events
    /// whose target matches `selector`.
    ///
    /// The selector is parsed here and matched again on every event, so
    /// changes to the tree between events are honoured.
    pub fn add_event_delegate(
        &self,
        selector: &str,
        event_type: &str,
        listener: &Listener,
    ) -> Result<&Self> {
        self.try_chain(|e| {
            let list = SelectorList::parse(selector)?;
            let listener = listener.clone();
            let delegate = Listener::new(move |event| {
                if let Some(target) = event.target()
                    && target.matches_list(&list)
                {
                    listener.invoke(event);
                }
            });
            e.add_event_listener(event_type, &delegate);
            Ok(())
        })
    }

    /// Observe child list changes in the held element's subtree.
    ///
    /// See [`observe_with`](Self::observe_with).
    pub fn observe<F>(&self, callback: F) -> Result<&Self>
    where
        F: Fn(&[MutationRecord], &MutationObserver) + 'static,
    {
        self.observe_with(callback, &MutationObserverInit::subtree_child_list())
    }

    /// Start a new observer on the held element.
    ///
    /// The wrapper keeps no handle to the observer. The callback receives it
    /// and may call [`MutationObserver::disconnect`]; nothing else can stop it.
    ///
    /// The document holds the observer until it disconnects, so a callback
    /// that captures an [`Element`] or [`Document`](crate::Document) keeps
    /// the document alive for as long as it observes. The records passed to
    /// the callback carry the nodes it needs.
    pub fn observe_with<F>(&self, callback: F, options: &MutationObserverInit) -> Result<&Self>
    where
        F: Fn(&[MutationRecord], &MutationObserver) + 'static,
    {
        self.try_chain(|e| MutationObserver::new(callback).observe(e, options))
    }

    /// A detached copy of the held element, not wrapped.
    pub fn clone_element(&self, deep: bool) -> Option<Element> {
        self.with_element(|e| Some(e.clone_element(deep)))
    }

    /// Put `new_node` in place of the held element.
    ///
    /// The wrapper still refers to the old, now detached element afterwards.
    pub fn replace_with(&self, new_node: &Node) -> Result<&Self> {
        self.try_chain(|e| e.replace_with(new_node))
    }

    pub fn closest(&self, selector: &str) -> Result<Option<Element>> {
        match &self.element {
            Some(e) => e.closest(selector),
            None => Ok(None),
        }
    }

    pub fn matches(&self, selector: &str) -> Result<bool> {
        match &self.element {
            Some(e) => e.matches(selector),
            None => Ok(false),
        }
    }

    pub fn get_computed_style(&self, property: &str) -> Option<String> {
        self.with_element(|e| Some(e.computed_style(property)))
    }

    pub fn scroll_into_view(&self, options: impl Into<ScrollIntoViewOptions>) -> &Self {
        self.chain(|e| e.scroll_into_view(options))
    }
}

impl From<Element> for ElementWrapper {
    fn from(element: Element) -> Self {
        Self::new(element)
    }
}

impl From<Option<Element>> for ElementWrapper {
    fn from(element: Option<Element>) -> Self {
        Self { element }
    }
}
