//! Node and element handles.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::rc::Rc;
use std::str::FromStr;

use html5ever::{QualName, local_name, ns};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::arena::{NodeData, NodeId};
use super::element_ref::SelectorList;
use super::{Document, serialize, tree_sink};
use crate::error::{Error, Result};
use crate::event::{self, Event, Listener};
use crate::observer::{Change, queue_mutation};
use crate::scroll::{ScrollIntoViewOptions, ScrollRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Element,
    Text,
    Comment,
    Doctype,
    Document,
}

/// Handle to any node of a [`Document`].
///
/// Two handles are equal when they refer to the same node of the same
/// document. A handle keeps its node alive: a detached tree is released only
/// once no handle points into it.
pub struct Node {
    doc: Document,
    id: NodeId,
}

impl Node {
    pub(crate) fn new(doc: Document, id: NodeId) -> Self {
        doc.pin(id);
        Self { doc, id }
    }

    pub(crate) fn id(&self) -> NodeId {
        self.id
    }

    pub fn owner_document(&self) -> Document {
        self.doc.clone()
    }

    pub fn node_type(&self) -> NodeType {
        let dom = self.doc.inner().dom.borrow();
        match dom.get(self.id).map(|n| &n.data) {
            Some(NodeData::Element { .. }) => NodeType::Element,
            Some(NodeData::Text(_)) => NodeType::Text,
            Some(NodeData::Comment(_)) => NodeType::Comment,
            Some(NodeData::Doctype { .. }) => NodeType::Doctype,
            Some(NodeData::Document) | None => NodeType::Document,
        }
    }

    pub fn parent_node(&self) -> Option<Node> {
        let parent = self.doc.inner().dom.borrow().parent(self.id);
        self.doc.node_opt(parent)
    }

    pub fn parent_element(&self) -> Option<Element> {
        let parent = self.doc.inner().dom.borrow().parent_element(self.id);
        parent.map(|id| self.doc.element(id))
    }

    pub fn child_nodes(&self) -> Vec<Node> {
        let ids: Vec<_> = self.doc.inner().dom.borrow().children(self.id).collect();
        ids.into_iter().map(|id| self.doc.node(id)).collect()
    }

    pub fn next_sibling(&self) -> Option<Node> {
        let next = self
            .doc
            .inner()
            .dom
            .borrow()
            .get(self.id)
            .map(|n| n.next_sibling)
            .unwrap_or(NodeId::NONE);
        self.doc.node_opt(next)
    }

    pub fn previous_sibling(&self) -> Option<Node> {
        let prev = self
            .doc
            .inner()
            .dom
            .borrow()
            .get(self.id)
            .map(|n| n.prev_sibling)
            .unwrap_or(NodeId::NONE);
        self.doc.node_opt(prev)
    }

    pub fn text_content(&self) -> String {
        self.doc.inner().dom.borrow().text_content(self.id)
    }

    /// Replace the data of a text node, or every child of an element with
    /// a single text node (none when `text` is empty).
    pub fn set_text_content(&self, text: &str) {
        let old = self.doc.inner().dom.borrow_mut().set_character_data(self.id, text);
        if let Some(old_value) = old {
            queue_mutation(&self.doc, self.id, Change::CharacterData { old_value });
            return;
        }
        if self.node_type() != NodeType::Element {
            return;
        }

        let added = if text.is_empty() {
            Vec::new()
        } else {
            let text_node = self.doc.inner().dom.borrow_mut().create_text(text.to_string());
            vec![text_node]
        };
        self.doc.replace_all(self.id, added);
    }

    /// Detach this node from its parent. A parentless node is left alone.
    pub fn remove(&self) {
        self.doc.remove_node(self.id);
    }

    /// Put `new_node` where this node is.
    ///
    /// A parentless node is left alone; `new_node` is moved out of its current
    /// parent first.
    pub fn replace_with(&self, new_node: &Node) -> Result<()> {
        self.doc.replace_node(self.id, new_node)
    }

    /// Copy this node, with its descendants when `deep` is set.
    ///
    /// The copy is detached and carries no event listeners.
    pub fn clone_node(&self, deep: bool) -> Node {
        let copy = self.doc.inner().dom.borrow_mut().clone_subtree(self.id, deep);
        self.doc.node(copy)
    }

    pub fn is_connected(&self) -> bool {
        self.doc.inner().dom.borrow().is_connected(self.id)
    }

    pub fn as_element(&self) -> Option<Element> {
        (self.node_type() == NodeType::Element).then(|| Element::new(self.clone()))
    }
}

impl Clone for Node {
    fn clone(&self) -> Self {
        Node::new(self.doc.clone(), self.id)
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        self.doc.unpin(self.id);
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.doc.ptr_eq(&other.doc)
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Rc::as_ptr(self.doc.inner()).hash(state);
        self.id.hash(state);
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dom = self.doc.inner().dom.borrow();
        match dom.get(self.id).map(|n| &n.data) {
            Some(NodeData::Element { name, .. }) => write!(f, "<{}>#{}", name.local, self.id.0),
            Some(NodeData::Text(text)) => write!(f, "{text:?}#{}", self.id.0),
            Some(NodeData::Comment(_)) => write!(f, "<!-- -->#{}", self.id.0),
            Some(NodeData::Doctype { .. }) => write!(f, "<!DOCTYPE>#{}", self.id.0),
            Some(NodeData::Document) | None => write!(f, "#document"),
        }
    }
}

/// Where [`Element::insert_adjacent_html`] puts the parsed markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum InsertPosition {
    /// Before the element itself.
    BeforeBegin,
    /// Inside the element, before its first child.
    AfterBegin,
    /// Inside the element, after its last child.
    BeforeEnd,
    /// After the element itself.
    AfterEnd,
}

impl InsertPosition {
    pub fn as_str(&self) -> &'static str {
        match self {
            InsertPosition::BeforeBegin => "beforebegin",
            InsertPosition::AfterBegin => "afterbegin",
            InsertPosition::BeforeEnd => "beforeend",
            InsertPosition::AfterEnd => "afterend",
        }
    }
}

impl FromStr for InsertPosition {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "beforebegin" => Ok(InsertPosition::BeforeBegin),
            "afterbegin" => Ok(InsertPosition::AfterBegin),
            "beforeend" => Ok(InsertPosition::BeforeEnd),
            "afterend" => Ok(InsertPosition::AfterEnd),
            _ => Err(Error::InvalidInsertPosition(s.to_string())),
        }
    }
}

impl fmt::Display for InsertPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle to an element node.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Element(Node);

impl Deref for Element {
    type Target = Node;

    fn deref(&self) -> &Node {
        &self.0
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl From<Element> for Node {
    fn from(element: Element) -> Self {
        element.0
    }
}

impl AsRef<Node> for Element {
    fn as_ref(&self) -> &Node {
        &self.0
    }
}

impl Element {
    pub(crate) fn new(node: Node) -> Self {
        Self(node)
    }

    pub fn as_node(&self) -> &Node {
        &self.0
    }

    /// Upper-cased qualified name for HTML elements, as authored otherwise.
    pub fn tag_name(&self) -> String {
        let name = self.local_name();
        if self.is_html() {
            name.to_ascii_uppercase()
        } else {
            name
        }
    }

    pub fn local_name(&self) -> String {
        let dom = self.doc.inner().dom.borrow();
        dom.element_name(self.id)
            .map(|n| n.to_string())
            .unwrap_or_default()
    }

    /// Whether the element is in the HTML namespace.
    pub fn is_html(&self) -> bool {
        let dom = self.doc.inner().dom.borrow();
        dom.element_namespace(self.id).is_some_and(|n| *n == ns!(html))
    }

    fn normalize_attribute_name(&self, name: &str) -> String {
        if self.is_html() {
            name.to_ascii_lowercase()
        } else {
            name.to_string()
        }
    }

    pub fn get_attribute(&self, name: &str) -> Option<String> {
        let name = self.normalize_attribute_name(name);
        let dom = self.doc.inner().dom.borrow();
        dom.get_attr(self.id, &name).map(str::to_string)
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.get_attribute(name).is_some()
    }

    /// Attribute names in source order.
    pub fn attribute_names(&self) -> Vec<String> {
        let dom = self.doc.inner().dom.borrow();
        dom.attrs(self.id)
            .iter()
            .map(|a| match &a.name.prefix {
                Some(prefix) => format!("{prefix}:{}", a.name.local),
                None => a.name.local.to_string(),
            })
            .collect()
    }

    pub fn set_attribute(&self, name: &str, value: &str) -> Result<()> {
        validate_attribute_name(name)?;
        let name = self.normalize_attribute_name(name);
        let old_value = self.doc.inner().dom.borrow_mut().set_attr(self.id, &name, value);
        queue_mutation(&self.doc, self.id, Change::Attribute { name, old_value });
        Ok(())
    }

    /// Remove an attribute. Removing an absent attribute does nothing.
    pub fn remove_attribute(&self, name: &str) {
        let name = self.normalize_attribute_name(name);
        let removed = self.doc.inner().dom.borrow_mut().remove_attr(self.id, &name);
        if let Some(old_value) = removed {
            queue_mutation(
                &self.doc,
                self.id,
                Change::Attribute {
                    name,
                    old_value: Some(old_value),
                },
            );
        }
    }

    pub fn class_list(&self) -> ClassList {
        ClassList {
            element: self.clone(),
        }
    }

    /// The element's `data-*` attributes keyed by their camel-cased names.
    ///
    /// Empty for elements outside the HTML namespace.
    pub fn dataset(&self) -> BTreeMap<String, String> {
        if !self.is_html() {
            return BTreeMap::new();
        }
        let dom = self.doc.inner().dom.borrow();
        dom.attrs(self.id)
            .iter()
            .filter(|a| a.name.ns == ns!() && a.name.prefix.is_none())
            .filter_map(|a| {
                let suffix = a.name.local.strip_prefix("data-")?;
                if a.name.local.bytes().any(|b| b.is_ascii_uppercase()) {
                    return None;
                }
                Some((data_key_to_camel(suffix), a.value.clone()))
            })
            .collect()
    }

    /// Direct element children in document order.
    pub fn children(&self) -> Vec<Element> {
        let ids: Vec<_> = self
            .doc
            .inner()
            .dom
            .borrow()
            .element_children(self.id)
            .collect();
        ids.into_iter().map(|id| self.doc.element(id)).collect()
    }

    pub fn first_child(&self) -> Option<Node> {
        let first = self
            .doc
            .inner()
            .dom
            .borrow()
            .get(self.id)
            .map(|n| n.first_child)
            .unwrap_or(NodeId::NONE);
        self.doc.node_opt(first)
    }

    /// Append `child`, moving it out of its current parent.
    pub fn append_child(&self, child: &Node) -> Result<()> {
        self.doc.insert_node(self.id, child, NodeId::NONE)
    }

    /// Insert `child` before `reference`, or append when `reference` is `None`.
    pub fn insert_before(&self, child: &Node, reference: Option<&Node>) -> Result<()> {
        let reference = match reference {
            Some(r) if !r.doc.ptr_eq(&self.doc) => return Err(Error::NotFound("reference child")),
            Some(r) => r.id,
            None => NodeId::NONE,
        };
        self.doc.insert_node(self.id, child, reference)
    }

    /// Insert `child` before the first child.
    pub fn prepend(&self, child: &Node) -> Result<()> {
        let first = self.first_child();
        self.insert_before(child, first.as_ref())
    }

    /// Parse `html` and insert the resulting nodes relative to this element.
    pub fn insert_adjacent_html(&self, position: InsertPosition, html: &str) -> Result<()> {
        let (parent, reference) = {
            let dom = self.doc.inner().dom.borrow();
            let next = dom.get(self.id).map(|n| n.next_sibling).unwrap_or(NodeId::NONE);
            let first = dom.get(self.id).map(|n| n.first_child).unwrap_or(NodeId::NONE);
            let parent = dom.parent(self.id);
            match position {
                InsertPosition::BeforeBegin | InsertPosition::AfterEnd
                    if !dom.is_element(parent) =>
                {
                    return Err(Error::NoModificationAllowed(
                        "element has no parent element",
                    ));
                }
                InsertPosition::BeforeBegin => (parent, self.id),
                InsertPosition::AfterBegin => (self.id, first),
                InsertPosition::BeforeEnd => (self.id, NodeId::NONE),
                InsertPosition::AfterEnd => (parent, next),
            }
        };

        let nodes = self.doc.import_fragment(html, parent);
        self.doc.insert_fragment(parent, nodes, reference);
        Ok(())
    }

    pub fn inner_html(&self) -> String {
        let dom = self.doc.inner().dom.borrow();
        serialize::serialize_children(&dom, self.id)
    }

    /// Replace every child with the nodes parsed from `html`.
    ///
    /// The markup is inserted as-is; nothing is sanitized.
    pub fn set_inner_html(&self, html: &str) {
        let nodes = self.doc.import_fragment(html, self.id);
        self.doc.replace_all(self.id, nodes);
    }

    pub fn outer_html(&self) -> String {
        let dom = self.doc.inner().dom.borrow();
        serialize::serialize_node(&dom, self.id)
    }

    pub fn matches(&self, selector: &str) -> Result<bool> {
        let list = SelectorList::parse(selector)?;
        Ok(self.matches_list(&list))
    }

    pub(crate) fn matches_list(&self, list: &SelectorList) -> bool {
        list.matches(&self.doc.inner().dom.borrow(), self.id)
    }

    /// Nearest inclusive ancestor matching `selector`.
    pub fn closest(&self, selector: &str) -> Result<Option<Element>> {
        let list = SelectorList::parse(selector)?;
        let found = {
            let dom = self.doc.inner().dom.borrow();
            let mut current = Some(self.id);
            loop {
                match current {
                    Some(id) if list.matches(&dom, id) => break Some(id),
                    Some(id) => current = dom.parent_element(id),
                    None => break None,
                }
            }
        };
        Ok(found.map(|id| self.doc.element(id)))
    }

    /// First descendant matching `selector`.
    pub fn query_selector(&self, selector: &str) -> Result<Option<Element>> {
        let list = SelectorList::parse(selector)?;
        let found = list.query_first(&self.doc.inner().dom.borrow(), self.id);
        Ok(found.map(|id| self.doc.element(id)))
    }

    pub fn query_selector_all(&self, selector: &str) -> Result<Vec<Element>> {
        let list = SelectorList::parse(selector)?;
        let found = list.query_all(&self.doc.inner().dom.borrow(), self.id);
        Ok(found.into_iter().map(|id| self.doc.element(id)).collect())
    }

    /// Register `listener` for `event_type`. Registering the same listener
    /// twice for one type has no effect.
    pub fn add_event_listener(&self, event_type: &str, listener: &Listener) {
        event::add_listener(&self.doc, self.id, event_type, listener);
    }

    pub fn remove_event_listener(&self, event_type: &str, listener: &Listener) {
        event::remove_listener(&self.doc, self.id, event_type, listener);
    }

    /// Dispatch `event` with this element as its target.
    ///
    /// Returns `false` when a listener canceled the event.
    pub fn dispatch_event(&self, event: &Event) -> bool {
        event::dispatch(self, event)
    }

    /// Resolved value of a style property, or an empty string when the
    /// element is not in the document or the property is unknown.
    pub fn computed_style(&self, property: &str) -> String {
        self.doc.computed_style(self.id, property)
    }

    /// Ask the embedder to scroll this element into view.
    pub fn scroll_into_view(&self, options: impl Into<ScrollIntoViewOptions>) {
        let options = options.into();
        tracing::debug!(element = ?self, ?options, "scroll into view requested");
        self.doc.record_scroll(ScrollRequest {
            target: self.clone(),
            options,
        });
    }

    pub fn clone_element(&self, deep: bool) -> Element {
        Element::new(self.clone_node(deep))
    }
}

/// Live view over an element's `class` attribute.
#[derive(Debug, Clone)]
pub struct ClassList {
    element: Element,
}

impl ClassList {
    fn tokens(&self) -> Vec<String> {
        let dom = self.element.doc.inner().dom.borrow();
        dom.element_classes(self.element.id).to_vec()
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.tokens()
    }

    pub fn len(&self) -> usize {
        self.tokens().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, token: &str) -> bool {
        self.tokens().iter().any(|t| t == token)
    }

    pub fn add(&self, tokens: &[&str]) -> Result<()> {
        tokens.iter().try_for_each(|t| validate_token(t))?;
        let mut set = self.tokens();
        for token in tokens {
            if !set.iter().any(|t| t == token) {
                set.push(token.to_string());
            }
        }
        self.update(&set)
    }

    pub fn remove(&self, tokens: &[&str]) -> Result<()> {
        tokens.iter().try_for_each(|t| validate_token(t))?;
        let mut set = self.tokens();
        set.retain(|t| !tokens.contains(&t.as_str()));
        self.update(&set)
    }

    /// Flip `token`, or force it on or off. Returns whether it is now present.
    pub fn toggle(&self, token: &str, force: Option<bool>) -> Result<bool> {
        validate_token(token)?;
        let mut set = self.tokens();
        let present = set.iter().any(|t| t == token);
        match (present, force) {
            (true, Some(true)) => Ok(true),
            (false, Some(false)) => Ok(false),
            (true, _) => {
                set.retain(|t| t != token);
                self.update(&set)?;
                Ok(false)
            }
            (false, _) => {
                set.push(token.to_string());
                self.update(&set)?;
                Ok(true)
            }
        }
    }

    fn update(&self, set: &[String]) -> Result<()> {
        if !self.element.has_attribute("class") && set.is_empty() {
            return Ok(());
        }
        self.element.set_attribute("class", &set.join(" "))
    }
}

fn validate_token(token: &str) -> Result<()> {
    if token.is_empty() || token.chars().any(|c| c.is_ascii_whitespace()) {
        return Err(Error::InvalidToken(token.to_string()));
    }
    Ok(())
}

/// Accept names matching the XML `Name` production.
fn validate_attribute_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid_start = |c: char| c.is_ascii_alphabetic() || c == '_' || c == ':' || !c.is_ascii();
    let valid = match chars.next() {
        Some(first) if valid_start(first) => chars.all(|c| {
            valid_start(c) || c.is_ascii_digit() || c == '-' || c == '.'
        }),
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidAttributeName(name.to_string()))
    }
}

/// `foo-bar` to `fooBar`: a hyphen before an ASCII lowercase letter is dropped
/// and the letter upper-cased.
pub(crate) fn data_key_to_camel(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut chars = key.chars().peekable();
    while let Some(c) = chars.next() {
        match (c, chars.peek()) {
            ('-', Some(next)) if next.is_ascii_lowercase() => {
                out.push(next.to_ascii_uppercase());
                chars.next();
            }
            _ => out.push(c),
        }
    }
    out
}

/// Tree mutation with observer bookkeeping.
impl Document {
    /// Insert `child` under `parent` before `reference` (appending when
    /// `reference` is `NONE`).
    pub(crate) fn insert_node(&self, parent: NodeId, child: &Node, reference: NodeId) -> Result<()> {
        if !child.doc.ptr_eq(self) {
            return Err(Error::WrongDocument);
        }
        let child = child.id;
        let mut reference = reference;
        {
            let dom = self.inner().dom.borrow();
            if dom.is_inclusive_ancestor(child, parent) {
                return Err(Error::HierarchyRequest("node is an ancestor of the parent"));
            }
            if reference.is_some() && dom.parent(reference) != parent {
                return Err(Error::NotFound("reference is not a child of the parent"));
            }
            match dom.get(child).map(|n| &n.data) {
                Some(NodeData::Document) | None => {
                    return Err(Error::HierarchyRequest("a document cannot be inserted"));
                }
                Some(NodeData::Doctype { .. }) if dom.is_element(parent) => {
                    return Err(Error::HierarchyRequest("a doctype cannot be a child of an element"));
                }
                _ => {}
            }
            if reference == child {
                reference = dom.get(child).map(|n| n.next_sibling).unwrap_or(NodeId::NONE);
            }
        }

        self.remove_node(child);
        self.insert_fragment(parent, vec![child], reference);
        Ok(())
    }

    /// Insert already detached nodes as one child-list change.
    pub(crate) fn insert_fragment(&self, parent: NodeId, nodes: Vec<NodeId>, reference: NodeId) {
        if nodes.is_empty() {
            return;
        }
        let previous_sibling = {
            let mut dom = self.inner().dom.borrow_mut();
            let previous = if reference.is_some() {
                dom.get(reference).map(|n| n.prev_sibling)
            } else {
                dom.get(parent).map(|n| n.last_child)
            }
            .unwrap_or(NodeId::NONE);
            for &node in &nodes {
                if reference.is_some() {
                    dom.insert_before(reference, node);
                } else {
                    dom.append(parent, node);
                }
            }
            previous
        };

        queue_mutation(
            self,
            parent,
            Change::ChildList {
                added: nodes,
                removed: Vec::new(),
                previous_sibling,
                next_sibling: reference,
            },
        );
    }

    /// Detach `id` from its parent, if any.
    pub(crate) fn remove_node(&self, id: NodeId) {
        let (parent, previous_sibling, next_sibling) = {
            let mut dom = self.inner().dom.borrow_mut();
            let Some(node) = dom.get(id) else {
                return;
            };
            let links = (node.parent, node.prev_sibling, node.next_sibling);
            if links.0.is_none() {
                return;
            }
            dom.detach(id);
            links
        };

        queue_mutation(
            self,
            parent,
            Change::ChildList {
                added: Vec::new(),
                removed: vec![id],
                previous_sibling,
                next_sibling,
            },
        );
        self.reclaim(id);
    }

    /// Replace every child of `parent` with `nodes` as one child-list change.
    pub(crate) fn replace_all(&self, parent: NodeId, nodes: Vec<NodeId>) {
        let removed = {
            let mut dom = self.inner().dom.borrow_mut();
            let removed = dom.detach_children(parent);
            for &node in &nodes {
                dom.append(parent, node);
            }
            removed
        };

        if removed.is_empty() && nodes.is_empty() {
            return;
        }
        queue_mutation(
            self,
            parent,
            Change::ChildList {
                added: nodes,
                removed: removed.clone(),
                previous_sibling: NodeId::NONE,
                next_sibling: NodeId::NONE,
            },
        );
        for node in removed {
            self.reclaim(node);
        }
    }

    pub(crate) fn replace_node(&self, old: NodeId, new_node: &Node) -> Result<()> {
        if !new_node.doc.ptr_eq(self) {
            return Err(Error::WrongDocument);
        }
        let new = new_node.id;
        let (parent, mut next_sibling) = {
            let dom = self.inner().dom.borrow();
            let parent = dom.parent(old);
            if parent.is_none() || new == old {
                return Ok(());
            }
            if dom.is_inclusive_ancestor(new, parent) {
                return Err(Error::HierarchyRequest("node is an ancestor of the parent"));
            }
            match dom.get(new).map(|n| &n.data) {
                Some(NodeData::Document) | None => {
                    return Err(Error::HierarchyRequest("a document cannot be inserted"));
                }
                Some(NodeData::Doctype { .. }) if dom.is_element(parent) => {
                    return Err(Error::HierarchyRequest("a doctype cannot be a child of an element"));
                }
                _ => {}
            }
            let next = dom.get(old).map(|n| n.next_sibling).unwrap_or(NodeId::NONE);
            (parent, next)
        };

        if next_sibling == new {
            next_sibling = self
                .inner()
                .dom
                .borrow()
                .get(new)
                .map(|n| n.next_sibling)
                .unwrap_or(NodeId::NONE);
        }
        self.remove_node(new);

        let previous_sibling = {
            let mut dom = self.inner().dom.borrow_mut();
            let previous = dom.get(old).map(|n| n.prev_sibling).unwrap_or(NodeId::NONE);
            dom.detach(old);
            if next_sibling.is_some() {
                dom.insert_before(next_sibling, new);
            } else {
                dom.append(parent, new);
            }
            previous
        };

        queue_mutation(
            self,
            parent,
            Change::ChildList {
                added: vec![new],
                removed: vec![old],
                previous_sibling,
                next_sibling,
            },
        );
        self.reclaim(old);
        Ok(())
    }

    /// Parse `html` as the children of `context` and copy the nodes into
    /// this document, detached.
    ///
    /// Markup for the root `html` element is parsed as if for `body`.
    pub(crate) fn import_fragment(&self, html: &str, context: NodeId) -> Vec<NodeId> {
        let context = {
            let dom = self.inner().dom.borrow();
            match dom.element_qual_name(context) {
                Some(name) if !(name.ns == ns!(html) && name.local == local_name!("html")) => {
                    name.clone()
                }
                _ => QualName::new(None, ns!(html), local_name!("body")),
            }
        };
        let (scratch, roots) = tree_sink::parse_fragment(html, context);
        let mut dom = self.inner().dom.borrow_mut();
        roots
            .into_iter()
            .map(|root| dom.import_subtree(&scratch, root, true))
            .collect()
    }
}
