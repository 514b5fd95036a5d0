//! In-memory HTML document.
//!
//! Nodes live in an [`ArenaDom`](arena::ArenaDom) owned by the document and
//! are addressed through cheap handles ([`Node`], [`Element`]) that share the
//! document through an `Rc`. Markup is parsed with html5ever and selectors are
//! matched with the `selectors` crate.
//!
//! The document counts the live handles of every node. A detached tree that
//! no handle points into is released as soon as it becomes unreachable, and
//! its slots are reused.

pub(crate) mod arena;
pub(crate) mod element_ref;
mod node;
mod serialize;
pub(crate) mod tree_sink;

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use html5ever::{LocalName, QualName, ns};

pub use element_ref::SelectorList;
pub use node::{ClassList, Element, InsertPosition, Node, NodeType};

use crate::config::DocumentConfig;
use crate::error::Result;
use crate::event::RegisteredListener;
use crate::observer::{self, MutationObserver, ObserverRegistry};
use crate::scroll::ScrollRequest;
use crate::style::{self, StyleContext, Stylesheet};
use arena::{ArenaDom, NodeId};

/// Something that can answer a first-match selector query.
///
/// This is the lookup capability an
/// [`ElementWrapper`](crate::ElementWrapper) resolves its selector against.
pub trait QueryRoot {
    fn query_selector(&self, selector: &str) -> Result<Option<Element>>;
}

pub(crate) struct DocumentInner {
    pub(crate) dom: RefCell<ArenaDom>,
    pub(crate) listeners: RefCell<HashMap<NodeId, Vec<Rc<RegisteredListener>>>>,
    pub(crate) observers: RefCell<ObserverRegistry>,
    /// Live handle count per node.
    handles: RefCell<HashMap<NodeId, usize>>,
    stylesheets: RefCell<Vec<Stylesheet>>,
    /// Parsed `<style>` elements followed by added sheets; `None` when stale.
    author_sheets: RefCell<Option<Rc<Vec<Stylesheet>>>>,
    user_agent_sheet: Option<Stylesheet>,
    scroll_requests: RefCell<Vec<ScrollRequest>>,
}

/// What releasing a tree detached from the document.
///
/// Listener and observer destructors may drop node handles of their own, so
/// these are dropped only after every borrow of the document has ended.
#[derive(Default)]
struct Released {
    nodes: usize,
    _listeners: Vec<Vec<Rc<RegisteredListener>>>,
    _observers: Vec<MutationObserver>,
}

/// Handle to a document. Clones refer to the same document.
#[derive(Clone)]
pub struct Document(Rc<DocumentInner>);

impl Document {
    /// An empty document with an `html`, `head` and `body` skeleton.
    pub fn new() -> Self {
        Self::parse("")
    }

    pub fn parse(html: &str) -> Self {
        Self::parse_with(html, &DocumentConfig::default())
    }

    pub fn parse_with(html: &str, config: &DocumentConfig) -> Self {
        let dom = tree_sink::parse_html(html, config.keep_doctype);
        tracing::debug!(nodes = dom.len(), "parsed document");
        Self(Rc::new(DocumentInner {
            dom: RefCell::new(dom),
            listeners: RefCell::new(HashMap::new()),
            observers: RefCell::new(ObserverRegistry::default()),
            handles: RefCell::new(HashMap::new()),
            stylesheets: RefCell::new(Vec::new()),
            author_sheets: RefCell::new(None),
            user_agent_sheet: config
                .user_agent_styles
                .then(style::user_agent_stylesheet),
            scroll_requests: RefCell::new(Vec::new()),
        }))
    }

    /// Create a detached HTML element. The tag name is ASCII-lowercased.
    pub fn create_element(&self, tag: &str) -> Element {
        let name = QualName::new(None, ns!(html), LocalName::from(tag.to_ascii_lowercase()));
        let id = self.0.dom.borrow_mut().create_element(name, Vec::new());
        self.element(id)
    }

    pub fn create_text_node(&self, text: &str) -> Node {
        let id = self.0.dom.borrow_mut().create_text(text.to_string());
        self.node(id)
    }

    /// The document node itself.
    pub fn as_node(&self) -> Node {
        let id = self.0.dom.borrow().document();
        self.node(id)
    }

    /// The root `html` element.
    pub fn document_element(&self) -> Option<Element> {
        let id = {
            let dom = self.0.dom.borrow();
            dom.element_children(dom.document()).next()
        };
        id.map(|id| self.element(id))
    }

    pub fn head(&self) -> Option<Element> {
        self.root_child("head")
    }

    pub fn body(&self) -> Option<Element> {
        self.root_child("body")
    }

    fn root_child(&self, tag: &str) -> Option<Element> {
        let root = self.document_element()?;
        let id = {
            let dom = self.0.dom.borrow();
            dom.element_children(root.id())
                .find(|&c| dom.element_name(c).is_some_and(|n| n.as_ref() == tag))
        };
        id.map(|id| self.element(id))
    }

    /// First element in tree order matching `selector`.
    pub fn query_selector(&self, selector: &str) -> Result<Option<Element>> {
        let list = SelectorList::parse(selector)?;
        let found = {
            let dom = self.0.dom.borrow();
            list.query_first(&dom, dom.document())
        };
        Ok(found.map(|id| self.element(id)))
    }

    /// Every element in tree order matching `selector`.
    pub fn query_selector_all(&self, selector: &str) -> Result<Vec<Element>> {
        let list = SelectorList::parse(selector)?;
        let found = {
            let dom = self.0.dom.borrow();
            list.query_all(&dom, dom.document())
        };
        Ok(found.into_iter().map(|id| self.element(id)).collect())
    }

    /// Add an author stylesheet that applies after the document's own `<style>` elements.
    pub fn add_stylesheet(&self, css: &str) {
        let sheet = Stylesheet::parse(css);
        tracing::debug!(rules = sheet.rules.len(), "added stylesheet");
        self.0.stylesheets.borrow_mut().push(sheet);
        self.invalidate_styles();
    }

    /// Run the mutation observer checkpoint, returning how many records were delivered.
    pub fn deliver_mutation_records(&self) -> usize {
        observer::deliver(self)
    }

    /// Drain the scroll requests recorded by `scroll_into_view`.
    pub fn take_scroll_requests(&self) -> Vec<ScrollRequest> {
        std::mem::take(&mut *self.0.scroll_requests.borrow_mut())
    }

    /// Number of nodes the document currently holds, itself included.
    ///
    /// Detached trees still reachable through a handle are counted.
    pub fn node_count(&self) -> usize {
        self.0.dom.borrow().len()
    }

    /// Release every detached tree that no handle points into, returning how
    /// many nodes were freed.
    ///
    /// Trees are normally released as their last handle drops. A drop that
    /// happens while the document is borrowed is deferred to this sweep.
    pub fn collect_garbage(&self) -> usize {
        let roots = self.0.dom.borrow().detached_roots();
        let mut freed = 0;
        for root in roots {
            freed += self.release_tree(root).nodes;
        }
        if freed > 0 {
            tracing::debug!(freed, "collected detached nodes");
        }
        freed
    }

    /// Serialize the whole document.
    pub fn to_html(&self) -> String {
        let dom = self.0.dom.borrow();
        serialize::serialize_children(&dom, dom.document())
    }

    pub(crate) fn inner(&self) -> &Rc<DocumentInner> {
        &self.0
    }

    pub(crate) fn ptr_eq(&self, other: &Document) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn node(&self, id: NodeId) -> Node {
        Node::new(self.clone(), id)
    }

    pub(crate) fn node_opt(&self, id: NodeId) -> Option<Node> {
        id.is_some().then(|| self.node(id))
    }

    /// Handle for a node the caller knows to be an element.
    pub(crate) fn element(&self, id: NodeId) -> Element {
        Element::new(self.node(id))
    }

    pub(crate) fn pin(&self, id: NodeId) {
        *self.0.handles.borrow_mut().entry(id).or_insert(0) += 1;
    }

    /// Drop one handle to `id`, releasing its detached tree with the last one.
    pub(crate) fn unpin(&self, id: NodeId) {
        let last = {
            let mut handles = self.0.handles.borrow_mut();
            match handles.get_mut(&id) {
                Some(count) if *count > 1 => {
                    *count -= 1;
                    false
                }
                Some(_) => {
                    handles.remove(&id);
                    true
                }
                None => false,
            }
        };
        if last {
            self.reclaim(id);
        }
    }

    /// Release the detached tree containing `id` when nothing points into it.
    pub(crate) fn reclaim(&self, id: NodeId) {
        let root = match self.0.dom.try_borrow() {
            Ok(dom) => dom.root_of(id),
            Err(_) => return,
        };
        let released = self.release_tree(root);
        if released.nodes > 0 {
            tracing::trace!(nodes = released.nodes, "released detached tree");
        }
    }

    fn release_tree(&self, root: NodeId) -> Released {
        let inner = &self.0;
        let (Ok(mut dom), Ok(handles), Ok(mut listeners), Ok(mut observers)) = (
            inner.dom.try_borrow_mut(),
            inner.handles.try_borrow(),
            inner.listeners.try_borrow_mut(),
            inner.observers.try_borrow_mut(),
        ) else {
            return Released::default();
        };

        if root == dom.document() || dom.get(root).is_none_or(|n| n.parent.is_some()) {
            return Released::default();
        }
        let pinned = handles.contains_key(&root)
            || dom.descendants(root).any(|n| handles.contains_key(&n));
        if pinned {
            return Released::default();
        }

        let freed = dom.free_subtree(root);
        Released {
            nodes: freed.len(),
            _listeners: freed.iter().filter_map(|id| listeners.remove(id)).collect(),
            _observers: observers.forget_targets(&freed),
        }
    }

    pub(crate) fn invalidate_styles(&self) {
        if self.0.author_sheets.borrow_mut().take().is_some() {
            tracing::trace!("author styles invalidated");
        }
    }

    /// Author sheets in cascade order, parsed once per change to the document's styles.
    fn author_sheets(&self, dom: &ArenaDom) -> Rc<Vec<Stylesheet>> {
        if let Some(sheets) = self.0.author_sheets.borrow().as_ref() {
            return sheets.clone();
        }
        let mut sheets: Vec<Stylesheet> = dom
            .descendants(dom.document())
            .filter(|&n| dom.element_name(n).is_some_and(|name| name.as_ref() == "style"))
            .map(|n| Stylesheet::parse(&dom.text_content(n)))
            .collect();
        sheets.extend(self.0.stylesheets.borrow().iter().cloned());
        tracing::trace!(sheets = sheets.len(), "parsed author styles");

        let sheets = Rc::new(sheets);
        *self.0.author_sheets.borrow_mut() = Some(sheets.clone());
        sheets
    }

    pub(crate) fn record_scroll(&self, request: ScrollRequest) {
        self.0.scroll_requests.borrow_mut().push(request);
    }

    /// Resolve `property` for the element `id`.
    ///
    /// Disconnected elements have no computed style and yield an empty string.
    pub(crate) fn computed_style(&self, id: NodeId, property: &str) -> String {
        let dom = self.0.dom.borrow();
        if !dom.is_connected(id) {
            return String::new();
        }

        let author = self.author_sheets(&dom);
        let ctx = StyleContext {
            dom: &dom,
            user_agent: self.0.user_agent_sheet.as_ref(),
            author: author.as_slice(),
        };
        ctx.resolve(id, property)
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Document {}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("nodes", &self.0.dom.borrow().len())
            .finish()
    }
}

impl QueryRoot for Document {
    fn query_selector(&self, selector: &str) -> Result<Option<Element>> {
        Document::query_selector(self, selector)
    }
}

impl QueryRoot for Element {
    fn query_selector(&self, selector: &str) -> Result<Option<Element>> {
        Element::query_selector(self, selector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_document_has_skeleton() {
        let doc = Document::new();
        assert_eq!(doc.document_element().unwrap().local_name(), "html");
        assert_eq!(doc.head().unwrap().local_name(), "head");
        assert_eq!(doc.body().unwrap().local_name(), "body");
    }

    #[test]
    fn test_query_selector_order() {
        let doc = Document::parse("<p id=a></p><div><p id=b></p></div>");
        let first = doc.query_selector("p").unwrap().unwrap();
        assert_eq!(first.get_attribute("id").as_deref(), Some("a"));

        let all = doc.query_selector_all("p").unwrap();
        assert_eq!(all.len(), 2);
        assert!(doc.query_selector("span").unwrap().is_none());
        assert!(doc.query_selector("p[").is_err());
    }

    #[test]
    fn test_create_element_is_detached() {
        let doc = Document::new();
        let div = doc.create_element("DIV");
        assert_eq!(div.tag_name(), "DIV");
        assert_eq!(div.local_name(), "div");
        assert!(!div.is_connected());
        assert!(div.parent_node().is_none());
    }

    #[test]
    fn test_documents_are_distinct() {
        let a = Document::new();
        let b = Document::new();
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_ne!(a.body().unwrap(), b.body().unwrap());
    }

    #[test]
    fn test_style_elements_and_added_sheets() {
        let doc = Document::parse("<style>p { color: red }</style><p>x</p>");
        let p = doc.query_selector("p").unwrap().unwrap();
        assert_eq!(p.computed_style("color"), "red");
        assert_eq!(p.computed_style("display"), "block");

        doc.add_stylesheet("p { color: blue }");
        assert_eq!(p.computed_style("color"), "blue");

        p.remove();
        assert_eq!(p.computed_style("color"), "");
    }

    #[test]
    fn test_to_html() {
        let doc = Document::parse("<!DOCTYPE html><title>T</title><p class=x>a &amp; b</p>");
        assert_eq!(
            doc.to_html(),
            "<!DOCTYPE html><html><head><title>T</title></head><body><p class=\"x\">a &amp; b</p></body></html>"
        );
    }

    #[test]
    fn test_style_changes_invalidate_cached_sheets() {
        let doc = Document::parse("<style>p { color: red }</style><p>x</p>");
        let p = doc.query_selector("p").unwrap().unwrap();
        assert_eq!(p.computed_style("color"), "red");

        let style = doc.query_selector("style").unwrap().unwrap();
        style.set_text_content("p { color: green }");
        assert_eq!(p.computed_style("color"), "green");

        let text = style.child_nodes().remove(0);
        text.set_text_content("p { color: teal }");
        assert_eq!(p.computed_style("color"), "teal");

        doc.body()
            .unwrap()
            .insert_adjacent_html(InsertPosition::BeforeEnd, "<style>p { color: navy }</style>")
            .unwrap();
        assert_eq!(p.computed_style("color"), "navy");

        style.remove();
        doc.query_selector("body > style").unwrap().unwrap().remove();
        assert_eq!(p.computed_style("color"), "canvastext");
    }

    #[test]
    fn test_replaced_content_is_released() {
        let doc = Document::parse("<div id=box>start</div>");
        let div = doc.query_selector("#box").unwrap().unwrap();
        let baseline = doc.node_count();

        for i in 0..10_000 {
            div.set_text_content(&i.to_string());
        }
        assert_eq!(doc.node_count(), baseline);

        for _ in 0..100 {
            div.set_inner_html("<ul><li>a</li><li>b</li></ul>");
        }
        assert_eq!(doc.node_count(), baseline + 5 - 1);
    }

    #[test]
    fn test_handles_keep_detached_trees_alive() {
        let doc = Document::parse("<div id=box><p><b>x</b></p></div>");
        let baseline = doc.node_count();
        let b = doc.query_selector("b").unwrap().unwrap();

        doc.query_selector("#box").unwrap().unwrap().set_text_content("");
        assert_eq!(doc.node_count(), baseline);
        assert_eq!(b.text_content(), "x");
        assert_eq!(b.parent_element().unwrap().local_name(), "p");

        // The `p`, `b` and text node go with the last handle.
        drop(b);
        assert_eq!(doc.node_count(), baseline - 3);
        assert_eq!(doc.collect_garbage(), 0);
    }

    #[test]
    fn test_dropped_clones_and_created_elements_are_released() {
        let doc = Document::parse("<ul><li>a</li><li>b</li></ul>");
        let baseline = doc.node_count();
        let ul = doc.query_selector("ul").unwrap().unwrap();

        let copy = ul.clone_node(true);
        let created = doc.create_element("section");
        assert_eq!(doc.node_count(), baseline + 6);

        drop(copy);
        drop(created);
        assert_eq!(doc.node_count(), baseline);
    }

    #[test]
    fn test_released_nodes_lose_their_listeners() {
        use std::cell::Cell;

        use crate::event::{Event, Listener};

        let doc = Document::parse("<div id=box></div>");
        let div = doc.query_selector("#box").unwrap().unwrap();
        let hits = Rc::new(Cell::new(0));

        let detached = doc.create_element("button");
        let listener = {
            let hits = hits.clone();
            Listener::new(move |_| hits.set(hits.get() + 1))
        };
        detached.add_event_listener("click", &listener);
        drop(detached);
        assert!(doc.inner().listeners.borrow().is_empty());

        // The freed slot is reused without inheriting the old registration.
        div.set_inner_html("<button>go</button>");
        let button = doc.query_selector("button").unwrap().unwrap();
        button.dispatch_event(&Event::new("click"));
        assert_eq!(hits.get(), 0);
    }
}
