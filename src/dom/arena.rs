//! Arena-backed node storage.
//!
//! Every node of a document lives in one contiguous vector and links to its
//! relatives by index. A removed node keeps its slot, with its subtree, until
//! the owning document releases the whole detached tree. Released slots go on
//! a free list and are reused by later allocations.

use html5ever::{LocalName, Namespace, QualName, ns};

/// Index of a node in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Sentinel value for no node.
    pub const NONE: NodeId = NodeId(u32::MAX);

    pub fn is_some(&self) -> bool {
        self.0 != u32::MAX
    }

    pub fn is_none(&self) -> bool {
        self.0 == u32::MAX
    }
}

/// Payload of a node.
#[derive(Debug, Clone)]
pub enum NodeData {
    Document,
    Element {
        name: QualName,
        attrs: Vec<Attribute>,
        /// Cached `id` attribute for selector matching.
        id: Option<String>,
        /// Cached `class` tokens for selector matching.
        classes: Vec<String>,
    },
    Text(String),
    Comment(String),
    Doctype {
        name: String,
        public_id: String,
        system_id: String,
    },
}

/// A single attribute on an element.
#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: QualName,
    pub value: String,
}

#[derive(Debug)]
pub struct ArenaNode {
    pub data: NodeData,
    pub parent: NodeId,
    pub first_child: NodeId,
    pub last_child: NodeId,
    pub prev_sibling: NodeId,
    pub next_sibling: NodeId,
}

impl ArenaNode {
    fn new(data: NodeData) -> Self {
        Self {
            data,
            parent: NodeId::NONE,
            first_child: NodeId::NONE,
            last_child: NodeId::NONE,
            prev_sibling: NodeId::NONE,
            next_sibling: NodeId::NONE,
        }
    }
}

/// The node arena of one document.
#[derive(Debug)]
pub struct ArenaDom {
    nodes: Vec<Option<ArenaNode>>,
    free: Vec<NodeId>,
    document: NodeId,
}

impl ArenaDom {
    /// Create an arena holding only the document node.
    pub fn new() -> Self {
        let mut dom = Self {
            nodes: Vec::new(),
            free: Vec::new(),
            document: NodeId::NONE,
        };
        dom.document = dom.alloc(ArenaNode::new(NodeData::Document));
        dom
    }

    fn alloc(&mut self, node: ArenaNode) -> NodeId {
        if let Some(id) = self.free.pop() {
            self.nodes[id.0 as usize] = Some(node);
            return id;
        }
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Some(node));
        id
    }

    pub fn document(&self) -> NodeId {
        self.document
    }

    pub fn get(&self, id: NodeId) -> Option<&ArenaNode> {
        if id.is_none() {
            return None;
        }
        self.nodes.get(id.0 as usize).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut ArenaNode> {
        if id.is_none() {
            return None;
        }
        self.nodes.get_mut(id.0 as usize).and_then(Option::as_mut)
    }

    /// Number of live nodes, the document node included.
    pub fn len(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    /// Release the detached tree rooted at `root`, returning the freed ids.
    ///
    /// Attached nodes and the document node are never released.
    pub fn free_subtree(&mut self, root: NodeId) -> Vec<NodeId> {
        if root == self.document || self.get(root).is_none_or(|n| n.parent.is_some()) {
            return Vec::new();
        }
        let mut freed = vec![root];
        freed.extend(self.descendants(root));
        for &id in &freed {
            self.nodes[id.0 as usize] = None;
            self.free.push(id);
        }
        freed
    }

    /// Roots of every tree not attached to the document.
    pub fn detached_roots(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                let id = NodeId(index as u32);
                let node = slot.as_ref()?;
                (node.parent.is_none() && id != self.document).then_some(id)
            })
            .collect()
    }

    pub fn create_element(&mut self, name: QualName, attrs: Vec<Attribute>) -> NodeId {
        let (id, classes) = extract_id_and_classes(&attrs);
        self.alloc(ArenaNode::new(NodeData::Element {
            name,
            attrs,
            id,
            classes,
        }))
    }

    pub fn create_text(&mut self, text: String) -> NodeId {
        self.alloc(ArenaNode::new(NodeData::Text(text)))
    }

    pub fn create_comment(&mut self, text: String) -> NodeId {
        self.alloc(ArenaNode::new(NodeData::Comment(text)))
    }

    pub fn create_doctype(&mut self, name: String, public_id: String, system_id: String) -> NodeId {
        self.alloc(ArenaNode::new(NodeData::Doctype {
            name,
            public_id,
            system_id,
        }))
    }

    /// Append `child` as the last child of `parent`.
    ///
    /// The child must already be detached.
    pub fn append(&mut self, parent: NodeId, child: NodeId) {
        let last_child = self.get(parent).map(|n| n.last_child).unwrap_or(NodeId::NONE);

        if let Some(child_node) = self.get_mut(child) {
            child_node.parent = parent;
            child_node.prev_sibling = last_child;
            child_node.next_sibling = NodeId::NONE;
        }

        if last_child.is_some()
            && let Some(last_node) = self.get_mut(last_child)
        {
            last_node.next_sibling = child;
        }

        if let Some(parent_node) = self.get_mut(parent) {
            if parent_node.first_child.is_none() {
                parent_node.first_child = child;
            }
            parent_node.last_child = child;
        }
    }

    /// Insert the detached `new_node` immediately before `sibling`.
    pub fn insert_before(&mut self, sibling: NodeId, new_node: NodeId) {
        let (parent, prev) = match self.get(sibling) {
            Some(n) => (n.parent, n.prev_sibling),
            None => return,
        };

        if let Some(new) = self.get_mut(new_node) {
            new.parent = parent;
            new.prev_sibling = prev;
            new.next_sibling = sibling;
        }

        if let Some(sib) = self.get_mut(sibling) {
            sib.prev_sibling = new_node;
        }

        if prev.is_some() {
            if let Some(p) = self.get_mut(prev) {
                p.next_sibling = new_node;
            }
        } else if let Some(par) = self.get_mut(parent) {
            par.first_child = new_node;
        }
    }

    /// Append text to the last child when it is a text node, else add a new one.
    pub fn append_text(&mut self, parent: NodeId, text: &str) {
        let last_child = self.get(parent).map(|n| n.last_child).unwrap_or(NodeId::NONE);

        if let Some(last) = self.get_mut(last_child)
            && let NodeData::Text(existing) = &mut last.data
        {
            existing.push_str(text);
            return;
        }

        let text_node = self.create_text(text.to_string());
        self.append(parent, text_node);
    }

    /// Unlink a node from its parent and siblings. Its own subtree is kept.
    pub fn detach(&mut self, target: NodeId) {
        let (parent, prev, next) = match self.get(target) {
            Some(n) => (n.parent, n.prev_sibling, n.next_sibling),
            None => return,
        };

        if prev.is_some() {
            if let Some(p) = self.get_mut(prev) {
                p.next_sibling = next;
            }
        } else if let Some(p) = self.get_mut(parent) {
            p.first_child = next;
        }

        if next.is_some() {
            if let Some(n) = self.get_mut(next) {
                n.prev_sibling = prev;
            }
        } else if let Some(p) = self.get_mut(parent) {
            p.last_child = prev;
        }

        if let Some(node) = self.get_mut(target) {
            node.parent = NodeId::NONE;
            node.prev_sibling = NodeId::NONE;
            node.next_sibling = NodeId::NONE;
        }
    }

    /// Detach every child of `parent`, returning them in order.
    pub fn detach_children(&mut self, parent: NodeId) -> Vec<NodeId> {
        let children: Vec<_> = self.children(parent).collect();
        for &child in &children {
            self.detach(child);
        }
        children
    }

    pub fn children(&self, parent: NodeId) -> ChildrenIter<'_> {
        let first = self.get(parent).map(|n| n.first_child).unwrap_or(NodeId::NONE);
        ChildrenIter {
            dom: self,
            current: first,
        }
    }

    pub fn element_children(&self, parent: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(parent).filter(|&c| self.is_element(c))
    }

    pub fn parent(&self, id: NodeId) -> NodeId {
        self.get(id).map(|n| n.parent).unwrap_or(NodeId::NONE)
    }

    /// Parent of `id` if that parent is an element.
    pub fn parent_element(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id);
        self.is_element(parent).then_some(parent)
    }

    /// Descendants of `root` in tree order, excluding `root` itself.
    pub fn descendants(&self, root: NodeId) -> Descendants<'_> {
        let mut stack: Vec<_> = self.children(root).collect();
        stack.reverse();
        Descendants { dom: self, stack }
    }

    /// The topmost ancestor of `id` (itself when detached with no parent).
    pub fn root_of(&self, id: NodeId) -> NodeId {
        let mut current = id;
        loop {
            let parent = self.parent(current);
            if parent.is_none() {
                return current;
            }
            current = parent;
        }
    }

    pub fn is_connected(&self, id: NodeId) -> bool {
        self.root_of(id) == self.document
    }

    /// True when `ancestor` is `node` or one of its ancestors.
    pub fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = node;
        while current.is_some() {
            if current == ancestor {
                return true;
            }
            current = self.parent(current);
        }
        false
    }

    /// Copy a node (and optionally its subtree) from `src` into this arena.
    ///
    /// The copy is detached.
    pub fn import_subtree(&mut self, src: &ArenaDom, src_id: NodeId, deep: bool) -> NodeId {
        let Some(node) = src.get(src_id) else {
            return NodeId::NONE;
        };
        let copy = self.alloc(ArenaNode::new(node.data.clone()));
        if deep {
            for child in src.children(src_id) {
                let child_copy = self.import_subtree(src, child, true);
                self.append(copy, child_copy);
            }
        }
        copy
    }

    /// Duplicate a node of this arena, returning the detached copy.
    pub fn clone_subtree(&mut self, id: NodeId, deep: bool) -> NodeId {
        let Some(node) = self.get(id) else {
            return NodeId::NONE;
        };
        let copy = self.alloc(ArenaNode::new(node.data.clone()));
        if deep {
            let children: Vec<_> = self.children(id).collect();
            for child in children {
                let child_copy = self.clone_subtree(child, true);
                self.append(copy, child_copy);
            }
        }
        copy
    }
}

impl Default for ArenaDom {
    fn default() -> Self {
        Self::new()
    }
}

fn extract_id_and_classes(attrs: &[Attribute]) -> (Option<String>, Vec<String>) {
    let mut id = None;
    let mut classes = Vec::new();
    for attr in attrs {
        if attr.name.ns != ns!() {
            continue;
        }
        match attr.name.local.as_ref() {
            "id" => id = Some(attr.value.clone()),
            "class" => classes = split_classes(&attr.value),
            _ => {}
        }
    }
    (id, classes)
}

/// Split a `class` attribute value into unique tokens, keeping first-seen order.
fn split_classes(value: &str) -> Vec<String> {
    let mut classes: Vec<String> = Vec::new();
    for token in value.split_ascii_whitespace() {
        if !classes.iter().any(|c| c == token) {
            classes.push(token.to_string());
        }
    }
    classes
}

pub struct ChildrenIter<'a> {
    dom: &'a ArenaDom,
    current: NodeId,
}

impl Iterator for ChildrenIter<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current.is_none() {
            return None;
        }
        let id = self.current;
        self.current = self
            .dom
            .get(id)
            .map(|n| n.next_sibling)
            .unwrap_or(NodeId::NONE);
        Some(id)
    }
}

pub struct Descendants<'a> {
    dom: &'a ArenaDom,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        let mut children: Vec<_> = self.dom.children(id).collect();
        children.reverse();
        self.stack.extend(children);
        Some(id)
    }
}

/// Element accessors.
impl ArenaDom {
    pub fn element_name(&self, id: NodeId) -> Option<&LocalName> {
        self.get(id).and_then(|n| match &n.data {
            NodeData::Element { name, .. } => Some(&name.local),
            _ => None,
        })
    }

    pub fn element_qual_name(&self, id: NodeId) -> Option<&QualName> {
        self.get(id).and_then(|n| match &n.data {
            NodeData::Element { name, .. } => Some(name),
            _ => None,
        })
    }

    pub fn element_namespace(&self, id: NodeId) -> Option<&Namespace> {
        self.get(id).and_then(|n| match &n.data {
            NodeData::Element { name, .. } => Some(&name.ns),
            _ => None,
        })
    }

    pub fn attrs(&self, id: NodeId) -> &[Attribute] {
        self.get(id)
            .and_then(|n| match &n.data {
                NodeData::Element { attrs, .. } => Some(attrs.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }

    /// Look up an attribute by its qualified (`prefix:local`) name.
    pub fn get_attr(&self, id: NodeId, attr_name: &str) -> Option<&str> {
        self.attrs(id)
            .iter()
            .find(|a| qualified_name_eq(&a.name, attr_name))
            .map(|a| a.value.as_str())
    }

    /// Set an attribute, returning the previous value.
    pub fn set_attr(&mut self, id: NodeId, attr_name: &str, value: &str) -> Option<String> {
        let Some(NodeData::Element {
            attrs, id: cached_id, classes, ..
        }) = self.get_mut(id).map(|n| &mut n.data)
        else {
            return None;
        };

        let old = match attrs.iter_mut().find(|a| qualified_name_eq(&a.name, attr_name)) {
            Some(existing) => Some(std::mem::replace(&mut existing.value, value.to_string())),
            None => {
                attrs.push(Attribute {
                    name: QualName::new(None, ns!(), LocalName::from(attr_name)),
                    value: value.to_string(),
                });
                None
            }
        };
        (*cached_id, *classes) = extract_id_and_classes(attrs);
        old
    }

    /// Remove an attribute, returning its value if it was present.
    pub fn remove_attr(&mut self, id: NodeId, attr_name: &str) -> Option<String> {
        let Some(NodeData::Element {
            attrs, id: cached_id, classes, ..
        }) = self.get_mut(id).map(|n| &mut n.data)
        else {
            return None;
        };

        let index = attrs.iter().position(|a| qualified_name_eq(&a.name, attr_name))?;
        let removed = attrs.remove(index);
        (*cached_id, *classes) = extract_id_and_classes(attrs);
        Some(removed.value)
    }

    pub fn element_id(&self, id: NodeId) -> Option<&str> {
        self.get(id).and_then(|n| match &n.data {
            NodeData::Element { id, .. } => id.as_deref(),
            _ => None,
        })
    }

    pub fn element_classes(&self, id: NodeId) -> &[String] {
        self.get(id)
            .and_then(|n| match &n.data {
                NodeData::Element { classes, .. } => Some(classes.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.get(id)
            .is_some_and(|n| matches!(n.data, NodeData::Element { .. }))
    }

    /// Data of a text or comment node.
    pub fn character_data(&self, id: NodeId) -> Option<&str> {
        self.get(id).and_then(|n| match &n.data {
            NodeData::Text(s) | NodeData::Comment(s) => Some(s.as_str()),
            _ => None,
        })
    }

    /// Replace the data of a text or comment node, returning the old data.
    pub fn set_character_data(&mut self, id: NodeId, data: &str) -> Option<String> {
        match self.get_mut(id).map(|n| &mut n.data) {
            Some(NodeData::Text(s)) | Some(NodeData::Comment(s)) => {
                Some(std::mem::replace(s, data.to_string()))
            }
            _ => None,
        }
    }

    /// Concatenated text of every descendant text node.
    pub fn text_content(&self, id: NodeId) -> String {
        if let Some(data) = self.character_data(id) {
            return data.to_string();
        }
        self.descendants(id)
            .filter_map(|d| match self.get(d).map(|n| &n.data) {
                Some(NodeData::Text(s)) => Some(s.as_str()),
                _ => None,
            })
            .collect()
    }
}

fn qualified_name_eq(name: &QualName, wanted: &str) -> bool {
    match &name.prefix {
        Some(prefix) => wanted
            .split_once(':')
            .is_some_and(|(p, l)| p == prefix.as_ref() && l == name.local.as_ref()),
        None => name.local.as_ref() == wanted,
    }
}

#[cfg(test)]
mod tests {
    use html5ever::ns;

    use super::*;

    fn make_qname(local: &str) -> QualName {
        QualName::new(None, ns!(html), LocalName::from(local))
    }

    fn attr(name: &str, value: &str) -> Attribute {
        Attribute {
            name: QualName::new(None, ns!(), LocalName::from(name)),
            value: value.to_string(),
        }
    }

    #[test]
    fn test_create_element_caches_id_and_classes() {
        let mut dom = ArenaDom::new();
        let div = dom.create_element(
            make_qname("div"),
            vec![attr("id", "main"), attr("class", "a b a")],
        );

        assert_eq!(dom.element_name(div).unwrap().as_ref(), "div");
        assert_eq!(dom.element_id(div), Some("main"));
        assert_eq!(dom.element_classes(div), ["a", "b"]);
    }

    #[test]
    fn test_set_attr_refreshes_class_cache() {
        let mut dom = ArenaDom::new();
        let div = dom.create_element(make_qname("div"), vec![]);

        assert_eq!(dom.set_attr(div, "class", "x y"), None);
        assert_eq!(dom.element_classes(div), ["x", "y"]);
        assert_eq!(dom.set_attr(div, "class", "z").as_deref(), Some("x y"));
        assert_eq!(dom.element_classes(div), ["z"]);
        assert_eq!(dom.remove_attr(div, "class").as_deref(), Some("z"));
        assert!(dom.element_classes(div).is_empty());
    }

    #[test]
    fn test_append_and_detach() {
        let mut dom = ArenaDom::new();
        let parent = dom.create_element(make_qname("div"), vec![]);
        let a = dom.create_element(make_qname("p"), vec![]);
        let b = dom.create_element(make_qname("p"), vec![]);
        let c = dom.create_element(make_qname("p"), vec![]);
        dom.append(dom.document(), parent);
        dom.append(parent, a);
        dom.append(parent, b);
        dom.append(parent, c);

        dom.detach(b);
        let children: Vec<_> = dom.children(parent).collect();
        assert_eq!(children, vec![a, c]);
        assert!(dom.get(b).unwrap().parent.is_none());
        assert!(!dom.is_connected(b));
        assert!(dom.is_connected(c));

        dom.insert_before(a, b);
        let children: Vec<_> = dom.children(parent).collect();
        assert_eq!(children, vec![b, a, c]);
    }

    #[test]
    fn test_text_merging() {
        let mut dom = ArenaDom::new();
        let p = dom.create_element(make_qname("p"), vec![]);
        dom.append(dom.document(), p);

        dom.append_text(p, "Hello, ");
        dom.append_text(p, "World!");

        let children: Vec<_> = dom.children(p).collect();
        assert_eq!(children.len(), 1);
        assert_eq!(dom.text_content(p), "Hello, World!");
    }

    #[test]
    fn test_clone_subtree_shallow_and_deep() {
        let mut dom = ArenaDom::new();
        let ul = dom.create_element(make_qname("ul"), vec![attr("class", "list")]);
        let li = dom.create_element(make_qname("li"), vec![]);
        dom.append(dom.document(), ul);
        dom.append(ul, li);
        dom.append_text(li, "one");

        let shallow = dom.clone_subtree(ul, false);
        assert_eq!(dom.children(shallow).count(), 0);
        assert_eq!(dom.element_classes(shallow), ["list"]);

        let deep = dom.clone_subtree(ul, true);
        assert_ne!(deep, ul);
        assert!(dom.get(deep).unwrap().parent.is_none());
        assert_eq!(dom.text_content(deep), "one");
    }

    #[test]
    fn test_descendants_in_tree_order() {
        let mut dom = ArenaDom::new();
        let root = dom.create_element(make_qname("div"), vec![]);
        let a = dom.create_element(make_qname("a"), vec![]);
        let a1 = dom.create_element(make_qname("b"), vec![]);
        let c = dom.create_element(make_qname("c"), vec![]);
        dom.append(root, a);
        dom.append(a, a1);
        dom.append(root, c);

        let order: Vec<_> = dom.descendants(root).collect();
        assert_eq!(order, vec![a, a1, c]);
        assert!(dom.is_inclusive_ancestor(root, a1));
        assert!(!dom.is_inclusive_ancestor(a1, root));
    }

    #[test]
    fn test_freed_slots_are_reused() {
        let mut dom = ArenaDom::new();
        let div = dom.create_element(make_qname("div"), vec![]);
        let span = dom.create_element(make_qname("span"), vec![]);
        dom.append(div, span);
        dom.append_text(span, "x");
        assert_eq!(dom.len(), 4);

        let freed = dom.free_subtree(div);
        assert_eq!(freed.len(), 3);
        assert_eq!(dom.len(), 1);
        assert!(dom.get(span).is_none());

        let p = dom.create_element(make_qname("p"), vec![]);
        assert!(freed.contains(&p));
        assert_eq!(dom.element_name(p).unwrap().as_ref(), "p");
        assert!(dom.get(p).unwrap().first_child.is_none());
    }

    #[test]
    fn test_attached_nodes_are_not_freed() {
        let mut dom = ArenaDom::new();
        let div = dom.create_element(make_qname("div"), vec![]);
        let loose = dom.create_element(make_qname("p"), vec![]);
        dom.append(dom.document(), div);

        assert!(dom.free_subtree(div).is_empty());
        assert!(dom.free_subtree(dom.document()).is_empty());
        assert_eq!(dom.detached_roots(), vec![loose]);
    }
}
