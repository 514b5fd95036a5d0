//! Mutation observation.
//!
//! Records are queued synchronously as the tree changes and handed to the
//! observer callbacks when the embedder runs
//! [`Document::deliver_mutation_records`], which plays the role of the host's
//! microtask checkpoint.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::dom::arena::NodeId;
use crate::dom::{Document, DocumentInner, Node};
use crate::error::{Error, Result};

/// Callback invoked with a batch of records and the observer that collected them.
pub type MutationCallback = dyn Fn(&[MutationRecord], &MutationObserver);

/// What to watch on an observed node.
///
/// Field names and normalisation follow the DOM's `MutationObserverInit`:
/// asking for old values or an attribute filter implies `attributes`, and an
/// old character data value implies `character_data`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct MutationObserverInit {
    pub child_list: bool,
    pub attributes: Option<bool>,
    pub character_data: Option<bool>,
    pub subtree: bool,
    pub attribute_old_value: Option<bool>,
    pub character_data_old_value: Option<bool>,
    pub attribute_filter: Option<Vec<String>>,
}

impl MutationObserverInit {
    /// Child list changes anywhere in the subtree.
    pub fn subtree_child_list() -> Self {
        Self {
            child_list: true,
            subtree: true,
            ..Default::default()
        }
    }

    pub fn with_attributes(mut self) -> Self {
        self.attributes = Some(true);
        self
    }

    pub fn with_attribute_old_value(mut self) -> Self {
        self.attribute_old_value = Some(true);
        self
    }

    pub fn with_attribute_filter<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attribute_filter = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_character_data(mut self) -> Self {
        self.character_data = Some(true);
        self
    }

    pub fn with_character_data_old_value(mut self) -> Self {
        self.character_data_old_value = Some(true);
        self
    }

    pub fn with_subtree(mut self) -> Self {
        self.subtree = true;
        self
    }

    fn resolve(&self) -> Result<ResolvedInit> {
        let attribute_old_value = self.attribute_old_value.unwrap_or(false);
        let character_data_old_value = self.character_data_old_value.unwrap_or(false);

        let attributes = self.attributes.unwrap_or(
            self.attribute_old_value.is_some() || self.attribute_filter.is_some(),
        );
        let character_data = self
            .character_data
            .unwrap_or(self.character_data_old_value.is_some());

        if !self.child_list && !attributes && !character_data {
            return Err(Error::InvalidObserverOptions(
                "one of child_list, attributes or character_data must be true",
            ));
        }
        if attribute_old_value && !attributes {
            return Err(Error::InvalidObserverOptions(
                "attribute_old_value requires attributes",
            ));
        }
        if self.attribute_filter.is_some() && !attributes {
            return Err(Error::InvalidObserverOptions(
                "attribute_filter requires attributes",
            ));
        }
        if character_data_old_value && !character_data {
            return Err(Error::InvalidObserverOptions(
                "character_data_old_value requires character_data",
            ));
        }

        Ok(ResolvedInit {
            child_list: self.child_list,
            attributes,
            character_data,
            subtree: self.subtree,
            attribute_old_value,
            character_data_old_value,
            attribute_filter: self.attribute_filter.clone(),
        })
    }
}

#[derive(Debug, Clone)]
struct ResolvedInit {
    child_list: bool,
    attributes: bool,
    character_data: bool,
    subtree: bool,
    attribute_old_value: bool,
    character_data_old_value: bool,
    attribute_filter: Option<Vec<String>>,
}

/// Kind of change a record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub enum MutationKind {
    ChildList,
    Attributes,
    CharacterData,
}

/// One observed change.
#[derive(Debug, Clone)]
pub struct MutationRecord {
    pub kind: MutationKind,
    pub target: Node,
    pub added_nodes: Vec<Node>,
    pub removed_nodes: Vec<Node>,
    pub previous_sibling: Option<Node>,
    pub next_sibling: Option<Node>,
    pub attribute_name: Option<String>,
    pub old_value: Option<String>,
}

/// The change being reported, before it is fanned out to observers.
pub(crate) enum Change {
    ChildList {
        added: Vec<NodeId>,
        removed: Vec<NodeId>,
        previous_sibling: NodeId,
        next_sibling: NodeId,
    },
    Attribute {
        name: String,
        old_value: Option<String>,
    },
    CharacterData {
        old_value: String,
    },
}

struct ObserverInner {
    callback: Box<MutationCallback>,
    records: RefCell<Vec<MutationRecord>>,
    documents: RefCell<Vec<Weak<DocumentInner>>>,
}

/// Handle to a mutation observer. Clones share the same observer.
#[derive(Clone)]
pub struct MutationObserver(Rc<ObserverInner>);

impl MutationObserver {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&[MutationRecord], &MutationObserver) + 'static,
    {
        Self(Rc::new(ObserverInner {
            callback: Box::new(callback),
            records: RefCell::new(Vec::new()),
            documents: RefCell::new(Vec::new()),
        }))
    }

    /// Start (or re-configure) observation of `target`.
    pub fn observe(&self, target: &Node, options: &MutationObserverInit) -> Result<()> {
        let options = options.resolve()?;
        let doc = target.owner_document();

        {
            let mut registry = doc.inner().observers.borrow_mut();
            match registry
                .registrations
                .iter_mut()
                .find(|r| r.target == target.id() && r.observer.ptr_eq(self))
            {
                Some(existing) => existing.options = options,
                None => registry.registrations.push(Registration {
                    observer: self.clone(),
                    target: target.id(),
                    options,
                }),
            }
        }

        let mut documents = self.0.documents.borrow_mut();
        let weak = Rc::downgrade(doc.inner());
        if !documents.iter().any(|d| d.ptr_eq(&weak)) {
            documents.push(weak);
        }
        Ok(())
    }

    /// Stop observing everything and drop queued records.
    pub fn disconnect(&self) {
        for doc in self.0.documents.borrow_mut().drain(..) {
            if let Some(doc) = doc.upgrade() {
                doc.observers
                    .borrow_mut()
                    .registrations
                    .retain(|r| !r.observer.ptr_eq(self));
            }
        }
        self.0.records.borrow_mut().clear();
    }

    /// Remove and return the records queued so far.
    pub fn take_records(&self) -> Vec<MutationRecord> {
        std::mem::take(&mut *self.0.records.borrow_mut())
    }

    pub fn ptr_eq(&self, other: &MutationObserver) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn notify(&self, records: &[MutationRecord]) {
        (self.0.callback)(records, self);
    }
}

impl fmt::Debug for MutationObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationObserver")
            .field("queued", &self.0.records.borrow().len())
            .finish()
    }
}

struct Registration {
    observer: MutationObserver,
    target: NodeId,
    options: ResolvedInit,
}

/// Per-document observer bookkeeping.
#[derive(Default)]
pub(crate) struct ObserverRegistry {
    registrations: Vec<Registration>,
    pending: Vec<MutationObserver>,
}

impl ObserverRegistry {
    fn take_pending(&mut self) -> Vec<MutationObserver> {
        std::mem::take(&mut self.pending)
    }

    /// Drop registrations on released nodes, returning their observers.
    pub(crate) fn forget_targets(&mut self, released: &[NodeId]) -> Vec<MutationObserver> {
        let mut forgotten = Vec::new();
        self.registrations.retain(|r| {
            let keep = !released.contains(&r.target);
            if !keep {
                forgotten.push(r.observer.clone());
            }
            keep
        });
        forgotten
    }
}

/// Fan a change on `target` out to every interested observer.
pub(crate) fn queue_mutation(doc: &Document, target: NodeId, change: Change) {
    let (ancestors, touches_style) = {
        let dom = doc.inner().dom.borrow();
        let mut chain = Vec::new();
        let mut current = target;
        while current.is_some() {
            chain.push(current);
            current = dom.parent(current);
        }

        let is_style = |id: NodeId| dom.element_name(id).is_some_and(|n| n.as_ref() == "style");
        let touches_style = match &change {
            Change::ChildList { added, removed, .. } => {
                chain.iter().any(|&n| is_style(n))
                    || added
                        .iter()
                        .chain(removed)
                        .any(|&n| is_style(n) || dom.descendants(n).any(is_style))
            }
            Change::CharacterData { .. } => chain.iter().any(|&n| is_style(n)),
            Change::Attribute { .. } => false,
        };
        (chain, touches_style)
    };
    if touches_style {
        doc.invalidate_styles();
    }

    let mut registry = doc.inner().observers.borrow_mut();
    if registry.registrations.is_empty() {
        return;
    }

    let mut interested: Vec<(MutationObserver, Option<String>)> = Vec::new();
    for &node in &ancestors {
        for registration in registry.registrations.iter().filter(|r| r.target == node) {
            let options = &registration.options;
            if node != target && !options.subtree {
                continue;
            }
            let (wanted, old_value) = match &change {
                Change::ChildList { .. } => (options.child_list, None),
                Change::Attribute { name, old_value } => {
                    let filtered_out = options
                        .attribute_filter
                        .as_ref()
                        .is_some_and(|filter| !filter.iter().any(|f| f == name));
                    let old = options
                        .attribute_old_value
                        .then(|| old_value.clone())
                        .flatten();
                    (options.attributes && !filtered_out, old)
                }
                Change::CharacterData { old_value } => (
                    options.character_data,
                    options.character_data_old_value.then(|| old_value.clone()),
                ),
            };
            if !wanted {
                continue;
            }
            match interested
                .iter_mut()
                .find(|(o, _)| o.ptr_eq(&registration.observer))
            {
                Some((_, existing)) => {
                    if old_value.is_some() {
                        *existing = old_value;
                    }
                }
                None => interested.push((registration.observer.clone(), old_value)),
            }
        }
    }

    for (observer, old_value) in interested {
        let record = build_record(doc, target, &change, old_value);
        observer.0.records.borrow_mut().push(record);
        if !registry.pending.iter().any(|o| o.ptr_eq(&observer)) {
            registry.pending.push(observer);
        }
    }
}

fn build_record(
    doc: &Document,
    target: NodeId,
    change: &Change,
    old_value: Option<String>,
) -> MutationRecord {
    let nodes = |ids: &[NodeId]| ids.iter().map(|&id| doc.node(id)).collect::<Vec<_>>();
    let mut record = MutationRecord {
        kind: MutationKind::ChildList,
        target: doc.node(target),
        added_nodes: Vec::new(),
        removed_nodes: Vec::new(),
        previous_sibling: None,
        next_sibling: None,
        attribute_name: None,
        old_value,
    };
    match change {
        Change::ChildList {
            added,
            removed,
            previous_sibling,
            next_sibling,
        } => {
            record.added_nodes = nodes(added);
            record.removed_nodes = nodes(removed);
            record.previous_sibling = doc.node_opt(*previous_sibling);
            record.next_sibling = doc.node_opt(*next_sibling);
        }
        Change::Attribute { name, .. } => {
            record.kind = MutationKind::Attributes;
            record.attribute_name = Some(name.clone());
        }
        Change::CharacterData { .. } => {
            record.kind = MutationKind::CharacterData;
        }
    }
    record
}

/// Deliver queued records until no observer has any left.
///
/// Returns the number of records delivered.
pub(crate) fn deliver(doc: &Document) -> usize {
    let mut delivered = 0;
    loop {
        let pending = doc.inner().observers.borrow_mut().take_pending();
        if pending.is_empty() {
            break;
        }
        for observer in pending {
            let records = observer.take_records();
            if records.is_empty() {
                continue;
            }
            tracing::trace!(count = records.len(), "delivering mutation records");
            delivered += records.len();
            observer.notify(&records);
        }
    }
    delivered
}
