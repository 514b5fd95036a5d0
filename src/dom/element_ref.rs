//! Selector matching over the arena via the `selectors` crate.

use std::fmt;

use html5ever::{LocalName, Namespace};
use selectors::attr::{AttrSelectorOperation, CaseSensitivity, NamespaceConstraint};
use selectors::context::{MatchingContext, SelectorCaches};
use selectors::matching::ElementSelectorFlags;
use selectors::parser::{ParseRelative, Selector, SelectorParseErrorKind};
use selectors::{OpaqueElement, SelectorImpl};

use super::arena::{ArenaDom, NodeData, NodeId};
use crate::error::{Error, Result};

/// Selector implementation for the arena DOM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomSelectors;

/// Identifier string type.
#[derive(Debug, Clone, PartialEq, Eq, Default, Hash)]
pub struct IdentStr(pub String);

impl precomputed_hash::PrecomputedHash for IdentStr {
    fn precomputed_hash(&self) -> u32 {
        let mut h: u32 = 0;
        for byte in self.0.bytes() {
            h = h.wrapping_mul(31).wrapping_add(byte as u32);
        }
        h
    }
}

impl AsRef<str> for IdentStr {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for IdentStr {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl<'a> From<&'a str> for IdentStr {
    fn from(s: &'a str) -> Self {
        Self(s.to_string())
    }
}

impl cssparser::ToCss for IdentStr {
    fn to_css<W: fmt::Write>(&self, dest: &mut W) -> fmt::Result {
        dest.write_str(&self.0)
    }
}

/// `LocalName` newtype implementing `ToCss`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CssLocalName(pub LocalName);

impl precomputed_hash::PrecomputedHash for CssLocalName {
    fn precomputed_hash(&self) -> u32 {
        self.0.precomputed_hash()
    }
}

impl cssparser::ToCss for CssLocalName {
    fn to_css<W: fmt::Write>(&self, dest: &mut W) -> fmt::Result {
        dest.write_str(self.0.as_ref())
    }
}

impl From<String> for CssLocalName {
    fn from(s: String) -> Self {
        Self(LocalName::from(s))
    }
}

impl<'a> From<&'a str> for CssLocalName {
    fn from(s: &'a str) -> Self {
        Self(LocalName::from(s))
    }
}

impl AsRef<str> for CssLocalName {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

/// `Namespace` newtype implementing `ToCss`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct CssNamespace(pub Namespace);

impl precomputed_hash::PrecomputedHash for CssNamespace {
    fn precomputed_hash(&self) -> u32 {
        self.0.precomputed_hash()
    }
}

impl cssparser::ToCss for CssNamespace {
    fn to_css<W: fmt::Write>(&self, dest: &mut W) -> fmt::Result {
        dest.write_str(self.0.as_ref())
    }
}

impl From<String> for CssNamespace {
    fn from(s: String) -> Self {
        Self(Namespace::from(s))
    }
}

impl<'a> From<&'a str> for CssNamespace {
    fn from(s: &'a str) -> Self {
        Self(Namespace::from(s))
    }
}

impl<'i> selectors::parser::Parser<'i> for DomSelectors {
    type Impl = DomSelectors;
    type Error = SelectorParseErrorKind<'i>;

    fn parse_non_ts_pseudo_class(
        &self,
        location: cssparser::SourceLocation,
        name: cssparser::CowRcStr<'i>,
    ) -> std::result::Result<NonTSPseudoClass, cssparser::ParseError<'i, Self::Error>> {
        match name.to_ascii_lowercase().as_str() {
            "link" | "any-link" => Ok(NonTSPseudoClass::Link),
            "visited" => Ok(NonTSPseudoClass::Visited),
            "hover" => Ok(NonTSPseudoClass::Hover),
            "active" => Ok(NonTSPseudoClass::Active),
            "focus" => Ok(NonTSPseudoClass::Focus),
            _ => Err(location.new_custom_error(
                SelectorParseErrorKind::UnsupportedPseudoClassOrElement(name),
            )),
        }
    }
}

/// Pseudo-elements never match; the type only satisfies the trait.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PseudoElement {}

impl cssparser::ToCss for PseudoElement {
    fn to_css<W: fmt::Write>(&self, _dest: &mut W) -> fmt::Result {
        match *self {}
    }
}

impl selectors::parser::PseudoElement for PseudoElement {
    type Impl = DomSelectors;

    fn accepts_state_pseudo_classes(&self) -> bool {
        false
    }

    fn valid_after_slotted(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NonTSPseudoClass {
    Link,
    Visited,
    Hover,
    Active,
    Focus,
}

impl selectors::parser::NonTSPseudoClass for NonTSPseudoClass {
    type Impl = DomSelectors;

    fn is_active_or_hover(&self) -> bool {
        matches!(self, Self::Hover | Self::Active)
    }

    fn is_user_action_state(&self) -> bool {
        matches!(self, Self::Hover | Self::Active | Self::Focus)
    }
}

impl cssparser::ToCss for NonTSPseudoClass {
    fn to_css<W: fmt::Write>(&self, dest: &mut W) -> fmt::Result {
        match self {
            Self::Link => dest.write_str(":link"),
            Self::Visited => dest.write_str(":visited"),
            Self::Hover => dest.write_str(":hover"),
            Self::Active => dest.write_str(":active"),
            Self::Focus => dest.write_str(":focus"),
        }
    }
}

impl SelectorImpl for DomSelectors {
    type ExtraMatchingData<'a> = ();
    type AttrValue = IdentStr;
    type Identifier = IdentStr;
    type LocalName = CssLocalName;
    type NamespaceUrl = CssNamespace;
    type NamespacePrefix = IdentStr;
    type BorrowedLocalName = CssLocalName;
    type BorrowedNamespaceUrl = CssNamespace;
    type NonTSPseudoClass = NonTSPseudoClass;
    type PseudoElement = PseudoElement;
}

/// A parsed, comma-separated selector list.
#[derive(Debug, Clone)]
pub struct SelectorList {
    source: String,
    selectors: Vec<Selector<DomSelectors>>,
}

impl SelectorList {
    /// Parse a selector list the way `querySelector` does.
    pub fn parse(source: &str) -> Result<Self> {
        let mut input = cssparser::ParserInput::new(source);
        let mut parser = cssparser::Parser::new(&mut input);
        let list =
            selectors::parser::SelectorList::parse(&DomSelectors, &mut parser, ParseRelative::No)
                .map_err(|_| Error::InvalidSelector(source.to_string()))?;
        Ok(Self {
            source: source.to_string(),
            selectors: list.slice().to_vec(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether the element `id` in `dom` matches any selector of the list.
    pub(crate) fn matches(&self, dom: &ArenaDom, id: NodeId) -> bool {
        if !dom.is_element(id) {
            return false;
        }
        matches_any(ElementRef::new(dom, id), &self.selectors)
    }

    /// First element below `root` (exclusive) in tree order that matches.
    pub(crate) fn query_first(&self, dom: &ArenaDom, root: NodeId) -> Option<NodeId> {
        dom.descendants(root).find(|&id| self.matches(dom, id))
    }

    /// Every element below `root` (exclusive) in tree order that matches.
    pub(crate) fn query_all(&self, dom: &ArenaDom, root: NodeId) -> Vec<NodeId> {
        dom.descendants(root)
            .filter(|&id| self.matches(dom, id))
            .collect()
    }
}

pub(crate) fn matches_any(elem: ElementRef<'_>, list: &[Selector<DomSelectors>]) -> bool {
    let mut caches = SelectorCaches::default();
    let mut context = MatchingContext::new(
        selectors::matching::MatchingMode::Normal,
        None,
        &mut caches,
        selectors::context::QuirksMode::NoQuirks,
        selectors::matching::NeedsSelectorFlags::No,
        selectors::matching::MatchingForInvalidation::No,
    );

    list.iter()
        .any(|selector| selectors::matching::matches_selector(selector, 0, None, &elem, &mut context))
}

/// Reference to an element in the arena for selector matching.
#[derive(Clone, Copy)]
pub struct ElementRef<'a> {
    pub dom: &'a ArenaDom,
    pub id: NodeId,
}

impl<'a> ElementRef<'a> {
    pub fn new(dom: &'a ArenaDom, id: NodeId) -> Self {
        Self { dom, id }
    }

    fn is_anchor_with_href(&self) -> bool {
        let is_anchor = self
            .dom
            .element_name(self.id)
            .is_some_and(|n| matches!(n.as_ref(), "a" | "area"));
        is_anchor && self.dom.get_attr(self.id, "href").is_some()
    }
}

impl fmt::Debug for ElementRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementRef")
            .field("id", &self.id)
            .field("name", &self.dom.element_name(self.id))
            .finish()
    }
}

impl selectors::Element for ElementRef<'_> {
    type Impl = DomSelectors;

    fn opaque(&self) -> OpaqueElement {
        match self.dom.get(self.id) {
            Some(node) => OpaqueElement::new(node),
            None => OpaqueElement::new(self),
        }
    }

    fn parent_element(&self) -> Option<Self> {
        self.dom
            .parent_element(self.id)
            .map(|parent| Self::new(self.dom, parent))
    }

    fn parent_node_is_shadow_root(&self) -> bool {
        false
    }

    fn containing_shadow_host(&self) -> Option<Self> {
        None
    }

    fn is_pseudo_element(&self) -> bool {
        false
    }

    fn prev_sibling_element(&self) -> Option<Self> {
        let mut current = self.dom.get(self.id)?.prev_sibling;
        while current.is_some() {
            if self.dom.is_element(current) {
                return Some(Self::new(self.dom, current));
            }
            current = self.dom.get(current)?.prev_sibling;
        }
        None
    }

    fn next_sibling_element(&self) -> Option<Self> {
        let mut current = self.dom.get(self.id)?.next_sibling;
        while current.is_some() {
            if self.dom.is_element(current) {
                return Some(Self::new(self.dom, current));
            }
            current = self.dom.get(current)?.next_sibling;
        }
        None
    }

    fn first_element_child(&self) -> Option<Self> {
        self.dom
            .element_children(self.id)
            .next()
            .map(|child| Self::new(self.dom, child))
    }

    fn is_html_element_in_html_document(&self) -> bool {
        self.dom
            .element_namespace(self.id)
            .is_some_and(|ns| *ns == html5ever::ns!(html))
    }

    fn has_local_name(&self, name: &CssLocalName) -> bool {
        self.dom.element_name(self.id).is_some_and(|n| n == &name.0)
    }

    fn has_namespace(&self, ns: &CssNamespace) -> bool {
        self.dom.element_namespace(self.id).is_some_and(|n| n == &ns.0)
    }

    fn is_same_type(&self, other: &Self) -> bool {
        self.dom.element_name(self.id) == other.dom.element_name(other.id)
            && self.dom.element_namespace(self.id) == other.dom.element_namespace(other.id)
    }

    fn attr_matches(
        &self,
        ns: &NamespaceConstraint<&CssNamespace>,
        local_name: &CssLocalName,
        operation: &AttrSelectorOperation<&IdentStr>,
    ) -> bool {
        self.dom.attrs(self.id).iter().any(|attr| {
            let ns_match = match ns {
                NamespaceConstraint::Any => true,
                NamespaceConstraint::Specific(ns) => attr.name.ns == ns.0,
            };
            ns_match && attr.name.local == local_name.0 && operation.eval_str(&attr.value)
        })
    }

    fn match_non_ts_pseudo_class(
        &self,
        pc: &NonTSPseudoClass,
        _context: &mut MatchingContext<'_, Self::Impl>,
    ) -> bool {
        match pc {
            NonTSPseudoClass::Link => self.is_anchor_with_href(),
            // No browsing history and no user interaction state.
            _ => false,
        }
    }

    fn match_pseudo_element(
        &self,
        _pe: &PseudoElement,
        _context: &mut MatchingContext<'_, Self::Impl>,
    ) -> bool {
        false
    }

    fn is_link(&self) -> bool {
        self.is_anchor_with_href()
    }

    fn is_html_slot_element(&self) -> bool {
        false
    }

    fn has_id(&self, id: &IdentStr, case_sensitivity: CaseSensitivity) -> bool {
        self.dom
            .element_id(self.id)
            .is_some_and(|elem_id| case_sensitivity.eq(elem_id.as_bytes(), id.0.as_bytes()))
    }

    fn has_class(&self, name: &IdentStr, case_sensitivity: CaseSensitivity) -> bool {
        self.dom
            .element_classes(self.id)
            .iter()
            .any(|c| case_sensitivity.eq(c.as_bytes(), name.0.as_bytes()))
    }

    fn imported_part(&self, _name: &IdentStr) -> Option<IdentStr> {
        None
    }

    fn is_part(&self, _name: &IdentStr) -> bool {
        false
    }

    fn is_empty(&self) -> bool {
        !self.dom.children(self.id).any(|child| {
            match self.dom.get(child).map(|n| &n.data) {
                Some(NodeData::Element { .. }) => true,
                Some(NodeData::Text(t)) => !t.is_empty(),
                _ => false,
            }
        })
    }

    fn is_root(&self) -> bool {
        let parent = self.dom.parent(self.id);
        self.dom
            .get(parent)
            .is_some_and(|p| matches!(p.data, NodeData::Document))
    }

    fn apply_selector_flags(&self, _flags: ElementSelectorFlags) {}

    fn add_element_unique_hashes(&self, _filter: &mut selectors::bloom::BloomFilter) -> bool {
        false
    }

    fn has_custom_state(&self, _name: &IdentStr) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::tree_sink::parse_html;

    fn find_by_tag(dom: &ArenaDom, tag: &str) -> NodeId {
        dom.descendants(dom.document())
            .find(|&id| dom.element_name(id).is_some_and(|n| n.as_ref() == tag))
            .expect("tag present")
    }

    fn matches(dom: &ArenaDom, id: NodeId, selector: &str) -> bool {
        SelectorList::parse(selector).unwrap().matches(dom, id)
    }

    #[test]
    fn test_tag_selector() {
        let dom = parse_html("<div><p>Hello</p></div>", false);
        let p = find_by_tag(&dom, "p");

        assert!(matches(&dom, p, "p"));
        assert!(!matches(&dom, p, "div"));
    }

    #[test]
    fn test_class_and_id_selectors() {
        let dom = parse_html(r#"<p id="main" class="intro highlight">Hello</p>"#, false);
        let p = find_by_tag(&dom, "p");

        assert!(matches(&dom, p, ".intro"));
        assert!(matches(&dom, p, "p.intro.highlight"));
        assert!(matches(&dom, p, "#main"));
        assert!(!matches(&dom, p, ".missing"));
        assert!(!matches(&dom, p, "#other"));
    }

    #[test]
    fn test_combinators() {
        let dom = parse_html("<div><span><p>Nested</p></span></div>", false);
        let p = find_by_tag(&dom, "p");

        assert!(matches(&dom, p, "div p"));
        assert!(matches(&dom, p, "span > p"));
        assert!(!matches(&dom, p, "div > p"));
    }

    #[test]
    fn test_attribute_and_structural_selectors() {
        let dom = parse_html(r#"<ul><li data-k="v">a</li><li>b</li></ul>"#, false);
        let ul = find_by_tag(&dom, "ul");
        let items: Vec<_> = dom.element_children(ul).collect();

        assert!(matches(&dom, items[0], "[data-k=v]"));
        assert!(matches(&dom, items[0], "li:first-child"));
        assert!(matches(&dom, items[1], "li:last-child"));
        assert!(matches(&dom, items[1], "li:not([data-k])"));
    }

    #[test]
    fn test_selector_list_query_order() {
        let dom = parse_html("<p class=a>1</p><div><p class=b>2</p></div>", false);
        let list = SelectorList::parse("p.b, p.a").unwrap();

        let all = list.query_all(&dom, dom.document());
        assert_eq!(all.len(), 2);
        assert_eq!(dom.text_content(all[0]), "1");
        assert_eq!(list.query_first(&dom, dom.document()), Some(all[0]));
    }

    #[test]
    fn test_link_and_state_pseudo_classes() {
        let dom = parse_html(r#"<a href="/x">x</a><a name="y">y</a>"#, false);
        let anchors: Vec<_> = dom
            .descendants(dom.document())
            .filter(|&id| dom.element_name(id).is_some_and(|n| n.as_ref() == "a"))
            .collect();

        assert!(matches(&dom, anchors[0], "a:link"));
        assert!(matches(&dom, anchors[0], ":any-link"));
        assert!(!matches(&dom, anchors[1], ":link"));
        assert!(!matches(&dom, anchors[0], "a:hover"));
        assert!(SelectorList::parse("a:frobnicate").is_err());
    }

    #[test]
    fn test_invalid_selector() {
        let err = SelectorList::parse("div[").unwrap_err();
        assert_eq!(err, Error::InvalidSelector("div[".to_string()));
        assert!(SelectorList::parse("").is_err());
    }
}
