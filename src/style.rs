//! Stylesheet parsing and computed-value resolution.
//!
//! There is no layout engine behind the document, so "computed" here means
//! the cascaded, inherited or initial value of a property as authored:
//! lengths and colours are not normalised.

use std::cmp::Ordering;

use cssparser::{
    AtRuleParser, DeclarationParser, ParseError, Parser, ParserInput, QualifiedRuleParser,
    RuleBodyItemParser, RuleBodyParser, StyleSheetParser,
};
use selectors::parser::Selector;

use crate::dom::arena::{ArenaDom, NodeId};
use crate::dom::element_ref::{DomSelectors, ElementRef, matches_any};

/// A parsed CSS stylesheet.
#[derive(Debug, Default, Clone)]
pub struct Stylesheet {
    pub rules: Vec<CssRule>,
}

/// A style rule with its selectors and declarations.
#[derive(Debug, Clone)]
pub struct CssRule {
    pub(crate) selectors: Vec<Selector<DomSelectors>>,
    pub declarations: Vec<Declaration>,
}

/// A declaration with its authored value text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub property: String,
    pub value: String,
    pub important: bool,
}

/// CSS specificity for cascade ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Specificity {
    pub ids: u16,
    pub classes: u16,
    pub elements: u16,
}

impl Specificity {
    pub(crate) fn from_selector(selector: &Selector<DomSelectors>) -> Self {
        let spec = selector.specificity();
        // selectors packs specificity as (id << 20) | (class << 10) | elements
        Self {
            ids: ((spec >> 20) & 0x3FF) as u16,
            classes: ((spec >> 10) & 0x3FF) as u16,
            elements: (spec & 0x3FF) as u16,
        }
    }

    const INLINE: Specificity = Specificity {
        ids: u16::MAX,
        classes: u16::MAX,
        elements: u16::MAX,
    };
}

impl Ord for Specificity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.ids
            .cmp(&other.ids)
            .then(self.classes.cmp(&other.classes))
            .then(self.elements.cmp(&other.elements))
    }
}

impl PartialOrd for Specificity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Where a declaration came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Origin {
    UserAgent,
    Author,
    Inline,
}

impl Origin {
    /// Rank in the cascade; important declarations reverse origin order.
    fn precedence(self, important: bool) -> u8 {
        match (important, self) {
            (false, Origin::UserAgent) => 0,
            (false, Origin::Author) => 1,
            (false, Origin::Inline) => 2,
            (true, Origin::Author) => 3,
            (true, Origin::Inline) => 4,
            (true, Origin::UserAgent) => 5,
        }
    }
}

impl Stylesheet {
    /// Parse a stylesheet, skipping anything invalid the way browsers do.
    pub fn parse(css: &str) -> Self {
        let mut input = ParserInput::new(css);
        let mut parser = Parser::new(&mut input);
        let mut rules = Vec::new();

        let mut rule_parser = TopLevelRuleParser { rules: &mut rules };
        for result in StyleSheetParser::new(&mut parser, &mut rule_parser) {
            if let Err((error, source)) = result {
                tracing::trace!(?error.kind, source, "skipping invalid css rule");
            }
        }

        Self { rules }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Parse the contents of a `style` attribute.
pub fn parse_declaration_block(css: &str) -> Vec<Declaration> {
    let mut input = ParserInput::new(css);
    let mut parser = Parser::new(&mut input);
    let mut declarations = Vec::new();
    let mut decl_parser = DeclarationListParser {
        declarations: &mut declarations,
    };
    for result in RuleBodyParser::new(&mut parser, &mut decl_parser) {
        // Invalid declarations are dropped.
        let _ = result;
    }
    declarations
}

struct TopLevelRuleParser<'a> {
    rules: &'a mut Vec<CssRule>,
}

impl<'i> AtRuleParser<'i> for TopLevelRuleParser<'_> {
    type Prelude = ();
    type AtRule = ();
    type Error = ();

    fn parse_prelude<'t>(
        &mut self,
        _name: cssparser::CowRcStr<'i>,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::Prelude, ParseError<'i, Self::Error>> {
        // At-rules (@media, @font-face, ...) are not evaluated.
        Err(input.new_custom_error(()))
    }

    fn parse_block<'t>(
        &mut self,
        _prelude: Self::Prelude,
        _start: &cssparser::ParserState,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::AtRule, ParseError<'i, Self::Error>> {
        Err(input.new_custom_error(()))
    }
}

impl<'i> QualifiedRuleParser<'i> for TopLevelRuleParser<'_> {
    type Prelude = Vec<Selector<DomSelectors>>;
    type QualifiedRule = ();
    type Error = ();

    fn parse_prelude<'t>(
        &mut self,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::Prelude, ParseError<'i, Self::Error>> {
        parse_selector_list(input)
    }

    fn parse_block<'t>(
        &mut self,
        prelude: Self::Prelude,
        _start: &cssparser::ParserState,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::QualifiedRule, ParseError<'i, Self::Error>> {
        let mut declarations = Vec::new();
        let mut decl_parser = DeclarationListParser {
            declarations: &mut declarations,
        };
        for result in RuleBodyParser::new(input, &mut decl_parser) {
            let _ = result;
        }

        self.rules.push(CssRule {
            selectors: prelude,
            declarations,
        });
        Ok(())
    }
}

fn parse_selector_list<'i>(
    parser: &mut Parser<'i, '_>,
) -> Result<Vec<Selector<DomSelectors>>, ParseError<'i, ()>> {
    let location = parser.current_source_location();
    let list = selectors::parser::SelectorList::parse(
        &DomSelectors,
        parser,
        selectors::parser::ParseRelative::No,
    )
    .map_err(|_| location.new_custom_error(()))?;

    Ok(list.slice().to_vec())
}

struct DeclarationListParser<'a> {
    declarations: &'a mut Vec<Declaration>,
}

impl<'i> AtRuleParser<'i> for DeclarationListParser<'_> {
    type Prelude = ();
    type AtRule = ();
    type Error = ();
}

impl<'i> QualifiedRuleParser<'i> for DeclarationListParser<'_> {
    type Prelude = ();
    type QualifiedRule = ();
    type Error = ();
}

impl<'i> DeclarationParser<'i> for DeclarationListParser<'_> {
    type Declaration = ();
    type Error = ();

    fn parse_value<'t>(
        &mut self,
        name: cssparser::CowRcStr<'i>,
        input: &mut Parser<'i, 't>,
        _start: &cssparser::ParserState,
    ) -> Result<Self::Declaration, ParseError<'i, Self::Error>> {
        let start = input.position();
        while input.next().is_ok() {}
        let (value, important) = split_important(input.slice_from(start));
        if value.is_empty() {
            return Err(input.new_custom_error(()));
        }

        self.declarations.push(Declaration {
            property: normalize_property(&name),
            value: value.to_string(),
            important,
        });
        Ok(())
    }
}

impl<'i> RuleBodyItemParser<'i, (), ()> for DeclarationListParser<'_> {
    fn parse_declarations(&self) -> bool {
        true
    }

    fn parse_qualified(&self) -> bool {
        false
    }
}

/// Split a trailing `!important` off a raw declaration value.
fn split_important(raw: &str) -> (&str, bool) {
    let trimmed = raw.trim();
    if let Some(bang) = trimmed.rfind('!') {
        let flag = trimmed[bang + 1..].trim();
        if flag.eq_ignore_ascii_case("important") {
            return (trimmed[..bang].trim_end(), true);
        }
    }
    (trimmed, false)
}

/// Property names are case-insensitive, custom properties are not.
pub(crate) fn normalize_property(name: &str) -> String {
    let name = name.trim();
    if name.starts_with("--") {
        name.to_string()
    } else {
        name.to_ascii_lowercase()
    }
}

/// Whether a property inherits and its initial value.
fn property_info(property: &str) -> Option<(bool, &'static str)> {
    if property.starts_with("--") {
        return Some((true, ""));
    }
    let info = match property {
        "color" => (true, "canvastext"),
        "cursor" => (true, "auto"),
        "direction" => (true, "ltr"),
        "font-family" => (true, ""),
        "font-size" => (true, "medium"),
        "font-style" => (true, "normal"),
        "font-variant" => (true, "normal"),
        "font-weight" => (true, "normal"),
        "letter-spacing" => (true, "normal"),
        "line-height" => (true, "normal"),
        "list-style-type" => (true, "disc"),
        "text-align" => (true, "start"),
        "text-indent" => (true, "0px"),
        "text-transform" => (true, "none"),
        "visibility" => (true, "visible"),
        "white-space" => (true, "normal"),
        "word-spacing" => (true, "normal"),
        "background-color" => (false, "transparent"),
        "border-style" => (false, "none"),
        "bottom" | "left" | "right" | "top" => (false, "auto"),
        "display" => (false, "inline"),
        "float" => (false, "none"),
        "height" | "width" => (false, "auto"),
        "margin" | "margin-bottom" | "margin-left" | "margin-right" | "margin-top" => {
            (false, "0px")
        }
        "opacity" => (false, "1"),
        "overflow" => (false, "visible"),
        "padding" | "padding-bottom" | "padding-left" | "padding-right" | "padding-top" => {
            (false, "0px")
        }
        "position" => (false, "static"),
        "text-decoration" | "text-decoration-line" => (false, "none"),
        "vertical-align" => (false, "baseline"),
        "z-index" => (false, "auto"),
        _ => return None,
    };
    Some(info)
}

/// Built-in defaults applied before author styles.
pub fn user_agent_stylesheet() -> Stylesheet {
    Stylesheet::parse(
        r#"
        html, body, div, section, article, aside, nav, header, footer, main,
        address, blockquote, figure, figcaption, details, summary, form,
        fieldset, hr, pre, dl, dt, dd, ol, ul, p, h1, h2, h3, h4, h5, h6 {
            display: block;
        }
        head, script, style, template, title, meta, link, [hidden] {
            display: none;
        }
        li { display: list-item; }
        table { display: table; }
        tr { display: table-row; }
        td, th { display: table-cell; }
        h1, h2, h3, h4, h5, h6, b, strong, th { font-weight: bold; }
        i, em, cite, var { font-style: italic; }
        h1 { font-size: 2em; }
        h2 { font-size: 1.5em; }
        h3 { font-size: 1.17em; }
        ol { list-style-type: decimal; }
        u, ins { text-decoration: underline; }
        s, del, strike { text-decoration: line-through; }
        sub { vertical-align: sub; }
        sup { vertical-align: super; }
        pre { white-space: pre; }
        "#,
    )
}

/// The sheets that apply to one document, in cascade order.
pub(crate) struct StyleContext<'a> {
    pub dom: &'a ArenaDom,
    pub user_agent: Option<&'a Stylesheet>,
    pub author: &'a [Stylesheet],
}

struct Candidate<'a> {
    value: &'a str,
    precedence: u8,
    specificity: Specificity,
    order: usize,
}

impl Candidate<'_> {
    fn cmp_cascade(&self, other: &Self) -> Ordering {
        self.precedence
            .cmp(&other.precedence)
            .then(self.specificity.cmp(&other.specificity))
            .then(self.order.cmp(&other.order))
    }
}

/// Keep `candidate` if it wins over the current best. Later ties win.
fn consider<'a>(best: &mut Option<Candidate<'a>>, candidate: Candidate<'a>) {
    let better = best
        .as_ref()
        .is_none_or(|b| candidate.cmp_cascade(b) != Ordering::Less);
    if better {
        *best = Some(candidate);
    }
}

impl StyleContext<'_> {
    /// Resolved value of `property` on element `id`.
    pub fn resolve(&self, id: NodeId, property: &str) -> String {
        let property = normalize_property(property);
        let Some((inherited, initial)) = property_info(&property) else {
            return String::new();
        };

        let inherit = || match self.dom.parent_element(id) {
            Some(parent) => self.resolve(parent, &property),
            None => initial.to_string(),
        };

        match self.cascaded(id, &property) {
            Some(value) => match value.to_ascii_lowercase().as_str() {
                "inherit" => inherit(),
                "initial" => initial.to_string(),
                "unset" if inherited => inherit(),
                "unset" => initial.to_string(),
                _ => value,
            },
            None if inherited => inherit(),
            None => initial.to_string(),
        }
    }

    /// The winning declared value for `property`, if any declaration applies.
    fn cascaded(&self, id: NodeId, property: &str) -> Option<String> {
        let elem = ElementRef::new(self.dom, id);
        let mut best: Option<Candidate<'_>> = None;
        let mut order = 0;

        let sheets = self
            .user_agent
            .map(|ua| (ua, Origin::UserAgent))
            .into_iter()
            .chain(self.author.iter().map(|sheet| (sheet, Origin::Author)));

        for (sheet, origin) in sheets {
            for rule in &sheet.rules {
                let specificity = rule
                    .selectors
                    .iter()
                    .filter(|s| matches_any(elem, std::slice::from_ref(*s)))
                    .map(Specificity::from_selector)
                    .max();
                let Some(specificity) = specificity else {
                    continue;
                };
                for decl in rule.declarations.iter().filter(|d| d.property == property) {
                    order += 1;
                    consider(&mut best, Candidate {
                        value: &decl.value,
                        precedence: origin.precedence(decl.important),
                        specificity,
                        order,
                    });
                }
            }
        }

        let inline = self
            .dom
            .get_attr(id, "style")
            .map(parse_declaration_block)
            .unwrap_or_default();
        for decl in inline.iter().filter(|d| d.property == property) {
            order += 1;
            consider(&mut best, Candidate {
                value: &decl.value,
                precedence: Origin::Inline.precedence(decl.important),
                specificity: Specificity::INLINE,
                order,
            });
        }

        best.map(|b| b.value.to_string())
    }
}
