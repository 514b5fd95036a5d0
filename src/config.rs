//! Document construction options.

/// Options applied when a [`Document`](crate::Document) is created.
///
/// ```
/// use elementkit::{Document, DocumentConfig};
///
/// let config = DocumentConfig::new().with_user_agent_styles(false);
/// let doc = Document::parse_with("<p>hi</p>", &config);
/// let p = doc.query_selector("p").unwrap().unwrap();
///
/// // Without the user-agent sheet, a paragraph keeps the initial `display`.
/// assert_eq!(p.computed_style("display"), "inline");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentConfig {
    /// Apply the built-in user-agent stylesheet during style resolution.
    pub user_agent_styles: bool,
    /// Keep `<!DOCTYPE>` nodes produced by the parser.
    pub keep_doctype: bool,
}

impl DocumentConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user_agent_styles(mut self, enabled: bool) -> Self {
        self.user_agent_styles = enabled;
        self
    }

    pub fn with_doctype(mut self, keep: bool) -> Self {
        self.keep_doctype = keep;
        self
    }
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            user_agent_styles: true,
            keep_doctype: true,
        }
    }
}
