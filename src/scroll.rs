//! Scroll-into-view options.
//!
//! The in-memory document has no viewport, so a scroll request is recorded
//! on the document for the embedder to act on (see
//! [`Document::take_scroll_requests`](crate::Document::take_scroll_requests)).

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::dom::Element;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ScrollBehavior {
    #[default]
    Auto,
    Instant,
    Smooth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ScrollLogicalPosition {
    Start,
    Center,
    End,
    Nearest,
}

/// Mirrors the DOM's `ScrollIntoViewOptions` dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ScrollIntoViewOptions {
    pub behavior: ScrollBehavior,
    pub block: ScrollLogicalPosition,
    pub inline: ScrollLogicalPosition,
}

impl Default for ScrollIntoViewOptions {
    fn default() -> Self {
        Self {
            behavior: ScrollBehavior::Auto,
            block: ScrollLogicalPosition::Start,
            inline: ScrollLogicalPosition::Nearest,
        }
    }
}

impl ScrollIntoViewOptions {
    pub fn smooth(mut self) -> Self {
        self.behavior = ScrollBehavior::Smooth;
        self
    }

    pub fn with_block(mut self, block: ScrollLogicalPosition) -> Self {
        self.block = block;
        self
    }

    pub fn with_inline(mut self, inline: ScrollLogicalPosition) -> Self {
        self.inline = inline;
        self
    }
}

/// The legacy `alignToTop` argument: `true` aligns to the start of the block
/// axis, `false` to its end.
impl From<bool> for ScrollIntoViewOptions {
    fn from(align_to_top: bool) -> Self {
        let block = if align_to_top {
            ScrollLogicalPosition::Start
        } else {
            ScrollLogicalPosition::End
        };
        Self::default().with_block(block)
    }
}

/// A recorded call to `scroll_into_view`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrollRequest {
    pub target: Element,
    pub options: ScrollIntoViewOptions,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_dom() {
        let options = ScrollIntoViewOptions::default();
        assert_eq!(options.behavior, ScrollBehavior::Auto);
        assert_eq!(options.block, ScrollLogicalPosition::Start);
        assert_eq!(options.inline, ScrollLogicalPosition::Nearest);
    }

    #[test]
    fn test_align_to_top() {
        assert_eq!(
            ScrollIntoViewOptions::from(false).block,
            ScrollLogicalPosition::End
        );
        assert_eq!(
            ScrollIntoViewOptions::from(true),
            ScrollIntoViewOptions::default()
        );
    }
}
