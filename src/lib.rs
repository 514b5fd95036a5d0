//! # elementkit
//!
//! A chainable, null-safe wrapper around a single element of an in-memory
//! HTML document.
//!
//! ## Features
//!
//! - HTML parsing with html5ever into an arena-backed [`Document`]
//! - CSS selector queries, `matches` and `closest` via the `selectors` crate
//! - Class lists, attributes, datasets, markup and text content
//! - Synthetic events with bubbling, cancellation and delegation
//! - Mutation observers with DOM-style records
//! - Computed style lookup over user-agent, author and inline styles
//!
//! ## Quick Start
//!
//! ```
//! use std::rc::Rc;
//! use std::cell::Cell;
//!
//! use elementkit::{Document, ElementWrapper, Listener};
//!
//! let doc = Document::parse(r#"<ul id="list"><li class="item">One</li></ul>"#);
//! let list = ElementWrapper::query(&doc, "#list")?;
//!
//! let clicks = Rc::new(Cell::new(0));
//! let counter = {
//!     let clicks = clicks.clone();
//!     Listener::new(move |_| clicks.set(clicks.get() + 1))
//! };
//! list.add_event_delegate(".item", "click", &counter)?;
//!
//! let item = doc.query_selector(".item")?.unwrap();
//! ElementWrapper::new(item).set_text_content("First").trigger("click");
//!
//! // `trigger` does not bubble, so only a bubbling event reaches the delegate.
//! assert_eq!(clicks.get(), 0);
//! # Ok::<(), elementkit::Error>(())
//! ```
//!
//! ## Mutation observation
//!
//! Observer callbacks run when the embedder calls
//! [`Document::deliver_mutation_records`], the equivalent of the browser's
//! microtask checkpoint:
//!
//! ```
//! use elementkit::{Document, ElementWrapper};
//!
//! let doc = Document::parse("<div></div>");
//! let div = ElementWrapper::query(&doc, "div")?;
//! div.observe(|records, _observer| {
//!     assert_eq!(records.len(), 1);
//! })?;
//!
//! div.set_html_content("<p>hello</p>");
//! assert_eq!(doc.deliver_mutation_records(), 1);
//! # Ok::<(), elementkit::Error>(())
//! ```

pub mod config;
pub mod dom;
pub mod error;
pub mod event;
pub mod observer;
pub mod scroll;
pub mod style;
pub mod wrapper;

pub use config::DocumentConfig;
pub use dom::{
    ClassList, Document, Element, InsertPosition, Node, NodeType, QueryRoot, SelectorList,
};
pub use error::{Error, Result};
pub use event::{Event, EventHandler, EventInit, EventPhase, Listener};
pub use observer::{MutationKind, MutationObserver, MutationObserverInit, MutationRecord};
pub use scroll::{ScrollBehavior, ScrollIntoViewOptions, ScrollLogicalPosition, ScrollRequest};
pub use style::Stylesheet;
pub use wrapper::ElementWrapper;
