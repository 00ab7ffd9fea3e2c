//! # tokenlens
//!
//! Design-token adoption scanner for page snapshots. Walks a frame tree,
//! classifies styled elements into those carrying raw hardcoded values and
//! those resolving through CSS custom properties, and can locate, highlight
//! and measure any reported element afterwards.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tokenlens::{Page, ScanConfig, Scanner, StyleRule, Stylesheet};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let mut builder = Page::builder(r#"<div class="card">hello</div>"#);
//! builder.stylesheet(
//!     0,
//!     Stylesheet::new(vec![StyleRule::style(".card", &[("color", "#333")])]),
//! );
//! let mut page = builder.finish();
//! let report = Scanner::new(ScanConfig::default()).scan(&mut page).await;
//! println!("elements with hardcoded values: {}", report.unused.len());
//! # }
//! ```

mod aggregate;
mod catalog;
mod fingerprint;
mod locate;
mod page;
mod protocol;
mod scan;
mod watch;

pub use aggregate::{ElementRecord, RecordKind, ScanReport, TOKEN_ID_ATTR};
pub use catalog::{
    classify_value, group_of, is_excluded_tag, is_target_property, is_trivial, trivial_reason, PropertyGroup,
    TrivialReason, ValueKind, EXCLUDED_TAGS, TARGET_PROPERTIES,
};
pub use fingerprint::{css_path, element_fingerprint};
pub use locate::{
    AncestorEntry, ElementRect, HighlightOutcome, Locator, HIGHLIGHT_DURATION,
};
pub use page::{
    Declaration, FrameMetrics, NodeHandle, Page, PageBuilder, Rect, RuleKind, ScrollBehavior,
    StyleRule, Stylesheet, ROOT_FRAME_ID,
};
pub use protocol::{Notification, Request, Response, Service};
pub use scan::{ScanConfig, Scanner, TokenUse};
pub use watch::{MutationKind, MutationRecord, MutationWatcher, DEBOUNCE};

/// Result type for tokenlens operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or querying a page snapshot.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid selector: {0}")]
    Selector(String),

    #[error("snapshot error: {0}")]
    Snapshot(String),
}
