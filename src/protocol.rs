//! Message-level surface: the typed requests a host UI sends, the responses
//! it gets back, and the service that dispatches them over one page.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::aggregate::ScanReport;
use crate::locate::{AncestorEntry, ElementRect, HighlightOutcome, Locator};
use crate::page::Page;
use crate::scan::{ScanConfig, Scanner};
use crate::watch::{MutationRecord, MutationWatcher};

/// Requests, tagged the way they travel on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    #[serde(rename = "SCAN_TOKENS")]
    ScanTokens,
    #[serde(rename = "HIGHLIGHT_ELEMENT", rename_all = "camelCase")]
    HighlightElement { id: String, is_unused: bool },
    #[serde(rename = "GET_ELEMENT_ANCESTORS")]
    GetElementAncestors { id: String },
    #[serde(rename = "GET_ELEMENT_RECT")]
    GetElementRect { id: String },
}

/// Response payloads. Untagged: each request knows the shape it expects.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    Scan(ScanReport),
    Highlight(HighlightOutcome),
    Ancestors { ancestors: Option<Vec<AncestorEntry>> },
    Rect { rect: Option<ElementRect> },
}

/// Unsolicited events pushed to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Notification {
    #[serde(rename = "IFRAME_CHANGED")]
    IframeChanged,
}

/// Owns a page plus the scanner, locator and watcher state that operate on
/// it, and dispatches wire requests to them.
pub struct Service {
    page: Page,
    config: ScanConfig,
    locator: Locator,
    watcher: MutationWatcher,
}

impl Service {
    pub fn new(page: Page) -> Self {
        Self::with_config(page, ScanConfig::default())
    }

    pub fn with_config(page: Page, config: ScanConfig) -> Self {
        Self {
            page,
            config,
            locator: Locator::new(),
            watcher: MutationWatcher::new(),
        }
    }

    /// Dispatch one request.
    pub async fn handle(&mut self, request: Request) -> Response {
        match request {
            Request::ScanTokens => {
                info!("scan requested");
                let report = Scanner::new(self.config.clone()).scan(&mut self.page).await;
                Response::Scan(report)
            }
            Request::HighlightElement { id, is_unused } => {
                Response::Highlight(self.locator.highlight(&mut self.page, &id, is_unused))
            }
            Request::GetElementAncestors { id } => Response::Ancestors {
                ancestors: self.locator.ancestors(&self.page, &id),
            },
            Request::GetElementRect { id } => Response::Rect {
                rect: self.locator.rect(&mut self.page, &id).await,
            },
        }
    }

    /// Feed observed DOM mutations into the watcher.
    pub fn record_mutations(&mut self, records: &[MutationRecord]) -> bool {
        self.watcher.observe(&self.page, records)
    }

    /// Take the pending notification, if the watcher's settle window passed.
    pub fn poll_notification(&mut self) -> Option<Notification> {
        self.watcher.poll().then_some(Notification::IframeChanged)
    }

    /// Revert expired highlights.
    pub fn sweep_highlights(&mut self) {
        self.locator.sweep(&mut self.page)
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn page_mut(&mut self) -> &mut Page {
        &mut self.page
    }
}
