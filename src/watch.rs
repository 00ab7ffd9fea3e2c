//! Mutation watcher: debounces DOM changes that affect iframes so consumers
//! can re-scan once the page settles instead of on every mutation.

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::page::{NodeHandle, Page};

/// Default settle window after the last relevant mutation.
pub const DEBOUNCE: Duration = Duration::from_millis(1000);

/// What changed on a target node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationKind {
    /// An attribute changed. Only `style` and `class` are of interest.
    Attribute { name: String },
    /// Children were added or removed.
    ChildList,
}

/// One observed DOM mutation.
#[derive(Debug, Clone)]
pub struct MutationRecord {
    pub target: NodeHandle,
    pub kind: MutationKind,
}

impl MutationRecord {
    pub fn attribute(target: NodeHandle, name: impl Into<String>) -> Self {
        Self {
            target,
            kind: MutationKind::Attribute { name: name.into() },
        }
    }

    pub fn child_list(target: NodeHandle) -> Self {
        Self {
            target,
            kind: MutationKind::ChildList,
        }
    }
}

/// Debounced iframe-change detector. Every relevant mutation pushes the
/// deadline out by the full debounce window; [`MutationWatcher::poll`] fires
/// once when the window elapses with no further mutations.
#[derive(Debug)]
pub struct MutationWatcher {
    debounce: Duration,
    deadline: Option<Instant>,
}

impl Default for MutationWatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl MutationWatcher {
    pub fn new() -> Self {
        Self::with_debounce(DEBOUNCE)
    }

    pub fn with_debounce(debounce: Duration) -> Self {
        Self {
            debounce,
            deadline: None,
        }
    }

    fn relevant(page: &Page, record: &MutationRecord) -> bool {
        match &record.kind {
            MutationKind::Attribute { name } => {
                if name != "style" && name != "class" {
                    return false;
                }
            }
            MutationKind::ChildList => {}
        }
        page.tag_name(record.target) == "iframe" || page.contains_tag(record.target, "iframe")
    }

    /// Feed a batch of mutations. Returns whether any of them touched an
    /// iframe and thus armed (or re-armed) the debounce timer.
    pub fn observe(&mut self, page: &Page, records: &[MutationRecord]) -> bool {
        let hit = records.iter().any(|r| Self::relevant(page, r));
        if hit {
            self.deadline = Some(Instant::now() + self.debounce);
            debug!("iframe mutation observed, debounce restarted");
        }
        hit
    }

    /// Fire-once check: true exactly when the settle window has elapsed.
    pub fn poll(&mut self) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= Instant::now() => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    /// Pending deadline, for callers driving a timer.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}
