//! Frame scanner: walks every reachable frame, indexes its stylesheets and
//! matches the index against the live document in batched selector queries.

mod index;
mod pacing;

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::aggregate::{self, ScanReport};
use crate::catalog;
use crate::fingerprint::element_fingerprint;
use crate::page::{frame_visits, parse_selector, Declaration, FrameVisit, NodeHandle, Page};

use index::SelectorDecls;
use pacing::Pacer;

/// A custom-property reference found on a matched rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUse {
    pub property: String,
    pub name: String,
    pub value: String,
}

/// Scanner tuning knobs.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Hard ceiling on classified elements per scan, across all frames.
    pub result_cap: usize,
    /// Selectors combined into one query.
    pub batch_size: usize,
    /// Longest stretch of work between cooperative yields.
    pub yield_slice: Duration,
    /// Also track declarations that resolve through custom properties and
    /// emit them on the `used` side of the report.
    pub track_token_usage: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            result_cap: 2000,
            batch_size: 50,
            yield_slice: Duration::from_millis(30),
            track_token_usage: false,
        }
    }
}

/// One matched element plus everything its selectors contributed.
#[derive(Debug)]
pub(crate) struct Candidate {
    pub element: NodeHandle,
    pub frame_id: String,
    pub hardcoded: Vec<Declaration>,
    pub tokens: Vec<TokenUse>,
}

/// Insertion-ordered, cross-frame accumulator of candidates.
#[derive(Debug, Default)]
pub(crate) struct Accumulator {
    entries: Vec<Candidate>,
    by_element: HashMap<NodeHandle, usize>,
    fingerprints: HashSet<String>,
}

impl Accumulator {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn seen(&self, fingerprint: &str) -> bool {
        self.fingerprints.contains(fingerprint)
    }

    pub fn mark(&mut self, fingerprint: String) {
        self.fingerprints.insert(fingerprint);
    }

    /// Attribute a selector's declarations to an element, creating the
    /// candidate on first contact. New candidates are refused at the cap.
    pub fn attribute(
        &mut self,
        element: NodeHandle,
        frame_id: &str,
        decls: &SelectorDecls,
        cap: usize,
    ) {
        let slot = match self.by_element.get(&element) {
            Some(&i) => i,
            None => {
                if self.entries.len() >= cap {
                    return;
                }
                self.entries.push(Candidate {
                    element,
                    frame_id: frame_id.to_string(),
                    hardcoded: Vec::new(),
                    tokens: Vec::new(),
                });
                self.by_element.insert(element, self.entries.len() - 1);
                self.entries.len() - 1
            }
        };
        self.entries[slot].hardcoded.extend(decls.hardcoded.iter().cloned());
        self.entries[slot].tokens.extend(decls.tokens.iter().cloned());
    }

    pub fn into_entries(self) -> Vec<Candidate> {
        self.entries
    }
}

/// The page scanner. One call to [`Scanner::scan`] is one logical scan.
pub struct Scanner {
    config: ScanConfig,
}

impl Scanner {
    pub fn new(config: ScanConfig) -> Self {
        Self { config }
    }

    /// Scan every reachable, visible frame depth-first and aggregate the
    /// classification report. Never fails: inaccessible frames, restricted
    /// sheets and invalid selectors each contribute nothing.
    pub async fn scan(&self, page: &mut Page) -> ScanReport {
        let mut acc = Accumulator::default();
        let mut pacer = Pacer::new(self.config.yield_slice);
        for visit in frame_visits(page, true) {
            if acc.len() >= self.config.result_cap {
                break;
            }
            self.scan_frame(page, &visit, &mut acc, &mut pacer).await;
        }
        info!(
            candidates = acc.len(),
            yields = pacer.yield_count(),
            "scan complete"
        );
        aggregate::aggregate(page, acc, &self.config)
    }

    async fn scan_frame(
        &self,
        page: &Page,
        visit: &FrameVisit,
        acc: &mut Accumulator,
        pacer: &mut Pacer,
    ) {
        let rule_index = index::build(page, visit.frame, &self.config, pacer).await;
        debug!(
            frame = %visit.frame_id,
            selectors = rule_index.order.len(),
            "rule index built"
        );
        if rule_index.is_empty() {
            return;
        }

        for chunk in rule_index.order.chunks(self.config.batch_size) {
            if acc.len() >= self.config.result_cap {
                debug!(frame = %visit.frame_id, "result cap reached");
                break;
            }
            let combined = chunk.join(", ");
            match parse_selector(&combined) {
                Ok(combined_sel) => {
                    let refinements: Vec<_> = chunk
                        .iter()
                        .map(|s| parse_selector(s).ok().map(|sel| (s.as_str(), sel)))
                        .collect();
                    for (n, element) in page.query(visit.frame, &combined_sel).into_iter().enumerate()
                    {
                        if acc.len() >= self.config.result_cap {
                            break;
                        }
                        let fp = element_fingerprint(page, element, &visit.frame_id);
                        if acc.seen(&fp) {
                            continue;
                        }
                        if catalog::is_excluded_tag(&page.tag_name(element)) {
                            continue;
                        }
                        acc.mark(fp);
                        for refinement in refinements.iter().flatten() {
                            let (selector, sel) = refinement;
                            if page.matches(element, sel) {
                                if let Some(decls) = rule_index.decls.get(*selector) {
                                    acc.attribute(
                                        element,
                                        &visit.frame_id,
                                        decls,
                                        self.config.result_cap,
                                    );
                                }
                            }
                        }
                        if n % 100 == 0 {
                            pacer.maybe().await;
                        }
                    }
                }
                Err(_) => {
                    // One bad selector poisons the whole combined query;
                    // retry the batch one selector at a time.
                    debug!(
                        frame = %visit.frame_id,
                        "combined selector rejected, falling back to per-selector queries"
                    );
                    for selector in chunk {
                        let Ok(sel) = parse_selector(selector) else {
                            continue;
                        };
                        let Some(decls) = rule_index.decls.get(selector) else {
                            continue;
                        };
                        for (n, element) in page.query(visit.frame, &sel).into_iter().enumerate() {
                            if acc.len() >= self.config.result_cap {
                                break;
                            }
                            let fp = element_fingerprint(page, element, &visit.frame_id);
                            if acc.seen(&fp) {
                                continue;
                            }
                            if catalog::is_excluded_tag(&page.tag_name(element)) {
                                continue;
                            }
                            acc.mark(fp);
                            acc.attribute(element, &visit.frame_id, decls, self.config.result_cap);
                            if n % 100 == 0 {
                                pacer.maybe().await;
                            }
                        }
                    }
                }
            }
            pacer.force().await;
        }
    }
}
