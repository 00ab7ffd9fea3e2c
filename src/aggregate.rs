//! Turns raw scan candidates into the reported element records, assigning
//! each element a durable id it keeps across rescans.

use serde::{Deserialize, Serialize};

use crate::fingerprint::css_path;
use crate::page::{Declaration, NodeHandle, Page};
use crate::scan::{Accumulator, ScanConfig, TokenUse};

/// Attribute written onto elements that have no usable DOM id.
pub const TOKEN_ID_ATTR: &str = "data-css-token-id";

/// Which side of the report a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Used,
    Unused,
}

/// One classified element as reported to consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementRecord {
    /// Durable element id: DOM id, or the generated token id attribute.
    pub id: String,
    #[serde(rename = "type")]
    pub kind: RecordKind,
    pub tag_name: String,
    pub class_name: String,
    pub is_visible: bool,
    /// Human-readable selector path for display.
    pub selector: String,
    pub frame_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hardcoded: Vec<Declaration>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tokens: Vec<TokenUse>,
}

/// Scan output: elements with raw hardcoded values (`unused`) and, when
/// tracking is on, elements whose declarations go through tokens (`used`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub used: Vec<ElementRecord>,
    pub unused: Vec<ElementRecord>,
}

fn id_in_use(page: &Page, id: &str) -> bool {
    (0..page.frame_count()).any(|f| page.element_by_attr(f, TOKEN_ID_ATTR, id).is_some())
}

/// Resolve an element's durable id. Priority: previously written token id
/// attribute, then the DOM id, then a freshly generated `token-{n}` which is
/// written back so the next scan sees it.
fn resolve_id(page: &mut Page, element: NodeHandle, seq: &mut u64) -> String {
    if let Some(existing) = page.attribute(element, TOKEN_ID_ATTR) {
        return existing;
    }
    if let Some(dom_id) = page.dom_id(element).filter(|v| !v.is_empty()) {
        return dom_id;
    }
    loop {
        let candidate = format!("token-{seq}");
        *seq += 1;
        if !id_in_use(page, &candidate) {
            page.set_attribute(element, TOKEN_ID_ATTR, &candidate);
            return candidate;
        }
    }
}

/// First occurrence of each property wins.
fn dedupe_by_property(decls: Vec<Declaration>) -> Vec<Declaration> {
    let mut out: Vec<Declaration> = Vec::with_capacity(decls.len());
    for decl in decls {
        if !out.iter().any(|d| d.property == decl.property) {
            out.push(decl);
        }
    }
    out
}

fn dedupe_tokens(tokens: Vec<TokenUse>) -> Vec<TokenUse> {
    let mut out: Vec<TokenUse> = Vec::with_capacity(tokens.len());
    for token in tokens {
        if !out
            .iter()
            .any(|t| t.property == token.property && t.name == token.name)
        {
            out.push(token);
        }
    }
    out
}

/// Build the report. Candidates that contributed nothing after property
/// dedup are dropped without being assigned an id.
pub(crate) fn aggregate(page: &mut Page, acc: Accumulator, config: &ScanConfig) -> ScanReport {
    let mut report = ScanReport::default();
    let mut seq = 0u64;
    for candidate in acc.into_entries() {
        let hardcoded = dedupe_by_property(candidate.hardcoded);
        let tokens = dedupe_tokens(candidate.tokens);
        if hardcoded.is_empty() && tokens.is_empty() {
            continue;
        }
        let id = resolve_id(page, candidate.element, &mut seq);
        let tag_name = page.tag_name(candidate.element);
        let class_name = page.class_name(candidate.element);
        let is_visible = page.is_visible(candidate.element);
        let selector = css_path(page, candidate.element);
        if !hardcoded.is_empty() {
            report.unused.push(ElementRecord {
                id: id.clone(),
                kind: RecordKind::Unused,
                tag_name: tag_name.clone(),
                class_name: class_name.clone(),
                is_visible,
                selector: selector.clone(),
                frame_id: candidate.frame_id.clone(),
                hardcoded,
                tokens: Vec::new(),
            });
        }
        if config.track_token_usage && !tokens.is_empty() {
            report.used.push(ElementRecord {
                id,
                kind: RecordKind::Used,
                tag_name,
                class_name,
                is_visible,
                selector,
                frame_id: candidate.frame_id,
                hardcoded: Vec::new(),
                tokens,
            });
        }
    }
    report
}
