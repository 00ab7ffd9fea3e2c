//! Element locator: finds scan-reported elements again by id, applies and
//! reverts the visual highlight, and answers ancestry/geometry queries.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::debug;

use crate::aggregate::TOKEN_ID_ATTR;
use crate::page::{frame_visits, FrameVisit, NodeHandle, Page, ScrollBehavior};

/// How long a highlight stays on before it is reverted.
pub const HIGHLIGHT_DURATION: Duration = Duration::from_millis(2000);

/// Settle delay before geometry is read, so a smooth scroll kicked off by a
/// preceding highlight has finished.
const RECT_SETTLE: Duration = Duration::from_millis(100);

const UNUSED_COLOR: &str = "#ff5555";
const USED_COLOR: &str = "#ffff00";
const HIGHLIGHT_Z_INDEX: &str = "2147483647";

/// Result of a highlight request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightOutcome {
    pub found: bool,
    pub visible: bool,
}

/// One entry of an ancestor chain, element itself first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AncestorEntry {
    pub tag_name: String,
    pub class_name: String,
}

/// Element geometry in root-document viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub dpr: f64,
}

/// Inline styles an element carried before the highlight touched them.
#[derive(Debug, Clone, Default)]
struct OriginalStyle {
    outline: Option<String>,
    outline_offset: Option<String>,
    box_shadow: Option<String>,
    z_index: Option<String>,
}

#[derive(Debug)]
struct HighlightEntry {
    element: NodeHandle,
    original: OriginalStyle,
    revert_at: Instant,
}

/// Finds elements by durable id across frames and manages their highlights.
/// The highlight ledger is keyed by id so a repeat request on the same
/// element refreshes the timer without losing the first-captured originals.
#[derive(Debug, Default)]
pub struct Locator {
    highlights: HashMap<String, HighlightEntry>,
}

/// Locate an element by durable id: DOM id first, then the token attribute,
/// across every reachable frame regardless of host visibility.
fn find_element(page: &Page, id: &str) -> Option<(NodeHandle, FrameVisit)> {
    for visit in frame_visits(page, false) {
        if let Some(el) = page
            .element_by_dom_id(visit.frame, id)
            .or_else(|| page.element_by_attr(visit.frame, TOKEN_ID_ATTR, id))
        {
            return Some((el, visit));
        }
    }
    None
}

impl Locator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Highlight an element. Expired highlights are reverted first so their
    /// styles never leak into the originals captured here.
    pub fn highlight(&mut self, page: &mut Page, id: &str, unused: bool) -> HighlightOutcome {
        self.sweep(page);
        let Some((element, visit)) = find_element(page, id) else {
            debug!(id, "highlight target not found");
            return HighlightOutcome {
                found: false,
                visible: false,
            };
        };
        if !page.is_visible(element) {
            return HighlightOutcome {
                found: true,
                visible: false,
            };
        }
        page.scroll_into_view(element, ScrollBehavior::Smooth);

        let original = match self.highlights.remove(id) {
            Some(prev) => prev.original,
            None => OriginalStyle {
                outline: page.inline_style(element, "outline"),
                outline_offset: page.inline_style(element, "outline-offset"),
                box_shadow: page.inline_style(element, "box-shadow"),
                z_index: page.inline_style(element, "z-index"),
            },
        };

        let color = if unused { UNUSED_COLOR } else { USED_COLOR };
        page.set_inline_style(element, "outline", Some(&format!("4px solid {color}")));
        page.set_inline_style(element, "outline-offset", Some("2px"));
        page.set_inline_style(
            element,
            "box-shadow",
            Some(&format!("0 0 20px {color}, 0 0 40px {color}")),
        );
        page.set_inline_style(element, "z-index", Some(HIGHLIGHT_Z_INDEX));

        debug!(id, frame = %visit.frame_id, "highlight applied");
        self.highlights.insert(
            id.to_string(),
            HighlightEntry {
                element,
                original,
                revert_at: Instant::now() + HIGHLIGHT_DURATION,
            },
        );
        HighlightOutcome {
            found: true,
            visible: true,
        }
    }

    /// Revert every highlight whose timer has run out.
    pub fn sweep(&mut self, page: &mut Page) {
        let now = Instant::now();
        let expired: Vec<String> = self
            .highlights
            .iter()
            .filter(|(_, e)| e.revert_at <= now)
            .map(|(id, _)| id.clone())
            .collect();
        for id in expired {
            if let Some(entry) = self.highlights.remove(&id) {
                restore(page, entry.element, &entry.original);
                debug!(id, "highlight reverted");
            }
        }
    }

    /// Earliest pending revert deadline, for callers driving a timer.
    pub fn next_revert_at(&self) -> Option<Instant> {
        self.highlights.values().map(|e| e.revert_at).min()
    }

    /// Ancestor chain of an element, the element itself first, ending at the
    /// document root of its own frame.
    pub fn ancestors(&self, page: &Page, id: &str) -> Option<Vec<AncestorEntry>> {
        let (element, _) = find_element(page, id)?;
        let mut chain = Vec::new();
        let mut current = Some(element);
        while let Some(handle) = current {
            chain.push(AncestorEntry {
                tag_name: page.tag_name(handle),
                class_name: page.class_name(handle),
            });
            current = page.parent(handle);
        }
        Some(chain)
    }

    /// Viewport geometry of an element, translated into root-document
    /// coordinates by summing the viewport offsets of every hosting iframe.
    /// Returns `None` for missing, invisible, zero-area or off-viewport
    /// elements.
    pub async fn rect(&self, page: &mut Page, id: &str) -> Option<ElementRect> {
        tokio::time::sleep(RECT_SETTLE).await;
        let (element, visit) = find_element(page, id)?;
        if !page.is_visible(element) {
            return None;
        }
        page.scroll_into_view(element, ScrollBehavior::Instant);
        let rect = page.viewport_rect(element)?;
        if rect.is_empty() {
            return None;
        }
        let metrics = *page.metrics(visit.frame);
        if rect.x + rect.width <= 0.0
            || rect.y + rect.height <= 0.0
            || rect.x >= metrics.viewport_width
            || rect.y >= metrics.viewport_height
        {
            return None;
        }
        let mut x = rect.x;
        let mut y = rect.y;
        for host in &visit.hosts {
            if let Some(host_rect) = page.viewport_rect(*host) {
                x += host_rect.x;
                y += host_rect.y;
            }
        }
        Some(ElementRect {
            x,
            y,
            width: rect.width,
            height: rect.height,
            dpr: metrics.device_pixel_ratio,
        })
    }
}

fn restore(page: &mut Page, element: NodeHandle, original: &OriginalStyle) {
    page.set_inline_style(element, "outline", original.outline.as_deref());
    page.set_inline_style(element, "outline-offset", original.outline_offset.as_deref());
    page.set_inline_style(element, "box-shadow", original.box_shadow.as_deref());
    page.set_inline_style(element, "z-index", original.z_index.as_deref());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::{FrameMetrics, Rect};
    use tokio::time::advance;

    fn simple_page() -> Page {
        Page::builder(r#"<div id="target" style="outline: 1px dotted green">x</div>"#).finish()
    }

    #[tokio::test]
    async fn missing_id_reports_not_found() {
        let mut page = simple_page();
        let mut locator = Locator::new();
        let outcome = locator.highlight(&mut page, "nope", true);
        assert_eq!(
            outcome,
            HighlightOutcome {
                found: false,
                visible: false
            }
        );
    }

    #[tokio::test]
    async fn hidden_element_is_found_but_not_highlighted() {
        let mut page =
            Page::builder(r#"<div id="target" style="display: none">x</div>"#).finish();
        let mut locator = Locator::new();
        let outcome = locator.highlight(&mut page, "target", true);
        assert_eq!(
            outcome,
            HighlightOutcome {
                found: true,
                visible: false
            }
        );
        let el = page.element_by_dom_id(0, "target").unwrap();
        assert_eq!(page.inline_style(el, "outline"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn highlight_applies_then_reverts_to_originals() {
        let mut page = simple_page();
        let mut locator = Locator::new();
        let outcome = locator.highlight(&mut page, "target", true);
        assert!(outcome.found && outcome.visible);

        let el = page.element_by_dom_id(0, "target").unwrap();
        assert_eq!(
            page.inline_style(el, "outline").as_deref(),
            Some("4px solid #ff5555")
        );
        assert_eq!(
            page.inline_style(el, "z-index").as_deref(),
            Some("2147483647")
        );

        advance(HIGHLIGHT_DURATION + Duration::from_millis(1)).await;
        locator.sweep(&mut page);
        assert_eq!(
            page.inline_style(el, "outline").as_deref(),
            Some("1px dotted green")
        );
        assert_eq!(page.inline_style(el, "z-index"), None);
        assert!(locator.next_revert_at().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn rehighlight_keeps_first_captured_originals() {
        let mut page = simple_page();
        let mut locator = Locator::new();
        locator.highlight(&mut page, "target", true);
        advance(Duration::from_millis(1500)).await;
        // Second request lands while the first highlight is still on.
        locator.highlight(&mut page, "target", false);

        let el = page.element_by_dom_id(0, "target").unwrap();
        assert_eq!(
            page.inline_style(el, "outline").as_deref(),
            Some("4px solid #ffff00")
        );

        advance(HIGHLIGHT_DURATION + Duration::from_millis(1)).await;
        locator.sweep(&mut page);
        assert_eq!(
            page.inline_style(el, "outline").as_deref(),
            Some("1px dotted green")
        );
    }

    #[tokio::test]
    async fn ancestors_start_at_the_element() {
        let page = Page::builder(
            r#"<section class="hero"><p id="deep" class="lede">x</p></section>"#,
        )
        .finish();
        let locator = Locator::new();
        let chain = locator.ancestors(&page, "deep").unwrap();
        assert_eq!(chain[0].tag_name, "p");
        assert_eq!(chain[0].class_name, "lede");
        assert_eq!(chain[1].tag_name, "section");
        assert_eq!(chain.last().unwrap().tag_name, "html");
        assert!(locator.ancestors(&page, "missing").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn rect_sums_iframe_offsets_and_reports_dpr() {
        let mut builder = Page::builder(r#"<body><iframe id="outer"></iframe></body>"#);
        let mid = builder
            .child_frame(0, "#outer", r#"<body><iframe id="inner"></iframe></body>"#)
            .unwrap();
        let leaf = builder
            .child_frame(mid, "#inner", r#"<div id="box">x</div>"#)
            .unwrap();
        builder
            .rect(0, "#outer", Rect::new(10.0, 20.0, 600.0, 400.0))
            .unwrap();
        builder
            .rect(mid, "#inner", Rect::new(5.0, 7.0, 300.0, 200.0))
            .unwrap();
        builder.rect(leaf, "#box", Rect::new(3.0, 4.0, 50.0, 60.0)).unwrap();
        builder.metrics(
            leaf,
            FrameMetrics {
                device_pixel_ratio: 2.0,
                ..FrameMetrics::default()
            },
        );
        let mut page = builder.finish();

        let locator = Locator::new();
        let rect = locator.rect(&mut page, "box").await.unwrap();
        assert_eq!(rect.x, 18.0);
        assert_eq!(rect.y, 31.0);
        assert_eq!(rect.width, 50.0);
        assert_eq!(rect.height, 60.0);
        assert_eq!(rect.dpr, 2.0);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_area_rect_is_none() {
        let mut builder = Page::builder(r#"<div id="flat">x</div>"#);
        builder.rect(0, "#flat", Rect::new(10.0, 10.0, 0.0, 30.0)).unwrap();
        let mut page = builder.finish();
        let locator = Locator::new();
        assert!(locator.rect(&mut page, "flat").await.is_none());
        assert!(locator.rect(&mut page, "absent").await.is_none());
    }
}
