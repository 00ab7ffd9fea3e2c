//! Page snapshot layer: the frame tree, parsed documents, stylesheet data
//! and the query/computed-style surface the scanner and locator consume.
//!
//! The parse result (`scraper::Html`) is immutable; runtime DOM writes
//! (assigned marker attributes, inline-style mutations) live in overlay
//! maps keyed by node id.

mod builder;

use std::cell::RefCell;
use std::collections::hash_map::RandomState;
use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hasher};
use std::sync::OnceLock;

use ego_tree::NodeId;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::{Error, Result};

pub use builder::PageBuilder;

/// Frame id of the root document.
pub const ROOT_FRAME_ID: &str = "Main Page";

/// A single CSS declaration as provided by the host CSSOM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declaration {
    pub property: String,
    pub value: String,
}

impl Declaration {
    pub fn new(property: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            value: value.into(),
        }
    }
}

/// Rule flavor. Only plain style rules are ever indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    Style,
    At,
}

/// One rule of a stylesheet: selector text plus its own declaration block.
#[derive(Debug, Clone)]
pub struct StyleRule {
    pub selector: String,
    pub declarations: Vec<Declaration>,
    pub kind: RuleKind,
}

impl StyleRule {
    /// A plain style rule from `(property, value)` pairs.
    pub fn style(selector: &str, declarations: &[(&str, &str)]) -> Self {
        Self {
            selector: selector.to_string(),
            declarations: declarations
                .iter()
                .map(|(p, v)| Declaration::new(*p, *v))
                .collect(),
            kind: RuleKind::Style,
        }
    }

    /// An at-rule (media block, import, keyframes...). Carried but never indexed.
    pub fn at_rule(text: &str) -> Self {
        Self {
            selector: text.to_string(),
            declarations: Vec::new(),
            kind: RuleKind::At,
        }
    }
}

/// A stylesheet as exposed by the host. `accessible: false` models a
/// CORS-restricted sheet whose rules cannot be read.
#[derive(Debug, Clone)]
pub struct Stylesheet {
    pub rules: Vec<StyleRule>,
    pub accessible: bool,
}

impl Stylesheet {
    pub fn new(rules: Vec<StyleRule>) -> Self {
        Self {
            rules,
            accessible: true,
        }
    }

    pub fn restricted(rules: Vec<StyleRule>) -> Self {
        Self {
            rules,
            accessible: false,
        }
    }
}

/// Axis-aligned rectangle. Stored per element in document coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// Per-frame layout metrics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameMetrics {
    pub viewport_width: f64,
    pub viewport_height: f64,
    pub device_pixel_ratio: f64,
    pub scroll_x: f64,
    pub scroll_y: f64,
    pub content_width: f64,
    pub content_height: f64,
}

impl Default for FrameMetrics {
    fn default() -> Self {
        Self {
            viewport_width: 1280.0,
            viewport_height: 720.0,
            device_pixel_ratio: 1.0,
            scroll_x: 0.0,
            scroll_y: 0.0,
            content_width: 1280.0,
            content_height: 720.0,
        }
    }
}

/// Scroll behavior requested by a caller. Both settle immediately in the
/// snapshot model; the distinction is preserved for tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollBehavior {
    Smooth,
    Instant,
}

/// Opaque handle to an element inside some frame of a [`Page`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHandle {
    pub(crate) frame: usize,
    pub(crate) node: NodeId,
}

impl NodeHandle {
    /// Index of the frame this element belongs to.
    pub fn frame(&self) -> usize {
        self.frame
    }
}

struct FrameDoc {
    html: Html,
    sheets: Vec<Stylesheet>,
    metrics: FrameMetrics,
    /// Hosting `<iframe>` node -> child frame index. `None` marks content
    /// the snapshot cannot reach (the cross-origin case).
    children: HashMap<NodeId, Option<usize>>,
    overlay_attrs: HashMap<NodeId, BTreeMap<String, String>>,
    overlay_style: HashMap<NodeId, BTreeMap<String, Option<String>>>,
    rects: HashMap<NodeId, Rect>,
    selector_cache: RefCell<HashMap<String, Option<Selector>>>,
}

impl FrameDoc {
    fn parse(html: &str) -> Self {
        Self {
            html: Html::parse_document(html),
            sheets: Vec::new(),
            metrics: FrameMetrics::default(),
            children: HashMap::new(),
            overlay_attrs: HashMap::new(),
            overlay_style: HashMap::new(),
            rects: HashMap::new(),
            selector_cache: RefCell::new(HashMap::new()),
        }
    }

    fn cached_selector(&self, text: &str) -> Option<Selector> {
        let mut cache = self.selector_cache.borrow_mut();
        cache
            .entry(text.to_string())
            .or_insert_with(|| Selector::parse(text).ok())
            .clone()
    }
}

/// Parse a selector, surfacing syntax failures as [`Error::Selector`].
pub fn parse_selector(text: &str) -> Result<Selector> {
    Selector::parse(text).map_err(|e| Error::Selector(e.to_string()))
}

fn iframe_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    SEL.get_or_init(|| Selector::parse("iframe").expect("static selector"))
}

/// A frame tree: the root document plus any reachable nested frames.
pub struct Page {
    frames: Vec<FrameDoc>,
}

impl Page {
    /// Start building a page from the root document's HTML.
    pub fn builder(root_html: &str) -> PageBuilder {
        PageBuilder::new(root_html)
    }

    /// Number of frames in the snapshot (root included).
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Stylesheets of a frame, in document order.
    pub fn stylesheets(&self, frame: usize) -> &[Stylesheet] {
        &self.frames[frame].sheets
    }

    /// Layout metrics of a frame.
    pub fn metrics(&self, frame: usize) -> &FrameMetrics {
        &self.frames[frame].metrics
    }

    fn node_ref(&self, handle: NodeHandle) -> ego_tree::NodeRef<'_, scraper::Node> {
        self.frames[handle.frame]
            .html
            .tree
            .get(handle.node)
            .expect("node handle belongs to this page")
    }

    fn element_ref(&self, handle: NodeHandle) -> ElementRef<'_> {
        ElementRef::wrap(self.node_ref(handle)).expect("node handle refers to an element")
    }

    /// All elements of `frame` matching `selector`, in document order.
    pub fn query(&self, frame: usize, selector: &Selector) -> Vec<NodeHandle> {
        self.frames[frame]
            .html
            .select(selector)
            .map(|el| NodeHandle {
                frame,
                node: el.id(),
            })
            .collect()
    }

    /// Convenience: parse `selector` and query `frame` with it.
    pub fn select(&self, frame: usize, selector: &str) -> Result<Vec<NodeHandle>> {
        Ok(self.query(frame, &parse_selector(selector)?))
    }

    /// Direct membership test, the `Element::matches` analogue.
    pub fn matches(&self, handle: NodeHandle, selector: &Selector) -> bool {
        selector.matches(&self.element_ref(handle))
    }

    /// Lookup by natural DOM id. A linear attribute scan, so purely numeric
    /// ids resolve without going through selector syntax.
    pub fn element_by_dom_id(&self, frame: usize, id: &str) -> Option<NodeHandle> {
        self.frames[frame]
            .html
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().attr("id") == Some(id))
            .map(|el| NodeHandle {
                frame,
                node: el.id(),
            })
    }

    /// Lookup by attribute value, overlay writes included.
    pub fn element_by_attr(&self, frame: usize, name: &str, value: &str) -> Option<NodeHandle> {
        self.frames[frame]
            .html
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
            .map(|el| NodeHandle {
                frame,
                node: el.id(),
            })
            .find(|h| self.attribute(*h, name).as_deref() == Some(value))
    }

    /// Lowercase tag name.
    pub fn tag_name(&self, handle: NodeHandle) -> String {
        self.element_ref(handle).value().name().to_ascii_lowercase()
    }

    /// The `class` attribute, or an empty string.
    pub fn class_name(&self, handle: NodeHandle) -> String {
        self.element_ref(handle)
            .value()
            .attr("class")
            .unwrap_or_default()
            .to_string()
    }

    /// Natural DOM id, if the element carries one.
    pub fn dom_id(&self, handle: NodeHandle) -> Option<String> {
        self.element_ref(handle)
            .value()
            .attr("id")
            .map(str::to_string)
    }

    /// Parent element, if any.
    pub fn parent(&self, handle: NodeHandle) -> Option<NodeHandle> {
        self.node_ref(handle)
            .parent()
            .and_then(ElementRef::wrap)
            .map(|el| NodeHandle {
                frame: handle.frame,
                node: el.id(),
            })
    }

    /// 1-based position among preceding same-tag siblings (`:nth-of-type`).
    pub fn nth_of_type(&self, handle: NodeHandle) -> usize {
        let el = self.element_ref(handle);
        let tag = el.value().name();
        1 + self
            .node_ref(handle)
            .prev_siblings()
            .filter_map(ElementRef::wrap)
            .filter(|s| s.value().name() == tag)
            .count()
    }

    /// Attribute read: overlay writes shadow the parsed document.
    pub fn attribute(&self, handle: NodeHandle, name: &str) -> Option<String> {
        if let Some(map) = self.frames[handle.frame].overlay_attrs.get(&handle.node) {
            if let Some(v) = map.get(name) {
                return Some(v.clone());
            }
        }
        self.element_ref(handle)
            .value()
            .attr(name)
            .map(str::to_string)
    }

    /// Whether the element carries `name`, overlay writes included.
    pub fn has_attribute(&self, handle: NodeHandle, name: &str) -> bool {
        self.attribute(handle, name).is_some()
    }

    /// Attribute write, recorded in the overlay.
    pub fn set_attribute(&mut self, handle: NodeHandle, name: &str, value: &str) {
        self.frames[handle.frame]
            .overlay_attrs
            .entry(handle.node)
            .or_default()
            .insert(name.to_string(), value.to_string());
    }

    /// Inline-style read: overlay first, then the parsed `style` attribute.
    pub fn inline_style(&self, handle: NodeHandle, property: &str) -> Option<String> {
        if let Some(map) = self.frames[handle.frame].overlay_style.get(&handle.node) {
            if let Some(v) = map.get(property) {
                return v.clone();
            }
        }
        let attr = self.element_ref(handle).value().attr("style")?;
        parse_inline(attr, property)
    }

    /// Inline-style write. `None` clears the property.
    pub fn set_inline_style(&mut self, handle: NodeHandle, property: &str, value: Option<&str>) {
        self.frames[handle.frame]
            .overlay_style
            .entry(handle.node)
            .or_default()
            .insert(property.to_string(), value.map(str::to_string));
    }

    /// Resolved style value for one property: accessible style rules in
    /// source order (last match wins, no specificity), inline style on top.
    pub fn computed(&self, handle: NodeHandle, property: &str) -> Option<String> {
        let frame = &self.frames[handle.frame];
        let el = self.element_ref(handle);
        let mut resolved = None;
        for sheet in &frame.sheets {
            if !sheet.accessible {
                continue;
            }
            for rule in &sheet.rules {
                if rule.kind != RuleKind::Style {
                    continue;
                }
                let Some(sel) = frame.cached_selector(&rule.selector) else {
                    continue;
                };
                if !sel.matches(&el) {
                    continue;
                }
                for d in &rule.declarations {
                    if d.property == property {
                        resolved = Some(d.value.clone());
                    }
                }
            }
        }
        self.inline_style(handle, property).or(resolved)
    }

    /// Three-part visibility test: `display`, `visibility`, `opacity`.
    /// An unparsable opacity counts as visible.
    pub fn is_visible(&self, handle: NodeHandle) -> bool {
        if self.computed(handle, "display").as_deref() == Some("none") {
            return false;
        }
        if self.computed(handle, "visibility").as_deref() == Some("hidden") {
            return false;
        }
        let opaque = self
            .computed(handle, "opacity")
            .and_then(|v| v.trim().parse::<f64>().ok())
            .map(|v| v != 0.0)
            .unwrap_or(true);
        opaque
    }

    /// Document-coordinate rectangle, if layout data was provided.
    pub fn document_rect(&self, handle: NodeHandle) -> Option<Rect> {
        self.frames[handle.frame].rects.get(&handle.node).copied()
    }

    /// Viewport-relative rectangle of an element within its own frame.
    pub fn viewport_rect(&self, handle: NodeHandle) -> Option<Rect> {
        let rect = self.document_rect(handle)?;
        let m = &self.frames[handle.frame].metrics;
        Some(Rect::new(
            rect.x - m.scroll_x,
            rect.y - m.scroll_y,
            rect.width,
            rect.height,
        ))
    }

    /// Center the element in its frame's viewport by adjusting the frame
    /// scroll, clamped to the scrollable range.
    pub fn scroll_into_view(&mut self, handle: NodeHandle, behavior: ScrollBehavior) {
        let Some(rect) = self.document_rect(handle) else {
            return;
        };
        let m = &mut self.frames[handle.frame].metrics;
        let max_x = (m.content_width - m.viewport_width).max(0.0);
        let max_y = (m.content_height - m.viewport_height).max(0.0);
        m.scroll_x = (rect.x + rect.width / 2.0 - m.viewport_width / 2.0).clamp(0.0, max_x);
        m.scroll_y = (rect.y + rect.height / 2.0 - m.viewport_height / 2.0).clamp(0.0, max_y);
        trace!(?behavior, scroll_x = m.scroll_x, scroll_y = m.scroll_y, "scrolled into view");
    }

    /// Whether the element's subtree contains a `tag` element.
    pub fn contains_tag(&self, handle: NodeHandle, tag: &str) -> bool {
        self.node_ref(handle)
            .descendants()
            .skip(1)
            .filter_map(ElementRef::wrap)
            .any(|el| el.value().name().eq_ignore_ascii_case(tag))
    }

    /// `<iframe>` elements of a frame, in document order.
    pub fn iframe_elements(&self, frame: usize) -> Vec<NodeHandle> {
        self.query(frame, iframe_selector())
    }

    /// Content frame hosted by an `<iframe>` element: `None` when the iframe
    /// was never seen, `Some(None)` when its content is unreachable.
    pub fn content_frame(&self, host: NodeHandle) -> Option<Option<usize>> {
        self.frames[host.frame].children.get(&host.node).copied()
    }
}

fn parse_inline(style_attr: &str, property: &str) -> Option<String> {
    for decl in style_attr.split(';') {
        let (prop, value) = decl.split_once(':')?;
        if prop.trim().eq_ignore_ascii_case(property) {
            return Some(value.trim().to_string());
        }
    }
    None
}

/// One frame reached by a depth-first pre-order walk.
#[derive(Debug, Clone)]
pub(crate) struct FrameVisit {
    pub frame: usize,
    pub frame_id: String,
    /// Ancestor `<iframe>` host elements, root-most first.
    pub hosts: Vec<NodeHandle>,
}

/// Depth-first pre-order frame traversal shared by the scanner and the
/// locator. `visible_hosts_only` gates descent on the host iframe's computed
/// display (the scanner's rule); the locator descends regardless.
pub(crate) fn frame_visits(page: &Page, visible_hosts_only: bool) -> Vec<FrameVisit> {
    let mut out = Vec::new();
    walk(page, 0, ROOT_FRAME_ID.to_string(), Vec::new(), visible_hosts_only, &mut out);
    out
}

fn walk(
    page: &Page,
    frame: usize,
    frame_id: String,
    hosts: Vec<NodeHandle>,
    visible_hosts_only: bool,
    out: &mut Vec<FrameVisit>,
) {
    out.push(FrameVisit {
        frame,
        frame_id,
        hosts: hosts.clone(),
    });
    for host in page.iframe_elements(frame) {
        if visible_hosts_only && page.computed(host, "display").as_deref() == Some("none") {
            continue;
        }
        // Unreachable content is the cross-origin path: skip silently.
        let Some(Some(child)) = page.content_frame(host) else {
            continue;
        };
        let id = page
            .attribute(host, "id")
            .filter(|v| !v.is_empty())
            .or_else(|| page.attribute(host, "name").filter(|v| !v.is_empty()))
            .unwrap_or_else(synthesized_frame_id);
        let mut chain = hosts.clone();
        chain.push(host);
        walk(page, child, id, chain, visible_hosts_only, out);
    }
}

fn synthesized_frame_id() -> String {
    let mut hasher = RandomState::new().build_hasher();
    hasher.write_u64(0x746f6b656e);
    let mut v = hasher.finish();
    let mut suffix = String::with_capacity(5);
    for _ in 0..5 {
        let digit = (v % 36) as u32;
        suffix.push(char::from_digit(digit, 36).unwrap_or('0'));
        v /= 36;
    }
    format!("Iframe-{suffix}")
}
