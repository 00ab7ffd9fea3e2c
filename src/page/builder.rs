//! Incremental construction of a [`Page`] snapshot.

use super::{FrameDoc, FrameMetrics, Page, Rect, Stylesheet};
use crate::{Error, Result};

/// Builds a frame tree from HTML sources, stylesheet data and layout
/// metrics. Frame 0 is the root document; [`PageBuilder::child_frame`]
/// returns the index of each frame it adds.
pub struct PageBuilder {
    page: Page,
}

impl PageBuilder {
    /// Start with the root document.
    pub fn new(root_html: &str) -> Self {
        Self {
            page: Page {
                frames: vec![FrameDoc::parse(root_html)],
            },
        }
    }

    /// Append a stylesheet to a frame (document order is append order).
    pub fn stylesheet(&mut self, frame: usize, sheet: Stylesheet) -> &mut Self {
        self.page.frames[frame].sheets.push(sheet);
        self
    }

    /// Replace a frame's layout metrics.
    pub fn metrics(&mut self, frame: usize, metrics: FrameMetrics) -> &mut Self {
        self.page.frames[frame].metrics = metrics;
        self
    }

    /// Assign a document-coordinate rectangle to every element matching
    /// `selector` in `frame`.
    pub fn rect(&mut self, frame: usize, selector: &str, rect: Rect) -> Result<&mut Self> {
        let matches = self.page.select(frame, selector)?;
        if matches.is_empty() {
            return Err(Error::Snapshot(format!(
                "rect selector {selector:?} matched no element in frame {frame}"
            )));
        }
        for handle in matches {
            self.page.frames[frame].rects.insert(handle.node, rect);
        }
        Ok(self)
    }

    /// Attach a reachable child document to the first `<iframe>` matching
    /// `iframe_selector`, returning the new frame's index.
    pub fn child_frame(&mut self, parent: usize, iframe_selector: &str, html: &str) -> Result<usize> {
        let host = self.resolve_iframe(parent, iframe_selector)?;
        let index = self.page.frames.len();
        self.page.frames.push(FrameDoc::parse(html));
        self.page.frames[parent].children.insert(host, Some(index));
        Ok(index)
    }

    /// Mark the first `<iframe>` matching `iframe_selector` as having
    /// unreachable content (the cross-origin case).
    pub fn restricted_frame(&mut self, parent: usize, iframe_selector: &str) -> Result<&mut Self> {
        let host = self.resolve_iframe(parent, iframe_selector)?;
        self.page.frames[parent].children.insert(host, None);
        Ok(self)
    }

    fn resolve_iframe(&self, parent: usize, selector: &str) -> Result<ego_tree::NodeId> {
        let matches = self.page.select(parent, selector)?;
        let Some(host) = matches.first() else {
            return Err(Error::Snapshot(format!(
                "iframe selector {selector:?} matched no element in frame {parent}"
            )));
        };
        if self.page.tag_name(*host) != "iframe" {
            return Err(Error::Snapshot(format!(
                "selector {selector:?} matched a <{}>, expected an <iframe>",
                self.page.tag_name(*host)
            )));
        }
        Ok(host.node)
    }

    /// Finish the snapshot.
    pub fn finish(self) -> Page {
        self.page
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::{StyleRule, ROOT_FRAME_ID};

    #[test]
    fn nested_frames() {
        let mut builder = PageBuilder::new(r#"<body><iframe id="inner"></iframe></body>"#);
        let child = builder
            .child_frame(0, "#inner", r#"<body><iframe id="deep"></iframe></body>"#)
            .unwrap();
        let grandchild = builder.child_frame(child, "#deep", "<div></div>").unwrap();
        let page = builder.finish();
        assert_eq!(page.frame_count(), 3);
        assert_eq!(child, 1);
        assert_eq!(grandchild, 2);
        assert_eq!(ROOT_FRAME_ID, "Main Page");
    }

    #[test]
    fn rejects_missing_or_wrong_host() {
        let mut builder = PageBuilder::new("<body><div id='not-a-frame'></div></body>");
        assert!(builder.child_frame(0, "#nope", "<div></div>").is_err());
        assert!(builder.child_frame(0, "#not-a-frame", "<div></div>").is_err());
    }

    #[test]
    fn rect_requires_a_match() {
        let mut builder = PageBuilder::new("<div class='a'></div>");
        assert!(builder.rect(0, ".a", Rect::new(0.0, 0.0, 10.0, 10.0)).is_ok());
        assert!(builder.rect(0, ".missing", Rect::default()).is_err());
    }

    #[test]
    fn stylesheets_keep_document_order() {
        let mut builder = PageBuilder::new("<div></div>");
        builder
            .stylesheet(0, Stylesheet::new(vec![StyleRule::style("div", &[("color", "red")])]))
            .stylesheet(0, Stylesheet::restricted(vec![]));
        let page = builder.finish();
        assert_eq!(page.stylesheets(0).len(), 2);
        assert!(page.stylesheets(0)[0].accessible);
        assert!(!page.stylesheets(0)[1].accessible);
    }
}
