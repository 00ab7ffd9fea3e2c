//! Approximate element identity and selector-path generation.

use crate::page::{NodeHandle, Page};

fn sorted_classes(class_attr: &str) -> String {
    let mut classes: Vec<&str> = class_attr.split_whitespace().collect();
    classes.sort_unstable();
    classes.join(" ")
}

/// Stable-ish identity string used to skip elements the batched matching
/// pass would otherwise re-visit: `frameId:tag.sortedClasses<parentSig`.
/// Two distinct elements may collide; that is an accepted approximation.
pub fn element_fingerprint(page: &Page, element: NodeHandle, frame_id: &str) -> String {
    let tag = page.tag_name(element);
    let classes = sorted_classes(&page.class_name(element));
    let parent_sig = page
        .parent(element)
        .map(|p| format!("{}.{}", page.tag_name(p), sorted_classes(&page.class_name(p))))
        .unwrap_or_default();
    format!("{frame_id}:{tag}.{classes}<{parent_sig}")
}

/// CSS-selector-like path for reporting: `tag#id` stops the walk, otherwise
/// `tag.firstClass` plus `:nth-of-type(n)` among same-tag siblings.
pub fn css_path(page: &Page, element: NodeHandle) -> String {
    let mut path = Vec::new();
    let mut current = Some(element);
    while let Some(handle) = current {
        let tag = page.tag_name(handle);
        if let Some(id) = page.dom_id(handle).filter(|id| !id.is_empty()) {
            path.push(format!("{tag}#{id}"));
            break;
        }
        let mut segment = tag;
        if let Some(first) = page.class_name(handle).split_whitespace().next() {
            segment.push('.');
            segment.push_str(first);
        }
        let nth = page.nth_of_type(handle);
        if nth > 1 {
            segment.push_str(&format!(":nth-of-type({nth})"));
        }
        path.push(segment);
        current = page.parent(handle);
    }
    path.reverse();
    path.join(" > ")
}
