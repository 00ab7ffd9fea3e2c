//! Static classification tables: which CSS properties the scanner inspects,
//! which tags are never classified, and value-level filters.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

/// The curated set of visually significant properties the scanner inspects.
/// Everything else on a rule's declaration block is ignored.
pub const TARGET_PROPERTIES: &[&str] = &[
    // colors
    "color",
    "background-color",
    "background-image",
    "border-color",
    "border-top-color",
    "border-right-color",
    "border-bottom-color",
    "border-left-color",
    "outline-color",
    "text-decoration-color",
    // spacing
    "margin",
    "margin-top",
    "margin-right",
    "margin-bottom",
    "margin-left",
    "padding",
    "padding-top",
    "padding-right",
    "padding-bottom",
    "padding-left",
    "gap",
    // borders
    "border",
    "border-width",
    "border-top-width",
    "border-right-width",
    "border-bottom-width",
    "border-left-width",
    "border-style",
    "border-top-style",
    "border-right-style",
    "border-bottom-style",
    "border-left-style",
    "border-radius",
    "border-top-left-radius",
    "border-top-right-radius",
    "border-bottom-left-radius",
    "border-bottom-right-radius",
    // shadows
    "box-shadow",
    "text-shadow",
    // sizing & layout
    "line-height",
    "width",
    "height",
    "display",
    "position",
    "top",
    "right",
    "bottom",
    "left",
    "z-index",
    // typography
    "font-size",
    "font-weight",
    "font-family",
    "letter-spacing",
    "text-align",
];

/// Tags that are never classified: SVG internals, document structure and a
/// handful of purely semantic inline elements.
pub const EXCLUDED_TAGS: &[&str] = &[
    "svg", "path", "g", "rect", "circle", "line", "polyline", "polygon", "ellipse", "use", "defs",
    "symbol", "script", "style", "link", "meta", "head", "html", "body", "canvas", "picture", "em",
    "strong", "br",
];

fn target_set() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| TARGET_PROPERTIES.iter().copied().collect())
}

fn excluded_set() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| EXCLUDED_TAGS.iter().copied().collect())
}

/// Whether `property` belongs to the inspected set.
pub fn is_target_property(property: &str) -> bool {
    target_set().contains(property)
}

/// Whether elements with this tag name are excluded from classification.
pub fn is_excluded_tag(tag: &str) -> bool {
    excluded_set().contains(tag)
}

/// Why a literal value is filtered out of the hardcoded index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrivialReason {
    /// `0` / `0px`: no visible effect.
    ZeroLength,
    /// `inherit` / `initial` / `unset`: not an author override.
    CascadeKeyword,
    /// `none` / `transparent`: the feature is switched off.
    Disabled,
}

/// Classify a value as trivial, or `None` if it is worth indexing.
pub fn trivial_reason(value: &str) -> Option<TrivialReason> {
    match value.trim() {
        "0" | "0px" => Some(TrivialReason::ZeroLength),
        "inherit" | "initial" | "unset" => Some(TrivialReason::CascadeKeyword),
        "none" | "transparent" => Some(TrivialReason::Disabled),
        _ => None,
    }
}

/// Whether a value is one of the trivial literals the index rejects.
pub fn is_trivial(value: &str) -> bool {
    trivial_reason(value).is_some()
}

/// Coarse value type, used by report consumers to bucket findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Color,
    Size,
    Font,
    Other,
}

fn size_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^-?\d+(\.\d+)?(px|rem|em|vh|vw|%|pt|pc|in|cm|mm|ex|ch|vmin|vmax)$")
            .expect("static regex")
    })
}

fn color_keyword_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(red|green|blue|yellow|orange|purple|pink|brown|gray|black|white)$")
            .expect("static regex")
    })
}

/// Best-effort value classification: color, size, font or other.
pub fn classify_value(value: &str) -> ValueKind {
    let val = value.trim().to_ascii_lowercase();
    if val.starts_with('#')
        || val.starts_with("rgb")
        || val.starts_with("hsl")
        || val == "transparent"
        || val == "currentcolor"
        || color_keyword_pattern().is_match(&val)
    {
        return ValueKind::Color;
    }
    if size_pattern().is_match(&val) {
        return ValueKind::Size;
    }
    if val.contains("font") || val.contains("serif") || val.contains("mono") {
        return ValueKind::Font;
    }
    ValueKind::Other
}

/// Visual concern a property belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyGroup {
    Font,
    Spacing,
    Border,
    Shadow,
    Layout,
    Background,
    Other,
}

/// Group a target property by the visual concern it affects.
pub fn group_of(property: &str) -> PropertyGroup {
    match property {
        "font-size" | "font-weight" | "font-family" | "letter-spacing" | "color"
        | "text-align" => PropertyGroup::Font,
        "margin" | "padding" | "margin-top" | "margin-right" | "margin-bottom" | "margin-left"
        | "padding-top" | "padding-right" | "padding-bottom" | "padding-left" | "gap" => {
            PropertyGroup::Spacing
        }
        p if p.starts_with("border") || p.starts_with("outline") => PropertyGroup::Border,
        "box-shadow" | "text-shadow" => PropertyGroup::Shadow,
        "width" | "height" | "line-height" | "display" | "position" | "top" | "right"
        | "bottom" | "left" | "z-index" => PropertyGroup::Layout,
        p if p.starts_with("background") => PropertyGroup::Background,
        _ => PropertyGroup::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_properties() {
        assert!(is_target_property("color"));
        assert!(is_target_property("border-top-left-radius"));
        assert!(is_target_property("gap"));
        assert!(!is_target_property("cursor"));
        assert!(!is_target_property("--primary"));
    }

    #[test]
    fn excluded_tags() {
        assert!(is_excluded_tag("svg"));
        assert!(is_excluded_tag("body"));
        assert!(is_excluded_tag("br"));
        assert!(!is_excluded_tag("div"));
        assert!(!is_excluded_tag("button"));
    }

    #[test]
    fn trivial_taxonomy() {
        assert_eq!(trivial_reason("0"), Some(TrivialReason::ZeroLength));
        assert_eq!(trivial_reason(" 0px "), Some(TrivialReason::ZeroLength));
        assert_eq!(trivial_reason("inherit"), Some(TrivialReason::CascadeKeyword));
        assert_eq!(trivial_reason("unset"), Some(TrivialReason::CascadeKeyword));
        assert_eq!(trivial_reason("none"), Some(TrivialReason::Disabled));
        assert_eq!(trivial_reason("transparent"), Some(TrivialReason::Disabled));
        assert_eq!(trivial_reason("red"), None);
        assert_eq!(trivial_reason("0.5px"), None);
        assert!(is_trivial("initial"));
        assert!(!is_trivial("1px"));
    }

    #[test]
    fn value_kinds() {
        assert_eq!(classify_value("#ff5555"), ValueKind::Color);
        assert_eq!(classify_value("rgba(0, 0, 0, 0.2)"), ValueKind::Color);
        assert_eq!(classify_value("hsl(120, 50%, 50%)"), ValueKind::Color);
        assert_eq!(classify_value("red"), ValueKind::Color);
        assert_eq!(classify_value("currentColor"), ValueKind::Color);
        assert_eq!(classify_value("16px"), ValueKind::Size);
        assert_eq!(classify_value("-0.5rem"), ValueKind::Size);
        assert_eq!(classify_value("50%"), ValueKind::Size);
        assert_eq!(classify_value("'Fira Sans', sans-serif"), ValueKind::Font);
        assert_eq!(classify_value("bold"), ValueKind::Other);
        assert_eq!(classify_value("1px solid red"), ValueKind::Other);
    }

    #[test]
    fn property_groups() {
        assert_eq!(group_of("color"), PropertyGroup::Font);
        assert_eq!(group_of("padding-left"), PropertyGroup::Spacing);
        assert_eq!(group_of("border-radius"), PropertyGroup::Border);
        assert_eq!(group_of("outline-color"), PropertyGroup::Border);
        assert_eq!(group_of("box-shadow"), PropertyGroup::Shadow);
        assert_eq!(group_of("z-index"), PropertyGroup::Layout);
        assert_eq!(group_of("background-image"), PropertyGroup::Background);
        assert_eq!(group_of("cursor"), PropertyGroup::Other);
    }
}
