//! Stylesheet rule index: selector text -> declarations worth reporting.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::catalog;
use crate::page::{Declaration, Page, RuleKind};
use crate::scan::pacing::Pacer;
use crate::scan::{ScanConfig, TokenUse};

/// Declarations accumulated under one selector.
#[derive(Debug, Default, Clone)]
pub(crate) struct SelectorDecls {
    pub hardcoded: Vec<Declaration>,
    pub tokens: Vec<TokenUse>,
}

/// Ephemeral per-frame index, discarded after matching.
#[derive(Debug, Default)]
pub(crate) struct RuleIndex {
    /// Selector texts in first-encounter order; batch order follows this.
    pub order: Vec<String>,
    pub decls: HashMap<String, SelectorDecls>,
}

impl RuleIndex {
    fn entry(&mut self, selector: &str) -> &mut SelectorDecls {
        if !self.decls.contains_key(selector) {
            self.order.push(selector.to_string());
        }
        self.decls.entry(selector.to_string()).or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

fn var_name_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"var\(\s*(--[A-Za-z0-9_-]+)").expect("static regex"))
}

/// Name of the first custom property referenced by a value, if any.
pub(crate) fn referenced_token(value: &str) -> Option<String> {
    var_name_pattern()
        .captures(value)
        .map(|c| c[1].to_string())
}

/// Walk a frame's stylesheets and build the index. Restricted sheets are
/// skipped; iteration yields every 100 rules and at every sheet boundary.
pub(crate) async fn build(
    page: &Page,
    frame: usize,
    config: &ScanConfig,
    pacer: &mut Pacer,
) -> RuleIndex {
    let mut index = RuleIndex::default();
    let mut rules_seen = 0usize;
    for (sheet_no, sheet) in page.stylesheets(frame).iter().enumerate() {
        if !sheet.accessible {
            debug!(sheet = sheet_no, "skipping restricted stylesheet");
            pacer.force().await;
            continue;
        }
        for rule in &sheet.rules {
            if rule.kind == RuleKind::Style {
                for decl in &rule.declarations {
                    if !catalog::is_target_property(&decl.property) {
                        continue;
                    }
                    let value = decl.value.trim();
                    if value.is_empty() {
                        continue;
                    }
                    if decl.value.contains("var(") {
                        if config.track_token_usage {
                            if let Some(name) = referenced_token(&decl.value) {
                                index.entry(&rule.selector).tokens.push(TokenUse {
                                    property: decl.property.clone(),
                                    name,
                                    value: decl.value.clone(),
                                });
                            }
                        }
                        continue;
                    }
                    if catalog::is_trivial(value) {
                        continue;
                    }
                    index.entry(&rule.selector).hardcoded.push(decl.clone());
                }
            }
            rules_seen += 1;
            if rules_seen % 100 == 0 {
                pacer.maybe().await;
            }
        }
        pacer.force().await;
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::{StyleRule, Stylesheet};
    use std::time::Duration;

    fn build_index(sheets: Vec<Stylesheet>, track: bool) -> RuleIndex {
        let mut builder = Page::builder("<div></div>");
        for sheet in sheets {
            builder.stylesheet(0, sheet);
        }
        let page = builder.finish();
        let config = ScanConfig {
            track_token_usage: track,
            ..ScanConfig::default()
        };
        let mut pacer = Pacer::new(Duration::from_millis(30));
        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("runtime");
        rt.block_on(build(&page, 0, &config, &mut pacer))
    }

    #[test]
    fn indexes_only_nontrivial_target_literals() {
        let index = build_index(
            vec![Stylesheet::new(vec![StyleRule::style(
                ".box",
                &[
                    ("color", "red"),
                    ("margin", "0"),
                    ("padding", "0px"),
                    ("display", "none"),
                    ("background-color", "transparent"),
                    ("border-color", "inherit"),
                    ("cursor", "pointer"),
                    ("font-size", ""),
                    ("line-height", "1.5"),
                ],
            )])],
            false,
        );
        let decls = &index.decls[".box"];
        let props: Vec<&str> = decls.hardcoded.iter().map(|d| d.property.as_str()).collect();
        assert_eq!(props, vec!["color", "line-height"]);
    }

    #[test]
    fn var_references_never_reach_the_hardcoded_side() {
        let index = build_index(
            vec![Stylesheet::new(vec![StyleRule::style(
                ".btn",
                &[("border", "1px solid var(--gap)"), ("color", "var(--fg)")],
            )])],
            false,
        );
        assert!(index.is_empty());
    }

    #[test]
    fn token_usage_tracked_when_enabled() {
        let index = build_index(
            vec![Stylesheet::new(vec![StyleRule::style(
                ".btn",
                &[("border", "1px solid var(--gap, 4px)"), ("color", "#333")],
            )])],
            true,
        );
        let decls = &index.decls[".btn"];
        assert_eq!(decls.tokens.len(), 1);
        assert_eq!(decls.tokens[0].name, "--gap");
        assert_eq!(decls.tokens[0].property, "border");
        assert_eq!(decls.hardcoded.len(), 1);
    }

    #[test]
    fn at_rules_and_restricted_sheets_are_skipped() {
        let index = build_index(
            vec![
                Stylesheet::new(vec![
                    StyleRule::at_rule("@media (max-width: 600px)"),
                    StyleRule::style(".a", &[("color", "blue")]),
                ]),
                Stylesheet::restricted(vec![StyleRule::style(".b", &[("color", "green")])]),
            ],
            false,
        );
        assert_eq!(index.order, vec![".a".to_string()]);
    }

    #[test]
    fn selector_order_is_first_encounter() {
        let index = build_index(
            vec![Stylesheet::new(vec![
                StyleRule::style(".b", &[("color", "blue")]),
                StyleRule::style(".a", &[("color", "red")]),
                StyleRule::style(".b", &[("padding", "4px")]),
            ])],
            false,
        );
        assert_eq!(index.order, vec![".b".to_string(), ".a".to_string()]);
        assert_eq!(index.decls[".b"].hardcoded.len(), 2);
    }

    #[test]
    fn token_name_extraction() {
        assert_eq!(referenced_token("var(--x)").as_deref(), Some("--x"));
        assert_eq!(
            referenced_token("1px solid var( --border-strong , #000)").as_deref(),
            Some("--border-strong")
        );
        assert_eq!(referenced_token("#fff"), None);
    }
}
