//! Breakpoint-based markup rewriting.
//!
//! Finds every `<source>` tag whose srcset-like attribute mentions an
//! identifier, resolves a width from the tag's own `media` attribute, and
//! swaps the file reference for `{identifier}{width}.webp`. Then does the
//! same for `<img>` tags with a src-like attribute, which carry no media
//! query and resolve through `img_default`.
//!
//! Only the two tag shapes are matched; the markup is never parsed as a
//! whole. Substitution is confined to the matched attribute value, and
//! within it to whole `{identifier}.{ext}` references.

use super::RewriteError;
use super::ordinal::find_reference;
use crate::breakpoint::{BreakpointResolver, MediaQuery, Resolution};
use crate::config::{AppConfig, MarkupConfig};
use crate::report::Reporter;
use crate::types::TagKind;
use regex::Regex;
use std::sync::OnceLock;

/// One rewritten tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
    pub tag: TagKind,
    pub media_query: String,
    pub resolution: Resolution,
    pub file_name: String,
}

pub struct MarkupRewriter<'a> {
    resolver: BreakpointResolver<'a>,
    markup: &'a MarkupConfig,
}

impl<'a> MarkupRewriter<'a> {
    pub fn new(config: &'a AppConfig) -> Self {
        Self {
            resolver: BreakpointResolver::new(config),
            markup: &config.markup,
        }
    }

    pub fn handles(&self, code: &str) -> bool {
        self.resolver.handles(code)
    }

    /// Rewrite all references to `identifier` in `text`.
    ///
    /// Returns the new text and one [`Substitution`] per changed tag.
    pub fn rewrite(
        &self,
        text: &str,
        code: &str,
        identifier: &str,
        reporter: &dyn Reporter,
    ) -> Result<(String, Vec<Substitution>), RewriteError> {
        if !self.handles(code) {
            return Err(RewriteError::UndefinedBreakpointsForCode(code.to_string()));
        }

        let mut substitutions = Vec::new();
        let text = self.rewrite_tags(
            text,
            TagKind::Source,
            code,
            identifier,
            reporter,
            &mut substitutions,
        )?;
        let text = self.rewrite_tags(
            &text,
            TagKind::Img,
            code,
            identifier,
            reporter,
            &mut substitutions,
        )?;
        Ok((text, substitutions))
    }

    fn rewrite_tags(
        &self,
        text: &str,
        kind: TagKind,
        code: &str,
        identifier: &str,
        reporter: &dyn Reporter,
        substitutions: &mut Vec<Substitution>,
    ) -> Result<String, RewriteError> {
        let attribute = match kind {
            TagKind::Source => &self.markup.source_attribute,
            TagKind::Img => &self.markup.img_attribute,
        };
        let tag_pattern = tag_regex(kind, attribute, identifier)?;
        let file_pattern = file_reference_regex(identifier)?;

        let mut out = String::with_capacity(text.len());
        let mut last = 0;

        for caps in tag_pattern.captures_iter(text) {
            let (Some(m), Some(value)) = (caps.get(0), caps.name("value")) else {
                continue;
            };
            let tag = m.as_str();
            let media_query = match kind {
                TagKind::Source => media_attribute(tag).unwrap_or_default(),
                TagKind::Img => "",
            };
            let query = MediaQuery::parse(media_query);

            let Some(resolution) = self
                .resolver
                .resolve(code, &query, kind, text, m.start())
            else {
                let err = RewriteError::UnresolvableMediaQuery {
                    code: code.to_string(),
                    identifier: identifier.to_string(),
                    media_query: media_query.to_string(),
                };
                reporter.warn(&err.to_string());
                continue;
            };

            let file_name = format!("{identifier}{}.webp", resolution.width);
            let Some(new_value) = replace_references(&file_pattern, value.as_str(), &file_name) else {
                reporter.warn(&format!(
                    "<{kind}> has no {identifier}.<ext> reference, left unchanged"
                ));
                continue;
            };

            reporter.info(&format!(
                "<{kind}> {:?} -> {file_name} ({})",
                media_query, resolution.reason
            ));
            // Only the attribute value changes; the rest of the tag is copied
            out.push_str(&text[last..value.start()]);
            out.push_str(&new_value);
            last = value.end();

            substitutions.push(Substitution {
                tag: kind,
                media_query: media_query.to_string(),
                resolution,
                file_name,
            });
        }

        out.push_str(&text[last..]);
        Ok(out)
    }
}

/// `<source ... data-srcset="...identifier..." ...>`, case-insensitive.
/// The attribute value is captured as `value`.
fn tag_regex(kind: TagKind, attribute: &str, identifier: &str) -> Result<Regex, RewriteError> {
    let pattern = format!(
        r#"(?i)<{kind}[^>]*{}="(?P<value>[^"]*{}[^"]*)"[^>]*>"#,
        regex::escape(attribute),
        regex::escape(identifier)
    );
    Ok(Regex::new(&pattern)?)
}

/// `{identifier}.{ext}` inside an attribute value, case-insensitive.
fn file_reference_regex(identifier: &str) -> Result<Regex, RewriteError> {
    let pattern = format!(r"(?i){}\.(?:jpe?g|png|webp)", regex::escape(identifier));
    Ok(Regex::new(&pattern)?)
}

/// Swap every whole reference in `value` for `file_name`, leaving the rest
/// of a multi-candidate srcset alone. `None` when nothing matched.
fn replace_references(pattern: &Regex, value: &str, file_name: &str) -> Option<String> {
    let mut out = String::with_capacity(value.len());
    let mut last = 0;
    while let Some(range) = find_reference(pattern, value, last) {
        out.push_str(&value[last..range.start]);
        out.push_str(file_name);
        last = range.end;
    }
    if out.is_empty() {
        return None;
    }
    out.push_str(&value[last..]);
    Some(out)
}

fn media_attribute(tag: &str) -> Option<&str> {
    static MEDIA: OnceLock<Regex> = OnceLock::new();
    let media = MEDIA
        .get_or_init(|| Regex::new(r#"(?i)(?:^|\s)media="([^"]*)""#).expect("valid regex"));
    media
        .captures(tag)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breakpoint::Reason;
    use crate::report::tests::RecordingReporter;
    use crate::rules::{BreakpointRules, WidthChoice};
    use std::collections::BTreeMap;

    fn alpha_config() -> AppConfig {
        let mut config = AppConfig::default();
        let rules = BreakpointRules {
            widths: BTreeMap::from([
                (1562, WidthChoice::Pair([1800, 1200])),
                (768, WidthChoice::Single(900)),
            ]),
            source_default: Some(500),
            img_default: Some(900),
        };
        config.breakpoints = BTreeMap::from([("ALPHA09".to_string(), rules)]);
        config.replace_order.clear();
        config.no_condition.clear();
        config.carousel.sensitive = BTreeMap::from([("ALPHA09".to_string(), vec![1562])]);
        config
    }

    fn rewrite(config: &AppConfig, text: &str) -> (String, Vec<Substitution>) {
        MarkupRewriter::new(config)
            .rewrite(text, "ALPHA09", "hero-01", &RecordingReporter::new())
            .unwrap()
    }

    const PICTURE: &str = r#"<div class="mCommonsectionImgitem">
<picture>
<source media="(min-width: 1562px) and (min-resolution:2dppx)" data-srcset="/img/hero-01.jpg">
<source media="(min-width: 1562px)" data-srcset="/img/hero-01.jpg">
<source media="(min-width: 768px)" data-srcset="/img/hero-01.png">
<source data-srcset="/img/hero-01.jpg">
<img class="lazy" data-src="/img/hero-01.JPG" alt="hero">
</picture>
</div>"#;

    #[test]
    fn rewrites_each_tag_from_its_media_query() {
        let config = alpha_config();
        let (out, subs) = rewrite(&config, PICTURE);

        let expected = r#"<div class="mCommonsectionImgitem">
<picture>
<source media="(min-width: 1562px) and (min-resolution:2dppx)" data-srcset="/img/hero-011200.webp">
<source media="(min-width: 1562px)" data-srcset="/img/hero-011200.webp">
<source media="(min-width: 768px)" data-srcset="/img/hero-01900.webp">
<source data-srcset="/img/hero-01500.webp">
<img class="lazy" data-src="/img/hero-01900.webp" alt="hero">
</picture>
</div>"#;
        assert_eq!(out, expected);

        let reasons: Vec<(TagKind, Reason)> =
            subs.iter().map(|s| (s.tag, s.resolution.reason)).collect();
        assert_eq!(
            reasons,
            vec![
                (TagKind::Source, Reason::StandardItem),
                (TagKind::Source, Reason::NormalResolution),
                (TagKind::Source, Reason::Single),
                (TagKind::Source, Reason::TagDefault),
                (TagKind::Img, Reason::TagDefault),
            ]
        );
    }

    #[test]
    fn carousel_context_takes_high_width() {
        let config = alpha_config();
        let text = r#"<ul class="top_carousel">
<li>
<picture>
<source media="(min-width: 1562px) and (min-resolution:2dppx)" data-srcset="hero-01.jpg">"#;
        let (out, _) = rewrite(&config, text);
        assert!(out.contains(r#"data-srcset="hero-011800.webp""#));
    }

    #[test]
    fn tag_matching_is_case_insensitive() {
        let config = alpha_config();
        let (out, subs) = rewrite(&config, r#"<SOURCE DATA-SRCSET="HERO-01.JPEG">"#);
        assert_eq!(subs.len(), 1);
        assert_eq!(out, r#"<SOURCE DATA-SRCSET="hero-01500.webp">"#);
    }

    #[test]
    fn sibling_tags_and_attributes_untouched() {
        let config = alpha_config();
        let text = r#"<a href="hero-01.jpg">x</a><source data-srcset="hero-01.jpg" data-alt="hero-01.jpg"><img src="hero-01.jpg">"#;
        let (out, _) = rewrite(&config, text);
        assert!(out.starts_with(r#"<a href="hero-01.jpg">x</a>"#));
        assert!(out.contains(r#"data-srcset="hero-01500.webp" data-alt="hero-01.jpg""#));
        // img has no data-src, so it is not a candidate
        assert!(out.ends_with(r#"<img src="hero-01.jpg">"#));
    }

    #[test]
    fn other_identifiers_untouched() {
        let config = alpha_config();
        let text = r#"<source data-srcset="hero-02.jpg"><img data-src="banner.png">"#;
        let (out, subs) = rewrite(&config, text);
        assert_eq!(out, text);
        assert!(subs.is_empty());
    }

    #[test]
    fn srcset_keeps_other_candidates() {
        let config = alpha_config();
        let text = r#"<source data-srcset="hero-01.jpg 1x, banner.jpg 2x">"#;
        let (out, subs) = rewrite(&config, text);
        assert_eq!(out, r#"<source data-srcset="hero-01500.webp 1x, banner.jpg 2x">"#);
        assert_eq!(subs.len(), 1);
    }

    #[test]
    fn longer_identifier_sharing_prefix_untouched() {
        let config = alpha_config();
        let text = r#"<img data-src="hero-01-sp.jpg"><img data-src="hero-01b.png">"#;
        let (out, subs) = rewrite(&config, text);
        assert_eq!(out, text);
        assert!(subs.is_empty());
    }

    #[test]
    fn uppercase_media_attribute_is_read() {
        let config = alpha_config();
        let text = r#"<SOURCE MEDIA="(min-width: 768px)" DATA-SRCSET="hero-01.jpg">"#;
        let (out, subs) = rewrite(&config, text);
        assert_eq!(
            out,
            r#"<SOURCE MEDIA="(min-width: 768px)" DATA-SRCSET="hero-01900.webp">"#
        );
        assert_eq!(subs[0].resolution.reason, Reason::Single);
    }

    #[test]
    fn reference_without_extension_is_left_and_warned() {
        let config = alpha_config();
        let reporter = RecordingReporter::new();
        let text = r#"<source data-srcset="/img/hero-01/">"#;
        let (out, subs) = MarkupRewriter::new(&config)
            .rewrite(text, "ALPHA09", "hero-01", &reporter)
            .unwrap();
        assert_eq!(out, text);
        assert!(subs.is_empty());
        assert_eq!(reporter.warnings().len(), 1);
    }

    #[test]
    fn identifier_with_regex_metacharacters() {
        let mut config = alpha_config();
        config.breakpoints.insert(
            "BETA01".to_string(),
            BreakpointRules {
                source_default: Some(300),
                img_default: Some(300),
                ..Default::default()
            },
        );
        let (out, _) = MarkupRewriter::new(&config)
            .rewrite(
                r#"<img data-src="a.b+c.png"><img data-src="aXb+c.png">"#,
                "BETA01",
                "a.b+c",
                &RecordingReporter::new(),
            )
            .unwrap();
        assert_eq!(out, r#"<img data-src="a.b+c300.webp"><img data-src="aXb+c.png">"#);
    }

    #[test]
    fn custom_attribute_names() {
        let mut config = alpha_config();
        config.markup.img_attribute = "src".to_string();
        let (out, _) = rewrite(&config, r#"<img src="hero-01.png">"#);
        assert_eq!(out, r#"<img src="hero-01900.webp">"#);
    }

    #[test]
    fn code_without_breakpoints_is_error() {
        let config = alpha_config();
        let result = MarkupRewriter::new(&config).rewrite(
            "<img data-src=\"x.jpg\">",
            "GAMMA01",
            "x",
            &RecordingReporter::new(),
        );
        assert!(matches!(result, Err(RewriteError::UndefinedBreakpointsForCode(c)) if c == "GAMMA01"));
    }

    #[test]
    fn media_attribute_extraction() {
        assert_eq!(
            media_attribute(r#"<source media="(min-width: 10px)" data-srcset="x">"#),
            Some("(min-width: 10px)")
        );
        assert_eq!(media_attribute(r#"<source data-srcset="x">"#), None);
        assert_eq!(
            media_attribute(r#"<source data-media="(min-width: 1px)" media="(min-width: 2px)">"#),
            Some("(min-width: 2px)")
        );
    }
}
