//! Placeholder matching for WordprocessingML text.
//!
//! Word frequently splits `{{applicant_name}}` into several runs
//! (`{{` / `applicant` / `_name}}`) with spell-check or revision markup between the
//! pieces. Each known placeholder is first collapsed back into one literal token and
//! then every token is substituted in a single pass.

use std::sync::Arc;

use lazy_static::lazy_static;
use moka::sync::Cache;
use regex::Regex;

use super::Replacements;

/// Keys shorter than this are matched literally.
const MIN_FRAGMENT_KEY_LEN: usize = 4;

/// Markup inserted between characters of a single placeholder: whitespace or any tag.
const GAP: &str = r"(?:\s|<[^>]+>)*";

const LINE_BREAK: &str = r#"</w:t><w:br/><w:t xml:space="preserve">"#;

lazy_static! {
    /// Zero-width annotations that carry no content.
    static ref ANNOTATION_TAGS: Regex =
        Regex::new(r"<w:(?:proofErr|lastRenderedPageBreak)\b[^>]*/>").expect("valid annotation pattern");
    static ref PLACEHOLDER_PATTERNS: Cache<String, Arc<Regex>> = Cache::new(512);
}

/// Escape the five XML-significant characters.
pub fn xml_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Escaped value ready to sit inside `<w:t>`; newlines become `<w:br/>` between runs.
pub fn format_docx_value(value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }
    let normalized = value.replace("\r\n", "\n").replace('\r', "\n");
    normalized
        .split('\n')
        .map(xml_escape)
        .collect::<Vec<_>>()
        .join(LINE_BREAK)
}

/// Pattern matching `placeholder` even when markup is interleaved between its characters.
pub fn placeholder_pattern(placeholder: &str) -> Arc<Regex> {
    if let Some(cached) = PLACEHOLDER_PATTERNS.get(placeholder) {
        return cached;
    }

    let key = placeholder.trim();
    let pattern = if key.chars().count() < MIN_FRAGMENT_KEY_LEN {
        regex::escape(placeholder)
    } else {
        let inner = key.strip_prefix("{{").unwrap_or(key);
        let inner = inner.strip_suffix("}}").unwrap_or(inner);

        let mut pattern = String::from(r"\{\{");
        pattern.push_str(GAP);
        for ch in inner.chars() {
            pattern.push_str(&regex::escape(&ch.to_string()));
            pattern.push_str(GAP);
        }
        pattern.push_str(r"\}\}");
        pattern
    };

    let compiled = Arc::new(Regex::new(&pattern).unwrap_or_else(|_| {
        Regex::new(&regex::escape(placeholder)).expect("escaped literal is a valid pattern")
    }));
    PLACEHOLDER_PATTERNS.insert(placeholder.to_string(), compiled.clone());
    compiled
}

/// Collapse fragmented placeholders into clean tokens.
pub fn normalize_placeholders(content: &str, replacements: &Replacements) -> String {
    if replacements.is_empty() {
        return content.to_string();
    }

    let mut normalized = ANNOTATION_TAGS.replace_all(content, "").into_owned();
    for placeholder in replacements.keys() {
        let pattern = placeholder_pattern(placeholder);
        normalized = pattern
            .replace_all(&normalized, regex::NoExpand(placeholder.as_str()))
            .into_owned();
    }
    normalized
}

/// Substitute every placeholder in one XML part.
///
/// Substitution is a single pass, so a value that itself looks like a placeholder is
/// never expanded again.
pub fn render_xml_part(content: &str, replacements: &Replacements) -> String {
    if replacements.is_empty() {
        return content.to_string();
    }

    let normalized = normalize_placeholders(content, replacements);

    let mut keys: Vec<&String> = replacements.keys().filter(|k| !k.is_empty()).collect();
    if keys.is_empty() {
        return normalized;
    }
    keys.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));

    let alternation = keys
        .iter()
        .map(|k| regex::escape(k))
        .collect::<Vec<_>>()
        .join("|");
    let tokens = match Regex::new(&alternation) {
        Ok(re) => re,
        Err(e) => {
            log::warn!("failed to build placeholder alternation, substituting sequentially: {}", e);
            let mut out = normalized;
            for key in keys {
                out = out.replace(key.as_str(), &format_docx_value(&replacements[key.as_str()]));
            }
            return out;
        }
    };

    tokens
        .replace_all(&normalized, |caps: &regex::Captures| {
            replacements
                .get(&caps[0])
                .map(|value| format_docx_value(value))
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}
