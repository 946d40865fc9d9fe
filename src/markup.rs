//! Reduction of wikitext to plain words for similarity comparison.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

/// Innermost template invocation.
#[allow(clippy::expect_used, reason = "fixed pattern")]
static TEMPLATE: LazyLock<Regex> = LazyLock::new(|| return Regex::new(r"\{\{[^{}]*\}\}").expect("valid regex"));

/// File and category links, dropped entirely.
#[allow(clippy::expect_used, reason = "fixed pattern")]
static MEDIA_LINK: LazyLock<Regex> = LazyLock::new(|| {
    return Regex::new(r"(?i)\[\[\s*:?\s*(?:file|image|category)\s*:[^\[\]]*(?:\[\[[^\[\]]*\]\][^\[\]]*)*\]\]")
        .expect("valid regex");
});

/// Internal link; capture 1 is the target, capture 2 the optional label.
#[allow(clippy::expect_used, reason = "fixed pattern")]
static WIKI_LINK: LazyLock<Regex> =
    LazyLock::new(|| return Regex::new(r"\[\[([^\[\]|]*)(?:\|([^\[\]]*))?\]\]").expect("valid regex"));

/// External link with label; capture 1 is the label.
#[allow(clippy::expect_used, reason = "fixed pattern")]
static EXTERNAL_LINK: LazyLock<Regex> =
    LazyLock::new(|| return Regex::new(r"\[(?:https?:)?//[^\s\]]+\s*([^\]]*)\]").expect("valid regex"));

/// HTML comments and tags.
#[allow(clippy::expect_used, reason = "fixed pattern")]
static HTML: LazyLock<Regex> = LazyLock::new(|| return Regex::new(r"(?s)<!--.*?(?:-->|\z)|</?[A-Za-z][^<>]*>").expect("valid regex"));

/// Bold and italic quote runs, list and indent markers, heading markers.
#[allow(clippy::expect_used, reason = "fixed pattern")]
static FORMATTING: LazyLock<Regex> =
    LazyLock::new(|| return Regex::new(r"(?m)'{2,}|^[:*#;]+|^=+|=+[ \t]*$").expect("valid regex"));

/// Upper bound on nested template removal rounds.
const MAX_TEMPLATE_DEPTH: usize = 8;

/// Strip markup and compare as lowercase, whitespace-collapsed text.
/// Used for heading equality.
pub fn comparable_heading(text: &str) -> String {
    return strip_markup(text).to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ");
}

/// Dice coefficient of the unique word sets of a target text (`left`) and a
/// candidate text (`right`). `None` when the target has no words, so the
/// feature is not applicable; `0` when only the candidate is empty.
pub fn word_overlap(left: &str, right: &str) -> Option<f64> {
    let left_words = words(left);
    if left_words.is_empty() {
        return None;
    }
    let right_words = words(right);
    if right_words.is_empty() {
        return Some(0.0);
    }
    let common = left_words.intersection(&right_words).count();
    let total = left_words.len().saturating_add(right_words.len());
    let ratio = f64::from(u32::try_from(common.saturating_mul(2)).unwrap_or(u32::MAX))
        / f64::from(u32::try_from(total).unwrap_or(u32::MAX));
    return Some(ratio.clamp(0.0, 1.0));
}

/// Reduce wikitext to the text a reader sees: link labels kept, templates,
/// tags, files, and formatting removed.
pub fn strip_markup(text: &str) -> String {
    let mut out = HTML.replace_all(text, " ").into_owned();
    for _ in 0..MAX_TEMPLATE_DEPTH {
        if !TEMPLATE.is_match(&out) {
            break;
        }
        out = TEMPLATE.replace_all(&out, " ").into_owned();
    }
    out = MEDIA_LINK.replace_all(&out, " ").into_owned();
    out = WIKI_LINK
        .replace_all(&out, |caps: &regex::Captures<'_>| {
            return caps
                .get(2)
                .or_else(|| return caps.get(1))
                .map_or_else(String::new, |m| return m.as_str().to_string());
        })
        .into_owned();
    out = EXTERNAL_LINK.replace_all(&out, "$1").into_owned();
    out = FORMATTING.replace_all(&out, "").into_owned();
    return out.split_whitespace().collect::<Vec<_>>().join(" ");
}

/// Unique lowercase alphanumeric words.
fn words(text: &str) -> HashSet<String> {
    return text
        .split(|c: char| return !c.is_alphanumeric())
        .filter(|w| return !w.is_empty())
        .map(str::to_lowercase)
        .collect();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_link_labels() {
        assert_eq!(strip_markup("See [[Main Page|the main page]] and [[Help]]."), "See the main page and Help.");
    }

    #[test]
    fn drops_templates_files_and_tags() {
        let text = "I '''agree''' {{tq|{{small|quoted}}}} <small>really</small> [[File:X.png|thumb|caption]]";
        assert_eq!(strip_markup(text), "I agree really");
    }

    #[test]
    fn keeps_external_link_labels() {
        assert_eq!(strip_markup("Source: [https://example.org the report]"), "Source: the report");
    }

    #[test]
    fn strips_indent_markers() {
        assert_eq!(strip_markup(":: Indented reply\n* bullet"), "Indented reply bullet");
    }

    #[test]
    fn overlap_of_identical_texts_is_one() {
        let overlap = word_overlap("the quick brown fox", "Fox brown quick the").unwrap();
        assert!((overlap - 1.0).abs() < 1e-9);
    }

    #[test]
    fn overlap_is_partial() {
        let overlap = word_overlap("alpha beta", "beta gamma").unwrap();
        assert!((overlap - 0.5).abs() < 1e-9);
    }

    #[test]
    fn overlap_without_target_words_is_not_applicable() {
        assert_eq!(word_overlap("", "words"), None);
        assert_eq!(word_overlap("!!!", "words"), None);
    }

    #[test]
    fn markup_only_candidate_scores_zero() {
        let candidate = strip_markup("{{agree}} [[File:Thumbs up.svg|20px]]");
        assert_eq!(word_overlap("I agree with the merge", &candidate), Some(0.0));
    }

    #[test]
    fn headings_compare_loosely() {
        assert_eq!(comparable_heading("  Proposal: [[Merge]]  ''now'' "), "proposal: merge now");
    }
}
