//! Blanking of constructs that contain signature-like text but are not
//! comments: HTML comments, quoted material, code, and antipattern lines.
//!
//! Masked characters become ASCII spaces of the same byte length and newlines
//! are kept, so every byte offset and line break of the original survives.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

use crate::config::Config;

/// HTML comments, including one left unterminated at the end of the text.
#[allow(clippy::expect_used, reason = "fixed pattern")]
static HTML_COMMENT: LazyLock<Regex> = LazyLock::new(|| return Regex::new(r"(?s)<!--.*?(?:-->|\z)").expect("valid regex"));

/// Replace masked ranges with spaces, keeping newlines and byte lengths.
fn blank_ranges(text: &str, ranges: &[Range<usize>]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut next_range = 0_usize;
    for (index, ch) in text.char_indices() {
        while ranges.get(next_range).is_some_and(|r| return r.end <= index) {
            next_range = next_range.saturating_add(1);
        }
        let masked = ranges.get(next_range).is_some_and(|r| return r.contains(&index));
        if masked && ch != '\n' {
            out.extend(std::iter::repeat_n(' ', ch.len_utf8()));
        } else {
            out.push(ch);
        }
    }
    return out;
}

/// Byte range of the template invocation opening at `open`, up to and
/// including its balanced closing braces, or to the end of the text.
fn balanced_template_end(text: &str, open: usize) -> usize {
    let bytes = text.as_bytes();
    let mut depth = 0_usize;
    let mut index = open;
    while let Some(pair) = bytes.get(index..index.saturating_add(2)) {
        match pair {
            b"{{" => {
                depth = depth.saturating_add(1);
                index = index.saturating_add(2);
            },
            b"}}" => {
                depth = depth.saturating_sub(1);
                index = index.saturating_add(2);
                if depth == 0 {
                    return index;
                }
            },
            _ => index = index.saturating_add(1),
        }
    }
    return text.len();
}

/// Ranges of lines matching any configured antipattern, newline excluded.
fn collect_antipattern_lines(text: &str, config: &Config, ranges: &mut Vec<Range<usize>>) {
    if config.antipatterns().is_empty() {
        return;
    }
    let mut line_start = 0_usize;
    for line in text.split_inclusive('\n') {
        let content = line.trim_end_matches(['\n', '\r']);
        if config.antipatterns().iter().any(|re| return re.is_match(content)) {
            ranges.push(line_start..line_start.saturating_add(content.len()));
        }
        line_start = line_start.saturating_add(line.len());
    }
}

/// Ranges of configured quote template invocations, nesting included.
fn collect_quote_templates(text: &str, config: &Config, ranges: &mut Vec<Range<usize>>) {
    let mut search_from = 0_usize;
    while let Some(found) = text.get(search_from..).and_then(|rest| return rest.find("{{")) {
        let open = search_from.saturating_add(found);
        let name = template_name_at(text, open);
        if config.is_quote_template(name) {
            let end = balanced_template_end(text, open);
            ranges.push(open..end);
            search_from = end;
        } else {
            search_from = open.saturating_add(2);
        }
    }
}

/// Blank every distracting construct in `text`. The result has the same
/// byte length and the same line breaks as the input.
pub fn mask_distractions(text: &str, config: &Config) -> String {
    let mut ranges: Vec<Range<usize>> = HTML_COMMENT.find_iter(text).map(|m| return m.range()).collect();
    for element in config.masked_elements() {
        ranges.extend(element.find_iter(text).map(|m| return m.range()));
    }
    collect_quote_templates(text, config, &mut ranges);
    collect_antipattern_lines(text, config, &mut ranges);

    if ranges.is_empty() {
        return text.to_string();
    }
    return blank_ranges(text, &merge_ranges(ranges));
}

/// Sort and merge overlapping or touching ranges.
fn merge_ranges(mut ranges: Vec<Range<usize>>) -> Vec<Range<usize>> {
    ranges.sort_by_key(|r| return (r.start, r.end));
    let mut merged: Vec<Range<usize>> = Vec::with_capacity(ranges.len());
    for range in ranges {
        match merged.last_mut() {
            Some(last) if range.start <= last.end => last.end = last.end.max(range.end),
            _ => merged.push(range),
        }
    }
    return merged;
}

/// Name of the template opening at `open` (text between `{{` and the first
/// `|`, `}`, or newline).
fn template_name_at(text: &str, open: usize) -> &str {
    let rest = text.get(open.saturating_add(2)..).unwrap_or("");
    let end = rest.find(['|', '}', '\n']).unwrap_or(rest.len());
    let name = rest.get(..end).unwrap_or("").trim();
    return name.strip_prefix("Template:").unwrap_or(name).trim();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_length_and_newlines() {
        let config = Config::default();
        let text = "a <!-- hidden\nnote --> b\n<blockquote>é\n</blockquote>c";
        let masked = mask_distractions(text, &config);
        assert_eq!(masked.len(), text.len());
        assert_eq!(masked.matches('\n').count(), text.matches('\n').count());
        assert!(!masked.contains("hidden"));
        assert!(!masked.contains('é'));
        assert!(masked.ends_with('c'));
    }

    #[test]
    fn masks_nested_quote_templates() {
        let config = Config::default();
        let text = "before {{Quote|text {{small|x}} more}} after";
        let masked = mask_distractions(text, &config);
        assert_eq!(masked.len(), text.len());
        assert!(masked.starts_with("before "));
        assert!(masked.ends_with(" after"));
        assert!(!masked.contains("small"));
    }

    #[test]
    fn masks_antipattern_lines_only() {
        let config = Config::default();
        let text = "keep\n{{no signature}} drop\nkeep too";
        let masked = mask_distractions(text, &config);
        let lines: Vec<&str> = masked.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "keep");
        assert_eq!(lines[1], " ".repeat("{{no signature}} drop".len()));
        assert_eq!(lines[2], "keep too");
    }

    #[test]
    fn unterminated_comment_runs_to_end() {
        let config = Config::default();
        let masked = mask_distractions("x <!-- open", &config);
        assert_eq!(masked.trim_end(), "x");
    }

    #[test]
    fn leaves_plain_text_untouched() {
        let config = Config::default();
        let text = "Nothing to hide here.\n";
        assert_eq!(mask_distractions(text, &config), text);
    }
}
