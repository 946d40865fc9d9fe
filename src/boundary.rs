//! Comment boundary builder: turns ordered signature records into the
//! byte spans of the comments they terminate.

use std::sync::LazyLock;

use regex::Regex;

use crate::types::{CommentBoundary, PrecedingComment, SignatureKind, SignatureRecord};

/// Number of preceding comments remembered per boundary.
pub const PRECEDING_COMMENTS: usize = 2;

/// A wikitext heading line (`== Title ==`).
#[allow(clippy::expect_used, reason = "fixed pattern")]
static HEADING: LazyLock<Regex> =
    LazyLock::new(|| return Regex::new(r"(?m)^(={1,6})[ \t]*(.+?)[ \t]*(={1,6})[ \t]*\r?$").expect("valid regex"));

/// A heading line located in the text.
#[derive(Debug, Clone)]
struct Heading {
    /// End of the heading line including its newline.
    end: usize,
    /// Start of the heading line.
    start: usize,
    /// Heading text without the `=` markers.
    title: String,
}

/// Build one boundary per non-draft record. Pure and total.
///
/// Each span runs from the record's comment start to its signature end. A
/// heading between the previous comment and this one is cut off the front
/// of the span and recorded as `follows_heading`.
pub fn build(text: &str, records: Vec<SignatureRecord>) -> Vec<CommentBoundary> {
    let headings = find_headings(text);
    let mut boundaries: Vec<CommentBoundary> = Vec::with_capacity(records.len());

    for record in records.into_iter().filter(|r| return r.kind != SignatureKind::Draft) {
        let mut span_start = record.comment_start_index.min(record.start_index);
        let mut follows_heading = None;
        if let Some(heading) = headings
            .iter()
            .rev()
            .find(|h| return h.start >= span_start && h.end <= record.start_index)
        {
            span_start = heading.end;
            follows_heading = Some(heading.title.clone());
        }

        let section_headline = headings
            .iter()
            .rev()
            .find(|h| return h.end <= span_start)
            .map(|h| return h.title.clone());

        let previous = boundaries
            .iter()
            .rev()
            .take(PRECEDING_COMMENTS)
            .map(|b| {
                return PrecedingComment {
                    author: b.signature.author.clone(),
                    timestamp_text: b.signature.timestamp_text.clone(),
                };
            })
            .collect();

        boundaries.push(CommentBoundary {
            follows_heading,
            previous,
            section_headline,
            span_end: record.end_index,
            span_start,
            text: text.get(span_start..record.start_index).unwrap_or("").to_string(),
            signature: record,
        });
    }

    return boundaries;
}

/// All heading lines in text order. With unbalanced markers the extra `=`
/// belong to the title, as wikitext renders them.
fn find_headings(text: &str) -> Vec<Heading> {
    return HEADING
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let opening = caps.get(1)?.as_str().len();
            let closing = caps.get(3)?.as_str().len();
            let level = opening.min(closing);
            let title = format!(
                "{}{}{}",
                "=".repeat(opening.saturating_sub(level)),
                caps.get(2)?.as_str(),
                "=".repeat(closing.saturating_sub(level))
            );
            let rest = text.get(whole.end()..).unwrap_or("");
            let end = if rest.starts_with('\n') { whole.end().saturating_add(1) } else { whole.end() };
            return Some(Heading {
                end,
                start: whole.start(),
                title: title.trim().to_string(),
            });
        })
        .collect();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::signature::scan;
    use crate::types::AuthorId;

    const TS: &str = "10:00, 1 May 2021 (UTC)";

    fn line(author: &str) -> String {
        return format!("Point from {author}. [[User:{author}|{author}]] {TS} trailing\n");
    }

    #[test]
    fn boundaries_tile_signature_lines() {
        let config = Config::default();
        let text = format!("{}{}{}", line("Alice"), line("Bob"), line("Carol"));
        let records = scan(&text, &config);
        let boundaries = build(&text, records.clone());

        assert_eq!(boundaries.len(), 3);
        assert_eq!(boundaries[0].span_start, 0);
        for i in 0..boundaries.len().saturating_sub(1) {
            assert_eq!(boundaries[i + 1].span_start, records[i].next_comment_start_index);
            assert!(boundaries[i].span_end <= boundaries[i + 1].span_start);
        }
        assert_eq!(boundaries[1].text, "Point from Bob. ");
    }

    #[test]
    fn boundaries_remember_two_predecessors() {
        let config = Config::default();
        let text = format!("{}{}{}", line("Alice"), line("Bob"), line("Carol"));
        let boundaries = build(&text, scan(&text, &config));

        assert!(boundaries[0].previous.is_empty());
        let previous = &boundaries[2].previous;
        assert_eq!(previous.len(), 2);
        assert_eq!(previous[0].author, AuthorId::named("Bob"));
        assert_eq!(previous[1].author, AuthorId::named("Alice"));
        assert_eq!(previous[0].timestamp_text.as_deref(), Some(TS));
    }

    #[test]
    fn heading_is_cut_from_span() {
        let config = Config::default();
        let text = format!("{}== Second topic ==\n{}", line("Alice"), line("Bob"));
        let boundaries = build(&text, scan(&text, &config));

        assert_eq!(boundaries[0].follows_heading, None);
        assert_eq!(boundaries[0].section_headline, None);
        assert_eq!(boundaries[1].follows_heading.as_deref(), Some("Second topic"));
        assert_eq!(boundaries[1].section_headline.as_deref(), Some("Second topic"));
        assert!(boundaries[1].text.starts_with("Point from Bob"));
    }

    #[test]
    fn section_headline_carries_forward() {
        let config = Config::default();
        let text = format!("=== Topic ===\n{}{}", line("Alice"), line("Bob"));
        let boundaries = build(&text, scan(&text, &config));
        assert_eq!(boundaries[0].follows_heading.as_deref(), Some("Topic"));
        assert_eq!(boundaries[1].follows_heading, None);
        assert_eq!(boundaries[1].section_headline.as_deref(), Some("Topic"));
    }

    #[test]
    fn unbalanced_heading_keeps_extra_markers() {
        let headings = find_headings("=== Odd ==\n");
        assert_eq!(headings.len(), 1);
        assert_eq!(headings[0].title, "=Odd");
    }

    #[test]
    fn drafts_are_not_boundaries() {
        let config = Config::default();
        let text = format!("{}Draft reply ~~~~\n{}", line("Alice"), line("Bob"));
        let records = scan(&text, &config);
        let draft_end = records[1].next_comment_start_index;
        let boundaries = build(&text, records);
        assert_eq!(boundaries.len(), 2);
        assert_eq!(boundaries[1].span_start, draft_end);
    }

    #[test]
    fn empty_input_builds_nothing() {
        assert!(build("", Vec::new()).is_empty());
    }
}
