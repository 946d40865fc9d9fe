//! Comment locator: finds a target comment in current page or section source.

use rayon::prelude::*;
use tracing::debug;

use crate::boundary::build;
use crate::config::Config;
use crate::error::Error;
use crate::matcher::{Candidate, MatchContext, match_target};
use crate::signature::scan;
use crate::types::{CommentBoundary, ResolvedSpan, TargetDescriptor};

/// Scan and build the boundaries of one source text.
fn boundaries_of(source: Option<&str>, config: &Config) -> Result<Vec<CommentBoundary>, Error> {
    let text = source.ok_or(Error::NoSource)?;
    let boundaries = build(text, scan(text, config));
    debug!(bytes = text.len(), boundaries = boundaries.len(), "built comment boundaries");
    return Ok(boundaries);
}

/// Find `target` in `source`.
///
/// # Errors
///
/// Returns `Error::NoSource` when `source` is `None`, and the matcher's
/// `NoCandidate` or `Ambiguous` otherwise.
pub fn locate(source: Option<&str>, target: &TargetDescriptor, config: &Config) -> Result<ResolvedSpan, Error> {
    let boundaries = boundaries_of(source, config)?;
    let candidates: Vec<Candidate<'_>> = boundaries.iter().map(Candidate::new).collect();
    return match_target(target, &candidates, &MatchContext::page(config));
}

/// Find several targets in the same source. The text is scanned once and
/// targets are matched in parallel; results keep target order.
///
/// # Errors
///
/// Returns `Error::NoSource` when `source` is `None`. Per-target failures
/// are reported in the returned vector.
pub fn locate_all(
    source: Option<&str>,
    targets: &[TargetDescriptor],
    config: &Config,
) -> Result<Vec<Result<ResolvedSpan, Error>>, Error> {
    let boundaries = boundaries_of(source, config)?;
    let candidates: Vec<Candidate<'_>> = boundaries.iter().map(Candidate::new).collect();
    let context = MatchContext::page(config);

    let results: Vec<_> = targets
        .par_iter()
        .map(|target| return match_target(target, &candidates, &context))
        .collect();

    let found = results.iter().filter(|r| return r.is_ok()).count();
    debug!(targets = targets.len(), found, "located targets");
    return Ok(results);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AuthorId, PrecedingComment};

    const TS_A: &str = "09:15, 3 June 2022 (UTC)";
    const TS_B: &str = "11:40, 3 June 2022 (UTC)";

    fn page() -> String {
        return format!(
            "== Merge proposal ==\n\
             I think the two articles should be merged into one. [[User:Alice|Alice]] ([[User talk:Alice|talk]]) {TS_A}\n\
             :Agreed, merging makes sense. [[User:Bob|Bob]] {TS_B}\n"
        );
    }

    #[test]
    fn missing_source_is_an_error() {
        let config = Config::default();
        let target = TargetDescriptor::new(AuthorId::named("Alice"), Some(TS_A));
        assert!(matches!(locate(None, &target, &config), Err(Error::NoSource)));
        assert!(matches!(locate_all(None, &[target], &config), Err(Error::NoSource)));
    }

    #[test]
    fn second_author_resolves_to_second_span() {
        let config = Config::default();
        let text = page();
        let mut target = TargetDescriptor::new(AuthorId::named("Bob"), Some("11:40, 3 June 2022"));
        target.ordinal = Some(1);
        target.full_text = "I think the two articles should be merged into one.".to_string();
        target.previous_comments.push(PrecedingComment {
            author: AuthorId::named("Alice"),
            timestamp_text: Some(TS_A.to_string()),
        });

        let found = locate(Some(&text), &target, &config).unwrap();
        let bob_line = text.find(":Agreed").unwrap();
        assert_eq!(found.boundary.span_start, bob_line);
        assert_eq!(found.boundary.signature.author, AuthorId::named("Bob"));
        assert_eq!(text.get(found.boundary.span()).unwrap(), format!(":Agreed, merging makes sense. [[User:Bob|Bob]] {TS_B}"));
    }

    #[test]
    fn first_comment_span_skips_heading() {
        let config = Config::default();
        let text = page();
        let mut target = TargetDescriptor::new(AuthorId::named("Alice"), Some(TS_A));
        target.ordinal = Some(0);
        target.follows_heading_text = Some("Merge proposal".to_string());

        let found = locate(Some(&text), &target, &config).unwrap();
        assert_eq!(found.boundary.span_start, text.find("I think").unwrap());
        assert_eq!(found.boundary.follows_heading.as_deref(), Some("Merge proposal"));
    }

    #[test]
    fn unknown_author_is_not_found() {
        let config = Config::default();
        let text = page();
        let target = TargetDescriptor::new(AuthorId::named("Mallory"), Some(TS_A));
        let err = locate(Some(&text), &target, &config).unwrap_err();
        assert!(matches!(err, Error::NoCandidate { .. }));
    }

    fn threaded_page(bob_lines: usize) -> String {
        let mut text = format!("I think the two articles should be merged. [[User:Alice|Alice]] {TS_A}\n");
        for name in ["Xena", "Yuri", "Zed"] {
            text.push_str(&format!("::Reply from {name}. [[User:{name}|{name}]] {TS_A}\n"));
        }
        for _ in 0..bob_lines {
            text.push_str(&format!(":Agreed, merging makes sense. [[User:Bob|Bob]] {TS_B}\n"));
        }
        return text;
    }

    fn bob_after_alice() -> TargetDescriptor {
        let mut target = TargetDescriptor::new(AuthorId::named("Bob"), Some(TS_B));
        target.ordinal = Some(1);
        target.full_text = ":Agreed, merging makes sense.".to_string();
        target.previous_comments.push(PrecedingComment {
            author: AuthorId::named("Alice"),
            timestamp_text: Some(TS_A.to_string()),
        });
        return target;
    }

    #[test]
    fn inserted_replies_do_not_hide_a_unique_comment() {
        let config = Config::default();
        let text = threaded_page(1);

        let found = locate(Some(&text), &bob_after_alice(), &config).unwrap();
        assert_eq!(found.boundary.signature.ordinal, 4);
        assert_eq!(found.boundary.span_start, text.find(":Agreed").unwrap());
        assert!(found.score > config.acceptance_threshold(), "score {}", found.score);
    }

    #[test]
    fn nearest_duplicate_wins_after_inserted_replies() {
        let config = Config::default();
        let text = threaded_page(2);

        let found = locate(Some(&text), &bob_after_alice(), &config).unwrap();
        assert_eq!(found.boundary.signature.ordinal, 4);
        assert_eq!(found.boundary.span_start, text.find(":Agreed").unwrap());
    }

    #[test]
    fn removed_comments_do_not_hide_a_unique_comment() {
        let config = Config::default();
        let text = page();
        let mut target = TargetDescriptor::new(AuthorId::named("Bob"), Some(TS_B));
        target.ordinal = Some(6);
        target.full_text = ":Agreed, merging makes sense.".to_string();

        let found = locate(Some(&text), &target, &config).unwrap();
        assert_eq!(found.boundary.signature.ordinal, 1);
    }

    #[test]
    fn locate_all_keeps_target_order() {
        let config = Config::default();
        let text = page();
        let targets = vec![
            TargetDescriptor::new(AuthorId::named("Bob"), Some(TS_B)),
            TargetDescriptor::new(AuthorId::named("Mallory"), None),
            TargetDescriptor::new(AuthorId::named("Alice"), Some(TS_A)),
        ];
        let results = locate_all(Some(&text), &targets, &config).unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().boundary.signature.author, AuthorId::named("Bob"));
        assert!(results[1].is_err());
        assert_eq!(results[2].as_ref().unwrap().boundary.signature.author, AuthorId::named("Alice"));
    }
}
