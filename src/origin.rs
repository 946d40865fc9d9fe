//! Edit-origin locator: finds the revision whose diff added a comment.

use serde::Deserialize;
use tracing::debug;

use crate::boundary::build;
use crate::config::Config;
use crate::error::Error;
use crate::markup::strip_markup;
use crate::matcher::{Candidate, MatchContext, match_target};
use crate::signature::scan;
use crate::types::{CommentBoundary, RevisionMeta, TargetDescriptor};

/// One revision and the diff it introduced.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RevisionDiff {
    /// Unified diff against the parent, or the added text itself.
    pub diff: String,
    /// Revision metadata returned when this revision wins.
    pub meta: RevisionMeta,
}

/// Text added by a revision. For a unified diff these are the `+` lines
/// without the marker; `+++` file headers are skipped. Text without any
/// hunk header is returned unchanged.
pub fn added_text(diff: &str) -> String {
    if !diff.lines().any(|line| return line.starts_with("@@")) {
        return diff.to_string();
    }
    return diff
        .lines()
        .filter(|line| return !line.starts_with("+++"))
        .filter_map(|line| return line.strip_prefix('+'))
        .fold(String::new(), |mut out, line| {
            out.push_str(line);
            out.push('\n');
            return out;
        });
}

/// Find which revision added `target`.
///
/// Revisions adding nothing but markup are skipped. Every comment boundary in
/// the remaining added texts becomes a candidate dated with its revision's
/// timestamp; the target's date is parsed from its timestamp text when the
/// caller did not set it.
///
/// # Errors
///
/// Returns `Error::NoCandidate` when no added comment matches and
/// `Error::Ambiguous` when several revisions match equally well.
pub fn find_originating_edit(
    target: &TargetDescriptor,
    revisions: &[RevisionDiff],
    config: &Config,
) -> Result<RevisionMeta, Error> {
    let mut target = target.clone();
    if target.date.is_none() {
        target.date = target.timestamp_text.as_deref().and_then(|text| {
            return config
                .grammar()
                .parse(text)
                .map_err(|e| debug!("target date unknown: {e}"))
                .ok();
        });
    }

    let per_revision: Vec<(&RevisionDiff, Vec<CommentBoundary>)> = revisions
        .iter()
        .filter_map(|revision| {
            let added = added_text(&revision.diff);
            if strip_markup(&added).is_empty() {
                debug!(revision = revision.meta.id, "skipping revision without added text");
                return None;
            }
            let boundaries = build(&added, scan(&added, config));
            return Some((revision, boundaries));
        })
        .collect();

    let mut owners: Vec<&RevisionDiff> = Vec::new();
    let mut candidates: Vec<Candidate<'_>> = Vec::new();
    for (revision, boundaries) in &per_revision {
        for boundary in boundaries {
            owners.push(revision);
            candidates.push(Candidate::dated(boundary, revision.meta.timestamp));
        }
    }
    debug!(
        revisions = revisions.len(),
        scanned = per_revision.len(),
        candidates = candidates.len(),
        "matching against added comments"
    );

    let resolved = match_target(&target, &candidates, &MatchContext::edit_origin(config))?;
    let owner = owners.get(resolved.candidate_index).ok_or_else(|| {
        return Error::NoCandidate {
            author: target.author.display_name().to_string(),
            timestamp: target.timestamp_text.clone(),
        };
    })?;
    return Ok(owner.meta.clone());
}
