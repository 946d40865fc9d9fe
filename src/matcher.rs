//! Candidate matcher: hard author/timestamp filter, weighted soft score,
//! threshold, and tie-breaking over a set of comment boundaries.

use std::ops::Range;

use chrono::{DateTime, Utc};
use tracing::trace;

use crate::config::Config;
use crate::error::Error;
use crate::markup::{comparable_heading, strip_markup, word_overlap};
use crate::types::{CommentBoundary, PrecedingComment, ResolvedSpan, TargetDescriptor};
use crate::weights::{EDIT_ORIGIN_PROFILE, PAGE_PROFILE, TIE_EPSILON, TieBreak, WeightProfile};

/// One boundary offered to the matcher, with the time of the text it was
/// found in (the revision time for diffs).
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'b> {
    /// The comment boundary.
    pub boundary: &'b CommentBoundary,
    /// When the containing text was written, if known.
    pub written_at: Option<DateTime<Utc>>,
}

impl<'b> Candidate<'b> {
    /// A candidate from text with a known save time.
    pub const fn dated(boundary: &'b CommentBoundary, written_at: Option<DateTime<Utc>>) -> Self {
        return Self { boundary, written_at };
    }

    /// A candidate from current page text.
    pub const fn new(boundary: &'b CommentBoundary) -> Self {
        return Self { boundary, written_at: None };
    }
}

/// Normalized feature values of one candidate. `None` means the feature is
/// not applicable and carries no weight.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Features {
    /// Agreement of preceding comments.
    pub context: Option<f64>,
    /// Heading and headline equality.
    pub heading: Option<f64>,
    /// Ordinal proximity.
    pub index: Option<f64>,
    /// Revision time proximity.
    pub temporal: Option<f64>,
    /// Word overlap.
    pub text: Option<f64>,
}

impl Features {
    /// Value of the profile's tie-break feature.
    pub const fn tie_break_value(&self, tie_break: TieBreak) -> Option<f64> {
        return match tie_break {
            TieBreak::Index => self.index,
            TieBreak::Temporal => self.temporal,
        };
    }

    /// Weighted mean of applicable features, in `[0, 1]`. With no applicable
    /// feature nothing contradicts the hard filter and the score is `1`.
    pub fn weighted_score(&self, profile: &WeightProfile) -> f64 {
        let pairs = [
            (self.context, profile.context),
            (self.heading, profile.heading),
            (self.index, profile.index),
            (self.temporal, profile.temporal),
            (self.text, profile.text),
        ];
        let (sum, total_weight) = pairs
            .iter()
            .filter_map(|(value, weight)| return value.filter(|_| return *weight > 0.0).map(|v| return (v, *weight)))
            .fold((0.0_f64, 0.0_f64), |(sum, total), (value, weight)| {
                return (value.mul_add(weight, sum), total + weight);
            });
        if total_weight <= 0.0 {
            return 1.0;
        }
        return (sum / total_weight).clamp(0.0, 1.0);
    }
}

/// Profile and threshold for one matching call site.
#[derive(Debug, Clone, Copy)]
pub struct MatchContext<'p> {
    /// Feature weights and tie-break.
    pub profile: &'p WeightProfile,
    /// Scores must exceed this to be accepted.
    pub threshold: f64,
}

impl MatchContext<'static> {
    /// Context for attributing a comment to a revision diff.
    pub const fn edit_origin(config: &Config) -> Self {
        return Self {
            profile: &EDIT_ORIGIN_PROFILE,
            threshold: config.acceptance_threshold(),
        };
    }

    /// Context for re-finding a comment in page or section source.
    pub const fn page(config: &Config) -> Self {
        return Self {
            profile: &PAGE_PROFILE,
            threshold: config.acceptance_threshold(),
        };
    }
}

/// A scored candidate; lives only for one matching call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchCandidate {
    /// Feature values behind the score.
    pub features: Features,
    /// Position in the candidate list.
    pub index: usize,
    /// Weighted score in `[0, 1]`.
    pub score: f64,
}

/// Agreement between the target's recorded predecessors and the candidate's.
/// Without recorded predecessors the feature only applies when the target's
/// position is known, and then means "this is the first comment".
fn context_feature(target: &TargetDescriptor, boundary: &CommentBoundary) -> Option<f64> {
    if target.previous_comments.is_empty() {
        if target.ordinal.is_none() {
            return None;
        }
        return Some(if boundary.previous.is_empty() { 1.0 } else { 0.0 });
    }
    let agreeing = target
        .previous_comments
        .iter()
        .enumerate()
        .filter(|(distance, wanted)| {
            return boundary.previous.get(*distance).is_some_and(|actual| return same_comment(wanted, actual));
        })
        .count();
    return Some(ratio(agreeing, target.previous_comments.len()));
}

/// Compute every feature of one candidate. `nearest` is the smallest
/// ordinal distance among the filtered candidates; index proximity is
/// measured from it, so comments inserted or removed above the target do
/// not penalize the closest survivor.
fn features_of(target: &TargetDescriptor, target_plain: &str, candidate: &Candidate<'_>, nearest: usize) -> Features {
    let boundary = candidate.boundary;
    return Features {
        context: context_feature(target, boundary),
        heading: heading_feature(target, boundary),
        index: target.ordinal.map(|ordinal| {
            return inverse_distance(ordinal.abs_diff(boundary.signature.ordinal).saturating_sub(nearest));
        }),
        temporal: match (target.date, candidate.written_at) {
            (Some(wanted), Some(written)) => {
                let minutes = written.signed_duration_since(wanted).num_minutes().unsigned_abs();
                Some(inverse_distance(usize::try_from(minutes).unwrap_or(usize::MAX)))
            },
            _ => None,
        },
        text: word_overlap(target_plain, &strip_markup(&boundary.text)),
    };
}

/// Hard filter: author and timestamp must be compatible.
pub fn passes_hard_filter(target: &TargetDescriptor, boundary: &CommentBoundary) -> bool {
    let signature = &boundary.signature;
    return target.author.matches(&signature.author)
        && timestamps_compatible(target.timestamp_text.as_deref(), signature.timestamp_text.as_deref());
}

/// Mean equality of followed heading and section headline, each counted
/// only when both sides expose it.
fn heading_feature(target: &TargetDescriptor, boundary: &CommentBoundary) -> Option<f64> {
    let pairs = [
        (target.follows_heading_text.as_deref(), boundary.follows_heading.as_deref()),
        (target.section_headline_text.as_deref(), boundary.section_headline.as_deref()),
    ];
    let comparable: Vec<bool> = pairs
        .iter()
        .filter_map(|pair| {
            return match *pair {
                (Some(wanted), Some(actual)) => Some(comparable_heading(wanted) == comparable_heading(actual)),
                _ => None,
            };
        })
        .collect();
    if comparable.is_empty() {
        return None;
    }
    let equal = comparable.iter().filter(|eq| return **eq).count();
    return Some(ratio(equal, comparable.len()));
}

/// `1 / (1 + distance)`.
fn inverse_distance(distance: usize) -> f64 {
    let distance = f64::from(u32::try_from(distance).unwrap_or(u32::MAX));
    return (1.0 + distance).recip();
}

/// Pick the single best candidate for `target`.
///
/// Candidates failing the hard filter are not scored. The rest are scored,
/// the maximum must exceed the threshold, and ties at the maximum are broken
/// by the profile's tie-break feature. A lone survivor is still scored and
/// checked against the threshold.
///
/// # Errors
///
/// Returns `Error::NoCandidate` if nothing passes the filter and threshold,
/// or `Error::Ambiguous` if a tie remains after tie-breaking.
pub fn match_target(
    target: &TargetDescriptor,
    candidates: &[Candidate<'_>],
    context: &MatchContext<'_>,
) -> Result<ResolvedSpan, Error> {
    let target_plain = strip_markup(&target.full_text);
    let survivors: Vec<(usize, &Candidate<'_>)> = candidates
        .iter()
        .enumerate()
        .filter(|(_, candidate)| return passes_hard_filter(target, candidate.boundary))
        .collect();
    let nearest = target
        .ordinal
        .and_then(|ordinal| {
            return survivors
                .iter()
                .map(|(_, c)| return ordinal.abs_diff(c.boundary.signature.ordinal))
                .min();
        })
        .unwrap_or(0);

    let scored: Vec<MatchCandidate> = survivors
        .into_iter()
        .map(|(index, candidate)| {
            let features = features_of(target, &target_plain, candidate, nearest);
            let score = features.weighted_score(context.profile);
            trace!(profile = context.profile.name, index, score, ?features, "scored candidate");
            return MatchCandidate { features, index, score };
        })
        .collect();

    let best = scored.iter().map(|c| return c.score).fold(f64::NEG_INFINITY, f64::max);
    if scored.is_empty() || best <= context.threshold {
        return Err(no_candidate(target));
    }

    let mut top: Vec<&MatchCandidate> = scored.iter().filter(|c| return best - c.score <= TIE_EPSILON).collect();
    if top.len() > 1 {
        top = break_tie(top, context.profile.tie_break);
    }

    let [winner] = top.as_slice() else {
        let spans: Vec<Range<usize>> = top
            .iter()
            .filter_map(|c| return candidates.get(c.index))
            .map(|c| return c.boundary.span())
            .collect();
        return Err(Error::Ambiguous { score: best, spans });
    };

    let boundary = candidates.get(winner.index).map(|c| return c.boundary).ok_or_else(|| return no_candidate(target))?;
    return Ok(ResolvedSpan {
        boundary: boundary.clone(),
        candidate_index: winner.index,
        score: winner.score,
    });
}

/// Keep only the tied candidates with the best tie-break value. Unchanged
/// when no candidate has one.
fn break_tie(top: Vec<&MatchCandidate>, tie_break: TieBreak) -> Vec<&MatchCandidate> {
    let best = top
        .iter()
        .filter_map(|c| return c.features.tie_break_value(tie_break))
        .fold(f64::NEG_INFINITY, f64::max);
    if !best.is_finite() {
        return top;
    }
    return top
        .into_iter()
        .filter(|c| return c.features.tie_break_value(tie_break).is_some_and(|v| return best - v <= TIE_EPSILON))
        .collect();
}

/// `NoCandidate` error for a target.
fn no_candidate(target: &TargetDescriptor) -> Error {
    return Error::NoCandidate {
        author: target.author.display_name().to_string(),
        timestamp: target.timestamp_text.clone(),
    };
}

/// `part / whole` for counts, `0` when `whole` is zero.
fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    let part = f64::from(u32::try_from(part).unwrap_or(u32::MAX));
    let whole = f64::from(u32::try_from(whole).unwrap_or(u32::MAX));
    return part / whole;
}

/// Whether a recorded predecessor and an actual one denote the same comment.
fn same_comment(wanted: &PrecedingComment, actual: &PrecedingComment) -> bool {
    return wanted.author.matches(&actual.author)
        && timestamps_compatible(wanted.timestamp_text.as_deref(), actual.timestamp_text.as_deref());
}

/// Equal, or one a prefix of the other (a rendered timestamp may keep a zone
/// suffix the source form omits). Two absent timestamps are equal; blank
/// text counts as absent.
pub fn timestamps_compatible(left: Option<&str>, right: Option<&str>) -> bool {
    /// Trimmed, non-blank timestamp text, if any.
    fn present(ts: Option<&str>) -> Option<&str> {
        return ts.map(str::trim).filter(|t| return !t.is_empty());
    }
    return match (present(left), present(right)) {
        (None, None) => true,
        (Some(a), Some(b)) => a.starts_with(b) || b.starts_with(a),
        _ => false,
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::build;
    use crate::signature::scan;
    use crate::types::AuthorId;

    const TS: &str = "10:00, 1 May 2021 (UTC)";

    fn boundaries(text: &str) -> Vec<CommentBoundary> {
        let config = Config::default();
        return build(text, scan(text, &config));
    }

    fn target(author: &str, ordinal: Option<usize>, text: &str) -> TargetDescriptor {
        let mut target = TargetDescriptor::new(AuthorId::named(author), Some(TS));
        target.ordinal = ordinal;
        target.full_text = text.to_string();
        return target;
    }

    #[test]
    fn timestamp_prefix_rule() {
        assert!(timestamps_compatible(Some("10:00, 1 May 2021"), Some(TS)));
        assert!(timestamps_compatible(Some(TS), Some(TS)));
        assert!(timestamps_compatible(None, None));
        assert!(!timestamps_compatible(Some(TS), None));
        assert!(!timestamps_compatible(Some("11:00, 1 May 2021"), Some(TS)));
    }

    #[test]
    fn blank_timestamp_is_absent() {
        assert!(!timestamps_compatible(Some(""), Some(TS)));
        assert!(!timestamps_compatible(Some("  "), Some(TS)));
        assert!(timestamps_compatible(Some(" "), None));

        let text = format!("Hello. [[User:Alice|Alice]] {TS}\n");
        let all = boundaries(&text);
        let candidates: Vec<Candidate<'_>> = all.iter().map(Candidate::new).collect();
        let config = Config::default();
        let mut blank = target("Alice", Some(0), "Hello.");
        blank.timestamp_text = Some(String::new());
        let err = match_target(&blank, &candidates, &MatchContext::page(&config)).unwrap_err();
        assert!(matches!(err, Error::NoCandidate { .. }));
    }

    #[test]
    fn index_is_measured_from_nearest_survivor() {
        let text = format!(
            "First. [[User:Alice|Alice]] {TS}\nA. [[User:Xena|Xena]] {TS}\nB. [[User:Yuri|Yuri]] {TS}\nC. [[User:Zed|Zed]] {TS}\nSecond. [[User:Bob|Bob]] {TS}\n"
        );
        let all = boundaries(&text);
        let candidates: Vec<Candidate<'_>> = all.iter().map(Candidate::new).collect();
        let config = Config::default();
        let shifted = target("Bob", Some(1), "");

        let found = match_target(&shifted, &candidates, &MatchContext::page(&config)).unwrap();
        assert_eq!(found.candidate_index, 4);
        let survivor = [Candidate::new(&all[4])];
        let features = features_of(&shifted, "", &survivor[0], 3);
        assert_eq!(features.index, Some(1.0));
    }

    #[test]
    fn weighted_score_ignores_inapplicable_features() {
        let features = Features {
            index: Some(1.0),
            text: Some(0.0),
            ..Features::default()
        };
        let score = features.weighted_score(&PAGE_PROFILE);
        assert!((score - 4.0 / 5.5).abs() < 1e-9);
        assert!((Features::default().weighted_score(&PAGE_PROFILE) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn single_survivor_is_still_thresholded() {
        let text = format!("Unrelated words here. [[User:Alice|Alice]] {TS}\n");
        let all = boundaries(&text);
        let candidates: Vec<Candidate<'_>> = all.iter().map(Candidate::new).collect();
        let config = Config::default();

        let found = match_target(&target("Alice", Some(0), ""), &candidates, &MatchContext::page(&config)).unwrap();
        assert_eq!(found.candidate_index, 0);

        let mut far = target("Alice", None, "completely different sentence");
        far.previous_comments.push(PrecedingComment {
            author: AuthorId::named("Zed"),
            timestamp_text: Some(TS.to_string()),
        });
        let err = match_target(&far, &candidates, &MatchContext::page(&config)).unwrap_err();
        assert!(matches!(err, Error::NoCandidate { .. }));
    }

    #[test]
    fn hard_filter_rejects_other_authors() {
        let text = format!("Hello. [[User:Alice|Alice]] {TS}\n");
        let all = boundaries(&text);
        let candidates: Vec<Candidate<'_>> = all.iter().map(Candidate::new).collect();
        let config = Config::default();
        let err = match_target(&target("Bob", Some(0), "Hello."), &candidates, &MatchContext::page(&config)).unwrap_err();
        assert!(matches!(err, Error::NoCandidate { ref author, .. } if author == "Bob"));
    }

    #[test]
    fn nearest_ordinal_wins_among_identical_texts() {
        let line = format!("Same words. [[User:Alice|Alice]] {TS}\n");
        let text = line.repeat(3);
        let all = boundaries(&text);
        let candidates: Vec<Candidate<'_>> = all.iter().map(Candidate::new).collect();
        let config = Config::default();
        let mut wanted = target("Alice", Some(2), "Same words.");
        wanted.previous_comments = vec![
            PrecedingComment { author: AuthorId::named("Alice"), timestamp_text: Some(TS.to_string()) },
            PrecedingComment { author: AuthorId::named("Alice"), timestamp_text: Some(TS.to_string()) },
        ];
        let found = match_target(&wanted, &candidates, &MatchContext::page(&config)).unwrap();
        assert_eq!(found.candidate_index, 2);
        assert_eq!(found.boundary.span(), all[2].span());
    }

    #[test]
    fn identical_candidates_are_ambiguous() {
        let text = format!("Same words. [[User:Alice|Alice]] {TS}\n");
        let first = boundaries(&text);
        let second = boundaries(&text);
        let written = Some(Utc::now());
        let candidates = vec![Candidate::dated(&first[0], written), Candidate::dated(&second[0], written)];
        let config = Config::default();
        let mut wanted = target("Alice", None, "Same words.");
        wanted.date = written;

        let err = match_target(&wanted, &candidates, &MatchContext::edit_origin(&config)).unwrap_err();
        match err {
            Error::Ambiguous { spans, .. } => assert_eq!(spans.len(), 2),
            other => panic!("expected ambiguity, got {other:?}"),
        }
    }

    #[test]
    fn closer_revision_time_wins() {
        let text = format!("Same words. [[User:Alice|Alice]] {TS}\n");
        let all = boundaries(&text);
        let now = Utc::now();
        let earlier = now - chrono::Duration::days(3);
        let candidates = vec![Candidate::dated(&all[0], Some(earlier)), Candidate::dated(&all[0], Some(now))];
        let config = Config::default();
        let mut wanted = target("Alice", None, "Same words.");
        wanted.date = Some(now);

        let found = match_target(&wanted, &candidates, &MatchContext::edit_origin(&config)).unwrap();
        assert_eq!(found.candidate_index, 1);
    }

    #[test]
    fn context_prefers_matching_predecessors() {
        let text = format!(
            "A. [[User:Alice|Alice]] {TS}\nB. [[User:Bob|Bob]] {TS}\nC. [[User:Carol|Carol]] {TS}\nB again. [[User:Bob|Bob]] {TS}\n"
        );
        let all = boundaries(&text);
        let candidates: Vec<Candidate<'_>> = all.iter().map(Candidate::new).collect();
        let config = Config::default();
        let mut wanted = target("Bob", None, "");
        wanted.previous_comments.push(PrecedingComment {
            author: AuthorId::named("Carol"),
            timestamp_text: Some(TS.to_string()),
        });
        let found = match_target(&wanted, &candidates, &MatchContext::page(&config)).unwrap();
        assert_eq!(found.candidate_index, 3);
    }

    #[test]
    fn heading_feature_counts_only_exposed_sides() {
        let text = format!("== Topic ==\nHi. [[User:Alice|Alice]] {TS}\n");
        let all = boundaries(&text);
        let mut wanted = target("Alice", None, "");
        assert_eq!(heading_feature(&wanted, &all[0]), None);
        wanted.follows_heading_text = Some("Topic".to_string());
        wanted.section_headline_text = Some("Other".to_string());
        assert_eq!(heading_feature(&wanted, &all[0]), Some(0.5));
    }
}
