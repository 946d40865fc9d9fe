//! Scoring weights for the candidate matcher, one profile per call site.
//!
//! Every feature is normalized to `[0, 1]` before weighting and the final
//! score is divided by the total weight of the applicable features, so the
//! acceptance threshold means the same thing for both profiles.

/// Scores closer than this are treated as tied.
pub const TIE_EPSILON: f64 = 1e-9;

/// Feature consulted when the best score is shared by several candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TieBreak {
    /// Closest ordinal position wins.
    Index,
    /// Closest revision time to the target's timestamp wins.
    Temporal,
}

/// Named set of feature weights. A zero weight disables the feature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightProfile {
    /// Agreement of the preceding one or two comments.
    pub context: f64,
    /// Equality of the followed heading and section headline.
    pub heading: f64,
    /// Proximity of ordinal positions.
    pub index: f64,
    /// Name used in logs.
    pub name: &'static str,
    /// Proximity of the containing revision's time to the target's date.
    pub temporal: f64,
    /// Word overlap of the comment texts.
    pub text: f64,
    /// Feature breaking ties at the maximum score.
    pub tie_break: TieBreak,
}

/// Re-finding a comment in page or section source that has changed little
/// since rendering. Ordinal position dominates.
pub const PAGE_PROFILE: WeightProfile = WeightProfile {
    context: 2.0,
    heading: 1.0,
    index: 4.0,
    name: "page",
    temporal: 0.0,
    text: 1.5,
    tie_break: TieBreak::Index,
};

/// Attributing a comment to the revision that added it. Ordinals and
/// headings mean nothing across independent diffs.
pub const EDIT_ORIGIN_PROFILE: WeightProfile = WeightProfile {
    context: 0.0,
    heading: 0.0,
    index: 0.0,
    name: "edit-origin",
    temporal: 2.0,
    text: 3.0,
    tie_break: TieBreak::Temporal,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_profile_ranks_index_highest() {
        let p = PAGE_PROFILE;
        assert!(p.index > p.context && p.index > p.text && p.index > p.heading);
        assert_eq!(p.tie_break, TieBreak::Index);
    }

    #[test]
    fn edit_origin_profile_ignores_position() {
        let p = EDIT_ORIGIN_PROFILE;
        assert!(p.index.abs() < TIE_EPSILON && p.heading.abs() < TIE_EPSILON);
        assert!(p.text > 0.0 && p.temporal > 0.0);
        assert_eq!(p.tie_break, TieBreak::Temporal);
    }
}
