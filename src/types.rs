/// Core domain types for signatures, comment spans, and locate queries.
use std::ops::Range;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Normalized author identity. Newtype-style enum so raw link targets never
/// leak into comparisons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "Option<String>")]
pub enum AuthorId {
    /// A user name with underscores turned into spaces, whitespace collapsed,
    /// and the first letter uppercased.
    Named(String),
    /// Sentinel for unsigned comments whose author could not be parsed.
    /// Matches any author.
    Undated,
}

impl AuthorId {
    /// Human-readable name for diagnostics.
    pub fn display_name(&self) -> &str {
        return match self {
            AuthorId::Named(name) => name,
            AuthorId::Undated => "(unknown)",
        };
    }

    /// Whether two identities can denote the same person.
    /// Names compare case-insensitively; `Undated` on either side matches.
    pub fn matches(&self, other: &Self) -> bool {
        return match (self, other) {
            (AuthorId::Named(a), AuthorId::Named(b)) => a.to_lowercase() == b.to_lowercase(),
            (AuthorId::Undated, _) | (_, AuthorId::Undated) => true,
        };
    }

    /// Normalize a raw user name as it appears in a link or template parameter.
    /// Empty names become `Undated`.
    pub fn named(raw: &str) -> Self {
        let collapsed = raw.replace('_', " ").split_whitespace().collect::<Vec<_>>().join(" ");
        let mut chars = collapsed.chars();
        let Some(first) = chars.next() else {
            return AuthorId::Undated;
        };
        let mut name: String = first.to_uppercase().collect();
        name.push_str(chars.as_str());
        return AuthorId::Named(name);
    }
}

impl From<Option<String>> for AuthorId {
    fn from(raw: Option<String>) -> Self {
        return raw.map_or(AuthorId::Undated, |name| return AuthorId::named(&name));
    }
}

impl From<AuthorId> for Option<String> {
    fn from(author: AuthorId) -> Self {
        return match author {
            AuthorId::Named(name) => Some(name),
            AuthorId::Undated => None,
        };
    }
}

/// One finished comment matched by a candidate boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentBoundary {
    /// Heading text the comment directly follows, if a heading sits between
    /// the previous comment and this one.
    pub follows_heading: Option<String>,
    /// Author and timestamp of up to two preceding comments, nearest first.
    pub previous: Vec<PrecedingComment>,
    /// Nearest heading at or before the span start.
    pub section_headline: Option<String>,
    /// The signature that terminates this comment.
    pub signature: SignatureRecord,
    /// Byte offset one past the end of the signature.
    pub span_end: usize,
    /// Byte offset where the comment starts.
    pub span_start: usize,
    /// Comment body: the span minus the signature.
    pub text: String,
}

impl CommentBoundary {
    /// The comment's byte range in the scanned text.
    pub const fn span(&self) -> Range<usize> {
        return self.span_start..self.span_end;
    }
}

/// Author and timestamp of a comment preceding another one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrecedingComment {
    /// The preceding comment's author.
    #[serde(default = "undated")]
    pub author: AuthorId,
    /// The preceding comment's timestamp text.
    #[serde(default)]
    pub timestamp_text: Option<String>,
}

/// Successful output of a match: the winning boundary and its score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedSpan {
    /// The winning comment boundary.
    pub boundary: CommentBoundary,
    /// Position of the winner in the candidate list handed to the matcher.
    pub candidate_index: usize,
    /// Normalized score in `[0, 1]` that won the match.
    pub score: f64,
}

/// Caller-supplied description of one historical revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionMeta {
    /// Edit summary.
    #[serde(default)]
    pub comment: Option<String>,
    /// Revision identifier.
    pub id: u64,
    /// Parent revision identifier, absent for page creations.
    #[serde(default)]
    pub parent_id: Option<u64>,
    /// Save time of the revision.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    /// User who saved the revision.
    #[serde(default)]
    pub user: Option<String>,
}

/// How a signature record was recognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureKind {
    /// Unfinished signature marker of the comment being composed.
    /// Only shapes boundaries; never a match candidate.
    Draft,
    /// Author link followed by a timestamp.
    Regular,
    /// Unsigned template carrying author and/or timestamp as parameters.
    Unsigned,
}

/// One signature found by the scanner. Immutable after the scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignatureRecord {
    /// Normalized author, or `Undated` for anonymous unsigned templates.
    pub author: AuthorId,
    /// Start of the comment this signature terminates.
    pub comment_start_index: usize,
    /// Parsed timestamp, `None` if absent or malformed.
    pub date: Option<DateTime<Utc>>,
    /// Byte offset one past the end of the signature.
    pub end_index: usize,
    /// How the signature was recognized.
    pub kind: SignatureKind,
    /// End of the signature's line, including the newline. The next
    /// comment starts here.
    pub next_comment_start_index: usize,
    /// Position among non-draft records, in text order.
    pub ordinal: usize,
    /// Signature text as it appears in the source.
    pub raw_text: String,
    /// Byte offset where the signature starts.
    pub start_index: usize,
    /// Timestamp text including the zone suffix.
    pub timestamp_text: Option<String>,
}

/// What the caller knows about the comment being searched for.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TargetDescriptor {
    /// The comment's author.
    #[serde(default = "undated")]
    pub author: AuthorId,
    /// The comment's date; parsed from `timestamp_text` when absent.
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    /// Heading text the comment directly follows, if any.
    #[serde(default)]
    pub follows_heading_text: Option<String>,
    /// Rendered comment text.
    #[serde(default)]
    pub full_text: String,
    /// Position among comments in the same page or section, if known.
    #[serde(default)]
    pub ordinal: Option<usize>,
    /// Up to two preceding comments, nearest first.
    #[serde(default)]
    pub previous_comments: Vec<PrecedingComment>,
    /// Headline of the section containing the comment.
    #[serde(default)]
    pub section_headline_text: Option<String>,
    /// Timestamp text as rendered, possibly without the zone suffix.
    #[serde(default)]
    pub timestamp_text: Option<String>,
}

impl TargetDescriptor {
    /// A descriptor with only the hard-filter fields set.
    pub fn new(author: AuthorId, timestamp_text: Option<&str>) -> Self {
        return Self {
            author,
            date: None,
            follows_heading_text: None,
            full_text: String::new(),
            ordinal: None,
            previous_comments: Vec::new(),
            section_headline_text: None,
            timestamp_text: timestamp_text.map(str::to_string),
        };
    }
}

/// Serde default for author fields.
const fn undated() -> AuthorId {
    return AuthorId::Undated;
}
