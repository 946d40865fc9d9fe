//! Signature scanner: recovers the ordered list of signatures in wiki
//! discussion source.
//!
//! Three passes run over a masked copy of the text: regular signatures (an
//! author link followed by a timestamp), unsigned templates, and the draft
//! marker of the comment being composed. Offsets always refer to the
//! original text.

use tracing::{debug, trace};

use crate::config::{Config, UnsignedTemplate};
use crate::mask::mask_distractions;
use crate::timestamp::Grammar;
use crate::types::{AuthorId, SignatureKind, SignatureRecord};

/// A signature candidate before ordering and ordinal assignment.
#[derive(Debug, Clone)]
struct Fragment {
    /// Resolved author; `None` for a timestamp without an author link.
    author: Option<AuthorId>,
    /// Byte offset one past the signature.
    end: usize,
    /// How the fragment was recognized.
    kind: SignatureKind,
    /// End of the fragment's line including the newline.
    line_end: usize,
    /// Byte offset where the signature starts.
    start: usize,
    /// Timestamp text with zone.
    timestamp: Option<String>,
}

impl Fragment {
    /// Length of the signature text in bytes.
    const fn len(&self) -> usize {
        return self.end.saturating_sub(self.start);
    }
}

/// How a template signature and a regular signature found on the same line
/// are reconciled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverlapPolicy {
    /// Keep whichever signature text is longer; ties go to the template.
    PreferLonger,
    /// The template signature always wins. Manual signature text is usually a
    /// substring of what the template encodes.
    #[default]
    TemplateWins,
}

impl OverlapPolicy {
    /// Whether the template signature replaces the regular one, given the
    /// byte lengths of both.
    pub const fn prefers_template(self, regular_len: usize, template_len: usize) -> bool {
        return match self {
            OverlapPolicy::PreferLonger => template_len >= regular_len,
            OverlapPolicy::TemplateWins => true,
        };
    }
}

/// Assign ordering, comment starts, ordinals, and parsed dates.
fn assemble_records(text: &str, mut fragments: Vec<Fragment>, grammar: &Grammar) -> Vec<SignatureRecord> {
    fragments.sort_by_key(|f| return (f.start, f.end));

    let mut records = Vec::with_capacity(fragments.len());
    let mut previous_next_start = 0_usize;
    let mut previous_end = 0_usize;
    let mut ordinal = 0_usize;

    for fragment in fragments {
        let Some(author) = fragment.author else {
            continue;
        };

        // Two signatures on one line: the second comment starts after the first signature.
        let comment_start = if previous_next_start <= fragment.start {
            previous_next_start
        } else {
            previous_end.min(fragment.start)
        };

        let date = fragment.timestamp.as_deref().and_then(|ts| {
            return grammar
                .parse(ts)
                .map_err(|e| debug!(start = fragment.start, "{e}"))
                .ok();
        });

        records.push(SignatureRecord {
            author,
            comment_start_index: comment_start,
            date,
            end_index: fragment.end,
            kind: fragment.kind,
            next_comment_start_index: fragment.line_end,
            ordinal,
            raw_text: text.get(fragment.start..fragment.end).unwrap_or("").to_string(),
            start_index: fragment.start,
            timestamp_text: fragment.timestamp,
        });

        if fragment.kind != SignatureKind::Draft {
            ordinal = ordinal.saturating_add(1);
        }
        previous_next_start = fragment.line_end;
        previous_end = fragment.end;
    }

    return records;
}

/// The last occurrence of the draft marker, as a fragment.
fn draft_fragment(masked: &str, config: &Config) -> Option<Fragment> {
    let marker = config.draft_marker()?;
    let start = masked.rfind(marker)?;
    let end = start.saturating_add(marker.len());
    return Some(Fragment {
        author: Some(AuthorId::Undated),
        end,
        kind: SignatureKind::Draft,
        line_end: line_end_at(masked, end),
        start,
        timestamp: None,
    });
}

/// End of the line containing `offset`, including its newline.
fn line_end_at(text: &str, offset: usize) -> usize {
    let rest = text.get(offset..).unwrap_or("");
    return rest.find('\n').map_or(text.len(), |nl| return offset.saturating_add(nl).saturating_add(1));
}

/// First value among `keys` that is present and non-empty.
fn lookup_param<'p>(params: &'p [(String, String)], keys: &[String]) -> Option<&'p str> {
    return keys.iter().find_map(|key| {
        return params
            .iter()
            .find(|(name, value)| return name == key && !value.is_empty())
            .map(|(_, value)| return value.as_str());
    });
}

/// Split a template parameter list (`|a|b|key=value`) into keyed values.
/// Positional parameters are keyed `"1"`, `"2"`, and so on.
fn parse_template_params(raw: &str) -> Vec<(String, String)> {
    let mut params = Vec::new();
    let mut position = 0_usize;
    for part in raw.split('|').skip(1) {
        if let Some((key, value)) = part.split_once('=') {
            let key = key.trim();
            if !key.is_empty() && !key.contains(char::is_whitespace) {
                params.push((key.to_string(), collapse_whitespace(value)));
                continue;
            }
        }
        position = position.saturating_add(1);
        params.push((position.to_string(), collapse_whitespace(part)));
    }
    return params;
}

/// Trim and collapse runs of whitespace to single spaces.
fn collapse_whitespace(value: &str) -> String {
    return value.split_whitespace().collect::<Vec<_>>().join(" ");
}

/// Drop regular fragments that share a line with a template signature, or
/// the template, as the policy decides.
fn reconcile_overlaps(policy: OverlapPolicy, mut regular: Vec<Fragment>, templates: Vec<Fragment>) -> Vec<Fragment> {
    let mut kept = Vec::with_capacity(regular.len().saturating_add(templates.len()));
    for template in templates {
        let Some(pos) = regular.iter().position(|r| return r.line_end == template.line_end) else {
            kept.push(template);
            continue;
        };
        let regular_has_author = regular.get(pos).is_some_and(|r| return r.author.is_some());
        let regular_len = regular.get(pos).map_or(0, Fragment::len);
        if !regular_has_author || policy.prefers_template(regular_len, template.len()) {
            regular.remove(pos);
            kept.push(template);
        } else {
            trace!(start = template.start, "template signature yields to regular signature");
        }
    }
    kept.extend(regular);
    return kept;
}

/// Build a regular fragment for the timestamp found on one line.
fn regular_fragment(
    line: &str,
    line_start: usize,
    timestamp: regex::Match<'_>,
    config: &Config,
) -> Fragment {
    let mut window_start = timestamp.start().saturating_sub(config.lookback());
    while !line.is_char_boundary(window_start) {
        window_start = window_start.saturating_add(1);
    }
    let prefix = line.get(window_start..timestamp.start()).unwrap_or("");
    let absolute = |offset: usize| return line_start.saturating_add(window_start).saturating_add(offset);

    let mut fragment = Fragment {
        author: None,
        end: line_start.saturating_add(timestamp.end()),
        kind: SignatureKind::Regular,
        line_end: line_start.saturating_add(line.len()),
        start: line_start.saturating_add(timestamp.start()),
        timestamp: Some(config.grammar().with_zone(timestamp.as_str())),
    };

    let Some(last_link) = config.user_link().captures_iter(prefix).last() else {
        return fragment;
    };
    let (Some(whole), Some(name)) = (last_link.get(0), last_link.get(1)) else {
        return fragment;
    };
    if prefix.len().saturating_sub(whole.end()) > config.max_signature_gap() {
        return fragment;
    }

    let author = AuthorId::named(name.as_str());
    // Users often link their talk page after their user page; the signature
    // starts at the first link to the same user.
    let first_start = config
        .user_link()
        .captures_iter(prefix)
        .find(|caps| return caps.get(1).is_some_and(|n| return AuthorId::named(n.as_str()).matches(&author)))
        .and_then(|caps| return caps.get(0))
        .map_or(whole.start(), |m| return m.start());

    fragment.start = absolute(first_start);
    fragment.author = Some(author);
    return fragment;
}

/// Regular pass: the last timestamp of every line plus its author link.
fn regular_fragments(masked: &str, config: &Config) -> Vec<Fragment> {
    let mut fragments = Vec::new();
    let mut line_start = 0_usize;
    for line in masked.split_inclusive('\n') {
        let content = line.trim_end_matches(['\n', '\r']);
        if let Some(timestamp) = config.grammar().find_last(content) {
            let mut fragment = regular_fragment(content, line_start, timestamp, config);
            fragment.line_end = line_start.saturating_add(line.len());
            fragments.push(fragment);
        }
        line_start = line_start.saturating_add(line.len());
    }
    return fragments;
}

/// Scan text for signatures. Total: malformed input yields fewer records,
/// never an error. Records are ordered by `start_index`; author-less
/// timestamps that no template claimed are dropped.
pub fn scan(text: &str, config: &Config) -> Vec<SignatureRecord> {
    let masked = mask_distractions(text, config);

    let regular = regular_fragments(&masked, config);
    let templates = unsigned_fragments(&masked, config);
    let mut fragments = reconcile_overlaps(config.overlap_policy(), regular, templates);

    let before = fragments.len();
    fragments.retain(|f| return f.author.is_some());
    let dropped = before.saturating_sub(fragments.len());
    if dropped > 0 {
        debug!(dropped, "dropped timestamps without an author");
    }

    if let Some(draft) = draft_fragment(&masked, config) {
        fragments.push(draft);
    }

    let records = assemble_records(text, fragments, config.grammar());
    trace!(count = records.len(), "scan complete");
    return records;
}

/// Resolve author and timestamp from unsigned template parameters.
/// A single parameter is classified by the timestamp grammar; an author slot
/// holding a timestamp is swapped with the timestamp slot.
fn unsigned_author_and_timestamp(
    params: &[(String, String)],
    template: &UnsignedTemplate,
    grammar: &Grammar,
) -> (AuthorId, Option<String>) {
    let author_param = lookup_param(params, &template.author_params);
    let timestamp_param = lookup_param(params, &template.timestamp_params);

    let (author, timestamp) = match (author_param, timestamp_param) {
        (Some(a), Some(t)) if grammar.is_timestamp(a) && !grammar.is_timestamp(t) => (Some(t), Some(a)),
        (Some(a), Some(t)) => (Some(a), Some(t)),
        (Some(only), None) | (None, Some(only)) => {
            if grammar.is_timestamp(only) { (None, Some(only)) } else { (Some(only), None) }
        },
        (None, None) => (None, None),
    };

    return (
        author.map_or(AuthorId::Undated, AuthorId::named),
        timestamp.map(|t| return grammar.with_zone(t)),
    );
}

/// Unsigned pass: every configured unsigned template invocation.
fn unsigned_fragments(masked: &str, config: &Config) -> Vec<Fragment> {
    let Some(invocation) = config.unsigned_invocation() else {
        return Vec::new();
    };

    let mut fragments = Vec::new();
    for caps in invocation.captures_iter(masked) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let Some(template) = config.unsigned_template(name.as_str()) else {
            continue;
        };
        let params = parse_template_params(caps.get(2).map_or("", |m| return m.as_str()));
        let (author, timestamp) = unsigned_author_and_timestamp(&params, template, config.grammar());

        fragments.push(Fragment {
            author: Some(author),
            end: whole.end(),
            kind: SignatureKind::Unsigned,
            line_end: line_end_at(masked, whole.end()),
            start: whole.start(),
            timestamp,
        });
    }
    return fragments;
}
