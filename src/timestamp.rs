//! Timestamp grammar: recognizing signature timestamps in text and parsing
//! them into UTC dates.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use regex::{Match, Regex};

use crate::error::Error;

/// A compiled per-site timestamp grammar. Built once from configuration and
/// shared read-only by every scan.
#[derive(Debug, Clone)]
pub struct Grammar {
    /// Matches a whole string that is a timestamp with or without the zone.
    bare: Regex,
    /// Matches a timestamp followed by the zone suffix anywhere in a line.
    in_text: Regex,
    /// Site offset from UTC applied to parsed local times.
    offset: Duration,
    /// chrono format strings tried in order when parsing.
    parse_formats: Vec<String>,
    /// Zone suffix such as `(UTC)`. Empty when the site prints none.
    zone: String,
}

impl Grammar {
    /// Find the last timestamp on a line, if any.
    pub fn find_last<'t>(&self, line: &'t str) -> Option<Match<'t>> {
        return self.in_text.find_iter(line).last();
    }

    /// Whether `candidate`, trimmed, is exactly one timestamp (zone optional).
    /// Used to tell author and timestamp parameters of templates apart.
    pub fn is_timestamp(&self, candidate: &str) -> bool {
        return self.bare.is_match(candidate.trim());
    }

    /// Compile a grammar.
    ///
    /// `date_patterns` are regex fragments for the date/time part without the
    /// zone; `parse_formats` are chrono format strings for the same part.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPattern` if the assembled regexes do not compile.
    pub fn new(
        date_patterns: &[String],
        parse_formats: Vec<String>,
        zone: &str,
        offset_minutes: i32,
    ) -> Result<Self, Error> {
        let alternatives = date_patterns
            .iter()
            .map(|p| return format!("(?:{p})"))
            .collect::<Vec<_>>()
            .join("|");
        let zone = zone.trim().to_string();

        let in_text_pattern = if zone.is_empty() {
            format!(r"(?:{alternatives})")
        } else {
            format!(r"(?:{alternatives})[ \t]*{}", regex::escape(&zone))
        };
        let bare_pattern = if zone.is_empty() {
            format!(r"^(?:{alternatives})$")
        } else {
            format!(r"^(?:{alternatives})(?:[ \t]*{})?$", regex::escape(&zone))
        };

        return Ok(Self {
            bare: compile(&bare_pattern)?,
            in_text: compile(&in_text_pattern)?,
            offset: Duration::minutes(i64::from(offset_minutes)),
            parse_formats,
            zone,
        });
    }

    /// Parse timestamp text (zone optional) into a UTC date.
    ///
    /// # Errors
    ///
    /// Returns `Error::MalformedTimestamp` if no configured format accepts it.
    pub fn parse(&self, text: &str) -> Result<DateTime<Utc>, Error> {
        let trimmed = text.trim();
        let without_zone = trimmed.strip_suffix(self.zone.as_str()).unwrap_or(trimmed).trim_end();

        let local = self
            .parse_formats
            .iter()
            .find_map(|format| return NaiveDateTime::parse_from_str(without_zone, format).ok())
            .ok_or_else(|| return Error::MalformedTimestamp { text: text.to_string() })?;

        let utc = local
            .checked_sub_signed(self.offset)
            .ok_or_else(|| return Error::MalformedTimestamp { text: text.to_string() })?;
        return Ok(utc.and_utc());
    }

    /// Append the implicit zone to a timestamp that lacks it, collapsing
    /// duplicate whitespace either way.
    pub fn with_zone(&self, text: &str) -> String {
        let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if self.zone.is_empty() || collapsed.ends_with(self.zone.as_str()) {
            return collapsed;
        }
        return format!("{collapsed} {}", self.zone);
    }

    /// The zone suffix, possibly empty.
    pub fn zone(&self) -> &str {
        return &self.zone;
    }
}

/// Compile a regex, attaching the pattern text to failures.
///
/// # Errors
///
/// Returns `Error::InvalidPattern` if the regex does not compile.
pub(crate) fn compile(pattern: &str) -> Result<Regex, Error> {
    return Regex::new(pattern).map_err(|source| {
        return Error::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        };
    });
}
