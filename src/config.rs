use std::collections::HashMap;
use std::path::Path;

use regex::Regex;
use tracing::debug;

use crate::error::Error;
use crate::signature::OverlapPolicy;
use crate::timestamp::{Grammar, compile};

/// Site configuration loaded from `.sigspan.toml`, compiled into regexes.
/// Immutable once built; safe to share across threads.
#[derive(Debug, Clone)]
pub struct Config {
    /// Minimum normalized score a candidate must exceed to be accepted.
    acceptance_threshold: f64,
    /// Lines matching any of these are blanked before scanning.
    antipatterns: Vec<Regex>,
    /// Unfinished signature marker of the comment being composed.
    draft_marker: Option<String>,
    /// Site timestamp grammar.
    grammar: Grammar,
    /// Bytes of line prefix searched for the author link.
    lookback: usize,
    /// Elements whose content is blanked before scanning.
    masked_elements: Vec<Regex>,
    /// Largest gap in bytes allowed between the author link and the timestamp.
    max_signature_gap: usize,
    /// How template signatures and regular signatures on one line are reconciled.
    overlap_policy: OverlapPolicy,
    /// Normalized names of templates whose whole invocation is blanked.
    quote_templates: Vec<String>,
    /// Normalized unsigned template name to its parameter conventions.
    unsigned_by_name: HashMap<String, UnsignedTemplate>,
    /// Matches any configured unsigned template invocation.
    unsigned_invocation: Option<Regex>,
    /// Matches a link to a user page, user talk page, or contributions list.
    user_link: Regex,
}

/// Raw TOML structure for `.sigspan.toml`. Every field has a default.
#[derive(Debug, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
struct SigspanTomlConfig {
    acceptance_threshold: f64,
    antipatterns: Vec<String>,
    draft_marker: Option<String>,
    lookback: usize,
    masked_tags: Vec<String>,
    max_signature_gap: usize,
    overlap_policy: OverlapPolicy,
    quote_templates: Vec<String>,
    timestamp: TimestampTomlConfig,
    unsigned_templates: Vec<UnsignedTomlTemplate>,
    user_namespaces: Vec<String>,
}

/// Raw `[timestamp]` table.
#[derive(Debug, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
struct TimestampTomlConfig {
    date_patterns: Vec<String>,
    offset_minutes: i32,
    parse_formats: Vec<String>,
    zone: String,
}

/// Raw `[[unsigned_templates]]` entry.
#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct UnsignedTomlTemplate {
    #[serde(default = "default_author_params")]
    author_params: Vec<String>,
    names: Vec<String>,
    #[serde(default = "default_timestamp_params")]
    timestamp_params: Vec<String>,
}

/// Parameter conventions of one unsigned template family. Parameter keys are
/// positional (`"1"`, `"2"`) or named (`"user"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTemplate {
    /// Keys tried in order for the author.
    pub author_params: Vec<String>,
    /// Keys tried in order for the timestamp.
    pub timestamp_params: Vec<String>,
}

impl Config {
    /// Minimum normalized score a candidate must exceed.
    pub const fn acceptance_threshold(&self) -> f64 {
        return self.acceptance_threshold;
    }

    /// Compiled antipattern line markers.
    pub fn antipatterns(&self) -> &[Regex] {
        return &self.antipatterns;
    }

    /// Compile raw configuration into regexes.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPattern` if any configured pattern fails to compile.
    fn compile(raw: SigspanTomlConfig) -> Result<Self, Error> {
        let grammar = Grammar::new(
            &raw.timestamp.date_patterns,
            raw.timestamp.parse_formats,
            &raw.timestamp.zone,
            raw.timestamp.offset_minutes,
        )?;

        let antipatterns = raw.antipatterns.iter().map(|p| return compile(p)).collect::<Result<Vec<_>, _>>()?;
        let masked_elements = raw
            .masked_tags
            .iter()
            .map(|tag| return compile(&format!(r"(?is)<{0}\b[^>]*>.*?</{0}\s*>", regex::escape(tag))))
            .collect::<Result<Vec<_>, _>>()?;

        let mut unsigned_by_name = HashMap::new();
        let mut unsigned_names = Vec::new();
        for template in raw.unsigned_templates {
            let conventions = UnsignedTemplate {
                author_params: template.author_params,
                timestamp_params: template.timestamp_params,
            };
            for name in template.names {
                unsigned_names.push(name.clone());
                unsigned_by_name.insert(normalize_template_name(&name), conventions.clone());
            }
        }

        return Ok(Self {
            acceptance_threshold: raw.acceptance_threshold,
            antipatterns,
            draft_marker: raw.draft_marker.filter(|m| return !m.is_empty()),
            grammar,
            lookback: raw.lookback,
            masked_elements,
            max_signature_gap: raw.max_signature_gap,
            overlap_policy: raw.overlap_policy,
            quote_templates: raw.quote_templates.iter().map(|n| return normalize_template_name(n)).collect(),
            unsigned_by_name,
            unsigned_invocation: unsigned_invocation_regex(&unsigned_names)?,
            user_link: user_link_regex(&raw.user_namespaces)?,
        });
    }

    /// Marker of the in-progress signature, if the site uses one.
    pub fn draft_marker(&self) -> Option<&str> {
        return self.draft_marker.as_deref();
    }

    /// Parse configuration from TOML text. Missing fields take defaults.
    ///
    /// # Errors
    ///
    /// Returns `Error::TomlDe` if the TOML is malformed,
    /// or `Error::InvalidPattern` if a configured pattern does not compile.
    pub fn from_toml_str(content: &str) -> Result<Self, Error> {
        let raw: SigspanTomlConfig = toml::from_str(content)?;
        return Self::compile(raw);
    }

    /// The site timestamp grammar.
    pub const fn grammar(&self) -> &Grammar {
        return &self.grammar;
    }

    /// Whether a template name (any case of first letter, underscores or
    /// spaces) is a configured quote template.
    pub fn is_quote_template(&self, name: &str) -> bool {
        let normalized = normalize_template_name(name);
        return self.quote_templates.contains(&normalized);
    }

    /// Load config from `.sigspan.toml` in the given root directory.
    /// Returns defaults if the file doesn't exist. Returns an error if the
    /// file exists but is malformed; never silently falls back to defaults
    /// when the user wrote a config file.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if reading fails (other than not-found),
    /// `Error::TomlDe` if the TOML is malformed, or `Error::InvalidPattern`.
    pub fn load(root: &Path) -> Result<Self, Error> {
        let path = root.join(".sigspan.toml");
        let content = match std::fs::read_to_string(&path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("{} not found, using defaults", path.display());
                return Ok(Self::default());
            },
            Err(e) => return Err(Error::Io(e)),
            Ok(c) => c,
        };

        let config = Self::from_toml_str(&content)?;
        debug!("loaded configuration from {}", path.display());
        return Ok(config);
    }

    /// Load config from an explicit path. Unlike [`Config::load`], a missing
    /// file is an error.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigNotFound` if the file is missing, plus the
    /// errors of [`Config::from_toml_str`].
    pub fn load_file(path: &Path) -> Result<Self, Error> {
        let content = match std::fs::read_to_string(path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::ConfigNotFound { path: path.to_path_buf() });
            },
            Err(e) => return Err(Error::Io(e)),
            Ok(c) => c,
        };
        let config = Self::from_toml_str(&content)?;
        debug!("loaded configuration from {}", path.display());
        return Ok(config);
    }

    /// Bytes of line prefix searched for the author link.
    pub const fn lookback(&self) -> usize {
        return self.lookback;
    }

    /// Compiled element patterns blanked before scanning.
    pub fn masked_elements(&self) -> &[Regex] {
        return &self.masked_elements;
    }

    /// Largest allowed gap between author link and timestamp.
    pub const fn max_signature_gap(&self) -> usize {
        return self.max_signature_gap;
    }

    /// Reconciliation policy for template and regular signatures on one line.
    pub const fn overlap_policy(&self) -> OverlapPolicy {
        return self.overlap_policy;
    }

    /// Parameter conventions for an unsigned template name, if configured.
    pub fn unsigned_template(&self, name: &str) -> Option<&UnsignedTemplate> {
        return self.unsigned_by_name.get(&normalize_template_name(name));
    }

    /// Regex matching any configured unsigned template invocation.
    /// Capture 1 is the template name, capture 2 the parameter list with its
    /// leading `|`.
    pub const fn unsigned_invocation(&self) -> Option<&Regex> {
        return self.unsigned_invocation.as_ref();
    }

    /// Regex matching a user link. Capture 1 is the raw user name.
    pub const fn user_link(&self) -> &Regex {
        return &self.user_link;
    }
}

impl Default for Config {
    #[allow(clippy::expect_used, reason = "built-in defaults are fixed patterns covered by tests")]
    fn default() -> Self {
        return Self::compile(SigspanTomlConfig::default()).expect("default config compiles");
    }
}

impl Default for SigspanTomlConfig {
    fn default() -> Self {
        return Self {
            acceptance_threshold: 0.35,
            antipatterns: vec![
                r#"class\s*=\s*"[^"]*\bns-talk-no-signature\b"#.to_string(),
                r"(?i)\{\{\s*no[ _]?sig(?:nature)?\s*\}\}".to_string(),
                r"(?i)\{\{\s*(?:archive|discussion)[ _](?:top|bottom)\b".to_string(),
            ],
            draft_marker: Some("~~~~".to_string()),
            lookback: 250,
            masked_tags: ["nowiki", "pre", "syntaxhighlight", "source", "blockquote", "q"]
                .into_iter()
                .map(String::from)
                .collect(),
            max_signature_gap: 100,
            overlap_policy: OverlapPolicy::TemplateWins,
            quote_templates: ["quote", "tq", "talk quote", "talkquote"].into_iter().map(String::from).collect(),
            timestamp: TimestampTomlConfig::default(),
            unsigned_templates: vec![
                UnsignedTomlTemplate {
                    author_params: default_author_params(),
                    names: ["unsigned", "unsignedIP", "unsigned IP", "unsigned-ip"]
                        .into_iter()
                        .map(String::from)
                        .collect(),
                    timestamp_params: default_timestamp_params(),
                },
                UnsignedTomlTemplate {
                    author_params: vec!["2".to_string(), "user".to_string()],
                    names: vec!["unsigned2".to_string(), "unsignedIP2".to_string()],
                    timestamp_params: vec!["1".to_string(), "date".to_string()],
                },
            ],
            user_namespaces: ["User:", "User talk:", "Special:Contributions/"]
                .into_iter()
                .map(String::from)
                .collect(),
        };
    }
}

impl Default for TimestampTomlConfig {
    fn default() -> Self {
        let months = "January|February|March|April|May|June|July|August|September|October|November|December";
        return Self {
            date_patterns: vec![
                format!(r"\d{{1,2}}:\d{{2}}, \d{{1,2}} (?:{months}) \d{{4}}"),
                r"\d{4}-\d{2}-\d{2}T\d{2}:\d{2}(?::\d{2})?".to_string(),
            ],
            offset_minutes: 0,
            parse_formats: vec![
                "%H:%M, %d %B %Y".to_string(),
                "%Y-%m-%dT%H:%M:%S".to_string(),
                "%Y-%m-%dT%H:%M".to_string(),
            ],
            zone: "(UTC)".to_string(),
        };
    }
}

/// Positional author parameter plus the common named alias.
fn default_author_params() -> Vec<String> {
    return vec!["1".to_string(), "user".to_string()];
}

/// Positional timestamp parameter plus the common named alias.
fn default_timestamp_params() -> Vec<String> {
    return vec!["2".to_string(), "date".to_string()];
}

/// Regex fragment for a page or template name: first letter in either case,
/// spaces and underscores interchangeable.
fn name_fragment(name: &str) -> String {
    let mut chars = name.trim().chars();
    let Some(first) = chars.next() else {
        return String::new();
    };
    let head = if first.is_alphabetic() {
        let lower: String = first.to_lowercase().collect();
        let upper: String = first.to_uppercase().collect();
        format!("[{}{}]", regex::escape(&lower), regex::escape(&upper))
    } else {
        regex::escape(&first.to_string())
    };
    let tail = chars
        .as_str()
        .split([' ', '_'])
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join("[ _]+");
    return format!("{head}{tail}");
}

/// Lowercase the first letter, turn underscores into spaces, collapse whitespace.
pub(crate) fn normalize_template_name(name: &str) -> String {
    let collapsed = name.replace('_', " ").split_whitespace().collect::<Vec<_>>().join(" ");
    let mut chars = collapsed.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };
    let mut out: String = first.to_lowercase().collect();
    out.push_str(chars.as_str());
    return out;
}

/// Build the unsigned-template regex, longest names first.
///
/// # Errors
///
/// Returns `Error::InvalidPattern` if the assembled pattern does not compile.
fn unsigned_invocation_regex(names: &[String]) -> Result<Option<Regex>, Error> {
    if names.is_empty() {
        return Ok(None);
    }
    let mut sorted: Vec<&String> = names.iter().collect();
    sorted.sort_by_key(|n| return std::cmp::Reverse(n.len()));
    let alternatives = sorted.iter().map(|n| return name_fragment(n)).collect::<Vec<_>>().join("|");
    let pattern = format!(r"\{{\{{\s*(?:[Tt]emplate\s*:\s*)?({alternatives})\s*(\|[^{{}}]*)?\}}\}}");
    return compile(&pattern).map(Some);
}

/// Build the user-link regex from namespace prefixes such as `User:` or
/// `Special:Contributions/`.
///
/// # Errors
///
/// Returns `Error::InvalidPattern` if the assembled pattern does not compile.
fn user_link_regex(prefixes: &[String]) -> Result<Regex, Error> {
    let alternatives = prefixes
        .iter()
        .map(|prefix| {
            return prefix
                .split(':')
                .map(name_fragment)
                .collect::<Vec<_>>()
                .join(r"\s*:\s*");
        })
        .collect::<Vec<_>>()
        .join("|");
    let pattern = format!(r"\[\[\s*:?\s*(?:{alternatives})\s*([^|\[\]#/<>{{}}\n]+?)\s*(?:[|#/][^\[\]\n]*)?\]\]");
    return compile(&pattern);
}
