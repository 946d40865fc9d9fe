/// Crate-level error types for signature scanning and comment location.
use std::ops::Range;
use std::path::PathBuf;

/// Every error names the comment, file, or pattern involved so a caller can
/// show useful guidance without re-running the search.
#[allow(clippy::error_impl_error, reason = "crate-level error type re-exported as sigspan::Error")]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Two or more candidates scored equally and no tie-break separated them.
    #[error(
        "ambiguous comment: {} candidates scored {score:.3} ({})",
        spans.len(),
        spans.iter().map(|s| return format!("{}..{}", s.start, s.end)).collect::<Vec<_>>().join(", ")
    )]
    Ambiguous {
        /// The winning score shared by all tied candidates.
        score: f64,
        /// Byte spans of the tied candidates.
        spans: Vec<Range<usize>>,
    },

    /// An explicitly requested config file does not exist on disk.
    #[error("config not found: {}", path.display())]
    ConfigNotFound {
        /// Path to the missing config file.
        path: PathBuf,
    },

    /// A configured pattern (antipattern, namespace, template name, or
    /// timestamp grammar) does not compile.
    #[error("invalid pattern `{pattern}`: {source}")]
    InvalidPattern {
        /// The pattern text as assembled from configuration.
        pattern: String,
        /// The underlying regex compilation error.
        source: regex::Error,
    },

    /// Underlying I/O error from the filesystem.
    #[error("io: {0}")]
    Io(
        /// The wrapped I/O error.
        #[from]
        std::io::Error,
    ),

    /// JSON request or descriptor could not be deserialized.
    #[error("json: {0}")]
    Json(
        /// The wrapped JSON error.
        #[from]
        serde_json::Error,
    ),

    /// A timestamp string does not match the configured grammar.
    /// Non-fatal during scanning: the record keeps `date = None`.
    #[error("malformed timestamp: `{text}`")]
    MalformedTimestamp {
        /// The timestamp text that failed to parse.
        text: String,
    },

    /// No candidate passed the hard filter and cleared the acceptance threshold.
    #[error("comment not found: author `{author}`, timestamp `{}`", timestamp.as_deref().unwrap_or("none"))]
    NoCandidate {
        /// Display form of the target's author.
        author: String,
        /// The target's timestamp text, if it had one.
        timestamp: Option<String>,
    },

    /// The caller asked to locate a comment without supplying source text.
    #[error("no source text supplied")]
    NoSource,

    /// TOML deserialization failed.
    #[error("toml deserialize: {0}")]
    TomlDe(
        /// The wrapped TOML deserialization error.
        #[from]
        toml::de::Error,
    ),
}
