use std::fmt::Write as _;
use std::ops::Range;

use crate::error::Error;

/// Bold escape for headings on a terminal.
const BOLD: &str = "\x1b[1m";
/// Reset escape.
const RESET: &str = "\x1b[0m";

/// Render an error as markdown with bold headings and print to stderr.
pub fn print_error(e: &Error) {
    let md = render_error(e);
    for line in md.lines() {
        if line.starts_with('#') {
            eprintln!("{BOLD}{line}{RESET}");
        } else {
            eprintln!("{line}");
        }
    }
}

/// Render an error as a structured markdown diagnostic.
///
/// Each variant produces a block with what happened and how to proceed.
/// Not-found and ambiguous matches get different guidance: the first means
/// the descriptor is wrong or the comment is gone, the second that the
/// descriptor needs more context.
pub fn render_error(e: &Error) -> String {
    return match e {
        Error::Ambiguous { score, spans } => render_ambiguous(*score, spans),
        Error::NoCandidate { author, timestamp } => render_no_candidate(author, timestamp.as_deref()),
        Error::NoSource => render_no_source(),
        _ => render_generic(e),
    };
}

/// Tied candidates with their spans.
fn render_ambiguous(score: f64, spans: &[Range<usize>]) -> String {
    let mut out = format!(
        "\
# Error: Ambiguous Comment

{} comments matched equally well (score {score:.3}).

## Candidates

",
        spans.len()
    );
    for span in spans {
        let _ = writeln!(out, "- bytes {}..{}", span.start, span.end);
    }
    out.push_str(
        "\
\n## Fix

Add context to the target so the candidates differ:

- `ordinal`: position of the comment in the page or section
- `previous_comments`: author and timestamp of the one or two comments before it
- `full_text`: the comment's text
",
    );
    return out;
}

/// Remaining variants: configuration, patterns, and I/O.
fn render_generic(e: &Error) -> String {
    return match e {
        Error::ConfigNotFound { path } => format!(
            "\
# Error: Config Not Found

`{}` does not exist.

## Fix

Check the `--config` path, or omit it to use `.sigspan.toml` from the current directory.
",
            path.display()
        ),

        Error::InvalidPattern { pattern, source } => format!(
            "\
# Error: Invalid Pattern

`{pattern}` does not compile: {source}

## Fix

Correct the pattern in `.sigspan.toml`. Names and namespaces are matched literally; timestamp patterns are regular expressions.
"
        ),

        Error::Io(e) => format!(
            "\
# Error: I/O

{e}
"
        ),

        Error::Json(e) => format!(
            "\
# Error: Invalid JSON

{e}

## Fix

Targets need at least `author`; origin requests need `target` and `revisions`.
"
        ),

        Error::MalformedTimestamp { text } => format!(
            "\
# Error: Malformed Timestamp

`{text}` does not match the configured timestamp grammar.

## Fix

Set `date` explicitly, or adjust `[timestamp]` patterns and formats in `.sigspan.toml`.
"
        ),

        Error::TomlDe(e) => format!(
            "\
# Error: Invalid TOML

{e}
"
        ),

        _ => format!(
            "\
# Error

{e}
"
        ),
    };
}

/// No candidate passed the filter and threshold.
fn render_no_candidate(author: &str, timestamp: Option<&str>) -> String {
    let when = timestamp.map_or_else(|| return "without a timestamp".to_string(), |t| return format!("at `{t}`"));
    return format!(
        "\
# Error: Comment Not Found

No signed comment by `{author}` {when} matched.

## Fix

Check that the author and timestamp are as signed in the source. The comment may have been
removed, archived, or re-signed since the target was recorded.
"
    );
}

/// The caller had no text to search.
fn render_no_source() -> String {
    return "\
# Error: No Source

No page or section text was provided.

## Fix

Fetch the page or section source first, then locate the comment in it.
"
    .to_string();
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn not_found_and_ambiguous_differ() {
        let missing = render_error(&Error::NoCandidate {
            author: "Alice".to_string(),
            timestamp: Some("10:00, 1 May 2021 (UTC)".to_string()),
        });
        let tied = render_error(&Error::Ambiguous { score: 0.8, spans: vec![0..10, 20..30] });

        assert!(missing.starts_with("# Error: Comment Not Found"));
        assert!(missing.contains("`Alice` at `10:00, 1 May 2021 (UTC)`"));
        assert!(tied.starts_with("# Error: Ambiguous Comment"));
        assert!(tied.contains("- bytes 0..10\n- bytes 20..30\n"));
        assert!(tied.contains("previous_comments"));
    }

    #[test]
    fn every_block_has_a_heading() {
        let errors = [
            Error::NoSource,
            Error::ConfigNotFound { path: PathBuf::from("x.toml") },
            Error::MalformedTimestamp { text: "soon".to_string() },
            Error::Io(std::io::Error::other("disk")),
        ];
        for e in &errors {
            assert!(render_error(e).starts_with("# Error"), "{e}");
        }
    }
}
