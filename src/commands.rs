//! CLI commands for sigspan: scan, locate, origin.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use sigspan::config::Config;
use sigspan::error::Error;
use sigspan::origin::{RevisionDiff, find_originating_edit};
use sigspan::types::{RevisionMeta, SignatureRecord, TargetDescriptor};
use sigspan::{locator, signature};

/// File extensions scanned when `scan` is given a directory.
const WIKITEXT_EXTENSIONS: [&str; 2] = ["txt", "wiki"];

/// Origin request as read from JSON.
#[derive(Deserialize)]
struct OriginRequest {
    /// Revisions to search, oldest first.
    revisions: Vec<RevisionEntry>,
    /// The comment being attributed.
    target: TargetDescriptor,
}

/// One revision of an origin request. The diff is inline or in a file
/// relative to the request.
#[derive(Deserialize)]
struct RevisionEntry {
    /// Inline diff text.
    #[serde(default)]
    diff: Option<String>,
    /// Path to the diff text.
    #[serde(default)]
    diff_path: Option<PathBuf>,
    /// Revision metadata.
    meta: RevisionMeta,
}

/// Signatures of one scanned file.
#[derive(Serialize)]
struct ScannedFile {
    /// Path as walked.
    file: PathBuf,
    /// Signatures in text order.
    signatures: Vec<SignatureRecord>,
}

/// Exit code for a failed command: 1 when nothing matched, 2 when ambiguous,
/// 3 for I/O, input and config errors.
pub fn exit_code_for(e: &Error) -> ExitCode {
    return match e {
        Error::NoCandidate { .. } | Error::NoSource => ExitCode::FAILURE,
        Error::Ambiguous { .. } => ExitCode::from(2),
        _ => ExitCode::from(3),
    };
}

/// Load the config named on the command line, or `.sigspan.toml` from the
/// current directory.
///
/// # Errors
///
/// Returns `Error::ConfigNotFound` for a missing explicit path and parse or
/// pattern errors for a malformed file.
pub fn load_config(path: Option<&Path>) -> Result<Config, Error> {
    return match path {
        Some(p) => Config::load_file(p),
        None => Config::load(Path::new(".")),
    };
}

/// Locate a comment in a wikitext file and print its span.
///
/// # Errors
///
/// Returns I/O and JSON errors, and the locator's `NoCandidate` or
/// `Ambiguous`.
pub fn locate(file: &Path, target: &str, json: bool, config: &Config) -> Result<ExitCode, Error> {
    let source = std::fs::read_to_string(file)?;
    let target = read_target(target)?;
    let resolved = locator::locate(Some(&source), &target, config)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&resolved)?);
    } else {
        let signature = &resolved.boundary.signature;
        println!(
            "{}  {}..{}  {}  {}  score {:.3}",
            file.display(),
            resolved.boundary.span_start,
            resolved.boundary.span_end,
            signature.author.display_name(),
            signature.timestamp_text.as_deref().unwrap_or("-"),
            resolved.score
        );
    }
    return Ok(ExitCode::SUCCESS);
}

/// Find the revision that added a comment and print it.
///
/// # Errors
///
/// Returns I/O and JSON errors for the request and its diff files, and the
/// matcher's `NoCandidate` or `Ambiguous`.
pub fn origin(request_path: &Path, json: bool, config: &Config) -> Result<ExitCode, Error> {
    let request: OriginRequest = serde_json::from_str(&std::fs::read_to_string(request_path)?)?;
    let base = request_path.parent().unwrap_or_else(|| return Path::new("."));

    let revisions = request
        .revisions
        .into_iter()
        .map(|entry| -> Result<RevisionDiff, Error> {
            let diff = match (entry.diff, entry.diff_path) {
                (Some(inline), _) => inline,
                (None, Some(path)) => std::fs::read_to_string(base.join(path))?,
                (None, None) => String::new(),
            };
            return Ok(RevisionDiff { diff, meta: entry.meta });
        })
        .collect::<Result<Vec<_>, Error>>()?;

    let meta = find_originating_edit(&request.target, &revisions, config)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&meta)?);
    } else {
        let timestamp = meta.timestamp.map_or_else(|| return "-".to_string(), |t| return t.to_rfc3339());
        println!(
            "revision {}  {}  {}  {}",
            meta.id,
            timestamp,
            meta.user.as_deref().unwrap_or("-"),
            meta.comment.as_deref().unwrap_or("")
        );
    }
    return Ok(ExitCode::SUCCESS);
}

/// Read a target descriptor given inline as JSON or as a path to a JSON file.
///
/// # Errors
///
/// Returns `Error::Io` for an unreadable file and `Error::Json` for bad JSON.
fn read_target(arg: &str) -> Result<TargetDescriptor, Error> {
    if arg.trim_start().starts_with('{') {
        return Ok(serde_json::from_str(arg)?);
    }
    return Ok(serde_json::from_str(&std::fs::read_to_string(arg)?)?);
}

/// Scan a file, or every wikitext file under a directory, and list signatures.
///
/// # Errors
///
/// Returns `Error::Io` if a file cannot be read.
pub fn scan(path: &Path, json: bool, config: &Config) -> Result<ExitCode, Error> {
    let mut scanned = Vec::new();
    for file in wikitext_files(path) {
        let text = std::fs::read_to_string(&file)?;
        let signatures = signature::scan(&text, config);
        scanned.push(ScannedFile { file, signatures });
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&scanned)?);
        return Ok(ExitCode::SUCCESS);
    }

    for file in &scanned {
        println!("## {}\n", file.file.display());
        for record in &file.signatures {
            let kind = format!("{:?}", record.kind).to_lowercase();
            println!(
                "{:>4}  {}..{}  {:<8}  {}  {}",
                record.ordinal,
                record.start_index,
                record.end_index,
                kind,
                record.author.display_name(),
                record.timestamp_text.as_deref().unwrap_or("-")
            );
        }
        println!();
    }
    let total: usize = scanned.iter().map(|f| return f.signatures.len()).sum();
    eprintln!("{total} signatures in {} files", scanned.len());
    return Ok(ExitCode::SUCCESS);
}

/// `path` itself if it is a file, else every wikitext file below it.
fn wikitext_files(path: &Path) -> Vec<PathBuf> {
    if path.is_file() {
        return vec![path.to_path_buf()];
    }
    return WalkDir::new(path)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| return e.file_type().is_file())
        .filter(|e| {
            return e
                .path()
                .extension()
                .is_some_and(|ext| return WIKITEXT_EXTENSIONS.iter().any(|w| return ext == *w));
        })
        .map(|e| return e.path().to_path_buf())
        .collect();
}
