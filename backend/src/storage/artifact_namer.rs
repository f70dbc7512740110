use chrono::{Local, NaiveDateTime};
use std::path::{Path, PathBuf};
use unicode_normalization::UnicodeNormalization;

pub const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";
/// Substituted when sanitization leaves nothing of the original name.
pub const PLACEHOLDER_NAME: &str = "upload";
pub const LABELED_SUFFIX: &str = "_labeled";
pub const OUTPUT_EXTENSION: &str = "jpg";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamingMode {
    /// Output next to the input, or at `output` when the caller names one.
    Adjacent { output: Option<PathBuf> },
    /// Input staged under the upload directory, output in the output directory.
    Managed,
}

pub fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

pub fn timestamp_token(at: &NaiveDateTime) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Computes where the input and output artifacts of one run live.
///
/// Pure in its arguments: the same name, directories, mode and timestamp
/// always give the same paths. `upload_dir` and `output_dir` are only used
/// in managed mode; adjacent mode works off the directory of `original_name`.
pub fn derive_paths(
    original_name: &str,
    upload_dir: &Path,
    output_dir: &Path,
    mode: &NamingMode,
    at: NaiveDateTime,
) -> ArtifactPaths {
    let token = timestamp_token(&at);
    match mode {
        NamingMode::Adjacent { output } => {
            let input_path = PathBuf::from(original_name);
            let output_path = match output {
                Some(explicit) => force_jpg_extension(explicit),
                None => adjacent_output(&input_path, &token),
            };
            ArtifactPaths {
                input_path,
                output_path,
            }
        }
        NamingMode::Managed => {
            let staged = staged_file_name(original_name, &token);
            let stem = Path::new(&staged)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| staged.clone());
            ArtifactPaths {
                input_path: upload_dir.join(&staged),
                output_path: output_dir.join(format!(
                    "{}{}.{}",
                    stem, LABELED_SUFFIX, OUTPUT_EXTENSION
                )),
            }
        }
    }
}

/// `{token}_{sanitized name}`, a single path component.
pub fn staged_file_name(original_name: &str, token: &str) -> String {
    format!("{}_{}", token, sanitize_filename(original_name))
}

/// Reduces an untrusted filename to `[A-Za-z0-9._-]`.
///
/// The name is NFKD-decomposed first so accented letters keep their base
/// letter. Path separators and whitespace become `_`, anything else outside
/// the allow-list is dropped, and leading or trailing dots and underscores are
/// trimmed so the result can never name a parent directory. Never empty.
pub fn sanitize_filename(name: &str) -> String {
    let spaced: String = name
        .nfkd()
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();
    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");
    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();
    let trimmed = kept.trim_matches(|c| c == '.' || c == '_');

    if trimmed.is_empty() {
        PLACEHOLDER_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

fn adjacent_output(input: &Path, token: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| PLACEHOLDER_NAME.to_string());
    input.with_file_name(format!(
        "{}{}_{}.{}",
        stem, LABELED_SUFFIX, token, OUTPUT_EXTENSION
    ))
}

fn force_jpg_extension(path: &Path) -> PathBuf {
    match path.extension() {
        Some(ext) if ext.eq_ignore_ascii_case(OUTPUT_EXTENSION) => path.to_path_buf(),
        _ => path.with_extension(OUTPUT_EXTENSION),
    }
}
