use std::fs;
use std::path::{Path, PathBuf};

use crate::inference::ClassifierSettings;
use crate::inference::model::DEFAULT_INPUT_SIZE;

pub const DEFAULT_INPUT_BLOB: &str = "input_0";
pub const DEFAULT_OUTPUT_BLOB: &str = "output_0";
pub const DEFAULT_MAX_CONTENT_LENGTH: usize = 8 * 1024 * 1024;
pub const DEFAULT_PORT: u16 = 8000;
pub const PREFERRED_MODEL: &str = "resnet18.onnx";
pub const LABEL_CANDIDATES: [&str; 2] = ["label.txt", "labels.txt"];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(
        "ONNX model not found.\nPlace your model in {} (e.g., resnet18.onnx) or set MODEL_PATH=/abs/path/model.onnx",
        .0.display()
    )]
    ModelNotFound(PathBuf),
    #[error(
        "labels file not found.\nPlace label.txt or labels.txt in {} or set LABELS_PATH=/abs/path/labels.txt",
        .0.display()
    )]
    LabelsNotFound(PathBuf),
    #[error("invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },
}

/// Classifier options given on a command line; they win over the environment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassifierOverrides {
    pub model: Option<PathBuf>,
    pub labels: Option<PathBuf>,
    pub input_blob: Option<String>,
    pub output_blob: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub base_dir: PathBuf,
    pub static_dir: PathBuf,
    pub classifier: ClassifierSettings,
    pub max_content_length: usize,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let base_dir = base_dir(&lookup);
        let static_dir = lookup_nonempty(&lookup, "STATIC_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| base_dir.join("static"));
        let classifier =
            resolve_classifier_settings(&lookup, &base_dir, &ClassifierOverrides::default())?;
        let max_content_length =
            parse_or(&lookup, "MAX_CONTENT_LENGTH", DEFAULT_MAX_CONTENT_LENGTH)?;
        let port = parse_or(&lookup, "PORT", DEFAULT_PORT)?;

        Ok(Self {
            base_dir,
            static_dir,
            classifier,
            max_content_length,
            port,
        })
    }
}

pub fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// `BASE_DIR`, falling back to the working directory.
pub fn base_dir(lookup: &impl Fn(&str) -> Option<String>) -> PathBuf {
    lookup_nonempty(lookup, "BASE_DIR")
        .map(PathBuf::from)
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Overrides first, then `MODEL_PATH`/`LABELS_PATH`/`INPUT_BLOB`/`OUTPUT_BLOB`,
/// then files found in `base_dir`.
pub fn resolve_classifier_settings(
    lookup: &impl Fn(&str) -> Option<String>,
    base_dir: &Path,
    overrides: &ClassifierOverrides,
) -> Result<ClassifierSettings, ConfigError> {
    let model_path = overrides
        .model
        .clone()
        .or_else(|| lookup_nonempty(lookup, "MODEL_PATH").map(PathBuf::from))
        .or_else(|| autodetect_model(base_dir))
        .filter(|p| p.exists())
        .ok_or_else(|| ConfigError::ModelNotFound(base_dir.to_path_buf()))?;

    let labels_path = overrides
        .labels
        .clone()
        .or_else(|| lookup_nonempty(lookup, "LABELS_PATH").map(PathBuf::from))
        .or_else(|| autodetect_labels(base_dir))
        .filter(|p| p.exists())
        .ok_or_else(|| ConfigError::LabelsNotFound(base_dir.to_path_buf()))?;

    let input_tensor_name = overrides
        .input_blob
        .clone()
        .or_else(|| lookup_nonempty(lookup, "INPUT_BLOB"))
        .unwrap_or_else(|| DEFAULT_INPUT_BLOB.to_string());
    let output_tensor_name = overrides
        .output_blob
        .clone()
        .or_else(|| lookup_nonempty(lookup, "OUTPUT_BLOB"))
        .unwrap_or_else(|| DEFAULT_OUTPUT_BLOB.to_string());

    Ok(ClassifierSettings {
        model_path,
        labels_path,
        input_tensor_name,
        output_tensor_name,
        input_size: DEFAULT_INPUT_SIZE,
    })
}

/// `resnet18.onnx` if present, else the first `*.onnx` by name.
pub fn autodetect_model(base_dir: &Path) -> Option<PathBuf> {
    let preferred = base_dir.join(PREFERRED_MODEL);
    if preferred.exists() {
        return Some(preferred);
    }
    let mut candidates: Vec<PathBuf> = fs::read_dir(base_dir)
        .ok()?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("onnx"))
        })
        .collect();
    candidates.sort();
    candidates.into_iter().next()
}

pub fn autodetect_labels(base_dir: &Path) -> Option<PathBuf> {
    LABEL_CANDIDATES
        .iter()
        .map(|name| base_dir.join(name))
        .find(|path| path.exists())
}

fn lookup_nonempty(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key).filter(|v| !v.trim().is_empty())
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup_nonempty(lookup, key) {
        Some(value) => value.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value,
        }),
        None => Ok(default),
    }
}
