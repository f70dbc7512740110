use image::RgbaImage;
use std::path::{Path, PathBuf};

use super::onnx::OnnxClassifier;

pub const DEFAULT_INPUT_SIZE: u32 = 224;

#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("failed to load model '{}': {reason}", .path.display())]
    Load { path: PathBuf, reason: String },
    #[error("failed to read labels '{}': {source}", .path.display())]
    Labels {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("labels file '{}' contains no labels", .0.display())]
    EmptyLabels(PathBuf),
    #[error("unsupported model format '{}'", .0.display())]
    UnsupportedModel(PathBuf),
    #[error("inference error: {0}")]
    Inference(String),
}

/// Everything needed to construct a classifier once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierSettings {
    pub model_path: PathBuf,
    pub labels_path: PathBuf,
    pub input_tensor_name: String,
    pub output_tensor_name: String,
    pub input_size: u32,
}

/// A loaded image classification model.
///
/// Implementations make no promise about concurrent use; callers share one
/// behind a mutex.
pub trait Classifier: Send {
    /// Top-1 class index and its confidence as a fraction in `[0, 1]`.
    fn classify(&self, image: &RgbaImage) -> Result<(usize, f32), ClassifierError>;

    fn describe_class(&self, class_index: usize) -> Option<String>;

    fn network_name(&self) -> &str;
}

/// Picks a backend from the model file extension and loads it.
pub fn load_classifier(settings: &ClassifierSettings) -> Result<Box<dyn Classifier>, ClassifierError> {
    let extension = settings
        .model_path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "onnx" => Ok(Box::new(OnnxClassifier::load(settings)?)),
        #[cfg(feature = "with-tch")]
        "pt" | "pth" | "torchscript" => Ok(Box::new(super::torch::TorchClassifier::load(settings)?)),
        _ => Err(ClassifierError::UnsupportedModel(settings.model_path.clone())),
    }
}

/// Model file stem, e.g. `resnet18` for `models/resnet18.onnx`.
pub fn network_name_for(model_path: &Path) -> String {
    model_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "custom".to_string())
}
