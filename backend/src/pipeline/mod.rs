mod error;

pub use error::{ErrorKind, PipelineError, ValidationError};

use image::RgbaImage;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::annotate::{BannerStyle, banner_text};
use crate::codec::{ImageCodec, ImageCrateCodec};
use crate::inference::Classifier;
use crate::storage::artifact_namer::{self, ArtifactPaths, NamingMode, derive_paths};

/// The process-wide model handle. Calls into it are serialized.
pub type SharedClassifier = Arc<Mutex<Box<dyn Classifier>>>;

pub type PipelineResult = Result<ClassifiedArtifact, PipelineError>;

#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationOutcome {
    pub class_index: usize,
    /// Fraction in `[0, 1]`; scaled to a percentage only when displayed.
    pub confidence: f32,
    pub class_label: String,
    pub model_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedArtifact {
    pub outcome: ClassificationOutcome,
    pub paths: ArtifactPaths,
}

/// Decoded pixels plus the name they were read from.
pub struct SourceImage {
    pub name: String,
    pub pixels: RgbaImage,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NamingPolicy {
    /// Write next to the source, or to `output` with its extension forced to `.jpg`.
    Adjacent { output: Option<PathBuf> },
    /// Paths already derived, and the input already staged, by the caller.
    Managed {
        paths: ArtifactPaths,
        display_name: String,
    },
}

impl NamingPolicy {
    fn display_name(&self, source_path: &Path) -> String {
        match self {
            NamingPolicy::Adjacent { .. } => source_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| source_path.display().to_string()),
            NamingPolicy::Managed { display_name, .. } => display_name.clone(),
        }
    }

    fn resolve(&self, source_path: &Path) -> ArtifactPaths {
        match self {
            NamingPolicy::Adjacent { output } => {
                let dir = source_path.parent().unwrap_or_else(|| Path::new(""));
                derive_paths(
                    &source_path.to_string_lossy(),
                    dir,
                    dir,
                    &NamingMode::Adjacent {
                        output: output.clone(),
                    },
                    artifact_namer::now(),
                )
            }
            NamingPolicy::Managed { paths, .. } => paths.clone(),
        }
    }
}

/// decode -> classify -> annotate -> encode, shared by every front-end.
#[derive(Clone)]
pub struct ClassificationPipeline {
    classifier: SharedClassifier,
    codec: Arc<dyn ImageCodec>,
    style: BannerStyle,
}

impl ClassificationPipeline {
    pub fn new(classifier: Box<dyn Classifier>) -> Self {
        Self::with_codec(
            Arc::new(Mutex::new(classifier)),
            Arc::new(ImageCrateCodec::new()),
        )
    }

    pub fn with_codec(classifier: SharedClassifier, codec: Arc<dyn ImageCodec>) -> Self {
        Self {
            classifier,
            codec,
            style: BannerStyle::default(),
        }
    }

    /// Decodes and classifies without touching the filesystem beyond the read.
    pub fn classify(&self, source_path: &Path) -> Result<ClassificationOutcome, PipelineError> {
        let source = self.decode(source_path)?;
        self.run_classifier(&source.pixels)
    }

    pub fn classify_and_annotate(
        &self,
        source_path: &Path,
        naming_policy: &NamingPolicy,
    ) -> PipelineResult {
        let mut source = self.decode(source_path)?;
        let outcome = self.run_classifier(&source.pixels)?;

        let text = banner_text(
            &naming_policy.display_name(source_path),
            &outcome.model_name,
            &outcome.class_label,
            outcome.confidence,
        );
        self.style.draw(&mut source.pixels, &text);

        let paths = naming_policy.resolve(source_path);
        self.codec
            .encode(&paths.output_path, &source.pixels)
            .map_err(|e| PipelineError::PersistFailed {
                path: paths.output_path.clone(),
                reason: e.to_string(),
            })?;

        log::info!(
            "Labeled {} as '{}' ({:.4}) -> {}",
            source.name,
            outcome.class_label,
            outcome.confidence,
            paths.output_path.display()
        );

        Ok(ClassifiedArtifact { outcome, paths })
    }

    fn decode(&self, path: &Path) -> Result<SourceImage, PipelineError> {
        let pixels = self
            .codec
            .decode(path)
            .map_err(|e| PipelineError::DecodeFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        log::debug!(
            "Decoded {} ({}x{})",
            path.display(),
            pixels.width(),
            pixels.height()
        );
        Ok(SourceImage {
            name: path.display().to_string(),
            pixels,
        })
    }

    fn run_classifier(&self, pixels: &RgbaImage) -> Result<ClassificationOutcome, PipelineError> {
        let classifier = self
            .classifier
            .lock()
            .map_err(|_| PipelineError::ClassificationFailed("classifier lock poisoned".to_string()))?;

        let (class_index, confidence) = classifier
            .classify(pixels)
            .map_err(|e| PipelineError::ClassificationFailed(e.to_string()))?;
        // NaN falls outside the range too.
        if !(0.0..=1.0).contains(&confidence) {
            return Err(PipelineError::ClassificationFailed(format!(
                "confidence {} for class #{} is outside [0, 1]",
                confidence, class_index
            )));
        }
        let class_label = classifier.describe_class(class_index).ok_or_else(|| {
            PipelineError::ClassificationFailed(format!("no label for class #{}", class_index))
        })?;

        Ok(ClassificationOutcome {
            class_index,
            confidence,
            class_label,
            model_name: classifier.network_name().to_string(),
        })
    }
}
