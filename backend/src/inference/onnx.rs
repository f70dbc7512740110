use image::RgbaImage;
use tract_onnx::prelude::*;

use super::labels::ClassLabels;
use super::model::{Classifier, ClassifierError, ClassifierSettings, network_name_for};
use super::preprocess::{normalized_chw, top_prediction};

type OnnxPlan = SimplePlan<TypedFact, Box<dyn TypedOp>, TypedModel>;

/// ONNX image classifier run on the CPU through tract.
pub struct OnnxClassifier {
    plan: OnnxPlan,
    labels: ClassLabels,
    network: String,
    input_size: u32,
}

impl OnnxClassifier {
    pub fn load(settings: &ClassifierSettings) -> Result<Self, ClassifierError> {
        let labels = ClassLabels::load(&settings.labels_path)?;
        let size = settings.input_size as usize;

        let plan = tract_onnx::onnx()
            .model_for_path(&settings.model_path)
            .and_then(|model| model.with_input_names([settings.input_tensor_name.as_str()]))
            .and_then(|model| model.with_output_names([settings.output_tensor_name.as_str()]))
            .and_then(|model| {
                model.with_input_fact(
                    0,
                    InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, size, size)),
                )
            })
            .and_then(|model| model.into_optimized())
            .and_then(|model| model.into_runnable())
            .map_err(|e| ClassifierError::Load {
                path: settings.model_path.clone(),
                reason: format!("{:?}", e),
            })?;

        log::info!(
            "Loaded ONNX model {} ({} classes, {} -> {})",
            settings.model_path.display(),
            labels.len(),
            settings.input_tensor_name,
            settings.output_tensor_name
        );

        Ok(Self {
            plan,
            labels,
            network: network_name_for(&settings.model_path),
            input_size: settings.input_size,
        })
    }
}

impl Classifier for OnnxClassifier {
    fn classify(&self, image: &RgbaImage) -> Result<(usize, f32), ClassifierError> {
        let size = self.input_size as usize;
        let data = normalized_chw(image, self.input_size, self.input_size);
        let input = tract_ndarray::Array4::from_shape_vec((1, 3, size, size), data)
            .map_err(|e| ClassifierError::Inference(e.to_string()))?
            .into_tensor();

        let outputs = self
            .plan
            .run(tvec!(input.into_tvalue()))
            .map_err(|e| ClassifierError::Inference(format!("{:?}", e)))?;
        let output = outputs
            .first()
            .ok_or_else(|| ClassifierError::Inference("model produced no outputs".to_string()))?;
        let scores: Vec<f32> = output
            .to_array_view::<f32>()
            .map_err(|e| ClassifierError::Inference(format!("{:?}", e)))?
            .iter()
            .copied()
            .collect();

        top_prediction(&scores)
            .ok_or_else(|| ClassifierError::Inference("model produced no scores".to_string()))
    }

    fn describe_class(&self, class_index: usize) -> Option<String> {
        self.labels.get(class_index).map(str::to_string)
    }

    fn network_name(&self) -> &str {
        &self.network
    }
}
