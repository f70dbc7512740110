use image::RgbaImage;
use tch::{CModule, Device, Kind, Tensor};

use super::labels::ClassLabels;
use super::model::{Classifier, ClassifierError, ClassifierSettings, network_name_for};
use super::preprocess::{normalized_chw, top_prediction};

/// TorchScript classifier loaded through libtorch.
///
/// Tensor names in the settings do not apply to TorchScript modules and are ignored.
pub struct TorchClassifier {
    model: CModule,
    device: Device,
    labels: ClassLabels,
    network: String,
    input_size: u32,
}

impl TorchClassifier {
    pub fn load(settings: &ClassifierSettings) -> Result<Self, ClassifierError> {
        let labels = ClassLabels::load(&settings.labels_path)?;
        let device = Device::cuda_if_available();
        let mut model = CModule::load_on_device(&settings.model_path, device).map_err(|e| {
            ClassifierError::Load {
                path: settings.model_path.clone(),
                reason: e.to_string(),
            }
        })?;
        model.set_eval();

        log::info!(
            "Loaded TorchScript model {} on {:?} ({} classes)",
            settings.model_path.display(),
            device,
            labels.len()
        );

        Ok(Self {
            model,
            device,
            labels,
            network: network_name_for(&settings.model_path),
            input_size: settings.input_size,
        })
    }
}

impl Classifier for TorchClassifier {
    fn classify(&self, image: &RgbaImage) -> Result<(usize, f32), ClassifierError> {
        let size = i64::from(self.input_size);
        let data = normalized_chw(image, self.input_size, self.input_size);

        let output = tch::no_grad(|| {
            let input = Tensor::from_slice(&data)
                .view([1, 3, size, size])
                .to_device(self.device);
            self.model.forward_ts(&[input])
        })
        .map_err(|e| ClassifierError::Inference(e.to_string()))?;

        let output_flat = output
            .to_kind(Kind::Float)
            .to_device(Device::Cpu)
            .view([-1]);
        let num_elements = output_flat.size()[0] as usize;
        let mut scores = vec![0.0f32; num_elements];
        output_flat.copy_data(&mut scores, num_elements);

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
