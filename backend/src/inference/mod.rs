pub mod labels;
pub mod model;
pub mod onnx;
pub mod preprocess;
#[cfg(feature = "with-tch")]
pub mod torch;

pub use model::{Classifier, ClassifierError, ClassifierSettings, load_classifier};
