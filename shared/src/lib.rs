use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ClassifyResponse {
    pub ok: bool,
    pub label: String,
    /// Percentage, two decimals.
    pub confidence: f64,
    pub class_idx: usize,
    pub network: String,
    pub input_image_url: String,
    pub output_image_url: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ErrorResponse {
    pub ok: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: error.into(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PingResponse {
    pub status: String,
}

impl PingResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}

/// Confidence fraction as whole hundredths of a percent, rounded half-up.
pub fn percent_hundredths(confidence: f32) -> i64 {
    (f64::from(confidence) * 10_000.0).round() as i64
}

/// Confidence fraction as a percentage rounded to two decimals, for JSON bodies.
pub fn percent_value(confidence: f32) -> f64 {
    percent_hundredths(confidence) as f64 / 100.0
}

/// Confidence fraction as a percentage string with exactly two decimals.
pub fn format_percent(confidence: f32) -> String {
    let hundredths = percent_hundredths(confidence);
    let sign = if hundredths < 0 { "-" } else { "" };
    let hundredths = hundredths.abs();
    format!("{}{}.{:02}", sign, hundredths / 100, hundredths % 100)
}
