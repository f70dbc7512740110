use image::imageops::{self, FilterType};
use image::RgbaImage;

const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Resizes to `width`x`height` and lays the pixels out as normalized NCHW floats.
pub fn normalized_chw(image: &RgbaImage, width: u32, height: u32) -> Vec<f32> {
    let resized = imageops::resize(image, width, height, FilterType::Triangle);
    let plane = (width * height) as usize;
    let mut data = vec![0.0f32; 3 * plane];

    for (x, y, pixel) in resized.enumerate_pixels() {
        let offset = (y * width + x) as usize;
        for c in 0..3 {
            data[c * plane + offset] = (f32::from(pixel[c]) / 255.0 - MEAN[c]) / STD[c];
        }
    }
    data
}

/// Raw model scores turned into probabilities, unless they already are.
pub fn to_probabilities(scores: &[f32]) -> Vec<f32> {
    if is_distribution(scores) {
        return scores.to_vec();
    }
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = scores.iter().map(|s| (s - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Index and probability of the most likely class.
pub fn top_prediction(scores: &[f32]) -> Option<(usize, f32)> {
    to_probabilities(scores)
        .into_iter()
        .enumerate()
        .filter(|(_, p)| p.is_finite())
        .max_by(|a, b| a.1.total_cmp(&b.1))
}

fn is_distribution(scores: &[f32]) -> bool {
    let in_range = scores.iter().all(|s| (0.0..=1.0).contains(s));
    let sum: f32 = scores.iter().sum();
    in_range && (sum - 1.0).abs() < 1e-3
}
