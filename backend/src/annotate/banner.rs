use image::{Rgba, RgbaImage};
use shared::format_percent;

use super::font::{GLYPH_HEIGHT, GLYPH_WIDTH, glyph};

/// Pixel size of one font dot.
const SCALE: i32 = 3;
const PADDING: i32 = 4;
const ADVANCE: i32 = (GLYPH_WIDTH + 1) * SCALE;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BannerStyle {
    pub x: i32,
    pub y: i32,
    pub foreground: Rgba<u8>,
    pub background: Rgba<u8>,
}

impl Default for BannerStyle {
    fn default() -> Self {
        Self {
            x: 10,
            y: 10,
            foreground: Rgba([255, 255, 255, 255]),
            background: Rgba([0, 0, 0, 160]),
        }
    }
}

impl BannerStyle {
    pub fn draw(&self, image: &mut RgbaImage, text: &str) {
        draw_banner(image, self.x, self.y, text, self.foreground, self.background);
    }
}

/// `"{name} | {network} | {label} ({pct}%)"`, confidence given as a fraction.
pub fn banner_text(name: &str, network: &str, label: &str, confidence: f32) -> String {
    format!(
        "{} | {} | {} ({}%)",
        name,
        network,
        label,
        format_percent(confidence)
    )
}

/// Width and height of the background box drawn for `text`.
pub fn banner_size(text: &str) -> (i32, i32) {
    let chars = text.chars().count() as i32;
    let text_width = if chars == 0 { 0 } else { chars * ADVANCE - SCALE };
    (text_width + 2 * PADDING, GLYPH_HEIGHT * SCALE + 2 * PADDING)
}

/// Draws a single line of text over a translucent box anchored at `(x, y)`.
///
/// The anchor is not checked against the canvas; anything falling outside
/// the image is skipped.
pub fn draw_banner(
    image: &mut RgbaImage,
    x: i32,
    y: i32,
    text: &str,
    fg_color: Rgba<u8>,
    bg_color: Rgba<u8>,
) {
    let (width, height) = banner_size(text);
    fill_rect(image, x, y, width, height, bg_color);

    let top = y + PADDING;
    let mut left = x + PADDING;
    for ch in text.chars() {
        for (row, bits) in glyph(ch).iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if (bits >> (GLYPH_WIDTH - 1 - col)) & 1 == 1 {
                    fill_rect(
                        image,
                        left + col * SCALE,
                        top + row as i32 * SCALE,
                        SCALE,
                        SCALE,
                        fg_color,
                    );
                }
            }
        }
        left += ADVANCE;
    }
}

fn fill_rect(image: &mut RgbaImage, left: i32, top: i32, width: i32, height: i32, color: Rgba<u8>) {
    let (image_width, image_height) = (i64::from(image.width()), i64::from(image.height()));
    let x0 = i64::from(left).max(0);
    let y0 = i64::from(top).max(0);
    let x1 = (i64::from(left) + i64::from(width)).min(image_width);
    let y1 = (i64::from(top) + i64::from(height)).min(image_height);

    for py in y0..y1 {
        for px in x0..x1 {
            blend(image.get_pixel_mut(px as u32, py as u32), color);
        }
    }
}

fn blend(dst: &mut Rgba<u8>, src: Rgba<u8>) {
    let alpha = u32::from(src[3]);
    for c in 0..3 {
        let mixed = u32::from(src[c]) * alpha + u32::from(dst[c]) * (255 - alpha);
        dst[c] = ((mixed + 127) / 255) as u8;
    }
    dst[3] = dst[3].max(src[3]);
}
