pub mod banner;
pub mod font;

pub use banner::{BannerStyle, banner_text, draw_banner};
