mod base;
mod brightness;
mod resize;

pub use base::{ImagePreprocessingLayer, validate_sample};
pub use brightness::RandomBrightness;
pub use resize::{Resize, ResizeConfig};
