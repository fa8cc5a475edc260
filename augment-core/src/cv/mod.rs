pub mod transform;

pub use transform::{FillMode, Interpolation, ResizeOptions, Window};
pub use transform::{is_fast_resizable, resize, resize_array, resize_fast, resize_image};
