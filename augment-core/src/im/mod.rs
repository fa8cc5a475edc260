mod array;
mod boxes;
mod format;

pub use array::saturating_cast;
pub use array::{ArrayKind, ImageArray, PixelBuffer};

pub use boxes::BoundingBoxes;
pub use boxes::{read_boxes_json, write_boxes_json};

pub use format::BoundingBoxFormat;
