// Copyright (c) 2025, Tom Ouellette
// Licensed under the BSD 3-Clause License

// Inclusive bounds for any `factor` argument of a stochastic layer
pub const FACTOR_BOUNDS: (f64, f64) = (-1.0, 1.0);

// Valid tensor axis layouts
pub const DATA_FORMATS: [&str; 2] = ["channels_first", "channels_last"];

// Valid resampling filters
pub const INTERPOLATIONS: [&str; 6] = [
    "nearest", "bilinear", "bicubic", "lanczos3", "lanczos5", "area",
];

// Valid policies for pixels created by padding
pub const FILL_MODES: [&str; 4] = ["constant", "nearest", "reflect", "wrap"];

// Valid bounding box coordinate layouts
pub const BOUNDING_BOX_FORMATS: [&str; 9] = [
    "xyxy",
    "yxyx",
    "xywh",
    "center_xywh",
    "center_yxhw",
    "rel_xyxy",
    "rel_yxyx",
    "rel_xywh",
    "rel_center_xywh",
];

// Coordinate and label value marking padded rows of a dense box tensor
pub const BOX_PADDING_VALUE: f32 = -1.0;
pub const LABEL_PADDING_VALUE: i64 = -1;

// Image formats readable and writable by the cli
pub const SUPPORTED_IMAGE_FORMATS: [&str; 8] =
    ["bmp", "jpeg", "jpg", "png", "tga", "tif", "tiff", "npy"];

// The currently supported common image formats
pub const IMAGE_DYNAMIC_FORMATS: [&str; 7] = ["bmp", "jpeg", "jpg", "png", "tga", "tif", "tiff"];

// All currently supported array formats
pub const SUPPORTED_ARRAY_FORMATS: [&str; 1] = ["json"];

// The valid json keys indicating bounding box values
pub const BOUNDING_BOX_JSON_VALID_KEYS: [&str; 6] = [
    "bounding_boxes",
    "bboxes",
    "bounding_box",
    "boxes",
    "xyxy",
    "bbox",
];

// The valid json keys indicating bounding box class labels
pub const LABEL_JSON_VALID_KEYS: [&str; 3] = ["labels", "classes", "class_ids"];
