// Copyright (c) 2025, Tom Ouellette
// Licensed under the BSD 3-Clause License

use std::f64::consts::PI;
use std::str::FromStr;

use fast_image_resize;
use fast_image_resize::{FilterType, PixelType, ResizeAlg, images::Image};
use num::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::error::AugmentError;
use crate::im::{ArrayKind, ImageArray, PixelBuffer};

/// Resampling filter used when changing the spatial size of an image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpolation {
    Nearest,
    Bilinear,
    Bicubic,
    Lanczos3,
    Lanczos5,
    Area,
}

impl Interpolation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Interpolation::Nearest => "nearest",
            Interpolation::Bilinear => "bilinear",
            Interpolation::Bicubic => "bicubic",
            Interpolation::Lanczos3 => "lanczos3",
            Interpolation::Lanczos5 => "lanczos5",
            Interpolation::Area => "area",
        }
    }

    /// Half-width of the filter kernel in source pixels (before antialiasing)
    fn support(&self) -> f64 {
        match self {
            Interpolation::Nearest | Interpolation::Area => 0.5,
            Interpolation::Bilinear => 1.0,
            Interpolation::Bicubic => 2.0,
            Interpolation::Lanczos3 => 3.0,
            Interpolation::Lanczos5 => 5.0,
        }
    }

    fn kernel(&self, x: f64) -> f64 {
        match self {
            Interpolation::Nearest | Interpolation::Area => {
                if x > -0.5 && x <= 0.5 {
                    1.0
                } else {
                    0.0
                }
            }
            Interpolation::Bilinear => (1.0 - x.abs()).max(0.0),
            Interpolation::Bicubic => {
                // Keys cubic convolution with a = -0.5
                let a = -0.5;
                let x = x.abs();
                if x < 1.0 {
                    ((a + 2.0) * x - (a + 3.0)) * x * x + 1.0
                } else if x < 2.0 {
                    (((x - 5.0) * x + 8.0) * x - 4.0) * a
                } else {
                    0.0
                }
            }
            Interpolation::Lanczos3 => lanczos(x, 3.0),
            Interpolation::Lanczos5 => lanczos(x, 5.0),
        }
    }
}

impl FromStr for Interpolation {
    type Err = AugmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "nearest" => Ok(Interpolation::Nearest),
            "bilinear" => Ok(Interpolation::Bilinear),
            "bicubic" => Ok(Interpolation::Bicubic),
            "lanczos3" => Ok(Interpolation::Lanczos3),
            "lanczos5" => Ok(Interpolation::Lanczos5),
            "area" => Ok(Interpolation::Area),
            _ => Err(AugmentError::InterpolationError(s.to_string())),
        }
    }
}

fn sinc(x: f64) -> f64 {
    if x == 0.0 {
        1.0
    } else {
        let x = x * PI;
        x.sin() / x
    }
}

fn lanczos(x: f64, a: f64) -> f64 {
    if x.abs() < a {
        sinc(x) * sinc(x / a)
    } else {
        0.0
    }
}

/// Policy for pixels that fall outside the source image when padding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillMode {
    Constant,
    Nearest,
    Reflect,
    Wrap,
}

impl FillMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FillMode::Constant => "constant",
            FillMode::Nearest => "nearest",
            FillMode::Reflect => "reflect",
            FillMode::Wrap => "wrap",
        }
    }

    /// Map a possibly out-of-range coordinate onto the source axis
    ///
    /// Returns `None` when the pixel should take the constant fill value.
    fn source_index(&self, index: isize, size: usize) -> Option<usize> {
        let n = size as isize;

        if (0..n).contains(&index) {
            return Some(index as usize);
        }

        match self {
            FillMode::Constant => None,
            FillMode::Nearest => Some(index.clamp(0, n - 1) as usize),
            FillMode::Reflect => {
                let m = index.rem_euclid(2 * n);
                let reflected = if m < n { m } else { 2 * n - 1 - m };
                Some(reflected as usize)
            }
            FillMode::Wrap => Some(index.rem_euclid(n) as usize),
        }
    }
}

impl FromStr for FillMode {
    type Err = AugmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "constant" => Ok(FillMode::Constant),
            "nearest" => Ok(FillMode::Nearest),
            "reflect" => Ok(FillMode::Reflect),
            "wrap" => Ok(FillMode::Wrap),
            _ => Err(AugmentError::FillModeError(s.to_string())),
        }
    }
}

/// A rectangular region in pixel units
///
/// For crops, `y` and `x` locate the region inside the source image. For
/// padding, `y` and `x` locate the source image inside a padded canvas of
/// size `height` x `width`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub y: usize,
    pub x: usize,
    pub height: usize,
    pub width: usize,
}

/// Largest centred crop of the source with the target aspect ratio
///
/// # Arguments
///
/// * `height` - Source height
/// * `width` - Source width
/// * `target_height` - Height the crop will be resized to
/// * `target_width` - Width the crop will be resized to
///
/// # Examples
///
/// ```
/// use augment_core::cv::transform::{Window, aspect_ratio_crop};
///
/// let window = aspect_ratio_crop(100, 200, 50, 50);
/// assert_eq!(window, Window { y: 0, x: 50, height: 100, width: 100 });
/// ```
pub fn aspect_ratio_crop(
    height: usize,
    width: usize,
    target_height: usize,
    target_width: usize,
) -> Window {
    let crop_height = (width as f64 * target_height as f64 / target_width as f64) as usize;
    let crop_height = crop_height.min(height).max(1);

    let crop_width = (height as f64 * target_width as f64 / target_height as f64) as usize;
    let crop_width = crop_width.min(width).max(1);

    Window {
        y: (height - crop_height) / 2,
        x: (width - crop_width) / 2,
        height: crop_height,
        width: crop_width,
    }
}

/// Smallest canvas with the target aspect ratio that contains the source
///
/// # Arguments
///
/// * `height` - Source height
/// * `width` - Source width
/// * `target_height` - Height the canvas will be resized to
/// * `target_width` - Width the canvas will be resized to
///
/// # Examples
///
/// ```
/// use augment_core::cv::transform::{Window, aspect_ratio_pad};
///
/// let window = aspect_ratio_pad(100, 200, 50, 50);
/// assert_eq!(window, Window { y: 50, x: 0, height: 200, width: 200 });
/// ```
pub fn aspect_ratio_pad(
    height: usize,
    width: usize,
    target_height: usize,
    target_width: usize,
) -> Window {
    let pad_height = (width as f64 * target_height as f64 / target_width as f64) as usize;
    let pad_height = pad_height.max(height);

    let pad_width = (height as f64 * target_width as f64 / target_height as f64) as usize;
    let pad_width = pad_width.max(width);

    Window {
        y: (pad_height - height) / 2,
        x: (pad_width - width) / 2,
        height: pad_height,
        width: pad_width,
    }
}

/// Copy a window out of a row-major (height, width, channels) buffer
///
/// # Arguments
///
/// * `buffer` - Input buffer of length `height * width * channels`
/// * `height` - Buffer height
/// * `width` - Buffer width
/// * `channels` - Number of channels
/// * `window` - Region to keep
pub fn crop(
    buffer: &[f64],
    height: usize,
    width: usize,
    channels: usize,
    window: Window,
) -> Result<Vec<f64>, AugmentError> {
    if buffer.len() != height * width * channels {
        return Err(AugmentError::BufferSizeError);
    }

    if window.y + window.height > height || window.x + window.width > width {
        return Err(AugmentError::ImageError("Cropping coordinates out of bounds"));
    }

    let mut cropped = Vec::with_capacity(window.height * window.width * channels);

    for row in window.y..window.y + window.height {
        let start = (row * width + window.x) * channels;
        let end = start + window.width * channels;
        cropped.extend_from_slice(&buffer[start..end]);
    }

    Ok(cropped)
}

/// Place a row-major (height, width, channels) buffer inside a larger canvas
///
/// # Arguments
///
/// * `buffer` - Input buffer of length `height * width * channels`
/// * `height` - Buffer height
/// * `width` - Buffer width
/// * `channels` - Number of channels
/// * `window` - Canvas size and the offset of the source inside it
/// * `fill_mode` - How pixels outside the source are filled
/// * `fill_value` - Value used by `FillMode::Constant`
pub fn pad(
    buffer: &[f64],
    height: usize,
    width: usize,
    channels: usize,
    window: Window,
    fill_mode: FillMode,
    fill_value: f64,
) -> Result<Vec<f64>, AugmentError> {
    if buffer.len() != height * width * channels {
        return Err(AugmentError::BufferSizeError);
    }

    if window.y + height > window.height || window.x + width > window.width {
        return Err(AugmentError::ImageError("Padding canvas is smaller than image"));
    }

    let mut padded = Vec::with_capacity(window.height * window.width * channels);

    for row in 0..window.height {
        let source_row = fill_mode.source_index(row as isize - window.y as isize, height);

        for col in 0..window.width {
            let source_col = fill_mode.source_index(col as isize - window.x as isize, width);

            match (source_row, source_col) {
                (Some(y), Some(x)) => {
                    let start = (y * width + x) * channels;
                    padded.extend_from_slice(&buffer[start..start + channels]);
                }
                _ => padded.extend(std::iter::repeat_n(fill_value, channels)),
            }
        }
    }

    Ok(padded)
}

/// Per-output-pixel filter taps along one axis
struct Coefficients {
    starts: Vec<usize>,
    weights: Vec<Vec<f64>>,
}

fn compute_coefficients(
    in_size: usize,
    out_size: usize,
    interpolation: Interpolation,
    antialias: bool,
) -> Coefficients {
    let scale = in_size as f64 / out_size as f64;

    let mut starts = Vec::with_capacity(out_size);
    let mut weights = Vec::with_capacity(out_size);

    if interpolation == Interpolation::Nearest {
        for i in 0..out_size {
            let index = ((i as f64 + 0.5) * scale).floor() as usize;
            starts.push(index.min(in_size - 1));
            weights.push(vec![1.0]);
        }

        return Coefficients { starts, weights };
    }

    let widen = antialias || interpolation == Interpolation::Area;
    let filter_scale = if widen && scale > 1.0 { scale } else { 1.0 };
    let support = interpolation.support() * filter_scale;

    for i in 0..out_size {
        let center = (i as f64 + 0.5) * scale;
        let start = (center - support).floor().max(0.0) as usize;
        let end = ((center + support).ceil() as usize).min(in_size);

        let mut taps: Vec<f64> = (start..end)
            .map(|j| interpolation.kernel((j as f64 + 0.5 - center) / filter_scale))
            .collect();

        let total: f64 = taps.iter().sum();

        if total.abs() > f64::EPSILON {
            taps.iter_mut().for_each(|w| *w /= total);
            starts.push(start);
            weights.push(taps);
        } else {
            // Snap to the closest source pixel
            let index = (center.floor() as usize).min(in_size - 1);
            starts.push(index);
            weights.push(vec![1.0]);
        }
    }

    Coefficients { starts, weights }
}

/// Resample along the width axis: (h, w, c) -> (h, new_w, c)
fn resample_columns(
    buffer: &[f64],
    height: usize,
    width: usize,
    channels: usize,
    coefficients: &Coefficients,
) -> Vec<f64> {
    let new_width = coefficients.starts.len();
    let mut result = vec![0f64; height * new_width * channels];

    for y in 0..height {
        for (x, (start, taps)) in coefficients
            .starts
            .iter()
            .zip(&coefficients.weights)
            .enumerate()
        {
            let out = (y * new_width + x) * channels;
            for (k, w) in taps.iter().enumerate() {
                let src = (y * width + start + k) * channels;
                for c in 0..channels {
                    result[out + c] += buffer[src + c] * w;
                }
            }
        }
    }

    result
}

/// Resample along the height axis: (h, w, c) -> (new_h, w, c)
fn resample_rows(
    buffer: &[f64],
    width: usize,
    channels: usize,
    coefficients: &Coefficients,
) -> Vec<f64> {
    let new_height = coefficients.starts.len();
    let row_len = width * channels;
    let mut result = vec![0f64; new_height * row_len];

    for (y, (start, taps)) in coefficients
        .starts
        .iter()
        .zip(&coefficients.weights)
        .enumerate()
    {
        let out = &mut result[y * row_len..(y + 1) * row_len];
        for (k, w) in taps.iter().enumerate() {
            let src = &buffer[(start + k) * row_len..(start + k + 1) * row_len];
            for (o, s) in out.iter_mut().zip(src) {
                *o += s * w;
            }
        }
    }

    result
}

/// Resize a row-major (height, width, channels) buffer with a separable filter
///
/// This is the general resampler used for element types, channel counts and
/// filters that `resize_fast` cannot handle. Output pixel centres are mapped onto the source with half-pixel offsets.
/// Filter taps that fall outside the source are dropped and the remaining
/// taps renormalized, so constant regions stay constant at the borders.
///
/// # Arguments
///
/// * `buffer` - Input buffer in row-major order (height * width * channels)
/// * `height` - Current height of the image
/// * `width` - Current width of the image
/// * `channels` - Number of channels
/// * `new_height` - Target height
/// * `new_width` - Target width
/// * `interpolation` - Resampling filter
/// * `antialias` - Widen the filter by the scale factor when downsampling
///
/// # Examples
///
/// ```
/// use augment_core::cv::transform::{Interpolation, resize};
///
/// let buffer = vec![2u8; 3 * 3];
/// let resized = resize(&buffer, 3, 3, 1, 5, 4, Interpolation::Bilinear, false);
/// assert_eq!(resized.len(), 20);
/// ```
#[allow(clippy::too_many_arguments)]
pub fn resize<T>(
    buffer: &[T],
    height: usize,
    width: usize,
    channels: usize,
    new_height: usize,
    new_width: usize,
    interpolation: Interpolation,
    antialias: bool,
) -> Vec<f64>
where
    T: Copy + ToPrimitive,
{
    assert_eq!(buffer.len(), height * width * channels);

    let buffer: Vec<f64> = buffer.iter().map(|v| v.to_f64().unwrap_or(0.0)).collect();

    if height == new_height && width == new_width {
        return buffer;
    }

    let columns = compute_coefficients(width, new_width, interpolation, antialias);
    let rows = compute_coefficients(height, new_height, interpolation, antialias);

    let resized = resample_columns(&buffer, height, width, channels, &columns);
    resample_rows(&resized, new_width, channels, &rows)
}

/// Options for the crop/pad/resize pipeline applied to one image
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResizeOptions {
    pub interpolation: Interpolation,
    pub antialias: bool,
    pub crop_to_aspect_ratio: bool,
    pub pad_to_aspect_ratio: bool,
    pub fill_mode: FillMode,
    pub fill_value: f64,
}

impl Default for ResizeOptions {
    fn default() -> Self {
        ResizeOptions {
            interpolation: Interpolation::Bilinear,
            antialias: false,
            crop_to_aspect_ratio: false,
            pad_to_aspect_ratio: false,
            fill_mode: FillMode::Constant,
            fill_value: 0.0,
        }
    }
}

/// Resize one image, optionally cropping or padding to the target aspect ratio first
///
/// # Arguments
///
/// * `buffer` - Input buffer in row-major order (height * width * channels)
/// * `height` - Current height of the image
/// * `width` - Current width of the image
/// * `channels` - Number of channels
/// * `new_height` - Target height
/// * `new_width` - Target width
/// * `options` - Filter and aspect ratio settings
pub fn resize_image(
    buffer: &[f64],
    height: usize,
    width: usize,
    channels: usize,
    new_height: usize,
    new_width: usize,
    options: &ResizeOptions,
) -> Result<Vec<f64>, AugmentError> {
    let (buffer, height, width) = if options.crop_to_aspect_ratio {
        let window = aspect_ratio_crop(height, width, new_height, new_width);
        (
            crop(buffer, height, width, channels, window)?,
            window.height,
            window.width,
        )
    } else if options.pad_to_aspect_ratio {
        let window = aspect_ratio_pad(height, width, new_height, new_width);
        (
            pad(
                buffer,
                height,
                width,
                channels,
                window,
                options.fill_mode,
                options.fill_value,
            )?,
            window.height,
            window.width,
        )
    } else {
        if buffer.len() != height * width * channels {
            return Err(AugmentError::BufferSizeError);
        }
        (buffer.to_vec(), height, width)
    };

    Ok(resize(
        &buffer,
        height,
        width,
        channels,
        new_height,
        new_width,
        options.interpolation,
        options.antialias,
    ))
}

/// Resampling algorithm of the SIMD resizer matching an interpolation
///
/// Lanczos5 has no counterpart and always uses the general resampler.
pub fn fast_algorithm(interpolation: Interpolation) -> Option<ResizeAlg> {
    match interpolation {
        Interpolation::Nearest => Some(ResizeAlg::Nearest),
        Interpolation::Bilinear => Some(ResizeAlg::Convolution(FilterType::Bilinear)),
        Interpolation::Bicubic => Some(ResizeAlg::Convolution(FilterType::CatmullRom)),
        Interpolation::Lanczos3 => Some(ResizeAlg::Convolution(FilterType::Lanczos3)),
        Interpolation::Area => Some(ResizeAlg::Convolution(FilterType::Box)),
        Interpolation::Lanczos5 => None,
    }
}

fn fast_pixel_type(kind: ArrayKind, channels: usize) -> Option<PixelType> {
    match (kind, channels) {
        (ArrayKind::U8, 1) => Some(PixelType::U8),
        (ArrayKind::U8, 2) => Some(PixelType::U8x2),
        (ArrayKind::U8, 3) => Some(PixelType::U8x3),
        (ArrayKind::U8, 4) => Some(PixelType::U8x4),
        (ArrayKind::U16, 1) => Some(PixelType::U16),
        (ArrayKind::U16, 2) => Some(PixelType::U16x2),
        (ArrayKind::U16, 3) => Some(PixelType::U16x3),
        (ArrayKind::U16, 4) => Some(PixelType::U16x4),
        (ArrayKind::F32, 1) => Some(PixelType::F32),
        (ArrayKind::F32, 2) => Some(PixelType::F32x2),
        (ArrayKind::F32, 3) => Some(PixelType::F32x3),
        (ArrayKind::F32, 4) => Some(PixelType::F32x4),
        _ => None,
    }
}

/// Check if an image can be resized by `resize_fast` with the provided options
///
/// The SIMD resizer always widens its filters when downsampling, so only
/// antialiased resizing is routed to it. Padding needs a fill policy and
/// stays on the general resampler.
///
/// # Arguments
///
/// * `kind` - Element type of the image
/// * `channels` - Number of channels
/// * `options` - Filter and aspect ratio settings
pub fn is_fast_resizable(kind: ArrayKind, channels: usize, options: &ResizeOptions) -> bool {
    options.antialias
        && !options.pad_to_aspect_ratio
        && fast_algorithm(options.interpolation).is_some()
        && fast_pixel_type(kind, channels).is_some()
}

/// Resize a u8, u16 or f32 image with at most four channels using fast_image_resize
///
/// Returns `None` if the element type, channel count or filter is not
/// supported by the SIMD resizer.
///
/// # Arguments
///
/// * `image` - Image to resize
/// * `new_height` - Target height
/// * `new_width` - Target width
/// * `interpolation` - Resampling filter
/// * `crop` - Optional source window that is resized instead of the full image
///
/// # Examples
///
/// ```
/// use augment_core::cv::transform::{Interpolation, resize_fast};
/// use augment_core::im::{ImageArray, PixelBuffer};
///
/// let image = ImageArray::U8(PixelBuffer::new(4, 4, 3, vec![9u8; 4 * 4 * 3]).unwrap());
/// let resized = resize_fast(&image, 2, 6, Interpolation::Bilinear, None).unwrap().unwrap();
/// assert_eq!(resized.shape(), (2, 6, 3));
/// ```
pub fn resize_fast(
    image: &ImageArray,
    new_height: usize,
    new_width: usize,
    interpolation: Interpolation,
    crop: Option<Window>,
) -> Result<Option<ImageArray>, AugmentError> {
    let (height, width, channels) = image.shape();

    let (Some(algorithm), Some(pixel_type)) = (
        fast_algorithm(interpolation),
        fast_pixel_type(image.kind(), channels),
    ) else {
        return Ok(None);
    };

    if height == 0 || width == 0 || new_height == 0 || new_width == 0 {
        return Err(AugmentError::ImageError(
            "Cannot resize from or to an empty spatial size.",
        ));
    }

    let bytes: Vec<u8> = match image {
        ImageArray::U8(buffer) => buffer.as_raw().to_vec(),
        ImageArray::U16(buffer) => buffer
            .as_raw()
            .iter()
            .flat_map(|v| v.to_ne_bytes())
            .collect(),
        ImageArray::F32(buffer) => buffer
            .as_raw()
            .iter()
            .flat_map(|v| v.to_ne_bytes())
            .collect(),
        _ => return Ok(None),
    };

    let source = Image::from_vec_u8(width as u32, height as u32, bytes, pixel_type)
        .map_err(|_| AugmentError::ImageError("Source buffer does not match its pixel type."))?;

    let mut destination = Image::new(new_width as u32, new_height as u32, pixel_type);

    let mut option = fast_image_resize::ResizeOptions {
        algorithm,
        cropping: fast_image_resize::SrcCropping::None,
        mul_div_alpha: false,
    };

    if let Some(window) = crop {
        option = option.crop(
            window.x as f64,
            window.y as f64,
            window.width as f64,
            window.height as f64,
        );
    }

    let mut resizer = fast_image_resize::Resizer::new();
    resizer
        .resize(&source, &mut destination, &option)
        .map_err(|_| AugmentError::ImageError("Resizing with fast_image_resize failed."))?;

    let raw = destination.into_vec();

    let resized = match image.kind() {
        ArrayKind::U8 => ImageArray::U8(PixelBuffer::new(new_width, new_height, channels, raw)?),
        ArrayKind::U16 => ImageArray::U16(PixelBuffer::new(
            new_width,
            new_height,
            channels,
            raw.chunks_exact(2)
                .map(|b| u16::from_ne_bytes([b[0], b[1]]))
                .collect(),
        )?),
        _ => ImageArray::F32(PixelBuffer::new(
            new_width,
            new_height,
            channels,
            raw.chunks_exact(4)
                .map(|b| f32::from_ne_bytes([b[0], b[1], b[2], b[3]]))
                .collect(),
        )?),
    };

    Ok(Some(resized))
}

/// Resize an image array, keeping its element type
///
/// Images that `is_fast_resizable` accepts go through `resize_fast`. All
/// others are resampled in f64 by `resize_image` and cast back with
/// rounding and saturation.
///
/// # Arguments
///
/// * `image` - Image to resize
/// * `new_height` - Target height
/// * `new_width` - Target width
/// * `options` - Filter and aspect ratio settings
pub fn resize_array(
    image: &ImageArray,
    new_height: usize,
    new_width: usize,
    options: &ResizeOptions,
) -> Result<ImageArray, AugmentError> {
    let (height, width, channels) = image.shape();

    if is_fast_resizable(image.kind(), channels, options) {
        let crop = options
            .crop_to_aspect_ratio
            .then(|| aspect_ratio_crop(height, width, new_height, new_width));

        if let Some(resized) = resize_fast(image, new_height, new_width, options.interpolation, crop)? {
            return Ok(resized);
        }
    }

    let resized = resize_image(
        &image.to_f64(),
        height,
        width,
        channels,
        new_height,
        new_width,
        options,
    )?;

    ImageArray::from_f64(image.kind(), new_width, new_height, channels, &resized)
}
