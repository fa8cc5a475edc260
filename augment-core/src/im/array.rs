// Copyright (c) 2025, Tom Ouellette
// Licensed under the MIT License

use std::path::Path;

use image::{DynamicImage, ImageBuffer, Luma, Rgb, open as open_dynamic};
use num::{Bounded, FromPrimitive, ToPrimitive, Zero};
use npyz::{self, DType, NpyFile, TypeChar};

use crate::constant;
use crate::error::AugmentError;
use crate::impl_enum_dispatch;
use crate::io::{read_numpy, write_numpy};

/// A row-major (height, width, channels) container of pixels
///
/// # Examples
///
/// ```
/// use augment_core::im::PixelBuffer;
///
/// let buffer = PixelBuffer::new(4, 2, 3, vec![0u8; 4 * 2 * 3]);
/// assert!(buffer.is_ok());
///
/// let buffer = PixelBuffer::new(4, 2, 3, vec![0u8; 5]);
/// assert!(buffer.is_err());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer<T> {
    w: usize,
    h: usize,
    c: usize,
    buffer: Vec<T>,
}

impl<T> PixelBuffer<T>
where
    T: Copy + ToPrimitive,
{
    /// Initializes a buffer from raw pixels
    ///
    /// # Arguments
    ///
    /// * `width` - Image width
    /// * `height` - Image height
    /// * `channels` - Number of image channels
    /// * `buffer` - Pixels in row-major order
    pub fn new(
        width: usize,
        height: usize,
        channels: usize,
        buffer: Vec<T>,
    ) -> Result<PixelBuffer<T>, AugmentError> {
        if width * height * channels != buffer.len() {
            return Err(AugmentError::BufferSizeError);
        }

        Ok(PixelBuffer {
            w: width,
            h: height,
            c: channels,
            buffer,
        })
    }

    pub fn width(&self) -> usize {
        self.w
    }

    pub fn height(&self) -> usize {
        self.h
    }

    pub fn channels(&self) -> usize {
        self.c
    }

    /// Shape/dimensions of the image as (height, width, channels)
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.h, self.w, self.c)
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn as_raw(&self) -> &[T] {
        &self.buffer
    }

    pub fn into_raw(self) -> Vec<T> {
        self.buffer
    }

    /// Cast subpixels to f64 and return the buffer
    pub fn to_f64(&self) -> Vec<f64> {
        self.buffer
            .iter()
            .map(|x| x.to_f64().unwrap_or(0f64))
            .collect()
    }
}

/// Element type of an `ImageArray`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayKind {
    U8,
    U16,
    U32,
    I64,
    F32,
    F64,
}

impl ArrayKind {
    pub fn is_integral(&self) -> bool {
        !matches!(self, ArrayKind::F32 | ArrayKind::F64)
    }
}

/// An image or mask held with its original subpixel type
///
/// # Examples
///
/// ```
/// use image::{GrayImage, DynamicImage};
/// use augment_core::im::ImageArray;
///
/// let gray = GrayImage::new(10, 6);
/// let image = ImageArray::new_from_dynamic(DynamicImage::ImageLuma8(gray)).unwrap();
/// assert_eq!(image.shape(), (6, 10, 1));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum ImageArray {
    U8(PixelBuffer<u8>),
    U16(PixelBuffer<u16>),
    U32(PixelBuffer<u32>),
    I64(PixelBuffer<i64>),
    F32(PixelBuffer<f32>),
    F64(PixelBuffer<f64>),
}

// >>> I/O METHODS

impl ImageArray {
    /// Open an image or numpy array from a provided path
    ///
    /// # Arguments
    ///
    /// * `path` - A path to an image with a valid extension
    ///
    /// ```no_run
    /// use augment_core::im::ImageArray;
    /// let image = ImageArray::open("image.png");
    /// ```
    pub fn open<P: AsRef<Path>>(path: P) -> Result<ImageArray, AugmentError> {
        let extension = path
            .as_ref()
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_lowercase());

        if let Some(ext) = extension {
            if ext == "npy" {
                let bytes = read_numpy(&path)?;
                let npy = NpyFile::new(&bytes[..]).map_err(|_| AugmentError::ImageReadError)?;
                return Self::new_from_numpy(npy);
            }

            if constant::IMAGE_DYNAMIC_FORMATS.iter().any(|e| e == &ext) {
                let image = open_dynamic(&path).map_err(|_| AugmentError::ImageReadError)?;
                return Self::new_from_dynamic(image);
            }
        }

        Err(AugmentError::ImageExtensionError)
    }

    /// Initialize a new array from a DynamicImage
    ///
    /// Alpha channels are dropped.
    ///
    /// # Arguments
    ///
    /// * `image` - An 8, 16 or 32-bit float grayscale or rgb DynamicImage
    pub fn new_from_dynamic(image: DynamicImage) -> Result<ImageArray, AugmentError> {
        let width = image.width() as usize;
        let height = image.height() as usize;

        fn drop_alpha<T: Copy>(raw: Vec<T>, stride: usize) -> Vec<T> {
            raw.chunks_exact(stride)
                .flat_map(|pixel| pixel[..stride - 1].to_vec())
                .collect()
        }

        match image {
            DynamicImage::ImageLuma8(buffer) => Ok(ImageArray::U8(PixelBuffer::new(
                width,
                height,
                1,
                buffer.into_raw(),
            )?)),
            DynamicImage::ImageLumaA8(buffer) => Ok(ImageArray::U8(PixelBuffer::new(
                width,
                height,
                1,
                drop_alpha(buffer.into_raw(), 2),
            )?)),
            DynamicImage::ImageLuma16(buffer) => Ok(ImageArray::U16(PixelBuffer::new(
                width,
                height,
                1,
                buffer.into_raw(),
            )?)),
            DynamicImage::ImageLumaA16(buffer) => Ok(ImageArray::U16(PixelBuffer::new(
                width,
                height,
                1,
                drop_alpha(buffer.into_raw(), 2),
            )?)),
            DynamicImage::ImageRgb8(buffer) => Ok(ImageArray::U8(PixelBuffer::new(
                width,
                height,
                3,
                buffer.into_raw(),
            )?)),
            DynamicImage::ImageRgba8(buffer) => Ok(ImageArray::U8(PixelBuffer::new(
                width,
                height,
                3,
                drop_alpha(buffer.into_raw(), 4),
            )?)),
            DynamicImage::ImageRgb16(buffer) => Ok(ImageArray::U16(PixelBuffer::new(
                width,
                height,
                3,
                buffer.into_raw(),
            )?)),
            DynamicImage::ImageRgba16(buffer) => Ok(ImageArray::U16(PixelBuffer::new(
                width,
                height,
                3,
                drop_alpha(buffer.into_raw(), 4),
            )?)),
            DynamicImage::ImageRgb32F(buffer) => Ok(ImageArray::F32(PixelBuffer::new(
                width,
                height,
                3,
                buffer.into_raw(),
            )?)),
            DynamicImage::ImageRgba32F(buffer) => Ok(ImageArray::F32(PixelBuffer::new(
                width,
                height,
                3,
                drop_alpha(buffer.into_raw(), 4),
            )?)),
            _ => Err(AugmentError::ImageError(
                "A dynamic image with a valid data type was not detected.",
            )),
        }
    }

    /// Initialize a new array from a numpy array buffer
    ///
    /// # Arguments
    ///
    /// * `npy` - A (height, width) or (height, width, channel) shaped numpy array
    pub fn new_from_numpy(npy: NpyFile<&[u8]>) -> Result<ImageArray, AugmentError> {
        let shape = npy.shape().to_vec();

        let (h, w, c) = match shape.len() {
            2 => (shape[0] as usize, shape[1] as usize, 1usize),
            3 => (shape[0] as usize, shape[1] as usize, shape[2] as usize),
            _ => {
                return Err(AugmentError::ImageError(
                    "Numpy array inputs must have an (H, W) or (H, W, C) shape.",
                ));
            }
        };

        let read_error = |_| AugmentError::ImageReadError;

        match npy.dtype() {
            DType::Plain(x) => match (x.type_char(), x.size_field()) {
                (TypeChar::Uint, 1) => Ok(ImageArray::U8(PixelBuffer::new(
                    w,
                    h,
                    c,
                    npy.into_vec().map_err(read_error)?,
                )?)),
                (TypeChar::Uint, 2) => Ok(ImageArray::U16(PixelBuffer::new(
                    w,
                    h,
                    c,
                    npy.into_vec().map_err(read_error)?,
                )?)),
                (TypeChar::Uint, 4) => Ok(ImageArray::U32(PixelBuffer::new(
                    w,
                    h,
                    c,
                    npy.into_vec().map_err(read_error)?,
                )?)),
                (TypeChar::Int, 4) => {
                    let data: Vec<i32> = npy.into_vec().map_err(read_error)?;
                    Ok(ImageArray::I64(PixelBuffer::new(
                        w,
                        h,
                        c,
                        data.into_iter().map(i64::from).collect(),
                    )?))
                }
                (TypeChar::Int, 8) => Ok(ImageArray::I64(PixelBuffer::new(
                    w,
                    h,
                    c,
                    npy.into_vec().map_err(read_error)?,
                )?)),
                (TypeChar::Float, 4) => Ok(ImageArray::F32(PixelBuffer::new(
                    w,
                    h,
                    c,
                    npy.into_vec().map_err(read_error)?,
                )?)),
                (TypeChar::Float, 8) => Ok(ImageArray::F64(PixelBuffer::new(
                    w,
                    h,
                    c,
                    npy.into_vec().map_err(read_error)?,
                )?)),
                _ => Err(AugmentError::ImageError(
                    "A numpy array with a valid data type was not detected.",
                )),
            },
            _ => Err(AugmentError::ImageError(
                "Only plain numpy arrays are currently supported.",
            )),
        }
    }

    /// Save image to a common image format or as a numpy array
    ///
    /// # Arguments
    ///
    /// * `path` - A path with a valid extension
    pub fn save<P: AsRef<Path>>(self, path: P) -> Result<(), AugmentError> {
        let extension = path
            .as_ref()
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_lowercase());

        if let Some(ext) = extension {
            if ext == "npy" {
                return self.save_as_numpy(path);
            }

            if constant::IMAGE_DYNAMIC_FORMATS.iter().any(|e| e == &ext) {
                return self.save_as_default(path);
            }
        }

        Err(AugmentError::ImageExtensionError)
    }

    /// Save image as a default image format
    pub fn save_as_default<P: AsRef<Path>>(self, path: P) -> Result<(), AugmentError> {
        let (w, h) = (self.width() as u32, self.height() as u32);

        match (self.channels(), self) {
            (1, ImageArray::U8(buffer)) => {
                ImageBuffer::<Luma<u8>, Vec<u8>>::from_raw(w, h, buffer.into_raw())
                    .ok_or(AugmentError::ImageWriteError)?
                    .save(path)
                    .map_err(|_| AugmentError::ImageWriteError)
            }
            (3, ImageArray::U8(buffer)) => {
                ImageBuffer::<Rgb<u8>, Vec<u8>>::from_raw(w, h, buffer.into_raw())
                    .ok_or(AugmentError::ImageWriteError)?
                    .save(path)
                    .map_err(|_| AugmentError::ImageWriteError)
            }
            (1, ImageArray::U16(buffer)) => {
                ImageBuffer::<Luma<u16>, Vec<u16>>::from_raw(w, h, buffer.into_raw())
                    .ok_or(AugmentError::ImageWriteError)?
                    .save(path)
                    .map_err(|_| AugmentError::ImageWriteError)
            }
            (3, ImageArray::U16(buffer)) => {
                ImageBuffer::<Rgb<u16>, Vec<u16>>::from_raw(w, h, buffer.into_raw())
                    .ok_or(AugmentError::ImageWriteError)?
                    .save(path)
                    .map_err(|_| AugmentError::ImageWriteError)
            }
            _ => Err(AugmentError::ImageError(
                "Only 1 or 3 channel u8/u16 images can be saved as a default image format (e.g. png).",
            )),
        }
    }

    /// Save image as a (height, width, channels) numpy array
    pub fn save_as_numpy<P: AsRef<Path>>(self, path: P) -> Result<(), AugmentError> {
        let shape = vec![
            self.height() as u64,
            self.width() as u64,
            self.channels() as u64,
        ];

        match self {
            ImageArray::U8(buffer) => write_numpy(path, buffer.into_raw(), shape),
            ImageArray::U16(buffer) => write_numpy(path, buffer.into_raw(), shape),
            ImageArray::U32(buffer) => write_numpy(path, buffer.into_raw(), shape),
            ImageArray::I64(buffer) => write_numpy(path, buffer.into_raw(), shape),
            ImageArray::F32(buffer) => write_numpy(path, buffer.into_raw(), shape),
            ImageArray::F64(buffer) => write_numpy(path, buffer.into_raw(), shape),
        }
    }
}

// <<< I/O METHODS

// >>> PROPERTY METHODS

impl_enum_dispatch!(ImageArray, U8, U16, U32, I64, F32, F64; width(&self) -> usize);
impl_enum_dispatch!(ImageArray, U8, U16, U32, I64, F32, F64; height(&self) -> usize);
impl_enum_dispatch!(ImageArray, U8, U16, U32, I64, F32, F64; channels(&self) -> usize);
impl_enum_dispatch!(ImageArray, U8, U16, U32, I64, F32, F64; shape(&self) -> (usize, usize, usize));
impl_enum_dispatch!(ImageArray, U8, U16, U32, I64, F32, F64; len(&self) -> usize);
impl_enum_dispatch!(ImageArray, U8, U16, U32, I64, F32, F64; is_empty(&self) -> bool);

impl ImageArray {
    pub fn kind(&self) -> ArrayKind {
        match self {
            ImageArray::U8(_) => ArrayKind::U8,
            ImageArray::U16(_) => ArrayKind::U16,
            ImageArray::U32(_) => ArrayKind::U32,
            ImageArray::I64(_) => ArrayKind::I64,
            ImageArray::F32(_) => ArrayKind::F32,
            ImageArray::F64(_) => ArrayKind::F64,
        }
    }
}

// <<< PROPERTY METHODS

// >>> CONVERSION METHODS

impl_enum_dispatch!(ImageArray, U8, U16, U32, I64, F32, F64; to_f64(&self) -> Vec<f64>);

/// Round (integral targets only) and clamp a value into the range of `T`
pub fn saturating_cast<T>(value: f64, integral: bool) -> T
where
    T: Bounded + FromPrimitive + ToPrimitive + Zero,
{
    let min = T::min_value().to_f64().unwrap_or(f64::MIN);
    let max = T::max_value().to_f64().unwrap_or(f64::MAX);
    let value = if integral { value.round() } else { value };

    // f64 cannot hold i64::MAX exactly so the clamped bound may still overflow
    T::from_f64(value.clamp(min, max)).unwrap_or_else(|| {
        if value > 0.0 {
            T::max_value()
        } else if value < 0.0 {
            T::min_value()
        } else {
            T::zero()
        }
    })
}

impl ImageArray {
    /// Build an array of the requested kind from f64 pixels with a saturating cast
    ///
    /// # Arguments
    ///
    /// * `kind` - Element type of the new array
    /// * `width` - Image width
    /// * `height` - Image height
    /// * `channels` - Number of channels
    /// * `data` - Row-major pixels
    ///
    /// # Examples
    ///
    /// ```
    /// use augment_core::im::{ArrayKind, ImageArray};
    ///
    /// let array = ImageArray::from_f64(ArrayKind::U8, 3, 1, 1, &[-4.0, 127.6, 300.0]).unwrap();
    /// assert_eq!(array.to_f64(), vec![0.0, 128.0, 255.0]);
    /// ```
    pub fn from_f64(
        kind: ArrayKind,
        width: usize,
        height: usize,
        channels: usize,
        data: &[f64],
    ) -> Result<ImageArray, AugmentError> {
        fn cast<T>(data: &[f64], integral: bool) -> Vec<T>
        where
            T: Bounded + FromPrimitive + ToPrimitive + Zero,
        {
            data.iter().map(|v| saturating_cast(*v, integral)).collect()
        }

        let integral = kind.is_integral();

        Ok(match kind {
            ArrayKind::U8 => ImageArray::U8(PixelBuffer::new(
                width,
                height,
                channels,
                cast(data, integral),
            )?),
            ArrayKind::U16 => ImageArray::U16(PixelBuffer::new(
                width,
                height,
                channels,
                cast(data, integral),
            )?),
            ArrayKind::U32 => ImageArray::U32(PixelBuffer::new(
                width,
                height,
                channels,
                cast(data, integral),
            )?),
            ArrayKind::I64 => ImageArray::I64(PixelBuffer::new(
                width,
                height,
                channels,
                cast(data, integral),
            )?),
            ArrayKind::F32 => ImageArray::F32(PixelBuffer::new(
                width,
                height,
                channels,
                cast(data, integral),
            )?),
            ArrayKind::F64 => ImageArray::F64(PixelBuffer::new(
                width,
                height,
                channels,
                data.to_vec(),
            )?),
        })
    }

    /// Cast this array to the element type of another array
    pub fn cast_like(&self, reference: &ImageArray) -> Result<ImageArray, AugmentError> {
        Self::from_f64(
            reference.kind(),
            self.width(),
            self.height(),
            self.channels(),
            &self.to_f64(),
        )
    }
}

// <<< CONVERSION METHODS
