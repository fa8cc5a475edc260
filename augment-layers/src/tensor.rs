// Copyright (c) 2025, Tom Ouellette
// Licensed under the MIT License

use candle_core::{DType, Device, Tensor};

use augment_core::im::{ArrayKind, ImageArray, saturating_cast};

use crate::config::DataFormat;
use crate::error::{LayerError, Result};

/// Check if an image-like tensor holds a batch
///
/// Rank 4 tensors are batches and rank 3 tensors are single images. Any
/// other rank is a usage error.
///
/// # Examples
///
/// ```
/// use candle_core::{DType, Device, Tensor};
/// use augment_layers::tensor::is_batched;
///
/// let image = Tensor::zeros((8, 8, 3), DType::U8, &Device::Cpu).unwrap();
/// assert!(!is_batched(&image).unwrap());
///
/// let images = Tensor::zeros((2, 8, 8, 3), DType::U8, &Device::Cpu).unwrap();
/// assert!(is_batched(&images).unwrap());
///
/// let matrix = Tensor::zeros((8, 8), DType::U8, &Device::Cpu).unwrap();
/// assert!(is_batched(&matrix).is_err());
/// ```
pub fn is_batched(tensor: &Tensor) -> Result<bool> {
    match tensor.rank() {
        3 => Ok(false),
        4 => Ok(true),
        rank => Err(LayerError::UsageError(format!(
            "Image-like inputs must have rank 3 (single) or rank 4 (batch), received rank {} with shape {:?}.",
            rank,
            tensor.dims()
        ))),
    }
}

/// Height and width of a rank 3 or rank 4 image tensor
pub fn image_size(tensor: &Tensor, data_format: DataFormat) -> Result<(usize, usize)> {
    is_batched(tensor)?;

    let dims = tensor.dims();
    let rank = dims.len();

    Ok((
        dims[data_format.height_axis(rank)],
        dims[data_format.width_axis(rank)],
    ))
}

/// Representable range of a tensor element type
pub fn dtype_range(dtype: DType) -> (f64, f64) {
    match dtype {
        DType::U8 => (u8::MIN as f64, u8::MAX as f64),
        DType::U32 => (u32::MIN as f64, u32::MAX as f64),
        DType::I64 => (i64::MIN as f64, i64::MAX as f64),
        DType::F16 => (-65504.0, 65504.0),
        DType::BF16 | DType::F32 => (f32::MIN as f64, f32::MAX as f64),
        _ => (f64::MIN, f64::MAX),
    }
}

/// Check if a tensor element type only holds whole numbers
pub fn is_integral(dtype: DType) -> bool {
    matches!(dtype, DType::U8 | DType::U32 | DType::I64)
}

/// Build a tensor of the requested type from f64 values
///
/// Integral targets are rounded before narrowing and every target is clamped
/// to its representable range, so values saturate instead of wrapping.
///
/// # Arguments
///
/// * `data` - Values in row-major order
/// * `shape` - Output shape
/// * `dtype` - Output element type
/// * `device` - Output device
///
/// # Examples
///
/// ```
/// use candle_core::{DType, Device};
/// use augment_layers::tensor::saturate_cast;
///
/// let tensor = saturate_cast(&[-5.0, 12.5, 300.0], &[3], DType::U8, &Device::Cpu).unwrap();
/// assert_eq!(tensor.to_vec1::<u8>().unwrap(), vec![0, 13, 255]);
/// ```
pub fn saturate_cast(data: &[f64], shape: &[usize], dtype: DType, device: &Device) -> Result<Tensor> {
    let shape = shape.to_vec();

    let tensor = match dtype {
        DType::U8 => {
            let data: Vec<u8> = data.iter().map(|v| saturating_cast(*v, true)).collect();
            Tensor::from_vec(data, shape, device)?
        }
        DType::U32 => {
            let data: Vec<u32> = data.iter().map(|v| saturating_cast(*v, true)).collect();
            Tensor::from_vec(data, shape, device)?
        }
        DType::I64 => {
            let data: Vec<i64> = data.iter().map(|v| saturating_cast(*v, true)).collect();
            Tensor::from_vec(data, shape, device)?
        }
        DType::F32 => {
            let data: Vec<f32> = data.iter().map(|v| saturating_cast(*v, false)).collect();
            Tensor::from_vec(data, shape, device)?
        }
        DType::F16 | DType::BF16 => {
            let (min, max) = dtype_range(dtype);
            let data: Vec<f32> = data
                .iter()
                .map(|v| saturating_cast(v.clamp(min, max), false))
                .collect();
            Tensor::from_vec(data, shape, device)?.to_dtype(dtype)?
        }
        DType::F64 => Tensor::from_vec(data.to_vec(), shape, device)?,
        #[allow(unreachable_patterns)]
        other => {
            return Err(LayerError::UsageError(format!(
                "Tensors of type {:?} are not supported.",
                other
            )));
        }
    };

    Ok(tensor)
}

/// Flatten a rank 4 image batch into (batch, height, width, channels) order
///
/// Returns the values as f64 alongside the NHWC dimensions.
pub fn to_nhwc(images: &Tensor, data_format: DataFormat) -> Result<(Vec<f64>, [usize; 4])> {
    if images.rank() != 4 {
        return Err(LayerError::UsageError(format!(
            "Expected a rank 4 batch, received shape {:?}.",
            images.dims()
        )));
    }

    let images = match data_format {
        DataFormat::ChannelsFirst => images.permute((0, 2, 3, 1))?,
        DataFormat::ChannelsLast => images.clone(),
    };

    let (n, h, w, c) = images.dims4()?;

    let data = images
        .to_dtype(DType::F64)?
        .contiguous()?
        .flatten_all()?
        .to_vec1::<f64>()?;

    Ok((data, [n, h, w, c]))
}

/// Rebuild a rank 4 image batch from NHWC f64 values
///
/// # Arguments
///
/// * `data` - Values in (batch, height, width, channels) order
/// * `dims` - NHWC dimensions
/// * `data_format` - Axis layout of the output tensor
/// * `dtype` - Output element type (saturating cast)
/// * `device` - Output device
pub fn from_nhwc(
    data: &[f64],
    dims: [usize; 4],
    data_format: DataFormat,
    dtype: DType,
    device: &Device,
) -> Result<Tensor> {
    let tensor = saturate_cast(data, &dims, dtype, device)?;

    match data_format {
        DataFormat::ChannelsFirst => Ok(tensor.permute((0, 3, 1, 2))?.contiguous()?),
        DataFormat::ChannelsLast => Ok(tensor),
    }
}

/// Convert an image array into a rank 3 tensor
///
/// Element types are kept where candle supports them; u16 arrays widen to u32.
pub fn from_image_array(
    array: &ImageArray,
    data_format: DataFormat,
    device: &Device,
) -> Result<Tensor> {
    let (h, w, c) = array.shape();

    let dtype = match array.kind() {
        ArrayKind::U8 => DType::U8,
        ArrayKind::U16 | ArrayKind::U32 => DType::U32,
        ArrayKind::I64 => DType::I64,
        ArrayKind::F32 => DType::F32,
        ArrayKind::F64 => DType::F64,
    };

    let tensor = saturate_cast(&array.to_f64(), &[h, w, c], dtype, device)?;

    match data_format {
        DataFormat::ChannelsFirst => Ok(tensor.permute((2, 0, 1))?.contiguous()?),
        DataFormat::ChannelsLast => Ok(tensor),
    }
}

/// Convert a rank 3 tensor back into an image array
///
/// Half precision tensors are returned as f32 arrays.
pub fn to_image_array(tensor: &Tensor, data_format: DataFormat) -> Result<ImageArray> {
    if tensor.rank() != 3 {
        return Err(LayerError::UsageError(format!(
            "Only single images (rank 3) can be converted to arrays, received shape {:?}.",
            tensor.dims()
        )));
    }

    let tensor = match data_format {
        DataFormat::ChannelsFirst => tensor.permute((1, 2, 0))?,
        DataFormat::ChannelsLast => tensor.clone(),
    };

    let (h, w, c) = tensor.dims3()?;

    let kind = match tensor.dtype() {
        DType::U8 => ArrayKind::U8,
        DType::U32 => ArrayKind::U32,
        DType::I64 => ArrayKind::I64,
        DType::F64 => ArrayKind::F64,
        _ => ArrayKind::F32,
    };

    let data = tensor
        .to_dtype(DType::F64)?
        .contiguous()?
        .flatten_all()?
        .to_vec1::<f64>()?;

    Ok(ImageArray::from_f64(kind, w, h, c, &data)?)
}

#[cfg(test)]
mod test {

    use super::*;
    use augment_core::im::PixelBuffer;

    #[test]
    fn test_is_batched_rank_errors() {
        for shape in [vec![4usize], vec![4, 4], vec![1, 1, 4, 4, 3]] {
            let tensor = Tensor::zeros(shape, DType::F32, &Device::Cpu).unwrap();
            assert!(matches!(is_batched(&tensor), Err(LayerError::UsageError(_))));
        }
    }

    #[test]
    fn test_image_size() {
        let images = Tensor::zeros((2, 3, 5, 7), DType::F32, &Device::Cpu).unwrap();
        assert_eq!(image_size(&images, DataFormat::ChannelsFirst).unwrap(), (5, 7));
        assert_eq!(image_size(&images, DataFormat::ChannelsLast).unwrap(), (3, 5));
    }

    #[test]
    fn test_saturate_cast_integral_types() {
        let data = [-1e12, -2.5, 0.4, 1e12];

        let tensor = saturate_cast(&data, &[4], DType::U32, &Device::Cpu).unwrap();
        assert_eq!(tensor.to_vec1::<u32>().unwrap(), vec![0, 0, 0, u32::MAX]);

        let tensor = saturate_cast(&data, &[4], DType::I64, &Device::Cpu).unwrap();
        assert_eq!(
            tensor.to_vec1::<i64>().unwrap(),
            vec![-1_000_000_000_000, -3, 0, 1_000_000_000_000]
        );
    }

    #[test]
    fn test_saturate_cast_half() {
        let tensor = saturate_cast(&[1e6, -1e6, 1.5], &[3], DType::F16, &Device::Cpu).unwrap();
        assert_eq!(tensor.dtype(), DType::F16);

        let values = tensor.to_dtype(DType::F32).unwrap().to_vec1::<f32>().unwrap();
        assert_eq!(values, vec![65504.0, -65504.0, 1.5]);
    }

    #[test]
    fn test_nhwc_channels_first() {
        // (1, 2, 1, 2) channels first: two channels of a 1x2 image
        let images = Tensor::from_vec(vec![1f32, 2., 3., 4.], (1, 2, 1, 2), &Device::Cpu).unwrap();

        let (data, dims) = to_nhwc(&images, DataFormat::ChannelsFirst).unwrap();
        assert_eq!(dims, [1, 1, 2, 2]);
        assert_eq!(data, vec![1., 3., 2., 4.]);

        let rebuilt =
            from_nhwc(&data, dims, DataFormat::ChannelsFirst, DType::F32, &Device::Cpu).unwrap();
        assert_eq!(rebuilt.dims(), images.dims());
        assert_eq!(
            rebuilt.flatten_all().unwrap().to_vec1::<f32>().unwrap(),
            vec![1., 2., 3., 4.]
        );
    }

    #[test]
    fn test_image_array_conversion() {
        let array = ImageArray::U16(PixelBuffer::new(2, 1, 1, vec![7u16, 65535]).unwrap());

        let tensor = from_image_array(&array, DataFormat::ChannelsLast, &Device::Cpu).unwrap();
        assert_eq!(tensor.dims(), &[1, 2, 1]);
        assert_eq!(tensor.dtype(), DType::U32);

        let back = to_image_array(&tensor, DataFormat::ChannelsLast).unwrap();
        assert_eq!(back.kind(), ArrayKind::U32);
        assert_eq!(back.cast_like(&array).unwrap(), array);
    }

    #[test]
    fn test_image_array_channels_first() {
        let array = ImageArray::U8(PixelBuffer::new(1, 1, 3, vec![1u8, 2, 3]).unwrap());

        let tensor = from_image_array(&array, DataFormat::ChannelsFirst, &Device::Cpu).unwrap();
        assert_eq!(tensor.dims(), &[3, 1, 1]);

        let back = to_image_array(&tensor, DataFormat::ChannelsFirst).unwrap();
        assert_eq!(back, array);
    }
}
