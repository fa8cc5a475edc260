// Copyright (c) 2025, Tom Ouellette
// Licensed under the MIT License

use candle_core::{DType, Tensor};
use rand::rngs::StdRng;

use augment_core::im::BoundingBoxFormat;

use crate::config::{DataFormat, Factor};
use crate::error::{LayerError, Result};
use crate::layers::ImagePreprocessingLayer;
use crate::sample::{BoxTensors, Sample};
use crate::tensor::{is_batched, saturate_cast};

/// Randomly shift the brightness of each image while training
///
/// One delta per image is drawn from `[lower, upper] * (max - min)` of the
/// value range and added to every pixel before clamping back into the range.
/// Masks, labels and boxes are not changed.
///
/// # Examples
///
/// ```
/// use candle_core::{DType, Device, Tensor};
/// use augment_layers::config::Factor;
/// use augment_layers::layers::{ImagePreprocessingLayer, RandomBrightness};
/// use augment_layers::sample::Sample;
///
/// let layer = RandomBrightness::new(Factor::new(0.2).unwrap(), (0.0, 255.0), Some(7)).unwrap();
/// let image = Tensor::zeros((4, 4, 3), DType::U8, &Device::Cpu).unwrap();
///
/// let output = layer.apply(&Sample::Tensor(image), true).unwrap();
/// assert_eq!(output.images().dims(), &[4, 4, 3]);
/// ```
#[derive(Debug, Clone)]
pub struct RandomBrightness {
    factor: Factor,
    value_range: (f64, f64),
    bounding_box_format: Option<BoundingBoxFormat>,
    seed: Option<u64>,
}

impl RandomBrightness {
    /// Initialize a brightness layer
    ///
    /// # Arguments
    ///
    /// * `factor` - Fraction of the value range each delta is drawn from
    /// * `value_range` - Minimum and maximum pixel values
    /// * `seed` - Optional seed making every call deterministic
    pub fn new(factor: Factor, value_range: (f64, f64), seed: Option<u64>) -> Result<Self> {
        let (min, max) = value_range;
        if !(min.is_finite() && max.is_finite() && min < max) {
            return Err(LayerError::ConfigurationError(format!(
                "Value range must be finite and increasing, received ({}, {}).",
                min, max
            )));
        }

        Ok(RandomBrightness {
            factor,
            value_range,
            bounding_box_format: None,
            seed,
        })
    }

    pub fn with_bounding_box_format(mut self, bounding_box_format: BoundingBoxFormat) -> Self {
        self.bounding_box_format = Some(bounding_box_format);
        self
    }

    pub fn factor(&self) -> Factor {
        self.factor
    }
}

impl ImagePreprocessingLayer for RandomBrightness {
    /// One additive delta per image, empty outside of training
    type Transformation = Vec<f64>;

    /// Deltas are drawn per image so the channel layout never matters
    fn data_format(&self) -> DataFormat {
        DataFormat::ChannelsLast
    }

    fn bounding_box_format(&self) -> Option<BoundingBoxFormat> {
        self.bounding_box_format
    }

    fn seed(&self) -> Option<u64> {
        self.seed
    }

    fn get_random_transformation(
        &self,
        sample: &Sample,
        training: bool,
        rng: &mut StdRng,
    ) -> Result<Vec<f64>> {
        if !training {
            return Ok(Vec::new());
        }

        let images = sample.images();
        let n = if is_batched(images)? { images.dims()[0] } else { 1 };
        let span = self.value_range.1 - self.value_range.0;

        Ok((0..n).map(|_| self.factor.sample(rng) * span).collect())
    }

    fn transform_images(&self, images: &Tensor, deltas: &Vec<f64>, _training: bool) -> Result<Tensor> {
        if deltas.is_empty() {
            return Ok(images.clone());
        }

        let n = images.dims().first().copied().unwrap_or(0);
        if n != deltas.len() {
            return Err(LayerError::ShapeError(format!(
                "Expected one brightness delta per image, received {} deltas for {} images.",
                deltas.len(),
                n
            )));
        }

        let data = images
            .to_dtype(DType::F64)?
            .contiguous()?
            .flatten_all()?
            .to_vec1::<f64>()?;

        let (min, max) = self.value_range;
        let stride = if n == 0 { 0 } else { data.len() / n };

        let shifted: Vec<f64> = data
            .chunks(stride.max(1))
            .zip(deltas)
            .flat_map(|(image, delta)| image.iter().map(move |v| (v + delta).clamp(min, max)))
            .collect();

        saturate_cast(&shifted, images.dims(), images.dtype(), images.device())
    }

    fn transform_labels(&self, labels: &Tensor, _: &Vec<f64>, _training: bool) -> Result<Tensor> {
        Ok(labels.clone())
    }

    fn transform_bounding_boxes(
        &self,
        bounding_boxes: &BoxTensors,
        _: &Vec<f64>,
        _training: bool,
    ) -> Result<BoxTensors> {
        Ok(bounding_boxes.clone())
    }

    fn transform_segmentation_masks(
        &self,
        segmentation_masks: &Tensor,
        _: &Vec<f64>,
        _training: bool,
    ) -> Result<Tensor> {
        Ok(segmentation_masks.clone())
    }
}
