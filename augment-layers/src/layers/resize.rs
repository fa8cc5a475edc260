// Copyright (c) 2025, Tom Ouellette
// Licensed under the MIT License

use std::path::Path;

use candle_core::{DType, Tensor};
use rand::rngs::StdRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use augment_core::constant::LABEL_PADDING_VALUE;
use augment_core::cv::transform::{aspect_ratio_crop, aspect_ratio_pad};
use augment_core::cv::{FillMode, Interpolation, ResizeOptions, is_fast_resizable};
use augment_core::cv::{resize_array, resize_image};
use augment_core::im::{ArrayKind, BoundingBoxFormat};

use crate::config::DataFormat;
use crate::error::{LayerError, Result};
use crate::layers::ImagePreprocessingLayer;
use crate::sample::{BoxTensors, Sample};
use crate::tensor::{from_image_array, from_nhwc, image_size, to_image_array, to_nhwc};

fn default_interpolation() -> Interpolation {
    Interpolation::Bilinear
}

fn default_fill_mode() -> FillMode {
    FillMode::Constant
}

/// Configuration of a `Resize` layer
///
/// # Examples
///
/// ```
/// use augment_layers::layers::ResizeConfig;
///
/// let config: ResizeConfig = serde_json::from_str(r#"{"height": 32, "width": 64}"#).unwrap();
/// assert_eq!(config, ResizeConfig::new(32, 64));
///
/// let misspelled = serde_json::from_str::<ResizeConfig>(r#"{"height": 32, "width": 64, "heigth": 1}"#);
/// assert!(misspelled.is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResizeConfig {
    pub height: usize,
    pub width: usize,
    #[serde(default = "default_interpolation")]
    pub interpolation: Interpolation,
    #[serde(default)]
    pub crop_to_aspect_ratio: bool,
    #[serde(default)]
    pub pad_to_aspect_ratio: bool,
    #[serde(default = "default_fill_mode")]
    pub fill_mode: FillMode,
    #[serde(default)]
    pub fill_value: f64,
    /// Label written into padded mask pixels
    #[serde(default)]
    pub mask_fill_value: i64,
    #[serde(default)]
    pub antialias: bool,
    #[serde(default)]
    pub data_format: DataFormat,
    #[serde(default)]
    pub bounding_box_format: Option<BoundingBoxFormat>,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl ResizeConfig {
    /// Bilinear resizing to the target size with every other option at its default
    pub fn new(height: usize, width: usize) -> Self {
        ResizeConfig {
            height,
            width,
            interpolation: default_interpolation(),
            crop_to_aspect_ratio: false,
            pad_to_aspect_ratio: false,
            fill_mode: default_fill_mode(),
            fill_value: 0.0,
            mask_fill_value: 0,
            antialias: false,
            data_format: DataFormat::default(),
            bounding_box_format: None,
            seed: None,
        }
    }
}

/// Resize images, masks and bounding boxes to a fixed spatial size
///
/// Images are optionally cropped or padded to the target aspect ratio before
/// resampling. Masks follow the same geometry with nearest neighbour sampling
/// so label values are never blended.
///
/// # Examples
///
/// ```
/// use candle_core::{DType, Device, Tensor};
/// use augment_layers::layers::{ImagePreprocessingLayer, Resize, ResizeConfig};
/// use augment_layers::sample::Sample;
///
/// let resize = Resize::new(ResizeConfig::new(8, 12)).unwrap();
/// let image = Tensor::zeros((4, 6, 3), DType::U8, &Device::Cpu).unwrap();
///
/// let output = resize.apply(&Sample::Tensor(image), false).unwrap();
/// assert_eq!(output.images().dims(), &[8, 12, 3]);
/// ```
#[derive(Debug, Clone)]
pub struct Resize {
    config: ResizeConfig,
}

impl Resize {
    /// Initialize a resize layer after checking the configuration
    pub fn new(config: ResizeConfig) -> Result<Resize> {
        if config.height == 0 || config.width == 0 {
            return Err(LayerError::ConfigurationError(format!(
                "Resize height and width must be positive, received ({}, {}).",
                config.height, config.width
            )));
        }

        if config.crop_to_aspect_ratio && config.pad_to_aspect_ratio {
            return Err(LayerError::ConfigurationError(
                "Only one of `crop_to_aspect_ratio` and `pad_to_aspect_ratio` can be set."
                    .to_string(),
            ));
        }

        if !config.fill_value.is_finite() {
            return Err(LayerError::ConfigurationError(format!(
                "Fill value must be finite, received {}.",
                config.fill_value
            )));
        }

        Ok(Resize { config })
    }

    pub fn config(&self) -> &ResizeConfig {
        &self.config
    }

    /// Initialize a resize layer from a json configuration string
    pub fn from_json(json: &str) -> Result<Resize> {
        let config: ResizeConfig = serde_json::from_str(json)
            .map_err(|err| LayerError::ConfigurationError(err.to_string()))?;

        Resize::new(config)
    }

    /// Serialize the configuration to a json string
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.config)
            .map_err(|err| LayerError::ConfigurationError(err.to_string()))
    }

    /// Write the configuration as json to the provided path
    pub fn save_config<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = self.to_json()?;
        std::fs::write(&path, json).map_err(|err| {
            LayerError::ConfigurationError(format!(
                "Could not write {}: {}",
                path.as_ref().display(),
                err
            ))
        })
    }

    /// Shape of the output for an input of the given shape
    ///
    /// # Arguments
    ///
    /// * `shape` - A rank 3 or rank 4 image shape in the layer's data format
    ///
    /// # Examples
    ///
    /// ```
    /// use augment_layers::config::DataFormat;
    /// use augment_layers::layers::{Resize, ResizeConfig};
    ///
    /// let resize = Resize::new(ResizeConfig::new(32, 16)).unwrap();
    /// assert_eq!(resize.compute_output_shape(&[5, 128, 256, 3]).unwrap(), vec![5, 32, 16, 3]);
    ///
    /// let mut config = ResizeConfig::new(32, 16);
    /// config.data_format = DataFormat::ChannelsFirst;
    /// let resize = Resize::new(config).unwrap();
    /// assert_eq!(resize.compute_output_shape(&[5, 3, 128, 256]).unwrap(), vec![5, 3, 32, 16]);
    /// ```
    pub fn compute_output_shape(&self, shape: &[usize]) -> Result<Vec<usize>> {
        let rank = shape.len();
        if rank != 3 && rank != 4 {
            return Err(LayerError::UsageError(format!(
                "Expected a rank 3 or rank 4 shape, received {:?}.",
                shape
            )));
        }

        let mut output = shape.to_vec();
        output[self.config.data_format.height_axis(rank)] = self.config.height;
        output[self.config.data_format.width_axis(rank)] = self.config.width;

        Ok(output)
    }

    fn image_options(&self) -> ResizeOptions {
        ResizeOptions {
            interpolation: self.config.interpolation,
            antialias: self.config.antialias,
            crop_to_aspect_ratio: self.config.crop_to_aspect_ratio,
            pad_to_aspect_ratio: self.config.pad_to_aspect_ratio,
            fill_mode: self.config.fill_mode,
            fill_value: self.config.fill_value,
        }
    }

    fn mask_options(&self) -> ResizeOptions {
        ResizeOptions {
            interpolation: Interpolation::Nearest,
            antialias: false,
            fill_value: self.config.mask_fill_value as f64,
            ..self.image_options()
        }
    }

    /// Resize every image of a batch in parallel and cast back to the input type
    fn resize_batch(&self, images: &Tensor, options: &ResizeOptions) -> Result<Tensor> {
        let format = self.config.data_format;

        let kind = match images.dtype() {
            DType::U8 => Some(ArrayKind::U8),
            DType::F32 => Some(ArrayKind::F32),
            _ => None,
        };

        if let (Some(kind), 4) = (kind, images.rank()) {
            let (n, channels) = (images.dims()[0], images.dims()[format.channel_axis(4)]);
            if n > 0 && is_fast_resizable(kind, channels, options) {
                return self.resize_batch_fast(images, options);
            }
        }

        let (data, [n, h, w, c]) = to_nhwc(images, format)?;

        if h == 0 || w == 0 {
            return Err(LayerError::ShapeError(format!(
                "Cannot resize images with an empty spatial size, received {:?}.",
                images.dims()
            )));
        }

        let (new_h, new_w) = (self.config.height, self.config.width);

        let resized = if n == 0 {
            Vec::new()
        } else {
            data.par_chunks(h * w * c)
                .map(|image| resize_image(image, h, w, c, new_h, new_w, options))
                .collect::<std::result::Result<Vec<Vec<f64>>, _>>()?
                .concat()
        };

        from_nhwc(
            &resized,
            [n, new_h, new_w, c],
            format,
            images.dtype(),
            images.device(),
        )
    }

    /// Resize u8 and f32 batches image by image with fast_image_resize
    fn resize_batch_fast(&self, images: &Tensor, options: &ResizeOptions) -> Result<Tensor> {
        let format = self.config.data_format;
        let (new_h, new_w) = (self.config.height, self.config.width);

        let (h, w) = image_size(images, format)?;
        if h == 0 || w == 0 {
            return Err(LayerError::ShapeError(format!(
                "Cannot resize images with an empty spatial size, received {:?}.",
                images.dims()
            )));
        }

        let mut arrays = Vec::with_capacity(images.dims()[0]);
        for index in 0..images.dims()[0] {
            arrays.push(to_image_array(&images.get(index)?, format)?);
        }

        let resized = arrays
            .par_iter()
            .map(|array| resize_array(array, new_h, new_w, options))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut tensors = Vec::with_capacity(resized.len());
        for array in &resized {
            tensors.push(from_image_array(array, format, images.device())?);
        }

        Ok(Tensor::stack(&tensors, 0)?)
    }

    /// Map one absolute xyxy box from the source frame into the output frame
    fn map_box(&self, b: [f32; 4], height: usize, width: usize) -> [f32; 4] {
        let (target_h, target_w) = (self.config.height, self.config.width);

        let (offset_x, offset_y, source_w, source_h, clip) = if self.config.crop_to_aspect_ratio {
            let window = aspect_ratio_crop(height, width, target_h, target_w);
            (
                -(window.x as f32),
                -(window.y as f32),
                window.width,
                window.height,
                true,
            )
        } else if self.config.pad_to_aspect_ratio {
            let window = aspect_ratio_pad(height, width, target_h, target_w);
            (
                window.x as f32,
                window.y as f32,
                window.width,
                window.height,
                false,
            )
        } else {
            (0.0, 0.0, width, height, false)
        };

        let scale_x = target_w as f32 / source_w as f32;
        let scale_y = target_h as f32 / source_h as f32;

        let mut mapped = [
            (b[0] + offset_x) * scale_x,
            (b[1] + offset_y) * scale_y,
            (b[2] + offset_x) * scale_x,
            (b[3] + offset_y) * scale_y,
        ];

        if clip {
            mapped[0] = mapped[0].clamp(0.0, target_w as f32);
            mapped[2] = mapped[2].clamp(0.0, target_w as f32);
            mapped[1] = mapped[1].clamp(0.0, target_h as f32);
            mapped[3] = mapped[3].clamp(0.0, target_h as f32);
        }

        mapped
    }
}

impl ImagePreprocessingLayer for Resize {
    /// Height and width of the input images
    type Transformation = (usize, usize);

    fn data_format(&self) -> DataFormat {
        self.config.data_format
    }

    fn bounding_box_format(&self) -> Option<BoundingBoxFormat> {
        self.config.bounding_box_format
    }

    fn seed(&self) -> Option<u64> {
        self.config.seed
    }

    fn get_random_transformation(
        &self,
        sample: &Sample,
        _training: bool,
        _rng: &mut StdRng,
    ) -> Result<(usize, usize)> {
        image_size(sample.images(), self.config.data_format)
    }

    fn transform_images(
        &self,
        images: &Tensor,
        _transformation: &(usize, usize),
        _training: bool,
    ) -> Result<Tensor> {
        self.resize_batch(images, &self.image_options())
    }

    fn transform_labels(
        &self,
        labels: &Tensor,
        _transformation: &(usize, usize),
        _training: bool,
    ) -> Result<Tensor> {
        Ok(labels.clone())
    }

    fn transform_bounding_boxes(
        &self,
        bounding_boxes: &BoxTensors,
        transformation: &(usize, usize),
        _training: bool,
    ) -> Result<BoxTensors> {
        let format = self.config.bounding_box_format.ok_or_else(|| {
            LayerError::UsageError(
                "Bounding boxes require the layer to have a `bounding_box_format`.".to_string(),
            )
        })?;

        let (height, width) = *transformation;
        if height == 0 || width == 0 {
            return Err(LayerError::ShapeError(format!(
                "Cannot map bounding boxes from an image of size ({}, {}).",
                height, width
            )));
        }

        let dims = bounding_boxes.boxes.dims().to_vec();
        if dims.len() != 3 || dims[2] != 4 {
            return Err(LayerError::ShapeError(format!(
                "Expected boxes of shape (batch, boxes, 4), received {:?}.",
                dims
            )));
        }

        let boxes = bounding_boxes
            .boxes
            .to_dtype(DType::F32)?
            .flatten_all()?
            .to_vec1::<f32>()?;

        let labels = bounding_boxes
            .labels
            .to_dtype(DType::I64)?
            .flatten_all()?
            .to_vec1::<i64>()?;

        if labels.len() * 4 != boxes.len() {
            return Err(LayerError::ShapeError(format!(
                "Expected one label per box, received {} labels for {} boxes.",
                labels.len(),
                boxes.len() / 4
            )));
        }

        let (h0, w0) = (height as f32, width as f32);
        let (h1, w1) = (self.config.height as f32, self.config.width as f32);

        let mapped: Vec<f32> = boxes
            .chunks_exact(4)
            .zip(&labels)
            .flat_map(|(b, label)| {
                let b = [b[0], b[1], b[2], b[3]];

                if *label == LABEL_PADDING_VALUE {
                    return b;
                }

                let xyxy = format.to_xyxy(b, h0, w0);
                format.from_xyxy(self.map_box(xyxy, height, width), h1, w1)
            })
            .collect();

        Ok(BoxTensors {
            boxes: Tensor::from_vec(mapped, dims, bounding_boxes.boxes.device())?,
            labels: bounding_boxes.labels.clone(),
        })
    }

    fn transform_segmentation_masks(
        &self,
        segmentation_masks: &Tensor,
        _transformation: &(usize, usize),
        _training: bool,
    ) -> Result<Tensor> {
        self.resize_batch(segmentation_masks, &self.mask_options())
    }
}

#[cfg(test)]
mod test {

    use super::*;
    use candle_core::Device;

    use augment_core::cv::resize;
    use augment_core::im::{BoundingBoxes, saturating_cast};

    use crate::sample::{Modalities, SampleBoxes};

    fn layer(height: usize, width: usize, update: impl FnOnce(&mut ResizeConfig)) -> Resize {
        let mut config = ResizeConfig::new(height, width);
        update(&mut config);
        Resize::new(config).unwrap()
    }

    fn values_f32(tensor: &Tensor) -> Vec<f32> {
        tensor
            .to_dtype(DType::F32)
            .unwrap()
            .flatten_all()
            .unwrap()
            .to_vec1::<f32>()
            .unwrap()
    }

    fn single_boxes(output: Sample) -> BoundingBoxes {
        match output.into_modalities().unwrap().bounding_boxes {
            Some(SampleBoxes::List(boxes)) => boxes,
            other => panic!("unexpected boxes {:?}", other),
        }
    }

    fn assert_box_close(actual: [f32; 4], expected: [f32; 4]) {
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-4, "{:?} != {:?}", actual, expected);
        }
    }

    #[test]
    fn test_configuration_errors() {
        let mut config = ResizeConfig::new(8, 8);
        config.crop_to_aspect_ratio = true;
        config.pad_to_aspect_ratio = true;
        assert!(matches!(
            Resize::new(config),
            Err(LayerError::ConfigurationError(_))
        ));

        assert!(matches!(
            Resize::new(ResizeConfig::new(0, 8)),
            Err(LayerError::ConfigurationError(_))
        ));

        assert!(matches!(
            Resize::from_json(r#"{"height": 8, "width": 8, "data_format": "channels_middle"}"#),
            Err(LayerError::ConfigurationError(_))
        ));

        assert!(matches!(
            Resize::from_json(r#"{"height": 8, "width": 8, "bounding_box_format": "xyzw"}"#),
            Err(LayerError::ConfigurationError(_))
        ));

        assert!(matches!(
            Resize::from_json(r#"{"height": 8, "width": 8, "interpolaton": "nearest"}"#),
            Err(LayerError::ConfigurationError(_))
        ));
    }

    #[test]
    fn test_json_config_round_trip() {
        let resize = layer(12, 7, |c| {
            c.interpolation = Interpolation::Lanczos3;
            c.pad_to_aspect_ratio = true;
            c.fill_mode = FillMode::Reflect;
            c.bounding_box_format = Some(BoundingBoxFormat::CenterXywh);
            c.data_format = DataFormat::ChannelsFirst;
        });

        let json = resize.to_json().unwrap();
        assert!(json.contains("\"lanczos3\""));
        assert!(json.contains("\"center_xywh\""));
        assert!(json.contains("\"channels_first\""));

        let reloaded = Resize::from_json(&json).unwrap();
        assert_eq!(reloaded.config(), resize.config());
    }

    #[test]
    fn test_compute_output_shape() {
        let resize = layer(20, 30, |_| {});
        assert_eq!(
            resize.compute_output_shape(&[7, 128, 256, 3]).unwrap(),
            vec![7, 20, 30, 3]
        );
        assert_eq!(resize.compute_output_shape(&[128, 256, 3]).unwrap(), vec![20, 30, 3]);
        assert!(resize.compute_output_shape(&[128, 256]).is_err());

        let resize = layer(20, 30, |c| c.data_format = DataFormat::ChannelsFirst);
        assert_eq!(
            resize.compute_output_shape(&[7, 3, 128, 256]).unwrap(),
            vec![7, 3, 20, 30]
        );
        assert_eq!(resize.compute_output_shape(&[3, 128, 256]).unwrap(), vec![3, 20, 30]);
    }

    #[test]
    fn test_constant_image_stays_constant() {
        for dtype in [DType::U8, DType::F32, DType::F64] {
            let image = Tensor::ones((5, 9, 3), DType::F32, &Device::Cpu)
                .unwrap()
                .affine(7.0, 0.0)
                .unwrap()
                .to_dtype(dtype)
                .unwrap();

            for (height, width) in [(1, 1), (3, 4), (11, 17), (5, 9)] {
                for antialias in [false, true] {
                    let resize = layer(height, width, |c| c.antialias = antialias);
                    let output = resize.apply(&Sample::Tensor(image.clone()), true).unwrap();

                    let output = output.images();
                    assert_eq!(output.dims(), &[height, width, 3]);
                    assert_eq!(output.dtype(), dtype);

                    for value in values_f32(output) {
                        assert!((value - 7.0).abs() < 1e-4);
                    }
                }
            }
        }
    }

    #[test]
    fn test_single_batch_broadcast_equivalence() {
        let data: Vec<f32> = (0..6 * 8 * 2).map(|i| ((i * 37) % 23) as f32).collect();
        let image = Tensor::from_vec(data, (6, 8, 2), &Device::Cpu).unwrap();

        let resize = layer(9, 5, |c| c.interpolation = Interpolation::Bicubic);

        let single = resize.apply(&Sample::Tensor(image.clone()), true).unwrap();
        let batch = resize
            .apply(&Sample::Tensor(image.unsqueeze(0).unwrap()), true)
            .unwrap();

        assert_eq!(batch.images().dims(), &[1, 9, 5, 2]);
        assert_eq!(
            values_f32(single.images()),
            values_f32(&batch.images().squeeze(0).unwrap())
        );
    }

    #[test]
    fn test_channels_first_resize() {
        let image = Tensor::ones((3, 4, 6), DType::F32, &Device::Cpu).unwrap();
        let resize = layer(8, 12, |c| c.data_format = DataFormat::ChannelsFirst);

        let output = resize.apply(&Sample::Tensor(image), true).unwrap();
        assert_eq!(output.images().dims(), &[3, 8, 12]);
    }

    #[test]
    fn test_nearest_round_trip_float() {
        // 4x4 image made of constant 2x2 blocks
        let data = vec![
            1f32, 1., 2., 2., //
            1., 1., 2., 2., //
            3., 3., 4., 4., //
            3., 3., 4., 4.,
        ];
        let image = Tensor::from_vec(data.clone(), (4, 4, 1), &Device::Cpu).unwrap();

        let down = layer(2, 2, |c| c.interpolation = Interpolation::Nearest);
        let up = layer(4, 4, |c| c.interpolation = Interpolation::Nearest);

        let small = down.apply(&Sample::Tensor(image), true).unwrap();
        assert_eq!(values_f32(small.images()), vec![1., 2., 3., 4.]);

        let restored = up.apply(&small, true).unwrap();
        assert_eq!(values_f32(restored.images()), data);
    }

    #[test]
    fn test_integral_overshoot_saturates() {
        // Hard edges make lanczos and bicubic overshoot before casting
        let data: Vec<u8> = (0..8 * 8)
            .map(|i| if (i / 8 + i % 8) % 2 == 0 { 0 } else { 255 })
            .collect();
        let image = Tensor::from_vec(data.clone(), (8, 8, 1), &Device::Cpu).unwrap();

        for interpolation in [Interpolation::Bicubic, Interpolation::Lanczos5] {
            let raw = resize(&data, 8, 8, 1, 13, 11, interpolation, false);
            assert!(raw.iter().any(|v| *v < 0.0) && raw.iter().any(|v| *v > 255.0));

            let output = layer(13, 11, |c| c.interpolation = interpolation)
                .apply(&Sample::Tensor(image.clone()), true)
                .unwrap();

            let values = output.images().flatten_all().unwrap().to_vec1::<u8>().unwrap();
            let expected: Vec<u8> = raw.iter().map(|v| saturating_cast(*v, true)).collect();
            assert_eq!(values, expected);

            for (value, raw) in values.iter().zip(&raw) {
                if *raw < 0.0 {
                    assert_eq!(*value, 0);
                } else if *raw > 255.0 {
                    assert_eq!(*value, 255);
                }
            }
        }

        let data = vec![-5i64, 1_000_000_000, 0, 7];
        let image = Tensor::from_vec(data.clone(), (2, 2, 1), &Device::Cpu).unwrap();

        let output = layer(5, 5, |c| c.interpolation = Interpolation::Lanczos3)
            .apply(&Sample::Tensor(image), true)
            .unwrap();
        assert_eq!(output.images().dtype(), DType::I64);

        let expected: Vec<i64> = resize(&data, 2, 2, 1, 5, 5, Interpolation::Lanczos3, false)
            .iter()
            .map(|v| saturating_cast(*v, true))
            .collect();
        let values = output.images().flatten_all().unwrap().to_vec1::<i64>().unwrap();
        assert_eq!(values, expected);
    }

    #[test]
    fn test_fast_resize_channels_first_matches_last() {
        let data: Vec<u8> = (0..12 * 16 * 3).map(|i| ((i * 7) % 251) as u8).collect();
        let last = Tensor::from_vec(data, (1, 12, 16, 3), &Device::Cpu).unwrap();
        let first = last.permute((0, 3, 1, 2)).unwrap().contiguous().unwrap();

        for crop in [false, true] {
            let resize_last = layer(5, 6, |c| {
                c.antialias = true;
                c.crop_to_aspect_ratio = crop;
            });
            let resize_first = layer(5, 6, |c| {
                c.antialias = true;
                c.crop_to_aspect_ratio = crop;
                c.data_format = DataFormat::ChannelsFirst;
            });

            let output_last = resize_last.apply(&Sample::Tensor(last.clone()), true).unwrap();
            let output_first = resize_first.apply(&Sample::Tensor(first.clone()), true).unwrap();

            assert_eq!(output_last.images().dtype(), DType::U8);
            assert_eq!(output_first.images().dims(), &[1, 3, 5, 6]);
            assert_eq!(
                values_f32(output_last.images()),
                values_f32(&output_first.images().permute((0, 2, 3, 1)).unwrap())
            );
        }
    }

    #[test]
    fn test_mask_labels_are_preserved() {
        let mask: Vec<u8> = (0..6 * 6)
            .map(|i| match (i / 6 < 3, i % 6 < 3) {
                (true, true) => 0,
                (true, false) => 3,
                (false, true) => 7,
                (false, false) => 200,
            })
            .collect();

        let masks = Tensor::from_vec(mask, (1, 6, 6, 1), &Device::Cpu).unwrap();
        let images = Tensor::zeros((1, 6, 6, 3), DType::F32, &Device::Cpu).unwrap();

        let sample = Sample::Modalities(Modalities::new(images).with_segmentation_masks(masks));

        for interpolation in [Interpolation::Bilinear, Interpolation::Bicubic, Interpolation::Area] {
            let resize = layer(11, 4, |c| {
                c.interpolation = interpolation;
                c.antialias = true;
            });

            let output = resize.apply(&sample, true).unwrap().into_modalities().unwrap();
            let masks = output.segmentation_masks.unwrap();

            assert_eq!(masks.dims(), &[1, 11, 4, 1]);

            let values = masks.flatten_all().unwrap().to_vec1::<u8>().unwrap();
            assert!(values.iter().all(|v| [0, 3, 7, 200].contains(v)));
            assert!([0, 3, 7, 200].iter().all(|v| values.contains(v)));
        }
    }

    #[test]
    fn test_padded_mask_keeps_label_set() {
        let images = Tensor::zeros((1, 10, 20, 1), DType::F32, &Device::Cpu).unwrap();
        let masks = Tensor::ones((1, 10, 20, 1), DType::U8, &Device::Cpu)
            .unwrap()
            .affine(2.0, 0.0)
            .unwrap();

        let sample = Sample::Modalities(Modalities::new(images).with_segmentation_masks(masks));

        let resize = layer(10, 10, |c| {
            c.pad_to_aspect_ratio = true;
            c.fill_value = 0.5;
        });

        let output = resize.apply(&sample, true).unwrap().into_modalities().unwrap();

        let images = values_f32(&output.images);
        assert!(images.contains(&0.5));

        let masks = output.segmentation_masks.unwrap();
        let values = masks.flatten_all().unwrap().to_vec1::<u8>().unwrap();
        assert!(values.iter().all(|v| *v == 0 || *v == 2));
        assert!(values.contains(&0) && values.contains(&2));

        let resize = layer(10, 10, |c| {
            c.pad_to_aspect_ratio = true;
            c.mask_fill_value = 9;
        });
        let output = resize.apply(&sample, true).unwrap().into_modalities().unwrap();

        let masks = output.segmentation_masks.unwrap();
        let values = masks.flatten_all().unwrap().to_vec1::<u8>().unwrap();
        assert!(values.iter().all(|v| *v == 9 || *v == 2));
    }

    #[test]
    fn test_labels_pass_through() {
        let images = Tensor::zeros((2, 4, 4, 1), DType::F32, &Device::Cpu).unwrap();
        let labels = Tensor::new(&[3i64, 9], &Device::Cpu).unwrap();

        let sample = Sample::Modalities(Modalities::new(images).with_labels(labels));
        let output = layer(2, 2, |_| {})
            .apply(&sample, true)
            .unwrap()
            .into_modalities()
            .unwrap();

        assert_eq!(output.labels.unwrap().to_vec1::<i64>().unwrap(), vec![3, 9]);
    }

    #[test]
    fn test_box_rescale() {
        let image = Tensor::zeros((10, 20, 3), DType::U8, &Device::Cpu).unwrap();
        let boxes = BoundingBoxes::new(vec![[2., 4., 10., 8.]], vec![1]).unwrap();

        let sample = Sample::Modalities(
            Modalities::new(image).with_bounding_boxes(SampleBoxes::List(boxes)),
        );

        let resize = layer(20, 40, |c| c.bounding_box_format = Some(BoundingBoxFormat::Xyxy));
        let boxes = single_boxes(resize.apply(&sample, true).unwrap());

        assert_box_close(boxes.boxes()[0], [4., 8., 20., 16.]);
        assert_eq!(boxes.labels(), &[1]);
    }

    #[test]
    fn test_relative_boxes_unchanged_by_plain_resize() {
        let image = Tensor::zeros((10, 20, 3), DType::U8, &Device::Cpu).unwrap();
        let boxes = BoundingBoxes::unlabeled(vec![[0.1, 0.2, 0.5, 0.9]]);

        let sample = Sample::Modalities(
            Modalities::new(image).with_bounding_boxes(SampleBoxes::List(boxes)),
        );

        let resize = layer(7, 33, |c| c.bounding_box_format = Some(BoundingBoxFormat::RelXyxy));
        let boxes = single_boxes(resize.apply(&sample, true).unwrap());

        assert_box_close(boxes.boxes()[0], [0.1, 0.2, 0.5, 0.9]);
    }

    #[test]
    fn test_box_crop_offsets_and_clip() {
        let image = Tensor::zeros((10, 20, 3), DType::U8, &Device::Cpu).unwrap();
        let boxes =
            BoundingBoxes::new(vec![[6., 2., 12., 8.], [0., 0., 4., 4.]], vec![1, 2]).unwrap();

        let sample = Sample::Modalities(
            Modalities::new(image).with_bounding_boxes(SampleBoxes::List(boxes)),
        );

        let resize = layer(10, 10, |c| {
            c.crop_to_aspect_ratio = true;
            c.bounding_box_format = Some(BoundingBoxFormat::Xyxy);
        });

        let output = resize.apply(&sample, true).unwrap();
        assert_eq!(output.images().dims(), &[10, 10, 3]);

        let boxes = single_boxes(output);
        assert_box_close(boxes.boxes()[0], [1., 2., 7., 8.]);
        assert_box_close(boxes.boxes()[1], [0., 0., 0., 4.]);
    }

    #[test]
    fn test_box_pad_offsets() {
        let image = Tensor::zeros((10, 20, 3), DType::U8, &Device::Cpu).unwrap();
        let boxes = BoundingBoxes::unlabeled(vec![[10., 5., 20., 10.]]);

        let sample = Sample::Modalities(
            Modalities::new(image).with_bounding_boxes(SampleBoxes::List(boxes)),
        );

        let resize = layer(10, 10, |c| {
            c.pad_to_aspect_ratio = true;
            c.bounding_box_format = Some(BoundingBoxFormat::Xywh);
        });

        let boxes = single_boxes(resize.apply(&sample, true).unwrap());

        // xyxy [10, 5, 30, 15] shifted down by 5 then halved
        assert_box_close(boxes.boxes()[0], [5., 5., 10., 5.]);
    }

    #[test]
    fn test_padding_rows_untouched() {
        let resize = layer(20, 40, |c| c.bounding_box_format = Some(BoundingBoxFormat::Xyxy));

        let dense = BoxTensors {
            boxes: Tensor::from_vec(
                vec![2f32, 4., 10., 8., -1., -1., -1., -1.],
                (1, 2, 4),
                &Device::Cpu,
            )
            .unwrap(),
            labels: Tensor::from_vec(vec![0i64, -1], (1, 2), &Device::Cpu).unwrap(),
        };

        let output = resize.transform_bounding_boxes(&dense, &(10, 20), true).unwrap();
        let boxes = output.boxes.to_vec3::<f32>().unwrap();

        assert_eq!(boxes[0][0], vec![4., 8., 20., 16.]);
        assert_eq!(boxes[0][1], vec![-1., -1., -1., -1.]);
    }

    #[test]
    fn test_dense_box_dtypes_preserved() {
        let images = Tensor::zeros((1, 10, 20, 3), DType::U8, &Device::Cpu).unwrap();
        let boxes = BoxTensors {
            boxes: Tensor::from_vec(vec![2f64, 4., 10., 8.], (1, 1, 4), &Device::Cpu).unwrap(),
            labels: Tensor::from_vec(vec![5u32], (1, 1), &Device::Cpu).unwrap(),
        };

        let sample = Sample::Modalities(
            Modalities::new(images).with_bounding_boxes(SampleBoxes::Dense(boxes)),
        );

        let resize = layer(20, 40, |c| c.bounding_box_format = Some(BoundingBoxFormat::Xyxy));
        let output = resize.apply(&sample, true).unwrap().into_modalities().unwrap();

        match output.bounding_boxes {
            Some(SampleBoxes::Dense(dense)) => {
                assert_eq!(dense.boxes.dtype(), DType::F64);
                assert_eq!(dense.labels.dtype(), DType::U32);
                assert_eq!(dense.boxes.dims(), &[1, 1, 4]);
                assert_eq!(dense.boxes.to_vec3::<f64>().unwrap()[0][0], vec![4., 8., 20., 16.]);
                assert_eq!(dense.labels.to_vec2::<u32>().unwrap(), vec![vec![5]]);
            }
            other => panic!("unexpected boxes {:?}", other),
        }
    }

    #[test]
    fn test_batched_ragged_boxes() {
        let images = Tensor::zeros((2, 10, 20, 3), DType::U8, &Device::Cpu).unwrap();
        let boxes = vec![
            BoundingBoxes::new(vec![[0., 0., 10., 5.]], vec![1]).unwrap(),
            BoundingBoxes::new(vec![[0., 0., 2., 2.], [4., 4., 6., 6.]], vec![2, 3]).unwrap(),
        ];

        let sample = Sample::Modalities(
            Modalities::new(images).with_bounding_boxes(SampleBoxes::Ragged(boxes)),
        );

        let resize = layer(5, 10, |c| c.bounding_box_format = Some(BoundingBoxFormat::Xyxy));
        let output = resize.apply(&sample, true).unwrap().into_modalities().unwrap();

        assert_eq!(output.images.dims(), &[2, 5, 10, 3]);

        match output.bounding_boxes {
            Some(SampleBoxes::Ragged(lists)) => {
                assert_eq!(lists[0].len(), 1);
                assert_eq!(lists[1].len(), 2);
                assert_box_close(lists[0].boxes()[0], [0., 0., 5., 2.5]);
                assert_box_close(lists[1].boxes()[1], [2., 2., 3., 3.]);
                assert_eq!(lists[1].labels(), &[2, 3]);
            }
            other => panic!("unexpected boxes {:?}", other),
        }
    }
}
