// Copyright (c) 2025, Tom Ouellette
// Licensed under the MIT License

use candle_core::Tensor;
use rand::SeedableRng;
use rand::rngs::StdRng;

use augment_core::im::BoundingBoxFormat;

use crate::boxes::{batch_size, densify_bounding_boxes, restore_layout};
use crate::config::DataFormat;
use crate::error::{LayerError, Result};
use crate::sample::{BoxTensors, Modalities, Sample};
use crate::tensor::is_batched;

/// A preprocessing operation applied consistently to every modality of a sample
///
/// Implementors provide the four batched `transform_*` operations and may
/// override `get_random_transformation` to derive a shared descriptor from
/// the sample. `apply` checks the sample, draws one descriptor and routes each
/// present modality to its transform. Single images are transformed through
/// the batched operations by adding and removing a leading axis of size 1.
pub trait ImagePreprocessingLayer: Send + Sync {
    /// Parameters shared by every modality of one call
    type Transformation: Default;

    /// Axis layout of image and mask tensors
    fn data_format(&self) -> DataFormat;

    /// Coordinate layout of bounding boxes, if boxes are supported
    fn bounding_box_format(&self) -> Option<BoundingBoxFormat>;

    /// Seed for the per call random generator
    fn seed(&self) -> Option<u64> {
        None
    }

    /// Derive the transformation applied to every modality of the sample
    ///
    /// Only the primary image tensor should be read. The default produces an
    /// empty transformation.
    fn get_random_transformation(
        &self,
        _sample: &Sample,
        _training: bool,
        _rng: &mut StdRng,
    ) -> Result<Self::Transformation> {
        Ok(Self::Transformation::default())
    }

    fn transform_images(
        &self,
        images: &Tensor,
        transformation: &Self::Transformation,
        training: bool,
    ) -> Result<Tensor>;

    fn transform_labels(
        &self,
        labels: &Tensor,
        transformation: &Self::Transformation,
        training: bool,
    ) -> Result<Tensor>;

    fn transform_bounding_boxes(
        &self,
        bounding_boxes: &BoxTensors,
        transformation: &Self::Transformation,
        training: bool,
    ) -> Result<BoxTensors>;

    fn transform_segmentation_masks(
        &self,
        segmentation_masks: &Tensor,
        transformation: &Self::Transformation,
        training: bool,
    ) -> Result<Tensor>;

    // >>> SINGLE SAMPLE METHODS

    fn transform_single_image(
        &self,
        image: &Tensor,
        transformation: &Self::Transformation,
        training: bool,
    ) -> Result<Tensor> {
        let images = image.unsqueeze(0)?;
        Ok(self
            .transform_images(&images, transformation, training)?
            .squeeze(0)?)
    }

    fn transform_single_label(
        &self,
        label: &Tensor,
        transformation: &Self::Transformation,
        training: bool,
    ) -> Result<Tensor> {
        let labels = label.unsqueeze(0)?;
        Ok(self
            .transform_labels(&labels, transformation, training)?
            .squeeze(0)?)
    }

    fn transform_single_bounding_boxes(
        &self,
        bounding_boxes: &BoxTensors,
        transformation: &Self::Transformation,
        training: bool,
    ) -> Result<BoxTensors> {
        let batched = BoxTensors {
            boxes: bounding_boxes.boxes.unsqueeze(0)?,
            labels: bounding_boxes.labels.unsqueeze(0)?,
        };

        let transformed = self.transform_bounding_boxes(&batched, transformation, training)?;

        Ok(BoxTensors {
            boxes: transformed.boxes.squeeze(0)?,
            labels: transformed.labels.squeeze(0)?,
        })
    }

    fn transform_single_segmentation_mask(
        &self,
        segmentation_mask: &Tensor,
        transformation: &Self::Transformation,
        training: bool,
    ) -> Result<Tensor> {
        let masks = segmentation_mask.unsqueeze(0)?;
        Ok(self
            .transform_segmentation_masks(&masks, transformation, training)?
            .squeeze(0)?)
    }

    // <<< SINGLE SAMPLE METHODS

    // >>> DISPATCH METHODS

    /// Transform every modality of a sample with one shared transformation
    ///
    /// A fresh generator is created for each call, seeded from `seed` when
    /// set and from entropy otherwise.
    ///
    /// # Arguments
    ///
    /// * `sample` - A bare image tensor or named modalities
    /// * `training` - Whether stochastic behaviour is enabled
    fn apply(&self, sample: &Sample, training: bool) -> Result<Sample> {
        let mut rng = match self.seed() {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        self.apply_with_rng(sample, training, &mut rng)
    }

    /// Transform every modality of a sample using a caller owned generator
    fn apply_with_rng(&self, sample: &Sample, training: bool, rng: &mut StdRng) -> Result<Sample> {
        let batched = validate_sample(sample, self.bounding_box_format())?;
        let transformation = self.get_random_transformation(sample, training, rng)?;

        match sample {
            Sample::Tensor(images) => {
                let images = if batched {
                    self.transform_images(images, &transformation, training)?
                } else {
                    self.transform_single_image(images, &transformation, training)?
                };

                Ok(Sample::Tensor(images))
            }
            Sample::Modalities(modalities) => {
                let images = if batched {
                    self.transform_images(&modalities.images, &transformation, training)?
                } else {
                    self.transform_single_image(&modalities.images, &transformation, training)?
                };

                let bounding_boxes = match &modalities.bounding_boxes {
                    Some(boxes) => {
                        let dense = densify_bounding_boxes(boxes, batched, modalities.images.device())?;
                        let dense = if batched {
                            self.transform_bounding_boxes(&dense, &transformation, training)?
                        } else {
                            self.transform_single_bounding_boxes(&dense, &transformation, training)?
                        };
                        Some(restore_layout(boxes, dense)?)
                    }
                    None => None,
                };

                let labels = match &modalities.labels {
                    Some(labels) if batched => {
                        Some(self.transform_labels(labels, &transformation, training)?)
                    }
                    Some(label) => {
                        Some(self.transform_single_label(label, &transformation, training)?)
                    }
                    None => None,
                };

                let segmentation_masks = match &modalities.segmentation_masks {
                    Some(masks) if batched => {
                        Some(self.transform_segmentation_masks(masks, &transformation, training)?)
                    }
                    Some(mask) => Some(self.transform_single_segmentation_mask(
                        mask,
                        &transformation,
                        training,
                    )?),
                    None => None,
                };

                Ok(Sample::Modalities(Modalities {
                    images,
                    labels,
                    bounding_boxes,
                    segmentation_masks,
                }))
            }
        }
    }

    // <<< DISPATCH METHODS
}

/// Check a sample before any modality is transformed
///
/// Returns whether the sample is batched.
pub fn validate_sample(
    sample: &Sample,
    bounding_box_format: Option<BoundingBoxFormat>,
) -> Result<bool> {
    let images = sample.images();
    let batched = is_batched(images)?;

    let Sample::Modalities(modalities) = sample else {
        return Ok(batched);
    };

    if modalities.bounding_boxes.is_some() && bounding_box_format.is_none() {
        return Err(LayerError::UsageError(
            "Bounding boxes were provided but the layer has no `bounding_box_format`. Set a format (e.g. 'xyxy') when constructing the layer."
                .to_string(),
        ));
    }

    if let Some(masks) = &modalities.segmentation_masks {
        if masks.rank() != images.rank() {
            return Err(LayerError::ShapeError(format!(
                "Segmentation masks must have the same rank as images, received {:?} for images {:?}.",
                masks.dims(),
                images.dims()
            )));
        }
    }

    if !batched {
        return Ok(false);
    }

    let n = images.dims()[0];

    let mismatch = |name: &str, found: usize| {
        LayerError::ShapeError(format!(
            "Expected {} for a batch of {} images, received a batch of {}.",
            name, n, found
        ))
    };

    if let Some(labels) = &modalities.labels {
        match labels.dims().first() {
            Some(&found) if found == n => {}
            Some(&found) => return Err(mismatch("labels", found)),
            None => return Err(mismatch("labels", 1)),
        }
    }

    if let Some(masks) = &modalities.segmentation_masks {
        let found = masks.dims()[0];
        if found != n {
            return Err(mismatch("segmentation masks", found));
        }
    }

    if let Some(boxes) = &modalities.bounding_boxes {
        if let Some(found) = batch_size(boxes) {
            if found != n {
                return Err(mismatch("bounding boxes", found));
            }
        }
    }

    Ok(true)
}
