// Copyright (c) 2025, Tom Ouellette
// Licensed under the MIT License

use candle_core::Tensor;

use augment_core::im::BoundingBoxes;

/// Dense bounding boxes with one class label per row
///
/// Batched boxes have shape (batch, boxes, 4) with labels (batch, boxes).
/// Single image boxes have shape (boxes, 4) with labels (boxes,). Rows with
/// a label of -1 are padding.
#[derive(Debug, Clone)]
pub struct BoxTensors {
    pub boxes: Tensor,
    pub labels: Tensor,
}

/// Bounding boxes attached to a sample
#[derive(Debug, Clone)]
pub enum SampleBoxes {
    /// Already densified box and label tensors
    Dense(BoxTensors),
    /// One variable length list per image of a batch
    Ragged(Vec<BoundingBoxes>),
    /// Boxes of a single image
    List(BoundingBoxes),
}

/// Named modalities that are transformed together
///
/// # Examples
///
/// ```
/// use candle_core::{DType, Device, Tensor};
/// use augment_layers::sample::Modalities;
///
/// let images = Tensor::zeros((2, 16, 16, 3), DType::U8, &Device::Cpu).unwrap();
/// let masks = Tensor::zeros((2, 16, 16, 1), DType::U8, &Device::Cpu).unwrap();
///
/// let modalities = Modalities::new(images).with_segmentation_masks(masks);
/// assert!(modalities.labels.is_none());
/// assert!(modalities.segmentation_masks.is_some());
/// ```
#[derive(Debug, Clone)]
pub struct Modalities {
    pub images: Tensor,
    pub labels: Option<Tensor>,
    pub bounding_boxes: Option<SampleBoxes>,
    pub segmentation_masks: Option<Tensor>,
}

impl Modalities {
    pub fn new(images: Tensor) -> Self {
        Modalities {
            images,
            labels: None,
            bounding_boxes: None,
            segmentation_masks: None,
        }
    }

    pub fn with_labels(mut self, labels: Tensor) -> Self {
        self.labels = Some(labels);
        self
    }

    pub fn with_bounding_boxes(mut self, bounding_boxes: SampleBoxes) -> Self {
        self.bounding_boxes = Some(bounding_boxes);
        self
    }

    pub fn with_segmentation_masks(mut self, segmentation_masks: Tensor) -> Self {
        self.segmentation_masks = Some(segmentation_masks);
        self
    }
}

/// A bare image tensor or a set of named modalities
#[derive(Debug, Clone)]
pub enum Sample {
    Tensor(Tensor),
    Modalities(Modalities),
}

impl Sample {
    /// The primary image tensor every transformation is derived from
    pub fn images(&self) -> &Tensor {
        match self {
            Sample::Tensor(images) => images,
            Sample::Modalities(modalities) => &modalities.images,
        }
    }

    pub fn into_tensor(self) -> Option<Tensor> {
        match self {
            Sample::Tensor(images) => Some(images),
            Sample::Modalities(_) => None,
        }
    }

    pub fn into_modalities(self) -> Option<Modalities> {
        match self {
            Sample::Tensor(_) => None,
            Sample::Modalities(modalities) => Some(modalities),
        }
    }
}

impl From<Tensor> for Sample {
    fn from(images: Tensor) -> Self {
        Sample::Tensor(images)
    }
}

impl From<Modalities> for Sample {
    fn from(modalities: Modalities) -> Self {
        Sample::Modalities(modalities)
    }
}
