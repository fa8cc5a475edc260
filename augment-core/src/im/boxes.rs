// Copyright (c) 2025, Tom Ouellette
// Licensed under the MIT License

use std::fs::File;
use std::io::{BufWriter, Read};
use std::path::Path;

use serde_json::Value;

use crate::constant::{BOUNDING_BOX_JSON_VALID_KEYS, LABEL_JSON_VALID_KEYS};
use crate::error::AugmentError;
use crate::im::BoundingBoxFormat;

/// The bounding boxes and class labels of a single image
///
/// Coordinates are stored as given; their meaning is set by whichever
/// `BoundingBoxFormat` the owner of the boxes declares. Every box has exactly
/// one class label.
///
/// # Examples
///
/// ```
/// use augment_core::im::BoundingBoxes;
///
/// let boxes = BoundingBoxes::new(vec![[0., 0., 1., 1.], [3., 4., 5., 7.]], vec![1, 2]);
/// assert!(boxes.is_ok());
///
/// let boxes = BoundingBoxes::new(vec![[0., 0., 1., 1.]], vec![1, 2]);
/// assert!(boxes.is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BoundingBoxes {
    boxes: Vec<[f32; 4]>,
    labels: Vec<i64>,
}

impl BoundingBoxes {
    /// Initialize a new bounding boxes container
    ///
    /// # Arguments
    ///
    /// * `boxes` - Box coordinates
    /// * `labels` - One class label per box
    pub fn new(boxes: Vec<[f32; 4]>, labels: Vec<i64>) -> Result<Self, AugmentError> {
        if boxes.len() != labels.len() {
            return Err(AugmentError::BoxesSizeError);
        }

        Ok(Self { boxes, labels })
    }

    /// Initialize boxes that all share class label zero
    pub fn unlabeled(boxes: Vec<[f32; 4]>) -> Self {
        let labels = vec![0; boxes.len()];
        Self { boxes, labels }
    }
}

// >>> I/O METHODS

impl BoundingBoxes {
    /// Open bounding boxes from the provided path
    ///
    /// # Arguments
    ///
    /// * `path` - A path to bounding boxes with a valid extension
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use augment_core::im::BoundingBoxes;
    /// let bounding_boxes = BoundingBoxes::open("boxes.json");
    /// ```
    pub fn open<P: AsRef<Path>>(path: P) -> Result<BoundingBoxes, AugmentError> {
        let extension = path
            .as_ref()
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_lowercase());

        if let Some(ext) = extension {
            if ext == "json" {
                return read_boxes_json(path);
            }
        }

        Err(AugmentError::BoxesReadError)
    }

    /// Save bounding boxes at the provided path
    ///
    /// # Arguments
    ///
    /// * `path` - Path to save bounding boxes
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), AugmentError> {
        let extension = path
            .as_ref()
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_lowercase());

        if let Some(ext) = extension {
            if ext == "json" {
                return write_boxes_json(path, self);
            }
        }

        Err(AugmentError::BoxesWriteError)
    }
}

// <<< I/O METHODS

// >>> PROPERTY METHODS

impl BoundingBoxes {
    /// Number of bounding boxes
    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    /// Check if bounding boxes are empty
    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    /// Box coordinates
    pub fn boxes(&self) -> &[[f32; 4]] {
        &self.boxes
    }

    /// Class labels
    pub fn labels(&self) -> &[i64] {
        &self.labels
    }
}

// <<< PROPERTY METHODS

// >>> CONVERSION METHODS

impl BoundingBoxes {
    /// Convert the coordinates from one format to another
    ///
    /// # Arguments
    ///
    /// * `source` - Current format of the coordinates
    /// * `target` - Requested format
    /// * `height` - Image height (used by relative formats)
    /// * `width` - Image width (used by relative formats)
    pub fn convert(
        &self,
        source: BoundingBoxFormat,
        target: BoundingBoxFormat,
        height: f32,
        width: f32,
    ) -> BoundingBoxes {
        let boxes = self
            .boxes
            .iter()
            .map(|b| target.from_xyxy(source.to_xyxy(*b, height, width), height, width))
            .collect();

        BoundingBoxes {
            boxes,
            labels: self.labels.clone(),
        }
    }
}

// <<< CONVERSION METHODS

/// Read bounding boxes stored as json format
///
/// Boxes are read from the first valid box key and labels from the first
/// valid label key. Missing labels default to zero.
pub fn read_boxes_json<P: AsRef<Path>>(path: P) -> Result<BoundingBoxes, AugmentError> {
    let mut contents = String::new();

    File::open(path)
        .map_err(|err| AugmentError::NoFileError(err.to_string()))?
        .read_to_string(&mut contents)
        .map_err(|err| AugmentError::NoFileError(err.to_string()))?;

    let data: Value = serde_json::from_str(&contents).map_err(|_| AugmentError::BoxesReadError)?;

    fn to_f32(value: &Value) -> Result<f32, AugmentError> {
        value
            .as_f64()
            .map(|n| n as f32)
            .ok_or(AugmentError::BoxesReadError)
    }

    let boxes = BOUNDING_BOX_JSON_VALID_KEYS
        .iter()
        .find_map(|key| data.get(key).and_then(|v| v.as_array()))
        .ok_or(AugmentError::BoxesReadError)?;

    let boxes: Vec<[f32; 4]> = boxes
        .iter()
        .map(|item| {
            let b = item.as_array().ok_or(AugmentError::BoxesReadError)?;
            if b.len() != 4 {
                return Err(AugmentError::BoxesReadError);
            }
            Ok([to_f32(&b[0])?, to_f32(&b[1])?, to_f32(&b[2])?, to_f32(&b[3])?])
        })
        .collect::<Result<_, _>>()?;

    let labels = LABEL_JSON_VALID_KEYS
        .iter()
        .find_map(|key| data.get(key).and_then(|v| v.as_array()));

    match labels {
        Some(labels) => {
            let labels: Vec<i64> = labels
                .iter()
                .map(|v| v.as_i64().ok_or(AugmentError::BoxesReadError))
                .collect::<Result<_, _>>()?;

            BoundingBoxes::new(boxes, labels)
        }
        None => Ok(BoundingBoxes::unlabeled(boxes)),
    }
}

/// Write bounding boxes and labels to a json file
pub fn write_boxes_json<P>(path: P, boxes: &BoundingBoxes) -> Result<(), AugmentError>
where
    P: AsRef<Path>,
{
    let file = File::create(path).map_err(|_| AugmentError::BoxesWriteError)?;
    let writer = BufWriter::new(file);

    serde_json::to_writer(
        writer,
        &serde_json::json!({
            "bounding_boxes": boxes.boxes,
            "labels": boxes.labels,
        }),
    )
    .map_err(|_| AugmentError::BoxesWriteError)?;

    Ok(())
}

#[cfg(test)]
mod test {

    use super::*;

    #[test]
    pub fn test_open_json_failure() {
        let bounding_boxes = BoundingBoxes::open("does_not_exist/");
        assert!(bounding_boxes.is_err())
    }

    #[test]
    pub fn test_write_json() {
        const OUTPUT: &str = "TEST_BOX_WRITE.json";

        let bounding_boxes =
            BoundingBoxes::new(vec![[0., 0., 1., 1.], [2., 2., 4.5, 8.]], vec![3, 1]).unwrap();

        bounding_boxes.save(OUTPUT).unwrap();

        let reloaded_boxes = BoundingBoxes::open(OUTPUT).unwrap();

        assert_eq!(bounding_boxes, reloaded_boxes);

        std::fs::remove_file(OUTPUT).unwrap();
    }

    #[test]
    pub fn test_read_json_without_labels() {
        const OUTPUT: &str = "TEST_BOX_READ_UNLABELED.json";

        std::fs::write(OUTPUT, r#"{"boxes": [[0, 0, 2, 2], [1, 1, 3, 3]]}"#).unwrap();

        let boxes = BoundingBoxes::open(OUTPUT).unwrap();
        assert_eq!(boxes.len(), 2);
        assert_eq!(boxes.labels(), &[0, 0]);
        assert_eq!(boxes.boxes()[1], [1., 1., 3., 3.]);

        std::fs::remove_file(OUTPUT).unwrap();
    }

    #[test]
    pub fn test_convert() {
        let boxes = BoundingBoxes::new(vec![[2., 4., 6., 12.]], vec![1]).unwrap();
        let converted = boxes.convert(
            BoundingBoxFormat::Xyxy,
            BoundingBoxFormat::RelXywh,
            20.,
            10.,
        );

        for (a, b) in converted.boxes()[0].iter().zip([0.2, 0.2, 0.4, 0.4]) {
            assert!((a - b).abs() < 1e-6);
        }

        assert_eq!(converted.labels(), &[1]);
    }
}
