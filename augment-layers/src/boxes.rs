// Copyright (c) 2025, Tom Ouellette
// Licensed under the MIT License

use candle_core::{DType, Device, Tensor};

use augment_core::constant::{BOX_PADDING_VALUE, LABEL_PADDING_VALUE};
use augment_core::im::BoundingBoxes;

use crate::error::{LayerError, Result};
use crate::sample::{BoxTensors, SampleBoxes};

/// Convert any bounding box representation into dense tensors
///
/// Ragged lists are padded to the longest list with boxes of -1 and labels
/// of -1. Dense inputs are checked and cast to f32 boxes and i64 labels;
/// `restore_layout` casts them back to the caller's element types.
///
/// # Arguments
///
/// * `boxes` - Bounding boxes of a sample
/// * `batched` - Whether the sample images are a batch
/// * `device` - Device of the sample images
///
/// # Examples
///
/// ```
/// use candle_core::Device;
/// use augment_core::im::BoundingBoxes;
/// use augment_layers::boxes::densify_bounding_boxes;
/// use augment_layers::sample::SampleBoxes;
///
/// let ragged = SampleBoxes::Ragged(vec![
///     BoundingBoxes::new(vec![[0., 0., 2., 2.]], vec![4]).unwrap(),
///     BoundingBoxes::default(),
/// ]);
///
/// let dense = densify_bounding_boxes(&ragged, true, &Device::Cpu).unwrap();
/// assert_eq!(dense.boxes.dims(), &[2, 1, 4]);
/// assert_eq!(dense.labels.to_vec2::<i64>().unwrap(), vec![vec![4], vec![-1]]);
/// ```
pub fn densify_bounding_boxes(
    boxes: &SampleBoxes,
    batched: bool,
    device: &Device,
) -> Result<BoxTensors> {
    match (boxes, batched) {
        (SampleBoxes::Dense(dense), _) => check_dense(dense, batched),
        (SampleBoxes::Ragged(lists), true) => pad_bounding_boxes(lists, device),
        (SampleBoxes::List(list), false) => list_to_tensors(list, device),
        (SampleBoxes::Ragged(_), false) => Err(LayerError::UsageError(
            "Ragged bounding boxes were given for a single image. Use a single box list instead."
                .to_string(),
        )),
        (SampleBoxes::List(_), true) => Err(LayerError::UsageError(
            "A single box list was given for a batch of images. Use one list per image instead."
                .to_string(),
        )),
    }
}

/// Stack variable length box lists into padded (batch, boxes, 4) tensors
pub fn pad_bounding_boxes(lists: &[BoundingBoxes], device: &Device) -> Result<BoxTensors> {
    let n = lists.len();
    let max_boxes = lists.iter().map(|list| list.len()).max().unwrap_or(0);

    let mut boxes = Vec::with_capacity(n * max_boxes * 4);
    let mut labels = Vec::with_capacity(n * max_boxes);

    for list in lists {
        for (b, label) in list.boxes().iter().zip(list.labels()) {
            boxes.extend_from_slice(b);
            labels.push(*label);
        }

        for _ in list.len()..max_boxes {
            boxes.extend_from_slice(&[BOX_PADDING_VALUE; 4]);
            labels.push(LABEL_PADDING_VALUE);
        }
    }

    Ok(BoxTensors {
        boxes: Tensor::from_vec(boxes, (n, max_boxes, 4), device)?,
        labels: Tensor::from_vec(labels, (n, max_boxes), device)?,
    })
}

fn list_to_tensors(list: &BoundingBoxes, device: &Device) -> Result<BoxTensors> {
    let boxes: Vec<f32> = list.boxes().iter().flatten().copied().collect();

    Ok(BoxTensors {
        boxes: Tensor::from_vec(boxes, (list.len(), 4), device)?,
        labels: Tensor::from_vec(list.labels().to_vec(), list.len(), device)?,
    })
}

fn check_dense(dense: &BoxTensors, batched: bool) -> Result<BoxTensors> {
    let boxes = dense.boxes.dims();
    let labels = dense.labels.dims();

    let valid = if batched {
        boxes.len() == 3 && boxes[2] == 4 && labels == &boxes[..2]
    } else {
        boxes.len() == 2 && boxes[1] == 4 && labels == &boxes[..1]
    };

    if !valid {
        return Err(LayerError::ShapeError(format!(
            "Dense boxes must have shape ({}boxes, 4) with labels ({}boxes), received {:?} and {:?}.",
            if batched { "batch, " } else { "" },
            if batched { "batch, " } else { "" },
            boxes,
            labels
        )));
    }

    Ok(BoxTensors {
        boxes: dense.boxes.to_dtype(DType::F32)?,
        labels: dense.labels.to_dtype(DType::I64)?,
    })
}

/// Split padded (batch, boxes, 4) tensors back into one list per image
///
/// Rows labelled as padding are dropped.
pub fn unpad_bounding_boxes(dense: &BoxTensors) -> Result<Vec<BoundingBoxes>> {
    let boxes = dense.boxes.to_dtype(DType::F32)?.to_vec3::<f32>()?;
    let labels = dense.labels.to_dtype(DType::I64)?.to_vec2::<i64>()?;

    boxes
        .into_iter()
        .zip(labels)
        .map(|(boxes, labels)| collect_rows(boxes, labels))
        .collect()
}

fn collect_rows(boxes: Vec<Vec<f32>>, labels: Vec<i64>) -> Result<BoundingBoxes> {
    let (boxes, labels): (Vec<[f32; 4]>, Vec<i64>) = boxes
        .into_iter()
        .zip(labels)
        .filter(|(_, label)| *label != LABEL_PADDING_VALUE)
        .map(|(b, label)| ([b[0], b[1], b[2], b[3]], label))
        .unzip();

    Ok(BoundingBoxes::new(boxes, labels)?)
}

/// Return transformed dense boxes in the same representation as the input
///
/// Dense inputs get their original box and label element types back.
pub fn restore_layout(like: &SampleBoxes, dense: BoxTensors) -> Result<SampleBoxes> {
    match like {
        SampleBoxes::Dense(original) => Ok(SampleBoxes::Dense(BoxTensors {
            boxes: dense.boxes.to_dtype(original.boxes.dtype())?,
            labels: dense.labels.to_dtype(original.labels.dtype())?,
        })),
        SampleBoxes::Ragged(_) => Ok(SampleBoxes::Ragged(unpad_bounding_boxes(&dense)?)),
        SampleBoxes::List(_) => {
            let boxes = dense.boxes.to_dtype(DType::F32)?.to_vec2::<f32>()?;
            let labels = dense.labels.to_dtype(DType::I64)?.to_vec1::<i64>()?;
            Ok(SampleBoxes::List(collect_rows(boxes, labels)?))
        }
    }
}

/// Number of images a box representation covers, if it is batched
pub fn batch_size(boxes: &SampleBoxes) -> Option<usize> {
    match boxes {
        SampleBoxes::Dense(dense) if dense.boxes.rank() == 3 => Some(dense.boxes.dims()[0]),
        SampleBoxes::Ragged(lists) => Some(lists.len()),
        _ => None,
    }
}

#[cfg(test)]
mod test {

    use super::*;

    fn ragged() -> Vec<BoundingBoxes> {
        vec![
            BoundingBoxes::new(vec![[1., 2., 3., 4.]], vec![7]).unwrap(),
            BoundingBoxes::new(vec![[0., 0., 5., 5.], [2., 2., 8., 9.]], vec![1, 2]).unwrap(),
        ]
    }

    #[test]
    fn test_pad_with_sentinel() {
        let dense = pad_bounding_boxes(&ragged(), &Device::Cpu).unwrap();

        assert_eq!(dense.boxes.dims(), &[2, 2, 4]);
        assert_eq!(dense.labels.to_vec2::<i64>().unwrap(), vec![vec![7, -1], vec![1, 2]]);

        let boxes = dense.boxes.to_vec3::<f32>().unwrap();
        assert_eq!(boxes[0][1], vec![-1., -1., -1., -1.]);
        assert_eq!(boxes[1][1], vec![2., 2., 8., 9.]);
    }

    #[test]
    fn test_unpad_restores_lists() {
        let lists = ragged();
        let dense = pad_bounding_boxes(&lists, &Device::Cpu).unwrap();
        assert_eq!(unpad_bounding_boxes(&dense).unwrap(), lists);
    }

    #[test]
    fn test_densify_single_list() {
        let list = SampleBoxes::List(ragged().remove(1));
        let dense = densify_bounding_boxes(&list, false, &Device::Cpu).unwrap();

        assert_eq!(dense.boxes.dims(), &[2, 4]);
        assert_eq!(dense.labels.to_vec1::<i64>().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_densify_layout_mismatch() {
        let list = SampleBoxes::List(BoundingBoxes::default());
        assert!(matches!(
            densify_bounding_boxes(&list, true, &Device::Cpu),
            Err(LayerError::UsageError(_))
        ));

        let ragged = SampleBoxes::Ragged(ragged());
        assert!(matches!(
            densify_bounding_boxes(&ragged, false, &Device::Cpu),
            Err(LayerError::UsageError(_))
        ));
    }

    #[test]
    fn test_densify_dense_shape_check() {
        let dense = BoxTensors {
            boxes: Tensor::zeros((2, 3, 4), DType::F64, &Device::Cpu).unwrap(),
            labels: Tensor::zeros((2, 2), DType::U32, &Device::Cpu).unwrap(),
        };

        assert!(matches!(
            densify_bounding_boxes(&SampleBoxes::Dense(dense.clone()), true, &Device::Cpu),
            Err(LayerError::ShapeError(_))
        ));

        let fixed = BoxTensors {
            labels: Tensor::zeros((2, 3), DType::U32, &Device::Cpu).unwrap(),
            ..dense
        };

        let checked =
            densify_bounding_boxes(&SampleBoxes::Dense(fixed), true, &Device::Cpu).unwrap();
        assert_eq!(checked.boxes.dtype(), DType::F32);
        assert_eq!(checked.labels.dtype(), DType::I64);
    }

    #[test]
    fn test_restore_dense_element_types() {
        let original = SampleBoxes::Dense(BoxTensors {
            boxes: Tensor::from_vec(vec![0.25f64, 0.5, 1.5, 2.0], (1, 4), &Device::Cpu).unwrap(),
            labels: Tensor::from_vec(vec![3u32], 1, &Device::Cpu).unwrap(),
        });

        let dense = densify_bounding_boxes(&original, false, &Device::Cpu).unwrap();

        match restore_layout(&original, dense).unwrap() {
            SampleBoxes::Dense(restored) => {
                assert_eq!(restored.boxes.dtype(), DType::F64);
                assert_eq!(restored.labels.dtype(), DType::U32);
                assert_eq!(
                    restored.boxes.to_vec2::<f64>().unwrap(),
                    vec![vec![0.25, 0.5, 1.5, 2.0]]
                );
                assert_eq!(restored.labels.to_vec1::<u32>().unwrap(), vec![3]);
            }
            other => panic!("unexpected boxes {:?}", other),
        }
    }
}
