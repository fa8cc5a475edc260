// Copyright (c) 2025, Tom Ouellette
// Licensed under the MIT License

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AugmentError;

/// Coordinate layout of a bounding box
///
/// Absolute formats are in pixels. `rel_` formats are fractions of the image
/// height (y coordinates) and width (x coordinates).
///
/// # Examples
///
/// ```
/// use augment_core::im::BoundingBoxFormat;
///
/// let format: BoundingBoxFormat = "center_xywh".parse().unwrap();
/// let xyxy = format.to_xyxy([5., 5., 4., 2.], 10., 10.);
/// assert_eq!(xyxy, [3., 4., 7., 6.]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundingBoxFormat {
    Xyxy,
    Yxyx,
    Xywh,
    CenterXywh,
    CenterYxhw,
    RelXyxy,
    RelYxyx,
    RelXywh,
    RelCenterXywh,
}

impl BoundingBoxFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            BoundingBoxFormat::Xyxy => "xyxy",
            BoundingBoxFormat::Yxyx => "yxyx",
            BoundingBoxFormat::Xywh => "xywh",
            BoundingBoxFormat::CenterXywh => "center_xywh",
            BoundingBoxFormat::CenterYxhw => "center_yxhw",
            BoundingBoxFormat::RelXyxy => "rel_xyxy",
            BoundingBoxFormat::RelYxyx => "rel_yxyx",
            BoundingBoxFormat::RelXywh => "rel_xywh",
            BoundingBoxFormat::RelCenterXywh => "rel_center_xywh",
        }
    }

    /// Check if coordinates are fractions of the image size
    pub fn is_relative(&self) -> bool {
        matches!(
            self,
            BoundingBoxFormat::RelXyxy
                | BoundingBoxFormat::RelYxyx
                | BoundingBoxFormat::RelXywh
                | BoundingBoxFormat::RelCenterXywh
        )
    }

    /// Convert a box in this format to absolute xyxy pixel coordinates
    ///
    /// # Arguments
    ///
    /// * `b` - Box coordinates in this format
    /// * `height` - Height of the image the box belongs to
    /// * `width` - Width of the image the box belongs to
    pub fn to_xyxy(&self, b: [f32; 4], height: f32, width: f32) -> [f32; 4] {
        let [x1, y1, x2, y2] = match self {
            BoundingBoxFormat::Xyxy | BoundingBoxFormat::RelXyxy => b,
            BoundingBoxFormat::Yxyx | BoundingBoxFormat::RelYxyx => [b[1], b[0], b[3], b[2]],
            BoundingBoxFormat::Xywh | BoundingBoxFormat::RelXywh => {
                [b[0], b[1], b[0] + b[2], b[1] + b[3]]
            }
            BoundingBoxFormat::CenterXywh | BoundingBoxFormat::RelCenterXywh => [
                b[0] - b[2] / 2.,
                b[1] - b[3] / 2.,
                b[0] + b[2] / 2.,
                b[1] + b[3] / 2.,
            ],
            BoundingBoxFormat::CenterYxhw => [
                b[1] - b[3] / 2.,
                b[0] - b[2] / 2.,
                b[1] + b[3] / 2.,
                b[0] + b[2] / 2.,
            ],
        };

        if self.is_relative() {
            [x1 * width, y1 * height, x2 * width, y2 * height]
        } else {
            [x1, y1, x2, y2]
        }
    }

    /// Convert an absolute xyxy pixel box into this format
    ///
    /// # Arguments
    ///
    /// * `b` - Absolute xyxy coordinates
    /// * `height` - Height of the image the box belongs to
    /// * `width` - Width of the image the box belongs to
    pub fn from_xyxy(&self, b: [f32; 4], height: f32, width: f32) -> [f32; 4] {
        let [x1, y1, x2, y2] = if self.is_relative() {
            [b[0] / width, b[1] / height, b[2] / width, b[3] / height]
        } else {
            b
        };

        match self {
            BoundingBoxFormat::Xyxy | BoundingBoxFormat::RelXyxy => [x1, y1, x2, y2],
            BoundingBoxFormat::Yxyx | BoundingBoxFormat::RelYxyx => [y1, x1, y2, x2],
            BoundingBoxFormat::Xywh | BoundingBoxFormat::RelXywh => [x1, y1, x2 - x1, y2 - y1],
            BoundingBoxFormat::CenterXywh | BoundingBoxFormat::RelCenterXywh => [
                (x1 + x2) / 2.,
                (y1 + y2) / 2.,
                x2 - x1,
                y2 - y1,
            ],
            BoundingBoxFormat::CenterYxhw => [
                (y1 + y2) / 2.,
                (x1 + x2) / 2.,
                y2 - y1,
                x2 - x1,
            ],
        }
    }
}

impl FromStr for BoundingBoxFormat {
    type Err = AugmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "xyxy" => Ok(BoundingBoxFormat::Xyxy),
            "yxyx" => Ok(BoundingBoxFormat::Yxyx),
            "xywh" => Ok(BoundingBoxFormat::Xywh),
            "center_xywh" => Ok(BoundingBoxFormat::CenterXywh),
            "center_yxhw" => Ok(BoundingBoxFormat::CenterYxhw),
            "rel_xyxy" => Ok(BoundingBoxFormat::RelXyxy),
            "rel_yxyx" => Ok(BoundingBoxFormat::RelYxyx),
            "rel_xywh" => Ok(BoundingBoxFormat::RelXywh),
            "rel_center_xywh" => Ok(BoundingBoxFormat::RelCenterXywh),
            _ => Err(AugmentError::BoxesFormatError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod test {

    use super::*;
    use crate::constant::BOUNDING_BOX_FORMATS;

    #[test]
    fn test_parse_all_formats() {
        for name in BOUNDING_BOX_FORMATS {
            let format: BoundingBoxFormat = name.parse().unwrap();
            assert_eq!(format.as_str(), name);
        }

        assert!("xyzw".parse::<BoundingBoxFormat>().is_err());
    }

    #[test]
    fn test_to_xyxy() {
        let (h, w) = (20., 10.);
        let expected = [2., 4., 6., 12.];

        let cases = [
            (BoundingBoxFormat::Xyxy, [2., 4., 6., 12.]),
            (BoundingBoxFormat::Yxyx, [4., 2., 12., 6.]),
            (BoundingBoxFormat::Xywh, [2., 4., 4., 8.]),
            (BoundingBoxFormat::CenterXywh, [4., 8., 4., 8.]),
            (BoundingBoxFormat::CenterYxhw, [8., 4., 8., 4.]),
            (BoundingBoxFormat::RelXyxy, [0.2, 0.2, 0.6, 0.6]),
            (BoundingBoxFormat::RelYxyx, [0.2, 0.2, 0.6, 0.6]),
            (BoundingBoxFormat::RelXywh, [0.2, 0.2, 0.4, 0.4]),
            (BoundingBoxFormat::RelCenterXywh, [0.4, 0.4, 0.4, 0.4]),
        ];

        for (format, b) in cases {
            let xyxy = format.to_xyxy(b, h, w);
            for (a, e) in xyxy.iter().zip(expected) {
                assert!((a - e).abs() < 1e-5, "{:?}", format);
            }

            let back = format.from_xyxy(xyxy, h, w);
            for (a, e) in back.iter().zip(b) {
                assert!((a - e).abs() < 1e-5, "{:?}", format);
            }
        }
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&BoundingBoxFormat::RelCenterXywh).unwrap();
        assert_eq!(json, "\"rel_center_xywh\"");
    }
}
