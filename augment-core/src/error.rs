// Copyright (c) 2025, Tom Ouellette
// Licensed under the MIT License

use std::fmt;

use crate::constant::{BOUNDING_BOX_FORMATS, FILL_MODES, INTERPOLATIONS};

#[derive(Debug, Clone)]
pub enum AugmentError {
    BufferSizeError,
    ImageError(&'static str),
    ImageReadError,
    ImageWriteError,
    ImageExtensionError,
    BoxesSizeError,
    BoxesReadError,
    BoxesWriteError,
    BoxesFormatError(String),
    InterpolationError(String),
    FillModeError(String),
    NoFileError(String),
    DirError(String),
    OtherError(String),
}

impl fmt::Display for AugmentError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AugmentError::BufferSizeError => {
                write!(
                    f,
                    "[augment::BufferSizeError] The buffer does not match provided size"
                )
            }
            AugmentError::ImageError(message) => {
                write!(f, "[augment::ImageError] Failed to create image. {}", message)
            }
            AugmentError::ImageReadError => {
                write!(f, "[augment::ImageReadError] Failed to read image.")
            }
            AugmentError::ImageWriteError => {
                write!(f, "[augment::ImageWriteError] Failed to write image.")
            }
            AugmentError::ImageExtensionError => {
                write!(
                    f,
                    "[augment::ImageExtensionError] Could not detect a valid image extension for input."
                )
            }
            AugmentError::BoxesSizeError => {
                write!(
                    f,
                    "[augment::BoxesSizeError] Every bounding box must have a class label and every label a bounding box."
                )
            }
            AugmentError::BoxesReadError => {
                write!(
                    f,
                    "[augment::BoxesReadError] Bounding boxes could not be read."
                )
            }
            AugmentError::BoxesWriteError => {
                write!(
                    f,
                    "[augment::BoxesWriteError] Failed to successfully write bounding boxes to output."
                )
            }
            AugmentError::BoxesFormatError(format) => {
                write!(
                    f,
                    "[augment::BoxesFormatError] Unknown bounding box format '{}'. Expected one of: {}.",
                    format,
                    BOUNDING_BOX_FORMATS.join(", ")
                )
            }
            AugmentError::InterpolationError(interpolation) => {
                write!(
                    f,
                    "[augment::InterpolationError] Unknown interpolation '{}'. Expected one of: {}.",
                    interpolation,
                    INTERPOLATIONS.join(", ")
                )
            }
            AugmentError::FillModeError(fill_mode) => {
                write!(
                    f,
                    "[augment::FillModeError] Unknown fill mode '{}'. Expected one of: {}.",
                    fill_mode,
                    FILL_MODES.join(", ")
                )
            }
            AugmentError::NoFileError(message) => {
                write!(
                    f,
                    "[augment::NoFileError] File could not be found. {}.",
                    message
                )
            }
            AugmentError::DirError(message) => {
                write!(
                    f,
                    "[augment::DirError] Directory could not be read. {}.",
                    message
                )
            }
            AugmentError::OtherError(message) => {
                write!(f, "[augment::OtherError] Error: {}.", message)
            }
        }
    }
}

impl std::error::Error for AugmentError {}
