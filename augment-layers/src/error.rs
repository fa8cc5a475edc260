// Copyright (c) 2025, Tom Ouellette
// Licensed under the MIT License

use std::fmt;

use augment_core::error::AugmentError;

pub type Result<T> = std::result::Result<T, LayerError>;

#[derive(Debug)]
pub enum LayerError {
    ConfigurationError(String),
    UsageError(String),
    ShapeError(String),
    TensorError(candle_core::Error),
    CoreError(AugmentError),
}

impl fmt::Display for LayerError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LayerError::ConfigurationError(message) => {
                write!(
                    f,
                    "[augment::ConfigurationError] Invalid layer configuration. {}",
                    message
                )
            }
            LayerError::UsageError(message) => {
                write!(
                    f,
                    "[augment::UsageError] Layer was called with invalid inputs. {}",
                    message
                )
            }
            LayerError::ShapeError(message) => {
                write!(
                    f,
                    "[augment::ShapeError] Inconsistent shapes between modalities. {}",
                    message
                )
            }
            LayerError::TensorError(err) => {
                write!(f, "[augment::TensorError] {}", err)
            }
            LayerError::CoreError(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for LayerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LayerError::TensorError(err) => Some(err),
            LayerError::CoreError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<candle_core::Error> for LayerError {
    fn from(err: candle_core::Error) -> Self {
        LayerError::TensorError(err)
    }
}

impl From<AugmentError> for LayerError {
    fn from(err: AugmentError) -> Self {
        LayerError::CoreError(err)
    }
}
