// Copyright (c) 2025, Tom Ouellette
// Licensed under the MIT License

use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use augment_core::constant::{DATA_FORMATS, FACTOR_BOUNDS};

use crate::error::{LayerError, Result};

/// Position of the channel axis in image tensors
///
/// # Examples
///
/// ```
/// use augment_layers::config::DataFormat;
///
/// let format: DataFormat = "channels_first".parse().unwrap();
/// assert_eq!(format.height_axis(4), 2);
/// assert_eq!(format.width_axis(4), 3);
/// assert_eq!(DataFormat::default().height_axis(3), 0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataFormat {
    ChannelsFirst,
    #[default]
    ChannelsLast,
}

impl DataFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataFormat::ChannelsFirst => "channels_first",
            DataFormat::ChannelsLast => "channels_last",
        }
    }

    /// Index of the height axis for a rank 3 or rank 4 tensor
    pub fn height_axis(&self, rank: usize) -> usize {
        let batch = rank.saturating_sub(3);
        match self {
            DataFormat::ChannelsFirst => batch + 1,
            DataFormat::ChannelsLast => batch,
        }
    }

    /// Index of the width axis for a rank 3 or rank 4 tensor
    pub fn width_axis(&self, rank: usize) -> usize {
        self.height_axis(rank) + 1
    }

    /// Index of the channel axis for a rank 3 or rank 4 tensor
    pub fn channel_axis(&self, rank: usize) -> usize {
        match self {
            DataFormat::ChannelsFirst => rank.saturating_sub(3),
            DataFormat::ChannelsLast => rank.saturating_sub(1),
        }
    }
}

impl FromStr for DataFormat {
    type Err = LayerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "channels_first" => Ok(DataFormat::ChannelsFirst),
            "channels_last" => Ok(DataFormat::ChannelsLast),
            _ => Err(LayerError::ConfigurationError(format!(
                "Unknown data format '{}'. Expected one of: {}.",
                s,
                DATA_FORMATS.join(", ")
            ))),
        }
    }
}

/// The interval a stochastic layer draws its strength from
///
/// A scalar `factor` becomes `[max(-|factor|, -1), |factor|]`. Both ends
/// always lie within `[-1, 1]`.
///
/// # Examples
///
/// ```
/// use augment_layers::config::Factor;
///
/// let factor = Factor::new(-0.3).unwrap();
/// assert_eq!((factor.lower(), factor.upper()), (-0.3, 0.3));
///
/// let factor = Factor::range(0.5, 0.1).unwrap();
/// assert_eq!((factor.lower(), factor.upper()), (0.1, 0.5));
///
/// assert!(Factor::new(1.5).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Factor {
    lower: f64,
    upper: f64,
}

fn check_bounds(value: f64) -> Result<f64> {
    let (min, max) = FACTOR_BOUNDS;
    if !value.is_finite() || value < min || value > max {
        return Err(LayerError::ConfigurationError(format!(
            "Factor values must lie within [{}, {}], received {}.",
            min, max, value
        )));
    }

    Ok(value)
}

impl Factor {
    /// Derive a symmetric interval from a single scalar
    ///
    /// # Arguments
    ///
    /// * `factor` - A value in [-1, 1]; only its magnitude is used
    pub fn new(factor: f64) -> Result<Factor> {
        let factor = check_bounds(factor)?.abs();

        Ok(Factor {
            lower: (-factor).max(FACTOR_BOUNDS.0),
            upper: factor,
        })
    }

    /// Use an explicit interval; the ends may be given in any order
    ///
    /// # Arguments
    ///
    /// * `a` - One end of the interval in [-1, 1]
    /// * `b` - Other end of the interval in [-1, 1]
    pub fn range(a: f64, b: f64) -> Result<Factor> {
        let (a, b) = (check_bounds(a)?, check_bounds(b)?);

        Ok(Factor {
            lower: a.min(b),
            upper: a.max(b),
        })
    }

    pub fn lower(&self) -> f64 {
        self.lower
    }

    pub fn upper(&self) -> f64 {
        self.upper
    }

    /// Draw a value uniformly from the interval
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        if self.lower == self.upper {
            return self.lower;
        }

        rng.gen_range(self.lower..=self.upper)
    }
}

impl TryFrom<f64> for Factor {
    type Error = LayerError;

    fn try_from(factor: f64) -> Result<Self> {
        Factor::new(factor)
    }
}

impl TryFrom<(f64, f64)> for Factor {
    type Error = LayerError;

    fn try_from((a, b): (f64, f64)) -> Result<Self> {
        Factor::range(a, b)
    }
}

#[cfg(test)]
mod test {

    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_factor_interval_properties() {
        for i in -100..=100 {
            let value = i as f64 / 100.0;
            let factor = Factor::new(value).unwrap();

            assert!(factor.lower() <= 0.0 && 0.0 <= factor.upper());
            assert!(factor.lower() >= -1.0 && factor.upper() <= 1.0);
            assert_eq!(factor.lower(), (-value.abs()).max(-1.0));
            assert_eq!(factor.upper(), value.abs());
        }
    }

    #[test]
    fn test_factor_out_of_bounds() {
        for value in [-1.01, 1.01, 3.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                Factor::new(value),
                Err(LayerError::ConfigurationError(_))
            ));
        }

        assert!(Factor::range(-0.5, 1.2).is_err());
    }

    #[test]
    fn test_factor_sample_within_interval() {
        let factor = Factor::range(-0.2, 0.4).unwrap();
        let mut rng = StdRng::seed_from_u64(0);

        for _ in 0..1000 {
            let value = factor.sample(&mut rng);
            assert!((-0.2..=0.4).contains(&value));
        }

        let zero = Factor::new(0.0).unwrap();
        assert_eq!(zero.sample(&mut rng), 0.0);
    }

    #[test]
    fn test_data_format_axes() {
        let last = DataFormat::ChannelsLast;
        assert_eq!((last.height_axis(3), last.width_axis(3), last.channel_axis(3)), (0, 1, 2));
        assert_eq!((last.height_axis(4), last.width_axis(4), last.channel_axis(4)), (1, 2, 3));

        let first = DataFormat::ChannelsFirst;
        assert_eq!((first.height_axis(3), first.width_axis(3), first.channel_axis(3)), (1, 2, 0));
        assert_eq!((first.height_axis(4), first.width_axis(4), first.channel_axis(4)), (2, 3, 1));
    }

    #[test]
    fn test_data_format_parse() {
        assert_eq!("CHANNELS_LAST".parse::<DataFormat>().unwrap(), DataFormat::ChannelsLast);
        assert!(matches!(
            "channels_middle".parse::<DataFormat>(),
            Err(LayerError::ConfigurationError(_))
        ));
    }
}
