// Copyright (c) 2025, Tom Ouellette
// Licensed under the BSD 3-Clause License

use std::path::Path;

use npyz::{self, NpyFile, WriterBuilder};

use crate::error::AugmentError;

/// Write a numpy file from a vector of specified shape
///
/// # Arguments
///
/// * `path` - Path to output numpy file
/// * `data` - Vector of numeric type
/// * `shape` - Shape of the vector (shape product must equal length of data)
pub fn write_numpy<T, P: AsRef<Path>>(
    path: P,
    data: Vec<T>,
    shape: Vec<u64>,
) -> Result<(), AugmentError>
where
    T: npyz::Serialize + npyz::AutoSerialize,
{
    if shape.iter().product::<u64>() != data.len() as u64 {
        return Err(AugmentError::BufferSizeError);
    }

    let mut buffer = vec![];
    let mut writer = npyz::WriteOptions::<T>::new()
        .default_dtype()
        .shape(&shape)
        .writer(&mut buffer)
        .begin_nd()
        .map_err(|_| AugmentError::ImageWriteError)?;

    for d in data {
        writer.push(&d).map_err(|_| AugmentError::ImageWriteError)?;
    }

    writer.finish().map_err(|_| AugmentError::ImageWriteError)?;
    std::fs::write(path, buffer).map_err(|_| AugmentError::ImageWriteError)?;
    Ok(())
}

/// Read the raw bytes of a numpy file
///
/// The returned bytes are parsed with `npyz::NpyFile::new`; the caller picks
/// the element type from the header.
///
/// # Arguments
///
/// * `path` - Path to a .npy file
pub fn read_numpy<P: AsRef<Path>>(path: P) -> Result<Vec<u8>, AugmentError> {
    let bytes = std::fs::read(&path).map_err(|err| AugmentError::NoFileError(err.to_string()))?;

    // Validate the header before handing the bytes back
    NpyFile::new(&bytes[..]).map_err(|_| AugmentError::ImageReadError)?;

    Ok(bytes)
}
