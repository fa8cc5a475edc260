// Copyright (c) 2025, Tom Ouellette
// Licensed under the MIT License

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::AugmentError;

/// Create a directory (and parents) if it does not already exist
pub fn create_directory<P: AsRef<Path>>(directory: P) -> Result<PathBuf, AugmentError> {
    let directory = directory.as_ref();

    if !directory.exists() {
        std::fs::create_dir_all(directory).map_err(|err| AugmentError::DirError(err.to_string()))?;
    } else if !directory.is_dir() {
        return Err(AugmentError::DirError(format!(
            "{} exists and is not a directory",
            directory.display()
        )));
    }

    Ok(directory.to_path_buf())
}

/// Collect sorted file paths from a directory with an optional substring filter
///
/// # Arguments
///
/// * `directory` - Path to directory containing files
/// * `valid_ext` - Lowercase extensions to keep
/// * `substring` - Only include files containing this substring
///
/// # Examples
///
/// ```no_run
/// use augment_core::ut::path::collect_file_paths;
/// use augment_core::constant::SUPPORTED_IMAGE_FORMATS;
/// let files = collect_file_paths("directory/", SUPPORTED_IMAGE_FORMATS.as_slice(), None);
/// ```
pub fn collect_file_paths<P: AsRef<Path>>(
    directory: P,
    valid_ext: &[&str],
    substring: Option<&str>,
) -> Result<Vec<PathBuf>, AugmentError> {
    let directory = directory.as_ref();

    let mut files: Vec<PathBuf> = std::fs::read_dir(directory)
        .map_err(|err| AugmentError::DirError(format!("{}: {}", directory.display(), err)))?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| valid_ext.contains(&ext.to_lowercase().as_str()))
        })
        .filter(|path| match substring {
            Some(substring) => path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.contains(substring)),
            None => true,
        })
        .collect();

    files.sort();

    Ok(files)
}

/// The file stem with an identifying substring removed
///
/// Files that belong together (e.g. `id_1_image.png` and `id_1_mask.png`)
/// share the same key once their substrings are removed.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use augment_core::ut::path::file_key;
///
/// assert_eq!(file_key(Path::new("dir/id_1_mask.png"), Some("_mask")), Some("id_1".to_string()));
/// assert_eq!(file_key(Path::new("dir/id_1.png"), None), Some("id_1".to_string()));
/// ```
pub fn file_key(path: &Path, substring: Option<&str>) -> Option<String> {
    path.file_stem().map(|stem| {
        let stem = stem.to_string_lossy();
        match substring {
            Some(substring) => stem.replace(substring, ""),
            None => stem.into_owned(),
        }
    })
}

/// Index files by their key for lookup of partner files
pub fn index_by_key(files: &[PathBuf], substring: Option<&str>) -> HashMap<String, PathBuf> {
    files
        .iter()
        .filter_map(|file| file_key(file, substring).map(|key| (key, file.clone())))
        .collect()
}

#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn test_index_by_key() {
        let files = [
            PathBuf::from("directory/id_1_mask.png"),
            PathBuf::from("directory/id_2_mask.png"),
        ];

        let index = index_by_key(&files, Some("_mask"));
        assert_eq!(index.len(), 2);
        assert_eq!(index["id_2"], PathBuf::from("directory/id_2_mask.png"));
    }

    #[test]
    fn test_collect_file_paths() {
        const DIR: &str = "TEST_COLLECT_FILE_PATHS";

        create_directory(DIR).unwrap();
        std::fs::write(Path::new(DIR).join("b_image.png"), b"").unwrap();
        std::fs::write(Path::new(DIR).join("a_image.PNG"), b"").unwrap();
        std::fs::write(Path::new(DIR).join("a_mask.png"), b"").unwrap();
        std::fs::write(Path::new(DIR).join("notes.txt"), b"").unwrap();

        let files = collect_file_paths(DIR, &["png"], Some("_image")).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("a_image.PNG"));

        let files = collect_file_paths(DIR, &["png"], None).unwrap();
        assert_eq!(files.len(), 3);

        std::fs::remove_dir_all(DIR).unwrap();
    }

    #[test]
    fn test_collect_missing_directory() {
        assert!(collect_file_paths("TEST_DOES_NOT_EXIST", &["png"], None).is_err());
    }
}
