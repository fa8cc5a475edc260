// Copyright (c) 2025, Tom Ouellette
// Licensed under the MIT License

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use candle_core::Device;
use clap::Args;
use futures::stream::{self, StreamExt};
use kdam::BarExt;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::iter::{IntoParallelIterator, ParallelIterator};

use augment_core::constant;
use augment_core::cv::{FillMode, Interpolation};
use augment_core::error::AugmentError;
use augment_core::im::{BoundingBoxFormat, BoundingBoxes, ImageArray};
use augment_core::ut;

use augment_layers::config::{DataFormat, Factor};
use augment_layers::error::LayerError;
use augment_layers::layers::{ImagePreprocessingLayer, RandomBrightness, Resize, ResizeConfig};
use augment_layers::sample::{Modalities, Sample, SampleBoxes};
use augment_layers::tensor::{from_image_array, to_image_array};

#[derive(Debug, Args)]
#[command(about = "Resize images with their masks and bounding boxes to a fixed size.")]
pub struct ResizeArgs {
    #[arg(short = 'i', long, help = "Image directory.", required = true)]
    pub images: Option<String>,

    #[arg(short = 'm', long, help = "Segmentation mask directory.")]
    pub masks: Option<String>,

    #[arg(short = 'b', long, help = "Bounding boxes directory (json).")]
    pub boxes: Option<String>,

    #[arg(short = 'o', long, help = "Output directory.", required = true)]
    pub output: Option<String>,

    #[arg(long, help = "Output height.", required = true)]
    pub height: Option<usize>,

    #[arg(long, help = "Output width.", required = true)]
    pub width: Option<usize>,

    #[arg(
        long,
        help = "Interpolation (nearest, bilinear, bicubic, lanczos3, lanczos5, area).",
        default_value = "bilinear"
    )]
    pub interpolation: Option<String>,

    #[arg(long, help = "Crop to the output aspect ratio before resizing.")]
    pub crop_to_aspect_ratio: bool,

    #[arg(long, help = "Pad to the output aspect ratio before resizing.")]
    pub pad_to_aspect_ratio: bool,

    #[arg(
        long,
        help = "Fill mode for padded pixels (constant, nearest, reflect, wrap).",
        default_value = "constant"
    )]
    pub fill_mode: Option<String>,

    #[arg(long, help = "Value of padded pixels in constant fill mode.", default_value = "0")]
    pub fill_value: Option<f64>,

    #[arg(long, help = "Label of padded mask pixels.", default_value = "0")]
    pub mask_fill_value: Option<i64>,

    #[arg(long, help = "Widen the filter when downsampling.")]
    pub antialias: bool,

    #[arg(
        short = 'f',
        long,
        help = "Bounding box format (e.g. xyxy, xywh, center_xywh, rel_xyxy)."
    )]
    pub bounding_box_format: Option<String>,

    #[arg(long, help = "Random brightness factor in [-1, 1] applied after resizing.")]
    pub brightness: Option<f64>,

    #[arg(
        long,
        help = "Maximum pixel value used to scale and clamp random brightness.",
        default_value = "255"
    )]
    pub max_value: Option<f64>,

    #[arg(long, help = "Seed for random brightness.")]
    pub seed: Option<u64>,

    #[arg(long, help = "Substring specifying images (e.g. _image).")]
    pub image_substring: Option<String>,

    #[arg(long, help = "Substring specifying masks (e.g. _mask).")]
    pub mask_substring: Option<String>,

    #[arg(long, help = "Substring specifying boxes (e.g. _boxes).")]
    pub box_substring: Option<String>,

    #[arg(
        short = 'e',
        long,
        help = "Format to save images and masks (e.g. png, tiff, npy). Defaults to the input format."
    )]
    pub image_format: Option<String>,

    #[arg(short = 't', long, help = "Number of threads.")]
    pub threads: Option<usize>,

    #[arg(short = 'v', long, help = "Verbose output.")]
    pub verbose: bool,
}

/// Print an error and stop
fn exit_with(message: impl std::fmt::Display) -> ! {
    eprintln!("{}", message);
    std::process::exit(1);
}

/// Collect files of one modality or exit if none are found
fn collect_or_exit(directory: &str, valid_ext: &[&str], substring: Option<&str>, name: &str) -> Vec<PathBuf> {
    let files = ut::path::collect_file_paths(directory, valid_ext, substring)
        .unwrap_or_else(|err| exit_with(err));

    if files.is_empty() {
        exit_with(format!(
            "[augment::resize] ERROR: No {} files were detected. Please check your path and/or substring identifier.",
            name
        ));
    }

    files
}

/// Parse a string tag or exit with a configuration error
fn parse_or_exit<T>(tag: &str) -> T
where
    T: std::str::FromStr<Err = AugmentError>,
{
    tag.parse()
        .unwrap_or_else(|err: AugmentError| exit_with(LayerError::ConfigurationError(err.to_string())))
}

pub fn resize(args: &ResizeArgs) {
    let threads = if let Some(t) = args.threads {
        t
    } else {
        std::thread::available_parallelism().unwrap_or_else(|_| {
            exit_with("[augment::resize] Could not automatically assign number of tasks. Please manually set the --threads (-t) argument.")
        }).get()
    };

    if let Some(format) = &args.image_format {
        if !constant::SUPPORTED_IMAGE_FORMATS.contains(&format.as_str()) {
            exit_with(format!(
                "[augment::resize] ERROR: Invalid image_format {}. Must be one of: {:?}.",
                format,
                constant::SUPPORTED_IMAGE_FORMATS
            ));
        }
    }

    let bounding_box_format: Option<BoundingBoxFormat> =
        args.bounding_box_format.as_deref().map(parse_or_exit::<BoundingBoxFormat>);

    if args.boxes.is_some() && bounding_box_format.is_none() {
        exit_with(LayerError::UsageError(
            "Bounding boxes were provided without a --bounding-box-format.".to_string(),
        ));
    }

    let config = ResizeConfig {
        height: args.height.unwrap_or(0),
        width: args.width.unwrap_or(0),
        interpolation: parse_or_exit::<Interpolation>(args.interpolation.as_deref().unwrap_or("bilinear")),
        crop_to_aspect_ratio: args.crop_to_aspect_ratio,
        pad_to_aspect_ratio: args.pad_to_aspect_ratio,
        fill_mode: parse_or_exit::<FillMode>(args.fill_mode.as_deref().unwrap_or("constant")),
        fill_value: args.fill_value.unwrap_or(0.0),
        mask_fill_value: args.mask_fill_value.unwrap_or(0),
        antialias: args.antialias,
        data_format: DataFormat::ChannelsLast,
        bounding_box_format,
        seed: args.seed,
    };

    let layer = Resize::new(config).unwrap_or_else(|err| exit_with(err));

    let brightness = args.brightness.map(|factor| {
        Factor::new(factor)
            .and_then(|factor| RandomBrightness::new(factor, (0.0, args.max_value.unwrap_or(255.0)), None))
            .map(|layer| match bounding_box_format {
                Some(format) => layer.with_bounding_box_format(format),
                None => layer,
            })
            .unwrap_or_else(|err| exit_with(err))
    });

    let image_path = args.images.to_owned().unwrap_or_default();

    let image_files = collect_or_exit(
        &image_path,
        constant::SUPPORTED_IMAGE_FORMATS.as_slice(),
        args.image_substring.as_deref(),
        "image",
    );

    let masks = args.masks.as_deref().map(|path| {
        let files = collect_or_exit(
            path,
            constant::SUPPORTED_IMAGE_FORMATS.as_slice(),
            args.mask_substring.as_deref(),
            "mask",
        );
        ut::path::index_by_key(&files, args.mask_substring.as_deref())
    });

    let boxes = args.boxes.as_deref().map(|path| {
        let files = collect_or_exit(
            path,
            constant::SUPPORTED_ARRAY_FORMATS.as_slice(),
            args.box_substring.as_deref(),
            "bounding box",
        );
        ut::path::index_by_key(&files, args.box_substring.as_deref())
    });

    ut::track::progress_log(
        &format!(
            "Detected {} images to resize to {} x {}.",
            ut::track::thousands_format(image_files.len()),
            layer.config().height,
            layer.config().width,
        ),
        args.verbose,
    );

    let output = ut::path::create_directory(args.output.to_owned().unwrap_or_default())
        .unwrap_or_else(|err| exit_with(err));

    for (name, enabled) in [
        ("images", true),
        ("masks", masks.is_some()),
        ("boxes", boxes.is_some()),
    ] {
        if enabled {
            ut::path::create_directory(output.join(name)).unwrap_or_else(|err| exit_with(err));
        }
    }

    layer
        .save_config(output.join("resize_config.json"))
        .unwrap_or_else(|err| exit_with(err));

    let jobs: Vec<Job> = image_files
        .into_iter()
        .enumerate()
        .map(|(index, image)| {
            let id = ut::path::file_key(&image, args.image_substring.as_deref())
                .unwrap_or_else(|| index.to_string());

            Job {
                mask: masks.as_ref().map(|files| files.get(&id).cloned()),
                boxes: boxes.as_ref().map(|files| files.get(&id).cloned()),
                seed: args.seed.map(|seed| seed.wrapping_add(index as u64)),
                id,
                image,
            }
        })
        .collect();

    let context = Arc::new(Context {
        layer,
        brightness,
        output: output.clone(),
        image_format: args.image_format.to_owned(),
    });

    let rt = tokio::runtime::Runtime::new().unwrap_or_else(|err| exit_with(err));
    let results = rt.block_on(run_all(jobs, context, threads, args.verbose));

    let success: Mutex<usize> = Mutex::new(0);
    let failure: Mutex<Vec<String>> = Mutex::new(Vec::with_capacity(results.len()));

    results.into_par_iter().for_each(|(id, run)| match run {
        Ok(()) => {
            if let Ok(mut success) = success.lock() {
                *success += 1;
            }
        }
        Err(err) => {
            if let Ok(mut failure) = failure.lock() {
                failure.push(format!("{}\t{}", id, err));
            }
        }
    });

    let success = success.into_inner().unwrap_or_default();
    let failure = failure.into_inner().unwrap_or_default();

    if args.verbose {
        println!();
    }

    ut::track::progress_log(
        &format!(
            "Complete. {} images resized.",
            ut::track::thousands_format(success)
        ),
        args.verbose,
    );

    if !failure.is_empty() {
        ut::track::progress_warn(&format!(
            "{} images failed. See resize_errors.tsv for details.",
            ut::track::thousands_format(failure.len())
        ));

        std::fs::write(output.join("resize_errors.tsv"), failure.join("\n"))
            .unwrap_or_else(|err| exit_with(err));
    }
}

/// One image with its optional partner files
///
/// `mask` and `boxes` are `None` when that modality is not requested and
/// `Some(None)` when it is requested but no partner file was found.
struct Job {
    id: String,
    image: PathBuf,
    mask: Option<Option<PathBuf>>,
    boxes: Option<Option<PathBuf>>,
    seed: Option<u64>,
}

/// Layers and output settings shared by every job
struct Context {
    layer: Resize,
    brightness: Option<RandomBrightness>,
    output: PathBuf,
    image_format: Option<String>,
}

impl Context {
    fn output_path(&self, directory: &str, source: &Path) -> PathBuf {
        let stem = source
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();

        let extension = match &self.image_format {
            Some(format) => format.clone(),
            None => source
                .extension()
                .map(|ext| ext.to_string_lossy().to_lowercase())
                .unwrap_or_else(|| "png".to_string()),
        };

        self.output
            .join(directory)
            .join(format!("{}.{}", stem, extension))
    }
}

fn require(path: &Option<PathBuf>, modality: &str, id: &str) -> Result<PathBuf, LayerError> {
    path.clone().ok_or_else(|| {
        AugmentError::NoFileError(format!("No {} file matches image {}", modality, id)).into()
    })
}

/// Resize one image and its partner files then write them to the output
fn resize_one(job: &Job, context: &Context) -> Result<(), LayerError> {
    let format = DataFormat::ChannelsLast;
    let device = Device::Cpu;

    let image = ImageArray::open(&job.image)?;
    let mut modalities = Modalities::new(from_image_array(&image, format, &device)?);

    let mask = match &job.mask {
        Some(path) => {
            let path = require(path, "mask", &job.id)?;
            let mask = ImageArray::open(&path)?;
            modalities = modalities.with_segmentation_masks(from_image_array(&mask, format, &device)?);
            Some((path, mask))
        }
        None => None,
    };

    let boxes_path = match &job.boxes {
        Some(path) => {
            let path = require(path, "bounding box", &job.id)?;
            modalities = modalities.with_bounding_boxes(SampleBoxes::List(BoundingBoxes::open(&path)?));
            Some(path)
        }
        None => None,
    };

    let mut sample = context.layer.apply(&Sample::Modalities(modalities), false)?;

    if let Some(brightness) = &context.brightness {
        let mut rng = match job.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        sample = brightness.apply_with_rng(&sample, true, &mut rng)?;
    }

    let Sample::Modalities(modalities) = sample else {
        return Err(LayerError::UsageError("Expected named modalities.".to_string()));
    };

    to_image_array(&modalities.images, format)?
        .cast_like(&image)?
        .save(context.output_path("images", &job.image))?;

    if let (Some((path, mask)), Some(resized)) = (mask, &modalities.segmentation_masks) {
        to_image_array(resized, format)?
            .cast_like(&mask)?
            .save(context.output_path("masks", &path))?;
    }

    if let (Some(path), Some(SampleBoxes::List(boxes))) = (boxes_path, &modalities.bounding_boxes) {
        let name = path.file_name().map(PathBuf::from).unwrap_or_default();
        boxes.save(context.output.join("boxes").join(name))?;
    }

    Ok(())
}

async fn run_all(
    jobs: Vec<Job>,
    context: Arc<Context>,
    threads: usize,
    verbose: bool,
) -> Vec<(String, Result<(), LayerError>)> {
    let pb = Arc::new(Mutex::new(ut::track::progress_bar(
        jobs.len(),
        "Resizing",
        verbose,
    )));

    stream::iter(jobs)
        .map(|job| {
            let context = context.clone();
            let pb_clone = pb.clone();

            async move {
                let id = job.id.clone();
                let result = tokio::task::spawn_blocking(move || resize_one(&job, &context))
                    .await
                    .unwrap_or_else(|_| {
                        Err(AugmentError::OtherError("Failed to resize image.".to_string()).into())
                    });

                if verbose {
                    if let Ok(mut pb) = pb_clone.lock() {
                        let _ = pb.update(1);
                    }
                }

                (id, result)
            }
        })
        .buffer_unordered(threads.max(1))
        .collect::<Vec<_>>()
        .await
}

#[cfg(test)]
mod test {

    use super::*;

    fn context(image_format: Option<&str>) -> Context {
        Context {
            layer: Resize::new(ResizeConfig::new(2, 2)).unwrap(),
            brightness: None,
            output: PathBuf::from("out"),
            image_format: image_format.map(String::from),
        }
    }

    #[test]
    fn test_output_path_keeps_extension() {
        let path = context(None).output_path("images", Path::new("data/a_image.TIF"));
        assert_eq!(path, PathBuf::from("out/images/a_image.tif"));
    }

    #[test]
    fn test_output_path_custom_format() {
        let path = context(Some("npy")).output_path("masks", Path::new("data/a_mask.png"));
        assert_eq!(path, PathBuf::from("out/masks/a_mask.npy"));
    }

    #[test]
    fn test_missing_partner_is_error() {
        let job = Job {
            id: "a".to_string(),
            image: PathBuf::from("TEST_DOES_NOT_EXIST.png"),
            mask: Some(None),
            boxes: None,
            seed: None,
        };

        assert!(resize_one(&job, &context(None)).is_err());
        assert!(require(&None, "mask", "a").is_err());
    }
}
