//! Batch processing: one recipe applied to a directory of images.
//!
//! Inputs are collected recursively (supported extensions only) and each
//! image runs through the recipe in its own [`ImageHandle`]. Results are
//! mirrored into the output directory under the same relative path.
//!
//! ## Output Structure
//!
//! ```text
//! out/
//! ├── manifest.json          # BatchReport: processed + failed images
//! ├── cover.jpg
//! └── 2024/
//!     └── beach.png
//! ```
//!
//! ## Parallel Processing
//!
//! Images are processed in parallel using [rayon](https://docs.rs/rayon). A
//! failing image is recorded in the report and does not stop the others.

use crate::config::ImgConfig;
use crate::imaging::{
    ImageBackend, ImageError, ImageHandle, Quality, ResizeMode, WatermarkAnchor, WatermarkOptions,
    supported_input_extensions,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, instrument, warn};
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Source directory not found: {}", .0.display())]
    SourceNotFound(PathBuf),
    #[error("The batch recipe has no steps")]
    EmptyRecipe,
}

/// One operation of a batch recipe, tagged by `op` in `config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case", deny_unknown_fields)]
pub enum Step {
    Resize {
        width: Option<u32>,
        height: Option<u32>,
        #[serde(default)]
        mode: ResizeMode,
    },
    Crop {
        #[serde(default)]
        x: i64,
        #[serde(default)]
        y: i64,
        width: Option<u32>,
        height: Option<u32>,
    },
    CropFromCenter {
        width: u32,
        height: u32,
    },
    Watermark {
        path: PathBuf,
        anchor: Option<WatermarkAnchor>,
        width: Option<u32>,
        height: Option<u32>,
        offset: Option<i64>,
    },
}

fn is_given(value: Option<u32>) -> bool {
    value.is_some_and(|v| v > 0)
}

impl Step {
    /// Reject steps that could never succeed, before any image is opened.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::Resize { width, height, .. } | Self::Crop { width, height, .. } => {
                if !is_given(*width) && !is_given(*height) {
                    return Err("at least one of width and height is required".into());
                }
            }
            Self::CropFromCenter { width, height } => {
                if *width == 0 || *height == 0 {
                    return Err("width and height must be non-zero".into());
                }
            }
            Self::Watermark { path, .. } => {
                if path.as_os_str().is_empty() {
                    return Err("watermark path must not be empty".into());
                }
            }
        }
        Ok(())
    }

    /// Run this step against `handle`. Watermark steps fall back to the
    /// recipe's anchor and offset.
    pub fn apply<B: ImageBackend>(
        &self,
        handle: &mut ImageHandle<'_, B>,
        recipe: &Recipe,
    ) -> Result<(), ImageError> {
        match self {
            Self::Resize {
                width,
                height,
                mode,
            } => handle.resize(*width, *height, *mode),
            Self::Crop {
                x,
                y,
                width,
                height,
            } => handle.crop(*x, *y, *width, *height),
            Self::CropFromCenter { width, height } => handle.crop_from_center(*width, *height),
            Self::Watermark {
                path,
                anchor,
                width,
                height,
                offset,
            } => {
                let anchor = anchor.as_ref().unwrap_or(&recipe.anchor);
                let options = offset
                    .map(|offset| WatermarkOptions { offset })
                    .unwrap_or(recipe.watermark);
                handle.watermark(path, anchor, *width, *height, options)
            }
        }
    }
}

/// Everything a worker needs to turn one input into one output.
#[derive(Debug, Clone)]
pub struct Recipe {
    pub steps: Vec<Step>,
    pub quality: Quality,
    pub anchor: WatermarkAnchor,
    pub watermark: WatermarkOptions,
}

impl Recipe {
    pub fn from_config(config: &ImgConfig) -> Self {
        Self {
            steps: config.batch.steps.clone(),
            quality: config.quality(),
            anchor: config.watermark.anchor.clone(),
            watermark: config.watermark_options(),
        }
    }
}

/// Outcome of a batch run, written as `manifest.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub processed: Vec<ProcessedImage>,
    pub failed: Vec<FailedImage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedImage {
    pub source: PathBuf,
    pub output: PathBuf,
    pub format: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedImage {
    pub source: PathBuf,
    pub error: String,
}

/// Recursively collect supported images under `source`, sorted by path.
///
/// The `skip` directory is not descended into, so an output directory
/// nested inside the source never feeds earlier results back in.
pub fn collect_inputs(source: &Path, skip: Option<&Path>) -> Result<Vec<PathBuf>, BatchError> {
    if !source.is_dir() {
        return Err(BatchError::SourceNotFound(source.to_path_buf()));
    }

    let skip = skip.map(|dir| dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf()));
    let is_skipped = |entry: &walkdir::DirEntry| {
        let Some(skip) = skip.as_deref() else {
            return false;
        };
        entry.file_type().is_dir()
            && (entry.path() == skip
                || entry.path().canonicalize().is_ok_and(|dir| dir == skip))
    };

    let extensions = supported_input_extensions();
    let mut inputs = Vec::new();
    for entry in WalkDir::new(source)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_skipped(entry))
    {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let supported = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| extensions.contains(&ext.to_ascii_lowercase().as_str()));
        if supported {
            inputs.push(entry.into_path());
        }
    }
    Ok(inputs)
}

/// Where `input` lands under `output_root`, keeping its path relative to
/// `source_root`.
pub fn output_path(input: &Path, source_root: &Path, output_root: &Path) -> PathBuf {
    let relative = input
        .strip_prefix(source_root)
        .ok()
        .filter(|rel| !rel.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .or_else(|| input.file_name().map(PathBuf::from))
        .unwrap_or_default();
    output_root.join(relative)
}

/// Open, transform and save a single image.
#[instrument(skip(backend, recipe), fields(input = %input.display()))]
pub fn process_image<B: ImageBackend>(
    backend: &B,
    input: &Path,
    output: &Path,
    recipe: &Recipe,
) -> Result<ProcessedImage, ImageError> {
    let mut handle = ImageHandle::open(backend, input)?;
    for step in &recipe.steps {
        step.apply(&mut handle, recipe)?;
    }

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent).map_err(|source| ImageError::FileNotWritable {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    handle.save(Some(output), recipe.quality)?;

    let dims = handle.dimensions()?;
    Ok(ProcessedImage {
        source: input.to_path_buf(),
        output: output.to_path_buf(),
        format: handle.format()?.to_string(),
        width: dims.width,
        height: dims.height,
    })
}

/// Apply `recipe` to every supported image under `source`, writing results
/// under `output`. Runs on the current rayon pool.
pub fn run_batch<B: ImageBackend>(
    backend: &B,
    source: &Path,
    output: &Path,
    recipe: &Recipe,
) -> Result<BatchReport, BatchError> {
    if recipe.steps.is_empty() {
        return Err(BatchError::EmptyRecipe);
    }

    let inputs = collect_inputs(source, Some(output))?;
    info!(count = inputs.len(), source = %source.display(), "Batch started");
    fs::create_dir_all(output)?;

    let results: Vec<(PathBuf, Result<ProcessedImage, ImageError>)> = inputs
        .par_iter()
        .map(|input| {
            let target = output_path(input, source, output);
            (input.clone(), process_image(backend, input, &target, recipe))
        })
        .collect();

    let mut report = BatchReport::default();
    for (input, result) in results {
        match result {
            Ok(processed) => report.processed.push(processed),
            Err(e) => {
                warn!(input = %input.display(), error = %e, "Image failed");
                report.failed.push(FailedImage {
                    source: input,
                    error: e.to_string(),
                });
            }
        }
    }
    Ok(report)
}

/// Write the report as pretty JSON.
pub fn write_manifest(report: &BatchReport, path: &Path) -> Result<(), BatchError> {
    let json = serde_json::to_string_pretty(report)?;
    fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::ImageFormat;
    use crate::imaging::backend::tests::MockBackend;
    use tempfile::TempDir;

    fn write_mock(dir: &Path, rel: &str, subtype: &str, width: u32, height: u32) -> PathBuf {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, MockBackend::encoded(subtype, width, height)).unwrap();
        path
    }

    fn recipe(steps: Vec<Step>) -> Recipe {
        Recipe {
            steps,
            quality: Quality::default(),
            anchor: WatermarkAnchor::default(),
            watermark: WatermarkOptions::default(),
        }
    }

    // =========================================================================
    // Steps
    // =========================================================================

    #[test]
    fn step_validation() {
        assert!(
            Step::Resize {
                width: Some(10),
                height: None,
                mode: ResizeMode::Ratio
            }
            .validate()
            .is_ok()
        );
        assert!(
            Step::Crop {
                x: 0,
                y: 0,
                width: Some(0),
                height: None
            }
            .validate()
            .is_err()
        );
        assert!(
            Step::CropFromCenter {
                width: 0,
                height: 5
            }
            .validate()
            .is_err()
        );
        assert!(
            Step::Watermark {
                path: PathBuf::new(),
                anchor: None,
                width: None,
                height: None,
                offset: None
            }
            .validate()
            .is_err()
        );
    }

    #[test]
    fn step_parses_with_defaults() {
        let step: Step = toml::from_str(
            r#"
op = "crop"
width = 50
"#,
        )
        .unwrap();
        assert_eq!(
            step,
            Step::Crop {
                x: 0,
                y: 0,
                width: Some(50),
                height: None
            }
        );
    }

    #[test]
    fn step_rejects_unknown_field() {
        let result: Result<Step, _> = toml::from_str(
            r#"
op = "resize"
widht = 50
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn watermark_step_uses_recipe_defaults() {
        let tmp = TempDir::new().unwrap();
        let mark = write_mock(tmp.path(), "mark.png", "png", 20, 10);
        let backend = MockBackend::new();
        let mut handle =
            ImageHandle::from_bytes(&backend, &MockBackend::encoded("jpeg", 100, 100)).unwrap();

        let step = Step::Watermark {
            path: mark,
            anchor: None,
            width: None,
            height: None,
            offset: None,
        };
        let mut recipe = recipe(vec![]);
        recipe.anchor = WatermarkAnchor::TopLeft;
        recipe.watermark = WatermarkOptions { offset: 3 };
        step.apply(&mut handle, &recipe).unwrap();

        let last = backend.get_operations().pop().unwrap();
        assert!(matches!(
            last,
            crate::imaging::backend::tests::RecordedOp::Copy { at: (3, 3), .. }
        ));
    }

    // =========================================================================
    // Input collection
    // =========================================================================

    #[test]
    fn collect_inputs_filters_and_sorts() {
        let tmp = TempDir::new().unwrap();
        write_mock(tmp.path(), "b.png", "png", 1, 1);
        write_mock(tmp.path(), "a.JPG", "jpeg", 1, 1);
        write_mock(tmp.path(), "nested/c.gif", "gif", 1, 1);
        fs::write(tmp.path().join("notes.txt"), "skip").unwrap();

        let inputs = collect_inputs(tmp.path(), None).unwrap();
        let names: Vec<_> = inputs
            .iter()
            .map(|p| p.strip_prefix(tmp.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            names,
            vec![
                PathBuf::from("a.JPG"),
                PathBuf::from("b.png"),
                PathBuf::from("nested/c.gif")
            ]
        );
    }

    #[test]
    fn collect_inputs_skips_nested_output() {
        let tmp = TempDir::new().unwrap();
        write_mock(tmp.path(), "a.png", "png", 1, 1);
        write_mock(tmp.path(), "out/a.png", "png", 1, 1);
        write_mock(tmp.path(), "outer/b.png", "png", 1, 1);

        let inputs = collect_inputs(tmp.path(), Some(&tmp.path().join("out"))).unwrap();
        let names: Vec<_> = inputs
            .iter()
            .map(|p| p.strip_prefix(tmp.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            names,
            vec![PathBuf::from("a.png"), PathBuf::from("outer/b.png")]
        );
    }

    #[test]
    fn rerun_into_nested_output_does_not_reprocess_results() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().to_path_buf();
        let output = source.join("thumbs");
        write_mock(&source, "wide.jpg", "jpeg", 1000, 625);

        let backend = MockBackend::new();
        let recipe = recipe(vec![Step::Resize {
            width: Some(200),
            height: Some(200),
            mode: ResizeMode::Crop,
        }]);

        let first = run_batch(&backend, &source, &output, &recipe).unwrap();
        assert_eq!(first.processed.len(), 1);
        let second = run_batch(&backend, &source, &output, &recipe).unwrap();
        assert_eq!(second.processed.len(), 1);
        assert_eq!(second.processed[0].source, source.join("wide.jpg"));
    }

    #[test]
    fn collect_inputs_missing_source() {
        let result = collect_inputs(Path::new("/nonexistent/batch/source"), None);
        assert!(matches!(result, Err(BatchError::SourceNotFound(_))));
    }

    #[test]
    fn output_path_mirrors_relative_layout() {
        assert_eq!(
            output_path(
                Path::new("/in/2024/beach.png"),
                Path::new("/in"),
                Path::new("/out")
            ),
            PathBuf::from("/out/2024/beach.png")
        );
    }

    // =========================================================================
    // Full runs
    // =========================================================================

    #[test]
    fn run_batch_processes_every_image() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("in");
        let output = tmp.path().join("out");
        write_mock(&source, "wide.jpg", "jpeg", 1000, 625);
        write_mock(&source, "deep/tall.png", "png", 300, 600);

        let backend = MockBackend::new();
        let recipe = recipe(vec![Step::Resize {
            width: Some(200),
            height: Some(200),
            mode: ResizeMode::Crop,
        }]);

        let report = run_batch(&backend, &source, &output, &recipe).unwrap();
        assert!(report.failed.is_empty());
        assert_eq!(report.processed.len(), 2);
        for image in &report.processed {
            assert_eq!((image.width, image.height), (200, 200));
        }

        let written = fs::read(output.join("deep/tall.png")).unwrap();
        assert_eq!(written, MockBackend::encoded("png", 200, 200));
    }

    #[test]
    fn run_batch_records_failures_and_continues() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("in");
        let output = tmp.path().join("out");
        write_mock(&source, "big.jpg", "jpeg", 500, 500);
        write_mock(&source, "small.jpg", "jpeg", 50, 50);

        let backend = MockBackend::new();
        let recipe = recipe(vec![Step::CropFromCenter {
            width: 100,
            height: 100,
        }]);

        let report = run_batch(&backend, &source, &output, &recipe).unwrap();
        assert_eq!(report.processed.len(), 1);
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].source.ends_with("small.jpg"));
        assert!(report.failed[0].error.contains("cropping dimensions"));
    }

    #[test]
    fn run_batch_rejects_empty_recipe() {
        let tmp = TempDir::new().unwrap();
        let backend = MockBackend::new();
        let result = run_batch(&backend, tmp.path(), tmp.path(), &recipe(vec![]));
        assert!(matches!(result, Err(BatchError::EmptyRecipe)));
    }

    #[test]
    fn run_batch_reports_unsupported_backend_format() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("in");
        write_mock(&source, "anim.gif", "gif", 10, 10);

        let backend = MockBackend::without(&[ImageFormat::Gif]);
        let recipe = recipe(vec![Step::CropFromCenter {
            width: 5,
            height: 5,
        }]);

        let report = run_batch(&backend, &source, &tmp.path().join("out"), &recipe).unwrap();
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].error.contains("gif"));
    }

    #[test]
    fn manifest_is_json() {
        let tmp = TempDir::new().unwrap();
        let report = BatchReport {
            processed: vec![ProcessedImage {
                source: "in/a.jpg".into(),
                output: "out/a.jpg".into(),
                format: "jpeg".into(),
                width: 10,
                height: 20,
            }],
            failed: vec![],
        };
        let path = tmp.path().join("manifest.json");
        write_manifest(&report, &path).unwrap();

        let parsed: BatchReport = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed.processed, report.processed);
    }
}
