use crate::cli::Args;
use crate::pipeline::annotate::BoxStyle;
use crate::pipeline::detection::DetectorParams;
use anyhow::Result;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Camera settings applied once before the capture loop starts.
#[derive(Debug, Clone)]
pub struct CameraSettings {
    pub index: i32,
    pub width: i32,
    pub height: i32,
    pub fps: i32,
}

/// One cascade definition to run against every frame.
///
/// The label is the definition file stem and identifies the classifier in
/// logs, errors, and the detection log artifact.
#[derive(Debug, Clone)]
pub struct ClassifierSpec {
    pub label: String,
    pub path: PathBuf,
}

impl ClassifierSpec {
    fn from_path(path: PathBuf) -> Self {
        let label = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("classifier")
            .to_string();
        Self { label, path }
    }
}

/// Validated session configuration, frozen before any device is opened.
///
/// Constructed once in `main` and passed by reference through the loop; there
/// is no global configuration state.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub camera: CameraSettings,
    pub classifiers: Vec<ClassifierSpec>,
    pub params: DetectorParams,
    pub worker_count: usize,
    pub style: BoxStyle,
    pub quit_key: char,
    pub window_title: String,
    pub detections_out: Option<PathBuf>,
}

impl RunContext {
    pub fn from_args(args: &Args) -> Result<Self> {
        let params = DetectorParams {
            scale_factor: args.scale_factor,
            min_neighbors: args.min_neighbors,
            min_size: (args.min_size, args.min_size),
        };
        params.validate()?;

        if args.width <= 0 || args.height <= 0 || args.fps <= 0 {
            anyhow::bail!(
                "Invalid camera settings: {}x{} @ {} fps",
                args.width,
                args.height,
                args.fps
            );
        }
        if args.line_width < 1 {
            anyhow::bail!("Line width must be at least 1, got {}", args.line_width);
        }

        let classifiers = resolve_classifiers(&args.classifiers, &args.classifier_dir)?;
        let worker_count = resolve_worker_count(args.workers, classifiers.len());

        Ok(Self {
            camera: CameraSettings {
                index: args.camera,
                width: args.width,
                height: args.height,
                fps: args.fps,
            },
            classifiers,
            params,
            worker_count,
            style: BoxStyle::new(args.box_color, args.line_width),
            quit_key: args.quit_key,
            window_title: args.window.clone(),
            detections_out: args.detections_out.clone(),
        })
    }
}

/// Resolves the ordered classifier list: explicit paths if given, otherwise
/// every *.xml file under the classifier directory, sorted by path so the
/// definition order is deterministic.
fn resolve_classifiers(explicit: &[PathBuf], dir: &Path) -> Result<Vec<ClassifierSpec>> {
    let paths = if explicit.is_empty() {
        discover_definitions(dir)?
    } else {
        explicit.to_vec()
    };

    if paths.is_empty() {
        anyhow::bail!(
            "No cascade definitions found under {:?}; pass --classifier or point \
             --classifier-dir at a directory of *.xml cascade files",
            dir
        );
    }

    for path in &paths {
        if !path.is_file() {
            anyhow::bail!("Cascade definition NOT FOUND at: {:?}", path);
        }
    }

    Ok(paths.into_iter().map(ClassifierSpec::from_path).collect())
}

fn discover_definitions(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|s| s.to_str())
                .map(|s| s.to_lowercase() == "xml")
                .unwrap_or(false)
        })
        .map(|e| e.path().to_path_buf())
        .collect();
    paths.sort();
    Ok(paths)
}

/// 0 means one worker per available core; never more workers than classifiers.
fn resolve_worker_count(requested: usize, classifier_count: usize) -> usize {
    let count = if requested == 0 {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    } else {
        requested
    };
    count.clamp(1, classifier_count.max(1))
}
