use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Camera device index
    #[arg(long, default_value_t = 0, env = "FACE_BOXES_CAMERA")]
    pub camera: i32,

    /// Requested capture width in pixels
    #[arg(long, default_value_t = 320)]
    pub width: i32,

    /// Requested capture height in pixels
    #[arg(long, default_value_t = 240)]
    pub height: i32,

    /// Requested capture frame rate
    #[arg(long, default_value_t = 32)]
    pub fps: i32,

    /// Cascade definition file; repeat to run several classifiers per frame
    #[arg(long = "classifier")]
    pub classifiers: Vec<PathBuf>,

    /// Directory scanned for *.xml cascade definitions when no --classifier is given
    #[arg(long, default_value = "classifiers", env = "FACE_BOXES_CLASSIFIER_DIR")]
    pub classifier_dir: PathBuf,

    /// Detection pyramid step, must be greater than 1.0
    #[arg(long, default_value_t = 1.1)]
    pub scale_factor: f64,

    /// Overlapping candidates required to accept a face region
    #[arg(long, default_value_t = 5)]
    pub min_neighbors: i32,

    /// Minimum face region edge in pixels
    #[arg(long, default_value_t = 30)]
    pub min_size: i32,

    /// Detection worker threads, 0 = one per available core
    #[arg(long, default_value_t = 0)]
    pub workers: usize,

    /// Face box outline thickness in pixels
    #[arg(long, default_value_t = 1)]
    pub line_width: i32,

    /// Face box outline color as B,G,R bytes
    #[arg(long, default_value = "0,255,0", value_parser = parse_bgr)]
    pub box_color: [u8; 3],

    /// Key that stops the capture loop
    #[arg(long, default_value_t = 'q')]
    pub quit_key: char,

    /// Display window title
    #[arg(long, default_value = "Frame")]
    pub window: String,

    /// Write the per-frame detection log to this JSON file on exit
    #[arg(long)]
    pub detections_out: Option<PathBuf>,
}

impl Args {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

/// Parses "B,G,R" into three bytes.
fn parse_bgr(s: &str) -> Result<[u8; 3], String> {
    let parts: Vec<&str> = s.split(',').collect();
    if parts.len() != 3 {
        return Err(format!("expected B,G,R but got '{}'", s));
    }
    let mut bgr = [0u8; 3];
    for (i, part) in parts.iter().enumerate() {
        bgr[i] = part
            .trim()
            .parse::<u8>()
            .map_err(|_| format!("invalid channel value '{}' in '{}'", part, s))?;
    }
    Ok(bgr)
}
