use anyhow::{anyhow, Context, Result};
use opencv::core::{Mat, Rect, Size, Vector};
use opencv::imgproc;
use opencv::objdetect::{CascadeClassifier, CASCADE_SCALE_IMAGE};
use opencv::prelude::*;
use std::path::Path;

/// Tunables for the multi-scale cascade search, shared by every classifier.
#[derive(Debug, Clone, Copy)]
pub struct DetectorParams {
    /// Multiplicative step between successive detection window sizes.
    pub scale_factor: f64,
    /// Overlapping candidate detections required to confirm a region.
    pub min_neighbors: i32,
    /// Smallest face region considered, (width, height) in pixels.
    pub min_size: (i32, i32),
}

impl DetectorParams {
    pub fn validate(&self) -> Result<()> {
        if self.scale_factor <= 1.0 {
            anyhow::bail!(
                "Scale factor must be greater than 1.0, got {}",
                self.scale_factor
            );
        }
        if self.min_neighbors < 0 {
            anyhow::bail!("Min neighbors must be >= 0, got {}", self.min_neighbors);
        }
        if self.min_size.0 < 1 || self.min_size.1 < 1 {
            anyhow::bail!(
                "Min size must be at least 1x1, got {}x{}",
                self.min_size.0,
                self.min_size.1
            );
        }
        Ok(())
    }
}

/// One pre-loaded detector run against the grayscale projection of a frame.
///
/// Implementations must be deterministic: identical input frames yield
/// identical face lists.
pub trait FaceDetector: Send {
    fn detect(&mut self, gray: &Mat) -> Result<Vec<Rect>>;
}

/// Runs every configured classifier against one grayscale frame and returns
/// the face lists in classifier-definition order.
pub trait FrameDetector {
    fn detect_all(&mut self, gray: &Mat) -> Result<Vec<Vec<Rect>>>;
}

/// A wrapper around an OpenCV cascade classifier bound to one definition file.
///
/// The cascade is loaded once at construction and reused for every frame.
pub struct CascadeDetector {
    classifier: CascadeClassifier,
    params: DetectorParams,
}

impl CascadeDetector {
    pub fn open(path: &Path, params: DetectorParams) -> Result<Self> {
        let path_str = path
            .to_str()
            .ok_or_else(|| anyhow!("Cascade definition path is not valid UTF-8: {:?}", path))?;
        let classifier = CascadeClassifier::new(path_str)
            .with_context(|| format!("Failed to load cascade definition at: '{}'", path_str))?;
        if classifier.empty()? {
            anyhow::bail!("Cascade definition at '{}' contains no stages", path_str);
        }
        Ok(Self { classifier, params })
    }
}

impl FaceDetector for CascadeDetector {
    fn detect(&mut self, gray: &Mat) -> Result<Vec<Rect>> {
        let mut faces = Vector::<Rect>::new();
        self.classifier.detect_multi_scale(
            gray,
            &mut faces,
            self.params.scale_factor,
            self.params.min_neighbors,
            CASCADE_SCALE_IMAGE,
            Size::new(self.params.min_size.0, self.params.min_size.1),
            Size::default(),
        )?;
        Ok(faces.to_vec())
    }
}

/// Single-channel projection of a BGR frame, recomputed every iteration.
pub fn to_grayscale(frame: &Mat) -> Result<Mat> {
    let mut gray = Mat::default();
    imgproc::cvt_color_def(frame, &mut gray, imgproc::COLOR_BGR2GRAY)?;
    Ok(gray)
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::{Scalar, CV_8UC3};

    fn params() -> DetectorParams {
        DetectorParams {
            scale_factor: 1.1,
            min_neighbors: 5,
            min_size: (30, 30),
        }
    }

    #[test]
    fn test_params_validation() {
        assert!(params().validate().is_ok());

        let mut p = params();
        p.scale_factor = 1.0;
        assert!(p.validate().is_err());

        let mut p = params();
        p.min_neighbors = -1;
        assert!(p.validate().is_err());

        let mut p = params();
        p.min_size = (0, 30);
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_open_rejects_missing_definition() {
        let err = CascadeDetector::open(Path::new("/no/such/cascade.xml"), params());
        assert!(err.is_err());
    }

    #[test]
    fn test_grayscale_matches_bt601_luma() {
        // Solid blue: Y = 0.114 * 255 = 29
        let blue = Mat::new_rows_cols_with_default(
            8,
            8,
            CV_8UC3,
            Scalar::new(255.0, 0.0, 0.0, 0.0),
        )
        .unwrap();
        let gray = to_grayscale(&blue).unwrap();
        assert_eq!(gray.channels(), 1);
        assert_eq!(gray.rows(), 8);
        assert_eq!(gray.cols(), 8);
        assert_eq!(gray.data_bytes().unwrap()[0], 29);

        // Solid green: Y = 0.587 * 255 = 150
        let green = Mat::new_rows_cols_with_default(
            8,
            8,
            CV_8UC3,
            Scalar::new(0.0, 255.0, 0.0, 0.0),
        )
        .unwrap();
        assert_eq!(to_grayscale(&green).unwrap().data_bytes().unwrap()[0], 150);

        // White stays white
        let white = Mat::new_rows_cols_with_default(
            8,
            8,
            CV_8UC3,
            Scalar::all(255.0),
        )
        .unwrap();
        assert_eq!(to_grayscale(&white).unwrap().data_bytes().unwrap()[0], 255);
    }
}
