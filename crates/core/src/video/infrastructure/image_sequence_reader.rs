use std::path::{Path, PathBuf};

use crate::shared::constants::IMAGE_EXTENSIONS;
use crate::shared::frame::Frame;
use crate::shared::stream_info::StreamInfo;
use crate::video::domain::frame_source::FrameSource;

/// Adapts a directory of still images to the [`FrameSource`] interface.
///
/// Files with a known image extension are played back in file-name order,
/// which suits the zero-padded names camera capture tools produce. Images
/// are decoded lazily, one per frame, with the `image` crate.
pub struct ImageSequenceReader {
    fps: Option<f64>,
    paths: Option<Vec<PathBuf>>,
}

impl ImageSequenceReader {
    /// `fps` is the capture rate used to timestamp frames, if known.
    pub fn new(fps: Option<f64>) -> Self {
        Self { fps, paths: None }
    }
}

impl Default for ImageSequenceReader {
    fn default() -> Self {
        Self::new(None)
    }
}

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn list_images(dir: &Path) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && is_image_file(p))
        .collect();
    paths.sort();
    Ok(paths)
}

fn decode(path: &Path, index: usize) -> Result<Frame, Box<dyn std::error::Error>> {
    let img = image::open(path)
        .map_err(|e| format!("Failed to decode {}: {e}", path.display()))?
        .to_rgb8();
    let (width, height) = img.dimensions();
    Ok(Frame::new(img.into_raw(), width, height, 3, index))
}

impl FrameSource for ImageSequenceReader {
    fn open(&mut self, path: &Path) -> Result<StreamInfo, Box<dyn std::error::Error>> {
        if !path.is_dir() {
            return Err(format!("Not a directory: {}", path.display()).into());
        }
        let paths = list_images(path)?;
        let first = paths
            .first()
            .ok_or_else(|| format!("No images found in {}", path.display()))?;
        let (width, height) = image::image_dimensions(first)?;

        let info = StreamInfo {
            width,
            height,
            fps: self.fps,
            total_frames: paths.len(),
            source_path: Some(path.to_path_buf()),
        };
        log::debug!("Opened {} image(s) from {}", paths.len(), path.display());
        self.paths = Some(paths);
        Ok(info)
    }

    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
        match self.paths.take() {
            Some(paths) => Box::new(
                paths
                    .into_iter()
                    .enumerate()
                    .map(|(index, path)| decode(&path, index)),
            ),
            None => Box::new(std::iter::once(Err(
                "ImageSequenceReader: not opened".into()
            ))),
        }
    }

    fn close(&mut self) {
        self.paths = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_image(dir: &Path, name: &str, width: u32, height: u32, rgb: [u8; 3]) {
        let mut img = image::RgbImage::new(width, height);
        for pixel in img.pixels_mut() {
            *pixel = image::Rgb(rgb);
        }
        img.save(dir.join(name)).unwrap();
    }

    #[test]
    fn test_open_returns_stream_info() {
        let dir = tempfile::tempdir().unwrap();
        write_image(dir.path(), "frame_0001.png", 64, 48, [0, 0, 0]);
        write_image(dir.path(), "frame_0002.png", 64, 48, [0, 0, 0]);

        let mut reader = ImageSequenceReader::new(Some(15.0));
        let info = reader.open(dir.path()).unwrap();
        assert_eq!((info.width, info.height), (64, 48));
        assert_eq!(info.total_frames, 2);
        assert_eq!(info.fps, Some(15.0));
        assert_eq!(info.source_path.as_deref(), Some(dir.path()));
    }

    #[test]
    fn test_frames_in_name_order_with_indices() {
        let dir = tempfile::tempdir().unwrap();
        write_image(dir.path(), "b.png", 8, 8, [20, 0, 0]);
        write_image(dir.path(), "a.png", 8, 8, [10, 0, 0]);
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut reader = ImageSequenceReader::default();
        reader.open(dir.path()).unwrap();
        let frames: Vec<Frame> = reader.frames().map(|f| f.unwrap()).collect();

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].data()[0], 10);
        assert_eq!(frames[0].index(), 0);
        assert_eq!(frames[1].data()[0], 20);
        assert_eq!(frames[1].index(), 1);
        assert!(frames[0].is_well_formed());
    }

    #[test]
    fn test_empty_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut reader = ImageSequenceReader::default();
        assert!(reader.open(dir.path()).is_err());
    }

    #[test]
    fn test_open_nonexistent_is_an_error() {
        let mut reader = ImageSequenceReader::default();
        assert!(reader.open(Path::new("/nonexistent/frames")).is_err());
    }

    #[test]
    fn test_frames_without_open_returns_error() {
        let mut reader = ImageSequenceReader::default();
        assert!(reader.frames().next().unwrap().is_err());
    }

    #[test]
    fn test_corrupt_image_yields_error_item() {
        let dir = tempfile::tempdir().unwrap();
        write_image(dir.path(), "a.png", 8, 8, [0, 0, 0]);
        std::fs::write(dir.path().join("b.png"), b"not a png").unwrap();

        let mut reader = ImageSequenceReader::default();
        reader.open(dir.path()).unwrap();
        let results: Vec<_> = reader.frames().collect();
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
    }

    #[test]
    fn test_is_image_file() {
        assert!(is_image_file(Path::new("x/frame.JPG")));
        assert!(is_image_file(Path::new("frame.webp")));
        assert!(!is_image_file(Path::new("frame.mp4")));
        assert!(!is_image_file(Path::new("frame")));
    }
}
