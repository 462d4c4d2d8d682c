//! Ready made [`FrameCallback`]s.
use std::path::PathBuf;

use crate::{Error, FrameCallback, Image, Result};

#[cfg(feature = "video")]
mod video;

#[cfg(feature = "video")]
pub use video::{DEFAULT_VIDEO_FPS, SaveVideoCallback};

/// Writes every frame into a folder under its generated filename.
#[derive(Debug, Clone)]
pub struct SaveImageCallback {
    save_folder: PathBuf,
    saved: u64,
}

impl SaveImageCallback {
    pub fn new(save_folder: impl Into<PathBuf>) -> Result<Self> {
        let save_folder = save_folder.into();
        if !save_folder.is_dir() {
            return Err(Error::SaveFolderNotFound { path: save_folder });
        }

        Ok(Self {
            save_folder,
            saved: 0,
        })
    }

    /// Number of frames written so far.
    #[must_use]
    pub fn saved(&self) -> u64 {
        self.saved
    }
}

impl FrameCallback for SaveImageCallback {
    fn on_frame(&mut self, image: &Image, filename: &str) -> Result<()> {
        let path = self.save_folder.join(filename);
        image.save(&path)?;
        self.saved += 1;

        tracing::info!(path = %path.display(), "callback saved image");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PixelFormat;

    #[test]
    fn saves_under_given_name() {
        let dir = tempfile::tempdir().unwrap();
        let mut callback = SaveImageCallback::new(dir.path()).unwrap();
        let image = Image::new(2, 1, PixelFormat::RGB8, vec![255, 0, 0, 0, 0, 255]).unwrap();

        callback.on_frame(&image, "cam-1_img-0.jpg").unwrap();

        assert!(dir.path().join("cam-1_img-0.jpg").is_file());
        assert_eq!(callback.saved(), 1);
    }

    #[test]
    fn folder_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            SaveImageCallback::new(dir.path().join("nope")),
            Err(Error::SaveFolderNotFound { .. })
        ));
    }
}
