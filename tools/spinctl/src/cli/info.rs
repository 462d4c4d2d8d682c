use clap::Parser;

use super::BackendOpts;
use crate::error::Result;

/// Show the state of a single camera.
#[derive(Clone, Debug, Parser)]
pub struct Info {
    /// Serial number of the camera
    pub serial: String,
}

impl Info {
    pub fn info(self, backend: &BackendOpts) -> Result<()> {
        let mut cameras = backend.builder()?.build()?;
        let camera = cameras.get_camera_by_serial_mut(&self.serial)?;

        // The temperature is only readable on an initialised camera.
        camera.initialise()?;
        println!("{camera}");
        println!("  Vendor: {}", camera.info().vendor);
        println!("  Version: {}", camera.info().version);

        Ok(())
    }
}
