use clap::Parser;
use colored::Colorize;
use spincams::recovery::RecoveryPolicy;

use super::BackendOpts;
use crate::error::Result;

/// List the connected cameras.
#[derive(Clone, Debug, Default, Parser)]
pub struct List {
    /// Print the camera information as JSON, keyed by serial number
    #[clap(long)]
    pub json: bool,
}

impl List {
    pub fn list(self, backend: &BackendOpts) -> Result<()> {
        let cameras = backend.builder()?.recovery(RecoveryPolicy::disabled()).build()?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&cameras.camera_info())?);
            return Ok(());
        }

        println!("{}", cameras.version_info()?.bold());
        if cameras.is_empty() {
            println!("{}", "No cameras detected".yellow());
            return Ok(());
        }

        println!(
            "{:>4}  {:<12} {:<28} {:<16} {}",
            "#".bold(),
            "Serial".bold(),
            "Model".bold(),
            "Version".bold(),
            "User id".bold()
        );
        for camera in &cameras {
            let info = camera.info();
            println!(
                "{:>4}  {:<12} {:<28} {:<16} {}",
                camera.index() + 1,
                info.serial.blue(),
                info.model,
                info.version,
                info.user_id.dimmed()
            );
        }

        Ok(())
    }
}
