use clap::Parser;
use colored::Colorize;
use spincams::{Camera, recovery::RecoveryPolicy};

use super::BackendOpts;
use crate::error::{Error, Result};

/// Reset cameras, or force their IP address into the host's subnet.
#[derive(Clone, Debug, Default, Parser)]
pub struct Reset {
    /// Force the IP address instead of resetting the device
    #[clap(long)]
    pub force_ip: bool,

    /// Only act on the camera with this serial number [default: all cameras]
    #[clap(long, short)]
    pub serial: Option<String>,
}

impl Reset {
    pub fn reset(self, backend: &BackendOpts) -> Result<()> {
        let mut cameras = backend.builder()?.recovery(RecoveryPolicy::disabled()).build()?;

        let targets: Vec<&mut Camera> = match &self.serial {
            Some(serial) => vec![cameras.get_camera_by_serial_mut(serial)?],
            None => cameras.iter_mut().collect(),
        };

        let action = if self.force_ip { "Forcing IP of" } else { "Resetting" };
        let mut failed = 0;
        for camera in targets {
            let result = if self.force_ip {
                camera.force_ip()
            } else {
                camera.reset()
            };

            match result {
                Ok(()) => println!("{} {} {}", "✔".green(), action, camera.serial().blue()),
                Err(error) => {
                    println!("{} {} {}: {error}", "✘".red(), action, camera.serial().blue());
                    failed += 1;
                }
            }
        }

        if failed > 0 {
            return Err(Error::Batch {
                operation: if self.force_ip { "force ip" } else { "reset" },
                failed,
            });
        }

        Ok(())
    }
}
