use clap::{Args, Parser};
use spincams::{Cameras, CamerasBuilder, System, sdk::sim::SimSystem};

use crate::error::{Error, Result};

pub mod acquire;
pub mod info;
pub mod list;
pub mod reset;

/// `spinctl` - Control FLIR cameras through the Spinnaker SDK
///
/// # Listing cameras
/// ```sh
/// spinctl list
/// spinctl list --json
/// ```
///
/// # Acquiring images
/// Grab ten rounds of images from every camera into a folder:
/// ```sh
/// spinctl acquire --num-images 10 --save-folder ./frames
/// ```
/// Without `--num-images` acquisition runs until Ctrl-C is pressed.
///
/// # Trying it without cameras
/// Every command accepts `--simulate <N>` to run against `N` simulated cameras.
#[derive(Parser)]
#[clap(name = "spinctl", version)]
pub struct Cli {
    #[clap(flatten)]
    pub backend: BackendOpts,

    #[clap(subcommand)]
    pub action: Commands,
}

/// All possible commands for the cli, used for clap derive macros.
#[derive(Parser)]
pub enum Commands {
    List(list::List),
    Info(info::Info),
    Acquire(acquire::Acquire),
    Reset(reset::Reset),
}

/// Options selecting the camera backend, shared by every command.
#[derive(Clone, Debug, Default, Args)]
pub struct BackendOpts {
    /// Use this many simulated cameras instead of the Spinnaker runtime
    #[clap(long, global = true, value_name = "N")]
    pub simulate: Option<usize>,

    /// Log debug output, `RUST_LOG` takes precedence
    #[clap(short, long, global = true)]
    pub verbose: bool,
}

impl BackendOpts {
    pub fn system(&self) -> Result<System> {
        if let Some(count) = self.simulate {
            return Ok(System::new(SimSystem::with_cameras(count)));
        }

        #[cfg(feature = "spinnaker")]
        {
            Ok(System::spinnaker()?)
        }

        #[cfg(not(feature = "spinnaker"))]
        {
            Err(Error::NoBackend)
        }
    }

    /// A builder over all connected cameras, with the verbosity of this invocation.
    pub fn builder(&self) -> Result<CamerasBuilder> {
        Ok(Cameras::builder(self.system()?).verbose(self.verbose))
    }
}

/// Turns a batch report with failures into an error.
pub(crate) fn check_batch(operation: &'static str, report: &spincams::BatchReport) -> Result<()> {
    if report.is_ok() {
        Ok(())
    } else {
        Err(Error::Batch {
            operation,
            failed: report.failed.len(),
        })
    }
}
