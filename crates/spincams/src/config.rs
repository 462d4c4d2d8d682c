//! TOML configuration for acquisition and camera parameters.
//!
//! A `spincams.toml` has an `[acquisition]` table, a `[camera]` table with defaults for every
//! camera and optional `[cameras."<serial>"]` tables that replace individual defaults:
//!
//! ```toml
//! [acquisition]
//! num_images = 100
//! save_folder = "frames"
//!
//! [camera]
//! pixel_format = "BayerRG8"
//! frame_rate = 10.0
//! exposure = { mode = "off", value = 8000.0 }
//!
//! [cameras."24132701"]
//! exposure = { mode = "continuous" }
//! ```
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use toml::Table;

use crate::{
    AcquisitionMode, AutoMode, BufferMode, Camera, Cameras, CamerasBuilder, PixelFormat, Result,
    Trigger, TriggerMode, TriggerSource, cameras::BatchReport, recovery::RecoveryPolicy,
};

/// A configuration file living at [`Config::PATH`] relative to a config root.
pub trait Config: DeserializeOwned {
    const PATH: &'static str;

    fn load(root: impl AsRef<Path>) -> Result<Self> {
        let table = read_table(&root.as_ref().join(Self::PATH))?;
        Ok(toml::Value::Table(table).try_into()?)
    }

    /// Loads the config with the file of the same name in `overlay` merged over it.
    ///
    /// A missing overlay file leaves the config unchanged.
    fn load_with_overlay(root: impl AsRef<Path>, overlay: impl AsRef<Path>) -> Result<Self> {
        let main = read_table(&root.as_ref().join(Self::PATH))?;
        let overlay_path = overlay.as_ref().join(Self::PATH);

        let merged = if overlay_path.exists() {
            merge_tables(main, read_table(&overlay_path)?, true)
        } else {
            main
        };

        Ok(toml::Value::Table(merged).try_into()?)
    }
}

fn read_table(path: &Path) -> Result<Table> {
    Ok(fs::read_to_string(path)?.parse::<Table>()?)
}

/// Recursively merges `overlay` into `main`, overlay values win.
///
/// Keys only present in the overlay are kept when `add_keys` is set.
#[must_use]
pub fn merge_tables(main: Table, mut overlay: Table, add_keys: bool) -> Table {
    let mut merged = Table::new();

    for (key, value) in main {
        let merged_value = match (value, overlay.remove(&key)) {
            (toml::Value::Table(main), Some(toml::Value::Table(overlay))) => {
                toml::Value::Table(merge_tables(main, overlay, add_keys))
            }
            (_, Some(overlay)) => overlay,
            (value, None) => value,
        };
        merged.insert(key, merged_value);
    }

    if add_keys {
        merged.extend(overlay);
    }

    merged
}

/// Root of `spincams.toml`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SpincamsConfig {
    #[serde(default)]
    pub acquisition: AcquisitionSettings,
    /// Defaults for every camera, parsed as [`CameraSettings`].
    #[serde(default)]
    pub camera: Table,
    /// Per serial number overrides of [`camera`](Self::camera).
    #[serde(default)]
    pub cameras: BTreeMap<String, Table>,
}

impl Config for SpincamsConfig {
    const PATH: &'static str = "spincams.toml";
}

impl SpincamsConfig {
    /// Settings for the camera with `serial`.
    ///
    /// Each parameter in its `[cameras."<serial>"]` table replaces the default as a whole.
    pub fn camera_settings(&self, serial: &str) -> Result<CameraSettings> {
        let mut table = self.camera.clone();
        if let Some(overrides) = self.cameras.get(serial) {
            table.extend(overrides.clone());
        }

        Ok(toml::Value::Table(table).try_into()?)
    }

    /// Applies the camera settings to every initialised camera, a failing camera does not stop
    /// the others.
    pub fn apply(&self, cameras: &mut Cameras) -> BatchReport {
        let mut report = BatchReport::default();
        for camera in cameras {
            if !camera.is_initialised() {
                tracing::warn!(serial = camera.serial(), "not configuring uninitialised camera");
                continue;
            }

            let result = self
                .camera_settings(camera.serial())
                .and_then(|settings| settings.apply(camera));
            report.record("configure", camera.serial(), result);
        }
        report
    }
}

/// The `[acquisition]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AcquisitionSettings {
    /// Rounds to acquire, unset runs until stopped.
    pub num_images: Option<u64>,
    pub grab_timeout_ms: u64,
    pub save_folder: Option<PathBuf>,
    /// Capacity of the image queue, unset for an unbounded queue.
    pub queue_capacity: Option<usize>,
    pub verbose: bool,
    pub recovery_attempts: u32,
    pub recovery_delay_secs: u64,
}

impl Default for AcquisitionSettings {
    fn default() -> Self {
        let recovery = RecoveryPolicy::default();
        Self {
            num_images: None,
            grab_timeout_ms: 5000,
            save_folder: None,
            queue_capacity: None,
            verbose: false,
            recovery_attempts: recovery.attempts,
            recovery_delay_secs: recovery.delay.as_secs(),
        }
    }
}

impl AcquisitionSettings {
    #[must_use]
    pub fn grab_timeout(&self) -> Duration {
        Duration::from_millis(self.grab_timeout_ms)
    }

    #[must_use]
    pub fn recovery(&self) -> RecoveryPolicy {
        RecoveryPolicy {
            attempts: self.recovery_attempts,
            delay: Duration::from_secs(self.recovery_delay_secs),
        }
    }

    /// Applies these settings to a [`Cameras`] builder. The queue is left to the caller.
    #[must_use]
    pub fn configure(&self, builder: CamerasBuilder) -> CamerasBuilder {
        let builder = builder
            .grab_timeout(self.grab_timeout())
            .verbose(self.verbose)
            .recovery(self.recovery());

        match &self.save_folder {
            Some(folder) => builder.save_folder(folder),
            None => builder,
        }
    }
}

/// Automatic mode with the manual value used when it is `off`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AutoSetting {
    pub mode: AutoMode,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WhiteBalanceSetting {
    pub mode: AutoMode,
    pub red: Option<f64>,
    pub blue: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GammaSetting {
    pub enable: bool,
    #[serde(default = "default_gamma")]
    pub value: f64,
}

fn default_gamma() -> f64 {
    1.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TriggerSetting {
    pub mode: TriggerMode,
    #[serde(default)]
    pub source: TriggerSource,
    pub line: Option<i64>,
}

/// Parameters of a single camera, every unset parameter is left as it is on the device.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CameraSettings {
    pub pixel_format: Option<PixelFormat>,
    pub acquisition_mode: Option<AcquisitionMode>,
    pub buffer_mode: Option<BufferMode>,
    pub packet_size: Option<i64>,
    pub throughput_limit: Option<i64>,
    pub frame_rate: Option<f64>,
    pub exposure: Option<AutoSetting>,
    pub gain: Option<AutoSetting>,
    pub white_balance: Option<WhiteBalanceSetting>,
    pub gamma: Option<GammaSetting>,
    pub trigger: Option<TriggerSetting>,
}

impl CameraSettings {
    /// Writes every configured parameter to an initialised camera.
    pub fn apply(&self, camera: &mut Camera) -> Result<()> {
        if let Some(pixel_format) = self.pixel_format {
            camera.set_pixel_format(pixel_format)?;
        }
        if let Some(mode) = self.acquisition_mode {
            camera.set_acquisition_mode(mode)?;
        }
        if let Some(mode) = self.buffer_mode {
            camera.set_stream_buffer_mode(mode)?;
        }
        if let Some(packet_size) = self.packet_size {
            camera.set_packet_size(packet_size)?;
        }
        if let Some(limit) = self.throughput_limit {
            camera.set_device_throughput_limit(limit)?;
        }
        if let Some(frame_rate) = self.frame_rate {
            camera.set_frame_rate(frame_rate)?;
        }
        if let Some(AutoSetting { mode, value }) = self.exposure {
            camera.set_exposure(mode, value)?;
        }
        if let Some(AutoSetting { mode, value }) = self.gain {
            camera.set_gain(mode, value)?;
        }
        if let Some(balance) = self.white_balance {
            let ratios = balance.red.zip(balance.blue);
            camera.set_white_balance(balance.mode, ratios)?;
        }
        if let Some(GammaSetting { enable, value }) = self.gamma {
            camera.set_gamma(enable, value)?;
        }
        if let Some(trigger) = self.trigger {
            camera.set_trigger_mode(Trigger::from_parts(
                trigger.mode,
                trigger.source,
                trigger.line,
            )?)?;
        }

        tracing::debug!(serial = camera.serial(), "camera configured");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        Error, System,
        sdk::{
            NodeMap, nodes,
            sim::{SimCamera, SimSystem},
        },
    };

    const CONFIG: &str = r#"
[acquisition]
num_images = 5
grab_timeout_ms = 250
queue_capacity = 8

[camera]
pixel_format = "Mono8"
frame_rate = 12.5
exposure = { mode = "off", value = 8000.0 }
trigger = { mode = "on", source = "hardware", line = 1 }

[cameras."2"]
exposure = { mode = "continuous" }
buffer_mode = "oldest-first"
"#;

    fn write_config(dir: &Path, contents: &str) {
        fs::write(dir.join(SpincamsConfig::PATH), contents).unwrap();
    }

    #[test]
    fn merges_tables_recursively() {
        let main: Table = "a = 1\n[t]\nx = 1\ny = 2\n".parse().unwrap();
        let overlay: Table = "b = 3\n[t]\ny = 5\n".parse().unwrap();

        let merged = merge_tables(main.clone(), overlay.clone(), false);
        assert_eq!(merged["t"]["x"].as_integer(), Some(1));
        assert_eq!(merged["t"]["y"].as_integer(), Some(5));
        assert!(!merged.contains_key("b"));

        assert!(merge_tables(main, overlay, true).contains_key("b"));
    }

    #[test]
    fn per_serial_settings_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        write_config(dir.path(), CONFIG);
        let config = SpincamsConfig::load(dir.path()).unwrap();

        assert_eq!(config.acquisition.num_images, Some(5));
        assert_eq!(config.acquisition.grab_timeout(), Duration::from_millis(250));
        assert_eq!(config.acquisition.recovery(), RecoveryPolicy::default());

        let first = config.camera_settings("1").unwrap();
        assert_eq!(first.pixel_format, Some(PixelFormat::Mono8));
        assert_eq!(first.exposure.unwrap().mode, AutoMode::Off);
        assert_eq!(first.buffer_mode, None);

        let second = config.camera_settings("2").unwrap();
        assert_eq!(second.exposure.unwrap().mode, AutoMode::Continuous);
        assert_eq!(second.exposure.unwrap().value, None);
        assert_eq!(second.buffer_mode, Some(BufferMode::OldestFirst));
        assert_eq!(second.frame_rate, Some(12.5));
    }

    #[test]
    fn overlay_file_is_merged() {
        let root = tempfile::tempdir().unwrap();
        let overlay = tempfile::tempdir().unwrap();
        write_config(root.path(), CONFIG);
        write_config(overlay.path(), "[acquisition]\nverbose = true\n");

        let config = SpincamsConfig::load_with_overlay(root.path(), overlay.path()).unwrap();
        assert!(config.acquisition.verbose);
        assert_eq!(config.acquisition.num_images, Some(5));

        let missing = tempfile::tempdir().unwrap();
        let config = SpincamsConfig::load_with_overlay(root.path(), missing.path()).unwrap();
        assert!(!config.acquisition.verbose);
    }

    #[test]
    fn unknown_parameter_is_rejected() {
        let config = SpincamsConfig {
            camera: "shutter = 1".parse().unwrap(),
            ..SpincamsConfig::default()
        };

        assert!(matches!(
            config.camera_settings("1"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn applies_settings_to_cameras() {
        let config: SpincamsConfig = toml::from_str(CONFIG).unwrap();
        let first = SimCamera::new("1");
        let second = SimCamera::new("2");
        let (first_monitor, second_monitor) = (first.monitor(), second.monitor());
        let mut cameras = Cameras::new(System::new(
            SimSystem::new().with_camera(first).with_camera(second),
        ))
        .unwrap();
        cameras.initialise_cameras();

        let report = config.apply(&mut cameras);

        assert!(report.is_ok(), "{:?}", report.failed);
        assert_eq!(
            first_monitor.enum_value(NodeMap::Camera, nodes::PIXEL_FORMAT).as_deref(),
            Some("Mono8")
        );
        assert_eq!(first_monitor.float_value(nodes::EXPOSURE_TIME), Some(8000.0));
        assert_eq!(
            first_monitor.enum_value(NodeMap::Camera, nodes::TRIGGER_SOURCE).as_deref(),
            Some("Line1")
        );
        assert_eq!(
            second_monitor.enum_value(NodeMap::Camera, nodes::EXPOSURE_AUTO).as_deref(),
            Some("Continuous")
        );
        assert_eq!(
            second_monitor
                .enum_value(NodeMap::Stream, nodes::STREAM_BUFFER_HANDLING_MODE)
                .as_deref(),
            Some("OldestFirst")
        );
        assert_eq!(
            second_monitor.boolean_value(nodes::ACQUISITION_FRAME_RATE_ENABLE),
            Some(true)
        );
    }

    #[test]
    fn uninitialised_cameras_are_not_configured() {
        let config: SpincamsConfig = toml::from_str(CONFIG).unwrap();
        let failing = SimCamera::new("2").fail_init("Unable to open device");
        let failing_monitor = failing.monitor();
        let mut cameras = Cameras::new(System::new(
            SimSystem::new().with_camera(SimCamera::new("1")).with_camera(failing),
        ))
        .unwrap();
        cameras.initialise_cameras();

        let report = config.apply(&mut cameras);

        assert!(report.is_ok(), "{:?}", report.failed);
        assert_eq!(report.succeeded, ["1"]);
        assert!(failing_monitor.writes().is_empty());
    }
}
