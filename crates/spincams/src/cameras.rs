use std::{
    collections::BTreeMap,
    fmt,
    path::{Path, PathBuf},
    thread,
    time::Duration,
};

use crate::{
    Camera, CameraInfo, Error, ImageQueue, Result, StopHandle, System,
    recovery::{self, RecoveryPolicy},
    sdk::Device,
};

/// Default time to wait for a frame before giving up on it.
pub const DEFAULT_GRAB_TIMEOUT: Duration = Duration::from_millis(5000);

/// Outcome of an operation applied to every camera in a collection.
///
/// A failing camera does not stop the operation for the others.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<(String, Error)>,
}

impl BatchReport {
    pub(crate) fn record(&mut self, operation: &str, serial: &str, result: Result<()>) {
        match result {
            Ok(()) => self.succeeded.push(serial.to_string()),
            Err(error) => {
                tracing::error!(serial, %error, "failed to {operation} camera");
                self.failed.push((serial.to_string(), error));
            }
        }
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Builder for [`Cameras`], created by [`Cameras::builder`].
#[derive(Debug)]
pub struct CamerasBuilder {
    system: System,
    save_folder: Option<PathBuf>,
    queue: Option<ImageQueue>,
    grab_timeout: Duration,
    verbose: bool,
    recovery: RecoveryPolicy,
}

impl CamerasBuilder {
    /// Folder acquired frames are written to, it must already exist.
    #[must_use]
    pub fn save_folder(mut self, path: impl Into<PathBuf>) -> Self {
        self.save_folder = Some(path.into());
        self
    }

    /// Queue acquired frames are pushed to.
    #[must_use]
    pub fn queue(mut self, queue: ImageQueue) -> Self {
        self.queue = Some(queue);
        self
    }

    #[must_use]
    pub fn grab_timeout(mut self, timeout: Duration) -> Self {
        self.grab_timeout = timeout;
        self
    }

    /// Log every acquired frame at info level instead of debug.
    #[must_use]
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    #[must_use]
    pub fn recovery(mut self, recovery: RecoveryPolicy) -> Self {
        self.recovery = recovery;
        self
    }

    /// Enumerates the attached cameras, correcting known faults on the way.
    pub fn build(self) -> Result<Cameras> {
        if let Some(path) = &self.save_folder {
            if !path.is_dir() {
                return Err(Error::SaveFolderNotFound { path: path.clone() });
            }
        }

        let cameras = open_with_recovery(&self.system, self.recovery)?;
        if cameras.is_empty() {
            tracing::warn!("no cameras detected");
        } else {
            tracing::info!(count = cameras.len(), "cameras detected");
        }

        Ok(Cameras {
            system: self.system,
            cameras,
            save_folder: self.save_folder,
            queue: self.queue,
            grab_timeout: self.grab_timeout,
            verbose: self.verbose,
            stop: StopHandle::default(),
        })
    }
}

enum OpenError {
    Enumerate(Error),
    Device {
        device: Box<dyn Device>,
        index: usize,
        error: Error,
    },
}

/// Initialises and de-initialises a camera once to surface link faults.
fn check_init(device: &mut dyn Device) -> Result<()> {
    if device.is_initialized() {
        return Ok(());
    }

    device.init()?;
    device.deinit()
}

/// Opens every enumerated device.
///
/// With `correct` set, the first device failing with a correctable error is handed back for
/// recovery. Otherwise a device with unreadable information is skipped and one failing to
/// initialise is kept, so the failure shows up in [`Cameras::initialise_cameras`].
fn open_all(system: &System, correct: bool) -> std::result::Result<Vec<Camera>, OpenError> {
    let devices = system.enumerate().map_err(OpenError::Enumerate)?;

    let mut opened = Vec::with_capacity(devices.len());
    for (index, mut device) in devices.into_iter().enumerate() {
        let checked =
            CameraInfo::read(device.as_ref()).map(|info| (info, check_init(device.as_mut())));

        match checked {
            Ok((info, Ok(()))) => opened.push((device, info)),
            Ok((_, Err(error))) | Err(error)
                if correct && recovery::classify(&error).is_some() =>
            {
                return Err(OpenError::Device {
                    device,
                    index,
                    error,
                });
            }
            Ok((info, Err(error))) => {
                tracing::warn!(serial = %info.serial, %error, "camera failed to initialise");
                opened.push((device, info));
            }
            Err(error) => {
                tracing::error!(index, %error, "skipping camera with unreadable device information");
            }
        }
    }

    let count = opened.len();
    Ok(opened
        .into_iter()
        .enumerate()
        .map(|(index, (device, info))| Camera::new(system.clone(), device, info, index, count))
        .collect())
}

fn open_with_recovery(system: &System, policy: RecoveryPolicy) -> Result<Vec<Camera>> {
    let mut attempt = 0;

    loop {
        let correct = attempt < policy.attempts;
        let (mut device, index, error) = match open_all(system, correct) {
            Ok(cameras) => return Ok(cameras),
            Err(OpenError::Enumerate(error)) => return Err(error),
            Err(OpenError::Device {
                device,
                index,
                error,
            }) => (device, index, error),
        };
        attempt += 1;

        if let Some(correction) = recovery::classify(&error) {
            tracing::warn!(index, %error, %correction, attempt, "correcting camera");
            if let Err(error) = recovery::apply(device.as_mut(), correction) {
                tracing::error!(index, %error, %correction, "correction failed");
            }
        }
        drop(device);

        if attempt >= policy.attempts {
            tracing::error!(attempts = attempt, "giving up on correcting cameras");
        }

        tracing::info!(delay = ?policy.delay, "waiting for camera to come back");
        thread::sleep(policy.delay);
    }
}

/// All cameras attached to the system, in enumeration order.
///
/// ```
/// # fn main() -> spincams::Result<()> {
/// use spincams::{Cameras, ImageQueue, System, sdk::sim::SimSystem};
///
/// let system = System::new(SimSystem::with_cameras(2));
/// let queue = ImageQueue::unbounded();
/// let mut cameras = Cameras::builder(system.clone())
///     .queue(queue.clone())
///     .build()?;
///
/// cameras.initialise_cameras();
/// cameras.acquire_images(Some(10))?;
/// cameras.release_all_cameras();
///
/// assert_eq!(queue.len(), 20);
/// # Ok(())
/// # }
/// ```
pub struct Cameras {
    system: System,
    cameras: Vec<Camera>,
    save_folder: Option<PathBuf>,
    queue: Option<ImageQueue>,
    grab_timeout: Duration,
    verbose: bool,
    stop: StopHandle,
}

impl Cameras {
    /// Enumerates the attached cameras with default settings.
    pub fn new(system: System) -> Result<Self> {
        Self::builder(system).build()
    }

    #[must_use]
    pub fn builder(system: System) -> CamerasBuilder {
        CamerasBuilder {
            system,
            save_folder: None,
            queue: None,
            grab_timeout: DEFAULT_GRAB_TIMEOUT,
            verbose: false,
            recovery: RecoveryPolicy::default(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cameras.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cameras.is_empty()
    }

    pub fn get(&self, index: usize) -> Result<&Camera> {
        let len = self.cameras.len();
        self.cameras.get(index).ok_or(Error::Index { index, len })
    }

    pub fn get_mut(&mut self, index: usize) -> Result<&mut Camera> {
        let len = self.cameras.len();
        self.cameras.get_mut(index).ok_or(Error::Index { index, len })
    }

    pub fn get_camera_by_serial(&self, serial: &str) -> Result<&Camera> {
        self.cameras
            .iter()
            .find(|camera| camera.serial() == serial)
            .ok_or_else(|| Error::NotFound {
                serial: serial.to_string(),
            })
    }

    pub fn get_camera_by_serial_mut(&mut self, serial: &str) -> Result<&mut Camera> {
        self.cameras
            .iter_mut()
            .find(|camera| camera.serial() == serial)
            .ok_or_else(|| Error::NotFound {
                serial: serial.to_string(),
            })
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Camera> {
        self.cameras.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Camera> {
        self.cameras.iter_mut()
    }

    #[must_use]
    pub fn system(&self) -> &System {
        &self.system
    }

    #[must_use]
    pub fn save_folder(&self) -> Option<&Path> {
        self.save_folder.as_deref()
    }

    #[must_use]
    pub fn queue(&self) -> Option<&ImageQueue> {
        self.queue.as_ref()
    }

    #[must_use]
    pub fn grab_timeout(&self) -> Duration {
        self.grab_timeout
    }

    #[must_use]
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Token that stops a running [`acquire_images`](Self::acquire_images) from another thread.
    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// `SpinCameras v<version> - Spinnaker v<sdk version>`.
    pub fn version_info(&self) -> Result<String> {
        Ok(format!(
            "SpinCameras v{} - Spinnaker v{}",
            env!("CARGO_PKG_VERSION"),
            self.system.library_version()?
        ))
    }

    /// Identity of every camera, keyed by serial number.
    #[must_use]
    pub fn camera_info(&self) -> BTreeMap<String, CameraInfo> {
        self.cameras
            .iter()
            .map(|camera| (camera.serial().to_string(), camera.info().clone()))
            .collect()
    }

    /// Initialises every camera, a failing camera does not stop the others.
    pub fn initialise_cameras(&mut self) -> BatchReport {
        let mut report = BatchReport::default();
        for camera in &mut self.cameras {
            let result = camera.initialise();
            report.record("initialise", camera.serial(), result);
        }
        report
    }

    /// De-initialises every camera, a failing camera does not stop the others.
    pub fn deinitialise_cameras(&mut self) -> BatchReport {
        let mut report = BatchReport::default();
        for camera in &mut self.cameras {
            let result = camera.deinitialise();
            report.record("deinitialise", camera.serial(), result);
        }
        report
    }

    /// De-initialises and drops every camera.
    ///
    /// Calling this again, or on cameras that were never initialised, does nothing.
    pub fn release_all_cameras(&mut self) -> BatchReport {
        let report = self.deinitialise_cameras();
        if !self.cameras.is_empty() {
            tracing::debug!(count = self.cameras.len(), "releasing cameras");
        }
        self.cameras.clear();
        report
    }

    pub(crate) fn cameras_mut(&mut self) -> &mut [Camera] {
        &mut self.cameras
    }
}

impl<'a> IntoIterator for &'a Cameras {
    type Item = &'a Camera;
    type IntoIter = std::slice::Iter<'a, Camera>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a> IntoIterator for &'a mut Cameras {
    type Item = &'a mut Camera;
    type IntoIter = std::slice::IterMut<'a, Camera>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

impl fmt::Display for Cameras {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let version = self
            .version_info()
            .unwrap_or_else(|error| format!("unknown version ({error})"));
        let save_folder = self
            .save_folder
            .as_ref()
            .map_or_else(|| "none".to_string(), |path| path.display().to_string());
        let queue = self
            .queue
            .as_ref()
            .map_or_else(|| "none".to_string(), |queue| format!("{} queued", queue.len()));

        writeln!(f, "Cameras(")?;
        writeln!(f, "  {version}")?;
        writeln!(f, "  Number of cameras: {}", self.cameras.len())?;
        writeln!(f, "  Save folder: {save_folder}")?;
        writeln!(f, "  Queue: {queue}")?;
        for camera in &self.cameras {
            writeln!(
                f,
                "  [{}] {} (Serial: {}) initialised: {}, streaming: {}",
                camera.index() + 1,
                camera.model(),
                camera.serial(),
                camera.is_initialised(),
                camera.is_streaming()
            )?;
        }
        write!(f, ")")
    }
}

impl fmt::Debug for Cameras {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cameras")
            .field("cameras", &self.cameras)
            .field("save_folder", &self.save_folder)
            .field("queue", &self.queue)
            .field("grab_timeout", &self.grab_timeout)
            .field("verbose", &self.verbose)
            .finish_non_exhaustive()
    }
}

impl Drop for Cameras {
    fn drop(&mut self) {
        self.release_all_cameras();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdk::{
        NodeMap, nodes,
        sim::{SimCamera, SimSystem},
    };

    fn no_delay() -> RecoveryPolicy {
        RecoveryPolicy {
            attempts: 3,
            delay: Duration::ZERO,
        }
    }

    #[test]
    fn lookups_by_serial_and_index() {
        let cameras = Cameras::new(System::new(SimSystem::with_cameras(2))).unwrap();

        assert_eq!(cameras.len(), 2);
        assert_eq!(cameras.get(1).unwrap().serial(), "24132702");
        assert_eq!(cameras.get_camera_by_serial("24132701").unwrap().index(), 0);
        assert!(matches!(
            cameras.get(2),
            Err(Error::Index { index: 2, len: 2 })
        ));
        assert!(matches!(
            cameras.get_camera_by_serial("0"),
            Err(Error::NotFound { .. })
        ));

        let serials: Vec<_> = cameras.iter().map(Camera::serial).collect();
        assert_eq!(serials, ["24132701", "24132702"]);
    }

    #[test]
    fn missing_save_folder_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let result = Cameras::builder(System::new(SimSystem::with_cameras(1)))
            .save_folder(dir.path().join("missing"))
            .build();

        assert!(matches!(result, Err(Error::SaveFolderNotFound { .. })));
    }

    #[test]
    fn failing_camera_does_not_stop_batch() {
        let system = SimSystem::new()
            .with_camera(SimCamera::new("1"))
            .with_camera(SimCamera::new("2").fail_init("Unable to open device"))
            .with_camera(SimCamera::new("3"));
        let mut cameras = Cameras::new(System::new(system)).unwrap();

        let report = cameras.initialise_cameras();

        assert_eq!(report.succeeded, ["1", "3"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "2");
        assert!(cameras.get(2).unwrap().is_initialised());
    }

    #[test]
    fn release_is_idempotent() {
        let mut cameras = Cameras::new(System::new(SimSystem::with_cameras(2))).unwrap();
        cameras.get_mut(0).unwrap().initialise().unwrap();

        assert!(cameras.release_all_cameras().is_ok());
        assert!(cameras.is_empty());
        assert!(cameras.release_all_cameras().is_ok());
    }

    #[test]
    fn system_released_after_cameras() {
        let sim = SimSystem::with_cameras(1);
        let monitor = sim.monitor();
        let system = System::new(sim);
        let cameras = Cameras::new(system.clone()).unwrap();

        assert!(matches!(
            system.clone().release(),
            Err(Error::InvalidState { .. })
        ));

        drop(cameras);
        assert!(!monitor.is_released());
        system.release().unwrap();
        assert!(monitor.is_released());
    }

    #[test]
    fn version_and_info() {
        let cameras = Cameras::new(System::new(
            SimSystem::new().with_camera(SimCamera::new("7").model("Blackfly S").user_id("left")),
        ))
        .unwrap();

        assert_eq!(
            cameras.version_info().unwrap(),
            format!("SpinCameras v{} - Spinnaker v3.1.0.79", env!("CARGO_PKG_VERSION"))
        );
        let info = cameras.camera_info();
        assert_eq!(info["7"].model, "Blackfly S");
        assert_eq!(info["7"].user_id, "left");
    }

    #[test]
    fn wrong_subnet_is_corrected_by_forcing_ip() {
        let camera = SimCamera::new("9").wrong_subnet();
        let monitor = camera.monitor();
        let sim = SimSystem::new().with_camera(camera);
        let system_monitor = sim.monitor();

        let cameras = Cameras::builder(System::new(sim))
            .recovery(no_delay())
            .build()
            .unwrap();

        assert_eq!(cameras.len(), 1);
        assert_eq!(
            monitor.executions(NodeMap::Device, nodes::GEV_DEVICE_AUTO_FORCE_IP),
            1
        );
        assert_eq!(system_monitor.enumerations(), 2);
    }

    #[test]
    fn out_of_range_is_corrected_by_reset() {
        let camera = SimCamera::new("9").out_of_range();
        let monitor = camera.monitor();

        let cameras = Cameras::builder(System::new(SimSystem::new().with_camera(camera)))
            .recovery(no_delay())
            .build()
            .unwrap();

        assert_eq!(cameras.len(), 1);
        assert_eq!(monitor.executions(NodeMap::Camera, nodes::DEVICE_RESET), 1);
        assert!(!monitor.is_initialized());
    }

    #[test]
    fn recovery_can_be_disabled() {
        let camera = SimCamera::new("9").wrong_subnet();
        let monitor = camera.monitor();
        let mut cameras = Cameras::builder(System::new(SimSystem::new().with_camera(camera)))
            .recovery(RecoveryPolicy::disabled())
            .build()
            .unwrap();

        assert_eq!(cameras.len(), 1);
        assert_eq!(
            monitor.executions(NodeMap::Device, nodes::GEV_DEVICE_AUTO_FORCE_IP),
            0
        );

        let report = cameras.initialise_cameras();
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].1.sdk_message().unwrap().contains("wrong subnet"));
    }

    #[test]
    fn init_failure_on_wrong_subnet_forces_ip_until_attempts_run_out() {
        let camera = SimCamera::new("9").fail_init("Camera is on a wrong subnet.");
        let monitor = camera.monitor();
        let sim = SimSystem::new()
            .with_camera(SimCamera::new("1"))
            .with_camera(camera);
        let system_monitor = sim.monitor();

        let mut cameras = Cameras::builder(System::new(sim))
            .recovery(no_delay())
            .build()
            .unwrap();

        assert_eq!(
            monitor.executions(NodeMap::Device, nodes::GEV_DEVICE_AUTO_FORCE_IP),
            3
        );
        assert_eq!(system_monitor.enumerations(), 4);
        assert_eq!(cameras.len(), 2);

        let report = cameras.initialise_cameras();
        assert_eq!(report.succeeded, ["1"]);
        assert_eq!(report.failed[0].0, "9");
    }

    #[test]
    fn unreadable_camera_is_skipped() {
        let system = SimSystem::new()
            .with_camera(SimCamera::new("1"))
            .with_camera(SimCamera::new("2").unreadable_info("Unable to read DeviceModelName"))
            .with_camera(SimCamera::new("3"));

        let cameras = Cameras::builder(System::new(system))
            .recovery(no_delay())
            .build()
            .unwrap();

        let serials: Vec<_> = cameras.iter().map(Camera::serial).collect();
        assert_eq!(serials, ["1", "3"]);
        assert_eq!(cameras.get(1).unwrap().index(), 1);
    }

    #[test]
    fn display_lists_cameras() {
        let cameras = Cameras::new(System::new(SimSystem::with_cameras(2))).unwrap();
        let shown = cameras.to_string();

        assert!(shown.contains("Number of cameras: 2"));
        assert!(shown.contains("(Serial: 24132702)"));
        assert!(shown.contains("Save folder: none"));
    }
}
