//! Boundary to the vendor camera runtime.
//!
//! Everything the wrapper needs from Spinnaker is expressed by two traits: [`Backend`] for the
//! process-wide runtime and [`Device`] for a single enumerated camera. Parameters are read and
//! written through GenICam nodes addressed by name, exactly as the SDK exposes them.
use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use crate::{Error, Image, Result};

pub mod sim;
#[cfg(feature = "spinnaker")]
pub mod spinnaker;

/// Spinnaker error codes surfaced through [`Error::Sdk`].
pub mod codes {
    pub const ERROR: i32 = -1001;
    pub const NOT_INITIALIZED: i32 = -1002;
    pub const RESOURCE_IN_USE: i32 = -1004;
    pub const ACCESS_DENIED: i32 = -1005;
    pub const INVALID_HANDLE: i32 = -1006;
    pub const INVALID_PARAMETER: i32 = -1009;
    pub const IO: i32 = -1010;
    pub const TIMEOUT: i32 = -1011;
    pub const NOT_AVAILABLE: i32 = -1014;
}

/// Names of the GenICam nodes used by the wrapper.
pub mod nodes {
    // Transport layer device node map, readable without initialising the camera.
    pub const DEVICE_SERIAL_NUMBER: &str = "DeviceSerialNumber";
    pub const DEVICE_MODEL_NAME: &str = "DeviceModelName";
    pub const DEVICE_VENDOR_NAME: &str = "DeviceVendorName";
    pub const DEVICE_VERSION: &str = "DeviceVersion";
    pub const DEVICE_USER_ID: &str = "DeviceUserID";
    pub const GEV_DEVICE_AUTO_FORCE_IP: &str = "GevDeviceAutoForceIP";
    pub const GEV_DEVICE_IP_ADDRESS: &str = "GevDeviceIPAddress";

    // Transport layer stream node map.
    pub const STREAM_BUFFER_HANDLING_MODE: &str = "StreamBufferHandlingMode";

    // GenICam camera node map.
    pub const ACQUISITION_MODE: &str = "AcquisitionMode";
    pub const ACQUISITION_FRAME_RATE: &str = "AcquisitionFrameRate";
    pub const ACQUISITION_FRAME_RATE_ENABLE: &str = "AcquisitionFrameRateEnable";
    pub const BALANCE_RATIO: &str = "BalanceRatio";
    pub const BALANCE_RATIO_SELECTOR: &str = "BalanceRatioSelector";
    pub const BALANCE_WHITE_AUTO: &str = "BalanceWhiteAuto";
    pub const DEVICE_LINK_THROUGHPUT_LIMIT: &str = "DeviceLinkThroughputLimit";
    pub const DEVICE_RESET: &str = "DeviceReset";
    pub const DEVICE_TEMPERATURE: &str = "DeviceTemperature";
    pub const EXPOSURE_AUTO: &str = "ExposureAuto";
    pub const EXPOSURE_TIME: &str = "ExposureTime";
    pub const GAIN: &str = "Gain";
    pub const GAIN_AUTO: &str = "GainAuto";
    pub const GAMMA: &str = "Gamma";
    pub const GAMMA_ENABLE: &str = "GammaEnable";
    pub const GEV_SCPS_PACKET_SIZE: &str = "GevSCPSPacketSize";
    pub const HEIGHT: &str = "Height";
    pub const PIXEL_FORMAT: &str = "PixelFormat";
    pub const TRIGGER_MODE: &str = "TriggerMode";
    pub const TRIGGER_SELECTOR: &str = "TriggerSelector";
    pub const TRIGGER_SOFTWARE: &str = "TriggerSoftware";
    pub const TRIGGER_SOURCE: &str = "TriggerSource";
    pub const WIDTH: &str = "Width";
}

/// The node map a GenICam node lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeMap {
    /// The camera's own GenICam node map, only available while initialised.
    Camera,
    /// Transport layer stream parameters, only available while initialised.
    Stream,
    /// Transport layer device information, always available.
    Device,
}

/// GenICam access mode of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    NotAvailable,
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl AccessMode {
    #[must_use]
    pub fn is_readable(self) -> bool {
        matches!(self, AccessMode::ReadOnly | AccessMode::ReadWrite)
    }

    #[must_use]
    pub fn is_writable(self) -> bool {
        matches!(self, AccessMode::WriteOnly | AccessMode::ReadWrite)
    }
}

/// Version of the vendor runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LibraryVersion {
    pub major: u32,
    pub minor: u32,
    pub kind: u32,
    pub build: u32,
}

impl fmt::Display for LibraryVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}.{}", self.major, self.minor, self.kind, self.build)
    }
}

/// Result of waiting for the next buffer.
#[derive(Debug)]
pub enum Grab {
    Complete(Image),
    /// The transfer finished with missing data, `status` is the SDK image status.
    Incomplete { status: i32 },
}

/// The process-wide vendor runtime.
pub trait Backend: Send + Sync {
    fn library_version(&self) -> Result<LibraryVersion>;

    /// Lists the cameras currently attached, in enumeration order.
    fn enumerate(&self) -> Result<Vec<Box<dyn Device>>>;

    /// Releases the runtime, called exactly once.
    fn release(&self) -> Result<()>;
}

/// A single enumerated camera.
pub trait Device: Send {
    fn init(&mut self) -> Result<()>;
    fn deinit(&mut self) -> Result<()>;
    fn is_initialized(&self) -> bool;
    fn is_streaming(&self) -> bool;

    fn begin_acquisition(&mut self) -> Result<()>;
    fn end_acquisition(&mut self) -> Result<()>;

    /// Waits up to `timeout` for the next buffer and copies it out of the SDK.
    fn next_image(&mut self, timeout: Duration) -> Result<Grab>;

    fn access_mode(&self, map: NodeMap, node: &str) -> Result<AccessMode>;

    fn string(&self, map: NodeMap, node: &str) -> Result<String>;
    fn integer(&self, map: NodeMap, node: &str) -> Result<i64>;
    fn set_integer(&mut self, map: NodeMap, node: &str, value: i64) -> Result<()>;
    fn float(&self, map: NodeMap, node: &str) -> Result<f64>;
    fn float_max(&self, map: NodeMap, node: &str) -> Result<f64>;
    fn set_float(&mut self, map: NodeMap, node: &str, value: f64) -> Result<()>;
    fn set_boolean(&mut self, map: NodeMap, node: &str, value: bool) -> Result<()>;

    /// Symbolic names of the enumeration entries that are currently available.
    fn enum_entries(&self, map: NodeMap, node: &str) -> Result<Vec<String>>;
    fn enum_value(&self, map: NodeMap, node: &str) -> Result<String>;
    fn set_enum(&mut self, map: NodeMap, node: &str, symbolic: &str) -> Result<()>;

    fn execute(&mut self, map: NodeMap, node: &str) -> Result<()>;
}

struct Runtime {
    backend: Box<dyn Backend>,
    released: AtomicBool,
}

impl Runtime {
    fn release(&self) -> Result<()> {
        if self.released.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        tracing::debug!("releasing camera runtime");
        self.backend.release()
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        if let Err(error) = self.release() {
            tracing::error!(%error, "failed to release camera runtime");
        }
    }
}

/// Handle to the vendor runtime.
///
/// Handles are cheap to clone and all share the same runtime; every [`Camera`](crate::Camera)
/// keeps one, so the runtime is only released once the cameras are gone.
#[derive(Clone)]
pub struct System {
    runtime: Arc<Runtime>,
}

impl System {
    pub fn new(backend: impl Backend + 'static) -> Self {
        Self {
            runtime: Arc::new(Runtime {
                backend: Box::new(backend),
                released: AtomicBool::new(false),
            }),
        }
    }

    /// Acquires the Spinnaker runtime.
    #[cfg(feature = "spinnaker")]
    pub fn spinnaker() -> Result<Self> {
        spinnaker::SpinnakerSystem::acquire().map(Self::new)
    }

    pub fn library_version(&self) -> Result<LibraryVersion> {
        self.runtime.backend.library_version()
    }

    pub(crate) fn enumerate(&self) -> Result<Vec<Box<dyn Device>>> {
        self.runtime.backend.enumerate()
    }

    /// Number of handles sharing the runtime, this one included.
    #[must_use]
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.runtime)
    }

    /// Releases the runtime.
    ///
    /// Fails with [`Error::InvalidState`] while cameras still hold the runtime; in that case it
    /// is released as soon as the last camera is dropped.
    pub fn release(self) -> Result<()> {
        match Arc::try_unwrap(self.runtime) {
            Ok(runtime) => runtime.release(),
            Err(runtime) => Err(Error::invalid_state(format!(
                "{} camera handle(s) still use the system, release the cameras first",
                Arc::strong_count(&runtime) - 1
            ))),
        }
    }
}

impl fmt::Debug for System {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("System")
            .field("handles", &self.handle_count())
            .field("released", &self.runtime.released.load(Ordering::SeqCst))
            .finish()
    }
}
