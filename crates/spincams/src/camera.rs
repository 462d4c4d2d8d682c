use std::{fmt, time::Duration};

use serde::Serialize;

use crate::{
    AcquisitionMode, AutoMode, BufferMode, Error, Image, PixelFormat, Result, System, Trigger,
    sdk::{Device, Grab, NodeMap, nodes},
};

/// Default `GevSCPSPacketSize`, jumbo frames.
pub const DEFAULT_PACKET_SIZE: i64 = 9000;
/// Default `DeviceLinkThroughputLimit` in bytes per second.
pub const DEFAULT_THROUGHPUT_LIMIT: i64 = 150_000_000;

/// Called for every frame acquired by a camera that has a callback registered.
///
/// Receives the RGB8 frame and the filename generated for it. Any `FnMut(&Image, &str)` closure
/// is a callback.
pub trait FrameCallback: Send {
    fn on_frame(&mut self, image: &Image, filename: &str) -> Result<()>;
}

impl<F> FrameCallback for F
where
    F: FnMut(&Image, &str) -> Result<()> + Send,
{
    fn on_frame(&mut self, image: &Image, filename: &str) -> Result<()> {
        self(image, filename)
    }
}

/// Identity of a camera, read from the transport layer when it is enumerated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CameraInfo {
    pub model: String,
    pub serial: String,
    pub vendor: String,
    pub version: String,
    pub user_id: String,
}

impl CameraInfo {
    pub(crate) fn read(device: &dyn Device) -> Result<Self> {
        let read = |node: &str| device.string(NodeMap::Device, node);

        Ok(Self {
            model: read(nodes::DEVICE_MODEL_NAME)?,
            serial: read(nodes::DEVICE_SERIAL_NUMBER)?,
            vendor: read(nodes::DEVICE_VENDOR_NAME)?,
            version: read(nodes::DEVICE_VERSION)?,
            user_id: read(nodes::DEVICE_USER_ID)?,
        })
    }
}

/// A single FLIR camera.
///
/// Parameters can only be changed while the camera is initialised and not streaming.
pub struct Camera {
    device: Box<dyn Device>,
    info: CameraInfo,
    index: usize,
    count: usize,
    callback: Option<Box<dyn FrameCallback>>,
    // Keeps the runtime alive for as long as the device handle exists.
    _system: System,
}

impl Camera {
    pub(crate) fn new(
        system: System,
        device: Box<dyn Device>,
        info: CameraInfo,
        index: usize,
        count: usize,
    ) -> Self {
        Self {
            device,
            info,
            index,
            count,
            callback: None,
            _system: system,
        }
    }

    #[must_use]
    pub fn info(&self) -> &CameraInfo {
        &self.info
    }

    #[must_use]
    pub fn serial(&self) -> &str {
        &self.info.serial
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.info.model
    }

    /// Position of the camera in enumeration order.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn is_initialised(&self) -> bool {
        self.device.is_initialized()
    }

    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.device.is_streaming()
    }

    #[must_use]
    pub fn has_callback(&self) -> bool {
        self.callback.is_some()
    }

    /// Current sensor temperature in degrees Celsius.
    pub fn device_temperature(&self) -> Result<f64> {
        self.ensure_initialised()?;
        self.device
            .float(NodeMap::Camera, nodes::DEVICE_TEMPERATURE)
    }

    pub fn initialise(&mut self) -> Result<()> {
        if self.is_initialised() {
            return Ok(());
        }

        self.device.init()?;
        tracing::debug!(serial = self.serial(), "camera initialised");
        Ok(())
    }

    /// Stops streaming, drops the callback and de-initialises the camera.
    pub fn deinitialise(&mut self) -> Result<()> {
        self.callback = None;
        self.stop_acquisition()?;

        if self.is_initialised() {
            self.device.deinit()?;
            tracing::debug!(serial = self.serial(), "camera deinitialised");
        }

        Ok(())
    }

    pub fn start_acquisition(&mut self) -> Result<()> {
        self.ensure_initialised()?;
        if self.is_streaming() {
            return Ok(());
        }

        self.device.begin_acquisition()
    }

    pub fn stop_acquisition(&mut self) -> Result<()> {
        if !self.is_streaming() {
            return Ok(());
        }

        self.device.end_acquisition()
    }

    /// Waits up to `timeout` for the next complete frame.
    pub fn next_image(&mut self, timeout: Duration) -> Result<Image> {
        self.ensure_initialised()?;
        if !self.is_streaming() {
            return Err(Error::invalid_state(format!(
                "camera {} is not streaming, call `start_acquisition()` first",
                self.serial()
            )));
        }

        match self.device.next_image(timeout)? {
            Grab::Complete(image) => Ok(image),
            Grab::Incomplete { status } => Err(Error::IncompleteImage { status }),
        }
    }

    /// Registers the callback invoked for each acquired frame, replacing any earlier one.
    pub fn set_callback_function(&mut self, callback: impl FrameCallback + 'static) -> Result<()> {
        self.ensure_initialised()?;
        self.callback = Some(Box::new(callback));
        Ok(())
    }

    pub fn clear_callback(&mut self) {
        self.callback = None;
    }

    /// Hands a frame to the registered callback, `None` when there is none.
    pub(crate) fn dispatch(&mut self, image: &Image, filename: &str) -> Option<Result<()>> {
        self.callback
            .as_mut()
            .map(|callback| callback.on_frame(image, filename))
    }

    pub fn execute_software_trigger(&mut self) -> Result<()> {
        self.ensure_initialised()?;
        self.device
            .execute(NodeMap::Camera, nodes::TRIGGER_SOFTWARE)?;
        tracing::debug!(serial = self.serial(), "software trigger executed");
        Ok(())
    }

    /// Set the acquisition mode.
    ///
    /// Default=[`AcquisitionMode::Continuous`].
    pub fn set_acquisition_mode(&mut self, mode: AcquisitionMode) -> Result<()> {
        self.ensure_configurable()?;
        self.write_enum(NodeMap::Camera, nodes::ACQUISITION_MODE, mode.symbolic())
    }

    /// Set a fixed frame rate in frames per second.
    pub fn set_frame_rate(&mut self, frame_rate: f64) -> Result<()> {
        self.ensure_configurable()?;
        positive("frame rate", frame_rate)?;

        self.writable(NodeMap::Camera, nodes::ACQUISITION_FRAME_RATE_ENABLE)?;
        self.device
            .set_boolean(NodeMap::Camera, nodes::ACQUISITION_FRAME_RATE_ENABLE, true)?;
        self.write_clamped(nodes::ACQUISITION_FRAME_RATE, frame_rate)
    }

    /// Set the exposure mode.
    ///
    /// With [`AutoMode::Off`] an exposure time in microseconds is required, it is clamped to
    /// the maximum the camera supports.
    pub fn set_exposure(&mut self, mode: AutoMode, exposure_time: Option<f64>) -> Result<()> {
        self.ensure_configurable()?;
        let manual = manual_value("exposure time", mode, exposure_time)?;

        self.write_enum(NodeMap::Camera, nodes::EXPOSURE_AUTO, mode.symbolic())?;
        match manual {
            Some(value) => self.write_clamped(nodes::EXPOSURE_TIME, value),
            None => Ok(()),
        }
    }

    /// Set the gain mode.
    ///
    /// With [`AutoMode::Off`] a gain in dB is required, it is clamped to the camera maximum.
    pub fn set_gain(&mut self, mode: AutoMode, gain: Option<f64>) -> Result<()> {
        self.ensure_configurable()?;
        let manual = manual_value("gain", mode, gain)?;

        self.write_enum(NodeMap::Camera, nodes::GAIN_AUTO, mode.symbolic())?;
        match manual {
            Some(value) => self.write_clamped(nodes::GAIN, value),
            None => Ok(()),
        }
    }

    /// Set the white balance mode.
    ///
    /// With [`AutoMode::Off`] the red and blue balance ratios are required.
    pub fn set_white_balance(&mut self, mode: AutoMode, ratios: Option<(f64, f64)>) -> Result<()> {
        self.ensure_configurable()?;
        let ratios = match (mode, ratios) {
            (AutoMode::Off, Some((red, blue))) => {
                positive("red balance ratio", red)?;
                positive("blue balance ratio", blue)?;
                Some((red, blue))
            }
            (AutoMode::Off, None) => {
                return Err(Error::InvalidParameter {
                    parameter: "white balance ratios",
                    value: "none".to_string(),
                    expected: "red and blue ratios when white balance is `off`".to_string(),
                });
            }
            (_, Some(_)) => {
                tracing::warn!(%mode, "ignoring white balance ratios in automatic mode");
                None
            }
            (_, None) => None,
        };

        self.write_enum(NodeMap::Camera, nodes::BALANCE_WHITE_AUTO, mode.symbolic())?;
        if let Some((red, blue)) = ratios {
            for (selector, ratio) in [("Red", red), ("Blue", blue)] {
                self.write_enum(NodeMap::Camera, nodes::BALANCE_RATIO_SELECTOR, selector)?;
                self.write_clamped(nodes::BALANCE_RATIO, ratio)?;
            }
        }

        Ok(())
    }

    /// Enable or disable gamma correction, `gamma` is only written when enabled.
    pub fn set_gamma(&mut self, enable: bool, gamma: f64) -> Result<()> {
        self.ensure_configurable()?;
        if enable {
            positive("gamma", gamma)?;
        }

        self.writable(NodeMap::Camera, nodes::GAMMA_ENABLE)?;
        self.device
            .set_boolean(NodeMap::Camera, nodes::GAMMA_ENABLE, enable)?;

        if enable {
            self.write_clamped(nodes::GAMMA, gamma)?;
        }
        Ok(())
    }

    /// Set how the stream delivers buffers when the host falls behind.
    ///
    /// Default=[`BufferMode::NewestOnly`].
    pub fn set_stream_buffer_mode(&mut self, mode: BufferMode) -> Result<()> {
        self.ensure_configurable()?;
        self.write_enum(
            NodeMap::Stream,
            nodes::STREAM_BUFFER_HANDLING_MODE,
            mode.symbolic(),
        )
    }

    /// Configure triggered acquisition on the `FrameStart` selector.
    pub fn set_trigger_mode(&mut self, trigger: Trigger) -> Result<()> {
        self.ensure_configurable()?;

        // The source can only be changed while triggering is off.
        self.write_enum(NodeMap::Camera, nodes::TRIGGER_MODE, "Off")?;

        let source = match trigger {
            Trigger::Off => return Ok(()),
            Trigger::Software => "Software",
            Trigger::Hardware(line) => line.symbolic(),
        };

        self.write_enum(NodeMap::Camera, nodes::TRIGGER_SELECTOR, "FrameStart")?;
        self.write_enum(NodeMap::Camera, nodes::TRIGGER_SOURCE, source)?;
        self.write_enum(NodeMap::Camera, nodes::TRIGGER_MODE, "On")?;

        tracing::info!(serial = self.serial(), source, "trigger enabled");
        Ok(())
    }

    /// Set the GigE stream packet size in bytes.
    ///
    /// Default=[`DEFAULT_PACKET_SIZE`].
    pub fn set_packet_size(&mut self, packet_size: i64) -> Result<()> {
        self.ensure_configurable()?;
        self.write_integer("packet size", nodes::GEV_SCPS_PACKET_SIZE, packet_size)
    }

    /// Set the link throughput limit in bytes per second.
    ///
    /// Default=[`DEFAULT_THROUGHPUT_LIMIT`].
    pub fn set_device_throughput_limit(&mut self, limit: i64) -> Result<()> {
        self.ensure_configurable()?;
        self.write_integer(
            "device throughput limit",
            nodes::DEVICE_LINK_THROUGHPUT_LIMIT,
            limit,
        )
    }

    /// Set the pixel format, which must be offered by this camera.
    ///
    /// Default=[`PixelFormat::BayerRG8`].
    pub fn set_pixel_format(&mut self, pixel_format: PixelFormat) -> Result<()> {
        self.ensure_configurable()?;
        self.writable(NodeMap::Camera, nodes::PIXEL_FORMAT)?;

        let available = self
            .device
            .enum_entries(NodeMap::Camera, nodes::PIXEL_FORMAT)?;
        if !available.iter().any(|entry| entry == pixel_format.symbolic()) {
            return Err(Error::InvalidParameter {
                parameter: "pixel format",
                value: pixel_format.to_string(),
                expected: format!("one of the available formats: {}", available.join(", ")),
            });
        }

        self.device
            .set_enum(NodeMap::Camera, nodes::PIXEL_FORMAT, pixel_format.symbolic())
    }

    /// Forces the camera onto the host's subnet.
    pub fn force_ip(&mut self) -> Result<()> {
        crate::recovery::force_ip(self.device.as_mut())
    }

    /// Power cycles the camera. It has to be enumerated again afterwards.
    pub fn reset(&mut self) -> Result<()> {
        self.callback = None;
        crate::recovery::reset(self.device.as_mut())
    }

    fn ensure_initialised(&self) -> Result<()> {
        if self.is_initialised() {
            Ok(())
        } else {
            Err(Error::invalid_state(format!(
                "camera {} is not initialised",
                self.serial()
            )))
        }
    }

    fn ensure_configurable(&self) -> Result<()> {
        self.ensure_initialised()?;
        if self.is_streaming() {
            return Err(Error::invalid_state(format!(
                "camera {} is streaming, stop acquisition before changing parameters",
                self.serial()
            )));
        }

        Ok(())
    }

    fn writable(&self, map: NodeMap, node: &str) -> Result<()> {
        let mode = self.device.access_mode(map, node)?;
        if mode.is_readable() && mode.is_writable() {
            Ok(())
        } else {
            Err(Error::NodeAccess {
                node: node.to_string(),
            })
        }
    }

    fn write_enum(&mut self, map: NodeMap, node: &str, symbolic: &str) -> Result<()> {
        self.writable(map, node)?;
        self.device.set_enum(map, node, symbolic)
    }

    fn write_clamped(&mut self, node: &str, value: f64) -> Result<()> {
        self.writable(NodeMap::Camera, node)?;

        let max = self.device.float_max(NodeMap::Camera, node)?;
        if value > max {
            tracing::warn!(node, value, max, "value exceeds maximum, clamping");
        }
        self.device.set_float(NodeMap::Camera, node, value.min(max))
    }

    fn write_integer(&mut self, parameter: &'static str, node: &str, value: i64) -> Result<()> {
        if value <= 0 {
            return Err(Error::InvalidParameter {
                parameter,
                value: value.to_string(),
                expected: "a positive integer".to_string(),
            });
        }

        self.writable(NodeMap::Camera, node)?;
        self.device.set_integer(NodeMap::Camera, node, value)
    }
}

fn positive(parameter: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidParameter {
            parameter,
            value: value.to_string(),
            expected: "a finite value greater than zero".to_string(),
        })
    }
}

fn manual_value(parameter: &'static str, mode: AutoMode, value: Option<f64>) -> Result<Option<f64>> {
    match (mode, value) {
        (AutoMode::Off, Some(value)) => positive(parameter, value).map(|()| Some(value)),
        (AutoMode::Off, None) => Err(Error::InvalidParameter {
            parameter,
            value: "none".to_string(),
            expected: "a manual value when the automatic mode is `off`".to_string(),
        }),
        (_, Some(value)) => {
            tracing::warn!(parameter, value, %mode, "ignoring manual value in automatic mode");
            Ok(None)
        }
        (_, None) => Ok(None),
    }
}

impl fmt::Display for Camera {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let temperature = match self.device_temperature() {
            Ok(celsius) => format!("{celsius:.2}\u{2103}"),
            Err(_) => "unavailable".to_string(),
        };

        writeln!(f, "Camera(")?;
        writeln!(f, "  Model: {} (Serial: {})", self.info.model, self.info.serial)?;
        writeln!(f, "  Index: {} (out of {} cameras)", self.index + 1, self.count)?;
        writeln!(f, "  Temperature: {temperature}")?;
        writeln!(f, "  Initialised: {}", self.is_initialised())?;
        writeln!(f, "  Streaming: {}", self.is_streaming())?;
        writeln!(f, "  Callback set: {}", self.has_callback())?;
        write!(f, ")")
    }
}

impl fmt::Debug for Camera {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Camera")
            .field("info", &self.info)
            .field("index", &self.index)
            .field("initialised", &self.is_initialised())
            .field("streaming", &self.is_streaming())
            .field("callback", &self.has_callback())
            .finish_non_exhaustive()
    }
}

impl Drop for Camera {
    fn drop(&mut self) {
        if let Err(error) = self.deinitialise() {
            tracing::warn!(serial = self.serial(), %error, "failed to tear down camera");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        TriggerLine,
        sdk::sim::{SimCamera, SimMonitor, SimSystem},
    };

    fn open(camera: SimCamera) -> (Camera, SimMonitor) {
        let monitor = camera.monitor();
        let system = System::new(SimSystem::new().with_camera(camera));
        let device = system.enumerate().unwrap().remove(0);
        let info = CameraInfo::read(device.as_ref()).unwrap();
        (Camera::new(system, device, info, 0, 1), monitor)
    }

    #[test]
    fn reads_identity_without_init() {
        let (camera, monitor) = open(SimCamera::new("24132701").model("BFS-U3-16S2C"));

        assert_eq!(camera.serial(), "24132701");
        assert_eq!(camera.model(), "BFS-U3-16S2C");
        assert!(!monitor.is_initialized());
    }

    #[test]
    fn setters_need_initialisation() {
        let (mut camera, monitor) = open(SimCamera::new("1"));

        assert!(matches!(
            camera.set_acquisition_mode(AcquisitionMode::SingleFrame),
            Err(Error::InvalidState { .. })
        ));
        assert!(matches!(
            camera.set_frame_rate(10.0),
            Err(Error::InvalidState { .. })
        ));
        assert!(matches!(
            camera.set_callback_function(|_: &Image, _: &str| -> Result<()> { Ok(()) }),
            Err(Error::InvalidState { .. })
        ));
        assert!(camera.device_temperature().is_err());

        let results = [
            camera.set_pixel_format(PixelFormat::RGB8),
            camera.set_stream_buffer_mode(BufferMode::OldestFirst),
            camera.set_trigger_mode(Trigger::Software),
            camera.set_exposure(AutoMode::Off, Some(1000.0)),
            camera.set_gain(AutoMode::Continuous, None),
            camera.set_white_balance(AutoMode::Off, Some((1.2, 1.8))),
            camera.set_gamma(true, 0.8),
            camera.set_packet_size(DEFAULT_PACKET_SIZE),
            camera.set_device_throughput_limit(DEFAULT_THROUGHPUT_LIMIT),
            camera.execute_software_trigger(),
        ];
        for result in results {
            assert!(matches!(result, Err(Error::InvalidState { .. })), "{result:?}");
        }
        assert!(monitor.writes().is_empty());
    }

    #[test]
    fn deinitialise_drops_callback_when_stopping_fails() {
        let (mut camera, monitor) = open(SimCamera::new("1").fail_stop("Stream is busy"));
        camera.initialise().unwrap();
        camera
            .set_callback_function(|_: &Image, _: &str| -> Result<()> { Ok(()) })
            .unwrap();
        camera.start_acquisition().unwrap();

        assert!(camera.deinitialise().is_err());
        assert!(!camera.has_callback());
        assert!(monitor.is_streaming());
    }

    #[test]
    fn setters_rejected_while_streaming() {
        let (mut camera, _) = open(SimCamera::new("1"));
        camera.initialise().unwrap();
        camera.start_acquisition().unwrap();

        assert!(matches!(
            camera.set_gain(AutoMode::Continuous, None),
            Err(Error::InvalidState { .. })
        ));
    }

    #[test]
    fn exposure_is_clamped_to_maximum() {
        let (mut camera, monitor) = open(SimCamera::new("1"));
        camera.initialise().unwrap();

        camera.set_exposure(AutoMode::Off, Some(1e9)).unwrap();

        assert_eq!(
            monitor.enum_value(NodeMap::Camera, nodes::EXPOSURE_AUTO).as_deref(),
            Some("Off")
        );
        assert_eq!(monitor.float_value(nodes::EXPOSURE_TIME), Some(30_000_000.0));
    }

    #[test]
    fn manual_modes_need_a_value() {
        let (mut camera, _) = open(SimCamera::new("1"));
        camera.initialise().unwrap();

        assert!(matches!(
            camera.set_exposure(AutoMode::Off, None),
            Err(Error::InvalidParameter { .. })
        ));
        assert!(matches!(
            camera.set_gain(AutoMode::Off, Some(-1.0)),
            Err(Error::InvalidParameter { .. })
        ));
        assert!(matches!(
            camera.set_frame_rate(0.0),
            Err(Error::InvalidParameter { .. })
        ));
    }

    #[test]
    fn white_balance_writes_both_ratios() {
        let (mut camera, monitor) = open(SimCamera::new("1"));
        camera.initialise().unwrap();

        camera
            .set_white_balance(AutoMode::Off, Some((1.5, 2.25)))
            .unwrap();

        let writes = monitor.writes();
        assert_eq!(
            writes,
            [
                "BalanceWhiteAuto=Off",
                "BalanceRatioSelector=Red",
                "BalanceRatio=1.5",
                "BalanceRatioSelector=Blue",
                "BalanceRatio=2.25",
            ]
        );
    }

    #[test]
    fn trigger_is_switched_off_before_source_changes() {
        let (mut camera, monitor) = open(SimCamera::new("1"));
        camera.initialise().unwrap();

        camera
            .set_trigger_mode(Trigger::Hardware(TriggerLine::Line2))
            .unwrap();

        assert_eq!(
            monitor.writes(),
            [
                "TriggerMode=Off",
                "TriggerSelector=FrameStart",
                "TriggerSource=Line2",
                "TriggerMode=On",
            ]
        );
    }

    #[test]
    fn unavailable_pixel_format_lists_alternatives() {
        let (mut camera, monitor) =
            open(SimCamera::new("1").pixel_formats(&[PixelFormat::Mono8, PixelFormat::Mono16]));
        camera.initialise().unwrap();

        let err = camera.set_pixel_format(PixelFormat::BayerRG8).unwrap_err();
        let Error::InvalidParameter { expected, .. } = err else {
            panic!("expected InvalidParameter, got {err:?}");
        };
        assert!(expected.contains("Mono16"));

        camera.set_pixel_format(PixelFormat::Mono16).unwrap();
        assert_eq!(
            monitor.enum_value(NodeMap::Camera, nodes::PIXEL_FORMAT).as_deref(),
            Some("Mono16")
        );
    }

    #[test]
    fn stream_buffer_mode_uses_stream_node_map() {
        let (mut camera, monitor) = open(SimCamera::new("1"));
        camera.initialise().unwrap();

        camera
            .set_stream_buffer_mode(BufferMode::OldestFirstOverwrite)
            .unwrap();

        assert_eq!(
            monitor
                .enum_value(NodeMap::Stream, nodes::STREAM_BUFFER_HANDLING_MODE)
                .as_deref(),
            Some("OldestFirstOverwrite")
        );
    }

    #[test]
    fn incomplete_frames_are_errors() {
        let (mut camera, _) = open(SimCamera::new("1").incomplete_every(2));
        camera.initialise().unwrap();
        camera.start_acquisition().unwrap();

        let timeout = Duration::from_millis(100);
        assert!(camera.next_image(timeout).is_ok());
        assert!(matches!(
            camera.next_image(timeout),
            Err(Error::IncompleteImage { status: 4 })
        ));
    }

    #[test]
    fn deinitialise_drops_callback_and_stream() {
        let (mut camera, monitor) = open(SimCamera::new("1"));
        camera.initialise().unwrap();
        camera
            .set_callback_function(|_: &Image, _: &str| -> Result<()> { Ok(()) })
            .unwrap();
        camera.start_acquisition().unwrap();

        camera.deinitialise().unwrap();

        assert!(!camera.has_callback());
        assert!(!monitor.is_streaming());
        assert!(!monitor.is_initialized());
    }

    #[test]
    fn display_shows_status() {
        let (mut camera, _) = open(SimCamera::new("42").model("Blackfly"));
        camera.initialise().unwrap();

        let shown = camera.to_string();
        assert!(shown.contains("Model: Blackfly (Serial: 42)"));
        assert!(shown.contains("Index: 1 (out of 1 cameras)"));
        assert!(shown.contains("Temperature: 41.50"));
        assert!(shown.contains("Callback set: false"));
    }
}
