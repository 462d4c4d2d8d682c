//! In-process stand-in for the Spinnaker runtime.
//!
//! Simulated cameras expose the same GenICam nodes the wrapper touches on real hardware, with
//! the same availability rules: camera and stream nodes disappear while the camera is not
//! initialised, and format nodes become read-only while streaming. Frames are synthetic
//! gradients in whatever pixel format is selected.
//!
//! Faults can be injected to exercise error isolation and device recovery.
use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
    time::Duration,
};

use super::{AccessMode, Backend, Device, Grab, LibraryVersion, NodeMap, codes, nodes};
use crate::{Error, Image, PixelFormat, Result};

const WRONG_SUBNET: &str = "Camera is on a wrong subnet.";
const OUT_OF_RANGE: &str = "GenICam::OutOfRangeException= Value out of range for node DeviceUserID";

/// Simulated runtime holding a fixed set of cameras.
pub struct SimSystem {
    version: LibraryVersion,
    cameras: Vec<SimCamera>,
    monitor: SimSystemMonitor,
}

impl Default for SimSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl SimSystem {
    #[must_use]
    pub fn new() -> Self {
        Self {
            version: LibraryVersion {
                major: 3,
                minor: 1,
                kind: 0,
                build: 79,
            },
            cameras: Vec::new(),
            monitor: SimSystemMonitor::default(),
        }
    }

    /// A runtime with `count` default cameras, serial numbers counting up from `24132701`.
    #[must_use]
    pub fn with_cameras(count: usize) -> Self {
        (0..count).fold(Self::new(), |system, index| {
            system.with_camera(SimCamera::new(format!("{}", 24_132_701 + index)))
        })
    }

    #[must_use]
    pub fn with_camera(mut self, camera: SimCamera) -> Self {
        self.cameras.push(camera);
        self
    }

    #[must_use]
    pub fn with_version(mut self, version: LibraryVersion) -> Self {
        self.version = version;
        self
    }

    #[must_use]
    pub fn monitor(&self) -> SimSystemMonitor {
        self.monitor.clone()
    }
}

impl Backend for SimSystem {
    fn library_version(&self) -> Result<LibraryVersion> {
        Ok(self.version)
    }

    fn enumerate(&self) -> Result<Vec<Box<dyn Device>>> {
        self.monitor.enumerations.fetch_add(1, Ordering::SeqCst);

        Ok(self
            .cameras
            .iter()
            .map(|camera| {
                Box::new(SimDevice {
                    state: camera.state.clone(),
                }) as Box<dyn Device>
            })
            .collect())
    }

    fn release(&self) -> Result<()> {
        self.monitor.releases.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Observes a [`SimSystem`] after it has been handed to a [`System`](crate::System).
#[derive(Debug, Clone, Default)]
pub struct SimSystemMonitor {
    enumerations: Arc<AtomicUsize>,
    releases: Arc<AtomicUsize>,
}

impl SimSystemMonitor {
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.release_count() > 0
    }

    #[must_use]
    pub fn release_count(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn enumerations(&self) -> usize {
        self.enumerations.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Enum {
        entries: Vec<String>,
        current: String,
    },
    Float {
        value: f64,
        max: f64,
    },
    Integer(i64),
    Boolean(bool),
    String(String),
    Command(u32),
}

#[derive(Debug, Clone)]
struct Node {
    value: Value,
    writable: bool,
    /// Locked while the camera is streaming, like the image format nodes.
    streaming_locked: bool,
}

/// Faults raised by `init` that a recovery correction clears.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkFault {
    WrongSubnet,
    OutOfRange,
}

#[derive(Debug)]
struct SimState {
    nodes: HashMap<(NodeMap, String), Node>,
    initialized: bool,
    streaming: bool,
    realtime: bool,
    frames: u64,
    incomplete_every: Option<u64>,
    pending_triggers: u32,
    init_fault: Option<String>,
    link_fault: Option<LinkFault>,
    info_fault: Option<String>,
    stop_fault: Option<String>,
    writes: Vec<String>,
}

impl SimState {
    fn node(&self, map: NodeMap, name: &str) -> Result<&Node> {
        if map != NodeMap::Device && !self.initialized {
            return Err(Error::sdk(
                codes::NOT_INITIALIZED,
                format!("Camera is not initialized, cannot access node {name}"),
            ));
        }

        self.nodes
            .get(&(map, name.to_string()))
            .ok_or_else(|| Error::sdk(codes::NOT_AVAILABLE, format!("Node {name} not found")))
    }

    fn writable_node(&mut self, map: NodeMap, name: &str) -> Result<&mut Node> {
        let streaming = self.streaming;
        self.node(map, name)?;

        let node = self
            .nodes
            .get_mut(&(map, name.to_string()))
            .ok_or_else(|| Error::sdk(codes::NOT_AVAILABLE, format!("Node {name} not found")))?;

        if !node.writable || (streaming && node.streaming_locked) {
            return Err(Error::sdk(
                codes::ACCESS_DENIED,
                format!("Node {name} is not writable"),
            ));
        }

        Ok(node)
    }

    fn enum_current(&self, map: NodeMap, name: &str) -> Option<&str> {
        match self.nodes.get(&(map, name.to_string())).map(|node| &node.value) {
            Some(Value::Enum { current, .. }) => Some(current),
            _ => None,
        }
    }

    fn integer_value(&self, name: &str) -> i64 {
        match self.nodes.get(&(NodeMap::Camera, name.to_string())).map(|node| &node.value) {
            Some(Value::Integer(value)) => *value,
            _ => 0,
        }
    }

    fn frame_interval(&self) -> Option<Duration> {
        let enabled = matches!(
            self.nodes
                .get(&(NodeMap::Camera, nodes::ACQUISITION_FRAME_RATE_ENABLE.to_string()))
                .map(|node| &node.value),
            Some(Value::Boolean(true))
        );
        let rate = match self
            .nodes
            .get(&(NodeMap::Camera, nodes::ACQUISITION_FRAME_RATE.to_string()))
            .map(|node| &node.value)
        {
            Some(Value::Float { value, .. }) if enabled && *value > 0.0 => *value,
            _ => return None,
        };

        Some(Duration::from_secs_f64(1.0 / rate))
    }

    fn synthesize(&self) -> Result<Image> {
        let width = self.integer_value(nodes::WIDTH) as usize;
        let height = self.integer_value(nodes::HEIGHT) as usize;
        let pixel_format = self
            .enum_current(NodeMap::Camera, nodes::PIXEL_FORMAT)
            .and_then(|symbolic| symbolic.parse::<PixelFormat>().ok())
            .unwrap_or_default();
        let bytes_per_pixel = pixel_format.bytes_per_pixel();
        let frame = self.frames as usize;

        let mut data = Vec::with_capacity(width * height * bytes_per_pixel);
        for y in 0..height {
            for x in 0..width {
                for channel in 0..bytes_per_pixel {
                    data.push(((x + y + frame + channel * 85) % 256) as u8);
                }
            }
        }

        Ok(Image::new(width, height, pixel_format, data)?
            .with_frame_id(self.frames, self.frames * 50_000_000))
    }
}

/// A simulated camera, configured before it is added to a [`SimSystem`].
pub struct SimCamera {
    state: Arc<Mutex<SimState>>,
}

impl SimCamera {
    #[must_use]
    pub fn new(serial: impl Into<String>) -> Self {
        use NodeMap::{Camera, Device, Stream};

        let mut table = HashMap::new();

        let mut insert = |map: NodeMap, name: &str, value: Value, writable: bool, locked: bool| {
            table.insert(
                (map, name.to_string()),
                Node {
                    value,
                    writable,
                    streaming_locked: locked,
                },
            );
        };
        let choice = |entries: &[&str], current: &str| Value::Enum {
            entries: entries.iter().map(ToString::to_string).collect(),
            current: current.to_string(),
        };

        insert(Device, nodes::DEVICE_SERIAL_NUMBER, Value::String(serial.into()), false, false);
        insert(
            Device,
            nodes::DEVICE_MODEL_NAME,
            Value::String("Blackfly S BFS-PGE-50S5C".to_string()),
            false,
            false,
        );
        insert(
            Device,
            nodes::DEVICE_VENDOR_NAME,
            Value::String("FLIR".to_string()),
            false,
            false,
        );
        insert(
            Device,
            nodes::DEVICE_VERSION,
            Value::String("1910.0.0.0".to_string()),
            false,
            false,
        );
        insert(Device, nodes::DEVICE_USER_ID, Value::String(String::new()), false, false);
        insert(Device, nodes::GEV_DEVICE_AUTO_FORCE_IP, Value::Command(0), true, false);
        insert(Device, nodes::GEV_DEVICE_IP_ADDRESS, Value::Integer(0xA9FE_0A0B), false, false);

        insert(
            Stream,
            nodes::STREAM_BUFFER_HANDLING_MODE,
            choice(
                &["NewestOnly", "NewestFirst", "OldestFirst", "OldestFirstOverwrite"],
                "OldestFirst",
            ),
            true,
            false,
        );

        insert(
            Camera,
            nodes::PIXEL_FORMAT,
            choice(
                &["Mono8", "Mono16", "RGB8", "RGB8Packed", "BGR8", "BayerRG8"],
                "BayerRG8",
            ),
            true,
            true,
        );
        insert(Camera, nodes::WIDTH, Value::Integer(64), true, true);
        insert(Camera, nodes::HEIGHT, Value::Integer(48), true, true);
        insert(
            Camera,
            nodes::ACQUISITION_MODE,
            choice(&["Continuous", "SingleFrame", "MultiFrame"], "Continuous"),
            true,
            true,
        );
        insert(Camera, nodes::ACQUISITION_FRAME_RATE_ENABLE, Value::Boolean(false), true, false);
        insert(
            Camera,
            nodes::ACQUISITION_FRAME_RATE,
            Value::Float {
                value: 30.0,
                max: 75.0,
            },
            true,
            false,
        );
        let auto = ["Off", "Once", "Continuous"];
        insert(Camera, nodes::EXPOSURE_AUTO, choice(&auto, "Continuous"), true, false);
        insert(
            Camera,
            nodes::EXPOSURE_TIME,
            Value::Float {
                value: 5000.0,
                max: 30_000_000.0,
            },
            true,
            false,
        );
        insert(Camera, nodes::GAIN_AUTO, choice(&auto, "Continuous"), true, false);
        insert(
            Camera,
            nodes::GAIN,
            Value::Float {
                value: 0.0,
                max: 47.99,
            },
            true,
            false,
        );
        insert(Camera, nodes::BALANCE_WHITE_AUTO, choice(&auto, "Continuous"), true, false);
        insert(
            Camera,
            nodes::BALANCE_RATIO_SELECTOR,
            choice(&["Red", "Blue"], "Red"),
            true,
            false,
        );
        insert(
            Camera,
            nodes::BALANCE_RATIO,
            Value::Float {
                value: 1.0,
                max: 8.0,
            },
            true,
            false,
        );
        insert(Camera, nodes::GAMMA_ENABLE, Value::Boolean(false), true, false);
        insert(
            Camera,
            nodes::GAMMA,
            Value::Float {
                value: 0.8,
                max: 4.0,
            },
            true,
            false,
        );
        insert(Camera, nodes::TRIGGER_MODE, choice(&["Off", "On"], "Off"), true, false);
        insert(
            Camera,
            nodes::TRIGGER_SELECTOR,
            choice(&["FrameStart", "AcquisitionStart"], "FrameStart"),
            true,
            false,
        );
        insert(
            Camera,
            nodes::TRIGGER_SOURCE,
            choice(&["Software", "Line0", "Line1", "Line2", "Line3"], "Line0"),
            true,
            false,
        );
        insert(Camera, nodes::TRIGGER_SOFTWARE, Value::Command(0), true, false);
        insert(Camera, nodes::GEV_SCPS_PACKET_SIZE, Value::Integer(1500), true, true);
        insert(
            Camera,
            nodes::DEVICE_LINK_THROUGHPUT_LIMIT,
            Value::Integer(125_000_000),
            true,
            false,
        );
        insert(
            Camera,
            nodes::DEVICE_TEMPERATURE,
            Value::Float {
                value: 41.5,
                max: 100.0,
            },
            false,
            false,
        );
        insert(Camera, nodes::DEVICE_RESET, Value::Command(0), true, false);

        Self {
            state: Arc::new(Mutex::new(SimState {
                nodes: table,
                initialized: false,
                streaming: false,
                realtime: false,
                frames: 0,
                incomplete_every: None,
                pending_triggers: 0,
                init_fault: None,
                link_fault: None,
                info_fault: None,
                stop_fault: None,
                writes: Vec::new(),
            })),
        }
    }

    fn set_string(self, name: &str, value: impl Into<String>) -> Self {
        if let Some(node) = lock(&self.state)
            .nodes
            .get_mut(&(NodeMap::Device, name.to_string()))
        {
            node.value = Value::String(value.into());
        }
        self
    }

    #[must_use]
    pub fn model(self, model: impl Into<String>) -> Self {
        self.set_string(nodes::DEVICE_MODEL_NAME, model)
    }

    #[must_use]
    pub fn user_id(self, user_id: impl Into<String>) -> Self {
        self.set_string(nodes::DEVICE_USER_ID, user_id)
    }

    /// Sets the sensor size of the generated frames.
    #[must_use]
    pub fn resolution(self, width: i64, height: i64) -> Self {
        {
            let mut state = lock(&self.state);
            for (name, value) in [(nodes::WIDTH, width), (nodes::HEIGHT, height)] {
                if let Some(node) = state.nodes.get_mut(&(NodeMap::Camera, name.to_string())) {
                    node.value = Value::Integer(value);
                }
            }
        }
        self
    }

    /// Restricts the pixel formats the camera offers.
    #[must_use]
    pub fn pixel_formats(self, formats: &[PixelFormat]) -> Self {
        if let Some(first) = formats.first() {
            let mut state = lock(&self.state);
            if let Some(node) = state
                .nodes
                .get_mut(&(NodeMap::Camera, nodes::PIXEL_FORMAT.to_string()))
            {
                node.value = Value::Enum {
                    entries: formats.iter().map(|f| f.symbolic().to_string()).collect(),
                    current: first.symbolic().to_string(),
                };
            }
        }
        self
    }

    /// Paces frames at the configured acquisition frame rate instead of returning immediately.
    #[must_use]
    pub fn realtime(self, realtime: bool) -> Self {
        lock(&self.state).realtime = realtime;
        self
    }

    /// Every `n`-th frame is delivered incomplete.
    #[must_use]
    pub fn incomplete_every(self, n: u64) -> Self {
        lock(&self.state).incomplete_every = Some(n.max(1));
        self
    }

    /// Initialisation always fails with `message`.
    #[must_use]
    pub fn fail_init(self, message: impl Into<String>) -> Self {
        lock(&self.state).init_fault = Some(message.into());
        self
    }

    /// Ending acquisition always fails with `message`, the camera keeps streaming.
    #[must_use]
    pub fn fail_stop(self, message: impl Into<String>) -> Self {
        lock(&self.state).stop_fault = Some(message.into());
        self
    }

    /// Initialisation fails with a wrong subnet error until the IP is forced.
    #[must_use]
    pub fn wrong_subnet(self) -> Self {
        lock(&self.state).link_fault = Some(LinkFault::WrongSubnet);
        self
    }

    /// Initialisation loads the node map, then fails with an out of range exception until the
    /// device is reset.
    #[must_use]
    pub fn out_of_range(self) -> Self {
        lock(&self.state).link_fault = Some(LinkFault::OutOfRange);
        self
    }

    /// Reading device information from the transport layer fails with `message`.
    #[must_use]
    pub fn unreadable_info(self, message: impl Into<String>) -> Self {
        lock(&self.state).info_fault = Some(message.into());
        self
    }

    #[must_use]
    pub fn monitor(&self) -> SimMonitor {
        SimMonitor {
            state: self.state.clone(),
        }
    }
}

/// Inspects a [`SimCamera`] from a test while the wrapper owns it.
#[derive(Clone)]
pub struct SimMonitor {
    state: Arc<Mutex<SimState>>,
}

impl SimMonitor {
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        lock(&self.state).initialized
    }

    #[must_use]
    pub fn is_streaming(&self) -> bool {
        lock(&self.state).streaming
    }

    #[must_use]
    pub fn frames(&self) -> u64 {
        lock(&self.state).frames
    }

    /// Current symbolic value of an enumeration node.
    #[must_use]
    pub fn enum_value(&self, map: NodeMap, name: &str) -> Option<String> {
        lock(&self.state).enum_current(map, name).map(ToString::to_string)
    }

    #[must_use]
    pub fn float_value(&self, name: &str) -> Option<f64> {
        match lock(&self.state)
            .nodes
            .get(&(NodeMap::Camera, name.to_string()))
            .map(|node| &node.value)
        {
            Some(Value::Float { value, .. }) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn integer_value(&self, name: &str) -> Option<i64> {
        match lock(&self.state)
            .nodes
            .get(&(NodeMap::Camera, name.to_string()))
            .map(|node| &node.value)
        {
            Some(Value::Integer(value)) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn boolean_value(&self, name: &str) -> Option<bool> {
        match lock(&self.state)
            .nodes
            .get(&(NodeMap::Camera, name.to_string()))
            .map(|node| &node.value)
        {
            Some(Value::Boolean(value)) => Some(*value),
            _ => None,
        }
    }

    /// How often a command node was executed.
    #[must_use]
    pub fn executions(&self, map: NodeMap, name: &str) -> u32 {
        match lock(&self.state)
            .nodes
            .get(&(map, name.to_string()))
            .map(|node| &node.value)
        {
            Some(Value::Command(count)) => *count,
            _ => 0,
        }
    }

    /// Every successful node write, as `Node=value`, in order.
    #[must_use]
    pub fn writes(&self) -> Vec<String> {
        lock(&self.state).writes.clone()
    }
}

fn lock(state: &Mutex<SimState>) -> MutexGuard<'_, SimState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

struct SimDevice {
    state: Arc<Mutex<SimState>>,
}

impl SimDevice {
    fn state(&self) -> MutexGuard<'_, SimState> {
        lock(&self.state)
    }
}

fn mismatch(name: &str, expected: &str) -> Error {
    Error::sdk(
        codes::INVALID_HANDLE,
        format!("Node {name} is not of type {expected}"),
    )
}

impl Device for SimDevice {
    fn init(&mut self) -> Result<()> {
        let mut state = self.state();
        if let Some(message) = &state.init_fault {
            return Err(Error::sdk(codes::IO, message.clone()));
        }
        match state.link_fault {
            Some(LinkFault::WrongSubnet) => return Err(Error::sdk(codes::ERROR, WRONG_SUBNET)),
            Some(LinkFault::OutOfRange) => {
                state.initialized = true;
                return Err(Error::sdk(codes::ERROR, OUT_OF_RANGE));
            }
            None => {}
        }

        state.initialized = true;
        Ok(())
    }

    fn deinit(&mut self) -> Result<()> {
        let mut state = self.state();
        if state.streaming {
            return Err(Error::sdk(
                codes::RESOURCE_IN_USE,
                "Camera is still streaming, end acquisition first",
            ));
        }

        state.initialized = false;
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.state().initialized
    }

    fn is_streaming(&self) -> bool {
        self.state().streaming
    }

    fn begin_acquisition(&mut self) -> Result<()> {
        let mut state = self.state();
        if !state.initialized {
            return Err(Error::sdk(codes::NOT_INITIALIZED, "Camera is not initialized"));
        }
        if state.streaming {
            return Err(Error::sdk(codes::RESOURCE_IN_USE, "Camera is already streaming"));
        }

        state.streaming = true;
        Ok(())
    }

    fn end_acquisition(&mut self) -> Result<()> {
        let mut state = self.state();
        if !state.streaming {
            return Err(Error::sdk(codes::ERROR, "Camera is not started"));
        }
        if let Some(message) = &state.stop_fault {
            return Err(Error::sdk(codes::RESOURCE_IN_USE, message.clone()));
        }

        state.streaming = false;
        state.pending_triggers = 0;
        Ok(())
    }

    fn next_image(&mut self, timeout: Duration) -> Result<Grab> {
        let interval = {
            let state = self.state();
            if !state.streaming {
                return Err(Error::sdk(codes::ERROR, "Camera is not started"));
            }
            state.realtime.then(|| state.frame_interval()).flatten()
        };

        if let Some(interval) = interval {
            thread::sleep(interval.min(timeout));
        }

        let mut state = self.state();
        let triggered = state.enum_current(NodeMap::Camera, nodes::TRIGGER_MODE) == Some("On");
        if triggered {
            let software =
                state.enum_current(NodeMap::Camera, nodes::TRIGGER_SOURCE) == Some("Software");
            if !software || state.pending_triggers == 0 {
                return Err(Error::sdk(
                    codes::TIMEOUT,
                    "Failed waiting for EventData on NEW_BUFFER_DATA event",
                ));
            }
            state.pending_triggers -= 1;
        }

        state.frames += 1;
        if let Some(every) = state.incomplete_every {
            if state.frames % every == 0 {
                return Ok(Grab::Incomplete { status: 4 });
            }
        }

        state.synthesize().map(Grab::Complete)
    }

    fn access_mode(&self, map: NodeMap, node: &str) -> Result<AccessMode> {
        let state = self.state();
        let Ok(found) = state.node(map, node) else {
            return Ok(AccessMode::NotAvailable);
        };

        if found.writable && !(state.streaming && found.streaming_locked) {
            Ok(AccessMode::ReadWrite)
        } else {
            Ok(AccessMode::ReadOnly)
        }
    }

    fn string(&self, map: NodeMap, node: &str) -> Result<String> {
        let state = self.state();
        if let (NodeMap::Device, Some(message)) = (map, &state.info_fault) {
            return Err(Error::sdk(codes::ERROR, message.clone()));
        }

        match &state.node(map, node)?.value {
            Value::String(value) => Ok(value.clone()),
            _ => Err(mismatch(node, "string")),
        }
    }

    fn integer(&self, map: NodeMap, node: &str) -> Result<i64> {
        match &self.state().node(map, node)?.value {
            Value::Integer(value) => Ok(*value),
            _ => Err(mismatch(node, "integer")),
        }
    }

    fn set_integer(&mut self, map: NodeMap, node: &str, value: i64) -> Result<()> {
        let mut state = self.state();
        match &mut state.writable_node(map, node)?.value {
            Value::Integer(current) => *current = value,
            _ => return Err(mismatch(node, "integer")),
        }
        state.writes.push(format!("{node}={value}"));
        Ok(())
    }

    fn float(&self, map: NodeMap, node: &str) -> Result<f64> {
        match &self.state().node(map, node)?.value {
            Value::Float { value, .. } => Ok(*value),
            _ => Err(mismatch(node, "float")),
        }
    }

    fn float_max(&self, map: NodeMap, node: &str) -> Result<f64> {
        match &self.state().node(map, node)?.value {
            Value::Float { max, .. } => Ok(*max),
            _ => Err(mismatch(node, "float")),
        }
    }

    fn set_float(&mut self, map: NodeMap, node: &str, value: f64) -> Result<()> {
        let mut state = self.state();
        match &mut state.writable_node(map, node)?.value {
            Value::Float { value: current, max } => {
                if value > *max {
                    return Err(Error::sdk(
                        codes::ERROR,
                        format!("GenICam::OutOfRangeException= Value {value} exceeds {max}"),
                    ));
                }
                *current = value;
            }
            _ => return Err(mismatch(node, "float")),
        }
        state.writes.push(format!("{node}={value}"));
        Ok(())
    }

    fn set_boolean(&mut self, map: NodeMap, node: &str, value: bool) -> Result<()> {
        let mut state = self.state();
        match &mut state.writable_node(map, node)?.value {
            Value::Boolean(current) => *current = value,
            _ => return Err(mismatch(node, "boolean")),
        }
        state.writes.push(format!("{node}={value}"));
        Ok(())
    }

    fn enum_entries(&self, map: NodeMap, node: &str) -> Result<Vec<String>> {
        match &self.state().node(map, node)?.value {
            Value::Enum { entries, .. } => Ok(entries.clone()),
            _ => Err(mismatch(node, "enumeration")),
        }
    }

    fn enum_value(&self, map: NodeMap, node: &str) -> Result<String> {
        match &self.state().node(map, node)?.value {
            Value::Enum { current, .. } => Ok(current.clone()),
            _ => Err(mismatch(node, "enumeration")),
        }
    }

    fn set_enum(&mut self, map: NodeMap, node: &str, symbolic: &str) -> Result<()> {
        let mut state = self.state();
        match &mut state.writable_node(map, node)?.value {
            Value::Enum { entries, current } => {
                if !entries.iter().any(|entry| entry == symbolic) {
                    return Err(Error::sdk(
                        codes::INVALID_PARAMETER,
                        format!("Entry {symbolic} is not available for node {node}"),
                    ));
                }
                *current = symbolic.to_string();
            }
            _ => return Err(mismatch(node, "enumeration")),
        }
        state.writes.push(format!("{node}={symbolic}"));
        Ok(())
    }

    fn execute(&mut self, map: NodeMap, node: &str) -> Result<()> {
        let mut state = self.state();
        match &mut state.writable_node(map, node)?.value {
            Value::Command(count) => *count += 1,
            _ => return Err(mismatch(node, "command")),
        }

        match node {
            nodes::GEV_DEVICE_AUTO_FORCE_IP if state.link_fault == Some(LinkFault::WrongSubnet) => {
                state.link_fault = None;
            }
            nodes::DEVICE_RESET => {
                // The device drops off the bus and comes back uninitialised.
                if state.link_fault == Some(LinkFault::OutOfRange) {
                    state.link_fault = None;
                }
                state.streaming = false;
                state.initialized = false;
            }
            nodes::TRIGGER_SOFTWARE => state.pending_triggers += 1,
            _ => {}
        }

        state.writes.push(format!("{node}()"));
        Ok(())
    }
}
