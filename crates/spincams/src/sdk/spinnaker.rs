//! Binding to the Spinnaker C runtime, `libSpinnaker_C`.
#![allow(non_camel_case_types, unsafe_code)]

use std::{
    ffi::{CString, c_char, c_int, c_uint, c_void},
    ptr,
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

use super::{AccessMode, Backend, Device, Grab, LibraryVersion, NodeMap, codes};
use crate::{Error, Image, PixelFormat, Result, frame::buffer_len};

type spinError = c_int;
type bool8_t = u8;
type spinSystem = *mut c_void;
type spinCameraList = *mut c_void;
type spinCamera = *mut c_void;
type spinNodeMapHandle = *mut c_void;
type spinNodeHandle = *mut c_void;
type spinImage = *mut c_void;

const SPINNAKER_ERR_SUCCESS: spinError = 0;
const FALSE: bool8_t = 0;
const TRUE: bool8_t = 1;

#[repr(C)]
#[derive(Default)]
struct spinLibraryVersion {
    major: c_uint,
    minor: c_uint,
    kind: c_uint,
    build: c_uint,
}

#[link(name = "Spinnaker_C")]
unsafe extern "C" {
    fn spinErrorGetLastMessage(buf: *mut c_char, len: *mut usize) -> spinError;

    fn spinSystemGetInstance(system: *mut spinSystem) -> spinError;
    fn spinSystemReleaseInstance(system: spinSystem) -> spinError;
    fn spinSystemGetLibraryVersion(system: spinSystem, version: *mut spinLibraryVersion)
    -> spinError;
    fn spinSystemGetCameras(system: spinSystem, list: spinCameraList) -> spinError;

    fn spinCameraListCreateEmpty(list: *mut spinCameraList) -> spinError;
    fn spinCameraListGetSize(list: spinCameraList, size: *mut usize) -> spinError;
    fn spinCameraListGet(list: spinCameraList, index: usize, camera: *mut spinCamera)
    -> spinError;
    fn spinCameraListClear(list: spinCameraList) -> spinError;
    fn spinCameraListDestroy(list: spinCameraList) -> spinError;

    fn spinCameraInit(camera: spinCamera) -> spinError;
    fn spinCameraDeInit(camera: spinCamera) -> spinError;
    fn spinCameraIsInitialized(camera: spinCamera, value: *mut bool8_t) -> spinError;
    fn spinCameraIsStreaming(camera: spinCamera, value: *mut bool8_t) -> spinError;
    fn spinCameraBeginAcquisition(camera: spinCamera) -> spinError;
    fn spinCameraEndAcquisition(camera: spinCamera) -> spinError;
    fn spinCameraGetNextImageEx(camera: spinCamera, timeout: u64, image: *mut spinImage)
    -> spinError;
    fn spinCameraGetNodeMap(camera: spinCamera, map: *mut spinNodeMapHandle) -> spinError;
    fn spinCameraGetTLDeviceNodeMap(camera: spinCamera, map: *mut spinNodeMapHandle)
    -> spinError;
    fn spinCameraGetTLStreamNodeMap(camera: spinCamera, map: *mut spinNodeMapHandle)
    -> spinError;
    fn spinCameraRelease(camera: spinCamera) -> spinError;

    fn spinNodeMapGetNode(
        map: spinNodeMapHandle,
        name: *const c_char,
        node: *mut spinNodeHandle,
    ) -> spinError;
    fn spinNodeIsAvailable(node: spinNodeHandle, value: *mut bool8_t) -> spinError;
    fn spinNodeIsReadable(node: spinNodeHandle, value: *mut bool8_t) -> spinError;
    fn spinNodeIsWritable(node: spinNodeHandle, value: *mut bool8_t) -> spinError;

    fn spinStringGetValue(node: spinNodeHandle, buf: *mut c_char, len: *mut usize) -> spinError;
    fn spinIntegerGetValue(node: spinNodeHandle, value: *mut i64) -> spinError;
    fn spinIntegerSetValue(node: spinNodeHandle, value: i64) -> spinError;
    fn spinFloatGetValue(node: spinNodeHandle, value: *mut f64) -> spinError;
    fn spinFloatGetMax(node: spinNodeHandle, value: *mut f64) -> spinError;
    fn spinFloatSetValue(node: spinNodeHandle, value: f64) -> spinError;
    fn spinBooleanSetValue(node: spinNodeHandle, value: bool8_t) -> spinError;
    fn spinCommandExecute(node: spinNodeHandle) -> spinError;

    fn spinEnumerationGetNumEntries(node: spinNodeHandle, count: *mut usize) -> spinError;
    fn spinEnumerationGetEntryByIndex(
        node: spinNodeHandle,
        index: usize,
        entry: *mut spinNodeHandle,
    ) -> spinError;
    fn spinEnumerationGetEntryByName(
        node: spinNodeHandle,
        name: *const c_char,
        entry: *mut spinNodeHandle,
    ) -> spinError;
    fn spinEnumerationGetCurrentEntry(node: spinNodeHandle, entry: *mut spinNodeHandle)
    -> spinError;
    fn spinEnumerationEntryGetIntValue(entry: spinNodeHandle, value: *mut i64) -> spinError;
    fn spinEnumerationEntryGetSymbolic(
        entry: spinNodeHandle,
        buf: *mut c_char,
        len: *mut usize,
    ) -> spinError;
    fn spinEnumerationSetIntValue(node: spinNodeHandle, value: i64) -> spinError;
    fn spinEnumerationReleaseNode(node: spinNodeHandle, entry: spinNodeHandle) -> spinError;

    fn spinImageIsIncomplete(image: spinImage, value: *mut bool8_t) -> spinError;
    fn spinImageGetStatus(image: spinImage, status: *mut c_int) -> spinError;
    fn spinImageGetWidth(image: spinImage, width: *mut usize) -> spinError;
    fn spinImageGetHeight(image: spinImage, height: *mut usize) -> spinError;
    fn spinImageGetStride(image: spinImage, stride: *mut usize) -> spinError;
    fn spinImageGetData(image: spinImage, data: *mut *mut c_void) -> spinError;
    fn spinImageGetPixelFormatName(image: spinImage, buf: *mut c_char, len: *mut usize)
    -> spinError;
    fn spinImageGetFrameID(image: spinImage, frame_id: *mut u64) -> spinError;
    fn spinImageGetTimeStamp(image: spinImage, timestamp: *mut u64) -> spinError;
    fn spinImageRelease(image: spinImage) -> spinError;
}

/// Turns a non-zero `spinError` into [`Error::Sdk`] carrying the runtime's last message.
macro_rules! checked_call {
    ($call:expr) => {
        match unsafe { $call } {
            SPINNAKER_ERR_SUCCESS => (),
            code => return Err(last_error(code)),
        }
    };
}

fn last_error(code: spinError) -> Error {
    let message = read_string(|buf, len| unsafe { spinErrorGetLastMessage(buf, len) })
        .unwrap_or_else(|_| "unknown Spinnaker error".to_string());
    Error::sdk(code, message)
}

/// Reads a string through a Spinnaker `(buffer, length)` getter.
fn read_string(getter: impl Fn(*mut c_char, *mut usize) -> spinError) -> Result<String> {
    const MAX_LEN: usize = 512;
    let mut buf = [0 as c_char; MAX_LEN];
    let mut len = MAX_LEN;

    let code = getter(buf.as_mut_ptr(), &mut len);
    if code != SPINNAKER_ERR_SUCCESS {
        return Err(Error::sdk(code, "failed to read string"));
    }

    // The length includes the terminating nul.
    let bytes: Vec<u8> = buf[..len.saturating_sub(1).min(MAX_LEN)]
        .iter()
        .map(|&c| c as u8)
        .collect();
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn c_name(name: &str) -> Result<CString> {
    CString::new(name).map_err(|_| Error::NodeAccess {
        node: name.to_string(),
    })
}

static ACQUIRED: AtomicBool = AtomicBool::new(false);

/// The process-wide Spinnaker system instance.
pub struct SpinnakerSystem {
    handle: spinSystem,
}

// The system handle is reference counted and thread safe in the runtime.
unsafe impl Send for SpinnakerSystem {}
unsafe impl Sync for SpinnakerSystem {}

impl SpinnakerSystem {
    /// Acquires the system instance, only one may exist per process.
    pub fn acquire() -> Result<Self> {
        if ACQUIRED.swap(true, Ordering::SeqCst) {
            return Err(Error::invalid_state(
                "the Spinnaker system is already acquired in this process",
            ));
        }

        let mut handle = ptr::null_mut();
        let code = unsafe { spinSystemGetInstance(&mut handle) };
        if code != SPINNAKER_ERR_SUCCESS {
            ACQUIRED.store(false, Ordering::SeqCst);
            return Err(last_error(code));
        }

        Ok(Self { handle })
    }
}

impl Backend for SpinnakerSystem {
    fn library_version(&self) -> Result<LibraryVersion> {
        let mut version = spinLibraryVersion::default();
        checked_call!(spinSystemGetLibraryVersion(self.handle, &mut version));

        Ok(LibraryVersion {
            major: version.major,
            minor: version.minor,
            kind: version.kind,
            build: version.build,
        })
    }

    fn enumerate(&self) -> Result<Vec<Box<dyn Device>>> {
        let mut list = ptr::null_mut();
        checked_call!(spinCameraListCreateEmpty(&mut list));
        let list = CameraList(list);

        checked_call!(spinSystemGetCameras(self.handle, list.0));
        let mut size = 0;
        checked_call!(spinCameraListGetSize(list.0, &mut size));

        let mut devices: Vec<Box<dyn Device>> = Vec::with_capacity(size);
        for index in 0..size {
            let mut camera = ptr::null_mut();
            checked_call!(spinCameraListGet(list.0, index, &mut camera));
            devices.push(Box::new(SpinnakerDevice { handle: camera }));
        }

        Ok(devices)
    }

    fn release(&self) -> Result<()> {
        checked_call!(spinSystemReleaseInstance(self.handle));
        ACQUIRED.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// Clears and destroys a camera list, the cameras taken from it stay valid.
struct CameraList(spinCameraList);

impl Drop for CameraList {
    fn drop(&mut self) {
        unsafe {
            spinCameraListClear(self.0);
            spinCameraListDestroy(self.0);
        }
    }
}

struct SpinnakerDevice {
    handle: spinCamera,
}

// A camera handle is only used by the thread that owns the device.
unsafe impl Send for SpinnakerDevice {}

impl SpinnakerDevice {
    fn node_map(&self, map: NodeMap) -> Result<spinNodeMapHandle> {
        let mut handle = ptr::null_mut();
        match map {
            NodeMap::Camera => checked_call!(spinCameraGetNodeMap(self.handle, &mut handle)),
            NodeMap::Stream => {
                checked_call!(spinCameraGetTLStreamNodeMap(self.handle, &mut handle));
            }
            NodeMap::Device => {
                checked_call!(spinCameraGetTLDeviceNodeMap(self.handle, &mut handle));
            }
        }
        Ok(handle)
    }

    fn node(&self, map: NodeMap, name: &str) -> Result<spinNodeHandle> {
        let map = self.node_map(map)?;
        let c_name = c_name(name)?;

        let mut node = ptr::null_mut();
        checked_call!(spinNodeMapGetNode(map, c_name.as_ptr(), &mut node));

        let mut available = FALSE;
        checked_call!(spinNodeIsAvailable(node, &mut available));
        if available != TRUE {
            return Err(Error::NodeAccess {
                node: name.to_string(),
            });
        }

        Ok(node)
    }

    fn flag(&self, getter: unsafe extern "C" fn(spinCamera, *mut bool8_t) -> spinError) -> bool {
        let mut value = FALSE;
        let code = unsafe { getter(self.handle, &mut value) };
        code == SPINNAKER_ERR_SUCCESS && value == TRUE
    }

    fn copy_image(&self, image: spinImage) -> Result<Grab> {
        let mut incomplete = FALSE;
        checked_call!(spinImageIsIncomplete(image, &mut incomplete));
        if incomplete == TRUE {
            let mut status = 0;
            checked_call!(spinImageGetStatus(image, &mut status));
            return Ok(Grab::Incomplete { status });
        }

        let (mut width, mut height, mut stride) = (0, 0, 0);
        let (mut frame_id, mut timestamp) = (0, 0);
        let mut data = ptr::null_mut();
        checked_call!(spinImageGetWidth(image, &mut width));
        checked_call!(spinImageGetHeight(image, &mut height));
        checked_call!(spinImageGetStride(image, &mut stride));
        checked_call!(spinImageGetData(image, &mut data));
        checked_call!(spinImageGetFrameID(image, &mut frame_id));
        checked_call!(spinImageGetTimeStamp(image, &mut timestamp));

        let name = read_string(|buf, len| unsafe { spinImageGetPixelFormatName(image, buf, len) })?;
        let pixel_format = name.parse::<PixelFormat>().map_err(|_| Error::InvalidParameter {
            parameter: "image pixel format",
            value: name.clone(),
            expected: "a supported pixel format".to_string(),
        })?;

        let row = buffer_len(width, 1, pixel_format)?;
        let total = buffer_len(width, height, pixel_format)?;
        if data.is_null() || stride < row {
            return Err(Error::sdk(codes::ERROR, "image buffer is smaller than its size"));
        }

        let mut pixels = Vec::with_capacity(total);
        for y in 0..height {
            // SAFETY: the runtime guarantees `height` rows of `stride` bytes at `data`.
            let line = unsafe { std::slice::from_raw_parts(data.cast::<u8>().add(y * stride), row) };
            pixels.extend_from_slice(line);
        }

        Ok(Grab::Complete(
            Image::new(width, height, pixel_format, pixels)?.with_frame_id(frame_id, timestamp),
        ))
    }
}

impl Device for SpinnakerDevice {
    fn init(&mut self) -> Result<()> {
        checked_call!(spinCameraInit(self.handle));
        Ok(())
    }

    fn deinit(&mut self) -> Result<()> {
        checked_call!(spinCameraDeInit(self.handle));
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.flag(spinCameraIsInitialized)
    }

    fn is_streaming(&self) -> bool {
        self.flag(spinCameraIsStreaming)
    }

    fn begin_acquisition(&mut self) -> Result<()> {
        checked_call!(spinCameraBeginAcquisition(self.handle));
        Ok(())
    }

    fn end_acquisition(&mut self) -> Result<()> {
        checked_call!(spinCameraEndAcquisition(self.handle));
        Ok(())
    }

    fn next_image(&mut self, timeout: Duration) -> Result<Grab> {
        let timeout = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        let mut image = ptr::null_mut();
        checked_call!(spinCameraGetNextImageEx(self.handle, timeout, &mut image));

        let grab = self.copy_image(image);
        checked_call!(spinImageRelease(image));
        grab
    }

    fn access_mode(&self, map: NodeMap, node: &str) -> Result<AccessMode> {
        let Ok(node) = self.node(map, node) else {
            return Ok(AccessMode::NotAvailable);
        };

        let (mut readable, mut writable) = (FALSE, FALSE);
        checked_call!(spinNodeIsReadable(node, &mut readable));
        checked_call!(spinNodeIsWritable(node, &mut writable));

        Ok(match (readable == TRUE, writable == TRUE) {
            (true, true) => AccessMode::ReadWrite,
            (true, false) => AccessMode::ReadOnly,
            (false, true) => AccessMode::WriteOnly,
            (false, false) => AccessMode::NotAvailable,
        })
    }

    fn string(&self, map: NodeMap, node: &str) -> Result<String> {
        let node = self.node(map, node)?;
        read_string(|buf, len| unsafe { spinStringGetValue(node, buf, len) })
            .map_err(|error| match error {
                Error::Sdk { code, .. } => last_error(code),
                other => other,
            })
    }

    fn integer(&self, map: NodeMap, node: &str) -> Result<i64> {
        let node = self.node(map, node)?;
        let mut value = 0;
        checked_call!(spinIntegerGetValue(node, &mut value));
        Ok(value)
    }

    fn set_integer(&mut self, map: NodeMap, node: &str, value: i64) -> Result<()> {
        let node = self.node(map, node)?;
        checked_call!(spinIntegerSetValue(node, value));
        Ok(())
    }

    fn float(&self, map: NodeMap, node: &str) -> Result<f64> {
        let node = self.node(map, node)?;
        let mut value = 0.0;
        checked_call!(spinFloatGetValue(node, &mut value));
        Ok(value)
    }

    fn float_max(&self, map: NodeMap, node: &str) -> Result<f64> {
        let node = self.node(map, node)?;
        let mut value = 0.0;
        checked_call!(spinFloatGetMax(node, &mut value));
        Ok(value)
    }

    fn set_float(&mut self, map: NodeMap, node: &str, value: f64) -> Result<()> {
        let node = self.node(map, node)?;
        checked_call!(spinFloatSetValue(node, value));
        Ok(())
    }

    fn set_boolean(&mut self, map: NodeMap, node: &str, value: bool) -> Result<()> {
        let node = self.node(map, node)?;
        checked_call!(spinBooleanSetValue(node, if value { TRUE } else { FALSE }));
        Ok(())
    }

    fn enum_entries(&self, map: NodeMap, node: &str) -> Result<Vec<String>> {
        let node = self.node(map, node)?;
        let mut count = 0;
        checked_call!(spinEnumerationGetNumEntries(node, &mut count));

        let mut entries = Vec::with_capacity(count);
        for index in 0..count {
            let mut entry = ptr::null_mut();
            checked_call!(spinEnumerationGetEntryByIndex(node, index, &mut entry));

            let mut available = FALSE;
            checked_call!(spinNodeIsAvailable(entry, &mut available));
            if available == TRUE {
                entries.push(read_string(|buf, len| unsafe {
                    spinEnumerationEntryGetSymbolic(entry, buf, len)
                })?);
            }

            checked_call!(spinEnumerationReleaseNode(node, entry));
        }

        Ok(entries)
    }

    fn enum_value(&self, map: NodeMap, node: &str) -> Result<String> {
        let node = self.node(map, node)?;
        let mut entry = ptr::null_mut();
        checked_call!(spinEnumerationGetCurrentEntry(node, &mut entry));

        let symbolic =
            read_string(|buf, len| unsafe { spinEnumerationEntryGetSymbolic(entry, buf, len) });
        checked_call!(spinEnumerationReleaseNode(node, entry));
        symbolic
    }

    fn set_enum(&mut self, map: NodeMap, node: &str, symbolic: &str) -> Result<()> {
        let handle = self.node(map, node)?;
        let c_symbolic = c_name(symbolic)?;

        let mut entry = ptr::null_mut();
        checked_call!(spinEnumerationGetEntryByName(
            handle,
            c_symbolic.as_ptr(),
            &mut entry
        ));
        if entry.is_null() {
            return Err(Error::sdk(
                codes::INVALID_PARAMETER,
                format!("Entry {symbolic} is not available for node {node}"),
            ));
        }

        let mut value = 0;
        checked_call!(spinEnumerationEntryGetIntValue(entry, &mut value));
        checked_call!(spinEnumerationSetIntValue(handle, value));
        Ok(())
    }

    fn execute(&mut self, map: NodeMap, node: &str) -> Result<()> {
        let node = self.node(map, node)?;
        checked_call!(spinCommandExecute(node));
        Ok(())
    }
}

impl Drop for SpinnakerDevice {
    fn drop(&mut self) {
        let code = unsafe { spinCameraRelease(self.handle) };
        if code != SPINNAKER_ERR_SUCCESS {
            tracing::warn!(code, "failed to release camera handle");
        }
    }
}
