//! Convenience layer over the Spinnaker SDK for FLIR machine-vision cameras.
//!
//! A [`System`] handle owns the vendor runtime, [`Cameras`] enumerates every attached
//! [`Camera`] and runs the acquisition loop. Frames go to a per-camera [`FrameCallback`], or to
//! a save folder and an [`ImageQueue`] drained by another thread.
//!
//! The SDK is reached through [`sdk::Backend`]. The Spinnaker C runtime is used with the
//! `spinnaker` feature, [`sdk::sim`] provides simulated cameras without any hardware.
mod acquisition;
mod camera;
mod cameras;
mod error;
mod frame;
mod queue;

pub mod callbacks;
pub mod config;
pub mod params;
pub mod recovery;
pub mod sdk;

pub use acquisition::{AcquisitionSummary, StopHandle, frame_filename};
pub use camera::{
    Camera, CameraInfo, DEFAULT_PACKET_SIZE, DEFAULT_THROUGHPUT_LIMIT, FrameCallback,
};
pub use cameras::{BatchReport, Cameras, CamerasBuilder, DEFAULT_GRAB_TIMEOUT};
pub use error::{Error, Result};
pub use frame::Image;
pub use params::{
    AcquisitionMode, AutoMode, BufferMode, PixelFormat, Trigger, TriggerLine, TriggerMode,
    TriggerSource,
};
pub use queue::{ImageQueue, QueuedImage};
pub use sdk::System;
