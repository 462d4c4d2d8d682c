//! Corrections for cameras that enumerate but cannot be opened.
//!
//! GigE cameras regularly come up on the wrong subnet after a network change, and cameras that
//! were not shut down cleanly can report out of range node values until they are power cycled.
//! Both conditions are recognised from the SDK message and corrected in place.
use std::time::Duration;

use strum::Display;

use crate::{
    Error, Result,
    sdk::{Device, NodeMap, nodes},
};

/// SDK messages that are corrected by forcing a new IP address.
const FORCE_IP_MESSAGES: &[&str] = &["Camera is on a wrong subnet."];

/// SDK messages that are corrected by resetting the device.
const RESET_MESSAGES: &[&str] = &[
    "GenICam::OutOfRangeException=",
    "Please try reconnecting the device.",
];

/// A correction that can be applied to a camera that failed to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Correction {
    #[strum(serialize = "force IP")]
    ForceIp,
    #[strum(serialize = "device reset")]
    Reset,
}

/// How often and how patiently enumeration is retried after a correction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryPolicy {
    /// Enumeration attempts after the first one, zero disables recovery.
    pub attempts: u32,
    /// Time the camera gets to come back after a correction.
    pub delay: Duration,
}

impl Default for RecoveryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(20),
        }
    }
}

impl RecoveryPolicy {
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            attempts: 0,
            delay: Duration::ZERO,
        }
    }
}

/// Picks the correction for a failure, if it is a known one.
#[must_use]
pub fn classify(error: &Error) -> Option<Correction> {
    let message = error.sdk_message()?;

    if FORCE_IP_MESSAGES.iter().any(|known| message.contains(known)) {
        Some(Correction::ForceIp)
    } else if RESET_MESSAGES.iter().any(|known| message.contains(known)) {
        Some(Correction::Reset)
    } else {
        None
    }
}

pub(crate) fn apply(device: &mut dyn Device, correction: Correction) -> Result<()> {
    match correction {
        Correction::ForceIp => force_ip(device),
        Correction::Reset => reset(device),
    }
}

/// Moves a GigE camera onto the subnet of the interface it was found on.
///
/// Works on the transport layer, the camera does not need to be initialised.
pub fn force_ip(device: &mut dyn Device) -> Result<()> {
    match device.integer(NodeMap::Device, nodes::GEV_DEVICE_IP_ADDRESS) {
        Ok(ip) => tracing::info!(ip = ip_to_string(ip), "forcing IP"),
        Err(_) => tracing::info!("forcing IP"),
    }

    device.execute(NodeMap::Device, nodes::GEV_DEVICE_AUTO_FORCE_IP)
}

/// Power cycles the camera, initialising it first if needed.
///
/// The device drops off the bus afterwards and has to be enumerated again.
pub fn reset(device: &mut dyn Device) -> Result<()> {
    if !device.is_initialized() {
        device.init()?;
    }

    tracing::info!("resetting camera");
    device.execute(NodeMap::Camera, nodes::DEVICE_RESET)
}

/// Formats an IPv4 address stored as a big endian integer in a GenICam node.
#[must_use]
pub fn ip_to_string(ip: i64) -> String {
    format!(
        "{}.{}.{}.{}",
        (ip >> 24) & 0xFF,
        (ip >> 16) & 0xFF,
        (ip >> 8) & 0xFF,
        ip & 0xFF
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdk::codes;

    #[test]
    fn classifies_known_messages() {
        let subnet = Error::sdk(codes::ERROR, "Camera is on a wrong subnet.");
        let range = Error::sdk(
            codes::ERROR,
            "GenICam::OutOfRangeException= Value 0 must be greater than or equal 1",
        );
        let reconnect = Error::sdk(codes::IO, "Please try reconnecting the device.");

        assert_eq!(classify(&subnet), Some(Correction::ForceIp));
        assert_eq!(classify(&range), Some(Correction::Reset));
        assert_eq!(classify(&reconnect), Some(Correction::Reset));
    }

    #[test]
    fn unknown_failures_are_not_corrected() {
        assert_eq!(classify(&Error::sdk(codes::TIMEOUT, "timeout")), None);
        assert_eq!(
            classify(&Error::NotFound {
                serial: "1".to_string()
            }),
            None
        );
    }

    #[test]
    fn formats_ip_address() {
        assert_eq!(ip_to_string(0xA9FE_0A0B), "169.254.10.11");
        assert_eq!(ip_to_string(0xC0A8_0001), "192.168.0.1");
    }
}
