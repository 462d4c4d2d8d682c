//! Accepted values for the camera parameter setters.
//!
//! Every enum parses from the lower-case names used in configuration files and on the command
//! line, and maps onto the symbolic GenICam enumeration entry that is written to the device.
use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

use crate::{Error, Result};

/// Parses `value` into `T`, reporting the accepted set on failure.
pub fn parse<T>(parameter: &'static str, value: &str) -> Result<T>
where
    T: FromStr + IntoEnumIterator + fmt::Display,
{
    value.parse::<T>().map_err(|_| Error::InvalidParameter {
        parameter,
        value: value.to_string(),
        expected: accepted::<T>(),
    })
}

fn accepted<T: IntoEnumIterator + fmt::Display>() -> String {
    T::iter()
        .map(|variant| format!("`{variant}`"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Image acquisition mode, written to the `AcquisitionMode` node.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
pub enum AcquisitionMode {
    #[default]
    #[strum(serialize = "continuous")]
    #[serde(rename = "continuous")]
    Continuous,
    #[strum(serialize = "single")]
    #[serde(rename = "single")]
    SingleFrame,
    #[strum(serialize = "multiple")]
    #[serde(rename = "multiple")]
    MultiFrame,
}

impl AcquisitionMode {
    #[must_use]
    pub fn symbolic(self) -> &'static str {
        match self {
            AcquisitionMode::Continuous => "Continuous",
            AcquisitionMode::SingleFrame => "SingleFrame",
            AcquisitionMode::MultiFrame => "MultiFrame",
        }
    }
}

/// Stream buffer handling mode, written to `StreamBufferHandlingMode` on the stream node map.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum BufferMode {
    #[default]
    #[strum(serialize = "newest-only")]
    NewestOnly,
    #[strum(serialize = "newest-first")]
    NewestFirst,
    #[strum(serialize = "oldest-first")]
    OldestFirst,
    #[strum(serialize = "oldest-overwrite")]
    #[serde(rename = "oldest-overwrite")]
    OldestFirstOverwrite,
}

impl BufferMode {
    #[must_use]
    pub fn symbolic(self) -> &'static str {
        match self {
            BufferMode::NewestOnly => "NewestOnly",
            BufferMode::NewestFirst => "NewestFirst",
            BufferMode::OldestFirst => "OldestFirst",
            BufferMode::OldestFirstOverwrite => "OldestFirstOverwrite",
        }
    }
}

/// Automatic control mode shared by exposure, gain and white balance.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AutoMode {
    #[default]
    Continuous,
    Once,
    Off,
}

impl AutoMode {
    #[must_use]
    pub fn symbolic(self) -> &'static str {
        match self {
            AutoMode::Continuous => "Continuous",
            AutoMode::Once => "Once",
            AutoMode::Off => "Off",
        }
    }
}

/// Whether triggered acquisition is enabled.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TriggerMode {
    #[default]
    Off,
    On,
}

/// Source of the trigger signal when [`TriggerMode::On`].
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TriggerSource {
    #[default]
    Hardware,
    Software,
}

/// Opto-isolated input line used for hardware triggering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, IntoStaticStr)]
pub enum TriggerLine {
    Line0,
    Line1,
    Line2,
    Line3,
}

impl TriggerLine {
    pub fn from_index(line: i64) -> Result<Self> {
        match line {
            0 => Ok(TriggerLine::Line0),
            1 => Ok(TriggerLine::Line1),
            2 => Ok(TriggerLine::Line2),
            3 => Ok(TriggerLine::Line3),
            _ => Err(Error::InvalidParameter {
                parameter: "trigger line",
                value: line.to_string(),
                expected: "0, 1, 2 or 3".to_string(),
            }),
        }
    }

    #[must_use]
    pub fn symbolic(self) -> &'static str {
        self.into()
    }
}

/// Trigger configuration accepted by [`Camera::set_trigger_mode`](crate::Camera::set_trigger_mode).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Free running acquisition.
    #[default]
    Off,
    /// Frames are started by [`Camera::execute_software_trigger`](crate::Camera::execute_software_trigger).
    Software,
    /// Frames are started by a signal on the given line.
    Hardware(TriggerLine),
}

impl Trigger {
    /// Builds a trigger from its loose parts.
    ///
    /// A hardware trigger needs a line, the line is ignored otherwise.
    pub fn from_parts(mode: TriggerMode, source: TriggerSource, line: Option<i64>) -> Result<Self> {
        match (mode, source, line) {
            (TriggerMode::Off, _, _) => Ok(Trigger::Off),
            (TriggerMode::On, TriggerSource::Software, _) => Ok(Trigger::Software),
            (TriggerMode::On, TriggerSource::Hardware, Some(line)) => {
                TriggerLine::from_index(line).map(Trigger::Hardware)
            }
            (TriggerMode::On, TriggerSource::Hardware, None) => Err(Error::InvalidParameter {
                parameter: "trigger line",
                value: "none".to_string(),
                expected: "a hardware line (0-3) for a hardware trigger".to_string(),
            }),
        }
    }
}

/// Pixel formats the wrapper knows how to request and convert.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
pub enum PixelFormat {
    Mono8,
    Mono16,
    RGB8,
    RGB8Packed,
    BGR8,
    #[default]
    BayerRG8,
    BayerGB8,
    BayerGR8,
    BayerBG8,
}

/// Colour filter arrangement of the top-left 2x2 cell of a Bayer sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BayerPattern {
    Rggb,
    Gbrg,
    Grbg,
    Bggr,
}

impl PixelFormat {
    /// The symbolic name of the `PixelFormat` enumeration entry.
    #[must_use]
    pub fn symbolic(self) -> &'static str {
        self.into()
    }

    /// Bytes used to store one pixel.
    #[must_use]
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Mono8
            | PixelFormat::BayerRG8
            | PixelFormat::BayerGB8
            | PixelFormat::BayerGR8
            | PixelFormat::BayerBG8 => 1,
            PixelFormat::Mono16 => 2,
            PixelFormat::RGB8 | PixelFormat::RGB8Packed | PixelFormat::BGR8 => 3,
        }
    }

    #[must_use]
    pub fn bayer_pattern(self) -> Option<BayerPattern> {
        match self {
            PixelFormat::BayerRG8 => Some(BayerPattern::Rggb),
            PixelFormat::BayerGB8 => Some(BayerPattern::Gbrg),
            PixelFormat::BayerGR8 => Some(BayerPattern::Grbg),
            PixelFormat::BayerBG8 => Some(BayerPattern::Bggr),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_original_acquisition_names() {
        assert_eq!(
            parse::<AcquisitionMode>("acquisition mode", "single").unwrap(),
            AcquisitionMode::SingleFrame
        );
        assert_eq!(AcquisitionMode::MultiFrame.to_string(), "multiple");
        assert_eq!(AcquisitionMode::MultiFrame.symbolic(), "MultiFrame");
    }

    #[test]
    fn unknown_value_lists_accepted_set() {
        let err = parse::<BufferMode>("stream buffer mode", "newest").unwrap_err();
        match err {
            Error::InvalidParameter {
                parameter,
                value,
                expected,
            } => {
                assert_eq!(parameter, "stream buffer mode");
                assert_eq!(value, "newest");
                assert!(expected.contains("`oldest-overwrite`"));
                assert!(expected.contains("`newest-only`"));
            }
            other => panic!("expected InvalidParameter, got {other:?}"),
        }
    }

    #[test]
    fn hardware_trigger_needs_valid_line() {
        assert_eq!(
            Trigger::from_parts(TriggerMode::On, TriggerSource::Hardware, Some(2)).unwrap(),
            Trigger::Hardware(TriggerLine::Line2)
        );
        assert!(matches!(
            Trigger::from_parts(TriggerMode::On, TriggerSource::Hardware, None),
            Err(Error::InvalidParameter { .. })
        ));
        assert!(matches!(
            Trigger::from_parts(TriggerMode::On, TriggerSource::Hardware, Some(4)),
            Err(Error::InvalidParameter { .. })
        ));
        assert_eq!(
            Trigger::from_parts(TriggerMode::Off, TriggerSource::Hardware, None).unwrap(),
            Trigger::Off
        );
    }

    #[test]
    fn pixel_format_symbolic_names() {
        assert_eq!(PixelFormat::RGB8Packed.symbolic(), "RGB8Packed");
        assert_eq!("BayerGB8".parse::<PixelFormat>().unwrap(), PixelFormat::BayerGB8);
        assert_eq!(TriggerLine::Line3.symbolic(), "Line3");
        assert_eq!(PixelFormat::Mono16.bytes_per_pixel(), 2);
    }
}
