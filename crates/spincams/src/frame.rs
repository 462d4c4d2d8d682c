use std::path::Path;

use crate::{params::BayerPattern, Error, PixelFormat, Result};

/// A frame grabbed from a camera, copied out of the SDK buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub(crate) width: usize,
    pub(crate) height: usize,
    pub(crate) pixel_format: PixelFormat,
    pub(crate) frame_id: u64,
    pub(crate) timestamp: u64,
    pub(crate) data: Vec<u8>,
}

impl Image {
    /// Wraps a pixel buffer, checking that its size matches the dimensions.
    pub fn new(
        width: usize,
        height: usize,
        pixel_format: PixelFormat,
        data: Vec<u8>,
    ) -> Result<Self> {
        let expected = buffer_len(width, height, pixel_format)?;
        if data.len() != expected {
            return Err(Error::InvalidParameter {
                parameter: "image buffer",
                value: format!("{} bytes", data.len()),
                expected: format!("{expected} bytes for {width}x{height} {pixel_format}"),
            });
        }

        Ok(Self {
            width,
            height,
            pixel_format,
            frame_id: 0,
            timestamp: 0,
            data,
        })
    }

    #[must_use]
    pub fn with_frame_id(mut self, frame_id: u64, timestamp: u64) -> Self {
        self.frame_id = frame_id;
        self.timestamp = timestamp;
        self
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    #[must_use]
    pub fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }

    #[must_use]
    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }

    /// Device timestamp of the frame, in nanoseconds.
    #[must_use]
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Array shape of the pixel data as `[height, width, channels]`.
    #[must_use]
    pub fn shape(&self) -> [usize; 3] {
        let channels = match self.pixel_format {
            PixelFormat::RGB8 | PixelFormat::RGB8Packed | PixelFormat::BGR8 => 3,
            _ => 1,
        };
        [self.height, self.width, channels]
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Converts the frame to packed RGB8.
    #[must_use]
    pub fn to_rgb8(&self) -> Image {
        let data = match self.pixel_format {
            PixelFormat::RGB8 => return self.clone(),
            PixelFormat::RGB8Packed => self.data.clone(),
            PixelFormat::BGR8 => self
                .data
                .chunks_exact(3)
                .flat_map(|bgr| [bgr[2], bgr[1], bgr[0]])
                .collect(),
            PixelFormat::Mono8 => self.data.iter().flat_map(|&v| [v, v, v]).collect(),
            // Little endian, keep the most significant byte.
            PixelFormat::Mono16 => self
                .data
                .chunks_exact(2)
                .flat_map(|le| [le[1], le[1], le[1]])
                .collect(),
            PixelFormat::BayerRG8
            | PixelFormat::BayerGB8
            | PixelFormat::BayerGR8
            | PixelFormat::BayerBG8 => {
                let pattern = self
                    .pixel_format
                    .bayer_pattern()
                    .unwrap_or(BayerPattern::Rggb);
                demosaic(&self.data, self.width, self.height, pattern)
            }
        };

        Image {
            width: self.width,
            height: self.height,
            pixel_format: PixelFormat::RGB8,
            frame_id: self.frame_id,
            timestamp: self.timestamp,
            data,
        }
    }

    /// Writes the frame to `path`, the encoding is picked from the file extension.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let (data, color) = match self.pixel_format {
            PixelFormat::Mono8 => (self.data.clone(), image::ExtendedColorType::L8),
            _ => (self.to_rgb8().data, image::ExtendedColorType::Rgb8),
        };

        image::save_buffer(
            path,
            &data,
            self.width as u32,
            self.height as u32,
            color,
        )?;

        Ok(())
    }
}

#[derive(Clone, Copy)]
enum Channel {
    Red = 0,
    Green = 1,
    Blue = 2,
}

fn filter_color(pattern: BayerPattern, x: usize, y: usize) -> Channel {
    let cell = (y % 2, x % 2);
    match (pattern, cell) {
        (BayerPattern::Rggb, (0, 0))
        | (BayerPattern::Gbrg, (1, 0))
        | (BayerPattern::Grbg, (0, 1))
        | (BayerPattern::Bggr, (1, 1)) => Channel::Red,
        (BayerPattern::Rggb, (1, 1))
        | (BayerPattern::Gbrg, (0, 1))
        | (BayerPattern::Grbg, (1, 0))
        | (BayerPattern::Bggr, (0, 0)) => Channel::Blue,
        _ => Channel::Green,
    }
}

/// Bilinear demosaic: a pixel keeps its own sample and averages the 3x3 neighbourhood for the
/// two missing channels. Borders use whatever neighbours exist.
fn demosaic(raw: &[u8], width: usize, height: usize, pattern: BayerPattern) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(width * height * 3);

    for y in 0..height {
        for x in 0..width {
            let mut sums = [0u32; 3];
            let mut counts = [0u32; 3];

            for ny in y.saturating_sub(1)..=(y + 1).min(height - 1) {
                for nx in x.saturating_sub(1)..=(x + 1).min(width - 1) {
                    let channel = filter_color(pattern, nx, ny) as usize;
                    sums[channel] += u32::from(raw[ny * width + nx]);
                    counts[channel] += 1;
                }
            }

            let own = filter_color(pattern, x, y) as usize;
            let mut pixel = [0u8; 3];
            for channel in 0..3 {
                pixel[channel] = if channel == own {
                    raw[y * width + x]
                } else if counts[channel] > 0 {
                    (sums[channel] / counts[channel]) as u8
                } else {
                    0
                };
            }
            rgb.extend_from_slice(&pixel);
        }
    }

    rgb
}

/// Size in bytes of a `width` by `height` frame, failing when it does not fit in memory.
pub(crate) fn buffer_len(width: usize, height: usize, pixel_format: PixelFormat) -> Result<usize> {
    width
        .checked_mul(height)
        .and_then(|pixels| pixels.checked_mul(pixel_format.bytes_per_pixel()))
        .ok_or_else(|| Error::InvalidParameter {
            parameter: "image size",
            value: format!("{width}x{height} {pixel_format}"),
            expected: "dimensions whose buffer fits in memory".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_short_buffer() {
        let err = Image::new(4, 4, PixelFormat::RGB8, vec![0; 47]).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { .. }));
    }

    #[test]
    fn oversized_dimensions_are_rejected() {
        let err = Image::new(usize::MAX / 2, 3, PixelFormat::RGB8, Vec::new()).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidParameter {
                parameter: "image size",
                ..
            }
        ));
    }

    #[test]
    fn buffer_sizes_follow_the_image_format_name() {
        let bayer: PixelFormat = "BayerRG8".parse().unwrap();
        assert_eq!(buffer_len(64, 1, bayer).unwrap(), 64);
        assert_eq!(buffer_len(64, 48, bayer).unwrap(), 64 * 48);

        let rgb: PixelFormat = "RGB8".parse().unwrap();
        assert_eq!(buffer_len(64, 1, rgb).unwrap(), 64 * 3);
        assert_eq!(buffer_len(64, 48, rgb).unwrap(), 64 * 48 * 3);
    }

    #[test]
    fn bgr_is_swapped() {
        let image = Image::new(1, 1, PixelFormat::BGR8, vec![1, 2, 3]).unwrap();
        assert_eq!(image.to_rgb8().as_bytes(), &[3, 2, 1]);
    }

    #[test]
    fn mono16_keeps_high_byte() {
        let image = Image::new(2, 1, PixelFormat::Mono16, vec![0xff, 0x12, 0x00, 0x80]).unwrap();
        assert_eq!(image.to_rgb8().as_bytes(), &[0x12, 0x12, 0x12, 0x80, 0x80, 0x80]);
    }

    #[test]
    fn uniform_bayer_stays_uniform() {
        // A flat RGGB mosaic of R=200, G=100, B=50 must demosaic to that colour everywhere.
        let (width, height) = (4, 4);
        let raw = (0..height)
            .flat_map(|y| {
                (0..width).map(move |x| match filter_color(BayerPattern::Rggb, x, y) {
                    Channel::Red => 200,
                    Channel::Green => 100,
                    Channel::Blue => 50,
                })
            })
            .collect::<Vec<u8>>();

        let image = Image::new(width, height, PixelFormat::BayerRG8, raw).unwrap();
        let rgb = image.to_rgb8();

        assert_eq!(rgb.pixel_format(), PixelFormat::RGB8);
        assert_eq!(rgb.shape(), [4, 4, 3]);
        for pixel in rgb.as_bytes().chunks_exact(3) {
            assert_eq!(pixel, &[200, 100, 50]);
        }
    }

    #[test]
    fn save_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        let image = Image::new(2, 2, PixelFormat::Mono8, vec![0, 64, 128, 255]).unwrap();

        image.save(&path).unwrap();

        assert!(path.metadata().unwrap().len() > 0);
    }
}
