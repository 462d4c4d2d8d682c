//! Video output through FFmpeg.
use std::path::{Path, PathBuf};

use ffmpeg_next as ffmpeg;
use ffmpeg::{Packet, Rational, codec, encoder, format, frame, software::scaling};

use crate::{Error, FrameCallback, Image, Result};

/// Frame rate used when none is given.
pub const DEFAULT_VIDEO_FPS: i32 = 15;

/// Appends every frame to a single video file.
///
/// The encoder is opened on the first frame and takes its size, later frames must have the same
/// dimensions. Frames are converted to RGB before encoding, so any [`crate::PixelFormat`] works.
///
/// The file is finalised by [`SaveVideoCallback::finish`], or when the callback is dropped.
pub struct SaveVideoCallback {
    path: PathBuf,
    fps: i32,
    codec: codec::Id,
    writer: Option<Writer>,
    frames: u64,
    finished: bool,
}

impl SaveVideoCallback {
    /// A callback writing `video_name` inside `save_folder` at [`DEFAULT_VIDEO_FPS`] with MPEG-4.
    pub fn new(save_folder: impl AsRef<Path>, video_name: &str) -> Result<Self> {
        let save_folder = save_folder.as_ref();
        if !save_folder.is_dir() {
            return Err(Error::SaveFolderNotFound {
                path: save_folder.to_path_buf(),
            });
        }

        ffmpeg::init()?;

        Ok(Self {
            path: save_folder.join(video_name),
            fps: DEFAULT_VIDEO_FPS,
            codec: codec::Id::MPEG4,
            writer: None,
            frames: 0,
            finished: false,
        })
    }

    pub fn with_fps(mut self, fps: i32) -> Result<Self> {
        if fps <= 0 {
            return Err(Error::InvalidParameter {
                parameter: "video frame rate",
                value: fps.to_string(),
                expected: "a positive number of frames per second".to_string(),
            });
        }

        self.fps = fps;
        Ok(self)
    }

    /// Selects the encoder, e.g. [`codec::Id::H264`] when FFmpeg is built with libx264.
    #[must_use]
    pub fn with_codec(mut self, codec: codec::Id) -> Self {
        self.codec = codec;
        self
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of frames encoded so far.
    #[must_use]
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Flushes the encoder and writes the container trailer.
    ///
    /// Frames given after this are rejected.
    pub fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;

        if let Some(writer) = self.writer.as_mut() {
            writer.finish()?;
            tracing::info!(path = %self.path.display(), frames = self.frames, "video saved");
        }

        Ok(())
    }
}

impl FrameCallback for SaveVideoCallback {
    fn on_frame(&mut self, image: &Image, _filename: &str) -> Result<()> {
        if self.finished {
            return Err(Error::invalid_state(format!(
                "video {} is already finished",
                self.path.display()
            )));
        }

        let writer = match self.writer.take() {
            Some(writer) => writer,
            None => {
                let writer = Writer::open(&self.path, self.codec, self.fps, image)?;
                tracing::debug!(
                    path = %self.path.display(),
                    width = writer.width,
                    height = writer.height,
                    fps = self.fps,
                    "opened video"
                );
                writer
            }
        };
        let writer = self.writer.insert(writer);

        writer.write(image, self.frames as i64)?;
        self.frames += 1;

        tracing::debug!(frame = self.frames, "frame added to video");
        Ok(())
    }
}

impl Drop for SaveVideoCallback {
    fn drop(&mut self) {
        if let Err(error) = self.finish() {
            tracing::error!(path = %self.path.display(), %error, "failed to finalise video");
        }
    }
}

impl std::fmt::Debug for SaveVideoCallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaveVideoCallback")
            .field("path", &self.path)
            .field("fps", &self.fps)
            .field("codec", &self.codec)
            .field("frames", &self.frames)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

struct Writer {
    output: format::context::Output,
    encoder: encoder::Video,
    stream_index: usize,
    encoder_time_base: Rational,
    stream_time_base: Rational,
    width: u32,
    height: u32,
}

impl Writer {
    fn open(path: &Path, codec_id: codec::Id, fps: i32, first: &Image) -> Result<Self> {
        let (width, height) = dimensions(first)?;

        let mut output = format::output(&path)?;
        let global_header = output
            .format()
            .flags()
            .contains(format::Flags::GLOBAL_HEADER);

        let video_codec = encoder::find(codec_id)
            .ok_or(ffmpeg::Error::EncoderNotFound)?
            .video()?;

        let mut encoder = codec::context::Context::new_with_codec(*video_codec)
            .encoder()
            .video()?;
        encoder.set_width(width);
        encoder.set_height(height);
        encoder.set_format(format::Pixel::YUV420P);
        encoder.set_time_base((1, fps));
        encoder.set_frame_rate(Some((fps, 1)));
        if global_header {
            encoder.set_flags(codec::Flags::GLOBAL_HEADER);
        }
        let encoder = encoder.open_with(ffmpeg::Dictionary::new())?;

        let stream_index = {
            let mut stream = output.add_stream(*video_codec)?;
            stream.set_parameters(&encoder);
            stream.set_time_base((1, fps));
            stream.index()
        };

        output.write_header()?;
        let stream_time_base = output
            .stream(stream_index)
            .map(|stream| stream.time_base())
            .ok_or(ffmpeg::Error::StreamNotFound)?;

        Ok(Self {
            output,
            encoder,
            stream_index,
            encoder_time_base: Rational::new(1, fps),
            stream_time_base,
            width,
            height,
        })
    }

    fn write(&mut self, image: &Image, pts: i64) -> Result<()> {
        let (width, height) = dimensions(image)?;
        if (width, height) != (self.width, self.height) {
            return Err(Error::InvalidParameter {
                parameter: "video frame size",
                value: format!("{width}x{height}"),
                expected: format!("{}x{}", self.width, self.height),
            });
        }

        let rgb = image.to_rgb8();
        let mut input = frame::Video::new(format::Pixel::RGB24, width, height);
        let stride = input.stride(0);
        let row = rgb.width() * 3;
        for (dst, src) in input
            .data_mut(0)
            .chunks_mut(stride)
            .zip(rgb.as_bytes().chunks(row))
        {
            dst[..row].copy_from_slice(src);
        }

        let mut scaler = scaling::Context::get(
            format::Pixel::RGB24,
            width,
            height,
            format::Pixel::YUV420P,
            width,
            height,
            scaling::Flags::BILINEAR,
        )?;
        let mut yuv = frame::Video::empty();
        scaler.run(&input, &mut yuv)?;
        yuv.set_pts(Some(pts));

        self.encoder.send_frame(&yuv)?;
        self.write_packets()
    }

    fn finish(&mut self) -> Result<()> {
        self.encoder.send_eof()?;
        self.write_packets()?;
        self.output.write_trailer()?;
        Ok(())
    }

    fn write_packets(&mut self) -> Result<()> {
        let mut packet = Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(self.stream_index);
            packet.rescale_ts(self.encoder_time_base, self.stream_time_base);
            packet.write_interleaved(&mut self.output)?;
        }
        Ok(())
    }
}

fn dimensions(image: &Image) -> Result<(u32, u32)> {
    let to_u32 = |value: usize| {
        u32::try_from(value).map_err(|_| Error::InvalidParameter {
            parameter: "video frame size",
            value: value.to_string(),
            expected: "a dimension that fits in 32 bits".to_string(),
        })
    };

    Ok((to_u32(image.width())?, to_u32(image.height())?))
}
