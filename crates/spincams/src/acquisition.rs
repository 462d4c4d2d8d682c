//! The acquisition loop of [`Cameras`].
use std::{
    collections::BTreeMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use chrono::{DateTime, Local};

use crate::{Camera, Cameras, Error, Image, QueuedImage, Result, sdk::codes};

/// Cooperative cancellation for [`Cameras::acquire_images`].
///
/// The loop checks the handle between frames, so a stop request lets the frame in flight finish.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clears a previous stop request so the collection can acquire again.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// What a call to [`Cameras::acquire_images`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcquisitionSummary {
    /// Completed rounds, one frame requested from every camera per round.
    pub rounds: u64,
    /// Delivered frames per camera serial.
    pub delivered: BTreeMap<String, u64>,
    pub incomplete: u64,
    pub timeouts: u64,
    /// Whether the loop ended because of a stop request.
    pub cancelled: bool,
}

impl AcquisitionSummary {
    #[must_use]
    pub fn delivered_by(&self, serial: &str) -> u64 {
        self.delivered.get(serial).copied().unwrap_or_default()
    }

    #[must_use]
    pub fn total_delivered(&self) -> u64 {
        self.delivered.values().sum()
    }
}

/// Filename for frame `frame_number` of the camera with the given serial.
///
/// `cam-<serial>_img-<n>_<timestamp>.jpg`, or `img-<n>_<timestamp>.jpg` without a serial.
#[must_use]
pub fn frame_filename(serial: &str, frame_number: u64, time: DateTime<Local>) -> String {
    let timestamp = time.format("%Y-%m-%dT%H:%M:%S:%6f");
    if serial.is_empty() {
        format!("img-{frame_number}_{timestamp}.jpg")
    } else {
        format!("cam-{serial}_img-{frame_number}_{timestamp}.jpg")
    }
}

impl Cameras {
    /// Acquires `num_images` rounds of frames from every camera, or runs until stopped.
    ///
    /// Every complete frame is converted to RGB8 and handed to the camera's callback if it has
    /// one. Otherwise it is written to the save folder and pushed to the queue, whichever of
    /// the two are configured. Incomplete frames and grab timeouts are logged and skipped.
    ///
    /// Only initialised cameras take part, the others are skipped with a warning. It fails with
    /// [`Error::InvalidState`] when no camera could be started.
    ///
    /// Acquisition is ended on every camera before this returns, also on error.
    pub fn acquire_images(&mut self, num_images: Option<u64>) -> Result<AcquisitionSummary> {
        if self.is_empty() {
            tracing::warn!("no cameras detected, nothing to acquire");
            return Ok(AcquisitionSummary::default());
        }

        let result = self.start_all().and_then(|()| self.run(num_images));
        let stopped = self.stop_all();

        let summary = result?;
        stopped?;

        if summary.cancelled {
            tracing::info!(rounds = summary.rounds, "acquisition cancelled");
        } else {
            tracing::info!(
                rounds = summary.rounds,
                cameras = self.len(),
                "acquisition finished"
            );
        }
        Ok(summary)
    }

    fn start_all(&mut self) -> Result<()> {
        let mut active = 0;
        for camera in self.cameras_mut() {
            if !camera.is_initialised() {
                tracing::warn!(serial = camera.serial(), "skipping uninitialised camera");
                continue;
            }

            match camera.start_acquisition() {
                Ok(()) => active += 1,
                Err(error) => {
                    tracing::error!(serial = camera.serial(), %error, "failed to start acquisition");
                }
            }
        }

        if active == 0 {
            return Err(Error::invalid_state(
                "no camera is acquiring, initialise the cameras first",
            ));
        }
        Ok(())
    }

    fn stop_all(&mut self) -> Result<()> {
        let mut first_error = None;
        for camera in self.cameras_mut() {
            if let Err(error) = camera.stop_acquisition() {
                tracing::error!(serial = camera.serial(), %error, "failed to stop acquisition");
                first_error.get_or_insert(error);
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    fn run(&mut self, num_images: Option<u64>) -> Result<AcquisitionSummary> {
        let mut summary = AcquisitionSummary::default();
        let stop = self.stop_handle();
        let timeout = self.grab_timeout();
        let verbose = self.is_verbose();
        let save_folder = self.save_folder().map(ToOwned::to_owned);
        let queue = self.queue().cloned();

        'acquisition: while num_images.is_none_or(|n| summary.rounds < n) {
            let round = summary.rounds;

            for camera in self.cameras_mut().iter_mut().filter(|camera| camera.is_streaming()) {
                if stop.is_stopped() {
                    summary.cancelled = true;
                    break 'acquisition;
                }

                let image = match camera.next_image(timeout) {
                    Ok(image) => image,
                    Err(Error::IncompleteImage { status }) => {
                        tracing::warn!(serial = camera.serial(), status, "image incomplete");
                        summary.incomplete += 1;
                        continue;
                    }
                    Err(Error::Sdk {
                        code: codes::TIMEOUT,
                        message,
                    }) => {
                        tracing::warn!(serial = camera.serial(), %message, "timed out waiting for image");
                        summary.timeouts += 1;
                        continue;
                    }
                    Err(error) => return Err(error),
                };

                if verbose {
                    tracing::info!(
                        index = camera.index(),
                        round,
                        width = image.width(),
                        height = image.height(),
                        "camera grabbed image"
                    );
                }

                let filename = frame_filename(camera.serial(), round, Local::now());
                deliver(
                    camera,
                    image.to_rgb8(),
                    filename,
                    round,
                    save_folder.as_deref(),
                    queue.as_ref(),
                )?;

                *summary
                    .delivered
                    .entry(camera.serial().to_string())
                    .or_default() += 1;
            }

            summary.rounds += 1;
        }

        Ok(summary)
    }
}

fn deliver(
    camera: &mut Camera,
    image: Image,
    filename: String,
    frame_number: u64,
    save_folder: Option<&std::path::Path>,
    queue: Option<&crate::ImageQueue>,
) -> Result<()> {
    if let Some(result) = camera.dispatch(&image, &filename) {
        if let Err(error) = result {
            tracing::error!(serial = camera.serial(), %filename, %error, "frame callback failed");
        }
        return Ok(());
    }

    if let Some(folder) = save_folder {
        let path = folder.join(&filename);
        image.save(&path)?;
        tracing::debug!(path = %path.display(), "image saved");
    }

    match queue {
        Some(queue) => queue.push(QueuedImage {
            image,
            filename,
            serial: camera.serial().to_string(),
            frame_number,
        })?,
        None if save_folder.is_none() => tracing::info!(%filename, "image grabbed"),
        None => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::TimeZone;

    use super::*;
    use crate::{
        ImageQueue, PixelFormat, System, Trigger,
        sdk::sim::{SimCamera, SimSystem},
    };

    #[test]
    fn filename_includes_serial_and_microseconds() {
        let time = Local
            .with_ymd_and_hms(2024, 3, 5, 14, 7, 9)
            .unwrap()
            .checked_add_signed(chrono::TimeDelta::microseconds(42))
            .unwrap();

        assert_eq!(
            frame_filename("24132701", 3, time),
            "cam-24132701_img-3_2024-03-05T14:07:09:000042.jpg"
        );
        assert_eq!(
            frame_filename("", 0, time),
            "img-0_2024-03-05T14:07:09:000042.jpg"
        );
    }

    #[test]
    fn acquires_requested_rounds_into_queue() {
        let queue = ImageQueue::unbounded();
        let mut cameras = Cameras::builder(System::new(SimSystem::with_cameras(2)))
            .queue(queue.clone())
            .build()
            .unwrap();
        cameras.initialise_cameras();

        let summary = cameras.acquire_images(Some(10)).unwrap();

        assert_eq!(summary.rounds, 10);
        assert_eq!(summary.delivered_by("24132701"), 10);
        assert_eq!(summary.delivered_by("24132702"), 10);
        assert!(!summary.cancelled);

        let records = queue.drain();
        assert_eq!(records.len(), 20);
        assert_eq!(records[0].serial, "24132701");
        assert_eq!(records[1].serial, "24132702");
        assert_eq!(records[19].frame_number, 9);
        assert!(records[0].filename.starts_with("cam-24132701_img-0_"));
        assert_eq!(records[0].image.pixel_format(), PixelFormat::RGB8);

        assert!(cameras.iter().all(|camera| !camera.is_streaming()));
    }

    #[test]
    fn callback_takes_precedence_over_queue() {
        let queue = ImageQueue::unbounded();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut cameras = Cameras::builder(System::new(SimSystem::with_cameras(2)))
            .queue(queue.clone())
            .build()
            .unwrap();
        cameras.initialise_cameras();

        let sink = seen.clone();
        cameras
            .get_mut(0)
            .unwrap()
            .set_callback_function(move |_: &Image, filename: &str| -> Result<()> {
                sink.lock().unwrap().push(filename.to_string());
                Ok(())
            })
            .unwrap();

        cameras.acquire_images(Some(3)).unwrap();

        assert_eq!(seen.lock().unwrap().len(), 3);
        let queued = queue.drain();
        assert_eq!(queued.len(), 3);
        assert!(queued.iter().all(|record| record.serial == "24132702"));
    }

    #[test]
    fn saves_frames_to_folder() {
        let dir = tempfile::tempdir().unwrap();
        let mut cameras = Cameras::builder(System::new(SimSystem::with_cameras(1)))
            .save_folder(dir.path())
            .build()
            .unwrap();
        cameras.initialise_cameras();

        cameras.acquire_images(Some(2)).unwrap();

        let mut saved: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        saved.sort();
        assert_eq!(saved.len(), 2);
        assert!(saved[0].starts_with("cam-24132701_img-0_"));
        assert!(saved[1].starts_with("cam-24132701_img-1_"));
    }

    #[test]
    fn incomplete_frames_are_skipped() {
        let queue = ImageQueue::unbounded();
        let system = SimSystem::new().with_camera(SimCamera::new("5").incomplete_every(2));
        let mut cameras = Cameras::builder(System::new(system))
            .queue(queue.clone())
            .build()
            .unwrap();
        cameras.initialise_cameras();

        let summary = cameras.acquire_images(Some(4)).unwrap();

        assert_eq!(summary.incomplete, 2);
        assert_eq!(summary.delivered_by("5"), 2);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn timeouts_are_skipped() {
        let mut cameras = Cameras::new(System::new(SimSystem::with_cameras(1))).unwrap();
        cameras.initialise_cameras();
        cameras
            .get_mut(0)
            .unwrap()
            .set_trigger_mode(Trigger::Software)
            .unwrap();

        let summary = cameras.acquire_images(Some(2)).unwrap();

        assert_eq!(summary.timeouts, 2);
        assert_eq!(summary.total_delivered(), 0);
    }

    #[test]
    fn stop_before_start_cancels() {
        let mut cameras = Cameras::new(System::new(SimSystem::with_cameras(1))).unwrap();
        cameras.initialise_cameras();
        let stop = cameras.stop_handle();
        stop.stop();

        let summary = cameras.acquire_images(None).unwrap();

        assert!(summary.cancelled);
        assert_eq!(summary.rounds, 0);

        stop.reset();
        assert_eq!(cameras.acquire_images(Some(1)).unwrap().rounds, 1);
    }

    #[test]
    fn failed_camera_does_not_block_the_others() {
        let queue = ImageQueue::unbounded();
        let system = SimSystem::new()
            .with_camera(SimCamera::new("1"))
            .with_camera(SimCamera::new("2").fail_init("Unable to open device"));
        let mut cameras = Cameras::builder(System::new(system))
            .queue(queue.clone())
            .build()
            .unwrap();
        assert_eq!(cameras.initialise_cameras().failed.len(), 1);

        let summary = cameras.acquire_images(Some(3)).unwrap();

        assert_eq!(summary.delivered_by("1"), 3);
        assert_eq!(summary.delivered_by("2"), 0);
        let queued = queue.drain();
        assert_eq!(queued.len(), 3);
        assert!(queued.iter().all(|record| record.serial == "1"));
    }

    #[test]
    fn uninitialised_cameras_cannot_acquire() {
        let mut cameras = Cameras::new(System::new(SimSystem::with_cameras(1))).unwrap();

        assert!(matches!(
            cameras.acquire_images(Some(1)),
            Err(Error::InvalidState { .. })
        ));
    }
}
