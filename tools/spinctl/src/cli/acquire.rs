use std::{
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use clap::Parser;
use colored::Colorize;
use spincams::{
    AcquisitionSummary, ImageQueue,
    config::{Config, SpincamsConfig},
};

use super::{BackendOpts, check_batch};
use crate::error::Result;

const CONSUMER_POLL: Duration = Duration::from_millis(100);

/// Acquire images from every connected camera.
#[derive(Clone, Debug, Default, Parser)]
pub struct Acquire {
    /// Rounds of images to acquire, runs until Ctrl-C when unset
    #[clap(long, short)]
    pub num_images: Option<u64>,

    /// Folder the images are written to
    #[clap(long, short)]
    pub save_folder: Option<PathBuf>,

    /// Directory containing a `spincams.toml` with acquisition and camera settings
    #[clap(long, short)]
    pub config: Option<PathBuf>,

    /// Hand the images to a consumer thread through a queue
    #[clap(long, short)]
    pub queue: bool,
}

impl Acquire {
    pub async fn acquire(self, backend: &BackendOpts) -> Result<()> {
        let config = match &self.config {
            Some(root) => SpincamsConfig::load(root)?,
            None => SpincamsConfig::default(),
        };

        let mut settings = config.acquisition.clone();
        if let Some(folder) = self.save_folder {
            settings.save_folder = Some(folder);
        }
        settings.verbose |= backend.verbose;
        let num_images = self.num_images.or(settings.num_images);

        let queue = self.queue.then(|| match settings.queue_capacity {
            Some(capacity) => ImageQueue::bounded(capacity),
            None => ImageQueue::unbounded(),
        });

        let mut builder = settings.configure(backend.builder()?);
        if let Some(queue) = &queue {
            builder = builder.queue(queue.clone());
        }
        let mut cameras = builder.build()?;
        println!("{}", cameras.version_info()?.bold());

        let initialised = cameras.initialise_cameras();
        for (serial, error) in &initialised.failed {
            println!("{} skipping camera {}: {error}", "!".yellow().bold(), serial.blue());
        }
        check_batch("configure", &config.apply(&mut cameras))?;

        let stop = cameras.stop_handle();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("received Ctrl-C, stopping acquisition");
                stop.stop();
            }
        });

        let finished = Arc::new(AtomicBool::new(false));
        let consumer = queue.map(|queue| {
            let finished = finished.clone();
            tokio::task::spawn_blocking(move || consume(&queue, &finished))
        });

        let acquisition = tokio::task::spawn_blocking(move || cameras.acquire_images(num_images));
        let summary = acquisition.await;
        finished.store(true, Ordering::SeqCst);

        let consumed = match consumer {
            Some(consumer) => Some(consumer.await?),
            None => None,
        };

        print_summary(&summary??, consumed);
        Ok(())
    }
}

/// Pops images until acquisition has finished and the queue is empty.
fn consume(queue: &ImageQueue, finished: &AtomicBool) -> u64 {
    let mut consumed = 0;
    loop {
        match queue.pop_timeout(CONSUMER_POLL) {
            Some(record) => {
                consumed += 1;
                tracing::info!(
                    serial = %record.serial,
                    frame = record.frame_number,
                    width = record.image.width(),
                    height = record.image.height(),
                    filename = %record.filename,
                    "consumed image"
                );
            }
            None if finished.load(Ordering::SeqCst) && queue.is_empty() => return consumed,
            None => {}
        }
    }
}

fn print_summary(summary: &AcquisitionSummary, consumed: Option<u64>) {
    let status = if summary.cancelled {
        "Cancelled".yellow().bold()
    } else {
        "Finished".green().bold()
    };
    println!("{status} after {} round(s)", summary.rounds);

    for (serial, delivered) in &summary.delivered {
        println!("  {:<12} {delivered} image(s)", serial.blue());
    }
    if summary.incomplete > 0 {
        println!("  {} incomplete image(s) skipped", summary.incomplete.to_string().yellow());
    }
    if summary.timeouts > 0 {
        println!("  {} grab timeout(s)", summary.timeouts.to_string().yellow());
    }
    if let Some(consumed) = consumed {
        println!("  {consumed} image(s) consumed from the queue");
    }
}
