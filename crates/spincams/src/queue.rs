//! FIFO of acquired frames shared between the acquisition thread and its consumers.
use std::{fmt, time::Duration};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};

use crate::{Error, Image, Result};

/// A frame pushed by the acquisition loop.
#[derive(Debug, Clone)]
pub struct QueuedImage {
    /// The frame, converted to RGB8.
    pub image: Image,
    /// Filename generated for the frame, `cam-<serial>_img-<n>_<timestamp>.jpg`.
    pub filename: String,
    pub serial: String,
    /// Acquisition round the frame was taken in, starting at zero.
    pub frame_number: u64,
}

/// Thread safe image queue.
///
/// Clones share the same underlying channel, so one clone can be handed to
/// [`Cameras`](crate::Cameras) while another is drained on a consumer thread.
#[derive(Clone)]
pub struct ImageQueue {
    sender: Sender<QueuedImage>,
    receiver: Receiver<QueuedImage>,
    capacity: Option<usize>,
}

impl ImageQueue {
    /// A queue that never blocks the producer.
    #[must_use]
    pub fn unbounded() -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self {
            sender,
            receiver,
            capacity: None,
        }
    }

    /// A queue holding at most `capacity` frames, [`push`](Self::push) blocks while it is full.
    #[must_use]
    pub fn bounded(capacity: usize) -> Self {
        let (sender, receiver) = crossbeam_channel::bounded(capacity);
        Self {
            sender,
            receiver,
            capacity: Some(capacity),
        }
    }

    pub fn push(&self, record: QueuedImage) -> Result<()> {
        // Both ends live as long as `self`, so the channel cannot be disconnected here.
        self.sender
            .send(record)
            .map_err(|_| Error::invalid_state("image queue is disconnected"))
    }

    /// Blocks until a frame is available.
    pub fn pop(&self) -> Result<QueuedImage> {
        self.receiver
            .recv()
            .map_err(|_| Error::invalid_state("image queue is disconnected"))
    }

    /// Waits up to `timeout` for a frame.
    #[must_use]
    pub fn pop_timeout(&self, timeout: Duration) -> Option<QueuedImage> {
        match self.receiver.recv_timeout(timeout) {
            Ok(record) => Some(record),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    #[must_use]
    pub fn try_pop(&self) -> Option<QueuedImage> {
        match self.receiver.try_recv() {
            Ok(record) => Some(record),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Removes and returns everything currently queued.
    pub fn drain(&self) -> Vec<QueuedImage> {
        self.receiver.try_iter().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }
}

impl Default for ImageQueue {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl fmt::Debug for ImageQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageQueue")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::PixelFormat;

    fn record(frame_number: u64) -> QueuedImage {
        QueuedImage {
            image: Image::new(1, 1, PixelFormat::Mono8, vec![0]).unwrap(),
            filename: format!("img-{frame_number}.jpg"),
            serial: String::new(),
            frame_number,
        }
    }

    #[test]
    fn keeps_fifo_order() {
        let queue = ImageQueue::unbounded();
        for n in 0..3 {
            queue.push(record(n)).unwrap();
        }

        assert_eq!(queue.len(), 3);
        let order: Vec<_> = queue.drain().into_iter().map(|r| r.frame_number).collect();
        assert_eq!(order, [0, 1, 2]);
        assert!(queue.is_empty());
    }

    #[test]
    fn empty_queue_times_out() {
        let queue = ImageQueue::bounded(1);
        assert!(queue.try_pop().is_none());
        assert!(queue.pop_timeout(Duration::from_millis(5)).is_none());
    }

    #[test]
    fn pop_blocks_until_pushed() {
        let queue = ImageQueue::bounded(1);
        let producer = queue.clone();

        let handle = thread::spawn(move || {
            for n in 0..4 {
                producer.push(record(n)).unwrap();
            }
        });

        let received: Vec<_> = (0..4).map(|_| queue.pop().unwrap().frame_number).collect();
        handle.join().unwrap();

        assert_eq!(received, [0, 1, 2, 3]);
    }
}
