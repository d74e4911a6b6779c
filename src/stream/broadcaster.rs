//! Lossy fan-out from the pipeline's frame stream to N listeners
//!
//! Every frame is offered to every current listener exactly once with a
//! non-blocking send. A listener that stops draining its queue loses frames;
//! it never stalls the broadcast or the other listeners.

use crate::audio::Frame;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Frames buffered per listener (~3 seconds at 20 ms per frame).
const LISTENER_BUFFER: usize = 150;

/// One subscription: a bounded frame queue plus a one-shot cancel signal
/// raised exactly once on unsubscribe.
pub struct Listener {
    id: u64,
    /// Incoming frames, in pipeline emission order with drops at overflow.
    pub frames: mpsc::Receiver<Frame>,
    /// Fired when the listener is unsubscribed.
    pub cancelled: CancellationToken,
}

impl Listener {
    pub fn id(&self) -> u64 {
        self.id
    }
}

struct ListenerHandle {
    frames: mpsc::Sender<Frame>,
    cancelled: CancellationToken,
}

/// Fans PCM frames out from one source to every subscribed listener.
pub struct Broadcaster {
    listeners: RwLock<HashMap<u64, ListenerHandle>>,
    next_id: AtomicU64,
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl Broadcaster {
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a new listener. Frames start arriving with the next frame
    /// the broadcaster processes.
    pub fn subscribe(&self) -> Listener {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(LISTENER_BUFFER);
        let cancelled = CancellationToken::new();

        if let Ok(mut listeners) = self.listeners.write() {
            listeners.insert(
                id,
                ListenerHandle {
                    frames: tx,
                    cancelled: cancelled.clone(),
                },
            );
        }

        Listener {
            id,
            frames: rx,
            cancelled,
        }
    }

    /// Remove a listener and raise its cancel signal.
    pub fn unsubscribe(&self, id: u64) {
        let removed = match self.listeners.write() {
            Ok(mut listeners) => listeners.remove(&id),
            Err(_) => None,
        };
        if let Some(handle) = removed {
            handle.cancelled.cancel();
        }
    }

    /// Number of active listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.read().map(|l| l.len()).unwrap_or(0)
    }

    /// Read frames from `source` and fan them out until the token fires or
    /// the source closes. Full listener queues drop the frame for that
    /// listener only.
    pub async fn run(&self, cancel: CancellationToken, mut source: mpsc::Receiver<Frame>) {
        loop {
            let frame = tokio::select! {
                _ = cancel.cancelled() => break,
                next = source.recv() => match next {
                    Some(frame) => frame,
                    None => break,
                },
            };

            if let Ok(listeners) = self.listeners.read() {
                for handle in listeners.values() {
                    if handle.frames.try_send(frame.clone()).is_err() {
                        // Listener too slow; drop the frame to keep the
                        // broadcast moving.
                        debug!("listener queue full, frame dropped");
                    }
                }
            }
        }
        info!("broadcaster stopped");
    }
}

/// Unsubscribes its listener when dropped, so transport handlers cannot
/// leak broadcaster entries on disconnect.
pub struct ListenerGuard {
    broadcaster: Arc<Broadcaster>,
    id: u64,
}

impl ListenerGuard {
    pub fn new(broadcaster: Arc<Broadcaster>, listener: &Listener) -> Self {
        Self {
            broadcaster,
            id: listener.id(),
        }
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.broadcaster.unsubscribe(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_of(samples: &[i16]) -> Frame {
        samples.into()
    }

    #[test]
    fn subscribe_and_unsubscribe_track_count() {
        let b = Broadcaster::new();
        assert_eq!(b.listener_count(), 0);

        let first = b.subscribe();
        let second = b.subscribe();
        assert_eq!(b.listener_count(), 2);

        b.unsubscribe(first.id());
        assert_eq!(b.listener_count(), 1);
        b.unsubscribe(second.id());
        assert_eq!(b.listener_count(), 0);
    }

    #[test]
    fn unsubscribe_fires_cancel_exactly_once() {
        let b = Broadcaster::new();
        let listener = b.subscribe();
        assert!(!listener.cancelled.is_cancelled());

        b.unsubscribe(listener.id());
        assert!(listener.cancelled.is_cancelled());

        // A second unsubscribe for the same id is a no-op.
        b.unsubscribe(listener.id());
        assert!(listener.cancelled.is_cancelled());
    }

    #[test]
    fn unsubscribe_unknown_id_is_noop() {
        let b = Broadcaster::new();
        b.unsubscribe(9999);
        assert_eq!(b.listener_count(), 0);
    }

    #[tokio::test]
    async fn guard_unsubscribes_on_drop() {
        let b = Arc::new(Broadcaster::new());
        let listener = b.subscribe();
        {
            let _guard = ListenerGuard::new(b.clone(), &listener);
            assert_eq!(b.listener_count(), 1);
        }
        assert_eq!(b.listener_count(), 0);
        assert!(listener.cancelled.is_cancelled());
    }

    #[tokio::test]
    async fn late_subscriber_misses_earlier_frames() {
        let b = Arc::new(Broadcaster::new());
        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::channel(16);

        let runner = {
            let b = b.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { b.run(cancel, rx).await })
        };

        tx.send(frame_of(&[1, 2])).await.unwrap();
        // Give the broadcast loop a chance to process frame one with no
        // subscribers at all.
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let mut late = b.subscribe();
        tx.send(frame_of(&[3, 4])).await.unwrap();
        drop(tx);

        let got = late.frames.recv().await.unwrap();
        assert_eq!(&got[..], &[3, 4]);
        assert!(late.frames.try_recv().is_err(), "frame [1, 2] should be gone");

        cancel.cancel();
        runner.await.unwrap();
    }
}
