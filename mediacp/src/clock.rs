//! Position polling while a renderer plays.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

use crate::renderer::Renderer;

/// Interval between two position polls.
pub const TICK: Duration = Duration::from_secs(1);

/// A periodic position poll running on its own thread.
///
/// The thread only holds a weak reference to its renderer and ends as soon
/// as the renderer is dropped. Once [`stop`](Self::stop) returns, the clock
/// never publishes again, even if a poll is in flight at that moment.
pub struct PositionClock {
    running: Arc<AtomicBool>,
    stop_tx: mpsc::Sender<()>,
}

impl PositionClock {
    pub(crate) fn start(renderer: Weak<Renderer>, period: Duration) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let (stop_tx, stop_rx) = mpsc::channel();
        let thread_running = Arc::clone(&running);

        let spawned = thread::Builder::new()
            .name("mediacp-clock".to_string())
            .spawn(move || {
                loop {
                    match stop_rx.recv_timeout(period) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                    if !thread_running.load(Ordering::SeqCst) {
                        break;
                    }
                    let Some(renderer) = renderer.upgrade() else {
                        break;
                    };
                    renderer.clock_tick(&thread_running);
                }
                tracing::trace!("Position clock stopped");
            });

        if let Err(e) = spawned {
            tracing::error!("Failed to spawn position clock: {}", e);
            running.store(false, Ordering::SeqCst);
        }

        Self { running, stop_tx }
    }

    /// Cancel the clock without waiting for its thread.
    ///
    /// A poll in flight finishes its network request but drops the result.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        let _ = self.stop_tx.send(());
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for PositionClock {
    fn drop(&mut self) {
        self.stop();
    }
}
