//! Background thread that periodically evicts idle resources.
//!
//! The reaper knows nothing about pools: it runs a sweep closure on a fixed
//! interval until it is stopped or the closure reports that its target is
//! gone. Stopping closes a channel the thread selects on and then joins the
//! thread, so once [`Reaper::stop`] returns no sweep is running or will run.

use crossbeam_channel::{bounded, select, tick, Sender};
use log::{debug, error};
use std::io;
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub(crate) struct Reaper {
    /// Dropping this wakes the thread and tells it to exit
    stop_tx: Option<Sender<()>>,

    handle: Option<JoinHandle<()>>,
}

impl Reaper {
    /// Start a thread named `name` that calls `sweep` every `interval`.
    ///
    /// The thread exits on its own once `sweep` returns `false`.
    pub(crate) fn spawn<F>(name: &str, interval: Duration, mut sweep: F) -> io::Result<Self>
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let (stop_tx, stop_rx) = bounded::<()>(0);

        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let ticker = tick(interval);
                loop {
                    select! {
                        recv(stop_rx) -> _ => break,
                        recv(ticker) -> _ => {
                            if !sweep() {
                                debug!("Reaper target dropped, exiting");
                                break;
                            }
                        }
                    }
                }
            })?;

        debug!("Started reaper thread {} with interval {:?}", name, interval);

        Ok(Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }

    /// Stop the thread and wait for it to finish. Idempotent.
    pub(crate) fn stop(&mut self) {
        drop(self.stop_tx.take());

        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Reaper thread panicked");
            }
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for Reaper {
    fn drop(&mut self) {
        self.stop();
    }
}
