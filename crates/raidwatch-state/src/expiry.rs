//! Idle-expiry timer.
//!
//! A single background thread counts down from the last `arm` call. When it
//! runs out it sends an [`ExpiryTick`] to the state owner's channel; it never
//! touches state itself. Every arm carries a generation number and the owner
//! drops ticks whose generation is no longer current, so a reset that the
//! owner processed first always wins over a tick already in flight.

use std::io;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

/// Sent when a countdown finishes without being re-armed or cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryTick {
    pub generation: u64,
}

#[derive(Debug)]
enum TimerCommand {
    Arm(u64),
    Disarm,
    Shutdown,
}

/// Handle to the countdown thread. Dropping it stops the thread.
#[derive(Debug)]
pub struct ExpiryTimer {
    duration: Duration,
    cmd_tx: Sender<TimerCommand>,
    handle: Option<JoinHandle<()>>,
}

impl ExpiryTimer {
    /// Start the countdown thread. Ticks are delivered on `sink`, converted
    /// into whatever command type the owner listens for.
    pub fn spawn<T>(duration: Duration, sink: Sender<T>) -> io::Result<Self>
    where
        T: From<ExpiryTick> + Send + 'static,
    {
        let (cmd_tx, cmd_rx) = mpsc::channel::<TimerCommand>();
        let handle = std::thread::Builder::new()
            .name("raidwatch-expiry".into())
            .spawn(move || run_timer(duration, cmd_rx, sink))?;
        Ok(Self {
            duration,
            cmd_tx,
            handle: Some(handle),
        })
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Restart the countdown for a full `duration`, replacing any pending one.
    pub fn arm(&self, generation: u64) {
        let _ = self.cmd_tx.send(TimerCommand::Arm(generation));
    }

    /// Cancel the pending countdown, if any.
    pub fn disarm(&self) {
        let _ = self.cmd_tx.send(TimerCommand::Disarm);
    }
}

impl Drop for ExpiryTimer {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(TimerCommand::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run_timer<T: From<ExpiryTick>>(
    duration: Duration,
    cmd_rx: mpsc::Receiver<TimerCommand>,
    sink: Sender<T>,
) {
    let mut pending: Option<(Instant, u64)> = None;

    loop {
        let cmd = match pending {
            None => match cmd_rx.recv() {
                Ok(cmd) => cmd,
                Err(_) => return,
            },
            Some((deadline, generation)) => {
                let wait = deadline.saturating_duration_since(Instant::now());
                match cmd_rx.recv_timeout(wait) {
                    Ok(cmd) => cmd,
                    Err(RecvTimeoutError::Timeout) => {
                        debug!(generation, "Idle timer fired");
                        pending = None;
                        if sink.send(T::from(ExpiryTick { generation })).is_err() {
                            return;
                        }
                        continue;
                    }
                    Err(RecvTimeoutError::Disconnected) => return,
                }
            }
        };

        match cmd {
            TimerCommand::Arm(generation) => {
                trace!(generation, "Idle timer armed");
                pending = Some((Instant::now() + duration, generation));
            }
            TimerCommand::Disarm => {
                trace!("Idle timer disarmed");
                pending = None;
            }
            TimerCommand::Shutdown => return,
        }
    }
}
