//! Signal bridge
//!
//! OS signals are turned into [`ControlSignal`] messages on a channel. The
//! runner consumes them on its own task and calls [`SignalBridge::dispatch`],
//! so no session state is touched from signal context.
//!
//! - SIGINT / SIGTERM (Ctrl+C on Windows): stop recording, once
//! - SIGTSTP (Unix only): toggle pause/resume

use super::session::CaptureSession;
use tokio::sync::mpsc;

/// External control request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    /// Terminate request, finalize the recording
    Interrupt,
    /// Suspend request, toggle pause
    Suspend,
}

/// What a dispatched signal did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatched {
    Stopped,
    Toggled,
    Ignored,
}

/// Maps control signals onto session transitions
#[derive(Debug, Default)]
pub struct SignalBridge {
    stop_requested: bool,
}

impl SignalBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an interrupt has already been forwarded
    pub fn stop_requested(&self) -> bool {
        self.stop_requested
    }

    /// Apply one signal to the session
    pub fn dispatch(&mut self, signal: ControlSignal, session: &CaptureSession) -> Dispatched {
        match signal {
            ControlSignal::Interrupt => {
                if self.stop_requested {
                    tracing::debug!("Interrupt ignored, finalization already requested");
                    return Dispatched::Ignored;
                }
                self.stop_requested = true;
                tracing::info!("Interrupt received, stopping");
                session.stop();
                Dispatched::Stopped
            }
            ControlSignal::Suspend => match session.toggle_pause() {
                Ok(()) => Dispatched::Toggled,
                Err(_) => Dispatched::Ignored,
            },
        }
    }

    /// Install OS signal handlers and return the channel they feed.
    ///
    /// Must be called from within a tokio runtime.
    pub fn listen() -> std::io::Result<mpsc::UnboundedReceiver<ControlSignal>> {
        let (tx, rx) = mpsc::unbounded_channel();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let sources = [
                (SignalKind::interrupt(), ControlSignal::Interrupt),
                (SignalKind::terminate(), ControlSignal::Interrupt),
                (SignalKind::from_raw(libc::SIGTSTP), ControlSignal::Suspend),
            ];
            for (kind, control) in sources {
                let mut stream = signal(kind)?;
                let tx = tx.clone();
                tokio::spawn(async move {
                    while stream.recv().await.is_some() {
                        if tx.send(control).is_err() {
                            break;
                        }
                    }
                });
            }
        }

        #[cfg(not(unix))]
        {
            tokio::spawn(async move {
                while tokio::signal::ctrl_c().await.is_ok() {
                    if tx.send(ControlSignal::Interrupt).is_err() {
                        break;
                    }
                }
            });
        }

        Ok(rx)
    }
}
