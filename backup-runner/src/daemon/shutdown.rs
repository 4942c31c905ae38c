//! Cancellable power-off countdown run after all instructions are done.
//!
//! The countdown can be interrupted with SIGINT (Ctrl+C), SIGTERM, or by
//! cancelling its token. Interrupting it never touches snapshots that were
//! already written.

use std::time::Duration;
use tokio::process::Command;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// How a countdown ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountdownOutcome {
    /// Countdown expired and the power-off command was started
    PoweredOff,
    /// Countdown was interrupted
    Cancelled,
    /// Countdown expired but the power-off command could not run
    CommandFailed(String),
}

/// Power-off countdown
pub struct ShutdownCountdown {
    seconds: u64,
    command: Vec<String>,
    tick: Duration,
    cancel: CancellationToken,
}

impl ShutdownCountdown {
    /// Create a countdown of `seconds` that runs `command` on expiry
    pub fn new(seconds: u64, command: Vec<String>) -> Self {
        Self {
            seconds,
            command,
            tick: Duration::from_secs(1),
            cancel: CancellationToken::new(),
        }
    }

    /// Override the tick length (one tick per counted second)
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Token that aborts the countdown when cancelled
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Count down, then power off unless interrupted
    pub async fn run(&self) -> CountdownOutcome {
        if !is_root() {
            warn!("Not running as root, the power-off command may be refused");
        }

        let interrupted = async {
            tokio::select! {
                _ = wait_for_signal() => {}
                _ = self.cancel.cancelled() => {
                    info!("Countdown cancelled");
                }
            }
        };
        tokio::pin!(interrupted);

        let mut remaining = self.seconds;
        let mut interval = tokio::time::interval(self.tick);
        // the first tick completes immediately
        interval.tick().await;

        while remaining > 0 {
            info!("Powering off in {}s (Ctrl+C to abort)", remaining);
            tokio::select! {
                _ = interval.tick() => remaining -= 1,
                _ = &mut interrupted => {
                    info!("Power-off aborted, snapshots are kept");
                    return CountdownOutcome::Cancelled;
                }
            }
        }

        self.power_off().await
    }

    async fn power_off(&self) -> CountdownOutcome {
        let Some((program, args)) = self.command.split_first() else {
            return CountdownOutcome::CommandFailed("empty power-off command".to_string());
        };

        info!("Running power-off command: {}", self.command.join(" "));
        match Command::new(program).args(args).status().await {
            Ok(status) if status.success() => CountdownOutcome::PoweredOff,
            Ok(status) => {
                warn!("Power-off command exited with {}", status);
                CountdownOutcome::CommandFailed(format!("exit status {}", status))
            }
            Err(e) => {
                warn!("Power-off command could not be started: {}", e);
                CountdownOutcome::CommandFailed(e.to_string())
            }
        }
    }
}

/// Wait for SIGINT or SIGTERM
async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }
}

#[cfg(unix)]
fn is_root() -> bool {
    nix::unistd::geteuid().is_root()
}

#[cfg(not(unix))]
fn is_root() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cancelled_countdown() {
        let countdown = ShutdownCountdown::new(3600, vec!["false".to_string()])
            .with_tick(Duration::from_millis(10));
        let token = countdown.cancel_token();

        let handle = tokio::spawn(async move { countdown.run().await });
        tokio::time::sleep(Duration::from_millis(30)).await;
        token.cancel();

        assert_eq!(handle.await.unwrap(), CountdownOutcome::Cancelled);
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_expired_countdown_runs_command() {
        let countdown = ShutdownCountdown::new(2, vec!["true".to_string()])
            .with_tick(Duration::from_millis(5));
        assert_eq!(countdown.run().await, CountdownOutcome::PoweredOff);
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_failing_command_is_reported() {
        let countdown = ShutdownCountdown::new(0, vec!["false".to_string()]);
        assert!(matches!(countdown.run().await, CountdownOutcome::CommandFailed(_)));
    }

    #[tokio::test]
    async fn test_missing_program_is_reported() {
        let countdown = ShutdownCountdown::new(0, vec!["/nonexistent/poweroff-binary".to_string()]);
        assert!(matches!(countdown.run().await, CountdownOutcome::CommandFailed(_)));
    }
}
