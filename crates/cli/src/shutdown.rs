use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Listens for SIGINT and SIGTERM and cancels in-flight import work.
#[derive(Clone)]
pub struct ShutdownCoordinator {
    cancel_token: CancellationToken,
    shutdown_requested: Arc<AtomicBool>,
}

impl ShutdownCoordinator {
    pub fn new(cancel_token: CancellationToken) -> Self {
        Self {
            cancel_token,
            shutdown_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn register_handlers(&self) {
        let cancel_token = self.cancel_token.clone();
        let shutdown_flag = self.shutdown_requested.clone();

        tokio::spawn(async move {
            let ctrl_c = async {
                if let Err(e) = signal::ctrl_c().await {
                    error!(error = %e, "Failed to install SIGINT handler");
                    std::future::pending::<()>().await;
                }
            };

            #[cfg(unix)]
            let terminate = async {
                match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(mut stream) => {
                        stream.recv().await;
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to install SIGTERM handler");
                        std::future::pending::<()>().await;
                    }
                }
            };

            #[cfg(not(unix))]
            let terminate = std::future::pending::<()>();

            tokio::select! {
                _ = ctrl_c => {
                    info!("Received SIGINT (Ctrl+C), stopping after the current row");
                }
                _ = terminate => {
                    info!("Received SIGTERM, stopping after the current row");
                }
            }

            shutdown_flag.store(true, Ordering::SeqCst);
            cancel_token.cancel();
        });
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::SeqCst)
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }
}

/// Exit codes for the CLI application.
#[derive(Debug, Clone, Copy)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    ShutdownRequested = 130, // Standard exit code for SIGINT
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}
