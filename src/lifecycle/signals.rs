//! OS signal handling.
//!
//! # Responsibilities
//! - Wait for SIGINT (Ctrl-C) and, on Unix, SIGTERM
//! - Translate either into a shutdown trigger
//!
//! # Design Decisions
//! - Uses Tokio's signal handling on a private current-thread runtime, so the
//!   supervisor itself stays synchronous
//! - A handler that cannot be installed never fires rather than firing early

use super::shutdown::{ShutdownTrigger, TriggerReason};

/// Fires on Ctrl-C or SIGTERM.
#[derive(Debug, Default, Clone, Copy)]
pub struct SignalTrigger;

impl SignalTrigger {
    pub fn new() -> Self {
        Self
    }
}

impl ShutdownTrigger for SignalTrigger {
    fn wait(self) -> TriggerReason {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => {
                tracing::error!(error = %e, "Failed to build signal runtime; signals disabled");
                return park_forever();
            }
        };

        runtime.block_on(shutdown_signal())
    }
}

async fn shutdown_signal() -> TriggerReason {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Ctrl-C received"),
            Err(e) => {
                tracing::error!(error = %e, "Failed to install Ctrl-C handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                tracing::info!("SIGTERM received");
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    TriggerReason::Signal
}

fn park_forever() -> TriggerReason {
    loop {
        std::thread::park();
    }
}
