//! Graceful shutdown coordination.
//!
//! On SIGINT or SIGTERM the coordinator cancels its token, which makes the
//! HTTP server stop accepting connections. In-flight requests get
//! `in_flight_timeout` to finish, then registered handlers flush durable
//! state (the document store) within `flush_timeout`.
//!
//! # Phases
//!
//! 1. **Draining** - listener closed, in-flight requests finishing
//! 2. **Flushing** - shutdown handlers run
//! 3. **Complete** or **Forced** when a handler failed or timed out
//!
//! ```rust,no_run
//! use farm_ops::shutdown::{ShutdownConfig, ShutdownCoordinator};
//!
//! # async fn example() {
//! let coordinator = std::sync::Arc::new(ShutdownCoordinator::new(ShutdownConfig::default()));
//! let token = coordinator.token();
//! coordinator.listen_for_signals();
//! token.cancelled().await;
//! # }
//! ```

use crate::store::DocumentStore;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct ShutdownConfig {
    /// Time allowed for in-flight requests after the listener closes
    pub in_flight_timeout: Duration,
    /// Time allowed for shutdown handlers
    pub flush_timeout: Duration,
    /// Upper bound for the whole sequence
    pub total_timeout: Duration,
    /// Report a timed-out shutdown as forced instead of failing
    pub force_shutdown_on_timeout: bool,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            in_flight_timeout: Duration::from_secs(20),
            flush_timeout: Duration::from_secs(10),
            total_timeout: Duration::from_secs(30),
            force_shutdown_on_timeout: true,
        }
    }
}

impl ShutdownConfig {
    /// Splits `total_secs` between draining (two thirds) and flushing.
    pub fn with_total_timeout(mut self, total_secs: u64) -> Self {
        let total = Duration::from_secs(total_secs);
        self.total_timeout = total;
        self.in_flight_timeout = total * 2 / 3;
        self.flush_timeout = total - self.in_flight_timeout;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownPhase {
    Running,
    Draining,
    Flushing,
    Complete,
    Forced,
}

impl std::fmt::Display for ShutdownPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownPhase::Running => write!(f, "running"),
            ShutdownPhase::Draining => write!(f, "draining"),
            ShutdownPhase::Flushing => write!(f, "flushing"),
            ShutdownPhase::Complete => write!(f, "complete"),
            ShutdownPhase::Forced => write!(f, "forced"),
        }
    }
}

pub struct ShutdownCoordinator {
    config: ShutdownConfig,
    phase: Arc<RwLock<ShutdownPhase>>,
    shutdown_token: CancellationToken,
}

impl ShutdownCoordinator {
    pub fn new(config: ShutdownConfig) -> Self {
        Self {
            config,
            phase: Arc::new(RwLock::new(ShutdownPhase::Running)),
            shutdown_token: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &ShutdownConfig {
        &self.config
    }

    /// Token cancelled once shutdown starts.
    pub fn token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    pub async fn phase(&self) -> ShutdownPhase {
        *self.phase.read().await
    }

    pub fn is_shutdown_initiated(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }

    /// Starts draining. Idempotent.
    pub async fn trigger(&self) {
        let mut phase = self.phase.write().await;
        if *phase == ShutdownPhase::Running {
            *phase = ShutdownPhase::Draining;
            info!("shutdown phase 1: draining in-flight requests");
        }
        self.shutdown_token.cancel();
    }

    /// Spawns a task that triggers shutdown on SIGINT or SIGTERM.
    pub fn listen_for_signals(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                _ = wait_for_signal() => coordinator.trigger().await,
                _ = coordinator.shutdown_token.cancelled() => {}
            }
        })
    }

    /// Runs `handler` within the flush timeout and records the outcome.
    pub async fn shutdown(&self, handler: &dyn ShutdownHandler) -> Result<()> {
        self.trigger().await;
        *self.phase.write().await = ShutdownPhase::Flushing;
        info!("shutdown phase 2: flushing durable state");

        let outcome = match timeout(self.config.flush_timeout, handler.shutdown()).await {
            Ok(result) => result,
            Err(_) => Err(anyhow::anyhow!(
                "shutdown handlers exceeded {}s",
                self.config.flush_timeout.as_secs()
            )),
        };

        match outcome {
            Ok(()) => {
                *self.phase.write().await = ShutdownPhase::Complete;
                info!("graceful shutdown completed successfully");
                Ok(())
            }
            Err(e) if self.config.force_shutdown_on_timeout => {
                warn!("graceful shutdown failed, forcing shutdown: {e:#}");
                *self.phase.write().await = ShutdownPhase::Forced;
                Ok(())
            }
            Err(e) => {
                error!("graceful shutdown failed: {e:#}");
                Err(e)
            }
        }
    }
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT (Ctrl+C), initiating graceful shutdown"),
        _ = terminate => info!("received SIGTERM, initiating graceful shutdown"),
    }
}

/// A component with state to release on shutdown.
#[async_trait::async_trait]
pub trait ShutdownHandler: Send + Sync {
    async fn shutdown(&self) -> Result<()>;

    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Flushes the document store so every acknowledged write is on disk.
pub struct StoreShutdownHandler {
    store: Arc<dyn DocumentStore>,
}

impl StoreShutdownHandler {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl ShutdownHandler for StoreShutdownHandler {
    async fn shutdown(&self) -> Result<()> {
        self.flush().await?;
        let stats = self.store.stats();
        info!(
            backend = %stats.backend,
            collections = stats.collections,
            documents = stats.documents,
            "document store closed"
        );
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        debug!(backend = self.store.backend_name(), "flushing document store");
        self.store
            .flush()
            .await
            .context("failed to flush document store")
    }
}

/// Runs handlers in registration order; one failing does not stop the rest.
#[derive(Default)]
pub struct CompositeShutdownHandler {
    handlers: Vec<Box<dyn ShutdownHandler>>,
}

impl CompositeShutdownHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_handler(&mut self, handler: Box<dyn ShutdownHandler>) {
        self.handlers.push(handler);
    }
}

#[async_trait::async_trait]
impl ShutdownHandler for CompositeShutdownHandler {
    async fn shutdown(&self) -> Result<()> {
        let mut failures = 0;
        for (idx, handler) in self.handlers.iter().enumerate() {
            if let Err(e) = handler.shutdown().await {
                error!(handler_index = idx, "shutdown handler error: {e:#}");
                failures += 1;
            }
        }
        anyhow::ensure!(failures == 0, "{failures} shutdown handler(s) failed");
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        for (idx, handler) in self.handlers.iter().enumerate() {
            if let Err(e) = handler.flush().await {
                error!(handler_index = idx, "flush handler error: {e:#}");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl ShutdownHandler for CountingHandler {
        async fn shutdown(&self) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            anyhow::ensure!(!self.fail, "boom");
            Ok(())
        }
    }

    struct SlowHandler;

    #[async_trait::async_trait]
    impl ShutdownHandler for SlowHandler {
        async fn shutdown(&self) -> Result<()> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }
    }

    #[test]
    fn total_timeout_is_split_between_phases() {
        let config = ShutdownConfig::default().with_total_timeout(30);
        assert_eq!(config.total_timeout, Duration::from_secs(30));
        assert_eq!(config.in_flight_timeout, Duration::from_secs(20));
        assert_eq!(config.flush_timeout, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn trigger_cancels_token_once() {
        let coordinator = ShutdownCoordinator::new(ShutdownConfig::default());
        assert_eq!(coordinator.phase().await, ShutdownPhase::Running);
        let token = coordinator.token();

        coordinator.trigger().await;
        coordinator.trigger().await;
        assert!(token.is_cancelled());
        assert!(coordinator.is_shutdown_initiated());
        assert_eq!(coordinator.phase().await, ShutdownPhase::Draining);
    }

    #[tokio::test]
    async fn composite_runs_every_handler_and_reports_failures() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut composite = CompositeShutdownHandler::new();
        composite.add_handler(Box::new(CountingHandler {
            calls: calls.clone(),
            fail: true,
        }));
        composite.add_handler(Box::new(CountingHandler {
            calls: calls.clone(),
            fail: false,
        }));

        assert!(composite.shutdown().await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn store_handler_completes_shutdown() {
        let coordinator = ShutdownCoordinator::new(ShutdownConfig::default());
        let handler = StoreShutdownHandler::new(Arc::new(MemoryStore::new()));

        coordinator.shutdown(&handler).await.unwrap();
        assert_eq!(coordinator.phase().await, ShutdownPhase::Complete);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_handlers_are_forced() {
        let config = ShutdownConfig {
            flush_timeout: Duration::from_secs(1),
            ..ShutdownConfig::default()
        };
        let coordinator = ShutdownCoordinator::new(config);

        coordinator.shutdown(&SlowHandler).await.unwrap();
        assert_eq!(coordinator.phase().await, ShutdownPhase::Forced);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_handlers_fail_without_force() {
        let config = ShutdownConfig {
            flush_timeout: Duration::from_secs(1),
            force_shutdown_on_timeout: false,
            ..ShutdownConfig::default()
        };
        let coordinator = ShutdownCoordinator::new(config);
        assert!(coordinator.shutdown(&SlowHandler).await.is_err());
    }

    #[test]
    fn phase_display() {
        assert_eq!(ShutdownPhase::Draining.to_string(), "draining");
        assert_eq!(ShutdownPhase::Forced.to_string(), "forced");
    }
}
