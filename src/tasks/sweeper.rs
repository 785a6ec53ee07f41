use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{timeout, MissedTickBehavior};

use crate::config::RelayConfig;
use crate::connection_manager::ConnectionRegistry;
use crate::metrics::SweepMetrics;
use crate::poll::PollBufferStore;
use crate::websocket::OutboundMessage;

/// Maximum concurrent probe sends to avoid overwhelming the system
const MAX_CONCURRENT_PROBES: usize = 1000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProbeReport {
    pub total: usize,
    pub sent: usize,
    pub failed: usize,
    pub timed_out: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub probe: ProbeReport,
    pub evicted: usize,
}

/// Periodic liveness probe of push connections plus eviction of idle poll buffers
pub struct LivenessSweeper {
    config: RelayConfig,
    registry: Arc<ConnectionRegistry>,
    buffers: Arc<PollBufferStore>,
    shutdown: broadcast::Receiver<()>,
}

impl LivenessSweeper {
    pub fn new(
        config: RelayConfig,
        registry: Arc<ConnectionRegistry>,
        buffers: Arc<PollBufferStore>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            config,
            registry,
            buffers,
            shutdown,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Tick until the shutdown signal fires (or its sender is dropped)
    pub async fn run(self) {
        tracing::info!(
            sweep_interval_secs = self.config.sweep_interval_secs,
            buffer_idle_timeout_secs = self.config.buffer_idle_timeout_secs,
            "Liveness sweeper started"
        );

        let Self {
            config,
            registry,
            buffers,
            shutdown,
        } = self;
        let period = config.sweep_interval();

        tick_until_shutdown(period, shutdown, move || {
            let registry = registry.clone();
            let buffers = buffers.clone();
            let config = config.clone();
            async move {
                let start = Instant::now();
                let report = sweep_once(&registry, &buffers, &config).await;
                log_report(&report, start.elapsed().as_millis() as u64);
            }
        })
        .await;

        tracing::info!("Liveness sweeper stopped");
    }
}

/// Drive `tick` every `period`, each run guarded, until shutdown
async fn tick_until_shutdown<F, Fut>(
    period: Duration,
    mut shutdown: broadcast::Receiver<()>,
    mut tick: F,
) where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = ()> + Send + 'static,
{
    let mut timer = tokio::time::interval(period.max(Duration::from_millis(1)));
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // Skip immediate first tick
    timer.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("Liveness sweeper received shutdown signal");
                break;
            }
            _ = timer.tick() => {
                let start = Instant::now();
                run_guarded(tick()).await;
                SweepMetrics::record_duration_ms(start.elapsed().as_millis() as u64);
            }
        }
    }
}

fn log_report(report: &SweepReport, elapsed_ms: u64) {
    if report.evicted > 0 || report.probe.failed > 0 || report.probe.timed_out > 0 {
        tracing::info!(
            connections = report.probe.total,
            probes_failed = report.probe.failed,
            probes_timed_out = report.probe.timed_out,
            buffers_evicted = report.evicted,
            elapsed_ms = elapsed_ms,
            "Sweep completed"
        );
    } else {
        tracing::debug!(
            connections = report.probe.total,
            elapsed_ms = elapsed_ms,
            "Sweep completed"
        );
    }
}

/// Run one tick on its own task so a panic abandons only that tick
pub async fn run_guarded<F, T>(tick: F) -> Option<T>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::spawn(tick).await {
        Ok(value) => Some(value),
        Err(e) => {
            SweepMetrics::record_failure();
            tracing::error!(error = %e, "Sweeper tick failed, waiting for next tick");
            None
        }
    }
}

/// Probe every connection, then evict idle poll buffers
pub async fn sweep_once(
    registry: &ConnectionRegistry,
    buffers: &PollBufferStore,
    config: &RelayConfig,
) -> SweepReport {
    let probe = probe_connections(registry, config.probe_timeout()).await;
    let evicted = buffers.sweep_idle(Utc::now(), config.buffer_idle_timeout());

    SweepReport { probe, evicted }
}

/// Queue a ping to every connection in parallel batches.
///
/// A failed probe is only logged. Dead sockets are unregistered by their
/// own close path once the send task fails to write the ping.
pub async fn probe_connections(registry: &ConnectionRegistry, send_timeout: Duration) -> ProbeReport {
    let connections = registry.get_all_connections();
    let total = connections.len();

    if total == 0 {
        return ProbeReport::default();
    }

    let sent = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let timed_out = Arc::new(AtomicUsize::new(0));

    for batch in connections.chunks(MAX_CONCURRENT_PROBES) {
        let futures: Vec<_> = batch
            .iter()
            .map(|handle| {
                let sent = sent.clone();
                let failed = failed.clone();
                let timed_out = timed_out.clone();
                let handle = handle.clone();

                async move {
                    match timeout(send_timeout, handle.send(OutboundMessage::Ping)).await {
                        Ok(Ok(())) => {
                            sent.fetch_add(1, Ordering::Relaxed);
                        }
                        Ok(Err(_)) => {
                            failed.fetch_add(1, Ordering::Relaxed);
                            tracing::debug!(
                                connection_id = %handle.id,
                                "Failed to send probe, connection may be dead"
                            );
                        }
                        Err(_) => {
                            timed_out.fetch_add(1, Ordering::Relaxed);
                            tracing::debug!(
                                connection_id = %handle.id,
                                timeout_ms = send_timeout.as_millis() as u64,
                                "Probe send timed out"
                            );
                        }
                    }
                }
            })
            .collect();

        join_all(futures).await;
    }

    let report = ProbeReport {
        total,
        sent: sent.load(Ordering::Relaxed),
        failed: failed.load(Ordering::Relaxed),
        timed_out: timed_out.load(Ordering::Relaxed),
    };
    SweepMetrics::record_probes(report.sent as u64, (report.failed + report.timed_out) as u64);

    report
}
