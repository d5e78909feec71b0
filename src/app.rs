//! Application root: owns every registration, the shared time tracker, the
//! optional storage backend and the broadcast channel cycles feed.
//!
//! One [`App`] lives for the whole process. Ping cycles mutate state behind
//! two `RwLock`s (registrations and the tracker); viewer connections only
//! ever take read locks, so a slow subscriber cannot stall a cycle.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Context;
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, error, instrument, warn};

use crate::config::{Config, ProtocolFamily};
use crate::ping::{self, PingError, PingResult};
use crate::registry::{HistoryLimits, ProbeVersion, ServerRegistration};
use crate::resolver::{SrvResolver, shared_resolver};
use crate::storage::PingStore;
use crate::time::{self, CycleStamp, TimeTracker, epoch_millis};
use crate::updates::{ClientConfig, OutboundMessage};

/// Capacity of the subscriber broadcast channel. Subscribers that fall more
/// than this many cycle batches behind start losing messages; they can
/// always re-request a snapshot.
const BROADCAST_CAPACITY: usize = 64;

pub struct App {
    pub config: Config,
    registrations: RwLock<Vec<ServerRegistration>>,
    time_tracker: RwLock<TimeTracker>,
    store: Option<Arc<dyn PingStore>>,
    broadcast_tx: broadcast::Sender<String>,

    /// Re-entrancy guard: true while a cycle is in flight
    cycle_running: AtomicBool,
}

impl App {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store = crate::storage::connect(&config.storage).await?;
        let persistence = config.persistence_enabled();

        let limits = HistoryLimits {
            live: config.max_live_history_len(),
            graph: config.max_graph_history_len(),
        };

        let dns = Arc::new(shared_resolver());
        let registrations = config
            .servers
            .iter()
            .enumerate()
            .map(|(server_id, server)| {
                let resolver = Arc::new(SrvResolver::new(
                    server.host.clone(),
                    dns.clone(),
                    config.skip_srv_cooldown_millis,
                ));
                ServerRegistration::new(server_id, server.clone(), resolver, limits)
            })
            .collect();

        let time_tracker = TimeTracker::new(
            config.max_live_history_len(),
            config.max_graph_history_len(),
            persistence,
        );

        let (broadcast_tx, _) = broadcast::channel(BROADCAST_CAPACITY);

        Ok(Self {
            config,
            registrations: RwLock::new(registrations),
            time_tracker: RwLock::new(time_tracker),
            store,
            broadcast_tx,
            cycle_running: AtomicBool::new(false),
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.broadcast_tx.subscribe()
    }

    /// Replay stored samples into the graph buffers and seed per-server
    /// records, so a restarted process picks up where it left off.
    #[instrument(skip_all)]
    pub async fn load_history(&self) -> anyhow::Result<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };

        let now = epoch_millis();
        let start = now - self.config.graph_duration_millis as i64;
        let rows = store
            .load_samples(start, now)
            .await
            .context("failed to load stored ping samples")?;

        // The graph axis is shared: rebuild it from every distinct sample
        // timestamp across all servers, in order.
        let mut axis: Vec<i64> = rows.iter().map(|row| row.timestamp).collect();
        axis.sort_unstable();
        axis.dedup();
        self.time_tracker.write().await.load_graph_points(start, &axis);

        let mut registrations = self.registrations.write().await;
        for reg in registrations.iter_mut() {
            let (timestamps, points): (Vec<i64>, Vec<Option<u32>>) = rows
                .iter()
                .filter(|row| row.server_key == reg.data.host)
                .map(|row| (row.timestamp, row.player_count))
                .unzip();

            reg.load_graph_points(start, &timestamps, &points);
            reg.find_new_graph_peak();

            if let Some((player_count, timestamp)) = store
                .load_record(&reg.data.host)
                .await
                .context("failed to load stored record")?
            {
                reg.set_record(player_count, timestamp.map(time::to_seconds));
            }

            debug!(
                "restored {} graph points for {}",
                reg.graph_data().len(),
                reg.data.host
            );
        }

        Ok(())
    }

    /// Run one ping cycle. Returns `Ok(false)` when a previous cycle was
    /// still in flight and this one was dropped; state and subscribers see
    /// nothing from a dropped cycle.
    pub async fn run_cycle(&self) -> anyhow::Result<bool> {
        if self
            .cycle_running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("previous ping cycle still in flight, dropping this one");
            return Ok(false);
        }

        let result = self.cycle_inner().await;
        self.cycle_running.store(false, Ordering::SeqCst);
        result.map(|_| true)
    }

    async fn cycle_inner(&self) -> anyhow::Result<()> {
        let stamp = self.time_tracker.write().await.next_cycle();
        let connect_timeout = self.config.connect_timeout();

        // Probe selection mutates per-server state, so collect the jobs
        // under the write lock but run them after releasing it.
        let jobs: Vec<(String, u16, ProtocolFamily, Arc<SrvResolver>, ProbeVersion)> = {
            let mut registrations = self.registrations.write().await;
            registrations
                .iter_mut()
                .map(|reg| {
                    (
                        reg.data.host.clone(),
                        reg.data.port(),
                        reg.data.family,
                        reg.resolver.clone(),
                        reg.next_probe_version(&self.config.java_versions),
                    )
                })
                .collect()
        };

        let tasks = jobs.iter().map(|(host, port, family, resolver, probe)| {
            let host = host.clone();
            let port = *port;
            let family = *family;
            let resolver = resolver.clone();
            let protocol_id = probe.protocol_id;

            tokio::spawn(async move {
                match family {
                    ProtocolFamily::Java => {
                        let resolved = resolver.resolve(connect_timeout).await;
                        let port = resolved.port.unwrap_or(port);
                        ping::java::ping(&resolved.host, port, resolved.remaining, protocol_id)
                            .await
                    }
                    ProtocolFamily::Bedrock => {
                        ping::bedrock::ping(&host, port, connect_timeout).await
                    }
                }
            })
        });

        let results: Vec<PingResult> = futures::future::join_all(tasks)
            .await
            .into_iter()
            .map(|joined| {
                joined.unwrap_or_else(|e| {
                    error!("ping task failed: {e}");
                    Err(PingError::Protocol("ping task failed".to_string()))
                })
            })
            .collect();

        self.persist_samples(stamp, &jobs, &results).await?;

        let updates = {
            let tracker = self.time_tracker.read().await;
            let mut registrations = self.registrations.write().await;
            let persistence = self.config.persistence_enabled();

            registrations
                .iter_mut()
                .zip(jobs.iter().zip(results.iter()))
                .map(|(reg, ((host, port, _, _, probe), result))| {
                    if self.config.log_failed_pings
                        && let Err(err) = result
                    {
                        error!("failed to ping {host}:{port}: {err}");
                    }
                    reg.handle_ping(stamp, result, *probe, &tracker, persistence)
                })
                .collect()
        };

        let message = serde_json::to_string(&OutboundMessage::UpdateServers {
            timestamp: time::to_seconds(stamp.timestamp),
            update_history_graph: stamp.update_history_graph,
            updates,
        })?;

        // Fire and forget: an error only means nobody is subscribed
        let _ = self.broadcast_tx.send(message);

        Ok(())
    }

    async fn persist_samples(
        &self,
        stamp: CycleStamp,
        jobs: &[(String, u16, ProtocolFamily, Arc<SrvResolver>, ProbeVersion)],
        results: &[PingResult],
    ) -> anyhow::Result<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };

        for ((host, ..), result) in jobs.iter().zip(results.iter()) {
            let player_count = result.as_ref().ok().map(|resp| resp.players_online);
            store
                .record_sample(host, stamp.timestamp, player_count)
                .await
                .with_context(|| format!("failed to persist ping sample for {host}"))?;
        }

        Ok(())
    }

    /// Full snapshot for a newly connected subscriber, serialized.
    pub async fn init_message(&self) -> anyhow::Result<String> {
        let tracker = self.time_tracker.read().await;
        let registrations = self.registrations.read().await;

        let config = ClientConfig {
            graph_duration_label: self.config.graph_duration_label(),
            graph_max_length: self.config.max_graph_history_len(),
            server_graph_max_length: self.config.max_live_history_len(),
            servers: registrations.iter().map(|reg| reg.public_data()).collect(),
            java_versions: self
                .config
                .java_versions
                .iter()
                .map(|version| version.name.clone())
                .collect(),
            is_graph_visible: self.config.persistence_enabled(),
        };

        let message = OutboundMessage::Init {
            config,
            timestamp_points: tracker.server_graph_points(),
            servers: registrations
                .iter()
                .map(|reg| reg.snapshot(&tracker))
                .collect(),
        };

        Ok(serde_json::to_string(&message)?)
    }

    /// Full graph history for a subscriber that asked for it, serialized.
    pub async fn history_graph_message(&self) -> anyhow::Result<String> {
        let tracker = self.time_tracker.read().await;
        let registrations = self.registrations.read().await;

        let message = OutboundMessage::HistoryGraph {
            timestamps: tracker.graph_points(),
            graph_data: registrations.iter().map(|reg| reg.graph_data()).collect(),
        };

        Ok(serde_json::to_string(&message)?)
    }
}
