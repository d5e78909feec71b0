//! Per-server mutable state: the two bounded histories and every derived
//! statistic built from them.
//!
//! Each [`ServerRegistration`] owns its own buffers and stats exclusively;
//! nothing here is shared between servers, so a cycle can mutate all
//! registrations sequentially without cross-server locking. All mutation
//! flows through [`ServerRegistration::handle_ping`], which also produces
//! the cycle's diff for this server.

use std::collections::VecDeque;
use std::sync::Arc;

use md5::{Digest, Md5};

use crate::config::{ProtocolFamily, ProtocolVersion, ServerConfig};
use crate::ping::PingResult;
use crate::resolver::SrvResolver;
use crate::time::{self, CycleStamp, GRAPH_UPDATE_TIME_GAP, TimeTracker, every_n, push_and_shift};
use crate::updates::{
    ErrorInfo, GraphPeak, PublicServerData, RecordData, ServerSnapshot, UpdatePayload,
};
use crate::util::{color_for_name, hashed_favicon_url};

/// After this many consecutive failed polls the diff reports a player count
/// of 0 instead of null, so viewers stop displaying the stale last-known
/// count. Raw samples stay null.
pub const FAILURE_RESET_THRESHOLD: u32 = 6;

/// Protocol version probed in one cycle: the wire id plus its index into the
/// probe table. Bedrock always probes the `{0, 0}` sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeVersion {
    pub protocol_id: i32,
    pub protocol_index: usize,
}

impl ProbeVersion {
    pub const SENTINEL: ProbeVersion = ProbeVersion {
        protocol_id: 0,
        protocol_index: 0,
    };
}

/// Capacity of the two history buffers, derived from the configured windows
#[derive(Debug, Clone, Copy)]
pub struct HistoryLimits {
    pub live: usize,
    pub graph: usize,
}

pub struct ServerRegistration {
    pub server_id: usize,
    pub data: ServerConfig,
    pub resolver: Arc<SrvResolver>,
    limits: HistoryLimits,

    /// Live history: one raw (possibly null) count per cycle
    ping_history: VecDeque<Option<u32>>,

    /// Graph history: one count per graph-eligible cycle
    graph_data: VecDeque<Option<u32>>,

    /// Probe-table indices confirmed compatible, sorted ascending
    versions: Vec<usize>,

    record: Option<RecordData>,
    graph_peak_index: Option<usize>,

    last_favicon: Option<String>,
    favicon_hash: Option<String>,

    next_protocol_index: Option<usize>,
    consecutive_failures: u32,
}

impl ServerRegistration {
    pub fn new(
        server_id: usize,
        data: ServerConfig,
        resolver: Arc<SrvResolver>,
        limits: HistoryLimits,
    ) -> Self {
        Self {
            server_id,
            data,
            resolver,
            limits,
            ping_history: VecDeque::new(),
            graph_data: VecDeque::new(),
            versions: Vec::new(),
            record: None,
            graph_peak_index: None,
            last_favicon: None,
            favicon_hash: None,
            next_protocol_index: None,
            consecutive_failures: 0,
        }
    }

    /// Pick the protocol version to probe this cycle. Java cycles through
    /// the table one version per cycle, wrapping at the end; the first cycle
    /// probes index 0. Bedrock has no negotiation.
    pub fn next_probe_version(&mut self, table: &[ProtocolVersion]) -> ProbeVersion {
        if self.data.family == ProtocolFamily::Bedrock || table.is_empty() {
            return ProbeVersion::SENTINEL;
        }

        let next = match self.next_protocol_index {
            Some(i) if i + 1 < table.len() => i + 1,
            Some(_) => 0,
            None => 0,
        };
        self.next_protocol_index = Some(next);

        ProbeVersion {
            protocol_id: table[next].protocol_id,
            protocol_index: next,
        }
    }

    /// Ingest one cycle's poll result: append to the history buffers, update
    /// derived stats, and build the diff describing what changed.
    pub fn handle_ping(
        &mut self,
        stamp: CycleStamp,
        result: &PingResult,
        probe: ProbeVersion,
        tracker: &TimeTracker,
        persistence: bool,
    ) -> UpdatePayload {
        let player_count = result.as_ref().ok().map(|resp| resp.players_online);

        push_and_shift(&mut self.ping_history, player_count, self.limits.live);

        if stamp.update_history_graph {
            push_and_shift(&mut self.graph_data, player_count, self.limits.graph);
        }

        self.build_update(stamp, result, probe, tracker, persistence)
    }

    fn build_update(
        &mut self,
        stamp: CycleStamp,
        result: &PingResult,
        probe: ProbeVersion,
        tracker: &TimeTracker,
        persistence: bool,
    ) -> UpdatePayload {
        let mut update = UpdatePayload {
            player_count: result.as_ref().ok().map(|resp| resp.players_online),
            ..Default::default()
        };

        match result {
            Ok(resp) => {
                self.consecutive_failures = 0;

                if let Some(incoming_id) = resp.protocol_version
                    && self.update_protocol_version_compat(incoming_id, probe)
                {
                    update.versions = Some(self.versions.clone());
                }

                // Records and peaks are meaningless without durable history
                if persistence
                    && self
                        .record
                        .is_none_or(|record| resp.players_online > record.player_count)
                {
                    let record = RecordData {
                        player_count: resp.players_online,
                        timestamp: Some(time::to_seconds(stamp.timestamp)),
                    };
                    self.record = Some(record);
                    update.record = Some(record);
                }

                if self.update_favicon(resp.favicon.as_deref()) {
                    update.favicon = self.favicon_url();
                }

                // Recompute the peak on every successful cycle, not only on
                // graph appends; a stale index after a reload would otherwise
                // survive until the next append.
                if persistence && self.find_new_graph_peak() {
                    update.graph_peak = self.graph_peak(tracker);
                }
            }
            Err(err) => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                if self.consecutive_failures >= FAILURE_RESET_THRESHOLD {
                    update.player_count = Some(0);
                }
                update.error = Some(ErrorInfo::from_ping_error(err));
            }
        }

        update
    }

    /// Track which probe-table indices the server accepts. Returns true when
    /// the compatibility set changed this cycle. A version confirmed earlier
    /// is revoked when the server later rejects it (its supported range can
    /// narrow after an upgrade).
    fn update_protocol_version_compat(&mut self, incoming_id: i32, probe: ProbeVersion) -> bool {
        let is_success = incoming_id == probe.protocol_id;
        let index_of = self
            .versions
            .iter()
            .position(|&i| i == probe.protocol_index);

        match (is_success, index_of) {
            (true, None) => {
                self.versions.push(probe.protocol_index);
                self.versions.sort_unstable();
                true
            }
            (false, Some(position)) => {
                self.versions.remove(position);
                true
            }
            _ => false,
        }
    }

    /// Rescan the graph history for the earliest maximum non-null value.
    /// Returns true when the peak index moved. Deliberately a full O(window)
    /// rescan: an incremental tracker would change tie-breaking on eviction.
    pub fn find_new_graph_peak(&mut self) -> bool {
        let mut best: Option<(usize, u32)> = None;

        for (i, point) in self.graph_data.iter().enumerate() {
            if let Some(value) = *point
                && best.is_none_or(|(_, best_value)| value > best_value)
            {
                best = Some((i, value));
            }
        }

        match best {
            Some((index, _)) => {
                let changed = self.graph_peak_index != Some(index);
                self.graph_peak_index = Some(index);
                changed
            }
            None => {
                self.graph_peak_index = None;
                false
            }
        }
    }

    /// Current peak value with the graph-axis timestamp it occurred at
    pub fn graph_peak(&self, tracker: &TimeTracker) -> Option<GraphPeak> {
        let index = self.graph_peak_index?;
        let player_count = self.graph_data.get(index).copied().flatten()?;
        let timestamp = tracker.graph_point_at(index)?;
        Some(GraphPeak {
            player_count,
            timestamp,
        })
    }

    /// Apply an incoming favicon, honoring the configured override. Returns
    /// true when the content actually changed (identity by md5 hash).
    fn update_favicon(&mut self, favicon: Option<&str>) -> bool {
        if self.data.favicon.is_some() {
            return false;
        }

        match favicon {
            Some(favicon) if self.last_favicon.as_deref() != Some(favicon) => {
                self.favicon_hash = Some(format!("{:x}", Md5::digest(favicon.as_bytes())));
                self.last_favicon = Some(favicon.to_string());
                true
            }
            _ => false,
        }
    }

    pub fn favicon_url(&self) -> Option<String> {
        if let Some(hash) = &self.favicon_hash {
            Some(hashed_favicon_url(hash))
        } else {
            self.data.favicon.clone()
        }
    }

    /// Seed the record from durable storage (timestamp already in seconds,
    /// possibly absent for freestanding records)
    pub fn set_record(&mut self, player_count: u32, timestamp: Option<i64>) {
        self.record = Some(RecordData {
            player_count,
            timestamp,
        });
    }

    pub fn record(&self) -> Option<RecordData> {
        self.record
    }

    pub fn versions(&self) -> &[usize] {
        &self.versions
    }

    pub fn live_history_len(&self) -> usize {
        self.ping_history.len()
    }

    pub fn graph_data(&self) -> Vec<Option<u32>> {
        self.graph_data.iter().copied().collect()
    }

    /// Rebuild the graph buffer from stored samples, applying the same gap
    /// selection used during live operation so a restart is seamless.
    pub fn load_graph_points(&mut self, start: i64, timestamps: &[i64], points: &[Option<u32>]) {
        self.graph_data = every_n(timestamps, start, GRAPH_UPDATE_TIME_GAP)
            .into_iter()
            .filter_map(|i| points.get(i).copied())
            .collect();
        while self.graph_data.len() > self.limits.graph {
            self.graph_data.pop_front();
        }
    }

    /// Full latest-known state for a newly connected viewer. Before the
    /// first cycle completes this is a placeholder carrying whatever was
    /// loaded from storage.
    pub fn snapshot(&self, tracker: &TimeTracker) -> ServerSnapshot {
        if self.ping_history.is_empty() {
            return ServerSnapshot {
                player_count: None,
                player_count_history: None,
                versions: self.versions.clone(),
                record: self.record,
                graph_peak: self.graph_peak(tracker),
                favicon: self.favicon_url(),
                error: Some(ErrorInfo::pinging()),
            };
        }

        ServerSnapshot {
            player_count: self.ping_history.back().copied().flatten(),
            player_count_history: Some(self.ping_history.iter().copied().collect()),
            versions: self.versions.clone(),
            record: self.record,
            graph_peak: self.graph_peak(tracker),
            favicon: self.favicon_url(),
            error: None,
        }
    }

    /// Viewer-facing metadata; a dedicated value so internals never leak
    pub fn public_data(&self) -> PublicServerData {
        PublicServerData {
            name: self.data.name.clone(),
            host: self.data.host.clone(),
            family: self.data.family,
            color: self
                .data
                .color
                .clone()
                .unwrap_or_else(|| color_for_name(&self.data.name)),
        }
    }
}
