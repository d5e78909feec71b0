//! Cycle timestamp tracking and the two sampling cadences.
//!
//! Every ping cycle shares one wall-clock timestamp. The tracker keeps two
//! bounded timestamp axes: a per-cycle live axis and a minute-gap graph axis.
//! Whether a cycle also lands on the graph axis is decided here, exactly once
//! per cycle, and carried alongside each server's sample rather than inferred
//! from array positions later.

use std::collections::VecDeque;

use chrono::Utc;

/// Minimum wall-clock gap between two graph history points, in milliseconds.
pub const GRAPH_UPDATE_TIME_GAP: i64 = 60 * 1_000;

/// Timestamp and graph-eligibility flag shared by every sample of one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleStamp {
    /// Epoch millis taken once at cycle start
    pub timestamp: i64,

    /// True when this cycle's samples also extend the graph history.
    /// At most once per [`GRAPH_UPDATE_TIME_GAP`], and never while
    /// persistence is disabled.
    pub update_history_graph: bool,
}

pub fn epoch_millis() -> i64 {
    Utc::now().timestamp_millis()
}

pub fn to_seconds(timestamp: i64) -> i64 {
    timestamp.div_euclid(1_000)
}

/// Bounded FIFO append: push to the back, evict from the front.
pub fn push_and_shift<T>(buffer: &mut VecDeque<T>, value: T, max_len: usize) {
    buffer.push_back(value);
    while buffer.len() > max_len {
        buffer.pop_front();
    }
}

/// Select indices of `points` spaced at least `gap` apart, walking forward
/// from `start`. Used identically for live gating and for replaying stored
/// samples into the graph cadence, so a restart produces the same timeline
/// an uninterrupted process would have.
pub fn every_n(points: &[i64], start: i64, gap: i64) -> Vec<usize> {
    let mut selected = Vec::new();
    let mut last_point = start;

    for (i, &point) in points.iter().enumerate() {
        if point - last_point >= gap {
            last_point = point;
            selected.push(i);
        }
    }

    selected
}

pub struct TimeTracker {
    server_graph_points: VecDeque<i64>,
    graph_points: VecDeque<i64>,
    last_history_graph_update: Option<i64>,
    max_server_graph_len: usize,
    max_graph_len: usize,
    persistence: bool,
}

impl TimeTracker {
    pub fn new(max_server_graph_len: usize, max_graph_len: usize, persistence: bool) -> Self {
        Self {
            server_graph_points: VecDeque::new(),
            graph_points: VecDeque::new(),
            last_history_graph_update: None,
            max_server_graph_len,
            max_graph_len,
            persistence,
        }
    }

    /// Start a new cycle at the current wall clock.
    pub fn next_cycle(&mut self) -> CycleStamp {
        self.next_cycle_at(epoch_millis())
    }

    /// Start a new cycle at an explicit timestamp. Split out so the gap
    /// gating is testable without sleeping.
    pub fn next_cycle_at(&mut self, timestamp: i64) -> CycleStamp {
        push_and_shift(
            &mut self.server_graph_points,
            timestamp,
            self.max_server_graph_len,
        );

        let update_history_graph = self.persistence
            && self
                .last_history_graph_update
                .is_none_or(|last| timestamp - last >= GRAPH_UPDATE_TIME_GAP);

        if update_history_graph {
            self.last_history_graph_update = Some(timestamp);
            push_and_shift(&mut self.graph_points, timestamp, self.max_graph_len);
        }

        CycleStamp {
            timestamp,
            update_history_graph,
        }
    }

    /// Rebuild the graph axis from stored sample timestamps, applying the
    /// same gap selection used during live operation.
    pub fn load_graph_points(&mut self, start: i64, timestamps: &[i64]) {
        self.graph_points = every_n(timestamps, start, GRAPH_UPDATE_TIME_GAP)
            .into_iter()
            .map(|i| timestamps[i])
            .collect();
        while self.graph_points.len() > self.max_graph_len {
            self.graph_points.pop_front();
        }
        self.last_history_graph_update = self.graph_points.back().copied();
    }

    /// Graph axis timestamp at `index`, in seconds
    pub fn graph_point_at(&self, index: usize) -> Option<i64> {
        self.graph_points.get(index).copied().map(to_seconds)
    }

    pub fn server_graph_points(&self) -> Vec<i64> {
        self.server_graph_points.iter().copied().map(to_seconds).collect()
    }

    pub fn graph_points(&self) -> Vec<i64> {
        self.graph_points.iter().copied().map(to_seconds).collect()
    }

    pub fn graph_points_len(&self) -> usize {
        self.graph_points.len()
    }
}
