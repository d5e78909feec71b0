//! SRV indirection for Java endpoints.
//!
//! A Java server address may be an SRV alias: `_minecraft._tcp.<host>` can
//! point the tracker at a different physical host/port. Lookups share the
//! cycle's connect-timeout budget; whatever the lookup consumes is deducted
//! from the time handed to the pinger. Resolution never fails a poll: every
//! miss, timeout or resolver error degrades to the literal configured
//! address, and a miss arms a cooldown so dead lookups are not repaid every
//! cycle.

use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, Instant};

use hickory_resolver::TokioAsyncResolver;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use tracing::{debug, warn};

use crate::time::epoch_millis;

/// Outcome of address resolution. `port` is `None` when no SRV record
/// redirected the endpoint, leaving the configured port in effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub host: String,
    pub port: Option<u16>,

    /// Connect-timeout budget left after resolution. Zero means the lookup
    /// consumed the whole budget and the poll must fail as a timeout
    /// without touching the network.
    pub remaining: Duration,
}

/// Build the resolver shared by all endpoints. Prefers the system DNS
/// configuration, falling back to the library defaults.
pub fn shared_resolver() -> TokioAsyncResolver {
    match TokioAsyncResolver::tokio_from_system_conf() {
        Ok(resolver) => resolver,
        Err(e) => {
            warn!("system DNS configuration unavailable ({e}), using defaults");
            TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default())
        }
    }
}

pub struct SrvResolver {
    host: String,
    resolver: Arc<TokioAsyncResolver>,

    /// Epoch millis until which SRV lookups are skipped; 0 = not armed
    skip_srv_until: AtomicI64,

    /// Cooldown after a miss; 0 disables skipping entirely
    cooldown_millis: u64,
}

impl SrvResolver {
    pub fn new(host: String, resolver: Arc<TokioAsyncResolver>, cooldown_millis: u64) -> Self {
        Self {
            host,
            resolver,
            skip_srv_until: AtomicI64::new(0),
            cooldown_millis,
        }
    }

    fn is_skipping(&self) -> bool {
        let until = self.skip_srv_until.load(Ordering::Relaxed);
        until != 0 && epoch_millis() <= until
    }

    fn arm_skip(&self) {
        self.skip_srv_until
            .store(epoch_millis() + self.cooldown_millis as i64, Ordering::Relaxed);
    }

    fn literal(&self, remaining: Duration) -> Resolved {
        Resolved {
            host: self.host.clone(),
            port: None,
            remaining,
        }
    }

    /// Resolve the endpoint within `connect_timeout`.
    pub async fn resolve(&self, connect_timeout: Duration) -> Resolved {
        // An SRV record can only exist for a name; IP literals and hosts in
        // cooldown keep the whole budget.
        if self.is_skipping() || self.host.parse::<IpAddr>().is_ok() {
            return self.literal(connect_timeout);
        }

        let started = Instant::now();
        let query = format!("_minecraft._tcp.{}", self.host);

        let lookup = tokio::time::timeout(connect_timeout, self.resolver.srv_lookup(query)).await;

        let remaining = connect_timeout.saturating_sub(started.elapsed());

        if let Ok(Ok(srv)) = &lookup
            && let Some(record) = srv.iter().next()
        {
            let target = record.target().to_utf8();
            let target = target.trim_end_matches('.').to_string();
            debug!(
                "SRV record for {} points at {}:{}",
                self.host,
                target,
                record.port()
            );
            return Resolved {
                host: target,
                port: Some(record.port()),
                remaining,
            };
        }

        // Miss, timeout or resolver error: fall back to the literal address
        // and arm the cooldown unless it is disabled.
        if self.cooldown_millis != 0 && !self.is_skipping() {
            self.arm_skip();
            warn!(
                "no SRV records resolved for {}, skipping SRV lookups for {} minutes",
                self.host,
                self.cooldown_millis / 60_000
            );
        }

        self.literal(remaining)
    }
}
