use std::collections::HashSet;
use std::sync::Arc;

use ::time::{format_description::well_known, OffsetDateTime};
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::catalog::CatalogEntry;
use crate::error::ValidationError;
use crate::probe;
use crate::types::{ProbeResult, ProbeStatus};

/// Upper bound on simultaneous probes a sweep will run.
pub const MAX_CONCURRENCY: usize = 512;

/// Outcome for one catalog entry.
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SweepEntry {
    pub id: String,
    pub name: String,
    pub checked_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ProbeResult>,
    /// Validation text when the entry could not be probed at all.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected: Option<String>,
}

/// Aggregate counters plus per-entry outcomes, in catalog order.
#[derive(Serialize, Debug, Clone, Default)]
pub struct SweepReport {
    pub total: u64,
    pub done: u64,
    pub healthy: u64,
    pub warning: u64,
    pub unhealthy: u64,
    pub error: u64,
    pub rejected: u64,
    pub entries: Vec<SweepEntry>,
}

impl SweepReport {
    fn record(&mut self, entry: SweepEntry) {
        self.done += 1;
        match entry.result.as_ref().map(|r| r.status) {
            Some(ProbeStatus::Healthy) => self.healthy += 1,
            Some(ProbeStatus::Warning) => self.warning += 1,
            Some(ProbeStatus::Unhealthy) => self.unhealthy += 1,
            Some(ProbeStatus::Error) => self.error += 1,
            None => self.rejected += 1,
        }
        self.entries.push(entry);
    }
}

/// Probe every entry once, running at most `concurrency` probes at a time.
///
/// - Entries sharing an `id` are probed once; the first occurrence wins.
/// - Entries that fail validation are reported as rejected without network I/O.
/// - Each probe carries its own deadline, so the sweep finishes in roughly
///   `ceil(entries / concurrency)` probe timeouts at worst.
pub async fn sweep(entries: &[CatalogEntry], concurrency: usize) -> SweepReport {
    sweep_with_cancel(entries, concurrency, CancellationToken::new()).await
}

/// Variant that accepts a `CancellationToken`. Cancelling stops new probes
/// from starting; probes already in flight finish within their own bound.
pub async fn sweep_with_cancel(
    entries: &[CatalogEntry],
    concurrency: usize,
    cancel: CancellationToken,
) -> SweepReport {
    let unique = dedup_by_id(entries);
    let mut report = SweepReport {
        total: unique.len() as u64,
        ..SweepReport::default()
    };

    let sem = Arc::new(Semaphore::new(concurrency.clamp(1, MAX_CONCURRENCY)));
    let mut set = JoinSet::new();

    for (idx, entry) in unique.into_iter().enumerate() {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            permit = sem.clone().acquire_owned() => match permit {
                Ok(p) => p,
                Err(_) => break,
            },
        };

        set.spawn(async move {
            let _permit = permit; // keep permit until the probe resolves
            let outcome = probe::probe(&entry.probe_request()).await;
            (idx, SweepEntry::from_outcome(entry, outcome))
        });
    }

    let mut finished = Vec::with_capacity(set.len());
    while let Some(res) = set.join_next().await {
        match res {
            Ok(pair) => finished.push(pair),
            Err(e) => warn!(error = %e, "sweep task failed"),
        }
    }
    finished.sort_by_key(|(idx, _)| *idx);
    for (_, entry) in finished {
        report.record(entry);
    }

    info!(
        total = report.total,
        done = report.done,
        healthy = report.healthy,
        warning = report.warning,
        unhealthy = report.unhealthy,
        rejected = report.rejected,
        "sweep finished"
    );
    report
}

impl SweepEntry {
    fn from_outcome(entry: CatalogEntry, outcome: Result<ProbeResult, ValidationError>) -> Self {
        let (result, rejected) = match outcome {
            Ok(r) => (Some(r), None),
            Err(e) => {
                debug!(id = %entry.id, error = %e, "catalog entry rejected");
                (None, Some(e.to_string()))
            }
        };
        Self {
            id: entry.id,
            name: entry.name,
            checked_at: now_rfc3339(),
            result,
            rejected,
        }
    }
}

fn dedup_by_id(entries: &[CatalogEntry]) -> Vec<CatalogEntry> {
    let mut seen = HashSet::new();
    entries
        .iter()
        // Entries without an id cannot collide with each other.
        .filter(|e| e.id.is_empty() || seen.insert(e.id.as_str()))
        .cloned()
        .collect()
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, protocol: &str) -> CatalogEntry {
        CatalogEntry {
            id: id.into(),
            name: format!("env-{id}"),
            protocol: Some(protocol.into()),
            url: Some("127.0.0.1".into()),
            ..CatalogEntry::default()
        }
    }

    #[test]
    fn duplicate_ids_are_dropped() {
        let list = vec![
            entry("a", "tcp"),
            entry("b", "tcp"),
            entry("a", "http"),
            entry("", "tcp"),
            entry("", "tcp"),
        ];
        let ids: Vec<_> = dedup_by_id(&list).into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["a", "b", "", ""]);
    }

    #[tokio::test]
    async fn invalid_entries_are_rejected_not_probed() {
        // tcp without a port and an unknown protocol
        let list = vec![entry("a", "tcp"), entry("b", "gopher")];
        let report = sweep(&list, 4).await;
        assert_eq!(report.total, 2);
        assert_eq!(report.done, 2);
        assert_eq!(report.rejected, 2);
        assert_eq!(report.entries[0].rejected.as_deref(), Some("tcp checks require a port"));
        assert!(report.entries[1].result.is_none());
    }

    #[tokio::test]
    async fn cancelled_sweep_starts_nothing() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let report = sweep_with_cancel(&[entry("a", "tcp")], 1, cancel).await;
        assert_eq!(report.total, 1);
        assert_eq!(report.done, 0);
        assert!(report.entries.is_empty());
    }

    #[test]
    fn timestamp_is_rfc3339() {
        let ts = now_rfc3339();
        assert!(ts.contains('T') && ts.ends_with('Z'));
    }
}
