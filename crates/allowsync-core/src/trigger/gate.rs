// # Report Gate (server mode)
//
// Validating → {Rejected, Checking}
// Checking   → {SkippedIdempotent, Reconciling}
// Reconciling → {Applied (cache updated), Failed (cache untouched)}
//
// The check → reconcile → store sequence holds one async mutex, so two
// concurrent reports of the same new address reconcile once and the second
// one is skipped.

use std::net::IpAddr;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::cache::IdempotencyCache;
use crate::error::{Error, Result};
use crate::model::{DesiredSet, ReconcileOutcome};
use crate::reconciler::Reconciler;

/// What a single report resulted in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    /// Address equals the last successfully applied one; no remote calls
    Skipped {
        address: IpAddr,
    },
    /// Address was reconciled and is now cached
    Reconciled {
        address: IpAddr,
        outcome: ReconcileOutcome,
    },
}

impl ReportOutcome {
    /// The reported address
    pub fn address(&self) -> IpAddr {
        match self {
            ReportOutcome::Skipped { address } => *address,
            ReportOutcome::Reconciled { address, .. } => *address,
        }
    }
}

/// Idempotency gate in front of the reconciler
pub struct ReportGate {
    reconciler: Reconciler,
    cache: IdempotencyCache,
    lock: Mutex<()>,
}

impl ReportGate {
    /// Create a gate
    ///
    /// The cache should already be loaded; the gate never reads durable
    /// storage on its own.
    pub fn new(reconciler: Reconciler, cache: IdempotencyCache) -> Self {
        Self {
            reconciler,
            cache,
            lock: Mutex::new(()),
        }
    }

    /// Access the idempotency cache
    pub fn cache(&self) -> &IdempotencyCache {
        &self.cache
    }

    /// Handle one reported candidate address
    ///
    /// # Returns
    ///
    /// - `Ok(ReportOutcome::Skipped)`: Candidate equals the cached address
    /// - `Ok(ReportOutcome::Reconciled)`: Reconciliation succeeded, cache updated
    /// - `Err(Error::InvalidInput)`: Candidate is not an IP address; nothing touched
    /// - `Err(_)`: Reconciliation failed; cache untouched
    pub async fn report(&self, raw: &str) -> Result<ReportOutcome> {
        let address = parse_candidate(raw)?;

        let _guard = self.lock.lock().await;

        if self.cache.check(address).await {
            info!("Not updating; IP is the same as cached: {}", address);
            return Ok(ReportOutcome::Skipped { address });
        }

        info!(
            "Reconciling reported address {} with {}",
            address,
            self.reconciler.provider_name()
        );

        let outcome = match self.reconciler.reconcile(&DesiredSet::single(address)).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Reconciliation for {} failed: {}", address, e);
                return Err(e);
            }
        };

        self.cache.store(address).await;
        info!("Updated rules for {} ({:?})", address, outcome);

        Ok(ReportOutcome::Reconciled { address, outcome })
    }
}

fn parse_candidate(raw: &str) -> Result<IpAddr> {
    raw.trim()
        .parse::<IpAddr>()
        .map_err(|_| Error::invalid_input(format!("Invalid ip: {}", raw)))
}
