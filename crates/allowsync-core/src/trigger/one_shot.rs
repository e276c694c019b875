// # One-shot trigger
//
// Start → Resolving → Reconciling → {Done, Failed}
//
// Nothing persists between runs. Any failure is returned to the caller, which
// turns it into a non-zero exit.

use tracing::info;

use crate::error::{Error, Result};
use crate::model::{DesiredSet, ReconcileOutcome};
use crate::reconciler::Reconciler;
use crate::traits::NameResolver;

/// Split a ';'-separated hostname list
///
/// Whitespace around names is trimmed and empty segments are dropped.
pub fn split_records(raw: &str) -> Vec<String> {
    raw.split(';')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Resolve every record into one desired set
///
/// Each record must resolve to at least one address, otherwise the whole
/// resolution fails.
pub async fn resolve_desired(
    resolver: &dyn NameResolver,
    records: &[String],
) -> Result<DesiredSet> {
    if records.is_empty() {
        return Err(Error::resolution("No DNS records set to resolve"));
    }

    let mut desired = DesiredSet::new();
    for record in records {
        let addrs = resolver.resolve(record).await?;
        if addrs.is_empty() {
            return Err(Error::resolution(format!(
                "{} did not resolve to any address",
                record
            )));
        }
        tracing::debug!("{} resolved to {:?}", record, addrs);
        desired.extend(addrs);
    }

    Ok(desired)
}

/// Resolve the records and reconcile once
pub async fn run_once(
    resolver: &dyn NameResolver,
    records: &[String],
    reconciler: &Reconciler,
) -> Result<ReconcileOutcome> {
    info!("Resolving {} record(s): {}", records.len(), records.join(";"));
    let desired = resolve_desired(resolver, records).await?;
    info!("Resolved addresses: {}", desired);

    let outcome = reconciler.reconcile(&desired).await?;
    info!("Updated rules ({:?})", outcome);
    Ok(outcome)
}
