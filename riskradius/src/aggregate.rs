//! Agrégation population par rayon
//!
//! Une tâche par rayon : clip des zones par le provider, puis répartition
//! surfacique. Le résultat est toujours trié par `ring_index`.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::apportion::ApportionmentEngine;
use crate::error::RunStage;
use crate::pool::{CancelToken, WorkerPool};
use crate::provider::{GeometryProvider, ZoneSource};
use crate::types::{RingSummary, RiskRing, TaskStatus};
use crate::RiskRadiusError;

/// Contexte partagé par les tâches d'agrégation
pub struct AggregateContext<'a> {
    pub facility_id: &'a str,
    pub provider: &'a dyn GeometryProvider,
    pub zones: &'a ZoneSource,
    pub engine: &'a ApportionmentEngine,
    pub pool: &'a WorkerPool,
    pub cancel: &'a CancelToken,
}

/// Calcule le résumé de chaque rayon
///
/// Une erreur de géométrie marque le rayon `Failed` ; un provider injoignable
/// annule le run et l'erreur remonte avec son contexte.
pub fn aggregate_rings(
    ctx: &AggregateContext<'_>,
    rings: &[RiskRing],
) -> Result<Vec<RingSummary>, RiskRadiusError> {
    info!(rings = rings.len(), layer = %ctx.zones.layer, "Estimating population");

    let results = ctx.pool.run_all(
        rings,
        ctx.cancel,
        |ring| summarize_ring(ctx, ring),
        |ring| Ok(RingSummary::without_result(ring, TaskStatus::Cancelled)),
    );

    let mut summaries = Vec::with_capacity(results.len());
    for result in results {
        match result {
            Ok(summary) => summaries.push(summary),
            Err(err) => return Err(err.in_run(ctx.facility_id, RunStage::Population)),
        }
    }

    summaries.sort_by_key(|s| s.ring_index);
    Ok(summaries)
}

fn summarize_ring(
    ctx: &AggregateContext<'_>,
    ring: &RiskRing,
) -> Result<RingSummary, RiskRadiusError> {
    let records = match ctx.provider.clip(ctx.zones, &ring.geometry) {
        Ok(records) => records,
        Err(err) if err.is_fatal() => {
            ctx.cancel.cancel();
            return Err(err);
        }
        Err(err) => {
            debug!(ring = ring.ring_index, error = %err, "Clip failed");
            return Ok(RingSummary::without_result(
                ring,
                TaskStatus::Failed {
                    reason: err.to_string(),
                },
            ));
        }
    };

    let apportionment = ctx.engine.apportion(ring, &records);
    let totals = match apportionment.totals(ctx.engine.attributes()) {
        Ok(totals) => totals,
        Err(err) => {
            warn!(ring = ring.ring_index, error = %err, "Ring totals rejected");
            return Ok(RingSummary {
                ring_index: ring.ring_index,
                distance: ring.distance,
                totals: BTreeMap::new(),
                zones: apportionment.zones,
                issues: apportionment.issues,
                status: TaskStatus::Failed {
                    reason: err.to_string(),
                },
            });
        }
    };

    let mut warnings: Vec<String> = apportionment
        .issues
        .iter()
        .map(|issue| issue.reason.clone())
        .collect();
    if records.is_empty() {
        warnings.push(format!("No zones intersect the {} buffer", ring.distance));
    } else if apportionment.zones.is_empty() {
        // Toutes les zones écartées : aucun total exploitable
        return Ok(RingSummary {
            ring_index: ring.ring_index,
            distance: ring.distance,
            totals,
            zones: apportionment.zones,
            issues: apportionment.issues,
            status: TaskStatus::Failed {
                reason: format!("all {} zones were rejected", records.len()),
            },
        });
    }

    debug!(
        ring = ring.ring_index,
        zones = apportionment.zones.len(),
        issues = apportionment.issues.len(),
        "Ring summarized"
    );

    Ok(RingSummary {
        ring_index: ring.ring_index,
        distance: ring.distance,
        totals,
        zones: apportionment.zones,
        issues: apportionment.issues,
        status: TaskStatus::from_warnings(warnings),
    })
}
