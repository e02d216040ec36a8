//! Orchestration d'un run SARA
//!
//! Validation → disponibilité du provider → rayons → population et
//! facilities vulnérables → zone inondable. La validation a lieu avant tout
//! appel au provider.

use geo::Point;
use tracing::info;

use crate::aggregate::{aggregate_rings, AggregateContext};
use crate::apportion::ApportionmentEngine;
use crate::error::RunStage;
use crate::facilities::{report_intersections, CategoryDescriptor};
use crate::floodplain::{assess, FloodplainOutcome, FloodplainSources};
use crate::messages::MessageLog;
use crate::pool::{CancelToken, WorkerPool};
use crate::provider::{GeometryProvider, ZoneSource};
use crate::rings::RingBuilder;
use crate::types::{
    ExtensiveAttributes, Facility, RingDistance, RingSpec, RingSummary, RiskRing, TaskStatus,
    VulnerableFacilityMatch,
};
use crate::RiskRadiusError;

/// Paramètres saisis par l'utilisateur, non validés
#[derive(Debug, Clone, PartialEq)]
pub struct RunParameters {
    pub patts_id: String,
    pub name: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub rings: Vec<RingDistance>,
}

impl RunParameters {
    /// Construit la facility et l'ensemble des distances
    pub fn validate(&self) -> Result<(Facility, RingSpec), RiskRadiusError> {
        let facility = Facility::new(
            &self.patts_id,
            &self.name,
            &self.address,
            self.latitude,
            self.longitude,
        )?;
        let spec = RingSpec::new(self.rings.iter().copied())?;
        Ok((facility, spec))
    }
}

/// Sources et réglages d'un run
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Threads du pool (0 = parallélisme disponible)
    pub jobs: usize,
    pub zones: ZoneSource,
    pub attributes: ExtensiveAttributes,
    pub categories: Vec<CategoryDescriptor>,
    pub floodplain: Option<FloodplainSources>,
}

/// Résultat complet d'un run
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub facility: Facility,
    /// Site projeté dans le CRS du provider
    pub site: Point<f64>,
    pub srid: u32,
    pub rings: Vec<RiskRing>,
    pub attributes: ExtensiveAttributes,
    pub summaries: Vec<RingSummary>,
    pub categories: Vec<CategoryDescriptor>,
    pub matches: Vec<VulnerableFacilityMatch>,
    pub floodplain: Option<FloodplainOutcome>,
    pub messages: MessageLog,
}

impl RunOutcome {
    /// Descripteur de la catégorie d'un résultat
    pub fn descriptor(&self, found: &VulnerableFacilityMatch) -> Option<&CategoryDescriptor> {
        self.categories.iter().find(|d| d.category == found.category)
    }

    pub fn ring(&self, ring_index: usize) -> Option<&RiskRing> {
        self.rings.iter().find(|r| r.ring_index == ring_index)
    }

    /// Toutes les unités de travail ont abouti sans warning
    pub fn is_clean(&self) -> bool {
        self.summaries
            .iter()
            .map(|s| &s.status)
            .chain(self.matches.iter().map(|m| &m.status))
            .all(|status| *status == TaskStatus::Succeeded)
            && !matches!(
                self.floodplain,
                Some(FloodplainOutcome::Failed { .. } | FloodplainOutcome::NoFootprint)
            )
    }
}

/// Exécute un run complet pour une facility
pub fn execute(
    params: &RunParameters,
    options: &RunOptions,
    provider: &dyn GeometryProvider,
    cancel: &CancelToken,
) -> Result<RunOutcome, RiskRadiusError> {
    let (facility, spec) = params.validate()?;
    let patts = facility.patts_id().to_string();

    provider
        .check_available()
        .map_err(|err| err.in_run(&patts, RunStage::Connect))?;

    let pool = WorkerPool::new(options.jobs)?;
    info!(patts = %patts, rings = spec.len(), jobs = pool.jobs(), "Starting SARA run");

    let built = RingBuilder::build(&facility, &spec, provider).map_err(|err| {
        let stage = match &err {
            RiskRadiusError::Geometry { stage, .. } => *stage,
            _ => RunStage::Buffer,
        };
        err.in_run(&patts, stage)
    })?;

    let engine = ApportionmentEngine::new(options.attributes.clone());
    let ctx = AggregateContext {
        facility_id: &patts,
        provider,
        zones: &options.zones,
        engine: &engine,
        pool: &pool,
        cancel,
    };
    let summaries = aggregate_rings(&ctx, &built.rings)?;

    let matches = report_intersections(
        &facility,
        provider,
        &built.rings,
        &options.categories,
        &pool,
        cancel,
    )?;

    let floodplain = match &options.floodplain {
        Some(sources) if !cancel.is_cancelled() => Some(
            assess(provider, sources, built.site)
                .map_err(|err| err.in_run(&patts, RunStage::Floodplain))?,
        ),
        _ => None,
    };

    let messages = collect_messages(
        &facility,
        &built.rings,
        &summaries,
        &matches,
        floodplain.as_ref(),
    );

    Ok(RunOutcome {
        facility,
        site: built.site,
        srid: built.srid,
        rings: built.rings,
        attributes: options.attributes.clone(),
        summaries,
        categories: options.categories.clone(),
        matches,
        floodplain,
        messages,
    })
}

/// Messages du run, dans un ordre indépendant de l'ordonnancement
fn collect_messages(
    facility: &Facility,
    rings: &[RiskRing],
    summaries: &[RingSummary],
    matches: &[VulnerableFacilityMatch],
    floodplain: Option<&FloodplainOutcome>,
) -> MessageLog {
    let mut log = MessageLog::new();
    log.info(format!(
        "SARA Risk Radii created for {} (PATTS #{}): {}",
        facility.name(),
        facility.patts_id(),
        rings
            .iter()
            .map(|r| r.distance.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    ));

    for summary in summaries {
        match &summary.status {
            TaskStatus::Failed { reason } => {
                log.error(format!(
                    "Population estimate for the {} buffer failed: {reason}",
                    summary.distance
                ));
            }
            TaskStatus::Cancelled => {
                log.warning(format!(
                    "Population estimate for the {} buffer was cancelled",
                    summary.distance
                ));
            }
            status => {
                let totals = summary
                    .totals
                    .iter()
                    .map(|(name, value)| format!("{name} = {value}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                log.info(format!(
                    "Estimated totals within the {} buffer: {totals}",
                    summary.distance
                ));
                if let TaskStatus::SucceededWithWarnings { warnings } = status {
                    for warning in warnings {
                        log.warning(warning.clone());
                    }
                }
            }
        }
    }

    for found in matches {
        let distance = rings
            .iter()
            .find(|r| r.ring_index == found.ring_index)
            .map(|r| r.distance.to_string())
            .unwrap_or_default();
        match &found.status {
            TaskStatus::Succeeded => log.info(format!(
                "{} features from {} intersect the {distance} buffer",
                found.count(),
                found.category
            )),
            TaskStatus::SucceededWithWarnings { warnings } => {
                for warning in warnings {
                    log.warning(warning.clone());
                }
            }
            TaskStatus::Failed { reason } => log.error(format!(
                "{} analysis for the {distance} buffer failed: {reason}",
                found.category
            )),
            TaskStatus::Cancelled => log.warning(format!(
                "{} analysis for the {distance} buffer was cancelled",
                found.category
            )),
        }
    }

    if let Some(outcome) = floodplain {
        match outcome {
            FloodplainOutcome::Failed { .. } => log.error(outcome.message(facility)),
            _ if outcome.is_warning() => log.warning(outcome.message(facility)),
            _ => log.info(outcome.message(facility)),
        }
    }

    log
}
