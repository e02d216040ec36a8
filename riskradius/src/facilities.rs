//! Intersection des rayons avec les facilities vulnérables
//!
//! Les catégories sont décrites par des données ([`CategoryDescriptor`]) :
//! ajouter une catégorie ne demande aucun code.

use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use crate::error::RunStage;
use crate::pool::{CancelToken, WorkerPool};
use crate::provider::{FeatureSource, GeometryProvider};
use crate::types::{Facility, FacilityCategory, RiskRing, TaskStatus, VulnerableFacilityMatch};
use crate::RiskRadiusError;

/// Modèle de nom de sortie par défaut
pub const DEFAULT_OUTPUT_TEMPLATE: &str = "{category} Intersect {patts} {distance} {unit} Buffer";

/// Description d'une catégorie de facilities vulnérables
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryDescriptor {
    pub category: FacilityCategory,
    pub source: FeatureSource,
    /// Placeholders : `{category}`, `{patts}`, `{distance}`, `{unit}`, `{ring}`
    pub output_template: String,
}

impl CategoryDescriptor {
    pub fn new(category: FacilityCategory, source: FeatureSource) -> Self {
        Self {
            category,
            source,
            output_template: DEFAULT_OUTPUT_TEMPLATE.to_string(),
        }
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.output_template = template.into();
        self
    }

    /// Nom de sortie pour un rayon
    pub fn output_name(&self, facility: &Facility, ring: &RiskRing) -> String {
        render_output_name(&self.output_template, &self.category, facility, ring)
    }
}

/// Remplit les placeholders d'un modèle de nom de sortie
pub fn render_output_name(
    template: &str,
    category: &FacilityCategory,
    facility: &Facility,
    ring: &RiskRing,
) -> String {
    template
        .replace("{category}", category.name())
        .replace("{patts}", facility.patts_id())
        .replace("{distance}", &ring.distance.value.to_string())
        .replace("{unit}", ring.distance.unit.label())
        .replace("{ring}", &(ring.ring_index + 1).to_string())
}

/// Message d'un rayon sans facility de la catégorie
pub fn empty_match_message(category: &FacilityCategory, ring: &RiskRing) -> String {
    format!(
        "No features from {} intersect the {} buffer",
        category.name(),
        ring.distance
    )
}

/// Liste les facilities de chaque catégorie intersectant chaque rayon
///
/// Une tâche par couple (rayon, catégorie). Les résultats sont triés par
/// rayon puis dans l'ordre des descripteurs.
pub fn report_intersections(
    facility: &Facility,
    provider: &dyn GeometryProvider,
    rings: &[RiskRing],
    categories: &[CategoryDescriptor],
    pool: &WorkerPool,
    cancel: &CancelToken,
) -> Result<Vec<VulnerableFacilityMatch>, RiskRadiusError> {
    info!(
        rings = rings.len(),
        categories = categories.len(),
        "Analyzing vulnerable facilities"
    );

    let tasks: Vec<(&RiskRing, &CategoryDescriptor)> = rings
        .iter()
        .flat_map(|ring| categories.iter().map(move |descriptor| (ring, descriptor)))
        .collect();

    let results = pool.run_all(
        &tasks,
        cancel,
        |(ring, descriptor)| match_category(provider, ring, descriptor, cancel),
        |(ring, descriptor)| {
            Ok(VulnerableFacilityMatch {
                ring_index: ring.ring_index,
                category: descriptor.category.clone(),
                matched: BTreeSet::new(),
                status: TaskStatus::Cancelled,
            })
        },
    );

    results
        .into_iter()
        .map(|r| r.map_err(|err| err.in_run(facility.patts_id(), RunStage::VulnerableFacilities)))
        .collect()
}

fn match_category(
    provider: &dyn GeometryProvider,
    ring: &RiskRing,
    descriptor: &CategoryDescriptor,
    cancel: &CancelToken,
) -> Result<VulnerableFacilityMatch, RiskRadiusError> {
    let status;
    let mut matched = BTreeSet::new();

    match provider.intersects(&descriptor.source, &ring.geometry) {
        Ok(ids) if ids.is_empty() => {
            let message = empty_match_message(&descriptor.category, ring);
            warn!("{}", message);
            status = TaskStatus::from_warnings(vec![message]);
        }
        Ok(ids) => {
            debug!(
                category = %descriptor.category,
                ring = ring.ring_index,
                count = ids.len(),
                "Vulnerable facilities found"
            );
            matched.extend(ids);
            status = TaskStatus::Succeeded;
        }
        Err(err) if err.is_fatal() => {
            cancel.cancel();
            return Err(err);
        }
        Err(err) => {
            status = TaskStatus::Failed {
                reason: err.to_string(),
            };
        }
    }

    Ok(VulnerableFacilityMatch {
        ring_index: ring.ring_index,
        category: descriptor.category.clone(),
        matched,
        status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::LiteProjector;
    use crate::provider::{PlanarProvider, SourceFeature};
    use crate::types::{LinearUnit, RingDistance};
    use geo::{polygon, Geometry, MultiPolygon, Point};

    fn facility() -> Facility {
        Facility::new("1234", "Plant", "1 Main St", 40.2015, -77.1901).unwrap()
    }

    fn ring(index: usize, value: f64, size: f64) -> RiskRing {
        RiskRing {
            facility_id: "1234".into(),
            ring_index: index,
            distance: RingDistance::new(value, LinearUnit::Miles),
            geometry: MultiPolygon::new(vec![polygon![
                (x: -size, y: -size),
                (x: size, y: -size),
                (x: size, y: size),
                (x: -size, y: size),
                (x: -size, y: -size),
            ]]),
        }
    }

    fn provider() -> PlanarProvider {
        let mut provider = PlanarProvider::new(Box::new(LiteProjector::new(2272).unwrap()));
        provider.add_layer(
            "schools",
            vec![
                SourceFeature::new("S1", Geometry::Point(Point::new(1.0, 1.0))),
                SourceFeature::new("S2", Geometry::Point(Point::new(8.0, 0.0))),
            ],
        );
        provider.add_layer("daycares", vec![]);
        provider
    }

    #[test]
    fn test_render_output_name() {
        let descriptor =
            CategoryDescriptor::new(FacilityCategory::School, FeatureSource::new("schools"));
        assert_eq!(
            descriptor.output_name(&facility(), &ring(1, 0.5, 1.0)),
            "Schools Intersect 1234 0.5 Miles Buffer"
        );
        let custom = descriptor.with_template("{patts}_{category}_ring{ring}");
        assert_eq!(
            custom.output_name(&facility(), &ring(1, 0.5, 1.0)),
            "1234_Schools_ring2"
        );
    }

    #[test]
    fn test_matches_per_ring_and_category() {
        let provider = provider();
        let categories = vec![
            CategoryDescriptor::new(FacilityCategory::School, FeatureSource::new("schools")),
            CategoryDescriptor::new(FacilityCategory::Daycare, FeatureSource::new("daycares")),
        ];
        let rings = vec![ring(0, 1.0, 2.0), ring(1, 2.0, 10.0)];
        let pool = WorkerPool::new(2).unwrap();

        let matches = report_intersections(
            &facility(),
            &provider,
            &rings,
            &categories,
            &pool,
            &CancelToken::new(),
        )
        .unwrap();

        assert_eq!(matches.len(), 4);
        assert_eq!(matches[0].category, FacilityCategory::School);
        assert_eq!(matches[0].count(), 1);
        assert_eq!(matches[2].ring_index, 1);
        assert_eq!(matches[2].count(), 2);

        // Un ensemble vide est une valeur, pas une erreur
        assert_eq!(matches[1].count(), 0);
        match &matches[1].status {
            TaskStatus::SucceededWithWarnings { warnings } => {
                assert_eq!(
                    warnings[0],
                    "No features from Daycares intersect the 1-Miles buffer"
                );
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_unknown_source_fails_category_only() {
        let provider = provider();
        let categories = vec![CategoryDescriptor::new(
            FacilityCategory::Medical,
            FeatureSource::new("hospitals"),
        )];
        let pool = WorkerPool::new(1).unwrap();

        let matches = report_intersections(
            &facility(),
            &provider,
            &[ring(0, 1.0, 2.0)],
            &categories,
            &pool,
            &CancelToken::new(),
        )
        .unwrap();
        assert!(matches[0].status.is_failed());
    }
}
