//! Test de la facility en zone inondable
//!
//! Sélectionne les emprises de bâtiments qui contiennent le site, puis
//! vérifie si l'une d'elles intersecte une zone inondable.

use std::collections::BTreeSet;
use std::fmt;

use geo::{Geometry, MultiPolygon, Point, Polygon};
use tracing::{debug, info};

use crate::error::RunStage;
use crate::provider::{FeatureSource, GeometryProvider};
use crate::types::{Facility, FeatureId};
use crate::RiskRadiusError;

/// Sources utilisées par le test zone inondable
#[derive(Debug, Clone, PartialEq)]
pub struct FloodplainSources {
    pub footprints: FeatureSource,
    pub floodplains: FeatureSource,
}

/// Résultat du test zone inondable
#[derive(Debug, Clone, PartialEq)]
pub enum FloodplainOutcome {
    /// Aucun bâtiment ne contient le site
    NoFootprint,
    OutsideFloodplain,
    /// Bâtiments contenant le site et intersectant une zone inondable
    InFloodplain { footprints: BTreeSet<FeatureId> },
    Failed { reason: String },
}

impl FloodplainOutcome {
    /// Le résultat mérite l'attention de l'utilisateur
    pub fn is_warning(&self) -> bool {
        matches!(self, Self::NoFootprint | Self::InFloodplain { .. })
    }

    /// Message destiné au fichier de résultats
    pub fn message(&self, facility: &Facility) -> String {
        match self {
            Self::NoFootprint => format!(
                "No building footprint contains the location of {} (PATTS #{}); floodplain status unknown",
                facility.name(),
                facility.patts_id()
            ),
            Self::OutsideFloodplain => format!(
                "{} (PATTS #{}) is not located within a floodplain",
                facility.name(),
                facility.patts_id()
            ),
            Self::InFloodplain { footprints } => format!(
                "{} (PATTS #{}) is located within a floodplain ({} building footprint(s))",
                facility.name(),
                facility.patts_id(),
                footprints.len()
            ),
            Self::Failed { reason } => format!("Floodplain analysis failed: {reason}"),
        }
    }
}

impl fmt::Display for FloodplainOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoFootprint => f.write_str("no footprint"),
            Self::OutsideFloodplain => f.write_str("outside floodplain"),
            Self::InFloodplain { footprints } => {
                write!(f, "in floodplain ({} footprints)", footprints.len())
            }
            Self::Failed { reason } => write!(f, "failed ({reason})"),
        }
    }
}

/// Évalue la situation du site projeté vis-à-vis des zones inondables
///
/// Seul un provider injoignable est retourné en erreur ; les autres échecs
/// donnent `FloodplainOutcome::Failed`.
pub fn assess(
    provider: &dyn GeometryProvider,
    sources: &FloodplainSources,
    site: Point<f64>,
) -> Result<FloodplainOutcome, RiskRadiusError> {
    match try_assess(provider, sources, site) {
        Ok(outcome) => {
            info!(outcome = %outcome, "Floodplain analysis done");
            Ok(outcome)
        }
        Err(err) if err.is_fatal() => Err(err),
        Err(err) => Ok(FloodplainOutcome::Failed {
            reason: err.to_string(),
        }),
    }
}

fn try_assess(
    provider: &dyn GeometryProvider,
    sources: &FloodplainSources,
    site: Point<f64>,
) -> Result<FloodplainOutcome, RiskRadiusError> {
    let containing = provider.containing(&sources.footprints, site)?;
    if containing.is_empty() {
        return Ok(FloodplainOutcome::NoFootprint);
    }
    debug!(footprints = containing.len(), "Footprints containing the site");

    let mut flooded = BTreeSet::new();
    for id in containing {
        let Some(geometry) = provider.feature_geometry(&sources.footprints, &id)? else {
            return Err(RiskRadiusError::geometry(
                RunStage::Floodplain,
                format!("footprint {id} has no geometry"),
            ));
        };
        let area = footprint_area(&geometry).ok_or_else(|| {
            RiskRadiusError::geometry(
                RunStage::Floodplain,
                format!("footprint {id} is not a polygon"),
            )
        })?;
        if !provider.intersects(&sources.floodplains, &area)?.is_empty() {
            flooded.insert(id);
        }
    }

    if flooded.is_empty() {
        Ok(FloodplainOutcome::OutsideFloodplain)
    } else {
        Ok(FloodplainOutcome::InFloodplain {
            footprints: flooded,
        })
    }
}

fn footprint_area(geometry: &Geometry<f64>) -> Option<MultiPolygon<f64>> {
    match geometry {
        Geometry::Polygon(p) => Some(MultiPolygon::new(vec![p.clone()])),
        Geometry::MultiPolygon(mp) => Some(mp.clone()),
        Geometry::Rect(r) => Some(MultiPolygon::new(vec![r.to_polygon()])),
        Geometry::Triangle(t) => Some(MultiPolygon::new(vec![t.to_polygon()])),
        Geometry::GeometryCollection(gc) => {
            let polygons: Vec<Polygon<f64>> = gc
                .iter()
                .filter_map(footprint_area)
                .flat_map(|mp| mp.0)
                .collect();
            (!polygons.is_empty()).then(|| MultiPolygon::new(polygons))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::LiteProjector;
    use crate::provider::{PlanarProvider, SourceFeature};
    use geo::polygon;

    fn square(x0: f64, y0: f64, size: f64) -> Polygon<f64> {
        polygon![
            (x: x0, y: y0),
            (x: x0 + size, y: y0),
            (x: x0 + size, y: y0 + size),
            (x: x0, y: y0 + size),
            (x: x0, y: y0),
        ]
    }

    fn provider() -> PlanarProvider {
        let mut provider = PlanarProvider::new(Box::new(LiteProjector::new(2272).unwrap()));
        provider.add_layer(
            "buildings",
            vec![
                SourceFeature::new("B1", Geometry::Polygon(square(0.0, 0.0, 10.0))),
                SourceFeature::new("B2", Geometry::Polygon(square(100.0, 100.0, 10.0))),
            ],
        );
        provider.add_layer(
            "floodplains",
            vec![SourceFeature::new("F1", Geometry::Polygon(square(8.0, -5.0, 20.0)))],
        );
        provider
    }

    fn sources() -> FloodplainSources {
        FloodplainSources {
            footprints: FeatureSource::new("buildings"),
            floodplains: FeatureSource::new("floodplains"),
        }
    }

    #[test]
    fn test_site_in_floodplain() {
        let outcome = assess(&provider(), &sources(), Point::new(5.0, 5.0)).unwrap();
        match outcome {
            FloodplainOutcome::InFloodplain { footprints } => {
                assert!(footprints.contains("B1"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_site_outside_floodplain() {
        let outcome = assess(&provider(), &sources(), Point::new(105.0, 105.0)).unwrap();
        assert_eq!(outcome, FloodplainOutcome::OutsideFloodplain);
    }

    #[test]
    fn test_site_without_footprint() {
        let outcome = assess(&provider(), &sources(), Point::new(50.0, 50.0)).unwrap();
        assert_eq!(outcome, FloodplainOutcome::NoFootprint);
        assert!(outcome.is_warning());
    }

    #[test]
    fn test_missing_source_is_not_fatal() {
        let sources = FloodplainSources {
            footprints: FeatureSource::new("buildings"),
            floodplains: FeatureSource::new("flood_zones"),
        };
        let outcome = assess(&provider(), &sources, Point::new(5.0, 5.0)).unwrap();
        assert!(matches!(outcome, FloodplainOutcome::Failed { .. }));
    }
}
