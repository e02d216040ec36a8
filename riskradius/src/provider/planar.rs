//! Provider planaire en mémoire (geo + index R-tree)
//!
//! Les couches sont chargées une fois, déjà dans le CRS projeté du provider,
//! puis partagées en lecture seule entre les workers.

use std::collections::{BTreeMap, HashMap};
use std::f64::consts::TAU;
use std::panic::{catch_unwind, AssertUnwindSafe};

use geo::{
    Area, BooleanOps, BoundingRect, Contains, Coord, Geometry, Intersects, LineString,
    MultiPolygon, Point, Polygon, Rect,
};
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{RTree, AABB};
use tracing::debug;

use super::{ClipRecord, FeatureSource, GeometryProvider, ZoneSource};
use crate::error::RunStage;
use crate::projection::{Projector, WGS84};
use crate::types::{FeatureId, RingDistance, Zone};
use crate::RiskRadiusError;

/// Nombre de segments par défaut pour approximer un cercle
pub const DEFAULT_SEGMENTS: usize = 64;

/// Feature d'une couche source
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFeature {
    pub id: FeatureId,
    pub geometry: Geometry<f64>,
    /// Attributs numériques (population, aire d'origine...)
    pub attributes: BTreeMap<String, f64>,
}

impl SourceFeature {
    pub fn new(id: impl Into<FeatureId>, geometry: impl Into<Geometry<f64>>) -> Self {
        Self {
            id: id.into(),
            geometry: geometry.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: f64) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }
}

type IndexEntry = GeomWithData<Rectangle<[f64; 2]>, usize>;

struct Layer {
    features: Vec<SourceFeature>,
    by_id: HashMap<FeatureId, usize>,
    index: RTree<IndexEntry>,
}

impl Layer {
    fn new(features: Vec<SourceFeature>) -> Self {
        let entries = features
            .iter()
            .enumerate()
            .filter_map(|(i, f)| {
                let rect = f.geometry.bounding_rect()?;
                Some(GeomWithData::new(
                    Rectangle::from_corners(
                        [rect.min().x, rect.min().y],
                        [rect.max().x, rect.max().y],
                    ),
                    i,
                ))
            })
            .collect();

        let by_id = features
            .iter()
            .enumerate()
            .map(|(i, f)| (f.id.clone(), i))
            .collect();

        Self {
            index: RTree::bulk_load(entries),
            by_id,
            features,
        }
    }

    /// Index des features dont l'emprise croise `rect`, dans l'ordre de chargement
    fn candidates(&self, rect: Rect<f64>) -> Vec<usize> {
        let envelope =
            AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]);
        let mut found: Vec<usize> = self
            .index
            .locate_in_envelope_intersecting(&envelope)
            .map(|entry| entry.data)
            .collect();
        found.sort_unstable();
        found
    }
}

/// Provider planaire : buffers polygonaux, clip booléen, prédicats `geo`
pub struct PlanarProvider {
    projector: Box<dyn Projector>,
    segments: usize,
    layers: HashMap<String, Layer>,
}

impl PlanarProvider {
    /// Crée un provider travaillant dans le CRS cible du projecteur
    pub fn new(projector: Box<dyn Projector>) -> Self {
        Self {
            projector,
            segments: DEFAULT_SEGMENTS,
            layers: HashMap::new(),
        }
    }

    /// Nombre de segments des cercles (minimum 8)
    pub fn with_segments(mut self, segments: usize) -> Self {
        self.segments = segments.max(8);
        self
    }

    /// Charge une couche (géométries déjà dans le CRS cible)
    pub fn add_layer(&mut self, name: impl Into<String>, features: Vec<SourceFeature>) {
        let name = name.into();
        debug!(layer = %name, features = features.len(), "Layer loaded");
        self.layers.insert(name, Layer::new(features));
    }

    /// Nombre de features d'une couche
    pub fn layer_len(&self, name: &str) -> Option<usize> {
        self.layers.get(name).map(|l| l.features.len())
    }

    pub fn projector(&self) -> &dyn Projector {
        self.projector.as_ref()
    }

    fn layer(&self, name: &str, stage: RunStage) -> Result<&Layer, RiskRadiusError> {
        self.layers.get(name).ok_or_else(|| {
            RiskRadiusError::geometry(stage, format!("layer '{name}' is not loaded"))
        })
    }
}

/// Polygone régulier inscrit dans le cercle
fn circle(center: Point<f64>, radius: f64, segments: usize) -> Polygon<f64> {
    let coords: Vec<Coord<f64>> = (0..segments)
        .map(|i| {
            let angle = TAU * i as f64 / segments as f64;
            Coord {
                x: center.x() + radius * angle.cos(),
                y: center.y() + radius * angle.sin(),
            }
        })
        .collect();
    // Polygon::new ferme l'anneau
    Polygon::new(LineString::from(coords), vec![])
}

fn as_multipolygon(geometry: &Geometry<f64>) -> Option<MultiPolygon<f64>> {
    match geometry {
        Geometry::Polygon(p) => Some(MultiPolygon::new(vec![p.clone()])),
        Geometry::MultiPolygon(mp) => Some(mp.clone()),
        Geometry::Rect(r) => Some(MultiPolygon::new(vec![r.to_polygon()])),
        Geometry::Triangle(t) => Some(MultiPolygon::new(vec![t.to_polygon()])),
        _ => None,
    }
}

fn intersects_area(area: &MultiPolygon<f64>, geometry: &Geometry<f64>) -> bool {
    match geometry {
        Geometry::Point(p) => area.intersects(p),
        Geometry::MultiPoint(mp) => mp.iter().any(|p| area.intersects(p)),
        Geometry::Line(l) => area.intersects(l),
        Geometry::LineString(ls) => area.intersects(ls),
        Geometry::MultiLineString(mls) => mls.iter().any(|ls| area.intersects(ls)),
        Geometry::Polygon(p) => area.intersects(p),
        Geometry::MultiPolygon(mp) => mp.iter().any(|p| area.intersects(p)),
        Geometry::Rect(r) => area.intersects(&r.to_polygon()),
        Geometry::Triangle(t) => area.intersects(&t.to_polygon()),
        Geometry::GeometryCollection(gc) => gc.iter().any(|g| intersects_area(area, g)),
    }
}

/// Intersection, y compris pour une géométrie réduite à un segment ou un point
fn touches_area(area: &MultiPolygon<f64>, geometry: &Geometry<f64>) -> bool {
    intersects_area(area, geometry)
        || geometry
            .bounding_rect()
            .is_some_and(|rect| area.intersects(&Point::from(rect.center())))
}

fn contains_point(geometry: &Geometry<f64>, point: &Point<f64>) -> bool {
    match geometry {
        Geometry::Polygon(p) => p.contains(point),
        Geometry::MultiPolygon(mp) => mp.contains(point),
        Geometry::Rect(r) => r.to_polygon().contains(point),
        Geometry::Triangle(t) => t.to_polygon().contains(point),
        Geometry::GeometryCollection(gc) => gc.iter().any(|g| contains_point(g, point)),
        _ => false,
    }
}

/// Intersection booléenne, les paniques de l'algorithme deviennent des erreurs
fn safe_intersection(
    zone: &MultiPolygon<f64>,
    area: &MultiPolygon<f64>,
    zone_id: &str,
) -> Result<MultiPolygon<f64>, RiskRadiusError> {
    catch_unwind(AssertUnwindSafe(|| zone.intersection(area))).map_err(|_| {
        RiskRadiusError::geometry(
            RunStage::Population,
            format!("boolean intersection failed for zone {zone_id}"),
        )
    })
}

impl GeometryProvider for PlanarProvider {
    fn check_available(&self) -> Result<(), RiskRadiusError> {
        if self.layers.is_empty() {
            return Err(RiskRadiusError::ProviderUnavailable(
                "no source layer loaded".to_string(),
            ));
        }
        Ok(())
    }

    fn target_srid(&self) -> u32 {
        self.projector.target_srid()
    }

    fn project(
        &self,
        point: Point<f64>,
        source_srid: u32,
        target_srid: u32,
    ) -> Result<Point<f64>, RiskRadiusError> {
        if source_srid == target_srid {
            return Ok(point);
        }
        if source_srid != WGS84 || target_srid != self.projector.target_srid() {
            return Err(RiskRadiusError::geometry(
                RunStage::Projection,
                format!(
                    "EPSG:{source_srid} → EPSG:{target_srid} not supported by {}",
                    self.projector.description()
                ),
            ));
        }
        let (x, y) = self.projector.project(point.x(), point.y())?;
        Ok(Point::new(x, y))
    }

    fn multi_ring_buffer(
        &self,
        center: Point<f64>,
        distances: &[RingDistance],
    ) -> Result<Vec<MultiPolygon<f64>>, RiskRadiusError> {
        if !center.x().is_finite() || !center.y().is_finite() {
            return Err(RiskRadiusError::geometry(
                RunStage::Buffer,
                "buffer center is not a finite point",
            ));
        }

        let unit = self.projector.unit_meters();
        let mut rings = Vec::with_capacity(distances.len());
        for distance in distances {
            let radius = distance.meters() / unit;
            if !radius.is_finite() || radius <= 0.0 {
                return Err(RiskRadiusError::geometry(
                    RunStage::Buffer,
                    format!("invalid buffer radius for {distance}"),
                ));
            }
            rings.push(MultiPolygon::new(vec![circle(center, radius, self.segments)]));
        }
        Ok(rings)
    }

    fn clip(
        &self,
        zones: &ZoneSource,
        area: &MultiPolygon<f64>,
    ) -> Result<Vec<ClipRecord>, RiskRadiusError> {
        let layer = self.layer(&zones.layer, RunStage::Population)?;
        let Some(rect) = area.bounding_rect() else {
            return Err(RiskRadiusError::geometry(
                RunStage::Population,
                "clip polygon is empty",
            ));
        };

        let mut records = Vec::new();
        for idx in layer.candidates(rect) {
            let feature = &layer.features[idx];
            let Some(shape) = as_multipolygon(&feature.geometry) else {
                debug!(zone = %feature.id, "Skipping non polygonal zone");
                continue;
            };

            let original_area = match &zones.area_field {
                // Attribut absent : NaN, signalé par le moteur de répartition
                Some(field) => feature.attributes.get(field).copied().unwrap_or(f64::NAN),
                None => shape.unsigned_area(),
            };

            let clipped_area = if original_area.is_finite() && original_area > 0.0 {
                let clipped = safe_intersection(&shape, area, &feature.id)?;
                let clipped_area = clipped.unsigned_area();
                if clipped_area <= 0.0 {
                    continue;
                }
                clipped_area
            } else {
                // Zone dégénérée dans le rayon : transmise pour être écartée
                // avec un DataError par le moteur de répartition
                if !touches_area(area, &feature.geometry) {
                    continue;
                }
                debug!(zone = %feature.id, original_area, "Degenerate zone inside clip area");
                0.0
            };

            records.push(ClipRecord {
                zone: Zone {
                    id: feature.id.clone(),
                    original_area,
                    attributes: feature.attributes.clone(),
                },
                clipped_area,
            });
        }

        Ok(records)
    }

    fn intersects(
        &self,
        source: &FeatureSource,
        area: &MultiPolygon<f64>,
    ) -> Result<Vec<FeatureId>, RiskRadiusError> {
        let layer = self.layer(&source.layer, RunStage::VulnerableFacilities)?;
        let Some(rect) = area.bounding_rect() else {
            return Ok(Vec::new());
        };

        Ok(layer
            .candidates(rect)
            .into_iter()
            .map(|idx| &layer.features[idx])
            .filter(|f| intersects_area(area, &f.geometry))
            .map(|f| f.id.clone())
            .collect())
    }

    fn containing(
        &self,
        source: &FeatureSource,
        point: Point<f64>,
    ) -> Result<Vec<FeatureId>, RiskRadiusError> {
        let layer = self.layer(&source.layer, RunStage::Floodplain)?;
        let rect = Rect::new(point.0, point.0);

        Ok(layer
            .candidates(rect)
            .into_iter()
            .map(|idx| &layer.features[idx])
            .filter(|f| contains_point(&f.geometry, &point))
            .map(|f| f.id.clone())
            .collect())
    }

    fn feature_geometry(
        &self,
        source: &FeatureSource,
        id: &str,
    ) -> Result<Option<Geometry<f64>>, RiskRadiusError> {
        let layer = self.layer(&source.layer, RunStage::Floodplain)?;
        Ok(layer
            .by_id
            .get(id)
            .map(|&idx| layer.features[idx].geometry.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::LiteProjector;
    use crate::types::LinearUnit;
    use geo::polygon;

    fn provider() -> PlanarProvider {
        PlanarProvider::new(Box::new(LiteProjector::new(2272).unwrap()))
    }

    fn square(x0: f64, y0: f64, size: f64) -> Polygon<f64> {
        polygon![
            (x: x0, y: y0),
            (x: x0 + size, y: y0),
            (x: x0 + size, y: y0 + size),
            (x: x0, y: y0 + size),
        ]
    }

    #[test]
    fn test_buffers_are_cumulative() {
        let p = provider();
        let rings = p
            .multi_ring_buffer(
                Point::new(0.0, 0.0),
                &[
                    RingDistance::new(1.0, LinearUnit::Miles),
                    RingDistance::new(2.0, LinearUnit::Miles),
                ],
            )
            .unwrap();

        assert_eq!(rings.len(), 2);
        assert!(rings[1].unsigned_area() > rings[0].unsigned_area());
        // Le grand cercle contient le petit (cumulatif, pas un anneau)
        assert!(rings[1].contains(&rings[0]));

        // 1 mile = 5280 pieds internationaux ≈ 5279.99 ftUS
        let radius = 1609.344 / LiteProjector::new(2272).unwrap().unit_meters();
        let expected = std::f64::consts::PI * radius * radius;
        let ratio = rings[0].unsigned_area() / expected;
        assert!(ratio > 0.99 && ratio <= 1.0, "ratio={}", ratio);
    }

    #[test]
    fn test_clip_reports_partial_area() {
        let mut p = provider();
        p.add_layer(
            "blocks",
            vec![
                SourceFeature::new("inside", square(0.0, 0.0, 10.0)).with_attribute("POP10", 5.0),
                SourceFeature::new("half", square(10.0, 0.0, 20.0)).with_attribute("POP10", 8.0),
                SourceFeature::new("outside", square(100.0, 100.0, 10.0)),
            ],
        );

        let clip_area = MultiPolygon::new(vec![square(-5.0, -5.0, 25.0)]);
        let records = p.clip(&ZoneSource::new("blocks"), &clip_area).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].zone.id, "inside");
        assert!((records[0].clipped_area - 100.0).abs() < 1e-9);
        assert!((records[0].zone.original_area - 100.0).abs() < 1e-9);
        assert_eq!(records[1].zone.id, "half");
        assert!((records[1].clipped_area - 200.0).abs() < 1e-9);
        assert!((records[1].zone.original_area - 400.0).abs() < 1e-9);
    }

    #[test]
    fn test_clip_keeps_degenerate_zone_for_data_error() {
        let mut p = provider();
        let collapsed = polygon![
            (x: 5.0, y: 5.0),
            (x: 8.0, y: 5.0),
            (x: 8.0, y: 5.0),
            (x: 5.0, y: 5.0),
        ];
        let far = polygon![
            (x: 500.0, y: 500.0),
            (x: 508.0, y: 500.0),
            (x: 500.0, y: 500.0),
        ];
        p.add_layer(
            "blocks",
            vec![
                SourceFeature::new("A", square(0.0, 0.0, 10.0)).with_attribute("POP10", 50.0),
                SourceFeature::new("C", collapsed).with_attribute("POP10", 40.0),
                SourceFeature::new("far", far).with_attribute("POP10", 1.0),
            ],
        );

        let clip_area = MultiPolygon::new(vec![square(-5.0, -5.0, 25.0)]);
        let records = p.clip(&ZoneSource::new("blocks"), &clip_area).unwrap();
        let ids: Vec<&str> = records.iter().map(|r| r.zone.id.as_str()).collect();
        assert_eq!(ids, vec!["A", "C"]);
        assert_eq!(records[1].clipped_area, 0.0);
        assert_eq!(records[1].zone.original_area, 0.0);

        let attributes = crate::types::ExtensiveAttributes::new(["POP10"]).unwrap();
        let engine = crate::apportion::ApportionmentEngine::new(attributes);
        let ring = crate::types::RiskRing {
            facility_id: "1234".into(),
            ring_index: 0,
            distance: RingDistance::new(1.0, LinearUnit::Miles),
            geometry: clip_area,
        };
        let result = engine.apportion(&ring, &records);
        assert_eq!(result.zones.len(), 1);
        assert_eq!(result.issues.len(), 1);
        assert_eq!(result.issues[0].zone_id, "C");
    }

    #[test]
    fn test_clip_uses_area_field() {
        let mut p = provider();
        p.add_layer(
            "blocks",
            vec![SourceFeature::new("b1", square(0.0, 0.0, 10.0)).with_attribute("ORAREA", 250.0)],
        );
        let zones = ZoneSource::new("blocks").with_area_field("ORAREA");
        let records = p
            .clip(&zones, &MultiPolygon::new(vec![square(0.0, 0.0, 10.0)]))
            .unwrap();
        assert_eq!(records[0].zone.original_area, 250.0);

        let missing = ZoneSource::new("blocks").with_area_field("SHAPE_AREA");
        let records = p
            .clip(&missing, &MultiPolygon::new(vec![square(0.0, 0.0, 10.0)]))
            .unwrap();
        assert!(records[0].zone.original_area.is_nan());
    }

    #[test]
    fn test_intersects_and_containing() {
        let mut p = provider();
        p.add_layer(
            "schools",
            vec![
                SourceFeature::new("near", Point::new(1.0, 1.0)),
                SourceFeature::new("far", Point::new(50.0, 50.0)),
            ],
        );
        p.add_layer(
            "footprints",
            vec![SourceFeature::new("bldg", square(0.0, 0.0, 4.0))],
        );

        let area = MultiPolygon::new(vec![square(0.0, 0.0, 10.0)]);
        let hits = p.intersects(&FeatureSource::new("schools"), &area).unwrap();
        assert_eq!(hits, vec!["near".to_string()]);

        let containing = p
            .containing(&FeatureSource::new("footprints"), Point::new(2.0, 2.0))
            .unwrap();
        assert_eq!(containing, vec!["bldg".to_string()]);
        assert!(p
            .containing(&FeatureSource::new("footprints"), Point::new(9.0, 9.0))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_unknown_layer_is_geometry_error() {
        let p = provider();
        let err = p
            .intersects(
                &FeatureSource::new("missing"),
                &MultiPolygon::new(vec![square(0.0, 0.0, 1.0)]),
            )
            .unwrap_err();
        assert!(matches!(err, RiskRadiusError::Geometry { .. }));
        assert!(matches!(
            p.check_available(),
            Err(RiskRadiusError::ProviderUnavailable(_))
        ));
    }

    #[test]
    fn test_project_rejects_other_crs() {
        let p = provider();
        assert!(p.project(Point::new(-77.19, 40.20), WGS84, 2272).is_ok());
        assert!(p.project(Point::new(-77.19, 40.20), WGS84, 3857).is_err());
        let same = p.project(Point::new(1.0, 2.0), 2272, 2272).unwrap();
        assert_eq!(same, Point::new(1.0, 2.0));
    }
}
