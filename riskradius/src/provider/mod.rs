//! Interface vers le moteur géométrique
//!
//! Le cœur ne fait jamais de géométrie lui-même : projection, buffers, clip et
//! prédicats spatiaux passent par [`GeometryProvider`]. Les sources de données
//! sont désignées par des handles immuables passés à chaque appel, jamais par
//! un état global de type "workspace courant".

pub mod planar;

pub use planar::{PlanarProvider, SourceFeature};

use geo::{Geometry, MultiPolygon, Point};

use crate::types::{FeatureId, RingDistance, Zone};
use crate::RiskRadiusError;

/// Handle vers une source de zones (blocs de recensement)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ZoneSource {
    /// Nom de la couche côté provider
    pub layer: String,
    /// Attribut portant l'aire d'origine (sinon aire planaire de la géométrie)
    pub area_field: Option<String>,
}

impl ZoneSource {
    pub fn new(layer: impl Into<String>) -> Self {
        Self {
            layer: layer.into(),
            area_field: None,
        }
    }

    pub fn with_area_field(mut self, field: impl Into<String>) -> Self {
        self.area_field = Some(field.into());
        self
    }
}

/// Handle vers une source de features (écoles, bâtiments, zones inondables...)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FeatureSource {
    pub layer: String,
}

impl FeatureSource {
    pub fn new(layer: impl Into<String>) -> Self {
        Self {
            layer: layer.into(),
        }
    }
}

/// Résultat du clip d'une zone par un polygone
#[derive(Debug, Clone, PartialEq)]
pub struct ClipRecord {
    pub zone: Zone,
    /// Aire de la partie de la zone à l'intérieur du polygone
    pub clipped_area: f64,
}

/// Moteur géométrique consommé par le cœur
///
/// Les implémentations doivent tolérer des appels concurrents : chaque worker
/// bloque uniquement pendant son propre appel.
pub trait GeometryProvider: Send + Sync {
    /// Vérifie que le moteur et ses sources sont joignables
    fn check_available(&self) -> Result<(), RiskRadiusError> {
        Ok(())
    }

    /// EPSG du CRS projeté dans lequel le provider travaille
    fn target_srid(&self) -> u32;

    /// Projette un point de `source_srid` vers `target_srid`
    fn project(
        &self,
        point: Point<f64>,
        source_srid: u32,
        target_srid: u32,
    ) -> Result<Point<f64>, RiskRadiusError>;

    /// Buffers cumulatifs autour d'un point projeté, du plus petit au plus grand
    fn multi_ring_buffer(
        &self,
        center: Point<f64>,
        distances: &[RingDistance],
    ) -> Result<Vec<MultiPolygon<f64>>, RiskRadiusError>;

    /// Découpe les zones par le polygone (zones sans intersection exclues)
    fn clip(
        &self,
        zones: &ZoneSource,
        area: &MultiPolygon<f64>,
    ) -> Result<Vec<ClipRecord>, RiskRadiusError>;

    /// Identifiants des features qui intersectent le polygone
    fn intersects(
        &self,
        source: &FeatureSource,
        area: &MultiPolygon<f64>,
    ) -> Result<Vec<FeatureId>, RiskRadiusError>;

    /// Identifiants des features qui contiennent le point
    fn containing(
        &self,
        source: &FeatureSource,
        point: Point<f64>,
    ) -> Result<Vec<FeatureId>, RiskRadiusError>;

    /// Géométrie d'une feature
    fn feature_geometry(
        &self,
        source: &FeatureSource,
        id: &str,
    ) -> Result<Option<Geometry<f64>>, RiskRadiusError>;
}
