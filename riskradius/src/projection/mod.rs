//! Projection légère en Rust pur (sans dépendances externes)
//!
//! Supporte les zones State Plane utilisées par le comté :
//! - NAD83 / Pennsylvania South (ftUS) (EPSG:2272)
//! - NAD83 / Pennsylvania North (ftUS) (EPSG:2271)
//!
//! Source : WGS84 (EPSG:4326). L'écart de datum NAD83/WGS84 (~1 m) est
//! négligé à l'échelle d'un rayon de risque.

mod ellipsoid;
mod lambert;

pub use ellipsoid::US_SURVEY_FOOT;
pub use lambert::{LambertConic, LambertParams, PENNSYLVANIA_NORTH, PENNSYLVANIA_SOUTH};

use crate::error::RunStage;
use crate::RiskRadiusError;

/// EPSG des coordonnées saisies par l'utilisateur
pub const WGS84: u32 = 4326;

/// Emprise de validité d'un CRS projeté (degrés)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AreaOfUse {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl AreaOfUse {
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        (self.min_lat..=self.max_lat).contains(&lat) && (self.min_lon..=self.max_lon).contains(&lon)
    }
}

/// Projection WGS84 → CRS projeté en unité linéaire
pub trait Projector: Send + Sync {
    /// EPSG du CRS cible
    fn target_srid(&self) -> u32;

    /// Longueur de l'unité linéaire du CRS cible, en mètres
    fn unit_meters(&self) -> f64;

    /// Projette (lon, lat) en degrés
    ///
    /// Échoue avec une erreur de géométrie hors du domaine de la projection.
    fn project(&self, lon: f64, lat: f64) -> Result<(f64, f64), RiskRadiusError>;

    /// Description de l'implémentation utilisée
    fn description(&self) -> &'static str;
}

/// Projection State Plane en Rust pur
#[derive(Debug, Clone)]
pub struct LiteProjector {
    srid: u32,
    conic: LambertConic,
}

impl LiteProjector {
    /// Crée un projecteur vers un EPSG supporté
    pub fn new(target_srid: u32) -> Result<Self, RiskRadiusError> {
        let params = match target_srid {
            2272 => PENNSYLVANIA_SOUTH,
            2271 => PENNSYLVANIA_NORTH,
            _ => {
                return Err(RiskRadiusError::geometry(
                    RunStage::Projection,
                    format!("EPSG:{target_srid} not supported. Supported targets: 2271, 2272"),
                ))
            }
        };

        Ok(Self {
            srid: target_srid,
            conic: LambertConic::new(params),
        })
    }

    /// Vérifie si l'EPSG cible est supporté
    pub fn is_supported(target_srid: u32) -> bool {
        matches!(target_srid, 2271 | 2272)
    }

    pub fn area_of_use(&self) -> AreaOfUse {
        self.conic.params().area_of_use
    }
}

impl Projector for LiteProjector {
    fn target_srid(&self) -> u32 {
        self.srid
    }

    fn unit_meters(&self) -> f64 {
        self.conic.params().unit_meters
    }

    fn project(&self, lon: f64, lat: f64) -> Result<(f64, f64), RiskRadiusError> {
        if !self.area_of_use().contains(lon, lat) {
            return Err(RiskRadiusError::geometry(
                RunStage::Projection,
                format!(
                    "latitude {lat}, longitude {lon} is outside the area of use of EPSG:{}",
                    self.srid
                ),
            ));
        }
        Ok(self.conic.forward(lon, lat))
    }

    fn description(&self) -> &'static str {
        "state plane lite (pure Rust)"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_targets() {
        assert!(LiteProjector::new(2272).is_ok());
        assert!(LiteProjector::new(2271).is_ok());
        assert!(LiteProjector::new(3857).is_err());
        assert!(LiteProjector::is_supported(2272));
        assert!(!LiteProjector::is_supported(4326));
    }

    #[test]
    fn test_outside_area_of_use_is_an_error() {
        let projector = LiteProjector::new(2272).unwrap();
        // Paris
        let err = projector.project(2.35, 48.85).unwrap_err();
        assert!(matches!(
            err,
            RiskRadiusError::Geometry {
                stage: RunStage::Projection,
                ..
            }
        ));
        assert!(projector.project(-77.1901, 40.2015).is_ok());
    }

    #[test]
    fn test_unit_is_us_survey_foot() {
        let projector = LiteProjector::new(2272).unwrap();
        assert!((projector.unit_meters() - 0.3048006096).abs() < 1e-9);
    }
}
