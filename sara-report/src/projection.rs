//! Projection intelligente : projection Rust pur en priorité, fallback sur PROJ
//!
//! Utilise automatiquement la meilleure option disponible.

use anyhow::Result;
#[cfg(not(feature = "reproject"))]
use anyhow::bail;
use riskradius::{LiteProjector, Projector, RiskRadiusError, US_SURVEY_FOOT};

/// Projection WGS84 → CRS de travail
pub enum SmartProjector {
    /// Projection légère (pure Rust)
    Lite(LiteProjector),
    /// Projection via PROJ (si feature activée)
    #[cfg(feature = "reproject")]
    Proj {
        reprojector: crate::export::reproject::Reprojector,
        unit_meters: f64,
    },
}

impl SmartProjector {
    /// Crée un projector vers `target_srid`
    ///
    /// `unit_meters` : longueur de l'unité du CRS cible, utilisée seulement
    /// par le fallback PROJ (défaut : unité connue du SRID, sinon mètre).
    pub fn new(target_srid: u32, unit_meters: Option<f64>) -> Result<Self> {
        if LiteProjector::is_supported(target_srid) {
            return Ok(Self::Lite(LiteProjector::new(target_srid)?));
        }

        #[cfg(feature = "reproject")]
        {
            let reprojector =
                crate::export::reproject::Reprojector::new(riskradius::WGS84, target_srid)?;
            return Ok(Self::Proj {
                reprojector,
                unit_meters: unit_meters
                    .or_else(|| known_unit_meters(target_srid))
                    .unwrap_or(1.0),
            });
        }

        #[cfg(not(feature = "reproject"))]
        {
            let _ = unit_meters;
            bail!(
                "Projection EPSG:4326 → EPSG:{} non supportée.\n\
                 Projections supportées (Rust pur) : 2271 (PA North ftUS), 2272 (PA South ftUS).\n\
                 Pour d'autres projections, compilez avec: cargo build --features reproject",
                target_srid
            );
        }
    }
}

impl Projector for SmartProjector {
    fn target_srid(&self) -> u32 {
        match self {
            Self::Lite(lite) => lite.target_srid(),
            #[cfg(feature = "reproject")]
            Self::Proj { reprojector, .. } => reprojector.target_epsg(),
        }
    }

    fn unit_meters(&self) -> f64 {
        match self {
            Self::Lite(lite) => lite.unit_meters(),
            #[cfg(feature = "reproject")]
            Self::Proj { unit_meters, .. } => *unit_meters,
        }
    }

    fn project(&self, lon: f64, lat: f64) -> Result<(f64, f64), RiskRadiusError> {
        match self {
            Self::Lite(lite) => lite.project(lon, lat),
            #[cfg(feature = "reproject")]
            Self::Proj { reprojector, .. } => reprojector.transform_xy(lon, lat).map_err(|e| {
                RiskRadiusError::geometry(riskradius::RunStage::Projection, e.to_string())
            }),
        }
    }

    fn description(&self) -> &'static str {
        match self {
            Self::Lite(lite) => lite.description(),
            #[cfg(feature = "reproject")]
            Self::Proj { .. } => "proj (PROJ library)",
        }
    }
}

/// Longueur de l'unité par défaut pour les SRID connus
pub fn known_unit_meters(srid: u32) -> Option<f64> {
    match srid {
        2271 | 2272 => Some(US_SURVEY_FOOT),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lite_for_pennsylvania() {
        let p = SmartProjector::new(2272, None).unwrap();
        assert!(matches!(p, SmartProjector::Lite(_)));
        assert_eq!(p.target_srid(), 2272);
        assert!((p.unit_meters() - 1200.0 / 3937.0).abs() < 1e-12);
    }

    #[test]
    fn test_projection_through_trait() {
        let p = SmartProjector::new(2272, None).unwrap();
        let (x, y) = p.project(-77.1901, 40.2015).unwrap();
        assert!((x - 2_124_895.3).abs() < 1.0);
        assert!((y - 316_756.6).abs() < 1.0);
    }

    #[cfg(not(feature = "reproject"))]
    #[test]
    fn test_unsupported_without_proj() {
        assert!(SmartProjector::new(32618, None).is_err());
    }

    #[test]
    fn test_known_units() {
        assert_eq!(known_unit_meters(2271), Some(US_SURVEY_FOOT));
        assert_eq!(known_unit_meters(32618), None);
    }
}
