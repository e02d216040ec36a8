//! Reprojection de géométries avec PROJ
//!
//! Ce module est disponible uniquement avec le feature `reproject`.

#[cfg(feature = "reproject")]
use std::sync::Mutex;

#[cfg(feature = "reproject")]
use anyhow::{anyhow, Context, Result};
#[cfg(feature = "reproject")]
use geo::{Coord, Geometry, MapCoords};
#[cfg(feature = "reproject")]
use proj::Proj;

/// Reprojection de géométries entre deux systèmes de coordonnées
///
/// `Proj` n'est pas `Sync` : l'accès est sérialisé pour partager le
/// reprojector entre les workers.
#[cfg(feature = "reproject")]
pub struct Reprojector {
    proj: Mutex<Proj>,
    source_epsg: u32,
    target_epsg: u32,
}

#[cfg(feature = "reproject")]
impl Reprojector {
    /// Crée un nouveau reprojector entre deux EPSG
    pub fn new(source_epsg: u32, target_epsg: u32) -> Result<Self> {
        let source = format!("EPSG:{}", source_epsg);
        let target = format!("EPSG:{}", target_epsg);

        let proj = Proj::new_known_crs(&source, &target, None).context(format!(
            "Failed to create projection from {} to {}",
            source, target
        ))?;

        Ok(Self {
            proj: Mutex::new(proj),
            source_epsg,
            target_epsg,
        })
    }

    /// Retourne le SRID source
    pub fn source_epsg(&self) -> u32 {
        self.source_epsg
    }

    /// Retourne le SRID cible
    pub fn target_epsg(&self) -> u32 {
        self.target_epsg
    }

    /// Transforme une coordonnée unique
    pub fn transform_xy(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        let proj = self
            .proj
            .lock()
            .map_err(|_| anyhow!("PROJ context poisoned"))?;
        proj.convert((x, y))
            .context("Coordinate transformation failed")
    }

    /// Transforme une géométrie
    pub fn transform_geometry(&self, geom: &Geometry) -> Result<Geometry> {
        if self.source_epsg == self.target_epsg {
            return Ok(geom.clone());
        }

        geom.try_map_coords(|coord| {
            let (x, y) = self.transform_xy(coord.x, coord.y)?;
            Ok(Coord { x, y })
        })
    }
}

#[cfg(feature = "reproject")]
#[cfg(test)]
mod tests {
    use super::*;
    use geo::{LineString, Point, Polygon};

    #[test]
    fn test_wgs84_to_pa_south() {
        // Carlisle, PA
        let reprojector = Reprojector::new(4326, 2272).unwrap();
        let (x, y) = reprojector.transform_xy(-77.1901, 40.2015).unwrap();

        assert!((x - 2_124_895.0).abs() < 50.0, "x = {}", x);
        assert!((y - 316_757.0).abs() < 50.0, "y = {}", y);
    }

    #[test]
    fn test_polygon_transform() {
        let reprojector = Reprojector::new(2272, 4326).unwrap();

        let poly = Geometry::Polygon(Polygon::new(
            LineString::from(vec![
                (2_124_895.0, 316_757.0),
                (2_125_895.0, 316_757.0),
                (2_125_895.0, 317_757.0),
                (2_124_895.0, 317_757.0),
                (2_124_895.0, 316_757.0),
            ]),
            vec![],
        ));

        match reprojector.transform_geometry(&poly).unwrap() {
            Geometry::Polygon(p) => {
                assert_eq!(p.exterior().0.len(), 5);
                let first = &p.exterior().0[0];
                assert!(first.x > -78.0 && first.x < -77.0);
                assert!(first.y > 40.0 && first.y < 40.5);
            }
            other => panic!("Expected Polygon geometry, got {:?}", other),
        }
    }

    #[test]
    fn test_identity_transform() {
        let reprojector = Reprojector::new(2272, 2272).unwrap();
        let point = Geometry::Point(Point::new(1.0, 2.0));
        assert_eq!(reprojector.transform_geometry(&point).unwrap(), point);
    }

    #[test]
    fn test_invalid_epsg() {
        assert!(Reprojector::new(99999, 4326).is_err());
    }
}

/// Vérifie si la reprojection PROJ est disponible
pub fn is_available() -> bool {
    cfg!(feature = "reproject")
}

#[cfg(not(feature = "reproject"))]
use anyhow::{bail, Result};
#[cfg(not(feature = "reproject"))]
use geo::Geometry;

/// Reprojector indisponible sans la feature `reproject`
#[cfg(not(feature = "reproject"))]
pub struct Reprojector {
    epsg: u32,
}

#[cfg(not(feature = "reproject"))]
impl Reprojector {
    /// Échoue toujours, sauf si source == cible
    pub fn new(source_epsg: u32, target_epsg: u32) -> Result<Self> {
        if source_epsg == target_epsg {
            Ok(Self { epsg: target_epsg })
        } else {
            bail!(
                "Reprojection from EPSG:{} to EPSG:{} requires the 'reproject' feature. \
                 Build with: cargo build --features reproject",
                source_epsg,
                target_epsg
            )
        }
    }

    /// Retourne le SRID cible
    pub fn target_epsg(&self) -> u32 {
        self.epsg
    }

    /// Retourne la géométrie inchangée
    pub fn transform_geometry(&self, geom: &Geometry) -> Result<Geometry> {
        Ok(geom.clone())
    }
}
