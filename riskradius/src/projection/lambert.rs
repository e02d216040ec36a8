//! Projection Lambert Conformal Conic à 2 parallèles standards (sens direct)
//!
//! Utilisée par les zones State Plane de Pennsylvanie (NAD83).

use super::ellipsoid::{GRS80, US_SURVEY_FOOT};
use super::AreaOfUse;

/// Paramètres d'une zone LCC 2SP
#[derive(Debug, Clone, Copy)]
pub struct LambertParams {
    /// Latitude origine (degrés)
    pub lat0: f64,
    /// Longitude origine (degrés)
    pub lon0: f64,
    /// Premier parallèle standard (degrés)
    pub lat1: f64,
    /// Deuxième parallèle standard (degrés)
    pub lat2: f64,
    /// False easting (mètres)
    pub x0: f64,
    /// False northing (mètres)
    pub y0: f64,
    /// Unité linéaire des coordonnées produites, en mètres
    pub unit_meters: f64,
    pub area_of_use: AreaOfUse,
}

/// NAD83 / Pennsylvania South (ftUS) - EPSG:2272
pub const PENNSYLVANIA_SOUTH: LambertParams = LambertParams {
    lat0: 39.0 + 20.0 / 60.0,
    lon0: -77.75,
    lat1: 40.0 + 58.0 / 60.0,
    lat2: 39.0 + 56.0 / 60.0,
    x0: 600000.0,
    y0: 0.0,
    unit_meters: US_SURVEY_FOOT,
    area_of_use: AreaOfUse {
        min_lat: 39.71,
        max_lat: 41.18,
        min_lon: -80.53,
        max_lon: -74.72,
    },
};

/// NAD83 / Pennsylvania North (ftUS) - EPSG:2271
pub const PENNSYLVANIA_NORTH: LambertParams = LambertParams {
    lat0: 40.0 + 10.0 / 60.0,
    lon0: -77.75,
    lat1: 41.0 + 57.0 / 60.0,
    lat2: 40.0 + 53.0 / 60.0,
    x0: 600000.0,
    y0: 0.0,
    unit_meters: US_SURVEY_FOOT,
    area_of_use: AreaOfUse {
        min_lat: 40.6,
        max_lat: 42.53,
        min_lon: -80.53,
        max_lon: -74.7,
    },
};

/// Constantes dérivées d'une zone, calculées une seule fois
#[derive(Debug, Clone, Copy)]
pub struct LambertConic {
    params: LambertParams,
    n: f64,
    /// a * F
    af: f64,
    /// Rayon à l'origine
    r0: f64,
}

fn m(lat: f64) -> f64 {
    lat.cos() / (1.0 - GRS80::E2 * lat.sin().powi(2)).sqrt()
}

fn t(lat: f64) -> f64 {
    let e = GRS80::E;
    let sin_lat = lat.sin();
    (std::f64::consts::FRAC_PI_4 - lat / 2.0).tan()
        / ((1.0 - e * sin_lat) / (1.0 + e * sin_lat)).powf(e / 2.0)
}

impl LambertConic {
    pub fn new(params: LambertParams) -> Self {
        let lat0 = params.lat0.to_radians();
        let lat1 = params.lat1.to_radians();
        let lat2 = params.lat2.to_radians();

        // Exposant de la projection
        let n = (m(lat1).ln() - m(lat2).ln()) / (t(lat1).ln() - t(lat2).ln());
        let f = m(lat1) / (n * t(lat1).powf(n));
        let af = GRS80::A * f;
        let r0 = af * t(lat0).powf(n);

        Self { params, n, af, r0 }
    }

    pub fn params(&self) -> &LambertParams {
        &self.params
    }

    /// Convertit (lon, lat) en degrés vers (x, y) dans l'unité de la zone
    pub fn forward(&self, lon_deg: f64, lat_deg: f64) -> (f64, f64) {
        let lat = lat_deg.to_radians();
        let r = self.af * t(lat).powf(self.n);
        let theta = self.n * (lon_deg - self.params.lon0).to_radians();

        let x = self.params.x0 + r * theta.sin();
        let y = self.params.y0 + self.r0 - r * theta.cos();

        (x / self.params.unit_meters, y / self.params.unit_meters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_maps_to_false_origin() {
        let conic = LambertConic::new(PENNSYLVANIA_SOUTH);
        let (x, y) = conic.forward(PENNSYLVANIA_SOUTH.lon0, PENNSYLVANIA_SOUTH.lat0);

        // 600000 m = 1968500 ftUS
        assert!((x - 1_968_500.0).abs() < 1e-3, "x={}", x);
        assert!(y.abs() < 1e-3, "y={}", y);
    }

    #[test]
    fn test_carlisle() {
        // Carlisle, PA approximativement
        let conic = LambertConic::new(PENNSYLVANIA_SOUTH);
        let (x, y) = conic.forward(-77.1901, 40.2015);

        assert!((x - 2_124_895.3).abs() < 1.0, "x={}", x);
        assert!((y - 316_756.6).abs() < 1.0, "y={}", y);
    }

    #[test]
    fn test_scale_close_to_one() {
        // 0.01° de latitude ≈ 1110.35 m à 40.2°N
        let conic = LambertConic::new(PENNSYLVANIA_SOUTH);
        let (x1, y1) = conic.forward(-77.1901, 40.2015);
        let (x2, y2) = conic.forward(-77.1901, 40.2115);
        let meters = (x2 - x1).hypot(y2 - y1) * US_SURVEY_FOOT;

        assert!((meters - 1110.35).abs() < 1.0, "meters={}", meters);
    }
}
