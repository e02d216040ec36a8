//! Définitions des ellipsoïdes

/// Ellipsoïde GRS80 (NAD83)
pub struct GRS80;

impl GRS80 {
    /// Demi-grand axe (rayon équatorial) en mètres
    pub const A: f64 = 6378137.0;

    /// Aplatissement
    pub const F: f64 = 1.0 / 298.257222101;

    /// Première excentricité au carré
    pub const E2: f64 = 2.0 * Self::F - Self::F * Self::F;

    /// Première excentricité
    pub const E: f64 = 0.0818191910428158; // sqrt(E2)
}

/// Pied US survey en mètres
pub const US_SURVEY_FOOT: f64 = 1200.0 / 3937.0;
