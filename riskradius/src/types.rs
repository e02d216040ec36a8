//! Types de données pour le crate riskradius

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use geo::MultiPolygon;

use crate::RiskRadiusError;

/// Identifiant opaque d'une feature (zone, école, bâtiment...)
pub type FeatureId = String;

/// Facility SARA pour laquelle les rayons de risque sont calculés
///
/// Construite uniquement via [`Facility::new`], qui valide les coordonnées.
#[derive(Debug, Clone, PartialEq)]
pub struct Facility {
    patts_id: String,
    name: String,
    address: String,
    latitude: f64,
    longitude: f64,
}

impl Facility {
    /// Valide et crée une facility (coordonnées WGS84 en degrés décimaux)
    pub fn new(
        patts_id: impl Into<String>,
        name: impl Into<String>,
        address: impl Into<String>,
        latitude: f64,
        longitude: f64,
    ) -> Result<Self, RiskRadiusError> {
        let patts_id = patts_id.into().trim().to_string();
        if patts_id.is_empty() {
            return Err(RiskRadiusError::validation("PATTS id", "must not be empty"));
        }
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(RiskRadiusError::validation(
                "latitude",
                format!("{latitude} is outside [-90, 90]"),
            ));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(RiskRadiusError::validation(
                "longitude",
                format!("{longitude} is outside [-180, 180]"),
            ));
        }

        Ok(Self {
            patts_id,
            name: name.into(),
            address: address.into(),
            latitude,
            longitude,
        })
    }

    pub fn patts_id(&self) -> &str {
        &self.patts_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

/// Unité linéaire acceptée pour les distances de buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinearUnit {
    Feet,
    Yards,
    Miles,
    NauticalMiles,
    Meters,
    Kilometers,
}

impl LinearUnit {
    /// Toutes les unités acceptées
    pub const ALL: [LinearUnit; 6] = [
        Self::Feet,
        Self::Yards,
        Self::Miles,
        Self::NauticalMiles,
        Self::Meters,
        Self::Kilometers,
    ];

    /// Longueur d'une unité en mètres (pied international)
    pub fn meters(self) -> f64 {
        match self {
            Self::Feet => 0.3048,
            Self::Yards => 0.9144,
            Self::Miles => 1609.344,
            Self::NauticalMiles => 1852.0,
            Self::Meters => 1.0,
            Self::Kilometers => 1000.0,
        }
    }

    /// Nom utilisé dans le champ UNITS des sorties
    pub fn label(self) -> &'static str {
        match self {
            Self::Feet => "Feet",
            Self::Yards => "Yards",
            Self::Miles => "Miles",
            Self::NauticalMiles => "NauticalMiles",
            Self::Meters => "Meters",
            Self::Kilometers => "Kilometers",
        }
    }
}

impl fmt::Display for LinearUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for LinearUnit {
    type Err = RiskRadiusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .collect();

        match normalized.as_str() {
            "ft" | "foot" | "feet" => Ok(Self::Feet),
            "yd" | "yard" | "yards" => Ok(Self::Yards),
            "mi" | "mile" | "miles" => Ok(Self::Miles),
            "nmi" | "nauticalmile" | "nauticalmiles" => Ok(Self::NauticalMiles),
            "m" | "meter" | "meters" | "metre" | "metres" => Ok(Self::Meters),
            "km" | "kilometer" | "kilometers" | "kilometre" | "kilometres" => {
                Ok(Self::Kilometers)
            }
            _ => Err(RiskRadiusError::validation(
                "unit",
                format!(
                    "'{}' is not supported. Use: feet, yards, miles, nautical_miles, meters, kilometers",
                    s.trim()
                ),
            )),
        }
    }
}

/// Distance d'un rayon de risque
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RingDistance {
    pub value: f64,
    pub unit: LinearUnit,
}

impl RingDistance {
    pub fn new(value: f64, unit: LinearUnit) -> Self {
        Self { value, unit }
    }

    /// Longueur en mètres
    pub fn meters(&self) -> f64 {
        self.value * self.unit.meters()
    }

    /// Distance formatée pour les noms de fichiers (`1.5` → `1_5`)
    ///
    /// Une distance entière garde sa décimale (`1` → `1_0`), comme le champ
    /// `BUFFDIST` lu en flottant par les outils SIG.
    pub fn file_token(&self) -> String {
        let text = if self.value.fract() == 0.0 && self.value.abs() < 1e15 {
            format!("{:.1}", self.value)
        } else {
            self.value.to_string()
        };
        text.replace('.', "_")
    }
}

impl fmt::Display for RingDistance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.value, self.unit)
    }
}

/// Ensemble ordonné (plus petit → plus grand) des distances de buffer
#[derive(Debug, Clone, PartialEq)]
pub struct RingSpec {
    distances: Vec<RingDistance>,
}

impl RingSpec {
    /// Valide et trie les distances
    ///
    /// Rejette une liste vide, les valeurs non finies ou <= 0 et les doublons
    /// (à longueur métrique égale).
    pub fn new(distances: impl IntoIterator<Item = RingDistance>) -> Result<Self, RiskRadiusError> {
        let mut distances: Vec<RingDistance> = distances.into_iter().collect();
        if distances.is_empty() {
            return Err(RiskRadiusError::validation(
                "ring distances",
                "at least one distance is required",
            ));
        }

        for d in &distances {
            if !d.value.is_finite() || d.value <= 0.0 {
                return Err(RiskRadiusError::validation(
                    "ring distances",
                    format!("{} must be a positive number", d.value),
                ));
            }
        }

        distances.sort_by(|a, b| a.meters().total_cmp(&b.meters()));

        for pair in distances.windows(2) {
            if (pair[1].meters() - pair[0].meters()).abs() <= f64::EPSILON * pair[1].meters() {
                return Err(RiskRadiusError::validation(
                    "ring distances",
                    format!("{} and {} describe the same ring", pair[0], pair[1]),
                ));
            }
        }

        Ok(Self { distances })
    }

    /// Raccourci pour une liste de valeurs dans une seule unité
    pub fn uniform(values: &[f64], unit: LinearUnit) -> Result<Self, RiskRadiusError> {
        Self::new(values.iter().map(|&v| RingDistance::new(v, unit)))
    }

    pub fn distances(&self) -> &[RingDistance] {
        &self.distances
    }

    pub fn len(&self) -> usize {
        self.distances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.distances.is_empty()
    }
}

/// Rayon de risque : buffer cumulatif de la facility jusqu'à `distance`
///
/// Ce n'est jamais un anneau : le rayon `i` contient entièrement le rayon `i - 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskRing {
    pub facility_id: String,
    pub ring_index: usize,
    pub distance: RingDistance,
    pub geometry: MultiPolygon<f64>,
}

/// Zone source (bloc de recensement) avec ses attributs extensifs
#[derive(Debug, Clone, PartialEq)]
pub struct Zone {
    pub id: FeatureId,
    pub original_area: f64,
    pub attributes: BTreeMap<String, f64>,
}

/// Zone découpée par un rayon de risque
#[derive(Debug, Clone, PartialEq)]
pub struct ClippedZone {
    pub zone_id: FeatureId,
    pub ring_index: usize,
    pub clipped_area: f64,
    /// Toujours dans [0, 1]
    pub area_ratio: f64,
}

/// Zone découpée avec ses valeurs réparties (arrondies à l'entier)
#[derive(Debug, Clone, PartialEq)]
pub struct ApportionedZone {
    pub clipped: ClippedZone,
    pub values: BTreeMap<String, u64>,
}

/// Zone écartée du calcul (DataError) pour un rayon
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneIssue {
    pub zone_id: FeatureId,
    pub ring_index: usize,
    pub reason: String,
}

/// Statut d'une unité de travail (rayon ou couple rayon/catégorie)
#[derive(Debug, Clone, PartialEq)]
pub enum TaskStatus {
    Succeeded,
    SucceededWithWarnings { warnings: Vec<String> },
    Failed { reason: String },
    /// Non planifiée car le run a été annulé
    Cancelled,
}

impl TaskStatus {
    /// Statut de succès, avec warnings si la liste n'est pas vide
    pub fn from_warnings(warnings: Vec<String>) -> Self {
        if warnings.is_empty() {
            Self::Succeeded
        } else {
            Self::SucceededWithWarnings { warnings }
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded | Self::SucceededWithWarnings { .. })
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => f.write_str("succeeded"),
            Self::SucceededWithWarnings { warnings } => {
                write!(f, "succeeded with warnings ({})", warnings.join("; "))
            }
            Self::Failed { reason } => write!(f, "failed ({reason})"),
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Somme des valeurs réparties d'un rayon
#[derive(Debug, Clone, PartialEq)]
pub struct RingSummary {
    pub ring_index: usize,
    pub distance: RingDistance,
    pub totals: BTreeMap<String, u64>,
    pub zones: Vec<ApportionedZone>,
    pub issues: Vec<ZoneIssue>,
    pub status: TaskStatus,
}

impl RingSummary {
    /// Résumé vide avec un statut terminal (échec ou annulation)
    pub fn without_result(ring: &RiskRing, status: TaskStatus) -> Self {
        Self {
            ring_index: ring.ring_index,
            distance: ring.distance,
            totals: BTreeMap::new(),
            zones: Vec::new(),
            issues: Vec::new(),
            status,
        }
    }

    /// Total d'un attribut (0 si absent)
    pub fn total(&self, attribute: &str) -> u64 {
        self.totals.get(attribute).copied().unwrap_or(0)
    }
}

/// Catégorie de facility vulnérable
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FacilityCategory {
    School,
    Daycare,
    Medical,
    AssistedLiving,
    Mhidd,
    Other(String),
}

impl FacilityCategory {
    pub fn name(&self) -> &str {
        match self {
            Self::School => "Schools",
            Self::Daycare => "Daycares",
            Self::Medical => "Health_Medical",
            Self::AssistedLiving => "Assisted_Living",
            Self::Mhidd => "MHIDD",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for FacilityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FacilityCategory {
    type Err = RiskRadiusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(RiskRadiusError::validation("category", "must not be empty"));
        }
        let key = trimmed.to_lowercase().replace(['-', ' '], "_");
        Ok(match key.as_str() {
            "school" | "schools" | "education" => Self::School,
            "daycare" | "daycares" => Self::Daycare,
            "medical" | "health_medical" | "healthmedical" => Self::Medical,
            "assisted_living" | "assistedliving" => Self::AssistedLiving,
            "mhidd" => Self::Mhidd,
            _ => Self::Other(trimmed.to_string()),
        })
    }
}

/// Facilities d'une catégorie intersectant un rayon
///
/// Un ensemble vide est un résultat valide, pas une erreur.
#[derive(Debug, Clone, PartialEq)]
pub struct VulnerableFacilityMatch {
    pub ring_index: usize,
    pub category: FacilityCategory,
    pub matched: BTreeSet<FeatureId>,
    pub status: TaskStatus,
}

impl VulnerableFacilityMatch {
    pub fn count(&self) -> usize {
        self.matched.len()
    }
}

/// Liste explicite des attributs extensifs à répartir
///
/// Les attributs intensifs (densité, taux) ne doivent jamais y figurer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensiveAttributes(Vec<String>);

impl ExtensiveAttributes {
    pub fn new<I, S>(names: I) -> Result<Self, RiskRadiusError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut list: Vec<String> = Vec::new();
        for name in names {
            let name = name.into().trim().to_string();
            if name.is_empty() {
                return Err(RiskRadiusError::validation(
                    "extensive attributes",
                    "attribute names must not be empty",
                ));
            }
            if !list.contains(&name) {
                list.push(name);
            }
        }
        if list.is_empty() {
            return Err(RiskRadiusError::validation(
                "extensive attributes",
                "at least one attribute is required",
            ));
        }
        Ok(Self(list))
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|n| n == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_facility_validation() {
        assert!(Facility::new("1234", "Plant", "1 Main St", 40.2015, -77.1901).is_ok());
        assert!(Facility::new("1234", "Plant", "", 95.0, -77.0).is_err());
        assert!(Facility::new("1234", "Plant", "", 40.0, -181.0).is_err());
        assert!(Facility::new("1234", "Plant", "", f64::NAN, -77.0).is_err());
        assert!(Facility::new("  ", "Plant", "", 40.0, -77.0).is_err());
    }

    #[test]
    fn test_unit_parsing() {
        assert_eq!("Miles".parse::<LinearUnit>().unwrap(), LinearUnit::Miles);
        assert_eq!("mi".parse::<LinearUnit>().unwrap(), LinearUnit::Miles);
        assert_eq!(" FEET ".parse::<LinearUnit>().unwrap(), LinearUnit::Feet);
        assert_eq!(
            "nautical_miles".parse::<LinearUnit>().unwrap(),
            LinearUnit::NauticalMiles
        );
        assert_eq!("km".parse::<LinearUnit>().unwrap(), LinearUnit::Kilometers);
        assert!("furlongs".parse::<LinearUnit>().is_err());
        assert!("".parse::<LinearUnit>().is_err());
    }

    #[test]
    fn test_ring_spec_sorted_by_length() {
        let spec = RingSpec::new([
            RingDistance::new(1.0, LinearUnit::Miles),
            RingDistance::new(1000.0, LinearUnit::Feet),
            RingDistance::new(2.0, LinearUnit::Kilometers),
        ])
        .unwrap();

        let units: Vec<_> = spec.distances().iter().map(|d| d.unit).collect();
        assert_eq!(
            units,
            vec![LinearUnit::Feet, LinearUnit::Miles, LinearUnit::Kilometers]
        );
    }

    #[test]
    fn test_ring_spec_rejects_bad_input() {
        assert!(RingSpec::new(Vec::new()).is_err());
        assert!(RingSpec::uniform(&[1.0, 0.0], LinearUnit::Miles).is_err());
        assert!(RingSpec::uniform(&[-1.0], LinearUnit::Miles).is_err());
        assert!(RingSpec::uniform(&[f64::INFINITY], LinearUnit::Miles).is_err());
        assert!(RingSpec::uniform(&[1.0, 1.0], LinearUnit::Miles).is_err());
        assert!(RingSpec::new([
            RingDistance::new(1.0, LinearUnit::Kilometers),
            RingDistance::new(1000.0, LinearUnit::Meters),
        ])
        .is_err());
    }

    #[test]
    fn test_ring_distance_formatting() {
        let d = RingDistance::new(1.5, LinearUnit::Miles);
        assert_eq!(d.to_string(), "1.5-Miles");
        assert_eq!(d.file_token(), "1_5");
        assert_eq!(RingDistance::new(2.0, LinearUnit::Feet).file_token(), "2_0");
        assert_eq!(RingDistance::new(0.25, LinearUnit::Miles).file_token(), "0_25");
    }

    #[test]
    fn test_category_parsing() {
        assert_eq!(
            "assisted-living".parse::<FacilityCategory>().unwrap(),
            FacilityCategory::AssistedLiving
        );
        assert_eq!(
            "Schools".parse::<FacilityCategory>().unwrap(),
            FacilityCategory::School
        );
        assert_eq!(
            "Fire Stations".parse::<FacilityCategory>().unwrap(),
            FacilityCategory::Other("Fire Stations".into())
        );
    }

    #[test]
    fn test_extensive_attributes_dedup() {
        let attrs = ExtensiveAttributes::new(["POP10", "HOUSING10", "POP10"]).unwrap();
        assert_eq!(attrs.names(), &["POP10".to_string(), "HOUSING10".to_string()]);
        assert!(attrs.contains("POP10"));
        assert!(!attrs.contains("DENSITY"));
        assert!(ExtensiveAttributes::new(Vec::<String>::new()).is_err());
    }
}
