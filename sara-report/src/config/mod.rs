//! Configuration du système

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use riskradius::{
    CategoryDescriptor, ExtensiveAttributes, FacilityCategory, FeatureSource, FloodplainSources,
    ZoneSource, DEFAULT_OUTPUT_TEMPLATE,
};
use serde::{Deserialize, Serialize};

/// Nom de la couche des zones côté provider
pub const ZONES_LAYER: &str = "zones";
/// Nom de la couche des emprises de bâtiments
pub const FOOTPRINTS_LAYER: &str = "footprints";
/// Nom de la couche des zones inondables
pub const FLOODPLAINS_LAYER: &str = "floodplains";

/// Presets embarqués
pub const PRESETS: [&str; 1] = ["cumberland"];

/// Configuration principale
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// CRS projeté de travail
    #[serde(default = "default_srid")]
    pub srid: u32,

    /// Longueur de l'unité du CRS en mètres (fallback PROJ uniquement)
    #[serde(default)]
    pub unit_meters: Option<f64>,

    /// Segments par cercle de buffer
    #[serde(default = "default_segments")]
    pub buffer_segments: usize,

    /// Blocs de recensement
    pub zones: ZoneConfig,

    /// Catégories de facilities vulnérables
    #[serde(default)]
    pub categories: Vec<CategoryConfig>,

    /// Test zone inondable (optionnel)
    #[serde(default)]
    pub floodplain: Option<FloodplainConfig>,

    /// Répertoire de résolution des chemins relatifs
    #[serde(skip)]
    base_dir: Option<PathBuf>,
}

/// Source GeoJSON
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LayerConfig {
    pub path: PathBuf,

    /// Propriété servant d'identifiant
    pub id_field: String,

    /// EPSG des coordonnées du fichier (défaut : CRS de travail)
    #[serde(default)]
    pub srid: Option<u32>,
}

/// Configuration des zones
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ZoneConfig {
    #[serde(flatten)]
    pub layer: LayerConfig,

    /// Propriété portant l'aire d'origine (sinon aire de la géométrie)
    #[serde(default)]
    pub area_field: Option<String>,

    /// Attributs extensifs à répartir
    pub attributes: Vec<String>,
}

/// Configuration d'une catégorie
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CategoryConfig {
    pub category: String,

    #[serde(flatten)]
    pub layer: LayerConfig,

    /// Modèle du nom des tables de sortie
    #[serde(default)]
    pub output_template: Option<String>,
}

/// Configuration du test zone inondable
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FloodplainConfig {
    pub footprints: LayerConfig,
    pub floodplains: LayerConfig,
}

fn default_srid() -> u32 {
    2272
}

fn default_segments() -> usize {
    riskradius::provider::planar::DEFAULT_SEGMENTS
}

impl Config {
    /// Charge une configuration depuis un fichier
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        let mut config: Self =
            serde_json::from_str(&content).context("Failed to parse config JSON")?;
        config.base_dir = path.parent().map(Path::to_path_buf);
        Ok(config)
    }

    /// Charge une configuration depuis un preset embarqué
    pub fn from_preset(preset: &str) -> Result<Self> {
        match preset {
            "cumberland" => Self::load_embedded(include_str!("presets/cumberland.json")),
            _ => anyhow::bail!("Unknown preset: {}. Use: {}", preset, PRESETS.join(", ")),
        }
    }

    /// Preset embarqué ou chemin vers un fichier JSON
    pub fn resolve(spec: &str) -> Result<Self> {
        if PRESETS.contains(&spec) {
            Self::from_preset(spec)
        } else {
            Self::load(Path::new(spec))
        }
    }

    fn load_embedded(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse embedded config")
    }

    /// Résout un chemin relatif au fichier de configuration
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Vérifie les valeurs avant tout chargement de données
    pub fn validate(&self) -> Result<()> {
        if self.buffer_segments < 8 {
            anyhow::bail!(
                "buffer_segments must be at least 8, got {}",
                self.buffer_segments
            );
        }
        self.extensive_attributes()?;
        self.category_descriptors()?;
        Ok(())
    }

    pub fn extensive_attributes(&self) -> Result<ExtensiveAttributes> {
        ExtensiveAttributes::new(self.zones.attributes.iter().map(String::as_str))
            .context("Invalid zones.attributes")
    }

    pub fn zone_source(&self) -> ZoneSource {
        let source = ZoneSource::new(ZONES_LAYER);
        match &self.zones.area_field {
            Some(field) => source.with_area_field(field),
            None => source,
        }
    }

    /// Descripteurs de catégories, dans l'ordre de la configuration
    pub fn category_descriptors(&self) -> Result<Vec<CategoryDescriptor>> {
        let mut descriptors: Vec<CategoryDescriptor> = Vec::with_capacity(self.categories.len());
        for entry in &self.categories {
            let category: FacilityCategory = entry
                .category
                .parse()
                .context(format!("Invalid category: '{}'", entry.category))?;
            if descriptors.iter().any(|d| d.category == category) {
                anyhow::bail!("Category {} is configured twice", category);
            }
            let template = entry
                .output_template
                .clone()
                .unwrap_or_else(|| DEFAULT_OUTPUT_TEMPLATE.to_string());
            descriptors.push(
                CategoryDescriptor::new(category.clone(), FeatureSource::new(category.name()))
                    .with_template(template),
            );
        }
        Ok(descriptors)
    }

    pub fn floodplain_sources(&self) -> Option<FloodplainSources> {
        self.floodplain.as_ref().map(|_| FloodplainSources {
            footprints: FeatureSource::new(FOOTPRINTS_LAYER),
            floodplains: FeatureSource::new(FLOODPLAINS_LAYER),
        })
    }

    /// Couches à charger : (nom côté provider, configuration)
    pub fn layers(&self) -> Result<Vec<(String, &LayerConfig)>> {
        let mut layers = vec![(ZONES_LAYER.to_string(), &self.zones.layer)];
        for (descriptor, entry) in self.category_descriptors()?.iter().zip(&self.categories) {
            layers.push((descriptor.source.layer.clone(), &entry.layer));
        }
        if let Some(floodplain) = &self.floodplain {
            layers.push((FOOTPRINTS_LAYER.to_string(), &floodplain.footprints));
            layers.push((FLOODPLAINS_LAYER.to_string(), &floodplain.floodplains));
        }
        Ok(layers)
    }
}

/// Réglages d'exécution lus dans l'environnement (`.env` compris)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSettings {
    /// Threads du pool (SARA_JOBS)
    pub jobs: Option<usize>,
    /// Segments par cercle (SARA_SEGMENTS)
    pub segments: Option<usize>,
    /// Preset ou chemin de configuration (SARA_CONFIG)
    pub config: Option<String>,
}

impl RunSettings {
    /// Charge les réglages depuis les variables d'environnement
    pub fn from_env() -> Self {
        Self {
            jobs: std::env::var("SARA_JOBS").ok().and_then(|s| s.parse().ok()),
            segments: std::env::var("SARA_SEGMENTS")
                .ok()
                .and_then(|s| s.parse().ok()),
            config: std::env::var("SARA_CONFIG").ok().filter(|s| !s.is_empty()),
        }
    }

    /// Les options CLI priment sur l'environnement
    pub fn with_overrides(
        self,
        jobs: Option<usize>,
        segments: Option<usize>,
        config: Option<String>,
    ) -> Self {
        Self {
            jobs: jobs.or(self.jobs),
            segments: segments.or(self.segments),
            config: config.or(self.config),
        }
    }

    /// Preset ou chemin effectif
    pub fn config_spec(&self) -> &str {
        self.config.as_deref().unwrap_or("cumberland")
    }
}
