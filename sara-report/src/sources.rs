//! Chargement des couches GeoJSON
//!
//! Chaque fichier devient une couche du provider planaire : géométries dans
//! le CRS de travail, attributs numériques pour la répartition, et table de
//! propriétés complète pour les exports tabulaires.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use geo::{Coord, Geometry, MapCoords};
use geojson::{FeatureCollection, GeoJson};
use rayon::prelude::*;
use riskradius::{FeatureId, Projector, SourceFeature, WGS84};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{Config, LayerConfig};
use crate::export::reproject::Reprojector;

/// Erreurs de lecture d'une source
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid GeoJSON in {path}: {source}")]
    GeoJson {
        path: PathBuf,
        #[source]
        source: geojson::Error,
    },

    #[error("{path}: feature #{index} has no geometry")]
    MissingGeometry { path: PathBuf, index: usize },

    #[error("{path}: feature #{index} has no '{field}' property")]
    MissingId {
        path: PathBuf,
        index: usize,
        field: String,
    },

    #[error("{path}: identifier '{id}' is not unique")]
    DuplicateId { path: PathBuf, id: FeatureId },

    #[error("{path}: feature '{id}' cannot be projected: {reason}")]
    Projection {
        path: PathBuf,
        id: FeatureId,
        reason: String,
    },
}

/// Propriétés des features d'une couche, pour l'export tabulaire
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyTable {
    /// Colonnes dans l'ordre de première apparition
    pub columns: Vec<String>,
    rows: HashMap<FeatureId, Vec<String>>,
}

impl PropertyTable {
    pub(crate) fn insert(&mut self, id: FeatureId, properties: &serde_json::Map<String, Value>) {
        for key in properties.keys() {
            if !self.columns.contains(key) {
                self.columns.push(key.clone());
            }
        }
        let row = self
            .columns
            .iter()
            .map(|c| properties.get(c).map(value_to_text).unwrap_or_default())
            .collect();
        self.rows.insert(id, row);
    }

    /// Valeurs d'une feature, alignées sur `columns`
    pub fn row(&self, id: &str) -> Option<Vec<&str>> {
        self.rows.get(id).map(|row| {
            (0..self.columns.len())
                .map(|i| row.get(i).map(String::as_str).unwrap_or(""))
                .collect()
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Empreinte d'un fichier d'entrée
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputFingerprint {
    pub layer: String,
    pub path: String,
    pub blake3: String,
}

/// Couche chargée
#[derive(Debug, Clone)]
pub struct LoadedLayer {
    pub name: String,
    pub features: Vec<SourceFeature>,
    pub table: PropertyTable,
    pub fingerprint: InputFingerprint,
}

/// Charge toutes les couches de la configuration en parallèle
pub fn load_layers(config: &Config, projector: &dyn Projector) -> Result<Vec<LoadedLayer>> {
    let layers = config.layers()?;
    info!(layers = layers.len(), "Loading source layers");

    layers
        .par_iter()
        .map(|(name, layer)| {
            let path = config.resolve_path(&layer.path);
            load_layer(name, &path, layer, config.srid, projector)
                .with_context(|| format!("Failed to load layer {}", name))
        })
        .collect()
}

/// Charge une couche GeoJSON et la ramène dans le CRS de travail
pub fn load_layer(
    name: &str,
    path: &Path,
    layer: &LayerConfig,
    working_srid: u32,
    projector: &dyn Projector,
) -> Result<LoadedLayer> {
    let fingerprint = InputFingerprint {
        layer: name.to_string(),
        path: path.display().to_string(),
        blake3: compute_file_checksum(path)?,
    };

    let text = std::fs::read_to_string(path).map_err(|source| SourceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let collection = parse_collection(&text, path)?;

    let source_srid = layer.srid.unwrap_or(working_srid);
    let reprojector = if source_srid == working_srid || source_srid == WGS84 {
        None
    } else {
        Some(Reprojector::new(source_srid, working_srid)?)
    };

    let mut features = Vec::with_capacity(collection.features.len());
    let mut table = PropertyTable::default();

    for (index, feature) in collection.features.into_iter().enumerate() {
        let properties = feature.properties.unwrap_or_default();
        let id = properties
            .get(&layer.id_field)
            .filter(|v| !v.is_null())
            .map(value_to_text)
            .ok_or_else(|| SourceError::MissingId {
                path: path.to_path_buf(),
                index,
                field: layer.id_field.clone(),
            })?;
        if table.rows.contains_key(&id) {
            return Err(SourceError::DuplicateId {
                path: path.to_path_buf(),
                id,
            }
            .into());
        }

        let geometry = feature.geometry.ok_or_else(|| SourceError::MissingGeometry {
            path: path.to_path_buf(),
            index,
        })?;
        let geometry = Geometry::<f64>::try_from(geometry).map_err(|source| {
            SourceError::GeoJson {
                path: path.to_path_buf(),
                source,
            }
        })?;

        let geometry = if source_srid == working_srid {
            geometry
        } else if let Some(reprojector) = &reprojector {
            reprojector.transform_geometry(&geometry)?
        } else {
            project_geometry(&geometry, projector).map_err(|e| SourceError::Projection {
                path: path.to_path_buf(),
                id: id.clone(),
                reason: e.to_string(),
            })?
        };

        let mut source_feature = SourceFeature::new(id.clone(), geometry);
        for (key, value) in &properties {
            if let Some(number) = value_to_number(value) {
                source_feature = source_feature.with_attribute(key.clone(), number);
            }
        }

        table.insert(id, &properties);
        features.push(source_feature);
    }

    debug!(layer = name, features = features.len(), "Layer loaded");
    Ok(LoadedLayer {
        name: name.to_string(),
        features,
        table,
        fingerprint,
    })
}

fn parse_collection(text: &str, path: &Path) -> Result<FeatureCollection, SourceError> {
    let geojson: GeoJson = text.parse().map_err(|source| SourceError::GeoJson {
        path: path.to_path_buf(),
        source,
    })?;
    FeatureCollection::try_from(geojson).map_err(|source| SourceError::GeoJson {
        path: path.to_path_buf(),
        source,
    })
}

/// Projette une géométrie WGS84 dans le CRS du projector
pub fn project_geometry(
    geometry: &Geometry<f64>,
    projector: &dyn Projector,
) -> Result<Geometry<f64>, riskradius::RiskRadiusError> {
    geometry.try_map_coords(|coord| {
        let (x, y) = projector.project(coord.x, coord.y)?;
        Ok(Coord { x, y })
    })
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn value_to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok().filter(|v: &f64| v.is_finite()),
        _ => None,
    }
}

/// Calcule le checksum blake3 d'un fichier
pub fn compute_file_checksum(path: &Path) -> Result<String> {
    let mut file = File::open(path).with_context(|| format!("Cannot open {}", path.display()))?;
    let mut hasher = blake3::Hasher::new();
    let mut buffer = [0u8; 65536]; // 64KB buffer

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hasher.finalize().to_hex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use riskradius::LiteProjector;

    const BLOCKS: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature",
             "properties": {"GEOID10": "420410001001000", "POP10": 50, "NAME": "Block 1000"},
             "geometry": {"type": "Polygon", "coordinates": [[[0,0],[10,0],[10,10],[0,10],[0,0]]]}},
            {"type": "Feature",
             "properties": {"GEOID10": 420410001001001, "POP10": "80", "DENSITY": null},
             "geometry": {"type": "Polygon", "coordinates": [[[10,0],[20,0],[20,10],[10,10],[10,0]]]}}
        ]
    }"#;

    fn layer_config(id_field: &str, srid: Option<u32>) -> LayerConfig {
        LayerConfig {
            path: PathBuf::from("blocks.geojson"),
            id_field: id_field.to_string(),
            srid,
        }
    }

    fn write_temp(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_layer() {
        let path = write_temp("sara_blocks_test.geojson", BLOCKS);
        let projector = LiteProjector::new(2272).unwrap();

        let layer = load_layer("zones", &path, &layer_config("GEOID10", None), 2272, &projector)
            .unwrap();

        assert_eq!(layer.features.len(), 2);
        assert_eq!(layer.features[0].id, "420410001001000");
        assert_eq!(layer.features[0].attributes["POP10"], 50.0);
        // Identifiant numérique et valeur texte convertis
        assert_eq!(layer.features[1].id, "420410001001001");
        assert_eq!(layer.features[1].attributes["POP10"], 80.0);
        assert!(!layer.features[1].attributes.contains_key("DENSITY"));

        assert_eq!(layer.table.columns, vec!["GEOID10", "NAME", "POP10", "DENSITY"]);
        assert_eq!(
            layer.table.row("420410001001000").unwrap(),
            vec!["420410001001000", "Block 1000", "50", ""]
        );
        assert_eq!(layer.fingerprint.blake3.len(), 64);

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_missing_id_field() {
        let path = write_temp("sara_blocks_noid.geojson", BLOCKS);
        let projector = LiteProjector::new(2272).unwrap();

        let err = load_layer("zones", &path, &layer_config("BLOCKID", None), 2272, &projector)
            .unwrap_err();
        assert!(err.to_string().contains("BLOCKID"), "{err}");

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_wgs84_layer_is_projected() {
        let schools = r#"{"type": "FeatureCollection", "features": [
            {"type": "Feature", "properties": {"OBJECTID": 1},
             "geometry": {"type": "Point", "coordinates": [-77.1901, 40.2015]}}
        ]}"#;
        let path = write_temp("sara_schools_test.geojson", schools);
        let projector = LiteProjector::new(2272).unwrap();

        let layer = load_layer(
            "Schools",
            &path,
            &layer_config("OBJECTID", Some(4326)),
            2272,
            &projector,
        )
        .unwrap();

        match &layer.features[0].geometry {
            Geometry::Point(p) => {
                assert!((p.x() - 2_124_895.3).abs() < 1.0);
                assert!((p.y() - 316_756.6).abs() < 1.0);
            }
            other => panic!("unexpected {other:?}"),
        }

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let dup = r#"{"type": "FeatureCollection", "features": [
            {"type": "Feature", "properties": {"OBJECTID": 1}, "geometry": {"type": "Point", "coordinates": [0, 0]}},
            {"type": "Feature", "properties": {"OBJECTID": 1}, "geometry": {"type": "Point", "coordinates": [1, 1]}}
        ]}"#;
        let path = write_temp("sara_dup_test.geojson", dup);
        let projector = LiteProjector::new(2272).unwrap();

        let err = load_layer("x", &path, &layer_config("OBJECTID", None), 2272, &projector)
            .unwrap_err();
        assert!(err.to_string().contains("not unique"), "{err}");

        std::fs::remove_file(path).ok();
    }
}
