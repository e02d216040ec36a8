//! # sara-report
//!
//! Rapport SARA d'une installation à risque : rayons de risque, estimation de
//! la population recensée et facilities vulnérables dans chaque rayon.
//!
//! ## Features
//!
//! - Couches GeoJSON chargées en parallèle, empreintes blake3
//! - Projection WGS84 → State Plane en Rust pur, PROJ en option
//! - Export GeoJSON des rayons, tables CSV, fichier de résultats, rapport JSON
//! - CLI simple
//!
//! ## Usage CLI
//!
//! ```bash
//! # Rapport complet (preset cumberland)
//! sara-report --patts 1234 --name "Acme Chemical" --lat 40.2015 --lon -77.1901 \
//!     --distances 0.5,1,2 --units miles --output ./out/
//!
//! # Rayons seuls en GeoJSON
//! sara-report rings --patts 1234 --name "Acme Chemical" --lat 40.2015 --lon -77.1901 \
//!     --ring "1 mile" --ring "3 miles" --output ./rings.geojson
//! ```

pub mod config;
pub mod export;
pub mod projection;
pub mod report;
pub mod sources;

pub use config::{Config, RunSettings};
pub use export::FileFormatter;
pub use projection::SmartProjector;
pub use report::{RunReport, RunStatus};
pub use sources::{load_layers, LoadedLayer};
