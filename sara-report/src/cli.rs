//! Définition et implémentation des commandes CLI
//!
//! - défaut : rapport SARA complet d'une facility
//! - `rings` : rayons de risque seuls, en GeoJSON

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use regex::Regex;
use riskradius::{
    execute, CancelToken, LinearUnit, PlanarProvider, Projector, ReportFormatter, RingBuilder,
    RingDistance, RunOptions, RunParameters,
};
use sara_report::config::{Config, RunSettings};
use sara_report::export::{geojson, FileFormatter, Reprojector};
use sara_report::projection::SmartProjector;
use sara_report::report::{ErrorLevel, RunError, RunReport};
use sara_report::sources::load_layers;
use tracing::{info, warn};

/// Distance suivie d'une unité : "1 mile", "0.5mi", "1500 feet"
const RING_PATTERN: &str = r"^\s*(-?\d+(?:\.\d+)?)\s*([A-Za-z][A-Za-z_ ]*?)\s*$";

#[derive(Subcommand)]
pub enum Commands {
    /// Build the risk radii only and write them as GeoJSON
    Rings {
        #[command(flatten)]
        facility: FacilityArgs,

        #[command(flatten)]
        rings: RingArgs,

        /// Output GeoJSON file
        #[arg(short, long)]
        output: PathBuf,

        /// Output SRID (default: working SRID of the config)
        #[arg(long)]
        srid: Option<u32>,

        /// Config preset name (cumberland) or path to a JSON config
        #[arg(long)]
        config: Option<String>,

        /// Segments per buffer circle
        #[arg(long)]
        segments: Option<usize>,
    },
}

/// Identification et position de la facility
#[derive(Args, Debug, Clone)]
pub struct FacilityArgs {
    /// PATTS identifier of the facility
    #[arg(long)]
    pub patts: String,

    /// Facility name
    #[arg(long)]
    pub name: String,

    /// Street address
    #[arg(long, default_value = "")]
    pub address: String,

    /// Latitude in decimal degrees (WGS84)
    #[arg(long, allow_negative_numbers = true)]
    pub lat: f64,

    /// Longitude in decimal degrees (WGS84)
    #[arg(long, allow_negative_numbers = true)]
    pub lon: f64,
}

/// Distances des rayons
#[derive(Args, Debug, Clone)]
pub struct RingArgs {
    /// Ring distances separated by ',' or ';' (e.g., 0.5,1,2)
    #[arg(long, conflicts_with = "ring")]
    pub distances: Option<String>,

    /// Unit of --distances (feet, yards, miles, nautical_miles, meters, kilometers)
    #[arg(long, default_value = "miles")]
    pub units: String,

    /// One ring with its unit, repeatable (e.g., --ring "1 mile" --ring "3 miles")
    #[arg(long, allow_hyphen_values = true)]
    pub ring: Vec<String>,
}

impl RingArgs {
    /// Distances demandées, dans l'ordre saisi
    pub fn resolve(&self) -> Result<Vec<RingDistance>> {
        if !self.ring.is_empty() {
            return self.ring.iter().map(|r| parse_ring(r)).collect();
        }
        match &self.distances {
            Some(list) => parse_distances(list, &self.units),
            None => anyhow::bail!("No ring distance given. Use --distances or --ring"),
        }
    }
}

/// Arguments du rapport complet (commande par défaut)
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub facility: FacilityArgs,

    #[command(flatten)]
    pub rings: RingArgs,

    /// Output directory
    #[arg(short, long)]
    pub output: PathBuf,

    /// Config preset name (cumberland) or path to a JSON config
    /// (default: env SARA_CONFIG / cumberland)
    #[arg(long)]
    pub config: Option<String>,

    /// Worker threads (default: env SARA_JOBS / available cores)
    #[arg(long, alias = "threads")]
    pub jobs: Option<usize>,

    /// Segments per buffer circle (default: env SARA_SEGMENTS / config)
    #[arg(long)]
    pub segments: Option<usize>,

    /// Also write the per-zone apportionment table of each ring
    #[arg(long)]
    pub zone_tables: bool,
}

/// Exécute le rapport complet
pub fn cmd_run(args: &RunArgs) -> Result<RunReport> {
    let started = Instant::now();
    let settings = RunSettings::from_env().with_overrides(
        args.jobs,
        args.segments,
        args.config.clone(),
    );
    let facility = &args.facility;
    let formatter = FileFormatter::new(&args.output).with_start(started);

    let rings = match args.rings.resolve() {
        Ok(rings) => rings,
        Err(e) => return fail(&formatter, facility, e),
    };
    let params = RunParameters {
        patts_id: facility.patts.clone(),
        name: facility.name.clone(),
        address: facility.address.clone(),
        latitude: facility.lat,
        longitude: facility.lon,
        rings,
    };
    // Paramètres invalides : aucune donnée chargée
    if let Err(e) = params.validate() {
        return fail(&formatter, facility, e.into());
    }

    let config = Config::resolve(settings.config_spec())
        .context(format!("Failed to load config '{}'", settings.config_spec()))?;
    config.validate()?;
    let segments = settings.segments.unwrap_or(config.buffer_segments);

    let projector = SmartProjector::new(config.srid, config.unit_meters)?;
    info!(
        srid = config.srid,
        projection = projector.description(),
        segments,
        "Working CRS"
    );

    let layers = load_layers(&config, &projector)?;
    let formatter = formatter
        .with_layers(&layers)
        .with_zone_tables(args.zone_tables);

    let mut provider = PlanarProvider::new(Box::new(projector)).with_segments(segments);
    for layer in layers {
        info!(layer = %layer.name, features = layer.features.len(), "Layer ready");
        provider.add_layer(layer.name, layer.features);
    }

    let options = RunOptions {
        jobs: settings.jobs.unwrap_or(0),
        zones: config.zone_source(),
        attributes: config.extensive_attributes()?,
        categories: config.category_descriptors()?,
        floodplain: config.floodplain_sources(),
    };

    let cancel = CancelToken::new();
    match execute(&params, &options, &provider, &cancel) {
        Ok(outcome) => {
            let report = formatter.write(&outcome)?;
            info!("{}", report.summary());
            Ok(report)
        }
        Err(e) => {
            let mut report = RunReport::failed(&facility.patts, &facility.name, &e);
            if let Err(write_err) = formatter.write_failure(&mut report) {
                warn!(error = %write_err, "Failed to write failure report");
            }
            report.display();
            Err(e.into())
        }
    }
}

/// Rapport d'échec avant tout chargement, puis propagation de l'erreur
fn fail(
    formatter: &FileFormatter,
    facility: &FacilityArgs,
    error: anyhow::Error,
) -> Result<RunReport> {
    let mut report = RunReport::new(&facility.patts, &facility.name);
    report.record_error(RunError {
        level: ErrorLevel::Fatal,
        ring: None,
        unit: None,
        message: error.to_string(),
    });
    report.finalize();
    if let Err(write_err) = formatter.write_failure(&mut report) {
        warn!(error = %write_err, "Failed to write failure report");
    }
    report.display();
    Err(error)
}

/// Exécute la commande rings
pub fn cmd_rings(
    facility: &FacilityArgs,
    rings: &RingArgs,
    output: &Path,
    target_srid: Option<u32>,
    config_spec: Option<&str>,
    segments: Option<usize>,
) -> Result<()> {
    let settings =
        RunSettings::from_env().with_overrides(None, segments, config_spec.map(String::from));
    let config = Config::resolve(settings.config_spec())
        .context(format!("Failed to load config '{}'", settings.config_spec()))?;
    let segments = settings.segments.unwrap_or(config.buffer_segments);

    let params = RunParameters {
        patts_id: facility.patts.clone(),
        name: facility.name.clone(),
        address: facility.address.clone(),
        latitude: facility.lat,
        longitude: facility.lon,
        rings: rings.resolve()?,
    };
    let (facility, spec) = params.validate()?;

    let projector = SmartProjector::new(config.srid, config.unit_meters)?;
    let provider = PlanarProvider::new(Box::new(projector)).with_segments(segments);
    let built = RingBuilder::build(&facility, &spec, &provider)
        .context(format!("Failed to build risk radii for PATTS {}", facility.patts_id()))?;

    let reprojector = match target_srid {
        Some(srid) if srid != built.srid => Some(Reprojector::new(built.srid, srid)?),
        _ => None,
    };

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    geojson::export_rings(&facility, &built.rings, built.srid, reprojector.as_ref(), output)?;

    info!(
        patts = %facility.patts_id(),
        rings = built.rings.len(),
        output = %output.display(),
        "SARA Risk Radii created"
    );
    Ok(())
}

/// Parse un rayon "valeur unité"
fn parse_ring(text: &str) -> Result<RingDistance> {
    let pattern = Regex::new(RING_PATTERN)?;
    let caps = pattern.captures(text).ok_or_else(|| {
        anyhow::anyhow!(
            "Invalid ring: '{}'. Expected a distance and a unit (e.g., \"1 mile\")",
            text
        )
    })?;
    let value: f64 = caps[1]
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid distance in ring: '{}'", text))?;
    let unit: LinearUnit = caps[2].parse()?;
    Ok(RingDistance::new(value, unit))
}

/// Parse une liste de distances dans une même unité
fn parse_distances(list: &str, units: &str) -> Result<Vec<RingDistance>> {
    let unit: LinearUnit = units.parse()?;
    list.split([',', ';'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<f64>()
                .map(|value| RingDistance::new(value, unit))
                .map_err(|_| anyhow::anyhow!("Invalid distance: '{}'", s))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ring() {
        assert_eq!(
            parse_ring("1 mile").unwrap(),
            RingDistance::new(1.0, LinearUnit::Miles)
        );
        assert_eq!(
            parse_ring("0.5mi").unwrap(),
            RingDistance::new(0.5, LinearUnit::Miles)
        );
        assert_eq!(
            parse_ring(" 1500 Feet ").unwrap(),
            RingDistance::new(1500.0, LinearUnit::Feet)
        );
        assert_eq!(
            parse_ring("2 nautical miles").unwrap(),
            RingDistance::new(2.0, LinearUnit::NauticalMiles)
        );
    }

    #[test]
    fn test_parse_ring_keeps_negative_for_validation() {
        assert_eq!(parse_ring("-1 mile").unwrap().value, -1.0);
    }

    #[test]
    fn test_parse_ring_invalid() {
        assert!(parse_ring("mile").is_err());
        assert!(parse_ring("1").is_err());
        assert!(parse_ring("1 parsec").is_err());
        assert!(parse_ring("").is_err());
    }

    #[test]
    fn test_parse_distances() {
        let rings = parse_distances("0.5, 1;2", "km").unwrap();
        assert_eq!(rings.len(), 3);
        assert_eq!(rings[0], RingDistance::new(0.5, LinearUnit::Kilometers));
        assert_eq!(rings[2].value, 2.0);

        assert!(parse_distances("1,x", "miles").is_err());
        assert!(parse_distances("1", "furlongs").is_err());
    }

    #[test]
    fn test_ring_args_resolve() {
        let args = RingArgs {
            distances: None,
            units: "miles".into(),
            ring: vec!["1 mile".into(), "500 feet".into()],
        };
        let rings = args.resolve().unwrap();
        assert_eq!(rings[1], RingDistance::new(500.0, LinearUnit::Feet));

        let none = RingArgs {
            distances: None,
            units: "miles".into(),
            ring: vec![],
        };
        assert!(none.resolve().is_err());
    }

    #[test]
    fn test_cmd_rings_writes_geojson() {
        let output = std::env::temp_dir().join("sara_cli_rings_test.geojson");
        let facility = FacilityArgs {
            patts: "1234".into(),
            name: "Acme Chemical".into(),
            address: String::new(),
            lat: 40.2015,
            lon: -77.1901,
        };
        let rings = RingArgs {
            distances: Some("0.5,1".into()),
            units: "miles".into(),
            ring: vec![],
        };

        cmd_rings(&facility, &rings, &output, None, Some("cumberland"), Some(16)).unwrap();

        let content = std::fs::read_to_string(&output).unwrap();
        assert!(content.contains("EPSG::2272"));
        assert!(content.contains(r#""id":"1234_2""#));

        std::fs::remove_file(output).ok();
    }
}
