//! Modules d'export (GeoJSON, tables CSV, fichier de résultats)

pub mod geojson;
pub mod output_dir;
pub mod reproject;
pub mod tables;

pub use output_dir::OutputLock;
pub use reproject::Reprojector;

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use riskradius::{ReportFormatter, RunOutcome, TaskStatus};
use tracing::{debug, info};

use crate::report::RunReport;
use crate::sources::{InputFingerprint, LoadedLayer, PropertyTable};

/// Sous-répertoire des tables de facilities vulnérables
pub const FACILITIES_DIR: &str = "Vulnerable Facilities Analysis Results";
/// Nom du rapport JSON
pub const REPORT_FILE: &str = "report.json";

/// Nom du GeoJSON des rayons
pub fn rings_file_name(patts: &str) -> String {
    format!("RiskRadii_PATTS_{}.geojson", patts)
}

/// Nom du fichier de résultats texte
pub fn results_file_name(patts: &str) -> String {
    format!("SARA_Results_PATTS_{}.txt", patts)
}

/// Écrit tous les fichiers d'un run dans un répertoire
pub struct FileFormatter {
    output_dir: PathBuf,
    tables: HashMap<String, PropertyTable>,
    fingerprints: Vec<InputFingerprint>,
    zone_tables: bool,
    started: Option<Instant>,
}

impl FileFormatter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            tables: HashMap::new(),
            fingerprints: Vec::new(),
            zone_tables: false,
            started: None,
        }
    }

    /// Reprend les tables de propriétés et empreintes des couches chargées
    pub fn with_layers(mut self, layers: &[LoadedLayer]) -> Self {
        for layer in layers {
            self.tables.insert(layer.name.clone(), layer.table.clone());
            self.fingerprints.push(layer.fingerprint.clone());
        }
        self
    }

    /// Ajoute une table de propriétés pour une couche
    pub fn with_table(mut self, layer: impl Into<String>, table: PropertyTable) -> Self {
        self.tables.insert(layer.into(), table);
        self
    }

    /// Écrit aussi le détail par zone de chaque rayon
    pub fn with_zone_tables(mut self, enabled: bool) -> Self {
        self.zone_tables = enabled;
        self
    }

    /// Début du run, pour la durée du rapport
    pub fn with_start(mut self, started: Instant) -> Self {
        self.started = Some(started);
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn write_all(&self, outcome: &RunOutcome, lock: &OutputLock) -> Result<RunReport> {
        let patts = outcome.facility.patts_id();
        let mut report = RunReport::from_outcome(outcome);
        report.inputs = self.fingerprints.clone();
        if let Some(started) = self.started {
            report.set_duration(started.elapsed());
        }

        // Rayons
        let name = rings_file_name(patts);
        geojson::export_rings(
            &outcome.facility,
            &outcome.rings,
            outcome.srid,
            None,
            &lock.file(&name)?,
        )?;
        report.record_output(name);

        // Population par rayon
        for summary in &outcome.summaries {
            if matches!(
                summary.status,
                TaskStatus::Failed { .. } | TaskStatus::Cancelled
            ) {
                debug!(ring = summary.ring_index + 1, "No population table for ring");
                continue;
            }
            let name = tables::population_table_name(patts, summary);
            tables::write_population_table(&lock.file(&name)?, summary, &outcome.attributes)?;
            report.record_output(name);

            if self.zone_tables {
                let name = format!(
                    "EstCensusPop_PATTS_{}_{}_{}_Zones.csv",
                    patts,
                    summary.distance.file_token(),
                    summary.distance.unit.label()
                );
                tables::write_zone_table(&lock.file(&name)?, summary, &outcome.attributes)?;
                report.record_output(name);
            }
        }

        // Facilities vulnérables
        let empty = PropertyTable::default();
        for found in outcome.matches.iter().filter(|m| !m.matched.is_empty()) {
            let (Some(descriptor), Some(ring)) =
                (outcome.descriptor(found), outcome.ring(found.ring_index))
            else {
                continue;
            };
            let table = self.tables.get(&descriptor.source.layer).unwrap_or(&empty);
            let relative = Path::new(FACILITIES_DIR)
                .join(format!("{}.csv", descriptor.output_name(&outcome.facility, ring)));
            let rows = tables::write_feature_table(&lock.file(&relative)?, &found.matched, table)?;
            debug!(file = %relative.display(), rows, "Facility table written");
            report.record_output(relative.display().to_string());
        }

        // Résultats texte
        let name = results_file_name(patts);
        write_results_text(&lock.file(&name)?, outcome)?;
        report.record_output(name);

        report.record_output(REPORT_FILE);
        report.save_to_file(&lock.file(REPORT_FILE)?)?;

        Ok(report)
    }

    /// Écrit le rapport d'un run abandonné
    pub fn write_failure(&self, report: &mut RunReport) -> Result<()> {
        let lock = OutputLock::acquire(&self.output_dir)?;
        report.inputs = self.fingerprints.clone();
        if let Some(started) = self.started {
            report.set_duration(started.elapsed());
        }
        report.record_output(REPORT_FILE);
        report.save_to_file(&lock.file(REPORT_FILE)?)?;
        Ok(())
    }
}

impl ReportFormatter for FileFormatter {
    type Output = RunReport;
    type Error = anyhow::Error;

    fn write(&self, outcome: &RunOutcome) -> Result<RunReport> {
        let lock = OutputLock::acquire(&self.output_dir)?;
        let report = self
            .write_all(outcome, &lock)
            .context(format!("Failed to write outputs to {}", lock.dir().display()))?;
        info!(
            dir = %self.output_dir.display(),
            files = report.outputs.len(),
            "Outputs written"
        );
        Ok(report)
    }
}

/// Fichier texte remis à l'utilisateur : messages du run et zone inondable
fn write_results_text(path: &Path, outcome: &RunOutcome) -> Result<()> {
    let file = File::create(path).context(format!("Failed to create file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    let facility = &outcome.facility;

    writeln!(writer, "SARA Facility Analysis")?;
    writeln!(writer, "PATTS: {}", facility.patts_id())?;
    writeln!(writer, "Name: {}", facility.name())?;
    if !facility.address().is_empty() {
        writeln!(writer, "Address: {}", facility.address())?;
    }
    writeln!(
        writer,
        "Location: {:.6}, {:.6} (EPSG:{} {:.2}, {:.2})",
        facility.latitude(),
        facility.longitude(),
        outcome.srid,
        outcome.site.x(),
        outcome.site.y()
    )?;
    writeln!(writer)?;

    for message in outcome.messages.messages() {
        writeln!(writer, "{}", message)?;
    }

    if let Some(floodplain) = &outcome.floodplain {
        writeln!(writer)?;
        writeln!(writer, "Floodplain: {}", floodplain.message(facility))?;
    }

    writer.flush()?;
    Ok(())
}
