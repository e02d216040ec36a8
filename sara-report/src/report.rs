//! Rapport de run avec graceful degradation
//!
//! Ce module collecte les résultats d'un run (rayons, catégories, zone
//! inondable) et les erreurs/warnings associés, pour l'affichage console et
//! la sauvegarde en JSON.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use riskradius::{FloodplainOutcome, RiskRadiusError, RunOutcome, TaskStatus};
use serde::Serialize;

use crate::sources::InputFingerprint;

/// Statut global du run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunStatus {
    /// Tous les rayons et catégories ont réussi sans warning
    Success,
    /// Run terminé avec des unités en échec ou en warning
    PartialSuccess,
    /// Run abandonné ou aucune unité réussie
    Failed,
}

/// Niveau de sévérité des erreurs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorLevel {
    /// Erreur fatale : run abandonné
    Fatal,
    /// Erreur : unité (rayon, catégorie, zone) en échec
    Error,
}

/// Erreur de run avec contexte
#[derive(Debug, Clone, Serialize)]
pub struct RunError {
    pub level: ErrorLevel,
    /// Rayon concerné (1-based)
    pub ring: Option<usize>,
    /// Unité concernée (zone, catégorie...)
    pub unit: Option<String>,
    pub message: String,
}

/// Warning de run
#[derive(Debug, Clone, Serialize)]
pub struct RunWarning {
    pub ring: Option<usize>,
    pub message: String,
}

/// Ligne de résultat d'un rayon
#[derive(Debug, Clone, Serialize)]
pub struct RingLine {
    /// Numéro du rayon (1-based)
    pub ring: usize,
    pub distance: String,
    pub status: String,
    pub zones: usize,
    pub totals: BTreeMap<String, u64>,
}

/// Ligne de résultat d'une catégorie sur un rayon
#[derive(Debug, Clone, Serialize)]
pub struct CategoryLine {
    pub ring: usize,
    pub category: String,
    pub output_name: String,
    pub matched: usize,
    pub status: String,
}

/// Rapport complet d'un run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub patts_id: String,
    pub facility_name: String,
    pub duration_secs: f64,
    pub status: RunStatus,
    /// SRID de travail
    pub srid: Option<u32>,

    pub rings: Vec<RingLine>,
    pub categories: Vec<CategoryLine>,
    pub floodplain: Option<String>,

    pub errors: Vec<RunError>,
    pub warnings: Vec<RunWarning>,

    /// Empreintes des données d'entrée
    pub inputs: Vec<InputFingerprint>,
    /// Fichiers produits, relatifs au répertoire de sortie
    pub outputs: Vec<String>,
}

impl Default for RunReport {
    fn default() -> Self {
        Self {
            patts_id: String::new(),
            facility_name: String::new(),
            duration_secs: 0.0,
            status: RunStatus::Success,
            srid: None,
            rings: Vec::new(),
            categories: Vec::new(),
            floodplain: None,
            errors: Vec::new(),
            warnings: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }
}

impl RunReport {
    /// Crée un rapport vide pour une facility
    pub fn new(patts_id: &str, facility_name: &str) -> Self {
        Self {
            patts_id: patts_id.to_string(),
            facility_name: facility_name.to_string(),
            ..Default::default()
        }
    }

    /// Construit le rapport d'un run terminé
    pub fn from_outcome(outcome: &RunOutcome) -> Self {
        let mut report = Self::new(outcome.facility.patts_id(), outcome.facility.name());
        report.srid = Some(outcome.srid);

        for summary in &outcome.summaries {
            let ring = summary.ring_index + 1;
            report.rings.push(RingLine {
                ring,
                distance: summary.distance.to_string(),
                status: summary.status.to_string(),
                zones: summary.zones.len(),
                totals: summary.totals.clone(),
            });
            for issue in &summary.issues {
                report.record_error(RunError {
                    level: ErrorLevel::Error,
                    ring: Some(ring),
                    unit: Some(format!("zone {}", issue.zone_id)),
                    message: issue.reason.clone(),
                });
            }
            // Les zones écartées sont déjà comptées comme erreurs
            let status = match &summary.status {
                TaskStatus::SucceededWithWarnings { warnings } => {
                    TaskStatus::SucceededWithWarnings {
                        warnings: warnings
                            .iter()
                            .filter(|w| !summary.issues.iter().any(|i| &i.reason == *w))
                            .cloned()
                            .collect(),
                    }
                }
                other => other.clone(),
            };
            report.record_status(ring, &format!("ring {}", summary.distance), &status);
        }

        for found in &outcome.matches {
            let ring = found.ring_index + 1;
            let output_name = match (outcome.descriptor(found), outcome.ring(found.ring_index)) {
                (Some(descriptor), Some(risk_ring)) => {
                    descriptor.output_name(&outcome.facility, risk_ring)
                }
                _ => String::new(),
            };
            report.categories.push(CategoryLine {
                ring,
                category: found.category.name().to_string(),
                output_name,
                matched: found.count(),
                status: found.status.to_string(),
            });
            report.record_status(ring, found.category.name(), &found.status);
        }

        if let Some(floodplain) = &outcome.floodplain {
            let message = floodplain.message(&outcome.facility);
            match floodplain {
                FloodplainOutcome::Failed { .. } => report.record_error(RunError {
                    level: ErrorLevel::Error,
                    ring: None,
                    unit: Some("floodplain".to_string()),
                    message: message.clone(),
                }),
                other if other.is_warning() => report.record_warning(RunWarning {
                    ring: None,
                    message: message.clone(),
                }),
                _ => {}
            }
            report.floodplain = Some(message);
        }

        report.finalize();
        report
    }

    /// Rapport d'un run abandonné sur erreur fatale
    pub fn failed(patts_id: &str, facility_name: &str, error: &RiskRadiusError) -> Self {
        let mut report = Self::new(patts_id, facility_name);
        report.record_error(RunError {
            level: ErrorLevel::Fatal,
            ring: None,
            unit: None,
            message: error.to_string(),
        });
        report.finalize();
        report
    }

    fn record_status(&mut self, ring: usize, unit: &str, status: &TaskStatus) {
        match status {
            TaskStatus::Succeeded => {}
            TaskStatus::SucceededWithWarnings { warnings } => {
                for message in warnings {
                    self.record_warning(RunWarning {
                        ring: Some(ring),
                        message: message.clone(),
                    });
                }
            }
            TaskStatus::Failed { reason } => self.record_error(RunError {
                level: ErrorLevel::Error,
                ring: Some(ring),
                unit: Some(unit.to_string()),
                message: reason.clone(),
            }),
            TaskStatus::Cancelled => self.record_error(RunError {
                level: ErrorLevel::Error,
                ring: Some(ring),
                unit: Some(unit.to_string()),
                message: "cancelled".to_string(),
            }),
        }
    }

    /// Enregistre une erreur
    pub fn record_error(&mut self, error: RunError) {
        self.errors.push(error);
    }

    /// Enregistre un warning
    pub fn record_warning(&mut self, warning: RunWarning) {
        self.warnings.push(warning);
    }

    /// Enregistre un fichier produit
    pub fn record_output(&mut self, relative: impl Into<String>) {
        self.outputs.push(relative.into());
    }

    /// Définit la durée du run
    pub fn set_duration(&mut self, duration: Duration) {
        self.duration_secs = duration.as_secs_f64();
    }

    /// Détermine le statut final basé sur les erreurs
    pub fn finalize(&mut self) {
        let has_fatal = self.errors.iter().any(|e| e.level == ErrorLevel::Fatal);
        let has_errors = !self.errors.is_empty();
        let has_success = self.rings.iter().any(|r| r.status.starts_with("succeeded"))
            || self
                .categories
                .iter()
                .any(|c| c.status.starts_with("succeeded"));

        self.status = if has_fatal {
            RunStatus::Failed
        } else if has_errors && has_success {
            RunStatus::PartialSuccess
        } else if has_errors {
            RunStatus::Failed
        } else if !self.warnings.is_empty() {
            RunStatus::PartialSuccess
        } else {
            RunStatus::Success
        };
    }

    /// Affiche le rapport sur la console
    pub fn display(&self) {
        println!("\n{}", "=".repeat(60));
        println!("SARA REPORT - PATTS #{} {}", self.patts_id, self.facility_name);
        println!("{}", "=".repeat(60));

        println!("\nStatus: {:?}", self.status);
        println!("Duration: {:.2}s", self.duration_secs);
        if let Some(srid) = self.srid {
            println!("Working SRID: EPSG:{}", srid);
        }

        if !self.rings.is_empty() {
            println!("\n--- RISK RADII ---");
            for r in &self.rings {
                let totals: Vec<String> = r
                    .totals
                    .iter()
                    .map(|(name, value)| format!("{}={}", name, value))
                    .collect();
                println!(
                    "  #{} {}: {} zones, {} [{}]",
                    r.ring,
                    r.distance,
                    r.zones,
                    totals.join(", "),
                    r.status
                );
            }
        }

        if !self.categories.is_empty() {
            println!("\n--- VULNERABLE FACILITIES ---");
            for c in &self.categories {
                println!(
                    "  #{} {}: {} features [{}]",
                    c.ring, c.category, c.matched, c.status
                );
            }
        }

        if let Some(ref floodplain) = self.floodplain {
            println!("\n--- FLOODPLAIN ---");
            println!("  {}", floodplain);
        }

        if !self.warnings.is_empty() {
            println!("\n--- WARNINGS ({}) ---", self.warnings.len());
            for w in self.warnings.iter().take(10) {
                match w.ring {
                    Some(ring) => println!("  [ring {}] {}", ring, w.message),
                    None => println!("  {}", w.message),
                }
            }
            if self.warnings.len() > 10 {
                println!("  ... and {} more", self.warnings.len() - 10);
            }
        }

        if !self.errors.is_empty() {
            println!("\n--- ERRORS ({}) ---", self.errors.len());
            for e in self.errors.iter().take(20) {
                let location = match (e.ring, &e.unit) {
                    (Some(ring), Some(unit)) => format!("[ring {}:{}]", ring, unit),
                    (Some(ring), None) => format!("[ring {}]", ring),
                    (None, Some(unit)) => format!("[{}]", unit),
                    _ => String::new(),
                };
                println!("  {:?} {} {}", e.level, location, e.message);
            }
            if self.errors.len() > 20 {
                println!("  ... and {} more", self.errors.len() - 20);
            }
        }

        if !self.outputs.is_empty() {
            println!("\n--- OUTPUTS ({}) ---", self.outputs.len());
            for o in &self.outputs {
                println!("  {}", o);
            }
        }

        println!("\n{}", "=".repeat(60));
    }

    /// Sauvegarde le rapport en JSON
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Affichage compact pour le résumé
    pub fn summary(&self) -> String {
        format!(
            "PATTS #{}: {:?}, {} rings, {} category results, {} errors, {} warnings",
            self.patts_id,
            self.status,
            self.rings.len(),
            self.categories.len(),
            self.errors.len(),
            self.warnings.len()
        )
    }
}
