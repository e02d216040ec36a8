//! Tables CSV : estimations de population et facilities vulnérables

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use riskradius::{ExtensiveAttributes, RingSummary};

use crate::sources::PropertyTable;

/// Nom de la table de population d'un rayon
pub fn population_table_name(patts: &str, summary: &RingSummary) -> String {
    format!(
        "EstCensusPop_PATTS_{}_{}_{}_SumPop.csv",
        patts,
        summary.distance.file_token(),
        summary.distance.unit.label()
    )
}

/// Écrit la somme des attributs répartis d'un rayon
///
/// Colonnes : `BUFFDIST, UNITS, FREQUENCY, SUM_<attribut>...`
pub fn write_population_table(
    path: &Path,
    summary: &RingSummary,
    attributes: &ExtensiveAttributes,
) -> Result<()> {
    let mut writer = create_writer(path)?;

    let mut header = vec!["BUFFDIST".to_string(), "UNITS".to_string(), "FREQUENCY".to_string()];
    header.extend(attributes.names().iter().map(|n| format!("SUM_{n}")));
    writer.write_record(&header)?;

    let mut row = vec![
        summary.distance.value.to_string(),
        summary.distance.unit.label().to_string(),
        summary.zones.len().to_string(),
    ];
    row.extend(
        attributes
            .names()
            .iter()
            .map(|n| summary.total(n).to_string()),
    );
    writer.write_record(&row)?;

    writer.flush()?;
    Ok(())
}

/// Écrit le détail par zone d'un rayon
///
/// Colonnes : `ZONE, AREARATIO, CLIPAREA, <attribut>...`
pub fn write_zone_table(
    path: &Path,
    summary: &RingSummary,
    attributes: &ExtensiveAttributes,
) -> Result<()> {
    let mut writer = create_writer(path)?;

    let mut header = vec!["ZONE".to_string(), "AREARATIO".to_string(), "CLIPAREA".to_string()];
    header.extend(attributes.names().iter().cloned());
    writer.write_record(&header)?;

    for zone in &summary.zones {
        let mut row = vec![
            zone.clipped.zone_id.clone(),
            format!("{:.6}", zone.clipped.area_ratio),
            format!("{:.2}", zone.clipped.clipped_area),
        ];
        row.extend(
            attributes
                .names()
                .iter()
                .map(|n| zone.values.get(n).copied().unwrap_or(0).to_string()),
        );
        writer.write_record(&row)?;
    }

    writer.flush()?;
    Ok(())
}

/// Écrit les propriétés des facilities trouvées
///
/// Les valeurs sont écrites telles quelles, y compris les retours à la ligne
/// (champ entre guillemets).
pub fn write_feature_table<'a>(
    path: &Path,
    ids: impl IntoIterator<Item = &'a String>,
    table: &PropertyTable,
) -> Result<usize> {
    let mut writer = create_writer(path)?;

    let mut header = vec!["FEATURE_ID"];
    header.extend(table.columns.iter().map(String::as_str));
    writer.write_record(&header)?;

    let mut count = 0;
    for id in ids {
        let mut row = vec![id.as_str()];
        match table.row(id) {
            Some(values) => row.extend(values),
            None => row.extend(std::iter::repeat("").take(table.columns.len())),
        }
        writer.write_record(&row)?;
        count += 1;
    }

    writer.flush()?;
    Ok(count)
}

fn create_writer(path: &Path) -> Result<csv::Writer<File>> {
    csv::Writer::from_path(path).context(format!("Failed to create file: {}", path.display()))
}
