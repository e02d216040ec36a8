//! Export des rayons de risque en GeoJSON avec geozero (streaming)

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use geo::Geometry;
use geozero::geojson::GeoJsonWriter;
use geozero::GeozeroGeometry;
use riskradius::{Facility, RiskRing};

use super::reproject::Reprojector;

/// Exporte les rayons d'une facility en GeoJSON
///
/// Les géométries sont dans `srid`, sauf si un reprojector est fourni.
pub fn export_rings(
    facility: &Facility,
    rings: &[RiskRing],
    srid: u32,
    reprojector: Option<&Reprojector>,
    output_path: &Path,
) -> Result<()> {
    let file = File::create(output_path)
        .context(format!("Failed to create file: {}", output_path.display()))?;
    let mut writer = BufWriter::new(file);

    let epsg = reprojector.map(|r| r.target_epsg()).unwrap_or(srid);

    // Header FeatureCollection avec CRS
    write!(
        writer,
        r#"{{"type":"FeatureCollection","crs":{{"type":"name","properties":{{"name":"urn:ogc:def:crs:EPSG::{}"}}}},"features":["#,
        epsg
    )?;

    for (i, ring) in rings.iter().enumerate() {
        if i > 0 {
            write!(writer, ",")?;
        }
        let geometry = Geometry::MultiPolygon(ring.geometry.clone());
        let geometry = match reprojector {
            Some(r) => r.transform_geometry(&geometry)?,
            None => geometry,
        };
        write_ring(&mut writer, facility, ring, &geometry)?;
    }

    // Footer
    write!(writer, "]}}")?;
    writer.flush()?;

    Ok(())
}

/// Écrit un rayon en GeoJSON
fn write_ring<W: Write>(
    writer: &mut W,
    facility: &Facility,
    ring: &RiskRing,
    geometry: &Geometry,
) -> Result<()> {
    write!(
        writer,
        r#"{{"type":"Feature","id":"{}_{}","#,
        escape_json(facility.patts_id()),
        ring.ring_index + 1
    )?;

    // Geometry via geozero
    write!(writer, r#""geometry":"#)?;
    let mut geom_buf = Vec::new();
    let mut geom_writer = GeoJsonWriter::new(&mut geom_buf);
    geometry.process_geom(&mut geom_writer)?;
    writer.write_all(&geom_buf)?;

    write!(
        writer,
        r#","properties":{{"PATTS":"{}","NAME":"{}","BUFFDIST":{},"UNITS":"{}","RING":{}}}}}"#,
        escape_json(facility.patts_id()),
        escape_json(facility.name()),
        ring.distance.value,
        ring.distance.unit.label(),
        ring.ring_index + 1
    )?;

    Ok(())
}

/// Échappe une chaîne pour JSON
fn escape_json(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => result.push_str("\\\""),
            '\\' => result.push_str("\\\\"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            c if c.is_control() => {
                result.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => result.push(c),
        }
    }
    result
}
