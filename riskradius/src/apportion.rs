//! Répartition surfacique des attributs extensifs
//!
//! Pour chaque zone découpée par un rayon, `ratio = aire découpée / aire
//! d'origine` (borné à [0, 1]) et chaque attribut extensif autorisé vaut
//! `round(valeur * ratio)`. Fonction pure : aucun état caché.

use std::collections::BTreeMap;

use tracing::warn;

use crate::provider::ClipRecord;
use crate::types::{ApportionedZone, ClippedZone, ExtensiveAttributes, RiskRing, ZoneIssue};
use crate::RiskRadiusError;

/// Tolérance relative sur `aire découpée <= aire d'origine`
pub const AREA_TOLERANCE: f64 = 1e-6;

/// Résultat de la répartition pour un rayon
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Apportionment {
    /// Zones réparties, dans l'ordre d'entrée
    pub zones: Vec<ApportionedZone>,
    /// Zones écartées (DataError)
    pub issues: Vec<ZoneIssue>,
}

impl Apportionment {
    /// Somme des valeurs réparties par attribut
    ///
    /// Un dépassement de `u64` est une erreur de données sur la zone qui le
    /// provoque, jamais une valeur tronquée.
    pub fn totals(
        &self,
        attributes: &ExtensiveAttributes,
    ) -> Result<BTreeMap<String, u64>, RiskRadiusError> {
        let mut totals: BTreeMap<String, u64> =
            attributes.names().iter().map(|n| (n.clone(), 0)).collect();
        for zone in &self.zones {
            for (name, value) in &zone.values {
                let total = totals.entry(name.clone()).or_insert(0);
                *total = total.checked_add(*value).ok_or_else(|| {
                    RiskRadiusError::data(
                        &zone.clipped.zone_id,
                        format!("{name} total overflows"),
                    )
                })?;
            }
        }
        Ok(totals)
    }
}

/// Moteur de répartition surfacique
#[derive(Debug, Clone)]
pub struct ApportionmentEngine {
    attributes: ExtensiveAttributes,
}

impl ApportionmentEngine {
    pub fn new(attributes: ExtensiveAttributes) -> Self {
        Self { attributes }
    }

    pub fn attributes(&self) -> &ExtensiveAttributes {
        &self.attributes
    }

    /// Répartit les zones découpées par `ring`
    ///
    /// Une zone invalide est écartée et reportée dans `issues`, sans
    /// interrompre le calcul des autres zones.
    pub fn apportion(&self, ring: &RiskRing, records: &[ClipRecord]) -> Apportionment {
        let mut result = Apportionment::default();

        for record in records {
            match self.apportion_zone(ring.ring_index, record) {
                Ok(zone) => result.zones.push(zone),
                Err(err) => {
                    warn!(
                        zone = %record.zone.id,
                        ring = ring.ring_index,
                        error = %err,
                        "Zone skipped"
                    );
                    result.issues.push(ZoneIssue {
                        zone_id: record.zone.id.clone(),
                        ring_index: ring.ring_index,
                        reason: err.to_string(),
                    });
                }
            }
        }

        result
    }

    fn apportion_zone(
        &self,
        ring_index: usize,
        record: &ClipRecord,
    ) -> Result<ApportionedZone, RiskRadiusError> {
        let zone = &record.zone;
        let area_ratio = area_ratio(&zone.id, record.clipped_area, zone.original_area)?;

        let mut values = BTreeMap::new();
        for name in self.attributes.names() {
            let Some(&value) = zone.attributes.get(name) else {
                return Err(RiskRadiusError::data(
                    &zone.id,
                    format!("attribute {name} is missing"),
                ));
            };
            if !value.is_finite() || value < 0.0 {
                return Err(RiskRadiusError::data(
                    &zone.id,
                    format!("attribute {name} has invalid value {value}"),
                ));
            }
            // f64::round arrondit à l'écart de zéro (half away from zero)
            let rounded = (value * area_ratio).round();
            if rounded >= u64::MAX as f64 {
                return Err(RiskRadiusError::data(
                    &zone.id,
                    format!("attribute {name} value {value} is out of range"),
                ));
            }
            values.insert(name.clone(), rounded as u64);
        }

        Ok(ApportionedZone {
            clipped: ClippedZone {
                zone_id: zone.id.clone(),
                ring_index,
                clipped_area: record.clipped_area,
                area_ratio,
            },
            values,
        })
    }
}

/// Ratio aire découpée / aire d'origine, borné à [0, 1]
pub fn area_ratio(
    zone_id: &str,
    clipped_area: f64,
    original_area: f64,
) -> Result<f64, RiskRadiusError> {
    if !original_area.is_finite() || original_area <= 0.0 {
        return Err(RiskRadiusError::data(
            zone_id,
            format!("original area {original_area} is not a positive number"),
        ));
    }
    if !clipped_area.is_finite() {
        return Err(RiskRadiusError::data(
            zone_id,
            format!("clipped area {clipped_area} is not a number"),
        ));
    }
    if clipped_area > original_area * (1.0 + AREA_TOLERANCE) {
        return Err(RiskRadiusError::data(
            zone_id,
            format!("clipped area {clipped_area} exceeds original area {original_area}"),
        ));
    }

    Ok((clipped_area / original_area).clamp(0.0, 1.0))
}
