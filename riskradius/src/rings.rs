//! Construction des rayons de risque
//!
//! Machine à états par run : `Created → Projected → Buffered → Ready`, ou
//! `Failed(étape)`. Les coordonnées géographiques ne sont jamais bufferisées
//! directement : le point est d'abord projeté dans le CRS linéaire du provider.

use geo::{Area, MultiPolygon, Point};
use tracing::{debug, info};

use crate::error::RunStage;
use crate::projection::WGS84;
use crate::provider::GeometryProvider;
use crate::types::{Facility, RingSpec, RiskRing};
use crate::RiskRadiusError;

/// État de la construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStage {
    Created,
    Projected,
    Buffered,
    Ready,
    Failed(RunStage),
}

impl BuildStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ready | Self::Failed(_))
    }
}

/// Rayons construits et point projeté de la facility
#[derive(Debug, Clone)]
pub struct BuiltRings {
    pub site: Point<f64>,
    pub srid: u32,
    pub rings: Vec<RiskRing>,
}

/// Constructeur de rayons pour une facility
pub struct RingBuilder<'a> {
    facility: &'a Facility,
    spec: &'a RingSpec,
    stage: BuildStage,
    site: Option<Point<f64>>,
    buffers: Vec<MultiPolygon<f64>>,
}

impl<'a> RingBuilder<'a> {
    pub fn new(facility: &'a Facility, spec: &'a RingSpec) -> Self {
        Self {
            facility,
            spec,
            stage: BuildStage::Created,
            site: None,
            buffers: Vec::new(),
        }
    }

    /// Enchaîne projection, buffers et assemblage
    pub fn build(
        facility: &'a Facility,
        spec: &'a RingSpec,
        provider: &dyn GeometryProvider,
    ) -> Result<BuiltRings, RiskRadiusError> {
        let mut builder = Self::new(facility, spec);
        let site = builder.project(provider)?;
        builder.buffer(provider)?;
        let rings = builder.finish()?;
        Ok(BuiltRings {
            site,
            srid: provider.target_srid(),
            rings,
        })
    }

    pub fn stage(&self) -> BuildStage {
        self.stage
    }

    /// Point projeté (disponible à partir de `Projected`)
    pub fn site(&self) -> Option<Point<f64>> {
        self.site
    }

    fn expect_stage(
        &mut self,
        expected: BuildStage,
        step: RunStage,
    ) -> Result<(), RiskRadiusError> {
        if self.stage == expected {
            return Ok(());
        }
        let err = RiskRadiusError::geometry(
            step,
            format!("expected stage {:?}, builder is {:?}", expected, self.stage),
        );
        if !self.stage.is_terminal() {
            self.stage = BuildStage::Failed(step);
        }
        Err(err)
    }

    /// Projette le point WGS84 de la facility
    pub fn project(
        &mut self,
        provider: &dyn GeometryProvider,
    ) -> Result<Point<f64>, RiskRadiusError> {
        self.expect_stage(BuildStage::Created, RunStage::Projection)?;

        let point = Point::new(self.facility.longitude(), self.facility.latitude());
        match provider.project(point, WGS84, provider.target_srid()) {
            Ok(site) => {
                debug!(
                    x = site.x(),
                    y = site.y(),
                    srid = provider.target_srid(),
                    "Facility projected"
                );
                self.site = Some(site);
                self.stage = BuildStage::Projected;
                Ok(site)
            }
            Err(err) => {
                self.stage = BuildStage::Failed(RunStage::Projection);
                Err(err)
            }
        }
    }

    /// Construit les buffers cumulatifs
    pub fn buffer(&mut self, provider: &dyn GeometryProvider) -> Result<(), RiskRadiusError> {
        self.expect_stage(BuildStage::Projected, RunStage::Buffer)?;
        let Some(site) = self.site else {
            self.stage = BuildStage::Failed(RunStage::Buffer);
            return Err(RiskRadiusError::geometry(RunStage::Buffer, "facility was not projected"));
        };

        let result = provider
            .multi_ring_buffer(site, self.spec.distances())
            .and_then(|buffers| self.check_buffers(buffers));

        match result {
            Ok(buffers) => {
                self.buffers = buffers;
                self.stage = BuildStage::Buffered;
                Ok(())
            }
            Err(err) => {
                self.stage = BuildStage::Failed(RunStage::Buffer);
                Err(err)
            }
        }
    }

    /// Un buffer par distance, non vides et emboîtés
    fn check_buffers(
        &self,
        buffers: Vec<MultiPolygon<f64>>,
    ) -> Result<Vec<MultiPolygon<f64>>, RiskRadiusError> {
        if buffers.len() != self.spec.len() {
            return Err(RiskRadiusError::geometry(
                RunStage::Buffer,
                format!(
                    "provider returned {} buffers for {} distances",
                    buffers.len(),
                    self.spec.len()
                ),
            ));
        }

        let mut previous = 0.0;
        for (buffer, distance) in buffers.iter().zip(self.spec.distances()) {
            let area = buffer.unsigned_area();
            if area <= previous {
                return Err(RiskRadiusError::geometry(
                    RunStage::Buffer,
                    format!("buffer {distance} is empty or not larger than the previous ring"),
                ));
            }
            previous = area;
        }

        Ok(buffers)
    }

    /// Assemble les rayons de risque
    pub fn finish(&mut self) -> Result<Vec<RiskRing>, RiskRadiusError> {
        self.expect_stage(BuildStage::Buffered, RunStage::Buffer)?;

        let rings: Vec<RiskRing> = std::mem::take(&mut self.buffers)
            .into_iter()
            .zip(self.spec.distances())
            .enumerate()
            .map(|(ring_index, (geometry, distance))| RiskRing {
                facility_id: self.facility.patts_id().to_string(),
                ring_index,
                distance: *distance,
                geometry,
            })
            .collect();

        self.stage = BuildStage::Ready;
        info!(
            patts = self.facility.patts_id(),
            rings = rings.len(),
            "SARA risk radii created"
        );
        Ok(rings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::LiteProjector;
    use crate::provider::PlanarProvider;
    use crate::types::LinearUnit;

    fn provider() -> PlanarProvider {
        PlanarProvider::new(Box::new(LiteProjector::new(2272).unwrap()))
    }

    #[test]
    fn test_full_build_reaches_ready() {
        let facility = Facility::new("1234", "Plant", "", 40.2015, -77.1901).unwrap();
        let spec = RingSpec::uniform(&[1.0, 2.0], LinearUnit::Miles).unwrap();
        let provider = provider();

        let mut builder = RingBuilder::new(&facility, &spec);
        assert_eq!(builder.stage(), BuildStage::Created);
        builder.project(&provider).unwrap();
        assert_eq!(builder.stage(), BuildStage::Projected);
        builder.buffer(&provider).unwrap();
        assert_eq!(builder.stage(), BuildStage::Buffered);
        let rings = builder.finish().unwrap();
        assert_eq!(builder.stage(), BuildStage::Ready);

        assert_eq!(rings.len(), 2);
        assert_eq!(rings[0].ring_index, 0);
        assert_eq!(rings[1].distance.value, 2.0);
        assert_eq!(rings[0].facility_id, "1234");
    }

    #[test]
    fn test_outside_projection_domain_fails_at_projection() {
        // Paris, hors de l'emprise de PA South
        let facility = Facility::new("1", "Far away", "", 48.85, 2.35).unwrap();
        let spec = RingSpec::uniform(&[1.0], LinearUnit::Miles).unwrap();
        let provider = provider();

        let mut builder = RingBuilder::new(&facility, &spec);
        assert!(builder.project(&provider).is_err());
        assert_eq!(builder.stage(), BuildStage::Failed(RunStage::Projection));

        // Plus aucune étape possible après un échec
        assert!(builder.buffer(&provider).is_err());
        assert_eq!(builder.stage(), BuildStage::Failed(RunStage::Projection));
    }

    #[test]
    fn test_steps_out_of_order() {
        let facility = Facility::new("1", "Plant", "", 40.2015, -77.1901).unwrap();
        let spec = RingSpec::uniform(&[1.0], LinearUnit::Miles).unwrap();

        let mut builder = RingBuilder::new(&facility, &spec);
        assert!(builder.finish().is_err());
        assert_eq!(builder.stage(), BuildStage::Failed(RunStage::Buffer));
    }
}
