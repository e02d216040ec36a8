//! Types d'erreurs pour le crate riskradius

use std::fmt;

use thiserror::Error;

/// Étape d'un run, utilisée pour contextualiser les erreurs fatales
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    /// Validation des paramètres utilisateur
    Validation,
    /// Vérification de la disponibilité du provider
    Connect,
    /// Projection du point de la facility
    Projection,
    /// Construction des buffers
    Buffer,
    /// Estimation de population (clip + apportionment)
    Population,
    /// Analyse des facilities vulnérables
    VulnerableFacilities,
    /// Test zone inondable
    Floodplain,
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Validation => "validation",
            Self::Connect => "provider connection",
            Self::Projection => "projection",
            Self::Buffer => "buffer",
            Self::Population => "population estimate",
            Self::VulnerableFacilities => "vulnerable facilities analysis",
            Self::Floodplain => "floodplain analysis",
        };
        f.write_str(name)
    }
}

/// Erreurs pouvant survenir pendant un run
#[derive(Debug, Error)]
pub enum RiskRadiusError {
    /// Paramètre utilisateur invalide (aucun travail n'a commencé)
    #[error("Invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    /// Le provider a rejeté une projection, un buffer ou un clip
    #[error("Geometry error during {stage}: {reason}")]
    Geometry { stage: RunStage, reason: String },

    /// Zone source inexploitable (aire nulle, attribut manquant)
    #[error("Data error for zone {zone_id}: {reason}")]
    Data { zone_id: String, reason: String },

    /// Moteur géométrique ou source de données injoignable
    #[error("Geometry provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Impossible de créer le pool de workers
    #[error("Worker pool error: {0}")]
    WorkerPool(String),

    /// Erreur fatale d'un run, avec son contexte
    #[error("PATTS {facility_id}: {stage} failed: {source}")]
    Run {
        facility_id: String,
        stage: RunStage,
        #[source]
        source: Box<RiskRadiusError>,
    },
}

impl RiskRadiusError {
    /// Crée une erreur de validation
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Crée une erreur de géométrie
    pub fn geometry(stage: RunStage, reason: impl Into<String>) -> Self {
        Self::Geometry {
            stage,
            reason: reason.into(),
        }
    }

    /// Crée une erreur de données pour une zone
    pub fn data(zone_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Data {
            zone_id: zone_id.into(),
            reason: reason.into(),
        }
    }

    /// Attache le contexte du run (facility, étape)
    pub fn in_run(self, facility_id: impl Into<String>, stage: RunStage) -> Self {
        match self {
            // Déjà contextualisée
            err @ Self::Run { .. } => err,
            err => Self::Run {
                facility_id: facility_id.into(),
                stage,
                source: Box::new(err),
            },
        }
    }

    /// Erreur qui doit interrompre tout le run
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Validation { .. } | Self::ProviderUnavailable(_) | Self::WorkerPool(_) => true,
            Self::Run { source, .. } => source.is_fatal(),
            Self::Geometry { .. } | Self::Data { .. } => false,
        }
    }

    /// Erreur d'origine, sans l'enveloppe de contexte
    pub fn root(&self) -> &RiskRadiusError {
        match self {
            Self::Run { source, .. } => source.root(),
            err => err,
        }
    }
}

impl From<rayon::ThreadPoolBuildError> for RiskRadiusError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        Self::WorkerPool(err.to_string())
    }
}
