//! Interface de sortie des résultats d'un run

use crate::run::RunOutcome;

/// Écrit le résultat d'un run (fichiers, tableur, base...)
///
/// Le cœur ne connaît aucun format : l'implémentation choisit ses fichiers
/// et son propre type d'erreur.
pub trait ReportFormatter {
    type Output;
    type Error;

    fn write(&self, outcome: &RunOutcome) -> Result<Self::Output, Self::Error>;
}
