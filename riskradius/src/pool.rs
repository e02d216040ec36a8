//! Pool de workers borné et jeton d'annulation
//!
//! Une tâche par rayon (population) ou par couple rayon/catégorie
//! (facilities vulnérables). Chaque tâche écrit dans son propre slot de
//! sortie : aucun verrou sur le chemin critique.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::RiskRadiusError;

/// Jeton d'annulation partagé entre le run et ses tâches
///
/// Les appels provider en cours se terminent ; les tâches suivantes ne
/// démarrent pas.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Pool de threads borné
pub struct WorkerPool {
    pool: ThreadPool,
    jobs: usize,
}

impl WorkerPool {
    /// Crée un pool de `jobs` threads (0 = parallélisme disponible)
    pub fn new(jobs: usize) -> Result<Self, RiskRadiusError> {
        let jobs = if jobs == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        } else {
            jobs
        };

        let pool = ThreadPoolBuilder::new()
            .num_threads(jobs)
            .thread_name(|i| format!("riskradius-worker-{i}"))
            .build()?;

        Ok(Self { pool, jobs })
    }

    /// Nombre de threads
    pub fn jobs(&self) -> usize {
        self.jobs
    }

    /// Exécute `task` pour chaque entrée ; le résultat garde l'ordre d'entrée
    ///
    /// Les tâches non démarrées au moment de l'annulation produisent
    /// `on_cancel(item)`.
    pub fn run_all<I, T, F, C>(
        &self,
        items: &[I],
        cancel: &CancelToken,
        task: F,
        on_cancel: C,
    ) -> Vec<T>
    where
        I: Sync,
        T: Send,
        F: Fn(&I) -> T + Sync,
        C: Fn(&I) -> T + Sync,
    {
        self.pool.install(|| {
            items
                .par_iter()
                .map(|item| {
                    if cancel.is_cancelled() {
                        on_cancel(item)
                    } else {
                        task(item)
                    }
                })
                .collect()
        })
    }
}
