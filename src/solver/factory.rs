use crate::domain::engine::{Engine, Result};
use crate::domain::value_objects::SolverBackend;

use super::microlp_engine::MicrolpEngine;

#[cfg(feature = "cbc")]
use super::coin_cbc_engine::CoinCbcEngine;
#[cfg(feature = "highs")]
use super::highs_engine::HighsEngine;

/// Factory for creating engine instances based on the requested backend
pub struct EngineFactory;

impl EngineFactory {
    /// Create an engine for a specific backend.
    ///
    /// `Auto` resolves to the pure-Rust backend, which is always compiled
    /// in. Backends behind disabled cargo features are rejected with
    /// [`SolverError::BackendUnavailable`](crate::SolverError::BackendUnavailable).
    pub fn create(backend: SolverBackend) -> Result<Box<dyn Engine>> {
        match backend {
            SolverBackend::Auto | SolverBackend::Microlp => Ok(Box::new(MicrolpEngine::new())),

            #[cfg(feature = "cbc")]
            SolverBackend::CoinCbc => Ok(Box::new(CoinCbcEngine::new())),
            #[cfg(not(feature = "cbc"))]
            SolverBackend::CoinCbc => Err(crate::domain::engine::SolverError::BackendUnavailable(
                backend,
            )),

            #[cfg(feature = "highs")]
            SolverBackend::Highs => Ok(Box::new(HighsEngine::new())),
            #[cfg(not(feature = "highs"))]
            SolverBackend::Highs => Err(crate::domain::engine::SolverError::BackendUnavailable(
                backend,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_resolves_to_microlp() {
        let engine = EngineFactory::create(SolverBackend::Auto).unwrap();
        assert_eq!(engine.name(), "microlp");
    }

    #[test]
    fn test_microlp_always_available() {
        assert!(EngineFactory::create(SolverBackend::Microlp).is_ok());
    }

    #[cfg(not(feature = "cbc"))]
    #[test]
    fn test_disabled_backend_is_rejected() {
        let err = EngineFactory::create(SolverBackend::CoinCbc).unwrap_err();
        assert!(err.to_string().contains("not available"));
    }
}
