// Domain layer: modeling entities and the engine contract
pub mod domain;

// Solver layer: the Solver facade and backend engine adapters
pub mod solver;

// Re-export commonly used types
pub use domain::{
    Constraint, ConstraintId, ConstraintType, Engine, EngineCol, EngineRow, LinearExpression,
    Objective, OptimizationType, Result, SolutionStatus, SolverBackend, SolverError, VarId,
    Variable, VariableType,
};

pub use solver::{EngineFactory, MicrolpEngine, Solver};

#[cfg(feature = "cbc")]
pub use solver::CoinCbcEngine;
#[cfg(feature = "highs")]
pub use solver::HighsEngine;
