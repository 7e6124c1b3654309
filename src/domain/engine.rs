// Domain-side contract for native optimization backends
// Defines what any engine must provide; the Solver is written against this
// trait only (Dependency Inversion Principle)

use std::time::Duration;

use super::models::VarId;
use super::value_objects::{OptimizationType, SolutionStatus, SolverBackend};

/// Error types for the modeling layer
#[derive(Debug, thiserror::Error)]
pub enum SolverError {
    #[error("solver backend not available: {0} (not compiled in)")]
    BackendUnavailable(SolverBackend),

    #[error("invalid constraint type: {0}")]
    InvalidConstraintType(String),

    #[error("variable id {} does not belong to this solver", .0.inner())]
    UnknownVariable(VarId),

    #[error("the problem is infeasible")]
    Infeasible,

    #[error("the problem is unbounded")]
    Unbounded,

    #[error("the solver encountered an abnormal condition")]
    Abnormal,

    #[error("the model is invalid")]
    ModelInvalid,

    #[error("the problem was not solved")]
    NotSolved,

    #[error("no solution available before a feasible solve")]
    SolutionNotAvailable,

    #[error("gap is undefined: objective value is zero with a nonzero bound")]
    GapUndefined,
}

pub type Result<T> = std::result::Result<T, SolverError>;

/// Engine-side column handle, issued by [`Engine::add_variable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineCol(pub(crate) usize);

impl EngineCol {
    pub(crate) fn index(self) -> usize {
        self.0
    }
}

/// Engine-side row handle, issued by [`Engine::add_row`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineRow(pub(crate) usize);

impl EngineRow {
    pub(crate) fn index(self) -> usize {
        self.0
    }
}

/// Capability contract required from a native optimization engine
///
/// One engine instance backs exactly one [`Solver`](crate::Solver); it is
/// created with the solver and destroyed when the solver is dropped. All
/// model entities are addressed through the handles the engine issued, so
/// no native pointers cross this boundary.
///
/// Post-solve queries (`objective_value`, `best_bound`, `variable_value`)
/// are only meaningful after [`Engine::solve`] returned a status for which
/// [`SolutionStatus::has_solution`] holds; the solver enforces this.
pub trait Engine {
    /// Human-readable backend name, used for diagnostics.
    fn name(&self) -> &str;

    /// Register a variable with bounds and integrality; returns a stable
    /// column handle.
    fn add_variable(&mut self, name: &str, lower: f64, upper: f64, integer: bool) -> EngineCol;

    /// Register an empty constraint row with the given bounds; returns a
    /// stable row handle.
    fn add_row(&mut self, lower: f64, upper: f64) -> EngineRow;

    /// Set the coefficient of a variable in a constraint row.
    fn set_row_coefficient(&mut self, row: EngineRow, col: EngineCol, coefficient: f64);

    /// Set a variable's objective coefficient.
    fn set_objective_coefficient(&mut self, col: EngineCol, coefficient: f64);

    /// Set the optimization direction.
    fn set_direction(&mut self, direction: OptimizationType);

    /// Set a wall-clock budget for the next solve.
    fn set_time_limit(&mut self, limit: Duration);

    /// Run the solve step until a terminal status is reached.
    fn solve(&mut self) -> SolutionStatus;

    /// Best objective value known after the last solve.
    fn objective_value(&self) -> f64;

    /// Proven bound on the optimum after the last solve (a lower bound
    /// when minimizing, an upper bound when maximizing).
    fn best_bound(&self) -> f64;

    /// Solution value of a variable after the last solve.
    fn variable_value(&self, col: EngineCol) -> f64;
}

impl std::fmt::Debug for dyn Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Engine({})", self.name())
    }
}
