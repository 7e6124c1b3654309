// Solver facade and backend adapters

use std::time::{Duration, Instant};

use tracing::debug;

use crate::domain::engine::{Engine, EngineCol, Result, SolverError};
use crate::domain::models::{Constraint, ConstraintId, LinearExpression, Objective, VarId, Variable};
use crate::domain::value_objects::{
    ConstraintType, OptimizationType, SolutionStatus, SolverBackend, VariableType,
};

pub mod factory;
pub mod microlp_engine;

#[cfg(feature = "cbc")]
pub mod coin_cbc_engine;
#[cfg(feature = "highs")]
pub mod highs_engine;

pub use factory::EngineFactory;
pub use microlp_engine::MicrolpEngine;

#[cfg(feature = "cbc")]
pub use coin_cbc_engine::CoinCbcEngine;
#[cfg(feature = "highs")]
pub use highs_engine::HighsEngine;

/// The optimization problem being assembled and solved
///
/// A `Solver` owns every [`Variable`] and [`Constraint`] created through
/// it, the active [`Objective`], and exactly one backend engine instance.
/// Dropping the solver releases the engine and invalidates all ids issued
/// by it; Rust ownership makes use-after-release unrepresentable, so there
/// is no explicit release call.
///
/// Solution queries (`objective_value`, `best_bound`, `gap`, `value`)
/// return [`SolverError::SolutionNotAvailable`] until a call to
/// [`Solver::solve`] has produced an optimal or feasible result.
pub struct Solver {
    engine: Box<dyn Engine>,
    variables: Vec<Variable>,
    columns: Vec<EngineCol>,
    constraints: Vec<Constraint>,
    objective: Option<Objective>,
    status: Option<SolutionStatus>,
}

impl Solver {
    /// Create a solver backed by the given engine kind.
    ///
    /// Fails with [`SolverError::BackendUnavailable`] if the backend was
    /// not compiled in.
    pub fn new(backend: SolverBackend) -> Result<Self> {
        let engine = EngineFactory::create(backend)?;
        debug!(backend = engine.name(), "created solver");
        Ok(Self::from_engine(engine))
    }

    fn from_engine(engine: Box<dyn Engine>) -> Self {
        Self {
            engine,
            variables: Vec::new(),
            columns: Vec::new(),
            constraints: Vec::new(),
            objective: None,
            status: None,
        }
    }

    /// Create a new continuous variable with the given bounds.
    pub fn var_float(&mut self, name: impl Into<String>, lower: f64, upper: f64) -> VarId {
        self.new_variable(name.into(), lower, upper, VariableType::Continuous)
    }

    /// Create a new integer variable with the given bounds.
    pub fn var_int(&mut self, name: impl Into<String>, lower: i64, upper: i64) -> VarId {
        self.new_variable(name.into(), lower as f64, upper as f64, VariableType::Integer)
    }

    /// Create a new binary (0/1 decision) variable.
    pub fn var_bool(&mut self, name: impl Into<String>) -> VarId {
        self.new_variable(name.into(), 0.0, 1.0, VariableType::Binary)
    }

    fn new_variable(
        &mut self,
        name: String,
        lower: f64,
        upper: f64,
        variable_type: VariableType,
    ) -> VarId {
        let col = self
            .engine
            .add_variable(&name, lower, upper, variable_type.is_integer());
        let id = VarId::new(self.variables.len() as u32);
        self.variables
            .push(Variable::new(name, lower, upper, variable_type));
        self.columns.push(col);
        id
    }

    /// Look up a variable record by id.
    pub fn variable(&self, var: VarId) -> Result<&Variable> {
        self.variables
            .get(var.inner() as usize)
            .ok_or(SolverError::UnknownVariable(var))
    }

    /// Look up a constraint record by id.
    pub fn constraint(&self, constraint: ConstraintId) -> Option<&Constraint> {
        self.constraints.get(constraint.inner() as usize)
    }

    /// The active objective, if one has been set.
    pub fn objective(&self) -> Option<&Objective> {
        self.objective.as_ref()
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    /// Name of the backend engine, for diagnostics.
    pub fn backend_name(&self) -> &str {
        self.engine.name()
    }

    /// Add the constraint `expression R rhs` as a bounded row.
    ///
    /// `<=` produces the row (-inf, rhs], `>=` produces [rhs, +inf) and
    /// `==` produces [rhs, rhs]. Term order is immaterial to the model.
    pub fn add_constraint(
        &mut self,
        expression: &LinearExpression,
        constraint_type: ConstraintType,
        rhs: f64,
    ) -> Result<ConstraintId> {
        // validate ids up front so a bad expression creates no partial row
        self.check_expression(expression)?;

        let (lower, upper) = constraint_type.row_bounds(rhs);
        let row = self.engine.add_row(lower, upper);

        let mut terms = Vec::with_capacity(expression.len());
        for (var, coefficient) in expression.terms() {
            self.engine
                .set_row_coefficient(row, self.columns[var.inner() as usize], coefficient);
            terms.push((var, coefficient));
        }

        let id = ConstraintId::new(self.constraints.len() as u32);
        self.constraints.push(Constraint::new(lower, upper, terms));
        Ok(id)
    }

    /// Set the objective function, replacing any previous one.
    ///
    /// Replacement is complete: coefficients set by an earlier call are
    /// zeroed in the engine before the new terms are applied, so nothing
    /// leaks from one objective into the next.
    pub fn set_objective(
        &mut self,
        expression: &LinearExpression,
        optimization_type: OptimizationType,
    ) -> Result<()> {
        self.check_expression(expression)?;

        if let Some(previous) = self.objective.take() {
            for &(var, _) in previous.terms() {
                self.engine
                    .set_objective_coefficient(self.columns[var.inner() as usize], 0.0);
            }
        }

        let terms: Vec<(VarId, f64)> = expression.terms().collect();
        for &(var, coefficient) in &terms {
            self.engine
                .set_objective_coefficient(self.columns[var.inner() as usize], coefficient);
        }
        self.engine.set_direction(optimization_type);
        self.objective = Some(Objective::new(optimization_type, terms));
        Ok(())
    }

    fn check_expression(&self, expression: &LinearExpression) -> Result<()> {
        for (var, _) in expression.terms() {
            if var.inner() as usize >= self.variables.len() {
                return Err(SolverError::UnknownVariable(var));
            }
        }
        Ok(())
    }

    /// Attempt to solve the problem, optionally within a time budget.
    ///
    /// A `Some` non-zero limit is propagated to the engine; `None` or a
    /// zero duration lets the engine run until it reaches a terminal
    /// status on its own.
    ///
    /// Returns `Ok(true)` for a proven optimum, `Ok(false)` for a feasible
    /// but unproven solution, and an error for every other terminal
    /// status. Only after an `Ok` result are the solution queries
    /// meaningful.
    pub fn solve(&mut self, time_limit: Option<Duration>) -> Result<bool> {
        if let Some(limit) = time_limit.filter(|limit| !limit.is_zero()) {
            self.engine.set_time_limit(limit);
        }

        let start = Instant::now();
        let status = self.engine.solve();
        self.status = Some(status);
        debug!(
            backend = self.engine.name(),
            status = %status,
            variables = self.variables.len(),
            constraints = self.constraints.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "solve finished"
        );

        match status {
            SolutionStatus::Optimal => Ok(true),
            SolutionStatus::Feasible => Ok(false),
            SolutionStatus::Infeasible => Err(SolverError::Infeasible),
            SolutionStatus::Unbounded => Err(SolverError::Unbounded),
            SolutionStatus::Abnormal => Err(SolverError::Abnormal),
            SolutionStatus::ModelInvalid => Err(SolverError::ModelInvalid),
            SolutionStatus::NotSolved => Err(SolverError::NotSolved),
        }
    }

    /// Terminal status of the last solve, `None` before the first one.
    pub fn status(&self) -> Option<SolutionStatus> {
        self.status
    }

    fn require_solution(&self) -> Result<()> {
        match self.status {
            Some(status) if status.has_solution() => Ok(()),
            _ => Err(SolverError::SolutionNotAvailable),
        }
    }

    /// Best objective value found by the engine.
    pub fn objective_value(&self) -> Result<f64> {
        self.require_solution()?;
        Ok(self.engine.objective_value())
    }

    /// Proven bound on the optimum: a lower bound when minimizing, an
    /// upper bound when maximizing.
    pub fn best_bound(&self) -> Result<f64> {
        self.require_solution()?;
        Ok(self.engine.best_bound())
    }

    /// Relative gap between the best solution and the proven bound.
    ///
    /// Computed as `|best_bound - objective| / |objective|`, so it is
    /// nonnegative for either optimization direction and zero at a proven
    /// optimum. A zero objective with a zero bound yields 0; a zero
    /// objective with a nonzero bound is reported as
    /// [`SolverError::GapUndefined`] instead of dividing by zero.
    pub fn gap(&self) -> Result<f64> {
        self.require_solution()?;
        let objective = self.engine.objective_value();
        let bound = self.engine.best_bound();
        if objective == 0.0 {
            return if bound == 0.0 {
                Ok(0.0)
            } else {
                Err(SolverError::GapUndefined)
            };
        }
        Ok((bound - objective).abs() / objective.abs())
    }

    /// Solution value of a variable.
    pub fn value(&self, var: VarId) -> Result<f64> {
        let col = *self
            .columns
            .get(var.inner() as usize)
            .ok_or(SolverError::UnknownVariable(var))?;
        self.require_solution()?;
        Ok(self.engine.variable_value(col))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::engine::EngineRow;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Records every engine call so tests can assert on the exact
    /// translation the solver performs.
    #[derive(Default)]
    struct StubLog {
        columns: Vec<(String, f64, f64, bool)>,
        rows: Vec<(f64, f64)>,
        row_coefficients: Vec<(usize, usize, f64)>,
        objective_coefficients: Vec<(usize, f64)>,
        directions: Vec<OptimizationType>,
        time_limits: Vec<Duration>,
    }

    struct StubEngine {
        log: Rc<RefCell<StubLog>>,
        status: SolutionStatus,
        objective: f64,
        bound: f64,
        values: Vec<f64>,
    }

    impl StubEngine {
        fn new(status: SolutionStatus) -> (Self, Rc<RefCell<StubLog>>) {
            let log = Rc::new(RefCell::new(StubLog::default()));
            (
                Self {
                    log: Rc::clone(&log),
                    status,
                    objective: 0.0,
                    bound: 0.0,
                    values: Vec::new(),
                },
                log,
            )
        }

        fn with_outcome(mut self, objective: f64, bound: f64, values: Vec<f64>) -> Self {
            self.objective = objective;
            self.bound = bound;
            self.values = values;
            self
        }
    }

    impl Engine for StubEngine {
        fn name(&self) -> &str {
            "stub"
        }

        fn add_variable(&mut self, name: &str, lower: f64, upper: f64, integer: bool) -> EngineCol {
            let mut log = self.log.borrow_mut();
            log.columns.push((name.to_string(), lower, upper, integer));
            EngineCol(log.columns.len() - 1)
        }

        fn add_row(&mut self, lower: f64, upper: f64) -> EngineRow {
            let mut log = self.log.borrow_mut();
            log.rows.push((lower, upper));
            EngineRow(log.rows.len() - 1)
        }

        fn set_row_coefficient(&mut self, row: EngineRow, col: EngineCol, coefficient: f64) {
            self.log
                .borrow_mut()
                .row_coefficients
                .push((row.index(), col.index(), coefficient));
        }

        fn set_objective_coefficient(&mut self, col: EngineCol, coefficient: f64) {
            self.log
                .borrow_mut()
                .objective_coefficients
                .push((col.index(), coefficient));
        }

        fn set_direction(&mut self, direction: OptimizationType) {
            self.log.borrow_mut().directions.push(direction);
        }

        fn set_time_limit(&mut self, limit: Duration) {
            self.log.borrow_mut().time_limits.push(limit);
        }

        fn solve(&mut self) -> SolutionStatus {
            self.status
        }

        fn objective_value(&self) -> f64 {
            self.objective
        }

        fn best_bound(&self) -> f64 {
            self.bound
        }

        fn variable_value(&self, col: EngineCol) -> f64 {
            self.values[col.index()]
        }
    }

    fn stub_solver(status: SolutionStatus) -> (Solver, Rc<RefCell<StubLog>>) {
        let (engine, log) = StubEngine::new(status);
        (Solver::from_engine(Box::new(engine)), log)
    }

    #[test]
    fn test_variable_factories_register_with_engine() {
        let (mut solver, log) = stub_solver(SolutionStatus::Optimal);
        solver.var_float("x", -1.0, 1.0);
        solver.var_int("y", 0, 5);
        solver.var_bool("z");

        let log = log.borrow();
        assert_eq!(log.columns.len(), 3);
        assert_eq!(log.columns[0], ("x".to_string(), -1.0, 1.0, false));
        assert_eq!(log.columns[1], ("y".to_string(), 0.0, 5.0, true));
        assert_eq!(log.columns[2], ("z".to_string(), 0.0, 1.0, true));
        assert_eq!(solver.num_variables(), 3);
        assert_eq!(
            solver.variable(VarId::new(2)).unwrap().variable_type(),
            VariableType::Binary
        );
    }

    #[test]
    fn test_constraint_maps_relations_to_row_bounds() {
        let (mut solver, log) = stub_solver(SolutionStatus::Optimal);
        let x = solver.var_float("x", 0.0, 10.0);

        let mut expr = LinearExpression::new();
        expr.add_term(x, 2.0);

        solver
            .add_constraint(&expr, ConstraintType::LessThanOrEqual, 7.0)
            .unwrap();
        solver
            .add_constraint(&expr, ConstraintType::GreaterThanOrEqual, 3.0)
            .unwrap();
        solver
            .add_constraint(&expr, ConstraintType::Equal, 5.0)
            .unwrap();

        let log = log.borrow();
        assert_eq!(log.rows[0], (f64::NEG_INFINITY, 7.0));
        assert_eq!(log.rows[1], (3.0, f64::INFINITY));
        assert_eq!(log.rows[2], (5.0, 5.0));
        // every row carries the expression's coefficient
        assert_eq!(log.row_coefficients[0], (0, 0, 2.0));
        assert_eq!(log.row_coefficients[1], (1, 0, 2.0));
        assert_eq!(log.row_coefficients[2], (2, 0, 2.0));
    }

    #[test]
    fn test_constraint_rejects_foreign_variable_id() {
        let (mut solver, log) = stub_solver(SolutionStatus::Optimal);
        solver.var_float("x", 0.0, 1.0);

        let mut expr = LinearExpression::new();
        expr.add_term(VarId::new(99), 1.0);

        let err = solver
            .add_constraint(&expr, ConstraintType::Equal, 0.0)
            .unwrap_err();
        assert!(matches!(err, SolverError::UnknownVariable(_)));
        // no partial row was created
        assert!(log.borrow().rows.is_empty());
    }

    #[test]
    fn test_set_objective_replaces_previous_coefficients() {
        let (mut solver, log) = stub_solver(SolutionStatus::Optimal);
        let x = solver.var_float("x", 0.0, 1.0);
        let y = solver.var_float("y", 0.0, 1.0);

        let mut first = LinearExpression::new();
        first.add_term(x, 3.0);
        solver
            .set_objective(&first, OptimizationType::Minimize)
            .unwrap();

        let mut second = LinearExpression::new();
        second.add_term(y, 4.0);
        solver
            .set_objective(&second, OptimizationType::Maximize)
            .unwrap();

        let log = log.borrow();
        // first call sets x, second zeroes x before setting y
        assert_eq!(
            log.objective_coefficients,
            vec![(0, 3.0), (0, 0.0), (1, 4.0)]
        );
        assert_eq!(
            log.directions,
            vec![OptimizationType::Minimize, OptimizationType::Maximize]
        );
        assert_eq!(
            solver.objective().unwrap().optimization_type(),
            OptimizationType::Maximize
        );
    }

    #[test]
    fn test_time_limit_propagation() {
        let (mut solver, log) = stub_solver(SolutionStatus::Optimal);
        solver.solve(Some(Duration::from_secs(30))).unwrap();
        solver.solve(None).unwrap();
        solver.solve(Some(Duration::ZERO)).unwrap();

        // only the positive limit reaches the engine
        assert_eq!(log.borrow().time_limits, vec![Duration::from_secs(30)]);
    }

    #[test]
    fn test_feasible_solve_returns_not_optimal() {
        let (engine, _log) = StubEngine::new(SolutionStatus::Feasible);
        let engine = engine.with_outcome(90.0, 100.0, vec![]);
        let mut solver = Solver::from_engine(Box::new(engine));

        let is_optimal = solver.solve(None).unwrap();
        assert!(!is_optimal);
        assert_eq!(solver.status(), Some(SolutionStatus::Feasible));
        assert_eq!(solver.objective_value().unwrap(), 90.0);
        assert_eq!(solver.best_bound().unwrap(), 100.0);
        let gap = solver.gap().unwrap();
        assert!(gap >= 0.0);
        assert!((gap - 1.0 / 9.0).abs() < 1e-12);
    }

    #[test]
    fn test_failed_statuses_map_to_errors() {
        let cases = [
            (SolutionStatus::Infeasible, "infeasible"),
            (SolutionStatus::Unbounded, "unbounded"),
            (SolutionStatus::Abnormal, "abnormal"),
            (SolutionStatus::ModelInvalid, "invalid"),
            (SolutionStatus::NotSolved, "not solved"),
        ];
        for (status, needle) in cases {
            let (mut solver, _log) = stub_solver(status);
            let err = solver.solve(None).unwrap_err();
            assert!(
                err.to_string().contains(needle),
                "{status}: {err} should mention {needle}"
            );
            // failed solves leave no readable solution
            assert!(matches!(
                solver.objective_value(),
                Err(SolverError::SolutionNotAvailable)
            ));
        }
    }

    #[test]
    fn test_queries_before_solve_are_rejected() {
        let (mut solver, _log) = stub_solver(SolutionStatus::Optimal);
        let x = solver.var_float("x", 0.0, 1.0);

        assert!(matches!(
            solver.objective_value(),
            Err(SolverError::SolutionNotAvailable)
        ));
        assert!(matches!(
            solver.best_bound(),
            Err(SolverError::SolutionNotAvailable)
        ));
        assert!(matches!(solver.gap(), Err(SolverError::SolutionNotAvailable)));
        assert!(matches!(
            solver.value(x),
            Err(SolverError::SolutionNotAvailable)
        ));
    }

    #[test]
    fn test_gap_zero_objective_branches() {
        let (engine, _log) = StubEngine::new(SolutionStatus::Optimal);
        let engine = engine.with_outcome(0.0, 0.0, vec![]);
        let mut solver = Solver::from_engine(Box::new(engine));
        solver.solve(None).unwrap();
        assert_eq!(solver.gap().unwrap(), 0.0);

        let (engine, _log) = StubEngine::new(SolutionStatus::Feasible);
        let engine = engine.with_outcome(0.0, 5.0, vec![]);
        let mut solver = Solver::from_engine(Box::new(engine));
        solver.solve(None).unwrap();
        assert!(matches!(solver.gap(), Err(SolverError::GapUndefined)));
    }

    #[test]
    fn test_gap_is_zero_at_proven_optimum() {
        let (engine, _log) = StubEngine::new(SolutionStatus::Optimal);
        let engine = engine.with_outcome(42.0, 42.0, vec![]);
        let mut solver = Solver::from_engine(Box::new(engine));
        assert!(solver.solve(None).unwrap());
        assert_eq!(solver.gap().unwrap(), 0.0);
    }

    #[test]
    fn test_gap_nonnegative_for_negative_objectives() {
        // minimization with a negative objective: gap must still be >= 0
        let (engine, _log) = StubEngine::new(SolutionStatus::Feasible);
        let engine = engine.with_outcome(-90.0, -100.0, vec![]);
        let mut solver = Solver::from_engine(Box::new(engine));
        solver.solve(None).unwrap();
        assert!(solver.gap().unwrap() >= 0.0);
    }

    #[test]
    fn test_value_reads_engine_solution() {
        let (engine, _log) = StubEngine::new(SolutionStatus::Optimal);
        let engine = engine.with_outcome(10.0, 10.0, vec![10.0]);
        let mut solver = Solver::from_engine(Box::new(engine));
        let x = solver.var_float("x", 0.0, 10.0);
        solver.solve(None).unwrap();
        assert_eq!(solver.value(x).unwrap(), 10.0);
        assert!(matches!(
            solver.value(VarId::new(7)),
            Err(SolverError::UnknownVariable(_))
        ));
    }

    #[test]
    fn test_constraint_record_is_kept() {
        let (mut solver, _log) = stub_solver(SolutionStatus::Optimal);
        let x = solver.var_float("x", 0.0, 10.0);
        let mut expr = LinearExpression::new();
        expr.add_term(x, 2.5);
        let id = solver
            .add_constraint(&expr, ConstraintType::LessThanOrEqual, 7.0)
            .unwrap();

        let constraint = solver.constraint(id).unwrap();
        assert_eq!(constraint.upper_bound(), 7.0);
        assert_eq!(constraint.lower_bound(), f64::NEG_INFINITY);
        assert_eq!(constraint.terms(), &[(x, 2.5)]);
        assert_eq!(solver.num_constraints(), 1);
    }
}
