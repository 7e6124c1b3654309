// COIN-OR CBC backend adapter
//
// CBC's C API is incremental, so the engine contract maps onto it
// directly: columns, rows and coefficients are pushed into the native
// model as they arrive and the solution snapshot is kept after solving.

use std::time::Duration;

use coin_cbc::{raw::Status, Col, Model, Row, Sense, Solution};

use crate::domain::engine::{Engine, EngineCol, EngineRow};
use crate::domain::value_objects::{OptimizationType, SolutionStatus};

pub struct CoinCbcEngine {
    model: Model,
    columns: Vec<Col>,
    rows: Vec<Row>,
    solution: Option<Solution>,
}

impl CoinCbcEngine {
    pub fn new() -> Self {
        let mut model = Model::default();
        // keep CBC's console output out of library users' logs
        model.set_parameter("logLevel", "0");
        Self {
            model,
            columns: Vec::new(),
            rows: Vec::new(),
            solution: None,
        }
    }
}

impl Default for CoinCbcEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for CoinCbcEngine {
    fn name(&self) -> &str {
        "COIN-OR CBC"
    }

    fn add_variable(&mut self, _name: &str, lower: f64, upper: f64, integer: bool) -> EngineCol {
        // the safe CBC wrapper does not expose column names; the solver
        // keeps them for diagnostics
        let col = self.model.add_col();
        self.model.set_col_lower(col, lower);
        self.model.set_col_upper(col, upper);
        if integer {
            self.model.set_integer(col);
        }
        let handle = EngineCol(self.columns.len());
        self.columns.push(col);
        handle
    }

    fn add_row(&mut self, lower: f64, upper: f64) -> EngineRow {
        let row = self.model.add_row();
        if lower.is_finite() {
            self.model.set_row_lower(row, lower);
        }
        if upper.is_finite() {
            self.model.set_row_upper(row, upper);
        }
        let handle = EngineRow(self.rows.len());
        self.rows.push(row);
        handle
    }

    fn set_row_coefficient(&mut self, row: EngineRow, col: EngineCol, coefficient: f64) {
        self.model
            .set_weight(self.rows[row.index()], self.columns[col.index()], coefficient);
    }

    fn set_objective_coefficient(&mut self, col: EngineCol, coefficient: f64) {
        self.model
            .set_obj_coeff(self.columns[col.index()], coefficient);
    }

    fn set_direction(&mut self, direction: OptimizationType) {
        let sense = match direction {
            OptimizationType::Minimize => Sense::Minimize,
            OptimizationType::Maximize => Sense::Maximize,
        };
        self.model.set_obj_sense(sense);
    }

    fn set_time_limit(&mut self, limit: Duration) {
        self.model
            .set_parameter("seconds", &limit.as_secs_f64().to_string());
    }

    fn solve(&mut self) -> SolutionStatus {
        self.solution = None;
        let solution = self.model.solve();

        let status = {
            let raw = solution.raw();
            if raw.is_proven_optimal() {
                SolutionStatus::Optimal
            } else if raw.is_proven_infeasible() {
                SolutionStatus::Infeasible
            } else if raw.is_continuous_unbounded() {
                SolutionStatus::Unbounded
            } else {
                match raw.status() {
                    // stopped by a limit with the search incomplete
                    Status::Stopped => SolutionStatus::Feasible,
                    Status::NotStarted => SolutionStatus::NotSolved,
                    Status::Abandoned => SolutionStatus::Abnormal,
                    _ => SolutionStatus::Abnormal,
                }
            }
        };

        if status.has_solution() {
            self.solution = Some(solution);
        }
        status
    }

    fn objective_value(&self) -> f64 {
        self.solution
            .as_ref()
            .map(|solution| solution.raw().obj_value())
            .unwrap_or(0.0)
    }

    fn best_bound(&self) -> f64 {
        self.solution
            .as_ref()
            .map(|solution| solution.raw().best_possible_obj_value())
            .unwrap_or(0.0)
    }

    fn variable_value(&self, col: EngineCol) -> f64 {
        self.solution
            .as_ref()
            .map(|solution| solution.col(self.columns[col.index()]))
            .unwrap_or(0.0)
    }
}
