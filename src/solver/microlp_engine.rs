// microlp backend adapter
//
// microlp fixes objective coefficients at variable creation and takes
// whole constraint rows at once, so the incremental engine calls are
// buffered here and replayed into a fresh Problem at solve time.

use std::collections::BTreeMap;
use std::time::Duration;

use microlp::{ComparisonOp, OptimizationDirection, Problem};
use tracing::warn;

use crate::domain::engine::{Engine, EngineCol, EngineRow};
use crate::domain::value_objects::{OptimizationType, SolutionStatus};

#[derive(Debug, Clone)]
struct ColumnSpec {
    lower: f64,
    upper: f64,
    integer: bool,
    objective: f64,
}

#[derive(Debug, Clone)]
struct RowSpec {
    lower: f64,
    upper: f64,
    coefficients: BTreeMap<usize, f64>,
}

#[derive(Debug, Clone)]
struct Outcome {
    objective: f64,
    values: Vec<f64>,
}

/// Pure-Rust backend over the `microlp` simplex / branch-and-bound crate.
///
/// Always compiled in and used for the `Auto` backend. Quirks: microlp
/// has no time-limit capability (a requested budget is ignored with a
/// warning), it never terminates with an unproven feasible solution, and
/// the proven bound of an exact solve is the objective itself.
pub struct MicrolpEngine {
    direction: OptimizationDirection,
    columns: Vec<ColumnSpec>,
    rows: Vec<RowSpec>,
    outcome: Option<Outcome>,
}

impl MicrolpEngine {
    pub fn new() -> Self {
        Self {
            direction: OptimizationDirection::Minimize,
            columns: Vec::new(),
            rows: Vec::new(),
            outcome: None,
        }
    }
}

impl Default for MicrolpEngine {
    fn default() -> Self {
        Self::new()
    }
}

// microlp wants integer bounds as i32
fn integer_bound(bound: f64) -> i32 {
    bound.clamp(i32::MIN as f64, i32::MAX as f64) as i32
}

impl Engine for MicrolpEngine {
    fn name(&self) -> &str {
        "microlp"
    }

    fn add_variable(&mut self, _name: &str, lower: f64, upper: f64, integer: bool) -> EngineCol {
        // microlp has no variable names; the solver keeps them
        let col = EngineCol(self.columns.len());
        self.columns.push(ColumnSpec {
            lower,
            upper,
            integer,
            objective: 0.0,
        });
        col
    }

    fn add_row(&mut self, lower: f64, upper: f64) -> EngineRow {
        let row = EngineRow(self.rows.len());
        self.rows.push(RowSpec {
            lower,
            upper,
            coefficients: BTreeMap::new(),
        });
        row
    }

    fn set_row_coefficient(&mut self, row: EngineRow, col: EngineCol, coefficient: f64) {
        self.rows[row.index()]
            .coefficients
            .insert(col.index(), coefficient);
    }

    fn set_objective_coefficient(&mut self, col: EngineCol, coefficient: f64) {
        self.columns[col.index()].objective = coefficient;
    }

    fn set_direction(&mut self, direction: OptimizationType) {
        self.direction = match direction {
            OptimizationType::Minimize => OptimizationDirection::Minimize,
            OptimizationType::Maximize => OptimizationDirection::Maximize,
        };
    }

    fn set_time_limit(&mut self, limit: Duration) {
        warn!(
            backend = "microlp",
            requested_secs = limit.as_secs_f64(),
            "time limits are not supported by this backend; solving to completion"
        );
    }

    fn solve(&mut self) -> SolutionStatus {
        self.outcome = None;

        let mut problem = Problem::new(self.direction);
        let vars: Vec<microlp::Variable> = self
            .columns
            .iter()
            .map(|column| {
                if column.integer {
                    problem.add_integer_var(
                        column.objective,
                        (integer_bound(column.lower), integer_bound(column.upper)),
                    )
                } else {
                    problem.add_var(column.objective, (column.lower, column.upper))
                }
            })
            .collect();

        for row in &self.rows {
            let terms: Vec<(microlp::Variable, f64)> = row
                .coefficients
                .iter()
                .map(|(&col, &coefficient)| (vars[col], coefficient))
                .collect();

            if row.lower == row.upper {
                problem.add_constraint(terms.iter().copied(), ComparisonOp::Eq, row.lower);
            } else {
                // a range row becomes a <= and a >= constraint
                if row.upper.is_finite() {
                    problem.add_constraint(terms.iter().copied(), ComparisonOp::Le, row.upper);
                }
                if row.lower.is_finite() {
                    problem.add_constraint(terms.iter().copied(), ComparisonOp::Ge, row.lower);
                }
            }
        }

        match problem.solve() {
            Ok(solution) => {
                let values = vars.iter().map(|&var| *solution.var_value(var)).collect();
                self.outcome = Some(Outcome {
                    objective: solution.objective(),
                    values,
                });
                SolutionStatus::Optimal
            }
            Err(microlp::Error::Infeasible) => SolutionStatus::Infeasible,
            Err(microlp::Error::Unbounded) => SolutionStatus::Unbounded,
            Err(error) => {
                warn!(backend = "microlp", %error, "solve failed");
                SolutionStatus::Abnormal
            }
        }
    }

    fn objective_value(&self) -> f64 {
        self.outcome
            .as_ref()
            .map(|outcome| outcome.objective)
            .unwrap_or(0.0)
    }

    fn best_bound(&self) -> f64 {
        // exact solves: the proven bound is the objective itself
        self.objective_value()
    }

    fn variable_value(&self, col: EngineCol) -> f64 {
        self.outcome
            .as_ref()
            .and_then(|outcome| outcome.values.get(col.index()).copied())
            .unwrap_or(0.0)
    }
}
