// HiGHS backend adapter
//
// The highs crate builds a problem in one pass (columns carry their
// objective coefficient, rows carry their terms), so the incremental
// engine calls are buffered and flushed into a RowProblem at solve time.

use std::collections::BTreeMap;
use std::time::Duration;

use highs::{HighsModelStatus, RowProblem, Sense};

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

/// Backend over the HiGHS solver.
///
/// Quirk: the highs crate exposes no MIP dual bound, so `best_bound`
/// falls back to the incumbent objective value.
pub struct HighsEngine {
    sense: Sense,
    time_limit: Option<Duration>,
    columns: Vec<ColumnSpec>,
    rows: Vec<RowSpec>,
    outcome: Option<Outcome>,
}

impl HighsEngine {
    pub fn new() -> Self {
        Self {
            sense: Sense::Minimise,
            time_limit: None,
            columns: Vec::new(),
            rows: Vec::new(),
            outcome: None,
        }
    }
}

impl Default for HighsEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for HighsEngine {
    fn name(&self) -> &str {
        "HiGHS"
    }

    fn add_variable(&mut self, _name: &str, lower: f64, upper: f64, integer: bool) -> EngineCol {
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
        self.sense = match direction {
            OptimizationType::Minimize => Sense::Minimise,
            OptimizationType::Maximize => Sense::Maximise,
        };
    }

    fn set_time_limit(&mut self, limit: Duration) {
        self.time_limit = Some(limit);
    }

    fn solve(&mut self) -> SolutionStatus {
        self.outcome = None;

        let mut pb = RowProblem::default();
        let cols: Vec<highs::Col> = self
            .columns
            .iter()
            .map(|column| {
                if column.integer {
                    pb.add_integer_column(column.objective, column.lower..=column.upper)
                } else {
                    pb.add_column(column.objective, column.lower..=column.upper)
                }
            })
            .collect();

        for row in &self.rows {
            let terms: Vec<(highs::Col, f64)> = row
                .coefficients
                .iter()
                .map(|(&col, &coefficient)| (cols[col], coefficient))
                .collect();

            match (row.lower.is_finite(), row.upper.is_finite()) {
                (true, true) => pb.add_row(row.lower..=row.upper, &terms),
                (false, true) => pb.add_row(..=row.upper, &terms),
                (true, false) => pb.add_row(row.lower.., &terms),
                (false, false) => pb.add_row(.., &terms),
            };
        }

        let mut model = pb.optimise(self.sense);
        if let Some(limit) = self.time_limit.take() {
            model.set_option("time_limit", limit.as_secs_f64());
        }

        let solved = model.solve();
        let status = match solved.status() {
            HighsModelStatus::Optimal => SolutionStatus::Optimal,
            HighsModelStatus::Infeasible => SolutionStatus::Infeasible,
            HighsModelStatus::Unbounded | HighsModelStatus::UnboundedOrInfeasible => {
                SolutionStatus::Unbounded
            }
            // a limit was hit; the incumbent (if any) is unproven
            HighsModelStatus::ReachedTimeLimit | HighsModelStatus::ReachedIterationLimit => {
                SolutionStatus::Feasible
            }
            HighsModelStatus::ModelError => SolutionStatus::ModelInvalid,
            HighsModelStatus::NotSet => SolutionStatus::NotSolved,
            _ => SolutionStatus::Abnormal,
        };

        if status.has_solution() {
            let values = solved.get_solution().columns().to_vec();
            // the crate exposes no objective query; recompute it from the
            // stored coefficients
            let objective = self
                .columns
                .iter()
                .zip(&values)
                .map(|(column, &value)| column.objective * value)
                .sum();
            self.outcome = Some(Outcome { objective, values });
        }
        status
    }

    fn objective_value(&self) -> f64 {
        self.outcome
            .as_ref()
            .map(|outcome| outcome.objective)
            .unwrap_or(0.0)
    }

    fn best_bound(&self) -> f64 {
        self.objective_value()
    }

    fn variable_value(&self, col: EngineCol) -> f64 {
        self.outcome
            .as_ref()
            .and_then(|outcome| outcome.values.get(col.index()).copied())
            .unwrap_or(0.0)
    }
}
