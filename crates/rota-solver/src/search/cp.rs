//! Optimal search using Constraint Programming
//!
//! This backend hands the model to the Pumpkin constraint programming solver
//! and proves optimality on full-week instances the branch-and-bound
//! portfolio cannot close.
//!
//! # Feature Flag
//!
//! This module requires the `cp` feature, which is on by default:
//!
//! ```toml
//! rota-solver = { version = "0.3", features = ["cp"] }
//! ```
//!
//! # Formulation
//!
//! - **Variables**: a 0/1 integer per decision, an integer per auxiliary
//!   whose domain is the auxiliary's interval before anything is fixed
//! - **Constraints**:
//!   - Linear ranges: one equality, or up to two inequalities
//!   - `Sum`: `Σ coef·op - aux == 0`
//!   - `Indicator`: a literal reifying the comparison
//!   - `AllOf`: a literal reifying "every operand is non-zero"
//!   - `Max` / `Min`: array maximum / minimum
//! - **Objective**: Pumpkin domains are `i32`, so the composed objective is
//!   minimized tier by tier, highest first. Inside a tier the weights are
//!   divided by their gcd; every later stage bounds the earlier tiers at
//!   their proven optimum. Because the weight plan keeps tiers strictly
//!   dominant, the last stage's optimum is the composed optimum.

use super::{SearchLimits, SearchOutcome, SearchStats, SearchStatus, SolverBackend};
use crate::model::{Comparison, ConstraintModel, Definition, Interval, Operand, Tier};
use crate::ModelError;
use pumpkin_solver::constraints as cp;
use pumpkin_solver::optimisation::linear_sat_unsat::LinearSatUnsat;
use pumpkin_solver::optimisation::OptimisationDirection;
use pumpkin_solver::results::{OptimisationResult, ProblemSolution, SolutionReference};
use pumpkin_solver::termination::TimeBudget;
use pumpkin_solver::variables::{AffineView, DomainId, TransformableVariable};
use pumpkin_solver::Solver;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

type Var = AffineView<DomainId>;

/// Single-threaded CP search. Deterministic for a given model.
#[derive(Clone, Copy, Debug, Default)]
pub struct CpSearch;

impl CpSearch {
    pub fn new() -> Self {
        Self
    }
}

/// One tier's terms with the weights divided by their gcd
#[derive(Clone, Debug, PartialEq, Eq)]
struct TierScore {
    tier: Tier,
    terms: Vec<(Operand, i64)>,
}

impl TierScore {
    fn value(&self, model: &ConstraintModel, values: &[bool]) -> i64 {
        let eval = model.evaluate(values);
        self.terms.iter().map(|&(op, w)| w * eval.value(op)).sum()
    }
}

fn gcd(a: i64, b: i64) -> i64 {
    if b == 0 {
        a.abs()
    } else {
        gcd(b, a % b)
    }
}

fn tier_scores(model: &ConstraintModel) -> Vec<TierScore> {
    Tier::ALL
        .iter()
        .filter_map(|&tier| {
            let terms: Vec<(Operand, i64)> = model
                .objective()
                .iter()
                .filter(|t| t.tier == tier)
                .map(|t| (t.operand, t.weight))
                .collect();
            let unit = terms.iter().fold(0, |g, &(_, w)| gcd(g, w));
            (unit != 0).then(|| TierScore {
                tier,
                terms: terms.into_iter().map(|(op, w)| (op, w / unit)).collect(),
            })
        })
        .collect()
}

fn narrow(value: i64) -> Result<i32, ModelError> {
    i32::try_from(value).map_err(|_| ModelError::Unrepresentable(value))
}

enum Rejected {
    /// Root propagation found the posted constraints contradictory
    Conflict,
    Model(ModelError),
}

impl From<ModelError> for Rejected {
    fn from(err: ModelError) -> Self {
        Rejected::Model(err)
    }
}

enum Stage {
    Optimal(Vec<bool>),
    Satisfiable(Vec<bool>),
    Infeasible,
    Unknown,
}

/// A fresh Pumpkin solver holding the whole model
struct Encoding<'a> {
    solver: Solver,
    intervals: &'a [Interval],
    decisions: Vec<Var>,
    aux: Vec<Var>,
}

impl<'a> Encoding<'a> {
    fn new(model: &ConstraintModel, intervals: &'a [Interval]) -> Result<Self, Rejected> {
        let mut solver = Solver::default();
        let decisions = (0..model.num_decisions())
            .map(|_| solver.new_bounded_integer(0, 1).scaled(1))
            .collect();
        let mut encoding = Self {
            solver,
            intervals,
            decisions,
            aux: Vec::with_capacity(model.aux().len()),
        };
        for c in model.constraints() {
            let terms: Vec<(Operand, i64)> = c.terms.iter().map(|&(d, k)| (d.into(), k)).collect();
            encoding.range(&terms, c.lower, c.upper)?;
        }
        for (index, var) in model.aux().iter().enumerate() {
            let aux = encoding.define(intervals[index], &var.definition)?;
            encoding.aux.push(aux);
        }
        Ok(encoding)
    }

    fn var(&self, op: Operand) -> Var {
        match op {
            Operand::Decision(id) => self.decisions[id.index()],
            Operand::Aux(id) => self.aux[id.index()],
        }
    }

    fn interval(&self, op: Operand) -> Interval {
        match op {
            Operand::Decision(_) => (0, 1),
            Operand::Aux(id) => self.intervals[id.index()],
        }
    }

    fn span(&self, terms: &[(Operand, i64)]) -> Interval {
        terms.iter().fold((0, 0), |(lo, hi), &(op, coef)| {
            let (a, b) = self.interval(op);
            if coef >= 0 {
                (lo + coef * a, hi + coef * b)
            } else {
                (lo + coef * b, hi + coef * a)
            }
        })
    }

    fn linear(&self, terms: &[(Operand, i64)]) -> Result<Vec<Var>, ModelError> {
        terms
            .iter()
            .filter(|(_, coef)| *coef != 0)
            .map(|&(op, coef)| Ok(self.var(op).scaled(narrow(coef)?)))
            .collect()
    }

    fn constant(&mut self, value: i64) -> Result<Var, ModelError> {
        let v = narrow(value)?;
        Ok(self.solver.new_bounded_integer(v, v).scaled(1))
    }

    fn fresh(&mut self, (lo, hi): Interval) -> Result<Var, ModelError> {
        Ok(self.solver.new_bounded_integer(narrow(lo)?, narrow(hi)?).scaled(1))
    }

    /// `lower <= Σ coef·op <= upper`, skipping sides that always hold
    fn range(&mut self, terms: &[(Operand, i64)], lower: i64, upper: i64) -> Result<(), Rejected> {
        let (lo, hi) = self.span(terms);
        if lower > hi || upper < lo {
            return Err(Rejected::Conflict);
        }
        let vars = self.linear(terms)?;
        if vars.is_empty() {
            return Ok(());
        }
        if lower == upper && lo < hi {
            let tag = self.solver.new_constraint_tag();
            return self
                .solver
                .add_constraint(cp::equals(vars, narrow(lower)?, tag))
                .post()
                .map_err(|_| Rejected::Conflict);
        }
        if lower > lo {
            let tag = self.solver.new_constraint_tag();
            self.solver
                .add_constraint(cp::greater_than_or_equals(vars.clone(), narrow(lower)?, tag))
                .post()
                .map_err(|_| Rejected::Conflict)?;
        }
        if upper < hi {
            let tag = self.solver.new_constraint_tag();
            self.solver
                .add_constraint(cp::less_than_or_equals(vars, narrow(upper)?, tag))
                .post()
                .map_err(|_| Rejected::Conflict)?;
        }
        Ok(())
    }

    fn define(&mut self, interval: Interval, definition: &Definition) -> Result<Var, Rejected> {
        // settled before search: the interval is exact for every assignment
        if interval.0 == interval.1 {
            return Ok(self.constant(interval.0)?);
        }
        match definition {
            Definition::Sum(terms) => {
                let aux = self.fresh(interval)?;
                let mut vars = self.linear(terms)?;
                vars.push(aux.scaled(-1));
                let tag = self.solver.new_constraint_tag();
                self.solver
                    .add_constraint(cp::equals(vars, 0, tag))
                    .post()
                    .map_err(|_| Rejected::Conflict)?;
                Ok(aux)
            }
            Definition::Indicator { operand, cmp, rhs } => {
                let lhs = vec![self.var(*operand)];
                self.reified(*cmp, lhs, *rhs)
            }
            Definition::AllOf(ops) => {
                let mut nonzero = Vec::with_capacity(ops.len());
                for &op in ops {
                    let (lo, hi) = self.interval(op);
                    let var = self.var(op);
                    if lo > 0 || hi < 0 {
                        continue;
                    }
                    if (lo, hi) == (0, 1) {
                        nonzero.push(var);
                        continue;
                    }
                    let literal = self.solver.new_literal();
                    let tag = self.solver.new_constraint_tag();
                    self.solver
                        .add_constraint(cp::not_equals(vec![var], 0, tag))
                        .reify(literal)
                        .map_err(|_| Rejected::Conflict)?;
                    nonzero.push(literal.get_integer_variable());
                }
                if nonzero.is_empty() {
                    return Ok(self.constant(1)?);
                }
                let k = nonzero.len() as i64;
                self.reified(Comparison::Ge, nonzero, k)
            }
            Definition::Max(ops) | Definition::Min(ops) => {
                let aux = self.fresh(interval)?;
                let array: Vec<Var> = ops.iter().map(|&op| self.var(op)).collect();
                let tag = self.solver.new_constraint_tag();
                let posted = if matches!(definition, Definition::Max(_)) {
                    self.solver.add_constraint(cp::maximum(array, aux, tag)).post()
                } else {
                    self.solver.add_constraint(cp::minimum(array, aux, tag)).post()
                };
                posted.map_err(|_| Rejected::Conflict)?;
                Ok(aux)
            }
        }
    }

    /// A 0/1 variable equal to `Σ lhs cmp rhs`
    fn reified(&mut self, cmp: Comparison, lhs: Vec<Var>, rhs: i64) -> Result<Var, Rejected> {
        let rhs = narrow(rhs)?;
        let literal = self.solver.new_literal();
        let tag = self.solver.new_constraint_tag();
        let posted = match cmp {
            Comparison::Eq => self.solver.add_constraint(cp::equals(lhs, rhs, tag)).reify(literal),
            Comparison::Le => self
                .solver
                .add_constraint(cp::less_than_or_equals(lhs, rhs, tag))
                .reify(literal),
            Comparison::Ge => self
                .solver
                .add_constraint(cp::greater_than_or_equals(lhs, rhs, tag))
                .reify(literal),
        };
        posted.map_err(|_| Rejected::Conflict)?;
        Ok(literal.get_integer_variable())
    }

    fn read<S: ProblemSolution>(&self, solution: &S) -> Vec<bool> {
        self.decisions.iter().map(|&v| solution.get_integer_value(v) != 0).collect()
    }
}

impl CpSearch {
    /// Minimize `scores[stage]` with every earlier tier held at its bound
    fn stage(
        &self,
        model: &ConstraintModel,
        intervals: &[Interval],
        scores: &[TierScore],
        bounds: &[i64],
        budget: Duration,
    ) -> Result<Stage, ModelError> {
        let mut encoding = match Encoding::new(model, intervals) {
            Ok(encoding) => encoding,
            Err(Rejected::Conflict) => return Ok(Stage::Infeasible),
            Err(Rejected::Model(err)) => return Err(err),
        };

        for (score, &bound) in scores.iter().zip(bounds) {
            match encoding.range(&score.terms, i64::MIN, bound) {
                Ok(()) => {}
                Err(Rejected::Conflict) => return Ok(Stage::Infeasible),
                Err(Rejected::Model(err)) => return Err(err),
            }
        }

        let terms = scores.get(bounds.len()).map_or(&[][..], |s| s.terms.as_slice());
        let (lo, hi) = encoding.span(terms);
        let objective = encoding.solver.new_bounded_integer(narrow(lo)?, narrow(hi)?);
        let mut vars = encoding.linear(terms)?;
        vars.push(objective.scaled(-1));
        let tag = encoding.solver.new_constraint_tag();
        if encoding.solver.add_constraint(cp::equals(vars, 0, tag)).post().is_err() {
            return Ok(Stage::Infeasible);
        }

        let mut brancher = encoding.solver.default_brancher();
        let mut termination = TimeBudget::starting_now(budget);

        fn noop_callback<B>(_: &Solver, _: SolutionReference, _: &B) {}
        let result = encoding.solver.optimise(
            &mut brancher,
            &mut termination,
            LinearSatUnsat::new(OptimisationDirection::Minimise, objective, noop_callback),
        );

        Ok(match result {
            OptimisationResult::Optimal(solution) => Stage::Optimal(encoding.read(&solution)),
            OptimisationResult::Satisfiable(solution) => {
                Stage::Satisfiable(encoding.read(&solution))
            }
            OptimisationResult::Unsatisfiable => Stage::Infeasible,
            OptimisationResult::Unknown => Stage::Unknown,
        })
    }
}

impl SolverBackend for CpSearch {
    fn name(&self) -> &'static str {
        "cp"
    }

    fn solve(
        &self,
        model: &ConstraintModel,
        limits: &SearchLimits,
    ) -> Result<SearchOutcome, ModelError> {
        let started = Instant::now();
        let mut intervals = Vec::with_capacity(model.aux().len());
        model.aux_intervals(&vec![None; model.num_decisions()], &mut intervals);
        let scores = tier_scores(model);

        info!(
            decisions = model.num_decisions(),
            constraints = model.constraints().len(),
            aux = model.aux().len(),
            tiers = scores.len(),
            time_limit = ?limits.time_limit,
            "cp search started"
        );

        let mut bounds: Vec<i64> = Vec::with_capacity(scores.len());
        let mut best: Option<Vec<bool>> = None;
        let mut solutions = 0;
        let mut status = SearchStatus::Optimal;

        // a model without objective terms still needs one satisfaction stage
        for stage in 0..scores.len().max(1) {
            let budget = limits.time_limit.saturating_sub(started.elapsed());
            let tier = scores.get(stage).map(|s| s.tier);
            match self.stage(model, &intervals, &scores, &bounds, budget)? {
                Stage::Optimal(values) => {
                    solutions += 1;
                    if let Some(score) = scores.get(stage) {
                        let value = score.value(model, &values);
                        debug!(?tier, score = value, elapsed = ?started.elapsed(), "tier proven");
                        bounds.push(value);
                    }
                    best = Some(values);
                }
                Stage::Satisfiable(values) => {
                    solutions += 1;
                    status = SearchStatus::Feasible;
                    let improves = best.as_ref().map_or(true, |held| {
                        model.evaluate(&values).objective() < model.evaluate(held).objective()
                    });
                    if improves {
                        best = Some(values);
                    }
                    break;
                }
                Stage::Infeasible | Stage::Unknown if best.is_some() => {
                    warn!(?tier, "tier not proven in time; keeping the previous stage's solution");
                    status = SearchStatus::Feasible;
                    break;
                }
                Stage::Infeasible => {
                    status = SearchStatus::Infeasible;
                    break;
                }
                Stage::Unknown => {
                    status = SearchStatus::Unknown;
                    break;
                }
            }
        }

        let stats = SearchStats {
            nodes: 0,
            solutions,
            workers: 1,
            wall_time: started.elapsed(),
        };
        let objective = best.as_ref().map(|values| model.evaluate(values).objective());

        info!(%status, objective, elapsed = ?stats.wall_time, "cp search finished");

        Ok(SearchOutcome {
            status,
            values: best,
            objective,
            stats,
        })
    }
}
