//! # rota-solver
//!
//! Weekly shift scheduler: constraint model, weighted objective, search and
//! solution extraction.
//!
//! This crate provides:
//! - A solver-neutral constraint model ([`model`])
//! - Hard scheduling rules over the valid slot set ([`constraints`])
//! - Soft measures combined into one strictly tiered objective ([`objective`], [`weights`])
//! - Search backends behind [`search::SolverBackend`]: Pumpkin constraint
//!   programming (feature `cp`, default) and a parallel branch-and-bound
//!   portfolio
//! - Schedule statistics ([`extract`]) and the request boundary ([`respond`])
//!
//! ## Example
//!
//! ```rust,no_run
//! use chrono::NaiveDate;
//! use rota_core::{Employee, ScheduleRequest};
//! use rota_solver::{ShiftScheduler, SolveOptions};
//!
//! let week = NaiveDate::from_ymd_opt(2025, 1, 5).unwrap();
//! let roster = vec![Employee::new("e1", "Dana"), Employee::new("e2", "Noa")];
//! let request = ScheduleRequest::new(week, roster);
//! let report = ShiftScheduler::new(SolveOptions::with_seed(42)).schedule(&request)?;
//! println!("objective {}", report.stats.objective_value);
//! # Ok::<(), rota_core::ScheduleError>(())
//! ```

use rand::rngs::StdRng;
use rand::SeedableRng;
use rota_core::availability::AvailabilityResolver;
use rota_core::calendar::WeekCalendar;
use rota_core::locks::LockTable;
use rota_core::response::{ScheduleReport, ScheduleResponse, SolveStatus};
use rota_core::{ScheduleError, ScheduleRequest};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::ops::RangeInclusive;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{error, info};

pub mod constraints;
pub mod extract;
pub mod model;
pub mod objective;
pub mod search;
pub mod weights;

use constraints::ShiftModel;
use model::{ConstraintModel, ModelBuilder, Tier};
use objective::ObjectiveLayout;
#[cfg(feature = "cp")]
use search::CpSearch;
use search::{PortfolioSearch, SearchLimits, SearchStatus, SolverBackend};

// ============================================================================
// Errors
// ============================================================================

/// Failures while building or searching the model
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Weight overflow in tier {0}")]
    WeightOverflow(Tier),

    #[error("Tier {tier} unit {unit} does not exceed lower tiers' worst case {lower}")]
    WeightMargin { tier: Tier, unit: i64, lower: i64 },

    #[error("Invalid policy: {0}")]
    Policy(String),

    #[error("Cannot start search workers: {0}")]
    Pool(String),

    #[error("Value {0} does not fit the constraint solver's 32-bit domains")]
    Unrepresentable(i64),

    #[error("Solver backend {0} is not compiled in")]
    Unavailable(Backend),
}

impl From<ModelError> for ScheduleError {
    fn from(err: ModelError) -> Self {
        ScheduleError::Internal(err.to_string())
    }
}

// ============================================================================
// Options
// ============================================================================

/// Tunable rules of the objective
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulingPolicy {
    /// Shifts below which an employee counts as under-loaded
    pub min_shifts: u32,
    /// Rest-gap (8-8) occurrences tolerated per employee before the higher tier applies
    pub rest_gap_cap: u32,
    /// Range of per-assignment tie-break weights
    pub tie_break_range: RangeInclusive<i64>,
    /// Range of the minimum-load unit weight
    pub min_load_weight_range: RangeInclusive<i64>,
}

impl Default for SchedulingPolicy {
    fn default() -> Self {
        Self {
            min_shifts: 3,
            rest_gap_cap: 1,
            tie_break_range: 1000..=3000,
            min_load_weight_range: 85..=115,
        }
    }
}

impl SchedulingPolicy {
    pub fn validate(&self) -> Result<(), ModelError> {
        for (name, range) in [
            ("tie_break_range", &self.tie_break_range),
            ("min_load_weight_range", &self.min_load_weight_range),
        ] {
            if range.is_empty() {
                return Err(ModelError::Policy(format!("{name} is empty")));
            }
            if *range.start() < 0 {
                return Err(ModelError::Policy(format!("{name} must not be negative")));
            }
        }
        if *self.min_load_weight_range.start() == 0 {
            return Err(ModelError::Policy("min_load_weight_range must start above 0".into()));
        }
        Ok(())
    }
}

/// Which search runs the model
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Backend {
    /// Pumpkin constraint programming, tier by tier
    Cp,
    /// Parallel depth-first branch and bound
    BranchAndBound,
}

impl Default for Backend {
    fn default() -> Self {
        if cfg!(feature = "cp") {
            Backend::Cp
        } else {
            Backend::BranchAndBound
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Backend::Cp => "cp",
            Backend::BranchAndBound => "branch-and-bound",
        })
    }
}

/// Per-solve settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SolveOptions {
    pub time_limit: Duration,
    /// Branch-and-bound workers; the CP backend is single-threaded
    pub workers: usize,
    /// Seeds the tie-break weights and the worker branching orders
    pub seed: u64,
    pub policy: SchedulingPolicy,
    pub backend: Backend,
}

impl SolveOptions {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            time_limit: Duration::from_secs(60),
            workers: 8,
            seed: 0,
            policy: SchedulingPolicy::default(),
            backend: Backend::default(),
        }
    }
}

/// Seed derived from the wall clock, for callers that want varied schedules
pub fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs() ^ u64::from(d.subsec_nanos()))
}

// ============================================================================
// Model Construction
// ============================================================================

/// A request turned into a searchable model
#[derive(Debug)]
pub struct BuiltModel {
    pub calendar: WeekCalendar,
    pub locks: LockTable,
    pub shifts: ShiftModel,
    pub layout: ObjectiveLayout,
    pub model: ConstraintModel,
}

/// Calendar, availability, locks, hard rules and objective in one pass
pub fn build_model(
    request: &ScheduleRequest,
    policy: &SchedulingPolicy,
    seed: u64,
) -> Result<BuiltModel, ModelError> {
    policy.validate()?;
    let calendar = WeekCalendar::build(request.week_start, &request.holidays);
    let resolver = AvailabilityResolver::new(request, &calendar);
    let locks = LockTable::resolve(request, &calendar, &resolver);

    let mut builder = ModelBuilder::new();
    let shifts =
        constraints::build_shift_model(&mut builder, request, &calendar, &resolver, &locks);
    let mut rng = StdRng::seed_from_u64(seed);
    let layout = objective::compose(&mut builder, &shifts, policy, &mut rng)?;

    Ok(BuiltModel {
        calendar,
        locks,
        shifts,
        layout,
        model: builder.build(),
    })
}

// ============================================================================
// Scheduler
// ============================================================================

/// Builds, searches and extracts one schedule per request
#[derive(Clone, Debug, Default)]
pub struct ShiftScheduler {
    options: SolveOptions,
}

impl ShiftScheduler {
    pub fn new(options: SolveOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &SolveOptions {
        &self.options
    }

    /// Solve with the backend named in the options
    pub fn schedule(&self, request: &ScheduleRequest) -> Result<ScheduleReport, ScheduleError> {
        match self.options.backend {
            #[cfg(feature = "cp")]
            Backend::Cp => self.schedule_with(request, &CpSearch::new()),
            #[cfg(not(feature = "cp"))]
            Backend::Cp => Err(ModelError::Unavailable(Backend::Cp).into()),
            Backend::BranchAndBound => {
                let backend = PortfolioSearch::new(self.options.workers, self.options.seed);
                self.schedule_with(request, &backend)
            }
        }
    }

    pub fn schedule_with(
        &self,
        request: &ScheduleRequest,
        backend: &dyn SolverBackend,
    ) -> Result<ScheduleReport, ScheduleError> {
        info!(
            employees = request.employees.len(),
            week = %request.week_start,
            seed = self.options.seed,
            backend = backend.name(),
            "received request"
        );
        let built = build_model(request, &self.options.policy, self.options.seed)?;
        let limits = SearchLimits {
            time_limit: self.options.time_limit,
        };
        let outcome = backend.solve(&built.model, &limits)?;

        let status = match outcome.status {
            SearchStatus::Optimal => SolveStatus::Optimal,
            SearchStatus::Feasible => SolveStatus::Feasible,
            SearchStatus::Infeasible => {
                return Err(ScheduleError::Infeasible(format!(
                    "{} employees cannot cover {} required slots",
                    built.shifts.num_employees(),
                    built.shifts.required_slots().count()
                )))
            }
            SearchStatus::Unknown => {
                return Err(ScheduleError::SolverFailure(outcome.status.to_string()))
            }
        };
        let values = outcome.values.ok_or_else(|| {
            ScheduleError::Internal(format!("{status:?} search returned no solution"))
        })?;
        if values.len() != built.model.num_decisions() {
            return Err(ScheduleError::Internal(format!(
                "{} returned {} values for {} decisions",
                backend.name(),
                values.len(),
                built.model.num_decisions()
            )));
        }

        let broken = built.model.violations(&values);
        if !broken.is_empty() {
            let labels: BTreeSet<&str> = broken.iter().map(|c| c.label).collect();
            let labels: Vec<&str> = labels.into_iter().collect();
            error!(
                backend = backend.name(),
                broken = broken.len(),
                "solution breaks hard constraints"
            );
            return Err(ScheduleError::SolverFailure(format!(
                "{} from {}, but the solution breaks {} hard constraints ({})",
                outcome.status,
                backend.name(),
                broken.len(),
                labels.join(", ")
            )));
        }

        let report = extract::extract(
            &built,
            &values,
            extract::RunInfo {
                status,
                search: &outcome.stats,
                seed: self.options.seed,
                policy: &self.options.policy,
            },
        );
        Ok(report)
    }
}

// ============================================================================
// Request Boundary
// ============================================================================

/// Parse, validate and solve a JSON request; every failure becomes a response
pub fn respond(input: &str, options: &SolveOptions) -> ScheduleResponse {
    match ScheduleRequest::from_json(input) {
        Ok(request) => respond_request(&request, options),
        Err(e) => {
            let err = ScheduleError::from(e);
            error!(%err, "invalid request");
            ScheduleResponse::from_error(&err)
        }
    }
}

/// Solve an already validated request; panics are reported as internal errors
pub fn respond_request(request: &ScheduleRequest, options: &SolveOptions) -> ScheduleResponse {
    let scheduler = ShiftScheduler::new(options.clone());
    let result = panic::catch_unwind(AssertUnwindSafe(|| scheduler.schedule(request)))
        .unwrap_or_else(|payload| Err(ScheduleError::Internal(panic_message(payload.as_ref()))));
    if let Err(err) = &result {
        error!(%err, kind = ?err.kind(), "schedule failed");
    }
    ScheduleResponse::from(result)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "solver panicked".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rota_core::{Employee, FailureKind};

    #[test]
    fn default_policy() {
        let policy = SchedulingPolicy::default();
        assert_eq!(policy.min_shifts, 3);
        assert_eq!(policy.rest_gap_cap, 1);
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn empty_ranges_rejected() {
        #[allow(clippy::reversed_empty_ranges)]
        let policy = SchedulingPolicy {
            tie_break_range: 10..=5,
            ..SchedulingPolicy::default()
        };
        assert!(matches!(policy.validate(), Err(ModelError::Policy(_))));
    }

    #[test]
    fn policy_partial_json() {
        let policy: SchedulingPolicy = serde_json::from_str(r#"{"min_shifts": 2}"#).unwrap();
        assert_eq!(policy.min_shifts, 2);
        assert_eq!(policy.tie_break_range, 1000..=3000);
    }

    #[test]
    fn model_errors_become_internal() {
        let err: ScheduleError = ModelError::Pool("no threads".into()).into();
        assert_eq!(err.kind(), FailureKind::Exception);
    }

    #[test]
    fn backend_names() {
        let json = serde_json::to_string(&Backend::BranchAndBound).unwrap();
        assert_eq!(json, r#""branch-and-bound""#);
        let cp: Backend = serde_json::from_str(r#""cp""#).unwrap();
        assert_eq!(cp, Backend::Cp);
        assert_eq!(Backend::BranchAndBound.to_string(), "branch-and-bound");
    }

    #[cfg(feature = "cp")]
    #[test]
    fn cp_is_the_default_backend() {
        assert_eq!(SolveOptions::default().backend, Backend::Cp);
    }

    #[test]
    fn build_model_is_seeded() {
        let request = ScheduleRequest::new(
            NaiveDate::from_ymd_opt(2025, 1, 5).unwrap(),
            vec![Employee::new("e1", "Dana"), Employee::new("e2", "Noa")],
        );
        let policy = SchedulingPolicy::default();
        let a = build_model(&request, &policy, 9).unwrap();
        let b = build_model(&request, &policy, 9).unwrap();
        let c = build_model(&request, &policy, 10).unwrap();
        assert_eq!(a.layout.weights, b.layout.weights);
        assert_ne!(a.layout.weights.tie_break, c.layout.weights.tie_break);
        assert_eq!(a.model.num_decisions(), 32);
    }

    #[test]
    fn malformed_json_is_an_exception() {
        let response = respond("{not json", &SolveOptions::default());
        assert!(!response.success);
        assert_eq!(response.failure_report().unwrap().error, FailureKind::Exception);
        assert_eq!(response.exit_code(), 1);
    }

    #[test]
    fn missing_week_start_named() {
        let response = respond(r#"{"employees": [{"id": "e1"}]}"#, &SolveOptions::default());
        let failure = response.failure_report().unwrap();
        assert_eq!(failure.message, "Missing required field: weekStart");
    }
}
