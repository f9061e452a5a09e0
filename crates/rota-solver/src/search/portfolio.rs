//! Parallel portfolio of branch-and-bound workers.

use super::bnb::{Exit, Worker};
use super::incumbent::SharedIncumbent;
use super::{SearchLimits, SearchOutcome, SearchStats, SearchStatus, SolverBackend};
use crate::model::{ConstraintModel, DecisionId};
use crate::ModelError;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// Workers share one incumbent and stop together once any of them has
/// exhausted its tree or the time limit passes.
#[derive(Clone, Debug)]
pub struct PortfolioSearch {
    workers: usize,
    seed: u64,
}

impl PortfolioSearch {
    pub fn new(workers: usize, seed: u64) -> Self {
        Self {
            workers: workers.max(1),
            seed,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Branching order for one worker.
    ///
    /// Decisions are visited group by group (a group is one slot). Worker 0
    /// keeps the natural employee order inside each group; the others shuffle
    /// it with their own seed.
    fn branching_order(&self, model: &ConstraintModel, worker: usize) -> Vec<DecisionId> {
        let mut order: Vec<DecisionId> = model.decision_ids().collect();
        order.sort_by_key(|&d| model.decision_group(d));
        if worker == 0 {
            return order;
        }
        let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(worker as u64));
        let mut start = 0;
        while start < order.len() {
            let group = model.decision_group(order[start]);
            let len = order[start..]
                .iter()
                .take_while(|&&d| model.decision_group(d) == group)
                .count();
            order[start..start + len].shuffle(&mut rng);
            start += len;
        }
        order
    }
}

impl Default for PortfolioSearch {
    fn default() -> Self {
        Self::new(8, 0)
    }
}

impl SolverBackend for PortfolioSearch {
    fn name(&self) -> &'static str {
        "portfolio-bnb"
    }

    fn solve(
        &self,
        model: &ConstraintModel,
        limits: &SearchLimits,
    ) -> Result<SearchOutcome, ModelError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("rota-search-{i}"))
            .build()
            .map_err(|e| ModelError::Pool(e.to_string()))?;

        let started = Instant::now();
        let deadline = started.checked_add(limits.time_limit);
        let incumbent = SharedIncumbent::new();
        let stop = AtomicBool::new(false);

        info!(
            workers = self.workers,
            decisions = model.num_decisions(),
            constraints = model.constraints().len(),
            time_limit = ?limits.time_limit,
            "search started"
        );

        let runs: Vec<(Exit, u64, u64)> = pool.install(|| {
            (0..self.workers)
                .into_par_iter()
                .map(|w| {
                    let order = self.branching_order(model, w);
                    let mut worker = Worker::new(model, order, &incumbent, &stop, deadline);
                    let exit = worker.run();
                    if exit == Exit::Exhausted {
                        stop.store(true, Ordering::Relaxed);
                    }
                    debug!(
                        worker = w,
                        ?exit,
                        nodes = worker.nodes,
                        solutions = worker.solutions,
                        "worker finished"
                    );
                    (exit, worker.nodes, worker.solutions)
                })
                .collect()
        });

        let exhausted = runs.iter().any(|(exit, _, _)| *exit == Exit::Exhausted);
        let stats = SearchStats {
            nodes: runs.iter().map(|r| r.1).sum(),
            solutions: runs.iter().map(|r| r.2).sum(),
            workers: self.workers,
            wall_time: started.elapsed(),
        };
        let best = incumbent.into_inner();
        let status = match (exhausted, best.is_some()) {
            (true, true) => SearchStatus::Optimal,
            (true, false) => SearchStatus::Infeasible,
            (false, true) => SearchStatus::Feasible,
            (false, false) => SearchStatus::Unknown,
        };

        info!(
            %status,
            objective = best.as_ref().map(|b| b.objective),
            nodes = stats.nodes,
            elapsed = ?stats.wall_time,
            "search finished"
        );

        Ok(SearchOutcome {
            status,
            objective: best.as_ref().map(|b| b.objective),
            values: best.map(|b| b.values),
            stats,
        })
    }
}
