//! Interchangeable assignment strategies.
//!
//! | Strategy                 | Guarantee                                     |
//! |--------------------------|-----------------------------------------------|
//! | [`ExactAssigner`]        | optimal; Hungarian when robots have capacity  |
//! | [`RandomSearchAssigner`] | none; best of N seeded random samples         |
//!
//! Both solve: minimise Σ cost[r][t]·x[r][t] such that every task goes to
//! exactly one robot.  Robots may take zero or many tasks unless a capacity
//! is set.

use agv_core::SimRng;
use tracing::debug;

use crate::{Assignment, CostMatrix, OptimizeError, OptimizeResult};

/// Strategy interface selected by configuration.
pub trait Assigner {
    fn assign(&mut self, costs: &CostMatrix) -> OptimizeResult<Assignment>;

    fn name(&self) -> &'static str;

    /// Most tasks one robot may take per solve.  A matrix with more tasks
    /// than `robots × capacity` is `Infeasible`; callers size their batch.
    fn capacity(&self) -> Option<usize> {
        None
    }
}

/// Shared preconditions: zero tasks short-circuits, zero robots with work is
/// infeasible, and `capacity` must leave room for every task.
fn trivial_case(costs: &CostMatrix, capacity: Option<usize>) -> OptimizeResult<Option<Assignment>> {
    if costs.tasks() == 0 {
        return Ok(Some(Assignment::empty()));
    }
    if costs.robots() == 0 {
        return Err(OptimizeError::Infeasible(format!("{} tasks but no robots", costs.tasks())));
    }
    if let Some(cap) = capacity {
        let slots = costs.robots() * cap;
        if slots < costs.tasks() {
            return Err(OptimizeError::Infeasible(format!(
                "{} tasks exceed {} robot slots",
                costs.tasks(),
                slots
            )));
        }
    }
    Ok(None)
}

// ── ExactAssigner ─────────────────────────────────────────────────────────────

/// Optimal assignment.
///
/// Without a capacity the constraint matrix is one-sided (only tasks must be
/// covered), so the optimum decomposes per task: each task goes to its
/// cheapest robot, ties to the lowest robot index.  With a capacity the
/// problem becomes a transportation problem, solved exactly by the Hungarian
/// algorithm over `capacity` slots per robot.
#[derive(Clone, Debug, Default)]
pub struct ExactAssigner {
    capacity: Option<usize>,
}

impl ExactAssigner {
    pub fn new() -> Self {
        Self { capacity: None }
    }

    /// Limit each robot to at most `capacity` tasks per solve.
    pub fn with_capacity(capacity: usize) -> Self {
        Self { capacity: Some(capacity) }
    }

    fn column_minima(costs: &CostMatrix) -> OptimizeResult<Assignment> {
        let mut task_to_robot = Vec::with_capacity(costs.tasks());
        for t in 0..costs.tasks() {
            let mut best: Option<(usize, f64)> = None;
            for r in 0..costs.robots() {
                let c = costs.get(r, t);
                if c.is_finite() && best.is_none_or(|(_, b)| c < b) {
                    best = Some((r, c));
                }
            }
            let (r, _) = best.ok_or_else(|| {
                OptimizeError::Infeasible(format!("task {t} is unreachable for every robot"))
            })?;
            task_to_robot.push(r);
        }
        let objective = costs.objective(&task_to_robot);
        Ok(Assignment { task_to_robot, objective })
    }

    fn hungarian(costs: &CostMatrix, capacity: usize) -> OptimizeResult<Assignment> {
        let n = costs.tasks();
        let m = costs.robots() * capacity;

        // Forbidden pairs get a finite penalty larger than any feasible total
        // so the potentials stay finite; picking one means infeasibility.
        let finite_sum: f64 = (0..costs.robots())
            .flat_map(|r| (0..n).map(move |t| (r, t)))
            .map(|(r, t)| costs.get(r, t))
            .filter(|c| c.is_finite())
            .map(f64::abs)
            .sum();
        let forbidden = (finite_sum + 1.0) * 2.0;
        let cell = |task: usize, slot: usize| {
            let c = costs.get(slot / capacity, task);
            if c.is_finite() { c } else { forbidden }
        };

        // 1-indexed potentials; p[j] = task (1-based) holding slot j.
        let mut u = vec![0.0f64; n + 1];
        let mut v = vec![0.0f64; m + 1];
        let mut p = vec![0usize; m + 1];
        let mut way = vec![0usize; m + 1];

        for i in 1..=n {
            p[0] = i;
            let mut j0 = 0usize;
            let mut minv = vec![f64::INFINITY; m + 1];
            let mut used = vec![false; m + 1];
            loop {
                used[j0] = true;
                let i0 = p[j0];
                let mut delta = f64::INFINITY;
                let mut j1 = 0usize;
                for j in 1..=m {
                    if used[j] {
                        continue;
                    }
                    let cur = cell(i0 - 1, j - 1) - u[i0] - v[j];
                    if cur < minv[j] {
                        minv[j] = cur;
                        way[j] = j0;
                    }
                    if minv[j] < delta {
                        delta = minv[j];
                        j1 = j;
                    }
                }
                for j in 0..=m {
                    if used[j] {
                        u[p[j]] += delta;
                        v[j] -= delta;
                    } else {
                        minv[j] -= delta;
                    }
                }
                j0 = j1;
                if p[j0] == 0 {
                    break;
                }
            }
            loop {
                let j1 = way[j0];
                p[j0] = p[j1];
                j0 = j1;
                if j0 == 0 {
                    break;
                }
            }
        }

        let mut task_to_robot = vec![usize::MAX; n];
        for j in 1..=m {
            if p[j] != 0 {
                task_to_robot[p[j] - 1] = (j - 1) / capacity;
            }
        }
        if let Some(t) = task_to_robot
            .iter()
            .enumerate()
            .position(|(t, &r)| r == usize::MAX || !costs.get(r, t).is_finite())
        {
            return Err(OptimizeError::Infeasible(format!(
                "task {t} cannot be placed within robot capacity {capacity}"
            )));
        }
        let objective = costs.objective(&task_to_robot);
        Ok(Assignment { task_to_robot, objective })
    }
}

impl Assigner for ExactAssigner {
    fn assign(&mut self, costs: &CostMatrix) -> OptimizeResult<Assignment> {
        if let Some(done) = trivial_case(costs, self.capacity)? {
            return Ok(done);
        }
        let result = match self.capacity {
            None => Self::column_minima(costs),
            Some(cap) => Self::hungarian(costs, cap),
        }?;
        debug!(
            robots = costs.robots(),
            tasks = costs.tasks(),
            objective = result.objective,
            "exact assignment solved"
        );
        Ok(result)
    }

    fn name(&self) -> &'static str {
        "exact"
    }

    fn capacity(&self) -> Option<usize> {
        self.capacity
    }
}

// ── RandomSearchAssigner ──────────────────────────────────────────────────────

/// Baseline: sample `iterations` uniformly random assignments and keep the
/// cheapest feasible one.  No optimality guarantee; deterministic for a
/// given seed.
pub struct RandomSearchAssigner {
    iterations: usize,
    capacity:   Option<usize>,
    rng:        SimRng,
}

impl RandomSearchAssigner {
    pub fn new(iterations: usize, seed: u64) -> Self {
        Self { iterations, capacity: None, rng: SimRng::new(seed) }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    fn sample(&mut self, costs: &CostMatrix, load: &mut [usize]) -> Option<Vec<usize>> {
        load.iter_mut().for_each(|l| *l = 0);
        let mut task_to_robot = Vec::with_capacity(costs.tasks());
        for t in 0..costs.tasks() {
            let r = self.rng.gen_range(0..costs.robots());
            load[r] += 1;
            let over = self.capacity.is_some_and(|cap| load[r] > cap);
            if over || !costs.get(r, t).is_finite() {
                return None;
            }
            task_to_robot.push(r);
        }
        Some(task_to_robot)
    }
}

impl Assigner for RandomSearchAssigner {
    fn assign(&mut self, costs: &CostMatrix) -> OptimizeResult<Assignment> {
        if let Some(done) = trivial_case(costs, self.capacity)? {
            return Ok(done);
        }
        let mut load = vec![0usize; costs.robots()];
        let mut best: Option<Assignment> = None;
        for _ in 0..self.iterations {
            let Some(candidate) = self.sample(costs, &mut load) else {
                continue;
            };
            let objective = costs.objective(&candidate);
            if best.as_ref().is_none_or(|b| objective < b.objective) {
                best = Some(Assignment { task_to_robot: candidate, objective });
            }
        }
        best.ok_or_else(|| {
            OptimizeError::Infeasible(format!(
                "no feasible sample in {} iterations",
                self.iterations
            ))
        })
    }

    fn name(&self) -> &'static str {
        "random-search"
    }

    fn capacity(&self) -> Option<usize> {
        self.capacity
    }
}
