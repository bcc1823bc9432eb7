//! Single-robot tour ordering (the TSP engine).
//!
//! A tour starts at the robot's node and visits every [`Stop`] once.  A stop
//! costs its approach leg (previous stop's end → its pickup) plus its service
//! leg (pickup → dropoff).  Every stop's service leg is charged, the last
//! one included, so `marginal_cost` compares like with like.
//!
//! Up to [`TourPlanner::DEFAULT_EXACT_LIMIT`] stops are solved exactly by the
//! Held–Karp dynamic programme; longer lists fall back to nearest-neighbour
//! construction plus 2-opt.

use agv_core::NodeId;
use agv_spatial::PathPlanner;

use crate::OptimizeResult;

/// Travel-distance oracle between graph nodes.
pub trait TravelCost {
    fn travel(&self, from: NodeId, to: NodeId) -> OptimizeResult<f64>;
}

impl TravelCost for PathPlanner {
    fn travel(&self, from: NodeId, to: NodeId) -> OptimizeResult<f64> {
        Ok(self.distance(from, to)?)
    }
}

impl<C: TravelCost + ?Sized> TravelCost for &C {
    fn travel(&self, from: NodeId, to: NodeId) -> OptimizeResult<f64> {
        (**self).travel(from, to)
    }
}

/// One job in a tour.  `dropoff: None` is a single-point job (e.g. a
/// charging station visit).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Stop {
    pub pickup:  NodeId,
    pub dropoff: Option<NodeId>,
}

impl Stop {
    pub fn new(pickup: NodeId, dropoff: Option<NodeId>) -> Self {
        Self { pickup, dropoff }
    }

    fn end(&self) -> NodeId {
        self.dropoff.unwrap_or(self.pickup)
    }
}

/// A solved visiting order: indices into the input stop list.
#[derive(Clone, Debug, PartialEq)]
pub struct Tour {
    pub order: Vec<usize>,
    pub cost:  f64,
}

/// Pairwise distances for one planning call.
struct Legs {
    approach: Vec<f64>,
    service:  Vec<f64>,
    /// `link[i][j]` = end of stop i → pickup of stop j.
    link: Vec<Vec<f64>>,
}

impl Legs {
    fn cost(&self, order: &[usize]) -> f64 {
        let Some(&first) = order.first() else {
            return 0.0;
        };
        let mut total = self.approach[first];
        for w in order.windows(2) {
            total += self.link[w[0]][w[1]];
        }
        total + order.iter().map(|&i| self.service[i]).sum::<f64>()
    }
}

pub struct TourPlanner<C: TravelCost> {
    cost:        C,
    exact_limit: usize,
}

impl<C: TravelCost> TourPlanner<C> {
    pub const DEFAULT_EXACT_LIMIT: usize = 10;

    pub fn new(cost: C) -> Self {
        Self { cost, exact_limit: Self::DEFAULT_EXACT_LIMIT }
    }

    /// Largest stop count solved exactly.
    pub fn with_exact_limit(mut self, limit: usize) -> Self {
        self.exact_limit = limit;
        self
    }

    /// Minimum-distance visiting order of `stops` from `start`.
    pub fn plan(&self, start: NodeId, stops: &[Stop]) -> OptimizeResult<Tour> {
        if stops.is_empty() {
            return Ok(Tour { order: Vec::new(), cost: 0.0 });
        }
        let legs = self.legs(start, stops)?;
        let order = if stops.len() <= self.exact_limit {
            held_karp(&legs)
        } else {
            two_opt(&legs, nearest_neighbour(&legs))
        };
        let cost = legs.cost(&order);
        Ok(Tour { order, cost })
    }

    /// Cost of visiting `stops` in exactly the given order.
    pub fn cost_in_order(&self, start: NodeId, stops: &[Stop]) -> OptimizeResult<f64> {
        let legs = self.legs(start, stops)?;
        let order: Vec<usize> = (0..stops.len()).collect();
        Ok(legs.cost(&order))
    }

    /// Extra distance of adding `candidate` to the robot's current work:
    /// optimal tour with it minus optimal tour without it.
    pub fn marginal_cost(&self, start: NodeId, current: &[Stop], candidate: Stop) -> OptimizeResult<f64> {
        let without = self.plan(start, current)?.cost;
        let mut extended = current.to_vec();
        extended.push(candidate);
        let with = self.plan(start, &extended)?.cost;
        Ok(with - without)
    }

    fn legs(&self, start: NodeId, stops: &[Stop]) -> OptimizeResult<Legs> {
        let n = stops.len();
        let mut approach = Vec::with_capacity(n);
        let mut service = Vec::with_capacity(n);
        for s in stops {
            approach.push(self.cost.travel(start, s.pickup)?);
            service.push(match s.dropoff {
                Some(d) => self.cost.travel(s.pickup, d)?,
                None => 0.0,
            });
        }
        let mut link = vec![vec![0.0; n]; n];
        for (i, a) in stops.iter().enumerate() {
            for (j, b) in stops.iter().enumerate() {
                if i != j {
                    link[i][j] = self.cost.travel(a.end(), b.pickup)?;
                }
            }
        }
        Ok(Legs { approach, service, link })
    }
}

// ── Solvers ───────────────────────────────────────────────────────────────────

/// Exact DP over subsets.  `dp[mask][j]` = cheapest way to serve `mask`
/// finishing at stop `j`.  Ties keep the lower predecessor index.
fn held_karp(legs: &Legs) -> Vec<usize> {
    let n = legs.approach.len();
    let full = 1usize << n;
    let mut dp = vec![f64::INFINITY; full * n];
    let mut parent = vec![usize::MAX; full * n];

    for j in 0..n {
        dp[(1 << j) * n + j] = legs.approach[j] + legs.service[j];
    }
    for mask in 1..full {
        for last in 0..n {
            let here = dp[mask * n + last];
            if mask & (1 << last) == 0 || !here.is_finite() {
                continue;
            }
            for next in 0..n {
                if mask & (1 << next) != 0 {
                    continue;
                }
                let to = mask | (1 << next);
                let c = here + legs.link[last][next] + legs.service[next];
                if c < dp[to * n + next] {
                    dp[to * n + next] = c;
                    parent[to * n + next] = last;
                }
            }
        }
    }

    let last_mask = full - 1;
    let mut end = 0;
    for j in 1..n {
        if dp[last_mask * n + j] < dp[last_mask * n + end] {
            end = j;
        }
    }

    let mut order = Vec::with_capacity(n);
    let mut mask = last_mask;
    let mut cur = end;
    while cur != usize::MAX {
        order.push(cur);
        let prev = parent[mask * n + cur];
        mask &= !(1 << cur);
        cur = prev;
    }
    order.reverse();
    order
}

fn nearest_neighbour(legs: &Legs) -> Vec<usize> {
    let n = legs.approach.len();
    let mut visited = vec![false; n];
    let mut order = Vec::with_capacity(n);
    let mut prev: Option<usize> = None;
    for _ in 0..n {
        let mut best: Option<(usize, f64)> = None;
        for j in (0..n).filter(|&j| !visited[j]) {
            let d = match prev {
                Some(p) => legs.link[p][j],
                None => legs.approach[j],
            };
            if best.is_none_or(|(_, b)| d < b) {
                best = Some((j, d));
            }
        }
        let Some((j, _)) = best else { break };
        visited[j] = true;
        order.push(j);
        prev = Some(j);
    }
    order
}

/// Segment-reversal improvement.  Links are directed, so each candidate is
/// re-costed in full.
fn two_opt(legs: &Legs, mut order: Vec<usize>) -> Vec<usize> {
    let n = order.len();
    let mut best = legs.cost(&order);
    let mut improved = true;
    while improved {
        improved = false;
        for i in 0..n.saturating_sub(1) {
            for k in i + 1..n {
                order[i..=k].reverse();
                let c = legs.cost(&order);
                if c + 1e-9 < best {
                    best = c;
                    improved = true;
                } else {
                    order[i..=k].reverse();
                }
            }
        }
    }
    order
}
