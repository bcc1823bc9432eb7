//! Cost matrix and assignment result.

use crate::{OptimizeError, OptimizeResult};

/// Dense robots × tasks cost matrix, row-major.
#[derive(Clone, Debug, PartialEq)]
pub struct CostMatrix {
    robots: usize,
    tasks:  usize,
    data:   Vec<f64>,
}

impl CostMatrix {
    pub fn new(robots: usize, tasks: usize, fill: f64) -> Self {
        Self { robots, tasks, data: vec![fill; robots * tasks] }
    }

    /// Build from one row per robot.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> OptimizeResult<Self> {
        let robots = rows.len();
        let tasks = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(robots * tasks);
        for (row, r) in rows.into_iter().enumerate() {
            if r.len() != tasks {
                return Err(OptimizeError::RaggedMatrix { row, expected: tasks, got: r.len() });
            }
            data.extend(r);
        }
        Ok(Self { robots, tasks, data })
    }

    pub fn robots(&self) -> usize {
        self.robots
    }

    pub fn tasks(&self) -> usize {
        self.tasks
    }

    #[inline]
    pub fn get(&self, robot: usize, task: usize) -> f64 {
        self.data[robot * self.tasks + task]
    }

    #[inline]
    pub fn set(&mut self, robot: usize, task: usize, cost: f64) {
        self.data[robot * self.tasks + task] = cost;
    }

    /// Total cost of `task_to_robot`.
    pub fn objective(&self, task_to_robot: &[usize]) -> f64 {
        task_to_robot
            .iter()
            .enumerate()
            .map(|(t, &r)| self.get(r, t))
            .sum()
    }
}

/// A solved assignment: `task_to_robot[t]` is the row index of the robot
/// that takes task `t`.
#[derive(Clone, Debug, PartialEq)]
pub struct Assignment {
    pub task_to_robot: Vec<usize>,
    pub objective:     f64,
}

impl Assignment {
    pub fn empty() -> Self {
        Self { task_to_robot: Vec::new(), objective: 0.0 }
    }

    /// The 0/1 robots × tasks decision matrix.
    pub fn matrix(&self, robots: usize) -> Vec<Vec<u8>> {
        let mut m = vec![vec![0u8; self.task_to_robot.len()]; robots];
        for (t, &r) in self.task_to_robot.iter().enumerate() {
            m[r][t] = 1;
        }
        m
    }

    /// Task indices assigned to `robot`, ascending.
    pub fn tasks_of(&self, robot: usize) -> Vec<usize> {
        self.task_to_robot
            .iter()
            .enumerate()
            .filter(|&(_, &r)| r == robot)
            .map(|(t, _)| t)
            .collect()
    }
}
