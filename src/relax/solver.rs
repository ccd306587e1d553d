//! Relaxation labelling
//!
//! A problem is a table of variables, each with a list of candidate labels
//! and their initial weights. Constraints attach to one (variable, label)
//! cell and pull its weight up or down according to the current weights of
//! other cells. Each iteration reads one weight buffer and writes the other,
//! then flips them, so every update sees the same snapshot.

use serde::{Deserialize, Serialize};

use crate::errors::{LingError, Result};

/// A (variable, label) coordinate.
pub type Cell = (usize, usize);

/// Cells whose current weights are summed. A constraint multiplies the sums
/// of its groups.
pub type TermGroup = Vec<Cell>;

// ============================================================================
// Configuration
// ============================================================================

/// Solver parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelaxConfig {
    /// Iteration cap.
    pub max_iterations: usize,
    /// Support is clamped to `±scale_factor` and divided by it.
    pub scale_factor: f64,
    /// Weights moving less than this in one iteration count as stable.
    pub epsilon: f64,
}

impl Default for RelaxConfig {
    fn default() -> Self {
        Self {
            max_iterations: 500,
            scale_factor: 670.0,
            epsilon: 0.001,
        }
    }
}

impl RelaxConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_scale_factor(mut self, scale_factor: f64) -> Self {
        self.scale_factor = scale_factor;
        self
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Reject parameters the update rule cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(LingError::invalid_config("max_iterations must be positive"));
        }
        if !(self.scale_factor > 0.0) {
            return Err(LingError::invalid_config(format!(
                "scale_factor must be positive, got {}",
                self.scale_factor
            )));
        }
        if !(self.epsilon > 0.0) {
            return Err(LingError::invalid_config(format!(
                "epsilon must be positive, got {}",
                self.epsilon
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Problem
// ============================================================================

/// Variables with their labels' initial weights.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Problem {
    labels: Vec<Vec<f64>>,
}

impl Problem {
    pub fn new(n_vars: usize) -> Self {
        Self {
            labels: vec![Vec::new(); n_vars],
        }
    }

    /// Append a label with initial `weight` to variable `var`.
    pub fn add_label(&mut self, var: usize, weight: f64) {
        if var >= self.labels.len() {
            self.labels.resize(var + 1, Vec::new());
        }
        self.labels[var].push(weight);
    }

    pub fn n_vars(&self) -> usize {
        self.labels.len()
    }

    pub fn n_labels(&self, var: usize) -> usize {
        self.labels.get(var).map_or(0, Vec::len)
    }
}

// ============================================================================
// Solver
// ============================================================================

#[derive(Debug, Clone)]
struct Constraint {
    terms: Vec<TermGroup>,
    compatibility: f64,
}

/// How a call to [`Relax::solve`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolveStats {
    pub iterations: usize,
    /// `false` when the iteration cap stopped the run.
    pub converged: bool,
}

/// Relaxation labelling solver for one problem.
#[derive(Debug, Clone)]
pub struct Relax {
    config: RelaxConfig,
    /// `weights[var][label][slot]`, slots indexed by `current` and `1 - current`.
    weights: Vec<Vec<[f64; 2]>>,
    constraints: Vec<Vec<Vec<Constraint>>>,
    current: usize,
}

impl Relax {
    pub fn new(config: RelaxConfig) -> Self {
        Self {
            config,
            weights: Vec::new(),
            constraints: Vec::new(),
            current: 0,
        }
    }

    pub fn config(&self) -> &RelaxConfig {
        &self.config
    }

    /// Load the problem's initial weights, dropping any previous state.
    pub fn reset(&mut self, problem: &Problem) {
        self.weights = problem
            .labels
            .iter()
            .map(|ls| ls.iter().map(|&w| [w, w]).collect())
            .collect();
        self.constraints = problem
            .labels
            .iter()
            .map(|ls| vec![Vec::new(); ls.len()])
            .collect();
        self.current = 0;
    }

    pub fn n_vars(&self) -> usize {
        self.weights.len()
    }

    pub fn n_labels(&self, var: usize) -> usize {
        self.weights.get(var).map_or(0, Vec::len)
    }

    /// Register a constraint on `(var, label)`.
    ///
    /// Its influence is `compatibility` times the product over `terms` of the
    /// summed current weights of each group's cells.
    pub fn add_constraint(&mut self, var: usize, label: usize, terms: Vec<TermGroup>, compatibility: f64) -> Result<()> {
        self.check_cell((var, label))?;
        for &cell in terms.iter().flatten() {
            self.check_cell(cell)?;
        }
        self.constraints[var][label].push(Constraint { terms, compatibility });
        Ok(())
    }

    fn check_cell(&self, (var, label): Cell) -> Result<()> {
        if label < self.n_labels(var) {
            Ok(())
        } else {
            Err(LingError::invalid_input(format!(
                "constraint references label {label} of variable {var}, which does not exist"
            )))
        }
    }

    pub fn n_constraints(&self) -> usize {
        self.constraints.iter().flatten().map(Vec::len).sum()
    }

    /// Current weight of a cell, `None` outside the problem.
    pub fn weight(&self, var: usize, label: usize) -> Option<f64> {
        self.weights.get(var)?.get(label).map(|w| w[self.current])
    }

    /// Iterate until no weight of an ambiguous variable moves by `epsilon`
    /// or more, or until the iteration cap. At least one iteration runs.
    pub fn solve(&mut self) -> SolveStats {
        let mut iterations = 0;
        loop {
            self.iterate();
            iterations += 1;
            if !self.has_changes() {
                tracing::trace!(iterations, "relaxation converged");
                return SolveStats {
                    iterations,
                    converged: true,
                };
            }
            if iterations >= self.config.max_iterations {
                tracing::debug!(iterations, "relaxation stopped at iteration cap");
                return SolveStats {
                    iterations,
                    converged: false,
                };
            }
        }
    }

    /// One full update from the current buffer into the other, then flip.
    fn iterate(&mut self) {
        let cur = self.current;
        let next = 1 - cur;
        for var in 0..self.weights.len() {
            let n = self.weights[var].len();
            if n <= 1 {
                continue;
            }
            let mut scaled = vec![0.0; n];
            let mut norm = 0.0;
            for label in 0..n {
                let w = self.weights[var][label][cur];
                if w > 0.0 {
                    let s = self.normalized_support(var, label, cur);
                    scaled[label] = w * (1.0 + s);
                    norm += scaled[label];
                }
            }
            for label in 0..n {
                let w = self.weights[var][label][cur];
                self.weights[var][label][next] = if norm <= 0.0 {
                    w
                } else if w > 0.0 {
                    scaled[label] / norm
                } else {
                    0.0
                };
            }
        }
        self.current = next;
    }

    fn normalized_support(&self, var: usize, label: usize, slot: usize) -> f64 {
        let support: f64 = self.constraints[var][label]
            .iter()
            .map(|c| {
                let product: f64 = c
                    .terms
                    .iter()
                    .map(|group| group.iter().map(|&(v, l)| self.weights[v][l][slot]).sum::<f64>())
                    .product();
                c.compatibility * product
            })
            .sum();
        let limit = self.config.scale_factor;
        support.clamp(-limit, limit) / limit
    }

    fn has_changes(&self) -> bool {
        let cur = self.current;
        self.weights.iter().filter(|ls| ls.len() > 1).any(|ls| {
            ls.iter()
                .any(|w| (w[cur] - w[1 - cur]).abs() >= self.config.epsilon)
        })
    }

    /// Labels tied for the highest current weight, in index order. Empty for
    /// a variable outside the problem.
    pub fn best_label(&self, var: usize) -> Vec<usize> {
        let mut best = Vec::new();
        let mut max = 0.0;
        let Some(labels) = self.weights.get(var) else {
            return best;
        };
        for (label, w) in labels.iter().enumerate() {
            let w = w[self.current];
            if w > max {
                max = w;
                best.clear();
                best.push(label);
            } else if w == max {
                best.push(label);
            }
        }
        best
    }
}
