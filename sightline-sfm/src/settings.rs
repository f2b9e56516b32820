use serde::{Deserialize, Serialize};

/// The settings for inference, validation and solve acceptance.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
pub struct InferenceSettings {
    /// Agreement tolerance in world length units; disagreements beyond it
    /// become conflict warnings.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    /// Hard cap on propagation passes; guarantees termination on cycles.
    #[serde(default = "default_max_passes")]
    pub max_passes: usize,
    /// The epsilon used by the eigen solvers in plane fitting and
    /// vanishing-point estimation.
    #[serde(default = "default_solver_epsilon")]
    pub solver_epsilon: f64,
    /// Reject an otherwise-successful solve whose final cost exceeds this.
    #[serde(default = "default_max_final_cost")]
    pub max_final_cost: f64,
    /// Maximum iterations requested from the external solver.
    #[serde(default = "default_solver_max_iterations")]
    pub solver_max_iterations: usize,
    /// Convergence tolerance requested from the external solver.
    #[serde(default = "default_solver_tolerance")]
    pub solver_tolerance: f64,
    /// Robust loss requested from the external solver.
    #[serde(default)]
    pub robust_loss: RobustLoss,
}

/// Robust loss applied by the external solver to reprojection residuals.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RobustLoss {
    None,
    #[default]
    Huber,
    Cauchy,
}

fn default_tolerance() -> f64 {
    1e-3
}

fn default_max_passes() -> usize {
    50
}

fn default_solver_epsilon() -> f64 {
    1e-12
}

fn default_max_final_cost() -> f64 {
    1e6
}

fn default_solver_max_iterations() -> usize {
    100
}

fn default_solver_tolerance() -> f64 {
    1e-6
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            tolerance: default_tolerance(),
            max_passes: default_max_passes(),
            solver_epsilon: default_solver_epsilon(),
            max_final_cost: default_max_final_cost(),
            solver_max_iterations: default_solver_max_iterations(),
            solver_tolerance: default_solver_tolerance(),
            robust_loss: RobustLoss::default(),
        }
    }
}
