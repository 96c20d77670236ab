use std::time::{Duration, Instant};

use log::debug;
use sweep_core::{
    config::SolverConfig,
    math::{self, RobustKernel},
    nalgebra::{Matrix6, SymmetricEigen, Vector3, Vector6},
    pose::Pose,
};

use crate::correspondence::Correspondence;

/// Terminal state of a solve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverStatus {
    /// The update step fell below the convergence tolerance
    Converged,
    /// The iteration cap was reached first. The pose is the lowest-cost estimate seen, with low confidence
    MaxIterations,
    /// The problem is degenerate or numerically broken. The pose is the initial guess
    Diverged(DivergenceReason),
    /// The time budget ran out. The pose is the lowest-cost estimate seen
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DivergenceReason {
    /// Too few correspondences to constrain all six degrees of freedom
    TooFewCorrespondences,
    /// The normal equations are (close to) singular, typically because all correspondences are coplanar or collinear
    Degenerate,
    /// The update step contained non-finite values
    NonFinite,
}

/// Result of a Gauss-Newton solve
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolveReport {
    pub pose: Pose,
    pub status: SolverStatus,
    pub iterations: usize,
    /// Robust cost at the initial guess
    pub initial_cost: f64,
    /// Robust cost at the returned pose
    pub final_cost: f64,
    /// Smallest eigenvalue of the last normal equations
    pub min_eigenvalue: f64,
    pub correspondences: usize,
    pub elapsed: Duration,
}

impl SolveReport {
    pub fn is_converged(&self) -> bool {
        self.status == SolverStatus::Converged
    }

    /// Returns `true` if the pose of this report is an estimate at all, i.e. the solve converged or hit the
    /// iteration cap
    pub fn has_estimate(&self) -> bool {
        matches!(
            self.status,
            SolverStatus::Converged | SolverStatus::MaxIterations
        )
    }
}

/// Linearization of all correspondences at one pose
struct NormalEquations {
    hessian: Matrix6<f64>,
    gradient: Vector6<f64>,
    cost: f64,
}

/// Gauss-Newton solver for the rigid motion that aligns a set of correspondences.
///
/// The pose is parameterized by `[omega, v]`: the rotation is perturbed from the left, `R <- exp(omega) R`, and the
/// translation additively, `t <- t + v`. For a source point `p` with `q = R p`, the derivative of the transformed
/// point `q + t` is `[-skew(q), I]`, and the derivative of a residual with gradient direction `n` is
/// `n^T [-skew(q), I]`.
///
/// Robust weights are evaluated once per solve at the initial guess and held fixed while iterating, so every solve
/// is a weighted least squares problem. Registration re-evaluates them with every new set of correspondences.
pub struct GaussNewtonSolver {
    config: SolverConfig,
}

impl GaussNewtonSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Solves for the pose that moves the sources of `correspondences` onto their targets, starting at `initial`.
    /// The time budget of the solver configuration is measured from the start of this call.
    pub fn solve(&self, correspondences: &[Correspondence], initial: &Pose) -> SolveReport {
        let deadline = self.config.time_budget().map(|b| Instant::now() + b);
        self.solve_until(correspondences, initial, deadline)
    }

    /// Like [solve](GaussNewtonSolver::solve), but aborts once `deadline` has passed
    pub fn solve_until(
        &self,
        correspondences: &[Correspondence],
        initial: &Pose,
        deadline: Option<Instant>,
    ) -> SolveReport {
        let start = Instant::now();
        let kernel = self.config.robust_kernel;
        let initial_cost = evaluate_cost(correspondences, initial, &kernel);
        let mut report = SolveReport {
            pose: *initial,
            status: SolverStatus::Diverged(DivergenceReason::TooFewCorrespondences),
            iterations: 0,
            initial_cost,
            final_cost: initial_cost,
            min_eigenvalue: 0.0,
            correspondences: correspondences.len(),
            elapsed: Duration::default(),
        };

        if correspondences.len() < self.config.min_correspondences {
            debug!(
                "Solver got {} correspondences, {} are required",
                correspondences.len(),
                self.config.min_correspondences
            );
            report.elapsed = start.elapsed();
            return report;
        }

        let weights = correspondences
            .iter()
            .map(|c| kernel.weight(c.target.residual(&initial.transform_vector(&c.source)).0))
            .collect::<Vec<_>>();
        let mut pose = *initial;
        let mut best = (initial_cost, *initial);
        for iteration in 1..=self.config.max_iterations {
            if deadline.map(|d| Instant::now() >= d).unwrap_or(false) {
                debug!("Solver ran out of time after {} iterations", iteration - 1);
                report.status = SolverStatus::TimedOut;
                report.pose = best.1;
                report.final_cost = best.0;
                report.elapsed = start.elapsed();
                return report;
            }
            report.iterations = iteration;

            let equations = linearize(correspondences, &weights, &pose, &kernel);
            if equations.cost < best.0 {
                best = (equations.cost, pose);
            }

            let eigen = SymmetricEigen::new(equations.hessian);
            let min_eigenvalue = eigen.eigenvalues.min();
            let max_eigenvalue = eigen.eigenvalues.max();
            report.min_eigenvalue = min_eigenvalue;
            if min_eigenvalue < self.config.min_eigenvalue
                || min_eigenvalue < self.config.min_eigenvalue_ratio * max_eigenvalue
            {
                debug!(
                    "Degenerate normal equations, eigenvalues {:?}",
                    eigen.eigenvalues.as_slice()
                );
                report.status = SolverStatus::Diverged(DivergenceReason::Degenerate);
                report.pose = *initial;
                report.final_cost = initial_cost;
                report.elapsed = start.elapsed();
                return report;
            }

            let damped = equations.hessian + Matrix6::identity() * self.config.damping;
            let step = match damped.cholesky() {
                Some(cholesky) => cholesky.solve(&(-equations.gradient)),
                None => {
                    report.status = SolverStatus::Diverged(DivergenceReason::Degenerate);
                    report.pose = *initial;
                    report.final_cost = initial_cost;
                    report.elapsed = start.elapsed();
                    return report;
                }
            };
            if step.iter().any(|v| !v.is_finite()) {
                report.status = SolverStatus::Diverged(DivergenceReason::NonFinite);
                report.pose = *initial;
                report.final_cost = initial_cost;
                report.elapsed = start.elapsed();
                return report;
            }

            pose = apply_update(&pose, &step);

            if step.norm() < self.config.convergence_tolerance {
                report.status = SolverStatus::Converged;
                report.pose = pose;
                report.final_cost = evaluate_cost(correspondences, &pose, &kernel);
                report.elapsed = start.elapsed();
                return report;
            }
        }

        let final_cost = evaluate_cost(correspondences, &pose, &kernel);
        if final_cost < best.0 {
            best = (final_cost, pose);
        }
        debug!(
            "Solver hit the iteration cap of {}, best cost {}",
            self.config.max_iterations, best.0
        );
        report.status = SolverStatus::MaxIterations;
        report.pose = best.1;
        report.final_cost = best.0;
        report.elapsed = start.elapsed();
        report
    }
}

/// Applies the update `[omega, v]` to `pose`
pub fn apply_update(pose: &Pose, step: &Vector6<f64>) -> Pose {
    let omega = Vector3::new(step[0], step[1], step[2]);
    let v = Vector3::new(step[3], step[4], step[5]);
    Pose::new(math::exp(&omega) * pose.rotation, pose.translation + v)
}

/// Normal equations with the given per-correspondence weights. The returned cost is the robust cost at `pose`
fn linearize(
    correspondences: &[Correspondence],
    weights: &[f64],
    pose: &Pose,
    kernel: &RobustKernel,
) -> NormalEquations {
    let mut hessian = Matrix6::zeros();
    let mut gradient = Vector6::zeros();
    let mut cost = 0.0;
    for (c, weight) in correspondences.iter().zip(weights.iter().copied()) {
        let rotated = pose.rotation * c.source;
        let moved = rotated + pose.translation;
        let (residual, direction) = c.target.residual(&moved);
        cost += kernel.cost(residual);
        if direction == Vector3::zeros() {
            continue;
        }
        // d(n . (R p + t)) / d[omega, v] = [(R p) x n, n]
        let rotational = rotated.cross(&direction);
        let jacobian = Vector6::new(
            rotational.x,
            rotational.y,
            rotational.z,
            direction.x,
            direction.y,
            direction.z,
        );
        hessian += jacobian * jacobian.transpose() * weight;
        gradient += jacobian * (weight * residual);
    }
    NormalEquations {
        hessian,
        gradient,
        cost,
    }
}

/// Robust cost of all correspondences at `pose`
pub fn evaluate_cost(correspondences: &[Correspondence], pose: &Pose, kernel: &RobustKernel) -> f64 {
    correspondences
        .iter()
        .map(|c| {
            let moved = pose.transform_vector(&c.source);
            kernel.cost(c.target.residual(&moved).0)
        })
        .sum()
}
