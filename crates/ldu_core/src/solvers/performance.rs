// crates/ldu_core/src/solvers/performance.rs

//! 求解性能记录

use std::fmt;

use serde::Serialize;

use ldu_foundation::tolerance::VSMALL;

/// 一次线性求解的性能记录
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolverPerformance {
    /// 求解器名称
    pub solver_name: String,
    /// 场名称
    pub field_name: String,
    /// 初始残差（归一化）
    pub initial_residual: f64,
    /// 最终残差（归一化）
    pub final_residual: f64,
    /// 迭代次数
    pub n_iterations: usize,
    /// 是否收敛
    pub converged: bool,
    /// 是否遇到奇异（步长分母过小）
    pub singular: bool,
}

impl SolverPerformance {
    /// 新记录，残差为零，未收敛
    pub fn new(solver_name: impl Into<String>, field_name: impl Into<String>) -> Self {
        Self {
            solver_name: solver_name.into(),
            field_name: field_name.into(),
            initial_residual: 0.0,
            final_residual: 0.0,
            n_iterations: 0,
            converged: false,
            singular: false,
        }
    }

    /// 收敛判断：`final < tolerance` 或 `final < relTol * initial`
    pub fn check_convergence(&mut self, tolerance: f64, rel_tol: f64) -> bool {
        self.converged = self.final_residual < tolerance
            || (rel_tol > 0.0 && self.final_residual < rel_tol * self.initial_residual);
        self.converged
    }

    /// 分母过小时标记奇异
    pub fn check_singularity(&mut self, value: f64) -> bool {
        self.singular = !(value >= VSMALL);
        self.singular
    }
}

impl fmt::Display for SolverPerformance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:  Solving for {}, Initial residual = {:e}, Final residual = {:e}, No Iterations {}",
            self.solver_name,
            self.field_name,
            self.initial_residual,
            self.final_residual,
            self.n_iterations
        )
    }
}
