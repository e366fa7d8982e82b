// crates/ldu_core/src/solvers/diagonal.rs

//! 纯对角系统求解：`psi = source / diag`，忽略非对角系数

use ldu_config::SolverControls;
use ldu_foundation::error::{LduError, LduResult};
use ldu_foundation::tolerance::VSMALL;

use super::{LduSolver, SolverPerformance};
use crate::interfaces::Coupling;
use crate::matrix::LduMatrix;
use crate::preconditioners::PreconditionerFactory;

/// 对角求解器
#[derive(Debug, Clone)]
pub struct DiagonalSolver {
    controls: SolverControls,
}

impl DiagonalSolver {
    /// 创建求解器
    pub fn new(controls: SolverControls) -> Self {
        Self { controls }
    }

    /// 工厂函数，不使用预条件器
    pub fn build(controls: SolverControls, _preconditioner: PreconditionerFactory) -> Box<dyn LduSolver> {
        Box::new(Self::new(controls))
    }
}

impl LduSolver for DiagonalSolver {
    fn name(&self) -> &'static str {
        "diagonal"
    }

    fn controls(&self) -> &SolverControls {
        &self.controls
    }

    fn solve(
        &self,
        matrix: &LduMatrix<'_>,
        psi: &mut [f64],
        source: &[f64],
        _coupling: &Coupling<'_>,
    ) -> LduResult<SolverPerformance> {
        matrix.check_field("psi", psi)?;
        matrix.check_field("source", source)?;

        // 先检查全部主元，出错时 psi 保持不变
        if let Some((cell, &d)) = matrix
            .diag()
            .iter()
            .enumerate()
            .find(|(_, d)| !(d.abs() >= VSMALL))
        {
            return Err(LduError::ZeroPivot {
                preconditioner: "diagonal",
                cell,
                value: d,
            });
        }
        for ((p, &s), &d) in psi.iter_mut().zip(source).zip(matrix.diag()) {
            *p = s / d;
        }

        let mut perf = SolverPerformance::new(self.name(), "");
        perf.converged = true;
        Ok(perf)
    }
}
