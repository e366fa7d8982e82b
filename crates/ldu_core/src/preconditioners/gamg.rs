// crates/ldu_core/src/preconditioners/gamg.rs

//! GAMG 预条件器：从 `w = 0` 出发做 `nVcycles` 次 V 循环
//!
//! 转置版本沿用 `precondition`。光顺器取 symGaussSeidel 且
//! `nPreSweeps = nPostSweeps` 时近似对称，可与 PCG 搭配。

use ldu_config::SolverControls;
use ldu_foundation::error::LduResult;

use super::LduPreconditioner;
use crate::gamg::GamgCycle;
use crate::interfaces::Coupling;
use crate::matrix::LduMatrix;

/// GAMG 预条件器
#[derive(Debug)]
pub struct GamgPreconditioner<'m> {
    cycle: GamgCycle<'m>,
    n_vcycles: usize,
}

impl<'m> GamgPreconditioner<'m> {
    /// 构建多重网格层级
    pub fn new(matrix: &'m LduMatrix<'m>, controls: &SolverControls, coupling: &Coupling<'_>) -> LduResult<Self> {
        Ok(Self {
            cycle: GamgCycle::new(matrix, controls, coupling)?,
            n_vcycles: controls.n_vcycles.max(1),
        })
    }
}

impl GamgPreconditioner<'_> {
    /// 工厂函数
    pub fn build<'m>(
        matrix: &'m LduMatrix<'m>,
        controls: &SolverControls,
        coupling: &Coupling<'_>,
    ) -> LduResult<Box<dyn LduPreconditioner + 'm>> {
        Ok(Box::new(GamgPreconditioner::new(matrix, controls, coupling)?))
    }
}

impl LduPreconditioner for GamgPreconditioner<'_> {
    fn name(&self) -> &'static str {
        "GAMG"
    }

    fn precondition(&self, w: &mut [f64], r: &[f64], coupling: &Coupling<'_>) -> LduResult<()> {
        w.fill(0.0);
        for _ in 0..self.n_vcycles {
            self.cycle.v_cycle(w, r, coupling)?;
        }
        Ok(())
    }
}
