// crates/ldu_core/src/solvers/gamg.rs

//! GAMG 求解器：每次迭代一次 V 循环

use ldu_config::SolverControls;
use ldu_foundation::error::LduResult;

use super::{initial_residual, keep_iterating, needs_iteration, record_iteration};
use super::{LduSolver, SolverPerformance};
use crate::gamg::GamgCycle;
use crate::interfaces::Coupling;
use crate::matrix::LduMatrix;
use crate::preconditioners::PreconditionerFactory;

/// GAMG 求解器
#[derive(Debug, Clone)]
pub struct GamgSolver {
    controls: SolverControls,
}

impl GamgSolver {
    /// 创建求解器
    pub fn new(controls: SolverControls) -> Self {
        Self { controls }
    }

    /// 工厂函数，多重网格自带光顺，不使用预条件器
    pub fn build(controls: SolverControls, _preconditioner: PreconditionerFactory) -> Box<dyn LduSolver> {
        Box::new(Self::new(controls))
    }
}

impl LduSolver for GamgSolver {
    fn name(&self) -> &'static str {
        "GAMG"
    }

    fn controls(&self) -> &SolverControls {
        &self.controls
    }

    fn solve(
        &self,
        matrix: &LduMatrix<'_>,
        psi: &mut [f64],
        source: &[f64],
        coupling: &Coupling<'_>,
    ) -> LduResult<SolverPerformance> {
        matrix.check_field("psi", psi)?;

        let n = matrix.n_cells();
        let controls = &self.controls;
        let mut perf = SolverPerformance::new(self.name(), "");

        let mut apsi = vec![0.0; n];
        let mut r = vec![0.0; n];
        let Some(norm_factor) =
            initial_residual(&mut perf, matrix, psi, source, &mut apsi, &mut r, coupling)?
        else {
            return Ok(perf);
        };

        if needs_iteration(&mut perf, controls) {
            let cycle = GamgCycle::new(matrix, controls, coupling)?;
            log::debug!("GAMG: {} coarse levels", cycle.hierarchy().n_levels());
            loop {
                cycle.v_cycle(psi, source, coupling)?;
                matrix.residual(&mut r, psi, source, coupling)?;
                record_iteration(&mut perf, &r, norm_factor, coupling.comm)?;
                if !keep_iterating(&mut perf, controls) {
                    break;
                }
            }
        }

        Ok(perf)
    }
}
