// crates/ldu_core/src/solvers/pcg.rs

//! 预条件共轭梯度（PCG），只适用于对称矩阵

use ldu_config::SolverControls;
use ldu_foundation::error::{LduError, LduResult};

use super::{initial_residual, keep_iterating, needs_iteration, record_iteration};
use super::{LduSolver, SolverPerformance};
use crate::field_ops::{axpy, g_sum_prod, xpay};
use crate::interfaces::Coupling;
use crate::matrix::LduMatrix;
use crate::preconditioners::PreconditionerFactory;

/// PCG 求解器
#[derive(Debug, Clone)]
pub struct Pcg {
    controls: SolverControls,
    preconditioner: PreconditionerFactory,
}

impl Pcg {
    /// 创建求解器
    pub fn new(controls: SolverControls, preconditioner: PreconditionerFactory) -> Self {
        Self {
            controls,
            preconditioner,
        }
    }

    /// 工厂函数
    pub fn build(controls: SolverControls, preconditioner: PreconditionerFactory) -> Box<dyn LduSolver> {
        Box::new(Self::new(controls, preconditioner))
    }
}

impl LduSolver for Pcg {
    fn name(&self) -> &'static str {
        "PCG"
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
        if matrix.is_asymmetric() {
            return Err(LduError::symmetry("PCG 只适用于对称矩阵"));
        }
        matrix.check_field("psi", psi)?;

        let n = matrix.n_cells();
        let comm = coupling.comm;
        let controls = &self.controls;
        let mut perf = SolverPerformance::new(self.name(), "");

        let mut w_a = vec![0.0; n];
        let mut r_a = vec![0.0; n];
        let Some(norm_factor) =
            initial_residual(&mut perf, matrix, psi, source, &mut w_a, &mut r_a, coupling)?
        else {
            return Ok(perf);
        };

        if needs_iteration(&mut perf, controls) {
            let precon = (self.preconditioner)(matrix, controls, coupling)?;
            let mut p_a = vec![0.0; n];
            let mut w_ar_a: f64 = 0.0;

            loop {
                let w_ar_a_old = w_ar_a;
                precon.precondition(&mut w_a, &r_a, coupling)?;
                w_ar_a = g_sum_prod(comm, &w_a, &r_a)?;

                if perf.n_iterations == 0 {
                    p_a.copy_from_slice(&w_a);
                } else {
                    let beta = w_ar_a / w_ar_a_old;
                    xpay(&w_a, beta, &mut p_a);
                }

                matrix.amul(&mut w_a, &p_a, coupling)?;
                let w_ap_a = g_sum_prod(comm, &w_a, &p_a)?;
                if perf.check_singularity(w_ap_a.abs() / norm_factor) {
                    break;
                }

                let alpha = w_ar_a / w_ap_a;
                axpy(alpha, &p_a, psi);
                axpy(-alpha, &w_a, &mut r_a);

                record_iteration(&mut perf, &r_a, norm_factor, comm)?;
                if !keep_iterating(&mut perf, controls) {
                    break;
                }
            }
        }

        Ok(perf)
    }
}
