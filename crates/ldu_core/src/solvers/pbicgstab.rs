// crates/ldu_core/src/solvers/pbicgstab.rs

//! 稳定化预条件双共轭梯度（PBiCGStab）
//!
//! 不需要转置乘法。半步残差 `sA` 已满足收敛条件时提前结束本次迭代。

use ldu_config::SolverControls;
use ldu_foundation::error::LduResult;
use ldu_foundation::tolerance::VSMALL;

use super::{initial_residual, keep_iterating, needs_iteration, record_iteration};
use super::{LduSolver, SolverPerformance};
use crate::field_ops::{axpy, g_sum_mag, g_sum_prod, g_sum_sqr};
use crate::interfaces::Coupling;
use crate::matrix::LduMatrix;
use crate::preconditioners::PreconditionerFactory;

/// PBiCGStab 求解器
#[derive(Debug, Clone)]
pub struct PBiCgStab {
    controls: SolverControls,
    preconditioner: PreconditionerFactory,
}

impl PBiCgStab {
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

impl LduSolver for PBiCgStab {
    fn name(&self) -> &'static str {
        "PBiCGStab"
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
        let comm = coupling.comm;
        let controls = &self.controls;
        let mut perf = SolverPerformance::new(self.name(), "");

        let mut y_a = vec![0.0; n];
        let mut r_a = vec![0.0; n];
        let Some(norm_factor) =
            initial_residual(&mut perf, matrix, psi, source, &mut y_a, &mut r_a, coupling)?
        else {
            return Ok(perf);
        };

        if !needs_iteration(&mut perf, controls) {
            return Ok(perf);
        }

        let precon = (self.preconditioner)(matrix, controls, coupling)?;
        let r_a0 = r_a.clone();
        let mut p_a = vec![0.0; n];
        let mut ay_a = vec![0.0; n];
        let mut s_a = vec![0.0; n];
        let mut z_a = vec![0.0; n];
        let mut t_a = vec![0.0; n];

        let mut r_a0r_a: f64 = 0.0;
        let mut alpha: f64 = 0.0;
        let mut omega: f64 = 0.0;

        loop {
            let r_a0r_a_old = r_a0r_a;
            r_a0r_a = g_sum_prod(comm, &r_a0, &r_a)?;
            if perf.check_singularity(r_a0r_a.abs()) {
                break;
            }

            if perf.n_iterations == 0 {
                p_a.copy_from_slice(&r_a);
            } else {
                if perf.check_singularity(omega.abs()) {
                    break;
                }
                let beta = (r_a0r_a / r_a0r_a_old) * (alpha / omega);
                for ((p, &r), &ay) in p_a.iter_mut().zip(&r_a).zip(&ay_a) {
                    *p = r + beta * (*p - omega * ay);
                }
            }

            precon.precondition(&mut y_a, &p_a, coupling)?;
            matrix.amul(&mut ay_a, &y_a, coupling)?;
            let r_a0ay_a = g_sum_prod(comm, &r_a0, &ay_a)?;
            if perf.check_singularity(r_a0ay_a.abs()) {
                break;
            }
            alpha = r_a0r_a / r_a0ay_a;

            for ((s, &r), &ay) in s_a.iter_mut().zip(&r_a).zip(&ay_a) {
                *s = r - alpha * ay;
            }

            // 半步已收敛
            let half = g_sum_mag(comm, &s_a)? / norm_factor;
            if perf.n_iterations + 1 >= controls.min_iter
                && (half < controls.tolerance
                    || (controls.rel_tol > 0.0 && half < controls.rel_tol * perf.initial_residual))
            {
                axpy(alpha, &y_a, psi);
                record_iteration(&mut perf, &s_a, norm_factor, comm)?;
                perf.converged = true;
                break;
            }

            precon.precondition(&mut z_a, &s_a, coupling)?;
            matrix.amul(&mut t_a, &z_a, coupling)?;
            let t_at_a = g_sum_sqr(comm, &t_a)?;
            omega = if t_at_a > VSMALL {
                g_sum_prod(comm, &t_a, &s_a)? / t_at_a
            } else {
                0.0
            };

            for ((p, &y), &z) in psi.iter_mut().zip(&y_a).zip(&z_a) {
                *p += alpha * y + omega * z;
            }
            for ((r, &s), &t) in r_a.iter_mut().zip(&s_a).zip(&t_a) {
                *r = s - omega * t;
            }

            record_iteration(&mut perf, &r_a, norm_factor, comm)?;
            if !keep_iterating(&mut perf, controls) {
                break;
            }
        }

        Ok(perf)
    }
}
