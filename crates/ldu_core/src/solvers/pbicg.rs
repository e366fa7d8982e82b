// crates/ldu_core/src/solvers/pbicg.rs

//! 预条件双共轭梯度（PBiCG）
//!
//! 同时推进 `A` 与 `A^T` 两组残差/搜索方向，转置一侧使用 `Tmul`
//! 和 `precondition_t`。

use ldu_config::SolverControls;
use ldu_foundation::error::LduResult;

use super::{initial_residual, keep_iterating, needs_iteration, record_iteration};
use super::{LduSolver, SolverPerformance};
use crate::field_ops::{axpy, g_sum_prod, xpay};
use crate::interfaces::Coupling;
use crate::matrix::LduMatrix;
use crate::preconditioners::PreconditionerFactory;

/// PBiCG 求解器
#[derive(Debug, Clone)]
pub struct PBiCg {
    controls: SolverControls,
    preconditioner: PreconditionerFactory,
}

impl PBiCg {
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

impl LduSolver for PBiCg {
    fn name(&self) -> &'static str {
        "PBiCG"
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

        let mut w_a = vec![0.0; n];
        let mut r_a = vec![0.0; n];
        let Some(norm_factor) =
            initial_residual(&mut perf, matrix, psi, source, &mut w_a, &mut r_a, coupling)?
        else {
            return Ok(perf);
        };

        if needs_iteration(&mut perf, controls) {
            let mut w_t = vec![0.0; n];
            let mut r_t = vec![0.0; n];
            matrix.tmul(&mut w_t, psi, coupling)?;
            for ((rt, &wt), &s) in r_t.iter_mut().zip(&w_t).zip(source) {
                *rt = s - wt;
            }

            let precon = (self.preconditioner)(matrix, controls, coupling)?;
            let mut p_a = vec![0.0; n];
            let mut p_t = vec![0.0; n];
            let mut w_ar_t: f64 = 0.0;

            loop {
                let w_ar_t_old = w_ar_t;
                precon.precondition(&mut w_a, &r_a, coupling)?;
                precon.precondition_t(&mut w_t, &r_t, coupling)?;
                w_ar_t = g_sum_prod(comm, &w_a, &r_t)?;

                if perf.n_iterations == 0 {
                    p_a.copy_from_slice(&w_a);
                    p_t.copy_from_slice(&w_t);
                } else {
                    let beta = w_ar_t / w_ar_t_old;
                    xpay(&w_a, beta, &mut p_a);
                    xpay(&w_t, beta, &mut p_t);
                }

                matrix.amul(&mut w_a, &p_a, coupling)?;
                matrix.tmul(&mut w_t, &p_t, coupling)?;
                let w_ap_t = g_sum_prod(comm, &w_a, &p_t)?;
                if perf.check_singularity(w_ap_t.abs() / norm_factor) {
                    break;
                }

                let alpha = w_ar_t / w_ap_t;
                axpy(alpha, &p_a, psi);
                axpy(-alpha, &w_a, &mut r_a);
                axpy(-alpha, &w_t, &mut r_t);

                record_iteration(&mut perf, &r_a, norm_factor, comm)?;
                if !keep_iterating(&mut perf, controls) {
                    break;
                }
            }
        }

        Ok(perf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addressing::LduAddressing;
    use crate::interfaces::InterfaceList;
    use crate::parallel::Communicator;
    use crate::preconditioners::{DiagonalPreconditioner, DiluPreconditioner};
    use ldu_config::CommsType;

    /// 一维对流扩散：下三角强于上三角
    fn convection(addr: &LduAddressing) -> LduMatrix<'_> {
        let mut m = LduMatrix::asymmetric(addr);
        m.diag_mut().iter_mut().for_each(|d| *d = 3.0);
        m.upper_mut().iter_mut().for_each(|a| *a = -0.5);
        m.lower_mut().unwrap().iter_mut().for_each(|a| *a = -2.0);
        m
    }

    #[test]
    fn test_converges_on_asymmetric_chain() {
        let n = 40;
        let addr = LduAddressing::new(n, (0..n - 1).collect(), (1..n).collect(), vec![]).unwrap();
        let m = convection(&addr);
        let list = InterfaceList::new();
        let comm = Communicator::serial();
        let coupling = Coupling::new(&list, &comm, CommsType::NonBlocking);
        let source: Vec<f64> = (0..n).map(|i| (i % 3) as f64).collect();

        for precon in [DiagonalPreconditioner::build as PreconditionerFactory, DiluPreconditioner::build] {
            let controls = SolverControls::new("PBiCG", "").with_tolerance(1e-12);
            let mut psi = vec![0.0; n];
            let perf = PBiCg::new(controls, precon)
                .solve(&m, &mut psi, &source, &coupling)
                .unwrap();
            assert!(perf.converged, "{perf}");

            let mut r = vec![0.0; n];
            m.residual(&mut r, &psi, &source, &coupling).unwrap();
            assert!(r.iter().all(|v| v.abs() < 1e-9));
        }
    }

    #[test]
    fn test_dilu_is_exact_on_chain() {
        // 链上 DILU 是完全分解，一次迭代即收敛
        let n = 10;
        let addr = LduAddressing::new(n, (0..n - 1).collect(), (1..n).collect(), vec![]).unwrap();
        let m = convection(&addr);
        let list = InterfaceList::new();
        let comm = Communicator::serial();
        let coupling = Coupling::new(&list, &comm, CommsType::NonBlocking);

        let controls = SolverControls::new("PBiCG", "DILU").with_tolerance(1e-10);
        let mut psi = vec![0.0; n];
        let perf = PBiCg::new(controls, DiluPreconditioner::build)
            .solve(&m, &mut psi, &vec![1.0; n], &coupling)
            .unwrap();
        assert!(perf.converged);
        assert_eq!(perf.n_iterations, 1);
    }
}
