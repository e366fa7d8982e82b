// crates/ldu_core/src/solvers/smooth.rs

//! smoothSolver：反复光顺直到收敛，每次迭代做 `nSweeps` 遍

use ldu_config::SolverControls;
use ldu_foundation::error::{LduError, LduResult};

use super::{initial_residual, keep_iterating, needs_iteration};
use super::{LduSolver, SolverPerformance};
use crate::field_ops::g_sum_mag;
use crate::interfaces::Coupling;
use crate::matrix::LduMatrix;
use crate::preconditioners::PreconditionerFactory;
use crate::smoothers::Smoother;

/// 光顺求解器
#[derive(Debug, Clone)]
pub struct SmoothSolver {
    controls: SolverControls,
}

impl SmoothSolver {
    /// 创建求解器
    pub fn new(controls: SolverControls) -> Self {
        Self { controls }
    }

    /// 工厂函数，不使用预条件器
    pub fn build(controls: SolverControls, _preconditioner: PreconditionerFactory) -> Box<dyn LduSolver> {
        Box::new(Self::new(controls))
    }
}

impl LduSolver for SmoothSolver {
    fn name(&self) -> &'static str {
        "smoothSolver"
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
        let smoother = Smoother::from_name(&self.controls.smoother)?;

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
            loop {
                smoother.smooth(matrix, psi, source, coupling, controls.n_sweeps)?;
                matrix.residual(&mut r, psi, source, coupling)?;

                perf.n_iterations += controls.n_sweeps;
                perf.final_residual = g_sum_mag(coupling.comm, &r)? / norm_factor;
                LduError::check_finite(
                    &perf.solver_name,
                    perf.n_iterations,
                    perf.final_residual,
                )?;
                log::trace!(
                    "smoothSolver iter {}: residual = {:.6e}",
                    perf.n_iterations,
                    perf.final_residual
                );

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
    use crate::preconditioners::NoPreconditioner;
    use ldu_config::CommsType;

    #[test]
    fn test_counts_sweeps_as_iterations() {
        let n = 20;
        let addr = LduAddressing::new(n, (0..n - 1).collect(), (1..n).collect(), vec![]).unwrap();
        let mut m = LduMatrix::symmetric(&addr);
        m.diag_mut().iter_mut().for_each(|d| *d = 4.0);
        m.upper_mut().iter_mut().for_each(|a| *a = -1.0);

        let list = InterfaceList::new();
        let comm = Communicator::serial();
        let coupling = Coupling::new(&list, &comm, CommsType::NonBlocking);

        let mut controls = SolverControls::new("smoothSolver", "none")
            .with_smoother("symGaussSeidel")
            .with_tolerance(1e-10);
        controls.n_sweeps = 2;
        let mut psi = vec![0.0; n];
        let perf = SmoothSolver::build(controls, NoPreconditioner::build)
            .solve(&m, &mut psi, &vec![1.0; n], &coupling)
            .unwrap();
        assert!(perf.converged);
        assert_eq!(perf.n_iterations % 2, 0);
    }

    #[test]
    fn test_unknown_smoother() {
        let addr = LduAddressing::new(2, vec![0], vec![1], vec![]).unwrap();
        let m = LduMatrix::symmetric(&addr);
        let list = InterfaceList::new();
        let comm = Communicator::serial();
        let coupling = Coupling::new(&list, &comm, CommsType::NonBlocking);
        let controls = SolverControls::default().with_smoother("ILU");
        let mut psi = vec![0.0; 2];
        let err = SmoothSolver::new(controls)
            .solve(&m, &mut psi, &[1.0; 2], &coupling)
            .unwrap_err();
        assert!(err.to_string().contains("GaussSeidel"));
    }
}
