// crates/ldu_core/src/solvers/mod.rs

//! 迭代求解器
//!
//! 每次求解的状态流转：初始残差 → 迭代 → 收敛 / 达到迭代上限 / 发散。
//! 达到上限只在性能记录中标记 `converged = false`；残差出现 NaN/Inf
//! 立即返回 `NonFiniteResidual`。
//!
//! # 残差归一化
//!
//! ```text
//! pA         = sumA * gAverage(psi)
//! normFactor = gSum(|A psi - pA| + |source - pA|) + SMALL
//! residual   = gSumMag(source - A psi) / normFactor
//! ```
//!
//! 归一化因子（不含 SMALL）为零时：残差也为零则直接判定收敛，
//! 否则返回 `ZeroNormFactor`。
//!
//! # 求解器类型
//!
//! - [`Pcg`]: 预条件共轭梯度（对称）
//! - [`PBiCg`]: 预条件双共轭梯度（非对称，使用 `Tmul`）
//! - [`PBiCgStab`]: 稳定化双共轭梯度（非对称）
//! - [`GamgSolver`]: 代数多重网格 V 循环
//! - [`SmoothSolver`]: 只做光顺的迭代
//! - [`DiagonalSolver`]: 纯对角系统 `psi = source / diag`

pub mod diagonal;
pub mod gamg;
pub mod pbicg;
pub mod pbicgstab;
pub mod pcg;
pub mod performance;
pub mod smooth;

pub use diagonal::DiagonalSolver;
pub use gamg::GamgSolver;
pub use pbicg::PBiCg;
pub use pbicgstab::PBiCgStab;
pub use pcg::Pcg;
pub use performance::SolverPerformance;
pub use smooth::SmoothSolver;

use ldu_config::SolverControls;
use ldu_foundation::error::{LduError, LduResult};
use ldu_foundation::tolerance::SMALL;

use crate::field_ops::{g_average, g_sum_mag};
use crate::interfaces::Coupling;
use crate::matrix::LduMatrix;
use crate::parallel::Communicator;
use crate::preconditioners::PreconditionerFactory;

/// 线性求解器接口
pub trait LduSolver {
    /// 名称
    fn name(&self) -> &'static str;

    /// 控制参数
    fn controls(&self) -> &SolverControls;

    /// 求解 `A psi = source`，原地更新 `psi`
    fn solve(
        &self,
        matrix: &LduMatrix<'_>,
        psi: &mut [f64],
        source: &[f64],
        coupling: &Coupling<'_>,
    ) -> LduResult<SolverPerformance>;
}

/// 求解器工厂
pub type SolverFactory = fn(SolverControls, PreconditionerFactory) -> Box<dyn LduSolver>;

/// 归一化因子（不含 SMALL）
///
/// `apsi` 为 `A * psi`。
pub fn norm_factor(
    matrix: &LduMatrix<'_>,
    psi: &[f64],
    source: &[f64],
    apsi: &[f64],
    comm: &Communicator,
) -> LduResult<f64> {
    let mut p_a = vec![0.0; matrix.n_cells()];
    matrix.sum_a(&mut p_a)?;
    let average = g_average(comm, psi)?;

    let local: f64 = p_a
        .iter()
        .zip(apsi)
        .zip(source)
        .map(|((&s, &a), &b)| {
            let pa = s * average;
            (a - pa).abs() + (b - pa).abs()
        })
        .sum();
    comm.sum(local)
}

/// 计算初始残差并写入 `perf`
///
/// `apsi` 与 `r` 为输出：`A * psi` 与 `source - A * psi`。
/// 返回带 SMALL 的归一化因子；系统平凡（因子与残差都为零）时返回
/// None，`perf` 已标记收敛。
pub(crate) fn initial_residual(
    perf: &mut SolverPerformance,
    matrix: &LduMatrix<'_>,
    psi: &[f64],
    source: &[f64],
    apsi: &mut [f64],
    r: &mut [f64],
    coupling: &Coupling<'_>,
) -> LduResult<Option<f64>> {
    matrix.check_field("source", source)?;
    matrix.amul(apsi, psi, coupling)?;
    for ((ri, &a), &s) in r.iter_mut().zip(apsi.iter()).zip(source) {
        *ri = s - a;
    }

    let raw = norm_factor(matrix, psi, source, apsi, coupling.comm)?;
    let residual = g_sum_mag(coupling.comm, r)?;
    LduError::check_finite(&perf.solver_name, 0, residual)?;

    if raw < SMALL {
        if residual == 0.0 {
            perf.converged = true;
            return Ok(None);
        }
        return Err(LduError::ZeroNormFactor {
            solver: perf.solver_name.clone(),
            residual,
        });
    }

    let norm_factor = raw + SMALL;
    perf.initial_residual = residual / norm_factor;
    perf.final_residual = perf.initial_residual;
    log::trace!(
        "{} normFactor = {:.6e}, initial residual = {:.6e}",
        perf.solver_name,
        norm_factor,
        perf.initial_residual
    );
    Ok(Some(norm_factor))
}

/// 初始残差之后是否需要迭代
pub(crate) fn needs_iteration(perf: &mut SolverPerformance, controls: &SolverControls) -> bool {
    let unconverged =
        controls.min_iter > 0 || !perf.check_convergence(controls.tolerance, controls.rel_tol);
    unconverged && controls.max_iter > 0
}

/// 一次迭代结束后是否继续
pub(crate) fn keep_iterating(perf: &mut SolverPerformance, controls: &SolverControls) -> bool {
    (perf.n_iterations < controls.max_iter
        && !perf.check_convergence(controls.tolerance, controls.rel_tol))
        || perf.n_iterations < controls.min_iter
}

/// 计数一次迭代并更新最终残差
pub(crate) fn record_iteration(
    perf: &mut SolverPerformance,
    r: &[f64],
    norm_factor: f64,
    comm: &Communicator,
) -> LduResult<()> {
    perf.n_iterations += 1;
    perf.final_residual = g_sum_mag(comm, r)? / norm_factor;
    LduError::check_finite(&perf.solver_name, perf.n_iterations, perf.final_residual)?;
    log::trace!(
        "{} iter {}: residual = {:.6e}",
        perf.solver_name,
        perf.n_iterations,
        perf.final_residual
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addressing::LduAddressing;
    use crate::interfaces::InterfaceList;
    use ldu_config::CommsType;

    #[test]
    fn test_norm_factor_of_constant_field_is_source() {
        // 行和为零的矩阵作用于常数场：Apsi = pA = 0
        let addr = LduAddressing::new(2, vec![0], vec![1], vec![]).unwrap();
        let mut m = LduMatrix::symmetric(&addr);
        m.diag_mut().copy_from_slice(&[1.0, 1.0]);
        m.upper_mut()[0] = -1.0;
        let comm = Communicator::serial();
        let nf = norm_factor(&m, &[3.0, 3.0], &[1.0, -2.0], &[0.0, 0.0], &comm).unwrap();
        assert_eq!(nf, 3.0);
    }

    #[test]
    fn test_zero_norm_factor() {
        let addr = LduAddressing::new(2, vec![0], vec![1], vec![]).unwrap();
        let mut m = LduMatrix::symmetric(&addr);
        m.diag_mut().copy_from_slice(&[1.0, 1.0]);
        m.upper_mut()[0] = -1.0;
        let list = InterfaceList::new();
        let comm = Communicator::serial();
        let coupling = Coupling::new(&list, &comm, CommsType::NonBlocking);
        let (mut apsi, mut r) = (vec![0.0; 2], vec![0.0; 2]);

        let mut perf = SolverPerformance::new("PCG", "p");
        let nf = initial_residual(&mut perf, &m, &[0.0; 2], &[0.0; 2], &mut apsi, &mut r, &coupling)
            .unwrap();
        assert!(nf.is_none());
        assert!(perf.converged);

        // 常数场 + 零源项，但矩阵不是零行和：因子非零
        let mut perf = SolverPerformance::new("PCG", "p");
        let nf = initial_residual(&mut perf, &m, &[1.0, 2.0], &[0.0; 2], &mut apsi, &mut r, &coupling)
            .unwrap();
        assert!(nf.is_some());
        assert!(perf.initial_residual > 0.0);

        // 因子低于 SMALL 但残差非零
        let mut perf = SolverPerformance::new("PCG", "p");
        let err = initial_residual(&mut perf, &m, &[0.0; 2], &[1e-22, 0.0], &mut apsi, &mut r, &coupling)
            .unwrap_err();
        assert!(matches!(err, LduError::ZeroNormFactor { .. }));
    }
}
