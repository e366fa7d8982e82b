// crates/ldu_core/src/solve.rs

//! 求解入口
//!
//! ```text
//! solve(registry, field, matrix, psi, source, controls, coupling)
//!   → 验证控制参数与界面 → 按名称选择求解器 → 求解 → 记录日志
//! ```
//!
//! 达到迭代上限未收敛只记 `warn`，由调用方决定是否视为致命。

use ldu_config::SolverControls;
use ldu_foundation::error::LduResult;

use crate::interfaces::Coupling;
use crate::matrix::LduMatrix;
use crate::registry::{SolverRegistry, Symmetry};
use crate::solvers::SolverPerformance;

/// 求解 `matrix * psi = source`，原地更新 `psi`
///
/// 通信模式取自 `controls.comms_type`，覆盖 `coupling` 中的设置。
pub fn solve(
    registry: &SolverRegistry,
    field_name: &str,
    matrix: &LduMatrix<'_>,
    psi: &mut [f64],
    source: &[f64],
    controls: &SolverControls,
    coupling: &Coupling<'_>,
) -> LduResult<SolverPerformance> {
    controls.validate()?;
    coupling.interfaces.validate(matrix.addressing())?;

    let coupling = Coupling {
        comms_type: controls.comms_type,
        ..*coupling
    };
    let solver = registry.select(controls, Symmetry::of(matrix.is_symmetric()))?;

    let mut perf = solver.solve(matrix, psi, source, &coupling)?;
    perf.field_name = field_name.to_string();

    if coupling.comm.is_master() {
        log::info!("{}", perf);
        if !perf.converged {
            log::warn!(
                "{}: {} 未在 {} 次迭代内收敛 (最终残差 {:e}, 容差 {:e}, 相对容差 {:e})",
                perf.solver_name,
                field_name,
                perf.n_iterations,
                perf.final_residual,
                controls.tolerance,
                controls.rel_tol
            );
        }
    }
    Ok(perf)
}
