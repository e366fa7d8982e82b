// crates/ldu_core/src/preconditioners/mod.rs

//! 预条件器
//!
//! 求解器每次迭代调用 `precondition(w, r)` 求 `w ≈ M⁻¹ r`。
//! 非对称求解器（PBiCG）还需要转置版本 `precondition_t`。
//!
//! # 预条件器类型
//!
//! - [`NoPreconditioner`]: `w = r`
//! - [`DiagonalPreconditioner`]: `w = r / diag`
//! - [`DicPreconditioner`]: 对角不完全 Cholesky（对称矩阵）
//! - [`DiluPreconditioner`]: 对角不完全 LU（非对称矩阵）
//! - [`GamgPreconditioner`]: 若干次多重网格 V 循环
//!
//! DIC/DILU 只使用本地内部面，不跨耦合补丁（并行时相当于分块）。

pub mod diagonal;
pub mod dic;
pub mod dilu;
pub mod gamg;

pub use diagonal::DiagonalPreconditioner;
pub use dic::DicPreconditioner;
pub use dilu::DiluPreconditioner;
pub use gamg::GamgPreconditioner;

use ldu_config::SolverControls;
use ldu_foundation::error::LduResult;

use crate::interfaces::Coupling;
use crate::matrix::LduMatrix;

/// 预条件器接口
pub trait LduPreconditioner {
    /// 名称
    fn name(&self) -> &'static str;

    /// `w = M⁻¹ r`
    fn precondition(&self, w: &mut [f64], r: &[f64], coupling: &Coupling<'_>) -> LduResult<()>;

    /// `w = M⁻ᵀ r`，对称预条件器与 `precondition` 相同
    fn precondition_t(&self, w: &mut [f64], r: &[f64], coupling: &Coupling<'_>) -> LduResult<()> {
        self.precondition(w, r, coupling)
    }
}

/// 预条件器工厂
pub type PreconditionerFactory = for<'m> fn(
    &'m LduMatrix<'m>,
    &SolverControls,
    &Coupling<'_>,
) -> LduResult<Box<dyn LduPreconditioner + 'm>>;

/// 无预条件
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPreconditioner;

impl NoPreconditioner {
    /// 工厂函数
    pub fn build<'m>(
        _matrix: &'m LduMatrix<'m>,
        _controls: &SolverControls,
        _coupling: &Coupling<'_>,
    ) -> LduResult<Box<dyn LduPreconditioner + 'm>> {
        Ok(Box::new(NoPreconditioner))
    }
}

impl LduPreconditioner for NoPreconditioner {
    fn name(&self) -> &'static str {
        "none"
    }

    fn precondition(&self, w: &mut [f64], r: &[f64], _coupling: &Coupling<'_>) -> LduResult<()> {
        w.copy_from_slice(r);
        Ok(())
    }
}
