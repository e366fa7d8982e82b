// crates/ldu_core/src/preconditioners/dilu.rs

//! 对角不完全 LU（DILU）预条件器
//!
//! `rD[n] -= upper[f] * lower[f] / rD[o]`，按面升序单遍计算。
//! 前代沿 losort 顺序使用 `lower`，回代沿面的逆序使用 `upper`；
//! 转置版本交换两者。正向与转置共用同一组主元，近零主元在构建时
//! 就返回 `ZeroPivot`，两个方向都不存在静默除零。

use ldu_config::SolverControls;
use ldu_foundation::error::{LduError, LduResult};
use ldu_foundation::tolerance::PIVOT_SMALL;

use super::LduPreconditioner;
use crate::interfaces::Coupling;
use crate::matrix::LduMatrix;

/// DILU 预条件器
#[derive(Debug)]
pub struct DiluPreconditioner<'m> {
    matrix: &'m LduMatrix<'m>,
    r_d: Vec<f64>,
}

#[inline]
fn valid_pivot(pivot: f64, diag: f64) -> bool {
    pivot.is_finite() && pivot.abs() > PIVOT_SMALL * diag.abs()
}

impl<'m> DiluPreconditioner<'m> {
    /// 计算分解
    pub fn new(matrix: &'m LduMatrix<'m>) -> LduResult<Self> {
        let addr = matrix.addressing();
        let (l, u) = (addr.lower_addr(), addr.upper_addr());
        let (upper, lower) = (matrix.upper(), matrix.lower());
        let diag = matrix.diag();

        let mut r_d = diag.to_vec();
        for f in 0..l.len() {
            let o = l[f];
            if !valid_pivot(r_d[o], diag[o]) {
                return Err(LduError::ZeroPivot {
                    preconditioner: "DILU",
                    cell: o,
                    value: r_d[o],
                });
            }
            r_d[u[f]] -= upper[f] * lower[f] / r_d[o];
        }

        for (cell, rd) in r_d.iter_mut().enumerate() {
            if !valid_pivot(*rd, diag[cell]) {
                return Err(LduError::ZeroPivot {
                    preconditioner: "DILU",
                    cell,
                    value: *rd,
                });
            }
            *rd = 1.0 / *rd;
        }

        Ok(Self { matrix, r_d })
    }

    /// 主元倒数
    pub fn reciprocal_d(&self) -> &[f64] {
        &self.r_d
    }

    /// 前代用 `fwd`，回代用 `bwd`
    fn sweep(&self, w: &mut [f64], r: &[f64], fwd: &[f64], bwd: &[f64]) {
        let addr = self.matrix.addressing();
        let (l, u) = (addr.lower_addr(), addr.upper_addr());
        let losort = addr.losort_addr();
        let r_d = &self.r_d;

        for ((wi, &ri), &d) in w.iter_mut().zip(r).zip(r_d) {
            *wi = d * ri;
        }
        for &f in losort {
            w[u[f]] -= r_d[u[f]] * fwd[f] * w[l[f]];
        }
        for f in (0..l.len()).rev() {
            w[l[f]] -= r_d[l[f]] * bwd[f] * w[u[f]];
        }
    }
}

impl DiluPreconditioner<'_> {
    /// 工厂函数
    pub fn build<'m>(
        matrix: &'m LduMatrix<'m>,
        _controls: &SolverControls,
        _coupling: &Coupling<'_>,
    ) -> LduResult<Box<dyn LduPreconditioner + 'm>> {
        Ok(Box::new(DiluPreconditioner::new(matrix)?))
    }
}

impl LduPreconditioner for DiluPreconditioner<'_> {
    fn name(&self) -> &'static str {
        "DILU"
    }

    fn precondition(&self, w: &mut [f64], r: &[f64], _coupling: &Coupling<'_>) -> LduResult<()> {
        self.sweep(w, r, self.matrix.lower(), self.matrix.upper());
        Ok(())
    }

    fn precondition_t(&self, w: &mut [f64], r: &[f64], _coupling: &Coupling<'_>) -> LduResult<()> {
        self.sweep(w, r, self.matrix.upper(), self.matrix.lower());
        Ok(())
    }
}
