// crates/ldu_core/src/preconditioners/dic.rs

//! 对角不完全 Cholesky（DIC）预条件器
//!
//! 按面升序单遍计算 `rD[n] -= upper[f]² / rD[o]`，保存其倒数。
//! 面的遍历顺序与矩阵组装一致，结果逐位可重复。主元非正（或相对
//! 对角元过小）时返回 `ZeroPivot`，不会静默产生 NaN。

use ldu_config::SolverControls;
use ldu_foundation::error::{LduError, LduResult};
use ldu_foundation::tolerance::PIVOT_SMALL;

use super::LduPreconditioner;
use crate::interfaces::Coupling;
use crate::matrix::LduMatrix;

/// DIC 预条件器
#[derive(Debug)]
pub struct DicPreconditioner<'m> {
    matrix: &'m LduMatrix<'m>,
    /// 主元倒数
    r_d: Vec<f64>,
}

/// 主元是否可用：有限、为正且不小于对角元的 `PIVOT_SMALL` 倍
#[inline]
fn valid_positive_pivot(pivot: f64, diag: f64) -> bool {
    pivot.is_finite() && pivot > PIVOT_SMALL * diag.abs()
}

impl<'m> DicPreconditioner<'m> {
    /// 计算分解
    pub fn new(matrix: &'m LduMatrix<'m>) -> LduResult<Self> {
        let addr = matrix.addressing();
        let (l, u) = (addr.lower_addr(), addr.upper_addr());
        let upper = matrix.upper();
        let diag = matrix.diag();

        let mut r_d = diag.to_vec();
        for f in 0..l.len() {
            let o = l[f];
            // owner 的主元此时已是最终值
            if !valid_positive_pivot(r_d[o], diag[o]) {
                return Err(LduError::ZeroPivot {
                    preconditioner: "DIC",
                    cell: o,
                    value: r_d[o],
                });
            }
            r_d[u[f]] -= upper[f] * upper[f] / r_d[o];
        }

        for (cell, rd) in r_d.iter_mut().enumerate() {
            if !valid_positive_pivot(*rd, diag[cell]) {
                return Err(LduError::ZeroPivot {
                    preconditioner: "DIC",
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
}

impl DicPreconditioner<'_> {
    /// 工厂函数
    pub fn build<'m>(
        matrix: &'m LduMatrix<'m>,
        _controls: &SolverControls,
        _coupling: &Coupling<'_>,
    ) -> LduResult<Box<dyn LduPreconditioner + 'm>> {
        Ok(Box::new(DicPreconditioner::new(matrix)?))
    }
}

impl LduPreconditioner for DicPreconditioner<'_> {
    fn name(&self) -> &'static str {
        "DIC"
    }

    fn precondition(&self, w: &mut [f64], r: &[f64], _coupling: &Coupling<'_>) -> LduResult<()> {
        let addr = self.matrix.addressing();
        let (l, u) = (addr.lower_addr(), addr.upper_addr());
        let upper = self.matrix.upper();
        let r_d = &self.r_d;

        for ((wi, &ri), &d) in w.iter_mut().zip(r).zip(r_d) {
            *wi = d * ri;
        }
        for f in 0..l.len() {
            w[u[f]] -= r_d[u[f]] * upper[f] * w[l[f]];
        }
        for f in (0..l.len()).rev() {
            w[l[f]] -= r_d[l[f]] * upper[f] * w[u[f]];
        }
        Ok(())
    }
}
