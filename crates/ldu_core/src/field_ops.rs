// crates/ldu_core/src/field_ops.rs

//! 场运算
//!
//! 局部的 BLAS Level 1 风格运算，以及跨子域的全局归约版本
//! （`g_` 前缀）。求解器中所有用于收敛判断和步长计算的内积、
//! 范数都必须使用全局版本，否则各子域会得到不同的步长。
//!
//! # 函数列表
//!
//! - [`dot`], [`sum`], [`sum_mag`]: 局部归约
//! - [`axpy`], [`xpay`]: 向量更新
//! - [`g_sum`], [`g_sum_mag`], [`g_sum_prod`], [`g_sum_sqr`], [`g_average`]:
//!   全局归约

use ldu_foundation::error::LduResult;

use crate::parallel::{Communicator, ReduceOp};

// ============================================================================
// 局部运算
// ============================================================================

/// 点积 x·y
#[inline]
pub fn dot(x: &[f64], y: &[f64]) -> f64 {
    debug_assert_eq!(x.len(), y.len());
    x.iter().zip(y).map(|(&a, &b)| a * b).sum()
}

/// 元素和
#[inline]
pub fn sum(x: &[f64]) -> f64 {
    x.iter().sum()
}

/// 绝对值和
#[inline]
pub fn sum_mag(x: &[f64]) -> f64 {
    x.iter().map(|v| v.abs()).sum()
}

/// y = α*x + y
#[inline]
pub fn axpy(alpha: f64, x: &[f64], y: &mut [f64]) {
    debug_assert_eq!(x.len(), y.len());
    for (yi, &xi) in y.iter_mut().zip(x) {
        *yi += alpha * xi;
    }
}

/// y = x + α*y
#[inline]
pub fn xpay(x: &[f64], alpha: f64, y: &mut [f64]) {
    debug_assert_eq!(x.len(), y.len());
    for (yi, &xi) in y.iter_mut().zip(x) {
        *yi = xi + alpha * *yi;
    }
}

// ============================================================================
// 全局归约
// ============================================================================

/// 全局元素和
pub fn g_sum(comm: &Communicator, x: &[f64]) -> LduResult<f64> {
    comm.sum(sum(x))
}

/// 全局绝对值和
pub fn g_sum_mag(comm: &Communicator, x: &[f64]) -> LduResult<f64> {
    comm.sum(sum_mag(x))
}

/// 全局点积
pub fn g_sum_prod(comm: &Communicator, x: &[f64], y: &[f64]) -> LduResult<f64> {
    comm.sum(dot(x, y))
}

/// 全局平方和
pub fn g_sum_sqr(comm: &Communicator, x: &[f64]) -> LduResult<f64> {
    comm.sum(dot(x, x))
}

/// 全局平均值，空场返回 0
pub fn g_average(comm: &Communicator, x: &[f64]) -> LduResult<f64> {
    let totals = comm.all_reduce(&[sum(x), x.len() as f64], ReduceOp::Sum)?;
    if totals[1] > 0.0 {
        Ok(totals[0] / totals[1])
    } else {
        Ok(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::PstreamWorld;

    #[test]
    fn test_local_ops() {
        let x = [1.0, -2.0, 3.0];
        let mut y = [1.0, 1.0, 1.0];
        assert_eq!(dot(&x, &y), 2.0);
        assert_eq!(sum_mag(&x), 6.0);
        axpy(2.0, &x, &mut y);
        assert_eq!(y, [3.0, -3.0, 7.0]);
        xpay(&x, 0.5, &mut y);
        assert_eq!(y, [2.5, -3.5, 6.5]);
    }

    #[test]
    fn test_global_average_weights_by_cells() {
        let comms = PstreamWorld::create(2).unwrap();
        let out = PstreamWorld::run(comms, |comm| {
            // 进程 0 有 1 个单元，进程 1 有 3 个单元
            let x = if comm.rank() == 0 { vec![4.0] } else { vec![0.0, 0.0, 0.0] };
            (g_average(&comm, &x).unwrap(), g_sum_mag(&comm, &x).unwrap())
        });
        assert_eq!(out[0], (1.0, 4.0));
        assert_eq!(out[1], (1.0, 4.0));
    }

    #[test]
    fn test_serial_average_of_empty() {
        let comm = Communicator::serial();
        assert_eq!(g_average(&comm, &[]).unwrap(), 0.0);
    }
}
