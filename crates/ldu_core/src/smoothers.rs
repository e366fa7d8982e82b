// crates/ldu_core/src/smoothers.rs

//! Gauss-Seidel 光顺器
//!
//! 供 GAMG 各层和 `smoothSolver` 使用。每一遍开始时交换一次耦合
//! 补丁的当前值，把耦合项移到右端：`b' = source - k * psi_nbr`，
//! 之后只在本地按行更新（子域之间相当于块 Jacobi）。
//!
//! 行更新使用 `ownerStart`/`losortStart` 找到单元的上、下三角面：
//!
//! ```text
//! psi[c] = (b'[c] - Σ upper·psi[nbr] - Σ lower·psi[own]) / diag[c]
//! ```
//!
//! `symGaussSeidel` 在正向扫描后再做一次反向扫描。
//!
//! 对角元绝对值小于 `VSMALL`（或为 NaN）时，在任何更新之前返回
//! `ZeroPivot`。

use std::fmt;
use std::str::FromStr;

use ldu_foundation::error::{LduError, LduResult};
use ldu_foundation::tolerance::VSMALL;

use crate::interfaces::Coupling;
use crate::matrix::LduMatrix;

/// 光顺器类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Smoother {
    /// 正向 Gauss-Seidel
    #[default]
    GaussSeidel,
    /// 对称 Gauss-Seidel（正向 + 反向）
    SymGaussSeidel,
}

impl Smoother {
    /// 所有可选名称
    pub const NAMES: [&'static str; 2] = ["GaussSeidel", "symGaussSeidel"];

    /// 按名称选择
    pub fn from_name(name: &str) -> LduResult<Self> {
        match name {
            "GaussSeidel" => Ok(Self::GaussSeidel),
            "symGaussSeidel" => Ok(Self::SymGaussSeidel),
            other => Err(LduError::unknown_selection("smoother", other, Self::NAMES)),
        }
    }

    /// 名称
    pub fn name(&self) -> &'static str {
        match self {
            Self::GaussSeidel => "GaussSeidel",
            Self::SymGaussSeidel => "symGaussSeidel",
        }
    }

    /// 做 `n_sweeps` 遍光顺，原地更新 `psi`
    pub fn smooth(
        &self,
        matrix: &LduMatrix<'_>,
        psi: &mut [f64],
        source: &[f64],
        coupling: &Coupling<'_>,
        n_sweeps: usize,
    ) -> LduResult<()> {
        matrix.check_field("psi", psi)?;
        matrix.check_field("source", source)?;
        check_pivots(matrix, self.name())?;

        let mut b_prime = vec![0.0; source.len()];
        for _ in 0..n_sweeps {
            b_prime.copy_from_slice(source);
            matrix.add_boundary_source(&mut b_prime, psi, coupling, true)?;

            sweep(matrix, psi, &b_prime, false);
            if *self == Self::SymGaussSeidel {
                sweep(matrix, psi, &b_prime, true);
            }
        }
        Ok(())
    }
}

impl fmt::Display for Smoother {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Smoother {
    type Err = LduError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

/// 对角元在整个光顺过程中不变，只需检查一次
fn check_pivots(matrix: &LduMatrix<'_>, name: &'static str) -> LduResult<()> {
    match matrix.diag().iter().enumerate().find(|(_, d)| !(d.abs() >= VSMALL)) {
        Some((cell, &value)) => Err(LduError::ZeroPivot {
            preconditioner: name,
            cell,
            value,
        }),
        None => Ok(()),
    }
}

/// 一遍逐行更新
fn sweep(matrix: &LduMatrix<'_>, psi: &mut [f64], b_prime: &[f64], reverse: bool) {
    let addr = matrix.addressing();
    let (l, u) = (addr.lower_addr(), addr.upper_addr());
    let own_start = addr.owner_start_addr();
    let lo_start = addr.losort_start_addr();
    let losort = addr.losort_addr();
    let (diag, upper, lower) = (matrix.diag(), matrix.upper(), matrix.lower());

    let mut update = |c: usize| {
        let mut value = b_prime[c];
        for f in own_start[c]..own_start[c + 1] {
            value -= upper[f] * psi[u[f]];
        }
        for &f in &losort[lo_start[c]..lo_start[c + 1]] {
            value -= lower[f] * psi[l[f]];
        }
        psi[c] = value / diag[c];
    };

    if reverse {
        (0..addr.n_cells()).rev().for_each(&mut update);
    } else {
        (0..addr.n_cells()).for_each(&mut update);
    }
}
