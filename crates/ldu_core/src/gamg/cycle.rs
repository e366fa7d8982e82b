// crates/ldu_core/src/gamg/cycle.rs

//! V 循环
//!
//! ```text
//! 每层: 前光顺 nPreSweeps → 残差 → 限制到粗层 → 递归（粗层初值 0）
//!       → 延拓修正 → [修正缩放] → psi += 修正 → 后光顺 nPostSweeps
//! 最粗层: 稠密 LU 直接求解，或对角预条件的 PCG / PBiCGStab
//! ```
//!
//! 直接求解只在串行且没有耦合界面时使用：粗层系数中耦合补丁的贡献
//! 不在稠密矩阵内，必须经由界面交换参与乘法。

use std::fmt;

use ldu_config::SolverControls;
use ldu_foundation::error::{LduError, LduResult};
use ldu_foundation::tolerance::VSMALL;
use nalgebra::linalg::LU;
use nalgebra::{DMatrix, DVector, Dyn};

use super::hierarchy::GamgHierarchy;
use crate::field_ops::{axpy, dot};
use crate::interfaces::Coupling;
use crate::matrix::LduMatrix;
use crate::parallel::ReduceOp;
use crate::preconditioners::DiagonalPreconditioner;
use crate::smoothers::Smoother;
use crate::solvers::{LduSolver, PBiCgStab, Pcg};

/// 最粗层迭代求解的相对容差
const COARSEST_REL_TOL: f64 = 1e-6;
/// 最粗层迭代求解的绝对容差
const COARSEST_TOLERANCE: f64 = 1e-15;
/// 最粗层迭代上限
const COARSEST_MAX_ITER: usize = 1000;

enum Coarsest {
    Direct(LU<f64, Dyn, Dyn>),
    Iterative(Box<dyn LduSolver>),
}

/// 多重网格循环：层级、光顺器与最粗层求解器
pub struct GamgCycle<'m> {
    matrix: &'m LduMatrix<'m>,
    hierarchy: GamgHierarchy,
    smoother: Smoother,
    n_pre_sweeps: usize,
    n_post_sweeps: usize,
    scale_correction: bool,
    coarsest: Coarsest,
}

impl fmt::Debug for GamgCycle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GamgCycle")
            .field("levels", &self.hierarchy.n_levels())
            .field("smoother", &self.smoother)
            .field("n_pre_sweeps", &self.n_pre_sweeps)
            .field("n_post_sweeps", &self.n_post_sweeps)
            .field("scale_correction", &self.scale_correction)
            .field("direct_coarsest", &matches!(self.coarsest, Coarsest::Direct(_)))
            .finish()
    }
}

impl<'m> GamgCycle<'m> {
    /// 构建层级与最粗层求解器
    pub fn new(matrix: &'m LduMatrix<'m>, controls: &SolverControls, coupling: &Coupling<'_>) -> LduResult<Self> {
        let smoother = Smoother::from_name(&controls.smoother)?;
        let hierarchy = GamgHierarchy::build(matrix, controls, coupling.comm)?;

        let direct = controls.direct_solve_coarsest
            && coupling.interfaces.is_empty()
            && !coupling.comm.is_parallel();
        if controls.direct_solve_coarsest && !direct {
            log::debug!("GAMG: 存在耦合界面或并行运行，最粗层改用迭代求解");
        }

        let coarsest = if direct {
            let lu = match hierarchy.levels().last() {
                Some(level) => dense_lu(&level.matrix()?)?,
                None => dense_lu(matrix)?,
            };
            Coarsest::Direct(lu)
        } else {
            let coarse_controls = SolverControls::new("", "diagonal")
                .with_tolerance(COARSEST_TOLERANCE)
                .with_rel_tol(COARSEST_REL_TOL)
                .with_max_iter(COARSEST_MAX_ITER)
                .with_comms_type(coupling.comms_type);
            let solver = if matrix.is_symmetric() {
                Pcg::build(coarse_controls, DiagonalPreconditioner::build)
            } else {
                PBiCgStab::build(coarse_controls, DiagonalPreconditioner::build)
            };
            Coarsest::Iterative(solver)
        };

        Ok(Self {
            matrix,
            hierarchy,
            smoother,
            n_pre_sweeps: controls.n_pre_sweeps,
            n_post_sweeps: controls.n_post_sweeps,
            scale_correction: controls.scale_correction,
            coarsest,
        })
    }

    /// 粗网格层级
    #[inline]
    pub fn hierarchy(&self) -> &GamgHierarchy {
        &self.hierarchy
    }

    /// 在最细层上做一次 V 循环，原地更新 `psi`
    pub fn v_cycle(&self, psi: &mut [f64], source: &[f64], coupling: &Coupling<'_>) -> LduResult<()> {
        self.matrix.check_field("psi", psi)?;
        self.matrix.check_field("source", source)?;
        self.cycle_level(self.matrix, 0, psi, source, coupling)
    }

    fn cycle_level(
        &self,
        m: &LduMatrix<'_>,
        level: usize,
        psi: &mut [f64],
        source: &[f64],
        coupling: &Coupling<'_>,
    ) -> LduResult<()> {
        let Some(next) = self.hierarchy.levels().get(level) else {
            return self.solve_coarsest(m, psi, source, coupling);
        };

        let n = m.n_cells();
        self.smoother.smooth(m, psi, source, coupling, self.n_pre_sweeps)?;

        let mut r = vec![0.0; n];
        m.residual(&mut r, psi, source, coupling)?;

        let agg = &next.agglomeration;
        let mut coarse_source = vec![0.0; agg.n_coarse()];
        agg.restrict_field(&mut coarse_source, &r);
        let mut coarse_psi = vec![0.0; agg.n_coarse()];
        let coarse = next.matrix()?;
        self.cycle_level(&coarse, level + 1, &mut coarse_psi, &coarse_source, coupling)?;

        let mut correction = vec![0.0; n];
        agg.prolong_field(&mut correction, &coarse_psi);

        if self.scale_correction {
            let mut a_corr = vec![0.0; n];
            m.amul(&mut a_corr, &correction, coupling)?;
            let sums = coupling
                .comm
                .all_reduce(&[dot(&correction, &r), dot(&correction, &a_corr)], ReduceOp::Sum)?;
            if sums[1].abs() > VSMALL {
                let sf = sums[0] / sums[1];
                correction.iter_mut().for_each(|c| *c *= sf);
            }
        }

        axpy(1.0, &correction, psi);
        self.smoother.smooth(m, psi, source, coupling, self.n_post_sweeps)
    }

    fn solve_coarsest(
        &self,
        m: &LduMatrix<'_>,
        psi: &mut [f64],
        source: &[f64],
        coupling: &Coupling<'_>,
    ) -> LduResult<()> {
        match &self.coarsest {
            Coarsest::Direct(lu) => {
                let b = DVector::from_column_slice(source);
                let x = lu
                    .solve(&b)
                    .ok_or_else(|| LduError::internal("GAMG 最粗层 LU 回代失败"))?;
                psi.copy_from_slice(x.as_slice());
            }
            Coarsest::Iterative(solver) => match solver.solve(m, psi, source, coupling) {
                Ok(perf) => log::trace!("GAMG coarsest: {}", perf),
                // 粗层源项低于舍入量级，修正可忽略
                Err(LduError::ZeroNormFactor { residual, .. }) => {
                    log::trace!("GAMG coarsest: 源项可忽略 ({:e})", residual);
                }
                Err(err) => return Err(err),
            },
        }
        Ok(())
    }
}

/// 组装稠密矩阵并做 LU 分解
fn dense_lu(m: &LduMatrix<'_>) -> LduResult<LU<f64, Dyn, Dyn>> {
    let n = m.n_cells();
    let addr = m.addressing();
    let mut dense = DMatrix::<f64>::zeros(n, n);
    for (c, &d) in m.diag().iter().enumerate() {
        dense[(c, c)] = d;
    }
    let (upper, lower) = (m.upper(), m.lower());
    for (f, (&l, &u)) in addr.lower_addr().iter().zip(addr.upper_addr()).enumerate() {
        dense[(l, u)] += upper[f];
        dense[(u, l)] += lower[f];
    }

    let lu = dense.lu();
    let factor = lu.u();
    if let Some(cell) = (0..n).find(|&i| !(factor[(i, i)].abs() > 0.0) || !factor[(i, i)].is_finite()) {
        return Err(LduError::ZeroPivot {
            preconditioner: "GAMG",
            cell,
            value: factor[(cell, cell)],
        });
    }
    Ok(lu)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addressing::LduAddressing;
    use crate::interfaces::InterfaceList;
    use crate::mesh::StructuredBlock;
    use crate::parallel::Communicator;
    use ldu_config::CommsType;

    fn poisson(addr: &LduAddressing) -> LduMatrix<'_> {
        let mut m = LduMatrix::symmetric(addr);
        m.upper_mut().iter_mut().for_each(|a| *a = -1.0);
        let mut diag = vec![0.0; addr.n_cells()];
        for (&l, &u) in addr.lower_addr().iter().zip(addr.upper_addr()) {
            diag[l] += 1.0;
            diag[u] += 1.0;
        }
        diag[0] += 1.0;
        m.diag_mut().copy_from_slice(&diag);
        m
    }

    fn residual_norm(m: &LduMatrix<'_>, psi: &[f64], source: &[f64], coupling: &Coupling<'_>) -> f64 {
        let mut r = vec![0.0; m.n_cells()];
        m.residual(&mut r, psi, source, coupling).unwrap();
        r.iter().map(|v| v.abs()).sum()
    }

    #[test]
    fn test_v_cycle_reduces_residual() {
        let block = StructuredBlock::new(16, 16, 1).unwrap();
        let addr = LduAddressing::from_connectivity(&block.connectivity()).unwrap();
        let m = poisson(&addr);
        let list = InterfaceList::new();
        let comm = Communicator::serial();
        let coupling = Coupling::new(&list, &comm, CommsType::NonBlocking);

        let source = vec![1.0; addr.n_cells()];
        for direct in [true, false] {
            let mut controls = SolverControls::new("GAMG", "none");
            controls.direct_solve_coarsest = direct;
            let cycle = GamgCycle::new(&m, &controls, &coupling).unwrap();
            assert!(cycle.hierarchy().n_levels() >= 2);

            let mut psi = vec![0.0; addr.n_cells()];
            let initial = residual_norm(&m, &psi, &source, &coupling);
            let mut previous = initial;
            for _ in 0..5 {
                cycle.v_cycle(&mut psi, &source, &coupling).unwrap();
                let current = residual_norm(&m, &psi, &source, &coupling);
                assert!(current < previous, "{current} vs {previous}");
                previous = current;
            }
            assert!(previous < 0.25 * initial);
        }
    }

    #[test]
    fn test_no_levels_solves_directly() {
        let addr = LduAddressing::new(3, vec![0, 1], vec![1, 2], vec![]).unwrap();
        let m = poisson(&addr);
        let list = InterfaceList::new();
        let comm = Communicator::serial();
        let coupling = Coupling::new(&list, &comm, CommsType::NonBlocking);

        let mut controls = SolverControls::new("GAMG", "none");
        controls.direct_solve_coarsest = true;
        let cycle = GamgCycle::new(&m, &controls, &coupling).unwrap();
        assert_eq!(cycle.hierarchy().n_levels(), 0);

        let source = [1.0, 0.0, 2.0];
        let mut psi = vec![0.0; 3];
        cycle.v_cycle(&mut psi, &source, &coupling).unwrap();
        assert!(residual_norm(&m, &psi, &source, &coupling) < 1e-12);
    }

    #[test]
    fn test_singular_coarsest_is_reported() {
        let addr = LduAddressing::new(2, vec![0], vec![1], vec![]).unwrap();
        let mut m = LduMatrix::symmetric(&addr);
        m.diag_mut().copy_from_slice(&[1.0, 1.0]);
        m.upper_mut()[0] = -1.0;
        let list = InterfaceList::new();
        let comm = Communicator::serial();
        let coupling = Coupling::new(&list, &comm, CommsType::NonBlocking);

        let mut controls = SolverControls::new("GAMG", "none");
        controls.direct_solve_coarsest = true;
        let err = GamgCycle::new(&m, &controls, &coupling).unwrap_err();
        assert!(matches!(err, LduError::ZeroPivot { preconditioner: "GAMG", .. }));
    }
}
