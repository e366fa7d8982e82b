// crates/ldu_core/src/gamg/hierarchy.rs

//! 粗网格矩阵层级
//!
//! 粗网格系数是细网格矩阵的 Galerkin 限制（分片常数延拓）：
//!
//! - 细对角求和到所属粗单元对角
//! - 两侧落入同一粗单元的面，`upper + lower` 并入该粗单元对角
//! - 其余面累加到粗网格面，方向翻转时交换 `upper`/`lower`
//! - 耦合补丁的 `boundary_coeffs` 逐面复制；物理补丁系数已在组装时
//!   并入对角与源项，粗层置零

use ldu_config::SolverControls;
use ldu_foundation::error::LduResult;

use super::agglomeration::{face_weights, pair_cells, Agglomeration, FaceRestriction};
use crate::matrix::{LduCoeffs, LduMatrix};
use crate::parallel::Communicator;

/// 一个粗网格层
#[derive(Debug, Clone)]
pub struct CoarseLevel {
    /// 从上一层到本层的聚合
    pub agglomeration: Agglomeration,
    /// 本层系数
    pub coeffs: LduCoeffs,
}

impl CoarseLevel {
    /// 本层矩阵视图
    pub fn matrix(&self) -> LduResult<LduMatrix<'_>> {
        LduMatrix::borrowed(&self.agglomeration.coarse_addr, &self.coeffs)
    }

    /// 本层单元数
    #[inline]
    pub fn n_cells(&self) -> usize {
        self.agglomeration.n_coarse()
    }
}

/// 限制系数到粗网格
pub fn restrict_coeffs(fine: &LduMatrix<'_>, agglomeration: &Agglomeration) -> LduCoeffs {
    let mut coarse = LduCoeffs::zeros(&agglomeration.coarse_addr, fine.is_symmetric());

    for (&r, &d) in agglomeration.restrict_addr.iter().zip(fine.diag()) {
        coarse.diag[r] += d;
    }

    let (upper, lower) = (fine.upper(), fine.lower());
    for (f, fr) in agglomeration.face_restrict.iter().enumerate() {
        match *fr {
            FaceRestriction::Diagonal(c) => coarse.diag[c] += upper[f] + lower[f],
            FaceRestriction::Face { face, flipped } => {
                let (up, lo) = if flipped {
                    (lower[f], upper[f])
                } else {
                    (upper[f], lower[f])
                };
                coarse.upper[face] += up;
                if let Some(coarse_lower) = coarse.lower.as_mut() {
                    coarse_lower[face] += lo;
                }
            }
        }
    }

    for (p, patch) in fine.addressing().patches().iter().enumerate() {
        if patch.coupled {
            coarse.boundary_coeffs[p].copy_from_slice(fine.boundary_coeffs(p));
        }
    }
    coarse
}

/// 多重网格层级（不含最细层）
#[derive(Debug, Clone, Default)]
pub struct GamgHierarchy {
    levels: Vec<CoarseLevel>,
}

impl GamgHierarchy {
    /// 逐层聚合直到满足停止条件
    pub fn build(matrix: &LduMatrix<'_>, controls: &SolverControls, comm: &Communicator) -> LduResult<Self> {
        let mut levels: Vec<CoarseLevel> = Vec::new();
        let mut weights = face_weights(matrix);

        while levels.len() + 1 < controls.max_levels {
            let level = {
                let fine = match levels.last() {
                    Some(last) => last.matrix()?,
                    None => LduMatrix::borrowed(matrix.addressing(), matrix.coeffs())?,
                };
                let fine_addr = fine.addressing();
                let (n_coarse, restrict_addr) = pair_cells(fine_addr, &weights);

                let n_fine_total = comm.sum_count(fine_addr.n_cells())?;
                let n_coarse_total = comm.sum_count(n_coarse)?;
                if n_coarse_total < controls.n_cells_in_coarsest_level || n_coarse_total >= n_fine_total {
                    break;
                }

                let agglomeration = Agglomeration::new(fine_addr, n_coarse, restrict_addr)?;
                let coeffs = restrict_coeffs(&fine, &agglomeration);
                weights = agglomeration.restrict_weights(&weights);

                log::debug!(
                    "GAMG level {}: {} -> {} cells ({} -> {} global), {} faces",
                    levels.len() + 1,
                    fine_addr.n_cells(),
                    n_coarse,
                    n_fine_total,
                    n_coarse_total,
                    agglomeration.coarse_addr.n_faces()
                );
                CoarseLevel {
                    agglomeration,
                    coeffs,
                }
            };
            levels.push(level);
        }

        Ok(Self { levels })
    }

    /// 粗网格层数
    #[inline]
    pub fn n_levels(&self) -> usize {
        self.levels.len()
    }

    /// 所有粗网格层，从细到粗
    #[inline]
    pub fn levels(&self) -> &[CoarseLevel] {
        &self.levels
    }
}
