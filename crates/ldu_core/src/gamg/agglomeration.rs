// crates/ldu_core/src/gamg/agglomeration.rs

//! 成对聚合
//!
//! 按单元编号顺序遍历：未分配的单元与连接权重最大的未分配邻居配成
//! 一个粗单元；没有未分配邻居时并入权重最大的已分配邻居所在的粗单元；
//! 孤立单元自成一个粗单元。
//!
//! 权重相等时取先访问到的面（单元作为 owner 的面在前，作为
//! neighbour 的面在后），同一网格编号总是得到同一聚合结果。
//!
//! 细网格面权重 `sqrt(|upper·lower| / |diag_o·diag_n|)`，粗层沿用
//! 限制后的权重之和。耦合补丁不参与聚合，面数逐面保留。

use std::collections::BTreeMap;

use ldu_foundation::error::LduResult;
use ldu_foundation::tolerance::VSMALL;

use crate::addressing::{LduAddressing, LduPatch};
use crate::matrix::LduMatrix;

const UNASSIGNED: usize = usize::MAX;

/// 细网格面在粗网格上的去向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceRestriction {
    /// 两侧单元落入同一粗单元，系数并入该粗单元对角
    Diagonal(usize),
    /// 映射到粗网格面；`flipped` 表示 owner/neighbour 方向相反
    Face {
        /// 粗网格面
        face: usize,
        /// 方向是否翻转
        flipped: bool,
    },
}

/// 一层聚合结果
#[derive(Debug, Clone)]
pub struct Agglomeration {
    /// 细单元 → 粗单元
    pub restrict_addr: Vec<usize>,
    /// 细内部面 → 粗网格去向
    pub face_restrict: Vec<FaceRestriction>,
    /// 粗网格寻址
    pub coarse_addr: LduAddressing,
}

/// 细网格面连接强度
pub fn face_weights(matrix: &LduMatrix<'_>) -> Vec<f64> {
    let addr = matrix.addressing();
    let (l, u) = (addr.lower_addr(), addr.upper_addr());
    let (diag, upper, lower) = (matrix.diag(), matrix.upper(), matrix.lower());

    (0..addr.n_faces())
        .map(|f| {
            let d = (diag[l[f]] * diag[u[f]]).abs();
            if d > VSMALL {
                ((upper[f] * lower[f]).abs() / d).sqrt()
            } else {
                0.0
            }
        })
        .collect()
}

/// 成对聚合，返回 (粗单元数, 细单元 → 粗单元)
pub fn pair_cells(addr: &LduAddressing, weights: &[f64]) -> (usize, Vec<usize>) {
    let (l, u) = (addr.lower_addr(), addr.upper_addr());
    let mut restrict = vec![UNASSIGNED; addr.n_cells()];
    let mut n_coarse = 0;

    for cell in 0..addr.n_cells() {
        if restrict[cell] != UNASSIGNED {
            continue;
        }

        let mut best_free: Option<(usize, f64)> = None;
        let mut best_taken: Option<(usize, f64)> = None;
        for f in addr.cell_faces(cell) {
            let nbr = if l[f] == cell { u[f] } else { l[f] };
            let w = weights[f];
            let best = if restrict[nbr] == UNASSIGNED {
                &mut best_free
            } else {
                &mut best_taken
            };
            if best.map_or(true, |(_, bw)| w > bw) {
                *best = Some((nbr, w));
            }
        }

        match (best_free, best_taken) {
            (Some((nbr, _)), _) => {
                restrict[cell] = n_coarse;
                restrict[nbr] = n_coarse;
                n_coarse += 1;
            }
            (None, Some((nbr, _))) => restrict[cell] = restrict[nbr],
            (None, None) => {
                restrict[cell] = n_coarse;
                n_coarse += 1;
            }
        }
    }

    (n_coarse, restrict)
}

impl Agglomeration {
    /// 由单元映射构建粗网格寻址
    ///
    /// 粗网格面按 (owner, neighbour) 升序编号，满足上三角顺序。
    pub fn new(fine: &LduAddressing, n_coarse: usize, restrict_addr: Vec<usize>) -> LduResult<Self> {
        let (l, u) = (fine.lower_addr(), fine.upper_addr());

        let mut coarse_faces: BTreeMap<(usize, usize), usize> = BTreeMap::new();
        for f in 0..fine.n_faces() {
            let (a, b) = (restrict_addr[l[f]], restrict_addr[u[f]]);
            if a != b {
                coarse_faces.insert((a.min(b), a.max(b)), 0);
            }
        }
        for (index, slot) in coarse_faces.values_mut().enumerate() {
            *slot = index;
        }

        let face_restrict = (0..fine.n_faces())
            .map(|f| {
                let (a, b) = (restrict_addr[l[f]], restrict_addr[u[f]]);
                if a == b {
                    FaceRestriction::Diagonal(a)
                } else {
                    FaceRestriction::Face {
                        face: coarse_faces[&(a.min(b), a.max(b))],
                        flipped: a > b,
                    }
                }
            })
            .collect();

        let (lower, upper): (Vec<usize>, Vec<usize>) = coarse_faces.keys().copied().unzip();
        let patches = fine
            .patches()
            .iter()
            .map(|p| LduPatch {
                name: p.name.clone(),
                face_cells: p.face_cells.iter().map(|&c| restrict_addr[c]).collect(),
                coupled: p.coupled,
            })
            .collect();
        let coarse_addr = LduAddressing::new(n_coarse, lower, upper, patches)?;

        Ok(Self {
            restrict_addr,
            face_restrict,
            coarse_addr,
        })
    }

    /// 粗单元数
    #[inline]
    pub fn n_coarse(&self) -> usize {
        self.coarse_addr.n_cells()
    }

    /// 把细网格面权重累加到粗网格面
    pub fn restrict_weights(&self, weights: &[f64]) -> Vec<f64> {
        let mut coarse = vec![0.0; self.coarse_addr.n_faces()];
        for (fr, &w) in self.face_restrict.iter().zip(weights) {
            if let FaceRestriction::Face { face, .. } = *fr {
                coarse[face] += w;
            }
        }
        coarse
    }

    /// 细场求和限制到粗网格
    pub fn restrict_field(&self, coarse: &mut [f64], fine: &[f64]) {
        coarse.iter_mut().for_each(|c| *c = 0.0);
        for (&r, &v) in self.restrict_addr.iter().zip(fine) {
            coarse[r] += v;
        }
    }

    /// 粗场分片常数延拓到细网格
    pub fn prolong_field(&self, fine: &mut [f64], coarse: &[f64]) {
        for (f, &r) in fine.iter_mut().zip(&self.restrict_addr) {
            *f = coarse[r];
        }
    }
}
