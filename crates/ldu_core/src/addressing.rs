// crates/ldu_core/src/addressing.rs

//! LDU 寻址
//!
//! 从网格连接关系导出稀疏矩阵寻址：内部面的 `lower`（owner）与
//! `upper`（neighbour）数组，以及每个补丁的面到单元映射。
//!
//! # 不变量
//!
//! - 每个内部面恰好连接两个不同单元，且 `lower[f] < upper[f]`
//! - 内部面按 (lower, upper) 严格升序排列（上三角顺序）。DIC/DILU
//!   分解与 Gauss-Seidel 光顺都依赖这个顺序
//! - 构建后不可变；拓扑变化时必须整体重建，旧寻址上的矩阵与
//!   预条件器随之作废（由调用方负责丢弃）
//!
//! 辅助数组 `losort`、`ownerStart`、`losortStart` 在首次访问时计算。

use std::sync::OnceLock;

use ldu_foundation::ensure;
use ldu_foundation::error::{LduError, LduResult};

use crate::mesh::MeshConnectivity;

/// 寻址中的补丁
#[derive(Debug, Clone, PartialEq)]
pub struct LduPatch {
    /// 补丁名称
    pub name: String,
    /// 面到单元映射
    pub face_cells: Vec<usize>,
    /// 是否为耦合补丁（处理器/循环）
    pub coupled: bool,
}

/// LDU 矩阵寻址
#[derive(Debug)]
pub struct LduAddressing {
    n_cells: usize,
    lower: Vec<usize>,
    upper: Vec<usize>,
    patches: Vec<LduPatch>,

    losort: OnceLock<Vec<usize>>,
    owner_start: OnceLock<Vec<usize>>,
    losort_start: OnceLock<Vec<usize>>,
}

impl Clone for LduAddressing {
    fn clone(&self) -> Self {
        Self {
            n_cells: self.n_cells,
            lower: self.lower.clone(),
            upper: self.upper.clone(),
            patches: self.patches.clone(),
            losort: OnceLock::new(),
            owner_start: OnceLock::new(),
            losort_start: OnceLock::new(),
        }
    }
}

impl LduAddressing {
    /// 由 lower/upper 数组和补丁构建寻址，并检查全部不变量
    pub fn new(
        n_cells: usize,
        lower: Vec<usize>,
        upper: Vec<usize>,
        patches: Vec<LduPatch>,
    ) -> LduResult<Self> {
        LduError::check_size("upper address", lower.len(), upper.len())?;

        for (face, (&l, &u)) in lower.iter().zip(&upper).enumerate() {
            LduError::check_index("Cell", l, n_cells)?;
            LduError::check_index("Cell", u, n_cells)?;
            ensure!(l != u, LduError::CoincidentOwnerNeighbour { face, cell: l });
            ensure!(
                l < u,
                LduError::FaceOrdering {
                    face,
                    message: format!("owner {} 大于 neighbour {}", l, u),
                }
            );
            if face > 0 {
                let prev = (lower[face - 1], upper[face - 1]);
                if prev >= (l, u) {
                    return Err(LduError::FaceOrdering {
                        face,
                        message: format!(
                            "({}, {}) 未严格排在前一个面 ({}, {}) 之后",
                            l, u, prev.0, prev.1
                        ),
                    });
                }
            }
        }

        for patch in &patches {
            for &c in &patch.face_cells {
                LduError::check_index("Cell", c, n_cells)?;
            }
        }

        Ok(Self {
            n_cells,
            lower,
            upper,
            patches,
            losort: OnceLock::new(),
            owner_start: OnceLock::new(),
            losort_start: OnceLock::new(),
        })
    }

    /// 从网格连接关系构建
    pub fn from_connectivity(mesh: &MeshConnectivity) -> LduResult<Self> {
        mesh.validate_patches()?;
        let n_internal = mesh.n_internal_faces();

        let patches = mesh
            .patches
            .iter()
            .enumerate()
            .map(|(p, desc)| {
                Ok(LduPatch {
                    name: desc.name.clone(),
                    face_cells: mesh.face_cells(p)?.to_vec(),
                    coupled: desc.kind.is_coupled(),
                })
            })
            .collect::<LduResult<Vec<_>>>()?;

        Self::new(
            mesh.n_cells,
            mesh.owner[..n_internal].to_vec(),
            mesh.neighbour.clone(),
            patches,
        )
    }

    // ========================================================================
    // 基本访问
    // ========================================================================

    /// 单元数
    #[inline]
    pub fn n_cells(&self) -> usize {
        self.n_cells
    }

    /// 内部面数
    #[inline]
    pub fn n_faces(&self) -> usize {
        self.lower.len()
    }

    /// 补丁数
    #[inline]
    pub fn n_patches(&self) -> usize {
        self.patches.len()
    }

    /// 内部面的 owner 单元
    #[inline]
    pub fn lower_addr(&self) -> &[usize] {
        &self.lower
    }

    /// 内部面的 neighbour 单元
    #[inline]
    pub fn upper_addr(&self) -> &[usize] {
        &self.upper
    }

    /// 补丁
    #[inline]
    pub fn patch(&self, p: usize) -> &LduPatch {
        &self.patches[p]
    }

    /// 所有补丁
    #[inline]
    pub fn patches(&self) -> &[LduPatch] {
        &self.patches
    }

    /// 补丁的面到单元映射
    #[inline]
    pub fn patch_addr(&self, p: usize) -> &[usize] {
        &self.patches[p].face_cells
    }

    // ========================================================================
    // 派生寻址
    // ========================================================================

    /// 按 neighbour 排序的面索引（同一 neighbour 内保持面顺序）
    pub fn losort_addr(&self) -> &[usize] {
        self.losort.get_or_init(|| {
            let start = self.losort_start_addr();
            let mut next = start[..self.n_cells].to_vec();
            let mut losort = vec![0; self.n_faces()];
            for (face, &u) in self.upper.iter().enumerate() {
                losort[next[u]] = face;
                next[u] += 1;
            }
            losort
        })
    }

    /// 每个单元作为 owner 的第一个面，长度 `n_cells + 1`
    pub fn owner_start_addr(&self) -> &[usize] {
        self.owner_start
            .get_or_init(|| Self::start_addr(self.n_cells, &self.lower))
    }

    /// 每个单元在 losort 中的起始位置，长度 `n_cells + 1`
    pub fn losort_start_addr(&self) -> &[usize] {
        self.losort_start
            .get_or_init(|| Self::start_addr(self.n_cells, &self.upper))
    }

    /// 计数排序的前缀和
    fn start_addr(n_cells: usize, cells: &[usize]) -> Vec<usize> {
        let mut start = vec![0; n_cells + 1];
        for &c in cells {
            start[c + 1] += 1;
        }
        for c in 0..n_cells {
            start[c + 1] += start[c];
        }
        start
    }

    /// 单元的全部相邻面（作为 owner 的面在前，作为 neighbour 的面在后）
    pub fn cell_faces(&self, cell: usize) -> impl Iterator<Item = usize> + '_ {
        let own = self.owner_start_addr();
        let lo = self.losort_start_addr();
        let losort = self.losort_addr();
        (own[cell]..own[cell + 1]).chain(losort[lo[cell]..lo[cell + 1]].iter().copied())
    }
}
