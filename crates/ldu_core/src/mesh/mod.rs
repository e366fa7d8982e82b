// crates/ldu_core/src/mesh/mod.rs

//! 网格连接关系（外部输入）
//!
//! 求解层只消费固定拓扑的连接图：单元数、内部面的 owner/neighbour、
//! 边界补丁的面到单元映射，以及耦合补丁的配对信息。网格的生成、
//! 加密与分区都由上游负责，本模块只定义输入数据结构并做一致性检查。
//!
//! # 面编号约定
//!
//! `owner` 覆盖全部面：前 `neighbour.len()` 个是内部面，其后是按补丁
//! 顺序展开的边界面。补丁的 `start` 是边界面列表中的偏移量，
//! 即补丁第 `i` 个面的全局编号为 `n_internal + start + i`。

pub mod structured;

pub use structured::{StructuredBlock, Subdomain};

use ldu_foundation::error::{LduError, LduResult};
use serde::{Deserialize, Serialize};

use crate::interfaces::FaceTransform;

// ============================================================================
// 补丁描述
// ============================================================================

/// 补丁类型
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PatchKind {
    /// 物理边界（壁面、入口等）
    Physical,
    /// 处理器补丁：对侧是另一个子域
    Processor {
        /// 邻居进程号
        neighbour_rank: usize,
    },
    /// 循环补丁：对侧是本网格的另一个补丁
    Cyclic {
        /// 配对补丁索引
        neighbour_patch: usize,
        /// 几何变换
        transform: FaceTransform,
    },
}

impl PatchKind {
    /// 是否为耦合补丁
    #[inline]
    pub fn is_coupled(&self) -> bool {
        !matches!(self, PatchKind::Physical)
    }
}

/// 边界补丁描述
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchDescriptor {
    /// 补丁名称
    pub name: String,
    /// 边界面列表中的起始偏移
    pub start: usize,
    /// 面数
    pub size: usize,
    /// 补丁类型
    pub kind: PatchKind,
}

impl PatchDescriptor {
    /// 物理边界补丁
    pub fn physical(name: impl Into<String>, start: usize, size: usize) -> Self {
        Self {
            name: name.into(),
            start,
            size,
            kind: PatchKind::Physical,
        }
    }

    /// 处理器补丁
    pub fn processor(name: impl Into<String>, start: usize, size: usize, neighbour_rank: usize) -> Self {
        Self {
            name: name.into(),
            start,
            size,
            kind: PatchKind::Processor { neighbour_rank },
        }
    }

    /// 循环补丁
    pub fn cyclic(
        name: impl Into<String>,
        start: usize,
        size: usize,
        neighbour_patch: usize,
        transform: FaceTransform,
    ) -> Self {
        Self {
            name: name.into(),
            start,
            size,
            kind: PatchKind::Cyclic {
                neighbour_patch,
                transform,
            },
        }
    }
}

// ============================================================================
// 连接关系
// ============================================================================

/// 网格连接关系
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshConnectivity {
    /// 单元数
    pub n_cells: usize,
    /// 所有面的 owner（内部面在前，边界面在后）
    pub owner: Vec<usize>,
    /// 内部面的 neighbour
    pub neighbour: Vec<usize>,
    /// 边界补丁
    pub patches: Vec<PatchDescriptor>,
}

impl MeshConnectivity {
    /// 内部面数
    #[inline]
    pub fn n_internal_faces(&self) -> usize {
        self.neighbour.len()
    }

    /// 边界面数
    #[inline]
    pub fn n_boundary_faces(&self) -> usize {
        self.owner.len().saturating_sub(self.neighbour.len())
    }

    /// 补丁的面到单元映射
    pub fn face_cells(&self, patch: usize) -> LduResult<&[usize]> {
        let desc = self
            .patches
            .get(patch)
            .ok_or_else(|| LduError::index_out_of_bounds("Patch", patch, self.patches.len()))?;
        let begin = self.n_internal_faces() + desc.start;
        let end = begin + desc.size;
        if end > self.owner.len() {
            return Err(LduError::invalid_mesh(format!(
                "补丁 '{}' 的面范围 {}..{} 超出面总数 {}",
                desc.name,
                begin,
                end,
                self.owner.len()
            )));
        }
        Ok(&self.owner[begin..end])
    }

    /// 检查补丁覆盖与配对信息
    ///
    /// 面级别的 owner/neighbour 检查在构建寻址时完成。
    pub fn validate_patches(&self) -> LduResult<()> {
        if self.owner.len() < self.neighbour.len() {
            return Err(LduError::invalid_mesh(format!(
                "owner 长度 {} 小于内部面数 {}",
                self.owner.len(),
                self.neighbour.len()
            )));
        }

        let mut expected_start = 0;
        for (p, desc) in self.patches.iter().enumerate() {
            if desc.start != expected_start {
                return Err(LduError::invalid_mesh(format!(
                    "补丁 {} '{}' 起始偏移为 {}，期望 {}",
                    p, desc.name, desc.start, expected_start
                )));
            }
            expected_start += desc.size;

            if let PatchKind::Cyclic {
                neighbour_patch, ..
            } = desc.kind
            {
                let nbr = self.patches.get(neighbour_patch).ok_or_else(|| {
                    LduError::index_out_of_bounds("Patch", neighbour_patch, self.patches.len())
                })?;
                let paired = matches!(
                    nbr.kind,
                    PatchKind::Cyclic { neighbour_patch: back, .. } if back == p
                );
                if !paired || nbr.size != desc.size || neighbour_patch == p {
                    return Err(LduError::invalid_mesh(format!(
                        "循环补丁 '{}' 与 '{}' 未正确配对",
                        desc.name, nbr.name
                    )));
                }
            }
        }

        LduError::check_size("boundary faces", expected_start, self.n_boundary_faces())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_cell_mesh() -> MeshConnectivity {
        MeshConnectivity {
            n_cells: 2,
            owner: vec![0, 0, 1],
            neighbour: vec![1],
            patches: vec![
                PatchDescriptor::physical("left", 0, 1),
                PatchDescriptor::physical("right", 1, 1),
            ],
        }
    }

    #[test]
    fn test_face_cells() {
        let mesh = two_cell_mesh();
        assert_eq!(mesh.face_cells(0).unwrap(), &[0]);
        assert_eq!(mesh.face_cells(1).unwrap(), &[1]);
        assert!(mesh.face_cells(2).is_err());
        assert!(mesh.validate_patches().is_ok());
    }

    #[test]
    fn test_patch_gap_rejected() {
        let mut mesh = two_cell_mesh();
        mesh.patches[1].start = 2;
        assert!(mesh.validate_patches().is_err());
    }

    #[test]
    fn test_cyclic_pairing() {
        let mut mesh = two_cell_mesh();
        mesh.patches[0].kind = PatchKind::Cyclic {
            neighbour_patch: 1,
            transform: FaceTransform::Identity,
        };
        assert!(mesh.validate_patches().is_err());

        mesh.patches[1].kind = PatchKind::Cyclic {
            neighbour_patch: 0,
            transform: FaceTransform::Identity,
        };
        assert!(mesh.validate_patches().is_ok());
        assert!(mesh.patches[0].kind.is_coupled());
    }
}
