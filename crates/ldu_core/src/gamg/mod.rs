// crates/ldu_core/src/gamg/mod.rs

//! 代数多重网格（GAMG）
//!
//! 细网格矩阵按面连接强度成对聚合，逐层构建粗网格矩阵，直到粗单元数
//! 低于 `nCellsInCoarsestLevel`、聚合不再减少单元或达到 `maxLevels`。
//! 是否继续聚合由全局归约决定，各子域总是得到相同的层数。
//!
//! 耦合补丁逐面限制到粗层（粗面单元 = 细面单元的聚合结果），补丁
//! 面数在每一层保持不变，同一个界面列表和交换协议在所有层上通用。
//!
//! # 模块概览
//!
//! - [`agglomeration`]: 成对聚合与粗网格寻址
//! - [`hierarchy`]: 粗网格矩阵层级
//! - [`cycle`]: V 循环与最粗层求解

pub mod agglomeration;
pub mod cycle;
pub mod hierarchy;

pub use agglomeration::{Agglomeration, FaceRestriction};
pub use cycle::GamgCycle;
pub use hierarchy::{CoarseLevel, GamgHierarchy};
