// crates/ldu_core/src/interfaces/cyclic.rs

//! 循环界面
//!
//! 同一网格内两个补丁逐面配对。对侧值直接取配对补丁面单元上的值，
//! 不经过通信。

use super::transform::FaceTransform;

/// 循环界面描述
#[derive(Debug, Clone, PartialEq)]
pub struct CyclicInterface {
    /// 本地补丁索引
    pub patch: usize,
    /// 配对补丁索引
    pub neighbour_patch: usize,
    /// 几何变换
    pub transform: FaceTransform,
}

impl CyclicInterface {
    /// 创建循环界面
    pub fn new(patch: usize, neighbour_patch: usize, transform: FaceTransform) -> Self {
        Self {
            patch,
            neighbour_patch,
            transform,
        }
    }

    /// 对侧的值：配对补丁打包出的缓冲
    pub fn neighbour_values<F>(&self, pack: &F) -> Vec<f64>
    where
        F: Fn(usize) -> Vec<f64>,
    {
        pack(self.neighbour_patch)
    }
}
