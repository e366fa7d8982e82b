// crates/ldu_core/src/interfaces/transform.rs

//! 耦合面几何变换
//!
//! 循环补丁两侧可能不共位：平移周期只移动位置，旋转周期还会旋转
//! 矢量。标量场不受任何变换影响；求解矢量场的某个分量时，交换来的
//! 值乘以正向旋转张量对应的对角元。

use ldu_foundation::error::{LduError, LduResult};
use serde::{Deserialize, Serialize};

/// 3×3 张量（行优先）
pub type Tensor = [[f64; 3]; 3];

/// 单位张量
pub const IDENTITY_TENSOR: Tensor = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

/// 耦合面变换
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum FaceTransform {
    /// 无变换
    #[default]
    Identity,
    /// 纯平移
    Translation([f64; 3]),
    /// 旋转：一个张量（整个补丁统一）或每个面一个张量
    Rotation {
        /// 正向旋转张量
        forward: Vec<Tensor>,
    },
}

impl FaceTransform {
    /// 统一旋转
    pub fn rotation(forward: Tensor) -> Self {
        FaceTransform::Rotation {
            forward: vec![forward],
        }
    }

    /// 绕 z 轴旋转 `angle` 弧度
    pub fn rotation_z(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        Self::rotation([[c, -s, 0.0], [s, c, 0.0], [0.0, 0.0, 1.0]])
    }

    /// 是否会改变交换值
    #[inline]
    pub fn does_transform(&self) -> bool {
        matches!(self, FaceTransform::Rotation { .. })
    }

    /// 对交换来的值施加变换
    ///
    /// `component` 为 `None` 表示标量场。
    pub fn apply(&self, values: &mut [f64], component: Option<usize>) -> LduResult<()> {
        let (forward, cmpt) = match (self, component) {
            (FaceTransform::Rotation { forward }, Some(cmpt)) => (forward, cmpt),
            _ => return Ok(()),
        };
        LduError::check_index("Component", cmpt, 3)?;

        match forward.len() {
            0 => Err(LduError::invalid_mesh("旋转变换缺少张量")),
            1 => {
                let factor = forward[0][cmpt][cmpt];
                values.iter_mut().for_each(|v| *v *= factor);
                Ok(())
            }
            n => {
                LduError::check_size("rotation tensors", values.len(), n)?;
                for (v, t) in values.iter_mut().zip(forward) {
                    *v *= t[cmpt][cmpt];
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_unaffected() {
        let t = FaceTransform::rotation_z(0.3);
        let mut v = vec![1.0, 2.0];
        t.apply(&mut v, None).unwrap();
        assert_eq!(v, vec![1.0, 2.0]);
    }

    #[test]
    fn test_translation_is_noop() {
        let t = FaceTransform::Translation([1.0, 0.0, 0.0]);
        assert!(!t.does_transform());
        let mut v = vec![3.0];
        t.apply(&mut v, Some(0)).unwrap();
        assert_eq!(v, vec![3.0]);
    }

    #[test]
    fn test_rotation_component_scaling() {
        let t = FaceTransform::rotation_z(std::f64::consts::FRAC_PI_2);
        let mut vx = vec![2.0];
        t.apply(&mut vx, Some(0)).unwrap();
        assert!(vx[0].abs() < 1e-15);

        let mut vz = vec![2.0];
        t.apply(&mut vz, Some(2)).unwrap();
        assert_eq!(vz, vec![2.0]);
    }

    #[test]
    fn test_per_face_tensors() {
        let mut flip = IDENTITY_TENSOR;
        flip[1][1] = -1.0;
        let t = FaceTransform::Rotation {
            forward: vec![IDENTITY_TENSOR, flip],
        };
        let mut v = vec![1.0, 1.0];
        t.apply(&mut v, Some(1)).unwrap();
        assert_eq!(v, vec![1.0, -1.0]);

        let mut wrong = vec![1.0, 1.0, 1.0];
        assert!(t.apply(&mut wrong, Some(1)).is_err());
        assert!(t.apply(&mut v, Some(3)).is_err());
    }
}
