// crates/ldu_core/src/matrix/mod.rs

//! LDU 稀疏矩阵
//!
//! 每个单元一个对角系数，每个内部面一个（对称）或两个（非对称）
//! 非对角系数，每个补丁一组 `internal_coeffs`（并入对角）和
//! `boundary_coeffs`（物理补丁并入源项，耦合补丁在 `Amul` 中乘对侧值）。
//!
//! 矩阵只持有寻址的引用：寻址必须比所有基于它构建的矩阵活得久，
//! 由借用检查保证。系数以 `Cow` 存放，多重网格粗层可以借用已有系数
//! 构造矩阵视图而不复制。
//!
//! # 系数含义
//!
//! - `upper[f]`: 行 `lower_addr[f]`、列 `upper_addr[f]` 的元素
//! - `lower[f]`: 行 `upper_addr[f]`、列 `lower_addr[f]` 的元素
//! - 对称矩阵不存储 `lower`，读取时返回 `upper`
//!
//! # 模块概览
//!
//! - [`ops`]: `Amul`、`Tmul`、残差、`sumA`、`H` 算子
//! - [`assembly`]: `+=`、`-=`、缩放、取负、松弛
//! - [`boundary`]: 边界系数注入

pub mod assembly;
pub mod boundary;
pub mod ops;

use std::borrow::Cow;

use ldu_foundation::error::{LduError, LduResult};

use crate::addressing::LduAddressing;

/// LDU 系数存储
#[derive(Debug, Clone, PartialEq)]
pub struct LduCoeffs {
    /// 对角系数
    pub diag: Vec<f64>,
    /// 上三角系数
    pub upper: Vec<f64>,
    /// 下三角系数，对称矩阵为 None
    pub lower: Option<Vec<f64>>,
    /// 每个补丁并入对角的系数
    pub internal_coeffs: Vec<Vec<f64>>,
    /// 每个补丁的边界系数
    pub boundary_coeffs: Vec<Vec<f64>>,
}

impl LduCoeffs {
    /// 按寻址尺寸置零
    pub fn zeros(addr: &LduAddressing, symmetric: bool) -> Self {
        let patch_zeros = || -> Vec<Vec<f64>> {
            addr.patches()
                .iter()
                .map(|p| vec![0.0; p.face_cells.len()])
                .collect()
        };
        Self {
            diag: vec![0.0; addr.n_cells()],
            upper: vec![0.0; addr.n_faces()],
            lower: (!symmetric).then(|| vec![0.0; addr.n_faces()]),
            internal_coeffs: patch_zeros(),
            boundary_coeffs: patch_zeros(),
        }
    }

    /// 检查各数组尺寸与寻址一致
    pub fn validate(&self, addr: &LduAddressing) -> LduResult<()> {
        LduError::check_size("diag", addr.n_cells(), self.diag.len())?;
        LduError::check_size("upper", addr.n_faces(), self.upper.len())?;
        if let Some(lower) = &self.lower {
            LduError::check_size("lower", addr.n_faces(), lower.len())?;
        }
        LduError::check_size("internal coeffs", addr.n_patches(), self.internal_coeffs.len())?;
        LduError::check_size("boundary coeffs", addr.n_patches(), self.boundary_coeffs.len())?;
        for (p, patch) in addr.patches().iter().enumerate() {
            let n = patch.face_cells.len();
            LduError::check_size("internal coeffs", n, self.internal_coeffs[p].len())?;
            LduError::check_size("boundary coeffs", n, self.boundary_coeffs[p].len())?;
        }
        Ok(())
    }
}

/// LDU 矩阵
#[derive(Debug, Clone)]
pub struct LduMatrix<'a> {
    addr: &'a LduAddressing,
    coeffs: Cow<'a, LduCoeffs>,
    boundary_injected: bool,
}

impl<'a> LduMatrix<'a> {
    /// 零矩阵
    pub fn new(addr: &'a LduAddressing, symmetric: bool) -> Self {
        Self {
            addr,
            coeffs: Cow::Owned(LduCoeffs::zeros(addr, symmetric)),
            boundary_injected: false,
        }
    }

    /// 对称零矩阵
    pub fn symmetric(addr: &'a LduAddressing) -> Self {
        Self::new(addr, true)
    }

    /// 非对称零矩阵
    pub fn asymmetric(addr: &'a LduAddressing) -> Self {
        Self::new(addr, false)
    }

    /// 由已有系数构造（检查尺寸）
    pub fn from_coeffs(addr: &'a LduAddressing, coeffs: LduCoeffs) -> LduResult<Self> {
        coeffs.validate(addr)?;
        Ok(Self {
            addr,
            coeffs: Cow::Owned(coeffs),
            boundary_injected: false,
        })
    }

    /// 借用系数构造只读视图
    pub fn borrowed(addr: &'a LduAddressing, coeffs: &'a LduCoeffs) -> LduResult<Self> {
        coeffs.validate(addr)?;
        Ok(Self {
            addr,
            coeffs: Cow::Borrowed(coeffs),
            boundary_injected: false,
        })
    }

    /// 寻址
    #[inline]
    pub fn addressing(&self) -> &'a LduAddressing {
        self.addr
    }

    /// 单元数
    #[inline]
    pub fn n_cells(&self) -> usize {
        self.addr.n_cells()
    }

    /// 系数
    #[inline]
    pub fn coeffs(&self) -> &LduCoeffs {
        &self.coeffs
    }

    /// 取出系数
    pub fn into_coeffs(self) -> LduCoeffs {
        self.coeffs.into_owned()
    }

    /// 是否为对称矩阵
    #[inline]
    pub fn is_symmetric(&self) -> bool {
        self.coeffs.lower.is_none()
    }

    /// 是否为非对称矩阵
    #[inline]
    pub fn is_asymmetric(&self) -> bool {
        self.coeffs.lower.is_some()
    }

    /// 边界系数是否已注入
    #[inline]
    pub fn boundary_injected(&self) -> bool {
        self.boundary_injected
    }

    // ========================================================================
    // 系数访问
    // ========================================================================

    /// 对角系数
    #[inline]
    pub fn diag(&self) -> &[f64] {
        &self.coeffs.diag
    }

    /// 对角系数（可写）
    #[inline]
    pub fn diag_mut(&mut self) -> &mut [f64] {
        &mut self.coeffs.to_mut().diag
    }

    /// 上三角系数
    #[inline]
    pub fn upper(&self) -> &[f64] {
        &self.coeffs.upper
    }

    /// 上三角系数（可写）；对称矩阵同时改变下三角
    #[inline]
    pub fn upper_mut(&mut self) -> &mut [f64] {
        &mut self.coeffs.to_mut().upper
    }

    /// 下三角系数，对称矩阵返回上三角
    #[inline]
    pub fn lower(&self) -> &[f64] {
        self.coeffs.lower.as_deref().unwrap_or(&self.coeffs.upper[..])
    }

    /// 下三角系数（可写），对称矩阵返回错误
    pub fn lower_mut(&mut self) -> LduResult<&mut [f64]> {
        match &mut self.coeffs.to_mut().lower {
            Some(lower) => Ok(lower.as_mut_slice()),
            None => Err(LduError::symmetry(
                "对称矩阵的下三角与上三角共享，不能单独写入",
            )),
        }
    }

    /// 转为非对称存储（下三角复制上三角）
    pub fn make_asymmetric(&mut self) {
        let coeffs = self.coeffs.to_mut();
        if coeffs.lower.is_none() {
            coeffs.lower = Some(coeffs.upper.clone());
        }
    }

    /// 补丁并入对角的系数
    #[inline]
    pub fn internal_coeffs(&self, patch: usize) -> &[f64] {
        &self.coeffs.internal_coeffs[patch]
    }

    /// 补丁边界系数
    #[inline]
    pub fn boundary_coeffs(&self, patch: usize) -> &[f64] {
        &self.coeffs.boundary_coeffs[patch]
    }

    /// 设置补丁系数
    pub fn set_patch_coeffs(
        &mut self,
        patch: usize,
        internal: Vec<f64>,
        boundary: Vec<f64>,
    ) -> LduResult<()> {
        LduError::check_index("Patch", patch, self.addr.n_patches())?;
        let n = self.addr.patch_addr(patch).len();
        LduError::check_size("internal coeffs", n, internal.len())?;
        LduError::check_size("boundary coeffs", n, boundary.len())?;
        let coeffs = self.coeffs.to_mut();
        coeffs.internal_coeffs[patch] = internal;
        coeffs.boundary_coeffs[patch] = boundary;
        Ok(())
    }

    /// 非对称存储的系数是否实际对称
    pub fn has_symmetric_values(&self, tol: f64) -> bool {
        match &self.coeffs.lower {
            None => true,
            Some(lower) => lower
                .iter()
                .zip(&self.coeffs.upper)
                .all(|(l, u)| (l - u).abs() <= tol * l.abs().max(u.abs()).max(1.0)),
        }
    }

    /// 检查场长度等于单元数
    #[inline]
    pub(crate) fn check_field(&self, name: &'static str, field: &[f64]) -> LduResult<()> {
        LduError::check_size(name, self.n_cells(), field.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addressing::LduPatch;

    fn addr() -> LduAddressing {
        let wall = LduPatch {
            name: "wall".into(),
            face_cells: vec![0, 2],
            coupled: false,
        };
        LduAddressing::new(3, vec![0, 1], vec![1, 2], vec![wall]).unwrap()
    }

    #[test]
    fn test_construct_zeroed() {
        let addr = addr();
        let m = LduMatrix::asymmetric(&addr);
        assert_eq!(m.diag(), &[0.0; 3]);
        assert_eq!(m.upper(), &[0.0; 2]);
        assert_eq!(m.lower(), &[0.0; 2]);
        assert_eq!(m.internal_coeffs(0), &[0.0; 2]);
        assert!(m.is_asymmetric());
        assert!(!m.boundary_injected());
    }

    #[test]
    fn test_symmetric_lower_aliases_upper() {
        let addr = addr();
        let mut m = LduMatrix::symmetric(&addr);
        m.upper_mut().copy_from_slice(&[-1.0, -2.0]);
        assert_eq!(m.lower(), &[-1.0, -2.0]);
        assert!(matches!(m.lower_mut(), Err(LduError::SymmetryViolation { .. })));

        m.make_asymmetric();
        m.lower_mut().unwrap()[0] = -5.0;
        assert_eq!(m.upper(), &[-1.0, -2.0]);
        assert!(!m.has_symmetric_values(1e-12));
    }

    #[test]
    fn test_from_coeffs_checks_sizes() {
        let addr = addr();
        let mut coeffs = LduCoeffs::zeros(&addr, true);
        coeffs.upper.push(1.0);
        assert!(LduMatrix::from_coeffs(&addr, coeffs).is_err());

        let coeffs = LduCoeffs::zeros(&addr, true);
        let view = LduMatrix::borrowed(&addr, &coeffs).unwrap();
        assert!(view.is_symmetric());
    }

    #[test]
    fn test_set_patch_coeffs() {
        let addr = addr();
        let mut m = LduMatrix::symmetric(&addr);
        assert!(m.set_patch_coeffs(0, vec![1.0], vec![0.0, 0.0]).is_err());
        assert!(m.set_patch_coeffs(1, vec![], vec![]).is_err());
        m.set_patch_coeffs(0, vec![1.0, 2.0], vec![3.0, 4.0]).unwrap();
        assert_eq!(m.boundary_coeffs(0), &[3.0, 4.0]);
    }
}
