// crates/ldu_core/src/matrix/boundary.rs

//! 边界系数注入
//!
//! - 物理补丁：`internal_coeffs` 并入对角，`boundary_coeffs` 并入源项，
//!   每次组装恰好一次
//! - 耦合补丁：只有 `internal_coeffs` 在组装时并入对角；
//!   `boundary_coeffs` 需要对侧的当前值，在 `Amul` 中通过交换施加
//!
//! [`LduMatrix::inject_boundary`] 带标志保护，重复调用返回
//! `BoundaryAlreadyInjected`。[`LduMatrix::add_boundary_diag`] 与
//! [`LduMatrix::add_boundary_source`] 是纯累加，调用方负责每次组装只调用一次。

use ldu_foundation::error::{LduError, LduResult};

use super::LduMatrix;
use crate::interfaces::Coupling;

impl LduMatrix<'_> {
    /// 把所有补丁的 `internal_coeffs` 累加到对角尺寸的数组上
    pub fn add_boundary_diag(&self, diag: &mut [f64]) -> LduResult<()> {
        self.check_field("diag", diag)?;
        for (p, patch) in self.addressing().patches().iter().enumerate() {
            for (&c, &k) in patch.face_cells.iter().zip(self.internal_coeffs(p)) {
                diag[c] += k;
            }
        }
        Ok(())
    }

    /// 把边界贡献累加到源项
    ///
    /// 物理补丁加 `boundary_coeffs`；耦合补丁交换 `psi` 后减去
    /// `boundary_coeffs * psi_nbr`（把耦合项移到右端）。
    /// `couples_only` 为 true 时只处理耦合补丁。
    pub fn add_boundary_source(
        &self,
        source: &mut [f64],
        psi: &[f64],
        coupling: &Coupling<'_>,
        couples_only: bool,
    ) -> LduResult<()> {
        self.check_field("source", source)?;
        self.check_field("psi", psi)?;
        let addr = self.addressing();

        if !couples_only {
            for (p, patch) in addr.patches().iter().enumerate() {
                if !patch.coupled {
                    for (&c, &k) in patch.face_cells.iter().zip(self.boundary_coeffs(p)) {
                        source[c] += k;
                    }
                }
            }
        }

        let received = coupling.exchange_field(addr, psi)?;
        for (iface, values) in coupling.interfaces.iter().zip(&received) {
            let p = iface.patch();
            for ((&c, &k), &v) in addr
                .patch_addr(p)
                .iter()
                .zip(self.boundary_coeffs(p))
                .zip(values)
            {
                source[c] -= k * v;
            }
        }
        Ok(())
    }

    /// 组装时注入：所有补丁的 `internal_coeffs` 并入对角，
    /// 物理补丁的 `boundary_coeffs` 并入源项
    pub fn inject_boundary(&mut self, source: &mut [f64]) -> LduResult<()> {
        if self.boundary_injected {
            return Err(LduError::BoundaryAlreadyInjected);
        }
        self.check_field("source", source)?;

        let mut diag = self.diag().to_vec();
        self.add_boundary_diag(&mut diag)?;

        for (p, patch) in self.addressing().patches().iter().enumerate() {
            if !patch.coupled {
                for (&c, &k) in patch.face_cells.iter().zip(self.boundary_coeffs(p)) {
                    source[c] += k;
                }
            }
        }

        self.diag_mut().copy_from_slice(&diag);
        self.boundary_injected = true;
        Ok(())
    }
}
