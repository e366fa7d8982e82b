// crates/ldu_core/src/matrix/ops.rs

//! 矩阵向量运算
//!
//! `Amul` 与 `Tmul` 先发起耦合补丁交换，再做对角和内部面部分，
//! 最后收齐全部补丁的对侧值并加入耦合贡献。交换在返回前全部完成，
//! 不会泄漏到下一次调用。

use ldu_foundation::error::LduResult;

use super::LduMatrix;
use crate::interfaces::{gather, Coupling, InterfaceList};

impl LduMatrix<'_> {
    /// `apsi = A * psi`
    pub fn amul(&self, apsi: &mut [f64], psi: &[f64], coupling: &Coupling<'_>) -> LduResult<()> {
        self.check_field("psi", psi)?;
        self.check_field("Apsi", apsi)?;
        let addr = self.addressing();

        let pending = coupling.initiate(addr, |p| gather(addr.patch_addr(p), psi))?;

        let (l, u) = (addr.lower_addr(), addr.upper_addr());
        let (diag, upper, lower) = (self.diag(), self.upper(), self.lower());

        for ((a, &d), &x) in apsi.iter_mut().zip(diag).zip(psi) {
            *a = d * x;
        }
        for f in 0..l.len() {
            apsi[u[f]] += lower[f] * psi[l[f]];
            apsi[l[f]] += upper[f] * psi[u[f]];
        }

        let received = coupling.finish(pending)?;
        self.add_coupled(apsi, coupling.interfaces, &received, true);
        Ok(())
    }

    /// `tpsi = A^T * psi`
    ///
    /// 耦合部分由对侧用它自己的边界系数乘好后发送过来，
    /// 因此对不对称的耦合系数也是精确转置。
    pub fn tmul(&self, tpsi: &mut [f64], psi: &[f64], coupling: &Coupling<'_>) -> LduResult<()> {
        self.check_field("psi", psi)?;
        self.check_field("Tpsi", tpsi)?;
        let addr = self.addressing();

        let pending = coupling.initiate(addr, |p| {
            addr.patch_addr(p)
                .iter()
                .zip(self.boundary_coeffs(p))
                .map(|(&c, &k)| k * psi[c])
                .collect()
        })?;

        let (l, u) = (addr.lower_addr(), addr.upper_addr());
        let (diag, upper, lower) = (self.diag(), self.upper(), self.lower());

        for ((t, &d), &x) in tpsi.iter_mut().zip(diag).zip(psi) {
            *t = d * x;
        }
        for f in 0..l.len() {
            tpsi[u[f]] += upper[f] * psi[l[f]];
            tpsi[l[f]] += lower[f] * psi[u[f]];
        }

        let received = coupling.finish(pending)?;
        self.add_coupled(tpsi, coupling.interfaces, &received, false);
        Ok(())
    }

    /// 把交换得到的耦合贡献加到结果上
    ///
    /// `multiply` 为 true 时乘本侧边界系数（`Amul`），否则直接相加（`Tmul`）。
    fn add_coupled(
        &self,
        result: &mut [f64],
        interfaces: &InterfaceList,
        received: &[Vec<f64>],
        multiply: bool,
    ) {
        for (iface, values) in interfaces.iter().zip(received) {
            let p = iface.patch();
            let fc = self.addressing().patch_addr(p);
            if multiply {
                for ((&c, &k), &v) in fc.iter().zip(self.boundary_coeffs(p)).zip(values) {
                    result[c] += k * v;
                }
            } else {
                for (&c, &v) in fc.iter().zip(values) {
                    result[c] += v;
                }
            }
        }
    }

    /// 残差 `r = source - A * psi`
    ///
    /// 逐元素直接相减，结果与单独计算 `Amul` 后相减逐位一致。
    pub fn residual(
        &self,
        r: &mut [f64],
        psi: &[f64],
        source: &[f64],
        coupling: &Coupling<'_>,
    ) -> LduResult<()> {
        self.check_field("source", source)?;
        self.amul(r, psi, coupling)?;
        for (ri, &s) in r.iter_mut().zip(source) {
            *ri = s - *ri;
        }
        Ok(())
    }

    /// 行和（含耦合补丁边界系数）
    pub fn sum_a(&self, sum_a: &mut [f64]) -> LduResult<()> {
        self.check_field("sumA", sum_a)?;
        let addr = self.addressing();
        let (l, u) = (addr.lower_addr(), addr.upper_addr());
        let (upper, lower) = (self.upper(), self.lower());

        sum_a.copy_from_slice(self.diag());
        for f in 0..l.len() {
            sum_a[u[f]] += lower[f];
            sum_a[l[f]] += upper[f];
        }
        for (p, patch) in addr.patches().iter().enumerate() {
            if patch.coupled {
                for (&c, &k) in patch.face_cells.iter().zip(self.boundary_coeffs(p)) {
                    sum_a[c] += k;
                }
            }
        }
        Ok(())
    }

    /// H 算子：`H(psi) = -(A - D) psi`，只含内部面
    pub fn h_op(&self, psi: &[f64]) -> LduResult<Vec<f64>> {
        self.check_field("psi", psi)?;
        let addr = self.addressing();
        let (l, u) = (addr.lower_addr(), addr.upper_addr());
        let (upper, lower) = (self.upper(), self.lower());

        let mut h = vec![0.0; self.n_cells()];
        for f in 0..l.len() {
            h[u[f]] -= lower[f] * psi[l[f]];
            h[l[f]] -= upper[f] * psi[u[f]];
        }
        Ok(h)
    }
}

#[cfg(test)]
mod tests {
    use ldu_config::CommsType;

    use crate::addressing::{LduAddressing, LduPatch};
    use crate::interfaces::{Coupling, CoupledInterface, CyclicInterface, FaceTransform, InterfaceList};
    use crate::matrix::LduMatrix;
    use crate::parallel::Communicator;
    use ldu_foundation::LduError;

    /// 3 个单元的链
    fn chain() -> LduAddressing {
        LduAddressing::new(3, vec![0, 1], vec![1, 2], vec![]).unwrap()
    }

    fn dense_mul(a: &[[f64; 3]; 3], x: &[f64]) -> Vec<f64> {
        (0..3).map(|i| (0..3).map(|j| a[i][j] * x[j]).sum()).collect()
    }

    #[test]
    fn test_amul_matches_dense() {
        let addr = chain();
        let mut m = LduMatrix::asymmetric(&addr);
        m.diag_mut().copy_from_slice(&[4.0, 5.0, 6.0]);
        m.upper_mut().copy_from_slice(&[-1.0, -2.0]);
        m.lower_mut().unwrap().copy_from_slice(&[-3.0, -4.0]);

        let dense = [[4.0, -1.0, 0.0], [-3.0, 5.0, -2.0], [0.0, -4.0, 6.0]];
        let psi = [1.0, 2.0, 3.0];

        let list = InterfaceList::new();
        let comm = Communicator::serial();
        let coupling = Coupling::new(&list, &comm, CommsType::NonBlocking);

        let mut apsi = vec![0.0; 3];
        m.amul(&mut apsi, &psi, &coupling).unwrap();
        assert_eq!(apsi, dense_mul(&dense, &psi));

        let dense_t = [[4.0, -3.0, 0.0], [-1.0, 5.0, -4.0], [0.0, -2.0, 6.0]];
        let mut tpsi = vec![0.0; 3];
        m.tmul(&mut tpsi, &psi, &coupling).unwrap();
        assert_eq!(tpsi, dense_mul(&dense_t, &psi));
    }

    #[test]
    fn test_sum_a_and_h() {
        let addr = chain();
        let mut m = LduMatrix::symmetric(&addr);
        m.diag_mut().copy_from_slice(&[2.0, 2.0, 2.0]);
        m.upper_mut().copy_from_slice(&[-1.0, -1.0]);

        let mut s = vec![0.0; 3];
        m.sum_a(&mut s).unwrap();
        assert_eq!(s, vec![1.0, 0.0, 1.0]);

        let h = m.h_op(&[1.0, 1.0, 1.0]).unwrap();
        assert_eq!(h, vec![1.0, 2.0, 1.0]);
    }

    #[test]
    fn test_size_checks() {
        let addr = chain();
        let m = LduMatrix::symmetric(&addr);
        let list = InterfaceList::new();
        let comm = Communicator::serial();
        let coupling = Coupling::new(&list, &comm, CommsType::Blocking);
        let mut out = vec![0.0; 2];
        assert!(m.amul(&mut out, &[0.0; 3], &coupling).is_err());
        let mut out = vec![0.0; 3];
        assert!(m.residual(&mut out, &[0.0; 3], &[0.0; 2], &coupling).is_err());
    }

    #[test]
    fn test_cyclic_asymmetric_tmul_is_transpose() {
        // 两个单元互为循环邻居，耦合系数不对称
        let a = LduPatch {
            name: "a".into(),
            face_cells: vec![0],
            coupled: true,
        };
        let b = LduPatch {
            name: "b".into(),
            face_cells: vec![1],
            coupled: true,
        };
        let addr = LduAddressing::new(2, vec![], vec![], vec![a, b]).unwrap();
        let mut m = LduMatrix::symmetric(&addr);
        m.diag_mut().copy_from_slice(&[3.0, 4.0]);
        m.set_patch_coeffs(0, vec![0.0], vec![-1.0]).unwrap();
        m.set_patch_coeffs(1, vec![0.0], vec![-2.0]).unwrap();

        let mut list = InterfaceList::new();
        list.push(CoupledInterface::Cyclic(CyclicInterface::new(0, 1, FaceTransform::Identity)))
            .unwrap();
        list.push(CoupledInterface::Cyclic(CyclicInterface::new(1, 0, FaceTransform::Identity)))
            .unwrap();
        let comm = Communicator::serial();
        let coupling = Coupling::new(&list, &comm, CommsType::NonBlocking);

        // A = [[3, -1], [-2, 4]]
        let psi = [1.0, 10.0];
        let mut apsi = vec![0.0; 2];
        m.amul(&mut apsi, &psi, &coupling).unwrap();
        assert_eq!(apsi, vec![3.0 - 10.0, -2.0 + 40.0]);

        let mut tpsi = vec![0.0; 2];
        m.tmul(&mut tpsi, &psi, &coupling).unwrap();
        assert_eq!(tpsi, vec![3.0 - 20.0, -1.0 + 40.0]);
    }

    #[test]
    fn test_missing_interface_is_fatal() {
        // 两个耦合补丁，但界面列表为空：耦合贡献不能被静默丢掉
        let a = LduPatch {
            name: "a".into(),
            face_cells: vec![0],
            coupled: true,
        };
        let b = LduPatch {
            name: "b".into(),
            face_cells: vec![1],
            coupled: true,
        };
        let addr = LduAddressing::new(2, vec![], vec![], vec![a, b]).unwrap();
        let mut m = LduMatrix::symmetric(&addr);
        m.diag_mut().copy_from_slice(&[3.0, 4.0]);
        m.set_patch_coeffs(0, vec![0.0], vec![-1.0]).unwrap();
        m.set_patch_coeffs(1, vec![0.0], vec![-2.0]).unwrap();

        let list = InterfaceList::new();
        let comm = Communicator::serial();
        let coupling = Coupling::new(&list, &comm, CommsType::NonBlocking);
        let psi = [1.0, 10.0];

        let mut out = vec![0.0; 2];
        assert!(matches!(
            m.amul(&mut out, &psi, &coupling),
            Err(LduError::InvalidMesh { .. })
        ));
        assert!(m.tmul(&mut out, &psi, &coupling).is_err());
        assert!(m.residual(&mut out, &psi, &[0.0; 2], &coupling).is_err());
        assert!(m.add_boundary_source(&mut out, &psi, &coupling, true).is_err());

        // 只挂接一侧同样不行
        let mut partial = InterfaceList::new();
        partial
            .push(CoupledInterface::Cyclic(CyclicInterface::new(0, 1, FaceTransform::Identity)))
            .unwrap();
        let coupling = Coupling::new(&partial, &comm, CommsType::NonBlocking);
        assert!(m.amul(&mut out, &psi, &coupling).is_err());
        assert_eq!(comm.pending_messages(), 0);
    }
}
