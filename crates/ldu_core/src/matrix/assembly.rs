// crates/ldu_core/src/matrix/assembly.rs

//! 矩阵代数
//!
//! 同一寻址上的矩阵相加、相减、缩放、取负，以及对角占优松弛。
//! 对称矩阵加上非对称矩阵会破坏对称标志，返回 `SymmetryViolation`；
//! 非对称矩阵加对称矩阵是合法的。

use ldu_foundation::error::{LduError, LduResult};

use super::LduMatrix;

impl<'a> LduMatrix<'a> {
    fn check_compatible(&self, other: &LduMatrix<'_>) -> LduResult<()> {
        if !std::ptr::eq(self.addressing(), other.addressing()) {
            return Err(LduError::invalid_mesh("矩阵基于不同的寻址，不能合并"));
        }
        if self.is_symmetric() && other.is_asymmetric() {
            return Err(LduError::symmetry(
                "对称矩阵不能与非对称矩阵合并，先调用 make_asymmetric",
            ));
        }
        if self.boundary_injected() != other.boundary_injected() {
            return Err(LduError::internal(
                "一个矩阵已注入边界系数而另一个没有，合并后边界贡献不一致",
            ));
        }
        Ok(())
    }

    fn combine(&mut self, other: &LduMatrix<'_>, sign: f64) -> LduResult<()> {
        self.check_compatible(other)?;
        let asymmetric = self.is_asymmetric();
        let coeffs = self.coeffs.to_mut();
        let src = other.coeffs();

        for (a, &b) in coeffs.diag.iter_mut().zip(&src.diag) {
            *a += sign * b;
        }
        for (a, &b) in coeffs.upper.iter_mut().zip(&src.upper) {
            *a += sign * b;
        }
        if asymmetric {
            let other_lower = other.lower();
            if let Some(lower) = coeffs.lower.as_mut() {
                for (a, &b) in lower.iter_mut().zip(other_lower) {
                    *a += sign * b;
                }
            }
        }
        for (mine, theirs) in coeffs.internal_coeffs.iter_mut().zip(&src.internal_coeffs) {
            for (a, &b) in mine.iter_mut().zip(theirs) {
                *a += sign * b;
            }
        }
        for (mine, theirs) in coeffs.boundary_coeffs.iter_mut().zip(&src.boundary_coeffs) {
            for (a, &b) in mine.iter_mut().zip(theirs) {
                *a += sign * b;
            }
        }
        Ok(())
    }

    /// `self += other`
    pub fn add_assign(&mut self, other: &LduMatrix<'_>) -> LduResult<()> {
        self.combine(other, 1.0)
    }

    /// `self -= other`
    pub fn sub_assign(&mut self, other: &LduMatrix<'_>) -> LduResult<()> {
        self.combine(other, -1.0)
    }

    /// `self *= factor`
    pub fn scale(&mut self, factor: f64) {
        let coeffs = self.coeffs.to_mut();
        coeffs.diag.iter_mut().for_each(|v| *v *= factor);
        coeffs.upper.iter_mut().for_each(|v| *v *= factor);
        if let Some(lower) = coeffs.lower.as_mut() {
            lower.iter_mut().for_each(|v| *v *= factor);
        }
        for patch in coeffs
            .internal_coeffs
            .iter_mut()
            .chain(coeffs.boundary_coeffs.iter_mut())
        {
            patch.iter_mut().for_each(|v| *v *= factor);
        }
    }

    /// 取负
    pub fn negate(&mut self) {
        self.scale(-1.0);
    }

    /// 对角占优松弛
    ///
    /// 对角元先取 `max(|D|, Σ|非对角|)`（含耦合系数），再除以 `alpha`；
    /// 源项加上 `(D_new - D_old) * psi`，使收敛解不变。
    /// `alpha` 必须在 (0, 1] 内。
    pub fn relax(&mut self, psi: &[f64], source: &mut [f64], alpha: f64) -> LduResult<()> {
        if !(alpha > 0.0 && alpha <= 1.0) {
            return Err(LduError::config(format!("松弛因子 {} 不在 (0, 1] 内", alpha)));
        }
        self.check_field("psi", psi)?;
        self.check_field("source", source)?;

        let addr = self.addressing();
        let n = self.n_cells();

        let mut sum_off = vec![0.0; n];
        {
            let (l, u) = (addr.lower_addr(), addr.upper_addr());
            let (upper, lower) = (self.upper(), self.lower());
            for f in 0..l.len() {
                sum_off[l[f]] += upper[f].abs();
                sum_off[u[f]] += lower[f].abs();
            }
            for (p, patch) in addr.patches().iter().enumerate() {
                if patch.coupled {
                    for (&c, &k) in patch.face_cells.iter().zip(self.boundary_coeffs(p)) {
                        sum_off[c] += k.abs();
                    }
                }
            }
        }

        let diag = self.diag_mut();
        for c in 0..n {
            let d0 = diag[c];
            let d = d0.abs().max(sum_off[c]) / alpha;
            source[c] += (d - d0) * psi[c];
            diag[c] = d;
        }
        log::trace!("relax: alpha = {}", alpha);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::addressing::LduAddressing;
    use crate::matrix::LduMatrix;
    use ldu_foundation::error::LduError;

    fn chain() -> LduAddressing {
        LduAddressing::new(3, vec![0, 1], vec![1, 2], vec![]).unwrap()
    }

    #[test]
    fn test_add_sub_scale() {
        let addr = chain();
        let mut a = LduMatrix::symmetric(&addr);
        a.diag_mut().copy_from_slice(&[2.0, 2.0, 2.0]);
        a.upper_mut().copy_from_slice(&[-1.0, -1.0]);
        let b = a.clone();

        a.add_assign(&b).unwrap();
        assert_eq!(a.diag(), &[4.0, 4.0, 4.0]);
        assert_eq!(a.upper(), &[-2.0, -2.0]);

        a.sub_assign(&b).unwrap();
        assert_eq!(a.diag(), b.diag());

        a.scale(3.0);
        assert_eq!(a.upper(), &[-3.0, -3.0]);
        a.negate();
        assert_eq!(a.diag(), &[-6.0, -6.0, -6.0]);
    }

    #[test]
    fn test_symmetric_plus_asymmetric_rejected() {
        let addr = chain();
        let mut sym = LduMatrix::symmetric(&addr);
        let asym = LduMatrix::asymmetric(&addr);
        assert!(matches!(
            sym.add_assign(&asym),
            Err(LduError::SymmetryViolation { .. })
        ));

        // 非对称 += 对称：下三角同样累加
        let mut asym = LduMatrix::asymmetric(&addr);
        let mut s = LduMatrix::symmetric(&addr);
        s.upper_mut().copy_from_slice(&[1.0, 2.0]);
        asym.add_assign(&s).unwrap();
        assert_eq!(asym.lower(), &[1.0, 2.0]);
        assert_eq!(asym.upper(), &[1.0, 2.0]);
    }

    #[test]
    fn test_different_addressing_rejected() {
        let a1 = chain();
        let a2 = chain();
        let mut m1 = LduMatrix::symmetric(&a1);
        let m2 = LduMatrix::symmetric(&a2);
        assert!(m1.add_assign(&m2).is_err());
    }

    #[test]
    fn test_relax_keeps_solution() {
        let addr = chain();
        let mut m = LduMatrix::symmetric(&addr);
        // 非对角占优的行 1
        m.diag_mut().copy_from_slice(&[2.0, 1.0, 2.0]);
        m.upper_mut().copy_from_slice(&[-1.0, -1.0]);

        let psi = [1.0, 2.0, 3.0];
        let mut source = [0.0; 3];
        m.relax(&psi, &mut source, 0.5).unwrap();

        assert_eq!(m.diag(), &[4.0, 4.0, 4.0]);
        // (D - D0) * psi
        assert_eq!(source, [2.0, 6.0, 6.0]);
        assert!(m.relax(&psi, &mut source, 0.0).is_err());
        assert!(m.relax(&psi, &mut source, 1.5).is_err());
    }
}
