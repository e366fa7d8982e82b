// crates/ldu_core/src/preconditioners/diagonal.rs

//! 对角（Jacobi）预条件器

use ldu_config::SolverControls;
use ldu_foundation::error::{LduError, LduResult};
use ldu_foundation::tolerance::VSMALL;

use super::LduPreconditioner;
use crate::interfaces::Coupling;
use crate::matrix::LduMatrix;

/// 对角预条件器：`w = r / diag`
#[derive(Debug, Clone)]
pub struct DiagonalPreconditioner {
    /// 对角元倒数
    inv_diag: Vec<f64>,
}

impl DiagonalPreconditioner {
    /// 从矩阵对角构建；零对角返回 `ZeroPivot`
    pub fn new(matrix: &LduMatrix<'_>) -> LduResult<Self> {
        let inv_diag = matrix
            .diag()
            .iter()
            .enumerate()
            .map(|(cell, &d)| {
                if d.abs() < VSMALL {
                    Err(LduError::ZeroPivot {
                        preconditioner: "diagonal",
                        cell,
                        value: d,
                    })
                } else {
                    Ok(1.0 / d)
                }
            })
            .collect::<LduResult<Vec<_>>>()?;
        Ok(Self { inv_diag })
    }

    /// 工厂函数
    pub fn build<'m>(
        matrix: &'m LduMatrix<'m>,
        _controls: &SolverControls,
        _coupling: &Coupling<'_>,
    ) -> LduResult<Box<dyn LduPreconditioner + 'm>> {
        Ok(Box::new(Self::new(matrix)?))
    }
}

impl LduPreconditioner for DiagonalPreconditioner {
    fn name(&self) -> &'static str {
        "diagonal"
    }

    fn precondition(&self, w: &mut [f64], r: &[f64], _coupling: &Coupling<'_>) -> LduResult<()> {
        for ((wi, &ri), &d) in w.iter_mut().zip(r).zip(&self.inv_diag) {
            *wi = ri * d;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addressing::LduAddressing;
    use crate::interfaces::InterfaceList;
    use crate::parallel::Communicator;
    use ldu_config::CommsType;

    #[test]
    fn test_divides_by_diag() {
        let addr = LduAddressing::new(2, vec![0], vec![1], vec![]).unwrap();
        let mut m = LduMatrix::symmetric(&addr);
        m.diag_mut().copy_from_slice(&[2.0, 4.0]);
        let p = DiagonalPreconditioner::new(&m).unwrap();

        let list = InterfaceList::new();
        let comm = Communicator::serial();
        let coupling = Coupling::new(&list, &comm, CommsType::NonBlocking);
        let mut w = vec![0.0; 2];
        p.precondition(&mut w, &[1.0, 1.0], &coupling).unwrap();
        assert_eq!(w, vec![0.5, 0.25]);
    }

    #[test]
    fn test_zero_diag_rejected() {
        let addr = LduAddressing::new(2, vec![0], vec![1], vec![]).unwrap();
        let m = LduMatrix::symmetric(&addr);
        assert!(matches!(
            DiagonalPreconditioner::new(&m),
            Err(LduError::ZeroPivot { cell: 0, .. })
        ));
    }
}
