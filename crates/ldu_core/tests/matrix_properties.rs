// crates/ldu_core/tests/matrix_properties.rs
//!
//! LDU 矩阵性质测试
//!
//! 对称矩阵的 Amul/Tmul 一致性、残差逐位正确、边界注入与循环补丁

use ldu_config::CommsType;
use ldu_core::addressing::{LduAddressing, LduPatch};
use ldu_core::interfaces::{Coupling, CoupledInterface, CyclicInterface, FaceTransform, InterfaceList};
use ldu_core::matrix::LduMatrix;
use ldu_core::mesh::StructuredBlock;
use ldu_core::parallel::Communicator;
use ldu_foundation::LduError;

/// 简单的伪随机数生成，取值 [-0.5, 0.5)
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> f64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1);
        ((self.0 >> 33) as f64) / (u32::MAX as f64) - 0.5
    }

    fn field(&mut self, n: usize) -> Vec<f64> {
        (0..n).map(|_| self.next()).collect()
    }
}

#[test]
fn test_symmetric_amul_equals_tmul() {
    let block = StructuredBlock::new(5, 4, 3).unwrap();
    let addr = LduAddressing::from_connectivity(&block.connectivity()).unwrap();
    let list = InterfaceList::new();
    let comm = Communicator::serial();
    let coupling = Coupling::new(&list, &comm, CommsType::NonBlocking);

    for seed in 0..20u64 {
        let mut rng = Lcg(seed + 1);
        let mut m = LduMatrix::symmetric(&addr);
        m.diag_mut().copy_from_slice(&rng.field(addr.n_cells()));
        m.upper_mut().copy_from_slice(&rng.field(addr.n_faces()));
        let psi = rng.field(addr.n_cells());

        let mut a = vec![0.0; addr.n_cells()];
        let mut t = vec![0.0; addr.n_cells()];
        m.amul(&mut a, &psi, &coupling).unwrap();
        m.tmul(&mut t, &psi, &coupling).unwrap();
        assert_eq!(a, t, "seed {seed}");

        // 非对称存储但数值对称时同样成立
        let mut asym = m.clone();
        asym.make_asymmetric();
        asym.tmul(&mut t, &psi, &coupling).unwrap();
        assert_eq!(a, t, "seed {seed} (asymmetric storage)");
    }
}

#[test]
fn test_residual_is_bitwise_source_minus_amul() {
    let block = StructuredBlock::new(6, 5, 1).unwrap();
    let addr = LduAddressing::from_connectivity(&block.connectivity()).unwrap();
    let list = InterfaceList::new();
    let comm = Communicator::serial();
    let coupling = Coupling::new(&list, &comm, CommsType::NonBlocking);

    let mut rng = Lcg(42);
    let mut m = LduMatrix::asymmetric(&addr);
    m.diag_mut().copy_from_slice(&rng.field(addr.n_cells()));
    m.upper_mut().copy_from_slice(&rng.field(addr.n_faces()));
    m.lower_mut().unwrap().copy_from_slice(&rng.field(addr.n_faces()));
    let psi = rng.field(addr.n_cells());
    let source = rng.field(addr.n_cells());

    let mut apsi = vec![0.0; addr.n_cells()];
    m.amul(&mut apsi, &psi, &coupling).unwrap();
    let mut r = vec![0.0; addr.n_cells()];
    m.residual(&mut r, &psi, &source, &coupling).unwrap();

    for ((&ri, &s), &a) in r.iter().zip(&source).zip(&apsi) {
        assert_eq!(ri.to_bits(), (s - a).to_bits());
    }
}

#[test]
fn test_boundary_injection_is_guarded() {
    let block = StructuredBlock::new(3, 1, 1).unwrap();
    let addr = LduAddressing::from_connectivity(&block.connectivity()).unwrap();
    let mut m = LduMatrix::symmetric(&addr);
    m.diag_mut().iter_mut().for_each(|d| *d = 2.0);
    // xmin 补丁：Dirichlet 形式的系数
    m.set_patch_coeffs(0, vec![1.0], vec![5.0]).unwrap();

    let mut source = vec![0.0; 3];
    m.inject_boundary(&mut source).unwrap();
    assert_eq!(m.diag(), &[3.0, 2.0, 2.0]);
    assert_eq!(source, vec![5.0, 0.0, 0.0]);

    // 第二次注入会重复计数
    let err = m.inject_boundary(&mut source).unwrap_err();
    assert_eq!(err, LduError::BoundaryAlreadyInjected);
    assert_eq!(m.diag(), &[3.0, 2.0, 2.0]);

    // 纯累加接口不带保护：调用两次即重复计数
    let mut diag = vec![0.0; 3];
    m.add_boundary_diag(&mut diag).unwrap();
    m.add_boundary_diag(&mut diag).unwrap();
    assert_eq!(diag, vec![2.0, 0.0, 0.0]);
}

#[test]
fn test_cyclic_patch_matches_internal_face() {
    // 4 单元环：循环补丁连接单元 3 与单元 0
    let ring = LduAddressing::new(
        4,
        vec![0, 0, 1, 2],
        vec![1, 3, 2, 3],
        vec![],
    )
    .unwrap();
    let left = LduPatch {
        name: "left".into(),
        face_cells: vec![0],
        coupled: true,
    };
    let right = LduPatch {
        name: "right".into(),
        face_cells: vec![3],
        coupled: true,
    };
    let chain = LduAddressing::new(4, vec![0, 1, 2], vec![1, 2, 3], vec![left, right]).unwrap();

    let mut internal = LduMatrix::symmetric(&ring);
    internal.diag_mut().iter_mut().for_each(|d| *d = 4.0);
    internal.upper_mut().iter_mut().for_each(|a| *a = -1.0);

    let mut cyclic = LduMatrix::symmetric(&chain);
    cyclic.diag_mut().iter_mut().for_each(|d| *d = 4.0);
    cyclic.upper_mut().iter_mut().for_each(|a| *a = -1.0);
    cyclic.set_patch_coeffs(0, vec![0.0], vec![-1.0]).unwrap();
    cyclic.set_patch_coeffs(1, vec![0.0], vec![-1.0]).unwrap();

    let mut list = InterfaceList::new();
    list.push(CoupledInterface::Cyclic(CyclicInterface::new(0, 1, FaceTransform::Identity)))
        .unwrap();
    list.push(CoupledInterface::Cyclic(CyclicInterface::new(1, 0, FaceTransform::Identity)))
        .unwrap();
    list.validate(&chain).unwrap();

    let none = InterfaceList::new();
    let comm = Communicator::serial();
    let plain = Coupling::new(&none, &comm, CommsType::NonBlocking);
    let coupled = Coupling::new(&list, &comm, CommsType::NonBlocking);

    let psi = [1.0, -2.0, 0.5, 3.0];
    let mut expected = vec![0.0; 4];
    let mut actual = vec![0.0; 4];
    internal.amul(&mut expected, &psi, &plain).unwrap();
    cyclic.amul(&mut actual, &psi, &coupled).unwrap();
    assert_eq!(expected, actual);
}

#[test]
fn test_coincident_owner_neighbour_is_fatal() {
    let err = LduAddressing::new(3, vec![0, 1], vec![1, 1], vec![]).unwrap_err();
    assert!(matches!(err, LduError::CoincidentOwnerNeighbour { face: 1, cell: 1 }));
}
