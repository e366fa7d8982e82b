// crates/ldu_core/src/lib.rs

//! LDU 线性系统核心
//!
//! 基于网格面连接关系的稀疏矩阵（Lower/Diagonal/Upper）组装与迭代
//! 求解，以及子域之间、循环补丁之间的耦合界面交换。
//!
//! # 模块概览
//!
//! - [`mesh`]: 网格连接关系输入与结构化网格算例
//! - [`addressing`]: owner/neighbour 寻址与派生数组
//! - [`matrix`]: LDU 矩阵、矩阵-向量乘、边界系数注入
//! - [`parallel`]: 进程内消息传递与全局归约
//! - [`interfaces`]: 处理器/循环耦合界面的交换协议
//! - [`preconditioners`]: diagonal、DIC、DILU、GAMG
//! - [`smoothers`]: Gauss-Seidel 光顺
//! - [`gamg`]: 聚合、粗网格层级、V 循环
//! - [`solvers`]: PCG、PBiCG、PBiCGStab、GAMG 等
//! - [`registry`]: 名称到工厂函数的注册表
//! - [`solve`]: 求解入口
//!
//! # 示例
//!
//! ```
//! use ldu_config::{CommsType, SolverControls};
//! use ldu_core::prelude::*;
//!
//! // 三单元链：diag = 2, offdiag = -1
//! let addr = LduAddressing::new(3, vec![0, 1], vec![1, 2], vec![]).unwrap();
//! let mut matrix = LduMatrix::symmetric(&addr);
//! matrix.diag_mut().copy_from_slice(&[2.0, 2.0, 2.0]);
//! matrix.upper_mut().copy_from_slice(&[-1.0, -1.0]);
//!
//! let interfaces = InterfaceList::new();
//! let comm = Communicator::serial();
//! let coupling = Coupling::new(&interfaces, &comm, CommsType::NonBlocking);
//!
//! let controls = SolverControls::new("PCG", "DIC").with_tolerance(1e-12);
//! let mut psi = vec![0.0; 3];
//! let perf = solve(
//!     &SolverRegistry::with_defaults(),
//!     "T",
//!     &matrix,
//!     &mut psi,
//!     &[1.0, 0.0, 1.0],
//!     &controls,
//!     &coupling,
//! )
//! .unwrap();
//! assert!(perf.converged);
//! assert!((psi[1] - 1.0).abs() < 1e-10);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod addressing;
pub mod field_ops;
pub mod gamg;
pub mod interfaces;
pub mod matrix;
pub mod mesh;
pub mod parallel;
pub mod preconditioners;
pub mod registry;
pub mod smoothers;
pub mod solve;
pub mod solvers;

pub use addressing::{LduAddressing, LduPatch};
pub use interfaces::{Coupling, CoupledInterface, InterfaceList};
pub use matrix::{LduCoeffs, LduMatrix};
pub use mesh::{MeshConnectivity, PatchDescriptor, StructuredBlock};
pub use parallel::{Communicator, PstreamWorld};
pub use registry::{SolverRegistry, Symmetry};
pub use solve::solve;
pub use solvers::{LduSolver, SolverPerformance};

/// Prelude 模块，包含常用类型
pub mod prelude {
    pub use crate::addressing::{LduAddressing, LduPatch};
    pub use crate::interfaces::{Coupling, CoupledInterface, InterfaceList};
    pub use crate::matrix::LduMatrix;
    pub use crate::parallel::{Communicator, PstreamWorld};
    pub use crate::registry::{SolverRegistry, Symmetry};
    pub use crate::solve::solve;
    pub use crate::solvers::{LduSolver, SolverPerformance};
}
