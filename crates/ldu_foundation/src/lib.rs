// crates/ldu_foundation/src/lib.rs

//! LDU 求解器基础层
//!
//! 零业务依赖的基础层，为整个工作空间提供共享抽象。
//!
//! # 模块概览
//!
//! - [`error`]: 统一错误类型 `LduError` / `LduResult`
//! - [`tolerance`]: 求解器使用的数值常量
//!
//! # 示例
//!
//! ```
//! use ldu_foundation::{ensure, LduError, LduResult};
//!
//! fn check(cell: usize, n_cells: usize) -> LduResult<()> {
//!     ensure!(n_cells > 0, LduError::invalid_mesh("没有单元"));
//!     LduError::check_index("Cell", cell, n_cells)
//! }
//!
//! assert!(check(3, 10).is_ok());
//! assert!(check(10, 10).is_err());
//! assert!(check(0, 0).is_err());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod tolerance;

// 重导出常用类型
pub use error::{LduError, LduResult};
pub use tolerance::{PIVOT_SMALL, SMALL, VSMALL};

/// Prelude 模块，包含常用类型
pub mod prelude {
    pub use crate::error::{LduError, LduResult};
    pub use crate::tolerance::{PIVOT_SMALL, SMALL, VSMALL};
    pub use crate::ensure;
}
