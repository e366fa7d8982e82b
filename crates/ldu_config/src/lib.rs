// crates/ldu_config/src/lib.rs

//! LDU 求解器配置层
//!
//! 提供线性求解器的控制参数（`SolverControls`）和并行通信模式
//! （`CommsType`）。本层不含任何数值算法，只负责参数的解析、
//! 默认值和合法性检查。
//!
//! # 模块概览
//!
//! - [`solver_controls`]: 求解器控制参数（JSON 反序列化）
//! - [`comms`]: 通信模式枚举
//! - [`error`]: 配置错误类型
//!
//! # 层级架构
//!
//! ```text
//! ldu_cli         ─> 读取 SolverControls，调用 ldu_core::solve
//! ldu_core        ─> 按 SolverControls 通过注册表选择求解器
//! ldu_config      ─> SolverControls, CommsType (本层)
//! ldu_foundation  ─> LduError, 索引, 常量
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod comms;
pub mod error;
pub mod solver_controls;

pub use comms::CommsType;
pub use error::ConfigError;
pub use solver_controls::SolverControls;
