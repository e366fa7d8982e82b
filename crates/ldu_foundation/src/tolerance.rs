// crates/ldu_foundation/src/tolerance.rs

//! 数值常量
//!
//! 求解器共用的量级常量。所有阈值集中在此处，避免各模块
//! 各自硬编码 `1e-20` 之类的字面量。

/// 极小量：归一化因子下限、奇异性判据
pub const SMALL: f64 = 1.0e-20;

/// 非常小量：除零保护
pub const VSMALL: f64 = 1.0e-300;

/// 不完全分解主元下限（相对对角元）
pub const PIVOT_SMALL: f64 = 1.0e-15;
