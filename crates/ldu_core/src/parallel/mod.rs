// crates/ldu_core/src/parallel/mod.rs

//! 并行通信
//!
//! 每个子域对应一个进程端点，子域之间只通过消息传递交互。
//!
//! # 模块概览
//!
//! - [`communicator`]: 进程端点、点对点收发、全局归约
//! - [`request`]: 非阻塞接收请求句柄

pub mod communicator;
pub mod request;

pub use communicator::{Communicator, PstreamWorld, ReduceOp};
pub use request::RecvRequest;

/// 消息标签
pub type Tag = u32;

/// 耦合补丁交换使用的第一个标签
pub const FIRST_PATCH_TAG: Tag = 100;

/// 归约收集标签
pub const REDUCE_TAG: Tag = 1;

/// 归约广播标签
pub const BROADCAST_TAG: Tag = 2;
