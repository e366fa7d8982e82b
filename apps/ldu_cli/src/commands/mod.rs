// apps/ldu_cli/src/commands/mod.rs

//! 子命令实现

pub mod info;
pub mod poisson;
pub mod validate;
