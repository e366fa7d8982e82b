// apps/ldu_cli/src/commands/info.rs

//! 信息显示命令

use anyhow::Result;
use clap::Args;
use ldu_config::{CommsType, SolverControls};
use ldu_core::smoothers::Smoother;
use ldu_core::{SolverRegistry, Symmetry};

/// 信息显示参数
#[derive(Args)]
pub struct InfoArgs {
    /// 显示默认控制参数
    #[arg(long)]
    pub defaults: bool,
}

/// 执行信息命令
pub fn execute(args: InfoArgs) -> Result<()> {
    println!("LDU CLI 版本: {}", env!("CARGO_PKG_VERSION"));

    let registry = SolverRegistry::with_defaults();
    for (label, symmetry) in [("对称", Symmetry::Symmetric), ("非对称", Symmetry::Asymmetric)] {
        println!("\n{label}矩阵:");
        println!("  求解器:   {}", registry.solver_names(symmetry).join(", "));
        println!("  预条件器: {}", registry.preconditioner_names(symmetry).join(", "));
    }
    println!("\n光顺器:   {}", Smoother::NAMES.join(", "));
    println!("通信模式: {}", CommsType::NAMES.join(", "));

    if args.defaults {
        println!("\n默认控制参数:");
        println!("{}", SolverControls::default().to_json_pretty()?);
    }

    Ok(())
}
