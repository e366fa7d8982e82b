// apps/ldu_cli/src/main.rs

//! LDU 求解器命令行界面
//!
//! 在结构化网格上运行 Poisson 基准算例（串行或多进程分区），
//! 检查求解器控制参数文件，列出已注册的求解器与预条件器。
//!
//! 库层通过 `log` 门面记录日志，这里安装的 `tracing` 订阅器
//! 同时接收这些记录。

mod commands;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::FmtSubscriber;

/// LDU 稀疏线性系统求解器命令行工具
#[derive(Parser)]
#[command(name = "ldu_cli")]
#[command(author = "LDU Solver Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "LDU sparse linear system solvers", long_about = None)]
struct Cli {
    /// 日志级别 (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 运行 Poisson 基准算例
    Poisson(commands::poisson::PoissonArgs),
    /// 验证求解器控制参数
    Validate(commands::validate::ValidateArgs),
    /// 显示已注册的求解器与默认参数
    Info(commands::info::InfoArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // try_init 同时安装 log -> tracing 的桥接
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish()
        .try_init()?;

    match cli.command {
        Commands::Poisson(args) => commands::poisson::execute(args),
        Commands::Validate(args) => commands::validate::execute(args),
        Commands::Info(args) => commands::info::execute(args),
    }
}
