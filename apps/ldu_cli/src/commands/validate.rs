// apps/ldu_cli/src/commands/validate.rs

//! 控制参数验证命令
//!
//! 解析求解器控制参数文件（未知字段即报错），检查数值范围，
//! 再检查求解器、预条件器、光顺器名称是否已注册。

use anyhow::{bail, Context, Result};
use clap::Args;
use ldu_config::SolverControls;
use ldu_core::smoothers::Smoother;
use ldu_core::{SolverRegistry, Symmetry};
use std::path::PathBuf;
use tracing::{error, info, warn};

/// 验证参数
#[derive(Args)]
pub struct ValidateArgs {
    /// 控制参数文件路径（JSON）
    pub controls: PathBuf,

    /// 严格模式（警告也视为错误）
    #[arg(long)]
    pub strict: bool,
}

#[derive(Default)]
struct ValidationResult {
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl ValidationResult {
    fn add_error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    fn add_warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    fn is_ok(&self, strict: bool) -> bool {
        self.errors.is_empty() && (!strict || self.warnings.is_empty())
    }
}

/// 执行验证命令
pub fn execute(args: ValidateArgs) -> Result<()> {
    info!("检查控制参数文件: {}", args.controls.display());

    let content = std::fs::read_to_string(&args.controls)
        .with_context(|| format!("无法读取控制参数文件: {}", args.controls.display()))?;

    let mut result = ValidationResult::default();
    match SolverControls::from_json(&content) {
        Ok(controls) => {
            check_names(&controls, &mut result);
            println!("{}", controls.to_json_pretty()?);
        }
        Err(e) => result.add_error(e.to_string()),
    }

    print_validation_result(&result, args.strict)
}

fn check_names(controls: &SolverControls, result: &mut ValidationResult) {
    let registry = SolverRegistry::with_defaults();

    for (kind, name, symmetric, asymmetric) in [
        (
            "求解器",
            controls.solver.as_str(),
            registry.solver_names(Symmetry::Symmetric),
            registry.solver_names(Symmetry::Asymmetric),
        ),
        (
            "预条件器",
            controls.preconditioner.as_str(),
            registry.preconditioner_names(Symmetry::Symmetric),
            registry.preconditioner_names(Symmetry::Asymmetric),
        ),
    ] {
        match (symmetric.contains(&name), asymmetric.contains(&name)) {
            (true, true) => {}
            (true, false) => result.add_warning(format!("{kind} '{name}' 只能用于对称矩阵")),
            (false, true) => result.add_warning(format!("{kind} '{name}' 只能用于非对称矩阵")),
            (false, false) => {
                let mut valid: Vec<&str> = symmetric.iter().chain(&asymmetric).copied().collect();
                valid.sort_unstable();
                valid.dedup();
                result.add_error(format!("未知的{kind} '{name}'，可选: {valid:?}"));
            }
        }
    }

    if let Err(e) = Smoother::from_name(&controls.smoother) {
        result.add_error(e.to_string());
    }

    if controls.rel_tol == 0.0 && controls.tolerance == 0.0 {
        result.add_warning("tolerance 与 relTol 均为 0，只能在 maxIter 处停止");
    }
}

fn print_validation_result(result: &ValidationResult, strict: bool) -> Result<()> {
    for err in &result.errors {
        error!("✗ {}", err);
    }
    for warning in &result.warnings {
        warn!("⚠ {}", warning);
    }

    if result.is_ok(strict) {
        info!("✓ 验证通过");
        Ok(())
    } else {
        bail!(
            "验证失败：发现 {} 个错误，{} 个警告",
            result.errors.len(),
            result.warnings.len()
        )
    }
}
