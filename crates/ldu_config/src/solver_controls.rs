// crates/ldu_config/src/solver_controls.rs

//! SolverControls - 线性求解器控制参数
//!
//! 字段名沿用 OpenFOAM 求解器字典的拼写（`relTol`、`maxIter` 等），
//! 可直接从 JSON 读取：
//!
//! ```json
//! {
//!     "solver": "PCG",
//!     "preconditioner": "DIC",
//!     "tolerance": 1e-8,
//!     "relTol": 0.01,
//!     "commsType": "nonBlocking"
//! }
//! ```
//!
//! 未知字段是致命错误，错误信息列出所有合法字段名。
//! 求解器与预条件器名称在构建求解器时由注册表校验。

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::comms::CommsType;
use crate::error::ConfigError;

/// 线性求解器控制参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SolverControls {
    /// 求解器名称（PCG, PBiCG, PBiCGStab, GAMG, smoothSolver, diagonal）
    #[serde(default = "default_solver")]
    pub solver: String,

    /// 预条件器名称（none, diagonal, DIC, DILU, GAMG）
    #[serde(default = "default_preconditioner")]
    pub preconditioner: String,

    /// 绝对残差下限
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,

    /// 相对残差下限（相对初始残差），0 表示不启用
    #[serde(rename = "relTol", default)]
    pub rel_tol: f64,

    /// 最大迭代次数
    #[serde(rename = "maxIter", default = "default_max_iter")]
    pub max_iter: usize,

    /// 检查收敛前的最少迭代次数
    #[serde(rename = "minIter", default)]
    pub min_iter: usize,

    /// 耦合补丁通信模式
    #[serde(rename = "commsType", default)]
    pub comms_type: CommsType,

    /// 光顺器名称（GaussSeidel, symGaussSeidel）
    #[serde(default = "default_smoother")]
    pub smoother: String,

    /// smoothSolver 每次迭代的光顺遍数
    #[serde(rename = "nSweeps", default = "default_n_sweeps")]
    pub n_sweeps: usize,

    /// GAMG 前光顺遍数
    #[serde(rename = "nPreSweeps", default)]
    pub n_pre_sweeps: usize,

    /// GAMG 后光顺遍数
    #[serde(rename = "nPostSweeps", default = "default_n_post_sweeps")]
    pub n_post_sweeps: usize,

    /// GAMG 最粗层单元数目标
    #[serde(rename = "nCellsInCoarsestLevel", default = "default_n_coarsest")]
    pub n_cells_in_coarsest_level: usize,

    /// GAMG 最大层数
    #[serde(rename = "maxLevels", default = "default_max_levels")]
    pub max_levels: usize,

    /// GAMG 粗网格修正缩放
    #[serde(rename = "scaleCorrection", default = "default_true")]
    pub scale_correction: bool,

    /// GAMG 最粗层直接求解
    #[serde(rename = "directSolveCoarsest", default)]
    pub direct_solve_coarsest: bool,

    /// GAMG 作为预条件器时的 V 循环次数
    #[serde(rename = "nVcycles", default = "default_n_vcycles")]
    pub n_vcycles: usize,
}

fn default_solver() -> String { "PCG".to_string() }
fn default_preconditioner() -> String { "none".to_string() }
fn default_tolerance() -> f64 { 1e-6 }
fn default_max_iter() -> usize { 1000 }
fn default_smoother() -> String { "GaussSeidel".to_string() }
fn default_n_sweeps() -> usize { 1 }
fn default_n_post_sweeps() -> usize { 2 }
fn default_n_coarsest() -> usize { 10 }
fn default_max_levels() -> usize { 50 }
fn default_n_vcycles() -> usize { 2 }
fn default_true() -> bool { true }

impl Default for SolverControls {
    fn default() -> Self {
        Self {
            solver: default_solver(),
            preconditioner: default_preconditioner(),
            tolerance: default_tolerance(),
            rel_tol: 0.0,
            max_iter: default_max_iter(),
            min_iter: 0,
            comms_type: CommsType::default(),
            smoother: default_smoother(),
            n_sweeps: default_n_sweeps(),
            n_pre_sweeps: 0,
            n_post_sweeps: default_n_post_sweeps(),
            n_cells_in_coarsest_level: default_n_coarsest(),
            max_levels: default_max_levels(),
            scale_correction: true,
            direct_solve_coarsest: false,
            n_vcycles: default_n_vcycles(),
        }
    }
}

impl SolverControls {
    /// 指定求解器与预条件器，其余取默认值
    pub fn new(solver: impl Into<String>, preconditioner: impl Into<String>) -> Self {
        Self {
            solver: solver.into(),
            preconditioner: preconditioner.into(),
            ..Default::default()
        }
    }

    /// 设置绝对容差
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// 设置相对容差
    pub fn with_rel_tol(mut self, rel_tol: f64) -> Self {
        self.rel_tol = rel_tol;
        self
    }

    /// 设置最大迭代次数
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// 设置最少迭代次数
    pub fn with_min_iter(mut self, min_iter: usize) -> Self {
        self.min_iter = min_iter;
        self
    }

    /// 设置通信模式
    pub fn with_comms_type(mut self, comms_type: CommsType) -> Self {
        self.comms_type = comms_type;
        self
    }

    /// 设置光顺器
    pub fn with_smoother(mut self, smoother: impl Into<String>) -> Self {
        self.smoother = smoother.into();
        self
    }

    /// 从 JSON 字符串解析并验证
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let controls: SolverControls = serde_json::from_str(json)?;
        controls.validate()?;
        Ok(controls)
    }

    /// 从文件加载并验证
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_json(&content)
    }

    /// 序列化为格式化 JSON
    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// 验证参数有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.tolerance >= 0.0) {
            return Err(ConfigError::invalid("tolerance", self.tolerance, "不能为负或 NaN"));
        }
        if !(0.0..=1.0).contains(&self.rel_tol) {
            return Err(ConfigError::invalid("relTol", self.rel_tol, "必须在 [0, 1] 范围内"));
        }
        if self.min_iter > self.max_iter {
            return Err(ConfigError::invalid(
                "minIter",
                self.min_iter,
                format!("不能大于 maxIter ({})", self.max_iter),
            ));
        }
        if self.n_cells_in_coarsest_level == 0 {
            return Err(ConfigError::invalid("nCellsInCoarsestLevel", 0, "必须为正"));
        }
        if self.max_levels == 0 {
            return Err(ConfigError::invalid("maxLevels", 0, "必须为正"));
        }
        if self.n_sweeps == 0 {
            return Err(ConfigError::invalid("nSweeps", 0, "必须为正"));
        }
        if self.n_vcycles == 0 {
            return Err(ConfigError::invalid("nVcycles", 0, "必须为正"));
        }
        Ok(())
    }
}
