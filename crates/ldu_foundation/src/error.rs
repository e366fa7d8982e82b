// crates/ldu_foundation/src/error.rs

//! 错误处理模块，定义统一错误类型
//!
//! 提供 `LduError` 枚举和 `LduResult` 类型别名。所有致命条件
//! （拓扑错误、数值发散、通信协议破坏、配置错误）都以 `Err` 返回，
//! 由调用方决定是否终止运行。
//!
//! 未在迭代上限内收敛**不是**错误，而是通过求解性能记录报告。
//!
//! # 示例
//!
//! ```
//! use ldu_foundation::error::{LduError, LduResult};
//!
//! fn select(name: &str) -> LduResult<()> {
//!     Err(LduError::unknown_selection("preconditioner", name, ["DIC", "diagonal"]))
//! }
//!
//! let err = select("ILU").unwrap_err();
//! assert!(err.to_string().contains("DIC"));
//! ```

use thiserror::Error;

/// 统一结果类型
pub type LduResult<T> = Result<T, LduError>;

/// LDU 求解器错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LduError {
    // ========================================================================
    // 拓扑/寻址错误
    // ========================================================================
    /// 索引越界
    #[error("索引越界: {index_type} 索引 {index} 超出范围 0..{len}")]
    IndexOutOfBounds {
        /// 索引类别描述
        index_type: &'static str,
        /// 访问的索引
        index: usize,
        /// 上界（长度）
        len: usize,
    },

    /// 数组大小不匹配
    #[error("数组大小不匹配: {name} 期望{expected}, 实际{actual}")]
    SizeMismatch {
        /// 数据名称
        name: &'static str,
        /// 期望大小
        expected: usize,
        /// 实际大小
        actual: usize,
    },

    /// 面的 owner 与 neighbour 重合
    #[error("面 {face} 的 owner 与 neighbour 重合 (单元 {cell})")]
    CoincidentOwnerNeighbour {
        /// 面索引
        face: usize,
        /// 重合的单元
        cell: usize,
    },

    /// 内部面排序不满足上三角约定
    #[error("面 {face} 排序错误: {message}")]
    FaceOrdering {
        /// 面索引
        face: usize,
        /// 具体原因
        message: String,
    },

    /// 无效网格拓扑
    #[error("无效的网格拓扑: {message}")]
    InvalidMesh {
        /// 具体错误信息
        message: String,
    },

    // ========================================================================
    // 矩阵/数值错误
    // ========================================================================
    /// 对称/非对称系数混用
    #[error("矩阵对称性冲突: {message}")]
    SymmetryViolation {
        /// 具体错误信息
        message: String,
    },

    /// 不完全分解遇到零主元或负主元
    #[error("{preconditioner} 分解在单元 {cell} 遇到无效主元 {value:e}")]
    ZeroPivot {
        /// 预条件器名称
        preconditioner: &'static str,
        /// 单元索引
        cell: usize,
        /// 主元值
        value: f64,
    },

    /// 残差出现 NaN/Inf
    #[error("{solver}: 第 {iteration} 次迭代残差非有限值 ({value})")]
    NonFiniteResidual {
        /// 求解器名称
        solver: String,
        /// 迭代次数
        iteration: usize,
        /// 残差值
        value: f64,
    },

    /// 归一化因子为零而残差非零
    #[error("{solver}: 归一化因子为零但残差为 {residual:e}，线性系统病态")]
    ZeroNormFactor {
        /// 求解器名称
        solver: String,
        /// 残差绝对值和
        residual: f64,
    },

    /// 边界系数重复注入
    #[error("边界系数已注入矩阵，重复注入会重复计数")]
    BoundaryAlreadyInjected,

    // ========================================================================
    // 通信错误
    // ========================================================================
    /// 接收消息大小与期望面数不符
    #[error("消息大小不匹配: 补丁 {patch} 来自进程 {neighbour_rank}, 期望 {expected}, 实际 {actual}")]
    MessageSizeMismatch {
        /// 补丁索引
        patch: usize,
        /// 邻居进程号
        neighbour_rank: usize,
        /// 期望标量个数
        expected: usize,
        /// 实际标量个数
        actual: usize,
    },

    /// 存在未消费的接收缓冲
    #[error("进程 {rank} 存在 {count} 条未消费的消息 (来源: {sources:?})")]
    UnconsumedMessages {
        /// 本地进程号
        rank: usize,
        /// 未消费消息数
        count: usize,
        /// 消息来源进程
        sources: Vec<usize>,
    },

    /// 通信失败（对端断开、标签错乱等）
    #[error("通信错误: {message}")]
    Communication {
        /// 具体错误信息
        message: String,
    },

    // ========================================================================
    // 配置错误
    // ========================================================================
    /// 未知的运行时选择名称
    #[error("未知的 {kind} 类型 '{name}'，可选: {valid:?}")]
    UnknownSelection {
        /// 选择类别（solver/preconditioner/smoother）
        kind: &'static str,
        /// 请求的名称
        name: String,
        /// 有效名称列表
        valid: Vec<String>,
    },

    /// 配置错误
    #[error("配置错误: {message}")]
    Config {
        /// 具体错误信息
        message: String,
    },

    /// 内部错误
    #[error("内部错误: {message}")]
    Internal {
        /// 内部错误描述
        message: String,
    },
}

// ========================================================================
// 便捷构造方法
// ========================================================================

impl LduError {
    /// 数组大小不匹配
    pub fn size_mismatch(name: &'static str, expected: usize, actual: usize) -> Self {
        Self::SizeMismatch {
            name,
            expected,
            actual,
        }
    }

    /// 索引越界
    pub fn index_out_of_bounds(index_type: &'static str, index: usize, len: usize) -> Self {
        Self::IndexOutOfBounds {
            index_type,
            index,
            len,
        }
    }

    /// 无效网格
    pub fn invalid_mesh(message: impl Into<String>) -> Self {
        Self::InvalidMesh {
            message: message.into(),
        }
    }

    /// 对称性冲突
    pub fn symmetry(message: impl Into<String>) -> Self {
        Self::SymmetryViolation {
            message: message.into(),
        }
    }

    /// 通信错误
    pub fn communication(message: impl Into<String>) -> Self {
        Self::Communication {
            message: message.into(),
        }
    }

    /// 未知选择名称
    pub fn unknown_selection<I, S>(kind: &'static str, name: impl Into<String>, valid: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::UnknownSelection {
            kind,
            name: name.into(),
            valid: valid.into_iter().map(Into::into).collect(),
        }
    }

    /// 配置错误
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// 内部错误
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// 是否为通信协议类错误（子域已失去同步）
    pub fn is_communication(&self) -> bool {
        matches!(
            self,
            Self::MessageSizeMismatch { .. }
                | Self::UnconsumedMessages { .. }
                | Self::Communication { .. }
        )
    }
}

// ========================================================================
// 验证辅助方法
// ========================================================================

impl LduError {
    /// 检查数组大小是否匹配
    #[inline]
    pub fn check_size(name: &'static str, expected: usize, actual: usize) -> LduResult<()> {
        if expected != actual {
            Err(Self::size_mismatch(name, expected, actual))
        } else {
            Ok(())
        }
    }

    /// 检查索引是否在范围内
    #[inline]
    pub fn check_index(index_type: &'static str, index: usize, len: usize) -> LduResult<()> {
        if index >= len {
            Err(Self::index_out_of_bounds(index_type, index, len))
        } else {
            Ok(())
        }
    }

    /// 检查残差是否为有限值
    #[inline]
    pub fn check_finite(solver: &str, iteration: usize, value: f64) -> LduResult<()> {
        if value.is_finite() {
            Ok(())
        } else {
            Err(Self::NonFiniteResidual {
                solver: solver.to_string(),
                iteration,
                value,
            })
        }
    }
}

/// 条件不满足时提前返回错误
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $err:expr $(,)?) => {
        if !$cond {
            return Err($err);
        }
    };
}

// ========================================================================
// 测试
// ========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_out_of_bounds() {
        let err = LduError::index_out_of_bounds("Cell", 10, 5);
        assert!(err.to_string().contains("Cell"));
        assert!(err.to_string().contains("10"));
        assert!(err.to_string().contains("5"));
    }

    #[test]
    fn test_check_size() {
        assert!(LduError::check_size("diag", 10, 10).is_ok());
        assert!(LduError::check_size("diag", 10, 5).is_err());
    }

    #[test]
    fn test_check_index() {
        assert!(LduError::check_index("Cell", 5, 10).is_ok());
        assert!(LduError::check_index("Cell", 10, 10).is_err());
    }

    #[test]
    fn test_check_finite() {
        assert!(LduError::check_finite("PCG", 3, 1.0).is_ok());
        let err = LduError::check_finite("PCG", 3, f64::NAN).unwrap_err();
        assert!(matches!(err, LduError::NonFiniteResidual { iteration: 3, .. }));
        assert!(LduError::check_finite("PCG", 0, f64::INFINITY).is_err());
    }

    #[test]
    fn test_unknown_selection_lists_choices() {
        let err = LduError::unknown_selection("solver", "CG", vec!["PBiCG", "PCG"]);
        let msg = err.to_string();
        assert!(msg.contains("CG"));
        assert!(msg.contains("PBiCG"));
        assert!(msg.contains("PCG"));
    }

    #[test]
    fn test_communication_classification() {
        let err = LduError::MessageSizeMismatch {
            patch: 2,
            neighbour_rank: 1,
            expected: 10,
            actual: 9,
        };
        assert!(err.is_communication());
        assert!(!LduError::BoundaryAlreadyInjected.is_communication());
    }

    #[test]
    fn test_ensure_macro() {
        fn check(value: i32) -> LduResult<()> {
            ensure!(value > 0, LduError::config("value must be positive"));
            Ok(())
        }

        assert!(check(1).is_ok());
        assert!(check(-1).is_err());
    }
}
