// crates/ldu_config/src/error.rs

//! 配置层错误类型

use ldu_foundation::LduError;

/// 配置错误
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO 错误
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 解析错误（含未知字段、未知枚举值）
    #[error("解析错误: {0}")]
    Parse(String),

    /// 无效值
    #[error("无效值 '{key}': {value} - {reason}")]
    InvalidValue {
        /// 配置键
        key: String,
        /// 配置值
        value: String,
        /// 原因
        reason: String,
    },

    /// 未知名称
    #[error("未知的 {kind} '{name}'，可选: {valid:?}")]
    UnknownName {
        /// 名称类别
        kind: &'static str,
        /// 请求的名称
        name: String,
        /// 有效名称列表
        valid: Vec<String>,
    },
}

impl ConfigError {
    /// 构造无效值错误
    pub fn invalid(key: impl Into<String>, value: impl ToString, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

impl From<ConfigError> for LduError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::UnknownName { kind, name, valid } => LduError::UnknownSelection {
                kind,
                name,
                valid,
            },
            other => LduError::config(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::invalid("maxIter", 0, "必须为正");
        assert!(err.to_string().contains("maxIter"));
    }

    #[test]
    fn test_unknown_name_maps_to_selection_error() {
        let err: LduError = ConfigError::UnknownName {
            kind: "commsType",
            name: "async".into(),
            valid: vec!["blocking".into()],
        }
        .into();
        assert!(matches!(err, LduError::UnknownSelection { kind: "commsType", .. }));
    }
}
