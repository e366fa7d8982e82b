// crates/ldu_config/src/comms.rs

//! 通信模式
//!
//! 耦合补丁的数据交换支持三种模式：
//!
//! - `blocking`: 同步收发，每个补丁依次完成
//! - `scheduled`: 预先约定的收发顺序（低编号进程先发后收）
//! - `nonBlocking`: 所有补丁先发起，再统一等待

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// 通信模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CommsType {
    /// 阻塞通信
    #[serde(rename = "blocking")]
    Blocking,
    /// 调度通信
    #[serde(rename = "scheduled")]
    Scheduled,
    /// 非阻塞通信
    #[default]
    #[serde(rename = "nonBlocking")]
    NonBlocking,
}

impl CommsType {
    /// 所有合法名称
    pub const NAMES: [&'static str; 3] = ["blocking", "scheduled", "nonBlocking"];

    /// 配置文件中的名称
    pub fn name(self) -> &'static str {
        match self {
            Self::Blocking => "blocking",
            Self::Scheduled => "scheduled",
            Self::NonBlocking => "nonBlocking",
        }
    }
}

impl fmt::Display for CommsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CommsType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "blocking" => Ok(Self::Blocking),
            "scheduled" => Ok(Self::Scheduled),
            "nonBlocking" => Ok(Self::NonBlocking),
            other => Err(ConfigError::UnknownName {
                kind: "commsType",
                name: other.to_string(),
                valid: Self::NAMES.iter().map(|s| s.to_string()).collect(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names() {
        for name in CommsType::NAMES {
            let ct: CommsType = name.parse().unwrap();
            assert_eq!(ct.name(), name);
        }
    }

    #[test]
    fn test_unknown_lists_valid() {
        let err = "async".parse::<CommsType>().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("blocking"));
        assert!(msg.contains("nonBlocking"));
    }

    #[test]
    fn test_serde_names() {
        let ct: CommsType = serde_json::from_str("\"scheduled\"").unwrap();
        assert_eq!(ct, CommsType::Scheduled);
        assert_eq!(serde_json::to_string(&CommsType::NonBlocking).unwrap(), "\"nonBlocking\"");
        assert!(serde_json::from_str::<CommsType>("\"Blocking\"").is_err());
    }
}
