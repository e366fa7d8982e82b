// crates/ldu_core/src/parallel/request.rs

//! 非阻塞接收请求
//!
//! `RecvRequest` 记录一次已发起但尚未完成的接收。请求必须交给
//! [`Communicator::wait`](super::Communicator::wait) 或
//! [`Communicator::wait_all`](super::Communicator::wait_all) 完成；
//! 未完成就被丢弃说明交换泄漏到了下一次调用，属于协议错误，
//! 在析构时记录并 panic（正在 unwind 时除外）。

use super::Tag;

/// 非阻塞接收请求句柄
#[derive(Debug)]
#[must_use = "接收请求必须通过 wait/wait_all 完成"]
pub struct RecvRequest {
    pub(super) source: usize,
    pub(super) tag: Tag,
    pub(super) expected: usize,
    pub(super) patch: usize,
    pub(super) done: bool,
}

impl RecvRequest {
    pub(super) fn new(source: usize, tag: Tag, expected: usize, patch: usize) -> Self {
        Self {
            source,
            tag,
            expected,
            patch,
            done: false,
        }
    }

    /// 发送方进程号
    #[inline]
    pub fn source(&self) -> usize {
        self.source
    }

    /// 消息标签
    #[inline]
    pub fn tag(&self) -> Tag {
        self.tag
    }

    /// 期望的标量个数
    #[inline]
    pub fn expected_len(&self) -> usize {
        self.expected
    }

    /// 所属补丁
    #[inline]
    pub fn patch(&self) -> usize {
        self.patch
    }

    /// 放弃请求（仅用于错误路径，随后整个运行将终止）
    pub fn abandon(mut self) {
        self.done = true;
    }
}

impl Drop for RecvRequest {
    fn drop(&mut self) {
        if !self.done && !std::thread::panicking() {
            log::error!(
                "补丁 {} 来自进程 {} (tag {}) 的接收请求未完成即被丢弃",
                self.patch,
                self.source,
                self.tag
            );
            panic!(
                "unfinished receive request: patch {} from rank {} (tag {})",
                self.patch, self.source, self.tag
            );
        }
    }
}
