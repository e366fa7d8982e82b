// crates/ldu_core/src/interfaces/processor.rs

//! 处理器界面
//!
//! 子域之间的耦合补丁。每次交换发送本侧面单元的值，接收对侧
//! 同样多的值，消息长度必须等于补丁面数。

use ldu_foundation::error::{LduError, LduResult};

use super::transform::FaceTransform;
use crate::parallel::{Communicator, RecvRequest, Tag};

/// 处理器界面描述
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessorInterface {
    /// 本地补丁索引
    pub patch: usize,
    /// 邻居进程号
    pub neighbour_rank: usize,
    /// 消息标签（两侧一致）
    pub tag: Tag,
    /// 几何变换
    pub transform: FaceTransform,
}

impl ProcessorInterface {
    /// 无变换的处理器界面
    pub fn new(patch: usize, neighbour_rank: usize, tag: Tag) -> Self {
        Self {
            patch,
            neighbour_rank,
            tag,
            transform: FaceTransform::Identity,
        }
    }

    /// 发送本侧缓冲
    pub fn send(&self, comm: &Communicator, buffer: Vec<f64>) -> LduResult<()> {
        comm.send(self.neighbour_rank, self.tag, buffer)
    }

    /// 发起接收
    pub fn post_recv(&self, comm: &Communicator, expected: usize) -> RecvRequest {
        comm.irecv(self.neighbour_rank, self.tag, expected, self.patch)
    }

    /// 阻塞接收并检查长度
    pub fn recv(&self, comm: &Communicator, expected: usize) -> LduResult<Vec<f64>> {
        let payload = comm.recv(self.neighbour_rank, self.tag)?;
        self.check_len(expected, payload)
    }

    /// 按约定顺序交换：进程号小的一侧先发后收
    pub fn scheduled_exchange(
        &self,
        comm: &Communicator,
        buffer: Vec<f64>,
        expected: usize,
    ) -> LduResult<Vec<f64>> {
        if comm.rank() < self.neighbour_rank {
            self.send(comm, buffer)?;
            self.recv(comm, expected)
        } else {
            // 长度检查放在回发之后，对侧不会因等不到消息而挂起
            let received = comm.recv(self.neighbour_rank, self.tag)?;
            self.send(comm, buffer)?;
            self.check_len(expected, received)
        }
    }

    fn check_len(&self, expected: usize, payload: Vec<f64>) -> LduResult<Vec<f64>> {
        if payload.len() != expected {
            return Err(LduError::MessageSizeMismatch {
                patch: self.patch,
                neighbour_rank: self.neighbour_rank,
                expected,
                actual: payload.len(),
            });
        }
        Ok(payload)
    }
}
