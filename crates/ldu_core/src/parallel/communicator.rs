// crates/ldu_core/src/parallel/communicator.rs

//! 进程内消息传递
//!
//! `PstreamWorld::create(n)` 创建 n 个进程端点，端点之间通过
//! `std::sync::mpsc` 通道传递带标签的标量缓冲。每个端点只属于
//! 一个线程，线程内部是单线程语义。
//!
//! # 消息匹配
//!
//! 接收按 (来源, 标签) 匹配。先到达但暂不匹配的消息存入暂存队列，
//! 同一 (来源, 标签) 的消息保持发送顺序。
//!
//! # 归约
//!
//! 全局归约在主进程按进程号顺序合并后广播，所有进程得到逐位相同
//! 的结果，并行运行因此可重复。
//!
//! # 析构检查
//!
//! 端点析构时若仍有未消费的消息，说明收发失去配对：记录错误并 panic。
//! 需要提前检查时调用 [`Communicator::check_drained`]。
//!
//! # 提前失败
//!
//! 端点析构（进程返回、出错或 panic）时标记为已退出；任一进程也可以
//! 调用 [`Communicator::abort`] 中止整个世界。等待中的接收按短间隔
//! 轮询这两个标志，对端已退出且通道里没有匹配消息、或世界已中止时
//! 立即返回通信错误，不必等到超时。

use std::cell::RefCell;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use ldu_foundation::error::{LduError, LduResult};

use super::request::RecvRequest;
use super::{Tag, BROADCAST_TAG, REDUCE_TAG};

/// 默认接收超时
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// 等待期间检查退出/中止标志的间隔
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// 所有端点共享的状态
#[derive(Debug)]
struct WorldState {
    aborted: AtomicBool,
    departed: Vec<AtomicBool>,
}

/// 带标签的消息
#[derive(Debug, Clone)]
struct Envelope {
    source: usize,
    tag: Tag,
    payload: Vec<f64>,
}

/// 归约运算
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceOp {
    /// 求和
    Sum,
    /// 最大值
    Max,
    /// 最小值
    Min,
}

impl ReduceOp {
    #[inline]
    fn combine(self, a: f64, b: f64) -> f64 {
        match self {
            ReduceOp::Sum => a + b,
            ReduceOp::Max => a.max(b),
            ReduceOp::Min => a.min(b),
        }
    }
}

/// 进程世界
pub struct PstreamWorld;

impl PstreamWorld {
    /// 创建 `n_procs` 个互联的进程端点
    pub fn create(n_procs: usize) -> LduResult<Vec<Communicator>> {
        if n_procs == 0 {
            return Err(LduError::communication("进程数必须为正"));
        }
        if n_procs == 1 {
            return Ok(vec![Communicator::serial()]);
        }

        let (senders, receivers): (Vec<Sender<Envelope>>, Vec<Receiver<Envelope>>) =
            (0..n_procs).map(|_| mpsc::channel()).unzip();
        let world = Arc::new(WorldState {
            aborted: AtomicBool::new(false),
            departed: (0..n_procs).map(|_| AtomicBool::new(false)).collect(),
        });

        let comms = receivers
            .into_iter()
            .enumerate()
            .map(|(rank, receiver)| Communicator {
                rank,
                n_procs,
                senders: senders
                    .iter()
                    .enumerate()
                    .map(|(dest, tx)| (dest != rank).then(|| tx.clone()))
                    .collect(),
                receiver: Some(receiver),
                stash: RefCell::new(VecDeque::new()),
                timeout: DEFAULT_TIMEOUT,
                world: Some(Arc::clone(&world)),
            })
            .collect();
        Ok(comms)
    }

    /// 在作用域线程上运行每个进程，按进程号顺序返回结果
    ///
    /// 任一进程 panic 时在调用线程重新抛出。
    pub fn run<F, T>(comms: Vec<Communicator>, f: F) -> Vec<T>
    where
        F: Fn(Communicator) -> T + Sync,
        T: Send,
    {
        let f = &f;
        std::thread::scope(|scope| {
            let handles: Vec<_> = comms
                .into_iter()
                .map(|comm| scope.spawn(move || f(comm)))
                .collect();
            handles
                .into_iter()
                .map(|h| match h.join() {
                    Ok(v) => v,
                    Err(payload) => std::panic::resume_unwind(payload),
                })
                .collect()
        })
    }
}

/// 进程端点
pub struct Communicator {
    rank: usize,
    n_procs: usize,
    /// 按目标进程索引，自身位置为 None
    senders: Vec<Option<Sender<Envelope>>>,
    receiver: Option<Receiver<Envelope>>,
    stash: RefCell<VecDeque<Envelope>>,
    timeout: Duration,
    /// 串行端点为 None
    world: Option<Arc<WorldState>>,
}

impl std::fmt::Debug for Communicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Communicator")
            .field("rank", &self.rank)
            .field("n_procs", &self.n_procs)
            .field("stashed", &self.stash.borrow().len())
            .finish()
    }
}

impl Communicator {
    /// 单进程端点，不需要通道
    pub fn serial() -> Self {
        Self {
            rank: 0,
            n_procs: 1,
            senders: vec![None],
            receiver: None,
            stash: RefCell::new(VecDeque::new()),
            timeout: DEFAULT_TIMEOUT,
            world: None,
        }
    }

    /// 设置接收超时
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// 本进程号
    #[inline]
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// 进程总数
    #[inline]
    pub fn n_procs(&self) -> usize {
        self.n_procs
    }

    /// 是否为并行运行
    #[inline]
    pub fn is_parallel(&self) -> bool {
        self.n_procs > 1
    }

    /// 是否为主进程
    #[inline]
    pub fn is_master(&self) -> bool {
        self.rank == 0
    }

    /// 中止整个世界：其他进程正在等待或之后发起的接收都会立即失败
    pub fn abort(&self) {
        if let Some(world) = &self.world {
            log::warn!("进程 {} 中止并行运行", self.rank);
            world.aborted.store(true, Ordering::Release);
        }
    }

    /// 是否已有进程调用 [`abort`](Self::abort)
    pub fn is_aborted(&self) -> bool {
        self.world
            .as_ref()
            .is_some_and(|w| w.aborted.load(Ordering::Acquire))
    }

    // ========================================================================
    // 点对点
    // ========================================================================

    /// 发送（通道有缓冲，立即返回）
    pub fn send(&self, dest: usize, tag: Tag, payload: Vec<f64>) -> LduResult<()> {
        LduError::check_index("Rank", dest, self.n_procs)?;
        let envelope = Envelope {
            source: self.rank,
            tag,
            payload,
        };
        match &self.senders[dest] {
            None => {
                self.stash.borrow_mut().push_back(envelope);
                Ok(())
            }
            Some(tx) => tx.send(envelope).map_err(|_| {
                LduError::communication(format!(
                    "进程 {} 向进程 {} 发送失败 (tag {}): 对端已退出",
                    self.rank, dest, tag
                ))
            }),
        }
    }

    /// 阻塞接收来自 `source`、标签为 `tag` 的下一条消息
    pub fn recv(&self, source: usize, tag: Tag) -> LduResult<Vec<f64>> {
        LduError::check_index("Rank", source, self.n_procs)?;

        if let Some(payload) = self.take_stashed(source, tag) {
            return Ok(payload);
        }

        let receiver = self.receiver.as_ref().ok_or_else(|| {
            LduError::communication(format!(
                "进程 {} 没有来自进程 {} (tag {}) 的消息",
                self.rank, source, tag
            ))
        })?;

        let deadline = Instant::now() + self.timeout;
        loop {
            if self.is_aborted() {
                return Err(LduError::communication(format!(
                    "进程 {} 等待进程 {} (tag {}) 时并行运行已中止",
                    self.rank, source, tag
                )));
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(LduError::communication(format!(
                    "进程 {} 等待进程 {} (tag {}) 超时",
                    self.rank, source, tag
                )));
            }
            match receiver.recv_timeout(POLL_INTERVAL.min(deadline - now)) {
                Ok(env) if env.source == source && env.tag == tag => return Ok(env.payload),
                Ok(env) => self.stash.borrow_mut().push_back(env),
                Err(RecvTimeoutError::Timeout) => {
                    if self.has_departed(source) {
                        // 退出前发出的消息此时一定已在通道中
                        self.pending_messages();
                        if let Some(payload) = self.take_stashed(source, tag) {
                            return Ok(payload);
                        }
                        return Err(LduError::communication(format!(
                            "进程 {} 等待进程 {} (tag {}) 时对端已退出",
                            self.rank, source, tag
                        )));
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(LduError::communication(format!(
                        "进程 {} 等待进程 {} (tag {}) 时所有发送端已退出",
                        self.rank, source, tag
                    )))
                }
            }
        }
    }

    fn has_departed(&self, rank: usize) -> bool {
        self.world
            .as_ref()
            .is_some_and(|w| w.departed[rank].load(Ordering::Acquire))
    }

    fn take_stashed(&self, source: usize, tag: Tag) -> Option<Vec<f64>> {
        let mut stash = self.stash.borrow_mut();
        let pos = stash
            .iter()
            .position(|e| e.source == source && e.tag == tag)?;
        stash.remove(pos).map(|e| e.payload)
    }

    /// 发起非阻塞接收
    pub fn irecv(&self, source: usize, tag: Tag, expected_len: usize, patch: usize) -> RecvRequest {
        RecvRequest::new(source, tag, expected_len, patch)
    }

    /// 完成一个接收请求，并检查消息长度
    pub fn wait(&self, mut request: RecvRequest) -> LduResult<Vec<f64>> {
        request.done = true;
        let payload = self.recv(request.source, request.tag)?;
        if payload.len() != request.expected {
            return Err(LduError::MessageSizeMismatch {
                patch: request.patch,
                neighbour_rank: request.source,
                expected: request.expected,
                actual: payload.len(),
            });
        }
        Ok(payload)
    }

    /// 完成全部请求
    ///
    /// 即使某个请求失败也会等待其余请求，保证本轮消息全部消费；
    /// 返回第一个错误。
    pub fn wait_all(&self, requests: Vec<RecvRequest>) -> LduResult<Vec<Vec<f64>>> {
        let mut first_err = None;
        let mut out = Vec::with_capacity(requests.len());
        for request in requests {
            match self.wait(request) {
                Ok(payload) => out.push(payload),
                Err(err) => {
                    first_err.get_or_insert(err);
                    out.push(Vec::new());
                }
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(out),
        }
    }

    // ========================================================================
    // 归约
    // ========================================================================

    /// 逐分量全局归约
    pub fn all_reduce(&self, values: &[f64], op: ReduceOp) -> LduResult<Vec<f64>> {
        if !self.is_parallel() {
            return Ok(values.to_vec());
        }

        if self.is_master() {
            let mut acc = values.to_vec();
            for src in 1..self.n_procs {
                let part = self.recv(src, REDUCE_TAG)?;
                LduError::check_size("reduction buffer", acc.len(), part.len())?;
                for (a, b) in acc.iter_mut().zip(part) {
                    *a = op.combine(*a, b);
                }
            }
            for dest in 1..self.n_procs {
                self.send(dest, BROADCAST_TAG, acc.clone())?;
            }
            Ok(acc)
        } else {
            self.send(0, REDUCE_TAG, values.to_vec())?;
            let acc = self.recv(0, BROADCAST_TAG)?;
            LduError::check_size("reduction buffer", values.len(), acc.len())?;
            Ok(acc)
        }
    }

    /// 标量全局求和
    pub fn sum(&self, value: f64) -> LduResult<f64> {
        Ok(self.all_reduce(&[value], ReduceOp::Sum)?[0])
    }

    /// 标量全局最大值
    pub fn max(&self, value: f64) -> LduResult<f64> {
        Ok(self.all_reduce(&[value], ReduceOp::Max)?[0])
    }

    /// 标量全局最小值
    pub fn min(&self, value: f64) -> LduResult<f64> {
        Ok(self.all_reduce(&[value], ReduceOp::Min)?[0])
    }

    /// 计数全局求和
    pub fn sum_count(&self, count: usize) -> LduResult<usize> {
        Ok(self.sum(count as f64)?.round() as usize)
    }

    // ========================================================================
    // 排空检查
    // ========================================================================

    /// 已到达但未消费的消息数
    pub fn pending_messages(&self) -> usize {
        if let Some(receiver) = &self.receiver {
            let mut stash = self.stash.borrow_mut();
            loop {
                match receiver.try_recv() {
                    Ok(env) => stash.push_back(env),
                    Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
                }
            }
        }
        self.stash.borrow().len()
    }

    /// 检查所有已到达的消息都已消费
    pub fn check_drained(&self) -> LduResult<()> {
        let count = self.pending_messages();
        if count == 0 {
            return Ok(());
        }
        let mut sources: Vec<usize> = self.stash.borrow().iter().map(|e| e.source).collect();
        sources.sort_unstable();
        sources.dedup();
        Err(LduError::UnconsumedMessages {
            rank: self.rank,
            count,
            sources,
        })
    }
}

impl Drop for Communicator {
    fn drop(&mut self) {
        if let Some(world) = &self.world {
            world.departed[self.rank].store(true, Ordering::Release);
        }
        if std::thread::panicking() {
            return;
        }
        if let Err(err) = self.check_drained() {
            log::error!("{}", err);
            panic!("{}", err);
        }
    }
}
