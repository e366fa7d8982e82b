// crates/ldu_core/src/interfaces/mod.rs

//! 耦合界面与数据交换
//!
//! 处理器补丁和循环补丁在矩阵向量乘中需要对侧的场值。交换分两步：
//!
//! 1. [`InterfaceList::initiate`]: 每个耦合补丁按 `face_cells` 顺序打包
//!    本侧值并发送，同时登记接收
//! 2. [`InterfaceList::finish`]: 按通信模式完成全部接收，检查长度，
//!    施加几何变换
//!
//! 一次 `Amul` 中所有补丁的交换都完成后，调用方才把耦合贡献加到结果上。
//! 面数为零的补丁同样收发（空消息），保持两侧标签序列一致。
//!
//! # 模块概览
//!
//! - [`processor`]: 子域间界面
//! - [`cyclic`]: 网格内循环界面
//! - [`transform`]: 耦合面几何变换

pub mod cyclic;
pub mod processor;
pub mod transform;

pub use cyclic::CyclicInterface;
pub use processor::ProcessorInterface;
pub use transform::{FaceTransform, Tensor, IDENTITY_TENSOR};

use std::collections::BTreeMap;

use ldu_config::CommsType;
use ldu_foundation::error::{LduError, LduResult};

use crate::addressing::LduAddressing;
use crate::mesh::{MeshConnectivity, PatchKind};
use crate::parallel::{Communicator, RecvRequest, Tag, FIRST_PATCH_TAG};

// ============================================================================
// 界面
// ============================================================================

/// 耦合界面
#[derive(Debug, Clone, PartialEq)]
pub enum CoupledInterface {
    /// 处理器界面
    Processor(ProcessorInterface),
    /// 循环界面
    Cyclic(CyclicInterface),
}

impl CoupledInterface {
    /// 本地补丁索引
    #[inline]
    pub fn patch(&self) -> usize {
        match self {
            CoupledInterface::Processor(p) => p.patch,
            CoupledInterface::Cyclic(c) => c.patch,
        }
    }

    /// 几何变换
    #[inline]
    pub fn transform(&self) -> &FaceTransform {
        match self {
            CoupledInterface::Processor(p) => &p.transform,
            CoupledInterface::Cyclic(c) => &c.transform,
        }
    }
}

/// 界面列表，每个耦合补丁至多一个界面
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InterfaceList {
    interfaces: Vec<CoupledInterface>,
}

impl InterfaceList {
    /// 空列表（无耦合补丁）
    pub fn new() -> Self {
        Self::default()
    }

    /// 由连接关系中的耦合补丁构建
    ///
    /// 同一对进程之间的多个处理器补丁按补丁顺序依次分配标签，
    /// 两侧的补丁顺序必须一致。
    pub fn from_connectivity(mesh: &MeshConnectivity) -> LduResult<Self> {
        let mut list = Self::new();
        let mut per_neighbour: BTreeMap<usize, Tag> = BTreeMap::new();

        for (p, desc) in mesh.patches.iter().enumerate() {
            match &desc.kind {
                PatchKind::Physical => {}
                PatchKind::Processor { neighbour_rank } => {
                    let count = per_neighbour.entry(*neighbour_rank).or_insert(0);
                    let tag = FIRST_PATCH_TAG + *count;
                    *count += 1;
                    list.push(CoupledInterface::Processor(ProcessorInterface::new(
                        p,
                        *neighbour_rank,
                        tag,
                    )))?;
                }
                PatchKind::Cyclic {
                    neighbour_patch,
                    transform,
                } => list.push(CoupledInterface::Cyclic(CyclicInterface::new(
                    p,
                    *neighbour_patch,
                    transform.clone(),
                )))?,
            }
        }
        Ok(list)
    }

    /// 追加界面
    pub fn push(&mut self, iface: CoupledInterface) -> LduResult<()> {
        if self.interfaces.iter().any(|i| i.patch() == iface.patch()) {
            return Err(LduError::invalid_mesh(format!(
                "补丁 {} 已有耦合界面",
                iface.patch()
            )));
        }
        self.interfaces.push(iface);
        Ok(())
    }

    /// 界面个数
    #[inline]
    pub fn len(&self) -> usize {
        self.interfaces.len()
    }

    /// 是否为空
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.interfaces.is_empty()
    }

    /// 遍历界面
    pub fn iter(&self) -> std::slice::Iter<'_, CoupledInterface> {
        self.interfaces.iter()
    }

    /// 是否含处理器界面
    pub fn has_processor(&self) -> bool {
        self.interfaces
            .iter()
            .any(|i| matches!(i, CoupledInterface::Processor(_)))
    }

    /// 检查界面与寻址一致：补丁存在且标记为耦合，循环配对面数相等，
    /// 每个耦合补丁都有界面
    pub fn validate(&self, addr: &LduAddressing) -> LduResult<()> {
        for iface in &self.interfaces {
            let p = iface.patch();
            LduError::check_index("Patch", p, addr.n_patches())?;
            if !addr.patch(p).coupled {
                return Err(LduError::invalid_mesh(format!(
                    "补丁 '{}' 不是耦合补丁，不能挂接界面",
                    addr.patch(p).name
                )));
            }
            if let CoupledInterface::Cyclic(c) = iface {
                LduError::check_index("Patch", c.neighbour_patch, addr.n_patches())?;
                LduError::check_size(
                    "cyclic neighbour faces",
                    addr.patch_addr(p).len(),
                    addr.patch_addr(c.neighbour_patch).len(),
                )?;
            }
        }
        for (p, patch) in addr.patches().iter().enumerate() {
            if patch.coupled && !self.interfaces.iter().any(|i| i.patch() == p) {
                return Err(LduError::invalid_mesh(format!(
                    "耦合补丁 '{}' 缺少界面",
                    patch.name
                )));
            }
        }
        Ok(())
    }

    // ========================================================================
    // 交换
    // ========================================================================

    /// 发起交换
    ///
    /// `pack(patch)` 返回该补丁按面顺序打包的本侧值。发送任何消息之前
    /// 先做 [`validate`](Self::validate)：缺少界面的耦合补丁返回错误，
    /// 不会被静默跳过。
    pub fn initiate<F>(
        &self,
        addr: &LduAddressing,
        comm: &Communicator,
        comms_type: CommsType,
        pack: F,
    ) -> LduResult<PendingExchange>
    where
        F: Fn(usize) -> Vec<f64>,
    {
        self.validate(addr)?;

        let mut pending = PendingExchange {
            slots: Vec::with_capacity(self.interfaces.len()),
            finished: false,
        };

        for iface in &self.interfaces {
            let slot = match iface {
                CoupledInterface::Cyclic(c) => Ok(Slot::Ready(c.neighbour_values(&pack))),
                CoupledInterface::Processor(p) => {
                    let expected = addr.patch_addr(p.patch).len();
                    self.initiate_processor(p, comm, comms_type, pack(p.patch), expected)
                }
            };
            match slot {
                Ok(slot) => pending.slots.push(slot),
                Err(err) => {
                    pending.abandon();
                    return Err(err);
                }
            }
        }

        Ok(pending)
    }

    fn initiate_processor(
        &self,
        iface: &ProcessorInterface,
        comm: &Communicator,
        comms_type: CommsType,
        buffer: Vec<f64>,
        expected: usize,
    ) -> LduResult<Slot> {
        match comms_type {
            CommsType::NonBlocking => {
                iface.send(comm, buffer)?;
                Ok(Slot::Request(iface.post_recv(comm, expected)))
            }
            CommsType::Blocking => {
                iface.send(comm, buffer)?;
                Ok(Slot::Blocking {
                    interface: iface.clone(),
                    expected,
                })
            }
            CommsType::Scheduled => Ok(Slot::Ready(
                iface.scheduled_exchange(comm, buffer, expected)?,
            )),
        }
    }

    /// 完成交换，返回与界面列表对齐的对侧值
    pub fn finish(
        &self,
        mut pending: PendingExchange,
        comm: &Communicator,
        component: Option<usize>,
    ) -> LduResult<Vec<Vec<f64>>> {
        pending.finished = true;
        let slots = std::mem::take(&mut pending.slots);
        LduError::check_size("pending exchanges", self.interfaces.len(), slots.len())?;

        // 先收齐全部消息再报告第一个错误
        let mut first_err = None;
        let mut received = Vec::with_capacity(slots.len());
        for slot in slots {
            let values = match slot {
                Slot::Ready(values) => Ok(values),
                Slot::Request(request) => comm.wait(request),
                Slot::Blocking {
                    interface,
                    expected,
                } => interface.recv(comm, expected),
            };
            match values {
                Ok(values) => received.push(values),
                Err(err) => {
                    first_err.get_or_insert(err);
                    received.push(Vec::new());
                }
            }
        }
        if let Some(err) = first_err {
            return Err(err);
        }

        for (iface, values) in self.interfaces.iter().zip(received.iter_mut()) {
            iface.transform().apply(values, component)?;
        }
        Ok(received)
    }
}

// ============================================================================
// 进行中的交换
// ============================================================================

#[derive(Debug)]
enum Slot {
    Ready(Vec<f64>),
    Request(RecvRequest),
    Blocking {
        interface: ProcessorInterface,
        expected: usize,
    },
}

impl Slot {
    fn needs_comm(&self) -> bool {
        !matches!(self, Slot::Ready(_))
    }
}

/// 已发起但尚未完成的交换
///
/// 必须交给 [`InterfaceList::finish`]；带着未完成的接收被丢弃时 panic。
#[derive(Debug)]
#[must_use = "交换必须通过 InterfaceList::finish 完成"]
pub struct PendingExchange {
    slots: Vec<Slot>,
    finished: bool,
}

impl PendingExchange {
    /// 放弃交换（仅用于错误路径）
    fn abandon(&mut self) {
        self.finished = true;
        for slot in self.slots.drain(..) {
            if let Slot::Request(request) = slot {
                request.abandon();
            }
        }
    }

    /// 仍在等待通信的补丁数
    pub fn outstanding(&self) -> usize {
        self.slots.iter().filter(|s| s.needs_comm()).count()
    }
}

impl Drop for PendingExchange {
    fn drop(&mut self) {
        if self.finished || std::thread::panicking() {
            return;
        }
        let outstanding = self.outstanding();
        // 先放弃内部请求，避免二次 panic 信息淹没主信息
        self.abandon();
        if outstanding > 0 {
            log::error!("耦合交换有 {} 个补丁未完成即被丢弃", outstanding);
            panic!("coupled exchange dropped with {} unfinished patches", outstanding);
        }
    }
}

// ============================================================================
// 耦合上下文
// ============================================================================

/// 求解过程中的耦合上下文：界面、通信端点、通信模式
#[derive(Debug, Clone, Copy)]
pub struct Coupling<'a> {
    /// 耦合界面
    pub interfaces: &'a InterfaceList,
    /// 通信端点
    pub comm: &'a Communicator,
    /// 通信模式
    pub comms_type: CommsType,
    /// 求解矢量分量时的分量号，标量场为 None
    pub component: Option<usize>,
}

impl<'a> Coupling<'a> {
    /// 创建标量场耦合上下文
    pub fn new(interfaces: &'a InterfaceList, comm: &'a Communicator, comms_type: CommsType) -> Self {
        Self {
            interfaces,
            comm,
            comms_type,
            component: None,
        }
    }

    /// 指定求解分量
    pub fn with_component(mut self, component: usize) -> Self {
        self.component = Some(component);
        self
    }

    /// 发起交换
    pub fn initiate<F>(&self, addr: &LduAddressing, pack: F) -> LduResult<PendingExchange>
    where
        F: Fn(usize) -> Vec<f64>,
    {
        self.interfaces.initiate(addr, self.comm, self.comms_type, pack)
    }

    /// 完成交换
    pub fn finish(&self, pending: PendingExchange) -> LduResult<Vec<Vec<f64>>> {
        self.interfaces.finish(pending, self.comm, self.component)
    }

    /// 交换各耦合补丁面单元上的 `psi`
    pub fn exchange_field(&self, addr: &LduAddressing, psi: &[f64]) -> LduResult<Vec<Vec<f64>>> {
        let pending = self.initiate(addr, |p| gather(addr.patch_addr(p), psi))?;
        self.finish(pending)
    }
}

/// 按面单元收集场值
#[inline]
pub fn gather(face_cells: &[usize], field: &[f64]) -> Vec<f64> {
    face_cells.iter().map(|&c| field[c]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addressing::LduPatch;
    use crate::parallel::PstreamWorld;

    /// 两个单元的子域，一个处理器补丁含 `n_faces` 个面
    fn proc_addr(n_faces: usize) -> LduAddressing {
        let patch = LduPatch {
            name: "proc".into(),
            face_cells: (0..n_faces).map(|i| i % 2).collect(),
            coupled: true,
        };
        LduAddressing::new(2, vec![0], vec![1], vec![patch]).unwrap()
    }

    fn proc_list(neighbour: usize) -> InterfaceList {
        let mut list = InterfaceList::new();
        list.push(CoupledInterface::Processor(ProcessorInterface::new(
            0,
            neighbour,
            FIRST_PATCH_TAG,
        )))
        .unwrap();
        list
    }

    fn exchange_two_ranks(comms_type: CommsType) -> Vec<Vec<Vec<f64>>> {
        let comms = PstreamWorld::create(2).unwrap();
        PstreamWorld::run(comms, |comm| {
            let addr = proc_addr(3);
            let list = proc_list(1 - comm.rank());
            list.validate(&addr).unwrap();
            let coupling = Coupling::new(&list, &comm, comms_type);
            let psi = vec![10.0 * comm.rank() as f64 + 1.0, 10.0 * comm.rank() as f64 + 2.0];
            let out = coupling.exchange_field(&addr, &psi).unwrap();
            comm.check_drained().unwrap();
            out
        })
    }

    #[test]
    fn test_exchange_all_comms_types() {
        for ct in [CommsType::Blocking, CommsType::Scheduled, CommsType::NonBlocking] {
            let out = exchange_two_ranks(ct);
            // 面单元 [0, 1, 0]
            assert_eq!(out[0], vec![vec![11.0, 12.0, 11.0]], "{ct}");
            assert_eq!(out[1], vec![vec![1.0, 2.0, 1.0]], "{ct}");
        }
    }

    #[test]
    fn test_zero_face_patch_still_exchanges() {
        let comms = PstreamWorld::create(2).unwrap();
        let out = PstreamWorld::run(comms, |comm| {
            let addr = proc_addr(0);
            let list = proc_list(1 - comm.rank());
            let coupling = Coupling::new(&list, &comm, CommsType::NonBlocking);
            let pending = coupling.initiate(&addr, |_| Vec::new()).unwrap();
            assert_eq!(pending.outstanding(), 1);
            let received = coupling.finish(pending).unwrap();
            comm.sum(0.0).unwrap();
            (received, comm.check_drained().is_ok())
        });
        for (received, drained) in out {
            assert_eq!(received, vec![Vec::<f64>::new()]);
            assert!(drained);
        }
    }

    #[test]
    fn test_size_mismatch_is_fatal() {
        for ct in [CommsType::Blocking, CommsType::Scheduled, CommsType::NonBlocking] {
            let comms = PstreamWorld::create(2).unwrap();
            let out = PstreamWorld::run(comms, |comm| {
                // 进程 1 的补丁比进程 0 多一个面
                let addr = proc_addr(2 + comm.rank());
                let list = proc_list(1 - comm.rank());
                let coupling = Coupling::new(&list, &comm, ct);
                let psi = vec![1.0, 2.0];
                coupling.exchange_field(&addr, &psi)
            });
            assert!(matches!(
                out[0],
                Err(LduError::MessageSizeMismatch {
                    patch: 0,
                    neighbour_rank: 1,
                    expected: 2,
                    actual: 3
                })
            ));
            assert!(matches!(
                out[1],
                Err(LduError::MessageSizeMismatch {
                    expected: 3,
                    actual: 2,
                    ..
                })
            ));
        }
    }

    #[test]
    fn test_cyclic_exchange_uses_paired_patch() {
        let left = LduPatch {
            name: "left".into(),
            face_cells: vec![0],
            coupled: true,
        };
        let right = LduPatch {
            name: "right".into(),
            face_cells: vec![2],
            coupled: true,
        };
        let addr = LduAddressing::new(3, vec![0, 1], vec![1, 2], vec![left, right]).unwrap();
        let mut list = InterfaceList::new();
        list.push(CoupledInterface::Cyclic(CyclicInterface::new(
            0,
            1,
            FaceTransform::Identity,
        )))
        .unwrap();
        list.push(CoupledInterface::Cyclic(CyclicInterface::new(
            1,
            0,
            FaceTransform::Identity,
        )))
        .unwrap();
        list.validate(&addr).unwrap();

        let comm = Communicator::serial();
        let coupling = Coupling::new(&list, &comm, CommsType::NonBlocking);
        let out = coupling.exchange_field(&addr, &[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(out, vec![vec![3.0], vec![1.0]]);
    }

    #[test]
    fn test_validate_requires_interface_for_coupled_patch() {
        let addr = proc_addr(2);
        assert!(InterfaceList::new().validate(&addr).is_err());

        let mut list = proc_list(1);
        assert!(list
            .push(CoupledInterface::Processor(ProcessorInterface::new(0, 1, 7)))
            .is_err());
    }

    #[test]
    fn test_from_connectivity_assigns_tags() {
        let block = crate::mesh::StructuredBlock::new(4, 2, 1).unwrap();
        let subs = block.decompose([2, 1, 1]).unwrap();
        let list = InterfaceList::from_connectivity(&subs[0].connectivity).unwrap();
        assert_eq!(list.len(), 1);
        assert!(list.has_processor());
        match list.iter().next().unwrap() {
            CoupledInterface::Processor(p) => {
                assert_eq!(p.neighbour_rank, 1);
                assert_eq!(p.tag, FIRST_PATCH_TAG);
                assert_eq!(p.patch, 6);
            }
            other => panic!("unexpected interface {:?}", other),
        }
    }

    #[test]
    #[should_panic(expected = "coupled exchange dropped")]
    fn test_unfinished_exchange_panics() {
        let comms = PstreamWorld::create(2).unwrap();
        let comm = &comms[0];
        let addr = proc_addr(1);
        let list = proc_list(1);
        let coupling = Coupling::new(&list, comm, CommsType::NonBlocking);
        let _pending = coupling.initiate(&addr, |_| vec![0.0]).unwrap();
    }
}
