// crates/ldu_core/src/mesh/structured.rs

//! 结构化六面体块
//!
//! 为测试与命令行演示生成 `nx × ny × nz` 规则网格的连接关系，
//! 并按坐标二分（simple 分区）拆成若干子域。这不是通用的网格
//! 生成或分区工具，只提供满足连接关系约定的确定性输入。
//!
//! 单元编号 `c = i + nx * (j + ny * k)`。内部面按 owner 升序、
//! 同一 owner 下按 neighbour 升序排列（+x、+y、+z 依次），满足上三角约定。

use ldu_foundation::ensure;
use ldu_foundation::error::{LduError, LduResult};

use super::{MeshConnectivity, PatchDescriptor, PatchKind};
use crate::interfaces::FaceTransform;

/// 物理边界补丁名称，顺序与 [`StructuredBlock::boundary_face_cells`] 一致
pub const BOUNDARY_NAMES: [&str; 6] = ["xmin", "xmax", "ymin", "ymax", "zmin", "zmax"];

/// 规则六面体块
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructuredBlock {
    nx: usize,
    ny: usize,
    nz: usize,
}

/// 分区后的一个子域
#[derive(Debug, Clone)]
pub struct Subdomain {
    /// 子域编号（进程号）
    pub rank: usize,
    /// 局部连接关系（含处理器补丁）
    pub connectivity: MeshConnectivity,
    /// 局部单元 → 全局单元
    pub cell_map: Vec<usize>,
}

impl Subdomain {
    /// 从全局场提取本子域的局部场
    pub fn scatter(&self, global: &[f64]) -> Vec<f64> {
        self.cell_map.iter().map(|&c| global[c]).collect()
    }

    /// 把局部场写回全局场
    pub fn gather_into(&self, local: &[f64], global: &mut [f64]) -> LduResult<()> {
        LduError::check_size("local field", self.cell_map.len(), local.len())?;
        for (&c, &v) in self.cell_map.iter().zip(local) {
            LduError::check_index("Cell", c, global.len())?;
            global[c] = v;
        }
        Ok(())
    }
}

impl StructuredBlock {
    /// 创建块，各方向单元数必须为正
    pub fn new(nx: usize, ny: usize, nz: usize) -> LduResult<Self> {
        ensure!(
            nx > 0 && ny > 0 && nz > 0,
            LduError::invalid_mesh(format!("块尺寸必须为正: {}x{}x{}", nx, ny, nz))
        );
        Ok(Self { nx, ny, nz })
    }

    /// 单元总数
    #[inline]
    pub fn n_cells(&self) -> usize {
        self.nx * self.ny * self.nz
    }

    /// 各方向单元数
    #[inline]
    pub fn dims(&self) -> [usize; 3] {
        [self.nx, self.ny, self.nz]
    }

    /// (i, j, k) → 单元编号
    #[inline]
    pub fn cell_id(&self, i: usize, j: usize, k: usize) -> usize {
        i + self.nx * (j + self.ny * k)
    }

    /// 单元编号 → (i, j, k)
    #[inline]
    pub fn ijk(&self, cell: usize) -> [usize; 3] {
        let i = cell % self.nx;
        let j = (cell / self.nx) % self.ny;
        let k = cell / (self.nx * self.ny);
        [i, j, k]
    }

    /// 内部面 (owner, neighbour)，上三角顺序
    pub fn internal_faces(&self) -> Vec<(usize, usize)> {
        let (sx, sy) = (1, self.nx);
        let sz = self.nx * self.ny;
        let mut faces = Vec::with_capacity(3 * self.n_cells());
        for c in 0..self.n_cells() {
            let [i, j, k] = self.ijk(c);
            if i + 1 < self.nx {
                faces.push((c, c + sx));
            }
            if j + 1 < self.ny {
                faces.push((c, c + sy));
            }
            if k + 1 < self.nz {
                faces.push((c, c + sz));
            }
        }
        faces
    }

    /// 六个物理边界的面单元，均按单元编号升序
    pub fn boundary_face_cells(&self) -> [Vec<usize>; 6] {
        let mut sides: [Vec<usize>; 6] = Default::default();
        for c in 0..self.n_cells() {
            let [i, j, k] = self.ijk(c);
            if i == 0 {
                sides[0].push(c);
            }
            if i + 1 == self.nx {
                sides[1].push(c);
            }
            if j == 0 {
                sides[2].push(c);
            }
            if j + 1 == self.ny {
                sides[3].push(c);
            }
            if k == 0 {
                sides[4].push(c);
            }
            if k + 1 == self.nz {
                sides[5].push(c);
            }
        }
        sides
    }

    /// 整块网格的连接关系（六个物理补丁）
    pub fn connectivity(&self) -> MeshConnectivity {
        let sides = self.boundary_face_cells();
        let kinds = std::array::from_fn(|_| PatchKind::Physical);
        self.assemble(sides, kinds)
    }

    /// x 方向周期的连接关系：xmin/xmax 为一对循环补丁
    ///
    /// 两侧面都按 (j, k) 升序排列，逐面配对。
    pub fn connectivity_periodic_x(&self) -> MeshConnectivity {
        let sides = self.boundary_face_cells();
        let mut kinds: [PatchKind; 6] = std::array::from_fn(|_| PatchKind::Physical);
        kinds[0] = PatchKind::Cyclic {
            neighbour_patch: 1,
            transform: FaceTransform::Identity,
        };
        kinds[1] = PatchKind::Cyclic {
            neighbour_patch: 0,
            transform: FaceTransform::Identity,
        };
        self.assemble(sides, kinds)
    }

    fn assemble(&self, sides: [Vec<usize>; 6], kinds: [PatchKind; 6]) -> MeshConnectivity {
        let faces = self.internal_faces();
        let mut owner: Vec<usize> = faces.iter().map(|&(o, _)| o).collect();
        let neighbour: Vec<usize> = faces.iter().map(|&(_, n)| n).collect();

        let mut patches = Vec::with_capacity(6);
        let mut start = 0;
        for ((name, cells), kind) in BOUNDARY_NAMES.iter().zip(sides).zip(kinds) {
            patches.push(PatchDescriptor {
                name: name.to_string(),
                start,
                size: cells.len(),
                kind,
            });
            start += cells.len();
            owner.extend(cells);
        }

        MeshConnectivity {
            n_cells: self.n_cells(),
            owner,
            neighbour,
            patches,
        }
    }

    /// 单元所属子域（坐标二分）
    fn rank_of(&self, cell: usize, splits: [usize; 3]) -> usize {
        let [i, j, k] = self.ijk(cell);
        let px = i * splits[0] / self.nx;
        let py = j * splits[1] / self.ny;
        let pz = k * splits[2] / self.nz;
        px + splits[0] * (py + splits[1] * pz)
    }

    /// simple 分区：各方向等分为 `splits[d]` 段
    ///
    /// 处理器补丁的面按全局面编号排序，补丁两侧因此逐面对应。
    /// 每个子域保留全部六个物理补丁（可能为空），处理器补丁按
    /// 邻居进程号升序追加在其后。
    pub fn decompose(&self, splits: [usize; 3]) -> LduResult<Vec<Subdomain>> {
        let dims = self.dims();
        for d in 0..3 {
            if splits[d] == 0 || splits[d] > dims[d] {
                return Err(LduError::invalid_mesh(format!(
                    "方向 {} 的分段数 {} 不在 1..={} 范围内",
                    d, splits[d], dims[d]
                )));
            }
        }
        let n_ranks = splits[0] * splits[1] * splits[2];

        let rank: Vec<usize> = (0..self.n_cells()).map(|c| self.rank_of(c, splits)).collect();
        let mut cell_maps = vec![Vec::new(); n_ranks];
        let mut local = vec![0usize; self.n_cells()];
        for (c, &r) in rank.iter().enumerate() {
            local[c] = cell_maps[r].len();
            cell_maps[r].push(c);
        }

        let faces = self.internal_faces();
        let sides = self.boundary_face_cells();

        let mut subdomains = Vec::with_capacity(n_ranks);
        for (r, cell_map) in cell_maps.into_iter().enumerate() {
            let mut owner = Vec::new();
            let mut neighbour = Vec::new();
            // 邻居进程号 → 本侧面单元
            let mut proc_faces: std::collections::BTreeMap<usize, Vec<usize>> = Default::default();

            for &(o, n) in &faces {
                match (rank[o] == r, rank[n] == r) {
                    (true, true) => {
                        owner.push(local[o]);
                        neighbour.push(local[n]);
                    }
                    (true, false) => proc_faces.entry(rank[n]).or_default().push(local[o]),
                    (false, true) => proc_faces.entry(rank[o]).or_default().push(local[n]),
                    (false, false) => {}
                }
            }

            let mut patches = Vec::new();
            let mut start = 0;
            for (name, cells) in BOUNDARY_NAMES.iter().zip(&sides) {
                let before = owner.len();
                owner.extend(cells.iter().filter(|&&c| rank[c] == r).map(|&c| local[c]));
                let size = owner.len() - before;
                patches.push(PatchDescriptor::physical(*name, start, size));
                start += size;
            }
            for (nbr, cells) in proc_faces {
                let size = cells.len();
                patches.push(PatchDescriptor::processor(
                    format!("procBoundary{}to{}", r, nbr),
                    start,
                    size,
                    nbr,
                ));
                start += size;
                owner.extend(cells);
            }

            subdomains.push(Subdomain {
                rank: r,
                connectivity: MeshConnectivity {
                    n_cells: cell_map.len(),
                    owner,
                    neighbour,
                    patches,
                },
                cell_map,
            });
        }

        log::debug!(
            "分区 {}x{}x{} 块为 {} 个子域 ({:?})",
            self.nx,
            self.ny,
            self.nz,
            n_ranks,
            splits
        );
        Ok(subdomains)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_face_counts() {
        let block = StructuredBlock::new(3, 2, 2).unwrap();
        let faces = block.internal_faces();
        // (nx-1)*ny*nz + nx*(ny-1)*nz + nx*ny*(nz-1)
        assert_eq!(faces.len(), 2 * 2 * 2 + 3 * 2 + 3 * 2);
        for w in faces.windows(2) {
            assert!(w[0] < w[1]);
        }
        assert!(faces.iter().all(|&(o, n)| o < n));
    }

    #[test]
    fn test_connectivity_patches() {
        let block = StructuredBlock::new(2, 3, 4).unwrap();
        let mesh = block.connectivity();
        assert!(mesh.validate_patches().is_ok());
        assert_eq!(mesh.patches.len(), 6);
        assert_eq!(mesh.face_cells(0).unwrap().len(), 3 * 4);
        assert_eq!(mesh.face_cells(5).unwrap().len(), 2 * 3);
    }

    #[test]
    fn test_periodic_pairs_faces() {
        let block = StructuredBlock::new(4, 2, 1).unwrap();
        let mesh = block.connectivity_periodic_x();
        assert!(mesh.validate_patches().is_ok());
        let left = mesh.face_cells(0).unwrap();
        let right = mesh.face_cells(1).unwrap();
        for (&l, &r) in left.iter().zip(right) {
            assert_eq!(block.ijk(l)[1..], block.ijk(r)[1..]);
        }
    }

    #[test]
    fn test_decompose_covers_all_cells() {
        let block = StructuredBlock::new(4, 4, 2).unwrap();
        let subs = block.decompose([2, 2, 1]).unwrap();
        assert_eq!(subs.len(), 4);

        let mut seen = vec![false; block.n_cells()];
        for sub in &subs {
            assert!(sub.connectivity.validate_patches().is_ok());
            for &c in &sub.cell_map {
                assert!(!seen[c]);
                seen[c] = true;
            }
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn test_processor_patches_match() {
        let block = StructuredBlock::new(4, 4, 2).unwrap();
        let subs = block.decompose([2, 2, 1]).unwrap();

        for sub in &subs {
            for desc in &sub.connectivity.patches {
                if let PatchKind::Processor { neighbour_rank } = desc.kind {
                    let other = &subs[neighbour_rank];
                    let back = other
                        .connectivity
                        .patches
                        .iter()
                        .find(|d| d.kind == PatchKind::Processor { neighbour_rank: sub.rank })
                        .unwrap();
                    assert_eq!(back.size, desc.size);
                }
            }
        }
        // 对角子域不相邻
        assert!(!subs[0]
            .connectivity
            .patches
            .iter()
            .any(|d| d.kind == PatchKind::Processor { neighbour_rank: 3 }));
    }

    #[test]
    fn test_bad_splits() {
        let block = StructuredBlock::new(2, 2, 1).unwrap();
        assert!(block.decompose([3, 1, 1]).is_err());
        assert!(block.decompose([0, 1, 1]).is_err());
        assert!(StructuredBlock::new(0, 1, 1).is_err());
    }
}
