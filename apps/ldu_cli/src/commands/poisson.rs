// apps/ldu_cli/src/commands/poisson.rs

//! Poisson 基准算例
//!
//! 在 `nx × ny × nz` 结构化网格上组装七点 Poisson 矩阵
//! （diag = 6，每个相邻单元 -1，源项为 1），串行或按坐标二分
//! 分区后多进程求解。`--compare` 额外运行一次串行求解并报告
//! 并行解与串行解的最大差值。

use anyhow::{bail, Context, Result};
use clap::Args;
use ldu_config::{CommsType, SolverControls};
use ldu_core::mesh::Subdomain;
use ldu_core::prelude::*;
use ldu_core::StructuredBlock;
use ldu_foundation::error::LduResult;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};

/// Poisson 算例参数
#[derive(Args)]
pub struct PoissonArgs {
    /// x 方向单元数
    #[arg(long, default_value = "20")]
    pub nx: usize,

    /// y 方向单元数
    #[arg(long, default_value = "20")]
    pub ny: usize,

    /// z 方向单元数
    #[arg(long, default_value = "20")]
    pub nz: usize,

    /// 分区数（x,y,z），1,1,1 为串行
    #[arg(long, value_delimiter = ',', default_value = "1,1,1")]
    pub splits: Vec<usize>,

    /// 求解器控制参数文件（JSON），给出时忽略下面的求解器选项
    #[arg(short, long)]
    pub controls: Option<PathBuf>,

    /// 求解器名称
    #[arg(short, long, default_value = "PCG")]
    pub solver: String,

    /// 预条件器名称
    #[arg(short, long, default_value = "DIC")]
    pub preconditioner: String,

    /// 绝对容差
    #[arg(long, default_value = "1e-8")]
    pub tolerance: f64,

    /// 相对容差
    #[arg(long, default_value = "0")]
    pub rel_tol: f64,

    /// 最大迭代次数
    #[arg(long, default_value = "1000")]
    pub max_iter: usize,

    /// 通信模式 (blocking, scheduled, nonBlocking)
    #[arg(long, default_value = "nonBlocking")]
    pub comms: CommsType,

    /// 与串行解比较
    #[arg(long)]
    pub compare: bool,
}

/// 执行 Poisson 算例
pub fn execute(args: PoissonArgs) -> Result<()> {
    info!("=== LDU Poisson 算例 ===");

    let controls = load_controls(&args)?;
    controls.validate().context("求解器控制参数无效")?;

    let block = StructuredBlock::new(args.nx, args.ny, args.nz).context("创建网格失败")?;
    let splits = match args.splits.as_slice() {
        &[sx, sy, sz] => [sx, sy, sz],
        other => bail!("分区数应为 3 个整数，实际 {:?}", other),
    };
    let n_procs: usize = splits.iter().product();

    info!(
        "网格: {}×{}×{} = {} 单元, 进程数: {}",
        args.nx,
        args.ny,
        args.nz,
        block.n_cells(),
        n_procs
    );
    info!(
        "求解器: {} / {}, 容差 {:e}, 相对容差 {:e}, 通信模式 {}",
        controls.solver, controls.preconditioner, controls.tolerance, controls.rel_tol, controls.comms_type
    );

    let registry = SolverRegistry::with_defaults();
    let start = Instant::now();
    let (psi, perf) = if n_procs == 1 {
        solve_serial(&registry, &block, &controls).context("串行求解失败")?
    } else {
        let subdomains = block.decompose(splits).context("网格分区失败")?;
        solve_parallel(&registry, &block, &subdomains, &controls)?
    };
    let elapsed = start.elapsed();

    if !perf.converged {
        warn!("未收敛: {}", perf);
    }
    let (min, max) = psi
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    info!("解范围: [{:.6e}, {:.6e}]", min, max);
    info!("求解耗时: {:.3} s", elapsed.as_secs_f64());

    if args.compare && n_procs > 1 {
        let (serial, _) = solve_serial(&registry, &block, &controls).context("串行对照求解失败")?;
        let diff = serial
            .iter()
            .zip(&psi)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max);
        info!("并行解与串行解的最大差值: {:e}", diff);
    }

    Ok(())
}

fn load_controls(args: &PoissonArgs) -> Result<SolverControls> {
    if let Some(path) = &args.controls {
        let controls = SolverControls::from_file(path)
            .with_context(|| format!("无法读取控制参数文件: {}", path.display()))?;
        return Ok(controls);
    }
    Ok(SolverControls::new(args.solver.as_str(), args.preconditioner.as_str())
        .with_tolerance(args.tolerance)
        .with_rel_tol(args.rel_tol)
        .with_max_iter(args.max_iter)
        .with_comms_type(args.comms))
}

/// 七点 Poisson 矩阵；耦合补丁按内部面处理
fn poisson_matrix(addr: &LduAddressing) -> LduResult<LduMatrix<'_>> {
    let mut matrix = LduMatrix::symmetric(addr);
    matrix.diag_mut().iter_mut().for_each(|d| *d = 6.0);
    matrix.upper_mut().iter_mut().for_each(|a| *a = -1.0);
    for (p, patch) in addr.patches().iter().enumerate() {
        if patch.coupled {
            let n = patch.face_cells.len();
            matrix.set_patch_coeffs(p, vec![0.0; n], vec![-1.0; n])?;
        }
    }
    Ok(matrix)
}

fn solve_serial(
    registry: &SolverRegistry,
    block: &StructuredBlock,
    controls: &SolverControls,
) -> LduResult<(Vec<f64>, SolverPerformance)> {
    let addr = LduAddressing::from_connectivity(&block.connectivity())?;
    let matrix = poisson_matrix(&addr)?;
    let interfaces = InterfaceList::new();
    let comm = Communicator::serial();
    let coupling = Coupling::new(&interfaces, &comm, controls.comms_type);

    let mut psi = vec![0.0; addr.n_cells()];
    let source = vec![1.0; addr.n_cells()];
    let perf = solve(registry, "p", &matrix, &mut psi, &source, controls, &coupling)?;
    Ok((psi, perf))
}

fn solve_parallel(
    registry: &SolverRegistry,
    block: &StructuredBlock,
    subdomains: &[Subdomain],
    controls: &SolverControls,
) -> Result<(Vec<f64>, SolverPerformance)> {
    let comms = PstreamWorld::create(subdomains.len()).context("创建进程通信失败")?;
    let results = PstreamWorld::run(comms, |comm| -> LduResult<(Vec<f64>, SolverPerformance)> {
        let sub = &subdomains[comm.rank()];
        let addr = LduAddressing::from_connectivity(&sub.connectivity)?;
        let interfaces = InterfaceList::from_connectivity(&sub.connectivity)?;
        let matrix = poisson_matrix(&addr)?;
        let coupling = Coupling::new(&interfaces, &comm, controls.comms_type);

        let mut psi = vec![0.0; addr.n_cells()];
        let source = vec![1.0; addr.n_cells()];
        let perf = solve(registry, "p", &matrix, &mut psi, &source, controls, &coupling)?;
        comm.check_drained()?;
        Ok((psi, perf))
    });

    let mut global = vec![f64::NAN; block.n_cells()];
    let mut master_perf = None;
    for (sub, result) in subdomains.iter().zip(results) {
        let (psi, perf) = result.with_context(|| format!("进程 {} 求解失败", sub.rank))?;
        sub.gather_into(&psi, &mut global)?;
        master_perf.get_or_insert(perf);
    }
    let Some(perf) = master_perf else {
        bail!("没有子域");
    };
    Ok((global, perf))
}
