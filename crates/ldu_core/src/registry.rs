// crates/ldu_core/src/registry.rs

//! 求解器与预条件器注册表
//!
//! 名称到工厂函数的显式映射，对称与非对称矩阵各一张表。注册表在
//! 启动时构造并按引用传给求解入口，不依赖全局静态注册顺序。
//!
//! | 矩阵 | 求解器 | 预条件器 |
//! |------|--------|----------|
//! | 对称 | PCG, GAMG, smoothSolver, diagonal | none, diagonal, DIC, GAMG |
//! | 非对称 | PBiCG, PBiCGStab, GAMG, smoothSolver, diagonal | none, diagonal, DILU, GAMG |

use std::collections::BTreeMap;

use ldu_config::SolverControls;
use ldu_foundation::error::{LduError, LduResult};

use crate::preconditioners::{
    DiagonalPreconditioner, DicPreconditioner, DiluPreconditioner, GamgPreconditioner,
    NoPreconditioner, PreconditionerFactory,
};
use crate::solvers::{
    DiagonalSolver, GamgSolver, LduSolver, PBiCg, PBiCgStab, Pcg, SmoothSolver, SolverFactory,
};

/// 矩阵对称性，决定查哪张表
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symmetry {
    /// 对称矩阵
    Symmetric,
    /// 非对称矩阵
    Asymmetric,
}

impl Symmetry {
    /// 由矩阵对称标志得到
    #[inline]
    pub fn of(symmetric: bool) -> Self {
        if symmetric {
            Self::Symmetric
        } else {
            Self::Asymmetric
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Tables {
    solvers: BTreeMap<String, SolverFactory>,
    preconditioners: BTreeMap<String, PreconditionerFactory>,
}

/// 求解器注册表
#[derive(Debug, Clone, Default)]
pub struct SolverRegistry {
    symmetric: Tables,
    asymmetric: Tables,
}

impl SolverRegistry {
    /// 空注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册全部内置求解器与预条件器
    pub fn with_defaults() -> Self {
        use Symmetry::{Asymmetric, Symmetric};

        let mut registry = Self::new();

        registry.register_solver(Symmetric, "PCG", Pcg::build);
        registry.register_solver(Asymmetric, "PBiCG", PBiCg::build);
        registry.register_solver(Asymmetric, "PBiCGStab", PBiCgStab::build);
        for symmetry in [Symmetric, Asymmetric] {
            registry.register_solver(symmetry, "GAMG", GamgSolver::build);
            registry.register_solver(symmetry, "smoothSolver", SmoothSolver::build);
            registry.register_solver(symmetry, "diagonal", DiagonalSolver::build);

            registry.register_preconditioner(symmetry, "none", NoPreconditioner::build);
            registry.register_preconditioner(symmetry, "diagonal", DiagonalPreconditioner::build);
            registry.register_preconditioner(symmetry, "GAMG", GamgPreconditioner::build);
        }
        registry.register_preconditioner(Symmetric, "DIC", DicPreconditioner::build);
        registry.register_preconditioner(Asymmetric, "DILU", DiluPreconditioner::build);

        registry
    }

    fn tables(&self, symmetry: Symmetry) -> &Tables {
        match symmetry {
            Symmetry::Symmetric => &self.symmetric,
            Symmetry::Asymmetric => &self.asymmetric,
        }
    }

    fn tables_mut(&mut self, symmetry: Symmetry) -> &mut Tables {
        match symmetry {
            Symmetry::Symmetric => &mut self.symmetric,
            Symmetry::Asymmetric => &mut self.asymmetric,
        }
    }

    /// 注册求解器，同名覆盖
    pub fn register_solver(&mut self, symmetry: Symmetry, name: impl Into<String>, factory: SolverFactory) {
        self.tables_mut(symmetry).solvers.insert(name.into(), factory);
    }

    /// 注册预条件器，同名覆盖
    pub fn register_preconditioner(
        &mut self,
        symmetry: Symmetry,
        name: impl Into<String>,
        factory: PreconditionerFactory,
    ) {
        self.tables_mut(symmetry).preconditioners.insert(name.into(), factory);
    }

    /// 已注册的求解器名称（字典序）
    pub fn solver_names(&self, symmetry: Symmetry) -> Vec<&str> {
        self.tables(symmetry).solvers.keys().map(String::as_str).collect()
    }

    /// 已注册的预条件器名称（字典序）
    pub fn preconditioner_names(&self, symmetry: Symmetry) -> Vec<&str> {
        self.tables(symmetry).preconditioners.keys().map(String::as_str).collect()
    }

    /// 按控制参数中的名称查找预条件器
    pub fn preconditioner(&self, symmetry: Symmetry, name: &str) -> LduResult<PreconditionerFactory> {
        let tables = self.tables(symmetry);
        tables.preconditioners.get(name).copied().ok_or_else(|| {
            LduError::unknown_selection("preconditioner", name, tables.preconditioners.keys())
        })
    }

    /// 按控制参数构造求解器
    pub fn select(&self, controls: &SolverControls, symmetry: Symmetry) -> LduResult<Box<dyn LduSolver>> {
        let tables = self.tables(symmetry);
        let solver = tables.solvers.get(controls.solver.as_str()).ok_or_else(|| {
            LduError::unknown_selection("solver", controls.solver.as_str(), tables.solvers.keys())
        })?;
        let preconditioner = self.preconditioner(symmetry, &controls.preconditioner)?;
        Ok(solver(controls.clone(), preconditioner))
    }
}
