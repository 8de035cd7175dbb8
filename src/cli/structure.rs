//! # structure 子命令 CLI 定义
//!
//! 结构处理统一入口，包含多个子命令：
//! - `convert`: 格式转换
//! - `info`: 结构信息与对称性
//! - `primitive`: 原胞
//! - `orthogonal`: 正交超胞
//! - `scale`: 分数坐标归一化
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/structure.rs`

use crate::models::CoordinateMode;
use crate::parsers::WriteOptions;
use crate::transform::{OrthogonalConfig, SymmetryConfig};
use clap::{Args, Subcommand};
use std::path::PathBuf;

// ─────────────────────────────────────────────────────────────
// Structure 主命令
// ─────────────────────────────────────────────────────────────

/// structure 主命令参数
#[derive(Args, Debug)]
pub struct StructureArgs {
    #[command(subcommand)]
    pub command: StructureCommands,
}

/// structure 子命令
#[derive(Subcommand, Debug)]
pub enum StructureCommands {
    /// Convert a structure file to another format
    Convert(ConvertArgs),

    /// Show structure information (cell, composition, symmetry)
    Info(InfoArgs),

    /// Find the primitive cell
    Primitive(PrimitiveArgs),

    /// Search for a cubic or orthorhombic supercell
    Orthogonal(OrthogonalArgs),

    /// Wrap positions into fractional coordinates in [0, 1)
    Scale(ScaleArgs),
}

// ─────────────────────────────────────────────────────────────
// 共享参数
// ─────────────────────────────────────────────────────────────

/// 对称性容差参数
#[derive(Args, Debug, Clone)]
pub struct SymmetryArgs {
    /// Position tolerance in Å
    #[arg(long, default_value_t = 1e-5, env = "DDPC_SYMPREC")]
    pub symprec: f64,

    /// Angle tolerance in degrees (negative = derive from symprec)
    #[arg(
        long,
        default_value_t = -1.0,
        env = "DDPC_ANGLE_TOLERANCE",
        allow_negative_numbers = true
    )]
    pub angle_tolerance: f64,
}

impl SymmetryArgs {
    pub fn to_config(&self) -> SymmetryConfig {
        SymmetryConfig {
            symprec: self.symprec,
            angle_tolerance: self.angle_tolerance,
            ..Default::default()
        }
    }
}

/// 坐标类型参数
#[derive(Args, Debug, Clone, Default)]
pub struct CoordinateArgs {
    /// Write fractional (direct) coordinates
    #[arg(long, conflicts_with = "cartesian")]
    pub direct: bool,

    /// Write Cartesian coordinates
    #[arg(long)]
    pub cartesian: bool,
}

impl CoordinateArgs {
    pub fn mode(&self) -> Option<CoordinateMode> {
        if self.direct {
            Some(CoordinateMode::Fractional)
        } else if self.cartesian {
            Some(CoordinateMode::Cartesian)
        } else {
            None
        }
    }
}

// ─────────────────────────────────────────────────────────────
// 子命令参数
// ─────────────────────────────────────────────────────────────

/// convert 子命令参数
#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Input structure file
    pub input: PathBuf,

    /// Output structure file
    pub output: PathBuf,

    /// Input format (poscar, dspaw, rescu, xyz, cif, cell); detected from the name if omitted
    #[arg(long = "from")]
    pub from: Option<String>,

    /// Output format; detected from the name if omitted
    #[arg(long)]
    pub format: Option<String>,

    /// Write POSCAR without the element line (VASP 4)
    #[arg(long, default_value_t = false)]
    pub vasp4: bool,

    #[command(flatten)]
    pub coordinates: CoordinateArgs,
}

impl ConvertArgs {
    pub fn write_options(&self) -> WriteOptions {
        WriteOptions {
            coordinates: self.coordinates.mode(),
            vasp5: !self.vasp4,
        }
    }
}

/// info 子命令参数
#[derive(Args, Debug)]
pub struct InfoArgs {
    /// Input structure file
    pub input: PathBuf,

    /// Input format; detected from the name if omitted
    #[arg(long = "from")]
    pub from: Option<String>,

    /// Also analyze the symmetry of the structure
    #[arg(long, default_value_t = false)]
    pub show_symmetry: bool,

    /// Hall symbol serial number selecting the setting (0 = default for the space group)
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(i32).range(0..=530))]
    pub hall_number: i32,

    /// Space group symbol: 0 = international, 1 = Schoenflies
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=1))]
    pub symbol_type: u8,

    #[command(flatten)]
    pub symmetry: SymmetryArgs,
}

impl InfoArgs {
    pub fn to_config(&self) -> SymmetryConfig {
        SymmetryConfig {
            hall_number: self.hall_number,
            ..self.symmetry.to_config()
        }
    }
}

/// primitive 子命令参数
#[derive(Args, Debug)]
pub struct PrimitiveArgs {
    /// Input structure file
    pub input: PathBuf,

    /// Output structure file
    #[arg(short, long, default_value = "primitive.vasp")]
    pub output: PathBuf,

    /// Output format; detected from the name if omitted
    #[arg(long)]
    pub format: Option<String>,

    #[command(flatten)]
    pub symmetry: SymmetryArgs,
}

/// orthogonal 子命令参数
#[derive(Args, Debug)]
pub struct OrthogonalArgs {
    /// Input structure file
    pub input: PathBuf,

    /// Output structure file
    #[arg(short, long, default_value = "orthogonal.vasp")]
    pub output: PathBuf,

    /// Minimum number of atoms in the supercell
    #[arg(long)]
    pub min_atoms: Option<usize>,

    /// Maximum number of atoms in the supercell
    #[arg(long)]
    pub max_atoms: Option<usize>,

    /// Minimum length of the inscribed box edges in Å
    #[arg(long, default_value_t = 15.0)]
    pub min_length: f64,

    /// Maximum supercell edge length in Å
    #[arg(long, default_value_t = 20.0)]
    pub max_length: f64,

    /// Only use diagonal transformation matrices
    #[arg(long, default_value_t = false)]
    pub force_diagonal: bool,

    /// Require all cell angles to be 90 degrees
    #[arg(long, default_value_t = false)]
    pub force_90_degrees: bool,

    /// Allow orthorhombic instead of cubic cells
    #[arg(long, default_value_t = false)]
    pub allow_orthorhombic: bool,

    /// Tolerance for 90 degree angles, in degrees
    #[arg(long, default_value_t = 1e-3)]
    pub angle_tolerance: f64,

    /// Step size for growing the target cell, in Å
    #[arg(long, default_value_t = 0.1)]
    pub step_size: f64,

    /// Output format; detected from the name if omitted
    #[arg(long)]
    pub format: Option<String>,
}

impl OrthogonalArgs {
    pub fn to_config(&self) -> OrthogonalConfig {
        OrthogonalConfig {
            min_atoms: self.min_atoms,
            max_atoms: self.max_atoms,
            min_length: self.min_length,
            max_length: Some(self.max_length),
            force_diagonal: self.force_diagonal,
            force_90_degrees: self.force_90_degrees,
            allow_orthorhombic: self.allow_orthorhombic,
            angle_tolerance: self.angle_tolerance,
            step_size: self.step_size,
        }
    }
}

/// scale 子命令参数
#[derive(Args, Debug)]
pub struct ScaleArgs {
    /// Input structure file
    pub input: PathBuf,

    /// Output structure file
    #[arg(short, long, default_value = "scaled.vasp")]
    pub output: PathBuf,

    /// Input format; detected from the name if omitted
    #[arg(long = "from")]
    pub from: Option<String>,

    /// Output format; detected from the name if omitted
    #[arg(long)]
    pub format: Option<String>,
}
