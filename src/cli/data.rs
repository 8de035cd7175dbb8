//! # data 子命令 CLI 定义
//!
//! 电子结构数据提取入口：
//! - `band read|info`: 能带
//! - `dos read|info`: 态密度
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/data.rs`

use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;

/// data 主命令参数
#[derive(Args, Debug)]
pub struct DataArgs {
    #[command(subcommand)]
    pub command: DataCommands,
}

/// data 子命令
#[derive(Subcommand, Debug)]
pub enum DataCommands {
    /// Band structure data
    Band(DatasetArgs),

    /// Density of states data
    Dos(DatasetArgs),
}

/// 单个数据集的子命令参数
#[derive(Args, Debug)]
pub struct DatasetArgs {
    #[command(subcommand)]
    pub command: DatasetCommands,
}

/// read / info
#[derive(Subcommand, Debug)]
pub enum DatasetCommands {
    /// Extract the dataset into a table (CSV or NPZ)
    Read(ReadArgs),

    /// Show a summary of the dataset
    Info(DataInfoArgs),
}

/// 导出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    /// Delimited text
    Csv,
    /// NumPy .npz archive, one array per column
    Npz,
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportFormat::Csv => write!(f, "csv"),
            ExportFormat::Npz => write!(f, "npz"),
        }
    }
}

/// read 子命令参数
#[derive(Args, Debug)]
pub struct ReadArgs {
    /// Input container (.json, .h5)
    pub input: PathBuf,

    /// Output file; prints a preview when omitted
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Projection mode 0-7 (default: 5 with projections, 0 without)
    #[arg(long, env = "DDPC_PROJECTION_MODE", allow_negative_numbers = true)]
    pub mode: Option<i64>,

    /// Output format; inferred from the output extension if omitted
    #[arg(long, value_enum)]
    pub format: Option<ExportFormat>,

    /// Subtract the Fermi energy from the energy column
    #[arg(long, default_value_t = false)]
    pub shift_fermi: bool,

    /// CSV delimiter
    #[arg(long, default_value_t = ',')]
    pub delimiter: char,

    /// Omit the CSV header row
    #[arg(long, default_value_t = false)]
    pub no_header: bool,

    /// Store NPZ entries without compression
    #[arg(long, default_value_t = false)]
    pub uncompressed: bool,
}

/// info 子命令参数
#[derive(Args, Debug)]
pub struct DataInfoArgs {
    /// Input container (.json, .h5)
    pub input: PathBuf,
}
