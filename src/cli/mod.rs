//! # CLI 模块
//!
//! 使用 `clap` 定义命令行参数和子命令。
//!
//! ## 命令结构
//! - `structure`: 结构处理（嵌套子命令）
//!   - `convert` / `info` / `primitive` / `orthogonal` / `scale`
//! - `data`: 电子结构数据（嵌套子命令）
//!   - `band read|info`
//!   - `dos read|info`
//!
//! ## 依赖关系
//! - 被 `main.rs` 使用
//! - 子模块: structure, data

pub mod data;
pub mod structure;

use clap::{Parser, Subcommand};

/// ddpc - 结构与电子结构数据转换工具
#[derive(Parser)]
#[command(name = "ddpc")]
#[command(author = "Changjiang Wu")]
#[command(version)]
#[command(about = "Crystal structure and electronic-structure data conversion toolkit", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// 可用的子命令
#[derive(Subcommand)]
pub enum Commands {
    /// Convert, inspect and transform crystal structures
    Structure(structure::StructureArgs),

    /// Extract band structure and DOS data into tables
    Data(data::DataArgs),
}
