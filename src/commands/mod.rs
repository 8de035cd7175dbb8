//! # 命令执行模块
//!
//! 实现各子命令的业务逻辑。
//!
//! ## 依赖关系
//! - 被 `main.rs` 调用
//! - 使用 `cli/`, `parsers/`, `transform/`, `electronic/`, `utils/`
//! - 子模块: structure, data

pub mod data;
pub mod structure;

use crate::cli::Commands;
use crate::error::Result;

/// 执行命令
pub fn run(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Structure(args) => structure::execute(args),
        Commands::Data(args) => data::execute(args),
    }
}
