//! # ddpc - 结构与电子结构数据转换工具
//!
//! 在常见第一性原理软件的结构格式之间转换，做简单的结构变换，
//! 并把能带/态密度容器展开为扁平表格。
//!
//! ## 子命令
//! - `structure` - 结构处理
//!   - `convert` - 格式转换 (POSCAR, .as, RESCU xyz, xyz, CIF, .cell)
//!   - `info` - 结构信息与对称性
//!   - `primitive` / `orthogonal` / `scale` - 结构变换
//! - `data` - 电子结构数据
//!   - `band read|info` - 能带
//!   - `dos read|info` - 态密度
//!
//! ## 依赖关系
//! ```text
//! main.rs
//!   ├── cli/        (命令行参数定义)
//!   ├── commands/   (命令执行逻辑)
//!   │     ├── parsers/    (结构格式编解码)
//!   │     ├── transform/  (结构变换)
//!   │     ├── electronic/ (能带/态密度提取与导出)
//!   │     └── models/     (数据模型)
//!   ├── utils/      (工具函数)
//!   └── error.rs    (错误处理)
//! ```

mod cli;
mod commands;
mod electronic;
mod error;
mod models;
mod parsers;
mod transform;
mod utils;

use clap::Parser;
use cli::Cli;

fn main() {
    // Initialize colored output for Windows compatibility
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();

    if let Err(e) = commands::run(cli.command) {
        utils::output::print_error(&format!("{}", e));
        std::process::exit(1);
    }
}
