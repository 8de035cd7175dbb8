//! # 美化输出工具
//!
//! 提供统一的终端输出样式、属性表和数据预览表。
//!
//! ## 依赖关系
//! - 被所有 `commands/` 模块使用
//! - 使用 `colored` 和 `tabled` crate

use crate::models::Table as DataTable;
use colored::Colorize;
use tabled::builder::Builder;
use tabled::{Table, Tabled};

/// 属性表中的一行
#[derive(Debug, Clone, Tabled)]
pub struct InfoRow {
    #[tabled(rename = "Property")]
    pub property: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

impl InfoRow {
    pub fn new(property: impl Into<String>, value: impl ToString) -> Self {
        InfoRow {
            property: property.into(),
            value: value.to_string(),
        }
    }
}

/// 打印成功消息
pub fn print_success(msg: &str) {
    println!("{} {}", "[OK]".green().bold(), msg);
}

/// 打印错误消息
pub fn print_error(msg: &str) {
    eprintln!("{} {}", "[ERR]".red().bold(), msg);
}

/// 打印警告消息
pub fn print_warning(msg: &str) {
    println!("{} {}", "[WARN]".yellow().bold(), msg);
}

/// 打印信息消息
pub fn print_info(msg: &str) {
    println!("{} {}", "[*]".blue().bold(), msg);
}

/// 打印完成消息
pub fn print_done(msg: &str) {
    println!("{} {}", "[DONE]".green().bold(), msg);
}

/// 打印转换成功消息
pub fn print_conversion(from: &str, to: &str) {
    println!(
        "{} {} {} {}",
        "[OK]".green().bold(),
        from.dimmed(),
        "->".cyan(),
        to
    );
}

/// 打印标题栏
pub fn print_header(title: &str) {
    let line = "─".repeat(60);
    println!("\n{}", line.dimmed());
    println!("  {}", title.bold());
    println!("{}\n", line.dimmed());
}

/// 打印属性表
pub fn print_properties(title: &str, rows: &[InfoRow]) {
    print_header(title);
    println!("{}", Table::new(rows));
}

/// 构造数据表预览：前 `max_rows` 行、前 `max_cols` 列
pub fn preview_table(table: &DataTable, max_rows: usize, max_cols: usize) -> String {
    let n_cols = table.n_columns().min(max_cols);
    let mut builder = Builder::default();
    builder.push_record(table.column_names().into_iter().take(n_cols));

    for row in 0..table.n_rows().min(max_rows) {
        builder.push_record((0..n_cols).map(|col| {
            table
                .cell(row, col)
                .map(|c| shorten(&c))
                .unwrap_or_default()
        }));
    }

    builder.build().to_string()
}

/// 数值单元格保留有限位数，文本原样输出
fn shorten(cell: &str) -> String {
    match cell.parse::<f64>() {
        Ok(v) if cell.contains('.') || cell.contains('e') => format!("{:.4}", v),
        _ => cell.to_string(),
    }
}
