//! # 列式数据表
//!
//! 能带/态密度提取的输出：按列存储的扁平表格，每列长度相同。
//! 表格只在一次导出调用中存在，不做持久化。
//!
//! ## 依赖关系
//! - 被 `electronic/` 使用
//! - 被 `commands/data.rs` 用于预览

use crate::error::{DdpcError, Result};

/// 单列数据
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Float(Vec<f64>),
    Int(Vec<i64>),
    Text(Vec<String>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Float(v) => v.len(),
            ColumnData::Int(v) => v.len(),
            ColumnData::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 单元格文本表示（用于 CSV 与终端预览）
    pub fn cell(&self, row: usize) -> Option<String> {
        match self {
            ColumnData::Float(v) => v.get(row).map(|x| x.to_string()),
            ColumnData::Int(v) => v.get(row).map(|x| x.to_string()),
            ColumnData::Text(v) => v.get(row).cloned(),
        }
    }
}

/// 命名列
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

/// 列式表格
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
}

impl Table {
    pub fn new() -> Self {
        Table::default()
    }

    /// 追加一列，长度必须与已有行数一致
    pub fn push(&mut self, name: impl Into<String>, data: ColumnData) -> Result<()> {
        let name = name.into();
        if let Some(first) = self.columns.first() {
            let expected = first.data.len();
            if data.len() != expected {
                return Err(DdpcError::TableShape {
                    column: name,
                    expected,
                    found: data.len(),
                });
            }
        }
        self.columns.push(Column { name, data });
        Ok(())
    }

    pub fn push_float(&mut self, name: impl Into<String>, values: Vec<f64>) -> Result<()> {
        self.push(name, ColumnData::Float(values))
    }

    pub fn push_int(&mut self, name: impl Into<String>, values: Vec<i64>) -> Result<()> {
        self.push(name, ColumnData::Int(values))
    }

    pub fn push_text(&mut self, name: impl Into<String>, values: Vec<String>) -> Result<()> {
        self.push(name, ColumnData::Text(values))
    }

    pub fn n_rows(&self) -> usize {
        self.columns.first().map_or(0, |c| c.data.len())
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&ColumnData> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| &c.data)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// 浮点列整体平移（调用方用于减去费米能）
    pub fn shift(&mut self, name: &str, delta: f64) -> Result<()> {
        let column = self
            .columns
            .iter_mut()
            .find(|c| c.name == name)
            .ok_or_else(|| DdpcError::InvalidArgument(format!("No column named '{}'", name)))?;

        match &mut column.data {
            ColumnData::Float(values) => {
                values.iter_mut().for_each(|v| *v += delta);
                Ok(())
            }
            _ => Err(DdpcError::InvalidArgument(format!(
                "Column '{}' is not numeric",
                name
            ))),
        }
    }

    /// 单元格文本
    pub fn cell(&self, row: usize, col: usize) -> Option<String> {
        self.columns.get(col).and_then(|c| c.data.cell(row))
    }
}
