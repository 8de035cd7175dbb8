//! # 统一错误处理模块
//!
//! 定义 ddpc 的所有错误类型，使用 `thiserror` 派生。
//! 所有错误原样传递到 CLI 边界，不做局部恢复。
//!
//! ## 依赖关系
//! - 被所有其他模块使用
//! - 无外部模块依赖

use thiserror::Error;

/// ddpc 统一错误类型
#[derive(Error, Debug)]
pub enum DdpcError {
    // ─────────────────────────────────────────────────────────────
    // I/O 错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to read file: {path}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}")]
    FileWriteError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    // ─────────────────────────────────────────────────────────────
    // 解析错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to parse {format} file: {path}\nReason: {reason}")]
    ParseError {
        format: String,
        path: String,
        reason: String,
    },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid structure: {0}")]
    InvalidStructure(String),

    #[error("Failed to parse JSON container: {path}")]
    JsonError {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[cfg(feature = "hdf5")]
    #[error("HDF5 error: {0}")]
    Hdf5Error(#[from] hdf5::Error),

    // ─────────────────────────────────────────────────────────────
    // 结构变换错误
    // ─────────────────────────────────────────────────────────────
    #[error("Symmetry detection failed: {0}")]
    SymmetryDetectionFailed(String),

    #[error("No orthogonal supercell found: {0}")]
    NoOrthogonalCellFound(String),

    // ─────────────────────────────────────────────────────────────
    // 电子结构数据错误
    // ─────────────────────────────────────────────────────────────
    #[error("Invalid projection mode: {0} (supported: 0-7)")]
    InvalidProjectionMode(i64),

    #[error("No projection data available in {path}; only mode 0 is allowed")]
    NoProjectionDataAvailable { path: String },

    #[error("Column '{column}' has {found} rows, expected {expected}")]
    TableShape {
        column: String,
        expected: usize,
        found: usize,
    },

    // ─────────────────────────────────────────────────────────────
    // 导出错误
    // ─────────────────────────────────────────────────────────────
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("NPZ archive error: {0}")]
    NpzError(#[from] zip::result::ZipError),

    // ─────────────────────────────────────────────────────────────
    // 参数错误
    // ─────────────────────────────────────────────────────────────
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, DdpcError>;
