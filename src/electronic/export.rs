//! # 表格导出
//!
//! 导出能带/态密度表格到分隔文本和 NPZ 数组包。
//!
//! ## 支持格式
//! - CSV: 可选表头与分隔符，数值按最短无损形式输出
//! - NPZ: zip 归档，每列一个 `.npy`（格式 1.0），
//!   浮点列为 `<f8`，整数列为 `<i8`，文本列为定长 `<U{n}`
//!
//! ## 依赖关系
//! - 被 `commands/data.rs` 调用
//! - 使用 `models/table.rs`
//! - 使用 `csv` 和 `zip` 库写入文件

use crate::error::{DdpcError, Result};
use crate::models::{ColumnData, Table};

use std::fs::File;
use std::io::Write;
use std::path::Path;

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// CSV 导出选项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvOptions {
    pub delimiter: u8,
    pub header: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        CsvOptions {
            delimiter: b',',
            header: true,
        }
    }
}

fn require_columns(table: &Table) -> Result<()> {
    if table.n_columns() == 0 {
        return Err(DdpcError::InvalidArgument("Empty data table".to_string()));
    }
    Ok(())
}

/// 导出为 CSV
pub fn to_csv(table: &Table, output_path: &Path, options: &CsvOptions) -> Result<()> {
    require_columns(table)?;

    let mut wtr = csv::WriterBuilder::new()
        .delimiter(options.delimiter)
        .from_path(output_path)?;

    if options.header {
        wtr.write_record(table.column_names())?;
    }

    for row in 0..table.n_rows() {
        let record: Vec<String> = (0..table.n_columns())
            .map(|col| table.cell(row, col).unwrap_or_default())
            .collect();
        wtr.write_record(&record)?;
    }

    wtr.flush().map_err(|e| DdpcError::FileWriteError {
        path: output_path.display().to_string(),
        source: e,
    })?;

    log::debug!(
        "Wrote {} rows x {} columns to {}",
        table.n_rows(),
        table.n_columns(),
        output_path.display()
    );
    Ok(())
}

/// 导出为 NPZ
pub fn to_npz(table: &Table, output_path: &Path, compressed: bool) -> Result<()> {
    require_columns(table)?;

    let write_error = |e: std::io::Error| DdpcError::FileWriteError {
        path: output_path.display().to_string(),
        source: e,
    };

    let file = File::create(output_path).map_err(write_error)?;
    let mut zip = ZipWriter::new(file);
    let method = if compressed {
        CompressionMethod::Deflated
    } else {
        CompressionMethod::Stored
    };
    let options = SimpleFileOptions::default().compression_method(method);

    for column in table.columns() {
        zip.start_file(format!("{}.npy", column.name), options)?;
        zip.write_all(&npy_bytes(&column.data)).map_err(write_error)?;
    }
    zip.finish()?;

    Ok(())
}

/// 构造 .npy 1.0 头：魔数、版本、u16 头长度，字典以空格补齐并以换行结尾，总长为 64 的倍数
fn npy_header(descr: &str, len: usize) -> Vec<u8> {
    let dict = format!(
        "{{'descr': '{}', 'fortran_order': False, 'shape': ({},), }}",
        descr, len
    );
    let preamble = 10;
    let unpadded = preamble + dict.len() + 1;
    let padding = (64 - unpadded % 64) % 64;
    let header_len = dict.len() + padding + 1;

    let mut out = Vec::with_capacity(preamble + header_len);
    out.extend_from_slice(b"\x93NUMPY");
    out.push(1);
    out.push(0);
    out.extend_from_slice(&(header_len as u16).to_le_bytes());
    out.extend_from_slice(dict.as_bytes());
    out.extend(std::iter::repeat(b' ').take(padding));
    out.push(b'\n');
    out
}

fn npy_bytes(data: &ColumnData) -> Vec<u8> {
    match data {
        ColumnData::Float(values) => {
            let mut out = npy_header("<f8", values.len());
            for v in values {
                out.extend_from_slice(&v.to_le_bytes());
            }
            out
        }
        ColumnData::Int(values) => {
            let mut out = npy_header("<i8", values.len());
            for v in values {
                out.extend_from_slice(&v.to_le_bytes());
            }
            out
        }
        ColumnData::Text(values) => {
            // 定长 UTF-32，宽度取最长字符串，至少为 1
            let width = values
                .iter()
                .map(|s| s.chars().count())
                .max()
                .unwrap_or(0)
                .max(1);
            let mut out = npy_header(&format!("<U{}", width), values.len());
            for s in values {
                let mut count = 0;
                for c in s.chars() {
                    out.extend_from_slice(&(c as u32).to_le_bytes());
                    count += 1;
                }
                for _ in count..width {
                    out.extend_from_slice(&0u32.to_le_bytes());
                }
            }
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::tempdir;

    fn sample() -> Table {
        let mut table = Table::new();
        table.push_text("spin", vec!["up".into(), "down".into()]).unwrap();
        table.push_int("band", vec![1, 2]).unwrap();
        table.push_float("energy", vec![-1.5, 0.25]).unwrap();
        table
    }

    #[test]
    fn test_csv_with_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("band.csv");
        to_csv(&sample(), &path, &CsvOptions::default()).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "spin,band,energy\nup,1,-1.5\ndown,2,0.25\n");
    }

    #[test]
    fn test_csv_delimiter_without_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("band.tsv");
        let options = CsvOptions {
            delimiter: b'\t',
            header: false,
        };
        to_csv(&sample(), &path, &options).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().next().unwrap(), "up\t1\t-1.5");
        assert_eq!(content.lines().count(), 2);
    }

    #[test]
    fn test_npy_header_alignment() {
        let header = npy_header("<f8", 80);
        assert_eq!(header.len() % 64, 0);
        assert_eq!(&header[..6], b"\x93NUMPY");
        assert_eq!(header[6..8], [1, 0]);
        assert_eq!(*header.last().unwrap(), b'\n');

        let declared = u16::from_le_bytes([header[8], header[9]]) as usize;
        assert_eq!(declared + 10, header.len());
        let text = String::from_utf8_lossy(&header[10..]);
        assert!(text.starts_with("{'descr': '<f8', 'fortran_order': False, 'shape': (80,), }"));
    }

    #[test]
    fn test_npz_archive() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("band.npz");
        to_npz(&sample(), &path, true).unwrap();

        let file = File::open(&path).unwrap();
        let mut archive = zip::ZipArchive::new(file).unwrap();
        assert_eq!(archive.len(), 3);

        let mut entry = archive.by_name("energy.npy").unwrap();
        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes).unwrap();
        let data = &bytes[bytes.len() - 16..];
        assert_eq!(f64::from_le_bytes(data[..8].try_into().unwrap()), -1.5);
        assert_eq!(f64::from_le_bytes(data[8..].try_into().unwrap()), 0.25);
        drop(entry);

        let mut entry = archive.by_name("spin.npy").unwrap();
        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes).unwrap();
        let text = String::from_utf8_lossy(&bytes[10..64]);
        assert!(text.contains("'<U4'"));
        // 2 个元素 x 4 字符 x 4 字节
        assert_eq!(bytes.len() % 64, 32);
    }

    #[test]
    fn test_empty_table_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.npz");
        assert!(matches!(
            to_npz(&Table::new(), &path, false),
            Err(DdpcError::InvalidArgument(_))
        ));
        assert!(to_csv(&Table::new(), &dir.path().join("e.csv"), &CsvOptions::default()).is_err());
    }
}
