//! # 电子结构数据提取模块
//!
//! 读取 DS-PAW 风格的能带/态密度容器（JSON 或 HDF5），
//! 按投影模式展开为扁平表格，再导出为 CSV 或 NPZ。
//! 能量按原值输出，费米能级平移由调用方决定。
//!
//! ## 依赖关系
//! - 被 `commands/data.rs` 使用
//! - 使用 `models/electronic.rs` 和 `models/table.rs`
//! - 子模块: json, h5, projection, band, dos, export

pub mod band;
pub mod dos;
pub mod export;
#[cfg(feature = "hdf5")]
mod h5;
pub mod json;
pub mod projection;

pub use band::tabulate_band;
pub use dos::tabulate_dos;
pub use export::{to_csv, to_npz, CsvOptions};
pub use projection::ProjectionMode;

use crate::error::{DdpcError, Result};
use crate::models::{BandStructure, DensityOfStates, Table};

use std::fs;
use std::io::Read;
use std::path::Path;

/// HDF5 文件签名
const HDF5_SIGNATURE: &[u8] = b"\x89HDF\r\n\x1a\n";

/// 容器格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerFormat {
    Json,
    Hdf5,
}

impl ContainerFormat {
    /// 由扩展名识别，未知扩展名时检查文件开头
    pub fn detect(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());
        match ext.as_deref() {
            Some("json") => return Ok(ContainerFormat::Json),
            Some("h5") | Some("hdf5") => return Ok(ContainerFormat::Hdf5),
            _ => {}
        }

        let mut head = [0u8; 8];
        let mut file = fs::File::open(path).map_err(|e| DdpcError::FileReadError {
            path: path.display().to_string(),
            source: e,
        })?;
        let n = file.read(&mut head).map_err(|e| DdpcError::FileReadError {
            path: path.display().to_string(),
            source: e,
        })?;

        if n == HDF5_SIGNATURE.len() && head == HDF5_SIGNATURE {
            return Ok(ContainerFormat::Hdf5);
        }
        if head[..n]
            .iter()
            .find(|b| !b.is_ascii_whitespace())
            .is_some_and(|b| *b == b'{')
        {
            return Ok(ContainerFormat::Json);
        }

        Err(DdpcError::UnsupportedFormat(format!(
            "Cannot determine container format of {}; expected .json, .h5 or .hdf5",
            path.display()
        )))
    }
}

impl std::fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContainerFormat::Json => write!(f, "json"),
            ContainerFormat::Hdf5 => write!(f, "hdf5"),
        }
    }
}

fn check_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(DdpcError::FileNotFound {
            path: path.display().to_string(),
        });
    }
    Ok(())
}

fn read_json(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| DdpcError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })
}

#[cfg(not(feature = "hdf5"))]
fn hdf5_disabled(path: &Path) -> DdpcError {
    DdpcError::UnsupportedFormat(format!(
        "{} is an HDF5 container; rebuild with `--features hdf5` to read it",
        path.display()
    ))
}

/// 读取能带数据
pub fn load_band(path: &Path) -> Result<BandStructure> {
    check_exists(path)?;
    let format = ContainerFormat::detect(path)?;
    log::debug!("Loading band structure from {} ({})", path.display(), format);

    match format {
        ContainerFormat::Json => {
            json::parse_band_json(&read_json(path)?, &path.display().to_string())
        }
        #[cfg(feature = "hdf5")]
        ContainerFormat::Hdf5 => h5::load_band_h5(path),
        #[cfg(not(feature = "hdf5"))]
        ContainerFormat::Hdf5 => Err(hdf5_disabled(path)),
    }
}

/// 读取态密度数据
pub fn load_dos(path: &Path) -> Result<DensityOfStates> {
    check_exists(path)?;
    let format = ContainerFormat::detect(path)?;
    log::debug!("Loading density of states from {} ({})", path.display(), format);

    match format {
        ContainerFormat::Json => json::parse_dos_json(&read_json(path)?, &path.display().to_string()),
        #[cfg(feature = "hdf5")]
        ContainerFormat::Hdf5 => h5::load_dos_h5(path),
        #[cfg(not(feature = "hdf5"))]
        ContainerFormat::Hdf5 => Err(hdf5_disabled(path)),
    }
}

/// 把表格化阶段的通用错误定位到具体文件
fn with_path(err: DdpcError, path: &Path) -> DdpcError {
    match err {
        DdpcError::NoProjectionDataAvailable { .. } => DdpcError::NoProjectionDataAvailable {
            path: path.display().to_string(),
        },
        DdpcError::ParseError { format, reason, .. } => DdpcError::ParseError {
            format,
            path: path.display().to_string(),
            reason,
        },
        other => other,
    }
}

/// 读取能带并展开为表格，返回 (表格, 费米能级, 是否含投影)
pub fn read_band(path: &Path, mode: i64) -> Result<(Table, f64, bool)> {
    ProjectionMode::try_from(mode)?;
    let band = load_band(path)?;
    let table = tabulate_band(&band, mode).map_err(|e| with_path(e, path))?;
    Ok((table, band.fermi_energy, band.has_projections()))
}

/// 读取态密度并展开为表格，返回 (表格, 费米能级, 是否含投影)
pub fn read_dos(path: &Path, mode: i64) -> Result<(Table, f64, bool)> {
    ProjectionMode::try_from(mode)?;
    let dos = load_dos(path)?;
    let table = tabulate_dos(&dos, mode).map_err(|e| with_path(e, path))?;
    Ok((table, dos.fermi_energy, dos.has_projections()))
}
