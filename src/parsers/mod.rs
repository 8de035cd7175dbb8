//! # 结构文件编解码模块
//!
//! 提供各种晶体结构格式的读写，以及格式识别与能力表。
//!
//! 格式在入口处解析一次（显式名称 > 扩展名 > 内容特征），之后按枚举分派。
//! 写出时，目标格式不支持的可选属性（约束、磁矩、晶格约束）会被丢弃并记录警告；
//! 缺少必需属性（如晶格）则直接报错。
//!
//! ## 依赖关系
//! - 被 `commands/` 模块使用
//! - 使用 `models/` 数据模型
//! - 子模块: poscar, dspaw, rescu, xyz, cif, cell

pub mod cell;
pub mod cif;
pub mod dspaw;
pub mod poscar;
pub mod rescu;
pub mod xyz;

use crate::error::{DdpcError, Result};
use crate::models::{CoordinateMode, MagneticMoments, Structure};
use std::fs;
use std::path::Path;

/// 支持的结构文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructureFormat {
    /// VASP POSCAR/CONTCAR
    Poscar,
    /// DS-PAW .as
    DsPaw,
    /// RESCU xyz（带磁矩/约束列）
    Rescu,
    /// 普通 / 扩展 XYZ
    Xyz,
    /// CIF (P1)
    Cif,
    /// CASTEP .cell
    Cell,
}

/// 晶格支持程度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatticeSupport {
    Required,
    Optional,
    Unsupported,
}

/// 格式能力表
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatCapabilities {
    pub lattice: LatticeSupport,
    pub fixes: bool,
    pub collinear_magmoms: bool,
    pub vector_magmoms: bool,
    pub lattice_fixes: bool,
}

impl StructureFormat {
    pub const ALL: [StructureFormat; 6] = [
        StructureFormat::Poscar,
        StructureFormat::DsPaw,
        StructureFormat::Rescu,
        StructureFormat::Xyz,
        StructureFormat::Cif,
        StructureFormat::Cell,
    ];

    /// 从名称解析格式（大小写不敏感）
    pub fn from_name(name: &str) -> Result<Self> {
        match name.trim().to_lowercase().as_str() {
            "poscar" | "vasp" | "contcar" => Ok(StructureFormat::Poscar),
            "dspaw" | "ds-paw" | "as" => Ok(StructureFormat::DsPaw),
            "rescu" => Ok(StructureFormat::Rescu),
            "xyz" | "extxyz" => Ok(StructureFormat::Xyz),
            "cif" => Ok(StructureFormat::Cif),
            "cell" | "castep" => Ok(StructureFormat::Cell),
            other => Err(DdpcError::UnsupportedFormat(format!(
                "Unknown structure format '{}' (supported: poscar, dspaw, rescu, xyz, cif, cell)",
                other
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            StructureFormat::Poscar => "poscar",
            StructureFormat::DsPaw => "dspaw",
            StructureFormat::Rescu => "rescu",
            StructureFormat::Xyz => "xyz",
            StructureFormat::Cif => "cif",
            StructureFormat::Cell => "cell",
        }
    }

    pub fn capabilities(&self) -> FormatCapabilities {
        use LatticeSupport::*;
        let caps = |lattice, fixes, collinear_magmoms, vector_magmoms, lattice_fixes| {
            FormatCapabilities {
                lattice,
                fixes,
                collinear_magmoms,
                vector_magmoms,
                lattice_fixes,
            }
        };

        match self {
            StructureFormat::Poscar => caps(Required, true, false, false, false),
            StructureFormat::DsPaw => caps(Required, true, true, true, true),
            StructureFormat::Rescu => caps(Unsupported, true, true, true, false),
            StructureFormat::Xyz => caps(Optional, false, false, false, false),
            StructureFormat::Cif => caps(Required, false, false, false, false),
            StructureFormat::Cell => caps(Required, false, true, false, false),
        }
    }

    /// 按文件名/扩展名识别，`.xyz` 返回 None 交由调用方进一步判断
    fn from_path(path: &Path) -> Option<Option<Self>> {
        let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        let upper = file_name.to_uppercase();
        if upper.starts_with("POSCAR") || upper.starts_with("CONTCAR") {
            return Some(Some(StructureFormat::Poscar));
        }

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|s| s.to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "vasp" | "poscar" => Some(Some(StructureFormat::Poscar)),
            "as" => Some(Some(StructureFormat::DsPaw)),
            "cif" => Some(Some(StructureFormat::Cif)),
            "cell" => Some(Some(StructureFormat::Cell)),
            "xyz" => Some(None),
            _ => None,
        }
    }

    /// 识别输入文件格式
    pub fn resolve_read(path: &Path, explicit: Option<&str>) -> Result<Self> {
        if let Some(name) = explicit {
            return Self::from_name(name);
        }

        match Self::from_path(path) {
            Some(Some(format)) => Ok(format),
            Some(None) => {
                let content = read_text(path)?;
                Ok(sniff_xyz(&content))
            }
            None => Err(DdpcError::UnsupportedFormat(format!(
                "Cannot determine format for: {}",
                path.display()
            ))),
        }
    }

    /// 识别输出文件格式，`.xyz` 根据结构是否带约束/磁矩选择 RESCU 或普通 XYZ
    pub fn resolve_write(path: &Path, explicit: Option<&str>, structure: &Structure) -> Result<Self> {
        if let Some(name) = explicit {
            return Self::from_name(name);
        }

        match Self::from_path(path) {
            Some(Some(format)) => Ok(format),
            Some(None) => {
                if structure.metadata.has_constraints() || structure.metadata.has_magmoms() {
                    Ok(StructureFormat::Rescu)
                } else {
                    Ok(StructureFormat::Xyz)
                }
            }
            None => Err(DdpcError::UnsupportedFormat(format!(
                "Cannot determine output format for: {}",
                path.display()
            ))),
        }
    }
}

impl std::fmt::Display for StructureFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// 写出选项
#[derive(Debug, Clone, Copy)]
pub struct WriteOptions {
    /// 坐标类型，None 表示使用格式默认值
    pub coordinates: Option<CoordinateMode>,
    /// POSCAR 是否写元素行（VASP 5 格式）
    pub vasp5: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        WriteOptions {
            coordinates: None,
            vasp5: true,
        }
    }
}

/// 读取结构文件
pub fn read_structure(path: &Path, format: Option<&str>) -> Result<Structure> {
    if !path.exists() {
        return Err(DdpcError::FileNotFound {
            path: path.display().to_string(),
        });
    }

    let format = StructureFormat::resolve_read(path, format)?;
    let content = read_text(path)?;
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown");

    let structure = parse_structure_str(&content, format, name)?;
    log::debug!(
        "Read {} sites from {} as {}",
        structure.len(),
        path.display(),
        format
    );
    Ok(structure)
}

/// 按指定格式解析字符串内容
pub fn parse_structure_str(content: &str, format: StructureFormat, name: &str) -> Result<Structure> {
    let structure = match format {
        StructureFormat::Poscar => poscar::parse_poscar_content(content, name)?,
        StructureFormat::DsPaw => dspaw::parse_dspaw_content(content, name)?,
        StructureFormat::Rescu => rescu::parse_rescu_content(content, name)?,
        StructureFormat::Xyz => xyz::parse_xyz_content(content, name)?,
        StructureFormat::Cif => cif::parse_cif_content(content, name)?,
        StructureFormat::Cell => cell::parse_cell_content(content, name)?,
    };

    structure.validate()?;
    Ok(structure)
}

/// 写出结构文件，返回实际使用的格式
pub fn write_structure(
    path: &Path,
    structure: &Structure,
    format: Option<&str>,
    options: &WriteOptions,
) -> Result<StructureFormat> {
    let format = StructureFormat::resolve_write(path, format, structure)?;
    let content = format_structure(structure, format, options)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| DdpcError::FileWriteError {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }

    fs::write(path, content).map_err(|e| DdpcError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(format)
}

/// 将结构序列化为指定格式的字符串
pub fn format_structure(
    structure: &Structure,
    format: StructureFormat,
    options: &WriteOptions,
) -> Result<String> {
    structure.validate()?;
    let prepared = prepare_for_format(structure, format)?;

    match format {
        StructureFormat::Poscar => poscar::to_poscar_string(&prepared, options),
        StructureFormat::DsPaw => dspaw::to_dspaw_string(&prepared, options),
        StructureFormat::Rescu => rescu::to_rescu_string(&prepared),
        StructureFormat::Xyz => xyz::to_xyz_string(&prepared),
        StructureFormat::Cif => cif::to_cif_string(&prepared),
        StructureFormat::Cell => cell::to_cell_string(&prepared, options),
    }
}

/// 按能力表裁剪结构：缺必需属性报错，不支持的可选属性丢弃并警告
fn prepare_for_format(structure: &Structure, format: StructureFormat) -> Result<Structure> {
    let caps = format.capabilities();
    let mut out = structure.clone();

    match caps.lattice {
        LatticeSupport::Required if out.lattice.is_none() => {
            return Err(DdpcError::UnsupportedFormat(format!(
                "{} output requires a lattice, but the structure has none",
                format
            )));
        }
        LatticeSupport::Unsupported if out.lattice.is_some() => {
            log::warn!("{} cannot store the lattice; it will be dropped", format);
            out = out.with_cartesian()?;
            out.lattice = None;
            out.pbc = [false; 3];
        }
        _ => {}
    }

    if !caps.fixes && out.metadata.has_constraints() {
        log::warn!("{} cannot store atomic constraints; they will be dropped", format);
    }
    if !caps.fixes {
        out.metadata.fixed = None;
    }

    if let Some(magmoms) = &out.metadata.magmoms {
        let supported = match magmoms {
            MagneticMoments::Collinear(_) => caps.collinear_magmoms,
            MagneticMoments::Noncollinear(_) => caps.vector_magmoms,
        };
        if !supported {
            if magmoms.any_nonzero() {
                log::warn!(
                    "{} cannot store these magnetic moments; they will be dropped",
                    format
                );
            }
            out.metadata.magmoms = None;
        }
    }

    if out.metadata.lattice_fixed.is_some() && !caps.lattice_fixes {
        if out
            .metadata
            .lattice_fixed
            .is_some_and(|f| f.iter().flatten().any(|x| *x))
        {
            log::warn!("{} cannot store lattice constraints; they will be dropped", format);
        }
        out.metadata.lattice_fixed = None;
    }

    Ok(out)
}

/// 根据内容区分 RESCU xyz 与普通/扩展 XYZ
pub fn sniff_xyz(content: &str) -> StructureFormat {
    let lines: Vec<&str> = content.lines().collect();
    if lines.get(1).is_some_and(|l| l.contains("Lattice=\"")) {
        return StructureFormat::Xyz;
    }

    let first_atom = strip_comments(content, &['#', '%'])
        .into_iter()
        .nth(2)
        .map(|line| line.split_whitespace().count());

    match first_atom {
        Some(5 | 7 | 8 | 10) => StructureFormat::Rescu,
        _ => StructureFormat::Xyz,
    }
}

/// 读取文本文件
pub(crate) fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            DdpcError::FileNotFound {
                path: path.display().to_string(),
            }
        } else {
            DdpcError::FileReadError {
                path: path.display().to_string(),
                source: e,
            }
        }
    })
}

/// 去除注释并返回非空行
pub(crate) fn strip_comments(content: &str, markers: &[char]) -> Vec<String> {
    content
        .lines()
        .map(|line| match line.find(markers) {
            Some(idx) => &line[..idx],
            None => line,
        })
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}

/// 构造解析错误
pub(crate) fn parse_error(format: &str, path: &str, reason: impl Into<String>) -> DdpcError {
    DdpcError::ParseError {
        format: format.to_string(),
        path: path.to_string(),
        reason: reason.into(),
    }
}

/// 解析浮点数字段
pub(crate) fn parse_f64(token: &str, format: &str, path: &str) -> Result<f64> {
    token
        .parse::<f64>()
        .map_err(|_| parse_error(format, path, format!("Invalid number '{}'", token)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Lattice, Site};

    fn nacl() -> Structure {
        Structure::new(
            "NaCl",
            Lattice::from_parameters(5.64, 5.64, 5.64, 90.0, 90.0, 90.0),
            vec![Site::new("Na", [0.0, 0.0, 0.0]), Site::new("Cl", [0.5, 0.5, 0.5])],
            CoordinateMode::Fractional,
        )
    }

    #[test]
    fn test_format_from_name() {
        assert_eq!(StructureFormat::from_name("POSCAR").unwrap(), StructureFormat::Poscar);
        assert_eq!(StructureFormat::from_name("dspaw").unwrap(), StructureFormat::DsPaw);
        assert!(matches!(
            StructureFormat::from_name("pdb"),
            Err(DdpcError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_resolve_by_extension() {
        let s = nacl();
        let cases = [
            ("POSCAR", StructureFormat::Poscar),
            ("CONTCAR_relaxed", StructureFormat::Poscar),
            ("out.vasp", StructureFormat::Poscar),
            ("structure.as", StructureFormat::DsPaw),
            ("a.cif", StructureFormat::Cif),
            ("a.cell", StructureFormat::Cell),
            ("plain.xyz", StructureFormat::Xyz),
        ];
        for (name, expected) in cases {
            assert_eq!(
                StructureFormat::resolve_write(Path::new(name), None, &s).unwrap(),
                expected
            );
        }
        assert!(StructureFormat::resolve_write(Path::new("a.pdb"), None, &s).is_err());
    }

    #[test]
    fn test_resolve_write_xyz_with_metadata() {
        let mut s = nacl();
        s.metadata.magmoms = Some(MagneticMoments::Collinear(vec![1.0, 0.0]));
        assert_eq!(
            StructureFormat::resolve_write(Path::new("out.xyz"), None, &s).unwrap(),
            StructureFormat::Rescu
        );
    }

    #[test]
    fn test_sniff_xyz() {
        let ext = "2\nLattice=\"5 0 0 0 5 0 0 0 5\" pbc=\"T T T\"\nNa 0 0 0\nCl 2.5 2.5 2.5\n";
        assert_eq!(sniff_xyz(ext), StructureFormat::Xyz);

        let rescu = "2\ncomment\nFe 0 0 0 2.0\nFe 1.4 1.4 1.4 -2.0\n";
        assert_eq!(sniff_xyz(rescu), StructureFormat::Rescu);

        let plain = "1\nH atom\nH 0 0 0\n";
        assert_eq!(sniff_xyz(plain), StructureFormat::Xyz);
    }

    #[test]
    fn test_lattice_required() {
        let molecule = Structure::molecule("H", vec![Site::new("H", [0.0, 0.0, 0.0])]);
        let err = format_structure(&molecule, StructureFormat::Poscar, &WriteOptions::default())
            .unwrap_err();
        assert!(matches!(err, DdpcError::UnsupportedFormat(_)));

        assert!(format_structure(&molecule, StructureFormat::Xyz, &WriteOptions::default()).is_ok());
    }

    #[test]
    fn test_warn_and_drop_constraints() {
        let mut s = nacl();
        s.metadata.fixed = Some(vec![[true; 3], [false; 3]]);
        let prepared = prepare_for_format(&s, StructureFormat::Cif).unwrap();
        assert!(prepared.metadata.fixed.is_none());

        let kept = prepare_for_format(&s, StructureFormat::DsPaw).unwrap();
        assert_eq!(kept.metadata.fixed, s.metadata.fixed);
    }

    #[test]
    fn test_rescu_drops_lattice() {
        let s = nacl();
        let prepared = prepare_for_format(&s, StructureFormat::Rescu).unwrap();
        assert!(prepared.lattice.is_none());
        assert_eq!(prepared.coordinates, CoordinateMode::Cartesian);
        assert!((prepared.sites[1].position[0] - 2.82).abs() < 1e-9);
    }

    #[test]
    fn test_read_missing_file() {
        let err = read_structure(Path::new("/nonexistent/POSCAR"), None).unwrap_err();
        assert!(matches!(err, DdpcError::FileNotFound { .. }));
    }

    #[test]
    fn test_write_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.vasp");
        let format = write_structure(&path, &nacl(), None, &WriteOptions::default()).unwrap();

        assert_eq!(format, StructureFormat::Poscar);
        let back = read_structure(&path, None).unwrap();
        assert_eq!(back.len(), 2);
    }

    #[test]
    fn test_strip_comments() {
        let lines = strip_comments("a # x\n\n  % only\nb % y\n", &['#', '%']);
        assert_eq!(lines, vec!["a", "b"]);
    }
}
