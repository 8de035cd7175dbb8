//! # JSON 容器读取
//!
//! 用 serde 描述 `BandInfo` / `DosInfo` / `AtomInfo` 的字段布局，
//! 再转换为与容器无关的 `BandStructure` / `DensityOfStates`。
//! 标量字段兼容写成单元素数组的形式。
//!
//! ## 依赖关系
//! - 被 `electronic/mod.rs` 使用
//! - 使用 `models/electronic.rs`
//! - 使用 `serde` / `serde_json`

use crate::error::{DdpcError, Result};
use crate::models::electronic::{kpoints_from_flat, label_column};
use crate::models::{BandStructure, DensityOfStates, OrbitalWeights, ProjectionSet, SpinLayout};
use serde::Deserialize;

/// 标量或单元素数组
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Scalar<T> {
    One(T),
    Many(Vec<T>),
}

impl<T: Copy> Scalar<T> {
    fn get(&self) -> Option<T> {
        match self {
            Scalar::One(v) => Some(*v),
            Scalar::Many(v) => v.first().copied(),
        }
    }
}

/// 投影标记：布尔或整数
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Int(Scalar<i64>),
}

impl Flag {
    fn get(&self) -> bool {
        match self {
            Flag::Bool(b) => *b,
            Flag::Int(v) => v.get().unwrap_or(0) != 0,
        }
    }
}

/// SpinType：字符串或字符串数组
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Text {
    One(String),
    Many(Vec<String>),
}

impl Text {
    fn first(&self) -> &str {
        match self {
            Text::One(s) => s,
            Text::Many(v) => v.first().map(String::as_str).unwrap_or(""),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProjectionEntry {
    #[serde(rename = "AtomIndex")]
    atom_index: usize,
    #[serde(rename = "OrbitIndex")]
    orbit_index: usize,
    #[serde(rename = "Contribution")]
    contribution: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct BandChannel {
    #[serde(rename = "BandEnergies")]
    band_energies: Vec<f64>,
    #[serde(rename = "ProjectBand", default)]
    project_band: Vec<ProjectionEntry>,
}

#[derive(Debug, Deserialize)]
struct BandInfo {
    #[serde(rename = "EFermi")]
    e_fermi: Scalar<f64>,
    #[serde(rename = "IsProject")]
    is_project: Option<Flag>,
    #[serde(rename = "CoordinatesOfKPoints")]
    coordinates_of_kpoints: Vec<f64>,
    #[serde(rename = "NumberOfKpoints")]
    number_of_kpoints: Scalar<usize>,
    #[serde(rename = "NumberOfBand")]
    number_of_band: Scalar<usize>,
    #[serde(rename = "SpinType")]
    spin_type: Option<Text>,
    #[serde(rename = "Orbit", default)]
    orbit: Vec<String>,
    #[serde(rename = "SymmetryKPoints", default)]
    symmetry_kpoints: Vec<String>,
    #[serde(rename = "SymmetryKPointsIndex", default)]
    symmetry_kpoints_index: Vec<usize>,
    #[serde(rename = "Spin1")]
    spin1: BandChannel,
    #[serde(rename = "Spin2")]
    spin2: Option<BandChannel>,
}

#[derive(Debug, Deserialize)]
struct DosChannel {
    #[serde(rename = "Dos")]
    dos: Vec<f64>,
    #[serde(rename = "ProjectDos", default)]
    project_dos: Vec<ProjectionEntry>,
}

#[derive(Debug, Deserialize)]
struct DosInfo {
    #[serde(rename = "EFermi")]
    e_fermi: Scalar<f64>,
    #[serde(rename = "Project")]
    project: Option<Flag>,
    #[serde(rename = "DosEnergy")]
    dos_energy: Vec<f64>,
    #[serde(rename = "SpinType")]
    spin_type: Option<Text>,
    #[serde(rename = "Orbit", default)]
    orbit: Vec<String>,
    #[serde(rename = "Spin1")]
    spin1: DosChannel,
    #[serde(rename = "Spin2")]
    spin2: Option<DosChannel>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    #[serde(rename = "Element")]
    element: String,
}

#[derive(Debug, Default, Deserialize)]
struct AtomInfo {
    #[serde(rename = "Atoms", default)]
    atoms: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct BandFile {
    #[serde(rename = "BandInfo")]
    band_info: BandInfo,
    #[serde(rename = "AtomInfo", default)]
    atom_info: AtomInfo,
}

#[derive(Debug, Deserialize)]
struct DosFile {
    #[serde(rename = "DosInfo")]
    dos_info: DosInfo,
    #[serde(rename = "AtomInfo", default)]
    atom_info: AtomInfo,
}

fn parse_error(source: &str, reason: impl Into<String>) -> DdpcError {
    DdpcError::ParseError {
        format: "json".to_string(),
        path: source.to_string(),
        reason: reason.into(),
    }
}

fn spin_layout(spin_type: &Option<Text>) -> SpinLayout {
    spin_type
        .as_ref()
        .map(|t| SpinLayout::from_spin_type(t.first()))
        .unwrap_or(SpinLayout::Unpolarized)
}

fn convert_entries(entries: Vec<ProjectionEntry>, source: &str) -> Result<Vec<OrbitalWeights>> {
    entries
        .into_iter()
        .map(|e| {
            if e.orbit_index == 0 {
                return Err(parse_error(source, "OrbitIndex is 1-based; found 0"));
            }
            Ok(OrbitalWeights {
                atom: e.atom_index,
                orbital: e.orbit_index - 1,
                weights: e.contribution,
            })
        })
        .collect()
}

/// 组装投影集合；没有任何投影条目时返回 None
fn projection_set(
    orbitals: Vec<String>,
    elements: Vec<String>,
    channels: Vec<Vec<ProjectionEntry>>,
    source: &str,
) -> Result<Option<ProjectionSet>> {
    if channels.iter().all(|c| c.is_empty()) {
        return Ok(None);
    }
    let channels = channels
        .into_iter()
        .map(|c| convert_entries(c, source))
        .collect::<Result<Vec<_>>>()?;
    Ok(Some(ProjectionSet {
        orbitals,
        elements,
        channels,
    }))
}

/// 解析能带 JSON 内容
pub fn parse_band_json(content: &str, source: &str) -> Result<BandStructure> {
    let file: BandFile = serde_json::from_str(content).map_err(|e| DdpcError::JsonError {
        path: source.to_string(),
        source: e,
    })?;
    let info = file.band_info;

    let nkpt = info
        .number_of_kpoints
        .get()
        .ok_or_else(|| parse_error(source, "NumberOfKpoints is empty"))?;
    let nbands = info
        .number_of_band
        .get()
        .ok_or_else(|| parse_error(source, "NumberOfBand is empty"))?;
    let fermi_energy = info
        .e_fermi
        .get()
        .ok_or_else(|| parse_error(source, "EFermi is empty"))?;
    let spin = spin_layout(&info.spin_type);

    let kpoints = kpoints_from_flat(&info.coordinates_of_kpoints, nkpt, source)?;
    let labels = label_column(nkpt, &info.symmetry_kpoints, &info.symmetry_kpoints_index);

    let mut energies = vec![info.spin1.band_energies];
    let mut raw_projections = vec![info.spin1.project_band];
    if spin == SpinLayout::Collinear {
        let spin2 = info
            .spin2
            .ok_or_else(|| parse_error(source, "Collinear data without Spin2"))?;
        energies.push(spin2.band_energies);
        raw_projections.push(spin2.project_band);
    }

    let elements = file.atom_info.atoms.into_iter().map(|a| a.element).collect();
    let project_flag = info.is_project.as_ref().is_some_and(Flag::get);
    let projections = if project_flag {
        projection_set(info.orbit, elements, raw_projections, source)?
    } else {
        None
    };

    let band = BandStructure {
        fermi_energy,
        kpoints,
        labels,
        nbands,
        spin,
        energies,
        projections,
        project_flag,
    };
    band.validate(source)?;
    Ok(band)
}

/// 解析态密度 JSON 内容
pub fn parse_dos_json(content: &str, source: &str) -> Result<DensityOfStates> {
    let file: DosFile = serde_json::from_str(content).map_err(|e| DdpcError::JsonError {
        path: source.to_string(),
        source: e,
    })?;
    let info = file.dos_info;

    let fermi_energy = info
        .e_fermi
        .get()
        .ok_or_else(|| parse_error(source, "EFermi is empty"))?;
    let spin = spin_layout(&info.spin_type);

    let mut densities = vec![info.spin1.dos];
    let mut raw_projections = vec![info.spin1.project_dos];
    if spin == SpinLayout::Collinear {
        let spin2 = info
            .spin2
            .ok_or_else(|| parse_error(source, "Collinear data without Spin2"))?;
        densities.push(spin2.dos);
        raw_projections.push(spin2.project_dos);
    }

    let elements = file.atom_info.atoms.into_iter().map(|a| a.element).collect();
    let project_flag = info.project.as_ref().is_some_and(Flag::get);
    let projections = if project_flag {
        projection_set(info.orbit, elements, raw_projections, source)?
    } else {
        None
    };

    let dos = DensityOfStates {
        fermi_energy,
        energies: info.dos_energy,
        spin,
        densities,
        projections,
        project_flag,
    };
    dos.validate(source)?;
    Ok(dos)
}
