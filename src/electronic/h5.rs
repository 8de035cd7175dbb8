//! # HDF5 容器读取
//!
//! 与 JSON 容器同名的组与数据集；字符串以单字符数组存放，拼接后按 `;` 拆分，
//! 标量取数据集的第一个元素。投影数据按 (原子, 轨道) 编号逐个读取。
//!
//! ## 依赖关系
//! - 被 `electronic/mod.rs` 使用（`hdf5` feature）
//! - 使用 `models/electronic.rs`
//! - 使用 `hdf5` (hdf5-metno) 库

use crate::error::{DdpcError, Result};
use crate::models::electronic::{kpoints_from_flat, label_column};
use crate::models::{BandStructure, DensityOfStates, OrbitalWeights, ProjectionSet, SpinLayout};

use ::hdf5::types::FixedAscii;
use ::hdf5::File;
use std::path::Path;

fn missing(source: &str, key: &str) -> DdpcError {
    DdpcError::ParseError {
        format: "hdf5".to_string(),
        path: source.to_string(),
        reason: format!("Missing dataset {}", key),
    }
}

fn read_f64s(file: &File, key: &str, source: &str) -> Result<Vec<f64>> {
    if !file.link_exists(key) {
        return Err(missing(source, key));
    }
    Ok(file.dataset(key)?.read_raw::<f64>()?)
}

fn read_f64(file: &File, key: &str, source: &str) -> Result<f64> {
    read_f64s(file, key, source)?
        .first()
        .copied()
        .ok_or_else(|| missing(source, key))
}

fn read_usizes(file: &File, key: &str, source: &str) -> Result<Vec<usize>> {
    if !file.link_exists(key) {
        return Err(missing(source, key));
    }
    let values = file.dataset(key)?.read_raw::<i64>()?;
    Ok(values.into_iter().map(|v| v.max(0) as usize).collect())
}

fn read_usize(file: &File, key: &str, source: &str) -> Result<usize> {
    read_usizes(file, key, source)?
        .first()
        .copied()
        .ok_or_else(|| missing(source, key))
}

/// 读取字符数组并按 `;` 拆分
fn read_strings(file: &File, key: &str, source: &str) -> Result<Vec<String>> {
    if !file.link_exists(key) {
        return Err(missing(source, key));
    }
    let chars = file.dataset(key)?.read_raw::<FixedAscii<1>>()?;
    let joined: String = chars.iter().map(|c| c.as_str()).collect();
    Ok(joined.split(';').map(str::to_string).collect())
}

fn read_optional_strings(file: &File, key: &str, source: &str) -> Result<Vec<String>> {
    if file.link_exists(key) {
        read_strings(file, key, source)
    } else {
        Ok(Vec::new())
    }
}

fn read_flag(file: &File, key: &str, source: &str) -> Result<bool> {
    Ok(file.link_exists(key) && read_f64(file, key, source)? != 0.0)
}

fn spin_layout(file: &File, group: &str, source: &str) -> Result<SpinLayout> {
    let strings = read_optional_strings(file, &format!("/{}/SpinType", group), source)?;
    Ok(strings
        .first()
        .map(|s| SpinLayout::from_spin_type(s))
        .unwrap_or(SpinLayout::Unpolarized))
}

fn open(path: &Path) -> Result<File> {
    Ok(File::open(path)?)
}

/// 读取能带 HDF5 容器
pub fn load_band_h5(path: &Path) -> Result<BandStructure> {
    let source = path.display().to_string();
    let source = source.as_str();
    let file = open(path)?;

    let fermi_energy = read_f64(&file, "/BandInfo/EFermi", source)?;
    let project_flag = read_flag(&file, "/BandInfo/IsProject", source)?;
    let nkpt = read_usize(&file, "/BandInfo/NumberOfKpoints", source)?;
    let nbands = read_usize(&file, "/BandInfo/NumberOfBand", source)?;
    let spin = spin_layout(&file, "BandInfo", source)?;

    let coords = read_f64s(&file, "/BandInfo/CoordinatesOfKPoints", source)?;
    let kpoints = kpoints_from_flat(&coords, nkpt, source)?;
    let symbols = read_optional_strings(&file, "/BandInfo/SymmetryKPoints", source)?;
    let indices = if file.link_exists("/BandInfo/SymmetryKPointsIndex") {
        read_usizes(&file, "/BandInfo/SymmetryKPointsIndex", source)?
    } else {
        Vec::new()
    };
    let labels = label_column(nkpt, &symbols, &indices);

    let mut energies = Vec::with_capacity(spin.n_channels());
    for channel in 1..=spin.n_channels() {
        let key = format!("/BandInfo/Spin{}/BandEnergies", channel);
        energies.push(read_f64s(&file, &key, source)?);
    }

    let projections = if project_flag {
        let atoms = read_usize(&file, "/BandInfo/Spin1/ProjectBand/AtomIndex", source)?;
        let orbits = read_usize(&file, "/BandInfo/Spin1/ProjectBand/OrbitIndexs", source)?;
        let mut channels = Vec::with_capacity(spin.n_channels());
        for channel in 1..=spin.n_channels() {
            let mut entries = Vec::with_capacity(atoms * orbits);
            for atom in 1..=atoms {
                for orbit in 1..=orbits {
                    let key = if spin == SpinLayout::Collinear {
                        format!("/BandInfo/Spin{}/ProjectBand/{}/{}", channel, atom, orbit)
                    } else {
                        format!("/BandInfo/Spin1/ProjectBand/1/{}/{}", atom, orbit)
                    };
                    entries.push(OrbitalWeights {
                        atom,
                        orbital: orbit - 1,
                        weights: read_f64s(&file, &key, source)?,
                    });
                }
            }
            channels.push(entries);
        }
        Some(ProjectionSet {
            orbitals: read_strings(&file, "/BandInfo/Orbit", source)?,
            elements: read_optional_strings(&file, "/AtomInfo/Elements", source)?,
            channels,
        })
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

/// 读取态密度 HDF5 容器
pub fn load_dos_h5(path: &Path) -> Result<DensityOfStates> {
    let source = path.display().to_string();
    let source = source.as_str();
    let file = open(path)?;

    let fermi_energy = read_f64(&file, "/DosInfo/EFermi", source)?;
    let project_flag = read_flag(&file, "/DosInfo/Project", source)?;
    let spin = spin_layout(&file, "DosInfo", source)?;
    let energies = read_f64s(&file, "/DosInfo/DosEnergy", source)?;

    let mut densities = Vec::with_capacity(spin.n_channels());
    for channel in 1..=spin.n_channels() {
        densities.push(read_f64s(&file, &format!("/DosInfo/Spin{}/Dos", channel), source)?);
    }

    let projections = if project_flag {
        let atoms = read_usize(&file, "/DosInfo/Spin1/ProjectDos/AtomIndexs", source)?;
        let orbits = read_usize(&file, "/DosInfo/Spin1/ProjectDos/OrbitIndexs", source)?;
        let mut channels = Vec::with_capacity(spin.n_channels());
        for channel in 1..=spin.n_channels() {
            let mut entries = Vec::with_capacity(atoms * orbits);
            for atom in 1..=atoms {
                for orbit in 1..=orbits {
                    let key = format!("/DosInfo/Spin{}/ProjectDos{}/{}", channel, atom, orbit);
                    entries.push(OrbitalWeights {
                        atom,
                        orbital: orbit - 1,
                        weights: read_f64s(&file, &key, source)?,
                    });
                }
            }
            channels.push(entries);
        }
        Some(ProjectionSet {
            orbitals: read_strings(&file, "/DosInfo/Orbit", source)?,
            elements: read_optional_strings(&file, "/AtomInfo/Elements", source)?,
            channels,
        })
    } else {
        None
    };

    let dos = DensityOfStates {
        fermi_energy,
        energies,
        spin,
        densities,
        projections,
        project_flag,
    };
    dos.validate(source)?;
    Ok(dos)
}
