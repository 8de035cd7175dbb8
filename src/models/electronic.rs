//! # 电子结构数据模型
//!
//! 能带与态密度数据集的统一表示，与容器格式（JSON/HDF5）无关。
//! 本征值按扁平索引 `band + kpoint * nbands` 存放，投影权重与之同形。
//!
//! ## 依赖关系
//! - 被 `electronic/` 使用
//! - 使用 `utils/math.rs`

use crate::error::{DdpcError, Result};
use crate::utils::math::{self, Vec3};

/// 自旋类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpinLayout {
    /// 无自旋极化，单通道
    Unpolarized,
    /// 共线自旋，up/down 两个通道
    Collinear,
    /// 非共线（自旋轨道耦合），单通道
    ///
    /// 容器只存放 Spin1 一组本征值和投影，不含按 x/y/z 分量的数据。
    NonCollinear,
}

impl SpinLayout {
    /// 从容器中的 SpinType 字符串识别
    pub fn from_spin_type(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "collinear" => SpinLayout::Collinear,
            "non-collinear" | "noncollinear" => SpinLayout::NonCollinear,
            _ => SpinLayout::Unpolarized,
        }
    }

    pub fn n_channels(&self) -> usize {
        match self {
            SpinLayout::Collinear => 2,
            _ => 1,
        }
    }

    /// 通道标签，只有共线自旋带标签
    pub fn channel_label(&self, channel: usize) -> Option<&'static str> {
        match (self, channel) {
            (SpinLayout::Collinear, 0) => Some("up"),
            (SpinLayout::Collinear, 1) => Some("down"),
            _ => None,
        }
    }
}

impl std::fmt::Display for SpinLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpinLayout::Unpolarized => write!(f, "unpolarized"),
            SpinLayout::Collinear => write!(f, "collinear"),
            SpinLayout::NonCollinear => write!(f, "non-collinear"),
        }
    }
}

/// 单个 (原子, 轨道) 的投影权重
#[derive(Debug, Clone, PartialEq)]
pub struct OrbitalWeights {
    /// 原子序号，从 1 开始
    pub atom: usize,
    /// 轨道名称索引，从 0 开始
    pub orbital: usize,
    pub weights: Vec<f64>,
}

/// 投影数据
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectionSet {
    /// 轨道名称，如 s, py, pz, px, dxy ...
    pub orbitals: Vec<String>,
    /// 每个原子的元素符号（可能缺失）
    pub elements: Vec<String>,
    /// 按自旋通道分组的投影
    pub channels: Vec<Vec<OrbitalWeights>>,
}

impl ProjectionSet {
    fn any_nonzero(&self) -> bool {
        self.channels
            .iter()
            .flatten()
            .any(|p| p.weights.iter().any(|w| *w != 0.0))
    }

    fn validate(&self, n_channels: usize, expected_len: usize, source: &str) -> Result<()> {
        if self.channels.len() != n_channels {
            return Err(invalid(
                source,
                format!(
                    "{} projection channels for {} spin channels",
                    self.channels.len(),
                    n_channels
                ),
            ));
        }

        for entry in self.channels.iter().flatten() {
            if entry.weights.len() != expected_len {
                return Err(invalid(
                    source,
                    format!(
                        "Projection of atom {} orbital {} has {} values, expected {}",
                        entry.atom,
                        entry.orbital + 1,
                        entry.weights.len(),
                        expected_len
                    ),
                ));
            }
            if entry.orbital >= self.orbitals.len() {
                return Err(invalid(
                    source,
                    format!("Orbital index {} out of range", entry.orbital + 1),
                ));
            }
            if entry.atom == 0 || (!self.elements.is_empty() && entry.atom > self.elements.len())
            {
                return Err(invalid(
                    source,
                    format!("Atom index {} out of range", entry.atom),
                ));
            }
        }

        Ok(())
    }
}

/// 能带数据
#[derive(Debug, Clone, PartialEq)]
pub struct BandStructure {
    pub fermi_energy: f64,
    /// k 点坐标
    pub kpoints: Vec<Vec3>,
    /// 每个 k 点的高对称点标签（非高对称点为空字符串）
    pub labels: Vec<String>,
    pub nbands: usize,
    pub spin: SpinLayout,
    /// 每个自旋通道的本征值，索引 band + kpoint * nbands
    pub energies: Vec<Vec<f64>>,
    pub projections: Option<ProjectionSet>,
    /// 容器声明的投影标记
    pub project_flag: bool,
}

impl BandStructure {
    pub fn nkpoints(&self) -> usize {
        self.kpoints.len()
    }

    /// 本征值 E(channel, band, kpoint)
    pub fn energy(&self, channel: usize, band: usize, kpoint: usize) -> f64 {
        self.energies[channel][band + kpoint * self.nbands]
    }

    /// 沿 k 路径的累积距离
    pub fn distances(&self) -> Vec<f64> {
        let mut dist = Vec::with_capacity(self.kpoints.len());
        let mut total = 0.0;
        for (i, k) in self.kpoints.iter().enumerate() {
            if i > 0 {
                total += math::norm(math::sub(*k, self.kpoints[i - 1]));
            }
            dist.push(total);
        }
        dist
    }

    pub fn has_projections(&self) -> bool {
        self.project_flag && self.projections.as_ref().is_some_and(|p| p.any_nonzero())
    }

    /// 检查维度不变量
    pub fn validate(&self, source: &str) -> Result<()> {
        let nkpt = self.kpoints.len();
        if self.labels.len() != nkpt {
            return Err(invalid(
                source,
                format!("{} k-point labels for {} k-points", self.labels.len(), nkpt),
            ));
        }
        if self.energies.len() != self.spin.n_channels() {
            return Err(invalid(
                source,
                format!(
                    "{} energy channels for {} spin layout",
                    self.energies.len(),
                    self.spin
                ),
            ));
        }

        let expected = self.nbands.checked_mul(nkpt).ok_or_else(|| {
            invalid(
                source,
                format!("{} bands x {} k-points overflows", self.nbands, nkpt),
            )
        })?;
        for (channel, values) in self.energies.iter().enumerate() {
            if values.len() != expected {
                return Err(invalid(
                    source,
                    format!(
                        "Spin{} holds {} eigenvalues, expected {} ({} bands x {} k-points)",
                        channel + 1,
                        values.len(),
                        expected,
                        self.nbands,
                        nkpt
                    ),
                ));
            }
        }

        if let Some(projections) = &self.projections {
            projections.validate(self.spin.n_channels(), expected, source)?;
        }
        Ok(())
    }
}

/// 态密度数据
#[derive(Debug, Clone, PartialEq)]
pub struct DensityOfStates {
    pub fermi_energy: f64,
    /// 能量网格
    pub energies: Vec<f64>,
    pub spin: SpinLayout,
    /// 每个自旋通道的总态密度
    pub densities: Vec<Vec<f64>>,
    pub projections: Option<ProjectionSet>,
    pub project_flag: bool,
}

impl DensityOfStates {
    pub fn has_projections(&self) -> bool {
        self.project_flag && self.projections.as_ref().is_some_and(|p| p.any_nonzero())
    }

    /// 检查维度不变量
    pub fn validate(&self, source: &str) -> Result<()> {
        let n = self.energies.len();
        if self.densities.len() != self.spin.n_channels() {
            return Err(invalid(
                source,
                format!(
                    "{} DOS channels for {} spin layout",
                    self.densities.len(),
                    self.spin
                ),
            ));
        }
        for (channel, values) in self.densities.iter().enumerate() {
            if values.len() != n {
                return Err(invalid(
                    source,
                    format!(
                        "Spin{} holds {} DOS values, expected {}",
                        channel + 1,
                        values.len(),
                        n
                    ),
                ));
            }
        }

        if let Some(projections) = &self.projections {
            projections.validate(self.spin.n_channels(), n, source)?;
        }
        Ok(())
    }
}

/// 将扁平 k 点坐标切分为三维向量
pub fn kpoints_from_flat(flat: &[f64], nkpt: usize, source: &str) -> Result<Vec<Vec3>> {
    let expected = nkpt
        .checked_mul(3)
        .ok_or_else(|| invalid(source, format!("{} k-points overflows", nkpt)))?;
    if flat.len() != expected {
        return Err(invalid(
            source,
            format!(
                "{} k-point coordinates for {} k-points, expected {}",
                flat.len(),
                nkpt,
                expected
            ),
        ));
    }
    Ok(flat.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect())
}

/// 根据 1-based 高对称点索引生成每个 k 点的标签列
pub fn label_column(nkpt: usize, symbols: &[String], indices: &[usize]) -> Vec<String> {
    let mut labels = vec![String::new(); nkpt];
    for (&index, symbol) in indices.iter().zip(symbols) {
        if index >= 1 && index <= nkpt {
            labels[index - 1] = symbol.clone();
        }
    }
    labels
}

fn invalid(source: &str, reason: String) -> DdpcError {
    DdpcError::ParseError {
        format: "electronic".to_string(),
        path: source.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn band(nkpt: usize, nbands: usize) -> BandStructure {
        BandStructure {
            fermi_energy: 1.0,
            kpoints: (0..nkpt).map(|i| [i as f64 * 0.1, 0.0, 0.0]).collect(),
            labels: vec![String::new(); nkpt],
            nbands,
            spin: SpinLayout::Unpolarized,
            energies: vec![(0..nkpt * nbands).map(|i| i as f64).collect()],
            projections: None,
            project_flag: false,
        }
    }

    #[test]
    fn test_spin_layout_from_string() {
        assert_eq!(SpinLayout::from_spin_type("collinear"), SpinLayout::Collinear);
        assert_eq!(
            SpinLayout::from_spin_type("non-collinear"),
            SpinLayout::NonCollinear
        );
        assert_eq!(SpinLayout::from_spin_type("none"), SpinLayout::Unpolarized);
        assert_eq!(SpinLayout::Collinear.n_channels(), 2);
        assert_eq!(SpinLayout::NonCollinear.channel_label(0), None);
    }

    #[test]
    fn test_band_energy_flat_index() {
        let data = band(4, 3);
        assert!(data.validate("test").is_ok());
        // band 2, kpoint 1 -> 2 + 1 * 3
        assert_eq!(data.energy(0, 2, 1), 5.0);
    }

    #[test]
    fn test_band_distances_accumulate() {
        let data = band(3, 1);
        let dist = data.distances();
        assert_eq!(dist.len(), 3);
        assert!((dist[2] - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_band_validate_rejects_short_channel() {
        let mut data = band(4, 3);
        data.energies[0].pop();
        assert!(matches!(
            data.validate("test"),
            Err(DdpcError::ParseError { .. })
        ));
    }

    #[test]
    fn test_has_projections_requires_nonzero() {
        let mut data = band(2, 1);
        data.project_flag = true;
        data.projections = Some(ProjectionSet {
            orbitals: vec!["s".to_string()],
            elements: vec!["Si".to_string()],
            channels: vec![vec![OrbitalWeights {
                atom: 1,
                orbital: 0,
                weights: vec![0.0, 0.0],
            }]],
        });
        assert!(data.validate("test").is_ok());
        assert!(!data.has_projections());

        if let Some(p) = data.projections.as_mut() {
            p.channels[0][0].weights[1] = 0.5;
        }
        assert!(data.has_projections());
    }

    #[test]
    fn test_projection_atom_out_of_range() {
        let mut data = band(1, 1);
        data.project_flag = true;
        data.projections = Some(ProjectionSet {
            orbitals: vec!["s".to_string()],
            elements: vec!["Si".to_string()],
            channels: vec![vec![OrbitalWeights {
                atom: 2,
                orbital: 0,
                weights: vec![1.0],
            }]],
        });
        assert!(data.validate("test").is_err());
    }

    #[test]
    fn test_kpoints_from_flat() {
        let k = kpoints_from_flat(&[0.0, 0.0, 0.0, 0.5, 0.0, 0.0], 2, "test").unwrap();
        assert_eq!(k[1], [0.5, 0.0, 0.0]);
        assert!(kpoints_from_flat(&[0.0; 5], 2, "test").is_err());
        assert!(matches!(
            kpoints_from_flat(&[0.0; 3], usize::MAX, "test"),
            Err(DdpcError::ParseError { .. })
        ));
    }

    #[test]
    fn test_band_validate_rejects_overflowing_shape() {
        let mut data = band(2, 1);
        data.nbands = usize::MAX;
        assert!(matches!(
            data.validate("test"),
            Err(DdpcError::ParseError { .. })
        ));
    }

    #[test]
    fn test_label_column() {
        let labels = label_column(
            4,
            &["G".to_string(), "X".to_string()],
            &[1, 4],
        );
        assert_eq!(labels, vec!["G", "", "", "X"]);
    }

    #[test]
    fn test_dos_validate() {
        let dos = DensityOfStates {
            fermi_energy: 0.0,
            energies: vec![-1.0, 0.0, 1.0],
            spin: SpinLayout::Collinear,
            densities: vec![vec![0.1, 0.2, 0.3], vec![0.1, 0.2]],
            projections: None,
            project_flag: false,
        };
        assert!(dos.validate("test").is_err());
    }
}
