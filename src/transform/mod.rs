//! # 结构变换模块
//!
//! 提供分数坐标归一化、原胞搜索、对称性分析与正交超胞搜索。
//! 原胞与对称性由 moyo 求得，所有容差通过配置结构体显式传入，不使用全局状态。
//!
//! ## 依赖关系
//! - 被 `commands/structure.rs` 使用
//! - 使用 `models/structure.rs` 和 `utils/math.rs`
//! - 使用 moyo 做对称性检测，nalgebra 构造其输入
//! - 子模块: primitive, symmetry, orthogonal

pub mod orthogonal;
pub mod primitive;
pub mod symmetry;

pub use orthogonal::{find_orthogonal, make_supercell, OrthogonalConfig};
pub use primitive::find_primitive;
pub use symmetry::{analyze_symmetry, CrystalSystem, SymbolType, SymmetryInfo};

use crate::error::{DdpcError, Result};
use crate::models::{CoordinateMode, Lattice, Structure};
use crate::utils::math::{self, Vec3};

use moyo::base::{AngleTolerance, Cell, Lattice as MoyoLattice};
use moyo::data::Setting;
use moyo::MoyoDataset;
use nalgebra::{Matrix3, Vector3};

/// Hall 符号序号的上限
const MAX_HALL_NUMBER: i32 = 530;

/// 对称性容差
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SymmetryConfig {
    /// 位置容差 (Å)
    pub symprec: f64,
    /// 角度容差（度），负值表示由 symprec 推导
    pub angle_tolerance: f64,
    /// 标准化时采用的 Hall 符号序号，0 表示每个空间群的默认设置
    pub hall_number: i32,
}

impl Default for SymmetryConfig {
    fn default() -> Self {
        SymmetryConfig {
            symprec: 1e-5,
            angle_tolerance: -1.0,
            hall_number: 0,
        }
    }
}

impl SymmetryConfig {
    fn moyo_angle_tolerance(&self) -> AngleTolerance {
        if self.angle_tolerance > 0.0 {
            AngleTolerance::Radian(self.angle_tolerance.to_radians())
        } else {
            AngleTolerance::Default
        }
    }

    fn setting(&self) -> Result<Setting> {
        match self.hall_number {
            0 => Ok(Setting::Spglib),
            n if (1..=MAX_HALL_NUMBER).contains(&n) => Ok(Setting::HallNumber(n)),
            n => Err(DdpcError::InvalidArgument(format!(
                "Hall number must be between 0 and {}, got {}",
                MAX_HALL_NUMBER, n
            ))),
        }
    }
}

/// 转换为分数坐标并折回 [0, 1)，约束与磁矩保持不变
pub fn scale_positions(structure: &Structure) -> Result<Structure> {
    let mut out = structure.with_fractional()?;
    for site in &mut out.sites {
        site.position = site.position.map(math::wrap_unit);
    }
    out.coordinates = CoordinateMode::Fractional;
    Ok(out)
}

/// 对称性数据集，附带每个原子编号对应的代表位点
pub(crate) struct SymmetryDataset {
    pub dataset: MoyoDataset,
    /// 原子编号 k（从 1 开始）对应输入结构中的位点 `representatives[k - 1]`
    pub representatives: Vec<usize>,
}

/// 调用 moyo 求对称性数据集
///
/// 元素与磁矩都相同的位点共用一个原子编号，磁有序因此会降低对称性。
pub(crate) fn symmetry_dataset(
    structure: &Structure,
    config: &SymmetryConfig,
) -> Result<SymmetryDataset> {
    let lattice = structure.require_lattice()?;
    if structure.is_empty() {
        return Err(DdpcError::InvalidStructure(
            "Structure has no sites".to_string(),
        ));
    }
    let setting = config.setting()?;
    let positions = structure.fractional_positions()?;

    let mut representatives: Vec<usize> = Vec::new();
    let mut numbers: Vec<i32> = Vec::with_capacity(structure.len());
    for (i, site) in structure.sites.iter().enumerate() {
        let kind = representatives.iter().position(|&r| {
            structure.sites[r].species == site.species
                && structure
                    .metadata
                    .magmoms
                    .as_ref()
                    .map_or(true, |m| m.same_at(i, r, config.symprec))
        });
        let kind = match kind {
            Some(k) => k,
            None => {
                representatives.push(i);
                representatives.len() - 1
            }
        };
        numbers.push(kind as i32 + 1);
    }

    let cell = Cell::new(
        to_moyo_lattice(lattice),
        positions
            .iter()
            .map(|p| Vector3::new(p[0], p[1], p[2]))
            .collect(),
        numbers,
    );
    let dataset = MoyoDataset::new(
        &cell,
        config.symprec,
        config.moyo_angle_tolerance(),
        setting,
        true,
    )
    .map_err(|e| DdpcError::SymmetryDetectionFailed(e.to_string()))?;
    log::debug!(
        "Space group #{} ({} operations, {} site kinds)",
        dataset.number,
        dataset.operations.len(),
        representatives.len()
    );

    Ok(SymmetryDataset {
        dataset,
        representatives,
    })
}

fn to_moyo_lattice(lattice: &Lattice) -> MoyoLattice {
    let m = &lattice.matrix;
    MoyoLattice::new(Matrix3::new(
        m[0][0], m[0][1], m[0][2], m[1][0], m[1][1], m[1][2], m[2][0], m[2][1], m[2][2],
    ))
}

/// moyo 的基矢按列存放
pub(crate) fn from_moyo_lattice(lattice: &MoyoLattice) -> Lattice {
    let vector = |i: usize| -> Vec3 {
        let c = lattice.basis.column(i);
        [c[0], c[1], c[2]]
    };
    Lattice::from_vectors([vector(0), vector(1), vector(2)])
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MagneticMoments, Site};

    #[test]
    fn test_scale_positions_wraps_and_is_idempotent() {
        let mut structure = Structure::new(
            "Si",
            fixtures::cubic(5.43),
            vec![Site::new("Si", [1.25, -0.25, 0.0]), Site::new("Si", [0.5, 0.5, 0.5])],
            CoordinateMode::Fractional,
        );
        structure.metadata.fixed = Some(vec![[true; 3], [false; 3]]);

        let once = scale_positions(&structure).unwrap();
        assert!((once.sites[0].position[0] - 0.25).abs() < 1e-12);
        assert!((once.sites[0].position[1] - 0.75).abs() < 1e-12);
        assert_eq!(once.metadata, structure.metadata);

        let twice = scale_positions(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_scale_positions_from_cartesian() {
        let structure = Structure::new(
            "Po",
            fixtures::cubic(4.0),
            vec![Site::new("Po", [5.0, 2.0, -1.0])],
            CoordinateMode::Cartesian,
        );
        let scaled = scale_positions(&structure).unwrap();
        assert_eq!(scaled.coordinates, CoordinateMode::Fractional);
        let p = scaled.sites[0].position;
        assert!((p[0] - 0.25).abs() < 1e-12);
        assert!((p[1] - 0.5).abs() < 1e-12);
        assert!((p[2] - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_scale_positions_needs_lattice() {
        let molecule = Structure::molecule("H", vec![Site::new("H", [0.0, 0.0, 0.0])]);
        assert!(scale_positions(&molecule).is_err());
    }

    #[test]
    fn test_hall_number_range() {
        let mut config = SymmetryConfig::default();
        assert!(matches!(config.setting(), Ok(Setting::Spglib)));
        config.hall_number = 526;
        assert!(matches!(config.setting(), Ok(Setting::HallNumber(526))));
        config.hall_number = 531;
        assert!(matches!(config.setting(), Err(DdpcError::InvalidArgument(_))));
        config.hall_number = -1;
        assert!(config.setting().is_err());
    }

    #[test]
    fn test_lattice_conversion_keeps_vectors() {
        let lattice = Lattice::from_vectors([[4.0, 0.0, 0.0], [4.0, 4.0, 0.0], [0.5, 0.0, 4.0]]);
        let back = from_moyo_lattice(&to_moyo_lattice(&lattice));
        assert_eq!(back.matrix, lattice.matrix);
    }

    #[test]
    fn test_magnetic_order_splits_site_kinds() {
        let mut structure = fixtures::bcc_fe();
        let data = symmetry_dataset(&structure, &SymmetryConfig::default()).unwrap();
        assert_eq!(data.representatives, vec![0]);

        structure.metadata.magmoms = Some(MagneticMoments::Collinear(vec![2.0, -2.0]));
        let data = symmetry_dataset(&structure, &SymmetryConfig::default()).unwrap();
        assert_eq!(data.representatives, vec![0, 1]);
        assert_eq!(data.dataset.number, 221);
    }

    #[test]
    fn test_symmetry_dataset_needs_sites() {
        let empty = Structure::new("X", fixtures::cubic(3.0), vec![], CoordinateMode::Fractional);
        assert!(matches!(
            symmetry_dataset(&empty, &SymmetryConfig::default()),
            Err(DdpcError::InvalidStructure(_))
        ));
    }
}
