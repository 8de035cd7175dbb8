//! # 对称性分析
//!
//! 由 moyo 数据集给出空间群序号、Hall 序号与 Hermann-Mauguin 符号；
//! 点群、Schoenflies 符号与晶系按空间群序号查表得到。
//! 点群操作数为数据集中不同转动部分的个数。
//!
//! ## 依赖关系
//! - 被 `transform/mod.rs` 和 `commands/structure.rs` 使用
//! - 使用 `transform/mod.rs` 的 moyo 桥接

use super::{from_moyo_lattice, symmetry_dataset, SymmetryConfig};
use crate::error::{DdpcError, Result};
use crate::models::Structure;

use nalgebra::Matrix3;

/// 晶系
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrystalSystem {
    Triclinic,
    Monoclinic,
    Orthorhombic,
    Tetragonal,
    Trigonal,
    Hexagonal,
    Cubic,
}

impl CrystalSystem {
    /// 由空间群序号判断晶系
    pub fn from_number(number: i32) -> Option<Self> {
        match number {
            1..=2 => Some(CrystalSystem::Triclinic),
            3..=15 => Some(CrystalSystem::Monoclinic),
            16..=74 => Some(CrystalSystem::Orthorhombic),
            75..=142 => Some(CrystalSystem::Tetragonal),
            143..=167 => Some(CrystalSystem::Trigonal),
            168..=194 => Some(CrystalSystem::Hexagonal),
            195..=230 => Some(CrystalSystem::Cubic),
            _ => None,
        }
    }
}

impl std::fmt::Display for CrystalSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CrystalSystem::Triclinic => "triclinic",
            CrystalSystem::Monoclinic => "monoclinic",
            CrystalSystem::Orthorhombic => "orthorhombic",
            CrystalSystem::Tetragonal => "tetragonal",
            CrystalSystem::Trigonal => "trigonal",
            CrystalSystem::Hexagonal => "hexagonal",
            CrystalSystem::Cubic => "cubic",
        };
        write!(f, "{}", name)
    }
}

/// 空间群符号的记法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SymbolType {
    /// Hermann-Mauguin 国际符号
    #[default]
    International,
    Schoenflies,
}

impl SymbolType {
    /// 0 为国际符号，1 为 Schoenflies 符号
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(SymbolType::International),
            1 => Ok(SymbolType::Schoenflies),
            other => Err(DdpcError::InvalidArgument(format!(
                "Symbol type must be 0 (international) or 1 (Schoenflies), got {}",
                other
            ))),
        }
    }
}

/// 32 个晶体学点群：(该点群最后一个空间群序号, Schoenflies, Hermann-Mauguin)
const POINT_GROUPS: [(i32, &str, &str); 32] = [
    (1, "C1", "1"),
    (2, "Ci", "-1"),
    (5, "C2", "2"),
    (9, "Cs", "m"),
    (15, "C2h", "2/m"),
    (24, "D2", "222"),
    (46, "C2v", "mm2"),
    (74, "D2h", "mmm"),
    (80, "C4", "4"),
    (82, "S4", "-4"),
    (88, "C4h", "4/m"),
    (98, "D4", "422"),
    (110, "C4v", "4mm"),
    (122, "D2d", "-42m"),
    (142, "D4h", "4/mmm"),
    (146, "C3", "3"),
    (148, "C3i", "-3"),
    (155, "D3", "32"),
    (161, "C3v", "3m"),
    (167, "D3d", "-3m"),
    (173, "C6", "6"),
    (174, "C3h", "-6"),
    (176, "C6h", "6/m"),
    (182, "D6", "622"),
    (186, "C6v", "6mm"),
    (190, "D3h", "-6m2"),
    (194, "D6h", "6/mmm"),
    (199, "T", "23"),
    (206, "Th", "m-3"),
    (214, "O", "432"),
    (220, "Td", "-43m"),
    (230, "Oh", "m-3m"),
];

/// 空间群所属点群，返回 (Schoenflies 空间群符号, Hermann-Mauguin 点群符号)
///
/// Schoenflies 空间群符号为点群加上该点群内的序号，如 225 为 `Oh^5`。
fn point_group(number: i32) -> Option<(String, &'static str)> {
    let mut first = 1;
    for (last, schoenflies, hm) in POINT_GROUPS {
        if (first..=last).contains(&number) {
            return Some((format!("{}^{}", schoenflies, number - first + 1), hm));
        }
        first = last + 1;
    }
    None
}

/// 对称性分析结果
#[derive(Debug, Clone, PartialEq)]
pub struct SymmetryInfo {
    /// 空间群序号 (1-230)
    pub spacegroup_number: i32,
    /// Hall 符号序号 (1-530)
    pub hall_number: i32,
    /// Hermann-Mauguin 空间群符号，如 `Fm-3m`
    pub international: String,
    /// Schoenflies 空间群符号，如 `Oh^5`
    pub schoenflies: String,
    /// Hermann-Mauguin 点群符号
    pub point_group: &'static str,
    pub crystal_system: CrystalSystem,
    /// 点群操作数
    pub n_operations: usize,
    /// 是否含反演中心
    pub centrosymmetric: bool,
    /// 原胞位点数
    pub primitive_sites: usize,
    /// 原胞体积 (Å³)
    pub primitive_volume: f64,
}

impl SymmetryInfo {
    /// 按记法选取空间群符号
    pub fn spacegroup(&self, symbol: SymbolType) -> &str {
        match symbol {
            SymbolType::International => &self.international,
            SymbolType::Schoenflies => &self.schoenflies,
        }
    }
}

/// 分析结构对称性
pub fn analyze_symmetry(structure: &Structure, config: &SymmetryConfig) -> Result<SymmetryInfo> {
    let data = symmetry_dataset(structure, config)?;
    let dataset = &data.dataset;

    let number = dataset.number;
    let ((schoenflies, point_group), crystal_system) = point_group(number)
        .zip(CrystalSystem::from_number(number))
        .ok_or_else(|| {
            DdpcError::SymmetryDetectionFailed(format!("Unknown space group number {}", number))
        })?;

    let mut rotations: Vec<Matrix3<i32>> = Vec::new();
    for op in &dataset.operations {
        if !rotations.contains(&op.rotation) {
            rotations.push(op.rotation);
        }
    }
    let inversion = -Matrix3::<i32>::identity();

    let primitive = &dataset.prim_std_cell;
    Ok(SymmetryInfo {
        spacegroup_number: number,
        hall_number: dataset.hall_number,
        international: dataset.hm_symbol.split_whitespace().collect(),
        schoenflies,
        point_group,
        crystal_system,
        n_operations: rotations.len(),
        centrosymmetric: rotations.contains(&inversion),
        primitive_sites: primitive.num_atoms(),
        primitive_volume: from_moyo_lattice(&primitive.lattice).volume().abs(),
    })
}
