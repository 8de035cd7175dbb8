//! # 原胞搜索
//!
//! 由 moyo 求出标准化原胞，再按原子编号把元素、标签与磁矩还原到新位点上。
//! 原子约束无法在等价位点间唯一对应，原胞中不再保留。
//!
//! ## 依赖关系
//! - 被 `transform/mod.rs` 使用
//! - 使用 `transform/mod.rs` 的 moyo 桥接

use super::{from_moyo_lattice, symmetry_dataset, SymmetryConfig};
use crate::error::{DdpcError, Result};
use crate::models::{CoordinateMode, Site, Structure};

/// 寻找原胞
pub fn find_primitive(structure: &Structure, config: &SymmetryConfig) -> Result<Structure> {
    let data = symmetry_dataset(structure, config)?;
    let cell = &data.dataset.prim_std_cell;

    let mut origins = Vec::with_capacity(cell.num_atoms());
    for number in &cell.numbers {
        let origin = usize::try_from(*number - 1)
            .ok()
            .and_then(|k| data.representatives.get(k))
            .ok_or_else(|| {
                DdpcError::SymmetryDetectionFailed(format!(
                    "Unknown atom number {} in the primitive cell",
                    number
                ))
            })?;
        origins.push(*origin);
    }

    let sites: Vec<Site> = origins
        .iter()
        .zip(&cell.positions)
        .map(|(&i, p)| {
            let mut site = structure.sites[i].clone();
            site.position = [p.x, p.y, p.z];
            site
        })
        .collect();
    log::debug!(
        "Primitive cell of space group #{}: {} -> {} sites",
        data.dataset.number,
        structure.len(),
        sites.len()
    );

    if structure.metadata.has_constraints() {
        log::warn!("Atomic constraints are not carried over to the primitive cell");
    }

    let mut primitive = Structure::new(
        structure.name.clone(),
        from_moyo_lattice(&cell.lattice),
        sites,
        CoordinateMode::Fractional,
    );
    primitive.metadata = structure.metadata.select(&origins);
    primitive.metadata.fixed = None;
    primitive.metadata.lattice_fixed = None;
    primitive.source_format = structure.source_format.clone();

    Ok(primitive)
}

#[cfg(test)]
mod tests {
    use super::super::fixtures;
    use super::*;
    use crate::models::{Lattice, MagneticMoments};

    #[test]
    fn test_bcc_reduces_to_one_site() {
        let primitive = find_primitive(&fixtures::bcc_fe(), &SymmetryConfig::default()).unwrap();
        assert_eq!(primitive.len(), 1);

        let volume = primitive.volume().unwrap();
        assert!((volume - 2.87f64.powi(3) / 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_nacl_conventional_reduces_to_two_sites() {
        let primitive =
            find_primitive(&fixtures::nacl_conventional(), &SymmetryConfig::default()).unwrap();
        assert_eq!(primitive.len(), 2);
        assert_eq!(primitive.formula(), "ClNa");

        let volume = primitive.volume().unwrap();
        assert!((volume - 5.64f64.powi(3) / 4.0).abs() < 1e-6);

        let lengths = primitive.lattice.unwrap().lengths();
        for l in lengths {
            assert!((l - 5.64 / 2f64.sqrt()).abs() < 1e-6);
        }
    }

    #[test]
    fn test_primitive_keeps_cell_size() {
        let structure = Structure::new(
            "Po",
            fixtures::cubic(3.35),
            vec![Site::new("Po", [0.0, 0.0, 0.0])],
            CoordinateMode::Fractional,
        );
        let primitive = find_primitive(&structure, &SymmetryConfig::default()).unwrap();
        assert_eq!(primitive.len(), 1);
        for l in primitive.lattice.unwrap().lengths() {
            assert!((l - 3.35).abs() < 1e-9);
        }
    }

    #[test]
    fn test_skewed_basis_is_reduced() {
        // [[4,0,0],[4,4,0],[0,0,4]] 只是简单立方晶格换了一组基矢
        let lattice = Lattice::from_vectors([[4.0, 0.0, 0.0], [4.0, 4.0, 0.0], [0.0, 0.0, 4.0]]);
        let structure = Structure::new(
            "Po",
            lattice,
            vec![Site::new("Po", [0.0, 0.0, 0.0])],
            CoordinateMode::Fractional,
        );
        let primitive = find_primitive(&structure, &SymmetryConfig::default()).unwrap();
        assert_eq!(primitive.len(), 1);
        let lattice = primitive.lattice.unwrap();
        assert!(lattice.is_orthogonal(1e-6));
        for l in lattice.lengths() {
            assert!((l - 4.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_antiferromagnetic_order_is_kept() {
        let mut structure = fixtures::bcc_fe();
        structure.metadata.magmoms = Some(MagneticMoments::Collinear(vec![2.0, -2.0]));

        let primitive = find_primitive(&structure, &SymmetryConfig::default()).unwrap();
        assert_eq!(primitive.len(), 2);
        let Some(MagneticMoments::Collinear(m)) = primitive.metadata.magmoms else {
            panic!("expected collinear moments");
        };
        assert!(m.contains(&2.0) && m.contains(&-2.0));
    }

    #[test]
    fn test_constraints_are_dropped() {
        let mut structure = fixtures::bcc_fe();
        structure.metadata.fixed = Some(vec![[true; 3], [false; 3]]);
        structure.metadata.lattice_fixed = Some([[true; 3]; 3]);

        let primitive = find_primitive(&structure, &SymmetryConfig::default()).unwrap();
        assert!(primitive.metadata.fixed.is_none());
        assert!(primitive.metadata.lattice_fixed.is_none());
    }

    #[test]
    fn test_supercell_round_trip() {
        let supercell = super::super::make_supercell(
            &fixtures::nacl_conventional(),
            &[[2, 0, 0], [0, 1, 0], [0, 0, 1]],
        )
        .unwrap();
        assert_eq!(supercell.len(), 16);

        let primitive = find_primitive(&supercell, &SymmetryConfig::default()).unwrap();
        assert_eq!(primitive.len(), 2);
    }

    #[test]
    fn test_requires_lattice() {
        let molecule = Structure::molecule("H", vec![Site::new("H", [0.0; 3])]);
        assert!(matches!(
            find_primitive(&molecule, &SymmetryConfig::default()),
            Err(DdpcError::InvalidStructure(_))
        ));
    }
}
