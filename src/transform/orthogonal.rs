//! # 正交超胞搜索
//!
//! 逐步增大目标立方（或正交）晶胞，求取整数变换矩阵 T = round(target · L⁻¹)，
//! 用六个平面投影向量估计内接长方体的最短边，直到满足长度与原子数约束。
//! 搜索在超出原子数上限、超出最大长度或步数耗尽时失败。
//!
//! ## 依赖关系
//! - 被 `transform/mod.rs`、`commands/structure.rs` 使用
//! - 使用 `utils/math.rs`

use crate::error::{DdpcError, Result};
use crate::models::{CoordinateMode, Lattice, Site, Structure};
use crate::utils::math::{self, Mat3, Vec3};

/// 立方搜索的最大步数
const MAX_CUBIC_STEPS: usize = 10_000;

/// 判断位点是否落在新晶胞内的容差
const CELL_EPS: f64 = 1e-8;

/// 正交超胞搜索参数
#[derive(Debug, Clone, PartialEq)]
pub struct OrthogonalConfig {
    /// 超胞最少原子数
    pub min_atoms: Option<usize>,
    /// 超胞最多原子数
    pub max_atoms: Option<usize>,
    /// 内接长方体最短边下限 (Å)
    pub min_length: f64,
    /// 最长边上限 (Å)，正交模式必需
    pub max_length: Option<f64>,
    /// 只使用对角变换矩阵
    pub force_diagonal: bool,
    /// 要求三个夹角都为 90°
    pub force_90_degrees: bool,
    /// 允许三边不等的正交晶胞
    pub allow_orthorhombic: bool,
    /// 90° 判断的角度容差（度）
    pub angle_tolerance: f64,
    /// 目标边长步进 (Å)
    pub step_size: f64,
}

impl Default for OrthogonalConfig {
    fn default() -> Self {
        OrthogonalConfig {
            min_atoms: None,
            max_atoms: None,
            min_length: 15.0,
            max_length: None,
            force_diagonal: false,
            force_90_degrees: false,
            allow_orthorhombic: false,
            angle_tolerance: 1e-3,
            step_size: 0.1,
        }
    }
}

/// 一次候选变换的评估结果
struct Candidate {
    transform: [[i64; 3]; 3],
    lattice: Lattice,
    lengths: [f64; 6],
    n_atoms: usize,
}

/// 寻找近似立方或正交的超胞
pub fn find_orthogonal(structure: &Structure, config: &OrthogonalConfig) -> Result<Structure> {
    let lattice = structure.require_lattice()?;

    if config.allow_orthorhombic && config.max_length.is_none() {
        return Err(DdpcError::InvalidArgument(
            "max_length is required for orthorhombic cells".to_string(),
        ));
    }
    if config.step_size <= 0.0 {
        return Err(DdpcError::InvalidArgument(format!(
            "Step size must be positive, got {}",
            config.step_size
        )));
    }

    if config.force_diagonal {
        let lengths = lattice.lengths();
        let mut transform = [[0i64; 3]; 3];
        for i in 0..3 {
            transform[i][i] = ((config.min_length / lengths[i]).ceil() as i64).max(1);
        }
        log::debug!("Diagonal transform {:?}", transform);
        return make_supercell(structure, &transform);
    }

    let inv = lattice.inverse().ok_or_else(|| {
        DdpcError::InvalidStructure("Lattice matrix is singular".to_string())
    })?;

    if !config.allow_orthorhombic {
        let mut size = config.min_length;
        for _ in 0..MAX_CUBIC_STEPS {
            let candidate = evaluate(structure, lattice, &inv, [size; 3]);
            if satisfies(&candidate, config) {
                log::debug!("Cubic transform {:?}", candidate.transform);
                return make_supercell(structure, &candidate.transform);
            }
            size += config.step_size;
            check_exceptions(&candidate, config)?;
        }
        return Err(DdpcError::NoOrthogonalCellFound(format!(
            "Unable to find cubic supercell within {} steps",
            MAX_CUBIC_STEPS
        )));
    }

    let max_length = config.max_length.unwrap_or(config.min_length);
    let step = if config.force_90_degrees {
        config.step_size * 5.0
    } else {
        config.step_size
    };
    let sizes = arange(config.min_length, max_length, step);

    let mut grid: Vec<[f64; 3]> = Vec::with_capacity(sizes.len().pow(3));
    for &a in &sizes {
        for &b in &sizes {
            for &c in &sizes {
                grid.push([a, b, c]);
            }
        }
    }
    // 稳定排序：和相同的候选保持生成顺序
    grid.sort_by(|x, y| {
        let sx: f64 = x.iter().sum();
        let sy: f64 = y.iter().sum();
        sx.total_cmp(&sy)
    });

    for target in grid {
        let candidate = evaluate(structure, lattice, &inv, target);
        if satisfies(&candidate, config) {
            log::debug!("Orthorhombic transform {:?}", candidate.transform);
            return make_supercell(structure, &candidate.transform);
        }
        check_exceptions(&candidate, config)?;
    }

    Err(DdpcError::NoOrthogonalCellFound(
        "Unable to find orthorhombic supercell".to_string(),
    ))
}

/// 按整数变换矩阵构造超胞，新晶格为 T·L，位点按原子优先顺序排列
pub fn make_supercell(structure: &Structure, transform: &[[i64; 3]; 3]) -> Result<Structure> {
    let lattice = structure.require_lattice()?;
    let t = to_mat(transform);
    let det = math::det(&t).round() as i64;
    if det == 0 {
        return Err(DdpcError::InvalidArgument(format!(
            "Supercell matrix {:?} is singular",
            transform
        )));
    }
    let inv_t = math::inverse(&t).ok_or_else(|| {
        DdpcError::InvalidArgument(format!("Supercell matrix {:?} is singular", transform))
    })?;
    let new_lattice = Lattice::from_vectors(math::mat_mul(&t, &lattice.matrix));

    let (low, high) = translation_bounds(transform);
    let positions = structure.fractional_positions()?;
    let n_cells = det.unsigned_abs() as usize;

    let mut sites: Vec<Site> = Vec::with_capacity(structure.len() * n_cells);
    let mut sources: Vec<usize> = Vec::with_capacity(structure.len() * n_cells);
    for (i, pos) in positions.iter().enumerate() {
        let base = pos.map(math::wrap_unit);
        for nx in low[0]..=high[0] {
            for ny in low[1]..=high[1] {
                for nz in low[2]..=high[2] {
                    let shifted = math::add(base, [nx as f64, ny as f64, nz as f64]);
                    let g = math::row_mul(shifted, &inv_t);
                    if g.iter().all(|&x| x >= -CELL_EPS && x < 1.0 - CELL_EPS) {
                        let mut site = structure.sites[i].clone();
                        site.position = g.map(math::wrap_unit);
                        sites.push(site);
                        sources.push(i);
                    }
                }
            }
        }
    }

    let expected = structure.len() * n_cells;
    if sites.len() != expected {
        return Err(DdpcError::InvalidStructure(format!(
            "Supercell has {} sites; expected {}",
            sites.len(),
            expected
        )));
    }

    let mut supercell = Structure::new(
        structure.name.clone(),
        new_lattice,
        sites,
        CoordinateMode::Fractional,
    );
    supercell.metadata = structure.metadata.select(&sources);
    supercell.metadata.lattice_fixed = None;
    supercell.pbc = structure.pbc;
    supercell.source_format = structure.source_format.clone();

    Ok(supercell)
}

fn evaluate(structure: &Structure, lattice: &Lattice, inv: &Mat3, target: [f64; 3]) -> Candidate {
    let mut target_matrix = [[0.0; 3]; 3];
    for i in 0..3 {
        target_matrix[i][i] = target[i];
    }
    let transform = round_nonsingular(&math::mat_mul(&target_matrix, inv));
    let proposed = math::mat_mul(&to_mat(&transform), &lattice.matrix);
    let n_cells = math::det(&to_mat(&transform)).round().abs() as usize;

    Candidate {
        transform,
        lengths: inscribed_lengths(&proposed),
        lattice: Lattice::from_vectors(proposed),
        n_atoms: structure.len() * n_cells,
    }
}

fn satisfies(candidate: &Candidate, config: &OrthogonalConfig) -> bool {
    let min = candidate.lengths.iter().cloned().fold(f64::INFINITY, f64::min);
    let atoms_ok = config.min_atoms.map_or(true, |m| candidate.n_atoms >= m)
        && config.max_atoms.map_or(true, |m| candidate.n_atoms <= m);
    let angles_ok = !config.force_90_degrees
        || candidate
            .lattice
            .angles()
            .iter()
            .all(|a| (a - 90.0).abs() < config.angle_tolerance);

    min >= config.min_length && atoms_ok && angles_ok
}

fn check_exceptions(candidate: &Candidate, config: &OrthogonalConfig) -> Result<()> {
    if let Some(max_atoms) = config.max_atoms {
        if candidate.n_atoms > max_atoms {
            return Err(DdpcError::NoOrthogonalCellFound(format!(
                "Candidate supercell has {} atoms, above the limit of {}",
                candidate.n_atoms, max_atoms
            )));
        }
    }
    if let Some(max_length) = config.max_length {
        let max = candidate.lengths.iter().cloned().fold(0.0, f64::max);
        if max >= max_length {
            return Err(DdpcError::NoOrthogonalCellFound(format!(
                "Candidate supercell reaches {:.3} Å, above the limit of {} Å",
                max, max_length
            )));
        }
    }
    Ok(())
}

/// b 在 a 上的投影
fn proj(b: Vec3, a: Vec3) -> Vec3 {
    let aa = math::dot(a, a);
    if aa < 1e-12 {
        return [0.0; 3];
    }
    math::scale(a, math::dot(b, a) / aa)
}

/// 三个晶面内各两个垂直分量的长度
fn inscribed_lengths(m: &Mat3) -> [f64; 6] {
    let [a, b, c] = *m;
    [
        math::sub(c, proj(c, a)),
        math::sub(a, proj(a, c)),
        math::sub(b, proj(b, a)),
        math::sub(a, proj(a, b)),
        math::sub(b, proj(b, c)),
        math::sub(c, proj(c, b)),
    ]
    .map(math::norm)
}

fn round_away_from_zero(x: f64) -> i64 {
    if x == 0.0 {
        0
    } else {
        (x.abs().ceil() * x.signum()) as i64
    }
}

/// 就近取整（银行家舍入），并把全零的行、列中绝对值最大的元素向远离零的方向取整
fn round_nonsingular(m: &Mat3) -> [[i64; 3]; 3] {
    let mut out = [[0i64; 3]; 3];
    for i in 0..3 {
        for j in 0..3 {
            out[i][j] = m[i][j].round_ties_even() as i64;
        }
    }

    for i in 0..3 {
        if out[i].iter().all(|&x| x == 0) {
            let max = m[i].iter().fold(0.0f64, |acc, x| acc.max(x.abs()));
            if let Some(j) = (0..3).find(|&j| m[i][j].abs() == max) {
                out[i][j] = round_away_from_zero(m[i][j]);
            }
        }
    }

    for j in 0..3 {
        if (0..3).all(|i| out[i][j] == 0) {
            let max = (0..3).fold(0.0f64, |acc, i| acc.max(m[i][j].abs()));
            for i in 0..3 {
                if m[i][j].abs() == max {
                    out[i][j] = round_away_from_zero(m[i][j]);
                }
            }
        }
    }
    out
}

fn to_mat(t: &[[i64; 3]; 3]) -> Mat3 {
    t.map(|row| row.map(|x| x as f64))
}

/// 覆盖新晶胞所需的原晶胞平移范围（由 T 各行子集和的包围盒给出）
fn translation_bounds(t: &[[i64; 3]; 3]) -> ([i64; 3], [i64; 3]) {
    let mut low = [0i64; 3];
    let mut high = [0i64; 3];
    for mask in 0..8u8 {
        let mut corner = [0i64; 3];
        for (r, row) in t.iter().enumerate() {
            if mask & (1 << r) != 0 {
                for k in 0..3 {
                    corner[k] += row[k];
                }
            }
        }
        for k in 0..3 {
            low[k] = low[k].min(corner[k]);
            high[k] = high[k].max(corner[k]);
        }
    }
    (low.map(|x| x - 1), high)
}

/// 半开区间 [start, stop) 上的等距取样
fn arange(start: f64, stop: f64, step: f64) -> Vec<f64> {
    let n = ((stop - start) / step).ceil().max(0.0) as usize;
    (0..n).map(|i| start + i as f64 * step).collect()
}

#[cfg(test)]
mod tests {
    use super::super::fixtures;
    use super::*;
    use crate::models::MagneticMoments;

    fn simple_cubic(a: f64) -> Structure {
        Structure::new(
            "Po",
            fixtures::cubic(a),
            vec![Site::new("Po", [0.0, 0.0, 0.0])],
            CoordinateMode::Fractional,
        )
    }

    fn fcc_primitive() -> Structure {
        let lattice =
            Lattice::from_vectors([[0.0, 2.0, 2.0], [2.0, 0.0, 2.0], [2.0, 2.0, 0.0]]);
        Structure::new(
            "Cu",
            lattice,
            vec![Site::new("Cu", [0.0, 0.0, 0.0])],
            CoordinateMode::Fractional,
        )
    }

    #[test]
    fn test_round_nonsingular_rows() {
        let m = [[0.4, 0.3, 0.0], [0.0, 1.2, 0.0], [0.0, 0.0, 2.5]];
        assert_eq!(round_nonsingular(&m), [[1, 0, 0], [0, 1, 0], [0, 0, 2]]);
    }

    #[test]
    fn test_round_nonsingular_columns() {
        let m = [[1.0, 0.4, 0.0], [0.0, -0.4, 1.0], [1.0, 0.0, 1.0]];
        assert_eq!(round_nonsingular(&m), [[1, 1, 0], [0, -1, 1], [1, 0, 1]]);
    }

    #[test]
    fn test_round_nonsingular_row_tie_takes_first() {
        let m = [[0.3, -0.3, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
        assert_eq!(round_nonsingular(&m)[0], [1, 0, 0]);
    }

    #[test]
    fn test_inscribed_lengths_orthogonal() {
        let lengths = inscribed_lengths(&[[3.0, 0.0, 0.0], [0.0, 4.0, 0.0], [0.0, 0.0, 5.0]]);
        assert_eq!(lengths, [5.0, 3.0, 4.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_simple_cubic_supercell() {
        let result = find_orthogonal(&simple_cubic(5.0), &OrthogonalConfig::default()).unwrap();
        assert_eq!(result.len(), 27);
        for l in result.lattice.unwrap().lengths() {
            assert!((l - 15.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_fcc_primitive_to_cube() {
        let config = OrthogonalConfig {
            min_length: 8.0,
            ..Default::default()
        };
        let result = find_orthogonal(&fcc_primitive(), &config).unwrap();
        assert_eq!(result.len(), 32);

        let lattice = result.lattice.unwrap();
        assert!(lattice.is_orthogonal(1e-6));
        for l in lattice.lengths() {
            assert!((l - 8.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_force_diagonal() {
        let config = OrthogonalConfig {
            min_length: 12.0,
            force_diagonal: true,
            ..Default::default()
        };
        let result = find_orthogonal(&simple_cubic(5.0), &config).unwrap();
        assert_eq!(result.len(), 27);
    }

    #[test]
    fn test_max_atoms_exceeded() {
        let config = OrthogonalConfig {
            max_atoms: Some(10),
            ..Default::default()
        };
        assert!(matches!(
            find_orthogonal(&simple_cubic(5.0), &config),
            Err(DdpcError::NoOrthogonalCellFound(_))
        ));
    }

    #[test]
    fn test_max_length_exceeded() {
        let config = OrthogonalConfig {
            min_length: 16.0,
            max_length: Some(12.0),
            ..Default::default()
        };
        assert!(matches!(
            find_orthogonal(&simple_cubic(5.0), &config),
            Err(DdpcError::NoOrthogonalCellFound(_))
        ));
    }

    #[test]
    fn test_orthorhombic_requires_max_length() {
        let config = OrthogonalConfig {
            allow_orthorhombic: true,
            ..Default::default()
        };
        assert!(matches!(
            find_orthogonal(&simple_cubic(5.0), &config),
            Err(DdpcError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_orthorhombic_search() {
        let structure = Structure::new(
            "X",
            Lattice::from_parameters(3.0, 4.0, 5.0, 90.0, 90.0, 90.0),
            vec![Site::new("X", [0.0, 0.0, 0.0])],
            CoordinateMode::Fractional,
        );
        let config = OrthogonalConfig {
            min_length: 10.0,
            max_length: Some(13.0),
            allow_orthorhombic: true,
            step_size: 1.0,
            ..Default::default()
        };
        let result = find_orthogonal(&structure, &config).unwrap();
        let lengths = result.lattice.as_ref().unwrap().lengths();
        assert!((lengths[0] - 12.0).abs() < 1e-9);
        assert!((lengths[1] - 12.0).abs() < 1e-9);
        assert!((lengths[2] - 10.0).abs() < 1e-9);
        assert_eq!(result.len(), 24);
    }

    #[test]
    fn test_requires_lattice() {
        let molecule = Structure::molecule("H", vec![Site::new("H", [0.0; 3])]);
        assert!(find_orthogonal(&molecule, &OrthogonalConfig::default()).is_err());
    }

    #[test]
    fn test_make_supercell_replicates_metadata() {
        let mut structure = fixtures::bcc_fe();
        structure.metadata.fixed = Some(vec![[true; 3], [false; 3]]);
        structure.metadata.magmoms = Some(MagneticMoments::Collinear(vec![2.0, -2.0]));
        structure.metadata.lattice_fixed = Some([[true; 3]; 3]);

        let supercell = make_supercell(&structure, &[[2, 0, 0], [0, 1, 0], [0, 0, 1]]).unwrap();
        assert_eq!(supercell.len(), 4);

        // 原子优先：前两个来自第一个位点
        assert_eq!(
            supercell.metadata.fixed,
            Some(vec![[true; 3], [true; 3], [false; 3], [false; 3]])
        );
        assert_eq!(
            supercell.metadata.magmoms,
            Some(MagneticMoments::Collinear(vec![2.0, 2.0, -2.0, -2.0]))
        );
        assert_eq!(supercell.metadata.lattice_fixed, None);

        let p = supercell.sites[1].position;
        assert!((p[0] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_make_supercell_non_diagonal() {
        let supercell =
            make_supercell(&fcc_primitive(), &[[-2, 2, 2], [2, -2, 2], [2, 2, -2]]).unwrap();
        assert_eq!(supercell.len(), 32);
        assert!(supercell
            .sites
            .iter()
            .all(|s| s.position.iter().all(|&x| (0.0..1.0).contains(&x))));
    }

    #[test]
    fn test_make_supercell_singular() {
        assert!(matches!(
            make_supercell(&fixtures::bcc_fe(), &[[1, 0, 0], [1, 0, 0], [0, 0, 1]]),
            Err(DdpcError::InvalidArgument(_))
        ));
    }
}
