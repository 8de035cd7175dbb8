//! # 晶体结构数据模型
//!
//! 定义统一的晶体结构表示，可以从不同格式解析并转换为不同格式。
//! 坐标类型（分数/笛卡尔）显式记录在结构上，按需转换，绝不根据数值大小推断。
//! 约束与磁矩保存在附属的 `SiteMetadata` 中，以便在支持它们的格式之间往返。
//!
//! ## 依赖关系
//! - 被 `parsers/` 和 `transform/` 使用
//! - 使用 `utils/math.rs`

use crate::error::{DdpcError, Result};
use crate::utils::math::{self, Mat3, Vec3};
use serde::{Deserialize, Serialize};

/// 晶格参数表示
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lattice {
    /// 晶格向量矩阵 (3x3)，行向量表示 a, b, c
    /// [[a1, a2, a3], [b1, b2, b3], [c1, c2, c3]]
    pub matrix: Mat3,
}

impl Lattice {
    /// 从晶格参数 (a, b, c, alpha, beta, gamma) 创建晶格
    /// 角度单位：度
    pub fn from_parameters(a: f64, b: f64, c: f64, alpha: f64, beta: f64, gamma: f64) -> Self {
        let cos_alpha = alpha.to_radians().cos();
        let cos_beta = beta.to_radians().cos();
        let cos_gamma = gamma.to_radians().cos();
        let sin_gamma = gamma.to_radians().sin();

        let a_vec = [a, 0.0, 0.0];
        let b_vec = [b * cos_gamma, b * sin_gamma, 0.0];

        let c1 = c * cos_beta;
        let c2 = c * (cos_alpha - cos_beta * cos_gamma) / sin_gamma;
        let c3 = (c * c - c1 * c1 - c2 * c2).sqrt();

        Lattice {
            matrix: [a_vec, b_vec, [c1, c2, c3]],
        }
    }

    /// 从晶格向量矩阵创建
    pub fn from_vectors(matrix: Mat3) -> Self {
        Lattice { matrix }
    }

    /// 晶格向量长度 (a, b, c)
    pub fn lengths(&self) -> [f64; 3] {
        [
            math::norm(self.matrix[0]),
            math::norm(self.matrix[1]),
            math::norm(self.matrix[2]),
        ]
    }

    /// 晶格夹角 (alpha, beta, gamma)，单位：度
    pub fn angles(&self) -> [f64; 3] {
        let [a, b, c] = self.lengths();
        let [a_vec, b_vec, c_vec] = self.matrix;
        let angle = |x: Vec3, y: Vec3, lx: f64, ly: f64| {
            (math::dot(x, y) / (lx * ly)).clamp(-1.0, 1.0).acos().to_degrees()
        };

        [
            angle(b_vec, c_vec, b, c),
            angle(a_vec, c_vec, a, c),
            angle(a_vec, b_vec, a, b),
        ]
    }

    /// 获取晶格参数 (a, b, c, alpha, beta, gamma)
    pub fn parameters(&self) -> (f64, f64, f64, f64, f64, f64) {
        let [a, b, c] = self.lengths();
        let [alpha, beta, gamma] = self.angles();
        (a, b, c, alpha, beta, gamma)
    }

    /// 计算晶格体积（带符号，左手系为负）
    pub fn volume(&self) -> f64 {
        math::det(&self.matrix)
    }

    /// 晶格矩阵的逆，奇异时返回 None
    pub fn inverse(&self) -> Option<Mat3> {
        math::inverse(&self.matrix)
    }

    /// 分数坐标转笛卡尔坐标
    pub fn frac_to_cart(&self, frac: Vec3) -> Vec3 {
        math::row_mul(frac, &self.matrix)
    }

    /// 笛卡尔坐标转分数坐标
    pub fn cart_to_frac(&self, cart: Vec3) -> Result<Vec3> {
        let inv = self.inverse().ok_or_else(|| {
            DdpcError::InvalidStructure("Lattice matrix is singular".to_string())
        })?;
        Ok(math::row_mul(cart, &inv))
    }

    /// 判断三个夹角是否都在 90° ± tol 范围内
    pub fn is_orthogonal(&self, angle_tolerance: f64) -> bool {
        self.angles()
            .iter()
            .all(|angle| (angle - 90.0).abs() < angle_tolerance)
    }
}

/// 坐标类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoordinateMode {
    /// 分数坐标 (Direct)
    Fractional,
    /// 笛卡尔坐标 (Å)
    Cartesian,
}

impl std::fmt::Display for CoordinateMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CoordinateMode::Fractional => write!(f, "fractional"),
            CoordinateMode::Cartesian => write!(f, "cartesian"),
        }
    }
}

/// 原子位点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    /// 元素符号
    pub species: String,

    /// 坐标，类型由所在结构的 `coordinates` 决定
    pub position: Vec3,

    /// 可选：原子标签（用于区分同种元素的不同位置）
    pub label: Option<String>,
}

impl Site {
    pub fn new(species: impl Into<String>, position: Vec3) -> Self {
        Site {
            species: species.into(),
            position,
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// 初始磁矩
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MagneticMoments {
    /// 共线磁矩（每个位点一个标量）
    Collinear(Vec<f64>),
    /// 非共线磁矩（每个位点一个三维向量）
    Noncollinear(Vec<Vec3>),
}

impl MagneticMoments {
    pub fn len(&self) -> usize {
        match self {
            MagneticMoments::Collinear(m) => m.len(),
            MagneticMoments::Noncollinear(m) => m.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 是否存在非零磁矩
    pub fn any_nonzero(&self) -> bool {
        match self {
            MagneticMoments::Collinear(m) => m.iter().any(|v| *v != 0.0),
            MagneticMoments::Noncollinear(m) => m.iter().flatten().any(|v| *v != 0.0),
        }
    }

    /// 按索引选取位点，生成新的磁矩序列
    pub fn select(&self, indices: &[usize]) -> Self {
        match self {
            MagneticMoments::Collinear(m) => {
                MagneticMoments::Collinear(indices.iter().map(|&i| m[i]).collect())
            }
            MagneticMoments::Noncollinear(m) => {
                MagneticMoments::Noncollinear(indices.iter().map(|&i| m[i]).collect())
            }
        }
    }

    /// 两个位点的磁矩是否相同（容差内）
    pub fn same_at(&self, i: usize, j: usize, tol: f64) -> bool {
        match self {
            MagneticMoments::Collinear(m) => (m[i] - m[j]).abs() < tol,
            MagneticMoments::Noncollinear(m) => math::norm(math::sub(m[i], m[j])) < tol,
        }
    }
}

/// 位点附属信息：约束与磁矩
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteMetadata {
    /// 每个位点 x/y/z 是否固定（true = 固定）
    pub fixed: Option<Vec<[bool; 3]>>,

    /// 初始磁矩
    pub magmoms: Option<MagneticMoments>,

    /// 晶格向量分量是否固定（DS-PAW 特有）
    pub lattice_fixed: Option<[[bool; 3]; 3]>,
}

impl SiteMetadata {
    /// 按索引选取位点（用于超胞/原胞重排）
    pub fn select(&self, indices: &[usize]) -> Self {
        SiteMetadata {
            fixed: self
                .fixed
                .as_ref()
                .map(|f| indices.iter().map(|&i| f[i]).collect()),
            magmoms: self.magmoms.as_ref().map(|m| m.select(indices)),
            lattice_fixed: self.lattice_fixed,
        }
    }

    /// 是否存在任何约束
    pub fn has_constraints(&self) -> bool {
        self.fixed
            .as_ref()
            .is_some_and(|f| f.iter().flatten().any(|x| *x))
    }

    /// 是否存在非零磁矩
    pub fn has_magmoms(&self) -> bool {
        self.magmoms.as_ref().is_some_and(|m| m.any_nonzero())
    }
}

/// 晶体结构
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Structure {
    /// 结构名称 / 注释行
    pub name: String,

    /// 晶格（非周期体系可以没有）
    pub lattice: Option<Lattice>,

    /// 位点列表
    pub sites: Vec<Site>,

    /// 位点坐标类型
    pub coordinates: CoordinateMode,

    /// 周期性边界条件
    pub pbc: [bool; 3],

    /// 约束与磁矩
    pub metadata: SiteMetadata,

    /// 来源文件格式
    pub source_format: Option<String>,
}

impl Structure {
    /// 创建周期性结构
    pub fn new(
        name: impl Into<String>,
        lattice: Lattice,
        sites: Vec<Site>,
        coordinates: CoordinateMode,
    ) -> Self {
        Structure {
            name: name.into(),
            lattice: Some(lattice),
            sites,
            coordinates,
            pbc: [true; 3],
            metadata: SiteMetadata::default(),
            source_format: None,
        }
    }

    /// 创建无晶格的分子/团簇结构（笛卡尔坐标）
    pub fn molecule(name: impl Into<String>, sites: Vec<Site>) -> Self {
        Structure {
            name: name.into(),
            lattice: None,
            sites,
            coordinates: CoordinateMode::Cartesian,
            pbc: [false; 3],
            metadata: SiteMetadata::default(),
            source_format: None,
        }
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    pub fn is_periodic(&self) -> bool {
        self.pbc.iter().any(|p| *p)
    }

    /// 检查结构不变量
    pub fn validate(&self) -> Result<()> {
        let n = self.sites.len();

        if let Some(fixed) = &self.metadata.fixed {
            if fixed.len() != n {
                return Err(DdpcError::InvalidStructure(format!(
                    "{} constraint entries for {} sites",
                    fixed.len(),
                    n
                )));
            }
        }
        if let Some(magmoms) = &self.metadata.magmoms {
            if magmoms.len() != n {
                return Err(DdpcError::InvalidStructure(format!(
                    "{} magnetic moments for {} sites",
                    magmoms.len(),
                    n
                )));
            }
        }

        if self.is_periodic() {
            match &self.lattice {
                None => {
                    return Err(DdpcError::InvalidStructure(
                        "Periodic structure has no lattice".to_string(),
                    ))
                }
                Some(lattice) if lattice.volume().abs() < 1e-8 => {
                    return Err(DdpcError::InvalidStructure(
                        "Lattice has zero volume".to_string(),
                    ))
                }
                _ => {}
            }
        }

        if self.coordinates == CoordinateMode::Fractional && self.lattice.is_none() {
            return Err(DdpcError::InvalidStructure(
                "Fractional coordinates without a lattice".to_string(),
            ));
        }

        Ok(())
    }

    /// 取得晶格，缺失时报错
    pub fn require_lattice(&self) -> Result<&Lattice> {
        self.lattice.as_ref().ok_or_else(|| {
            DdpcError::InvalidStructure("Input structure has no cell information".to_string())
        })
    }

    /// 所有位点的分数坐标
    pub fn fractional_positions(&self) -> Result<Vec<Vec3>> {
        match self.coordinates {
            CoordinateMode::Fractional => Ok(self.sites.iter().map(|s| s.position).collect()),
            CoordinateMode::Cartesian => {
                let lattice = self.require_lattice()?;
                self.sites
                    .iter()
                    .map(|s| lattice.cart_to_frac(s.position))
                    .collect()
            }
        }
    }

    /// 所有位点的笛卡尔坐标
    pub fn cartesian_positions(&self) -> Result<Vec<Vec3>> {
        match self.coordinates {
            CoordinateMode::Cartesian => Ok(self.sites.iter().map(|s| s.position).collect()),
            CoordinateMode::Fractional => {
                let lattice = self.require_lattice()?;
                Ok(self
                    .sites
                    .iter()
                    .map(|s| lattice.frac_to_cart(s.position))
                    .collect())
            }
        }
    }

    /// 转换为分数坐标表示
    pub fn with_fractional(&self) -> Result<Structure> {
        let positions = self.fractional_positions()?;
        Ok(self.with_positions(positions, CoordinateMode::Fractional))
    }

    /// 转换为笛卡尔坐标表示
    pub fn with_cartesian(&self) -> Result<Structure> {
        let positions = self.cartesian_positions()?;
        Ok(self.with_positions(positions, CoordinateMode::Cartesian))
    }

    fn with_positions(&self, positions: Vec<Vec3>, coordinates: CoordinateMode) -> Structure {
        let mut out = self.clone();
        for (site, pos) in out.sites.iter_mut().zip(positions) {
            site.position = pos;
        }
        out.coordinates = coordinates;
        out
    }

    /// 元素按首次出现顺序排列
    pub fn species_order(&self) -> Vec<String> {
        let mut order: Vec<String> = Vec::new();
        for site in &self.sites {
            if !order.contains(&site.species) {
                order.push(site.species.clone());
            }
        }
        order
    }

    /// 计算化学式
    pub fn formula(&self) -> String {
        use std::collections::BTreeMap;
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();

        for site in &self.sites {
            *counts.entry(site.species.as_str()).or_insert(0) += 1;
        }

        counts
            .into_iter()
            .map(|(el, count)| {
                if count == 1 {
                    el.to_string()
                } else {
                    format!("{}{}", el, count)
                }
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// 晶胞体积 (Å³)
    pub fn volume(&self) -> Option<f64> {
        self.lattice.as_ref().map(|l| l.volume().abs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cubic(a: f64) -> Lattice {
        Lattice::from_vectors([[a, 0.0, 0.0], [0.0, a, 0.0], [0.0, 0.0, a]])
    }

    #[test]
    fn test_lattice_from_parameters_cubic() {
        let lattice = Lattice::from_parameters(5.0, 5.0, 5.0, 90.0, 90.0, 90.0);
        let (a, b, c, alpha, beta, gamma) = lattice.parameters();

        assert!((a - 5.0).abs() < 1e-6);
        assert!((b - 5.0).abs() < 1e-6);
        assert!((c - 5.0).abs() < 1e-6);
        assert!((alpha - 90.0).abs() < 1e-6);
        assert!((beta - 90.0).abs() < 1e-6);
        assert!((gamma - 90.0).abs() < 1e-6);
    }

    #[test]
    fn test_lattice_volume_cubic() {
        let lattice = Lattice::from_parameters(5.0, 5.0, 5.0, 90.0, 90.0, 90.0);
        assert!((lattice.volume().abs() - 125.0).abs() < 1e-6);
    }

    #[test]
    fn test_lattice_hexagonal() {
        let lattice = Lattice::from_parameters(3.0, 3.0, 5.0, 90.0, 90.0, 120.0);
        let (a, b, c, _, _, gamma) = lattice.parameters();

        assert!((a - 3.0).abs() < 0.01);
        assert!((b - 3.0).abs() < 0.01);
        assert!((c - 5.0).abs() < 0.01);
        assert!((gamma - 120.0).abs() < 0.01);
        assert!(!lattice.is_orthogonal(1e-3));
    }

    #[test]
    fn test_frac_cart_round_trip() {
        let lattice = Lattice::from_parameters(3.0, 4.0, 5.0, 80.0, 95.0, 110.0);
        let frac = [0.1, 0.7, 0.35];
        let cart = lattice.frac_to_cart(frac);
        let back = lattice.cart_to_frac(cart).unwrap();
        for i in 0..3 {
            assert!((back[i] - frac[i]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_coordinate_mode_is_tracked() {
        let sites = vec![Site::new("Na", [0.0, 0.0, 0.0]), Site::new("Cl", [2.0, 2.0, 2.0])];
        let structure = Structure::new("NaCl", cubic(4.0), sites, CoordinateMode::Cartesian);

        let frac = structure.with_fractional().unwrap();
        assert_eq!(frac.coordinates, CoordinateMode::Fractional);
        assert!((frac.sites[1].position[0] - 0.5).abs() < 1e-12);

        let cart = frac.with_cartesian().unwrap();
        assert_eq!(cart.coordinates, CoordinateMode::Cartesian);
        assert!((cart.sites[1].position[2] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_validate_metadata_length() {
        let sites = vec![Site::new("Fe", [0.0, 0.0, 0.0]), Site::new("Fe", [0.5, 0.5, 0.5])];
        let mut structure = Structure::new("Fe", cubic(2.87), sites, CoordinateMode::Fractional);
        structure.metadata.magmoms = Some(MagneticMoments::Collinear(vec![2.0]));

        assert!(matches!(
            structure.validate(),
            Err(DdpcError::InvalidStructure(_))
        ));

        structure.metadata.magmoms = Some(MagneticMoments::Collinear(vec![2.0, -2.0]));
        assert!(structure.validate().is_ok());
    }

    #[test]
    fn test_validate_degenerate_lattice() {
        let lattice = Lattice::from_vectors([[1.0, 0.0, 0.0], [2.0, 0.0, 0.0], [0.0, 0.0, 1.0]]);
        let structure = Structure::new(
            "flat",
            lattice,
            vec![Site::new("H", [0.0, 0.0, 0.0])],
            CoordinateMode::Fractional,
        );
        assert!(structure.validate().is_err());
    }

    #[test]
    fn test_formula_and_species_order() {
        let sites = vec![
            Site::new("O", [0.5, 0.5, 0.0]),
            Site::new("Ti", [0.0, 0.0, 0.0]),
            Site::new("O", [0.5, 0.0, 0.5]),
        ];
        let structure = Structure::new("TiO2", cubic(4.0), sites, CoordinateMode::Fractional);

        assert_eq!(structure.formula(), "O2Ti");
        assert_eq!(structure.species_order(), vec!["O", "Ti"]);
    }

    #[test]
    fn test_molecule_needs_no_lattice() {
        let molecule = Structure::molecule("H2", vec![Site::new("H", [0.0, 0.0, 0.0])]);
        assert!(molecule.validate().is_ok());
        assert!(molecule.fractional_positions().is_err());
    }

    #[test]
    fn test_site_with_label() {
        let site = Site::new("Fe", [0.0, 0.0, 0.0]).with_label("Fe1");
        assert_eq!(site.label, Some("Fe1".to_string()));
    }
}
