//! # 投影模式与权重聚合
//!
//! 把 (原子, 轨道) 粒度的投影权重按模式合并成列：
//! 同名列的权重逐点相加，列按首次出现的顺序排列。
//!
//! ## 依赖关系
//! - 被 `electronic/band.rs`、`electronic/dos.rs` 使用
//! - 使用 `models/electronic.rs`

use crate::error::{DdpcError, Result};
use crate::models::ProjectionSet;

/// 投影模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionMode {
    /// 只输出总量
    Total,
    /// 按元素：`Fe`
    Element,
    /// 元素 + 轨道类别：`Fe-d`
    ElementSpdf,
    /// 元素 + 轨道：`Fe-dxy`
    ElementOrbital,
    /// 原子 + 轨道类别：`1d`
    AtomSpdf,
    /// 原子 + 轨道：`1dxy`
    AtomOrbital,
    /// 原子 + t2g/eg：`1t2g`、`1eg`
    AtomT2gEg,
    /// 按原子：`1`
    Atom,
}

impl ProjectionMode {
    pub const ALL: [ProjectionMode; 8] = [
        ProjectionMode::Total,
        ProjectionMode::Element,
        ProjectionMode::ElementSpdf,
        ProjectionMode::ElementOrbital,
        ProjectionMode::AtomSpdf,
        ProjectionMode::AtomOrbital,
        ProjectionMode::AtomT2gEg,
        ProjectionMode::Atom,
    ];

    pub fn code(&self) -> i64 {
        match self {
            ProjectionMode::Total => 0,
            ProjectionMode::Element => 1,
            ProjectionMode::ElementSpdf => 2,
            ProjectionMode::ElementOrbital => 3,
            ProjectionMode::AtomSpdf => 4,
            ProjectionMode::AtomOrbital => 5,
            ProjectionMode::AtomT2gEg => 6,
            ProjectionMode::Atom => 7,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ProjectionMode::Total => "total",
            ProjectionMode::Element => "element",
            ProjectionMode::ElementSpdf => "element + spdf",
            ProjectionMode::ElementOrbital => "element + orbital",
            ProjectionMode::AtomSpdf => "atom + spdf",
            ProjectionMode::AtomOrbital => "atom + orbital",
            ProjectionMode::AtomT2gEg => "atom + t2g/eg",
            ProjectionMode::Atom => "atom",
        }
    }

    fn needs_elements(&self) -> bool {
        matches!(
            self,
            ProjectionMode::Element | ProjectionMode::ElementSpdf | ProjectionMode::ElementOrbital
        )
    }

    /// 计算某个 (原子, 轨道) 所属的列名；返回 None 表示该轨道不参与此模式
    fn column_key(&self, atom: usize, orbital: &str, element: Option<&str>) -> Option<String> {
        let element = element.unwrap_or("");
        let class: String = orbital.chars().take(1).collect();

        match self {
            ProjectionMode::Total => None,
            ProjectionMode::Element => Some(element.to_string()),
            ProjectionMode::ElementSpdf => Some(format!("{}-{}", element, class)),
            ProjectionMode::ElementOrbital => Some(format!("{}-{}", element, orbital)),
            ProjectionMode::AtomSpdf => Some(format!("{}{}", atom, class)),
            ProjectionMode::AtomOrbital => Some(format!("{}{}", atom, orbital)),
            ProjectionMode::AtomT2gEg => match orbital {
                "dxy" | "dxz" | "dyz" => Some(format!("{}t2g", atom)),
                "dz2" | "dx2y2" | "dx2-y2" => Some(format!("{}eg", atom)),
                _ => None,
            },
            ProjectionMode::Atom => Some(atom.to_string()),
        }
    }
}

impl TryFrom<i64> for ProjectionMode {
    type Error = DdpcError;

    fn try_from(value: i64) -> Result<Self> {
        ProjectionMode::ALL
            .into_iter()
            .find(|m| m.code() == value)
            .ok_or(DdpcError::InvalidProjectionMode(value))
    }
}

impl std::fmt::Display for ProjectionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code(), self.description())
    }
}

/// 聚合后的一列：每个自旋通道各一组权重
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ProjectedColumn {
    pub name: String,
    pub channels: Vec<Vec<f64>>,
}

/// 按模式聚合投影权重
pub(crate) fn aggregate(
    set: &ProjectionSet,
    mode: ProjectionMode,
    n_values: usize,
    source: &str,
) -> Result<Vec<ProjectedColumn>> {
    if mode == ProjectionMode::Total {
        return Ok(Vec::new());
    }
    if mode.needs_elements() && set.elements.is_empty() {
        return Err(DdpcError::ParseError {
            format: "electronic".to_string(),
            path: source.to_string(),
            reason: format!("Mode {} needs the element list of the container", mode.code()),
        });
    }

    let n_channels = set.channels.len();
    let mut columns: Vec<ProjectedColumn> = Vec::new();

    for (channel, entries) in set.channels.iter().enumerate() {
        for entry in entries {
            let orbital = set.orbitals.get(entry.orbital).map(String::as_str).unwrap_or("");
            let element = if mode.needs_elements() {
                let element = set.elements.get(entry.atom.wrapping_sub(1)).ok_or_else(|| {
                    DdpcError::ParseError {
                        format: "electronic".to_string(),
                        path: source.to_string(),
                        reason: format!("Atom index {} has no element", entry.atom),
                    }
                })?;
                Some(element.as_str())
            } else {
                None
            };

            let Some(key) = mode.column_key(entry.atom, orbital, element) else {
                continue;
            };

            let index = match columns.iter().position(|c| c.name == key) {
                Some(i) => i,
                None => {
                    columns.push(ProjectedColumn {
                        name: key,
                        channels: vec![vec![0.0; n_values]; n_channels],
                    });
                    columns.len() - 1
                }
            };

            let target = &mut columns[index].channels[channel];
            for (acc, w) in target.iter_mut().zip(&entry.weights) {
                *acc += w;
            }
        }
    }

    log::debug!(
        "Mode {} produced {} projection columns",
        mode.code(),
        columns.len()
    );
    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OrbitalWeights;

    fn orbitals() -> Vec<String> {
        ["s", "py", "pz", "px", "dxy", "dyz", "dz2", "dxz", "dx2y2"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn weights(atom: usize, orbital: usize, value: f64) -> OrbitalWeights {
        OrbitalWeights {
            atom,
            orbital,
            weights: vec![value; 2],
        }
    }

    fn sample() -> ProjectionSet {
        ProjectionSet {
            orbitals: orbitals(),
            elements: vec!["Fe".to_string(), "Fe".to_string(), "O".to_string()],
            channels: vec![vec![
                weights(1, 0, 0.1),
                weights(1, 4, 0.2),
                weights(1, 6, 0.3),
                weights(2, 4, 0.4),
                weights(3, 1, 0.5),
                weights(3, 3, 0.6),
            ]],
        }
    }

    fn names(columns: &[ProjectedColumn]) -> Vec<&str> {
        columns.iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn test_mode_from_integer() {
        assert_eq!(ProjectionMode::try_from(5).unwrap(), ProjectionMode::AtomOrbital);
        assert_eq!(ProjectionMode::try_from(0).unwrap(), ProjectionMode::Total);
        assert!(matches!(
            ProjectionMode::try_from(8),
            Err(DdpcError::InvalidProjectionMode(8))
        ));
        assert!(ProjectionMode::try_from(-1).is_err());
    }

    #[test]
    fn test_element_mode_sums_same_element() {
        let columns = aggregate(&sample(), ProjectionMode::Element, 2, "x").unwrap();
        assert_eq!(names(&columns), vec!["Fe", "O"]);
        assert!((columns[0].channels[0][0] - 1.0).abs() < 1e-12);
        assert!((columns[1].channels[0][1] - 1.1).abs() < 1e-12);
    }

    #[test]
    fn test_spdf_modes() {
        let columns = aggregate(&sample(), ProjectionMode::ElementSpdf, 2, "x").unwrap();
        assert_eq!(names(&columns), vec!["Fe-s", "Fe-d", "O-p"]);

        let columns = aggregate(&sample(), ProjectionMode::AtomSpdf, 2, "x").unwrap();
        assert_eq!(names(&columns), vec!["1s", "1d", "2d", "3p"]);
        assert!((columns[1].channels[0][0] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_orbital_modes() {
        let columns = aggregate(&sample(), ProjectionMode::AtomOrbital, 2, "x").unwrap();
        assert_eq!(
            names(&columns),
            vec!["1s", "1dxy", "1dz2", "2dxy", "3py", "3px"]
        );

        let columns = aggregate(&sample(), ProjectionMode::ElementOrbital, 2, "x").unwrap();
        assert_eq!(names(&columns), vec!["Fe-s", "Fe-dxy", "Fe-dz2", "O-py", "O-px"]);
        assert!((columns[1].channels[0][0] - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_t2g_eg_skips_other_orbitals() {
        let columns = aggregate(&sample(), ProjectionMode::AtomT2gEg, 2, "x").unwrap();
        assert_eq!(names(&columns), vec!["1t2g", "1eg", "2t2g"]);
    }

    #[test]
    fn test_atom_mode() {
        let columns = aggregate(&sample(), ProjectionMode::Atom, 2, "x").unwrap();
        assert_eq!(names(&columns), vec!["1", "2", "3"]);
        assert!((columns[0].channels[0][0] - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_element_mode_needs_elements() {
        let mut set = sample();
        set.elements.clear();
        assert!(matches!(
            aggregate(&set, ProjectionMode::Element, 2, "x"),
            Err(DdpcError::ParseError { .. })
        ));
        // 原子模式不需要元素表
        assert!(aggregate(&set, ProjectionMode::Atom, 2, "x").is_ok());
    }

    #[test]
    fn test_keys_missing_in_one_channel_are_zero() {
        let set = ProjectionSet {
            orbitals: orbitals(),
            elements: Vec::new(),
            channels: vec![vec![weights(1, 0, 1.0)], vec![weights(2, 0, 2.0)]],
        };
        let columns = aggregate(&set, ProjectionMode::AtomOrbital, 2, "x").unwrap();
        assert_eq!(names(&columns), vec!["1s", "2s"]);
        assert_eq!(columns[0].channels[1], vec![0.0, 0.0]);
        assert_eq!(columns[1].channels[0], vec![0.0, 0.0]);
        assert_eq!(columns[1].channels[1], vec![2.0, 2.0]);
    }
}
