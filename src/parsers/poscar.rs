//! # VASP POSCAR 格式解析器
//!
//! 解析与写出 VASP POSCAR/CONTCAR 文件格式。
//!
//! ## POSCAR 格式说明
//! ```text
//! Comment line (structure name)
//! 1.0                    # scaling factor (negative = target volume)
//! a1 a2 a3               # lattice vector a
//! b1 b2 b3               # lattice vector b
//! c1 c2 c3               # lattice vector c
//! Element1 Element2 ...  # element symbols (VASP 5+)
//! n1 n2 ...              # number of atoms per element
//! Selective dynamics     # optional, T = free
//! Direct/Cartesian       # coordinate type
//! x1 y1 z1 [T T T]       # atom positions
//! ...
//! ```
//!
//! ## 依赖关系
//! - 被 `parsers/mod.rs` 使用
//! - 使用 `models/structure.rs`

use super::{parse_error, parse_f64};
use crate::error::Result;
use crate::models::{CoordinateMode, Lattice, Site, Structure};
use crate::parsers::WriteOptions;
use crate::utils::math;

const FORMAT: &str = "poscar";

/// 从字符串内容解析 POSCAR 格式
pub fn parse_poscar_content(content: &str, default_name: &str) -> Result<Structure> {
    let lines: Vec<&str> = content.lines().collect();

    if lines.len() < 8 {
        return Err(parse_error(FORMAT, default_name, "File too short"));
    }

    // Line 0: Comment/name
    let comment = lines[0].trim();
    let name = if comment.is_empty() {
        default_name.to_string()
    } else {
        comment.to_string()
    };

    // Line 1: Scaling factor
    let scale_token = lines[1].split_whitespace().next().unwrap_or("");
    let scale = parse_f64(scale_token, FORMAT, &name)?;

    // Lines 2-4: Lattice vectors
    let mut raw = [[0.0; 3]; 3];
    for (i, row) in raw.iter_mut().enumerate() {
        let parts: Vec<&str> = lines[2 + i].split_whitespace().collect();
        if parts.len() < 3 {
            return Err(parse_error(
                FORMAT,
                &name,
                format!("Invalid lattice vector at line {}", 3 + i),
            ));
        }
        for j in 0..3 {
            row[j] = parse_f64(parts[j], FORMAT, &name)?;
        }
    }

    // 负的缩放因子表示目标体积
    let factor = if scale < 0.0 {
        let raw_volume = math::det(&raw).abs();
        if raw_volume < 1e-12 {
            return Err(parse_error(FORMAT, &name, "Lattice has zero volume"));
        }
        (scale.abs() / raw_volume).cbrt()
    } else {
        scale
    };
    let matrix = raw.map(|row| math::scale(row, factor));
    let lattice = Lattice::from_vectors(matrix);

    // Line 5: Element symbols (VASP 5+) or atom counts (VASP 4)
    let line5_parts: Vec<&str> = lines[5].split_whitespace().collect();
    if line5_parts.is_empty() {
        return Err(parse_error(FORMAT, &name, "Missing species/count line"));
    }
    let (elements, counts, mut line_idx) = if line5_parts[0].parse::<usize>().is_ok() {
        // VASP 4: 元素写在注释行，否则使用占位符
        let counts = parse_counts(&line5_parts, &name)?;
        let comment_tokens: Vec<&str> = comment.split_whitespace().collect();
        let elements: Vec<String> = if comment_tokens.len() == counts.len()
            && comment_tokens.iter().all(|t| looks_like_element(t))
        {
            comment_tokens.iter().map(|s| s.to_string()).collect()
        } else {
            (0..counts.len()).map(|i| format!("X{}", i + 1)).collect()
        };
        (elements, counts, 6)
    } else {
        let elements: Vec<String> = line5_parts
            .iter()
            .map(|s| s.split('/').next().unwrap_or(s).to_string())
            .collect();
        let count_parts: Vec<&str> = lines[6].split_whitespace().collect();
        let counts = parse_counts(&count_parts, &name)?;
        (elements, counts, 7)
    };

    if elements.len() != counts.len() {
        return Err(parse_error(
            FORMAT,
            &name,
            format!(
                "{} element symbols but {} atom counts",
                elements.len(),
                counts.len()
            ),
        ));
    }

    // Check for "Selective dynamics" line
    let selective = lines
        .get(line_idx)
        .is_some_and(|l| l.trim().to_lowercase().starts_with('s'));
    if selective {
        line_idx += 1;
    }

    // Coordinate type line
    let coord_type = lines
        .get(line_idx)
        .map(|l| l.trim().to_lowercase())
        .ok_or_else(|| parse_error(FORMAT, &name, "Missing coordinate type line"))?;
    let coordinates = if coord_type.starts_with('c') || coord_type.starts_with('k') {
        CoordinateMode::Cartesian
    } else {
        CoordinateMode::Fractional
    };
    line_idx += 1;

    // Parse atom positions
    let total: usize = counts.iter().sum();
    let mut sites: Vec<Site> = Vec::with_capacity(total);
    let mut fixed: Vec<[bool; 3]> = Vec::with_capacity(total);

    for (elem, &count) in elements.iter().zip(counts.iter()) {
        for _ in 0..count {
            let line = lines.get(line_idx).ok_or_else(|| {
                parse_error(
                    FORMAT,
                    &name,
                    format!("Expected {} atoms, found {}", total, sites.len()),
                )
            })?;
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 3 {
                return Err(parse_error(
                    FORMAT,
                    &name,
                    format!("Invalid atom line {}: '{}'", line_idx + 1, line.trim()),
                ));
            }

            let mut position = [
                parse_f64(parts[0], FORMAT, &name)?,
                parse_f64(parts[1], FORMAT, &name)?,
                parse_f64(parts[2], FORMAT, &name)?,
            ];
            if coordinates == CoordinateMode::Cartesian {
                position = math::scale(position, factor);
            }

            if selective {
                if parts.len() < 6 {
                    return Err(parse_error(
                        FORMAT,
                        &name,
                        format!("Missing selective dynamics flags at line {}", line_idx + 1),
                    ));
                }
                // T = 可移动，模型中 true = 固定
                fixed.push([
                    !parts[3].starts_with('T'),
                    !parts[4].starts_with('T'),
                    !parts[5].starts_with('T'),
                ]);
            }

            sites.push(Site::new(elem.clone(), position));
            line_idx += 1;
        }
    }

    let mut structure = Structure::new(name, lattice, sites, coordinates);
    if selective {
        structure.metadata.fixed = Some(fixed);
    }
    structure.source_format = Some(FORMAT.to_string());

    Ok(structure)
}

fn parse_counts(parts: &[&str], name: &str) -> Result<Vec<usize>> {
    parts
        .iter()
        .map(|s| {
            s.parse::<usize>()
                .map_err(|_| parse_error(FORMAT, name, format!("Invalid atom count '{}'", s)))
        })
        .collect()
}

fn looks_like_element(token: &str) -> bool {
    let mut chars = token.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_uppercase())
        && chars.all(|c| c.is_ascii_lowercase())
        && token.len() <= 3
}

/// 将结构转换为 POSCAR 格式字符串
///
/// 元素按首次出现顺序分组，约束随位点一起重排。
pub fn to_poscar_string(structure: &Structure, options: &WriteOptions) -> Result<String> {
    let lattice = structure.require_lattice()?;
    let coordinates = options.coordinates.unwrap_or(CoordinateMode::Fractional);
    let positions = match coordinates {
        CoordinateMode::Fractional => structure.fractional_positions()?,
        CoordinateMode::Cartesian => structure.cartesian_positions()?,
    };

    // 按元素分组的位点顺序
    let elem_order = structure.species_order();
    let mut order: Vec<usize> = Vec::with_capacity(structure.len());
    let mut counts: Vec<usize> = Vec::with_capacity(elem_order.len());
    for elem in &elem_order {
        let before = order.len();
        order.extend(
            structure
                .sites
                .iter()
                .enumerate()
                .filter(|(_, s)| &s.species == elem)
                .map(|(i, _)| i),
        );
        counts.push(order.len() - before);
    }

    let fixed = structure.metadata.fixed.as_ref();

    let mut result = String::new();

    // Line 0: Comment
    if options.vasp5 {
        result.push_str(&format!("{}\n", structure.name));
    } else {
        result.push_str(&format!("{}\n", elem_order.join(" ")));
    }

    // Line 1: Scale
    result.push_str("1.0\n");

    // Lines 2-4: Lattice
    for row in &lattice.matrix {
        result.push_str(&format!(
            "  {:16.10}  {:16.10}  {:16.10}\n",
            row[0], row[1], row[2]
        ));
    }

    // Line 5: Elements
    if options.vasp5 {
        result.push_str(&format!("   {}\n", elem_order.join("   ")));
    }

    // Line 6: Counts
    let counts: Vec<String> = counts.iter().map(|c| c.to_string()).collect();
    result.push_str(&format!("   {}\n", counts.join("   ")));

    if fixed.is_some() {
        result.push_str("Selective dynamics\n");
    }

    // Coordinate type
    match coordinates {
        CoordinateMode::Fractional => result.push_str("Direct\n"),
        CoordinateMode::Cartesian => result.push_str("Cartesian\n"),
    }

    // Atom positions
    let flag = |f: bool| if f { "F" } else { "T" };
    for &i in &order {
        let pos = positions[i];
        result.push_str(&format!(
            "  {:16.10}  {:16.10}  {:16.10}",
            pos[0], pos[1], pos[2]
        ));
        if let Some(fixed) = fixed {
            let f = fixed[i];
            result.push_str(&format!("  {} {} {}", flag(f[0]), flag(f[1]), flag(f[2])));
        }
        result.push('\n');
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_poscar_vasp5() {
        let content = r#"NaCl
1.0
5.64 0.0 0.0
0.0 5.64 0.0
0.0 0.0 5.64
Na Cl
4 4
Direct
0.0 0.0 0.0
0.5 0.5 0.0
0.5 0.0 0.5
0.0 0.5 0.5
0.5 0.0 0.0
0.0 0.5 0.0
0.0 0.0 0.5
0.5 0.5 0.5
"#;
        let structure = parse_poscar_content(content, "NaCl").unwrap();
        assert_eq!(structure.name, "NaCl");
        assert_eq!(structure.len(), 8);
        assert_eq!(structure.coordinates, CoordinateMode::Fractional);

        let na_count = structure.sites.iter().filter(|a| a.species == "Na").count();
        let cl_count = structure.sites.iter().filter(|a| a.species == "Cl").count();
        assert_eq!(na_count, 4);
        assert_eq!(cl_count, 4);
    }

    #[test]
    fn test_parse_poscar_with_scale() {
        let content = r#"Si
2.0
2.0 0.0 0.0
0.0 2.0 0.0
0.0 0.0 2.0
Si
2
Direct
0.0 0.0 0.0
0.5 0.5 0.5
"#;
        let structure = parse_poscar_content(content, "Si").unwrap();
        let (a, _, _, _, _, _) = structure.lattice.as_ref().unwrap().parameters();

        // 2.0 * 2.0 = 4.0
        assert!((a - 4.0).abs() < 0.01);
    }

    #[test]
    fn test_parse_poscar_negative_scale_is_volume() {
        let content = "Cu\n-64.0\n1.0 0.0 0.0\n0.0 1.0 0.0\n0.0 0.0 1.0\nCu\n1\nDirect\n0 0 0\n";
        let structure = parse_poscar_content(content, "Cu").unwrap();
        assert!((structure.volume().unwrap() - 64.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_poscar_vasp4_species_from_comment() {
        let content = "Ga As\n5.65\n1 0 0\n0 1 0\n0 0 1\n1 1\nDirect\n0 0 0\n0.25 0.25 0.25\n";
        let structure = parse_poscar_content(content, "GaAs").unwrap();
        assert_eq!(structure.sites[0].species, "Ga");
        assert_eq!(structure.sites[1].species, "As");
    }

    #[test]
    fn test_parse_poscar_cartesian_keeps_mode() {
        let content = "H2\n1.0\n10 0 0\n0 10 0\n0 0 10\nH\n2\nCartesian\n0 0 0\n0.74 0 0\n";
        let structure = parse_poscar_content(content, "H2").unwrap();
        assert_eq!(structure.coordinates, CoordinateMode::Cartesian);
        assert!((structure.sites[1].position[0] - 0.74).abs() < 1e-12);
    }

    #[test]
    fn test_parse_poscar_count_mismatch() {
        let content = "Fe\n1.0\n2.87 0 0\n0 2.87 0\n0 0 2.87\nFe\n3\nDirect\n0 0 0\n0.5 0.5 0.5\n";
        assert!(parse_poscar_content(content, "Fe").is_err());
    }

    #[test]
    fn test_parse_poscar_bad_number() {
        let content = "Fe\n1.0\n2.87 0 0\n0 abc 0\n0 0 2.87\nFe\n1\nDirect\n0 0 0\n";
        assert!(parse_poscar_content(content, "Fe").is_err());
    }

    #[test]
    fn test_poscar_round_trip() {
        let lattice = Lattice::from_vectors([[4.0, 0.0, 0.0], [0.0, 4.0, 0.0], [0.0, 0.0, 4.0]]);
        let sites = vec![
            Site::new("O", [0.5, 0.5, 0.0]),
            Site::new("Ti", [0.0, 0.0, 0.0]),
            Site::new("O", [0.5, 0.0, 0.5]),
        ];
        let structure = Structure::new("TiO2", lattice, sites, CoordinateMode::Fractional);

        let poscar_str = to_poscar_string(&structure, &WriteOptions::default()).unwrap();
        let parsed = parse_poscar_content(&poscar_str, "round_trip").unwrap();

        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed.sites[0].species, "O");
        assert_eq!(parsed.sites[1].species, "O");
        assert_eq!(parsed.sites[2].species, "Ti");
        assert!((parsed.sites[1].position[2] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_parse_poscar_selective_dynamics() {
        let content = r#"Fe with selective
1.0
2.87 0.0 0.0
0.0 2.87 0.0
0.0 0.0 2.87
Fe
2
Selective dynamics
Direct
0.0 0.0 0.0 T T T
0.5 0.5 0.5 F F T
"#;
        let structure = parse_poscar_content(content, "Fe").unwrap();
        assert_eq!(structure.len(), 2);
        assert_eq!(
            structure.metadata.fixed,
            Some(vec![[false, false, false], [true, true, false]])
        );
    }

    #[test]
    fn test_selective_dynamics_follow_grouping() {
        let lattice = Lattice::from_vectors([[3.0, 0.0, 0.0], [0.0, 3.0, 0.0], [0.0, 0.0, 3.0]]);
        let sites = vec![
            Site::new("Fe", [0.0, 0.0, 0.0]),
            Site::new("O", [0.5, 0.5, 0.5]),
            Site::new("Fe", [0.5, 0.0, 0.0]),
        ];
        let mut structure = Structure::new("FeO", lattice, sites, CoordinateMode::Fractional);
        structure.metadata.fixed = Some(vec![[true; 3], [false; 3], [false, false, true]]);

        let text = to_poscar_string(&structure, &WriteOptions::default()).unwrap();
        let parsed = parse_poscar_content(&text, "FeO").unwrap();

        assert_eq!(parsed.sites[1].species, "Fe");
        assert_eq!(
            parsed.metadata.fixed,
            Some(vec![[true; 3], [false, false, true], [false; 3]])
        );
    }

    #[test]
    fn test_all_free_selective_dynamics_survive() {
        let lattice = Lattice::from_vectors([[3.0, 0.0, 0.0], [0.0, 3.0, 0.0], [0.0, 0.0, 3.0]]);
        let sites = vec![Site::new("Fe", [0.0, 0.0, 0.0]), Site::new("Fe", [0.5, 0.5, 0.5])];
        let mut structure = Structure::new("Fe", lattice, sites, CoordinateMode::Fractional);
        structure.metadata.fixed = Some(vec![[false; 3]; 2]);

        let text = to_poscar_string(&structure, &WriteOptions::default()).unwrap();
        assert!(text.contains("Selective dynamics"));

        let parsed = parse_poscar_content(&text, "Fe").unwrap();
        assert_eq!(parsed.metadata.fixed, Some(vec![[false; 3]; 2]));
    }

    #[test]
    fn test_write_vasp4_cartesian() {
        let lattice = Lattice::from_vectors([[2.0, 0.0, 0.0], [0.0, 2.0, 0.0], [0.0, 0.0, 2.0]]);
        let structure = Structure::new(
            "Po",
            lattice,
            vec![Site::new("Po", [0.5, 0.5, 0.5])],
            CoordinateMode::Fractional,
        );
        let options = WriteOptions {
            coordinates: Some(CoordinateMode::Cartesian),
            vasp5: false,
        };
        let text = to_poscar_string(&structure, &options).unwrap();
        assert!(text.contains("Cartesian"));

        let parsed = parse_poscar_content(&text, "Po").unwrap();
        assert_eq!(parsed.sites[0].species, "Po");
        assert!((parsed.sites[0].position[0] - 1.0).abs() < 1e-9);
    }
}
