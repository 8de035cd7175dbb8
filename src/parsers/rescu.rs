//! # RESCU xyz 格式解析器
//!
//! RESCU 使用的 xyz 变体：无晶格，笛卡尔坐标，原子行可附带磁矩和可移动标记。
//!
//! ## 原子行格式
//! ```text
//! El x y z                          # 4 列
//! El x y z m                        # 5 列，共线磁矩
//! El x y z mx my mz                 # 7 列，非共线磁矩
//! El x y z m fx fy fz               # 8 列，共线磁矩 + 可移动标记
//! El x y z mx my mz fx fy fz        # 10 列
//! ```
//! 可移动标记 1 表示可移动，0 表示固定。`#` 与 `%` 之后为注释。
//! 8 列格式中磁矩列全为 0 时视为占位，读回时不产生磁矩。
//!
//! ## 依赖关系
//! - 被 `parsers/mod.rs` 使用
//! - 使用 `models/structure.rs`

use super::{parse_error, parse_f64, strip_comments};
use crate::error::Result;
use crate::models::{MagneticMoments, Site, Structure};

const FORMAT: &str = "rescu";

fn parse_movable(token: &str, name: &str) -> Result<bool> {
    match token.parse::<i64>() {
        Ok(0) => Ok(true),
        Ok(1) => Ok(false),
        _ => Err(parse_error(
            FORMAT,
            name,
            format!("Invalid movable flag '{}' (expected 0 or 1)", token),
        )),
    }
}

/// 从字符串内容解析 RESCU xyz 格式
pub fn parse_rescu_content(content: &str, default_name: &str) -> Result<Structure> {
    let name = default_name;
    let raw_lines: Vec<&str> = content.lines().collect();
    if raw_lines.len() < 2 {
        return Err(parse_error(FORMAT, name, "File too short"));
    }

    let count_line = strip_comments(raw_lines[0], &['#', '%']);
    let natom: usize = count_line
        .first()
        .and_then(|l| l.parse().ok())
        .ok_or_else(|| parse_error(FORMAT, name, "First line must hold the atom count"))?;

    let atom_lines = strip_comments(&raw_lines[2..].join("\n"), &['#', '%']);

    let mut sites = Vec::with_capacity(natom);
    let mut collinear = Vec::new();
    let mut vector = Vec::new();
    let mut fixed = Vec::new();

    for line in &atom_lines {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let num = |i: usize| parse_f64(parts[i], FORMAT, name);
        let position = match parts.len() {
            4 | 5 | 7 | 8 | 10 => [num(1)?, num(2)?, num(3)?],
            n => {
                return Err(parse_error(
                    FORMAT,
                    name,
                    format!("Invalid atom line with {} fields: '{}'", n, line),
                ))
            }
        };

        match parts.len() {
            5 => collinear.push(num(4)?),
            7 => vector.push([num(4)?, num(5)?, num(6)?]),
            8 => {
                collinear.push(num(4)?);
                fixed.push([
                    parse_movable(parts[5], name)?,
                    parse_movable(parts[6], name)?,
                    parse_movable(parts[7], name)?,
                ]);
            }
            10 => {
                vector.push([num(4)?, num(5)?, num(6)?]);
                fixed.push([
                    parse_movable(parts[7], name)?,
                    parse_movable(parts[8], name)?,
                    parse_movable(parts[9], name)?,
                ]);
            }
            _ => {}
        }

        sites.push(Site::new(parts[0], position));
    }

    if sites.len() != natom {
        return Err(parse_error(
            FORMAT,
            name,
            format!("Declared {} atoms, found {}", natom, sites.len()),
        ));
    }
    if !collinear.is_empty() && !vector.is_empty() {
        return Err(parse_error(
            FORMAT,
            name,
            "Mixed collinear and vector magnetic moments",
        ));
    }
    for (what, len) in [
        ("magnetic moments", collinear.len().max(vector.len())),
        ("movable flags", fixed.len()),
    ] {
        if len != 0 && len != natom {
            return Err(parse_error(
                FORMAT,
                name,
                format!("{} {} for {} atoms", len, what, natom),
            ));
        }
    }

    // 约束列前的全零磁矩列只是占位
    if !fixed.is_empty() && collinear.iter().all(|m| *m == 0.0) {
        collinear.clear();
    }

    let mut structure = Structure::molecule(name, sites);
    if !collinear.is_empty() {
        structure.metadata.magmoms = Some(MagneticMoments::Collinear(collinear));
    } else if !vector.is_empty() {
        structure.metadata.magmoms = Some(MagneticMoments::Noncollinear(vector));
    }
    if !fixed.is_empty() {
        structure.metadata.fixed = Some(fixed);
    }
    structure.source_format = Some(FORMAT.to_string());

    Ok(structure)
}

/// 将结构转换为 RESCU xyz 格式字符串
pub fn to_rescu_string(structure: &Structure) -> Result<String> {
    let positions = structure.cartesian_positions()?;
    let fixed = structure.metadata.fixed.as_ref();
    let magmoms = structure
        .metadata
        .magmoms
        .as_ref()
        .filter(|m| m.any_nonzero());
    let movable = |f: bool| if f { 0 } else { 1 };

    let mut result = format!("{}\nAuto-generated xyz file\n", structure.len());

    for (i, (site, pos)) in structure.sites.iter().zip(&positions).enumerate() {
        result.push_str(&format!(
            "{} {:.6} {:.6} {:.6}",
            site.species, pos[0], pos[1], pos[2]
        ));

        match magmoms {
            Some(MagneticMoments::Collinear(m)) => result.push_str(&format!(" {}", m[i])),
            Some(MagneticMoments::Noncollinear(m)) => {
                result.push_str(&format!(" {} {} {}", m[i][0], m[i][1], m[i][2]))
            }
            // 约束列需要磁矩列占位
            None if fixed.is_some() => result.push_str(" 0"),
            None => {}
        }

        if let Some(fixed) = fixed {
            let f = fixed[i];
            result.push_str(&format!(
                " {} {} {}",
                movable(f[0]),
                movable(f[1]),
                movable(f[2])
            ));
        }
        result.push('\n');
    }

    Ok(result)
}
