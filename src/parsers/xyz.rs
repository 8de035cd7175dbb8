//! # XYZ / 扩展 XYZ 格式解析器
//!
//! 注释行可嵌入 `Lattice="ax ay az bx by bz cx cy cz"` 与 `pbc="T T T"`（扩展 XYZ）。
//! 原子行只读取元素与笛卡尔坐标，其余列忽略。
//!
//! ## 依赖关系
//! - 被 `parsers/mod.rs` 使用
//! - 使用 `models/structure.rs`

use super::{parse_error, parse_f64};
use crate::error::Result;
use crate::models::{CoordinateMode, Lattice, Site, Structure};
use regex::Regex;

const FORMAT: &str = "xyz";

/// 从注释行中提取 key="value"
fn quoted_value(comment: &str, key: &str) -> Option<String> {
    let pattern = format!(r#"(?i)\b{}\s*=\s*"([^"]*)""#, regex::escape(key));
    Regex::new(&pattern)
        .ok()?
        .captures(comment)
        .map(|c| c[1].to_string())
}

/// 从字符串内容解析 XYZ 格式
pub fn parse_xyz_content(content: &str, default_name: &str) -> Result<Structure> {
    let name = default_name;
    let lines: Vec<&str> = content.lines().collect();
    if lines.len() < 2 {
        return Err(parse_error(FORMAT, name, "File too short"));
    }

    let natom: usize = lines[0]
        .trim()
        .parse()
        .map_err(|_| parse_error(FORMAT, name, "First line must hold the atom count"))?;
    let comment = lines[1].trim();

    let lattice = match quoted_value(comment, "Lattice") {
        Some(text) => {
            let values: Vec<f64> = text
                .split_whitespace()
                .map(|t| parse_f64(t, FORMAT, name))
                .collect::<Result<_>>()?;
            if values.len() != 9 {
                return Err(parse_error(
                    FORMAT,
                    name,
                    format!("Lattice needs 9 values, found {}", values.len()),
                ));
            }
            Some(Lattice::from_vectors([
                [values[0], values[1], values[2]],
                [values[3], values[4], values[5]],
                [values[6], values[7], values[8]],
            ]))
        }
        None => None,
    };

    let mut sites = Vec::with_capacity(natom);
    for line in lines[2..].iter().filter(|l| !l.trim().is_empty()).take(natom) {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 4 {
            return Err(parse_error(
                FORMAT,
                name,
                format!("Invalid atom line: '{}'", line.trim()),
            ));
        }
        sites.push(Site::new(
            parts[0],
            [
                parse_f64(parts[1], FORMAT, name)?,
                parse_f64(parts[2], FORMAT, name)?,
                parse_f64(parts[3], FORMAT, name)?,
            ],
        ));
    }

    if sites.len() != natom {
        return Err(parse_error(
            FORMAT,
            name,
            format!("Declared {} atoms, found {}", natom, sites.len()),
        ));
    }

    let mut structure = match lattice {
        Some(lattice) => {
            let mut s = Structure::new(name, lattice, sites, CoordinateMode::Cartesian);
            if let Some(pbc) = quoted_value(comment, "pbc") {
                let flags: Vec<bool> = pbc
                    .split_whitespace()
                    .map(|t| t.eq_ignore_ascii_case("T") || t.eq_ignore_ascii_case("true"))
                    .collect();
                if flags.len() == 3 {
                    s.pbc = [flags[0], flags[1], flags[2]];
                }
            }
            s
        }
        None => {
            let mut s = Structure::molecule(name, sites);
            if !comment.is_empty() {
                s.name = comment.to_string();
            }
            s
        }
    };
    structure.source_format = Some(FORMAT.to_string());

    Ok(structure)
}

/// 将结构转换为 XYZ 格式字符串（有晶格时写扩展 XYZ 注释行）
pub fn to_xyz_string(structure: &Structure) -> Result<String> {
    let positions = structure.cartesian_positions()?;
    let mut result = format!("{}\n", structure.len());

    match &structure.lattice {
        Some(lattice) => {
            let values: Vec<String> = lattice
                .matrix
                .iter()
                .flatten()
                .map(|v| format!("{:.10}", v))
                .collect();
            let pbc: Vec<&str> = structure
                .pbc
                .iter()
                .map(|p| if *p { "T" } else { "F" })
                .collect();
            result.push_str(&format!(
                "Lattice=\"{}\" Properties=species:S:1:pos:R:3 pbc=\"{}\"\n",
                values.join(" "),
                pbc.join(" ")
            ));
        }
        None => result.push_str(&format!("{}\n", structure.name)),
    }

    for (site, pos) in structure.sites.iter().zip(&positions) {
        result.push_str(&format!(
            "{:<2} {:16.10} {:16.10} {:16.10}\n",
            site.species, pos[0], pos[1], pos[2]
        ));
    }

    Ok(result)
}
