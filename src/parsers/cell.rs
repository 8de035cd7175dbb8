//! # CASTEP .cell 格式解析器
//!
//! 解析与写出 CASTEP 输入文件 .cell 格式。
//!
//! ## .cell 格式说明
//! ```text
//! %BLOCK LATTICE_CART
//! ang
//! a1 a2 a3
//! b1 b2 b3
//! c1 c2 c3
//! %ENDBLOCK LATTICE_CART
//!
//! %BLOCK POSITIONS_FRAC
//! Element x y z [SPIN=m]
//! ...
//! %ENDBLOCK POSITIONS_FRAC
//! ```
//!
//! ## 依赖关系
//! - 被 `parsers/mod.rs` 使用
//! - 使用 `models/structure.rs`

use super::{parse_error, parse_f64};
use crate::error::Result;
use crate::models::{CoordinateMode, Lattice, MagneticMoments, Site, Structure};
use crate::parsers::WriteOptions;
use crate::utils::math;

const FORMAT: &str = "cell";
const BOHR_TO_ANG: f64 = 0.529_177_210_903;

/// 从字符串内容解析 .cell 格式
pub fn parse_cell_content(content: &str, default_name: &str) -> Result<Structure> {
    let lines: Vec<&str> = content.lines().collect();

    // 解析 LATTICE_CART 或 LATTICE_ABC
    let lattice = if let Some(block) = find_block(&lines, "LATTICE_CART") {
        parse_lattice_cart(&block, default_name)?
    } else if let Some(block) = find_block(&lines, "LATTICE_ABC") {
        parse_lattice_abc(&block, default_name)?
    } else {
        return Err(parse_error(
            FORMAT,
            default_name,
            "Missing LATTICE_CART or LATTICE_ABC block",
        ));
    };

    // 解析 POSITIONS_FRAC 或 POSITIONS_ABS
    let (block, coordinates) = if let Some(block) = find_block(&lines, "POSITIONS_FRAC") {
        (block, CoordinateMode::Fractional)
    } else if let Some(block) = find_block(&lines, "POSITIONS_ABS") {
        (block, CoordinateMode::Cartesian)
    } else {
        return Err(parse_error(
            FORMAT,
            default_name,
            "Missing POSITIONS_FRAC or POSITIONS_ABS block",
        ));
    };
    let (sites, spins) = parse_positions(&block, coordinates, default_name)?;

    let mut structure = Structure::new(default_name, lattice, sites, coordinates);
    if spins.iter().any(|s| *s != 0.0) {
        structure.metadata.magmoms = Some(MagneticMoments::Collinear(spins));
    }
    structure.source_format = Some(FORMAT.to_string());

    Ok(structure)
}

/// 取出 %BLOCK NAME ... %ENDBLOCK NAME 之间的有效行（去掉注释与空行）
fn find_block<'a>(lines: &[&'a str], block_name: &str) -> Option<Vec<&'a str>> {
    let start = lines.iter().position(|line| {
        let upper = line.trim().to_uppercase();
        upper.starts_with("%BLOCK") && upper.split_whitespace().nth(1) == Some(block_name)
    })?;

    Some(
        lines[start + 1..]
            .iter()
            .copied()
            .map(str::trim)
            .take_while(|line| !line.to_uppercase().starts_with("%ENDBLOCK"))
            .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('!'))
            .collect(),
    )
}

/// 单位行换算到 Å 的系数
fn unit_factor(line: &str) -> Option<f64> {
    match line.to_lowercase().as_str() {
        "ang" | "angstrom" => Some(1.0),
        "bohr" | "a0" => Some(BOHR_TO_ANG),
        "nm" => Some(10.0),
        _ => None,
    }
}

/// 解析 LATTICE_CART 块
fn parse_lattice_cart(block: &[&str], name: &str) -> Result<Lattice> {
    let (factor, rows) = match block.first().and_then(|l| unit_factor(l)) {
        Some(f) => (f, &block[1..]),
        None => (1.0, block),
    };

    if rows.len() < 3 {
        return Err(parse_error(FORMAT, name, "Incomplete LATTICE_CART block"));
    }

    let mut matrix = [[0.0; 3]; 3];
    for (row, line) in matrix.iter_mut().zip(rows) {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 3 {
            return Err(parse_error(FORMAT, name, format!("Invalid lattice row '{}'", line)));
        }
        for j in 0..3 {
            row[j] = parse_f64(parts[j], FORMAT, name)? * factor;
        }
    }

    Ok(Lattice::from_vectors(matrix))
}

/// 解析 LATTICE_ABC 块
fn parse_lattice_abc(block: &[&str], name: &str) -> Result<Lattice> {
    let (factor, rows) = match block.first().and_then(|l| unit_factor(l)) {
        Some(f) => (f, &block[1..]),
        None => (1.0, block),
    };

    let params: Vec<f64> = rows
        .iter()
        .flat_map(|l| l.split_whitespace())
        .map(|t| parse_f64(t, FORMAT, name))
        .collect::<Result<_>>()?;

    if params.len() < 6 {
        return Err(parse_error(
            FORMAT,
            name,
            "Incomplete LATTICE_ABC block (need a b c alpha beta gamma)",
        ));
    }

    Ok(Lattice::from_parameters(
        params[0] * factor,
        params[1] * factor,
        params[2] * factor,
        params[3],
        params[4],
        params[5],
    ))
}

/// 解析原子位置块，返回位点和 SPIN 值
fn parse_positions(
    block: &[&str],
    coordinates: CoordinateMode,
    name: &str,
) -> Result<(Vec<Site>, Vec<f64>)> {
    let (factor, rows) = match (coordinates, block.first().and_then(|l| unit_factor(l))) {
        (CoordinateMode::Cartesian, Some(f)) => (f, &block[1..]),
        _ => (1.0, block),
    };

    let mut sites = Vec::with_capacity(rows.len());
    let mut spins = Vec::with_capacity(rows.len());

    for line in rows {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 4 {
            return Err(parse_error(FORMAT, name, format!("Invalid position line '{}'", line)));
        }

        let mut position = [
            parse_f64(parts[1], FORMAT, name)?,
            parse_f64(parts[2], FORMAT, name)?,
            parse_f64(parts[3], FORMAT, name)?,
        ];
        if coordinates == CoordinateMode::Cartesian {
            position = math::scale(position, factor);
        }

        let mut spin = 0.0;
        for extra in &parts[4..] {
            if let Some(value) = extra
                .to_uppercase()
                .strip_prefix("SPIN=")
                .map(|v| v.to_string())
            {
                spin = parse_f64(&value, FORMAT, name)?;
            }
        }

        sites.push(Site::new(parts[0], position));
        spins.push(spin);
    }

    Ok((sites, spins))
}

/// 将结构转换为 .cell 格式字符串
pub fn to_cell_string(structure: &Structure, options: &WriteOptions) -> Result<String> {
    let lattice = structure.require_lattice()?;
    let coordinates = options.coordinates.unwrap_or(CoordinateMode::Fractional);
    let positions = match coordinates {
        CoordinateMode::Fractional => structure.fractional_positions()?,
        CoordinateMode::Cartesian => structure.cartesian_positions()?,
    };
    let spins = match &structure.metadata.magmoms {
        Some(MagneticMoments::Collinear(m)) if m.iter().any(|v| *v != 0.0) => Some(m),
        _ => None,
    };

    let mut result = String::new();

    // LATTICE_CART 块
    result.push_str("%BLOCK LATTICE_CART\nang\n");
    for row in &lattice.matrix {
        result.push_str(&format!(
            "{:16.10} {:16.10} {:16.10}\n",
            row[0], row[1], row[2]
        ));
    }
    result.push_str("%ENDBLOCK LATTICE_CART\n\n");

    // 位置块
    let block = match coordinates {
        CoordinateMode::Fractional => "POSITIONS_FRAC",
        CoordinateMode::Cartesian => "POSITIONS_ABS",
    };
    result.push_str(&format!("%BLOCK {}\n", block));
    if coordinates == CoordinateMode::Cartesian {
        result.push_str("ang\n");
    }
    for (i, (site, pos)) in structure.sites.iter().zip(&positions).enumerate() {
        result.push_str(&format!(
            "{:4} {:16.10} {:16.10} {:16.10}",
            site.species, pos[0], pos[1], pos[2]
        ));
        if let Some(spins) = spins {
            result.push_str(&format!(" SPIN={}", spins[i]));
        }
        result.push('\n');
    }
    result.push_str(&format!("%ENDBLOCK {}\n", block));

    Ok(result)
}
