//! # DS-PAW .as 格式解析器
//!
//! 解析与写出 DS-PAW 结构文件，支持晶格约束、原子约束和（共线/非共线）初始磁矩。
//!
//! ## .as 格式说明
//! ```text
//! Total number of atoms
//! 2
//! Lattice Fix_x Fix_y Fix_z
//!  2.87 0.00 0.00 F F F
//!  0.00 2.87 0.00 F F F
//!  0.00 0.00 2.87 T T T
//! Direct Mag Fix_x Fix_y Fix_z
//! Fe 0.0 0.0 0.0 2.0 F F F
//! Fe 0.5 0.5 0.5 -2.0 T T T
//! ```
//! `Fix` 标记中 T 表示固定。
//!
//! ## 依赖关系
//! - 被 `parsers/mod.rs` 使用
//! - 使用 `models/structure.rs`

use super::{parse_error, parse_f64, strip_comments};
use crate::error::Result;
use crate::models::{CoordinateMode, Lattice, MagneticMoments, Site, Structure};
use crate::parsers::WriteOptions;

const FORMAT: &str = "dspaw";

/// 原子行附加列
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AtomColumn {
    Mag,
    MagX,
    MagY,
    MagZ,
    /// 三列 x/y/z 约束
    Fix,
    FixX,
    FixY,
    FixZ,
}

impl AtomColumn {
    fn parse(token: &str) -> Option<Self> {
        match token {
            "Mag" => Some(AtomColumn::Mag),
            "Mag_x" => Some(AtomColumn::MagX),
            "Mag_y" => Some(AtomColumn::MagY),
            "Mag_z" => Some(AtomColumn::MagZ),
            "Fix" => Some(AtomColumn::Fix),
            "Fix_x" => Some(AtomColumn::FixX),
            "Fix_y" => Some(AtomColumn::FixY),
            "Fix_z" => Some(AtomColumn::FixZ),
            _ => None,
        }
    }

    fn width(&self) -> usize {
        match self {
            AtomColumn::Fix => 3,
            _ => 1,
        }
    }
}

fn parse_flag(token: &str, name: &str) -> Result<bool> {
    if token.starts_with('T') {
        Ok(true)
    } else if token.starts_with('F') {
        Ok(false)
    } else {
        Err(parse_error(FORMAT, name, format!("Invalid fix flag '{}'", token)))
    }
}

/// 从字符串内容解析 .as 格式
pub fn parse_dspaw_content(content: &str, default_name: &str) -> Result<Structure> {
    let name = default_name;
    let lines = strip_comments(content, &['#']);

    if lines.len() < 7 {
        return Err(parse_error(FORMAT, name, "File too short"));
    }

    let natom: usize = lines[1]
        .parse()
        .map_err(|_| parse_error(FORMAT, name, format!("Invalid atom count '{}'", lines[1])))?;

    // 晶格及其约束
    let lattice_header: Vec<&str> = lines[2].split_whitespace().collect();
    if lattice_header.first() != Some(&"Lattice") {
        return Err(parse_error(FORMAT, name, "Missing 'Lattice' header"));
    }
    let lattice_fix_cols = &lattice_header[1..];

    let mut matrix = [[0.0; 3]; 3];
    let mut lattice_fixed = [[false; 3]; 3];
    for i in 0..3 {
        let parts: Vec<&str> = lines[3 + i].split_whitespace().collect();
        if parts.len() < 3 {
            return Err(parse_error(
                FORMAT,
                name,
                format!("Invalid lattice vector '{}'", lines[3 + i]),
            ));
        }
        for j in 0..3 {
            matrix[i][j] = parse_f64(parts[j], FORMAT, name)?;
        }

        match lattice_fix_cols {
            [] => {}
            ["Fix_x", "Fix_y", "Fix_z"] => {
                if parts.len() < 6 {
                    return Err(parse_error(FORMAT, name, "Missing lattice fix flags"));
                }
                for j in 0..3 {
                    lattice_fixed[i][j] = parse_flag(parts[3 + j], name)?;
                }
            }
            ["Fix"] => {
                let flag = parts
                    .get(3)
                    .ok_or_else(|| parse_error(FORMAT, name, "Missing lattice fix flag"))?;
                lattice_fixed[i] = [parse_flag(flag, name)?; 3];
            }
            other => {
                return Err(parse_error(
                    FORMAT,
                    name,
                    format!("Unknown lattice fix columns: {}", other.join(" ")),
                ))
            }
        }
    }

    // 坐标类型与附加列
    let atom_header: Vec<&str> = lines[6].split_whitespace().collect();
    let coordinates = match atom_header.first() {
        Some(&"Direct") => CoordinateMode::Fractional,
        Some(&"Cartesian") => CoordinateMode::Cartesian,
        _ => {
            return Err(parse_error(
                FORMAT,
                name,
                format!("Expected 'Direct' or 'Cartesian', found '{}'", lines[6]),
            ))
        }
    };
    let columns: Vec<AtomColumn> = atom_header[1..]
        .iter()
        .map(|t| {
            AtomColumn::parse(t)
                .ok_or_else(|| parse_error(FORMAT, name, format!("Unknown atom column '{}'", t)))
        })
        .collect::<Result<_>>()?;

    if lines.len() < 7 + natom {
        return Err(parse_error(
            FORMAT,
            name,
            format!("Expected {} atoms, found {}", natom, lines.len() - 7),
        ));
    }

    let has_fix = columns.iter().any(|c| {
        matches!(
            c,
            AtomColumn::Fix | AtomColumn::FixX | AtomColumn::FixY | AtomColumn::FixZ
        )
    });
    let has_mag = columns.contains(&AtomColumn::Mag);
    let has_vector_mag = columns
        .iter()
        .any(|c| matches!(c, AtomColumn::MagX | AtomColumn::MagY | AtomColumn::MagZ));

    let mut sites = Vec::with_capacity(natom);
    let mut fixed = Vec::with_capacity(natom);
    let mut mags = Vec::with_capacity(natom);
    let mut vector_mags = Vec::with_capacity(natom);

    for line in &lines[7..7 + natom] {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let width: usize = 4 + columns.iter().map(|c| c.width()).sum::<usize>();
        if parts.len() < width {
            return Err(parse_error(
                FORMAT,
                name,
                format!("Expected {} fields in atom line '{}'", width, line),
            ));
        }

        let species = parts[0].replace('_', "");
        let position = [
            parse_f64(parts[1], FORMAT, name)?,
            parse_f64(parts[2], FORMAT, name)?,
            parse_f64(parts[3], FORMAT, name)?,
        ];

        let mut fix = [false; 3];
        let mut mag = 0.0;
        let mut vmag = [0.0; 3];
        let mut cursor = 4;
        for column in &columns {
            let token = parts[cursor];
            match column {
                AtomColumn::Mag => mag = parse_f64(token, FORMAT, name)?,
                AtomColumn::MagX => vmag[0] = parse_f64(token, FORMAT, name)?,
                AtomColumn::MagY => vmag[1] = parse_f64(token, FORMAT, name)?,
                AtomColumn::MagZ => vmag[2] = parse_f64(token, FORMAT, name)?,
                AtomColumn::Fix => {
                    for (k, flag) in fix.iter_mut().enumerate() {
                        *flag = parse_flag(parts[cursor + k], name)?;
                    }
                }
                AtomColumn::FixX => fix[0] = parse_flag(token, name)?,
                AtomColumn::FixY => fix[1] = parse_flag(token, name)?,
                AtomColumn::FixZ => fix[2] = parse_flag(token, name)?,
            }
            cursor += column.width();
        }

        sites.push(Site::new(species, position));
        fixed.push(fix);
        mags.push(mag);
        vector_mags.push(vmag);
    }

    let mut structure = Structure::new(name, Lattice::from_vectors(matrix), sites, coordinates);
    if has_fix {
        structure.metadata.fixed = Some(fixed);
    }
    if has_vector_mag {
        structure.metadata.magmoms = Some(MagneticMoments::Noncollinear(vector_mags));
    } else if has_mag {
        structure.metadata.magmoms = Some(MagneticMoments::Collinear(mags));
    }
    if !lattice_fix_cols.is_empty() {
        structure.metadata.lattice_fixed = Some(lattice_fixed);
    }
    structure.source_format = Some(FORMAT.to_string());

    Ok(structure)
}

/// 将结构转换为 .as 格式字符串
pub fn to_dspaw_string(structure: &Structure, options: &WriteOptions) -> Result<String> {
    let lattice = structure.require_lattice()?;
    let coordinates = options.coordinates.unwrap_or(structure.coordinates);
    let positions = match coordinates {
        CoordinateMode::Fractional => structure.fractional_positions()?,
        CoordinateMode::Cartesian => structure.cartesian_positions()?,
    };
    let flag = |f: bool| if f { "T" } else { "F" };

    let mut result = String::from("Total number of atoms\n");
    result.push_str(&format!("{}\n", structure.len()));

    match structure.metadata.lattice_fixed {
        Some(lattice_fixed) => {
            result.push_str("Lattice Fix_x Fix_y Fix_z\n");
            for (row, fix) in lattice.matrix.iter().zip(lattice_fixed.iter()) {
                result.push_str(&format!(
                    "{:16.10} {:16.10} {:16.10} {} {} {}\n",
                    row[0],
                    row[1],
                    row[2],
                    flag(fix[0]),
                    flag(fix[1]),
                    flag(fix[2])
                ));
            }
        }
        None => {
            result.push_str("Lattice\n");
            for row in &lattice.matrix {
                result.push_str(&format!(
                    "{:16.10} {:16.10} {:16.10}\n",
                    row[0], row[1], row[2]
                ));
            }
        }
    }

    let fixed = structure.metadata.fixed.as_ref();
    let magmoms = structure
        .metadata
        .magmoms
        .as_ref()
        .filter(|m| m.any_nonzero());

    let mut header = match coordinates {
        CoordinateMode::Fractional => String::from("Direct"),
        CoordinateMode::Cartesian => String::from("Cartesian"),
    };
    if fixed.is_some() {
        header.push_str(" Fix_x Fix_y Fix_z");
    }
    match magmoms {
        Some(MagneticMoments::Collinear(_)) => header.push_str(" Mag"),
        Some(MagneticMoments::Noncollinear(_)) => header.push_str(" Mag_x Mag_y Mag_z"),
        None => {}
    }
    result.push_str(&header);
    result.push('\n');

    for (i, (site, pos)) in structure.sites.iter().zip(&positions).enumerate() {
        result.push_str(&format!(
            "{:<2} {:16.10} {:16.10} {:16.10}",
            site.species, pos[0], pos[1], pos[2]
        ));
        if let Some(fixed) = fixed {
            let f = fixed[i];
            result.push_str(&format!(" {} {} {}", flag(f[0]), flag(f[1]), flag(f[2])));
        }
        match magmoms {
            Some(MagneticMoments::Collinear(m)) => result.push_str(&format!(" {}", m[i])),
            Some(MagneticMoments::Noncollinear(m)) => {
                result.push_str(&format!(" {} {} {}", m[i][0], m[i][1], m[i][2]))
            }
            None => {}
        }
        result.push('\n');
    }

    Ok(result)
}
