//! # CIF 格式解析器
//!
//! 只处理 P1 描述：读取晶胞参数与 `_atom_site_*` 循环中的分数坐标，
//! 写出时以 P1 空间群和原子标签输出。文件中的其他对称操作不做展开。
//!
//! ## 依赖关系
//! - 被 `parsers/mod.rs` 使用
//! - 使用 `models/structure.rs`

use super::parse_error;
use crate::error::Result;
use crate::models::{CoordinateMode, Lattice, Site, Structure};
use std::collections::HashMap;

const FORMAT: &str = "cif";

/// 拆分 CIF 行，保留引号内的空格
fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c == '\'' || c == '"' {
            chars.next();
            let token: String = chars.by_ref().take_while(|&x| x != c).collect();
            tokens.push(token);
        } else {
            let mut token = String::new();
            while let Some(&x) = chars.peek() {
                if x.is_whitespace() {
                    break;
                }
                token.push(x);
                chars.next();
            }
            tokens.push(token);
        }
    }
    tokens
}

/// 解析带不确定度的数值，如 5.431(2)
fn parse_number(token: &str, name: &str) -> Result<f64> {
    let clean = token.split('(').next().unwrap_or(token);
    clean
        .parse::<f64>()
        .map_err(|_| parse_error(FORMAT, name, format!("Invalid number '{}'", token)))
}

/// 从标签或类型符号中提取元素
fn element_from(token: &str) -> String {
    let letters: String = token.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
    let mut chars = letters.chars();
    match chars.next() {
        Some(first) => {
            // 元素符号最多两个字母
            let second = chars.next().filter(|c| c.is_ascii_lowercase());
            let mut out = first.to_ascii_uppercase().to_string();
            if let Some(second) = second {
                out.push(second);
            }
            out
        }
        None => token.to_string(),
    }
}

/// 从字符串内容解析 CIF 格式
pub fn parse_cif_content(content: &str, default_name: &str) -> Result<Structure> {
    let mut name = default_name.to_string();
    let mut cell: HashMap<String, f64> = HashMap::new();
    let mut site_headers: Vec<String> = Vec::new();
    let mut site_rows: Vec<Vec<String>> = Vec::new();
    let mut symmetry_ops = 0usize;

    let lines: Vec<&str> = content
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .collect();

    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        let lower = line.to_lowercase();

        if let Some(block) = line.strip_prefix("data_") {
            if !block.is_empty() {
                name = block.to_string();
            }
            i += 1;
        } else if lower.starts_with("_cell_length_") || lower.starts_with("_cell_angle_") {
            let tokens = tokenize(line);
            if tokens.len() >= 2 {
                cell.insert(tokens[0].to_lowercase(), parse_number(&tokens[1], &name)?);
            }
            i += 1;
        } else if lower == "loop_" {
            i += 1;
            let mut headers = Vec::new();
            while i < lines.len() && lines[i].starts_with('_') {
                headers.push(lines[i].split_whitespace().next().unwrap_or("").to_lowercase());
                i += 1;
            }

            let mut rows = Vec::new();
            let mut pending: Vec<String> = Vec::new();
            while i < lines.len() {
                let l = lines[i];
                if l.starts_with('_') || l.eq_ignore_ascii_case("loop_") || l.starts_with("data_") {
                    break;
                }
                pending.extend(tokenize(l));
                while !headers.is_empty() && pending.len() >= headers.len() {
                    rows.push(pending.drain(..headers.len()).collect::<Vec<_>>());
                }
                i += 1;
            }

            if headers.iter().any(|h| h.starts_with("_atom_site_fract_")) {
                site_headers = headers;
                site_rows = rows;
            } else if headers
                .iter()
                .any(|h| h.contains("symop_operation_xyz") || h.contains("equiv_pos_as_xyz"))
            {
                symmetry_ops = rows.len();
            }
        } else {
            i += 1;
        }
    }

    let get = |key: &str| {
        cell.get(key)
            .copied()
            .ok_or_else(|| parse_error(FORMAT, &name, format!("Missing {}", key)))
    };
    let lattice = Lattice::from_parameters(
        get("_cell_length_a")?,
        get("_cell_length_b")?,
        get("_cell_length_c")?,
        get("_cell_angle_alpha")?,
        get("_cell_angle_beta")?,
        get("_cell_angle_gamma")?,
    );

    if site_headers.is_empty() {
        return Err(parse_error(FORMAT, &name, "Missing _atom_site_ loop"));
    }
    if symmetry_ops > 1 {
        log::warn!(
            "{} lists {} symmetry operations; only the listed sites are read (P1)",
            name,
            symmetry_ops
        );
    }

    let column = |key: &str| site_headers.iter().position(|h| h == key);
    let (ix, iy, iz) = match (
        column("_atom_site_fract_x"),
        column("_atom_site_fract_y"),
        column("_atom_site_fract_z"),
    ) {
        (Some(x), Some(y), Some(z)) => (x, y, z),
        _ => return Err(parse_error(FORMAT, &name, "Incomplete fractional coordinates")),
    };
    let type_col = column("_atom_site_type_symbol");
    let label_col = column("_atom_site_label");
    if type_col.is_none() && label_col.is_none() {
        return Err(parse_error(
            FORMAT,
            &name,
            "Sites need _atom_site_type_symbol or _atom_site_label",
        ));
    }

    let mut sites = Vec::with_capacity(site_rows.len());
    for row in &site_rows {
        let species_token = type_col.or(label_col).map(|c| row[c].as_str()).unwrap_or("X");
        let mut site = Site::new(
            element_from(species_token),
            [
                parse_number(&row[ix], &name)?,
                parse_number(&row[iy], &name)?,
                parse_number(&row[iz], &name)?,
            ],
        );
        if let Some(c) = label_col {
            site = site.with_label(row[c].clone());
        }
        sites.push(site);
    }

    let mut structure = Structure::new(name, lattice, sites, CoordinateMode::Fractional);
    structure.source_format = Some(FORMAT.to_string());

    Ok(structure)
}

/// 将结构转换为 P1 CIF 字符串
pub fn to_cif_string(structure: &Structure) -> Result<String> {
    let lattice = structure.require_lattice()?;
    let (a, b, c, alpha, beta, gamma) = lattice.parameters();
    let positions = structure.fractional_positions()?;
    let data_name: String = structure
        .name
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect();

    let mut result = format!("data_{}\n", data_name);
    result.push_str("_symmetry_space_group_name_H-M   'P 1'\n");
    result.push_str(&format!("_cell_length_a   {:.8}\n", a));
    result.push_str(&format!("_cell_length_b   {:.8}\n", b));
    result.push_str(&format!("_cell_length_c   {:.8}\n", c));
    result.push_str(&format!("_cell_angle_alpha   {:.8}\n", alpha));
    result.push_str(&format!("_cell_angle_beta   {:.8}\n", beta));
    result.push_str(&format!("_cell_angle_gamma   {:.8}\n", gamma));
    result.push_str("_symmetry_Int_Tables_number   1\n");
    result.push_str(&format!("_chemical_formula_sum   '{}'\n", structure.formula()));
    result.push_str(&format!("_cell_volume   {:.8}\n", lattice.volume().abs()));
    result.push_str("loop_\n _symmetry_equiv_pos_site_id\n _symmetry_equiv_pos_as_xyz\n  1  'x, y, z'\n");
    result.push_str("loop_\n");
    result.push_str(" _atom_site_label\n _atom_site_type_symbol\n");
    result.push_str(" _atom_site_fract_x\n _atom_site_fract_y\n _atom_site_fract_z\n");
    result.push_str(" _atom_site_occupancy\n");

    let mut counters: HashMap<&str, usize> = HashMap::new();
    for (site, pos) in structure.sites.iter().zip(&positions) {
        let label = match &site.label {
            Some(label) => label.clone(),
            None => {
                let n = counters.entry(site.species.as_str()).or_insert(0);
                *n += 1;
                format!("{}{}", site.species, n)
            }
        };
        result.push_str(&format!(
            "  {}  {}  {:.10}  {:.10}  {:.10}  1\n",
            label, site.species, pos[0], pos[1], pos[2]
        ));
    }

    Ok(result)
}
