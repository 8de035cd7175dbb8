//! # structure 子命令实现
//!
//! 读取结构文件，按子命令做转换或变换，再写出。
//!
//! ## 依赖关系
//! - 使用 `cli/structure.rs` 定义的参数
//! - 使用 `parsers/` 读写结构，`transform/` 做变换
//! - 使用 `utils/output.rs`, `utils/progress.rs`

use crate::cli::structure::{
    ConvertArgs, InfoArgs, OrthogonalArgs, PrimitiveArgs, ScaleArgs, StructureArgs,
    StructureCommands,
};
use crate::error::Result;
use crate::models::{MagneticMoments, Structure};
use crate::parsers::{self, WriteOptions};
use crate::transform::{self, SymbolType, SymmetryInfo};
use crate::utils::output::{self, InfoRow};
use crate::utils::progress;

use std::path::Path;

/// 执行 structure 子命令
pub fn execute(args: StructureArgs) -> Result<()> {
    match args.command {
        StructureCommands::Convert(args) => convert(args),
        StructureCommands::Info(args) => info(args),
        StructureCommands::Primitive(args) => primitive(args),
        StructureCommands::Orthogonal(args) => orthogonal(args),
        StructureCommands::Scale(args) => scale(args),
    }
}

fn convert(args: ConvertArgs) -> Result<()> {
    let structure = parsers::read_structure(&args.input, args.from.as_deref())?;
    let format = parsers::write_structure(
        &args.output,
        &structure,
        args.format.as_deref(),
        &args.write_options(),
    )?;

    output::print_conversion(
        &args.input.display().to_string(),
        &format!("{} ({})", args.output.display(), format),
    );
    Ok(())
}

fn info(args: InfoArgs) -> Result<()> {
    let structure = parsers::read_structure(&args.input, args.from.as_deref())?;
    output::print_properties(
        &format!("Structure: {}", args.input.display()),
        &structure_rows(&structure),
    );

    if args.show_symmetry {
        let symbol = SymbolType::from_code(args.symbol_type)?;
        let symmetry = transform::analyze_symmetry(&structure, &args.to_config())?;
        output::print_properties("Symmetry", &symmetry_rows(&symmetry, symbol));
    }
    Ok(())
}

fn symmetry_rows(symmetry: &SymmetryInfo, symbol: SymbolType) -> Vec<InfoRow> {
    vec![
        InfoRow::new(
            "Space group",
            format!(
                "{} (#{})",
                symmetry.spacegroup(symbol),
                symmetry.spacegroup_number
            ),
        ),
        InfoRow::new("Hall number", symmetry.hall_number),
        InfoRow::new("Point group", symmetry.point_group),
        InfoRow::new("Crystal system", symmetry.crystal_system),
        InfoRow::new("Point operations", symmetry.n_operations),
        InfoRow::new(
            "Centrosymmetric",
            if symmetry.centrosymmetric { "yes" } else { "no" },
        ),
        InfoRow::new("Primitive sites", symmetry.primitive_sites),
        InfoRow::new(
            "Primitive volume (Å³)",
            format!("{:.4}", symmetry.primitive_volume),
        ),
    ]
}

fn primitive(args: PrimitiveArgs) -> Result<()> {
    let structure = parsers::read_structure(&args.input, None)?;
    let primitive = transform::find_primitive(&structure, &args.symmetry.to_config())?;

    output::print_info(&format!(
        "{} sites -> {} sites in the primitive cell",
        structure.len(),
        primitive.len()
    ));
    write_result(&primitive, &args.output, args.format.as_deref())
}

fn orthogonal(args: OrthogonalArgs) -> Result<()> {
    let structure = parsers::read_structure(&args.input, None)?;
    let config = args.to_config();

    let spinner = progress::create_spinner("Searching for an orthogonal supercell...");
    let result = transform::find_orthogonal(&structure, &config);
    spinner.finish_and_clear();
    let supercell = result?;

    if let Some(lattice) = &supercell.lattice {
        let [a, b, c] = lattice.lengths();
        output::print_info(&format!(
            "Supercell: {} sites, a = {:.4} b = {:.4} c = {:.4} Å",
            supercell.len(),
            a,
            b,
            c
        ));
    }
    write_result(&supercell, &args.output, args.format.as_deref())
}

fn scale(args: ScaleArgs) -> Result<()> {
    let structure = parsers::read_structure(&args.input, args.from.as_deref())?;
    let scaled = transform::scale_positions(&structure)?;
    write_result(&scaled, &args.output, args.format.as_deref())
}

fn write_result(structure: &Structure, path: &Path, format: Option<&str>) -> Result<()> {
    let format = parsers::write_structure(path, structure, format, &WriteOptions::default())?;
    output::print_success(&format!("Wrote {} ({})", path.display(), format));
    Ok(())
}

/// 结构属性表
fn structure_rows(structure: &Structure) -> Vec<InfoRow> {
    let mut rows = vec![
        InfoRow::new("Name", &structure.name),
        InfoRow::new(
            "Source format",
            structure.source_format.as_deref().unwrap_or("-"),
        ),
        InfoRow::new("Formula", structure.formula()),
        InfoRow::new("Sites", structure.len()),
        InfoRow::new("Coordinates", structure.coordinates),
    ];

    match &structure.lattice {
        Some(lattice) => {
            let (a, b, c, alpha, beta, gamma) = lattice.parameters();
            rows.push(InfoRow::new("a, b, c (Å)", format!("{:.4} {:.4} {:.4}", a, b, c)));
            rows.push(InfoRow::new(
                "α, β, γ (°)",
                format!("{:.3} {:.3} {:.3}", alpha, beta, gamma),
            ));
            rows.push(InfoRow::new("Volume (Å³)", format!("{:.4}", lattice.volume().abs())));
        }
        None => rows.push(InfoRow::new("Lattice", "none (molecule)")),
    }

    let pbc: Vec<&str> = structure
        .pbc
        .iter()
        .map(|p| if *p { "T" } else { "F" })
        .collect();
    rows.push(InfoRow::new("PBC", pbc.join(" ")));

    if let Some(fixed) = &structure.metadata.fixed {
        let n = fixed.iter().filter(|f| f.iter().any(|x| *x)).count();
        rows.push(InfoRow::new("Constrained sites", n));
    }
    if let Some(magmoms) = &structure.metadata.magmoms {
        let kind = match magmoms {
            MagneticMoments::Collinear(_) => "collinear",
            MagneticMoments::Noncollinear(_) => "non-collinear",
        };
        rows.push(InfoRow::new("Magnetic moments", kind));
    }
    if structure.metadata.lattice_fixed.is_some() {
        rows.push(InfoRow::new("Lattice constraints", "yes"));
    }

    rows
}
