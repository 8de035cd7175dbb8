//! # data 子命令实现
//!
//! 读取能带/态密度容器，展开为表格后导出或预览。
//! 费米能级平移只在这里按 `--shift-fermi` 进行。
//!
//! ## 依赖关系
//! - 使用 `cli/data.rs` 定义的参数
//! - 使用 `electronic/` 提取与导出
//! - 使用 `utils/output.rs`

use crate::cli::data::{
    DataArgs, DataCommands, DataInfoArgs, DatasetArgs, DatasetCommands, ExportFormat, ReadArgs,
};
use crate::electronic::{self, ContainerFormat, CsvOptions, ProjectionMode};
use crate::error::{DdpcError, Result};
use crate::models::{ProjectionSet, Table};
use crate::utils::output::{self, InfoRow};

use std::path::Path;

/// 预览的行数与列数
const PREVIEW_ROWS: usize = 5;
const PREVIEW_COLS: usize = 6;

/// 数据集种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dataset {
    Band,
    Dos,
}

impl Dataset {
    fn title(&self) -> &'static str {
        match self {
            Dataset::Band => "Band structure",
            Dataset::Dos => "Density of states",
        }
    }
}

/// 执行 data 子命令
pub fn execute(args: DataArgs) -> Result<()> {
    match args.command {
        DataCommands::Band(args) => dataset(Dataset::Band, args),
        DataCommands::Dos(args) => dataset(Dataset::Dos, args),
    }
}

fn dataset(kind: Dataset, args: DatasetArgs) -> Result<()> {
    match args.command {
        DatasetCommands::Read(args) => read(kind, args),
        DatasetCommands::Info(args) => info(kind, args),
    }
}

/// 未指定模式时的默认投影模式
fn default_mode(has_projections: bool) -> i64 {
    if has_projections {
        ProjectionMode::AtomOrbital.code()
    } else {
        ProjectionMode::Total.code()
    }
}

/// 读取并展开为表格，返回 (表格, 费米能级, 实际模式)
fn extract(kind: Dataset, path: &Path, mode: Option<i64>) -> Result<(Table, f64, i64)> {
    match (kind, mode) {
        (Dataset::Band, Some(mode)) => {
            let (table, efermi, _) = electronic::read_band(path, mode)?;
            Ok((table, efermi, mode))
        }
        (Dataset::Dos, Some(mode)) => {
            let (table, efermi, _) = electronic::read_dos(path, mode)?;
            Ok((table, efermi, mode))
        }
        (Dataset::Band, None) => {
            let band = electronic::load_band(path)?;
            let mode = default_mode(band.has_projections());
            Ok((electronic::tabulate_band(&band, mode)?, band.fermi_energy, mode))
        }
        (Dataset::Dos, None) => {
            let dos = electronic::load_dos(path)?;
            let mode = default_mode(dos.has_projections());
            Ok((electronic::tabulate_dos(&dos, mode)?, dos.fermi_energy, mode))
        }
    }
}

/// 导出格式：显式指定优先，其次看扩展名，默认 CSV
fn resolve_export_format(path: &Path, explicit: Option<ExportFormat>) -> ExportFormat {
    explicit.unwrap_or_else(|| {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .as_deref()
        {
            Some("npz") => ExportFormat::Npz,
            _ => ExportFormat::Csv,
        }
    })
}

fn csv_options(args: &ReadArgs) -> Result<CsvOptions> {
    if !args.delimiter.is_ascii() {
        return Err(DdpcError::InvalidArgument(format!(
            "CSV delimiter must be a single ASCII character, got '{}'",
            args.delimiter
        )));
    }
    Ok(CsvOptions {
        delimiter: args.delimiter as u8,
        header: !args.no_header,
    })
}

fn read(kind: Dataset, args: ReadArgs) -> Result<()> {
    let (mut table, efermi, mode) = extract(kind, &args.input, args.mode)?;
    let mode = ProjectionMode::try_from(mode)?;
    log::debug!("Tabulated {} rows with mode {}", table.n_rows(), mode);

    if args.shift_fermi {
        table.shift("energy", -efermi)?;
    }

    let Some(path) = args.output.as_deref() else {
        output::print_header(&format!("{}: {}", kind.title(), args.input.display()));
        println!("{}", output::preview_table(&table, PREVIEW_ROWS, PREVIEW_COLS));
        output::print_info(&format!(
            "{} rows x {} columns, mode {}; use -o to export",
            table.n_rows(),
            table.n_columns(),
            mode
        ));
        return Ok(());
    };

    let format = resolve_export_format(path, args.format);
    match format {
        ExportFormat::Csv => electronic::to_csv(&table, path, &csv_options(&args)?)?,
        ExportFormat::Npz => electronic::to_npz(&table, path, !args.uncompressed)?,
    }

    output::print_success(&format!(
        "Wrote {} rows x {} columns to {} ({}, mode {})",
        table.n_rows(),
        table.n_columns(),
        path.display(),
        format,
        mode
    ));
    Ok(())
}

fn projection_rows(projections: Option<&ProjectionSet>, has_projections: bool) -> Vec<InfoRow> {
    let mut rows = vec![InfoRow::new(
        "Projections",
        if has_projections { "yes" } else { "no" },
    )];
    if let Some(set) = projections.filter(|_| has_projections) {
        rows.push(InfoRow::new("Orbitals", set.orbitals.join(" ")));
        if !set.elements.is_empty() {
            rows.push(InfoRow::new("Atoms", set.elements.len()));
        }
    }
    rows.push(InfoRow::new(
        "Default mode",
        ProjectionMode::try_from(default_mode(has_projections))
            .map(|m| m.to_string())
            .unwrap_or_default(),
    ));
    rows
}

fn info(kind: Dataset, args: DataInfoArgs) -> Result<()> {
    let container = ContainerFormat::detect(&args.input)?;
    let mut rows = vec![InfoRow::new("Container", container)];

    match kind {
        Dataset::Band => {
            let band = electronic::load_band(&args.input)?;
            let labels: Vec<&str> = band
                .labels
                .iter()
                .filter(|l| !l.is_empty())
                .map(|l| l.as_str())
                .collect();
            rows.push(InfoRow::new("Spin", band.spin));
            rows.push(InfoRow::new("Fermi energy (eV)", format!("{:.4}", band.fermi_energy)));
            rows.push(InfoRow::new("K-points", band.nkpoints()));
            rows.push(InfoRow::new("Bands", band.nbands));
            if !labels.is_empty() {
                rows.push(InfoRow::new("High-symmetry points", labels.join(" ")));
            }
            rows.extend(projection_rows(band.projections.as_ref(), band.has_projections()));
        }
        Dataset::Dos => {
            let dos = electronic::load_dos(&args.input)?;
            rows.push(InfoRow::new("Spin", dos.spin));
            rows.push(InfoRow::new("Fermi energy (eV)", format!("{:.4}", dos.fermi_energy)));
            rows.push(InfoRow::new("Energy points", dos.energies.len()));
            if let (Some(lo), Some(hi)) = (dos.energies.first(), dos.energies.last()) {
                rows.push(InfoRow::new("Energy range (eV)", format!("{:.4} .. {:.4}", lo, hi)));
            }
            rows.extend(projection_rows(dos.projections.as_ref(), dos.has_projections()));
        }
    }

    output::print_properties(
        &format!("{}: {}", kind.title(), args.input.display()),
        &rows,
    );
    Ok(())
}
