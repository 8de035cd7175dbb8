//! # 态密度表格化
//!
//! 行顺序为 (自旋, 能量点)，列为 `energy`、`dos` 与按模式聚合的投影列。
//!
//! ## 依赖关系
//! - 被 `electronic/mod.rs` 使用
//! - 使用 `electronic/projection.rs` 和 `models/table.rs`

use super::projection::{aggregate, ProjectionMode};
use crate::error::{DdpcError, Result};
use crate::models::{DensityOfStates, SpinLayout, Table};

/// 将态密度数据展开为表格
pub fn tabulate_dos(dos: &DensityOfStates, mode: i64) -> Result<Table> {
    let mode = ProjectionMode::try_from(mode)?;
    if mode != ProjectionMode::Total && !dos.has_projections() {
        return Err(DdpcError::NoProjectionDataAvailable {
            path: "density of states".to_string(),
        });
    }

    let n = dos.energies.len();
    let n_channels = dos.spin.n_channels();

    let mut spin = Vec::with_capacity(n * n_channels);
    let mut energy = Vec::with_capacity(n * n_channels);
    let mut total = Vec::with_capacity(n * n_channels);
    for (channel, densities) in dos.densities.iter().enumerate() {
        let label = dos.spin.channel_label(channel).unwrap_or("");
        spin.extend(std::iter::repeat(label.to_string()).take(n));
        energy.extend_from_slice(&dos.energies);
        total.extend_from_slice(densities);
    }

    let mut table = Table::new();
    if dos.spin == SpinLayout::Collinear {
        table.push_text("spin", spin)?;
    }
    table.push_float("energy", energy)?;
    table.push_float("dos", total)?;

    if let Some(set) = dos.projections.as_ref().filter(|_| mode != ProjectionMode::Total) {
        for column in aggregate(set, mode, n, "density of states")? {
            table.push_float(column.name, column.channels.concat())?;
        }
    }

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::electronic::json::{fixtures, parse_dos_json};
    use crate::models::ColumnData;

    fn load(npoints: usize, collinear: bool, projected: bool) -> DensityOfStates {
        parse_dos_json(&fixtures::dos(npoints, collinear, projected).to_string(), "dos.json")
            .unwrap()
    }

    #[test]
    fn test_total_dos() {
        let table = tabulate_dos(&load(5, false, false), 0).unwrap();
        assert_eq!(table.n_rows(), 5);
        assert_eq!(table.column_names(), vec!["energy", "dos"]);
        assert_eq!(table.cell(0, 0).unwrap(), "-5");
    }

    #[test]
    fn test_collinear_dos_rows() {
        let table = tabulate_dos(&load(5, true, false), 0).unwrap();
        assert_eq!(table.n_rows(), 10);
        assert_eq!(table.column_names(), vec!["spin", "energy", "dos"]);
        assert_eq!(table.cell(5, 0).unwrap(), "down");
        assert_eq!(table.cell(5, 2).unwrap(), "2");
    }

    #[test]
    fn test_t2g_eg_mode() {
        let table = tabulate_dos(&load(4, true, true), 6).unwrap();
        assert_eq!(table.n_rows(), 8);
        assert_eq!(&table.column_names()[3..], &["1t2g", "1eg"]);
        match table.column("1eg").unwrap() {
            ColumnData::Float(v) => {
                assert!((v[0] - 0.25).abs() < 1e-12);
                assert!((v[4] - 0.5).abs() < 1e-12);
            }
            _ => panic!("projection should be float"),
        }
    }

    #[test]
    fn test_element_spdf_mode() {
        let table = tabulate_dos(&load(3, false, true), 2).unwrap();
        assert_eq!(&table.column_names()[2..], &["Fe-d", "O-s"]);
        match table.column("Fe-d").unwrap() {
            ColumnData::Float(v) => assert!((v[0] - 0.75).abs() < 1e-12),
            _ => panic!("projection should be float"),
        }
    }

    #[test]
    fn test_every_mode_keeps_row_count() {
        let dos = load(6, true, true);
        for mode in 0..=7 {
            assert_eq!(tabulate_dos(&dos, mode).unwrap().n_rows(), 12);
        }
    }

    #[test]
    fn test_projection_mode_without_data() {
        assert!(matches!(
            tabulate_dos(&load(3, false, false), 4),
            Err(DdpcError::NoProjectionDataAvailable { .. })
        ));
    }
}
