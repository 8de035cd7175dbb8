//! # 能带表格化
//!
//! 行顺序为 (自旋, 能带, k 点)，每行带 k 点坐标、路径距离与标签；
//! 投影列按模式聚合后追加在 `energy` 之后。
//!
//! ## 依赖关系
//! - 被 `electronic/mod.rs` 使用
//! - 使用 `electronic/projection.rs` 和 `models/table.rs`

use super::projection::{aggregate, ProjectionMode};
use crate::error::{DdpcError, Result};
use crate::models::{BandStructure, SpinLayout, Table};

/// 将能带数据展开为表格
pub fn tabulate_band(band: &BandStructure, mode: i64) -> Result<Table> {
    let mode = ProjectionMode::try_from(mode)?;
    if mode != ProjectionMode::Total && !band.has_projections() {
        return Err(DdpcError::NoProjectionDataAvailable {
            path: "band structure".to_string(),
        });
    }

    let nkpt = band.nkpoints();
    let nbands = band.nbands;
    let n_channels = band.spin.n_channels();
    let n_rows = n_channels * nbands * nkpt;
    let distances = band.distances();

    let mut spin = Vec::with_capacity(n_rows);
    let mut band_index = Vec::with_capacity(n_rows);
    let mut kpoint_index = Vec::with_capacity(n_rows);
    let mut labels = Vec::with_capacity(n_rows);
    let mut kx = Vec::with_capacity(n_rows);
    let mut ky = Vec::with_capacity(n_rows);
    let mut kz = Vec::with_capacity(n_rows);
    let mut dist = Vec::with_capacity(n_rows);
    let mut energy = Vec::with_capacity(n_rows);

    for channel in 0..n_channels {
        let label = band.spin.channel_label(channel).unwrap_or("");
        for b in 0..nbands {
            for k in 0..nkpt {
                spin.push(label.to_string());
                band_index.push((b + 1) as i64);
                kpoint_index.push((k + 1) as i64);
                labels.push(band.labels[k].clone());
                kx.push(band.kpoints[k][0]);
                ky.push(band.kpoints[k][1]);
                kz.push(band.kpoints[k][2]);
                dist.push(distances[k]);
                energy.push(band.energy(channel, b, k));
            }
        }
    }

    let mut table = Table::new();
    if band.spin == SpinLayout::Collinear {
        table.push_text("spin", spin)?;
    }
    table.push_int("band", band_index)?;
    table.push_int("kpoint", kpoint_index)?;
    table.push_text("label", labels)?;
    table.push_float("kx", kx)?;
    table.push_float("ky", ky)?;
    table.push_float("kz", kz)?;
    table.push_float("dist", dist)?;
    table.push_float("energy", energy)?;

    if let Some(set) = band.projections.as_ref().filter(|_| mode != ProjectionMode::Total) {
        for column in aggregate(set, mode, nbands * nkpt, "band structure")? {
            let mut values = Vec::with_capacity(n_rows);
            for weights in &column.channels {
                for b in 0..nbands {
                    for k in 0..nkpt {
                        values.push(weights[b + k * nbands]);
                    }
                }
            }
            table.push_float(column.name, values)?;
        }
    }

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::electronic::json::{fixtures, parse_band_json};
    use crate::models::ColumnData;

    fn load(nkpt: usize, nbands: usize, collinear: bool, projected: bool) -> BandStructure {
        parse_band_json(
            &fixtures::band(nkpt, nbands, collinear, projected).to_string(),
            "band.json",
        )
        .unwrap()
    }

    #[test]
    fn test_total_band_rows_and_columns() {
        let table = tabulate_band(&load(10, 8, false, false), 0).unwrap();
        assert_eq!(table.n_rows(), 80);
        assert_eq!(
            table.column_names(),
            vec!["band", "kpoint", "label", "kx", "ky", "kz", "dist", "energy"]
        );

        // 第二行：band 1, kpoint 2
        assert_eq!(table.cell(1, 0).unwrap(), "1");
        assert_eq!(table.cell(1, 1).unwrap(), "2");
        match table.column("energy").unwrap() {
            // E(b=0, k=1) = 0 + 1 * 8
            ColumnData::Float(v) => assert_eq!(v[1], 8.0),
            _ => panic!("energy should be float"),
        }
        match table.column("dist").unwrap() {
            ColumnData::Float(v) => assert!((v[9] - 0.9).abs() < 1e-9),
            _ => panic!("dist should be float"),
        }
    }

    #[test]
    fn test_collinear_adds_spin_rows() {
        let table = tabulate_band(&load(4, 3, true, false), 0).unwrap();
        assert_eq!(table.n_rows(), 24);
        assert_eq!(table.column_names()[0], "spin");
        assert_eq!(table.cell(0, 0).unwrap(), "up");
        assert_eq!(table.cell(12, 0).unwrap(), "down");
    }

    #[test]
    fn test_projection_columns() {
        let table = tabulate_band(&load(4, 3, true, true), 5).unwrap();
        assert_eq!(table.n_rows(), 24);
        let names = table.column_names();
        assert_eq!(&names[9..], &["1s", "1dxy", "2py"]);

        match table.column("1dxy").unwrap() {
            ColumnData::Float(v) => {
                assert!((v[0] - 0.2).abs() < 1e-12);
                assert!((v[12] - 0.4).abs() < 1e-12);
            }
            _ => panic!("projection should be float"),
        }

        let by_atom = tabulate_band(&load(4, 3, true, true), 7).unwrap();
        assert_eq!(&by_atom.column_names()[9..], &["1", "2"]);
        assert_eq!(by_atom.n_rows(), 24);
    }

    #[test]
    fn test_mode_zero_ignores_projections() {
        let table = tabulate_band(&load(4, 3, false, true), 0).unwrap();
        assert_eq!(table.n_columns(), 8);
    }

    #[test]
    fn test_projection_mode_without_data() {
        assert!(matches!(
            tabulate_band(&load(10, 8, false, false), 1),
            Err(DdpcError::NoProjectionDataAvailable { .. })
        ));
    }

    #[test]
    fn test_invalid_mode_checked_first() {
        assert!(matches!(
            tabulate_band(&load(2, 2, false, false), 9),
            Err(DdpcError::InvalidProjectionMode(9))
        ));
    }
}
