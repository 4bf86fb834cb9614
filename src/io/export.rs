//! Write comparison tables to CSV.
//!
//! One file per criterion, named `Mod_Comp_<criterion>_<runtime>.csv`. Each
//! file starts with an unnamed 0-based row-index column so spreadsheet users
//! can re-sort and still recover the ranking order.

use std::fs::File;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::domain::{ComparisonRow, ComparisonSet, ComparisonTable, Criterion, RowDiagnostics};
use crate::error::AppError;

/// LOO and WAIC values are reported on the elpd (log) scale.
const IC_SCALE: &str = "log";

#[derive(Serialize)]
struct DicRecord<'a> {
    index: usize,
    model: &'a str,
    rank: usize,
    value: f64,
    p_d: f64,
    d_bar: f64,
}

#[derive(Serialize)]
struct IcRecord<'a> {
    index: usize,
    model: &'a str,
    rank: usize,
    value: f64,
    p: f64,
    elpd_diff: f64,
    weight: f64,
    se: f64,
    dse: f64,
    warning: bool,
    scale: &'static str,
}

/// `<out_dir>/Mod_Comp_<criterion>_<runtime>.csv`
pub fn report_path(out_dir: &Path, criterion: Criterion, runtime_id: &str) -> PathBuf {
    out_dir.join(format!("Mod_Comp_{}_{runtime_id}.csv", criterion.as_str()))
}

/// Header row for `criterion`, leading empty column included.
pub fn header(criterion: Criterion) -> Vec<&'static str> {
    let mut cols = vec!["", "model", "rank", criterion.value_column(), criterion.penalty_column()];
    match criterion {
        Criterion::Dic => cols.push("d_bar"),
        Criterion::Loo | Criterion::Waic => {
            cols.extend(["elpd_diff", "weight", "se", "dse", "warning", "scale"]);
        }
    }
    cols
}

/// Write one table to `path`, replacing any existing file.
pub fn write_comparison_csv(path: &Path, table: &ComparisonTable) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::io(format!("Failed to create report '{}': {e}", path.display())))?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);

    let write_err =
        |e: csv::Error| AppError::io(format!("Failed to write report '{}': {e}", path.display()));

    writer
        .write_record(header(table.criterion))
        .map_err(write_err)?;
    for (index, row) in table.rows.iter().enumerate() {
        write_row(&mut writer, index, row).map_err(write_err)?;
    }
    writer
        .flush()
        .map_err(|e| AppError::io(format!("Failed to flush report '{}': {e}", path.display())))?;
    Ok(())
}

fn write_row<W: std::io::Write>(
    writer: &mut csv::Writer<W>,
    index: usize,
    row: &ComparisonRow,
) -> Result<(), csv::Error> {
    let model = row.model.as_str();
    match row.diagnostics {
        RowDiagnostics::Dic { p_d, d_bar } => writer.serialize(DicRecord {
            index,
            model,
            rank: row.rank,
            value: row.value,
            p_d,
            d_bar,
        }),
        RowDiagnostics::Ic {
            p,
            elpd_diff,
            weight,
            se,
            dse,
            warning,
        } => writer.serialize(IcRecord {
            index,
            model,
            rank: row.rank,
            value: row.value,
            p,
            elpd_diff,
            weight,
            se,
            dse,
            warning,
            scale: IC_SCALE,
        }),
    }
}

/// Write the DIC, LOO and WAIC reports; returns the paths in that order.
///
/// The output directory must already exist.
pub fn write_reports(
    out_dir: &Path,
    runtime_id: &str,
    tables: &ComparisonSet,
) -> Result<Vec<PathBuf>, AppError> {
    if !out_dir.is_dir() {
        return Err(AppError::io(format!(
            "Output directory '{}' does not exist.",
            out_dir.display()
        )));
    }

    let mut paths = Vec::with_capacity(3);
    for table in [&tables.dic, &tables.loo, &tables.waic] {
        let path = report_path(out_dir, table.criterion, runtime_id);
        write_comparison_csv(&path, table)?;
        paths.push(path);
    }
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ModelKey;

    fn dic_table() -> ComparisonTable {
        ComparisonTable {
            criterion: Criterion::Dic,
            rows: vec![
                ComparisonRow {
                    model: ModelKey::Ms2,
                    rank: 0,
                    value: 101.5,
                    diagnostics: RowDiagnostics::Dic { p_d: 3.25, d_bar: 98.25 },
                },
                ComparisonRow {
                    model: ModelKey::Ms0,
                    rank: 1,
                    value: 104.0,
                    diagnostics: RowDiagnostics::Dic { p_d: 2.0, d_bar: 102.0 },
                },
            ],
        }
    }

    fn loo_table() -> ComparisonTable {
        ComparisonTable {
            criterion: Criterion::Loo,
            rows: vec![ComparisonRow {
                model: ModelKey::Ms5,
                rank: 0,
                value: -50.5,
                diagnostics: RowDiagnostics::Ic {
                    p: 4.5,
                    elpd_diff: 0.0,
                    weight: 1.0,
                    se: 3.0,
                    dse: 0.0,
                    warning: false,
                },
            }],
        }
    }

    #[test]
    fn report_names_include_criterion_and_runtime() {
        let path = report_path(Path::new("out"), Criterion::Waic, "run7");
        assert_eq!(path, Path::new("out").join("Mod_Comp_waic_run7.csv"));
    }

    #[test]
    fn dic_file_has_index_column_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dic.csv");
        write_comparison_csv(&path, &dic_table()).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            ",model,rank,dic,p_d,d_bar\n0,ms2,0,101.5,3.25,98.25\n1,ms0,1,104.0,2.0,102.0\n"
        );
    }

    #[test]
    fn ic_file_carries_warning_and_scale() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loo.csv");
        write_comparison_csv(&path, &loo_table()).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some(",model,rank,elpd_loo,p_loo,elpd_diff,weight,se,dse,warning,scale")
        );
        assert_eq!(lines.next(), Some("0,ms5,0,-50.5,4.5,0.0,1.0,3.0,0.0,false,log"));
    }

    #[test]
    fn rewriting_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dic.csv");
        write_comparison_csv(&path, &dic_table()).unwrap();
        let first = std::fs::read(&path).unwrap();
        write_comparison_csv(&path, &dic_table()).unwrap();
        assert_eq!(first, std::fs::read(&path).unwrap());
    }

    #[test]
    fn missing_output_directory_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let set = ComparisonSet {
            dic: dic_table(),
            loo: loo_table(),
            waic: ComparisonTable {
                criterion: Criterion::Waic,
                rows: loo_table().rows,
            },
        };
        let err = write_reports(&dir.path().join("missing"), "x", &set).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_IO);

        let paths = write_reports(dir.path(), "x", &set).unwrap();
        assert_eq!(paths.len(), 3);
        assert!(paths.iter().all(|p| p.exists()));
    }
}
