//! CSV ingest for trial-level behavioral data.
//!
//! Expected columns (header names are trimmed and matched case-insensitively):
//!
//! - `subj_idx`: integer subject id
//! - `rt`: response time in seconds (> 0)
//! - `response`: 0 (lower boundary) or 1 (upper boundary)
//! - the condition column (default `conf`), any non-empty label
//!
//! Extra columns are ignored. Unlike a lenient loader, every row must parse:
//! the first bad row aborts the load with its line number.

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use csv::StringRecord;

use crate::domain::{Dataset, Trial};
use crate::error::AppError;

/// Load `path` into a validated `Dataset`.
pub fn load_dataset(path: &Path, condition_column: &str) -> Result<Dataset, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::data(format!("Failed to open CSV '{}': {e}", path.display())))?;

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers = reader
        .headers()
        .map_err(|e| AppError::data(format!("Failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);

    let condition = normalize_header_name(condition_column);
    let columns = Columns {
        subject: require_column(&header_map, "subj_idx")?,
        rt: require_column(&header_map, "rt")?,
        response: require_column(&header_map, "response")?,
        condition: require_column(&header_map, &condition)?,
    };

    let mut trials = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        // Line 1 is the header.
        let line = idx + 2;
        let record = result
            .map_err(|e| AppError::data(format!("Line {line}: CSV parse error: {e}")))?;
        let trial = parse_row(&record, &columns)
            .map_err(|msg| AppError::data(format!("Line {line}: {msg}")))?;
        trials.push(trial);
    }

    if trials.is_empty() {
        return Err(AppError::data(format!(
            "CSV '{}' contains no data rows.",
            path.display()
        )));
    }
    Dataset::new(trials)
}

struct Columns {
    subject: usize,
    rt: usize,
    response: usize,
    condition: usize,
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    let mut map = HashMap::new();
    for (idx, name) in headers.iter().enumerate() {
        // First occurrence wins for duplicated headers.
        map.entry(normalize_header_name(name)).or_insert(idx);
    }
    map
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports often prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn require_column(header_map: &HashMap<String, usize>, name: &str) -> Result<usize, AppError> {
    header_map
        .get(name)
        .copied()
        .ok_or_else(|| AppError::data(format!("Missing required column: `{name}`")))
}

fn parse_row(record: &StringRecord, columns: &Columns) -> Result<Trial, String> {
    let subject = parse_subject(get_required(record, columns.subject, "subj_idx")?)?;

    let rt_raw = get_required(record, columns.rt, "rt")?;
    let rt = rt_raw
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v > 0.0)
        .ok_or_else(|| format!("`rt` must be a positive number, got `{rt_raw}`."))?;

    let response = parse_response(get_required(record, columns.response, "response")?)?;
    let condition = get_required(record, columns.condition, "condition")?.to_string();

    Ok(Trial {
        subject,
        rt,
        response,
        condition,
    })
}

fn get_required<'a>(record: &'a StringRecord, idx: usize, name: &str) -> Result<&'a str, String> {
    record
        .get(idx)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("Missing required value: `{name}`"))
}

/// Subject ids are integers; exports from numeric tools may write `3.0`.
fn parse_subject(s: &str) -> Result<u32, String> {
    if let Ok(id) = s.parse::<u32>() {
        return Ok(id);
    }
    match s.parse::<f64>() {
        Ok(v) if v.fract() == 0.0 && v >= 0.0 && v <= u32::MAX as f64 => Ok(v as u32),
        _ => Err(format!("`subj_idx` must be a non-negative integer, got `{s}`.")),
    }
}

fn parse_response(s: &str) -> Result<u8, String> {
    match s.parse::<f64>() {
        Ok(v) if v == 0.0 => Ok(0),
        Ok(v) if v == 1.0 => Ok(1),
        _ => Err(format!("`response` must be 0 or 1, got `{s}`.")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_valid_rows_and_ignores_extra_columns() {
        let file = write_csv(
            "\u{feff}Subj_Idx, stim ,rt,response,theta,conf\n\
             0,LL,1.21,1.0,0.65,HC\n\
             0,WL,0.55,0.0,-0.3,LC\n\
             3,WW,0.80,1,0.1,HC\n",
        );
        let ds = load_dataset(file.path(), "conf").unwrap();
        assert_eq!(ds.len(), 3);
        assert_eq!(ds.subjects(), &[0, 3]);
        assert_eq!(ds.conditions(), &["HC".to_string(), "LC".to_string()]);
        assert_eq!(ds.trials()[1].response, 0);
        assert_eq!(ds.trials()[2].rt, 0.80);
    }

    #[test]
    fn custom_condition_column_is_case_insensitive() {
        let file = write_csv("subj_idx,rt,response,Stim\n1,0.5,1,WW\n");
        let ds = load_dataset(file.path(), "STIM").unwrap();
        assert_eq!(ds.conditions(), &["WW".to_string()]);
    }

    #[test]
    fn missing_column_is_a_data_error() {
        let file = write_csv("subj_idx,rt,conf\n1,0.5,HC\n");
        let err = load_dataset(file.path(), "conf").unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_DATA);
        assert!(err.message().contains("response"));
    }

    #[test]
    fn bad_row_reports_its_line() {
        let file = write_csv("subj_idx,rt,response,conf\n1,0.5,1,HC\n1,-0.2,0,LC\n");
        let err = load_dataset(file.path(), "conf").unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_DATA);
        assert!(err.message().starts_with("Line 3"), "{}", err.message());
    }

    #[test]
    fn rejects_invalid_response_codes() {
        let file = write_csv("subj_idx,rt,response,conf\n1,0.5,2,HC\n");
        assert!(load_dataset(file.path(), "conf").is_err());
    }

    #[test]
    fn header_only_file_is_rejected() {
        let file = write_csv("subj_idx,rt,response,conf\n");
        let err = load_dataset(file.path(), "conf").unwrap_err();
        assert!(err.message().contains("no data rows"));
    }

    #[test]
    fn missing_file_is_a_data_error() {
        let err = load_dataset(Path::new("/nonexistent/trials.csv"), "conf").unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_DATA);
    }

    #[test]
    fn float_subject_ids_are_accepted() {
        assert_eq!(parse_subject("4.0"), Ok(4));
        assert!(parse_subject("4.5").is_err());
        assert!(parse_subject("-1").is_err());
    }
}
