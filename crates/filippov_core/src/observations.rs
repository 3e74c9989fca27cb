//! Observed case counts and their comparison with a simulated curve.

use anyhow::{bail, Context, Result};
use csv::{Reader, Writer};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;

/// One row of an observation file with columns `dia,Casos`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    #[serde(rename = "dia")]
    pub day: f64,
    #[serde(rename = "Casos")]
    pub cases: f64,
}

pub fn load_observations<P: AsRef<Path>>(path: P) -> Result<Vec<Observation>> {
    let path = path.as_ref();
    let reader = Reader::from_path(path)
        .with_context(|| format!("Failed to open observation file {}", path.display()))?;
    collect_observations(reader)
        .with_context(|| format!("Failed to read observation file {}", path.display()))
}

pub fn read_observations<R: Read>(source: R) -> Result<Vec<Observation>> {
    collect_observations(Reader::from_reader(source))
}

fn collect_observations<R: Read>(mut reader: Reader<R>) -> Result<Vec<Observation>> {
    let mut observations = Vec::new();
    for (line, result) in reader.deserialize().enumerate() {
        let row: Observation = result.with_context(|| format!("Invalid record {}", line + 1))?;
        observations.push(row);
    }
    if observations.is_empty() {
        bail!("Observation data contains no rows.");
    }
    Ok(observations)
}

/// Piecewise-linear interpolation of `(xp, fp)` at `x`, clamped to the end
/// values outside `[xp[0], xp[n-1]]`. `xp` must be non-decreasing.
pub fn interp(x: f64, xp: &[f64], fp: &[f64]) -> f64 {
    let n = xp.len().min(fp.len());
    if n == 0 {
        return f64::NAN;
    }
    if x <= xp[0] {
        return fp[0];
    }
    if x >= xp[n - 1] {
        return fp[n - 1];
    }
    // First index with xp[i] > x; 1 <= i <= n - 1 here.
    let i = xp[..n].partition_point(|&v| v <= x);
    let (x0, x1) = (xp[i - 1], xp[i]);
    let (f0, f1) = (fp[i - 1], fp[i]);
    if x1 == x0 {
        return f1;
    }
    f0 + (f1 - f0) * (x - x0) / (x1 - x0)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ErrorRow {
    pub day: f64,
    pub observed: f64,
    pub model: f64,
    pub abs_error: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FitSummary {
    pub last_day: f64,
    pub observed: f64,
    pub model: f64,
    pub abs_error: f64,
    /// `(tf - t0) / n` of the simulation grid.
    pub step: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Comparison {
    pub rows: Vec<ErrorRow>,
    pub summary: FitSummary,
}

/// Compares observations against a model curve sampled at `model_t`.
pub fn compare(
    observations: &[Observation],
    model_t: &[f64],
    model_values: &[f64],
) -> Result<Comparison> {
    if model_t.len() != model_values.len() || model_t.len() < 2 {
        bail!(
            "Model curve needs matching times and values (got {} and {}).",
            model_t.len(),
            model_values.len()
        );
    }
    let Some(last) = observations.last() else {
        bail!("No observations to compare.");
    };

    let rows: Vec<ErrorRow> = observations
        .iter()
        .map(|obs| {
            let model = interp(obs.day, model_t, model_values);
            ErrorRow {
                day: obs.day,
                observed: obs.cases,
                model,
                abs_error: (obs.cases - model).abs(),
            }
        })
        .collect();

    let t0 = model_t[0];
    let tf = model_t[model_t.len() - 1];
    let model = interp(last.day, model_t, model_values);
    let summary = FitSummary {
        last_day: last.day,
        observed: last.cases,
        model,
        abs_error: (model - last.cases).abs(),
        step: (tf - t0) / model_t.len() as f64,
    };
    Ok(Comparison { rows, summary })
}

pub fn write_error_table<P: AsRef<Path>>(rows: &[ErrorRow], path: P) -> Result<()> {
    let mut writer = Writer::from_path(path.as_ref())
        .with_context(|| format!("Failed to create {}", path.as_ref().display()))?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{compare, interp, load_observations, read_observations, write_error_table};
    use std::io::Write;

    const SAMPLE: &str = "dia,Casos\n3,25\n4,75\n5,227\n6,296\n";

    #[test]
    fn interp_clamps_ends_and_interpolates_inside() {
        let xp = [0.0, 1.0, 3.0];
        let fp = [0.0, 10.0, 30.0];
        assert_eq!(interp(-1.0, &xp, &fp), 0.0);
        assert_eq!(interp(5.0, &xp, &fp), 30.0);
        assert_eq!(interp(0.5, &xp, &fp), 5.0);
        assert_eq!(interp(2.0, &xp, &fp), 20.0);
        assert_eq!(interp(1.0, &xp, &fp), 10.0);
        assert!(interp(1.0, &[], &[]).is_nan());
    }

    #[test]
    fn reads_rows_with_spanish_headers() {
        let rows = read_observations(SAMPLE.as_bytes()).expect("valid csv");
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].day, 3.0);
        assert_eq!(rows[3].cases, 296.0);
    }

    #[test]
    fn missing_columns_and_empty_files_are_errors() {
        assert!(read_observations("day,cases\n1,2\n".as_bytes()).is_err());
        let err = read_observations("dia,Casos\n".as_bytes()).expect_err("no rows");
        assert!(err.to_string().contains("no rows"));
    }

    #[test]
    fn compare_builds_error_table_and_summary() {
        let rows = read_observations(SAMPLE.as_bytes()).expect("valid csv");
        let t: Vec<f64> = (0..=12).map(|i| i as f64 * 0.5).collect();
        let values: Vec<f64> = t.iter().map(|d| 50.0 * d).collect();
        let cmp = compare(&rows, &t, &values).expect("comparison");
        assert_eq!(cmp.rows.len(), 4);
        assert_eq!(cmp.rows[0].model, 150.0);
        assert_eq!(cmp.rows[0].abs_error, 125.0);
        assert_eq!(cmp.summary.last_day, 6.0);
        assert_eq!(cmp.summary.abs_error, 4.0);
        assert!((cmp.summary.step - 6.0 / 13.0).abs() < 1e-12);
        assert!(compare(&rows, &t[..1], &values[..1]).is_err());
    }

    #[test]
    fn file_round_trip_through_tempdir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("influenza.csv");
        let mut file = std::fs::File::create(&input).expect("create csv");
        file.write_all(SAMPLE.as_bytes()).expect("write csv");
        drop(file);

        let rows = load_observations(&input).expect("load csv");
        let cmp = compare(&rows, &[0.0, 10.0], &[0.0, 100.0]).expect("comparison");
        let output = dir.path().join("errors.csv");
        write_error_table(&cmp.rows, &output).expect("write table");
        let text = std::fs::read_to_string(&output).expect("read table");
        assert!(text.starts_with("day,observed,model,abs_error"));
        assert_eq!(text.lines().count(), 5);

        let err = load_observations(dir.path().join("missing.csv")).expect_err("missing file");
        assert!(err.to_string().contains("missing.csv"));
    }
}
