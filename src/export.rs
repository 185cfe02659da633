//! # CSV Export Module
//!
//! Writes the full raw dataset as `Time,Value` rows to `data_<date>.csv`.

use crate::error::ExportError;
use crate::timeseries::Dataset;
use chrono::NaiveDate;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub fn export_filename(date: NaiveDate) -> String {
    format!("data_{}.csv", date.format("%Y-%m-%d"))
}

/// Header plus one newline-terminated row per sample
pub fn write_csv<W: Write>(dataset: &Dataset, mut writer: W) -> std::io::Result<()> {
    writeln!(writer, "Time,Value")?;
    for sample in dataset.iter() {
        writeln!(writer, "{},{}", sample.time, sample.value)?;
    }
    writer.flush()
}

/// Export `dataset` for `date` into `dir`, returning the written path
pub fn export_csv(dataset: &Dataset, date: NaiveDate, dir: &Path) -> Result<PathBuf, ExportError> {
    if dataset.is_empty() {
        return Err(ExportError::EmptyDataset);
    }
    std::fs::create_dir_all(dir)?;
    let path = dir.join(export_filename(date));
    let file = File::create(&path)?;
    write_csv(dataset, BufWriter::new(file))?;
    log::info!("Exported {} samples to {}", dataset.len(), path.display());
    Ok(path)
}
