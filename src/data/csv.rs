//! CSV format dataset implementation
//!
//! Supports loading datasets from CSV files where:
//! - The last column is the label (kept as written)
//! - All other columns are features
//! - First row can be headers (automatically detected)

use crate::core::{Dataset, Result, SVMError, Sample, SparseVector};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Dataset implementation for CSV format files
#[derive(Debug, Clone)]
pub struct CSVDataset {
    samples: Vec<Sample>,
    dimensions: usize,
}

impl CSVDataset {
    /// Load a dataset from a CSV file
    ///
    /// The last column is assumed to be the label.
    /// Headers are automatically detected if present.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path).map_err(SVMError::IoError)?;
        let reader = BufReader::new(file);
        Self::from_reader(reader)
    }

    /// Load a dataset from a reader, detecting a header row
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        Self::from_reader_with_options(reader, true)
    }

    /// Load a dataset from a reader with explicit header option
    pub fn from_reader_with_options<R: BufRead>(reader: R, auto_detect_header: bool) -> Result<Self> {
        let mut samples = Vec::new();
        let mut columns: Option<usize> = None;
        let mut first_data_line = true;

        for (line_num, line) in reader.lines().enumerate() {
            let line = line.map_err(SVMError::IoError)?;
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if first_data_line {
                first_data_line = false;
                if auto_detect_header && Self::is_header_line(line) {
                    continue;
                }
            }

            let (sample, n_fields) = Self::parse_data_line(line).map_err(|e| {
                SVMError::ParseError(format!("Error parsing line {}: {}", line_num + 1, e))
            })?;
            match columns {
                Some(expected) if expected != n_fields => {
                    return Err(SVMError::DimensionMismatch {
                        expected,
                        actual: n_fields,
                    });
                }
                _ => columns = Some(n_fields),
            }
            samples.push(sample);
        }

        if samples.is_empty() {
            return Err(SVMError::EmptyDataset);
        }

        // Every row has the same number of feature columns, zeros included
        let dimensions = columns.map_or(0, |n| n - 1);
        Ok(CSVDataset {
            samples,
            dimensions,
        })
    }

    /// Check if a line appears to be a header
    fn is_header_line(line: &str) -> bool {
        let fields: Vec<&str> = line.split(',').collect();

        if fields.len() < 2 {
            return false;
        }

        // Most feature columns fail to parse as numbers
        let non_numeric_count = fields
            .iter()
            .take(fields.len() - 1)
            .filter(|field| field.trim().parse::<f64>().is_err())
            .count();

        non_numeric_count > fields.len() / 2
    }

    /// Parse a CSV data line into a sample and its field count
    fn parse_data_line(line: &str) -> Result<(Sample, usize)> {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();

        let Some((label_str, feature_fields)) = fields.split_last() else {
            return Err(SVMError::ParseError("Empty line".to_string()));
        };
        if feature_fields.is_empty() {
            return Err(SVMError::ParseError(format!(
                "Line has too few fields: {line}"
            )));
        }

        let label = label_str
            .parse::<f64>()
            .ok()
            .filter(|l| l.is_finite())
            .ok_or_else(|| SVMError::ParseError(format!("Invalid label: {label_str}")))?;

        let dense = feature_fields
            .iter()
            .enumerate()
            .map(|(idx, field)| {
                field
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| {
                        SVMError::ParseError(format!(
                            "Invalid feature value at column {}: {}",
                            idx + 1,
                            field
                        ))
                    })
            })
            .collect::<Result<Vec<f64>>>()?;

        let sample = Sample::new(SparseVector::from_dense(&dense), label);
        Ok((sample, fields.len()))
    }
}

impl Dataset for CSVDataset {
    fn samples(&self) -> &[Sample] {
        &self.samples
    }

    fn dim(&self) -> usize {
        self.dimensions
    }
}
