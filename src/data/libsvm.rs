//! LibSVM format dataset implementation
//!
//! Supports loading datasets in the libsvm format:
//! label index:value index:value ...
//!
//! Example:
//! +1 1:0.5 3:1.2 7:0.8
//! -1 2:0.3 5:2.1
//!
//! Labels are kept as written. Classification training maps the two
//! distinct values to -1/+1 itself; regression uses them as targets.

use crate::core::{Dataset, Result, SVMError, Sample, SparseVector};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Dataset implementation for LibSVM format files
#[derive(Debug, Clone)]
pub struct LibSVMDataset {
    samples: Vec<Sample>,
    dimensions: usize,
}

impl LibSVMDataset {
    /// Load a dataset from a LibSVM format file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path).map_err(SVMError::IoError)?;
        let reader = BufReader::new(file);
        Self::from_reader(reader)
    }

    /// Load a dataset from a reader (for testing and flexibility)
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut samples = Vec::new();
        let mut dimensions = 0;

        for (line_num, line) in reader.lines().enumerate() {
            let line = line.map_err(SVMError::IoError)?;
            let line = line.trim();

            // Skip empty lines and comments
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let sample = Self::parse_line(line).map_err(|e| {
                SVMError::ParseError(format!("Error parsing line {}: {}", line_num + 1, e))
            })?;
            dimensions = dimensions.max(sample.features.dim());
            samples.push(sample);
        }

        if samples.is_empty() {
            return Err(SVMError::EmptyDataset);
        }

        Ok(LibSVMDataset {
            samples,
            dimensions,
        })
    }

    /// Wrap samples built in memory
    pub fn from_samples(samples: Vec<Sample>) -> Self {
        let dimensions = samples.iter().map(|s| s.features.dim()).max().unwrap_or(0);
        Self {
            samples,
            dimensions,
        }
    }

    /// Parse a single line in libsvm format
    fn parse_line(line: &str) -> Result<Sample> {
        let mut parts = line.split_whitespace();

        let label_str = parts
            .next()
            .ok_or_else(|| SVMError::ParseError("Empty line".to_string()))?;
        let label = label_str
            .parse::<f64>()
            .ok()
            .filter(|l| l.is_finite())
            .ok_or_else(|| SVMError::ParseError(format!("Invalid label: {label_str}")))?;

        let mut indices = Vec::new();
        let mut values = Vec::new();

        for feature_str in parts {
            let (index_str, value_str) = feature_str.split_once(':').ok_or_else(|| {
                SVMError::ParseError(format!("Invalid feature format: {feature_str}"))
            })?;

            let index = index_str.parse::<usize>().map_err(|_| {
                SVMError::ParseError(format!("Invalid feature index: {index_str}"))
            })?;
            if index == 0 {
                return Err(SVMError::ParseError(
                    "Feature index must be positive: 0".to_string(),
                ));
            }

            let value = value_str
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| {
                    SVMError::ParseError(format!("Invalid feature value: {value_str}"))
                })?;

            // libsvm uses 1-based indexing
            indices.push(index - 1);
            values.push(value);
        }

        let features = SparseVector::new(indices, values);
        if features.indices.windows(2).any(|w| w[0] == w[1]) {
            return Err(SVMError::ParseError(format!(
                "Duplicate feature index in: {line}"
            )));
        }
        Ok(Sample::new(features, label))
    }
}

impl Dataset for LibSVMDataset {
    fn samples(&self) -> &[Sample] {
        &self.samples
    }

    fn dim(&self) -> usize {
        self.dimensions
    }
}
