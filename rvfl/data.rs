//! # Data Loading and Validation Module
//!
//! The classifier itself never fetches, shuffles or splits data. This module is the
//! glue that does: it reads a delimited table with a header row, takes one named
//! column as the integer class label and every other column as a numeric feature,
//! and produces an in-memory `Dataset` that satisfies the model's input contract.
//!
//! - Delimiter: tab for `.tsv` files, comma otherwise, unless set explicitly.
//! - Labels: non-negative integers. `num_classes` is `max(label) + 1`.
//! - Failures are assumed to be user-input errors and name the offending line/column.

use ndarray::{Array1, Array2, Axis, ShapeError};
use rand::Rng;
use rand::seq::SliceRandom;
use std::path::Path;
use thiserror::Error;

/// The column name used for labels when none is given.
pub const DEFAULT_LABEL_COLUMN: &str = "label";

#[derive(Error, Debug)]
pub enum DataError {
    #[error("Error reading delimited input: {0}")]
    CsvError(#[from] csv::Error),

    #[error(
        "The label column '{0}' was not found in the input file. Please check spelling and case."
    )]
    ColumnNotFound(String),

    #[error("The input file has no feature columns besides the label column.")]
    NoFeatureColumns,

    #[error("The input file contains no data rows.")]
    EmptyDataset,

    #[error("Line {line}, column '{column}': '{value}' is not a number.")]
    NonNumericValue {
        line: u64,
        column: String,
        value: String,
    },

    #[error("Line {line}: '{value}' is not a valid class label. Labels must be non-negative integers.")]
    InvalidLabel { line: u64, value: String },

    #[error(
        "Non-finite values (NaN or Infinity) were found in feature column {column} at sample {row}."
    )]
    NonFiniteValue { row: usize, column: usize },

    #[error("The dataset has {samples} feature rows but {labels} labels.")]
    MismatchedSampleCount { samples: usize, labels: usize },

    #[error("Label {label} at sample {index} is not a valid class index for {num_classes} classes.")]
    LabelOutOfRange {
        index: usize,
        label: usize,
        num_classes: usize,
    },

    #[error(
        "Class {class} has no samples, but the largest label implies {num_classes} classes. Labels must cover every class from 0 to the largest label."
    )]
    MissingClass { class: usize, num_classes: usize },

    #[error("The split proportion must lie strictly between 0 and 1, got {0}.")]
    InvalidProportion(f64),

    #[error(
        "Splitting {total} samples leaves {train} for training and {validation} for validation. Both parts must be non-empty."
    )]
    EmptySplit {
        total: usize,
        train: usize,
        validation: usize,
    },

    #[error("Internal error: failed to assemble the feature matrix: {0}")]
    ShapeError(#[from] ShapeError),
}

/// Labeled samples ready for training or evaluation.
#[derive(Debug, Clone)]
pub struct Dataset {
    /// Shape `[n_samples, n_features]`.
    pub features: Array2<f64>,
    /// One class index per sample, each `< num_classes`.
    pub labels: Array1<usize>,
    pub num_classes: usize,
    /// Feature column names, when the data came from a file with a header.
    pub feature_names: Vec<String>,
}

impl Dataset {
    /// Validates and wraps an in-memory dataset.
    pub fn new(
        features: Array2<f64>,
        labels: Array1<usize>,
        num_classes: usize,
    ) -> Result<Self, DataError> {
        if features.nrows() == 0 || features.ncols() == 0 {
            return Err(DataError::EmptyDataset);
        }
        if features.nrows() != labels.len() {
            return Err(DataError::MismatchedSampleCount {
                samples: features.nrows(),
                labels: labels.len(),
            });
        }
        if let Some((index, &label)) = labels.iter().enumerate().find(|(_, l)| **l >= num_classes)
        {
            return Err(DataError::LabelOutOfRange {
                index,
                label,
                num_classes,
            });
        }
        if let Some(((row, column), _)) = features.indexed_iter().find(|(_, v)| !v.is_finite()) {
            return Err(DataError::NonFiniteValue { row, column });
        }

        let feature_names = (1..=features.ncols()).map(|i| format!("x{i}")).collect();
        Ok(Self {
            features,
            labels,
            num_classes,
            feature_names,
        })
    }

    /// Like `new`, with `num_classes` inferred as `max(label) + 1`. Every class below that
    /// must have at least one sample, so a stray large label is rejected rather than
    /// inflating the class count.
    pub fn from_labels(features: Array2<f64>, labels: Array1<usize>) -> Result<Self, DataError> {
        let num_classes = labels.iter().max().map_or(0, |&max| max + 1);

        let mut present = labels.to_vec();
        present.sort_unstable();
        present.dedup();
        if let Some((class, _)) = present.iter().enumerate().find(|&(i, &c)| i != c) {
            return Err(DataError::MissingClass { class, num_classes });
        }

        Self::new(features, labels, num_classes)
    }

    pub fn n_samples(&self) -> usize {
        self.features.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    /// The samples at `indices`, in that order. Keeps `num_classes` and names.
    pub fn select(&self, indices: &[usize]) -> Dataset {
        Dataset {
            features: self.features.select(Axis(0), indices),
            labels: self.labels.select(Axis(0), indices),
            num_classes: self.num_classes,
            feature_names: self.feature_names.clone(),
        }
    }

    /// Shuffles the samples and splits them into `(train, validation)`, with
    /// `floor(proportion · n)` samples in the training part.
    pub fn split<R: Rng + ?Sized>(
        &self,
        proportion: f64,
        rng: &mut R,
    ) -> Result<(Dataset, Dataset), DataError> {
        if !(proportion > 0.0 && proportion < 1.0) {
            return Err(DataError::InvalidProportion(proportion));
        }
        let total = self.n_samples();
        let train = (proportion * total as f64).floor() as usize;
        let validation = total - train;
        if train == 0 || validation == 0 {
            return Err(DataError::EmptySplit {
                total,
                train,
                validation,
            });
        }

        let mut indices: Vec<usize> = (0..total).collect();
        indices.shuffle(rng);
        let (train_indices, validation_indices) = indices.split_at(train);
        Ok((self.select(train_indices), self.select(validation_indices)))
    }
}

/// How to read a delimited dataset file.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub label_column: String,
    /// Field delimiter. `None` picks tab for `.tsv` files and comma otherwise.
    pub delimiter: Option<u8>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            label_column: DEFAULT_LABEL_COLUMN.to_string(),
            delimiter: None,
        }
    }
}

/// Loads a labeled dataset from a delimited text file with a header row.
pub fn load_dataset(path: &Path, options: &LoadOptions) -> Result<Dataset, DataError> {
    let delimiter = options.delimiter.unwrap_or_else(|| delimiter_for(path));
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let headers = reader.headers()?.clone();
    let label_index = headers
        .iter()
        .position(|name| name == options.label_column)
        .ok_or_else(|| DataError::ColumnNotFound(options.label_column.clone()))?;
    let feature_names: Vec<String> = headers
        .iter()
        .enumerate()
        .filter(|&(i, _)| i != label_index)
        .map(|(_, name)| name.to_string())
        .collect();
    if feature_names.is_empty() {
        return Err(DataError::NoFeatureColumns);
    }

    let mut values = Vec::new();
    let mut labels = Vec::new();
    for record in reader.records() {
        let record = record?;
        let line = record.position().map_or(0, |p| p.line());
        for (column, field) in record.iter().enumerate() {
            if column == label_index {
                labels.push(parse_label(field, line)?);
            } else {
                let value = field.parse::<f64>().map_err(|_| DataError::NonNumericValue {
                    line,
                    column: headers[column].to_string(),
                    value: field.to_string(),
                })?;
                values.push(value);
            }
        }
    }
    if labels.is_empty() {
        return Err(DataError::EmptyDataset);
    }

    let features = Array2::from_shape_vec((labels.len(), feature_names.len()), values)?;
    let mut dataset = Dataset::from_labels(features, Array1::from_vec(labels))?;
    dataset.feature_names = feature_names;
    log::info!(
        "Loaded {} samples with {} features and {} classes from {}.",
        dataset.n_samples(),
        dataset.n_features(),
        dataset.num_classes,
        path.display()
    );
    Ok(dataset)
}

fn delimiter_for(path: &Path) -> u8 {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => b'\t',
        _ => b',',
    }
}

/// Accepts `3` as well as integral floats such as `3.0`.
fn parse_label(field: &str, line: u64) -> Result<usize, DataError> {
    if let Ok(label) = field.parse::<usize>() {
        return Ok(label);
    }
    match field.parse::<f64>() {
        Ok(value) if value >= 0.0 && value.fract() == 0.0 && value < usize::MAX as f64 => {
            Ok(value as usize)
        }
        _ => Err(DataError::InvalidLabel {
            line,
            value: field.to_string(),
        }),
    }
}
