// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2024 Jonathan Lee
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License version 3
// as published by the Free Software Foundation.
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see https://www.gnu.org/licenses/.

use crate::config::ClassifierConfig;
use crate::dataset::{Dataset, Scalar};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Numeric,
    Categorical,
}

/// Numeric and categorical column names, each in dataset column order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnClassification {
    pub numeric: Vec<String>,
    pub categorical: Vec<String>,
}
impl ColumnClassification {
    pub fn kind_of(&self, column: &str) -> Option<ColumnKind> {
        if self.numeric.iter().any(|c| c == column) {
            Some(ColumnKind::Numeric)
        } else if self.categorical.iter().any(|c| c == column) {
            Some(ColumnKind::Categorical)
        } else {
            None
        }
    }
    pub fn is_numeric(&self, column: &str) -> bool {
        self.kind_of(column) == Some(ColumnKind::Numeric)
    }
    pub fn is_categorical(&self, column: &str) -> bool {
        self.kind_of(column) == Some(ColumnKind::Categorical)
    }
}

/// Kind of a column given its sampled cells.
///
/// Numeric iff at least one non-null value is present and every non-null
/// value is a number or a string that parses cleanly as one.
pub fn classify_values<'a, I>(values: I) -> ColumnKind
where
    I: IntoIterator<Item = &'a Scalar>,
{
    let mut saw_value = false;
    for value in values.into_iter().filter(|v| !v.is_null()) {
        if value.as_number().is_none() {
            return ColumnKind::Categorical;
        }
        saw_value = true;
    }
    if saw_value {
        ColumnKind::Numeric
    } else {
        ColumnKind::Categorical
    }
}

/// Classifies every column of `dataset` from its first `sample_size` rows.
///
/// Values that only appear past the sample are not looked at, so a column can
/// be misclassified. The result belongs to this dataset alone and must be
/// recomputed for any other data source.
pub fn classify(dataset: &Dataset, sample_size: usize) -> ColumnClassification {
    let mut classification = ColumnClassification::default();
    for column in &dataset.columns {
        let sample = dataset.column_values(column).take(sample_size);
        match classify_values(sample) {
            ColumnKind::Numeric => classification.numeric.push(column.clone()),
            ColumnKind::Categorical => classification.categorical.push(column.clone()),
        }
    }
    debug!(
        dataset = %dataset.name,
        sample_size,
        numeric = classification.numeric.len(),
        categorical = classification.categorical.len(),
        "Classified columns"
    );
    classification
}

#[derive(Debug, Clone, Default)]
pub struct ColumnClassifier {
    config: ClassifierConfig,
}
impl ColumnClassifier {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_config(config: ClassifierConfig) -> Self {
        Self { config }
    }
    pub fn fast() -> Self {
        Self::with_config(ClassifierConfig::fast())
    }
    pub fn sample_size(&self) -> usize {
        self.config.sample_size
    }
    pub fn classify(&self, dataset: &Dataset) -> ColumnClassification {
        classify(dataset, self.config.sample_size)
    }
}
