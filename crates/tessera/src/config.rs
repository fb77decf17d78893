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

use crate::error::ConfigError;
use llm_contracts::DEFAULT_MAX_TOKENS;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.7;
pub const DEFAULT_SAMPLE_SIZE: usize = 100;
pub const FAST_SAMPLE_SIZE: usize = 10;
pub const DEFAULT_BIN_COUNT: usize = 20;
pub const DEFAULT_SCATTER_MAX_POINTS: usize = 200;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Column pairs must score strictly above this to be related.
    pub similarity_threshold: f64,
    /// Used when an extracted record carries no usable confidence.
    pub default_ai_confidence: f64,
    pub prompt_sample_rows: usize,
    pub max_tokens: u32,
}
impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            default_ai_confidence: 0.5,
            prompt_sample_rows: 3,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}
impl DetectionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_unit_interval("detection.similarity_threshold", self.similarity_threshold)?;
        check_unit_interval("detection.default_ai_confidence", self.default_ai_confidence)?;
        if self.max_tokens == 0 {
            return Err(out_of_range("detection.max_tokens", self.max_tokens));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub sample_size: usize,
}
impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            sample_size: DEFAULT_SAMPLE_SIZE,
        }
    }
}
impl ClassifierConfig {
    pub fn fast() -> Self {
        Self {
            sample_size: FAST_SAMPLE_SIZE,
        }
    }
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_size == 0 {
            return Err(out_of_range("classifier.sample_size", self.sample_size));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    pub bin_count: usize,
    pub scatter_max_points: Option<usize>,
    pub unknown_label: String,
}
impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            bin_count: DEFAULT_BIN_COUNT,
            scatter_max_points: Some(DEFAULT_SCATTER_MAX_POINTS),
            unknown_label: "Unknown".to_string(),
        }
    }
}
impl AggregationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bin_count == 0 {
            return Err(out_of_range("aggregation.bin_count", self.bin_count));
        }
        if self.scatter_max_points == Some(0) {
            return Err(out_of_range("aggregation.scatter_max_points", 0));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub detection: DetectionConfig,
    pub classifier: ClassifierConfig,
    pub aggregation: AggregationConfig,
}
impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.detection.validate()?;
        self.classifier.validate()?;
        self.aggregation.validate()
    }
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::ConfigFileError {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }
    pub fn for_large_datasets() -> Self {
        Self {
            classifier: ClassifierConfig::fast(),
            ..Default::default()
        }
    }
}

fn check_unit_interval(field: &str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(out_of_range(field, value))
    }
}
fn out_of_range(field: &str, value: impl ToString) -> ConfigError {
    ConfigError::OutOfRange {
        field: field.to_string(),
        value: value.to_string(),
    }
}
