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

use llm_contracts::LLMError;
use thiserror::Error;
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Data error: {0}")]
    Data(#[from] DataError),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Text generation failed: {0}")]
    Generation(#[from] LLMError),
    #[error("Serialisation error: {0}")]
    Serialisation(#[from] SerialisationError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {field} is out of range ({value})")]
    OutOfRange { field: String, value: String },
    #[error("Failed to read configuration file '{path}': {source}")]
    ConfigFileError {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse YAML configuration: {source}")]
    YamlParseError {
        #[from]
        source: serde_yaml::Error,
    },
}
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Failed to read data file '{path}': {source}")]
    DataFileError {
        path: String,
        #[source]
        source: csv::Error,
    },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Expected a JSON array of records, found {found}")]
    NotARecordArray { found: String },
    #[error("Record {index} is not a JSON object")]
    NotARecord { index: usize },
    #[error("Duplicate column '{column}' in dataset '{dataset}'")]
    DuplicateColumn { dataset: String, column: String },
    #[error("Column '{column}' not found in dataset '{dataset}'")]
    ColumnNotFound { dataset: String, column: String },
    #[error("Empty dataset provided: '{dataset}'")]
    EmptyDataset { dataset: String },
}
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },
    #[error("{kind} '{id}' already exists")]
    AlreadyExists { kind: &'static str, id: String },
}
#[derive(Error, Debug)]
pub enum SerialisationError {
    #[error("JSON serialisation failed: {source}")]
    JsonSerialisationError {
        #[from]
        source: serde_json::Error,
    },
    #[error("YAML serialisation failed: {source}")]
    YamlSerialisationError {
        #[from]
        source: serde_yaml::Error,
    },
}
pub type Result<T> = std::result::Result<T, EngineError>;
pub type DataResult<T> = std::result::Result<T, DataError>;
pub type StoreResult<T> = std::result::Result<T, StoreError>;
impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Serialisation(SerialisationError::JsonSerialisationError { source: err })
    }
}
impl EngineError {
    pub fn is_recoverable(&self) -> bool {
        match self {
            EngineError::Generation(e) => e.is_transient(),
            EngineError::Store(StoreError::AlreadyExists { .. }) => true,
            EngineError::Data(DataError::ColumnNotFound { .. }) => true,
            EngineError::Config(_) => true,
            _ => false,
        }
    }
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            EngineError::Store(StoreError::NotFound { .. })
                | EngineError::Data(DataError::ColumnNotFound { .. })
        )
    }
    pub fn category(&self) -> &'static str {
        match self {
            EngineError::Config(_) => "configuration",
            EngineError::Data(_) => "data",
            EngineError::Store(_) => "store",
            EngineError::Generation(_) => "generation",
            EngineError::Serialisation(_) => "serialisation",
            EngineError::Io(_) => "io",
        }
    }
    pub fn user_message(&self) -> String {
        match self {
            EngineError::Config(ConfigError::OutOfRange { field, .. }) => {
                format!("The setting '{field}' has an invalid value.")
            }
            EngineError::Config(_) => "The configuration could not be loaded.".to_string(),
            EngineError::Data(DataError::ColumnNotFound { column, dataset }) => {
                format!("Column '{column}' does not exist in '{dataset}'.")
            }
            EngineError::Data(DataError::DataFileError { path, .. }) => {
                format!("Could not read '{path}'. Check that it is a valid CSV file.")
            }
            EngineError::Data(_) => "The uploaded data could not be read.".to_string(),
            EngineError::Store(StoreError::NotFound { kind, id }) => {
                format!("No {kind} with id '{id}' exists.")
            }
            EngineError::Store(StoreError::AlreadyExists { kind, id }) => {
                format!("A {kind} with id '{id}' already exists.")
            }
            EngineError::Generation(_) => {
                "The text generation service is unavailable; try again later.".to_string()
            }
            EngineError::Serialisation(_) => "The result could not be serialised.".to_string(),
            EngineError::Io(e) => format!("File system error: {e}"),
        }
    }
}
