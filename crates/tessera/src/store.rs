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

//! Tenant-scoped in-memory record store.
//!
//! A `Store` is an ordinary value owned by whoever creates it; there is no
//! process-wide registry. Records are keyed by `(tenant, id)` so two tenants
//! may hold records with the same id.

use crate::aggregation::ChartType;
use crate::dataset::Dataset;
use crate::error::{StoreError, StoreResult};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

pub trait Record: Clone + Send + Sync {
    const KIND: &'static str;
    fn id(&self) -> &str;
}

impl Record for Dataset {
    const KIND: &'static str = "dataset";
    fn id(&self) -> &str {
        &self.id
    }
}

/// A saved chart definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartConfig {
    pub id: String,
    pub dataset_id: String,
    pub chart_type: ChartType,
    pub x_column: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y_column: Option<String>,
    #[serde(default)]
    pub title: String,
    pub created_at: DateTime<Utc>,
}
impl ChartConfig {
    pub fn new(
        dataset_id: impl Into<String>,
        chart_type: ChartType,
        x_column: impl Into<String>,
        y_column: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            dataset_id: dataset_id.into(),
            chart_type,
            x_column: x_column.into(),
            y_column,
            title: String::new(),
            created_at: Utc::now(),
        }
    }
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }
}
impl Record for ChartConfig {
    const KIND: &'static str = "chart";
    fn id(&self) -> &str {
        &self.id
    }
}

/// A saved formula spanning one or more datasets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Formula {
    pub id: String,
    pub name: String,
    pub expression: String,
    #[serde(default)]
    pub dataset_ids: Vec<String>,
}
impl Formula {
    pub fn new(name: impl Into<String>, expression: impl Into<String>, dataset_ids: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            expression: expression.into(),
            dataset_ids,
        }
    }
}
impl Record for Formula {
    const KIND: &'static str = "formula";
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug)]
pub struct Store<T: Record> {
    records: DashMap<(String, String), T>,
}
impl<T: Record> Default for Store<T> {
    fn default() -> Self {
        Self {
            records: DashMap::new(),
        }
    }
}
impl<T: Record> Store<T> {
    pub fn new() -> Self {
        Self::default()
    }
    fn key(tenant: &str, id: &str) -> (String, String) {
        (tenant.to_string(), id.to_string())
    }
    fn not_found(id: &str) -> StoreError {
        StoreError::NotFound {
            kind: T::KIND,
            id: id.to_string(),
        }
    }

    pub fn create(&self, tenant: &str, record: T) -> StoreResult<T> {
        use dashmap::mapref::entry::Entry;
        match self.records.entry(Self::key(tenant, record.id())) {
            Entry::Occupied(_) => Err(StoreError::AlreadyExists {
                kind: T::KIND,
                id: record.id().to_string(),
            }),
            Entry::Vacant(slot) => {
                debug!(kind = T::KIND, tenant, id = record.id(), "Record created");
                slot.insert(record.clone());
                Ok(record)
            }
        }
    }
    pub fn get(&self, tenant: &str, id: &str) -> StoreResult<T> {
        self.records
            .get(&Self::key(tenant, id))
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Self::not_found(id))
    }
    /// Replaces the record stored under `record.id()`.
    pub fn update(&self, tenant: &str, record: T) -> StoreResult<T> {
        match self.records.get_mut(&Self::key(tenant, record.id())) {
            Some(mut existing) => {
                *existing = record.clone();
                debug!(kind = T::KIND, tenant, id = record.id(), "Record updated");
                Ok(record)
            }
            None => Err(Self::not_found(record.id())),
        }
    }
    pub fn delete(&self, tenant: &str, id: &str) -> StoreResult<T> {
        self.records
            .remove(&Self::key(tenant, id))
            .map(|(_, record)| record)
            .ok_or_else(|| Self::not_found(id))
    }
    /// The tenant's records, sorted by id.
    pub fn list(&self, tenant: &str) -> Vec<T> {
        let mut records: Vec<T> = self
            .records
            .iter()
            .filter(|entry| entry.key().0 == tenant)
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by(|a, b| a.id().cmp(b.id()));
        records
    }
    pub fn len(&self) -> usize {
        self.records.len()
    }
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

pub type DatasetStore = Store<Dataset>;
pub type ChartStore = Store<ChartConfig>;
pub type FormulaStore = Store<Formula>;
