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

//! Column-to-column relationships between datasets.
//!
//! Detection is best-effort. Generated text is tried first; if it is absent
//! or yields no usable record, every pair of datasets is scanned with
//! [`similarity`]. That scan is `O(D² · C²)` for `D` datasets of `C`
//! columns, which is fine for user-uploaded file counts. Pairs are scored in
//! parallel and the per-dataset lists are sorted afterwards, so the output
//! does not depend on scheduling.

use crate::config::DetectionConfig;
use crate::dataset::Dataset;
use crate::extractor::extract_json_value;
use crate::prompt::build_relationship_prompt;
use crate::similarity::similarity;
use indexmap::IndexMap;
use llm_contracts::{GenerationRequest, LLMResult, TextGenerator};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationshipKind {
    #[serde(rename = "one-to-one")]
    OneToOne,
    #[serde(rename = "one-to-many")]
    OneToMany,
}
impl RelationshipKind {
    pub fn parse(text: &str) -> Option<Self> {
        let normalised: String = text
            .trim()
            .to_ascii_lowercase()
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .collect();
        match normalised.as_str() {
            "onetoone" | "11" => Some(RelationshipKind::OneToOne),
            "onetomany" | "1n" | "1m" | "manytoone" | "n1" => Some(RelationshipKind::OneToMany),
            _ => None,
        }
    }
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipKind::OneToOne => "one-to-one",
            RelationshipKind::OneToMany => "one-to-many",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    pub id: String,
    pub source_dataset_id: String,
    pub target_dataset_id: String,
    pub source_column: String,
    pub target_column: String,
    pub kind: RelationshipKind,
    pub confidence: f64,
    pub matching_row_count: u64,
}
impl Relationship {
    /// The id is derived from the endpoints, so re-detecting the same link
    /// yields the same id.
    pub fn new(
        source: &Dataset,
        target: &Dataset,
        source_column: &str,
        target_column: &str,
        kind: RelationshipKind,
        confidence: f64,
        matching_row_count: u64,
    ) -> Self {
        let key = format!(
            "{}\u{1f}{}\u{1f}{}\u{1f}{}",
            source.id, source_column, target.id, target_column
        );
        Self {
            id: Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes()).to_string(),
            source_dataset_id: source.id.clone(),
            target_dataset_id: target.id.clone(),
            source_column: source_column.to_string(),
            target_column: target_column.to_string(),
            kind,
            confidence: clamp_confidence(confidence),
            matching_row_count,
        }
    }
}

fn clamp_confidence(confidence: f64) -> f64 {
    if confidence.is_nan() {
        0.0
    } else {
        confidence.clamp(0.0, 1.0)
    }
}

/// Descending confidence, then source column, target column and target
/// dataset.
pub fn compare_relationships(a: &Relationship, b: &Relationship) -> Ordering {
    b.confidence
        .total_cmp(&a.confidence)
        .then_with(|| a.source_column.cmp(&b.source_column))
        .then_with(|| a.target_column.cmp(&b.target_column))
        .then_with(|| a.target_dataset_id.cmp(&b.target_dataset_id))
}

/// Shape of one element of the generated relationship array.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RelationshipRecord {
    source_file: String,
    target_file: String,
    source_column: String,
    target_column: String,
    #[serde(default, rename = "type", alias = "kind")]
    kind: Option<String>,
    #[serde(default)]
    confidence: Option<Value>,
    #[serde(default, alias = "matchingRowCount")]
    matching_rows: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionSource {
    /// Parsed from generated text.
    Ai,
    /// Pairwise column-name similarity.
    Fallback,
    /// Fewer than two datasets; nothing was attempted.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionReport {
    pub source: DetectionSource,
    /// Sorted relationships keyed by source dataset id, in dataset order.
    pub relationships: IndexMap<String, Vec<Relationship>>,
}
impl DetectionReport {
    fn skipped() -> Self {
        Self {
            source: DetectionSource::Skipped,
            relationships: IndexMap::new(),
        }
    }
    fn grouped(source: DetectionSource, datasets: &[Dataset], found: Vec<Relationship>) -> Self {
        let mut relationships: IndexMap<String, Vec<Relationship>> = datasets
            .iter()
            .map(|d| (d.id.clone(), Vec::new()))
            .collect();
        for rel in found {
            if let Some(list) = relationships.get_mut(&rel.source_dataset_id) {
                list.push(rel);
            }
        }
        for list in relationships.values_mut() {
            list.sort_by(compare_relationships);
        }
        Self {
            source,
            relationships,
        }
    }
    pub fn total(&self) -> usize {
        self.relationships.values().map(Vec::len).sum()
    }
    pub fn for_dataset(&self, dataset_id: &str) -> &[Relationship] {
        self.relationships
            .get(dataset_id)
            .map_or(&[], Vec::as_slice)
    }
    pub fn iter(&self) -> impl Iterator<Item = &Relationship> {
        self.relationships.values().flatten()
    }
    /// Copies of `datasets` with relationship lists replaced wholesale. A
    /// skipped run returns the datasets unchanged.
    pub fn attach(&self, datasets: &[Dataset]) -> Vec<Dataset> {
        if self.source == DetectionSource::Skipped {
            return datasets.to_vec();
        }
        datasets
            .iter()
            .map(|d| d.with_relationships(self.for_dataset(&d.id).to_vec()))
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct RelationshipDetector {
    config: DetectionConfig,
}
impl RelationshipDetector {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_config(config: DetectionConfig) -> Self {
        Self { config }
    }
    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Runs one detection pass. Generated text is used when it yields at
    /// least one valid record; otherwise the similarity scan decides.
    pub fn detect(&self, datasets: &[Dataset], ai_text: Option<&str>) -> DetectionReport {
        if datasets.len() < 2 {
            debug!(datasets = datasets.len(), "Relationship detection needs two datasets");
            return DetectionReport::skipped();
        }
        if let Some(text) = ai_text {
            if let Some(found) = self.from_ai_text(datasets, text) {
                let report = DetectionReport::grouped(DetectionSource::Ai, datasets, found);
                info!(relationships = report.total(), "Relationships taken from generated text");
                return report;
            }
            warn!("Generated text held no usable relationships; falling back to column similarity");
        }
        let report =
            DetectionReport::grouped(DetectionSource::Fallback, datasets, self.fallback(datasets));
        info!(
            relationships = report.total(),
            threshold = self.config.similarity_threshold,
            "Relationships inferred from column similarity"
        );
        report
    }

    /// [`detect`](Self::detect), returning updated dataset copies.
    pub fn detect_relationships(&self, datasets: &[Dataset], ai_text: Option<&str>) -> Vec<Dataset> {
        self.detect(datasets, ai_text).attach(datasets)
    }

    /// Asks `generator` for relationships and runs detection on the answer.
    /// A failed call is logged and treated as "no generated text".
    pub async fn detect_with_generator(
        &self,
        datasets: &[Dataset],
        generator: &dyn TextGenerator,
    ) -> DetectionReport {
        if datasets.len() < 2 {
            return DetectionReport::skipped();
        }
        let text = match self.request_relationship_text(datasets, generator).await {
            Ok(text) => Some(text),
            Err(e) => {
                warn!(error = %e, "Text generation failed; falling back to column similarity");
                None
            }
        };
        self.detect(datasets, text.as_deref())
    }

    /// Single generation call for `datasets`; the error is handed back as is.
    pub async fn request_relationship_text(
        &self,
        datasets: &[Dataset],
        generator: &dyn TextGenerator,
    ) -> LLMResult<String> {
        let prompt = build_relationship_prompt(datasets, self.config.prompt_sample_rows);
        debug!(prompt_len = prompt.len(), "Requesting relationship text");
        let request = GenerationRequest::new(prompt)
            .with_max_tokens(self.config.max_tokens)
            .with_metadata("task", serde_json::json!("relationship_detection"))
            .with_metadata("datasets", serde_json::json!(datasets.len()));
        generator.generate(&request).await
    }

    /// Relationships recovered from generated text, or `None` when the text
    /// yields no valid record. Records naming unknown datasets or columns
    /// are dropped.
    pub fn from_ai_text(&self, datasets: &[Dataset], text: &str) -> Option<Vec<Relationship>> {
        let Value::Array(items) = extract_json_value(text) else {
            return None;
        };
        let mut seen = HashSet::new();
        let mut found = Vec::new();
        for (index, item) in items.into_iter().enumerate() {
            let record: RelationshipRecord = match serde_json::from_value(item) {
                Ok(record) => record,
                Err(e) => {
                    debug!(index, error = %e, "Skipping malformed relationship record");
                    continue;
                }
            };
            let Some(rel) = self.resolve_record(datasets, &record) else {
                continue;
            };
            if seen.insert(rel.id.clone()) {
                found.push(rel);
            }
        }
        (!found.is_empty()).then_some(found)
    }

    fn resolve_record(&self, datasets: &[Dataset], record: &RelationshipRecord) -> Option<Relationship> {
        let source = find_dataset(datasets, &record.source_file);
        let target = find_dataset(datasets, &record.target_file);
        let (Some(source), Some(target)) = (source, target) else {
            warn!(
                source_file = %record.source_file,
                target_file = %record.target_file,
                "Dropping relationship that names an unknown dataset"
            );
            return None;
        };
        if !source.has_column(&record.source_column) || !target.has_column(&record.target_column) {
            warn!(
                source_column = %record.source_column,
                target_column = %record.target_column,
                "Dropping relationship that names an unknown column"
            );
            return None;
        }
        let kind = record
            .kind
            .as_deref()
            .and_then(RelationshipKind::parse)
            .unwrap_or(RelationshipKind::OneToMany);
        let confidence = record
            .confidence
            .as_ref()
            .and_then(value_as_f64)
            .unwrap_or(self.config.default_ai_confidence);
        let matching_rows = record
            .matching_rows
            .as_ref()
            .and_then(value_as_f64)
            .filter(|v| *v > 0.0)
            .map_or(0, |v| v.floor() as u64);
        Some(Relationship::new(
            source,
            target,
            &record.source_column,
            &record.target_column,
            kind,
            confidence,
            matching_rows,
        ))
    }

    /// Similarity scan over every unordered dataset pair `(i, j)`, `i < j`.
    /// Emits a one-to-many relationship owned by `datasets[i]` for each column
    /// pair scoring above the threshold.
    pub fn fallback(&self, datasets: &[Dataset]) -> Vec<Relationship> {
        let threshold = self.config.similarity_threshold;
        let pairs: Vec<(usize, usize)> = (0..datasets.len())
            .flat_map(|i| (i + 1..datasets.len()).map(move |j| (i, j)))
            .collect();
        pairs
            .par_iter()
            .flat_map_iter(|&(i, j)| {
                let (source, target) = (&datasets[i], &datasets[j]);
                source.columns.iter().flat_map(move |source_column| {
                    target.columns.iter().filter_map(move |target_column| {
                        let score = similarity(source_column, target_column);
                        (score > threshold).then(|| {
                            Relationship::new(
                                source,
                                target,
                                source_column,
                                target_column,
                                RelationshipKind::OneToMany,
                                score,
                                0,
                            )
                        })
                    })
                })
            })
            .collect()
    }
}

/// Default-configured [`RelationshipDetector::detect_relationships`].
pub fn detect_relationships(datasets: &[Dataset], ai_text: Option<&str>) -> Vec<Dataset> {
    RelationshipDetector::new().detect_relationships(datasets, ai_text)
}

fn find_dataset<'a>(datasets: &'a [Dataset], reference: &str) -> Option<&'a Dataset> {
    let reference = reference.trim();
    datasets
        .iter()
        .find(|d| d.name == reference)
        .or_else(|| datasets.iter().find(|d| d.id == reference))
}

fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => crate::dataset::parse_number(s),
        _ => None,
    }
}
