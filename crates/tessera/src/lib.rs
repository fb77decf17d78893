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

pub mod aggregation;
pub mod classifier;
pub mod config;
pub mod dataset;
pub mod error;
pub mod extractor;
pub mod intent;
pub mod prompt;
pub mod relationship;
pub mod similarity;
pub mod store;

pub use aggregation::{
    build_series, ChartSeries, ChartType, SeriesBuilder, SeriesOrder, SeriesPoint, SourceColumns,
};
pub use classifier::{classify, ColumnClassification, ColumnClassifier, ColumnKind};
pub use config::{AggregationConfig, ClassifierConfig, DetectionConfig, EngineConfig};
pub use dataset::{Dataset, Row, Scalar};
pub use error::{ConfigError, DataError, EngineError, Result, StoreError};
pub use extractor::extract_json;
pub use intent::{select_intent, ChartIntent, IntentClassifier, KeywordIntentClassifier};
pub use relationship::{
    detect_relationships, DetectionReport, DetectionSource, Relationship, RelationshipDetector,
    RelationshipKind,
};
pub use similarity::similarity;
pub use store::{ChartConfig, Formula, Record, Store};

use llm_contracts::TextGenerator;
use serde::Serialize;
use tracing::{debug, info};

/// A chart intent together with the series it produces.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub intent: ChartIntent,
    pub series: ChartSeries,
}

pub struct Engine {
    config: EngineConfig,
    classifier: ColumnClassifier,
    detector: RelationshipDetector,
    intent: Box<dyn IntentClassifier>,
}
impl Default for Engine {
    fn default() -> Self {
        Self::build(EngineConfig::default())
    }
}
impl Engine {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_config(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }
    fn build(config: EngineConfig) -> Self {
        Self {
            classifier: ColumnClassifier::with_config(config.classifier.clone()),
            detector: RelationshipDetector::with_config(config.detection.clone()),
            intent: Box::new(KeywordIntentClassifier),
            config,
        }
    }
    pub fn with_intent_classifier(mut self, intent: Box<dyn IntentClassifier>) -> Self {
        self.intent = intent;
        self
    }
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn classify(&self, dataset: &Dataset) -> ColumnClassification {
        self.classifier.classify(dataset)
    }
    pub fn detect(&self, datasets: &[Dataset], ai_text: Option<&str>) -> DetectionReport {
        self.detector.detect(datasets, ai_text)
    }
    pub async fn detect_with_generator(
        &self,
        datasets: &[Dataset],
        generator: &dyn TextGenerator,
    ) -> DetectionReport {
        self.detector.detect_with_generator(datasets, generator).await
    }
    /// Classifies `dataset` and aggregates it for `chart_type`.
    pub fn build_series(
        &self,
        dataset: &Dataset,
        chart_type: ChartType,
        x_column: &str,
        y_column: Option<&str>,
        order: SeriesOrder,
    ) -> ChartSeries {
        let classification = self.classify(dataset);
        SeriesBuilder::with_config(self.config.aggregation.clone())
            .with_order(order)
            .build(dataset, chart_type, x_column, y_column, &classification)
    }
    /// Picks a chart for `query` and builds its series. `None` when the
    /// dataset's columns cannot back any chart.
    pub fn suggest(&self, dataset: &Dataset, query: &str) -> Option<Suggestion> {
        let classification = self.classify(dataset);
        let Some(intent) = self.intent.classify_intent(
            query,
            &classification.numeric,
            &classification.categorical,
        ) else {
            debug!(dataset = %dataset.name, "No chart suggestion available");
            return None;
        };
        let series = SeriesBuilder::with_config(self.config.aggregation.clone()).build(
            dataset,
            intent.chart_type,
            &intent.x_column,
            intent.y_column.as_deref(),
            &classification,
        );
        info!(
            dataset = %dataset.name,
            chart = %intent.chart_type,
            points = series.len(),
            "Chart suggested"
        );
        Some(Suggestion { intent, series })
    }
}
