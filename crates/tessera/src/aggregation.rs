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

//! Turns raw rows into chart-ready series.
//!
//! Every numeric read goes through [`Scalar::to_number_or_zero`], so sums and
//! means are always finite. A data shape that does not suit the requested
//! chart produces an empty series rather than an error.

use crate::classifier::{ColumnClassification, ColumnKind};
use crate::config::AggregationConfig;
use crate::dataset::{Dataset, Scalar};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    Bar,
    Line,
    Pie,
    Scatter,
}
impl ChartType {
    pub const ALL: [ChartType; 4] = [ChartType::Bar, ChartType::Line, ChartType::Pie, ChartType::Scatter];
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartType::Bar => "bar",
            ChartType::Line => "line",
            ChartType::Pie => "pie",
            ChartType::Scatter => "scatter",
        }
    }
}
impl fmt::Display for ChartType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
impl FromStr for ChartType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ChartType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown chart type '{s}'"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SeriesPoint {
    Category { label: String, value: f64 },
    Coordinate { x: f64, y: f64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceColumns {
    pub x: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
}

/// Chart-ready output. Built once per request and not modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSeries {
    pub chart_type: ChartType,
    pub points: Vec<SeriesPoint>,
    pub source_columns: SourceColumns,
}
impl ChartSeries {
    fn new(chart_type: ChartType, x: &str, y: Option<&str>, points: Vec<SeriesPoint>) -> Self {
        Self {
            chart_type,
            points,
            source_columns: SourceColumns {
                x: x.to_string(),
                y: y.map(str::to_string),
            },
        }
    }
    /// An empty series means the data cannot back this chart; render a
    /// placeholder.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
    pub fn len(&self) -> usize {
        self.points.len()
    }
}

/// Emission order for grouped bar charts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SeriesOrder {
    #[default]
    FirstSeen,
    /// Highest values first, at most `n` groups.
    TopN(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationStrategy {
    /// Occurrences per distinct x value.
    Count,
    /// One point per row.
    Points,
    /// Mean y per distinct x value.
    GroupMean,
    /// Mean x / mean y per equal-size bin of x-sorted rows.
    Binned,
    Unsupported,
}

pub fn strategy_for(
    chart_type: ChartType,
    x_kind: Option<ColumnKind>,
    y_kind: Option<ColumnKind>,
) -> AggregationStrategy {
    use ColumnKind::{Categorical, Numeric};
    match (chart_type, x_kind, y_kind) {
        (ChartType::Pie, Some(_), _) => AggregationStrategy::Count,
        (ChartType::Scatter, Some(Numeric), Some(Numeric)) => AggregationStrategy::Points,
        (ChartType::Bar | ChartType::Line, Some(Categorical), Some(Numeric)) => {
            AggregationStrategy::GroupMean
        }
        (ChartType::Bar | ChartType::Line, Some(Numeric), Some(Numeric)) => {
            AggregationStrategy::Binned
        }
        _ => AggregationStrategy::Unsupported,
    }
}

#[derive(Debug, Clone, Default)]
pub struct SeriesBuilder {
    config: AggregationConfig,
    order: SeriesOrder,
}
impl SeriesBuilder {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_config(config: AggregationConfig) -> Self {
        Self {
            config,
            order: SeriesOrder::FirstSeen,
        }
    }
    /// Only grouped bar charts honour [`SeriesOrder::TopN`].
    pub fn with_order(mut self, order: SeriesOrder) -> Self {
        self.order = order;
        self
    }

    /// `classification` must come from `dataset` itself.
    pub fn build(
        &self,
        dataset: &Dataset,
        chart_type: ChartType,
        x_column: &str,
        y_column: Option<&str>,
        classification: &ColumnClassification,
    ) -> ChartSeries {
        let x_kind = dataset
            .has_column(x_column)
            .then(|| classification.kind_of(x_column))
            .flatten();
        let y_kind = y_column
            .filter(|y| dataset.has_column(y))
            .and_then(|y| classification.kind_of(y));
        let strategy = strategy_for(chart_type, x_kind, y_kind);
        debug!(
            dataset = %dataset.name,
            chart = %chart_type,
            x = x_column,
            y = ?y_column,
            ?strategy,
            "Building series"
        );
        let points = match (strategy, y_column) {
            (AggregationStrategy::Count, _) => self.count_points(dataset, x_column),
            (AggregationStrategy::Points, Some(y)) => self.scatter_points(dataset, x_column, y),
            (AggregationStrategy::GroupMean, Some(y)) => {
                let order = if chart_type == ChartType::Bar {
                    self.order
                } else {
                    SeriesOrder::FirstSeen
                };
                self.group_mean_points(dataset, x_column, y, order)
            }
            (AggregationStrategy::Binned, Some(y)) => self.binned_points(dataset, x_column, y),
            _ => Vec::new(),
        };
        ChartSeries::new(chart_type, x_column, y_column, points)
    }

    fn group_label(&self, cell: &Scalar) -> String {
        cell.label()
            .unwrap_or_else(|| self.config.unknown_label.clone())
    }

    fn count_points(&self, dataset: &Dataset, x_column: &str) -> Vec<SeriesPoint> {
        let mut counts: IndexMap<String, usize> = IndexMap::new();
        for cell in dataset.column_values(x_column) {
            *counts.entry(self.group_label(cell)).or_insert(0) += 1;
        }
        counts
            .into_iter()
            .map(|(label, count)| SeriesPoint::Category {
                label,
                value: count as f64,
            })
            .collect()
    }

    fn scatter_points(&self, dataset: &Dataset, x_column: &str, y_column: &str) -> Vec<SeriesPoint> {
        let limit = self.config.scatter_max_points.unwrap_or(usize::MAX);
        dataset
            .column_values(x_column)
            .zip(dataset.column_values(y_column))
            .take(limit)
            .map(|(x, y)| SeriesPoint::Coordinate {
                x: x.to_number_or_zero(),
                y: y.to_number_or_zero(),
            })
            .collect()
    }

    fn group_mean_points(
        &self,
        dataset: &Dataset,
        x_column: &str,
        y_column: &str,
        order: SeriesOrder,
    ) -> Vec<SeriesPoint> {
        let mut groups: IndexMap<String, (f64, usize)> = IndexMap::new();
        for (x, y) in dataset
            .column_values(x_column)
            .zip(dataset.column_values(y_column))
        {
            let entry = groups.entry(self.group_label(x)).or_insert((0.0, 0));
            entry.0 += y.to_number_or_zero();
            entry.1 += 1;
        }
        let mut points: Vec<(String, f64)> = groups
            .into_iter()
            .map(|(label, (sum, count))| (label, sum / count as f64))
            .collect();
        if let SeriesOrder::TopN(n) = order {
            points.sort_by(|a, b| b.1.total_cmp(&a.1));
            points.truncate(n);
        }
        points
            .into_iter()
            .map(|(label, value)| SeriesPoint::Category { label, value })
            .collect()
    }

    fn binned_points(&self, dataset: &Dataset, x_column: &str, y_column: &str) -> Vec<SeriesPoint> {
        let mut pairs: Vec<(f64, f64)> = dataset
            .column_values(x_column)
            .zip(dataset.column_values(y_column))
            .map(|(x, y)| (x.to_number_or_zero(), y.to_number_or_zero()))
            .collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
        bin_pairs(&pairs, self.config.bin_count)
    }
}

/// Splits x-sorted pairs into bins of `max(1, n / bin_count)` rows. The last
/// bin may be short and still yields a point.
pub fn bin_pairs(pairs: &[(f64, f64)], bin_count: usize) -> Vec<SeriesPoint> {
    let bin_size = (pairs.len() / bin_count.max(1)).max(1);
    pairs
        .chunks(bin_size)
        .map(|bin| {
            let n = bin.len() as f64;
            let mean_x = bin.iter().map(|(x, _)| x).sum::<f64>() / n;
            let mean_y = bin.iter().map(|(_, y)| y).sum::<f64>() / n;
            SeriesPoint::Category {
                label: format!("{mean_x:.1}"),
                value: mean_y,
            }
        })
        .collect()
}

/// Default-configured [`SeriesBuilder::build`].
pub fn build_series(
    dataset: &Dataset,
    chart_type: ChartType,
    x_column: &str,
    y_column: Option<&str>,
    classification: &ColumnClassification,
) -> ChartSeries {
    SeriesBuilder::new().build(dataset, chart_type, x_column, y_column, classification)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chart_type_round_trips_through_text() {
        assert_eq!("Scatter".parse::<ChartType>(), Ok(ChartType::Scatter));
        assert!("radar".parse::<ChartType>().is_err());
        assert_eq!(ChartType::Pie.to_string(), "pie");
    }

    #[test]
    fn strategy_table() {
        use ColumnKind::{Categorical, Numeric};
        assert_eq!(strategy_for(ChartType::Pie, Some(Numeric), None), AggregationStrategy::Count);
        assert_eq!(
            strategy_for(ChartType::Line, Some(Categorical), Some(Numeric)),
            AggregationStrategy::GroupMean
        );
        assert_eq!(
            strategy_for(ChartType::Bar, Some(Numeric), Some(Numeric)),
            AggregationStrategy::Binned
        );
        assert_eq!(
            strategy_for(ChartType::Bar, Some(Categorical), Some(Categorical)),
            AggregationStrategy::Unsupported
        );
        assert_eq!(
            strategy_for(ChartType::Scatter, Some(Categorical), Some(Numeric)),
            AggregationStrategy::Unsupported
        );
        assert_eq!(strategy_for(ChartType::Pie, None, None), AggregationStrategy::Unsupported);
    }

    #[test]
    fn bins_cover_all_pairs() {
        let pairs: Vec<(f64, f64)> = (0..101).map(|i| (f64::from(i), 2.0 * f64::from(i))).collect();
        let points = bin_pairs(&pairs, 20);
        assert_eq!(points.len(), 21);
        assert_eq!(
            points[0],
            SeriesPoint::Category { label: "2.0".into(), value: 4.0 }
        );
        assert_eq!(
            points[20],
            SeriesPoint::Category { label: "100.0".into(), value: 200.0 }
        );
    }

    #[test]
    fn fewer_pairs_than_bins_gives_one_point_per_pair() {
        let pairs = vec![(1.0, 1.0), (2.0, 3.0), (3.0, 5.0)];
        assert_eq!(bin_pairs(&pairs, 20).len(), 3);
        assert!(bin_pairs(&[], 20).is_empty());
    }
}
