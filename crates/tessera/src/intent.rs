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

use crate::aggregation::ChartType;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartIntent {
    pub chart_type: ChartType,
    pub x_column: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y_column: Option<String>,
}
impl ChartIntent {
    fn new(chart_type: ChartType, x: &str, y: Option<&str>) -> Self {
        Self {
            chart_type,
            x_column: x.to_string(),
            y_column: y.map(str::to_string),
        }
    }
}

/// Picks a chart and its columns for a free-text request.
///
/// `None` means the data cannot be visualised automatically.
pub trait IntentClassifier: Send + Sync {
    fn classify_intent(
        &self,
        query: &str,
        numeric_columns: &[String],
        categorical_columns: &[String],
    ) -> Option<ChartIntent>;
}

/// Keyword families, in the order they are tried.
const KEYWORD_FAMILIES: [(ChartType, &[&str]); 4] = [
    (ChartType::Bar, &["bar", "category", "group"]),
    (ChartType::Line, &["line", "trend", "time"]),
    (ChartType::Pie, &["pie", "proportion", "distribution"]),
    (ChartType::Scatter, &["scatter", "correlation", "relationship"]),
];

/// Substring keyword matching on the lower-cased query.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordIntentClassifier;

impl KeywordIntentClassifier {
    fn satisfy(chart_type: ChartType, numeric: &[String], categorical: &[String]) -> Option<ChartIntent> {
        match chart_type {
            ChartType::Bar => match (categorical.first(), numeric.first()) {
                (Some(x), Some(y)) => Some(ChartIntent::new(ChartType::Bar, x, Some(y))),
                _ => None,
            },
            ChartType::Line | ChartType::Scatter => match numeric {
                [x, y, ..] => Some(ChartIntent::new(chart_type, x, Some(y))),
                _ => None,
            },
            ChartType::Pie => categorical
                .first()
                .map(|x| ChartIntent::new(ChartType::Pie, x, None)),
        }
    }
}

impl IntentClassifier for KeywordIntentClassifier {
    fn classify_intent(
        &self,
        query: &str,
        numeric_columns: &[String],
        categorical_columns: &[String],
    ) -> Option<ChartIntent> {
        let query = query.to_lowercase();
        let mut any_keyword = false;
        for (chart_type, keywords) in KEYWORD_FAMILIES {
            if !keywords.iter().any(|k| query.contains(k)) {
                continue;
            }
            any_keyword = true;
            if let Some(intent) = Self::satisfy(chart_type, numeric_columns, categorical_columns) {
                debug!(chart = %chart_type, "Intent matched by keyword");
                return Some(intent);
            }
        }
        if any_keyword {
            debug!("Keywords matched but no family could be satisfied; using defaults");
        }
        let fallback = Self::satisfy(ChartType::Bar, numeric_columns, categorical_columns)
            .or_else(|| Self::satisfy(ChartType::Scatter, numeric_columns, categorical_columns));
        if fallback.is_none() {
            debug!("No chart intent can be derived from the available columns");
        }
        fallback
    }
}

/// [`KeywordIntentClassifier`] as a plain function.
pub fn select_intent(
    query: &str,
    numeric_columns: &[String],
    categorical_columns: &[String],
) -> Option<ChartIntent> {
    KeywordIntentClassifier.classify_intent(query, numeric_columns, categorical_columns)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn keyword_families() {
        let numeric = cols(&["sales", "profit"]);
        let categorical = cols(&["region"]);
        let pick = |q: &str| select_intent(q, &numeric, &categorical).map(|i| i.chart_type);

        assert_eq!(pick("Sales by CATEGORY please"), Some(ChartType::Bar));
        assert_eq!(pick("show the trend"), Some(ChartType::Line));
        assert_eq!(pick("proportion of regions"), Some(ChartType::Pie));
        assert_eq!(pick("correlation of sales and profit"), Some(ChartType::Scatter));
    }

    #[test]
    fn columns_follow_family_rules() {
        let numeric = cols(&["sales", "profit", "units"]);
        let categorical = cols(&["region", "segment"]);
        assert_eq!(
            select_intent("bar", &numeric, &categorical),
            Some(ChartIntent::new(ChartType::Bar, "region", Some("sales")))
        );
        assert_eq!(
            select_intent("line", &numeric, &categorical),
            Some(ChartIntent::new(ChartType::Line, "sales", Some("profit")))
        );
        assert_eq!(
            select_intent("pie", &numeric, &categorical),
            Some(ChartIntent::new(ChartType::Pie, "region", None))
        );
    }

    #[test]
    fn priority_skips_unsatisfiable_families() {
        // "group" asks for bar, which needs a categorical column; "scatter" can be served.
        let numeric = cols(&["a", "b"]);
        assert_eq!(
            select_intent("group scatter", &numeric, &[]).map(|i| i.chart_type),
            Some(ChartType::Scatter)
        );
        // bar wins over pie when both match and both are satisfiable
        let categorical = cols(&["c"]);
        assert_eq!(
            select_intent("pie or bar", &numeric, &categorical).map(|i| i.chart_type),
            Some(ChartType::Bar)
        );
    }

    #[test]
    fn defaults_without_keywords() {
        assert_eq!(
            select_intent("hello", &cols(&["n"]), &cols(&["c"])).map(|i| i.chart_type),
            Some(ChartType::Bar)
        );
        assert_eq!(
            select_intent("hello", &cols(&["n", "m"]), &[]).map(|i| i.chart_type),
            Some(ChartType::Scatter)
        );
        assert_eq!(select_intent("hello", &cols(&["n"]), &[]), None);
        assert_eq!(select_intent("pie", &cols(&["n"]), &[]), None);
    }
}
