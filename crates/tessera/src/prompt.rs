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

use crate::dataset::Dataset;

const INSTRUCTIONS: &str = "You are analysing several tabular datasets uploaded by the same user. \
Identify pairs of columns in different datasets that refer to the same entity \
(for example a key in one file and a foreign key in another).";

const RESPONSE_FORMAT: &str = "Respond with a JSON array only. Each element must have the fields \
\"sourceFile\", \"targetFile\", \"sourceColumn\", \"targetColumn\", \
\"type\" (\"one-to-one\" or \"one-to-many\"), \"confidence\" (a number between 0 and 1) \
and \"matchingRows\" (an estimated count of rows that match). \
Use the dataset names exactly as given. Return [] if no columns are related.";

/// Prompt asking a text generator for column relationships between
/// `datasets`. Each dataset contributes its name, its columns and at most
/// `sample_rows` rows rendered as JSON.
pub fn build_relationship_prompt(datasets: &[Dataset], sample_rows: usize) -> String {
    let mut prompt = String::new();
    prompt.push_str(INSTRUCTIONS);
    prompt.push_str("\n\n");
    for dataset in datasets {
        prompt.push_str(&format!("Dataset: {}\n", dataset.name));
        prompt.push_str(&format!("Columns: {}\n", dataset.columns.join(", ")));
        if sample_rows > 0 && !dataset.rows.is_empty() {
            prompt.push_str("Sample rows:\n");
            for row in dataset.rows.iter().take(sample_rows) {
                let rendered = serde_json::to_string(row).unwrap_or_else(|_| "{}".to_string());
                prompt.push_str(&format!("  {rendered}\n"));
            }
        }
        prompt.push('\n');
    }
    prompt.push_str(RESPONSE_FORMAT);
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Row, Scalar};

    #[test]
    fn lists_every_dataset_with_bounded_samples() {
        let rows: Vec<Row> = (0..5)
            .map(|i| Row::from([("user_id".to_string(), Scalar::from(i64::from(i)))]))
            .collect();
        let users = Dataset::new("users.csv", vec!["user_id".into()], rows).unwrap();
        let orders = Dataset::new("orders.csv", vec!["order_id".into(), "userid".into()], vec![])
            .unwrap();

        let prompt = build_relationship_prompt(&[users, orders], 2);
        assert!(prompt.contains("Dataset: users.csv\nColumns: user_id\n"));
        assert!(prompt.contains("Dataset: orders.csv\nColumns: order_id, userid\n"));
        assert!(prompt.contains(r#"{"user_id":1.0}"#));
        assert!(!prompt.contains(r#"{"user_id":2.0}"#));
        assert!(prompt.contains("\"sourceFile\""));
    }
}
