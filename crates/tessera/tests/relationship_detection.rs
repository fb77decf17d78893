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

use async_trait::async_trait;
use llm_contracts::{GenerationRequest, LLMError, LLMResult, TextGenerator, DEFAULT_MAX_TOKENS};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tessera::config::DetectionConfig;
use tessera::{
    detect_relationships, Dataset, DetectionSource, Engine, RelationshipDetector, RelationshipKind,
};

fn users() -> Dataset {
    Dataset::from_csv_reader("users.csv", "user_id,name\n1,Ada\n2,Grace\n".as_bytes())
        .unwrap()
        .with_id("users")
}

fn orders() -> Dataset {
    Dataset::from_csv_reader(
        "orders.csv",
        "order_id,userid,amount\n10,1,9.5\n11,2,3\n12,1,4\n".as_bytes(),
    )
    .unwrap()
    .with_id("orders")
}

#[test]
fn fallback_links_similar_column_names() {
    let datasets = vec![users(), orders()];
    let updated = detect_relationships(&datasets, None);

    assert_eq!(updated.len(), 2);
    let rels = &updated[0].relationships;
    assert_eq!(rels.len(), 1);
    let rel = &rels[0];
    assert_eq!(rel.source_dataset_id, "users");
    assert_eq!(rel.target_dataset_id, "orders");
    assert_eq!(rel.source_column, "user_id");
    assert_eq!(rel.target_column, "userid");
    assert_eq!(rel.kind, RelationshipKind::OneToMany);
    assert_eq!(rel.matching_row_count, 0);
    assert!((rel.confidence - 6.0 / 7.0).abs() < 1e-9);
    // the target dataset owns nothing from this pair
    assert!(updated[1].relationships.is_empty());
}

#[test]
fn detection_is_idempotent() {
    let datasets = vec![users(), orders()];
    let once = detect_relationships(&datasets, None);
    let twice = detect_relationships(&once, None);
    assert_eq!(once, twice);
}

#[test]
fn relationship_lists_are_replaced_not_merged() {
    let detector = RelationshipDetector::with_config(DetectionConfig {
        similarity_threshold: 0.99,
        ..Default::default()
    });
    let linked = detect_relationships(&[users(), orders()], None);
    assert_eq!(linked[0].relationships.len(), 1);

    let relinked = detector.detect_relationships(&linked, None);
    assert!(relinked[0].relationships.is_empty());
}

#[test]
fn single_dataset_is_returned_unchanged() {
    let detector = RelationshipDetector::new();
    let report = detector.detect(&[users()], Some("[]"));
    assert_eq!(report.source, DetectionSource::Skipped);
    assert_eq!(report.total(), 0);

    assert!(detect_relationships(&[], None).is_empty());
    assert_eq!(detect_relationships(&[users()], None), vec![users()]);
}

#[test]
fn generated_text_wins_when_it_parses() {
    let text = "Here is what I found:\n```json\n[{\"sourceFile\": \"users.csv\", \"targetFile\": \"orders.csv\", \
                \"sourceColumn\": \"user_id\", \"targetColumn\": \"userid\", \"type\": \"one-to-one\", \
                \"confidence\": 0.95, \"matchingRows\": 3}]\n```";
    let report = RelationshipDetector::new().detect(&[users(), orders()], Some(text));

    assert_eq!(report.source, DetectionSource::Ai);
    let rels = report.for_dataset("users");
    assert_eq!(rels.len(), 1);
    assert_eq!(rels[0].kind, RelationshipKind::OneToOne);
    assert_eq!(rels[0].confidence, 0.95);
    assert_eq!(rels[0].matching_row_count, 3);
}

#[test]
fn lone_generated_record_with_list_field_is_kept() {
    let text = r#"{"sourceFile": "users.csv", "targetFile": "orders.csv",
                   "sourceColumn": "user_id", "targetColumn": "userid",
                   "type": "one-to-many", "confidence": 0.9, "tags": ["fk"]}"#;
    let report = RelationshipDetector::new().detect(&[users(), orders()], Some(text));

    assert_eq!(report.source, DetectionSource::Ai);
    let rels = report.for_dataset("users");
    assert_eq!(rels.len(), 1);
    assert_eq!(rels[0].target_column, "userid");
    assert_eq!(rels[0].confidence, 0.9);
}

#[test]
fn generated_relationship_can_be_owned_by_a_later_dataset() {
    let text = r#"[{"sourceFile": "orders.csv", "targetFile": "users.csv",
                    "sourceColumn": "userid", "targetColumn": "user_id", "confidence": 0.8}]"#;
    let updated = detect_relationships(&[users(), orders()], Some(text));
    assert!(updated[0].relationships.is_empty());
    assert_eq!(updated[1].relationships.len(), 1);
    assert_eq!(updated[1].relationships[0].target_dataset_id, "users");
}

#[test]
fn malformed_text_falls_back_to_similarity() {
    let detector = RelationshipDetector::new();
    for text in ["I could not find anything.", "[]", "[{\"sourceFile\": ", "{}"] {
        let report = detector.detect(&[users(), orders()], Some(text));
        assert_eq!(report.source, DetectionSource::Fallback, "text: {text}");
        assert_eq!(report.total(), 1, "text: {text}");
    }
}

#[test]
fn three_datasets_scan_every_pair_once() {
    let payments = Dataset::from_csv_reader("payments.csv", "payment_id,user_id\n1,1\n".as_bytes())
        .unwrap()
        .with_id("payments");
    let report = RelationshipDetector::new().detect(&[users(), orders(), payments], None);

    // users -> orders (user_id ~ userid), users -> payments (user_id = user_id),
    // orders -> payments (userid ~ user_id, order_id ~ payment_id is too far)
    assert_eq!(report.for_dataset("users").len(), 2);
    assert_eq!(report.for_dataset("orders").len(), 1);
    assert!(report.for_dataset("payments").is_empty());

    let users_rels = report.for_dataset("users");
    assert_eq!(users_rels[0].target_dataset_id, "payments");
    assert_eq!(users_rels[0].confidence, 1.0);
}

#[test]
fn stale_relationships_are_filtered_by_consumers() {
    let updated = detect_relationships(&[users(), orders()], None);
    let mut orders_edited = updated[1].clone();
    orders_edited.columns.retain(|c| c != "userid");

    let current = vec![updated[0].clone(), orders_edited];
    assert!(updated[0].live_relationships(&current).is_empty());
    assert_eq!(updated[0].live_relationships(&updated).len(), 1);
}

struct Scripted {
    reply: LLMResult<&'static str>,
    calls: AtomicUsize,
}
impl Scripted {
    fn ok(reply: &'static str) -> Self {
        Self {
            reply: Ok(reply),
            calls: AtomicUsize::new(0),
        }
    }
    fn failing(error: LLMError) -> Self {
        Self {
            reply: Err(error),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl TextGenerator for Scripted {
    async fn generate_text(&self, prompt: &str, _max_tokens: u32) -> LLMResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(prompt.contains("Dataset: users.csv"));
        match &self.reply {
            Ok(text) => Ok(text.to_string()),
            Err(LLMError::Timeout) => Err(LLMError::Timeout),
            Err(e) => Err(LLMError::Provider(e.to_string())),
        }
    }
}

#[tokio::test]
async fn generator_answer_is_used() {
    let generator = Scripted::ok(
        r#"[{"sourceFile":"users.csv","targetFile":"orders.csv","sourceColumn":"user_id","targetColumn":"userid","type":"one-to-one","confidence":0.9,"matchingRows":2}]"#,
    );
    let report = Engine::new()
        .detect_with_generator(&[users(), orders()], &generator)
        .await;
    assert_eq!(report.source, DetectionSource::Ai);
    assert_eq!(report.total(), 1);
    assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn generator_failure_degrades_without_retry() {
    let generator = Scripted::failing(LLMError::Timeout);
    let detector = RelationshipDetector::new();
    let report = detector
        .detect_with_generator(&[users(), orders()], &generator)
        .await;
    assert_eq!(report.source, DetectionSource::Fallback);
    assert_eq!(report.total(), 1);
    assert_eq!(generator.calls.load(Ordering::SeqCst), 1);

    let err = detector
        .request_relationship_text(&[users(), orders()], &generator)
        .await
        .unwrap_err();
    assert!(err.is_transient());
}

#[tokio::test]
async fn generator_is_not_called_for_a_single_dataset() {
    let generator = Scripted::ok("[]");
    let report = RelationshipDetector::new()
        .detect_with_generator(&[users()], &generator)
        .await;
    assert_eq!(report.source, DetectionSource::Skipped);
    assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
}

#[derive(Default)]
struct Recording {
    requests: Mutex<Vec<GenerationRequest>>,
}

#[async_trait]
impl TextGenerator for Recording {
    async fn generate_text(&self, _prompt: &str, _max_tokens: u32) -> LLMResult<String> {
        Err(LLMError::Provider("only generate() is expected".into()))
    }

    async fn generate(&self, request: &GenerationRequest) -> LLMResult<String> {
        self.requests.lock().unwrap().push(request.clone());
        Ok("[]".into())
    }
}

#[tokio::test]
async fn generator_receives_configured_request() {
    let generator = Recording::default();
    let detector = RelationshipDetector::with_config(DetectionConfig {
        max_tokens: 256,
        ..Default::default()
    });
    detector
        .detect_with_generator(&[users(), orders()], &generator)
        .await;

    let requests = generator.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.max_tokens, 256);
    assert!(request.prompt.contains("Dataset: orders.csv"));
    assert_eq!(
        request.metadata.get("task"),
        Some(&serde_json::json!("relationship_detection"))
    );
    assert_eq!(request.metadata.get("datasets"), Some(&serde_json::json!(2)));
}

#[test]
fn default_token_budget_comes_from_the_request_contract() {
    assert_eq!(DetectionConfig::default().max_tokens, DEFAULT_MAX_TOKENS);
}
