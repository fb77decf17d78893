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

use crate::requests::GenerationRequest;
use crate::types::LLMResult;
use async_trait::async_trait;

/// Anything that turns a prompt into free-form text.
///
/// The output carries no structural guarantee: it may be prose, fenced
/// Markdown or truncated JSON. Implementations should not retry; that is the
/// caller's decision.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate_text(&self, prompt: &str, max_tokens: u32) -> LLMResult<String>;

    async fn generate(&self, request: &GenerationRequest) -> LLMResult<String> {
        self.generate_text(&request.prompt, request.max_tokens)
            .await
    }
}
