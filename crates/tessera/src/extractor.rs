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

//! Recovers a JSON array from free-form generated text.
//!
//! Generated text may wrap its payload in prose or Markdown fences, or emit a
//! lone object instead of an array. [`extract_json`] tries, for arrays and
//! then for objects:
//!
//! 1. bracket-matched spans, in order of their opening bracket; an array
//!    nested inside a parseable object is not a candidate,
//! 2. fenced code blocks (```` ```json ```` or bare ```` ``` ````),
//! 3. the loosest span from the first opening to the last closing bracket.
//!
//! A candidate is only accepted once it parses. An object is wrapped into a
//! one-element array. When nothing parses the result is `"[]"`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

static FENCED_BLOCK_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?si)```(?:json)?\s*(.*?)\s*```").unwrap());

pub const EMPTY_ARRAY: &str = "[]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Array,
    Object,
}
impl Shape {
    fn delimiters(self) -> (char, char) {
        match self {
            Shape::Array => ('[', ']'),
            Shape::Object => ('{', '}'),
        }
    }
    fn accepts(self, value: &Value) -> bool {
        match self {
            Shape::Array => value.is_array(),
            Shape::Object => value.is_object(),
        }
    }
}

/// Returns the first parseable top-level JSON array in `text` (objects are
/// wrapped as `[obj]`), or `"[]"`. Never fails.
pub fn extract_json(text: &str) -> String {
    let mut scan = BracketScan::new(text);
    if let Some(array) = find_fragment(&mut scan, Shape::Array) {
        return array.to_string();
    }
    if let Some(object) = find_fragment(&mut scan, Shape::Object) {
        debug!("Wrapping lone JSON object as a one-element array");
        return format!("[{object}]");
    }
    debug!("No parseable JSON found in text");
    EMPTY_ARRAY.to_string()
}

/// [`extract_json`], parsed.
pub fn extract_json_value(text: &str) -> Value {
    serde_json::from_str(&extract_json(text)).unwrap_or_else(|_| Value::Array(Vec::new()))
}

pub fn is_valid_json(text: &str) -> bool {
    serde_json::from_str::<Value>(text).is_ok()
}

fn parses_as(candidate: &str, shape: Shape) -> bool {
    serde_json::from_str::<Value>(candidate).is_ok_and(|v| shape.accepts(&v))
}

/// Arrays are only accepted outside any parseable object, so a field such as
/// `"tags": ["fk"]` never stands in for the object that carries it.
fn find_fragment<'a>(scan: &mut BracketScan<'a>, shape: Shape) -> Option<&'a str> {
    let text = scan.text;
    let (open, close) = shape.delimiters();

    let spans: Vec<Span> = scan.spans.iter().filter(|s| s.shape == shape).copied().collect();
    for span in spans {
        let candidate = &text[span.start..span.end];
        let top_level = shape == Shape::Object || !scan.span_inside_object(&span);
        if top_level && parses_as(candidate, shape) {
            debug!(?shape, "Extracted JSON from bracket-matched span");
            return Some(candidate);
        }
    }
    if let Some(block) = fenced_blocks(text).find(|b| b.starts_with(open) && parses_as(b, shape)) {
        debug!(?shape, "Extracted JSON from fenced code block");
        return Some(block);
    }
    if let Some((start, end)) = loosest_span(text, open, close) {
        let candidate = &text[start..end];
        let top_level = shape == Shape::Object || !scan.range_inside_object(start, end);
        if top_level && parses_as(candidate, shape) {
            debug!(?shape, "Extracted JSON from loosest bracket span");
            return Some(candidate);
        }
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Span {
    start: usize,
    end: usize,
    shape: Shape,
    /// Start of the nearest enclosing `{`, closed or not.
    parent_object: Option<usize>,
}

struct Frame {
    open: char,
    start: usize,
    parent_object: Option<usize>,
}

/// Every balanced `[...]` and `{...}` span of `text`, found in one pass and
/// ordered by start. Quotes only open a string inside a bracket, so stray
/// quotes in surrounding prose do not hide the payload.
struct BracketScan<'a> {
    text: &'a str,
    spans: Vec<Span>,
    object_ends: HashMap<usize, usize>,
    object_parents: HashMap<usize, Option<usize>>,
    parsed_objects: HashMap<usize, bool>,
}
impl<'a> BracketScan<'a> {
    fn new(text: &'a str) -> Self {
        let mut spans = Vec::new();
        let mut object_parents = HashMap::new();
        let mut stack: Vec<Frame> = Vec::new();
        let mut in_string = false;
        let mut escaped = false;
        for (i, ch) in text.char_indices() {
            if in_string {
                match ch {
                    _ if escaped => escaped = false,
                    '\\' => escaped = true,
                    '"' => in_string = false,
                    _ => {}
                }
                continue;
            }
            match ch {
                '"' if !stack.is_empty() => in_string = true,
                '[' | '{' => {
                    let parent_object = stack.last().and_then(|f| {
                        if f.open == '{' {
                            Some(f.start)
                        } else {
                            f.parent_object
                        }
                    });
                    if ch == '{' {
                        object_parents.insert(i, parent_object);
                    }
                    stack.push(Frame {
                        open: ch,
                        start: i,
                        parent_object,
                    });
                }
                ']' | '}' => {
                    let (open, shape) = if ch == ']' {
                        ('[', Shape::Array)
                    } else {
                        ('{', Shape::Object)
                    };
                    // a close that does not match the innermost open is prose
                    if stack.last().is_some_and(|f| f.open == open) {
                        if let Some(frame) = stack.pop() {
                            spans.push(Span {
                                start: frame.start,
                                end: i + 1,
                                shape,
                                parent_object: frame.parent_object,
                            });
                        }
                    }
                }
                _ => {}
            }
        }
        spans.sort_by_key(|s| s.start);
        let object_ends = spans
            .iter()
            .filter(|s| s.shape == Shape::Object)
            .map(|s| (s.start, s.end))
            .collect();
        Self {
            text,
            spans,
            object_ends,
            object_parents,
            parsed_objects: HashMap::new(),
        }
    }

    fn is_parseable_object(&mut self, start: usize) -> bool {
        let Some(&end) = self.object_ends.get(&start) else {
            return false;
        };
        let text = self.text;
        *self
            .parsed_objects
            .entry(start)
            .or_insert_with(|| parses_as(&text[start..end], Shape::Object))
    }

    fn span_inside_object(&mut self, span: &Span) -> bool {
        let mut parent = span.parent_object;
        while let Some(object_start) = parent {
            if self.is_parseable_object(object_start) {
                return true;
            }
            parent = self.object_parents.get(&object_start).copied().flatten();
        }
        false
    }

    fn range_inside_object(&mut self, start: usize, end: usize) -> bool {
        let enclosing: Vec<usize> = self
            .object_ends
            .iter()
            .filter(|&(&os, &oe)| os < start && end <= oe)
            .map(|(&os, _)| os)
            .collect();
        enclosing
            .into_iter()
            .any(|object_start| self.is_parseable_object(object_start))
    }
}

fn fenced_blocks(text: &str) -> impl Iterator<Item = &str> {
    FENCED_BLOCK_REGEX
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Byte range from the first `open` through the last `close`.
fn loosest_span(text: &str, open: char, close: char) -> Option<(usize, usize)> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| (start, end + close.len_utf8()))
}
