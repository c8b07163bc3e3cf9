//! Extraction from structured (JSON) provider responses.
//!
//! Fields are read leniently: a missing or mistyped field drops the item it
//! belongs to, never the whole response.

use serde::Serialize;
use serde_json::Value;

use super::{ExtractContext, ExtractionStrategy};
use crate::provider::StructuredFormat;
use crate::result::{SearchResult, MAX_RESULTS, MAX_SNIPPET_CHARS};
use crate::text::truncate_chars;
use crate::{Result, SearchError};

/// Snippet budget for related items.
const RELATED_SNIPPET_CHARS: usize = 120;

/// Shorter abstracts and definitions are not treated as direct answers.
const MIN_ABSTRACT_CHARS: usize = 15;
const MIN_DEFINITION_CHARS: usize = 15;
/// Shorter computed answers are not treated as direct answers.
const MIN_ANSWER_CHARS: usize = 5;

/// Strategy for JSON responses.
#[derive(Debug, Clone, Copy)]
pub struct StructuredStrategy {
    format: StructuredFormat,
}

impl StructuredStrategy {
    pub fn new(format: StructuredFormat) -> Self {
        Self { format }
    }
}

impl ExtractionStrategy for StructuredStrategy {
    fn extract(&self, ctx: &ExtractContext<'_>) -> Result<Vec<SearchResult>> {
        let document: Value = serde_json::from_str(ctx.body).map_err(|e| {
            SearchError::Parse(format!("{} response is not JSON: {}", ctx.provider.id(), e))
        })?;

        let results = match self.format {
            StructuredFormat::InstantAnswer => instant_answer(&document, ctx),
            StructuredFormat::OpenSearch => open_search(&document, ctx)?,
        };
        Ok(results)
    }
}

fn str_field<'v>(value: &'v Value, key: &str) -> Option<&'v str> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// A string field longer than `min_chars`.
fn long_field<'v>(value: &'v Value, key: &str, min_chars: usize) -> Option<&'v str> {
    str_field(value, key).filter(|s| s.chars().count() > min_chars)
}

fn instant_answer(document: &Value, ctx: &ExtractContext<'_>) -> Vec<SearchResult> {
    let provider = ctx.provider.name();
    let mut results = Vec::new();

    if let Some(abstract_text) = str_field(document, "AbstractText") {
        let title = str_field(document, "Heading").unwrap_or("Answer");
        let url = str_field(document, "AbstractURL").unwrap_or(ctx.request_url);
        results.push(SearchResult::new(
            url,
            title,
            truncate_chars(abstract_text, MAX_SNIPPET_CHARS),
            provider,
        ));
    }

    if let Some(definition) = long_field(document, "Definition", MIN_DEFINITION_CHARS) {
        let title = str_field(document, "DefinitionSource").unwrap_or("Definition");
        let url = str_field(document, "DefinitionURL").unwrap_or(ctx.request_url);
        results.push(SearchResult::new(url, title, definition, provider));
    }

    if let Some(answer) = long_field(document, "Answer", MIN_ANSWER_CHARS) {
        results.push(SearchResult::new(ctx.request_url, "Answer", answer, provider));
    }

    let mut related = Vec::new();
    if let Some(topics) = document.get("RelatedTopics").and_then(Value::as_array) {
        flatten_topics(topics, &mut related);
    }
    for topic in related {
        if let Some(result) = topic_result(topic, provider, true) {
            results.push(result);
        }
    }

    if let Some(items) = document.get("Results").and_then(Value::as_array) {
        for item in items {
            if let Some(result) = topic_result(item, provider, false) {
                results.push(result);
            }
        }
    }

    results.truncate(MAX_RESULTS);
    results
}

/// Related topics may be grouped under `{"Name": ..., "Topics": [...]}`.
fn flatten_topics<'v>(topics: &'v [Value], out: &mut Vec<&'v Value>) {
    for topic in topics {
        match topic.get("Topics").and_then(Value::as_array) {
            Some(nested) => flatten_topics(nested, out),
            None => out.push(topic),
        }
    }
}

fn topic_result(topic: &Value, provider: &str, split_title: bool) -> Option<SearchResult> {
    let text = str_field(topic, "Text")?;
    let url = str_field(topic, "FirstURL")?;
    let title = if split_title {
        text.split(" - ").next().unwrap_or(text)
    } else {
        text
    };
    Some(SearchResult::new(
        url,
        title,
        truncate_chars(text, RELATED_SNIPPET_CHARS),
        provider,
    ))
}

/// Instant-answer field a [`DirectAnswer`] was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerKind {
    Abstract,
    Definition,
    Answer,
}

/// A one-paragraph answer to a question, taken from an instant-answer
/// document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectAnswer {
    pub kind: AnswerKind,
    pub text: String,
    /// Page the answer came from, when the document names one.
    pub source: Option<String>,
}

/// Picks the direct answer from an instant-answer body.
///
/// The abstract wins over the definition, which wins over a computed answer.
/// Each must be long enough to be useful. Bodies that are not JSON have no
/// answer.
pub fn direct_answer(body: &str) -> Option<DirectAnswer> {
    let document: Value = serde_json::from_str(body).ok()?;
    let candidates = [
        (AnswerKind::Abstract, "AbstractText", MIN_ABSTRACT_CHARS, Some("AbstractURL")),
        (AnswerKind::Definition, "Definition", MIN_DEFINITION_CHARS, Some("DefinitionURL")),
        (AnswerKind::Answer, "Answer", MIN_ANSWER_CHARS, None),
    ];

    candidates
        .into_iter()
        .find_map(|(kind, key, min_chars, source_key)| {
            let text = long_field(&document, key, min_chars)?;
            Some(DirectAnswer {
                kind,
                text: text.to_string(),
                source: source_key
                    .and_then(|k| str_field(&document, k))
                    .map(str::to_string),
            })
        })
}

fn open_search(document: &Value, ctx: &ExtractContext<'_>) -> Result<Vec<SearchResult>> {
    let parts = document
        .as_array()
        .filter(|parts| parts.len() >= 4)
        .ok_or_else(|| {
            SearchError::Parse("OpenSearch response must be a 4-element array".into())
        })?;

    let column = |i: usize| parts[i].as_array().map(Vec::as_slice).unwrap_or_default();
    let (titles, descriptions, urls) = (column(1), column(2), column(3));

    let results = titles
        .iter()
        .zip(descriptions)
        .zip(urls)
        .filter_map(|((title, description), url)| {
            let title = title.as_str()?.trim();
            let url = url.as_str()?.trim();
            if title.is_empty() || url.is_empty() {
                return None;
            }
            let description = description.as_str().unwrap_or_default();
            Some(SearchResult::new(
                url,
                title,
                truncate_chars(description, RELATED_SNIPPET_CHARS),
                ctx.provider.name(),
            ))
        })
        .take(MAX_RESULTS)
        .collect();

    Ok(results)
}
