//! Typed result assembly from raw model output.
//!
//! Extraction (see [`crate::extract`]) finds a structured value; this module
//! decodes it into the operation's payload and builds the success result.
//! Analysis treats a parse failure as fatal. Questions and optimization fall
//! back to a heuristic reading of the raw text at [`FALLBACK_CONFIDENCE`].

use serde::Deserialize;

use crate::extract::{self, ExtractionStrategy};
use crate::types::{
    AnalysisResult, DEFAULT_VAGUENESS_SCORE, MAX_VAGUENESS_SCORE, Metadata, OptimizationResult,
    QuestionResult,
};
use crate::{HuginnError, Result};

/// Confidence of a parsed result whose payload carries none.
pub const DEFAULT_CONFIDENCE: f32 = 0.8;

/// Confidence of a result recovered by heuristic fallback.
pub const FALLBACK_CONFIDENCE: f32 = 0.3;

/// Upper bound on questions kept from one response.
pub const MAX_QUESTIONS: usize = 5;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalysisPayload {
    #[serde(default)]
    issues: Vec<String>,
    #[serde(default)]
    suggestions: Vec<String>,
    #[serde(default, alias = "optimized_prompt")]
    optimized_prompt: Option<String>,
    #[serde(default, alias = "vagueness_score", alias = "score")]
    vagueness_score: Option<f64>,
    #[serde(default)]
    confidence: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum QuestionsPayload {
    List {
        questions: Vec<String>,
        #[serde(default)]
        confidence: Option<f64>,
    },
    Single {
        question: String,
        #[serde(default)]
        confidence: Option<f64>,
    },
    Bare(Vec<String>),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OptimizationPayload {
    #[serde(alias = "optimized_prompt", alias = "prompt")]
    optimized_prompt: String,
    #[serde(default)]
    improvements: Vec<String>,
    #[serde(default, alias = "vagueness_score", alias = "score")]
    vagueness_score: Option<f64>,
    #[serde(default)]
    confidence: Option<f64>,
}

/// Build an analysis result. `prompt` stands in for a missing rewrite.
pub fn analysis(raw: &str, prompt: &str, provider: &str) -> Result<AnalysisResult> {
    let (payload, strategy) = extract::parse_as::<AnalysisPayload>(raw)?;

    let optimized_prompt = payload
        .optimized_prompt
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| prompt.to_string());

    Ok(AnalysisResult {
        success: true,
        issues: clean_list(payload.issues),
        suggestions: clean_list(payload.suggestions),
        optimized_prompt,
        vagueness_score: vagueness(payload.vagueness_score),
        provider: provider.to_string(),
        confidence: confidence(payload.confidence),
        metadata: parsed_metadata(strategy),
    })
}

/// Build a question result, falling back to `?`-terminated lines.
pub fn questions(raw: &str, provider: &str) -> Result<QuestionResult> {
    if let Ok((payload, strategy)) = extract::parse_as::<QuestionsPayload>(raw) {
        let (questions, reported) = match payload {
            QuestionsPayload::List {
                questions,
                confidence,
            } => (questions, confidence),
            QuestionsPayload::Single {
                question,
                confidence,
            } => (vec![question], confidence),
            QuestionsPayload::Bare(questions) => (questions, None),
        };
        let questions = cap(clean_list(questions));
        if !questions.is_empty() {
            return Ok(QuestionResult {
                success: true,
                questions,
                provider: provider.to_string(),
                confidence: confidence(reported),
                metadata: parsed_metadata(strategy),
            });
        }
    }

    let questions = cap(question_lines(raw));
    if questions.is_empty() {
        return Err(HuginnError::ResponseParse {
            excerpt: extract::excerpt(raw.trim()),
        });
    }
    Ok(QuestionResult {
        success: true,
        questions,
        provider: provider.to_string(),
        confidence: FALLBACK_CONFIDENCE,
        metadata: fallback_metadata("question_lines"),
    })
}

/// Build an optimization result, falling back to the raw text when it is
/// longer than the original prompt.
pub fn optimization(raw: &str, prompt: &str, provider: &str) -> Result<OptimizationResult> {
    match extract::parse_as::<OptimizationPayload>(raw) {
        Ok((payload, strategy)) if !payload.optimized_prompt.trim().is_empty() => {
            Ok(OptimizationResult {
                success: true,
                optimized_prompt: payload.optimized_prompt.trim().to_string(),
                improvements: clean_list(payload.improvements),
                vagueness_score: vagueness(payload.vagueness_score),
                provider: provider.to_string(),
                confidence: confidence(payload.confidence),
                metadata: parsed_metadata(strategy),
            })
        }
        _ => {
            let text = strip_fences(raw.trim());
            if text.chars().count() <= prompt.trim().chars().count() {
                return Err(HuginnError::ResponseParse {
                    excerpt: extract::excerpt(raw.trim()),
                });
            }
            Ok(OptimizationResult {
                success: true,
                optimized_prompt: text.to_string(),
                improvements: Vec::new(),
                vagueness_score: DEFAULT_VAGUENESS_SCORE,
                provider: provider.to_string(),
                confidence: FALLBACK_CONFIDENCE,
                metadata: fallback_metadata("raw_text"),
            })
        }
    }
}

fn parsed_metadata(strategy: ExtractionStrategy) -> Metadata {
    Metadata::now().with("parseStrategy", strategy.as_str())
}

fn fallback_metadata(fallback: &str) -> Metadata {
    Metadata::now().with("fallback", fallback)
}

/// Round and clamp a reported score; missing or non-finite means default.
fn vagueness(score: Option<f64>) -> u8 {
    match score {
        Some(score) if score.is_finite() => {
            score.round().clamp(0.0, f64::from(MAX_VAGUENESS_SCORE)) as u8
        }
        _ => DEFAULT_VAGUENESS_SCORE,
    }
}

fn confidence(reported: Option<f64>) -> f32 {
    match reported {
        Some(c) if c.is_finite() => c.clamp(0.0, 1.0) as f32,
        _ => DEFAULT_CONFIDENCE,
    }
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

fn cap(mut questions: Vec<String>) -> Vec<String> {
    questions.truncate(MAX_QUESTIONS);
    questions
}

/// Lines ending in `?`, with list markers removed.
fn question_lines(raw: &str) -> Vec<String> {
    raw.lines()
        .map(strip_list_marker)
        .filter(|line| line.len() > 1 && line.ends_with('?'))
        .map(str::to_string)
        .collect()
}

fn strip_list_marker(line: &str) -> &str {
    let line = line.trim();
    let line = line
        .strip_prefix(['-', '*', '•'])
        .unwrap_or(line)
        .trim_start();
    let digits = line.len() - line.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits > 0
        && let Some(rest) = line[digits..].strip_prefix(['.', ')'])
    {
        return rest.trim();
    }
    line.trim()
}

fn strip_fences(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.strip_suffix("```").unwrap_or(body).trim()
}
