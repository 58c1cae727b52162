//! System prompts and per-operation message composition.
//!
//! Each operation seeds its session with a fixed system prompt, so the
//! session cache reuses one session per `(provider, operation)`. The user
//! message carries the prompt text and whatever context the caller has.

use std::fmt::Write;

use crate::types::{ClarifyingAnswer, FieldContext, PageContext};

pub const ANALYSIS_SYSTEM_PROMPT: &str = "\
You review prompts that people are about to send to an AI assistant. \
Identify what makes the prompt vague or ambiguous and how to improve it. \
Respond with a single JSON object and nothing else:
{\"issues\": [string], \"suggestions\": [string], \"optimizedPrompt\": string, \
\"vaguenessScore\": integer from 0 (precise) to 10 (very vague), \
\"confidence\": number from 0 to 1}";

pub const QUESTIONS_SYSTEM_PROMPT: &str = "\
You help people clarify prompts before they send them to an AI assistant. \
Ask the few questions whose answers would most improve the prompt. \
Ask at most three short questions, most important first. \
Respond with a single JSON object and nothing else:
{\"questions\": [string], \"confidence\": number from 0 to 1}";

pub const OPTIMIZATION_SYSTEM_PROMPT: &str = "\
You rewrite prompts for an AI assistant using answers the author gave to \
clarifying questions. Keep the author's intent and language; make the prompt \
specific, complete and self-contained. \
Respond with a single JSON object and nothing else:
{\"optimizedPrompt\": string, \"improvements\": [string], \
\"vaguenessScore\": integer from 0 (precise) to 10 (very vague), \
\"confidence\": number from 0 to 1}";

/// Message for a plain analysis.
pub fn analysis_message(prompt: &str, field: &FieldContext) -> String {
    let mut message = String::new();
    push_field(&mut message, field);
    push_prompt(&mut message, prompt);
    message
}

/// Message for an analysis enriched with the surrounding page.
pub fn page_analysis_message(prompt: &str, field: &FieldContext, page: &PageContext) -> String {
    let mut message = String::new();
    push_page(&mut message, page);
    push_field(&mut message, field);
    push_prompt(&mut message, prompt);
    message
}

pub fn questions_message(prompt: &str, field: &FieldContext) -> String {
    let mut message = String::new();
    push_field(&mut message, field);
    push_prompt(&mut message, prompt);
    message
}

pub fn optimization_message(
    prompt: &str,
    answers: &[ClarifyingAnswer],
    field: &FieldContext,
) -> String {
    let mut message = String::new();
    push_field(&mut message, field);
    push_prompt(&mut message, prompt);
    if !answers.is_empty() {
        message.push_str("\nClarifications:\n");
        for answer in answers {
            let _ = writeln!(message, "Q: {}\nA: {}", answer.question.trim(), answer.answer.trim());
        }
    }
    message
}

fn push_field(message: &mut String, field: &FieldContext) {
    let field_type = field.field_type.trim();
    if !field_type.is_empty() {
        let _ = writeln!(message, "Field type: {field_type}");
    }
    if let Some(placeholder) = non_empty(&field.placeholder) {
        let _ = writeln!(message, "Field placeholder: {placeholder}");
    }
}

fn push_page(message: &mut String, page: &PageContext) {
    if let Some(title) = non_empty(&page.title) {
        let _ = writeln!(message, "Page title: {title}");
    }
    if let Some(url) = non_empty(&page.url) {
        let _ = writeln!(message, "Page URL: {url}");
    }
    if let Some(text) = non_empty(&page.surrounding_text) {
        let _ = writeln!(message, "Text near the field:\n{text}");
    }
}

fn push_prompt(message: &mut String, prompt: &str) {
    if !message.is_empty() {
        message.push('\n');
    }
    let _ = writeln!(message, "Prompt:\n{prompt}");
}

fn non_empty(value: &str) -> Option<&str> {
    let value = value.trim();
    (!value.is_empty()).then_some(value)
}
