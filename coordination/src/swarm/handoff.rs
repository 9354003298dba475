//! Handoff declarations and parsing.
//!
//! The engine only sees [`HandoffParse`]; how a declaration is found in the
//! response is behind [`HandoffParser`]. The stock [`PatternHandoffParser`]
//! recognizes blocks like:
//!
//! ```text
//! **HANDOFF**
//! To: azure_solutions_architect
//! Reason: Exchange Online connector needs tenant-side changes
//! Context:
//! - spf_record: v=spf1 include:spf.protection.outlook.com -all
//! - tenant: contoso
//! ```

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::router::ContextMap;

static MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^handoff(?:\s+(?:request|block|declaration))?\s*:?$")
        .expect("MARKER_RE regex should compile")
});

static TARGET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:to|target|target[ _]agent|handoff[ _]to)\s*:\s*`?([A-Za-z0-9_\-\.]+)`?\s*\.?$")
        .expect("TARGET_RE regex should compile")
});

static REASON_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^reason\s*:\s*(.*)$").expect("REASON_RE regex should compile")
});

static CONTEXT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^context\s*:\s*$").expect("CONTEXT_RE regex should compile"));

static CONTEXT_ITEM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[-*]\s+([A-Za-z0-9_\-\.]+)\s*:\s*(.*)$")
        .expect("CONTEXT_ITEM_RE regex should compile")
});

/// A parsed handoff request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandoffDeclaration {
    pub target_agent: String,
    pub reason: String,
    #[serde(default)]
    pub context_delta: ContextMap,
}

/// Outcome of scanning one response for a handoff.
#[derive(Debug, Clone, PartialEq)]
pub enum HandoffParse {
    /// No handoff present; the response is final.
    Absent,
    Declared(HandoffDeclaration),
    /// A handoff was started but required fields are missing.
    Malformed { reason: String },
}

/// A recorded handoff in a swarm chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandoffRecord {
    pub from_agent: String,
    pub to_agent: String,
    pub reason: String,
    pub context_delta: ContextMap,
    /// 0-based, always < max_handoffs.
    pub sequence_index: usize,
}

/// Finds handoff declarations in agent output.
pub trait HandoffParser: Send + Sync {
    fn parse(&self, response: &str) -> HandoffParse;
}

/// Line-pattern handoff parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternHandoffParser;

impl PatternHandoffParser {
    pub fn new() -> Self {
        Self
    }
}

/// Strip markdown decoration from a line: bold/italic markers, headings,
/// blockquotes.
fn clean_line(line: &str) -> String {
    let stripped = line.replace("**", "").replace("__", "");
    stripped
        .trim()
        .trim_start_matches(['#', '>'])
        .trim()
        .to_string()
}

/// Context values become JSON scalars when they parse as one, strings otherwise.
fn context_value(raw: &str) -> Value {
    let raw = raw.trim();
    match serde_json::from_str::<Value>(raw) {
        Ok(v @ (Value::Bool(_) | Value::Number(_))) => v,
        _ => Value::String(raw.trim_matches('"').to_string()),
    }
}

impl HandoffParser for PatternHandoffParser {
    fn parse(&self, response: &str) -> HandoffParse {
        let mut marker = false;
        let mut target: Option<String> = None;
        let mut reason: Option<String> = None;
        let mut delta = ContextMap::new();
        let mut in_context = false;

        for raw in response.lines() {
            let line = clean_line(raw);

            if in_context {
                if let Some(caps) = CONTEXT_ITEM_RE.captures(&line) {
                    delta.insert(caps[1].to_string(), context_value(&caps[2]));
                    continue;
                }
                in_context = false;
            }

            if line.is_empty() {
                continue;
            }
            if MARKER_RE.is_match(&line) {
                marker = true;
            } else if let Some(caps) = TARGET_RE.captures(&line) {
                target.get_or_insert_with(|| caps[1].to_string());
            } else if let Some(caps) = REASON_RE.captures(&line) {
                let text = caps[1].trim();
                if reason.is_none() && !text.is_empty() {
                    reason = Some(text.to_string());
                }
            } else if (marker || target.is_some()) && CONTEXT_RE.is_match(&line) {
                in_context = true;
            }
        }

        match (marker, target, reason) {
            (false, None, _) => HandoffParse::Absent,
            (true, None, _) => HandoffParse::Malformed {
                reason: "handoff marker without a To: target".to_string(),
            },
            // A bare `To:` line without a marker or reason is ordinary prose.
            (false, Some(_), None) => HandoffParse::Absent,
            (true, Some(target), None) => HandoffParse::Malformed {
                reason: format!("handoff to '{target}' has no Reason"),
            },
            (_, Some(target_agent), Some(reason)) => HandoffParse::Declared(HandoffDeclaration {
                target_agent,
                reason,
                context_delta: delta,
            }),
        }
    }
}
