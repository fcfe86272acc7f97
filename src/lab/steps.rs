//! The 4-step rationale report schema.
//!
//! Idea generation must return exactly four steps. Steps 1, 2 and 4 carry a
//! single description; step 3's shape depends on the additive: usability
//! uses a 5-entry description list, creativity and aesthetics a 3-entry
//! sub-step list. This module owns the wire schema, a repair pass for the
//! ways models mangle JSON, total validation, and the fixed fallback plans
//! used when repair fails.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Additive;

/// Number of steps in every plan.
pub const STEP_COUNT: usize = 4;
/// Exact sub-step count for creativity/aesthetics step 3.
pub const SUB_STEP_COUNT: usize = 3;
/// Exact description count for usability step 3.
pub const DESCRIPTION_COUNT: usize = 5;

/// A validated 4-step plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepPlan {
    pub steps: Vec<Step>,
}

/// One step of the plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub step_number: u8,
    pub title: String,
    #[serde(flatten)]
    pub body: StepBody,
}

/// Step body, shape-tagged by which key the step carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StepBody {
    SubSteps {
        #[serde(rename = "subSteps")]
        sub_steps: Vec<SubStep>,
    },
    Descriptions {
        descriptions: Vec<String>,
    },
    Description {
        description: String,
    },
}

/// A titled sub-step within step 3.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubStep {
    pub title: String,
    pub description: String,
}

impl StepBody {
    fn kind(&self) -> &'static str {
        match self {
            StepBody::SubSteps { .. } => "subSteps",
            StepBody::Descriptions { .. } => "descriptions",
            StepBody::Description { .. } => "description",
        }
    }
}

/// Why a raw completion could not become a valid plan.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("No JSON found in completion: {0}")]
    Extract(String),

    #[error("JSON parse failed: {0}")]
    Json(String),

    #[error("Expected {STEP_COUNT} steps, found {found}")]
    WrongStepCount { found: usize },

    #[error("Step at position {position} has stepNumber {found}")]
    BadStepNumber { position: usize, found: u8 },

    #[error("Step 3 shape mismatch: expected {expected}, found {found}")]
    Step3Shape {
        expected: &'static str,
        found: &'static str,
    },
}

/// Parse a raw model completion into a validated plan for the additive.
///
/// Pipeline: code-fence extraction, JSON repair, serde parse, shape
/// validation with arity normalization. Any failure is an error; the
/// caller decides whether to fall back.
pub fn parse_step_plan(completion: &str, additive: Additive) -> Result<StepPlan, PlanError> {
    let raw = extract_json(completion).map_err(PlanError::Extract)?;
    let repaired = repair_json(raw);
    let plan: StepPlan =
        serde_json::from_str(&repaired).map_err(|e| PlanError::Json(e.to_string()))?;
    validate_plan(plan, additive)
}

/// Validate step count, numbering and step-3 shape, normalizing step-3
/// arity to the exact required length.
pub fn validate_plan(mut plan: StepPlan, additive: Additive) -> Result<StepPlan, PlanError> {
    if plan.steps.len() != STEP_COUNT {
        return Err(PlanError::WrongStepCount {
            found: plan.steps.len(),
        });
    }

    for (position, step) in plan.steps.iter().enumerate() {
        let expected = (position + 1) as u8;
        if step.step_number != expected {
            return Err(PlanError::BadStepNumber {
                position,
                found: step.step_number,
            });
        }
    }

    let step3 = &mut plan.steps[2];
    match (additive, &mut step3.body) {
        (Additive::Usability, StepBody::Descriptions { descriptions }) => {
            normalize_descriptions(descriptions);
        }
        (Additive::Creativity | Additive::Aesthetics, StepBody::SubSteps { sub_steps }) => {
            normalize_sub_steps(sub_steps);
        }
        (Additive::Usability, body) => {
            return Err(PlanError::Step3Shape {
                expected: "descriptions",
                found: body.kind(),
            });
        }
        (_, body) => {
            return Err(PlanError::Step3Shape {
                expected: "subSteps",
                found: body.kind(),
            });
        }
    }

    Ok(plan)
}

fn normalize_descriptions(descriptions: &mut Vec<String>) {
    descriptions.truncate(DESCRIPTION_COUNT);
    while descriptions.len() < DESCRIPTION_COUNT {
        descriptions.push(format!("개선 포인트 {}", descriptions.len() + 1));
    }
}

fn normalize_sub_steps(sub_steps: &mut Vec<SubStep>) {
    sub_steps.truncate(SUB_STEP_COUNT);
    while sub_steps.len() < SUB_STEP_COUNT {
        let n = sub_steps.len() + 1;
        sub_steps.push(SubStep {
            title: format!("방향 {}", n),
            description: "세부 내용 보완 필요".to_string(),
        });
    }
}

/// Extract JSON from a completion string, handling markdown code blocks.
///
/// Attempts extraction in this order:
/// 1. Raw JSON (fast path)
/// 2. ```json ... ``` code blocks
/// 3. ``` ... ``` code blocks
fn extract_json(completion: &str) -> Result<&str, String> {
    let trimmed = completion.trim();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return Ok(trimmed);
    }

    if completion.contains("```json") {
        return completion
            .split("```json")
            .nth(1)
            .and_then(|s| s.split("```").next())
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| "Found ```json block but content was empty or malformed".to_string());
    }

    if completion.contains("```") {
        return completion
            .split("```")
            .nth(1)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| "Found ``` block but content was empty or malformed".to_string());
    }

    Err(format!(
        "First 100 chars: '{}'",
        completion.chars().take(100).collect::<String>()
    ))
}

/// Repair the JSON damage models commonly produce: trailing commas and
/// truncated output (unterminated strings, missing closing braces).
///
/// The input is scanned once tracking string state; a comma is dropped when
/// the next significant character closes a container, and any containers
/// still open at the end are closed in order.
pub fn repair_json(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 8);
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    // Comma plus following whitespace held back until we know what follows.
    let mut held: Option<String> = None;

    for c in input.chars() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        if let Some(buffer) = held.as_mut() {
            if c.is_whitespace() {
                buffer.push(c);
                continue;
            }
            if c == '}' || c == ']' {
                // Trailing comma: drop it, keep the whitespace.
                out.push_str(buffer.trim_start_matches(','));
            } else {
                out.push_str(buffer);
            }
            held = None;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '{' | '[' => {
                stack.push(c);
                out.push(c);
            }
            '}' => {
                if stack.last() == Some(&'{') {
                    stack.pop();
                }
                out.push(c);
            }
            ']' => {
                if stack.last() == Some(&'[') {
                    stack.pop();
                }
                out.push(c);
            }
            ',' => {
                held = Some(",".to_string());
            }
            _ => out.push(c),
        }
    }

    if let Some(buffer) = held {
        out.push_str(buffer.trim_start_matches(','));
    }
    if in_string {
        out.push('"');
    }
    while let Some(open) = stack.pop() {
        out.push(if open == '{' { '}' } else { ']' });
    }

    out
}

/// The fixed fallback plan used when generation output cannot be repaired.
pub fn fallback_plan(additive: Additive) -> StepPlan {
    let step2 = match additive {
        Additive::Creativity => Step {
            step_number: 2,
            title: "발상 전환 탐색".to_string(),
            body: StepBody::Description {
                description: "기존 아이디어의 전제를 뒤집어 새로운 방향을 탐색합니다."
                    .to_string(),
            },
        },
        Additive::Aesthetics => Step {
            step_number: 2,
            title: "조형 언어 분석".to_string(),
            body: StepBody::Description {
                description: "형태, 색상, 재질 관점에서 개선 여지를 분석합니다.".to_string(),
            },
        },
        Additive::Usability => Step {
            step_number: 2,
            title: "사용 흐름 분석".to_string(),
            body: StepBody::Description {
                description: "사용 과정에서 발생하는 불편 지점을 분석합니다.".to_string(),
            },
        },
    };

    let step3 = match additive {
        Additive::Usability => Step {
            step_number: 3,
            title: "개선 포인트 도출".to_string(),
            body: StepBody::Descriptions {
                descriptions: (1..=DESCRIPTION_COUNT)
                    .map(|n| format!("개선 포인트 {}", n))
                    .collect(),
            },
        },
        _ => Step {
            step_number: 3,
            title: "개선 방향 도출".to_string(),
            body: StepBody::SubSteps {
                sub_steps: (1..=SUB_STEP_COUNT)
                    .map(|n| SubStep {
                        title: format!("방향 {}", n),
                        description: "세부 내용 보완 필요".to_string(),
                    })
                    .collect(),
            },
        },
    };

    StepPlan {
        steps: vec![
            Step {
                step_number: 1,
                title: "현재 아이디어 이해".to_string(),
                body: StepBody::Description {
                    description: "원본 아이디어의 핵심 가치와 맥락을 정리합니다.".to_string(),
                },
            },
            step2,
            step3,
            Step {
                step_number: 4,
                title: "개선안 정리".to_string(),
                body: StepBody::Description {
                    description: "도출된 방향을 종합하여 개선된 컨셉을 제시합니다.".to_string(),
                },
            },
        ],
    }
}
