use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::steps::{fallback_plan, parse_step_plan, StepPlan};
use super::Additive;
use crate::ai::{ChatClient, ChatRequest, Message};
use crate::prompts;

/// Everything the generation adapter needs to build its prompts.
#[derive(Debug, Clone)]
pub struct GenerationInput {
    pub additive: Additive,
    pub title: String,
    pub description: String,
    /// Vision analysis of the source idea's image, or the no-analysis sentinel.
    pub vision_text: String,
    /// Vision analysis of an aesthetics reference image, when one was supplied.
    pub reference_text: Option<String>,
    pub intensity: u8,
}

/// A refined product concept condensed from a step plan.
#[derive(Debug, Clone, Deserialize)]
pub struct Concept {
    pub title: String,
    pub description: String,
}

/// Adapter that produces the four-step plan and the refined concept.
///
/// Both operations are total: malformed model output is repaired where
/// possible and replaced with deterministic fallbacks where not, so the
/// orchestrator always receives schema-valid results.
#[async_trait]
pub trait IdeaGeneration: Send + Sync {
    /// Produce a four-step improvement plan for the input
    async fn generate_steps(&self, input: &GenerationInput) -> StepPlan;

    /// Condense a step plan into a refined title and description
    async fn refine_concept(&self, input: &GenerationInput, plan: &StepPlan) -> Concept;
}

/// Idea generation backed by an OpenAI-compatible text model
pub struct OpenAiIdeaGeneration {
    chat: ChatClient,
    model: String,
}

impl OpenAiIdeaGeneration {
    /// Create a generation adapter using the given chat client and model
    pub fn new(chat: ChatClient, model: impl Into<String>) -> Self {
        Self {
            chat,
            model: model.into(),
        }
    }
}

#[async_trait]
impl IdeaGeneration for OpenAiIdeaGeneration {
    async fn generate_steps(&self, input: &GenerationInput) -> StepPlan {
        let request = ChatRequest::new(
            self.model.clone(),
            vec![
                Message::system(prompts::steps_system_prompt(input.additive)),
                Message::user(prompts::steps_user_prompt(input)),
            ],
        )
        .with_temperature(0.8)
        .with_json_output();

        let completion = match self.chat.complete(request).await {
            Ok(response) => response.completion_text().map(|t| t.to_string()),
            Err(e) => {
                warn!(error = %e, additive = %input.additive, "Step generation call failed");
                None
            }
        };

        match completion {
            Some(text) => match parse_step_plan(&text, input.additive) {
                Ok(plan) => {
                    debug!(additive = %input.additive, "Parsed step plan from completion");
                    plan
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        additive = %input.additive,
                        "Step plan unparseable after repair, using fallback"
                    );
                    fallback_plan(input.additive)
                }
            },
            None => fallback_plan(input.additive),
        }
    }

    async fn refine_concept(&self, input: &GenerationInput, plan: &StepPlan) -> Concept {
        let request = ChatRequest::new(
            self.model.clone(),
            vec![
                Message::system(prompts::REFINE_SYSTEM),
                Message::user(prompts::refine_user_prompt(input, plan)),
            ],
        )
        .with_temperature(0.7)
        .with_json_output();

        let parsed = match self.chat.complete(request).await {
            Ok(response) => response
                .completion_text()
                .and_then(|text| parse_concept(text)),
            Err(e) => {
                warn!(error = %e, "Concept refinement call failed");
                None
            }
        };

        match parsed {
            Some(concept) => {
                info!(title = %concept.title, "Refined concept");
                concept
            }
            None => {
                warn!("Concept refinement unparseable, using fallback title");
                fallback_concept(input)
            }
        }
    }
}

/// Parse a `{"title", "description"}` object out of a completion,
/// tolerating code fences and surrounding prose.
fn parse_concept(completion: &str) -> Option<Concept> {
    let start = completion.find('{')?;
    let end = completion.rfind('}')?;
    if end < start {
        return None;
    }

    let concept: Concept = serde_json::from_str(&completion[start..=end]).ok()?;
    if concept.title.trim().is_empty() {
        return None;
    }

    Some(concept)
}

/// Deterministic concept used when refinement fails outright.
pub fn fallback_concept(input: &GenerationInput) -> Concept {
    Concept {
        title: format!("{} 개선된 {}", input.additive.label(), input.title),
        description: input.description.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(additive: Additive) -> GenerationInput {
        GenerationInput {
            additive,
            title: "텀블러".to_string(),
            description: "보온 텀블러".to_string(),
            vision_text: "A tumbler.".to_string(),
            reference_text: None,
            intensity: 50,
        }
    }

    #[test]
    fn test_parse_concept_plain_json() {
        let concept =
            parse_concept(r#"{"title": "스마트 텀블러", "description": "온도를 보여주는 텀블러"}"#)
                .unwrap();
        assert_eq!(concept.title, "스마트 텀블러");
    }

    #[test]
    fn test_parse_concept_code_fenced() {
        let completion = "```json\n{\"title\": \"t\", \"description\": \"d\"}\n```";
        assert!(parse_concept(completion).is_some());
    }

    #[test]
    fn test_parse_concept_rejects_empty_title() {
        assert!(parse_concept(r#"{"title": "  ", "description": "d"}"#).is_none());
        assert!(parse_concept("no json here").is_none());
    }

    #[test]
    fn test_fallback_concept_title_format() {
        let concept = fallback_concept(&input(Additive::Creativity));
        assert_eq!(concept.title, "창의성 개선된 텀블러");

        let concept = fallback_concept(&input(Additive::Usability));
        assert_eq!(concept.title, "사용성 개선된 텀블러");
    }
}
