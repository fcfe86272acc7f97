//! Prompt construction for the chat and image adapters.
//!
//! Prompts live here rather than inline in the adapters so wording changes
//! never touch request plumbing.

use crate::lab::{Additive, GenerationInput, StepPlan, NO_ANALYSIS};

/// Instruction sent with a source image to the vision model.
pub const VISION_DESCRIBE: &str = "Describe this product image in 2-3 sentences. \
Focus on what the product is, its form factor, materials, and any distinctive \
visual features. Reply with plain text only.";

/// System prompt for the four-step generation call.
///
/// Step 3's shape depends on the additive: creativity and aesthetics expand
/// into three `subSteps`, usability into five `descriptions`.
pub fn steps_system_prompt(additive: Additive) -> String {
    let step3_schema = match additive {
        Additive::Creativity | Additive::Aesthetics => {
            "\"subSteps\": [{\"title\": \"...\", \"description\": \"...\"}] (exactly 3 entries)"
        }
        Additive::Usability => "\"descriptions\": [\"...\"] (exactly 5 entries)",
    };

    let focus = match additive {
        Additive::Creativity => {
            "You amplify the creativity of product ideas: surprising combinations, \
             unconventional uses, novel mechanisms."
        }
        Additive::Aesthetics => {
            "You refine the aesthetics of product ideas: form language, materials, \
             color, proportion, visual identity."
        }
        Additive::Usability => {
            "You improve the usability of product ideas: fewer steps, clearer \
             affordances, less friction for the user."
        }
    };

    format!(
        "{focus}\n\n\
         Given a product idea, produce a four-step improvement plan. \
         Respond with a JSON object only, no prose, no code fences, matching:\n\
         {{\"steps\": [\n\
           {{\"stepNumber\": 1, \"title\": \"...\", \"description\": \"...\"}},\n\
           {{\"stepNumber\": 2, \"title\": \"...\", \"description\": \"...\"}},\n\
           {{\"stepNumber\": 3, \"title\": \"...\", {step3_schema}}},\n\
           {{\"stepNumber\": 4, \"title\": \"...\", \"description\": \"...\"}}\n\
         ]}}\n\
         Write all titles and descriptions in Korean."
    )
}

/// User prompt for the four-step generation call.
pub fn steps_user_prompt(input: &GenerationInput) -> String {
    let mut prompt = format!(
        "Product idea: {}\nDetails: {}\nTransformation intensity: {} out of 100 \
         (higher means a bolder departure from the original).",
        input.title, input.description, input.intensity
    );

    if input.vision_text != NO_ANALYSIS {
        prompt.push_str(&format!(
            "\nCurrent product image analysis: {}",
            input.vision_text
        ));
    }

    if let Some(reference) = &input.reference_text {
        prompt.push_str(&format!(
            "\nReference image the user wants to steer toward: {}",
            reference
        ));
    }

    prompt
}

/// System prompt for condensing a step plan into a refined concept.
pub const REFINE_SYSTEM: &str = "You turn an improvement plan into a single \
refined product concept. Respond with a JSON object only, no prose, no code \
fences: {\"title\": \"...\", \"description\": \"...\"}. The title should be a \
short Korean product name; the description 2-4 Korean sentences.";

/// User prompt for the refine call.
pub fn refine_user_prompt(input: &GenerationInput, plan: &StepPlan) -> String {
    let plan_json = serde_json::to_string(plan).unwrap_or_default();
    format!(
        "Original idea: {} - {}\nImprovement focus: {}\nImprovement plan: {}",
        input.title,
        input.description,
        input.additive.as_str(),
        plan_json
    )
}

/// Prompt handed to the image-synthesis adapter.
pub fn image_prompt(title: &str, description: &str, vision_text: &str) -> String {
    let mut prompt = format!(
        "Product concept rendering: {}. {}. Clean studio background, \
         photorealistic product shot.",
        title, description
    );

    if vision_text != NO_ANALYSIS {
        prompt.push_str(&format!(" Based on the original product: {}", vision_text));
    }

    prompt
}
