use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use super::generation::{GenerationInput, IdeaGeneration};
use super::lineage::LineageResolver;
use super::synthesis::{ImageOutcome, ImageSynthesis};
use super::vision::VisionAnalysis;
use super::{Additive, AdditiveConfig, NO_ANALYSIS};
use crate::error::{AppResult, LabError};
use crate::prompts;
use crate::storage::{
    allocate_id_or_timestamp, experiment_counter_scope, result_idea_counter_scope, BlobStore,
    Experiment, ExperimentResult, Gateway, Idea, IdeaKind,
};

/// Sequences one experiment: vision analysis, step generation, concept
/// refinement, image synthesis, and persistence of the derived idea.
///
/// The pipeline degrades rather than aborts: vision and generation failures
/// fall back to sentinels and deterministic plans, image failures are
/// recorded on the resulting idea. Only persistence failures on the
/// experiment and idea records themselves abort the run.
pub struct ExperimentOrchestrator {
    gateway: Arc<dyn Gateway>,
    blobs: Arc<dyn BlobStore>,
    vision: Arc<dyn VisionAnalysis>,
    generator: Arc<dyn IdeaGeneration>,
    synthesizer: Arc<dyn ImageSynthesis>,
    resolver: LineageResolver,
}

impl ExperimentOrchestrator {
    /// Create a new orchestrator wiring the adapters together
    pub fn new(
        gateway: Arc<dyn Gateway>,
        blobs: Arc<dyn BlobStore>,
        vision: Arc<dyn VisionAnalysis>,
        generator: Arc<dyn IdeaGeneration>,
        synthesizer: Arc<dyn ImageSynthesis>,
    ) -> Self {
        let resolver = LineageResolver::new(gateway.clone());
        Self {
            gateway,
            blobs,
            vision,
            generator,
            synthesizer,
            resolver,
        }
    }

    /// Run one experiment against a source idea and return the derived idea.
    pub async fn run_experiment(&self, source: &Idea, config: &AdditiveConfig) -> AppResult<Idea> {
        validate_config(config)?;

        // Generation and root are fixed up front; every later record gets
        // the same values.
        let generation = match source.kind {
            IdeaKind::Original => 1,
            IdeaKind::Generated => source.generation + 1,
        };
        let root_idea_id = match source.kind {
            IdeaKind::Original => source.id.clone(),
            IdeaKind::Generated => self.resolver.resolve_root(&source.id).await?.idea_id,
        };

        let experiment_id = self
            .allocate_id(
                &experiment_counter_scope(&source.project_id, &source.id),
                "exp",
            )
            .await;

        let mut experiment = Experiment::new(
            &experiment_id,
            &source.project_id,
            &source.id,
            &root_idea_id,
            config.additive,
            config.intensity,
            generation,
        );
        self.gateway.create_experiment(&experiment).await?;

        info!(
            experiment_id = %experiment_id,
            idea_id = %source.id,
            additive = %config.additive,
            intensity = config.intensity,
            generation,
            "Experiment started"
        );

        let vision_text = match &source.image_url {
            Some(url) => self.vision.describe_image(url).await,
            None => NO_ANALYSIS.to_string(),
        };

        let reference_text = match &config.reference_image {
            Some(data_url) => {
                self.store_reference_image(source, data_url).await;
                Some(self.vision.describe_image(data_url).await)
            }
            None => None,
        };

        let input = GenerationInput {
            additive: config.additive,
            title: source.title.clone(),
            description: source.description.clone(),
            vision_text: vision_text.clone(),
            reference_text,
            intensity: config.intensity,
        };

        let steps = self.generator.generate_steps(&input).await;
        let concept = self.generator.refine_concept(&input, &steps).await;

        let reference_png = config
            .reference_image
            .as_deref()
            .and_then(decode_data_url_bytes);

        let prompt = prompts::image_prompt(&concept.title, &concept.description, &vision_text);
        let outcome = self.synthesizer.synthesize(&prompt, reference_png).await;

        let image = match outcome {
            ImageOutcome::Generated { data_url } => {
                let path = format!(
                    "projects/{}/results/{}_result.png",
                    source.project_id, experiment_id
                );
                match self.blobs.put_data_url(&path, &data_url).await {
                    Ok(url) => ImageOutcome::Generated { data_url: url },
                    Err(e) => {
                        warn!(error = %e, path = %path, "Storing result image failed");
                        ImageOutcome::Failed {
                            reason: e.to_string(),
                        }
                    }
                }
            }
            failed => failed,
        };

        let idea_id = self
            .allocate_id(&result_idea_counter_scope(&source.project_id), "idea")
            .await;

        let mut idea = Idea::generated(
            &idea_id,
            &source.project_id,
            &concept.title,
            &concept.description,
            config.additive,
            generation,
            &source.id,
            &experiment_id,
        );
        idea = match &image {
            ImageOutcome::Generated { data_url } => idea.with_image_url(data_url),
            ImageOutcome::Failed { reason } => idea.with_image_failure(reason),
        };
        self.gateway.create_idea(&idea).await?;

        experiment.complete(
            ExperimentResult {
                title: concept.title,
                description: concept.description,
                image_url: idea.image_url.clone(),
                steps,
            },
            &idea_id,
        );
        self.gateway.update_experiment(&experiment).await?;

        info!(
            experiment_id = %experiment_id,
            result_idea_id = %idea_id,
            generation,
            image_generated = idea.image_generated,
            "Experiment completed"
        );

        Ok(idea)
    }

    async fn allocate_id(&self, scope: &str, prefix: &str) -> String {
        allocate_id_or_timestamp(self.gateway.as_ref(), scope, prefix).await
    }

    /// Keep a copy of the aesthetics reference image next to the source
    /// idea. Best-effort; the experiment continues without it on failure.
    async fn store_reference_image(&self, source: &Idea, data_url: &str) {
        let path = format!(
            "projects/{}/ideas/{}/ifl_{}.png",
            source.project_id,
            source.id,
            Utc::now().timestamp_millis()
        );
        if let Err(e) = self.blobs.put_data_url(&path, data_url).await {
            warn!(error = %e, path = %path, "Storing reference image failed");
        }
    }
}

fn validate_config(config: &AdditiveConfig) -> Result<(), LabError> {
    if config.intensity > 100 {
        return Err(LabError::Validation {
            field: "intensity".to_string(),
            reason: format!("must be 0-100, got {}", config.intensity),
        });
    }

    if config.reference_image.is_some() && config.additive != Additive::Aesthetics {
        return Err(LabError::Validation {
            field: "reference_image".to_string(),
            reason: format!(
                "only valid for the aesthetics additive, got {}",
                config.additive
            ),
        });
    }

    Ok(())
}

/// Decode the payload of a `data:image/...;base64,` URL into raw bytes.
fn decode_data_url_bytes(data_url: &str) -> Option<Vec<u8>> {
    let (meta, payload) = data_url.strip_prefix("data:")?.split_once(',')?;
    if !meta.ends_with(";base64") {
        return None;
    }
    STANDARD.decode(payload).ok()
}
