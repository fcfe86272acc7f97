//! Integration tests for the experiment orchestrator
//!
//! Runs the full pipeline against stub adapters and an in-memory database,
//! checking lineage metadata, fallback behavior, and failure handling.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use idealab::lab::{
    fallback_plan, Additive, AdditiveConfig, Concept, ExperimentOrchestrator, GenerationInput,
    IdeaGeneration, ImageOutcome, ImageSynthesis, StepPlan, VisionAnalysis, NO_ANALYSIS,
};
use idealab::storage::{
    BlobStore, ExperimentStatus, FsBlobStore, Gateway, Idea, IdeaKind, Project, SqliteGateway,
};

// Stub adapters

struct StubVision;

#[async_trait]
impl VisionAnalysis for StubVision {
    async fn describe_image(&self, _image_ref: &str) -> String {
        "A stainless steel tumbler with a handle.".to_string()
    }
}

struct FailingVision;

#[async_trait]
impl VisionAnalysis for FailingVision {
    async fn describe_image(&self, _image_ref: &str) -> String {
        NO_ANALYSIS.to_string()
    }
}

/// Generation stub returning the deterministic fallback plan, which is
/// what the real adapter hands back for unparseable model output.
struct StubGeneration;

#[async_trait]
impl IdeaGeneration for StubGeneration {
    async fn generate_steps(&self, input: &GenerationInput) -> StepPlan {
        fallback_plan(input.additive)
    }

    async fn refine_concept(&self, input: &GenerationInput, _plan: &StepPlan) -> Concept {
        Concept {
            title: format!("{} 개선된 {}", input.additive.label(), input.title),
            description: format!("intensity {}", input.intensity),
        }
    }
}

struct StubSynthesis;

#[async_trait]
impl ImageSynthesis for StubSynthesis {
    async fn synthesize(&self, _prompt: &str, _reference_png: Option<Vec<u8>>) -> ImageOutcome {
        ImageOutcome::Generated {
            data_url: format!("data:image/png;base64,{}", STANDARD.encode(b"fake-png")),
        }
    }
}

struct FailingSynthesis;

#[async_trait]
impl ImageSynthesis for FailingSynthesis {
    async fn synthesize(&self, _prompt: &str, _reference_png: Option<Vec<u8>>) -> ImageOutcome {
        ImageOutcome::Failed {
            reason: "upstream timeout".to_string(),
        }
    }
}

/// Synthesis stub that asserts a processing record exists before the
/// adapters run.
struct RecordCheckingSynthesis {
    gateway: Arc<SqliteGateway>,
    saw_processing: Arc<AtomicBool>,
}

#[async_trait]
impl ImageSynthesis for RecordCheckingSynthesis {
    async fn synthesize(&self, _prompt: &str, _reference_png: Option<Vec<u8>>) -> ImageOutcome {
        let experiments = self.gateway.list_idea_experiments("idea_1").await.unwrap();
        if experiments
            .iter()
            .any(|e| e.status == ExperimentStatus::Processing)
        {
            self.saw_processing.store(true, Ordering::SeqCst);
        }
        ImageOutcome::Failed {
            reason: "stub".to_string(),
        }
    }
}

// Harness

struct Harness {
    gateway: Arc<SqliteGateway>,
    _blob_dir: tempfile::TempDir,
    blobs: Arc<dyn BlobStore>,
}

impl Harness {
    async fn new() -> Self {
        let gateway = Arc::new(SqliteGateway::new_in_memory().await.unwrap());
        let blob_dir = tempfile::TempDir::new().unwrap();
        let blobs: Arc<dyn BlobStore> = Arc::new(FsBlobStore::with_root(blob_dir.path()));

        gateway
            .create_project(&Project::new("project_1", "p"))
            .await
            .unwrap();
        gateway
            .create_idea(&Idea::original("idea_1", "project_1", "텀블러", "보온 텀블러"))
            .await
            .unwrap();

        Self {
            gateway,
            _blob_dir: blob_dir,
            blobs,
        }
    }

    fn orchestrator(
        &self,
        vision: Arc<dyn VisionAnalysis>,
        synthesizer: Arc<dyn ImageSynthesis>,
    ) -> ExperimentOrchestrator {
        ExperimentOrchestrator::new(
            self.gateway.clone(),
            self.blobs.clone(),
            vision,
            Arc::new(StubGeneration),
            synthesizer,
        )
    }
}

#[tokio::test]
async fn test_experiment_on_original_idea_yields_first_generation() {
    let harness = Harness::new().await;
    let orchestrator = harness.orchestrator(Arc::new(StubVision), Arc::new(StubSynthesis));

    let source = harness.gateway.get_idea("idea_1").await.unwrap().unwrap();
    let config = AdditiveConfig::new(Additive::Creativity, 50);

    let derived = orchestrator.run_experiment(&source, &config).await.unwrap();

    assert_eq!(derived.kind, IdeaKind::Generated);
    assert_eq!(derived.generation, 1);
    assert_eq!(derived.source_idea_id.as_deref(), Some("idea_1"));
    assert_eq!(derived.additive, Some(Additive::Creativity));
    assert_eq!(derived.title, "창의성 개선된 텀블러");
    assert!(derived.image_generated);
    assert!(derived.image_url.as_deref().unwrap().starts_with("file://"));

    // Experiment record mirrors the derived idea.
    let experiment_id = derived.source_experiment_id.unwrap();
    let experiment = harness
        .gateway
        .get_experiment(&experiment_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(experiment.status, ExperimentStatus::Completed);
    assert_eq!(experiment.generation, 1);
    assert_eq!(experiment.result_idea_id.as_deref(), Some(derived.id.as_str()));
    assert_eq!(experiment.root_idea_id, "idea_1");
    let result = experiment.result.unwrap();
    assert_eq!(result.steps.steps.len(), 4);
    assert_eq!(result.image_url, derived.image_url);
}

#[tokio::test]
async fn test_experiment_on_generated_idea_increments_generation() {
    let harness = Harness::new().await;
    let orchestrator = harness.orchestrator(Arc::new(StubVision), Arc::new(StubSynthesis));

    let source = harness.gateway.get_idea("idea_1").await.unwrap().unwrap();
    let first = orchestrator
        .run_experiment(&source, &AdditiveConfig::new(Additive::Creativity, 50))
        .await
        .unwrap();
    let second = orchestrator
        .run_experiment(&first, &AdditiveConfig::new(Additive::Usability, 70))
        .await
        .unwrap();

    assert_eq!(second.generation, 2);
    assert_eq!(second.source_idea_id.as_deref(), Some(first.id.as_str()));
    assert_eq!(second.additive, Some(Additive::Usability));

    // Both experiments share the same lineage root.
    let experiment_id = second.source_experiment_id.unwrap();
    let experiment = harness
        .gateway
        .get_experiment(&experiment_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(experiment.root_idea_id, "idea_1");
    assert_eq!(experiment.generation, 2);
}

#[tokio::test]
async fn test_image_failure_completes_without_image() {
    let harness = Harness::new().await;
    let orchestrator = harness.orchestrator(Arc::new(StubVision), Arc::new(FailingSynthesis));

    let source = harness.gateway.get_idea("idea_1").await.unwrap().unwrap();
    let derived = orchestrator
        .run_experiment(&source, &AdditiveConfig::new(Additive::Aesthetics, 60))
        .await
        .unwrap();

    assert!(derived.image_url.is_none(), "Source image must not be reused");
    assert!(!derived.image_generated);
    assert_eq!(derived.image_error.as_deref(), Some("upstream timeout"));

    // The experiment still completes.
    let experiment = harness
        .gateway
        .get_experiment(&derived.source_experiment_id.unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(experiment.status, ExperimentStatus::Completed);
    assert!(experiment.result.unwrap().image_url.is_none());
}

#[tokio::test]
async fn test_fallback_plan_shape_matches_additive() {
    let harness = Harness::new().await;
    let orchestrator = harness.orchestrator(Arc::new(FailingVision), Arc::new(StubSynthesis));

    let source = harness.gateway.get_idea("idea_1").await.unwrap().unwrap();
    let derived = orchestrator
        .run_experiment(&source, &AdditiveConfig::new(Additive::Aesthetics, 50))
        .await
        .unwrap();

    let experiment = harness
        .gateway
        .get_experiment(&derived.source_experiment_id.unwrap())
        .await
        .unwrap()
        .unwrap();
    let steps = experiment.result.unwrap().steps;

    assert_eq!(steps, fallback_plan(Additive::Aesthetics));
}

#[tokio::test]
async fn test_processing_record_persisted_before_adapters_run() {
    let harness = Harness::new().await;
    let saw_processing = Arc::new(AtomicBool::new(false));
    let orchestrator = harness.orchestrator(
        Arc::new(StubVision),
        Arc::new(RecordCheckingSynthesis {
            gateway: harness.gateway.clone(),
            saw_processing: saw_processing.clone(),
        }),
    );

    let source = harness.gateway.get_idea("idea_1").await.unwrap().unwrap();
    orchestrator
        .run_experiment(&source, &AdditiveConfig::new(Additive::Creativity, 50))
        .await
        .unwrap();

    assert!(
        saw_processing.load(Ordering::SeqCst),
        "A processing record must exist while adapters run"
    );
}

#[tokio::test]
async fn test_reference_image_rejected_outside_aesthetics() {
    let harness = Harness::new().await;
    let orchestrator = harness.orchestrator(Arc::new(StubVision), Arc::new(StubSynthesis));

    let source = harness.gateway.get_idea("idea_1").await.unwrap().unwrap();
    let config = AdditiveConfig::new(Additive::Creativity, 50)
        .with_reference_image("data:image/png;base64,AAAA");

    let result = orchestrator.run_experiment(&source, &config).await;
    assert!(result.is_err());

    // Validation happens before any record is written.
    let experiments = harness.gateway.list_idea_experiments("idea_1").await.unwrap();
    assert!(experiments.is_empty());
}

#[tokio::test]
async fn test_out_of_range_intensity_rejected() {
    let harness = Harness::new().await;
    let orchestrator = harness.orchestrator(Arc::new(StubVision), Arc::new(StubSynthesis));

    let source = harness.gateway.get_idea("idea_1").await.unwrap().unwrap();
    let result = orchestrator
        .run_experiment(&source, &AdditiveConfig::new(Additive::Creativity, 101))
        .await;

    assert!(result.is_err());
}

#[tokio::test]
async fn test_aesthetics_reference_flows_to_generation_input() {
    let harness = Harness::new().await;
    let orchestrator = harness.orchestrator(Arc::new(StubVision), Arc::new(StubSynthesis));

    let source = harness.gateway.get_idea("idea_1").await.unwrap().unwrap();
    let reference = format!("data:image/png;base64,{}", STANDARD.encode(b"ref-png"));
    let config =
        AdditiveConfig::new(Additive::Aesthetics, 80).with_reference_image(reference);

    let derived = orchestrator.run_experiment(&source, &config).await.unwrap();
    assert_eq!(derived.generation, 1);
    assert_eq!(derived.additive, Some(Additive::Aesthetics));
}

#[tokio::test]
async fn test_sequential_experiments_get_distinct_ids() {
    let harness = Harness::new().await;
    let orchestrator = harness.orchestrator(Arc::new(StubVision), Arc::new(StubSynthesis));

    let source = harness.gateway.get_idea("idea_1").await.unwrap().unwrap();
    let config = AdditiveConfig::new(Additive::Creativity, 50);

    let first = orchestrator.run_experiment(&source, &config).await.unwrap();
    let second = orchestrator.run_experiment(&source, &config).await.unwrap();

    assert_ne!(first.id, second.id);
    assert_ne!(first.source_experiment_id, second.source_experiment_id);
    // Both derive from the same source, so both are generation 1 siblings.
    assert_eq!(second.generation, 1);
}
