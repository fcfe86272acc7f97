//! Persistence layer for projects, ideas and experiments.
//!
//! The [`Gateway`] trait is a thin façade over the document layout of the
//! original store (`projects/{p}`, `projects/{p}/ideas/{i}`,
//! `projects/{p}/ideas/{i}/experiments/{e}`, plus counter documents),
//! mapped onto SQLite tables. Generated images live in a [`BlobStore`].

mod blobs;
mod sqlite;


pub use blobs::{BlobStore, FsBlobStore};
pub use sqlite::SqliteGateway;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageResult;
use crate::lab::{Additive, StepPlan};

/// Root container for ideas.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    /// Unique project identifier.
    pub id: String,
    /// User-chosen title.
    pub title: String,
    /// When the project was created.
    pub created_at: DateTime<Utc>,
}

/// Whether an idea was authored by the user or produced by an experiment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdeaKind {
    /// Created by the user.
    #[default]
    Original,
    /// Produced by a completed experiment; immutable except for deletion.
    Generated,
}

impl std::fmt::Display for IdeaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdeaKind::Original => write!(f, "original"),
            IdeaKind::Generated => write!(f, "generated"),
        }
    }
}

impl std::str::FromStr for IdeaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "original" => Ok(IdeaKind::Original),
            "generated" => Ok(IdeaKind::Generated),
            _ => Err(format!("Unknown idea kind: {}", s)),
        }
    }
}

/// A product idea, original or derived.
///
/// Invariants: original ideas have `generation == 0` and no source
/// references; generated ideas have `generation >= 1` and a non-null
/// `source_idea_id`. The source references are non-owning back-references
/// used only for lineage traversal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Idea {
    /// Unique idea identifier.
    pub id: String,
    /// Owning project.
    pub project_id: String,
    /// Idea title.
    pub title: String,
    /// Idea description.
    pub description: String,
    /// Image URL, if the idea has one. For generated ideas this stays
    /// `None` when synthesis failed; the source image is never reused.
    pub image_url: Option<String>,
    /// Original or generated.
    pub kind: IdeaKind,
    /// Additive that produced this idea (generated ideas only).
    pub additive: Option<Additive>,
    /// Lineage depth: 0 for originals, parent + 1 for generated ideas.
    pub generation: i64,
    /// Idea this one was derived from (generated ideas only).
    pub source_idea_id: Option<String>,
    /// Experiment that produced this idea (generated ideas only).
    pub source_experiment_id: Option<String>,
    /// Free-form tags.
    pub tags: Vec<String>,
    /// Whether image synthesis produced this idea's image.
    pub image_generated: bool,
    /// Why image synthesis failed, when it did.
    pub image_error: Option<String>,
    /// When the idea was created.
    pub created_at: DateTime<Utc>,
}

/// State of an experiment record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentStatus {
    /// Persisted before the AI calls begin; a crash mid-flight leaves a
    /// recoverable record in this state.
    #[default]
    Processing,
    /// Finished with a result and a generated idea.
    Completed,
}

impl std::fmt::Display for ExperimentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExperimentStatus::Processing => write!(f, "processing"),
            ExperimentStatus::Completed => write!(f, "completed"),
        }
    }
}

impl std::str::FromStr for ExperimentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "processing" => Ok(ExperimentStatus::Processing),
            "completed" => Ok(ExperimentStatus::Completed),
            _ => Err(format!("Unknown experiment status: {}", s)),
        }
    }
}

/// One execution of the generation pipeline against a source idea.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experiment {
    /// Unique experiment identifier.
    pub id: String,
    /// Source idea the experiment ran against.
    pub idea_id: String,
    /// Root of the source idea's lineage; experiments are enumerated per
    /// root when reconstructing history.
    pub root_idea_id: String,
    /// Owning project.
    pub project_id: String,
    /// Transformation applied.
    pub additive: Additive,
    /// User-chosen intensity (0-100).
    pub intensity: u8,
    /// Current state.
    pub status: ExperimentStatus,
    /// Final result, set on completion.
    pub result: Option<ExperimentResult>,
    /// Id of the generated idea, set on completion.
    pub result_idea_id: Option<String>,
    /// Generation number of the resulting idea. Computed once by the
    /// orchestrator and written identically here and on the idea.
    pub generation: i64,
    /// When the experiment started.
    pub created_at: DateTime<Utc>,
    /// When the experiment completed.
    pub completed_at: Option<DateTime<Utc>>,
}

/// The output of a completed experiment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentResult {
    /// Improved concept title.
    pub title: String,
    /// Improved concept description.
    pub description: String,
    /// URL of the synthesized image, if one was produced.
    pub image_url: Option<String>,
    /// The 4-step rationale report.
    pub steps: StepPlan,
}

/// An identifier allocated from a persistent counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocatedId {
    /// Formatted identifier, `{prefix}_{count}`.
    pub id: String,
    /// The counter value backing it.
    pub count: i64,
}

impl Project {
    /// Create a new project
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            created_at: Utc::now(),
        }
    }
}

impl Idea {
    /// Create a new original idea
    pub fn original(
        id: impl Into<String>,
        project_id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            project_id: project_id.into(),
            title: title.into(),
            description: description.into(),
            image_url: None,
            kind: IdeaKind::Original,
            additive: None,
            generation: 0,
            source_idea_id: None,
            source_experiment_id: None,
            tags: Vec::new(),
            image_generated: false,
            image_error: None,
            created_at: Utc::now(),
        }
    }

    /// Create a new generated idea derived from a source
    #[allow(clippy::too_many_arguments)]
    pub fn generated(
        id: impl Into<String>,
        project_id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        additive: Additive,
        generation: i64,
        source_idea_id: impl Into<String>,
        source_experiment_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            project_id: project_id.into(),
            title: title.into(),
            description: description.into(),
            image_url: None,
            kind: IdeaKind::Generated,
            additive: Some(additive),
            generation,
            source_idea_id: Some(source_idea_id.into()),
            source_experiment_id: Some(source_experiment_id.into()),
            tags: vec![additive.as_str().to_string()],
            image_generated: false,
            image_error: None,
            created_at: Utc::now(),
        }
    }

    /// Set the image URL
    pub fn with_image_url(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self.image_generated = true;
        self
    }

    /// Record an image synthesis failure
    pub fn with_image_failure(mut self, reason: impl Into<String>) -> Self {
        self.image_url = None;
        self.image_generated = false;
        self.image_error = Some(reason.into());
        self
    }
}

impl Experiment {
    /// Create a new experiment in the processing state
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: impl Into<String>,
        project_id: impl Into<String>,
        idea_id: impl Into<String>,
        root_idea_id: impl Into<String>,
        additive: Additive,
        intensity: u8,
        generation: i64,
    ) -> Self {
        Self {
            id: id.into(),
            idea_id: idea_id.into(),
            root_idea_id: root_idea_id.into(),
            project_id: project_id.into(),
            additive,
            intensity,
            status: ExperimentStatus::Processing,
            result: None,
            result_idea_id: None,
            generation,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Mark the experiment completed with its result and generated idea
    pub fn complete(&mut self, result: ExperimentResult, result_idea_id: impl Into<String>) {
        self.status = ExperimentStatus::Completed;
        self.result = Some(result);
        self.result_idea_id = Some(result_idea_id.into());
        self.completed_at = Some(Utc::now());
    }
}

/// Allocate an id from a counter scope, falling back to a timestamp-derived
/// id when the counter is unavailable. Availability over monotonicity.
pub async fn allocate_id_or_timestamp(gateway: &dyn Gateway, scope: &str, prefix: &str) -> String {
    match gateway.next_id(scope, prefix).await {
        Ok(allocated) => allocated.id,
        Err(e) => {
            let fallback = format!("{}_{}", prefix, Utc::now().timestamp_millis());
            tracing::warn!(
                error = %e,
                scope = %scope,
                fallback = %fallback,
                "Counter allocation failed, using timestamp id"
            );
            fallback
        }
    }
}

/// Counter scope for project identifiers.
pub fn project_counter_scope() -> String {
    "counters/projects".to_string()
}

/// Counter scope for experiment identifiers under a source idea.
pub fn experiment_counter_scope(project_id: &str, idea_id: &str) -> String {
    format!(
        "counters/projects/{}/ideas/{}/experiments",
        project_id, idea_id
    )
}

/// Counter scope for generated-idea identifiers within a project.
pub fn result_idea_counter_scope(project_id: &str) -> String {
    format!("counters/projects/{}/result_ideas", project_id)
}

/// Gateway trait for database operations.
///
/// Covers project/idea/experiment persistence and atomic identifier
/// allocation. All deletes cascade through ownership edges only:
/// a project takes its ideas with it, an idea takes its experiments;
/// generated descendants referencing a deleted idea are left in place.
#[async_trait]
pub trait Gateway: Send + Sync {
    // Project operations

    /// Create a new project.
    async fn create_project(&self, project: &Project) -> StorageResult<()>;
    /// Get a project by ID.
    async fn get_project(&self, id: &str) -> StorageResult<Option<Project>>;
    /// List all projects, newest first.
    async fn list_projects(&self) -> StorageResult<Vec<Project>>;
    /// Delete a project and everything it owns.
    async fn delete_project(&self, id: &str) -> StorageResult<()>;

    // Idea operations

    /// Create a new idea.
    async fn create_idea(&self, idea: &Idea) -> StorageResult<()>;
    /// Get an idea by ID.
    async fn get_idea(&self, id: &str) -> StorageResult<Option<Idea>>;
    /// List all ideas in a project, oldest first.
    async fn list_project_ideas(&self, project_id: &str) -> StorageResult<Vec<Idea>>;
    /// Count generated ideas in a project.
    async fn count_generated_ideas(&self, project_id: &str) -> StorageResult<i64>;
    /// Delete an idea and its experiments.
    async fn delete_idea(&self, id: &str) -> StorageResult<()>;

    // Experiment operations

    /// Create a new experiment record.
    async fn create_experiment(&self, experiment: &Experiment) -> StorageResult<()>;
    /// Get an experiment by ID.
    async fn get_experiment(&self, id: &str) -> StorageResult<Option<Experiment>>;
    /// Update an existing experiment record.
    async fn update_experiment(&self, experiment: &Experiment) -> StorageResult<()>;
    /// List all experiments belonging to a lineage root, oldest first.
    async fn list_root_experiments(&self, root_idea_id: &str) -> StorageResult<Vec<Experiment>>;
    /// List all experiments whose source is the given idea, oldest first.
    async fn list_idea_experiments(&self, idea_id: &str) -> StorageResult<Vec<Experiment>>;

    // Identifier allocation

    /// Allocate the next identifier in a counter scope.
    ///
    /// The increment is a single atomic statement: N concurrent callers on
    /// one scope receive N distinct, contiguous counts.
    async fn next_id(&self, scope: &str, prefix: &str) -> StorageResult<AllocatedId>;
}
