use std::path::PathBuf;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use idealab::ai::{ChatClient, ImageClient};
use idealab::config::Config;
use idealab::lab::{
    Additive, AdditiveConfig, ExperimentOrchestrator, LineageResolver, OpenAiIdeaGeneration,
    OpenAiVision, StabilityImageSynthesis,
};
use idealab::storage::{
    allocate_id_or_timestamp, project_counter_scope, BlobStore, FsBlobStore, Gateway, Idea,
    Project, SqliteGateway,
};

#[derive(Parser)]
#[command(name = "idealab", version, about = "Additive idea improvement lab")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new project
    CreateProject {
        /// Project title
        title: String,
    },
    /// List all projects
    ListProjects,
    /// Add an original idea to a project
    AddIdea {
        /// Project id
        project: String,
        /// Idea title
        title: String,
        /// Idea description
        description: String,
        /// Optional PNG sketch of the idea
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// List ideas in a project
    ListIdeas {
        /// Project id
        project: String,
    },
    /// Run an experiment against an idea
    Run {
        /// Source idea id
        idea: String,
        /// Additive to apply: creativity, aesthetics, or usability
        additive: Additive,
        /// Transformation intensity, 1-100
        #[arg(long)]
        intensity: u8,
        /// Reference PNG (aesthetics only)
        #[arg(long)]
        reference: Option<PathBuf>,
    },
    /// Show the lineage and experiment history of an idea
    History {
        /// Idea id
        idea: String,
    },
    /// Delete an idea and its experiments
    DeleteIdea {
        /// Idea id
        id: String,
    },
    /// Delete a project and everything it owns
    DeleteProject {
        /// Project id
        id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    init_logging(&config);

    // Initialize storage
    let gateway: Arc<dyn Gateway> = match SqliteGateway::new(&config.database).await {
        Ok(g) => {
            info!(path = %config.database.path.display(), "Database initialized");
            Arc::new(g)
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize database");
            return Err(e.into());
        }
    };
    let blobs: Arc<dyn BlobStore> = Arc::new(FsBlobStore::new(&config.blobs));

    match cli.command {
        Commands::CreateProject { title } => {
            let id =
                allocate_id_or_timestamp(gateway.as_ref(), &project_counter_scope(), "project")
                    .await;
            let project = Project::new(&id, title);
            gateway.create_project(&project).await?;
            print_json(&project)?;
        }
        Commands::ListProjects => {
            let projects = gateway.list_projects().await?;
            let mut report = Vec::with_capacity(projects.len());
            for project in projects {
                let generated = gateway.count_generated_ideas(&project.id).await?;
                report.push(serde_json::json!({
                    "id": project.id,
                    "title": project.title,
                    "created_at": project.created_at,
                    "generated_ideas": generated,
                }));
            }
            print_json(&report)?;
        }
        Commands::AddIdea {
            project,
            title,
            description,
            image,
        } => {
            let project = gateway
                .get_project(&project)
                .await?
                .ok_or_else(|| anyhow::anyhow!("project not found: {}", project))?;

            let id = format!("idea_{}", Utc::now().timestamp_millis());
            let mut idea = Idea::original(&id, &project.id, title, description);

            if let Some(path) = image {
                let bytes = tokio::fs::read(&path).await?;
                let blob_path = format!(
                    "projects/{}/ideas/{}/canvas_{}.png",
                    project.id,
                    id,
                    Utc::now().timestamp_millis()
                );
                let url = blobs.put_bytes(&blob_path, &bytes).await?;
                idea.image_url = Some(url);
            }

            gateway.create_idea(&idea).await?;
            print_json(&idea)?;
        }
        Commands::ListIdeas { project } => {
            let ideas = gateway.list_project_ideas(&project).await?;
            print_json(&ideas)?;
        }
        Commands::Run {
            idea,
            additive,
            intensity,
            reference,
        } => {
            if intensity == 0 {
                anyhow::bail!("intensity must be set (1-100)");
            }

            let source = gateway
                .get_idea(&idea)
                .await?
                .ok_or_else(|| anyhow::anyhow!("idea not found: {}", idea))?;

            let mut additive_config = AdditiveConfig::new(additive, intensity);
            if let Some(path) = reference {
                let bytes = tokio::fs::read(&path).await?;
                additive_config = additive_config.with_reference_image(format!(
                    "data:image/png;base64,{}",
                    STANDARD.encode(bytes)
                ));
            }

            let chat = ChatClient::new(&config.chat, config.request.clone())?;
            let image = ImageClient::new(&config.image, config.request.clone())?;
            let orchestrator = ExperimentOrchestrator::new(
                gateway,
                blobs,
                Arc::new(OpenAiVision::new(chat.clone(), config.models.vision.clone())),
                Arc::new(OpenAiIdeaGeneration::new(chat, config.models.text.clone())),
                Arc::new(StabilityImageSynthesis::new(image)),
            );

            let result = orchestrator.run_experiment(&source, &additive_config).await?;
            print_json(&result)?;
        }
        Commands::History { idea } => {
            let resolver = LineageResolver::new(gateway);
            let lookup = resolver.resolve_root(&idea).await?;
            let experiments = resolver.lineage_experiments(&idea).await?;
            print_json(&serde_json::json!({
                "root_idea_id": lookup.idea_id,
                "path": lookup.path,
                "truncated": lookup.truncated,
                "experiments": experiments,
            }))?;
        }
        Commands::DeleteIdea { id } => {
            gateway.delete_idea(&id).await?;
            info!(idea_id = %id, "Idea deleted");
        }
        Commands::DeleteProject { id } => {
            gateway.delete_project(&id).await?;
            info!(project_id = %id, "Project deleted");
        }
    }

    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Initialize tracing/logging
fn init_logging(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        idealab::config::LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        idealab::config::LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
