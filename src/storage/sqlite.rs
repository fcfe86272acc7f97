use async_trait::async_trait;
use chrono::DateTime;
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::info;

use super::{
    AllocatedId, Experiment, ExperimentResult, Gateway, Idea, Project,
};
use crate::config::DatabaseConfig;
use crate::error::{StorageError, StorageResult};
use crate::lab::Additive;

/// Static migrator that embeds migrations at compile time
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// SQLite-backed gateway implementation
#[derive(Clone)]
pub struct SqliteGateway {
    pool: SqlitePool,
}

impl SqliteGateway {
    /// Create a new SQLite gateway
    pub async fn new(config: &DatabaseConfig) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Connection {
                message: format!("Failed to create database directory: {}", e),
            })?;
        }

        let database_url = format!("sqlite://{}?mode=rwc", config.path.display());

        let options = SqliteConnectOptions::from_str(&database_url)
            .map_err(|e| StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        let gateway = Self { pool };
        gateway.run_migrations().await?;

        Ok(gateway)
    }

    /// Create an in-memory gateway (for tests)
    pub async fn new_in_memory() -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?
            .foreign_keys(true);

        // A single connection keeps every caller on the same in-memory db.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to connect to in-memory database: {}", e),
            })?;

        let gateway = Self { pool };
        gateway.run_migrations().await?;

        Ok(gateway)
    }

    /// Run database migrations using embedded sqlx migrations
    async fn run_migrations(&self) -> StorageResult<()> {
        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::Migration {
                message: format!("Failed to run migrations: {}", e),
            })?;

        info!("Database migrations completed");
        Ok(())
    }

    /// Get the underlying pool for advanced queries
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Gateway for SqliteGateway {
    async fn create_project(&self, project: &Project) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO projects (id, title, created_at)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(&project.id)
        .bind(&project.title)
        .bind(project.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_project(&self, id: &str) -> StorageResult<Option<Project>> {
        let row: Option<ProjectRow> = sqlx::query_as(
            r#"
            SELECT id, title, created_at
            FROM projects
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn list_projects(&self) -> StorageResult<Vec<Project>> {
        let rows: Vec<ProjectRow> = sqlx::query_as(
            r#"
            SELECT id, title, created_at
            FROM projects
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn delete_project(&self, id: &str) -> StorageResult<()> {
        sqlx::query("DELETE FROM projects WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn create_idea(&self, idea: &Idea) -> StorageResult<()> {
        let tags = serde_json::to_string(&idea.tags).unwrap_or_default();

        sqlx::query(
            r#"
            INSERT INTO ideas (
                id, project_id, title, description, image_url, kind, additive,
                generation, source_idea_id, source_experiment_id, tags,
                image_generated, image_error, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&idea.id)
        .bind(&idea.project_id)
        .bind(&idea.title)
        .bind(&idea.description)
        .bind(&idea.image_url)
        .bind(idea.kind.to_string())
        .bind(idea.additive.map(|a| a.as_str()))
        .bind(idea.generation)
        .bind(&idea.source_idea_id)
        .bind(&idea.source_experiment_id)
        .bind(&tags)
        .bind(idea.image_generated)
        .bind(&idea.image_error)
        .bind(idea.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_idea(&self, id: &str) -> StorageResult<Option<Idea>> {
        let row: Option<IdeaRow> = sqlx::query_as(
            r#"
            SELECT id, project_id, title, description, image_url, kind, additive,
                   generation, source_idea_id, source_experiment_id, tags,
                   image_generated, image_error, created_at
            FROM ideas
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn list_project_ideas(&self, project_id: &str) -> StorageResult<Vec<Idea>> {
        let rows: Vec<IdeaRow> = sqlx::query_as(
            r#"
            SELECT id, project_id, title, description, image_url, kind, additive,
                   generation, source_idea_id, source_experiment_id, tags,
                   image_generated, image_error, created_at
            FROM ideas
            WHERE project_id = ?
            ORDER BY created_at ASC
            "#,
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn count_generated_ideas(&self, project_id: &str) -> StorageResult<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM ideas
            WHERE project_id = ? AND kind = 'generated'
            "#,
        )
        .bind(project_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn delete_idea(&self, id: &str) -> StorageResult<()> {
        sqlx::query("DELETE FROM ideas WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn create_experiment(&self, experiment: &Experiment) -> StorageResult<()> {
        let result = experiment
            .result
            .as_ref()
            .map(|r| serde_json::to_string(r).unwrap_or_default());

        sqlx::query(
            r#"
            INSERT INTO experiments (
                id, idea_id, root_idea_id, project_id, additive, intensity,
                status, result, result_idea_id, generation, created_at, completed_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&experiment.id)
        .bind(&experiment.idea_id)
        .bind(&experiment.root_idea_id)
        .bind(&experiment.project_id)
        .bind(experiment.additive.as_str())
        .bind(experiment.intensity as i64)
        .bind(experiment.status.to_string())
        .bind(&result)
        .bind(&experiment.result_idea_id)
        .bind(experiment.generation)
        .bind(experiment.created_at.to_rfc3339())
        .bind(experiment.completed_at.map(|t| t.to_rfc3339()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_experiment(&self, id: &str) -> StorageResult<Option<Experiment>> {
        let row: Option<ExperimentRow> = sqlx::query_as(
            r#"
            SELECT id, idea_id, root_idea_id, project_id, additive, intensity,
                   status, result, result_idea_id, generation, created_at, completed_at
            FROM experiments
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn update_experiment(&self, experiment: &Experiment) -> StorageResult<()> {
        let result = experiment
            .result
            .as_ref()
            .map(|r| serde_json::to_string(r).unwrap_or_default());

        let updated = sqlx::query(
            r#"
            UPDATE experiments
            SET status = ?, result = ?, result_idea_id = ?, generation = ?, completed_at = ?
            WHERE id = ?
            "#,
        )
        .bind(experiment.status.to_string())
        .bind(&result)
        .bind(&experiment.result_idea_id)
        .bind(experiment.generation)
        .bind(experiment.completed_at.map(|t| t.to_rfc3339()))
        .bind(&experiment.id)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(StorageError::ExperimentNotFound {
                experiment_id: experiment.id.clone(),
            });
        }

        Ok(())
    }

    async fn list_root_experiments(&self, root_idea_id: &str) -> StorageResult<Vec<Experiment>> {
        let rows: Vec<ExperimentRow> = sqlx::query_as(
            r#"
            SELECT id, idea_id, root_idea_id, project_id, additive, intensity,
                   status, result, result_idea_id, generation, created_at, completed_at
            FROM experiments
            WHERE root_idea_id = ?
            ORDER BY created_at ASC
            "#,
        )
        .bind(root_idea_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn list_idea_experiments(&self, idea_id: &str) -> StorageResult<Vec<Experiment>> {
        let rows: Vec<ExperimentRow> = sqlx::query_as(
            r#"
            SELECT id, idea_id, root_idea_id, project_id, additive, intensity,
                   status, result, result_idea_id, generation, created_at, completed_at
            FROM experiments
            WHERE idea_id = ?
            ORDER BY created_at ASC
            "#,
        )
        .bind(idea_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn next_id(&self, scope: &str, prefix: &str) -> StorageResult<AllocatedId> {
        // Single-statement upsert; SQLite executes it atomically, so
        // concurrent callers cannot observe the same count.
        let count: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO counters (scope, count)
            VALUES (?, 1)
            ON CONFLICT(scope) DO UPDATE SET count = count + 1
            RETURNING count
            "#,
        )
        .bind(scope)
        .fetch_one(&self.pool)
        .await?;

        Ok(AllocatedId {
            id: format!("{}_{}", prefix, count),
            count,
        })
    }
}

// Internal row types for SQLx mapping
#[derive(sqlx::FromRow)]
struct ProjectRow {
    id: String,
    title: String,
    created_at: String,
}

impl From<ProjectRow> for Project {
    fn from(row: ProjectRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            created_at: parse_timestamp(&row.created_at),
        }
    }
}

#[derive(sqlx::FromRow)]
struct IdeaRow {
    id: String,
    project_id: String,
    title: String,
    description: String,
    image_url: Option<String>,
    kind: String,
    additive: Option<String>,
    generation: i64,
    source_idea_id: Option<String>,
    source_experiment_id: Option<String>,
    tags: Option<String>,
    image_generated: bool,
    image_error: Option<String>,
    created_at: String,
}

impl From<IdeaRow> for Idea {
    fn from(row: IdeaRow) -> Self {
        Self {
            id: row.id,
            project_id: row.project_id,
            title: row.title,
            description: row.description,
            image_url: row.image_url,
            kind: row.kind.parse().unwrap_or_default(),
            additive: row.additive.and_then(|a| a.parse::<Additive>().ok()),
            generation: row.generation,
            source_idea_id: row.source_idea_id,
            source_experiment_id: row.source_experiment_id,
            tags: row
                .tags
                .and_then(|t| serde_json::from_str(&t).ok())
                .unwrap_or_default(),
            image_generated: row.image_generated,
            image_error: row.image_error,
            created_at: parse_timestamp(&row.created_at),
        }
    }
}

#[derive(sqlx::FromRow)]
struct ExperimentRow {
    id: String,
    idea_id: String,
    root_idea_id: String,
    project_id: String,
    additive: String,
    intensity: i64,
    status: String,
    result: Option<String>,
    result_idea_id: Option<String>,
    generation: i64,
    created_at: String,
    completed_at: Option<String>,
}

impl From<ExperimentRow> for Experiment {
    fn from(row: ExperimentRow) -> Self {
        Self {
            id: row.id,
            idea_id: row.idea_id,
            root_idea_id: row.root_idea_id,
            project_id: row.project_id,
            additive: row.additive.parse().unwrap_or(Additive::Creativity),
            intensity: row.intensity.clamp(0, 100) as u8,
            status: row.status.parse().unwrap_or_default(),
            result: row
                .result
                .and_then(|r| serde_json::from_str::<ExperimentResult>(&r).ok()),
            result_idea_id: row.result_idea_id,
            generation: row.generation,
            created_at: parse_timestamp(&row.created_at),
            completed_at: row.completed_at.map(|t| parse_timestamp(&t)),
        }
    }
}

fn parse_timestamp(raw: &str) -> chrono::DateTime<chrono::Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .unwrap_or_else(|_| chrono::Utc::now())
}
