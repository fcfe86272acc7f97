//! Integration tests for lineage resolution
//!
//! Builds ancestor chains in an in-memory database and checks root
//! resolution and experiment-history enumeration.

use pretty_assertions::assert_eq;
use std::sync::Arc;

use idealab::lab::{fallback_plan, Additive, LineageResolver};
use idealab::storage::{
    Experiment, ExperimentResult, Gateway, Idea, Project, SqliteGateway,
};

async fn create_test_gateway() -> Arc<SqliteGateway> {
    Arc::new(
        SqliteGateway::new_in_memory()
            .await
            .expect("Failed to create in-memory gateway"),
    )
}

/// Seed a project with an original idea and `depth` generated descendants,
/// each produced by a completed experiment. Returns the idea ids, root first.
async fn seed_chain(gateway: &Arc<SqliteGateway>, depth: usize) -> Vec<String> {
    gateway
        .create_project(&Project::new("project_1", "p"))
        .await
        .unwrap();
    gateway
        .create_idea(&Idea::original("idea_0", "project_1", "root", "d"))
        .await
        .unwrap();

    let mut ids = vec!["idea_0".to_string()];

    for n in 1..=depth {
        let source = format!("idea_{}", n - 1);
        let idea_id = format!("idea_{}", n);
        let exp_id = format!("exp_{}", n);

        let mut experiment = Experiment::new(
            &exp_id,
            "project_1",
            &source,
            "idea_0",
            Additive::Creativity,
            50,
            n as i64,
        );
        gateway.create_experiment(&experiment).await.unwrap();

        gateway
            .create_idea(&Idea::generated(
                &idea_id,
                "project_1",
                format!("gen {}", n),
                "d",
                Additive::Creativity,
                n as i64,
                &source,
                &exp_id,
            ))
            .await
            .unwrap();

        experiment.complete(
            ExperimentResult {
                title: format!("gen {}", n),
                description: "d".to_string(),
                image_url: None,
                steps: fallback_plan(Additive::Creativity),
            },
            &idea_id,
        );
        gateway.update_experiment(&experiment).await.unwrap();

        ids.push(idea_id);
    }

    ids
}

#[tokio::test]
async fn test_resolve_root_of_original_idea() {
    let gateway = create_test_gateway().await;
    seed_chain(&gateway, 0).await;

    let resolver = LineageResolver::new(gateway);
    let lookup = resolver.resolve_root("idea_0").await.unwrap();

    assert_eq!(lookup.idea_id, "idea_0");
    assert_eq!(lookup.path, vec!["idea_0".to_string()]);
    assert!(!lookup.truncated);
}

#[tokio::test]
async fn test_resolve_root_walks_back_to_original() {
    let gateway = create_test_gateway().await;
    let ids = seed_chain(&gateway, 3).await;

    let resolver = LineageResolver::new(gateway);
    let lookup = resolver.resolve_root("idea_3").await.unwrap();

    assert_eq!(lookup.idea_id, "idea_0");
    assert_eq!(lookup.path, ids);
    assert!(!lookup.truncated);
}

#[tokio::test]
async fn test_resolve_root_truncates_at_hop_ceiling() {
    let gateway = create_test_gateway().await;
    seed_chain(&gateway, 5).await;

    let resolver = LineageResolver::new(gateway).with_hop_limit(2);
    let lookup = resolver.resolve_root("idea_5").await.unwrap();

    assert!(lookup.truncated);
    assert_eq!(lookup.path.len(), 3, "Queried idea plus two hops");
    assert_eq!(lookup.idea_id, "idea_3", "Oldest reachable ancestor");
}

#[tokio::test]
async fn test_resolve_root_with_dangling_ancestor() {
    let gateway = create_test_gateway().await;
    seed_chain(&gateway, 3).await;

    // Delete a middle ancestor; descendants keep their references.
    gateway.delete_idea("idea_1").await.unwrap();

    let resolver = LineageResolver::new(gateway);
    let lookup = resolver.resolve_root("idea_3").await.unwrap();

    assert!(lookup.truncated);
    assert_eq!(lookup.idea_id, "idea_2", "Walk stops before the gap");
    assert_eq!(lookup.path, vec!["idea_2".to_string(), "idea_3".to_string()]);
}

#[tokio::test]
async fn test_resolve_root_of_missing_idea_is_an_error() {
    let gateway = create_test_gateway().await;
    seed_chain(&gateway, 0).await;

    let resolver = LineageResolver::new(gateway);
    let result = resolver.resolve_root("idea_404").await;

    assert!(result.is_err());
}

#[tokio::test]
async fn test_lineage_experiments_ordered_by_generation() {
    let gateway = create_test_gateway().await;
    seed_chain(&gateway, 3).await;

    let resolver = LineageResolver::new(gateway);
    let experiments = resolver.lineage_experiments("idea_3").await.unwrap();

    let ids: Vec<&str> = experiments.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["exp_1", "exp_2", "exp_3"]);
    let generations: Vec<i64> = experiments.iter().map(|e| e.generation).collect();
    assert_eq!(generations, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_lineage_experiments_excludes_divergent_branches() {
    let gateway = create_test_gateway().await;
    seed_chain(&gateway, 2).await;

    // A sibling branch off the root: same lineage root, different path.
    let mut branch = Experiment::new(
        "exp_branch",
        "project_1",
        "idea_0",
        "idea_0",
        Additive::Usability,
        80,
        1,
    );
    gateway.create_experiment(&branch).await.unwrap();
    gateway
        .create_idea(&Idea::generated(
            "idea_branch",
            "project_1",
            "branch",
            "d",
            Additive::Usability,
            1,
            "idea_0",
            "exp_branch",
        ))
        .await
        .unwrap();
    branch.complete(
        ExperimentResult {
            title: "branch".to_string(),
            description: "d".to_string(),
            image_url: None,
            steps: fallback_plan(Additive::Usability),
        },
        "idea_branch",
    );
    gateway.update_experiment(&branch).await.unwrap();

    let resolver = LineageResolver::new(gateway);
    let experiments = resolver.lineage_experiments("idea_2").await.unwrap();

    let ids: Vec<&str> = experiments.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["exp_1", "exp_2"], "Branch experiment excluded");
}

#[tokio::test]
async fn test_lineage_experiments_excludes_processing_records() {
    let gateway = create_test_gateway().await;
    seed_chain(&gateway, 1).await;

    // An in-flight experiment against the chain tip.
    gateway
        .create_experiment(&Experiment::new(
            "exp_inflight",
            "project_1",
            "idea_1",
            "idea_0",
            Additive::Aesthetics,
            50,
            2,
        ))
        .await
        .unwrap();

    let resolver = LineageResolver::new(gateway);
    let experiments = resolver.lineage_experiments("idea_1").await.unwrap();

    let ids: Vec<&str> = experiments.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["exp_1"]);
}

#[tokio::test]
async fn test_lineage_resolution_is_idempotent() {
    let gateway = create_test_gateway().await;
    seed_chain(&gateway, 2).await;

    let resolver = LineageResolver::new(gateway);
    let first = resolver.resolve_root("idea_2").await.unwrap();
    let second = resolver.resolve_root("idea_2").await.unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_lineage_experiments_are_idempotent() {
    let gateway = create_test_gateway().await;
    seed_chain(&gateway, 2).await;

    let resolver = LineageResolver::new(gateway);
    let first: Vec<String> = resolver
        .lineage_experiments("idea_2")
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.id)
        .collect();
    let second: Vec<String> = resolver
        .lineage_experiments("idea_2")
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.id)
        .collect();

    assert_eq!(first, vec!["exp_1".to_string(), "exp_2".to_string()]);
    assert_eq!(first, second);
}
