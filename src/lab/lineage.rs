use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{AppResult, StorageError};
use crate::storage::{Experiment, ExperimentStatus, Gateway, IdeaKind};

/// Default ceiling on backward hops when resolving a lineage root.
pub const DEFAULT_HOP_LIMIT: usize = 10;

/// Result of walking an idea's ancestry back to its root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootLookup {
    /// The root (or the oldest reachable ancestor when truncated).
    pub idea_id: String,
    /// Ancestry from the root down to the queried idea, inclusive.
    pub path: Vec<String>,
    /// True when the walk stopped at the hop ceiling or at a dangling
    /// source reference instead of a genuine original idea.
    pub truncated: bool,
}

/// Walks stored source references to reconstruct an idea's lineage.
///
/// Source references form a backward linked list; a cycle or an orphaned
/// reference (ancestor deleted) cannot hang the walk because of the hop
/// ceiling, it just marks the lookup truncated.
pub struct LineageResolver {
    gateway: Arc<dyn Gateway>,
    hop_limit: usize,
}

impl LineageResolver {
    /// Create a resolver with the default hop ceiling
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self {
            gateway,
            hop_limit: DEFAULT_HOP_LIMIT,
        }
    }

    /// Override the hop ceiling
    pub fn with_hop_limit(mut self, hop_limit: usize) -> Self {
        self.hop_limit = hop_limit;
        self
    }

    /// Resolve the lineage root of an idea.
    pub async fn resolve_root(&self, idea_id: &str) -> AppResult<RootLookup> {
        let mut current = self
            .gateway
            .get_idea(idea_id)
            .await?
            .ok_or_else(|| StorageError::IdeaNotFound {
                idea_id: idea_id.to_string(),
            })?;

        // Built current-to-root, reversed before returning.
        let mut chain = vec![current.id.clone()];
        let mut truncated = false;
        let mut hops = 0;

        loop {
            let source_id = match (&current.kind, &current.source_idea_id) {
                (IdeaKind::Generated, Some(source_id)) => source_id.clone(),
                _ => break,
            };

            if hops >= self.hop_limit {
                warn!(
                    idea_id = %idea_id,
                    hop_limit = self.hop_limit,
                    "Lineage walk hit hop ceiling"
                );
                truncated = true;
                break;
            }
            hops += 1;

            match self.gateway.get_idea(&source_id).await? {
                Some(ancestor) => {
                    chain.push(ancestor.id.clone());
                    current = ancestor;
                }
                None => {
                    warn!(
                        idea_id = %idea_id,
                        missing = %source_id,
                        "Lineage walk hit a dangling source reference"
                    );
                    truncated = true;
                    break;
                }
            }
        }

        chain.reverse();
        let root = chain.first().cloned().unwrap_or_else(|| idea_id.to_string());

        debug!(
            idea_id = %idea_id,
            root = %root,
            depth = chain.len(),
            truncated,
            "Resolved lineage root"
        );

        Ok(RootLookup {
            idea_id: root,
            path: chain,
            truncated,
        })
    }

    /// Enumerate the completed experiments that produced each step of an
    /// idea's lineage, ordered by generation.
    ///
    /// Experiments that branched off the chain (same root, but their result
    /// is not an ancestor of the queried idea) are excluded.
    pub async fn lineage_experiments(&self, idea_id: &str) -> AppResult<Vec<Experiment>> {
        let lookup = self.resolve_root(idea_id).await?;
        let members: HashSet<&str> = lookup.path.iter().map(String::as_str).collect();

        let mut experiments: Vec<Experiment> = self
            .gateway
            .list_root_experiments(&lookup.idea_id)
            .await?
            .into_iter()
            .filter(|e| {
                e.status == ExperimentStatus::Completed
                    && e.result_idea_id
                        .as_deref()
                        .is_some_and(|id| members.contains(id))
            })
            .collect();

        experiments.sort_by_key(|e| e.generation);

        Ok(experiments)
    }
}
