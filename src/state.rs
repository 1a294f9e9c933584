use crate::config::TemplateLink;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use linkset::{ChildKind, ConvergenceReport, LinkProjection, ProjectedChild};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

// ============================================================================
// State Structures
// ============================================================================

/// Main state structure tracking what zlink last applied
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ZlinkState {
    /// Per template link, keyed by declaration name
    #[serde(default)]
    pub links: BTreeMap<String, LinkState>,

    /// Graph ids keyed by declaration name
    #[serde(default)]
    pub graphs: BTreeMap<String, String>,

    /// Dashboard ids keyed by declaration name
    #[serde(default)]
    pub dashboards: BTreeMap<String, String>,

    /// Last time the state was updated
    pub last_updated: DateTime<Utc>,
}

/// State for a single template link
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct LinkState {
    /// Parent the declared sets below belong to
    pub template_id: String,

    /// Declared sets to diff against on the next apply
    #[serde(default)]
    pub items: Vec<String>,

    #[serde(default)]
    pub triggers: Vec<String>,

    #[serde(default)]
    pub lld_rules: Vec<String>,

    /// Children seen on the parent after the last apply
    #[serde(default)]
    pub projection: ProjectionState,

    /// Last time every kind converged
    pub last_converged: Option<DateTime<Utc>>,
}

/// Persisted [`LinkProjection`]
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct ProjectionState {
    #[serde(default)]
    pub items: Vec<ProjectedChild>,

    #[serde(default)]
    pub triggers: Vec<ProjectedChild>,

    #[serde(default)]
    pub lld_rules: Vec<ProjectedChild>,
}

impl From<&LinkProjection> for ProjectionState {
    fn from(projection: &LinkProjection) -> Self {
        Self {
            items: projection.get(ChildKind::Item).to_vec(),
            triggers: projection.get(ChildKind::Trigger).to_vec(),
            lld_rules: projection.get(ChildKind::DiscoveryRule).to_vec(),
        }
    }
}

impl LinkState {
    pub fn declared(&self, kind: ChildKind) -> &[String] {
        match kind {
            ChildKind::Item => &self.items,
            ChildKind::Trigger => &self.triggers,
            ChildKind::DiscoveryRule => &self.lld_rules,
        }
    }

    fn declared_mut(&mut self, kind: ChildKind) -> &mut Vec<String> {
        match kind {
            ChildKind::Item => &mut self.items,
            ChildKind::Trigger => &mut self.triggers,
            ChildKind::DiscoveryRule => &mut self.lld_rules,
        }
    }
}

impl Default for ZlinkState {
    fn default() -> Self {
        Self {
            links: BTreeMap::new(),
            graphs: BTreeMap::new(),
            dashboards: BTreeMap::new(),
            last_updated: Utc::now(),
        }
    }
}

// ============================================================================
// ZlinkState Implementation
// ============================================================================

impl ZlinkState {
    /// Load state from disk, or return default if file doesn't exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("State file does not exist, using default state");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file: {}", path.display()))?;

        let state: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {}", path.display()))?;

        log::debug!("Loaded state from {}", path.display());
        Ok(state)
    }

    /// Save state to disk
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).with_context(|| {
                format!("Failed to create state directory: {}", dir.display())
            })?;
        }

        let content = toml::to_string_pretty(&self).context("Failed to serialize state to TOML")?;

        fs::write(path, &content)
            .with_context(|| format!("Failed to write state file: {}", path.display()))?;

        log::debug!("Saved state to {}", path.display());
        Ok(())
    }

    /// Update the last_updated timestamp and save
    pub fn touch(&mut self, path: &Path) -> Result<()> {
        self.last_updated = Utc::now();
        self.save(path)
    }

    // ========================================================================
    // Link State Helpers
    // ========================================================================

    /// Previous declaration of a kind for a link.
    ///
    /// Empty when the link was never applied or now points at a different
    /// template, so nothing on the new parent is deleted on the first pass.
    pub fn previous_declared(&self, link: &TemplateLink, kind: ChildKind) -> Vec<String> {
        match self.links.get(&link.name) {
            Some(state) if state.template_id == link.template_id => {
                state.declared(kind).to_vec()
            }
            Some(state) => {
                log::info!(
                    "template_link '{}' moved from template {} to {}; starting fresh",
                    link.name,
                    state.template_id,
                    link.template_id
                );
                Vec::new()
            }
            None => Vec::new(),
        }
    }

    /// Record the outcome of an apply pass for a link
    pub fn record_link(
        &mut self,
        link: &TemplateLink,
        report: &ConvergenceReport,
        projection: Option<&LinkProjection>,
    ) {
        let previous_projection = self
            .links
            .get(&link.name)
            .filter(|s| s.template_id == link.template_id)
            .map(|s| s.projection.clone())
            .unwrap_or_default();
        let previous_converged = self
            .links
            .get(&link.name)
            .and_then(|s| s.last_converged);

        let mut state = LinkState {
            template_id: link.template_id.clone(),
            projection: projection.map_or(previous_projection, ProjectionState::from),
            last_converged: if report.is_success() {
                Some(Utc::now())
            } else {
                previous_converged
            },
            ..LinkState::default()
        };

        for kind in ChildKind::all() {
            let carried = report.carry_forward(*kind).map_or_else(
                || link.declared(*kind).to_vec(),
                |ids| ids.iter().map(|id| id.as_str().to_string()).collect(),
            );
            *state.declared_mut(*kind) = carried;
        }

        self.links.insert(link.name.clone(), state);
    }

    /// Forget links no longer declared; nothing is deleted remotely
    pub fn prune_links<'a>(&mut self, declared: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        let keep: HashSet<&str> = declared.into_iter().collect();
        let removed: Vec<String> = self
            .links
            .keys()
            .filter(|name| !keep.contains(name.as_str()))
            .cloned()
            .collect();
        for name in &removed {
            log::info!("Forgetting template_link '{}' (no longer in config)", name);
            self.links.remove(name);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkset::{
        ChildId, ConvergenceDriver, DeclaredChange, LinkProjector, LinkRequest, MemoryStore,
        NoProgress, ParentId, Provenance,
    };
    use std::collections::BTreeSet;

    fn id_set(ids: &[String]) -> BTreeSet<ChildId> {
        ids.iter().map(|id| ChildId::new(id.as_str())).collect()
    }

    fn link(template_id: &str, items: &[&str]) -> TemplateLink {
        TemplateLink {
            name: "web".to_string(),
            template_id: template_id.to_string(),
            items: items.iter().map(|s| s.to_string()).collect(),
            triggers: Vec::new(),
            lld_rules: Vec::new(),
        }
    }

    fn apply(store: &MemoryStore, state: &mut ZlinkState, link: &TemplateLink) {
        let mut request = LinkRequest::new(ParentId::new(&link.template_id));
        for kind in ChildKind::all() {
            request = request.with_kind(
                *kind,
                DeclaredChange::new(
                    state.previous_declared(link, *kind),
                    link.declared(*kind).to_vec(),
                ),
            );
        }
        let report = ConvergenceDriver::new(store).converge(&request, &mut NoProgress);
        let projection = LinkProjector::new(store).project(&request.parent).ok();
        state.record_link(link, &report, projection.as_ref());
    }

    #[test]
    fn test_load_missing_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let state = ZlinkState::load(&dir.path().join("state.toml")).unwrap();
        assert!(state.links.is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.toml");

        let store = MemoryStore::new()
            .with_child("10084", ChildKind::Item, "1", Provenance::Local)
            .with_child("10084", ChildKind::Item, "9", Provenance::Inherited);
        let mut state = ZlinkState::default();
        apply(&store, &mut state, &link("10084", &["1"]));
        state.graphs.insert("CPU load".to_string(), "512".to_string());
        state.touch(&path).unwrap();

        let loaded = ZlinkState::load(&path).unwrap();
        let web = &loaded.links["web"];
        assert_eq!(web.template_id, "10084");
        assert_eq!(web.items, vec!["1"]);
        assert!(web.last_converged.is_some());
        assert_eq!(web.projection.items.len(), 2);
        assert!(web.projection.items.iter().any(|c| c.id.as_str() == "9" && !c.local));
        assert_eq!(loaded.graphs["CPU load"], "512");
    }

    #[test]
    fn test_second_apply_deletes_dropped_local() {
        let store = MemoryStore::new()
            .with_child("10084", ChildKind::Item, "1", Provenance::Local)
            .with_child("10084", ChildKind::Item, "2", Provenance::Local);
        let mut state = ZlinkState::default();

        apply(&store, &mut state, &link("10084", &["1", "2"]));
        assert!(store.delete_calls().is_empty());

        apply(&store, &mut state, &link("10084", &["1"]));
        assert_eq!(
            store.children("10084", ChildKind::Item),
            vec![ChildId::new("1")]
        );
        assert_eq!(state.links["web"].items, vec!["1"]);
    }

    #[test]
    fn test_moved_template_starts_fresh() {
        let store = MemoryStore::new()
            .with_child("10084", ChildKind::Item, "1", Provenance::Local)
            .with_child("10085", ChildKind::Item, "1", Provenance::Local);
        let mut state = ZlinkState::default();
        apply(&store, &mut state, &link("10084", &["1"]));

        let moved = link("10085", &[]);
        assert!(state.previous_declared(&moved, ChildKind::Item).is_empty());
        apply(&store, &mut state, &moved);

        assert!(store.delete_calls().is_empty());
        assert_eq!(state.links["web"].template_id, "10085");
    }

    #[test]
    fn test_failed_delete_is_carried_forward() {
        let store = MemoryStore::new()
            .with_child("10084", ChildKind::Item, "1", Provenance::Local)
            .with_child("10084", ChildKind::Item, "2", Provenance::Local);
        let mut state = ZlinkState::default();
        apply(&store, &mut state, &link("10084", &["1", "2"]));

        store.fail_delete(ChildKind::Item, "2");
        apply(&store, &mut state, &link("10084", &["1"]));

        let web = &state.links["web"];
        assert_eq!(id_set(&web.items), id_set(&["1".to_string(), "2".to_string()]));
        assert!(web.projection.items.iter().any(|c| c.id.as_str() == "2"));
    }

    #[test]
    fn test_prune_links() {
        let mut state = ZlinkState::default();
        state.links.insert("web".to_string(), LinkState::default());
        state.links.insert("db".to_string(), LinkState::default());

        let removed = state.prune_links(["web"]);
        assert_eq!(removed, vec!["db"]);
        assert!(state.links.contains_key("web"));
    }
}
