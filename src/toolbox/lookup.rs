//! Tool lookup with shed-host, lineage and old-id fallbacks.

use super::state::PanelState;
use crate::error::LookupError;
use crate::lineage::LineageMap;
use crate::tool::Tool;
use std::sync::Arc;

const REPOS_SEGMENT: &str = "/repos/";

/// A lookup request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolQuery {
    pub id: String,
    pub version: Option<String>,
    /// Only a direct id table hit counts.
    pub exact: bool,
    /// Return every known release instead of one.
    pub all_versions: bool,
}

impl ToolQuery {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn exact(mut self) -> Self {
        self.exact = true;
        self
    }

    pub fn all_versions(mut self) -> Self {
        self.all_versions = true;
        self
    }
}

/// Result of a lookup plus the shed host that satisfied it, if any.
#[derive(Debug, Default)]
pub(crate) struct LookupOutcome {
    pub tools: Vec<Arc<Tool>>,
    pub matched_host: Option<String>,
}

/// Ids to try for `id`: a `/repos/` id is re-rooted on each host in
/// `hosts` in order, then the id as given when no host produced it.
pub(crate) fn candidate_ids(id: &str, hosts: &[String]) -> Vec<(String, Option<String>)> {
    let mut candidates: Vec<(String, Option<String>)> = Vec::new();
    if let Some(at) = id.find(REPOS_SEGMENT) {
        let suffix = &id[at..];
        for host in hosts {
            let candidate = format!("{}{}", host.trim_end_matches('/'), suffix);
            if !candidates.iter().any(|(c, _)| *c == candidate) {
                candidates.push((candidate, Some(host.clone())));
            }
        }
    }
    if !candidates.iter().any(|(c, _)| c == id) {
        candidates.push((id.to_string(), None));
    }
    candidates
}

fn direct_hits(state: &PanelState, id: &str, version: Option<&str>) -> Vec<Arc<Tool>> {
    let Some(tool) = state.tools_by_id.get(id) else {
        return Vec::new();
    };
    match version {
        None => vec![Arc::clone(tool)],
        Some(v) if tool.version == v => vec![Arc::clone(tool)],
        Some(v) => state
            .versions_of(&tool.id)
            .iter()
            .filter(|t| t.panel_id() == id && t.version == v)
            .cloned()
            .collect(),
    }
}

fn push_unique(pool: &mut Vec<Arc<Tool>>, tool: &Arc<Tool>) {
    if !pool
        .iter()
        .any(|t| t.panel_id() == tool.panel_id() && t.version == tool.version)
    {
        pool.push(Arc::clone(tool));
    }
}

/// Loaded releases reachable from `id` through the direct table and its
/// lineage. Old ids are consulted only when that finds nothing; the per-id
/// version table only when every release was asked for.
fn related(state: &PanelState, lineage: &LineageMap, id: &str, all_versions: bool) -> Vec<Arc<Tool>> {
    let mut pool = Vec::new();
    if let Some(tool) = state.tools_by_id.get(id) {
        push_unique(&mut pool, tool);
    }
    if let Some(handle) = lineage.get(id) {
        for version in lineage.get_versions(&handle).iter() {
            if let Some(tool) = state.tools_by_id.get(&version.tool_id) {
                let plain_id = tool.id.clone();
                for release in state
                    .versions_of(&plain_id)
                    .iter()
                    .filter(|t| t.panel_id() == version.tool_id && t.version == version.version)
                {
                    push_unique(&mut pool, release);
                }
            }
        }
    }
    if pool.is_empty() {
        let mut old_ids: Vec<&Arc<Tool>> = state
            .tools_by_id
            .values()
            .filter(|t| t.old_id.as_deref() == Some(id))
            .collect();
        old_ids.sort_by(|a, b| a.panel_id().cmp(b.panel_id()));
        for tool in old_ids {
            push_unique(&mut pool, tool);
        }
    }
    if all_versions {
        for tool in state.versions_of(id) {
            push_unique(&mut pool, tool);
        }
    }
    pool
}

pub(crate) fn lookup(
    state: &PanelState,
    lineage: &LineageMap,
    hosts: &[String],
    query: &ToolQuery,
) -> Result<LookupOutcome, LookupError> {
    if query.exact && query.all_versions {
        return Err(LookupError::ExactWithAllVersions(query.id.clone()));
    }
    let version = query.version.as_deref();
    let candidates = candidate_ids(&query.id, hosts);

    if !query.all_versions {
        for (candidate, host) in &candidates {
            let hits = direct_hits(state, candidate, version);
            if !hits.is_empty() {
                return Ok(LookupOutcome {
                    tools: hits.into_iter().take(1).collect(),
                    matched_host: host.clone(),
                });
            }
        }
    }
    if query.exact {
        return Ok(LookupOutcome::default());
    }

    for (candidate, host) in &candidates {
        let mut pool = related(state, lineage, candidate, query.all_versions);
        if pool.is_empty() {
            continue;
        }
        pool.sort_by(|a, b| lineage.compare(a, b));
        let tools = if query.all_versions {
            pool
        } else if let Some(v) = version {
            pool.into_iter().rev().find(|t| t.version == v).into_iter().collect()
        } else {
            pool.pop().into_iter().collect()
        };
        if !tools.is_empty() {
            return Ok(LookupOutcome {
                tools,
                matched_host: host.clone(),
            });
        }
    }
    Ok(LookupOutcome::default())
}
