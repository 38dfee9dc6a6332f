//! In-memory repository engine.
//!
//! Workspaces are node trees behind a [`parking_lot::RwLock`]. A session
//! clones its workspace on login, mutates the clone, and `save` publishes it
//! back, so a session closed without saving never leaks partial mutations.
//! A live-session counter makes the request-scoped lifecycle observable.

use super::{
    ChildEntry, NodeData, NodeTypeData, PropertyData, PropertyType, PropertyValue, PropertyWrite,
    QueryOrder, RepoError, RepoResult, Repository, Session, VersionData, ROOT_TYPE,
    UNSTRUCTURED_TYPE, VERSIONABLE_MIXIN,
};
use crate::escape::SiblingName;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone)]
struct StoredProperty {
    ptype: PropertyType,
    value: PropertyValue,
}

#[derive(Debug, Clone)]
struct StoredVersion {
    name: String,
    created: DateTime<Utc>,
    frozen_id: String,
}

#[derive(Debug, Clone)]
struct StoredNode {
    id: String,
    parent: Option<String>,
    name: String,
    primary_type: String,
    mixins: Vec<String>,
    properties: BTreeMap<String, StoredProperty>,
    children: Vec<String>,
    versions: Vec<StoredVersion>,
    /// Frozen snapshots live in the map but stay out of tree walks and queries.
    frozen: bool,
}

impl StoredNode {
    fn root() -> Self {
        Self {
            id: String::new(),
            parent: None,
            name: String::new(),
            primary_type: ROOT_TYPE.to_string(),
            mixins: Vec::new(),
            properties: BTreeMap::new(),
            children: Vec::new(),
            versions: Vec::new(),
            frozen: false,
        }
    }
}

#[derive(Debug, Clone)]
struct WorkspaceState {
    nodes: HashMap<String, StoredNode>,
}

impl WorkspaceState {
    fn new() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(String::new(), StoredNode::root());
        Self { nodes }
    }

    fn node(&self, id: &str) -> RepoResult<&StoredNode> {
        self.nodes
            .get(id)
            .ok_or_else(|| RepoError::NotFound(format!("node '{id}'")))
    }

    fn node_mut(&mut self, id: &str) -> RepoResult<&mut StoredNode> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| RepoError::NotFound(format!("node '{id}'")))
    }

    /// 1-based position among same-named siblings.
    fn sibling_index(&self, node: &StoredNode) -> u32 {
        let Some(parent_id) = &node.parent else {
            return 1;
        };
        let Some(parent) = self.nodes.get(parent_id) else {
            return 1;
        };
        let mut index = 0;
        for child_id in &parent.children {
            if let Some(child) = self.nodes.get(child_id) {
                if child.name == node.name {
                    index += 1;
                    if child.id == node.id {
                        return index;
                    }
                }
            }
        }
        1
    }

    /// Absolute path, empty for the root, `name[index]` for indexed siblings.
    fn path_of(&self, id: &str) -> RepoResult<String> {
        let mut segments = Vec::new();
        let mut current = self.node(id)?;
        while let Some(parent_id) = current.parent.clone() {
            let sibling = SiblingName::new(current.name.clone(), self.sibling_index(current));
            segments.push(sibling.item_name());
            current = self.node(&parent_id)?;
        }
        segments.reverse();
        if segments.is_empty() {
            Ok(String::new())
        } else {
            Ok(format!("/{}", segments.join("/")))
        }
    }

    fn resolve_path(&self, path: &str) -> RepoResult<&StoredNode> {
        let mut current = self.node("")?;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            let (name, index) = parse_item_name(segment);
            let mut seen = 0;
            let mut found = None;
            for child_id in &current.children {
                let child = self.node(child_id)?;
                if child.name == name {
                    seen += 1;
                    if seen == index {
                        found = Some(child);
                        break;
                    }
                }
            }
            current =
                found.ok_or_else(|| RepoError::NotFound(format!("path '{path}' at '{segment}'")))?;
        }
        Ok(current)
    }

    fn node_data(&self, id: &str) -> RepoResult<NodeData> {
        let node = self.node(id)?;
        let mut children = Vec::new();
        let mut name_counts: HashMap<&str, u32> = HashMap::new();
        for child_id in &node.children {
            let child = self.node(child_id)?;
            let count = name_counts.entry(child.name.as_str()).or_insert(0);
            *count += 1;
            children.push(ChildEntry {
                id: child.id.clone(),
                name: SiblingName::new(child.name.clone(), *count),
            });
        }
        let properties = node
            .properties
            .iter()
            .map(|(name, p)| PropertyData {
                name: name.clone(),
                ptype: p.ptype,
                value: p.value.clone(),
            })
            .collect();
        Ok(NodeData {
            id: node.id.clone(),
            parent_id: node.parent.clone(),
            name: node.name.clone(),
            index: self.sibling_index(node),
            path: self.path_of(id)?,
            primary_type: node.primary_type.clone(),
            mixins: node.mixins.clone(),
            properties,
            children,
            versionable: node.mixins.iter().any(|m| m == VERSIONABLE_MIXIN)
                || !node.versions.is_empty(),
        })
    }

    /// Remove a node and its subtree; detaches it from its parent.
    fn remove_subtree(&mut self, id: &str) -> RepoResult<()> {
        let node = self.node(id)?;
        if node.parent.is_none() && node.id.is_empty() {
            return Err(RepoError::Backend("cannot remove the root node".into()));
        }
        let parent = node.parent.clone();
        let mut pending = vec![id.to_string()];
        while let Some(next) = pending.pop() {
            if let Some(removed) = self.nodes.remove(&next) {
                pending.extend(removed.children);
            }
        }
        if let Some(parent_id) = parent {
            if let Some(parent) = self.nodes.get_mut(&parent_id) {
                parent.children.retain(|c| c != id);
            }
        }
        Ok(())
    }

    fn apply_properties(&mut self, id: &str, writes: Vec<PropertyWrite>) -> RepoResult<()> {
        for write in writes {
            self.write_property(id, write)?;
        }
        Ok(())
    }

    fn write_property(&mut self, id: &str, write: PropertyWrite) -> RepoResult<(PropertyData, bool)> {
        let node = self.node_mut(id)?;
        let ptype = write.ptype.unwrap_or_else(|| match &write.value {
            PropertyValue::Single(v) => PropertyType::infer(v),
            PropertyValue::Multiple(vs) => {
                vs.first().map(PropertyType::infer).unwrap_or(PropertyType::String)
            }
        });
        let existed = node
            .properties
            .insert(
                write.name.clone(),
                StoredProperty {
                    ptype,
                    value: write.value.clone(),
                },
            )
            .is_some();
        Ok((
            PropertyData {
                name: write.name,
                ptype,
                value: write.value,
            },
            existed,
        ))
    }
}

/// Parse the repository's `name[index]` addressing form.
fn parse_item_name(segment: &str) -> (&str, u32) {
    if let Some(open) = segment.rfind('[') {
        if let Some(stripped) = segment.strip_suffix(']') {
            if let Ok(index) = stripped[open + 1..].parse::<u32>() {
                return (&segment[..open], index.max(1));
            }
        }
    }
    (segment, 1)
}

#[derive(Default)]
struct Shared {
    workspaces: RwLock<HashMap<String, WorkspaceState>>,
    types: RwLock<HashMap<String, NodeTypeData>>,
    live_sessions: AtomicUsize,
}

pub struct MemoryRepository {
    shared: Arc<Shared>,
}

impl MemoryRepository {
    /// An empty repository with a `default` workspace holding only the root.
    pub fn new() -> Self {
        let repo = Self {
            shared: Arc::new(Shared::default()),
        };
        repo.add_workspace("default");
        repo.register_type(NodeTypeData {
            name: ROOT_TYPE.to_string(),
            property_definitions: Vec::new(),
            mixin: false,
        });
        repo.register_type(NodeTypeData {
            name: UNSTRUCTURED_TYPE.to_string(),
            property_definitions: Vec::new(),
            mixin: false,
        });
        repo.register_type(NodeTypeData {
            name: VERSIONABLE_MIXIN.to_string(),
            property_definitions: Vec::new(),
            mixin: true,
        });
        repo
    }

    pub fn add_workspace(&self, name: &str) {
        self.shared
            .workspaces
            .write()
            .entry(name.to_string())
            .or_insert_with(WorkspaceState::new);
    }

    pub fn register_type(&self, node_type: NodeTypeData) {
        self.shared
            .types
            .write()
            .insert(node_type.name.clone(), node_type);
    }

    pub fn live_sessions(&self) -> usize {
        self.shared.live_sessions.load(Ordering::SeqCst)
    }

    /// Seed a node under `parent_path`. Setup-time API for demos and tests.
    pub fn seed_node(
        &self,
        workspace: &str,
        parent_path: &str,
        name: &str,
        primary_type: &str,
        properties: Vec<PropertyWrite>,
    ) -> RepoResult<String> {
        let mut workspaces = self.shared.workspaces.write();
        let state = workspaces
            .get_mut(workspace)
            .ok_or_else(|| RepoError::NotFound(format!("workspace '{workspace}'")))?;
        let parent_id = state.resolve_path(parent_path)?.id.clone();
        let id = uuid::Uuid::new_v4().to_string();
        state.nodes.insert(
            id.clone(),
            StoredNode {
                id: id.clone(),
                parent: Some(parent_id.clone()),
                name: name.to_string(),
                primary_type: primary_type.to_string(),
                mixins: Vec::new(),
                properties: BTreeMap::new(),
                children: Vec::new(),
                versions: Vec::new(),
                frozen: false,
            },
        );
        state.node_mut(&parent_id)?.children.push(id.clone());
        state.apply_properties(&id, properties)?;
        Ok(id)
    }

    pub fn seed_mixin(&self, workspace: &str, path: &str, mixin: &str) -> RepoResult<()> {
        let mut workspaces = self.shared.workspaces.write();
        let state = workspaces
            .get_mut(workspace)
            .ok_or_else(|| RepoError::NotFound(format!("workspace '{workspace}'")))?;
        let id = state.resolve_path(path)?.id.clone();
        let node = state.node_mut(&id)?;
        if !node.mixins.iter().any(|m| m == mixin) {
            node.mixins.push(mixin.to_string());
        }
        Ok(())
    }

    /// Seed a version: snapshots the node's current state as a frozen node
    /// and appends it to the linear history.
    pub fn seed_version(&self, workspace: &str, path: &str, name: &str) -> RepoResult<()> {
        let mut workspaces = self.shared.workspaces.write();
        let state = workspaces
            .get_mut(workspace)
            .ok_or_else(|| RepoError::NotFound(format!("workspace '{workspace}'")))?;
        let id = state.resolve_path(path)?.id.clone();
        let frozen_id = uuid::Uuid::new_v4().to_string();
        let source = state.node(&id)?;
        let mut frozen = source.clone();
        frozen.id = frozen_id.clone();
        frozen.parent = None;
        frozen.children = Vec::new();
        frozen.versions = Vec::new();
        frozen.frozen = true;
        state.nodes.insert(frozen_id.clone(), frozen);
        let node = state.node_mut(&id)?;
        node.versions.push(StoredVersion {
            name: name.to_string(),
            created: Utc::now(),
            frozen_id,
        });
        if !node.mixins.iter().any(|m| m == VERSIONABLE_MIXIN) {
            node.mixins.push(VERSIONABLE_MIXIN.to_string());
        }
        Ok(())
    }
}

impl Default for MemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn login(&self, workspace: &str, locale: &str) -> RepoResult<Box<dyn Session>> {
        let working = {
            let workspaces = self.shared.workspaces.read();
            workspaces
                .get(workspace)
                .cloned()
                .ok_or_else(|| RepoError::NotFound(format!("workspace '{workspace}'")))?
        };
        self.shared.live_sessions.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(workspace, locale, "session opened");
        Ok(Box::new(MemorySession {
            shared: Arc::clone(&self.shared),
            workspace: workspace.to_string(),
            locale: locale.to_string(),
            working: RwLock::new(working),
            closed: AtomicBool::new(false),
        }))
    }
}

pub struct MemorySession {
    shared: Arc<Shared>,
    workspace: String,
    locale: String,
    working: RwLock<WorkspaceState>,
    closed: AtomicBool,
}

impl MemorySession {
    fn guard(&self) -> RepoResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(RepoError::Backend("session is closed".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl Session for MemorySession {
    fn workspace(&self) -> &str {
        &self.workspace
    }

    fn locale(&self) -> &str {
        &self.locale
    }

    async fn root(&self) -> RepoResult<NodeData> {
        self.guard()?;
        self.working.read().node_data("")
    }

    async fn node_by_id(&self, id: &str) -> RepoResult<NodeData> {
        self.guard()?;
        self.working.read().node_data(id)
    }

    async fn node_by_path(&self, path: &str) -> RepoResult<NodeData> {
        self.guard()?;
        let working = self.working.read();
        let id = working.resolve_path(path)?.id.clone();
        working.node_data(&id)
    }

    async fn node_type(&self, name: &str) -> RepoResult<Option<NodeTypeData>> {
        self.guard()?;
        Ok(self.shared.types.read().get(name).cloned())
    }

    async fn set_property(
        &self,
        node_id: &str,
        write: PropertyWrite,
    ) -> RepoResult<(PropertyData, bool)> {
        self.guard()?;
        self.working.write().write_property(node_id, write)
    }

    async fn remove_property(&self, node_id: &str, name: &str) -> RepoResult<()> {
        self.guard()?;
        let mut working = self.working.write();
        let node = working.node_mut(node_id)?;
        node.properties
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| RepoError::NotFound(format!("property '{name}'")))
    }

    async fn add_mixin(&self, node_id: &str, mixin: &str) -> RepoResult<bool> {
        self.guard()?;
        let mut working = self.working.write();
        let node = working.node_mut(node_id)?;
        if node.mixins.iter().any(|m| m == mixin) {
            Ok(true)
        } else {
            node.mixins.push(mixin.to_string());
            Ok(false)
        }
    }

    async fn remove_mixin(&self, node_id: &str, mixin: &str) -> RepoResult<()> {
        self.guard()?;
        let mut working = self.working.write();
        let node = working.node_mut(node_id)?;
        let before = node.mixins.len();
        node.mixins.retain(|m| m != mixin);
        if node.mixins.len() == before {
            return Err(RepoError::NotFound(format!("mixin '{mixin}'")));
        }
        Ok(())
    }

    async fn create_child(
        &self,
        node_id: &str,
        name: &str,
        primary_type: Option<&str>,
        properties: Vec<PropertyWrite>,
    ) -> RepoResult<(NodeData, bool)> {
        self.guard()?;
        let mut working = self.working.write();
        let (plain_name, index) = parse_item_name(name);
        let existing = {
            let node = working.node(node_id)?;
            let mut seen = 0;
            let mut found = None;
            for child_id in &node.children {
                if working.node(child_id)?.name == plain_name {
                    seen += 1;
                    if seen == index {
                        found = Some(child_id.clone());
                        break;
                    }
                }
            }
            found
        };
        if let Some(child_id) = existing {
            if let Some(t) = primary_type {
                working.node_mut(&child_id)?.primary_type = t.to_string();
            }
            working.apply_properties(&child_id, properties)?;
            return Ok((working.node_data(&child_id)?, true));
        }
        if index > 1 {
            return Err(RepoError::NotFound(format!("child '{name}'")));
        }
        let id = uuid::Uuid::new_v4().to_string();
        working.nodes.insert(
            id.clone(),
            StoredNode {
                id: id.clone(),
                parent: Some(node_id.to_string()),
                name: plain_name.to_string(),
                primary_type: primary_type.unwrap_or(UNSTRUCTURED_TYPE).to_string(),
                mixins: Vec::new(),
                properties: BTreeMap::new(),
                children: Vec::new(),
                versions: Vec::new(),
                frozen: false,
            },
        );
        working.node_mut(node_id)?.children.push(id.clone());
        working.apply_properties(&id, properties)?;
        Ok((working.node_data(&id)?, false))
    }

    async fn remove_child(&self, node_id: &str, name: &str) -> RepoResult<()> {
        self.guard()?;
        let mut working = self.working.write();
        let (plain_name, index) = parse_item_name(name);
        let child_id = {
            let node = working.node(node_id)?;
            let mut seen = 0;
            let mut found = None;
            for child_id in &node.children {
                if working.node(child_id)?.name == plain_name {
                    seen += 1;
                    if seen == index {
                        found = Some(child_id.clone());
                        break;
                    }
                }
            }
            found.ok_or_else(|| RepoError::NotFound(format!("child '{name}'")))?
        };
        working.remove_subtree(&child_id)
    }

    async fn apply_node(
        &self,
        node_id: &str,
        properties: Vec<PropertyWrite>,
        mixins: Vec<String>,
    ) -> RepoResult<NodeData> {
        self.guard()?;
        let mut working = self.working.write();
        working.apply_properties(node_id, properties)?;
        let node = working.node_mut(node_id)?;
        for mixin in mixins {
            if !node.mixins.iter().any(|m| *m == mixin) {
                node.mixins.push(mixin);
            }
        }
        working.node_data(node_id)
    }

    async fn remove_node(&self, node_id: &str) -> RepoResult<()> {
        self.guard()?;
        self.working.write().remove_subtree(node_id)
    }

    async fn rename_node(&self, node_id: &str, new_name: &str) -> RepoResult<NodeData> {
        self.guard()?;
        let mut working = self.working.write();
        let node = working.node_mut(node_id)?;
        if node.parent.is_none() {
            return Err(RepoError::Backend("cannot rename the root node".into()));
        }
        node.name = new_name.to_string();
        working.node_data(node_id)
    }

    async fn version_history(&self, node_id: &str) -> RepoResult<Vec<VersionData>> {
        self.guard()?;
        let working = self.working.read();
        let node = working.node(node_id)?;
        Ok(node
            .versions
            .iter()
            .map(|v| VersionData {
                name: v.name.clone(),
                created: v.created,
                frozen_id: v.frozen_id.clone(),
            })
            .collect())
    }

    async fn query_by_type(
        &self,
        type_name: &str,
        name_contains: Option<&str>,
        order: QueryOrder,
        limit: usize,
        offset: usize,
    ) -> RepoResult<Vec<NodeData>> {
        self.guard()?;
        let working = self.working.read();
        let mut matches: Vec<NodeData> = Vec::new();
        for node in working.nodes.values() {
            if node.frozen {
                continue;
            }
            if node.primary_type != type_name && !node.mixins.iter().any(|m| m == type_name) {
                continue;
            }
            if let Some(fragment) = name_contains {
                if !node.name.contains(fragment) {
                    continue;
                }
            }
            matches.push(working.node_data(&node.id)?);
        }
        match order {
            QueryOrder::Name => matches.sort_by(|a, b| a.name.cmp(&b.name)),
            QueryOrder::Path => matches.sort_by(|a, b| a.path.cmp(&b.path)),
        }
        Ok(matches.into_iter().skip(offset).take(limit).collect())
    }

    async fn save(&self) -> RepoResult<()> {
        self.guard()?;
        let snapshot = self.working.read().clone();
        self.shared
            .workspaces
            .write()
            .insert(self.workspace.clone(), snapshot);
        tracing::debug!(workspace = %self.workspace, "session saved");
        Ok(())
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.shared.live_sessions.fetch_sub(1, Ordering::SeqCst);
            tracing::debug!(workspace = %self.workspace, "session closed");
        }
    }

    fn is_live(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        self.close();
    }
}
