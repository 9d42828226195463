//! Typed, acyclic connections between the tools of one step.

use core::fmt;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};
use vt_tools::{ConnectionType, ToolId};

/// `source` feeds `target` with one facet of its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ToolConnection {
    pub source: ToolId,
    pub target: ToolId,
    pub kind: ConnectionType,
}

impl ToolConnection {
    pub fn new(source: ToolId, target: ToolId, kind: ConnectionType) -> Self {
        Self { source, target, kind }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    SelfConnection(ToolId),
    DuplicateConnection(ToolConnection),
    UnknownTool(ToolId),
    DuplicateTool(ToolId),
    /// Tools on the cycle, in edge order.
    Cycle(Vec<ToolId>),
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SelfConnection(id) => write!(f, "tool {id} cannot be connected to itself"),
            Self::DuplicateConnection(c) => write!(
                f,
                "{} connection {} -> {} already exists",
                c.kind, c.source, c.target
            ),
            Self::UnknownTool(id) => write!(f, "unknown tool {id}"),
            Self::DuplicateTool(id) => write!(f, "tool {id} already exists"),
            Self::Cycle(ids) => {
                let list: Vec<String> = ids.iter().map(ToString::to_string).collect();
                write!(f, "connection cycle through tools {}", list.join(" -> "))
            }
        }
    }
}

impl std::error::Error for GraphError {}

/// Tools keyed by id with their execution `sequence`, plus the edge set.
///
/// Every mutation keeps the graph acyclic, so a cycle can only surface
/// from [`ToolGraph::topological_order`] on a graph that was never built
/// through this API.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolGraph {
    nodes: BTreeMap<ToolId, i32>,
    edges: Vec<ToolConnection>,
}

impl ToolGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_tool(&mut self, id: ToolId, sequence: i32) -> Result<(), GraphError> {
        if self.nodes.contains_key(&id) {
            return Err(GraphError::DuplicateTool(id));
        }
        self.nodes.insert(id, sequence);
        Ok(())
    }

    pub fn set_sequence(&mut self, id: ToolId, sequence: i32) -> Result<(), GraphError> {
        let slot = self.nodes.get_mut(&id).ok_or(GraphError::UnknownTool(id))?;
        *slot = sequence;
        Ok(())
    }

    /// Removes `id` and every connection touching it; returns those
    /// connections.
    pub fn remove_tool(&mut self, id: ToolId) -> Vec<ToolConnection> {
        if self.nodes.remove(&id).is_none() {
            return Vec::new();
        }
        let (removed, kept): (Vec<_>, Vec<_>) = self
            .edges
            .drain(..)
            .partition(|c| c.source == id || c.target == id);
        self.edges = kept;
        removed
    }

    pub fn contains(&self, id: ToolId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn sequence(&self, id: ToolId) -> Option<i32> {
        self.nodes.get(&id).copied()
    }

    pub fn tool_ids(&self) -> impl Iterator<Item = ToolId> + '_ {
        self.nodes.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn add_connection(&mut self, c: ToolConnection) -> Result<(), GraphError> {
        if c.source == c.target {
            return Err(GraphError::SelfConnection(c.source));
        }
        for id in [c.source, c.target] {
            if !self.contains(id) {
                return Err(GraphError::UnknownTool(id));
            }
        }
        if self.edges.contains(&c) {
            return Err(GraphError::DuplicateConnection(c));
        }
        if let Some(mut path) = self.path(c.target, c.source) {
            // target ->...-> source, closed by the new edge.
            path.push(c.target);
            return Err(GraphError::Cycle(path));
        }
        self.edges.push(c);
        Ok(())
    }

    pub fn remove_connection(&mut self, c: &ToolConnection) -> bool {
        let before = self.edges.len();
        self.edges.retain(|e| e != c);
        self.edges.len() != before
    }

    pub fn connections(&self) -> &[ToolConnection] {
        &self.edges
    }

    pub fn connections_into(&self, id: ToolId) -> impl Iterator<Item = &ToolConnection> + '_ {
        self.edges.iter().filter(move |c| c.target == id)
    }

    pub fn connections_from(&self, id: ToolId) -> impl Iterator<Item = &ToolConnection> + '_ {
        self.edges.iter().filter(move |c| c.source == id)
    }

    /// Shortest chain of tools `from ->...-> to` along existing edges.
    fn path(&self, from: ToolId, to: ToolId) -> Option<Vec<ToolId>> {
        let mut parent: BTreeMap<ToolId, ToolId> = BTreeMap::new();
        let mut queue = VecDeque::from([from]);
        let mut seen = BTreeSet::from([from]);
        while let Some(id) = queue.pop_front() {
            if id == to {
                let mut path = vec![to];
                let mut cur = to;
                while let Some(&p) = parent.get(&cur) {
                    path.push(p);
                    cur = p;
                }
                path.reverse();
                return Some(path);
            }
            for c in self.connections_from(id) {
                if seen.insert(c.target) {
                    parent.insert(c.target, id);
                    queue.push_back(c.target);
                }
            }
        }
        None
    }

    /// Kahn's algorithm over the tools accepted by `enabled`, ignoring
    /// edges that touch any other tool. Among ready tools the lowest
    /// `(sequence, id)` runs first.
    pub fn topological_order(&self, enabled: impl Fn(ToolId) -> bool) -> Result<Vec<ToolId>, GraphError> {
        let active: BTreeSet<ToolId> = self.nodes.keys().copied().filter(|&id| enabled(id)).collect();
        let live: Vec<&ToolConnection> = self
            .edges
            .iter()
            .filter(|c| active.contains(&c.source) && active.contains(&c.target))
            .collect();

        let mut in_degree: BTreeMap<ToolId, usize> = active.iter().map(|&id| (id, 0)).collect();
        for c in &live {
            *in_degree.entry(c.target).or_default() += 1;
        }

        let key = |id: ToolId| (self.nodes.get(&id).copied().unwrap_or_default(), id);
        let mut ready: BTreeSet<(i32, ToolId)> = in_degree
            .iter()
            .filter(|&(_, &d)| d == 0)
            .map(|(&id, _)| key(id))
            .collect();

        let mut order = Vec::with_capacity(active.len());
        while let Some((_, id)) = ready.pop_first() {
            order.push(id);
            for c in live.iter().filter(|c| c.source == id) {
                if let Some(d) = in_degree.get_mut(&c.target) {
                    *d -= 1;
                    if *d == 0 {
                        ready.insert(key(c.target));
                    }
                }
            }
        }

        if order.len() < active.len() {
            let stuck: Vec<ToolId> = in_degree
                .into_iter()
                .filter(|&(_, d)| d > 0)
                .map(|(id, _)| id)
                .collect();
            return Err(GraphError::Cycle(stuck));
        }
        Ok(order)
    }

    #[cfg(test)]
    fn push_unchecked(&mut self, c: ToolConnection) {
        self.edges.push(c);
    }
}
