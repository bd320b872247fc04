//! FlowGraph - node dependency graph
//!
//! - Arc<str> node keys, FxHashMap adjacency, SmallVec edge lists
//! - Edges come from `ref` bindings and explicit ordering edges
//! - Cycle detection with DFS three-color marking
//! - Deterministic topological order (Kahn, declaration order on ties)

use std::collections::VecDeque;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::error::{FlowError, Result};

use super::workflow::WorkflowSchema;

/// Stack-allocated edge list: most nodes have 0-4 neighbours
pub type DepVec = SmallVec<[Arc<str>; 4]>;

pub struct FlowGraph {
    /// node -> downstream nodes
    adjacency: FxHashMap<Arc<str>, DepVec>,
    /// node -> upstream nodes
    predecessors: FxHashMap<Arc<str>, DepVec>,
    /// Declaration order
    node_ids: Vec<Arc<str>>,
}

impl FlowGraph {
    /// Build from a schema whose references were already validated
    pub fn from_schema(schema: &WorkflowSchema) -> Self {
        let capacity = schema.nodes.len();
        let mut graph = Self {
            adjacency: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            predecessors: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            node_ids: Vec::with_capacity(capacity),
        };

        for node in &schema.nodes {
            let id: Arc<str> = Arc::from(node.key.as_str());
            graph.node_ids.push(Arc::clone(&id));
            graph.adjacency.insert(Arc::clone(&id), DepVec::new());
            graph.predecessors.insert(id, DepVec::new());
        }

        for node in &schema.nodes {
            for reference in node.inputs.iter().filter_map(|f| f.as_reference()) {
                graph.add_edge(&reference.from_node, &node.key);
            }
        }
        for edge in &schema.edges {
            graph.add_edge(&edge.from, &edge.to);
        }

        graph
    }

    fn add_edge(&mut self, from: &str, to: &str) {
        let (Some(from), Some(to)) = (self.key(from), self.key(to)) else {
            return;
        };
        let successors = self.adjacency.entry(Arc::clone(&from)).or_default();
        if successors.contains(&to) {
            return;
        }
        successors.push(Arc::clone(&to));
        self.predecessors.entry(to).or_default().push(from);
    }

    /// Shared key for `id`, if the node exists
    fn key(&self, id: &str) -> Option<Arc<str>> {
        self.adjacency.get_key_value(id).map(|(k, _)| Arc::clone(k))
    }

    #[inline]
    pub fn get_dependencies(&self, node: &str) -> &[Arc<str>] {
        static EMPTY: &[Arc<str>] = &[];
        self.predecessors.get(node).map_or(EMPTY, SmallVec::as_slice)
    }

    #[inline]
    pub fn get_successors(&self, node: &str) -> &[Arc<str>] {
        static EMPTY: &[Arc<str>] = &[];
        self.adjacency.get(node).map_or(EMPTY, SmallVec::as_slice)
    }

    pub fn contains(&self, node: &str) -> bool {
        self.adjacency.contains_key(node)
    }

    /// Nodes without successors, in declaration order
    pub fn get_final_nodes(&self) -> Vec<Arc<str>> {
        self.node_ids
            .iter()
            .filter(|id| self.get_successors(id).is_empty())
            .cloned()
            .collect()
    }

    /// Fail with the cycle path if the graph is not a DAG
    ///
    /// White: unvisited, Gray: on the DFS stack, Black: done.
    /// Reaching a Gray node closes a cycle.
    pub fn detect_cycles(&self) -> Result<()> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Color {
            White,
            Gray,
            Black,
        }

        fn dfs(
            node: &Arc<str>,
            adjacency: &FxHashMap<Arc<str>, DepVec>,
            colors: &mut FxHashMap<Arc<str>, Color>,
            stack: &mut Vec<Arc<str>>,
        ) -> std::result::Result<(), String> {
            colors.insert(Arc::clone(node), Color::Gray);
            stack.push(Arc::clone(node));

            for neighbor in adjacency.get(node).into_iter().flatten() {
                match colors.get(neighbor) {
                    Some(Color::Gray) => {
                        let start = stack.iter().position(|x| x == neighbor).unwrap_or(0);
                        let cycle: Vec<&str> = stack[start..].iter().map(|s| s.as_ref()).collect();
                        return Err(format!("{} → {}", cycle.join(" → "), neighbor));
                    }
                    Some(Color::White) | None => dfs(neighbor, adjacency, colors, stack)?,
                    Some(Color::Black) => {}
                }
            }

            stack.pop();
            colors.insert(Arc::clone(node), Color::Black);
            Ok(())
        }

        let mut colors: FxHashMap<Arc<str>, Color> = self
            .node_ids
            .iter()
            .map(|id| (Arc::clone(id), Color::White))
            .collect();
        let mut stack = Vec::new();

        for id in &self.node_ids {
            if colors.get(id) == Some(&Color::White) {
                dfs(id, &self.adjacency, &mut colors, &mut stack)
                    .map_err(|nodes| FlowError::CycleDetected { nodes })?;
            }
        }
        Ok(())
    }

    /// Every node after all of its upstream nodes
    pub fn topological_order(&self) -> Result<Vec<Arc<str>>> {
        self.detect_cycles()?;

        let mut in_degree: FxHashMap<&str, usize> = self
            .node_ids
            .iter()
            .map(|id| (id.as_ref(), self.get_dependencies(id).len()))
            .collect();
        let mut ready: VecDeque<&Arc<str>> = self
            .node_ids
            .iter()
            .filter(|id| in_degree[id.as_ref()] == 0)
            .collect();
        let mut order = Vec::with_capacity(self.node_ids.len());

        while let Some(id) = ready.pop_front() {
            order.push(Arc::clone(id));
            for next in self.get_successors(id) {
                if let Some(degree) = in_degree.get_mut(next.as_ref()) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push_back(next);
                    }
                }
            }
        }

        Ok(order)
    }
}
