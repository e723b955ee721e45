use graphcore::{GraphError, Node};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::HashMap;

/// Dependency graph over one node set.
///
/// Edges point from a dependency to its dependent. Node indices follow the
/// order nodes were supplied in.
pub struct DependencyGraph {
    graph: DiGraph<String, ()>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnStack,
    Done,
}

impl DependencyGraph {
    /// Build the graph, rejecting duplicate names and dangling dependencies
    pub fn build(nodes: &[Node]) -> Result<Self, GraphError> {
        let mut graph = DiGraph::new();
        let mut index: HashMap<String, NodeIndex> = HashMap::new();

        for node in nodes {
            if index.contains_key(node.name()) {
                return Err(GraphError::DuplicateNode(node.name().to_string()));
            }
            let idx = graph.add_node(node.name().to_string());
            index.insert(node.name().to_string(), idx);
        }

        for node in nodes {
            let to = index[node.name()];
            for dep in node.dependencies() {
                let from = index
                    .get(dep.as_str())
                    .ok_or_else(|| GraphError::UnknownDependency {
                        node: node.name().to_string(),
                        dependency: dep.clone(),
                    })?;
                graph.update_edge(*from, to, ());
            }
        }

        Ok(Self { graph })
    }

    /// Depth-first walk along dependency edges. Reports the first node
    /// reached while it is still on the walk's stack.
    pub fn check_acyclic(&self) -> Result<(), GraphError> {
        let mut marks = vec![Mark::Unvisited; self.graph.node_count()];

        for start in self.graph.node_indices() {
            if marks[start.index()] != Mark::Unvisited {
                continue;
            }

            marks[start.index()] = Mark::OnStack;
            let mut stack = vec![(start, self.graph.neighbors_directed(start, Direction::Incoming))];

            while !stack.is_empty() {
                let next = stack.last_mut().and_then(|(_, deps)| deps.next());
                match next {
                    Some(dep) => match marks[dep.index()] {
                        Mark::OnStack => {
                            return Err(GraphError::CycleDetected {
                                node: self.graph[dep].clone(),
                            });
                        }
                        Mark::Unvisited => {
                            marks[dep.index()] = Mark::OnStack;
                            stack.push((dep, self.graph.neighbors_directed(dep, Direction::Incoming)));
                        }
                        Mark::Done => {}
                    },
                    None => {
                        if let Some((done, _)) = stack.pop() {
                            marks[done.index()] = Mark::Done;
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Peel the graph into topological generations.
    ///
    /// Every node lands in a strictly later level than all of its
    /// dependencies. Within a level, nodes keep their input order.
    pub fn levels(&self) -> Result<Vec<Vec<String>>, GraphError> {
        let mut in_degree: Vec<usize> = self
            .graph
            .node_indices()
            .map(|idx| self.graph.neighbors_directed(idx, Direction::Incoming).count())
            .collect();

        let mut ready: Vec<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|idx| in_degree[idx.index()] == 0)
            .collect();

        let mut levels = Vec::new();
        let mut placed = 0;

        while !ready.is_empty() {
            ready.sort();
            let mut next = Vec::new();

            for &idx in &ready {
                for dependent in self.graph.neighbors_directed(idx, Direction::Outgoing) {
                    let degree = &mut in_degree[dependent.index()];
                    *degree -= 1;
                    if *degree == 0 {
                        next.push(dependent);
                    }
                }
            }

            placed += ready.len();
            levels.push(ready.iter().map(|idx| self.graph[*idx].clone()).collect());
            ready = next;
        }

        if placed < self.graph.node_count() {
            let stuck = self
                .graph
                .node_indices()
                .find(|idx| in_degree[idx.index()] > 0)
                .map(|idx| self.graph[idx].clone())
                .unwrap_or_default();
            return Err(GraphError::CycleDetected { node: stuck });
        }

        Ok(levels)
    }
}

/// Check names, references and acyclicity of a node set without running it
pub fn validate(nodes: &[Node]) -> Result<(), GraphError> {
    DependencyGraph::build(nodes)?.check_acyclic()
}

/// Validate, then group the node set into ordered levels
pub fn topological_groups(nodes: &[Node]) -> Result<Vec<Vec<String>>, GraphError> {
    let graph = DependencyGraph::build(nodes)?;
    graph.check_acyclic()?;
    graph.levels()
}
