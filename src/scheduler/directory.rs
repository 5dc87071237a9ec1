use std::collections::{HashSet, VecDeque};

use serde::Serialize;

use crate::error::{HarvestError, Result};
use crate::fleet::{Fleet, TargetTelemetry};

/// A node reached during discovery.
#[derive(Debug, Clone, Serialize)]
pub struct Node {
    pub hostname: String,
    /// Hops from the root
    pub depth: usize,
    pub parent: Option<String>,
    pub max_capacity: f64,
    pub owned: bool,
    pub root_access: bool,
    pub telemetry: Option<TargetTelemetry>,
}

impl Node {
    pub fn resource_ceiling(&self) -> f64 {
        self.telemetry.map(|t| t.max_resource).unwrap_or(0.0)
    }
}

/// Nodes reachable from a root, in breadth-first order.
#[derive(Debug, Clone, Serialize)]
pub struct Topology {
    pub root: String,
    pub nodes: Vec<Node>,
}

impl Topology {
    /// Walk the adjacency graph breadth-first from `root`, visiting each node once.
    pub fn discover<F: Fleet + ?Sized>(fleet: &F, root: &str) -> Result<Self> {
        // Surfaces an unknown root as a caller error before traversal
        fleet.node_info(root)?;

        let mut visited: HashSet<String> = HashSet::from([root.to_string()]);
        let mut queue: VecDeque<(String, usize, Option<String>)> =
            VecDeque::from([(root.to_string(), 0, None)]);
        let mut nodes = Vec::new();

        while let Some((hostname, depth, parent)) = queue.pop_front() {
            let info = fleet.node_info(&hostname)?;
            let telemetry = match fleet.telemetry(&hostname) {
                Ok(telemetry) => telemetry,
                Err(e) => {
                    tracing::debug!(host = %hostname, error = %e, "Telemetry unavailable");
                    None
                }
            };

            for neighbor in fleet.neighbors(&hostname)? {
                if visited.insert(neighbor.clone()) {
                    queue.push_back((neighbor, depth + 1, Some(hostname.clone())));
                }
            }

            nodes.push(Node {
                root_access: fleet.has_root(&hostname),
                hostname,
                depth,
                parent,
                max_capacity: info.max_capacity,
                owned: info.owned,
                telemetry,
            });
        }

        tracing::debug!(root, nodes = nodes.len(), "Topology discovered");

        Ok(Self {
            root: root.to_string(),
            nodes,
        })
    }

    pub fn get(&self, hostname: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.hostname == hostname)
    }

    /// Record root access gained after discovery.
    pub fn grant_root(&mut self, hostname: &str) -> Result<()> {
        let node = self
            .nodes
            .iter_mut()
            .find(|n| n.hostname == hostname)
            .ok_or_else(|| HarvestError::UnknownNode(hostname.to_string()))?;
        node.root_access = true;
        Ok(())
    }

    /// Nodes holding harvestable resource. Owned nodes and the root never qualify.
    pub fn targets(&self) -> Vec<&Node> {
        self.nodes
            .iter()
            .filter(|n| n.resource_ceiling() > 0.0 && !n.owned && n.hostname != self.root)
            .collect()
    }

    /// Nodes that can host jobs, in directory order.
    pub fn runners(&self, exclude_root: bool) -> Vec<&Node> {
        self.nodes
            .iter()
            .filter(|n| n.max_capacity > 0.0 && n.root_access)
            .filter(|n| !(exclude_root && n.hostname == self.root))
            .collect()
    }

    /// Reachable nodes still lacking root access.
    pub fn locked_nodes(&self) -> Vec<&Node> {
        self.nodes.iter().filter(|n| !n.root_access).collect()
    }
}
