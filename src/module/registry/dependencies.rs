//! Module dependency resolution
//!
//! Builds a directed graph over module descriptors and computes a safe
//! load order: dependencies first, ties broken by discovery order. Modules
//! with a missing hard dependency, modules on a hard-dependency cycle, and
//! everything downstream of either are rejected; the rest of the graph is
//! unaffected.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::module::traits::{ModuleDescriptor, ModuleError};

/// Dependency resolution result
#[derive(Debug, Clone, Default)]
pub struct DependencyResolution {
    /// Loadable modules in order (dependencies first)
    pub load_order: Vec<String>,
    /// Modules that cannot be loaded, in discovery order
    pub rejected: Vec<(String, ModuleError)>,
}

impl DependencyResolution {
    /// Rejection reason for a module, if any
    pub fn rejection(&self, id: &str) -> Option<&ModuleError> {
        self.rejected
            .iter()
            .find(|(rejected, _)| rejected == id)
            .map(|(_, e)| e)
    }

    /// Unload order (dependents first)
    pub fn reverse_order(&self) -> Vec<String> {
        self.load_order.iter().rev().cloned().collect()
    }
}

/// Directed graph over descriptors
///
/// Nodes keep discovery order; edges point from a module to its
/// dependencies. Rebuilt for every bulk operation.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: Vec<Arc<ModuleDescriptor>>,
    index: HashMap<String, usize>,
    duplicates: Vec<String>,
}

impl DependencyGraph {
    /// Build a graph; later descriptors reusing an id are recorded as duplicates
    pub fn new<I>(descriptors: I) -> Self
    where
        I: IntoIterator<Item = Arc<ModuleDescriptor>>,
    {
        let mut graph = Self::default();
        for descriptor in descriptors {
            if graph.index.contains_key(&descriptor.id) {
                warn!("Duplicate module id {} ignored", descriptor.id);
                graph.duplicates.push(descriptor.id.clone());
                continue;
            }
            graph
                .index
                .insert(descriptor.id.clone(), graph.nodes.len());
            graph.nodes.push(descriptor);
        }
        graph
    }

    /// Number of distinct modules
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True if the graph has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Check whether a module id is part of the graph
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Ids that appeared more than once in the input
    pub fn duplicates(&self) -> &[String] {
        &self.duplicates
    }

    /// Modules that declare `id` as a hard dependency, in discovery order
    pub fn hard_dependents(&self, id: &str) -> Vec<String> {
        self.nodes
            .iter()
            .filter(|n| n.hard_depends_on(id))
            .map(|n| n.id.clone())
            .collect()
    }

    /// Resolve the graph into a load order and a set of rejections
    pub fn resolve(&self) -> DependencyResolution {
        let n = self.nodes.len();
        let mut rejected: Vec<Option<ModuleError>> = vec![None; n];

        // Missing hard dependencies
        for (i, node) in self.nodes.iter().enumerate() {
            if let Some(dep) = node
                .hard_dependencies
                .iter()
                .find(|d| !self.index.contains_key(d.as_str()))
            {
                rejected[i] = Some(ModuleError::DependencyMissing {
                    id: node.id.clone(),
                    dependency: dep.clone(),
                });
            }
        }

        // Hard-dependency cycles
        for component in self.cyclic_components() {
            let cycle: Vec<String> = component
                .iter()
                .map(|&i| self.nodes[i].id.clone())
                .collect();
            for &i in &component {
                if rejected[i].is_none() {
                    rejected[i] = Some(ModuleError::CircularDependency {
                        id: self.nodes[i].id.clone(),
                        cycle: cycle.clone(),
                    });
                }
            }
        }

        // Forward propagation to dependents
        loop {
            let mut changed = false;
            for (i, node) in self.nodes.iter().enumerate() {
                if rejected[i].is_some() {
                    continue;
                }
                let failed = node
                    .hard_dependencies
                    .iter()
                    .filter_map(|d| self.index.get(d.as_str()))
                    .find(|&&j| rejected[j].is_some());
                if let Some(&j) = failed {
                    rejected[i] = Some(ModuleError::DependencyFailed {
                        id: node.id.clone(),
                        dependency: self.nodes[j].id.clone(),
                    });
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        let load_order = self.ordered(&rejected);

        let mut rejections: Vec<(String, ModuleError)> = rejected
            .into_iter()
            .enumerate()
            .filter_map(|(i, r)| r.map(|e| (self.nodes[i].id.clone(), e)))
            .collect();
        for dup in &self.duplicates {
            rejections.push((dup.clone(), ModuleError::DuplicateModule(dup.clone())));
        }

        debug!(
            "Dependency resolution complete: order={:?}, rejected={}",
            load_order,
            rejections.len()
        );

        DependencyResolution {
            load_order,
            rejected: rejections,
        }
    }

    /// Stable topological order over the accepted nodes
    ///
    /// Hard and soft edges both constrain the order. Soft edges are dropped
    /// when they alone would deadlock the sort.
    fn ordered(&self, rejected: &[Option<ModuleError>]) -> Vec<String> {
        let n = self.nodes.len();
        let accepted = |i: usize| rejected[i].is_none();

        let mut hard_pending = vec![0usize; n];
        let mut soft_pending = vec![0usize; n];
        let mut hard_rev: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut soft_rev: Vec<Vec<usize>> = vec![Vec::new(); n];

        for (i, node) in self.nodes.iter().enumerate() {
            if !accepted(i) {
                continue;
            }
            for dep in &node.hard_dependencies {
                if let Some(&j) = self.index.get(dep.as_str()) {
                    hard_pending[i] += 1;
                    hard_rev[j].push(i);
                }
            }
            for dep in &node.soft_dependencies {
                match self.index.get(dep.as_str()) {
                    Some(&j) if accepted(j) && j != i && !node.hard_depends_on(dep) => {
                        soft_pending[i] += 1;
                        soft_rev[j].push(i);
                    }
                    _ => {}
                }
            }
        }

        let mut remaining: BTreeSet<usize> = (0..n).filter(|&i| accepted(i)).collect();
        let mut ready: BTreeSet<usize> = remaining
            .iter()
            .copied()
            .filter(|&i| hard_pending[i] == 0 && soft_pending[i] == 0)
            .collect();
        let mut order = Vec::with_capacity(remaining.len());

        while !remaining.is_empty() {
            let next = match ready.iter().next().copied() {
                Some(i) => i,
                None => {
                    // Only soft edges left in the way
                    let Some(i) = remaining
                        .iter()
                        .copied()
                        .find(|&i| hard_pending[i] == 0)
                    else {
                        break;
                    };
                    debug!(
                        "Soft dependency cycle around {}, ignoring soft ordering",
                        self.nodes[i].id
                    );
                    i
                }
            };
            ready.remove(&next);
            remaining.remove(&next);
            order.push(self.nodes[next].id.clone());

            for &dependent in &hard_rev[next] {
                hard_pending[dependent] -= 1;
                if hard_pending[dependent] == 0
                    && soft_pending[dependent] == 0
                    && remaining.contains(&dependent)
                {
                    ready.insert(dependent);
                }
            }
            for &dependent in &soft_rev[next] {
                soft_pending[dependent] = soft_pending[dependent].saturating_sub(1);
                if hard_pending[dependent] == 0
                    && soft_pending[dependent] == 0
                    && remaining.contains(&dependent)
                {
                    ready.insert(dependent);
                }
            }
        }

        order
    }

    /// Strongly connected components of the hard-dependency subgraph that
    /// contain a cycle (more than one node, or a self-edge), members in
    /// discovery order
    fn cyclic_components(&self) -> Vec<Vec<usize>> {
        let n = self.nodes.len();
        let edges: Vec<Vec<usize>> = self
            .nodes
            .iter()
            .map(|node| {
                node.hard_dependencies
                    .iter()
                    .filter_map(|d| self.index.get(d.as_str()).copied())
                    .collect()
            })
            .collect();

        let mut tarjan = Tarjan {
            edges: &edges,
            index: vec![None; n],
            lowlink: vec![0; n],
            on_stack: vec![false; n],
            stack: Vec::new(),
            next_index: 0,
            components: Vec::new(),
        };
        for v in 0..n {
            if tarjan.index[v].is_none() {
                tarjan.visit(v);
            }
        }

        tarjan
            .components
            .into_iter()
            .filter(|c| c.len() > 1 || edges[c[0]].contains(&c[0]))
            .map(|mut c| {
                c.sort_unstable();
                c
            })
            .collect()
    }
}

/// Tarjan's strongly connected components
struct Tarjan<'a> {
    edges: &'a [Vec<usize>],
    index: Vec<Option<usize>>,
    lowlink: Vec<usize>,
    on_stack: Vec<bool>,
    stack: Vec<usize>,
    next_index: usize,
    components: Vec<Vec<usize>>,
}

impl Tarjan<'_> {
    fn visit(&mut self, v: usize) {
        self.index[v] = Some(self.next_index);
        self.lowlink[v] = self.next_index;
        self.next_index += 1;
        self.stack.push(v);
        self.on_stack[v] = true;

        for k in 0..self.edges[v].len() {
            let w = self.edges[v][k];
            match self.index[w] {
                None => {
                    self.visit(w);
                    self.lowlink[v] = self.lowlink[v].min(self.lowlink[w]);
                }
                Some(w_index) if self.on_stack[w] => {
                    self.lowlink[v] = self.lowlink[v].min(w_index);
                }
                Some(_) => {}
            }
        }

        if Some(self.lowlink[v]) == self.index[v] {
            let mut component = Vec::new();
            while let Some(w) = self.stack.pop() {
                self.on_stack[w] = false;
                component.push(w);
                if w == v {
                    break;
                }
            }
            self.components.push(component);
        }
    }
}
