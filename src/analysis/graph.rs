// Module dependency graph
//
// Nodes are module identities, edges are resolved internal imports. The graph
// is always rebuilt from a unit set; nothing is updated in place.

use crate::analysis::imports::resolve_target;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::parser::SourceUnit;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, warn};

/// Options controlling edge resolution
#[derive(Debug, Clone, Default)]
pub struct GraphOptions {
    /// When set, only imports under this package are candidate edges
    pub package_root: Option<String>,
}

impl GraphOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            package_root: config.graph.package_root.clone(),
        }
    }
}

/// A module in the dependency graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleNode {
    pub identity: String,
    /// Source path relative to the analysis root
    pub path: String,
    /// Set when the module failed to parse; such nodes have no outgoing edges
    pub parse_error: Option<String>,
    /// Distinct import targets that did not resolve to a node
    pub external_imports: BTreeSet<String>,
}

impl ModuleNode {
    pub fn is_failed(&self) -> bool {
        self.parse_error.is_some()
    }
}

/// Directed module graph with deduplicated edges
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: BTreeMap<String, ModuleNode>,
    edges: BTreeSet<(String, String)>,
}

impl DependencyGraph {
    /// Build the graph from parsed units
    pub fn build(units: &[SourceUnit], options: &GraphOptions) -> Self {
        let mut graph = Self::default();

        for unit in units {
            if graph.nodes.contains_key(&unit.module) {
                warn!(
                    "Module '{}' already defined; ignoring {}",
                    unit.module,
                    unit.display_path()
                );
                continue;
            }
            graph.nodes.insert(
                unit.module.clone(),
                ModuleNode {
                    identity: unit.module.clone(),
                    path: unit.display_path(),
                    parse_error: unit.status.diagnostic(),
                    external_imports: BTreeSet::new(),
                },
            );
        }

        let known: BTreeSet<String> = graph.nodes.keys().cloned().collect();

        for unit in units {
            if !unit.is_ok() {
                continue;
            }
            // Only the unit that owns the identity contributes edges
            match graph.nodes.get(&unit.module) {
                Some(node) if node.path == unit.display_path() => {}
                _ => continue,
            }

            let mut externals = BTreeSet::new();
            for import in &unit.imports {
                let candidate = import.is_internal() || options.package_root.is_none();
                let resolved = if candidate {
                    resolve_target(&import.target, import.name.as_deref(), &known)
                } else {
                    None
                };

                match resolved {
                    Some(target) if target == unit.module => {}
                    Some(target) => {
                        graph.edges.insert((unit.module.clone(), target));
                    }
                    None => {
                        let label = if import.target.is_empty() {
                            import.name.clone().unwrap_or_default()
                        } else {
                            import.target.clone()
                        };
                        externals.insert(label);
                    }
                }
            }

            if let Some(node) = graph.nodes.get_mut(&unit.module) {
                node.external_imports = externals;
            }
        }

        debug!(
            "Built graph with {} modules and {} edges",
            graph.nodes.len(),
            graph.edges.len()
        );
        graph
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &ModuleNode> {
        self.nodes.values()
    }

    pub fn node(&self, identity: &str) -> Option<&ModuleNode> {
        self.nodes.get(identity)
    }

    /// Edges as (importer, imported) pairs, sorted
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str)> {
        self.edges.iter().map(|(a, b)| (a.as_str(), b.as_str()))
    }

    pub fn has_edge(&self, from: &str, to: &str) -> bool {
        self.edges.contains(&(from.to_string(), to.to_string()))
    }

    /// Modules imported by `identity`, sorted
    pub fn successors<'a>(&'a self, identity: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.edges
            .iter()
            .filter(move |(from, _)| from == identity)
            .map(|(_, to)| to.as_str())
    }

    /// Modules importing `identity`, sorted
    pub fn predecessors<'a>(&'a self, identity: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.edges
            .iter()
            .filter(move |(_, to)| to == identity)
            .map(|(from, _)| from.as_str())
    }

    pub fn fan_out(&self, identity: &str) -> usize {
        self.successors(identity).count()
    }

    pub fn fan_in(&self, identity: &str) -> usize {
        self.predecessors(identity).count()
    }

    /// Modules ranked by fan-in, descending, ties broken by name; zero fan-in omitted
    pub fn most_depended_upon(&self, limit: usize) -> Vec<(String, usize)> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for (_, to) in &self.edges {
            *counts.entry(to.as_str()).or_default() += 1;
        }

        let mut ranked: Vec<(String, usize)> = counts
            .into_iter()
            .map(|(name, count)| (name.to_string(), count))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(limit);
        ranked
    }

    /// Strongly connected components with more than one member
    fn components(&self) -> Vec<Vec<String>> {
        let mut graph: DiGraph<&str, ()> = DiGraph::new();
        let mut index: HashMap<&str, NodeIndex> = HashMap::new();
        for identity in self.nodes.keys() {
            index.insert(identity.as_str(), graph.add_node(identity.as_str()));
        }
        for (from, to) in &self.edges {
            if let (Some(&a), Some(&b)) = (index.get(from.as_str()), index.get(to.as_str())) {
                graph.add_edge(a, b, ());
            }
        }

        tarjan_scc(&graph)
            .into_iter()
            .filter(|scc| scc.len() > 1)
            .map(|scc| scc.into_iter().map(|i| graph[i].to_string()).collect())
            .collect()
    }

    /// Import cycles, one per strongly connected component.
    ///
    /// The list is sorted, so the result does not depend on input order.
    pub fn cycles(&self) -> Vec<Cycle> {
        let mut cycles: Vec<Cycle> = self
            .components()
            .into_iter()
            .filter_map(|mut members| {
                members.sort();
                let path = self.closed_path(&members)?;
                Some(Cycle { path, members })
            })
            .collect();
        cycles.sort();
        cycles
    }

    /// Depth-first search from the smallest member over sorted edges inside the
    /// component, stopping at the first edge back to the start. The search
    /// stack at that point is the cycle.
    fn closed_path(&self, members: &[String]) -> Option<Vec<String>> {
        let start = members.first()?;
        let inside: BTreeSet<&str> = members.iter().map(String::as_str).collect();
        let successors_inside = |node: &str| -> Vec<String> {
            self.successors(node)
                .filter(|n| inside.contains(*n))
                .map(str::to_string)
                .collect()
        };

        let mut visited = BTreeSet::from([start.clone()]);
        let mut path = vec![start.clone()];
        let mut frontier = vec![successors_inside(start.as_str()).into_iter()];
        while let Some(next) = frontier.last_mut() {
            match next.next() {
                Some(node) if node == *start => return Some(path),
                Some(node) => {
                    if visited.insert(node.clone()) {
                        frontier.push(successors_inside(node.as_str()).into_iter());
                        path.push(node);
                    }
                }
                None => {
                    frontier.pop();
                    path.pop();
                }
            }
        }
        None
    }

    /// Edges whose endpoints share a cycle
    pub fn cycle_edges(&self) -> BTreeSet<(String, String)> {
        let mut component_of: HashMap<String, usize> = HashMap::new();
        for (i, members) in self.components().into_iter().enumerate() {
            for member in members {
                component_of.insert(member, i);
            }
        }

        self.edges
            .iter()
            .filter(|(from, to)| {
                matches!(
                    (component_of.get(from), component_of.get(to)),
                    (Some(a), Some(b)) if a == b
                )
            })
            .cloned()
            .collect()
    }

    /// Subgraph of modules matching `keyword` plus their direct neighbours
    pub fn focus(&self, keyword: &str) -> Result<DependencyGraph> {
        let matched: BTreeSet<&str> = self
            .nodes
            .keys()
            .filter(|identity| identity.contains(keyword))
            .map(|s| s.as_str())
            .collect();
        if matched.is_empty() {
            return Err(Error::empty_focus(keyword));
        }

        let mut keep: BTreeSet<&str> = matched.clone();
        for (from, to) in &self.edges {
            if matched.contains(from.as_str()) {
                keep.insert(to.as_str());
            }
            if matched.contains(to.as_str()) {
                keep.insert(from.as_str());
            }
        }

        let nodes = self
            .nodes
            .iter()
            .filter(|(identity, _)| keep.contains(identity.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let edges = self
            .edges
            .iter()
            .filter(|(from, to)| keep.contains(from.as_str()) && keep.contains(to.as_str()))
            .cloned()
            .collect();

        Ok(DependencyGraph { nodes, edges })
    }

    /// Serializable summary of the graph
    pub fn report(&self) -> GraphReport {
        let cycle_edges = self.cycle_edges();

        let modules = self
            .nodes
            .values()
            .map(|node| ModuleReport {
                identity: node.identity.clone(),
                path: node.path.clone(),
                parse_error: node.parse_error.clone(),
                imports: self
                    .successors(&node.identity)
                    .map(|s| s.to_string())
                    .collect(),
                fan_in: self.fan_in(&node.identity),
                fan_out: self.fan_out(&node.identity),
                external_imports: node.external_imports.len(),
            })
            .collect();

        let edges = self
            .edges
            .iter()
            .map(|(from, to)| EdgeReport {
                from: from.clone(),
                to: to.clone(),
                in_cycle: cycle_edges.contains(&(from.clone(), to.clone())),
            })
            .collect();

        let most_depended_upon = self
            .most_depended_upon(MOST_DEPENDED_LIMIT)
            .into_iter()
            .map(|(module, fan_in)| RankEntry { module, fan_in })
            .collect();

        let failed = self.nodes.values().filter(|n| n.is_failed()).count();
        GraphReport {
            summary: GraphSummary {
                modules: self.nodes.len(),
                edges: self.edges.len(),
                parsed: self.nodes.len() - failed,
                failed,
            },
            modules,
            edges,
            cycles: self.cycles(),
            most_depended_upon,
        }
    }
}

/// How many entries the report ranks by fan-in
pub const MOST_DEPENDED_LIMIT: usize = 10;

#[derive(Debug, Clone, Serialize)]
pub struct GraphReport {
    pub summary: GraphSummary,
    pub modules: Vec<ModuleReport>,
    pub edges: Vec<EdgeReport>,
    pub cycles: Vec<Cycle>,
    pub most_depended_upon: Vec<RankEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphSummary {
    pub modules: usize,
    pub edges: usize,
    pub parsed: usize,
    pub failed: usize,
}

/// A closed import path through one strongly connected component
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Cycle {
    /// Starts at the smallest member; each entry imports the next and the last
    /// imports the first
    pub path: Vec<String>,
    /// Every module in the component, sorted
    pub members: Vec<String>,
}

impl Cycle {
    /// Members not on `path`
    pub fn off_path(&self) -> impl Iterator<Item = &str> {
        self.members
            .iter()
            .filter(|m| !self.path.contains(m))
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ModuleReport {
    pub identity: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_error: Option<String>,
    pub imports: Vec<String>,
    pub fan_in: usize,
    pub fan_out: usize,
    pub external_imports: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct EdgeReport {
    pub from: String,
    pub to: String,
    pub in_cycle: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RankEntry {
    pub module: String,
    pub fan_in: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{ImportClass, ImportEdge, ParseStatus};
    use std::path::PathBuf;

    fn unit(module: &str, imports: &[&str]) -> SourceUnit {
        let path = format!("{}.py", module.replace('.', "/"));
        let mut unit = SourceUnit::new(PathBuf::from(path), module.to_string(), String::new());
        for (i, target) in imports.iter().enumerate() {
            unit.imports.push(ImportEdge {
                importer: module.to_string(),
                target: target.to_string(),
                name: None,
                line: i + 1,
                class: ImportClass::External,
            });
        }
        unit
    }

    fn build(units: &[SourceUnit]) -> DependencyGraph {
        DependencyGraph::build(units, &GraphOptions::default())
    }

    #[test]
    fn test_empty_graph() {
        let graph = build(&[]);
        assert_eq!(graph.node_count(), 0);
        assert!(graph.cycles().is_empty());
    }

    #[test]
    fn test_edges_resolve_and_dedupe() {
        let graph = build(&[
            unit("app", &["models", "models", "os", "app"]),
            unit("models", &[]),
        ]);
        assert_eq!(graph.edge_count(), 1);
        assert!(graph.has_edge("app", "models"));
        let app = graph.node("app").unwrap();
        assert_eq!(app.external_imports.iter().collect::<Vec<_>>(), vec!["os"]);
    }

    #[test]
    fn test_longest_prefix_resolution() {
        let graph = build(&[unit("app", &["shop.models.user"]), unit("shop.models", &[])]);
        assert!(graph.has_edge("app", "shop.models"));
    }

    #[test]
    fn test_package_root_limits_candidates() {
        let mut api = unit("shop.api", &["shop.models", "helpers"]);
        api.imports[0].class = ImportClass::Internal;
        let units = vec![api, unit("shop.models", &[]), unit("helpers", &[])];

        let options = GraphOptions {
            package_root: Some("shop".to_string()),
        };
        let graph = DependencyGraph::build(&units, &options);
        assert!(graph.has_edge("shop.api", "shop.models"));
        assert!(!graph.has_edge("shop.api", "helpers"));
        assert_eq!(graph.node("shop.api").unwrap().external_imports.len(), 1);
    }

    #[test]
    fn test_mutual_import_is_one_cycle() {
        let graph = build(&[unit("a", &["b"]), unit("b", &["a"])]);
        let cycles = graph.cycles();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].path, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(cycles[0].members, cycles[0].path);
        assert_eq!(graph.cycle_edges().len(), 2);
    }

    #[test]
    fn test_cycles_independent_of_order() {
        let forward = vec![
            unit("a", &["b"]),
            unit("b", &["c"]),
            unit("c", &["a", "d"]),
            unit("d", &[]),
            unit("x", &["y"]),
            unit("y", &["x"]),
        ];
        let mut reversed = forward.clone();
        reversed.reverse();

        let expected = vec![
            vec!["a".to_string(), "b".to_string(), "c".to_string()],
            vec!["x".to_string(), "y".to_string()],
        ];
        let paths = |graph: DependencyGraph| -> Vec<Vec<String>> {
            graph.cycles().into_iter().map(|c| c.path).collect()
        };
        assert_eq!(paths(build(&forward)), expected);
        assert_eq!(paths(build(&reversed)), expected);
    }

    #[test]
    fn test_branching_component_reports_real_path() {
        let graph = build(&[unit("a", &["b", "c"]), unit("b", &["a"]), unit("c", &["a"])]);
        assert!(!graph.has_edge("b", "c"));

        let cycles = graph.cycles();
        assert_eq!(cycles.len(), 1);
        let cycle = &cycles[0];
        assert_eq!(cycle.path, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(
            cycle.members,
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
        assert_eq!(cycle.off_path().collect::<Vec<_>>(), vec!["c"]);

        let mut closed = cycle.path.clone();
        closed.push(cycle.path[0].clone());
        for pair in closed.windows(2) {
            assert!(graph.has_edge(&pair[0], &pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_cycle_path_skips_dead_ends() {
        // c -> b is tried before c -> d
        let graph = build(&[
            unit("a", &["b"]),
            unit("b", &["c"]),
            unit("c", &["b", "d"]),
            unit("d", &["a"]),
        ]);
        let cycles = graph.cycles();
        assert_eq!(cycles.len(), 1);
        assert_eq!(
            cycles[0].path,
            vec!["a".to_string(), "b".to_string(), "c".to_string(), "d".to_string()]
        );
    }

    #[test]
    fn test_acyclic_edges_not_marked() {
        let graph = build(&[unit("a", &["b"]), unit("b", &["a", "c"]), unit("c", &[])]);
        let marked = graph.cycle_edges();
        assert!(!marked.contains(&("b".to_string(), "c".to_string())));
        assert!(marked.contains(&("a".to_string(), "b".to_string())));
    }

    #[test]
    fn test_failed_unit_has_no_outgoing_edges() {
        let mut broken = unit("broken", &["a"]);
        broken.status = ParseStatus::SyntaxError {
            message: "syntax error at line 1, column 5".to_string(),
        };
        let graph = build(&[broken, unit("a", &["broken"])]);

        assert_eq!(graph.fan_out("broken"), 0);
        assert_eq!(graph.fan_in("broken"), 1);
        assert!(graph.node("broken").unwrap().is_failed());
    }

    #[test]
    fn test_fan_in_and_ranking() {
        let graph = build(&[
            unit("a", &["core", "util"]),
            unit("b", &["core", "util"]),
            unit("c", &["core"]),
            unit("core", &[]),
            unit("util", &[]),
        ]);
        assert_eq!(graph.fan_in("core"), 3);
        assert_eq!(graph.fan_out("a"), 2);
        assert_eq!(
            graph.most_depended_upon(2),
            vec![("core".to_string(), 3), ("util".to_string(), 2)]
        );
    }

    #[test]
    fn test_focus_includes_neighbours() {
        let graph = build(&[
            unit("api", &["orders"]),
            unit("orders", &["db"]),
            unit("db", &["config"]),
            unit("config", &[]),
        ]);
        let focused = graph.focus("orders").unwrap();
        let names: Vec<&str> = focused.nodes().map(|n| n.identity.as_str()).collect();
        assert_eq!(names, vec!["api", "db", "orders"]);
        assert_eq!(focused.edge_count(), 2);
    }

    #[test]
    fn test_focus_without_match() {
        let graph = build(&[unit("api", &[])]);
        let err = graph.focus("billing").unwrap_err();
        assert!(matches!(err, Error::EmptyFocus(ref k) if k == "billing"));
    }

    #[test]
    fn test_report_serializes() {
        let graph = build(&[unit("a", &["b"]), unit("b", &["a"])]);
        let report = graph.report();
        assert_eq!(report.summary.modules, 2);
        assert_eq!(report.summary.parsed, 2);
        assert!(report.edges.iter().all(|e| e.in_cycle));

        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"cycles\":[{\"path\":[\"a\",\"b\"],\"members\":[\"a\",\"b\"]}]"));
    }
}
