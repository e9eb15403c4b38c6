// Dependency graph rendering
//
// Plain adjacency text for reading, Mermaid markup for diagrams. Both are
// deterministic: nodes and edges come out of the graph already sorted.

use crate::analysis::DependencyGraph;
use std::collections::{BTreeMap, HashSet};

/// How many most-depended-upon modules the adjacency footer lists
const RANKED_IN_FOOTER: usize = 5;

/// Render one `module -> imports` line per node, then cycles and degree notes
pub fn render_adjacency(graph: &DependencyGraph) -> String {
    let mut out = String::new();

    for node in graph.nodes() {
        let targets: Vec<&str> = graph.successors(&node.identity).collect();
        out.push_str(&node.identity);
        if node.is_failed() {
            out.push_str(" [parse error]");
        }
        if !targets.is_empty() {
            out.push_str(" -> ");
            out.push_str(&targets.join(", "));
        }
        out.push('\n');
    }

    let cycles = graph.cycles();
    if !cycles.is_empty() {
        out.push_str("\n# cycles\n");
        for cycle in &cycles {
            out.push_str(&format!("#   {} -> {}", cycle.path.join(" -> "), cycle.path[0]));
            let off_path: Vec<&str> = cycle.off_path().collect();
            if !off_path.is_empty() {
                out.push_str(&format!(" (same component: {})", off_path.join(", ")));
            }
            out.push('\n');
        }
    }

    let ranked = graph.most_depended_upon(RANKED_IN_FOOTER);
    if !ranked.is_empty() {
        let entries: Vec<String> = ranked
            .iter()
            .map(|(module, fan_in)| format!("{} ({})", module, fan_in))
            .collect();
        out.push_str(&format!("\n# most depended upon: {}\n", entries.join(", ")));
    }

    out.push_str(&format!(
        "# {} modules, {} edges, {} cycles\n",
        graph.node_count(),
        graph.edge_count(),
        cycles.len()
    ));
    out
}

/// Diagram generator for creating Mermaid diagrams
pub struct DiagramGenerator {
    /// Layout direction (TB, LR, BT, RL)
    direction: String,
}

impl DiagramGenerator {
    pub fn new() -> Self {
        Self {
            direction: "LR".to_string(),
        }
    }

    /// Set layout direction
    pub fn with_direction(mut self, dir: &str) -> Self {
        self.direction = dir.to_string();
        self
    }

    /// Module dependency flowchart; edges inside cycles are dashed and labelled
    pub fn generate_dependency_graph(&self, graph: &DependencyGraph) -> String {
        let mut lines = Vec::new();
        lines.push(format!("graph {}", self.direction));

        let ids = node_ids(graph);
        let mut has_failed = false;

        for node in graph.nodes() {
            let id = &ids[node.identity.as_str()];
            if node.is_failed() {
                has_failed = true;
                lines.push(format!(
                    "    {}[\"{} [parse error]\"]:::parseError",
                    id,
                    escape_label(&node.identity)
                ));
            } else {
                lines.push(format!("    {}[\"{}\"]", id, escape_label(&node.identity)));
            }
        }

        let cycle_edges = graph.cycle_edges();
        for (from, to) in graph.edges() {
            let arrow = if cycle_edges.contains(&(from.to_string(), to.to_string())) {
                "-.->|cycle|"
            } else {
                "-->"
            };
            lines.push(format!("    {} {} {}", ids[from], arrow, ids[to]));
        }

        if has_failed {
            lines.push("    classDef parseError fill:#fdd,stroke:#c33".to_string());
        }

        lines.join("\n")
    }
}

impl Default for DiagramGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Unique Mermaid ids per module; clashes after sanitizing get a numeric suffix
fn node_ids(graph: &DependencyGraph) -> BTreeMap<&str, String> {
    let mut taken = HashSet::new();
    let mut ids = BTreeMap::new();
    for node in graph.nodes() {
        let base = sanitize_id(&node.identity);
        let mut id = base.clone();
        let mut n = 1;
        while !taken.insert(id.clone()) {
            n += 1;
            id = format!("{}_{}", base, n);
        }
        ids.insert(node.identity.as_str(), id);
    }
    ids
}

/// Sanitize a string for use as a Mermaid node ID
fn sanitize_id(s: &str) -> String {
    let id: String = s
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect();
    if id.is_empty() {
        "_root".to_string()
    } else {
        id
    }
}

fn escape_label(s: &str) -> String {
    s.replace('"', "#quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::GraphOptions;
    use crate::parser::{ImportClass, ImportEdge, ParseStatus, SourceUnit};
    use std::path::PathBuf;

    fn unit(module: &str, imports: &[&str]) -> SourceUnit {
        let mut unit = SourceUnit::new(
            PathBuf::from(format!("{}.py", module.replace('.', "/"))),
            module.to_string(),
            String::new(),
        );
        for target in imports {
            unit.imports.push(ImportEdge {
                importer: module.to_string(),
                target: target.to_string(),
                name: None,
                line: 1,
                class: ImportClass::External,
            });
        }
        unit
    }

    fn sample_graph() -> DependencyGraph {
        let mut broken = unit("shop.broken", &[]);
        broken.status = ParseStatus::SyntaxError {
            message: "syntax error at line 1, column 1".to_string(),
        };
        let units = vec![
            unit("shop.a", &["shop.b", "shop.models"]),
            unit("shop.b", &["shop.a"]),
            unit("shop.models", &[]),
            broken,
        ];
        DependencyGraph::build(&units, &GraphOptions::default())
    }

    #[test]
    fn test_sanitize_id() {
        assert_eq!(sanitize_id("my.module"), "my_module");
        assert_eq!(sanitize_id("MyClass"), "MyClass");
        assert_eq!(sanitize_id("foo-bar"), "foo_bar");
        assert_eq!(sanitize_id(""), "_root");
    }

    #[test]
    fn test_node_ids_are_unique() {
        let graph = DependencyGraph::build(
            &[unit("a.b", &[]), unit("a_b", &[])],
            &GraphOptions::default(),
        );
        let ids = node_ids(&graph);
        assert_eq!(ids["a.b"], "a_b");
        assert_eq!(ids["a_b"], "a_b_2");
    }

    #[test]
    fn test_with_direction() {
        let gen = DiagramGenerator::new().with_direction("TB");
        assert_eq!(gen.direction, "TB");
    }

    #[test]
    fn test_adjacency() {
        let text = render_adjacency(&sample_graph());
        assert!(text.starts_with("shop.a -> shop.b, shop.models\nshop.b -> shop.a\n"));
        assert!(text.contains("shop.broken [parse error]\n"));
        assert!(text.contains("#   shop.a -> shop.b -> shop.a\n"));
        assert!(text.contains("# most depended upon: shop.a (1), shop.b (1), shop.models (1)"));
        assert!(text.ends_with("# 4 modules, 3 edges, 1 cycles\n"));
    }

    #[test]
    fn test_adjacency_cycle_follows_edges() {
        let graph = DependencyGraph::build(
            &[unit("a", &["b", "c"]), unit("b", &["a"]), unit("c", &["a"])],
            &GraphOptions::default(),
        );
        let text = render_adjacency(&graph);
        assert!(text.contains("#   a -> b -> a (same component: c)\n"));
        assert!(!text.contains("b -> c"));
    }

    #[test]
    fn test_mermaid() {
        let diagram = DiagramGenerator::new().generate_dependency_graph(&sample_graph());
        let lines: Vec<&str> = diagram.lines().collect();

        assert_eq!(lines[0], "graph LR");
        assert!(lines.contains(&"    shop_a[\"shop.a\"]"));
        assert!(lines.contains(&"    shop_broken[\"shop.broken [parse error]\"]:::parseError"));
        assert!(lines.contains(&"    shop_a -.->|cycle| shop_b"));
        assert!(lines.contains(&"    shop_b -.->|cycle| shop_a"));
        assert!(lines.contains(&"    shop_a --> shop_models"));
        assert!(diagram.ends_with("classDef parseError fill:#fdd,stroke:#c33"));
    }

    #[test]
    fn test_mermaid_without_failures_has_no_class_def() {
        let graph = DependencyGraph::build(&[unit("a", &[])], &GraphOptions::default());
        let diagram = DiagramGenerator::new().generate_dependency_graph(&graph);
        assert_eq!(diagram, "graph LR\n    a[\"a\"]");
    }
}
