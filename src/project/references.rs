//! `ref(...)` / `source(...)` extraction and transitive dependency resolution

use crate::types::SourceReference;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::LazyLock;

static REF_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bref\(\s*['"]([^'"]+)['"]\s*\)"#).expect("ref pattern is valid")
});

static SOURCE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bsource\(\s*['"]([^'"]+)['"]\s*,\s*['"]([^'"]+)['"]\s*\)"#)
        .expect("source pattern is valid")
});

/// Distinct model names referenced with `ref('name')` or `ref("name")`
pub fn extract_refs(sql: &str) -> BTreeSet<String> {
    REF_PATTERN
        .captures_iter(sql)
        .map(|caps| caps[1].trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

/// `source('schema', 'table')` calls in order of first appearance, without duplicates
pub fn extract_sources(sql: &str) -> Vec<SourceReference> {
    let mut seen = HashSet::new();
    SOURCE_PATTERN
        .captures_iter(sql)
        .map(|caps| SourceReference {
            source_name: caps[1].trim().to_string(),
            table_name: caps[2].trim().to_string(),
        })
        .filter(|source| seen.insert(source.clone()))
        .collect()
}

/// Direct references of every SQL model in a project, keyed by model name
#[derive(Debug, Default)]
pub struct DependencyGraph {
    edges: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_model(&mut self, name: impl Into<String>, refs: BTreeSet<String>) {
        self.edges.insert(name.into(), refs);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.edges.contains_key(name)
    }

    /// Split `name`'s direct references into (resolved, unresolved)
    pub fn partition_refs(&self, name: &str) -> (BTreeSet<String>, BTreeSet<String>) {
        self.edges
            .get(name)
            .map(|refs| refs.iter().cloned().partition(|r| self.contains(r)))
            .unwrap_or_default()
    }

    /// Transitive dependencies of `name`, upstream first.
    ///
    /// Only names with a SQL model are followed. Each name appears once and
    /// `name` itself is never included, so cycles terminate.
    pub fn resolve(&self, name: &str) -> Vec<String> {
        let mut visited = HashSet::new();
        let mut order = Vec::new();
        visited.insert(name.to_string());
        self.visit(name, &mut visited, &mut order);
        order
    }

    fn visit(&self, name: &str, visited: &mut HashSet<String>, order: &mut Vec<String>) {
        let Some(refs) = self.edges.get(name) else {
            return;
        };

        for dependency in refs {
            if !self.contains(dependency) || !visited.insert(dependency.clone()) {
                continue;
            }
            self.visit(dependency, visited, order);
            order.push(dependency.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_extract_refs_single_and_double_quotes() {
        let sql = r#"
            select * from {{ ref('stg_orders') }}
            join {{ ref("stg_customers") }} using (customer_id)
            left join {{ ref( 'stg_orders' ) }} o2 on true
        "#;
        assert_eq!(extract_refs(sql), set(&["stg_customers", "stg_orders"]));
    }

    #[test]
    fn test_extract_refs_ignores_lookalikes() {
        let sql = "select preference('x'), xref('y'), ref(unquoted) from t";
        assert!(extract_refs(sql).is_empty());
    }

    #[test]
    fn test_extract_sources() {
        let sql = r#"
            select * from {{ source('shop', 'orders') }}
            union all
            select * from {{ source("shop", "returns") }}
            union all
            select * from {{ source('shop','orders') }}
        "#;
        assert_eq!(
            extract_sources(sql),
            vec![
                SourceReference {
                    source_name: "shop".to_string(),
                    table_name: "orders".to_string(),
                },
                SourceReference {
                    source_name: "shop".to_string(),
                    table_name: "returns".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_resolve_chain() {
        let mut graph = DependencyGraph::new();
        graph.add_model("a", set(&["b"]));
        graph.add_model("b", set(&["c"]));
        graph.add_model("c", set(&[]));

        assert_eq!(graph.resolve("a"), vec!["c", "b"]);
        assert_eq!(graph.partition_refs("a").0, set(&["b"]));
        assert!(graph.resolve("c").is_empty());
    }

    #[test]
    fn test_resolve_shared_upstream_listed_once() {
        let mut graph = DependencyGraph::new();
        graph.add_model("mart", set(&["int_a", "int_b"]));
        graph.add_model("int_a", set(&["stg"]));
        graph.add_model("int_b", set(&["stg"]));
        graph.add_model("stg", set(&[]));

        assert_eq!(graph.resolve("mart"), vec!["stg", "int_a", "int_b"]);
    }

    #[test]
    fn test_resolve_cycle_terminates() {
        let mut graph = DependencyGraph::new();
        graph.add_model("a", set(&["b"]));
        graph.add_model("b", set(&["a"]));

        assert_eq!(graph.resolve("a"), vec!["b"]);
        assert_eq!(graph.resolve("b"), vec!["a"]);
    }

    #[test]
    fn test_self_reference_terminates() {
        let mut graph = DependencyGraph::new();
        graph.add_model("a", set(&["a"]));
        assert!(graph.resolve("a").is_empty());
    }

    #[test]
    fn test_unresolved_reference_is_not_a_dependency() {
        let mut graph = DependencyGraph::new();
        graph.add_model("a", set(&["b", "ghost"]));
        graph.add_model("b", set(&[]));

        assert_eq!(graph.resolve("a"), vec!["b"]);
        let (resolved, unresolved) = graph.partition_refs("a");
        assert_eq!(resolved, set(&["b"]));
        assert_eq!(unresolved, set(&["ghost"]));
    }
}
