// tests/graph_properties.rs

use std::collections::HashMap;

use proptest::prelude::*;
use stackup::dag::DependencyGraph;
use stackup::dag::graph::validate_declaration;
use stackup::errors::StackError;
use stackup_test_utils::builders::fake_service;
use stackup_test_utils::fakes::EventLog;

/// Acyclic declarations: service `i` may only depend on services `< i`,
/// then the declaration order is shuffled.
fn dag_strategy(max_services: usize) -> impl Strategy<Value = Vec<(String, Vec<String>)>> {
    (1..=max_services).prop_flat_map(|n| {
        proptest::collection::vec(proptest::collection::vec(any::<usize>(), 0..4), n)
            .prop_map(move |raw| {
                raw.into_iter()
                    .enumerate()
                    .map(|(i, picks)| {
                        let mut deps: Vec<String> = if i == 0 {
                            Vec::new()
                        } else {
                            picks.into_iter().map(|p| format!("svc_{}", p % i)).collect()
                        };
                        deps.sort();
                        deps.dedup();
                        (format!("svc_{i}"), deps)
                    })
                    .collect::<Vec<_>>()
            })
            .prop_shuffle()
    })
}

fn build(decl: &[(String, Vec<String>)]) -> DependencyGraph {
    let events = EventLog::new();
    let specs = decl
        .iter()
        .map(|(name, deps)| {
            let deps: Vec<&str> = deps.iter().map(String::as_str).collect();
            fake_service(name, &deps, &events)
        })
        .collect();
    DependencyGraph::build(specs).unwrap()
}

proptest! {
    #[test]
    fn topological_order_puts_dependencies_first(decl in dag_strategy(12)) {
        let graph = build(&decl);
        let order = graph.topological_order();
        prop_assert_eq!(order.len(), decl.len());

        let position: HashMap<&str, usize> =
            order.iter().enumerate().map(|(i, n)| (*n, i)).collect();
        for (name, deps) in decl.iter() {
            for dep in deps {
                prop_assert!(position[dep.as_str()] < position[name.as_str()]);
            }
        }

        let mut shutdown = graph.shutdown_order();
        shutdown.reverse();
        prop_assert_eq!(shutdown, order);
    }

    #[test]
    fn order_is_stable_for_the_same_declaration(decl in dag_strategy(12)) {
        let first: Vec<String> =
            build(&decl).topological_order().into_iter().map(str::to_string).collect();
        let second: Vec<String> =
            build(&decl).topological_order().into_iter().map(str::to_string).collect();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn independent_services_keep_declaration_order(n in 1usize..20) {
        let decl: Vec<(String, Vec<String>)> =
            (0..n).map(|i| (format!("svc_{i}"), Vec::new())).collect();
        let graph = build(&decl);
        let expected: Vec<&str> = decl.iter().map(|(name, _)| name.as_str()).collect();
        prop_assert_eq!(graph.topological_order(), expected);
    }

    #[test]
    fn closing_a_loop_is_reported_as_a_cycle(len in 2usize..8) {
        // svc_0 -> svc_1 -> ... -> svc_{len-1} -> svc_0
        let names: Vec<String> = (0..len).map(|i| format!("svc_{i}")).collect();
        let deps: Vec<Vec<String>> =
            (0..len).map(|i| vec![names[(i + 1) % len].clone()]).collect();
        let declared: Vec<(&str, &[String])> = names
            .iter()
            .zip(deps.iter())
            .map(|(n, d)| (n.as_str(), d.as_slice()))
            .collect();

        match validate_declaration(&declared) {
            Err(StackError::Cycle(path)) => prop_assert_eq!(path, names),
            other => prop_assert!(false, "expected cycle, got {:?}", other),
        }
    }
}
