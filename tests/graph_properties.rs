use std::collections::{HashSet, VecDeque};

use proptest::prelude::*;

use catapply::catalog::{validate_catalog, Catalog, ResourceId};
use catapply::dag::{DepGraph, NodeState, Outcome};
use catapply_test_utils::builders::{CatalogBuilder, ResourceBuilder};

// Generate a valid DAG: resource i+1 may only depend on resources 1..=i,
// which rules out cycles by construction.
fn dag_strategy(max_resources: usize) -> impl Strategy<Value = Catalog> {
    (1..=max_resources).prop_flat_map(|n| {
        proptest::collection::vec(proptest::collection::vec(any::<usize>(), 0..n), n).prop_map(
            move |raw_deps| {
                let mut builder = CatalogBuilder::new();
                for (i, potential) in raw_deps.into_iter().enumerate() {
                    let id = (i + 1) as ResourceId;
                    let mut resource = ResourceBuilder::noop(id);
                    let mut deps = HashSet::new();
                    for raw in potential {
                        if i > 0 {
                            deps.insert((raw % i + 1) as ResourceId);
                        }
                    }
                    for dep in deps {
                        resource = resource.after(dep);
                    }
                    builder = builder.with(resource);
                }
                builder.build()
            },
        )
    })
}

proptest! {
    #[test]
    fn every_run_terminates_with_consistent_terminal_states(
        catalog in dag_strategy(10),
        failing_indices in proptest::collection::vec(0..10usize, 0..4),
    ) {
        prop_assert!(validate_catalog(&catalog).is_ok());

        let ids: Vec<ResourceId> = catalog.resources.iter().map(|r| r.id).collect();
        let deps_of: Vec<(ResourceId, Vec<ResourceId>)> = catalog
            .resources
            .iter()
            .map(|r| (r.id, r.dependencies.clone()))
            .collect();
        let failing: HashSet<ResourceId> = failing_indices
            .iter()
            .filter_map(|&i| ids.get(i).copied())
            .collect();

        let mut graph = DepGraph::from_catalog(catalog);
        let mut running: VecDeque<ResourceId> = VecDeque::new();
        let mut dispatched = 0usize;

        let mut steps = 0;
        loop {
            steps += 1;
            prop_assert!(steps < 1000, "run did not terminate");

            while let Some(id) = graph.pop_ready() {
                running.push_back(id);
                dispatched += 1;
            }

            let Some(id) = running.pop_front() else {
                prop_assert!(graph.is_done(), "nothing running and graph not done");
                break;
            };

            if failing.contains(&id) {
                graph.mark(id, Outcome::Failed);
            } else {
                graph.mark(id, Outcome::Ok { changed: true });
            }
        }

        let mut done = 0;
        let mut failed = 0;
        for (id, deps) in &deps_of {
            let state = graph.state(*id).expect("node exists");
            prop_assert!(state.is_terminal(), "resource {} ended in {:?}", id, state);

            match state {
                NodeState::Done => {
                    done += 1;
                    for dep in deps {
                        prop_assert_eq!(
                            graph.state(*dep),
                            Some(NodeState::Done),
                            "done resource {} had an unfinished dependency {}",
                            id,
                            dep
                        );
                    }
                }
                NodeState::Failed => {
                    failed += 1;
                    prop_assert!(failing.contains(id));
                }
                NodeState::Skipped => {
                    let blocked = deps.iter().any(|dep| {
                        matches!(
                            graph.state(*dep),
                            Some(NodeState::Failed) | Some(NodeState::Skipped)
                        )
                    });
                    prop_assert!(blocked, "resource {} skipped without a failed ancestor", id);
                }
                _ => unreachable!(),
            }
        }

        // Every dispatched node was marked exactly once, and the rest were
        // skipped without ever reaching a worker.
        prop_assert_eq!(dispatched, done + failed);
        prop_assert_eq!(graph.len(), done + failed + graph.skipped_count());
    }
}
