use proptest::prelude::*;
use steward_core::state_machine::TaskStatus;

/// Strategy for task statuses a task can be set to directly (everything but `Wait`)
pub fn settable_status_strategy() -> impl Strategy<Value = TaskStatus> {
    prop::sample::select(
        TaskStatus::ALL
            .iter()
            .copied()
            .filter(|s| *s != TaskStatus::Wait)
            .collect::<Vec<_>>(),
    )
}

/// Strategy for acyclic wait graphs: a node count and edges `(waiter, prerequisite)`
/// where the prerequisite always comes first
pub fn wait_graph_strategy(max_tasks: usize) -> impl Strategy<Value = (usize, Vec<(usize, usize)>)> {
    (2..=max_tasks).prop_flat_map(|n| {
        let edges = prop::collection::vec((1..n, 0..n), 0..n * 2).prop_map(|pairs| {
            pairs
                .into_iter()
                .map(|(waiter, prerequisite)| (waiter, prerequisite % waiter))
                .collect::<Vec<_>>()
        });
        (Just(n), edges)
    })
}

/// Strategy for task custom data values
pub fn json_value_strategy() -> impl Strategy<Value = serde_json::Value> {
    prop_oneof![
        Just(serde_json::json!(null)),
        any::<bool>().prop_map(serde_json::Value::from),
        any::<i64>().prop_map(serde_json::Value::from),
        "[a-z0-9 -]{0,24}".prop_map(serde_json::Value::from),
        Just(serde_json::json!({"snap": "core", "revision": 42})),
    ]
}
