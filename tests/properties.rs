// ============================================================================
// spark-observable - Store Properties
// Property tests for reads, writes and notification counts
// ============================================================================

use proptest::prelude::*;
use serde_json::json;
use spark_observable::render::{render, MemoryHost, Template};
use spark_observable::{create_root, flush_now, read, watch, write, Json};
use std::cell::Cell;
use std::rc::Rc;

fn primitive() -> impl Strategy<Value = Json> {
    prop_oneof![
        Just(Json::Null),
        any::<bool>().prop_map(Json::from),
        any::<i64>().prop_map(Json::from),
        any::<u64>().prop_map(Json::from),
        (-4i64..4).prop_map(Json::from),
        prop::num::f64::NORMAL.prop_map(Json::from),
        (-4i64..4).prop_map(|n| Json::from(n as f64)),
        (9007199254740990i64..9007199254740995).prop_map(Json::from),
        (9007199254740990i64..9007199254740995).prop_map(|n| Json::from(n as f64)),
        "[a-z]{0,8}".prop_map(Json::from),
    ]
}

proptest! {
    #[test]
    fn written_primitives_read_back(value in primitive(), key in "[a-z]{1,6}") {
        let state = create_root(json!({}));
        let node = state.child(key.as_str());
        write(&node, value.clone());
        prop_assert_eq!(read(&node), value);
    }

    #[test]
    fn writes_over_a_prior_primitive_read_back(prior in primitive(), value in primitive()) {
        let state = create_root(json!({ "v": prior }));
        let node = state.child("v");
        write(&node, value.clone());
        prop_assert_eq!(read(&node), value);
    }

    #[test]
    fn repeated_equal_writes_never_rerun(value in primitive(), repeats in 1usize..5) {
        let state = create_root(json!({ "v": value.clone() }));
        let node = state.child("v");
        let runs = Rc::new(Cell::new(0u32));
        let counter = runs.clone();
        let watcher = watch(&node, move |_, _| counter.set(counter.get() + 1));

        for _ in 0..repeats {
            write(&node, value.clone());
        }
        prop_assert!(!flush_now());
        prop_assert_eq!(runs.get(), 1);
        watcher.clear();
    }

    #[test]
    fn a_burst_of_writes_delivers_only_the_last(values in prop::collection::vec(any::<i64>(), 1..10)) {
        let state = create_root(json!({ "n": null }));
        let node = state.child("n");
        let last = Rc::new(Cell::new(None));
        let runs = Rc::new(Cell::new(0u32));
        let (seen, counter) = (last.clone(), runs.clone());
        let watcher = watch(&node, move |value, _| {
            seen.set(value.as_i64());
            counter.set(counter.get() + 1);
        });

        for value in &values {
            write(&node, *value);
        }
        flush_now();
        prop_assert_eq!(last.get(), values.last().copied());
        prop_assert_eq!(runs.get(), 2);
        watcher.clear();
    }

    #[test]
    fn rendered_lists_match_the_document(
        first in prop::collection::vec("[a-z]{1,3}", 0..6),
        second in prop::collection::vec("[a-z]{1,3}", 0..6),
    ) {
        let host = Rc::new(MemoryHost::new());
        let body = host.container("body");
        let state = create_root(json!({ "items": first.clone() }));
        let items = state.child("items");
        let mount = render(&host, &body, vec![
            Template::text("("),
            Template::Source(items.clone()),
            Template::text(")"),
        ]);
        prop_assert_eq!(body.text_content(), format!("({})", first.concat()));

        write(&items, json!(second.clone()));
        flush_now();
        prop_assert_eq!(body.text_content(), format!("({})", second.concat()));
        mount.unmount();
    }
}
