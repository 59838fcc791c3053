// ============================================================================
// spark-observable - Reconciler Against the Memory Host
// End-to-end rendering: control flow, lists, elements and host operations
// ============================================================================

use rstest::rstest;
use serde_json::json;
use spark_observable::render::{
    button, conditional, conditional_else, div, el, join_space, map_sequence, map_sequence_reactive,
    render, switch, Branches, HostOp, HostTree, MemoryHost, MemoryNode, Template,
};
use spark_observable::{flush_now, json_text, live_watcher_count, mutate, read, write, Json, Node};
use std::rc::Rc;

fn setup() -> (Rc<MemoryHost>, MemoryNode) {
    let host = Rc::new(MemoryHost::new());
    let body = host.container("body");
    (host, body)
}

#[rstest]
#[case(json!(true), "yes")]
#[case(json!(1), "yes")]
#[case(json!("x"), "yes")]
#[case(json!([]), "yes")]
#[case(json!(false), "no")]
#[case(json!(0), "no")]
#[case(json!(""), "no")]
#[case(json!(null), "no")]
fn conditional_follows_truthiness(#[case] flag: Json, #[case] expected: &str) {
    let (host, body) = setup();
    let state = Node::root(json!({ "flag": flag }));
    let _mount = render(
        &host,
        &body,
        conditional_else(&state.child("flag"), || "yes".into(), || "no".into()),
    );
    assert_eq!(body.text_content(), expected);
}

#[test]
fn conditional_toggles_between_siblings() {
    let (host, body) = setup();
    let state = Node::root(json!({ "open": false }));
    let open = state.child("open");
    let _mount = render(
        &host,
        &body,
        vec![
            "<".into(),
            conditional(&open, || vec![Template::text("a"), Template::text("b")].into()),
            ">".into(),
        ],
    );
    assert_eq!(body.text_content(), "<>");

    write(&open, true);
    flush_now();
    assert_eq!(body.text_content(), "<ab>");

    write(&open, false);
    flush_now();
    assert_eq!(body.text_content(), "<>");
}

#[test]
fn switch_picks_branch_by_value() {
    let (host, body) = setup();
    let state = Node::root(json!({ "animal": "dog" }));
    let animal = state.child("animal");
    let branches = Branches::new()
        .case("dog", || "woof".into())
        .case("cow", || "moo".into());
    let _mount = render(&host, &body, switch(&animal, branches));
    assert_eq!(body.text_content(), "woof");

    write(&animal, "cow");
    flush_now();
    assert_eq!(body.text_content(), "moo");

    write(&animal, "cat");
    flush_now();
    assert_eq!(body.text_content(), "");
}

#[test]
fn empty_slot_reinserts_before_later_content() {
    let (host, body) = setup();
    let state = Node::root(json!({ "first": null, "second": "b" }));
    let _mount = render(
        &host,
        &body,
        vec![
            Template::Source(state.child("first")),
            vec![Template::Empty, Template::Source(state.child("second"))].into(),
            "!".into(),
        ],
    );
    assert_eq!(body.text_content(), "b!");

    write(&state.child("first"), "a");
    flush_now();
    assert_eq!(body.text_content(), "ab!");

    write(&state.child("second"), json!(["x", "y"]));
    flush_now();
    assert_eq!(body.text_content(), "axy!");
}

#[test]
fn map_sequence_rebuilds_on_list_writes_and_updates_items_in_place() {
    let (host, body) = setup();
    let state = Node::root(json!({ "todos": ["milk", "eggs"] }));
    let todos = state.child("todos");
    let _mount = render(
        &host,
        &body,
        el("ul").children(map_sequence(&todos, |item, _index| {
            el("li").children(Template::Source(item)).into()
        })),
    );
    assert_eq!(body.markup(), "<body><ul><li>milk</li><li>eggs</li></ul></body>");

    host.take_log();
    write(&todos.child(1usize), "bread");
    flush_now();
    let log = host.take_log();
    assert!(log.iter().all(|op| matches!(op, HostOp::SetText { .. })));
    assert_eq!(body.text_content(), "milkbread");

    mutate(&todos, |value| {
        if let Some(items) = value.as_array_mut() {
            items.push(json!("jam"));
        }
    });
    flush_now();
    assert_eq!(body.text_content(), "milkbreadjam");
}

#[test]
fn map_sequence_items_see_indices() {
    let (host, body) = setup();
    let list = Node::root(json!(["a", "b", "c"]));
    let _mount = render(
        &host,
        &body,
        map_sequence(&list, |item, index| {
            vec![Template::number(index as u64), Template::Source(item)].into()
        }),
    );
    assert_eq!(body.text_content(), "0a1b2c");

    write(&list, json!(["z"]));
    flush_now();
    assert_eq!(body.text_content(), "0z");
}

#[test]
fn map_sequence_reactive_passes_values() {
    let (host, body) = setup();
    let scores = Node::root(json!([1, 2]));
    let _mount = render(
        &host,
        &body,
        join_space([map_sequence_reactive(&scores, |value, _| {
            Template::text(format!("[{}]", json_text(&value)))
        })]),
    );
    assert_eq!(body.text_content(), "[1][2]");

    write(&scores.child(0usize), 10);
    flush_now();
    assert_eq!(body.text_content(), "[10][2]");
}

#[test]
fn computed_templates_track_their_reads() {
    let (host, body) = setup();
    let state = Node::root(json!({ "first": "Ada", "last": "Lovelace" }));
    let (first, last) = (state.child("first"), state.child("last"));
    let (f, l) = (first.clone(), last.clone());
    let _mount = render(
        &host,
        &body,
        Template::computed(move || {
            Template::text(format!("{} {}", json_text(&read(&f)), json_text(&read(&l))))
        }),
    );
    assert_eq!(body.text_content(), "Ada Lovelace");

    write(&first, "Augusta");
    flush_now();
    assert_eq!(body.text_content(), "Augusta Lovelace");
}

#[test]
fn counter_component() {
    let (host, body) = setup();
    let state = Node::root(json!({ "count": 0 }));
    let count = state.child("count");

    let clicks = count.clone();
    let _mount = render(
        &host,
        &body,
        div([
            button("+", move |_: &Json| {
                let next = read(&clicks).as_i64().unwrap_or(0) + 1;
                write(&clicks, next);
            })
            .into(),
            el("span").children(&count).into(),
        ]),
    );
    assert_eq!(body.markup(), "<body><div><button>+</button><span>0</span></div></body>");

    let plus = body.children()[0].children()[0].clone();
    plus.dispatch("click", &Json::Null);
    plus.dispatch("click", &Json::Null);
    flush_now();
    assert_eq!(body.markup(), "<body><div><button>+</button><span>2</span></div></body>");
}

#[test]
fn element_inside_dynamic_slot_is_replaced_wholesale() {
    let (host, body) = setup();
    let state = Node::root(json!({ "level": 1 }));
    let level = state.child("level");
    let _mount = render(
        &host,
        &body,
        Template::dynamic(&level, |value: Json| {
            el(format!("h{}", json_text(&value))).children("title").into()
        }),
    );
    assert_eq!(body.markup(), "<body><h1>title</h1></body>");

    write(&level, 2);
    flush_now();
    assert_eq!(body.markup(), "<body><h2>title</h2></body>");
    assert_eq!(body.children().len(), 1);
}

#[test]
fn host_nodes_rendered_again_keep_identity() {
    let (host, body) = setup();
    let kept = host.create_leaf("kept");
    let state = Node::root(json!({ "before": false }));
    let before = state.child("before");

    let node = kept.clone();
    let _mount = render(
        &host,
        &body,
        Template::dynamic(&before, move |value: Json| {
            let mut items = Vec::new();
            if value == Json::Bool(true) {
                items.push(Template::text("new"));
            }
            items.push(Template::HostNode(node.clone()));
            Template::Sequence(items)
        }),
    );
    host.take_log();

    write(&before, true);
    flush_now();
    assert_eq!(body.text_content(), "newkept");
    assert_eq!(body.children()[1], kept);
    let removed_kept = host
        .take_log()
        .into_iter()
        .any(|op| op == HostOp::Remove { container: body.id(), node: kept.id() });
    assert!(!removed_kept);
}

#[test]
fn unmount_tears_down_nested_watchers() {
    let (host, body) = setup();
    let baseline = live_watcher_count();
    let state = Node::root(json!({ "items": ["a", "b"], "title": "t" }));
    let mount = render(
        &host,
        &body,
        vec![
            el("h1").attr("title", &state.child("title")).children(&state.child("title")).into(),
            map_sequence(&state.child("items"), |item, _| Template::Source(item)),
        ],
    );
    assert!(live_watcher_count() > baseline);
    assert_eq!(mount.nodes().len(), 3);
    assert_eq!(mount.container(), &body);

    mount.unmount();
    assert_eq!(live_watcher_count(), baseline);
    assert!(body.children().is_empty());
    assert_eq!(state.child("title").watcher_count(), 0);
}

#[test]
fn nested_scope_content_is_isolated() {
    let (host, body) = setup();
    let state = Node::root(json!({ "label": "inside" }));
    let _mount = render(
        &host,
        &body,
        el("x-panel").shadow(&state.child("label")).children("outside"),
    );
    let panel = body.children()[0].clone();
    let scope = panel.nested_scope().expect("scope attached");
    assert_eq!(scope.text_content(), "inside");
    assert_eq!(panel.text_content(), "outside");

    write(&state.child("label"), "changed");
    flush_now();
    assert_eq!(scope.text_content(), "changed");
}

#[test]
fn rendering_appends_after_existing_content() {
    let (host, body) = setup();
    let existing = host.create_leaf("existing ");
    host.insert_before(&body, &existing, None);
    let _mount = render(&host, &body, "rendered");
    assert_eq!(body.text_content(), "existing rendered");
}

#[test]
fn host_node_moved_between_containers_leaves_its_old_slot() {
    let (host, body) = setup();
    let shared = host.create_leaf("x");
    let state = Node::root(json!({ "top": true, "inner": false }));
    let (top, inner) = (state.child("top"), state.child("inner"));

    let (outer, nested) = (shared.clone(), shared.clone());
    let _mount = render(
        &host,
        &body,
        vec![
            Template::dynamic(&top, move |value: Json| match value {
                Json::Bool(true) => Template::HostNode(outer.clone()),
                _ => Template::Empty,
            }),
            el("p")
                .children(Template::dynamic(&inner, move |value: Json| match value {
                    Json::Bool(true) => Template::HostNode(nested.clone()),
                    _ => Template::Empty,
                }))
                .into(),
        ],
    );
    assert_eq!(body.markup(), "<body>x<p></p></body>");

    write(&inner, true);
    flush_now();
    assert_eq!(body.markup(), "<body><p>x</p></body>");

    write(&top, false);
    flush_now();
    assert_eq!(body.markup(), "<body><p>x</p></body>");

    write(&top, true);
    flush_now();
    assert_eq!(body.markup(), "<body>x<p></p></body>");

    write(&inner, false);
    flush_now();
    assert_eq!(body.markup(), "<body>x<p></p></body>");
    assert_eq!(shared.parent().as_ref(), Some(&body));
}
