// ============================================================================
// spark-observable - Markup Helpers
// Shorthands for common element shapes
// ============================================================================

use crate::core::types::Json;

use super::element::{el, ElementTemplate};
use super::host::HostTree;
use super::template::Template;

/// Element with the given tag and children.
pub fn tag<H: HostTree>(name: &str, children: impl IntoIterator<Item = Template<H>>) -> ElementTemplate<H> {
    el(name).children(Template::sequence(children))
}

pub fn div<H: HostTree>(children: impl IntoIterator<Item = Template<H>>) -> ElementTemplate<H> {
    tag("div", children)
}

pub fn br<H: HostTree>() -> ElementTemplate<H> {
    el("br")
}

/// A button labelled `label` that calls `on_click` on every click.
pub fn button<H: HostTree>(label: &str, on_click: impl Fn(&H::Event) + 'static) -> ElementTemplate<H> {
    el("button").on("click", on_click).children(label)
}

pub fn flex_row<H: HostTree>(children: impl IntoIterator<Item = Template<H>>) -> ElementTemplate<H> {
    flex("row", children)
}

pub fn flex_column<H: HostTree>(children: impl IntoIterator<Item = Template<H>>) -> ElementTemplate<H> {
    flex("column", children)
}

fn flex<H: HostTree>(direction: &str, children: impl IntoIterator<Item = Template<H>>) -> ElementTemplate<H> {
    div(children)
        .style("display", "flex")
        .style("flex-direction", Json::from(direction))
}

/// Interleave `items` with a fresh separator between each pair.
pub fn join<H: HostTree>(
    items: impl IntoIterator<Item = Template<H>>,
    mut separator: impl FnMut() -> Template<H>,
) -> Template<H> {
    let mut joined = Vec::new();
    for (index, item) in items.into_iter().enumerate() {
        if index > 0 {
            joined.push(separator());
        }
        joined.push(item);
    }
    Template::Sequence(joined)
}

pub fn join_space<H: HostTree>(items: impl IntoIterator<Item = Template<H>>) -> Template<H> {
    join(items, || Template::text(" "))
}

pub fn join_br<H: HostTree>(items: impl IntoIterator<Item = Template<H>>) -> Template<H> {
    join(items, || br().into())
}

/// Unordered list, one `li` per item.
pub fn ul<H: HostTree>(items: impl IntoIterator<Item = Template<H>>) -> ElementTemplate<H> {
    list("ul", items)
}

/// Ordered list, one `li` per item.
pub fn ol<H: HostTree>(items: impl IntoIterator<Item = Template<H>>) -> ElementTemplate<H> {
    list("ol", items)
}

fn list<H: HostTree>(name: &str, items: impl IntoIterator<Item = Template<H>>) -> ElementTemplate<H> {
    tag(name, items.into_iter().map(|item| el("li").children(item).into()))
}

/// A `style` element holding a stylesheet.
pub fn style_sheet<H: HostTree>(css: &str) -> ElementTemplate<H> {
    el("style").children(css)
}

// =============================================================================
// TESTS
// =============================================================================
