//! Grid behaviour across server re-renders.

use pretty_assertions::assert_eq;
use tweb_core::{KeyCode, keys};
use tweb_harness::{Driver, init_test_tracing};
use tweb_protocol::PayloadBuilder;
use tweb_runtime::{RemoteRequest, RuntimeConfig};

const ORDERS: &str = r#"<main>
<div id="orders" data-widget="grid" data-procedure="OrderBrowse" data-row-height="2" data-form="OrderForm">
<input id="loc-top" data-locator>
<table>
<thead><tr><th id="by-date" data-sort-key="date">Date</th><th id="by-total" data-sort-key="total">Total</th></tr></thead>
<tbody id="orders-body">
<tr id="o1a" data-row-key="o1" data-collapsed="false"><td id="o1-date">2024-01-02</td><td><button id="o1-toggle" data-toggle-expand>+</button></td></tr>
<tr id="o1b"><td id="o1-lines">3 lines</td><td></td></tr>
<tr id="o2a" data-row-key="o2" data-collapsed="true"><td id="o2-date">2024-01-05</td><td><button id="o2-toggle" data-toggle-expand>+</button></td></tr>
<tr id="o2b"><td id="o2-lines">1 line</td><td></td></tr>
<tr id="o3a" data-row-key="o3"><td id="o3-date"><input id="o3-qty" value="1"></td><td></td></tr>
<tr id="o3b"><td><input id="o3b-qty" value="2"></td><td></td></tr>
</tbody>
</table>
<input id="loc-bottom" data-locator>
<button id="clear" data-clear-locator>clear</button>
<button id="next" data-nav="next">next</button>
</div>
</main>"#;

/// The same records in a different order, echoing the given markers.
fn resorted(o1_collapsed: &str, o2_collapsed: &str) -> String {
    let body = format!(
        r#"<tbody id="orders-body">
<tr id="o2a" data-row-key="o2" data-collapsed="{o2_collapsed}"><td id="o2-date">2024-01-05</td><td><button id="o2-toggle" data-toggle-expand>+</button></td></tr>
<tr id="o2b"><td id="o2-lines">1 line</td><td></td></tr>
<tr id="o1a" data-row-key="o1" data-collapsed="{o1_collapsed}"><td id="o1-date">2024-01-02</td><td><button id="o1-toggle" data-toggle-expand>+</button></td></tr>
<tr id="o1b"><td id="o1-lines">3 lines</td><td></td></tr>
</tbody>"#
    );
    PayloadBuilder::new().element("orders-body", &body).build()
}

fn driver() -> Driver {
    init_test_tracing();
    let mut d = Driver::scripted(RuntimeConfig::default());
    d.load(ORDERS).unwrap();
    d
}

fn hidden(d: &Driver, id: &str) -> bool {
    d.node(id).is_some_and(|n| d.client().page().is_hidden(n))
}

fn events(d: &Driver, event: &str) -> Vec<RemoteRequest> {
    d.gateway()
        .requests()
        .iter()
        .filter(|r| r.call.event_name() == Some(event))
        .cloned()
        .collect()
}

#[test]
fn collapsed_record_survives_a_sort_re_render() {
    let mut d = driver();
    assert!(hidden(&d, "o2b"));
    assert!(!hidden(&d, "o1b"));

    d.gateway_mut().respond("OrderBrowse", resorted("false", "true"));
    d.click("by-date");

    let sort = events(&d, "sortchanged");
    assert_eq!(sort.len(), 1);
    assert_eq!(sort[0].call.params.get(keys::SORT), Some("date"));
    assert_eq!(sort[0].call.params.get(keys::COLLAPSED), Some("o2"));

    assert!(hidden(&d, "o2b"));
    assert!(!hidden(&d, "o1b"));
    let o2a = d.node("o2a").unwrap();
    assert_eq!(d.client().page().attr(o2a, "data-collapsed"), Some("true"));
}

#[test]
fn client_expand_flag_wins_over_a_stale_marker() {
    let mut d = driver();
    d.click("o1-toggle");
    assert!(hidden(&d, "o1b"));
    let notify = events(&d, "contract");
    assert_eq!(notify.len(), 1);
    assert_eq!(notify[0].call.params.get(keys::ROW_KEY), Some("o1"));

    // The server still renders o1 expanded; the client keeps it collapsed.
    d.gateway_mut().respond("OrderBrowse", resorted("false", "true"));
    d.click("by-total");
    assert!(hidden(&d, "o1b"));
    let sort = events(&d, "sortchanged");
    assert_eq!(sort[0].call.params.get(keys::COLLAPSED), Some("o1,o2"));
}

#[test]
fn selecting_a_record_marks_its_whole_block() {
    let mut d = driver();
    d.click("o2-lines");
    for (id, selected) in [
        ("o1a", false),
        ("o1b", false),
        ("o2a", true),
        ("o2b", true),
        ("o3a", false),
        ("o3b", false),
    ] {
        assert_eq!(d.has_class(id, "tw-selected"), selected, "{id}");
    }
    let clicked = events(&d, "rowclicked");
    assert_eq!(clicked[0].call.params.get(keys::ROW_KEY), Some("o2"));

    // Striping follows records, not physical rows.
    assert!(d.has_class("o1a", "tw-even") && d.has_class("o1b", "tw-even"));
    assert!(d.has_class("o2a", "tw-odd") && d.has_class("o2b", "tw-odd"));
}

#[test]
fn selection_is_cleared_when_its_record_leaves_the_page() {
    let mut d = driver();
    d.click("o3-date");
    assert_eq!(d.client().grid("orders").unwrap().selected(), Some("o3"));
    d.gateway_mut().respond("OrderBrowse", resorted("false", "true"));
    d.click("by-date");
    assert_eq!(d.client().grid("orders").unwrap().selected(), None);
}

#[test]
fn mirrored_locators_issue_one_call_per_commit() {
    let mut d = driver();
    d.input("loc-top", "acm");
    assert_eq!(d.value("loc-bottom").as_deref(), Some("acm"));
    assert!(events(&d, "locatorchanged").is_empty());

    d.change("loc-top", "acme");
    assert_eq!(d.value("loc-bottom").as_deref(), Some("acme"));
    d.press("loc-bottom", KeyCode::Enter);

    let located = events(&d, "locatorchanged");
    assert_eq!(located.len(), 1);
    assert_eq!(located[0].call.params.get(keys::LOCATE), Some("acme"));

    d.click("clear");
    assert_eq!(d.value("loc-top").as_deref(), Some(""));
    assert_eq!(d.value("loc-bottom").as_deref(), Some(""));
    assert_eq!(events(&d, "clearlocator").len(), 1);
}

#[test]
fn clearing_a_server_rendered_filter_tells_the_server() {
    let filtered = ORDERS.replace(
        r#"<input id="loc-top" data-locator>"#,
        r#"<input id="loc-top" data-locator value="acme">"#,
    );
    init_test_tracing();
    let mut d = Driver::scripted(RuntimeConfig::default());
    d.load(&filtered).unwrap();

    d.press("loc-top", KeyCode::Enter);
    assert!(events(&d, "locatorchanged").is_empty());

    d.click("clear");
    assert_eq!(d.value("loc-top").as_deref(), Some(""));
    let cleared = events(&d, "clearlocator");
    assert_eq!(cleared.len(), 1);
    assert_eq!(cleared[0].call.params.get(keys::LOCATE), None);
}

#[test]
fn paging_dims_until_the_grid_is_patched() {
    let mut d = driver();
    // No reply patches the grid: it stays dimmed.
    d.click("next");
    assert!(d.has_class("orders", "tw-busy"));
    let qty = d.node("o3-qty").unwrap();
    assert!(d.client().page().is_disabled(qty));
    let nav = events(&d, "nav");
    assert_eq!(nav[0].call.params.get(keys::REFRESH), Some("next"));

    // Busy grids ignore further paging.
    d.click("next");
    assert_eq!(events(&d, "nav").len(), 1);

    // A patch of the body restores it.
    d.client_mut().apply_payload(&resorted("false", "true"));
    assert!(!d.has_class("orders", "tw-busy"));
    let loc = d.node("loc-top").unwrap();
    assert!(!d.client().page().is_disabled(loc));
}

#[test]
fn keyboard_paging_and_row_movement() {
    let mut d = driver();
    d.press("o3-qty", KeyCode::PageDown);
    let nav = events(&d, "nav");
    assert_eq!(nav.len(), 1);
    assert_eq!(nav[0].call.params.get(keys::REFRESH), Some("next"));

    let mut d = driver();
    d.press("o3-qty", KeyCode::Down);
    assert_eq!(d.client().page().focused(), d.node("o3b-qty"));
    d.press("o3b-qty", KeyCode::Up);
    assert_eq!(d.client().page().focused(), d.node("o3-qty"));
}

#[test]
fn hover_highlights_the_record_without_calls() {
    let mut d = driver();
    d.hover("o1-lines");
    assert!(d.has_class("o1a", "tw-hover"));
    assert!(d.has_class("o1b", "tw-hover"));
    assert!(!d.has_class("o2a", "tw-hover"));
    assert!(d.gateway().requests().is_empty());
}
