#![forbid(unsafe_code)]

//! Grid ("browse") client.
//!
//! The server renders a page of records as table rows; a record may span
//! several physical rows (`data-row-height`). The client keeps what the
//! markup cannot carry across re-renders and re-applies it after every
//! patch:
//!
//! - **Selection**: the selected record key. Always names a record in the
//!   last-applied markup, or is cleared.
//! - **Striping**: even/odd classes by record block, not by physical row.
//! - **Expand flags**: owned by the client. A record seen for the first time
//!   adopts the server's `data-collapsed` marker; afterwards the client flag
//!   wins and is written back. Collapsed keys ride along with every request.
//!
//! Paging dims the grid and disables its inputs until the reply patches it.
//! A reply that never arrives leaves the grid dimmed; there is no timeout.

use ahash::AHashMap;
use tracing::{debug, warn};
use tweb_core::{
    Action, CallEvent, KeyCode, KeyEvent, NavDirection, RefreshMode, RemoteCall, keys,
};
use tweb_dom::{Dom, NodeId};
use tweb_protocol::PopupRequest;

use crate::{Decoration, Widget, WidgetOutcome, widget_kind};

/// `data-widget` value of a grid root.
pub const GRID_KIND: &str = "grid";

const ROW_KEY_ATTR: &str = "data-row-key";
const COLLAPSED_ATTR: &str = "data-collapsed";
const LOCATOR_ATTR: &str = "data-locator";
const IMMEDIATE_ATTR: &str = "data-locate-immediate";
const DIMMED_MARK: &str = "data-tw-dimmed";

/// Physical rows of one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowBlock {
    pub key: String,
    pub rows: Vec<NodeId>,
}

impl RowBlock {
    #[must_use]
    pub fn first(&self) -> Option<NodeId> {
        self.rows.first().copied()
    }
}

/// Local view state of one grid.
#[derive(Debug, Clone)]
pub struct GridViewState {
    pub selected: Option<String>,
    pub column_focus: usize,
    pub row_height: usize,
    pub locate_text: String,
    pub last_sent_locate: String,
    pub sort_key: Option<String>,
    pub busy: bool,
    pub suspended: bool,
    pub hover: Option<String>,
    expanded: AHashMap<String, bool>,
}

impl Default for GridViewState {
    fn default() -> Self {
        Self {
            selected: None,
            column_focus: 0,
            row_height: 1,
            locate_text: String::new(),
            last_sent_locate: String::new(),
            sort_key: None,
            busy: false,
            suspended: false,
            hover: None,
            expanded: AHashMap::new(),
        }
    }
}

impl GridViewState {
    /// Client-held expand flag, if the record has been seen.
    #[must_use]
    pub fn is_expanded(&self, key: &str) -> Option<bool> {
        self.expanded.get(key).copied()
    }

    pub fn set_expanded(&mut self, key: &str, expanded: bool) {
        self.expanded.insert(key.to_string(), expanded);
    }

    /// Keys of collapsed records, sorted.
    #[must_use]
    pub fn collapsed_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self
            .expanded
            .iter()
            .filter(|(_, expanded)| !**expanded)
            .map(|(key, _)| key.as_str())
            .collect();
        keys.sort_unstable();
        keys
    }
}

/// Client half of a server-rendered grid.
#[derive(Debug, Clone)]
pub struct GridClient {
    id: String,
    procedure: String,
    state: GridViewState,
}

impl GridClient {
    /// Bind to a grid root. `None` if `root` is not a grid or has no id.
    #[must_use]
    pub fn from_markup(dom: &Dom, root: NodeId) -> Option<Self> {
        if widget_kind(dom, root) != Some(GRID_KIND) {
            return None;
        }
        let id = dom.attr(root, "id").filter(|v| !v.is_empty())?.to_string();
        let mut grid = Self {
            procedure: String::new(),
            id,
            state: GridViewState::default(),
        };
        grid.read_config(dom, root);
        Some(grid)
    }

    fn read_config(&mut self, dom: &Dom, root: NodeId) {
        self.procedure = dom
            .attr(root, "data-procedure")
            .filter(|v| !v.is_empty())
            .unwrap_or(self.id.as_str())
            .to_string();
        self.state.row_height = dom
            .attr(root, "data-row-height")
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|&h| h > 0)
            .unwrap_or(1);
        if let Some(sort) = dom.attr(root, "data-sort").filter(|v| !v.is_empty()) {
            self.state.sort_key = Some(sort.to_string());
        }
        // A rendered locate value is the filter the server applied.
        if let Some(locator) = dom.elements_with_attr(root, LOCATOR_ATTR).first() {
            let text = dom.value(*locator).to_string();
            self.state.locate_text.clone_from(&text);
            self.state.last_sent_locate = text;
        }
    }

    #[must_use]
    pub fn procedure(&self) -> &str {
        &self.procedure
    }

    #[must_use]
    pub fn state(&self) -> &GridViewState {
        &self.state
    }

    #[must_use]
    pub fn selected(&self) -> Option<&str> {
        self.state.selected.as_deref()
    }

    /// Neither dimmed by paging nor suspended behind a popup.
    #[must_use]
    pub fn is_interactive(&self) -> bool {
        !self.state.busy && !self.state.suspended
    }

    // --- structure --------------------------------------------------------

    fn is_physical_row(dom: &Dom, node: NodeId) -> bool {
        dom.tag_name(node) == Some("tr")
            && dom
                .parent(node)
                .and_then(|p| dom.tag_name(p))
                .is_some_and(|tag| tag == "tbody")
    }

    /// Physical body rows, in document order.
    #[must_use]
    pub fn rows(&self, dom: &Dom) -> Vec<NodeId> {
        let Some(root) = self.root(dom) else {
            return Vec::new();
        };
        dom.descendants(root)
            .into_iter()
            .filter(|&n| Self::is_physical_row(dom, n))
            .collect()
    }

    /// Rows grouped into record blocks of `row_height`.
    #[must_use]
    pub fn blocks(&self, dom: &Dom) -> Vec<RowBlock> {
        self.rows(dom)
            .chunks(self.state.row_height.max(1))
            .map(|chunk| RowBlock {
                key: chunk
                    .iter()
                    .find_map(|&r| dom.attr(r, ROW_KEY_ATTR).filter(|k| !k.is_empty()))
                    .unwrap_or_default()
                    .to_string(),
                rows: chunk.to_vec(),
            })
            .collect()
    }

    /// Block containing `node`.
    #[must_use]
    pub fn block_of(&self, dom: &Dom, node: NodeId) -> Option<RowBlock> {
        let row = dom.closest(node, Self::is_physical_row)?;
        self.blocks(dom)
            .into_iter()
            .find(|block| block.rows.contains(&row))
    }

    fn column_of(dom: &Dom, node: NodeId) -> Option<usize> {
        let cell = dom.closest(node, |d, n| matches!(d.tag_name(n), Some("td" | "th")))?;
        let row = dom.parent(cell)?;
        dom.element_children(row).iter().position(|&c| c == cell)
    }

    fn base_call(&self, event: CallEvent) -> RemoteCall {
        RemoteCall::event(&self.procedure, event)
            .param(keys::SORT, self.state.sort_key.clone().unwrap_or_default())
            .param(keys::COLLAPSED, self.state.collapsed_keys().join(","))
    }

    // --- visual state -----------------------------------------------------

    /// Re-derive selection, striping, hover and expand visuals.
    ///
    /// `selection` replaces the selected key when given; an empty string
    /// clears it.
    pub fn refresh(&mut self, dom: &mut Dom, decoration: &Decoration, selection: Option<&str>) {
        let blocks = self.blocks(dom);
        if let Some(key) = selection {
            self.state.selected = (!key.is_empty()).then(|| key.to_string());
        }
        if let Some(selected) = self.state.selected.as_deref()
            && !blocks.iter().any(|b| b.key == selected)
        {
            debug!(grid = %self.id, key = selected, "selected record left the page");
            self.state.selected = None;
        }
        if let Some(hover) = self.state.hover.as_deref()
            && !blocks.iter().any(|b| b.key == hover)
        {
            self.state.hover = None;
        }

        for (index, block) in blocks.iter().enumerate() {
            let has_key = !block.key.is_empty();
            let selected = has_key && self.state.selected.as_deref() == Some(block.key.as_str());
            let hovered = has_key && self.state.hover.as_deref() == Some(block.key.as_str());
            for &row in &block.rows {
                dom.set_class(row, &decoration.stripe_even, index % 2 == 0);
                dom.set_class(row, &decoration.stripe_odd, index % 2 == 1);
                dom.set_class(row, &decoration.selected, selected);
                dom.set_class(row, &decoration.hover, hovered);
            }
        }
        self.apply_expand(dom, &blocks);
    }

    fn apply_expand(&mut self, dom: &mut Dom, blocks: &[RowBlock]) {
        for block in blocks {
            let Some(first) = block.first() else {
                continue;
            };
            if block.key.is_empty() {
                continue;
            }
            let expanded = match self.state.is_expanded(&block.key) {
                Some(expanded) => expanded,
                None => match dom.attr(first, COLLAPSED_ATTR) {
                    Some(marker) => {
                        let expanded = !marker.trim().eq_ignore_ascii_case("true");
                        self.state.set_expanded(&block.key, expanded);
                        expanded
                    }
                    None => continue,
                },
            };
            dom.set_attr(first, COLLAPSED_ATTR, if expanded { "false" } else { "true" });
            for &row in block.rows.iter().skip(1) {
                dom.set_hidden(row, !expanded);
            }
        }
    }

    fn dim(&mut self, dom: &mut Dom, decoration: &Decoration) {
        self.state.busy = true;
        let Some(root) = self.root(dom) else {
            return;
        };
        dom.add_class(root, &decoration.busy);
        let controls: Vec<NodeId> = dom
            .descendants(root)
            .into_iter()
            .filter(|&n| {
                matches!(
                    dom.tag_name(n),
                    Some("input" | "select" | "textarea" | "button")
                ) && !dom.is_disabled(n)
            })
            .collect();
        for control in controls {
            dom.set_disabled(control, true);
            dom.set_attr(control, DIMMED_MARK, "");
        }
    }

    fn undim(&mut self, dom: &mut Dom, decoration: &Decoration) {
        self.state.busy = false;
        let Some(root) = self.root(dom) else {
            return;
        };
        dom.remove_class(root, &decoration.busy);
        for control in dom.elements_with_attr(root, DIMMED_MARK) {
            dom.set_disabled(control, false);
            dom.remove_attr(control, DIMMED_MARK);
        }
    }

    /// The interpreter patched part or all of this grid.
    pub fn after_patch(&mut self, dom: &mut Dom, decoration: &Decoration) {
        self.undim(dom, decoration);
        self.refresh(dom, decoration, None);
    }

    /// A popup spawned by this grid opened.
    pub fn suspend(&mut self, dom: &mut Dom, decoration: &Decoration) {
        self.state.suspended = true;
        if let Some(root) = self.root(dom) {
            dom.add_class(root, &decoration.suspended);
        }
    }

    /// The popup spawned by this grid closed.
    pub fn resume(&mut self, dom: &mut Dom, decoration: &Decoration, selection: Option<&str>) {
        self.state.suspended = false;
        if let Some(root) = self.root(dom) {
            dom.remove_class(root, &decoration.suspended);
        }
        self.refresh(dom, decoration, selection);
    }

    // --- interaction ------------------------------------------------------

    fn click_mode(&self, dom: &Dom, block: &RowBlock) -> Option<String> {
        block
            .rows
            .iter()
            .find_map(|&r| dom.attr(r, "data-click"))
            .or_else(|| self.root(dom).and_then(|root| dom.attr(root, "data-click")))
            .map(|mode| mode.trim().to_ascii_lowercase())
    }

    /// Single click anywhere inside a row.
    pub fn row_clicked(
        &mut self,
        dom: &mut Dom,
        decoration: &Decoration,
        node: NodeId,
    ) -> Vec<WidgetOutcome> {
        if !self.is_interactive() {
            return Vec::new();
        }
        let Some(block) = self.block_of(dom, node).filter(|b| !b.key.is_empty()) else {
            return Vec::new();
        };
        if let Some(column) = Self::column_of(dom, node) {
            self.state.column_focus = column;
        }
        self.refresh(dom, decoration, Some(&block.key));

        let mut out = vec![WidgetOutcome::Call(
            self.base_call(CallEvent::RowClicked)
                .param(keys::ROW_KEY, &block.key),
        )];
        match self.click_mode(dom, &block).as_deref() {
            Some("select") => out.push(WidgetOutcome::Select {
                row_key: block.key.clone(),
            }),
            Some("change") => out.extend(self.open_form(dom, Action::Change, &block.key, Some(&block), node)),
            _ => {}
        }
        out
    }

    /// Double click on a row opens it for change.
    pub fn row_double_clicked(
        &mut self,
        dom: &mut Dom,
        decoration: &Decoration,
        node: NodeId,
    ) -> Vec<WidgetOutcome> {
        if !self.is_interactive() {
            return Vec::new();
        }
        let Some(block) = self.block_of(dom, node).filter(|b| !b.key.is_empty()) else {
            return Vec::new();
        };
        self.refresh(dom, decoration, Some(&block.key));
        self.open_form(dom, Action::Change, &block.key, Some(&block), node)
    }

    /// Pointer entered `node` (or left the grid, for `None`).
    pub fn hover(&mut self, dom: &mut Dom, decoration: &Decoration, node: Option<NodeId>) {
        if !self.is_interactive() {
            return;
        }
        let key = node
            .and_then(|n| self.block_of(dom, n))
            .map(|b| b.key)
            .filter(|k| !k.is_empty());
        if key == self.state.hover {
            return;
        }
        self.state.hover = key;
        for block in self.blocks(dom) {
            let hovered = !block.key.is_empty() && self.state.hover.as_deref() == Some(block.key.as_str());
            for &row in &block.rows {
                dom.set_class(row, &decoration.hover, hovered);
            }
        }
    }

    fn mirror_locators(&self, dom: &mut Dom, text: &str) {
        let Some(root) = self.root(dom) else {
            return;
        };
        for locator in dom.elements_with_attr(root, LOCATOR_ATTR) {
            dom.set_value(locator, text);
        }
    }

    fn locate_call(&mut self) -> Option<WidgetOutcome> {
        if self.state.locate_text == self.state.last_sent_locate {
            return None;
        }
        self.state.last_sent_locate = self.state.locate_text.clone();
        let call = if self.state.locate_text.is_empty() {
            self.base_call(CallEvent::ClearLocator)
        } else {
            self.base_call(CallEvent::LocatorChanged)
                .param(keys::LOCATE, &self.state.locate_text)
        };
        Some(WidgetOutcome::Call(call))
    }

    /// Keystroke in a locate field.
    pub fn locator_input(&mut self, dom: &mut Dom, node: NodeId, text: &str) -> Vec<WidgetOutcome> {
        if !self.is_interactive() {
            return Vec::new();
        }
        self.state.locate_text = text.to_string();
        self.mirror_locators(dom, text);
        if dom.flag(node, IMMEDIATE_ATTR) {
            self.locate_call().into_iter().collect()
        } else {
            Vec::new()
        }
    }

    /// Blur or enter in a locate field.
    pub fn locator_commit(&mut self, dom: &mut Dom, node: NodeId) -> Vec<WidgetOutcome> {
        if !self.is_interactive() {
            return Vec::new();
        }
        let text = dom.value(node).to_string();
        self.state.locate_text.clone_from(&text);
        self.mirror_locators(dom, &text);
        self.locate_call().into_iter().collect()
    }

    /// Empty every locate field and tell the server.
    pub fn clear_locator(&mut self, dom: &mut Dom) -> Vec<WidgetOutcome> {
        if !self.is_interactive() {
            return Vec::new();
        }
        self.state.locate_text.clear();
        self.state.last_sent_locate.clear();
        self.mirror_locators(dom, "");
        vec![WidgetOutcome::Call(self.base_call(CallEvent::ClearLocator))]
    }

    /// Column header click. Ordering is the server's job.
    pub fn sort_clicked(&mut self, dom: &Dom, node: NodeId) -> Vec<WidgetOutcome> {
        if !self.is_interactive() {
            return Vec::new();
        }
        let Some(key) = dom
            .closest_with_attr(node, "data-sort-key")
            .and_then(|n| dom.attr(n, "data-sort-key"))
            .filter(|k| !k.is_empty())
        else {
            return Vec::new();
        };
        self.state.sort_key = Some(key.to_string());
        vec![WidgetOutcome::Call(self.base_call(CallEvent::SortChanged))]
    }

    /// Paging. Dims the grid until the reply patches it.
    pub fn navigate(
        &mut self,
        dom: &mut Dom,
        decoration: &Decoration,
        direction: NavDirection,
    ) -> Vec<WidgetOutcome> {
        if !self.is_interactive() {
            return Vec::new();
        }
        self.dim(dom, decoration);
        vec![WidgetOutcome::Call(
            self.base_call(CallEvent::Nav)
                .param(keys::REFRESH, RefreshMode::Page(direction).as_str()),
        )]
    }

    /// Row CRUD button. The record comes from the button's row, else the
    /// current selection; insert never carries one.
    pub fn crud_clicked(&mut self, dom: &Dom, node: NodeId, action: Action) -> Vec<WidgetOutcome> {
        if !self.is_interactive() {
            return Vec::new();
        }
        let block = self.block_of(dom, node);
        let key = if action == Action::Insert {
            String::new()
        } else {
            block
                .as_ref()
                .map(|b| b.key.clone())
                .filter(|k| !k.is_empty())
                .or_else(|| self.state.selected.clone())
                .unwrap_or_default()
        };
        if action.needs_row_key() && key.is_empty() {
            debug!(grid = %self.id, %action, "no record for row action");
            return Vec::new();
        }
        let block = block.filter(|b| b.key == key);
        self.open_form(dom, action, &key, block.as_ref(), node)
    }

    fn open_form(
        &self,
        dom: &Dom,
        action: Action,
        key: &str,
        block: Option<&RowBlock>,
        trigger: NodeId,
    ) -> Vec<WidgetOutcome> {
        let Some(root) = self.root(dom) else {
            return Vec::new();
        };
        let per_action = format!("data-form-{}", action.name());
        let target = block
            .into_iter()
            .flat_map(|b| b.rows.iter())
            .find_map(|&r| dom.attr(r, &per_action))
            .or_else(|| dom.attr(root, &per_action))
            .or_else(|| dom.attr(root, "data-form"))
            .filter(|t| !t.is_empty());
        let Some(target) = target else {
            warn!(grid = %self.id, %action, "no form target for row action");
            return Vec::new();
        };
        let title = dom
            .closest_with_attr(trigger, "data-open-title")
            .and_then(|n| dom.attr(n, "data-open-title"))
            .unwrap_or_default();

        let mut request = PopupRequest::new(target, action)
            .row_key(key)
            .title(title)
            .browse_anchor(&self.id)
            .called_from(&self.procedure);
        request.parent_procedure = Some(self.procedure.clone());
        let open = WidgetOutcome::Open(request);

        if action == Action::Delete {
            let prompt = dom
                .closest_with_attr(trigger, "data-confirm")
                .and_then(|n| dom.attr(n, "data-confirm"))
                .map(str::to_string);
            vec![WidgetOutcome::Confirm {
                prompt,
                then: Box::new(open),
            }]
        } else {
            vec![open]
        }
    }

    /// Expand/collapse toggle. Local first, then a fire-and-forget call.
    pub fn toggle_expand(&mut self, dom: &mut Dom, node: NodeId) -> Vec<WidgetOutcome> {
        if !self.is_interactive() {
            return Vec::new();
        }
        let Some(block) = self.block_of(dom, node).filter(|b| !b.key.is_empty()) else {
            return Vec::new();
        };
        let current = self.state.is_expanded(&block.key).unwrap_or_else(|| {
            block
                .first()
                .and_then(|r| dom.attr(r, COLLAPSED_ATTR))
                .is_none_or(|m| !m.trim().eq_ignore_ascii_case("true"))
        });
        let expanded = !current;
        self.state.set_expanded(&block.key, expanded);
        self.apply_expand(dom, std::slice::from_ref(&block));

        let event = if expanded {
            CallEvent::Expand
        } else {
            CallEvent::Contract
        };
        vec![WidgetOutcome::Notify(
            self.base_call(event).param(keys::ROW_KEY, &block.key),
        )]
    }

    /// `data-select` control: pick the row's record (or the selection).
    pub fn select_clicked(&mut self, dom: &Dom, node: NodeId) -> Vec<WidgetOutcome> {
        if !self.is_interactive() {
            return Vec::new();
        }
        let key = self
            .block_of(dom, node)
            .map(|b| b.key)
            .filter(|k| !k.is_empty())
            .or_else(|| self.state.selected.clone());
        match key {
            Some(row_key) => vec![WidgetOutcome::Select { row_key }],
            None => Vec::new(),
        }
    }

    /// Keyboard inside the grid.
    pub fn key_pressed(
        &mut self,
        dom: &mut Dom,
        decoration: &Decoration,
        node: NodeId,
        key: &KeyEvent,
    ) -> Vec<WidgetOutcome> {
        if !key.is_down() || !self.is_interactive() {
            return Vec::new();
        }
        match key.code {
            KeyCode::Up => {
                self.move_vertical(dom, node, false);
                Vec::new()
            }
            KeyCode::Down => {
                self.move_vertical(dom, node, true);
                Vec::new()
            }
            KeyCode::PageUp => self.navigate(dom, decoration, NavDirection::Previous),
            KeyCode::PageDown => self.navigate(dom, decoration, NavDirection::Next),
            KeyCode::Home if key.ctrl() => self.navigate(dom, decoration, NavDirection::First),
            KeyCode::End if key.ctrl() => self.navigate(dom, decoration, NavDirection::Last),
            _ => Vec::new(),
        }
    }

    /// Focus the same column of the adjacent visible row.
    fn move_vertical(&mut self, dom: &mut Dom, node: NodeId, down: bool) -> bool {
        let Some(column) = Self::column_of(dom, node) else {
            return false;
        };
        let Some(row) = dom.closest(node, Self::is_physical_row) else {
            return false;
        };
        let rows: Vec<NodeId> = self
            .rows(dom)
            .into_iter()
            .filter(|&r| !dom.is_hidden(r))
            .collect();
        let Some(index) = rows.iter().position(|&r| r == row) else {
            return false;
        };
        let next = if down {
            rows.get(index + 1)
        } else {
            index.checked_sub(1).and_then(|i| rows.get(i))
        };
        let Some(&next) = next else {
            return false;
        };
        let Some(&cell) = dom.element_children(next).get(column) else {
            return false;
        };
        let target = if dom.is_focusable(cell) {
            Some(cell)
        } else {
            dom.first_focusable_in(cell)
        };
        match target {
            Some(target) => {
                self.state.column_focus = column;
                dom.focus(target)
            }
            None => false,
        }
    }
}

impl Widget for GridClient {
    fn id(&self) -> &str {
        &self.id
    }

    fn rebind(&mut self, dom: &mut Dom, decoration: &Decoration) {
        let Some(root) = self.root(dom) else {
            return;
        };
        self.read_config(dom, root);
        let selection = dom.attr(root, "data-selected").map(str::to_string);
        self.undim(dom, decoration);
        if self.state.suspended {
            dom.add_class(root, &decoration.suspended);
        }
        self.refresh(dom, decoration, selection.as_deref());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use tweb_core::Modifiers;

    const GRID: &str = r#"<div id="g" data-widget="grid" data-procedure="CustomerBrowse" data-row-height="2" data-form="CustomerForm">
<input id="loc1" data-locator><input id="loc2" data-locator data-locate-immediate>
<table><thead><tr><th id="h-name" data-sort-key="name">Name</th></tr></thead>
<tbody>
<tr id="r1a" data-row-key="k1" data-collapsed="false"><td id="c1a0">a</td><td><button id="del1" data-crud="delete">x</button></td></tr>
<tr id="r1b"><td>more</td></tr>
<tr id="r2a" data-row-key="k2" data-collapsed="true" data-form-change="SpecialForm"><td id="c2a0">b</td></tr>
<tr id="r2b"><td>more</td></tr>
<tr id="r3a" data-row-key="k3"><td id="c3a0">c</td></tr>
<tr id="r3b"><td>more</td></tr>
</tbody></table>
<button id="next" data-nav="next">next</button>
</div>"#;

    fn setup() -> (Dom, GridClient, Decoration) {
        let mut dom = Dom::parse(GRID).unwrap();
        let deco = Decoration::default();
        let root = dom.by_id("g").unwrap();
        let mut grid = GridClient::from_markup(&dom, root).unwrap();
        grid.rebind(&mut dom, &deco);
        (dom, grid, deco)
    }

    fn id(dom: &Dom, id: &str) -> NodeId {
        dom.by_id(id).unwrap()
    }

    fn call_of(outcome: &WidgetOutcome) -> &RemoteCall {
        match outcome {
            WidgetOutcome::Call(call) | WidgetOutcome::Notify(call) => call,
            other => panic!("expected a call, got {other:?}"),
        }
    }

    #[test]
    fn binds_configuration_from_markup() {
        let (_, grid, _) = setup();
        assert_eq!(grid.id(), "g");
        assert_eq!(grid.procedure(), "CustomerBrowse");
        assert_eq!(grid.state().row_height, 2);
    }

    #[test]
    fn non_grid_markup_does_not_bind() {
        let dom = Dom::parse(r#"<div id="f" data-widget="form"></div>"#).unwrap();
        assert!(GridClient::from_markup(&dom, id(&dom, "f")).is_none());
    }

    #[test]
    fn stripes_follow_record_blocks() {
        let (dom, _, deco) = setup();
        for (row, even) in [("r1a", true), ("r1b", true), ("r2a", false), ("r3b", true)] {
            assert_eq!(dom.has_class(id(&dom, row), &deco.stripe_even), even, "{row}");
            assert_eq!(dom.has_class(id(&dom, row), &deco.stripe_odd), !even, "{row}");
        }
    }

    #[test]
    fn refresh_marks_exactly_the_selected_block() {
        let (mut dom, mut grid, deco) = setup();
        grid.refresh(&mut dom, &deco, Some("k2"));
        let marked: Vec<&str> = ["r1a", "r1b", "r2a", "r2b", "r3a", "r3b"]
            .into_iter()
            .filter(|r| dom.has_class(id(&dom, r), &deco.selected))
            .collect();
        assert_eq!(marked, vec!["r2a", "r2b"]);
    }

    #[test]
    fn selection_of_a_vanished_record_is_cleared() {
        let (mut dom, mut grid, deco) = setup();
        grid.refresh(&mut dom, &deco, Some("gone"));
        assert_eq!(grid.selected(), None);
        grid.refresh(&mut dom, &deco, Some("k1"));
        dom.replace_with_html("r1a", "").unwrap();
        dom.replace_with_html("r1b", "").unwrap();
        grid.after_patch(&mut dom, &deco);
        assert_eq!(grid.selected(), None);
    }

    #[test]
    fn collapsed_marker_is_adopted_on_first_sight() {
        let (dom, grid, _) = setup();
        assert_eq!(grid.state().is_expanded("k1"), Some(true));
        assert_eq!(grid.state().is_expanded("k2"), Some(false));
        assert_eq!(grid.state().is_expanded("k3"), None);
        assert!(dom.is_hidden(id(&dom, "r2b")));
        assert!(!dom.is_hidden(id(&dom, "r1b")));
    }

    #[test]
    fn row_click_selects_and_reports() {
        let (mut dom, mut grid, deco) = setup();
        let cell = id(&dom, "c3a0");
        let out = grid.row_clicked(&mut dom, &deco, cell);
        assert_eq!(grid.selected(), Some("k3"));
        assert!(dom.has_class(id(&dom, "r3b"), &deco.selected));
        assert_eq!(out.len(), 1);
        let call = call_of(&out[0]);
        assert_eq!(call.endpoint, "CustomerBrowse");
        assert_eq!(call.event_name(), Some("rowclicked"));
        assert_eq!(call.params.get(keys::ROW_KEY), Some("k3"));
        assert_eq!(call.params.get(keys::COLLAPSED), Some("k2"));
    }

    #[test]
    fn change_on_click_opens_with_row_override() {
        let (mut dom, mut grid, deco) = setup();
        let root = id(&dom, "g");
        dom.set_attr(root, "data-click", "change");
        let node = id(&dom, "c2a0");
        let out = grid.row_clicked(&mut dom, &deco, node);
        assert_eq!(out.len(), 2);
        let WidgetOutcome::Open(request) = &out[1] else {
            panic!("expected open, got {:?}", out[1]);
        };
        assert_eq!(request.target, "SpecialForm");
        assert_eq!(request.action, Action::Change);
        assert_eq!(request.row_key, "k2");
        assert_eq!(request.browse_anchor.as_deref(), Some("g"));
        assert_eq!(request.called_from.as_deref(), Some("CustomerBrowse"));
    }

    #[test]
    fn select_on_click_reports_selection() {
        let (mut dom, mut grid, deco) = setup();
        let r1 = id(&dom, "r1a");
        dom.set_attr(r1, "data-click", "select");
        let node = id(&dom, "c1a0");
        let out = grid.row_clicked(&mut dom, &deco, node);
        assert_eq!(
            out.last(),
            Some(&WidgetOutcome::Select {
                row_key: "k1".into()
            })
        );
    }

    #[test]
    fn deferred_locator_sends_once_per_committed_change() {
        let (mut dom, mut grid, _) = setup();
        let loc1 = id(&dom, "loc1");
        assert!(grid.locator_input(&mut dom, loc1, "sm").is_empty());
        assert!(grid.locator_input(&mut dom, loc1, "smi").is_empty());
        assert_eq!(dom.value(id(&dom, "loc2")), "smi");
        let out = grid.locator_commit(&mut dom, loc1);
        assert_eq!(out.len(), 1);
        assert_eq!(call_of(&out[0]).params.get(keys::LOCATE), Some("smi"));
        assert!(grid.locator_commit(&mut dom, loc1).is_empty());
    }

    #[test]
    fn immediate_locator_sends_each_keystroke_and_clear_is_distinct() {
        let (mut dom, mut grid, _) = setup();
        let loc2 = id(&dom, "loc2");
        assert_eq!(grid.locator_input(&mut dom, loc2, "a").len(), 1);
        assert_eq!(grid.locator_input(&mut dom, loc2, "ab").len(), 1);
        assert_eq!(dom.value(id(&dom, "loc1")), "ab");
        let out = grid.clear_locator(&mut dom);
        assert_eq!(call_of(&out[0]).event_name(), Some("clearlocator"));
        assert_eq!(dom.value(loc2), "");
    }

    #[test]
    fn rendered_locate_value_is_the_applied_filter() {
        let html = r#"<div id="g" data-widget="grid" data-procedure="CustomerBrowse">
<input id="loc1" data-locator value="acme"><input id="loc2" data-locator value="acme">
<table><tbody><tr data-row-key="k1"><td>a</td></tr></tbody></table></div>"#;
        let mut dom = Dom::parse(html).unwrap();
        let deco = Decoration::default();
        let mut grid = GridClient::from_markup(&dom, id(&dom, "g")).unwrap();
        grid.rebind(&mut dom, &deco);

        // Committing the filter the server already applied sends nothing.
        let node = id(&dom, "loc1");
        assert!(grid.locator_commit(&mut dom, node).is_empty());

        let out = grid.clear_locator(&mut dom);
        assert_eq!(out.len(), 1);
        assert_eq!(call_of(&out[0]).event_name(), Some("clearlocator"));
        assert_eq!(dom.value(id(&dom, "loc2")), "");

        // Clearing is always announced, even when nothing was typed since.
        assert_eq!(grid.clear_locator(&mut dom).len(), 1);
    }

    #[test]
    fn sort_sends_key_and_keeps_order() {
        let (dom, mut grid, _) = setup();
        let before = dom.outer_html(id(&dom, "g"));
        let out = grid.sort_clicked(&dom, id(&dom, "h-name"));
        let call = call_of(&out[0]);
        assert_eq!(call.event_name(), Some("sortchanged"));
        assert_eq!(call.params.get(keys::SORT), Some("name"));
        assert_eq!(dom.outer_html(id(&dom, "g")), before);
    }

    #[test]
    fn paging_dims_until_patched() {
        let (mut dom, mut grid, deco) = setup();
        let out = grid.navigate(&mut dom, &deco, NavDirection::Next);
        assert_eq!(call_of(&out[0]).params.get(keys::REFRESH), Some("next"));
        assert!(dom.has_class(id(&dom, "g"), &deco.busy));
        assert!(dom.is_disabled(id(&dom, "next")));
        assert!(grid.navigate(&mut dom, &deco, NavDirection::Next).is_empty());
        let node = id(&dom, "c1a0");
        assert!(grid.row_clicked(&mut dom, &deco, node).is_empty());

        grid.after_patch(&mut dom, &deco);
        assert!(!dom.has_class(id(&dom, "g"), &deco.busy));
        assert!(!dom.is_disabled(id(&dom, "next")));
    }

    #[test]
    fn delete_asks_first_and_uses_button_row() {
        let (dom, mut grid, _) = setup();
        let out = grid.crud_clicked(&dom, id(&dom, "del1"), Action::Delete);
        let [WidgetOutcome::Confirm { prompt, then }] = out.as_slice() else {
            panic!("expected confirm, got {out:?}");
        };
        assert_eq!(prompt, &None);
        let WidgetOutcome::Open(request) = then.as_ref() else {
            panic!("expected open");
        };
        assert_eq!(request.row_key, "k1");
        assert_eq!(request.target, "CustomerForm");
    }

    #[test]
    fn row_actions_need_a_record_but_insert_does_not() {
        let (dom, mut grid, _) = setup();
        let next = id(&dom, "next");
        assert!(grid.crud_clicked(&dom, next, Action::Change).is_empty());
        let out = grid.crud_clicked(&dom, next, Action::Insert);
        let [WidgetOutcome::Open(request)] = out.as_slice() else {
            panic!("expected open, got {out:?}");
        };
        assert_eq!(request.row_key, "");
        assert_eq!(request.action, Action::Insert);
    }

    #[test]
    fn toggle_flips_visuals_and_notifies() {
        let (mut dom, mut grid, _) = setup();
        let node = id(&dom, "c1a0");
        let out = grid.toggle_expand(&mut dom, node);
        let call = call_of(&out[0]);
        assert!(matches!(out[0], WidgetOutcome::Notify(_)));
        assert_eq!(call.event_name(), Some("contract"));
        assert_eq!(call.params.get(keys::COLLAPSED), Some("k1,k2"));
        assert!(dom.is_hidden(id(&dom, "r1b")));
        assert_eq!(dom.attr(id(&dom, "r1a"), COLLAPSED_ATTR), Some("true"));

        let node = id(&dom, "c2a0");
        let out = grid.toggle_expand(&mut dom, node);
        assert_eq!(call_of(&out[0]).event_name(), Some("expand"));
        assert!(!dom.is_hidden(id(&dom, "r2b")));
    }

    #[test]
    fn client_flag_beats_server_marker_after_rerender() {
        let (mut dom, mut grid, deco) = setup();
        let node = id(&dom, "c3a0");
        grid.toggle_expand(&mut dom, node);
        assert_eq!(grid.state().is_expanded("k3"), Some(false));
        // Server re-renders (e.g. after a sort) and claims k3 is expanded.
        let html = GRID.replace(r#"data-row-key="k3""#, r#"data-row-key="k3" data-collapsed="false""#);
        dom.replace_with_html("g", &html).unwrap();
        grid.rebind(&mut dom, &deco);
        assert!(dom.is_hidden(id(&dom, "r3b")));
        assert_eq!(dom.attr(id(&dom, "r3a"), COLLAPSED_ATTR), Some("true"));
    }

    #[test]
    fn hover_marks_whole_block() {
        let (mut dom, mut grid, deco) = setup();
        let node = id(&dom, "r1b");
        grid.hover(&mut dom, &deco, Some(node));
        assert!(dom.has_class(id(&dom, "r1a"), &deco.hover));
        assert!(dom.has_class(id(&dom, "r1b"), &deco.hover));
        grid.hover(&mut dom, &deco, None);
        assert!(!dom.has_class(id(&dom, "r1a"), &deco.hover));
    }

    #[test]
    fn suspended_grid_ignores_interaction_until_resumed() {
        let (mut dom, mut grid, deco) = setup();
        grid.suspend(&mut dom, &deco);
        assert!(dom.has_class(id(&dom, "g"), &deco.suspended));
        let node = id(&dom, "c1a0");
        assert!(grid.row_clicked(&mut dom, &deco, node).is_empty());
        let node = id(&dom, "r1b");
        grid.hover(&mut dom, &deco, Some(node));
        assert!(!dom.has_class(id(&dom, "r1a"), &deco.hover));
        grid.resume(&mut dom, &deco, Some("k3"));
        assert!(!dom.has_class(id(&dom, "g"), &deco.suspended));
        assert_eq!(grid.selected(), Some("k3"));
    }

    const EDITABLE: &str = r#"<div id="e" data-widget="grid" data-procedure="Lines">
<table><tbody>
<tr data-row-key="1"><td><input id="a0"></td><td><input id="a1"></td></tr>
<tr data-row-key="2"><td><input id="b0"></td><td><input id="b1"></td></tr>
</tbody></table></div>"#;

    #[test]
    fn arrow_keys_keep_the_column() {
        let mut dom = Dom::parse(EDITABLE).unwrap();
        let deco = Decoration::default();
        let mut grid = GridClient::from_markup(&dom, id(&dom, "e")).unwrap();
        let down = KeyEvent::new(KeyCode::Down);
        let node = id(&dom, "a1");
        assert!(grid.key_pressed(&mut dom, &deco, node, &down).is_empty());
        assert_eq!(dom.focused(), Some(id(&dom, "b1")));
        assert_eq!(grid.state().column_focus, 1);
        let up = KeyEvent::new(KeyCode::Up);
        let node = id(&dom, "b1");
        grid.key_pressed(&mut dom, &deco, node, &up);
        assert_eq!(dom.focused(), Some(id(&dom, "a1")));
    }

    #[test]
    fn paging_keys_map_to_navigation() {
        let mut dom = Dom::parse(EDITABLE).unwrap();
        let deco = Decoration::default();
        let mut grid = GridClient::from_markup(&dom, id(&dom, "e")).unwrap();
        let end = KeyEvent::new(KeyCode::End).with_modifiers(Modifiers::CTRL);
        let node = id(&dom, "a0");
        let out = grid.key_pressed(&mut dom, &deco, node, &end);
        assert_eq!(call_of(&out[0]).params.get(keys::REFRESH), Some("last"));
        grid.after_patch(&mut dom, &deco);
        let node = id(&dom, "a0");
        let out = grid.key_pressed(&mut dom, &deco, node, &KeyEvent::new(KeyCode::PageUp));
        assert_eq!(call_of(&out[0]).params.get(keys::REFRESH), Some("previous"));
        grid.after_patch(&mut dom, &deco);
        let plain_home = KeyEvent::new(KeyCode::Home);
        let node = id(&dom, "a0");
        assert!(grid.key_pressed(&mut dom, &deco, node, &plain_home).is_empty());
    }

    fn grid_markup(rows: usize, height: usize) -> String {
        let mut html = format!(r#"<div id="p" data-widget="grid" data-row-height="{height}"><table><tbody>"#);
        for row in 0..rows {
            if row % height == 0 {
                html.push_str(&format!(r#"<tr data-row-key="k{}"><td></td></tr>"#, row / height));
            } else {
                html.push_str("<tr><td></td></tr>");
            }
        }
        html.push_str("</tbody></table></div>");
        html
    }

    proptest! {
        #[test]
        fn striping_and_selection_follow_blocks(rows in 1usize..24, height in 1usize..4, pick in 0usize..24) {
            let mut dom = Dom::parse(&grid_markup(rows, height)).unwrap();
            let deco = Decoration::default();
            let mut grid = GridClient::from_markup(&dom, dom.by_id("p").unwrap()).unwrap();
            let block_count = rows.div_ceil(height);
            let chosen = pick % block_count;
            let key = format!("k{chosen}");
            grid.refresh(&mut dom, &deco, Some(&key));

            for (index, row) in grid.rows(&dom).into_iter().enumerate() {
                let block = index / height;
                prop_assert_eq!(dom.has_class(row, &deco.stripe_even), block % 2 == 0);
                prop_assert_eq!(dom.has_class(row, &deco.stripe_odd), block % 2 == 1);
                prop_assert_eq!(dom.has_class(row, &deco.selected), block == chosen);
            }
        }
    }
}
