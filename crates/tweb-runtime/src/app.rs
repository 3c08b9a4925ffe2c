#![forbid(unsafe_code)]

//! The application context.
//!
//! [`ThinClient`] owns the page model, the widget clients, the navigation
//! stack and the tab session. It is driven entirely by its host:
//!
//! ```text
//! host ──Event──▶ handle_event ──▶ widgets / navigation ──▶ Effect queue
//!  ▲                                                            │
//!  └──────── deliver(ticket, payload) ◀── host executes ◀───────┘
//! ```
//!
//! Nothing blocks and nothing runs on its own: every call leaves through
//! [`drain_effects`](ThinClient::drain_effects) and every reply comes back
//! through [`deliver`](ThinClient::deliver), so a test can replay any
//! interleaving of replies deterministically.
//!
//! # Navigation serialization
//!
//! While a run, save or resume call of the navigation stack is in flight,
//! further navigation operations are queued and replayed in order once it
//! completes. A server `close_popup` is ignored while a commit of the top
//! frame is in flight, because the commit pops on its own.
//!
//! Autosave frames neither take the navigation lock nor join the stack. Their
//! run call completes them, after which the frame in front is resumed.

use std::collections::VecDeque;

use ahash::AHashMap;
use tweb_core::{
    Action, KeyCode, KeyEvent, NavDirection, Params, RemoteCall, TabSession, TabStorage, keys,
};
use tweb_dom::{Dom, DomError, NodeId, escape_attr};
use tweb_protocol::PopupRequest;
use tweb_widgets::{FormClient, GridClient, Widget, WidgetOutcome, widget_kind};
use tweb_widgets::form::FORM_KIND;
use tweb_widgets::grid::GRID_KIND;

use crate::config::RuntimeConfig;
use crate::effect::{Effect, RemoteRequest, Ticket};
use crate::event::Event;
use crate::gateway::GatewayError;
use crate::interpreter::ApplyReport;
use crate::navigation::{NavOp, NavigationStack, Popped, PopupFrame};

/// What to do with a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Continuation {
    /// Apply it.
    Apply,
    /// Apply it, then finish populating the frame.
    Run {
        serial: u64,
        cache_target: Option<String>,
    },
    /// Apply it, then pop the frame unless the server rejected the commit.
    Commit { serial: u64 },
    /// Apply it (gain-focus reply of a parent frame).
    Resume,
    /// Apply it, then resume whatever is in front of the detached frame.
    Autosave(Box<PopupFrame>),
}

#[derive(Debug, Clone)]
struct Pending {
    continuation: Continuation,
    endpoint: String,
    seq: u64,
}

/// The thin client.
#[derive(Debug)]
pub struct ThinClient {
    pub(crate) config: RuntimeConfig,
    pub(crate) page: Dom,
    pub(crate) nav: NavigationStack,
    pub(crate) grids: AHashMap<String, GridClient>,
    pub(crate) forms: AHashMap<String, FormClient>,
    pub(crate) outbox: VecDeque<Effect>,
    session: TabSession,
    next_ticket: u64,
    pending: AHashMap<Ticket, Pending>,
    confirms: AHashMap<Ticket, WidgetOutcome>,
    issued: AHashMap<String, u64>,
    applied: AHashMap<String, u64>,
    cache: AHashMap<String, String>,
    nav_in_flight: Option<Ticket>,
    commit_in_flight: Option<Ticket>,
    deferred: VecDeque<NavOp>,
}

impl ThinClient {
    /// A client with an empty page.
    #[must_use]
    pub fn new(config: RuntimeConfig, session: TabSession) -> Self {
        let nav = NavigationStack::new(config.popup_container_prefix.clone());
        Self {
            config,
            page: Dom::new(),
            nav,
            grids: AHashMap::new(),
            forms: AHashMap::new(),
            outbox: VecDeque::new(),
            session,
            next_ticket: 1,
            pending: AHashMap::new(),
            confirms: AHashMap::new(),
            issued: AHashMap::new(),
            applied: AHashMap::new(),
            cache: AHashMap::new(),
            nav_in_flight: None,
            commit_in_flight: None,
            deferred: VecDeque::new(),
        }
    }

    /// A client whose tab session is resolved from tab storage.
    pub fn with_storage(
        config: RuntimeConfig,
        storage: &mut dyn TabStorage,
        propagated: Option<&str>,
    ) -> Self {
        Self::new(config, TabSession::resolve(storage, propagated))
    }

    /// Replace the page with `html` and bind every widget it declares.
    pub fn load(&mut self, html: &str) -> Result<(), DomError> {
        self.page = Dom::parse(html)?;
        self.grids.clear();
        self.forms.clear();
        let root = self.page.root();
        self.reinit_widgets(&[root]);
        self.finish_apply();
        tracing::info!(
            target: "tweb.app",
            grids = self.grids.len(),
            forms = self.forms.len(),
            "page loaded"
        );
        Ok(())
    }

    // --- accessors ----------------------------------------------------------

    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    #[must_use]
    pub fn page(&self) -> &Dom {
        &self.page
    }

    /// Direct page access for hosts that mirror browser-side edits.
    pub fn page_mut(&mut self) -> &mut Dom {
        &mut self.page
    }

    #[must_use]
    pub fn navigation(&self) -> &NavigationStack {
        &self.nav
    }

    #[must_use]
    pub fn grid(&self, id: &str) -> Option<&GridClient> {
        self.grids.get(id)
    }

    #[must_use]
    pub fn form(&self, id: &str) -> Option<&FormClient> {
        self.forms.get(id)
    }

    #[must_use]
    pub fn session(&self) -> &TabSession {
        &self.session
    }

    /// A navigation call is in flight; navigation requests are being queued.
    #[must_use]
    pub fn is_navigating(&self) -> bool {
        self.nav_in_flight.is_some()
    }

    /// Navigation requests waiting for the in-flight one.
    #[must_use]
    pub fn queued_navigation(&self) -> usize {
        self.deferred.len()
    }

    /// Calls awaiting a reply.
    #[must_use]
    pub fn pending_calls(&self) -> usize {
        self.pending.len()
    }

    /// Take every effect decided so far, oldest first.
    pub fn drain_effects(&mut self) -> Vec<Effect> {
        self.outbox.drain(..).collect()
    }

    // --- navigation API -----------------------------------------------------

    /// Push a popup frame and run it.
    pub fn open_popup(&mut self, request: PopupRequest) {
        self.nav(NavOp::Push(request));
    }

    /// Commit the top frame.
    pub fn commit(&mut self) {
        self.nav(NavOp::Commit);
    }

    /// Abandon the top frame.
    pub fn cancel(&mut self) {
        self.nav(NavOp::Cancel);
    }

    /// Pop the top frame with the given outcome.
    pub fn close_popup(&mut self, saved: bool) {
        self.nav(NavOp::Close { saved });
    }

    /// Update the top frame's record key.
    pub fn set_row_key(&mut self, key: &str) -> bool {
        self.nav.set_row_key(key)
    }

    pub(crate) fn nav(&mut self, op: NavOp) {
        if matches!(op, NavOp::Close { .. }) && self.commit_in_flight.is_some() {
            tracing::debug!(target: "tweb.nav", "close ignored while a commit is in flight");
            return;
        }
        if self.nav_in_flight.is_some() {
            tracing::debug!(target: "tweb.nav", op = ?op, "navigation queued");
            self.deferred.push_back(op);
            return;
        }
        self.execute_nav(op);
    }

    fn drain_deferred(&mut self) {
        while self.nav_in_flight.is_none() {
            let Some(op) = self.deferred.pop_front() else {
                break;
            };
            if matches!(op, NavOp::Close { .. }) && self.commit_in_flight.is_some() {
                continue;
            }
            self.execute_nav(op);
        }
    }

    fn execute_nav(&mut self, op: NavOp) {
        match op {
            NavOp::Push(request) => self.push_frame(request),
            NavOp::Close { saved } => {
                if self.nav.mark_saved(saved) {
                    self.pop_frame();
                }
            }
            NavOp::Commit => self.commit_top(),
            NavOp::Cancel => self.cancel_top(),
            NavOp::Select { row_key } => {
                if self.nav.set_row_key(&row_key) {
                    self.nav.mark_saved(true);
                    self.pop_frame();
                }
            }
        }
    }

    fn push_frame(&mut self, request: PopupRequest) {
        if request.autosave {
            self.run_detached(request);
            return;
        }
        let frame = self.nav.push(request).clone();
        tracing::info!(
            target: "tweb.nav",
            depth = self.nav.depth(),
            procedure = %frame.target,
            action = %frame.action,
            "popup pushed"
        );
        if let Some(anchor) = frame.browse_anchor.as_deref()
            && let Some(grid) = self.grids.get_mut(anchor)
        {
            grid.suspend(&mut self.page, &self.config.decoration);
        }
        self.ensure_container(&frame.container);
        self.outbox.push_back(Effect::ShowModal {
            container: frame.container.clone(),
            title: frame.title.clone(),
        });

        let mut cache_target = None;
        if self.config.client_held_state && frame.action.is_local_capable() {
            if let Some(payload) = self.cache.get(&frame.target).cloned() {
                tracing::debug!(target: "tweb.nav", procedure = %frame.target, "popup populated from client-held state");
                self.apply_payload(&payload);
                self.finish_run(frame.serial);
                return;
            }
            cache_target = Some(frame.target.clone());
        }
        let ticket = self.issue(
            frame.run_call(),
            Some(Continuation::Run {
                serial: frame.serial,
                cache_target,
            }),
        );
        self.nav_in_flight = Some(ticket);
    }

    fn run_detached(&mut self, request: PopupRequest) {
        let frame = self.nav.detach(request);
        tracing::info!(
            target: "tweb.nav",
            depth = self.nav.depth(),
            procedure = %frame.target,
            action = %frame.action,
            "autosave frame started"
        );
        self.issue(frame.run_call(), Some(Continuation::Autosave(Box::new(frame))));
    }

    /// An autosave frame's run came back. `saved` is whether its payload
    /// applied without a refusal.
    fn finish_detached(&mut self, mut frame: PopupFrame, saved: bool) {
        frame.saved = saved;
        tracing::info!(
            target: "tweb.nav",
            procedure = %frame.target,
            saved,
            "autosave frame finished"
        );
        if saved && let Some(command) = frame.on_complete.take() {
            let mut report = ApplyReport::default();
            self.run_command(command, &mut report);
        }
        if let Some(anchor) = frame.browse_anchor.as_deref()
            && let Some(grid) = self.grids.get_mut(anchor)
        {
            let selection = (saved && !frame.row_key.is_empty()).then_some(frame.row_key.as_str());
            grid.refresh(&mut self.page, &self.config.decoration, selection);
        }
        if let Some(call) = self.nav.resume_after(&frame) {
            self.issue(call, Some(Continuation::Resume));
        }
    }

    fn ensure_container(&mut self, container: &str) {
        if self.page.by_id(container).is_some() {
            return;
        }
        let root = self.page.root();
        let html = format!(
            r#"<div id="{}" data-popup-container></div>"#,
            escape_attr(container)
        );
        if let Err(err) = self.page.append_html(root, &html) {
            tracing::warn!(target: "tweb.nav", error = %err, "could not create popup container");
        }
    }

    /// Focus the popup and run its completion command, if the frame that
    /// issued the run is still on top.
    fn finish_run(&mut self, serial: u64) {
        let Some(frame) = self.nav.top().filter(|f| f.serial == serial).cloned() else {
            tracing::debug!(target: "tweb.nav", serial, "frame closed before its run completed");
            return;
        };
        if self.config.focus_first_field
            && let Some(container) = self.page.by_id(&frame.container)
            && let Some(field) = self.page.first_focusable_in(container)
        {
            self.page.focus(field);
        }
        if let Some(command) = frame.on_complete {
            let mut report = ApplyReport::default();
            self.run_command(command, &mut report);
        }
    }

    /// Drain pending edits of every form inside `container`.
    fn flush_forms_in(&mut self, container: &str) -> Params {
        let mut edits = Params::new();
        let Some(container) = self.page.by_id(container) else {
            return edits;
        };
        let mut ids: Vec<String> = self
            .forms
            .iter()
            .filter(|(_, form)| {
                form.root(&self.page)
                    .is_some_and(|root| self.page.is_within(root, container))
            })
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort_unstable();
        for id in ids {
            if let Some(form) = self.forms.get_mut(&id) {
                edits.extend(&form.flush());
            }
        }
        edits
    }

    fn commit_top(&mut self) {
        let Some(frame) = self.nav.top().cloned() else {
            tracing::debug!(target: "tweb.nav", "commit with no popup open");
            return;
        };
        self.nav.mark_saved(true);
        let edits = self.flush_forms_in(&frame.container);
        let ticket = self.issue(
            frame.save_call(&edits),
            Some(Continuation::Commit {
                serial: frame.serial,
            }),
        );
        self.nav_in_flight = Some(ticket);
        self.commit_in_flight = Some(ticket);
    }

    fn cancel_top(&mut self) {
        let Some(frame) = self.nav.top().cloned() else {
            tracing::debug!(target: "tweb.nav", "cancel with no popup open");
            return;
        };
        let _discarded = self.flush_forms_in(&frame.container);
        self.issue(frame.cancel_call(), Some(Continuation::Apply));
        self.nav.mark_saved(false);
        self.pop_frame();
    }

    fn pop_frame(&mut self) {
        let Some(Popped { closed, resume }) = self.nav.pop() else {
            return;
        };
        tracing::info!(
            target: "tweb.nav",
            depth = self.nav.depth(),
            procedure = %closed.target,
            saved = closed.saved,
            "popup popped"
        );
        self.outbox.push_back(Effect::HideModal {
            container: closed.container.clone(),
        });
        if let Some(container) = self.page.by_id(&closed.container) {
            self.page.remove(container);
        }
        self.teardown_detached();
        if let Some(anchor) = closed.browse_anchor.as_deref()
            && let Some(grid) = self.grids.get_mut(anchor)
        {
            let selection = (closed.saved && !closed.row_key.is_empty())
                .then_some(closed.row_key.as_str());
            grid.resume(&mut self.page, &self.config.decoration, selection);
        }
        if let Some(call) = resume {
            let ticket = self.issue(call, Some(Continuation::Resume));
            self.nav_in_flight = Some(ticket);
        }
    }

    // --- transport ----------------------------------------------------------

    fn take_ticket(&mut self) -> Ticket {
        let ticket = Ticket(self.next_ticket);
        self.next_ticket += 1;
        ticket
    }

    /// Queue a call. `None` continuation means fire-and-forget.
    fn issue(&mut self, call: RemoteCall, continuation: Option<Continuation>) -> Ticket {
        let ticket = self.take_ticket();
        let seq = {
            let counter = self.issued.entry(call.endpoint.clone()).or_insert(0);
            *counter += 1;
            *counter
        };
        tracing::debug!(
            target: "tweb.call",
            %ticket,
            seq,
            url = %call.url(),
            "call issued"
        );
        let endpoint = call.endpoint.clone();
        let request = RemoteRequest {
            ticket,
            call,
            headers: vec![(
                self.config.session_header.clone(),
                self.session.token().to_string(),
            )],
            seq,
        };
        match continuation {
            Some(continuation) => {
                self.pending.insert(
                    ticket,
                    Pending {
                        continuation,
                        endpoint,
                        seq,
                    },
                );
                self.outbox.push_back(Effect::Call(request));
            }
            None => self.outbox.push_back(Effect::Notify(request)),
        }
        ticket
    }

    /// Whether a reply should be dropped; records it as applied otherwise.
    fn is_stale(&mut self, pending: &Pending) -> bool {
        let drop_stale = self.config.drop_stale_responses;
        let latest = self.applied.entry(pending.endpoint.clone()).or_insert(0);
        if drop_stale && pending.seq < *latest {
            return true;
        }
        *latest = (*latest).max(pending.seq);
        false
    }

    /// Hand back the outcome of a [`Effect::Call`].
    ///
    /// Returns the report of the applied payload, or `None` when nothing was
    /// applied (unknown ticket, transport failure, stale reply).
    pub fn deliver(
        &mut self,
        ticket: Ticket,
        result: Result<String, GatewayError>,
    ) -> Option<ApplyReport> {
        let Some(pending) = self.pending.remove(&ticket) else {
            tracing::debug!(target: "tweb.call", %ticket, "reply for unknown ticket");
            return None;
        };
        if self.nav_in_flight == Some(ticket) {
            self.nav_in_flight = None;
        }

        let failed = result.is_err();
        let payload = match result {
            Ok(payload) => {
                if self.is_stale(&pending) {
                    tracing::debug!(
                        target: "tweb.call",
                        %ticket,
                        endpoint = %pending.endpoint,
                        seq = pending.seq,
                        "stale reply dropped"
                    );
                    None
                } else {
                    Some(payload)
                }
            }
            Err(err) => {
                tracing::warn!(
                    target: "tweb.call",
                    %ticket,
                    endpoint = %pending.endpoint,
                    error = %err,
                    "remote call failed"
                );
                None
            }
        };

        let report = match pending.continuation {
            Continuation::Apply | Continuation::Resume => {
                payload.map(|payload| self.apply_payload(&payload))
            }
            Continuation::Run {
                serial,
                cache_target,
            } => {
                let report = payload.map(|payload| {
                    if let Some(target) = cache_target {
                        self.cache.insert(target, payload.clone());
                    }
                    self.apply_payload(&payload)
                });
                if !failed {
                    self.finish_run(serial);
                }
                report
            }
            Continuation::Autosave(frame) => {
                let report = payload.map(|payload| self.apply_payload(&payload));
                let saved = report
                    .as_ref()
                    .is_some_and(|report| !report.rejected && report.error.is_none());
                self.finish_detached(*frame, saved);
                report
            }
            Continuation::Commit { serial } => {
                let report = payload.map(|payload| self.apply_payload(&payload));
                self.commit_in_flight = None;
                let refused = match &report {
                    Some(report) => report.rejected || report.error.is_some(),
                    None => failed,
                };
                if self.nav.top().is_some_and(|top| top.serial == serial) {
                    if refused {
                        self.nav.mark_saved(false);
                    } else {
                        self.pop_frame();
                    }
                }
                report
            }
        };

        self.drain_deferred();
        report
    }

    /// Answer an [`Effect::Confirm`].
    pub fn answer_confirm(&mut self, ticket: Ticket, accepted: bool) {
        let Some(then) = self.confirms.remove(&ticket) else {
            tracing::debug!(target: "tweb.app", %ticket, "answer for unknown confirmation");
            return;
        };
        if accepted {
            self.run_outcomes(vec![then]);
        } else {
            tracing::debug!(target: "tweb.app", %ticket, "confirmation declined");
        }
    }

    pub(crate) fn run_outcomes(&mut self, outcomes: Vec<WidgetOutcome>) {
        for outcome in outcomes {
            match outcome {
                WidgetOutcome::Call(call) => {
                    self.issue(call, Some(Continuation::Apply));
                }
                WidgetOutcome::Notify(call) => {
                    self.issue(call, None);
                }
                WidgetOutcome::Open(request) => self.nav(NavOp::Push(request)),
                WidgetOutcome::Confirm { prompt, then } => {
                    let ticket = self.take_ticket();
                    let prompt =
                        prompt.unwrap_or_else(|| self.config.confirm_delete_prompt.clone());
                    self.confirms.insert(ticket, *then);
                    self.outbox.push_back(Effect::Confirm { ticket, prompt });
                }
                WidgetOutcome::Select { row_key } => {
                    if self.nav.is_empty() {
                        tracing::debug!(target: "tweb.app", row_key = %row_key, "selection with no popup open");
                    } else {
                        self.nav(NavOp::Select { row_key });
                    }
                }
            }
        }
    }

    // --- events -------------------------------------------------------------

    /// Feed one user interaction.
    pub fn handle_event(&mut self, event: Event) {
        if !self.page.is_connected(event.node()) {
            tracing::debug!(target: "tweb.app", event = ?event, "event on a detached node");
            return;
        }
        match event {
            Event::Click(node) => self.on_click(node),
            Event::DoubleClick(node) => {
                if let Some(id) = self.widget_at(node, GRID_KIND)
                    && let Some(grid) = self.grids.get_mut(&id)
                {
                    let outcomes =
                        grid.row_double_clicked(&mut self.page, &self.config.decoration, node);
                    self.run_outcomes(outcomes);
                }
            }
            Event::Hover(node) => {
                if let Some(id) = self.widget_at(node, GRID_KIND)
                    && let Some(grid) = self.grids.get_mut(&id)
                {
                    grid.hover(&mut self.page, &self.config.decoration, Some(node));
                }
            }
            Event::PointerLeave(node) => {
                if let Some(id) = self.widget_at(node, GRID_KIND)
                    && let Some(grid) = self.grids.get_mut(&id)
                {
                    grid.hover(&mut self.page, &self.config.decoration, None);
                }
            }
            Event::Input { node, value } => self.on_input(node, &value),
            Event::Change { node, value } => self.on_change(node, &value),
            Event::Key { node, key } => self.on_key(node, &key),
        }
    }

    /// Id of the nearest enclosing widget of `kind` that has a client.
    fn widget_at(&self, node: NodeId, kind: &str) -> Option<String> {
        let root = self
            .page
            .closest(node, |dom, n| widget_kind(dom, n) == Some(kind))?;
        let id = self.page.attr(root, "id")?;
        let bound = match kind {
            GRID_KIND => self.grids.contains_key(id),
            FORM_KIND => self.forms.contains_key(id),
            _ => false,
        };
        bound.then(|| id.to_string())
    }

    fn attr_up(&self, node: NodeId, name: &str) -> Option<String> {
        self.page
            .closest_with_attr(node, name)
            .and_then(|n| self.page.attr(n, name))
            .map(str::to_string)
    }

    /// Popup request declared by a launcher element.
    pub(crate) fn launch_request(&self, launcher: NodeId) -> Option<PopupRequest> {
        let page = &self.page;
        let target = page
            .attr(launcher, "data-open-target")
            .filter(|t| !t.is_empty())?;
        let action = page
            .attr(launcher, "data-open-action")
            .and_then(Action::parse)
            .unwrap_or_default();
        let mut request = PopupRequest::new(target, action)
            .row_key(page.attr(launcher, "data-open-row-key").unwrap_or_default())
            .title(page.attr(launcher, "data-open-title").unwrap_or_default())
            .autosave(page.flag(launcher, "data-autosave"));
        if let Some(element) = page.element(launcher) {
            for (name, value) in element.attrs() {
                if let Some(param) = name.strip_prefix("data-param-") {
                    request.params.insert(param.to_string(), value.to_string());
                }
            }
        }

        let grid = self.widget_at(launcher, GRID_KIND);
        let procedure = grid
            .as_deref()
            .and_then(|id| self.grids.get(id))
            .map(|g| g.procedure().to_string())
            .or_else(|| {
                self.widget_at(launcher, FORM_KIND)
                    .and_then(|id| self.forms.get(&id))
                    .map(|f| f.procedure().to_string())
            })
            .or_else(|| self.nav.top().map(|top| top.target.clone()));
        request.browse_anchor = grid;
        request.parent_procedure.clone_from(&procedure);
        request.called_from = procedure;
        Some(request)
    }

    fn open_tab(&mut self, link: NodeId) {
        let Some(href) = self.page.attr(link, "href").filter(|h| !h.is_empty()) else {
            return;
        };
        let url = if self.page.flag(link, "data-propagate-tab") {
            let separator = if href.contains('?') { '&' } else { '?' };
            let query = Params::new()
                .with(keys::TAB, self.session.token())
                .to_query_string();
            format!("{href}{separator}{query}")
        } else {
            href.to_string()
        };
        self.outbox.push_back(Effect::OpenTab { url });
    }

    fn on_click(&mut self, node: NodeId) {
        if let Some(action) = self.attr_up(node, "data-popup-action") {
            match action.trim() {
                "save" => self.nav(NavOp::Commit),
                "cancel" => self.nav(NavOp::Cancel),
                other => {
                    tracing::warn!(target: "tweb.app", action = other, "unknown popup action");
                }
            }
            return;
        }
        if let Some(launcher) = self.page.closest_with_attr(node, "data-open-target") {
            if let Some(request) = self.launch_request(launcher) {
                self.nav(NavOp::Push(request));
            }
            return;
        }
        if let Some(link) = self.page.closest(node, |dom, n| {
            dom.tag_name(n) == Some("a") && dom.has_attr(n, "data-new-tab")
        }) {
            self.open_tab(link);
            return;
        }

        let Some(grid_id) = self.widget_at(node, GRID_KIND) else {
            return;
        };
        let nav_dir = self.attr_up(node, "data-nav");
        let sort = self.page.closest_with_attr(node, "data-sort-key").is_some();
        let crud = self.attr_up(node, "data-crud");
        let toggle = self.page.closest_with_attr(node, "data-toggle-expand").is_some();
        let select = self.page.closest_with_attr(node, "data-select").is_some();
        let clear = self.page.closest_with_attr(node, "data-clear-locator").is_some();
        let locator = self.page.has_attr(node, "data-locator");

        let Some(grid) = self.grids.get_mut(&grid_id) else {
            return;
        };
        let page = &mut self.page;
        let decoration = &self.config.decoration;
        let mut row_click = false;
        let outcomes = if let Some(dir) = nav_dir {
            match NavDirection::parse(&dir) {
                Some(direction) => grid.navigate(page, decoration, direction),
                None => Vec::new(),
            }
        } else if sort {
            grid.sort_clicked(page, node)
        } else if let Some(crud) = crud {
            match Action::parse(&crud) {
                Some(action) => grid.crud_clicked(page, node, action),
                None => Vec::new(),
            }
        } else if toggle {
            grid.toggle_expand(page, node)
        } else if select {
            grid.select_clicked(page, node)
        } else if clear {
            grid.clear_locator(page)
        } else if locator {
            Vec::new()
        } else {
            row_click = true;
            grid.row_clicked(page, decoration, node)
        };

        if row_click {
            self.sync_popup_row_key(&grid_id);
        }
        self.run_outcomes(outcomes);
    }

    /// A row click in a grid inside the top popup moves that frame's record.
    fn sync_popup_row_key(&mut self, grid_id: &str) {
        let Some(top) = self.nav.top() else {
            return;
        };
        let Some(container) = self.page.by_id(&top.container) else {
            return;
        };
        let Some(grid) = self.grids.get(grid_id) else {
            return;
        };
        let inside = grid
            .root(&self.page)
            .is_some_and(|root| self.page.is_within(root, container));
        if inside && let Some(key) = grid.selected().map(str::to_string) {
            self.nav.set_row_key(&key);
        }
    }

    fn on_input(&mut self, node: NodeId, value: &str) {
        if self.page.has_attr(node, "data-locator")
            && let Some(id) = self.widget_at(node, GRID_KIND)
            && let Some(grid) = self.grids.get_mut(&id)
        {
            let outcomes = grid.locator_input(&mut self.page, node, value);
            self.run_outcomes(outcomes);
        } else if let Some(id) = self.widget_at(node, FORM_KIND)
            && let Some(form) = self.forms.get_mut(&id)
        {
            form.field_input(&mut self.page, node, value);
        } else {
            self.page.set_value(node, value);
        }
        self.update_placeholder(node);
    }

    fn on_change(&mut self, node: NodeId, value: &str) {
        if self.page.has_attr(node, "data-locator")
            && let Some(id) = self.widget_at(node, GRID_KIND)
            && let Some(grid) = self.grids.get_mut(&id)
        {
            self.page.set_value(node, value);
            let outcomes = grid.locator_commit(&mut self.page, node);
            self.run_outcomes(outcomes);
        } else if let Some(id) = self.widget_at(node, FORM_KIND)
            && let Some(form) = self.forms.get_mut(&id)
        {
            let outcomes = form.field_changed(&mut self.page, node, value);
            self.run_outcomes(outcomes);
        } else {
            self.page.set_value(node, value);
        }
        self.update_placeholder(node);
    }

    fn on_key(&mut self, node: NodeId, key: &KeyEvent) {
        if !key.is_down() {
            return;
        }
        if key.code == KeyCode::Escape && !self.nav.is_empty() {
            self.nav(NavOp::Cancel);
            return;
        }
        let Some(id) = self.widget_at(node, GRID_KIND) else {
            return;
        };
        let Some(grid) = self.grids.get_mut(&id) else {
            return;
        };
        let outcomes = if key.code == KeyCode::Enter && self.page.has_attr(node, "data-locator") {
            grid.locator_commit(&mut self.page, node)
        } else {
            grid.key_pressed(&mut self.page, &self.config.decoration, node, key)
        };
        self.run_outcomes(outcomes);
    }
}
