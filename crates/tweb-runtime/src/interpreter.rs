#![forbid(unsafe_code)]

//! Response interpreter.
//!
//! Applies a reply payload to the page in record order: element records
//! replace the element with the matching id, script records run a typed
//! command. Once every record has been applied the finishing passes run
//! exactly once:
//!
//! 1. widgets whose root left the page are torn down,
//! 2. empty inputs with a placeholder get the placeholder class,
//! 3. every grid re-decorates its rows.
//!
//! # Invariants
//!
//! 1. A record whose target is not on the page is dropped; later records
//!    still apply.
//! 2. A malformed payload changes nothing.
//! 3. Widgets inside replaced markup are re-initialized before the next
//!    record is applied.

use tweb_dom::NodeId;
use tweb_protocol::{Command, Directive, parse_payload};
use tweb_widgets::form::FORM_KIND;
use tweb_widgets::grid::GRID_KIND;
use tweb_widgets::{FormClient, GridClient, WIDGET_ATTR, Widget, widget_kind};

use crate::app::ThinClient;
use crate::effect::Effect;
use crate::navigation::NavOp;

/// `data-widget` value of an element that opens a popup when it appears.
pub const POPUP_KIND: &str = "popup";

/// What applying one payload did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Element records applied, by target id.
    pub patched: Vec<String>,
    /// Element records dropped, by target id.
    pub dropped: Vec<String>,
    /// Commands run, by name.
    pub commands: Vec<&'static str>,
    /// The server refused a commit.
    pub rejected: bool,
    /// The payload could not be decoded.
    pub error: Option<String>,
}

impl ApplyReport {
    /// Nothing was applied.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.patched.is_empty() && self.commands.is_empty()
    }
}

impl ThinClient {
    /// Apply a reply payload to the page.
    pub fn apply_payload(&mut self, payload: &str) -> ApplyReport {
        let _span = tracing::debug_span!(
            target: "tweb.apply",
            "apply",
            bytes = payload.len()
        )
        .entered();

        let mut report = ApplyReport::default();
        let directives = match parse_payload(payload) {
            Ok(directives) => directives,
            Err(err) => {
                tracing::warn!(target: "tweb.apply", error = %err, "malformed payload ignored");
                report.error = Some(err.to_string());
                return report;
            }
        };

        for directive in directives {
            match directive {
                Directive::Element { target_id, html } => {
                    self.apply_element(&target_id, &html, &mut report);
                }
                Directive::Script(command) => self.run_command(command, &mut report),
            }
        }
        self.finish_apply();
        tracing::debug!(
            target: "tweb.apply",
            patched = report.patched.len(),
            dropped = report.dropped.len(),
            commands = report.commands.len(),
            "payload applied"
        );
        report
    }

    fn apply_element(&mut self, target_id: &str, html: &str, report: &mut ApplyReport) {
        let parent = self
            .page
            .by_id(target_id)
            .and_then(|target| self.page.parent(target));
        match self.page.replace_with_html(target_id, html) {
            Ok(Some(inserted)) => {
                report.patched.push(target_id.to_string());
                self.reinit_widgets(&inserted);
                if let Some(parent) = parent {
                    self.patched_inside_grid(parent);
                }
            }
            Ok(None) => {
                tracing::debug!(target: "tweb.apply", target_id, "target not on page; record dropped");
                report.dropped.push(target_id.to_string());
            }
            Err(err) => {
                tracing::warn!(target: "tweb.apply", target_id, error = %err, "record markup rejected");
                report.dropped.push(target_id.to_string());
            }
        }
    }

    /// A fragment inside a grid (rows, pager) was replaced without
    /// re-creating the grid itself.
    fn patched_inside_grid(&mut self, parent: NodeId) {
        let Some(root) = self
            .page
            .closest(parent, |dom, n| widget_kind(dom, n) == Some(GRID_KIND))
        else {
            return;
        };
        let Some(id) = self.page.attr(root, "id").map(str::to_string) else {
            return;
        };
        if let Some(grid) = self.grids.get_mut(&id) {
            grid.after_patch(&mut self.page, &self.config.decoration);
        }
    }

    /// Bind or rebind every widget root at or below `nodes`.
    pub(crate) fn reinit_widgets(&mut self, nodes: &[NodeId]) {
        let roots: Vec<NodeId> = nodes
            .iter()
            .flat_map(|&node| self.page.elements_with_attr(node, WIDGET_ATTR))
            .collect();
        let mut popups = Vec::new();
        for root in roots {
            let Some(kind) = widget_kind(&self.page, root).map(str::to_string) else {
                continue;
            };
            let id = self.page.attr(root, "id").unwrap_or_default().to_string();
            match kind.as_str() {
                GRID_KIND => {
                    if let Some(grid) = self.grids.get_mut(&id) {
                        grid.rebind(&mut self.page, &self.config.decoration);
                    } else if let Some(mut grid) = GridClient::from_markup(&self.page, root) {
                        grid.rebind(&mut self.page, &self.config.decoration);
                        self.grids.insert(id, grid);
                    }
                }
                FORM_KIND => {
                    if let Some(form) = self.forms.get_mut(&id) {
                        form.rebind(&mut self.page, &self.config.decoration);
                    } else if let Some(form) = FormClient::from_markup(&self.page, root) {
                        self.forms.insert(id, form);
                    }
                }
                POPUP_KIND => popups.extend(self.launch_request(root)),
                other => {
                    tracing::debug!(target: "tweb.apply", kind = other, "unknown widget kind");
                }
            }
        }
        for request in popups {
            self.nav(NavOp::Push(request));
        }
    }

    pub(crate) fn run_command(&mut self, command: Command, report: &mut ApplyReport) {
        report.commands.push(command.name());
        tracing::debug!(target: "tweb.apply", command = command.name(), "command");
        match command {
            Command::ReinitWidget { id } => match self.page.by_id(&id) {
                Some(node) => self.reinit_widgets(&[node]),
                None => tracing::debug!(target: "tweb.apply", id = %id, "reinit of a missing widget"),
            },
            Command::SetFocus { id } => {
                if let Some(node) = self.page.by_id(&id) {
                    self.page.focus(node);
                }
            }
            Command::ShowMessage { text } => self.outbox.push_back(Effect::Alert { text }),
            Command::SetValue { id, value } => {
                if let Some(node) = self.page.by_id(&id) {
                    self.page.set_value(node, &value);
                    self.update_placeholder(node);
                }
            }
            Command::RemoveElement { id } => {
                if let Some(node) = self.page.by_id(&id) {
                    self.page.remove(node);
                }
            }
            Command::Show { id } => {
                if let Some(node) = self.page.by_id(&id) {
                    self.page.set_hidden(node, false);
                }
            }
            Command::Hide { id } => {
                if let Some(node) = self.page.by_id(&id) {
                    self.page.set_hidden(node, true);
                }
            }
            Command::Redirect { url } => self.outbox.push_back(Effect::Redirect { url }),
            Command::OpenPopup(request) => self.nav(NavOp::Push(request)),
            Command::ClosePopup { saved } => self.nav(NavOp::Close { saved }),
            Command::RejectCommit { message } => {
                report.rejected = true;
                self.nav.mark_saved(false);
                if let Some(text) = message {
                    self.outbox.push_back(Effect::Alert { text });
                }
            }
            Command::RefreshGrid { id, selection } => match self.grids.get_mut(&id) {
                Some(grid) => {
                    grid.refresh(&mut self.page, &self.config.decoration, selection.as_deref());
                }
                None => tracing::debug!(target: "tweb.apply", id = %id, "refresh of an unknown grid"),
            },
            Command::SetRowKey { key } => {
                self.nav.set_row_key(&key);
            }
        }
    }

    /// Finishing passes, once per applied payload.
    pub(crate) fn finish_apply(&mut self) {
        self.teardown_detached();
        let root = self.page.root();
        for node in self.page.elements_with_attr(root, "placeholder") {
            self.update_placeholder(node);
        }
        for grid in self.grids.values_mut() {
            grid.refresh(&mut self.page, &self.config.decoration, None);
        }
    }

    pub(crate) fn update_placeholder(&mut self, node: NodeId) {
        if !self.page.has_attr(node, "placeholder") {
            return;
        }
        let empty = self.page.value(node).is_empty();
        self.page
            .set_class(node, &self.config.decoration.placeholder, empty);
    }

    /// Drop clients whose root is no longer on the page.
    pub(crate) fn teardown_detached(&mut self) {
        let page = &self.page;
        let grids = self.grids.len();
        let forms = self.forms.len();
        self.grids.retain(|_, grid| grid.is_attached(page));
        self.forms.retain(|_, form| form.is_attached(page));
        let removed = grids - self.grids.len() + forms - self.forms.len();
        if removed > 0 {
            tracing::debug!(target: "tweb.apply", removed, "detached widgets torn down");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use pretty_assertions::assert_eq;
    use tracing_subscriber::layer::SubscriberExt;
    use tweb_core::{Action, TabOrigin, TabSession};
    use tweb_protocol::{PayloadBuilder, PopupRequest};

    use super::*;
    use crate::config::RuntimeConfig;

    fn client(html: &str) -> ThinClient {
        let mut client = ThinClient::new(
            RuntimeConfig::default(),
            TabSession::with_token("tab-1", TabOrigin::Minted),
        );
        client.load(html).expect("page parses");
        client
    }

    fn text_of(client: &ThinClient, id: &str) -> String {
        let node = client.page().by_id(id).expect("element present");
        client.page().text_content(node)
    }

    #[test]
    fn element_records_apply_in_order() {
        let mut c = client(r#"<div id="a">a0</div><div id="b">b0</div>"#);
        let payload = PayloadBuilder::new()
            .element("a", r#"<div id="a">a1</div>"#)
            .element("b", r#"<div id="b">b1</div>"#)
            .element("a", r#"<div id="a">a2</div>"#)
            .build();
        let report = c.apply_payload(&payload);
        assert_eq!(report.patched, vec!["a", "b", "a"]);
        assert_eq!(text_of(&c, "a"), "a2");
        assert_eq!(text_of(&c, "b"), "b1");
    }

    #[test]
    fn missing_target_is_dropped_and_later_records_apply() {
        let mut c = client(r#"<div id="a">a0</div>"#);
        let payload = PayloadBuilder::new()
            .element("ghost", "<p>lost</p>")
            .element("a", r#"<div id="a">a1</div>"#)
            .build();
        let report = c.apply_payload(&payload);
        assert_eq!(report.dropped, vec!["ghost"]);
        assert_eq!(report.patched, vec!["a"]);
        assert_eq!(text_of(&c, "a"), "a1");
    }

    #[test]
    fn malformed_payload_is_a_noop() {
        let mut c = client(r#"<div id="a">a0</div>"#);
        let report = c.apply_payload("{not json");
        assert!(report.is_noop());
        assert!(report.error.is_some());
        assert_eq!(text_of(&c, "a"), "a0");
        assert!(c.drain_effects().is_empty());
    }

    #[test]
    fn replaced_markup_binds_new_widgets() {
        let mut c = client(r#"<div id="slot"></div>"#);
        let payload = PayloadBuilder::new()
            .element(
                "slot",
                r#"<form id="f" data-widget="form" data-procedure="UpdCust"><input name="n"></form>"#,
            )
            .build();
        c.apply_payload(&payload);
        assert_eq!(c.form("f").map(FormClient::procedure), Some("UpdCust"));
    }

    #[test]
    fn widgets_removed_from_the_page_are_torn_down() {
        let mut c = client(
            r#"<div id="slot"><table id="g" data-widget="grid"><tbody></tbody></table></div>"#,
        );
        assert!(c.grid("g").is_some());
        let payload = PayloadBuilder::new()
            .element("slot", r#"<div id="slot"></div>"#)
            .build();
        c.apply_payload(&payload);
        assert!(c.grid("g").is_none());
    }

    #[test]
    fn placeholder_class_tracks_empty_values() {
        let mut c = client(r#"<input id="q" placeholder="Search"><input id="r" placeholder="x" value="1">"#);
        let q = c.page().by_id("q").expect("q");
        let r = c.page().by_id("r").expect("r");
        assert!(c.page().has_class(q, "tw-placeholder"));
        assert!(!c.page().has_class(r, "tw-placeholder"));

        let payload = PayloadBuilder::new()
            .script(&Command::SetValue {
                id: "q".into(),
                value: "acme".into(),
            })
            .build();
        c.apply_payload(&payload);
        assert!(!c.page().has_class(q, "tw-placeholder"));
    }

    #[test]
    fn commands_produce_effects_in_order() {
        let mut c = client(r#"<div id="msg" hidden></div>"#);
        let payload = PayloadBuilder::new()
            .script(&Command::Show { id: "msg".into() })
            .script(&Command::ShowMessage {
                text: "saved".into(),
            })
            .script(&Command::Redirect {
                url: "/home".into(),
            })
            .build();
        let report = c.apply_payload(&payload);
        assert_eq!(report.commands, vec!["show", "show_message", "redirect"]);
        let msg = c.page().by_id("msg").expect("msg");
        assert!(!c.page().is_hidden(msg));
        assert_eq!(
            c.drain_effects(),
            vec![
                Effect::Alert {
                    text: "saved".into()
                },
                Effect::Redirect {
                    url: "/home".into()
                },
            ]
        );
    }

    #[test]
    fn reject_commit_clears_saved_and_reports() {
        let mut c = client("<main></main>");
        c.open_popup(PopupRequest::new("UpdCust", Action::Change).row_key("7"));
        c.nav.mark_saved(true);
        let payload = PayloadBuilder::new()
            .script(&Command::RejectCommit {
                message: Some("Name required".into()),
            })
            .build();
        let report = c.apply_payload(&payload);
        assert!(report.rejected);
        assert_eq!(c.navigation().top().map(|f| f.saved), Some(false));
    }

    #[test]
    fn popup_widget_in_markup_pushes_a_frame() {
        let mut c = client(r#"<div id="slot"></div>"#);
        let payload = PayloadBuilder::new()
            .element(
                "slot",
                r#"<div id="slot" data-widget="popup" data-open-target="BrwOrders" data-open-action="view"></div>"#,
            )
            .build();
        c.apply_payload(&payload);
        assert_eq!(c.navigation().depth(), 1);
        let top = c.navigation().top().expect("frame");
        assert_eq!(top.target, "BrwOrders");
        assert_eq!(top.action, Action::View);
    }

    #[derive(Default, Clone)]
    struct SpanNames(Arc<Mutex<Vec<String>>>);

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for SpanNames {
        fn on_new_span(
            &self,
            attrs: &tracing::span::Attributes<'_>,
            _id: &tracing::span::Id,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            self.0
                .lock()
                .unwrap()
                .push(attrs.metadata().name().to_string());
        }
    }

    #[test]
    fn apply_runs_inside_a_span() {
        let names = SpanNames::default();
        let subscriber = tracing_subscriber::registry().with(names.clone());
        tracing::subscriber::with_default(subscriber, || {
            let mut c = client(r#"<div id="a"></div>"#);
            c.apply_payload(&PayloadBuilder::new().element("a", r#"<div id="a">x</div>"#).build());
        });
        assert!(names.0.lock().unwrap().iter().any(|n| n == "apply"));
    }
}
