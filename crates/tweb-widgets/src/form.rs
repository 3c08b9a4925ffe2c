#![forbid(unsafe_code)]

//! Form client: send-on-change fields and pending edits.

use tracing::trace;
use tweb_core::{CallEvent, Params, RemoteCall, keys};
use tweb_dom::{Dom, NodeId};

use crate::{Decoration, Widget, WidgetOutcome, widget_kind};

/// `data-widget` value of a form root.
pub const FORM_KIND: &str = "form";

const SEND_ON_CHANGE_ATTR: &str = "data-send-on-change";

/// Client half of a server-rendered form.
#[derive(Debug, Clone)]
pub struct FormClient {
    id: String,
    procedure: String,
    pending: Params,
}

impl FormClient {
    /// Bind to a form root. `None` if `root` is not a form or has no id.
    #[must_use]
    pub fn from_markup(dom: &Dom, root: NodeId) -> Option<Self> {
        if widget_kind(dom, root) != Some(FORM_KIND) {
            return None;
        }
        let id = dom.attr(root, "id").filter(|v| !v.is_empty())?.to_string();
        let procedure = dom
            .attr(root, "data-procedure")
            .filter(|v| !v.is_empty())
            .unwrap_or(id.as_str())
            .to_string();
        Some(Self {
            id,
            procedure,
            pending: Params::new(),
        })
    }

    #[must_use]
    pub fn procedure(&self) -> &str {
        &self.procedure
    }

    /// Edits not yet sent to the server.
    #[must_use]
    pub fn pending(&self) -> &Params {
        &self.pending
    }

    fn field_name(dom: &Dom, field: NodeId) -> Option<String> {
        dom.attr(field, "name")
            .or_else(|| dom.attr(field, "id"))
            .filter(|n| !n.is_empty())
            .map(str::to_string)
    }

    /// Keystroke-level edit: update the live value only.
    pub fn field_input(&mut self, dom: &mut Dom, field: NodeId, value: &str) {
        dom.set_value(field, value);
        if let Some(name) = Self::field_name(dom, field)
            && !dom.flag(field, SEND_ON_CHANGE_ATTR)
        {
            self.pending.set(name, value);
        }
    }

    /// Committed edit (blur, enter, change).
    ///
    /// Send-on-change fields report right away; other fields are held until
    /// the next [`flush`](Self::flush).
    pub fn field_changed(&mut self, dom: &mut Dom, field: NodeId, value: &str) -> Vec<WidgetOutcome> {
        dom.set_value(field, value);
        let Some(name) = Self::field_name(dom, field) else {
            return Vec::new();
        };
        if dom.flag(field, SEND_ON_CHANGE_ATTR) {
            self.pending.remove(&name);
            return vec![WidgetOutcome::Call(
                RemoteCall::event(&self.procedure, CallEvent::FieldChanged)
                    .param(keys::FIELD, name)
                    .param(keys::VALUE, value),
            )];
        }
        trace!(form = %self.id, field = %name, "edit held until commit");
        self.pending.set(name, value);
        Vec::new()
    }

    /// Drain pending edits.
    pub fn flush(&mut self) -> Params {
        std::mem::take(&mut self.pending)
    }
}

impl Widget for FormClient {
    fn id(&self) -> &str {
        &self.id
    }

    fn rebind(&mut self, dom: &mut Dom, _decoration: &Decoration) {
        let Some(root) = self.root(dom) else {
            return;
        };
        if let Some(procedure) = dom.attr(root, "data-procedure").filter(|v| !v.is_empty()) {
            self.procedure = procedure.to_string();
        }
        // Held edits only survive for fields the new markup still renders.
        let fields: Vec<String> = dom
            .descendants(root)
            .into_iter()
            .filter_map(|node| Self::field_name(dom, node))
            .collect();
        let gone: Vec<String> = self
            .pending
            .iter()
            .map(|(name, _)| name)
            .filter(|name| !fields.iter().any(|field| field == name))
            .map(str::to_string)
            .collect();
        for name in gone {
            trace!(form = %self.id, field = %name, "held edit dropped, field gone");
            self.pending.remove(&name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const FORM: &str = r#"<form id="f" data-widget="form" data-procedure="CustomerForm">
<input id="name" name="name" value="Ann">
<select id="country" name="country" data-send-on-change><option value="NL">NL</option></select>
</form>"#;

    #[test]
    fn held_edits_flush_in_order() {
        let mut dom = Dom::parse(FORM).unwrap();
        let mut form = FormClient::from_markup(&dom, dom.by_id("f").unwrap()).unwrap();
        let name = dom.by_id("name").unwrap();
        form.field_input(&mut dom, name, "Ann-Marie");
        assert!(form.field_changed(&mut dom, name, "Anne").is_empty());
        assert_eq!(dom.value(name), "Anne");
        let flushed = form.flush();
        assert_eq!(flushed.get("name"), Some("Anne"));
        assert!(form.pending().is_empty());
    }

    #[test]
    fn send_on_change_reports_immediately() {
        let mut dom = Dom::parse(FORM).unwrap();
        let mut form = FormClient::from_markup(&dom, dom.by_id("f").unwrap()).unwrap();
        let country = dom.by_id("country").unwrap();
        let out = form.field_changed(&mut dom, country, "BE");
        let [WidgetOutcome::Call(call)] = out.as_slice() else {
            panic!("expected one call, got {out:?}");
        };
        assert_eq!(call.endpoint, "CustomerForm");
        assert_eq!(call.event_name(), Some("fieldchanged"));
        assert_eq!(call.params.get(keys::FIELD), Some("country"));
        assert_eq!(call.params.get(keys::VALUE), Some("BE"));
        assert!(form.pending().is_empty());
    }

    #[test]
    fn rebind_drops_edits_for_fields_that_are_gone() {
        let mut dom = Dom::parse(FORM).unwrap();
        let mut form = FormClient::from_markup(&dom, dom.by_id("f").unwrap()).unwrap();
        let name = dom.by_id("name").unwrap();
        form.field_changed(&mut dom, name, "Anne");
        form.pending.set("phone", "555");

        dom.replace_with_html(
            "f",
            r#"<form id="f" data-widget="form" data-procedure="CustomerForm"><input name="phone" value="1"></form>"#,
        )
        .unwrap()
        .unwrap();
        form.rebind(&mut dom, &Decoration::default());
        assert_eq!(form.pending().get("name"), None);
        assert_eq!(form.pending().get("phone"), Some("555"));
        assert_eq!(form.flush().len(), 1);
    }

    #[test]
    fn unnamed_fields_are_ignored() {
        let mut dom = Dom::parse(r#"<div id="f" data-widget="form"><input id=""></div>"#).unwrap();
        let mut form = FormClient::from_markup(&dom, dom.by_id("f").unwrap()).unwrap();
        assert_eq!(form.procedure(), "f");
        let root = dom.by_id("f").unwrap();
        let input = dom.element_children(root)[0];
        assert!(form.field_changed(&mut dom, input, "x").is_empty());
        assert!(form.flush().is_empty());
    }
}
