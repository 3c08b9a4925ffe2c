#![forbid(unsafe_code)]

//! Synchronous host loop.
//!
//! [`Driver::settle`] executes effects one at a time, oldest first, until the
//! client has nothing left to say. Calls are answered immediately through the
//! gateway, so every scenario runs to a fixed point deterministically.
//!
//! # Transcript
//!
//! Each executed effect appends one JSON object per line:
//!
//! ```json
//! {"event":"call","ticket":3,"endpoint":"CustomerForm","url":"CustomerForm?_event_=open&...","ok":true}
//! {"event":"show_modal","container":"tw-popup-1","title":"New customer"}
//! {"event":"confirm","ticket":4,"prompt":"Delete this record?","answer":false}
//! ```

use std::collections::VecDeque;

use serde_json::{Value, json};
use tweb_core::{KeyCode, KeyEvent};
use tweb_dom::{DomError, NodeId};
use tweb_protocol::PopupRequest;
use tweb_runtime::{Effect, Event, Gateway, ThinClient};

use crate::gateway::ScriptedGateway;

/// Upper bound on effects executed by one [`Driver::settle`].
const MAX_EFFECTS: usize = 10_000;

/// Popup chrome requests, in the order the client emitted them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chrome {
    Shown { container: String, title: String },
    Hidden { container: String },
}

/// Plays host for a [`ThinClient`].
#[derive(Debug)]
pub struct Driver<G: Gateway = ScriptedGateway> {
    client: ThinClient,
    gateway: G,
    chrome: Vec<Chrome>,
    alerts: Vec<String>,
    prompts: Vec<String>,
    redirects: Vec<String>,
    tabs: Vec<String>,
    confirm_answers: VecDeque<bool>,
    transcript: Vec<String>,
}

impl<G: Gateway> Driver<G> {
    pub fn new(client: ThinClient, gateway: G) -> Self {
        Self {
            client,
            gateway,
            chrome: Vec::new(),
            alerts: Vec::new(),
            prompts: Vec::new(),
            redirects: Vec::new(),
            tabs: Vec::new(),
            confirm_answers: VecDeque::new(),
            transcript: Vec::new(),
        }
    }

    #[must_use]
    pub fn client(&self) -> &ThinClient {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut ThinClient {
        &mut self.client
    }

    #[must_use]
    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn gateway_mut(&mut self) -> &mut G {
        &mut self.gateway
    }

    /// Load a page and settle whatever its widgets start.
    pub fn load(&mut self, html: &str) -> Result<(), DomError> {
        self.client.load(html)?;
        self.settle();
        Ok(())
    }

    // --- page lookups -------------------------------------------------------

    #[must_use]
    pub fn node(&self, id: &str) -> Option<NodeId> {
        self.client.page().by_id(id)
    }

    /// Text content of the element with `id`.
    #[must_use]
    pub fn text(&self, id: &str) -> Option<String> {
        self.node(id).map(|n| self.client.page().text_content(n))
    }

    /// Live value of the control with `id`.
    #[must_use]
    pub fn value(&self, id: &str) -> Option<String> {
        self.node(id).map(|n| self.client.page().value(n).to_string())
    }

    #[must_use]
    pub fn has_class(&self, id: &str, class: &str) -> bool {
        self.node(id)
            .is_some_and(|n| self.client.page().has_class(n, class))
    }

    // --- input --------------------------------------------------------------

    /// Feed an event and settle. Returns the number of effects executed.
    pub fn event(&mut self, event: Event) -> usize {
        self.client.handle_event(event);
        self.settle()
    }

    fn on_id(&mut self, id: &str, make: impl FnOnce(NodeId) -> Event) -> bool {
        match self.node(id) {
            Some(node) => {
                self.event(make(node));
                true
            }
            None => {
                tracing::warn!(target: "tweb.harness", id, "no element with that id");
                false
            }
        }
    }

    pub fn click(&mut self, id: &str) -> bool {
        self.on_id(id, Event::Click)
    }

    pub fn double_click(&mut self, id: &str) -> bool {
        self.on_id(id, Event::DoubleClick)
    }

    pub fn hover(&mut self, id: &str) -> bool {
        self.on_id(id, Event::Hover)
    }

    pub fn input(&mut self, id: &str, value: &str) -> bool {
        self.on_id(id, |node| Event::Input {
            node,
            value: value.to_string(),
        })
    }

    pub fn change(&mut self, id: &str, value: &str) -> bool {
        self.on_id(id, |node| Event::Change {
            node,
            value: value.to_string(),
        })
    }

    pub fn key(&mut self, id: &str, key: KeyEvent) -> bool {
        self.on_id(id, |node| Event::Key { node, key })
    }

    pub fn press(&mut self, id: &str, code: KeyCode) -> bool {
        self.key(id, KeyEvent::new(code))
    }

    pub fn open_popup(&mut self, request: PopupRequest) -> usize {
        self.client.open_popup(request);
        self.settle()
    }

    pub fn commit(&mut self) -> usize {
        self.client.commit();
        self.settle()
    }

    pub fn cancel(&mut self) -> usize {
        self.client.cancel();
        self.settle()
    }

    /// Answers for upcoming confirmations. Unanswered ones are declined.
    pub fn answer_confirms(&mut self, answers: impl IntoIterator<Item = bool>) {
        self.confirm_answers.extend(answers);
    }

    // --- host loop ----------------------------------------------------------

    /// Execute effects until the client is idle.
    pub fn settle(&mut self) -> usize {
        let mut executed = 0;
        loop {
            let effects = self.client.drain_effects();
            if effects.is_empty() {
                return executed;
            }
            for effect in effects {
                if executed == MAX_EFFECTS {
                    tracing::warn!(target: "tweb.harness", executed, "client did not settle");
                    return executed;
                }
                self.execute(effect);
                executed += 1;
            }
        }
    }

    fn log(&mut self, record: Value) {
        self.transcript.push(record.to_string());
    }

    fn execute(&mut self, effect: Effect) {
        match effect {
            Effect::Call(request) => {
                let result = self.gateway.call(&request);
                self.log(json!({
                    "event": "call",
                    "ticket": request.ticket.0,
                    "endpoint": request.call.endpoint,
                    "url": request.call.url(),
                    "ok": result.is_ok(),
                }));
                self.client.deliver(request.ticket, result);
            }
            Effect::Notify(request) => {
                let result = self.gateway.call(&request);
                self.log(json!({
                    "event": "notify",
                    "ticket": request.ticket.0,
                    "endpoint": request.call.endpoint,
                    "url": request.call.url(),
                    "ok": result.is_ok(),
                }));
            }
            Effect::ShowModal { container, title } => {
                self.log(json!({"event": "show_modal", "container": container, "title": title}));
                self.chrome.push(Chrome::Shown { container, title });
            }
            Effect::HideModal { container } => {
                self.log(json!({"event": "hide_modal", "container": container}));
                self.chrome.push(Chrome::Hidden { container });
            }
            Effect::Confirm { ticket, prompt } => {
                let answer = self.confirm_answers.pop_front().unwrap_or(false);
                self.log(json!({
                    "event": "confirm",
                    "ticket": ticket.0,
                    "prompt": prompt,
                    "answer": answer,
                }));
                self.prompts.push(prompt);
                self.client.answer_confirm(ticket, answer);
            }
            Effect::Alert { text } => {
                self.log(json!({"event": "alert", "text": text}));
                self.alerts.push(text);
            }
            Effect::Redirect { url } => {
                self.log(json!({"event": "redirect", "url": url}));
                self.redirects.push(url);
            }
            Effect::OpenTab { url } => {
                self.log(json!({"event": "open_tab", "url": url}));
                self.tabs.push(url);
            }
        }
    }

    // --- observations -------------------------------------------------------

    #[must_use]
    pub fn chrome(&self) -> &[Chrome] {
        &self.chrome
    }

    #[must_use]
    pub fn alerts(&self) -> &[String] {
        &self.alerts
    }

    /// Confirmation prompts shown, answered or not.
    #[must_use]
    pub fn prompts(&self) -> &[String] {
        &self.prompts
    }

    #[must_use]
    pub fn redirects(&self) -> &[String] {
        &self.redirects
    }

    #[must_use]
    pub fn tabs(&self) -> &[String] {
        &self.tabs
    }

    /// Executed effects as JSON lines.
    #[must_use]
    pub fn transcript(&self) -> &[String] {
        &self.transcript
    }

    /// The transcript as one JSONL document.
    #[must_use]
    pub fn transcript_jsonl(&self) -> String {
        let mut out = self.transcript.join("\n");
        if !out.is_empty() {
            out.push('\n');
        }
        out
    }

    /// Event names of the transcript, in order.
    #[must_use]
    pub fn transcript_events(&self) -> Vec<String> {
        self.transcript
            .iter()
            .filter_map(|line| serde_json::from_str::<Value>(line).ok())
            .filter_map(|v| v.get("event").and_then(Value::as_str).map(str::to_string))
            .collect()
    }
}

impl Driver<ScriptedGateway> {
    /// A driver over a fresh client and an empty scripted gateway.
    #[must_use]
    pub fn scripted(config: tweb_runtime::RuntimeConfig) -> Self {
        let session = tweb_core::TabSession::with_token("tab-test", tweb_core::TabOrigin::Minted);
        Self::new(ThinClient::new(config, session), ScriptedGateway::new())
    }
}
