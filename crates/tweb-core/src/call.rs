#![forbid(unsafe_code)]

//! Remote call descriptors.
//!
//! A [`RemoteCall`] names a server endpoint and carries ordered key/value
//! [`Params`]. It says nothing about transport: the host turns it into an
//! HTTP request (or anything else) and hands back the raw payload.
//!
//! Parameter values are kept raw. URL escaping happens exactly once, in
//! [`Params::to_query_string`], so a locate text like `a&b` reaches the server
//! intact.

use url::form_urlencoded;

use crate::action::Action;

/// Wire parameter names.
pub mod keys {
    /// Which client event produced the call.
    pub const EVENT: &str = "_event_";
    /// Numeric [`Action`](crate::Action) wire code.
    pub const ACTION: &str = "_action_";
    /// Opaque record key.
    pub const ROW_KEY: &str = "_rowkey_";
    /// Present when the content will be shown inside popup chrome.
    pub const POPUP: &str = "_popup_";
    /// Procedure that launched the current one.
    pub const CALLED_FROM: &str = "_calledfrom_";
    /// Parent procedure back-reference.
    pub const PARENT: &str = "_parent_";
    /// Grandparent procedure back-reference.
    pub const GRANDPARENT: &str = "_grandparent_";
    /// Opaque view-state echo token.
    pub const VIEW_STATE: &str = "_viewstate_";
    /// Opaque equate echo token.
    pub const EQUATE: &str = "_equate_";
    /// Refresh mode (paging direction or resume outcome).
    pub const REFRESH: &str = "_refresh_";
    /// Locate text.
    pub const LOCATE: &str = "_locate_";
    /// Sort key.
    pub const SORT: &str = "_sort_";
    /// Comma separated keys of collapsed records.
    pub const COLLAPSED: &str = "_collapsed_";
    /// Field name for field-level calls.
    pub const FIELD: &str = "_field_";
    /// Field value for field-level calls.
    pub const VALUE: &str = "_value_";
    /// Tab session token propagated through a new-tab link.
    pub const TAB: &str = "_tab_";
}

/// HTTP-style method hint for the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Method {
    /// Idempotent fetch.
    #[default]
    Get,
    /// State-changing submit.
    Post,
}

/// The client-side event a call reports to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallEvent {
    /// A popup frame is being populated.
    Open,
    /// A parent frame regains focus after a child closed.
    GainFocus,
    /// A grid row was clicked.
    RowClicked,
    /// Locate text changed.
    LocatorChanged,
    /// Locate text was cleared.
    ClearLocator,
    /// A column header was clicked.
    SortChanged,
    /// Paging.
    Nav,
    /// A record was expanded.
    Expand,
    /// A record was collapsed.
    Contract,
    /// A send-on-change field committed a value.
    FieldChanged,
    /// A popup frame commits.
    Save,
    /// A popup frame is abandoned.
    Cancel,
}

impl CallEvent {
    /// Wire name sent in the `_event_` parameter.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::GainFocus => "gainfocus",
            Self::RowClicked => "rowclicked",
            Self::LocatorChanged => "locatorchanged",
            Self::ClearLocator => "clearlocator",
            Self::SortChanged => "sortchanged",
            Self::Nav => "nav",
            Self::Expand => "expand",
            Self::Contract => "contract",
            Self::FieldChanged => "fieldchanged",
            Self::Save => "save",
            Self::Cancel => "cancel",
        }
    }
}

/// Paging direction of a grid navigation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NavDirection {
    First,
    Previous,
    Next,
    Last,
}

impl NavDirection {
    /// Parse a `data-nav` attribute value.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "first" => Some(Self::First),
            "previous" | "prev" => Some(Self::Previous),
            "next" => Some(Self::Next),
            "last" => Some(Self::Last),
            _ => None,
        }
    }
}

/// Value of the `_refresh_` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefreshMode {
    /// Grid paging.
    Page(NavDirection),
    /// Resume after a committed child frame.
    Saved,
    /// Resume after a cancelled child frame.
    Cancelled,
}

impl RefreshMode {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Page(NavDirection::First) => "first",
            Self::Page(NavDirection::Previous) => "previous",
            Self::Page(NavDirection::Next) => "next",
            Self::Page(NavDirection::Last) => "last",
            Self::Saved => "saved",
            Self::Cancelled => "cancelled",
        }
    }

    /// Resume flag for a closed frame.
    #[must_use]
    pub const fn resume(saved: bool) -> Self {
        if saved { Self::Saved } else { Self::Cancelled }
    }
}

/// Ordered key/value parameters.
///
/// Keys are unique: [`set`](Self::set) replaces an existing value in place so
/// the original position is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    pairs: Vec<(String, String)>,
}

impl Params {
    /// Empty parameter list.
    #[must_use]
    pub const fn new() -> Self {
        Self { pairs: Vec::new() }
    }

    /// Set `key` to `value`, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let key = key.into();
        let value = value.into();
        match self.pairs.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.pairs.push((key, value)),
        }
        self
    }

    /// Builder form of [`set`](Self::set).
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Look up a value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Remove a key, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let idx = self.pairs.iter().position(|(k, _)| k == key)?;
        Some(self.pairs.remove(idx).1)
    }

    /// Whether `key` is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Append every pair of `other`, replacing duplicates.
    pub fn extend(&mut self, other: &Params) {
        for (k, v) in other.iter() {
            self.set(k, v);
        }
    }

    /// Iterate pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// `application/x-www-form-urlencoded` rendering.
    #[must_use]
    pub fn to_query_string(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (k, v) in &self.pairs {
            serializer.append_pair(k, v);
        }
        serializer.finish()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (k, v) in iter {
            params.set(k, v);
        }
        params
    }
}

/// One remote operation: endpoint, method and parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCall {
    pub endpoint: String,
    pub method: Method,
    pub params: Params,
}

impl RemoteCall {
    /// A GET call with no parameters.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            method: Method::Get,
            params: Params::new(),
        }
    }

    /// A call tagged with a client event.
    #[must_use]
    pub fn event(endpoint: impl Into<String>, event: CallEvent) -> Self {
        Self::new(endpoint).param(keys::EVENT, event.as_str())
    }

    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.set(key, value);
        self
    }

    #[must_use]
    pub fn params(mut self, params: &Params) -> Self {
        self.params.extend(params);
        self
    }

    /// Set the `_action_` parameter to the action's wire code.
    #[must_use]
    pub fn action(self, action: Action) -> Self {
        self.param(keys::ACTION, action.wire_code().to_string())
    }

    /// The client event this call reports, if tagged.
    #[must_use]
    pub fn event_name(&self) -> Option<&str> {
        self.params.get(keys::EVENT)
    }

    /// `endpoint?query` rendering, for logs and GET transports.
    #[must_use]
    pub fn url(&self) -> String {
        if self.params.is_empty() {
            self.endpoint.clone()
        } else {
            format!("{}?{}", self.endpoint, self.params.to_query_string())
        }
    }
}
