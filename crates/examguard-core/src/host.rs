//! Host environment capability surface.
//!
//! The monitor never talks to a browser directly. It subscribes to signal
//! channels through [`HostEnvironment`] and receives [`HostEvent`]s from
//! whatever drives the session. Capabilities the host lacks are reported as
//! absent and the monitor carries on without them.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// A stream of host signals the monitor can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostChannel {
    Visibility,
    Focus,
    Pointer,
    Fullscreen,
    Clipboard,
    ContextMenu,
    Keyboard,
}

impl HostChannel {
    pub const ALL: [HostChannel; 7] = [
        HostChannel::Visibility,
        HostChannel::Focus,
        HostChannel::Pointer,
        HostChannel::Fullscreen,
        HostChannel::Clipboard,
        HostChannel::ContextMenu,
        HostChannel::Keyboard,
    ];
}

/// Handle returned by a successful subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

/// Equivalent fullscreen APIs, tried in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FullscreenApi {
    Standard,
    Webkit,
    Moz,
    Ms,
}

impl FullscreenApi {
    pub const FALLBACK_ORDER: [FullscreenApi; 4] = [
        FullscreenApi::Standard,
        FullscreenApi::Webkit,
        FullscreenApi::Moz,
        FullscreenApi::Ms,
    ];

    /// First API in fallback order the host offers.
    pub fn first_available(host: &dyn HostEnvironment) -> Option<FullscreenApi> {
        Self::FALLBACK_ORDER
            .into_iter()
            .find(|api| host.has_fullscreen_api(*api))
    }
}

/// Clipboard operations the monitor blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClipboardAction {
    Copy,
    Cut,
    Paste,
}

/// A key press with its modifier state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyCombo {
    /// Key name as reported by the host ("F12", "i", "U", ...).
    pub key: String,
    #[serde(default)]
    pub ctrl: bool,
    #[serde(default)]
    pub shift: bool,
    #[serde(default)]
    pub alt: bool,
    #[serde(default)]
    pub meta: bool,
}

impl KeyCombo {
    pub fn plain(key: &str) -> Self {
        Self {
            key: key.to_string(),
            ctrl: false,
            shift: false,
            alt: false,
            meta: false,
        }
    }

    pub fn ctrl(key: &str) -> Self {
        Self {
            ctrl: true,
            ..Self::plain(key)
        }
    }

    pub fn ctrl_shift(key: &str) -> Self {
        Self {
            ctrl: true,
            shift: true,
            ..Self::plain(key)
        }
    }
}

/// A raw signal delivered by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostEvent {
    /// The document became hidden or visible.
    VisibilityChanged { hidden: bool },
    WindowBlur,
    WindowFocus,
    /// The pointer left the document at the given coordinates.
    PointerLeave {
        x: f64,
        y: f64,
        viewport_width: f64,
        viewport_height: f64,
    },
    FullscreenChanged { fullscreen: bool },
    Clipboard { action: ClipboardAction },
    ContextMenu,
    KeyDown(KeyCombo),
}

impl HostEvent {
    /// Channel this event arrives on.
    pub fn channel(&self) -> HostChannel {
        match self {
            HostEvent::VisibilityChanged { .. } => HostChannel::Visibility,
            HostEvent::WindowBlur | HostEvent::WindowFocus => HostChannel::Focus,
            HostEvent::PointerLeave { .. } => HostChannel::Pointer,
            HostEvent::FullscreenChanged { .. } => HostChannel::Fullscreen,
            HostEvent::Clipboard { .. } => HostChannel::Clipboard,
            HostEvent::ContextMenu => HostChannel::ContextMenu,
            HostEvent::KeyDown(_) => HostChannel::Keyboard,
        }
    }
}

/// Capabilities the host exposes to the monitor.
pub trait HostEnvironment {
    /// Start delivering events on `channel`. `None` means the host cannot.
    fn subscribe(&mut self, channel: HostChannel) -> Option<SubscriptionId>;

    /// Stop a subscription previously returned by [`subscribe`](Self::subscribe).
    fn unsubscribe(&mut self, id: SubscriptionId);

    /// Whether the given fullscreen API exists on this host.
    fn has_fullscreen_api(&self, api: FullscreenApi) -> bool;

    fn enter_fullscreen(&mut self, api: FullscreenApi);

    fn exit_fullscreen(&mut self, api: FullscreenApi);
}

/// An in-process host with no UI, used for simulation and tests.
///
/// It hands out subscription ids, remembers which are live, and records
/// fullscreen requests.
#[derive(Debug, Clone)]
pub struct HeadlessHost {
    next_id: u64,
    live: BTreeSet<SubscriptionId>,
    fullscreen_apis: Vec<FullscreenApi>,
    unavailable: Vec<HostChannel>,
    fullscreen: bool,
    subscribe_calls: usize,
}

impl Default for HeadlessHost {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessHost {
    /// A host with every channel and the standard fullscreen API.
    pub fn new() -> Self {
        Self::with_fullscreen_apis(vec![FullscreenApi::Standard])
    }

    pub fn with_fullscreen_apis(apis: Vec<FullscreenApi>) -> Self {
        Self {
            next_id: 1,
            live: BTreeSet::new(),
            fullscreen_apis: apis,
            unavailable: Vec::new(),
            fullscreen: false,
            subscribe_calls: 0,
        }
    }

    /// A host that cannot go fullscreen at all.
    pub fn without_fullscreen() -> Self {
        let mut host = Self::with_fullscreen_apis(Vec::new());
        host.unavailable.push(HostChannel::Fullscreen);
        host
    }

    pub fn live_subscriptions(&self) -> usize {
        self.live.len()
    }

    pub fn subscribe_calls(&self) -> usize {
        self.subscribe_calls
    }

    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }
}

impl HostEnvironment for HeadlessHost {
    fn subscribe(&mut self, channel: HostChannel) -> Option<SubscriptionId> {
        self.subscribe_calls += 1;
        if self.unavailable.contains(&channel) {
            return None;
        }
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.live.insert(id);
        Some(id)
    }

    fn unsubscribe(&mut self, id: SubscriptionId) {
        self.live.remove(&id);
    }

    fn has_fullscreen_api(&self, api: FullscreenApi) -> bool {
        self.fullscreen_apis.contains(&api)
    }

    fn enter_fullscreen(&mut self, api: FullscreenApi) {
        if self.has_fullscreen_api(api) {
            self.fullscreen = true;
        }
    }

    fn exit_fullscreen(&mut self, api: FullscreenApi) {
        if self.has_fullscreen_api(api) {
            self.fullscreen = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_prefers_earliest_available_api() {
        let host = HeadlessHost::with_fullscreen_apis(vec![FullscreenApi::Ms, FullscreenApi::Webkit]);
        assert_eq!(
            FullscreenApi::first_available(&host),
            Some(FullscreenApi::Webkit)
        );
        assert_eq!(
            FullscreenApi::first_available(&HeadlessHost::without_fullscreen()),
            None
        );
    }

    #[test]
    fn headless_host_tracks_live_subscriptions() {
        let mut host = HeadlessHost::without_fullscreen();
        let a = host.subscribe(HostChannel::Focus).unwrap();
        assert!(host.subscribe(HostChannel::Fullscreen).is_none());
        assert_eq!(host.live_subscriptions(), 1);
        host.unsubscribe(a);
        assert_eq!(host.live_subscriptions(), 0);
        assert_eq!(host.subscribe_calls(), 2);
    }

    #[test]
    fn host_event_parses_from_toml() {
        let event: HostEvent = toml::from_str(
            r#"
type = "pointer_leave"
x = 0.0
y = 120.0
viewport_width = 1280.0
viewport_height = 720.0
"#,
        )
        .unwrap();
        assert_eq!(event.channel(), HostChannel::Pointer);

        let key: HostEvent = toml::from_str("type = \"key_down\"\nkey = \"F12\"").unwrap();
        assert_eq!(key, HostEvent::KeyDown(KeyCombo::plain("F12")));
    }
}
