//! Integrity monitor.
//!
//! Turns raw host signals into a debounced, thresholded list of violations.
//! A single debounce window is shared by every violation type: a signal that
//! arrives less than `debounce` after the last accepted violation is dropped,
//! whatever its type.
//!
//! Clipboard use, the context menu and the dev-tools / view-source / save
//! shortcuts are blocked while the monitor is active but never count toward
//! the threshold.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::host::{
    ClipboardAction, FullscreenApi, HostChannel, HostEnvironment, HostEvent, KeyCombo,
    SubscriptionId,
};
use crate::model::{Violation, ViolationKind};

/// Default number of violations that forces submission.
pub const DEFAULT_MAX_VIOLATIONS: usize = 3;

/// Default minimum spacing between two accepted violations.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1000);

/// Invoked once, with a copy of the violation list, when the threshold is hit.
pub type ThresholdCallback = Box<dyn FnOnce(Vec<Violation>) + Send>;

/// Configuration for the integrity monitor.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Signals closer than this to the last accepted violation are dropped.
    pub debounce: Duration,
    /// Ask the host to enter fullscreen on activation.
    pub require_fullscreen: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            require_fullscreen: true,
        }
    }
}

/// An action suppressed by the monitor without counting as a violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockedAction {
    Clipboard(ClipboardAction),
    ContextMenu,
    DevTools,
    ViewSource,
    SavePage,
}

impl std::fmt::Display for BlockedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockedAction::Clipboard(ClipboardAction::Copy) => write!(f, "copy"),
            BlockedAction::Clipboard(ClipboardAction::Cut) => write!(f, "cut"),
            BlockedAction::Clipboard(ClipboardAction::Paste) => write!(f, "paste"),
            BlockedAction::ContextMenu => write!(f, "context menu"),
            BlockedAction::DevTools => write!(f, "developer tools"),
            BlockedAction::ViewSource => write!(f, "view source"),
            BlockedAction::SavePage => write!(f, "save page"),
        }
    }
}

/// Every blocked action, for display at the consent gate.
pub const BLOCKED_ACTIONS: [BlockedAction; 7] = [
    BlockedAction::Clipboard(ClipboardAction::Copy),
    BlockedAction::Clipboard(ClipboardAction::Cut),
    BlockedAction::Clipboard(ClipboardAction::Paste),
    BlockedAction::ContextMenu,
    BlockedAction::DevTools,
    BlockedAction::ViewSource,
    BlockedAction::SavePage,
];

/// Maps a key press to the shortcut it would trigger, if restricted.
///
/// Covers F12, Ctrl/Cmd+Shift+I/J/C, Cmd+Option+I/J/C, Ctrl/Cmd+U and
/// Ctrl/Cmd+S.
pub fn restricted_shortcut(combo: &KeyCombo) -> Option<BlockedAction> {
    let key = combo.key.to_ascii_uppercase();
    let primary = combo.ctrl || combo.meta;
    match key.as_str() {
        "F12" => Some(BlockedAction::DevTools),
        "I" | "J" | "C" if (primary && combo.shift) || (combo.meta && combo.alt) => {
            Some(BlockedAction::DevTools)
        }
        "U" if primary => Some(BlockedAction::ViewSource),
        "S" if primary => Some(BlockedAction::SavePage),
        _ => None,
    }
}

/// What the monitor did with a host event.
#[derive(Debug, Clone, PartialEq)]
pub enum EventDisposition {
    /// The monitor is not active.
    Inactive,
    /// The event carries no integrity meaning.
    Ignored,
    /// A violation was detected inside the debounce window and dropped.
    Debounced(ViolationKind),
    /// A violation was appended; `count` is the new total.
    Recorded { violation: Violation, count: usize },
    /// The host should cancel the default action.
    Blocked(BlockedAction),
}

impl EventDisposition {
    /// Whether the host must suppress the event's default action.
    pub fn should_prevent_default(&self) -> bool {
        matches!(self, EventDisposition::Blocked(_))
    }
}

/// Notification hook for warnings shown to the candidate.
pub trait IntegrityObserver: Send + Sync {
    /// `state` already includes `violation`.
    fn on_violation(&self, violation: &Violation, state: &IntegrityState);
    fn on_blocked(&self, action: BlockedAction);
    fn on_threshold(&self, count: usize);
}

/// Observer that shows nothing.
pub struct NoopObserver;

impl IntegrityObserver for NoopObserver {
    fn on_violation(&self, _: &Violation, _: &IntegrityState) {}
    fn on_blocked(&self, _: BlockedAction) {}
    fn on_threshold(&self, _: usize) {}
}

/// Violation state for one activation of the monitor.
#[derive(Debug, Clone)]
pub struct IntegrityState {
    violations: Vec<Violation>,
    last_violation_at: Option<DateTime<Utc>>,
    is_fullscreen: bool,
    document_hidden: bool,
    max_violations: usize,
}

impl IntegrityState {
    fn new(max_violations: usize) -> Self {
        Self {
            violations: Vec::new(),
            last_violation_at: None,
            is_fullscreen: false,
            document_hidden: false,
            max_violations,
        }
    }

    /// Accepted violations in detection order.
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn violation_count(&self) -> usize {
        self.violations.len()
    }

    pub fn last_violation_at(&self) -> Option<DateTime<Utc>> {
        self.last_violation_at
    }

    pub fn is_fullscreen(&self) -> bool {
        self.is_fullscreen
    }

    pub fn max_violations(&self) -> usize {
        self.max_violations
    }

    /// Violations left before the threshold.
    pub fn remaining(&self) -> usize {
        self.max_violations.saturating_sub(self.violation_count())
    }
}

/// Watches host signals during an exam.
///
/// The monitor owns its host so that dropping it releases every
/// subscription, whatever path the owning session took to end.
pub struct IntegrityMonitor<H: HostEnvironment> {
    host: H,
    clock: Arc<dyn Clock>,
    config: MonitorConfig,
    observer: Arc<dyn IntegrityObserver>,
    state: IntegrityState,
    active: bool,
    subscriptions: Vec<SubscriptionId>,
    fullscreen_api: Option<FullscreenApi>,
    on_threshold: Option<ThresholdCallback>,
}

impl<H: HostEnvironment> IntegrityMonitor<H> {
    pub fn new(host: H, clock: Arc<dyn Clock>, config: MonitorConfig) -> Self {
        Self {
            host,
            clock,
            config,
            observer: Arc::new(NoopObserver),
            state: IntegrityState::new(DEFAULT_MAX_VIOLATIONS),
            active: false,
            subscriptions: Vec::new(),
            fullscreen_api: None,
            on_threshold: None,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn IntegrityObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Start listening with a fresh state.
    ///
    /// Returns `false` without touching anything if already active.
    pub fn activate(&mut self, max_violations: usize, on_threshold: ThresholdCallback) -> bool {
        if self.active {
            tracing::debug!("integrity monitor already active, ignoring activate");
            return false;
        }

        let max_violations = if max_violations == 0 {
            tracing::warn!("max_violations of 0 is not allowed, using 1");
            1
        } else {
            max_violations
        };
        self.state = IntegrityState::new(max_violations);

        for channel in HostChannel::ALL {
            match self.host.subscribe(channel) {
                Some(id) => self.subscriptions.push(id),
                None => tracing::debug!(?channel, "host channel unavailable"),
            }
        }

        self.fullscreen_api = FullscreenApi::first_available(&self.host);
        if self.config.require_fullscreen {
            match self.fullscreen_api {
                Some(api) => {
                    self.host.enter_fullscreen(api);
                    self.state.is_fullscreen = true;
                }
                None => tracing::debug!("fullscreen unsupported by host"),
            }
        }

        self.on_threshold = Some(on_threshold);
        self.active = true;
        tracing::info!(
            max_violations,
            subscriptions = self.subscriptions.len(),
            "integrity monitor activated"
        );
        true
    }

    /// Stop listening and release every host subscription.
    ///
    /// Returns `false` if the monitor was not active. The last state stays
    /// readable until the next activation.
    pub fn deactivate(&mut self) -> bool {
        if !self.active {
            return false;
        }
        self.active = false;

        for id in self.subscriptions.drain(..) {
            self.host.unsubscribe(id);
        }
        if self.state.is_fullscreen {
            if let Some(api) = self.fullscreen_api {
                self.host.exit_fullscreen(api);
            }
            self.state.is_fullscreen = false;
        }
        self.on_threshold = None;

        tracing::info!(
            violations = self.state.violation_count(),
            "integrity monitor deactivated"
        );
        true
    }

    /// Classify one host event.
    pub fn handle_event(&mut self, event: &HostEvent) -> EventDisposition {
        if !self.active {
            tracing::debug!(channel = ?event.channel(), "monitor inactive, event ignored");
            return EventDisposition::Inactive;
        }

        match event {
            HostEvent::VisibilityChanged { hidden: true } => {
                self.state.document_hidden = true;
                self.report_signal(ViolationKind::TabSwitch)
            }
            HostEvent::VisibilityChanged { hidden: false } | HostEvent::WindowFocus => {
                if self.state.document_hidden {
                    self.state.document_hidden = false;
                    self.report_signal(ViolationKind::TabReturn)
                } else {
                    EventDisposition::Ignored
                }
            }
            HostEvent::WindowBlur => self.report_signal(ViolationKind::WindowBlur),
            HostEvent::PointerLeave {
                x,
                y,
                viewport_width,
                viewport_height,
            } => {
                let outside =
                    *x <= 0.0 || *y <= 0.0 || *x >= *viewport_width || *y >= *viewport_height;
                if outside {
                    self.report_signal(ViolationKind::MouseExit)
                } else {
                    EventDisposition::Ignored
                }
            }
            HostEvent::FullscreenChanged { fullscreen } => {
                self.state.is_fullscreen = *fullscreen;
                if !*fullscreen && self.fullscreen_api.is_some() {
                    self.report_signal(ViolationKind::FullscreenExit)
                } else {
                    EventDisposition::Ignored
                }
            }
            HostEvent::Clipboard { action } => self.block(BlockedAction::Clipboard(*action)),
            HostEvent::ContextMenu => self.block(BlockedAction::ContextMenu),
            HostEvent::KeyDown(combo) => match restricted_shortcut(combo) {
                Some(action) => self.block(action),
                None => EventDisposition::Ignored,
            },
        }
    }

    /// Record a violation of `kind` unless inactive or inside the debounce
    /// window. Fires the threshold callback the first time the count reaches
    /// the maximum.
    pub fn report_signal(&mut self, kind: ViolationKind) -> EventDisposition {
        if !self.active {
            return EventDisposition::Inactive;
        }

        let now = self.clock.now();
        if let Some(last) = self.state.last_violation_at {
            let elapsed_ms = now.signed_duration_since(last).num_milliseconds();
            let window_ms = i64::try_from(self.config.debounce.as_millis()).unwrap_or(i64::MAX);
            if elapsed_ms < window_ms {
                tracing::debug!(%kind, elapsed_ms, "violation debounced");
                return EventDisposition::Debounced(kind);
            }
        }

        let violation = Violation::new(kind, now);
        self.state.violations.push(violation.clone());
        self.state.last_violation_at = Some(now);

        let count = self.state.violation_count();
        let max = self.state.max_violations;
        tracing::warn!(%kind, count, max, "integrity violation recorded");
        self.observer.on_violation(&violation, &self.state);

        if count >= max {
            if let Some(callback) = self.on_threshold.take() {
                tracing::warn!(count, "violation threshold reached");
                self.observer.on_threshold(count);
                callback(self.state.violations.clone());
            }
        }

        EventDisposition::Recorded { violation, count }
    }

    fn block(&self, action: BlockedAction) -> EventDisposition {
        tracing::warn!(%action, "blocked restricted action");
        self.observer.on_blocked(action);
        EventDisposition::Blocked(action)
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn state(&self) -> &IntegrityState {
        &self.state
    }

    /// Copy of the violations accepted so far.
    pub fn snapshot(&self) -> Vec<Violation> {
        self.state.violations.clone()
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn host(&self) -> &H {
        &self.host
    }
}

impl<H: HostEnvironment> Drop for IntegrityMonitor<H> {
    fn drop(&mut self) {
        self.deactivate();
    }
}
