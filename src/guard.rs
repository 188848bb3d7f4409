// Anti-tamper guard for the essay surface: no clipboard, drag/drop or context menu.

use tracing::debug;

/// DOM events the guard listens for on the writing surface.
pub const GUARDED_EVENTS: [&str; 8] = [
    "paste",
    "copy",
    "cut",
    "dragstart",
    "drop",
    "dragover",
    "contextmenu",
    "keydown",
];

/// Pressed key plus modifier state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyChord {
    pub key: String,
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
}

impl KeyChord {
    pub fn new(key: impl Into<String>) -> Self {
        KeyChord {
            key: key.into(),
            ..Default::default()
        }
    }

    pub fn ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    pub fn meta(mut self) -> Self {
        self.meta = true;
        self
    }

    pub fn shift(mut self) -> Self {
        self.shift = true;
        self
    }

    /// Copy, cut or paste shortcut on any platform.
    pub fn is_clipboard_shortcut(&self) -> bool {
        let key = self.key.to_lowercase();
        if (self.ctrl || self.meta) && matches!(key.as_str(), "c" | "v" | "x") {
            return true;
        }
        // Legacy bindings: Shift+Insert paste, Ctrl+Insert copy, Shift+Delete cut.
        match key.as_str() {
            "insert" => self.shift || self.ctrl,
            "delete" => self.shift,
            _ => false,
        }
    }
}

/// Event observed on the writing surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceEvent {
    Paste,
    Copy,
    Cut,
    DragStart,
    Drop,
    DragOver,
    ContextMenu,
    KeyDown(KeyChord),
    /// Anything else; always allowed.
    Other(String),
}

impl SurfaceEvent {
    /// Classify a DOM event by type name. Key state is only read for `keydown`.
    pub fn from_dom(event_type: &str, chord: Option<KeyChord>) -> Self {
        match event_type {
            "paste" => SurfaceEvent::Paste,
            "copy" => SurfaceEvent::Copy,
            "cut" => SurfaceEvent::Cut,
            "dragstart" => SurfaceEvent::DragStart,
            "drop" => SurfaceEvent::Drop,
            "dragover" => SurfaceEvent::DragOver,
            "contextmenu" => SurfaceEvent::ContextMenu,
            "keydown" => SurfaceEvent::KeyDown(chord.unwrap_or_default()),
            other => SurfaceEvent::Other(other.to_string()),
        }
    }

    /// Whether the guard cancels this event.
    pub fn is_blocked(&self) -> bool {
        match self {
            SurfaceEvent::KeyDown(chord) => chord.is_clipboard_shortcut(),
            SurfaceEvent::Other(_) => false,
            _ => true,
        }
    }
}

/// A text surface the guard can attach to.
///
/// The bound flag lives on the surface itself so a replaced element starts unguarded.
pub trait GuardSurface {
    fn is_guarded(&self) -> bool;
    fn mark_guarded(&self);
    /// Register a listener for each event name that cancels blocked events.
    fn install(&self, events: &[&'static str]);
}

pub struct InputGuard;

impl InputGuard {
    /// Attach the guard once per surface. Returns `false` when already bound.
    pub fn bind(surface: &dyn GuardSurface) -> bool {
        if surface.is_guarded() {
            debug!("writing surface already guarded");
            return false;
        }
        surface.mark_guarded();
        surface.install(&GUARDED_EVENTS);
        debug!(events = GUARDED_EVENTS.len(), "writing surface guarded");
        true
    }
}

#[cfg(all(test, not(target_arch = "wasm32")))]
pub(crate) mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::cell::{Cell, RefCell};

    /// In-memory surface that dispatches events through installed listeners.
    #[derive(Default)]
    pub(crate) struct FakeSurface {
        guarded: Cell<bool>,
        pub(crate) listeners: RefCell<Vec<&'static str>>,
    }

    impl FakeSurface {
        /// Returns true when a listener cancelled the event.
        pub(crate) fn dispatch(&self, event: &SurfaceEvent, event_type: &str) -> bool {
            self.listeners
                .borrow()
                .iter()
                .filter(|name| **name == event_type)
                .any(|_| event.is_blocked())
        }
    }

    impl GuardSurface for FakeSurface {
        fn is_guarded(&self) -> bool {
            self.guarded.get()
        }

        fn mark_guarded(&self) {
            self.guarded.set(true);
        }

        fn install(&self, events: &[&'static str]) {
            self.listeners.borrow_mut().extend_from_slice(events);
        }
    }

    #[test]
    fn clipboard_and_drag_events_blocked() {
        for name in &GUARDED_EVENTS[..7] {
            let event = SurfaceEvent::from_dom(name, None);
            assert!(event.is_blocked(), "{name} should be blocked");
        }
    }

    #[test]
    fn plain_typing_allowed() {
        assert!(!SurfaceEvent::from_dom("keydown", Some(KeyChord::new("c"))).is_blocked());
        assert!(!SurfaceEvent::from_dom("keydown", Some(KeyChord::new("V").shift())).is_blocked());
        assert!(!SurfaceEvent::from_dom("input", None).is_blocked());
        assert!(!SurfaceEvent::from_dom("keydown", None).is_blocked());
    }

    #[test]
    fn clipboard_shortcuts_blocked() {
        assert!(KeyChord::new("v").ctrl().is_clipboard_shortcut());
        assert!(KeyChord::new("C").meta().is_clipboard_shortcut());
        assert!(KeyChord::new("x").ctrl().shift().is_clipboard_shortcut());
        assert!(KeyChord::new("Insert").shift().is_clipboard_shortcut());
        assert!(KeyChord::new("Insert").ctrl().is_clipboard_shortcut());
        assert!(KeyChord::new("Delete").shift().is_clipboard_shortcut());
        assert!(!KeyChord::new("Delete").is_clipboard_shortcut());
        assert!(!KeyChord::new("a").ctrl().is_clipboard_shortcut());
    }

    #[test]
    fn bind_is_idempotent() {
        let surface = FakeSurface::default();
        assert!(InputGuard::bind(&surface));
        assert!(!InputGuard::bind(&surface));
        assert!(!InputGuard::bind(&surface));
        assert_eq!(surface.listeners.borrow().len(), GUARDED_EVENTS.len());
    }

    #[test]
    fn unbound_surface_lets_paste_through() {
        let surface = FakeSurface::default();
        assert!(!surface.dispatch(&SurfaceEvent::Paste, "paste"));
        InputGuard::bind(&surface);
        assert!(surface.dispatch(&SurfaceEvent::Paste, "paste"));
    }

    proptest! {
        #[test]
        fn letters_without_modifiers_never_blocked(key in "[a-z]", shift in any::<bool>()) {
            let chord = KeyChord { key, ctrl: false, meta: false, shift };
            prop_assert!(!SurfaceEvent::KeyDown(chord).is_blocked());
        }

        #[test]
        fn modifier_with_cvx_always_blocked(
            key in "[cvxCVX]",
            ctrl in any::<bool>(),
            shift in any::<bool>(),
        ) {
            let chord = KeyChord { key, ctrl, meta: !ctrl, shift };
            prop_assert!(SurfaceEvent::KeyDown(chord).is_blocked());
        }
    }
}
