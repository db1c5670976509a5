//! Global key-chord bindings.
//!
//! | chord                 | action                               |
//! |-----------------------|--------------------------------------|
//! | primary + Enter       | submit the configuration (when idle) |
//! | Escape                | close open overlays                  |
//! | primary + Shift + R   | reset configuration after confirming |
//! | Shift + ?             | show help                            |
//!
//! "primary" is Ctrl or Meta (Cmd), whichever the platform delivers.

use std::{fmt, str::FromStr, sync::Arc};

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::{
    config_store::ConfigurationStore, orchestrator::GenerationOrchestrator, ConfirmPrompt,
    EventSender, ForgeEvent,
};

const RESET_PROMPT: &str = "Reset project configuration?";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Enter,
    Escape,
    Char(char),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Modifiers {
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
    pub alt: bool,
}

impl Modifiers {
    pub fn primary(&self) -> bool {
        self.ctrl || self.meta
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyChord {
    pub key: Key,
    pub modifiers: Modifiers,
}

impl KeyChord {
    pub fn new(key: Key, modifiers: Modifiers) -> Self {
        Self { key, modifiers }
    }

    pub fn plain(key: Key) -> Self {
        Self::new(key, Modifiers::default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChordParseError {
    #[error("empty key chord")]
    Empty,
    #[error("unknown modifier '{0}'")]
    UnknownModifier(String),
    #[error("unknown key '{0}'")]
    UnknownKey(String),
}

impl FromStr for KeyChord {
    type Err = ChordParseError;

    /// Parses chords such as `ctrl+enter`, `cmd+shift+r`, `esc` or `shift+?`.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ChordParseError::Empty);
        }

        // `+` itself can be the key, e.g. `ctrl++`
        let (prefix, key_token) = match raw.strip_suffix("++") {
            Some(prefix) => (prefix, "+"),
            None => match raw.rsplit_once('+') {
                Some((prefix, key)) => (prefix, key),
                None => ("", raw),
            },
        };

        let mut modifiers = Modifiers::default();
        for token in prefix.split('+').filter(|token| !token.is_empty()) {
            match token.trim().to_ascii_lowercase().as_str() {
                "ctrl" | "control" => modifiers.ctrl = true,
                "cmd" | "meta" | "super" => modifiers.meta = true,
                "shift" => modifiers.shift = true,
                "alt" | "option" => modifiers.alt = true,
                other => return Err(ChordParseError::UnknownModifier(other.to_string())),
            }
        }

        let key_token = key_token.trim();
        let key = match key_token.to_ascii_lowercase().as_str() {
            "" => return Err(ChordParseError::Empty),
            "enter" | "return" => Key::Enter,
            "esc" | "escape" => Key::Escape,
            _ => {
                let mut chars = key_token.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Key::Char(c),
                    _ => return Err(ChordParseError::UnknownKey(key_token.to_string())),
                }
            }
        };

        Ok(Self { key, modifiers })
    }
}

impl fmt::Display for KeyChord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.modifiers;
        for (on, label) in [
            (m.ctrl, "ctrl+"),
            (m.meta, "cmd+"),
            (m.alt, "alt+"),
            (m.shift, "shift+"),
        ] {
            if on {
                f.write_str(label)?;
            }
        }
        match self.key {
            Key::Enter => f.write_str("enter"),
            Key::Escape => f.write_str("esc"),
            Key::Char(c) => write!(f, "{}", c.to_ascii_lowercase()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterAction {
    Submit,
    CloseOverlays,
    ResetConfiguration,
    ShowHelp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterOutcome {
    Submitted { succeeded: bool },
    SkippedBusy,
    OverlaysClosed,
    ResetApplied,
    ResetDeclined,
    HelpRequested,
    Unbound,
}

/// Answers every confirmation with a fixed choice, for non-interactive use.
pub struct AutoConfirm(pub bool);

#[async_trait]
impl ConfirmPrompt for AutoConfirm {
    async fn confirm(&self, _message: &str) -> bool {
        self.0
    }
}

pub struct CommandRouter {
    orchestrator: Arc<GenerationOrchestrator>,
    config: Arc<ConfigurationStore>,
    confirm: Arc<dyn ConfirmPrompt>,
    events: EventSender,
}

impl CommandRouter {
    pub fn new(
        orchestrator: Arc<GenerationOrchestrator>,
        config: Arc<ConfigurationStore>,
        confirm: Arc<dyn ConfirmPrompt>,
        events: EventSender,
    ) -> Self {
        Self {
            orchestrator,
            config,
            confirm,
            events,
        }
    }

    pub fn resolve(chord: &KeyChord) -> Option<RouterAction> {
        let m = &chord.modifiers;
        match chord.key {
            Key::Enter if m.primary() => Some(RouterAction::Submit),
            Key::Escape => Some(RouterAction::CloseOverlays),
            Key::Char(c) if m.primary() && m.shift && c.eq_ignore_ascii_case(&'r') => {
                Some(RouterAction::ResetConfiguration)
            }
            Key::Char('?') if m.shift => Some(RouterAction::ShowHelp),
            _ => None,
        }
    }

    /// Runs the bound action. Repeated chords re-run the action; duplicate
    /// submissions are absorbed by the orchestrator's admission check.
    pub async fn dispatch(&self, chord: &KeyChord) -> RouterOutcome {
        let Some(action) = Self::resolve(chord) else {
            debug!(%chord, "unbound key chord");
            return RouterOutcome::Unbound;
        };
        debug!(%chord, ?action, "dispatching key chord");

        match action {
            RouterAction::Submit => {
                if self.orchestrator.is_running() {
                    return RouterOutcome::SkippedBusy;
                }
                RouterOutcome::Submitted {
                    succeeded: self.orchestrator.submit().await,
                }
            }
            RouterAction::CloseOverlays => {
                let _ = self.events.send(ForgeEvent::CloseOverlays);
                RouterOutcome::OverlaysClosed
            }
            RouterAction::ResetConfiguration => {
                if self.confirm.confirm(RESET_PROMPT).await {
                    self.config.reset().await;
                    RouterOutcome::ResetApplied
                } else {
                    RouterOutcome::ResetDeclined
                }
            }
            RouterAction::ShowHelp => {
                let _ = self.events.send(ForgeEvent::HelpRequested);
                RouterOutcome::HelpRequested
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/command_router_tests.rs"]
mod tests;
