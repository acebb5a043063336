//! Operation modes.
//!
//! Four independent switches gate every validator operation. A disabled mode
//! makes its operations return a skipped outcome instead of doing work.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Error, Result};

/// Name accepted by [`ModeController::set`] to address every mode at once.
pub const ALL_MODES: &str = "all";

/// A single validator mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Read-only scans.
    Analyze,
    /// Deleting unbound rows and closing tree gaps.
    Clean,
    /// Re-attaching objects and subtrees under the recovery folder.
    Restore,
    /// Purging trashed subtrees.
    EmptyTrash,
}

impl Mode {
    /// Returns all modes.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Analyze, Self::Clean, Self::Restore, Self::EmptyTrash]
    }

    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Analyze => "analyze",
            Self::Clean => "clean",
            Self::Restore => "restore",
            Self::EmptyTrash => "empty_trash",
        }
    }

    /// Parses a mode name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "analyze" => Some(Self::Analyze),
            "clean" => Some(Self::Clean),
            "restore" => Some(Self::Restore),
            "empty_trash" | "empty-trash" => Some(Self::EmptyTrash),
            _ => None,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parses a strict boolean.
///
/// # Errors
///
/// Returns [`Error::InvalidParameter`] for anything but `true`/`false`
/// (case-insensitive) or `1`/`0`.
pub fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(Error::InvalidParameter(format!(
            "mode value must be a boolean, got '{other}'"
        ))),
    }
}

/// Holds the four mode switches.
///
/// Defaults to `analyze` only, so a fresh validator never mutates anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeController {
    analyze: bool,
    clean: bool,
    restore: bool,
    empty_trash: bool,
}

impl Default for ModeController {
    fn default() -> Self {
        Self {
            analyze: true,
            clean: false,
            restore: false,
            empty_trash: false,
        }
    }
}

impl ModeController {
    /// Creates a controller with the default modes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a controller with every mode set to `value`.
    #[must_use]
    pub const fn uniform(value: bool) -> Self {
        Self {
            analyze: value,
            clean: value,
            restore: value,
            empty_trash: value,
        }
    }

    /// Returns whether `mode` is enabled.
    #[must_use]
    pub const fn enabled(&self, mode: Mode) -> bool {
        match mode {
            Mode::Analyze => self.analyze,
            Mode::Clean => self.clean,
            Mode::Restore => self.restore,
            Mode::EmptyTrash => self.empty_trash,
        }
    }

    /// Sets a single mode.
    pub const fn set_mode(&mut self, mode: Mode, value: bool) {
        match mode {
            Mode::Analyze => self.analyze = value,
            Mode::Clean => self.clean = value,
            Mode::Restore => self.restore = value,
            Mode::EmptyTrash => self.empty_trash = value,
        }
    }

    /// Sets a mode by name; `all` fans out to every mode.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] for a name outside the fixed set.
    /// State is unchanged on error.
    pub fn set(&mut self, name: &str, value: bool) -> Result<()> {
        if name.trim().eq_ignore_ascii_case(ALL_MODES) {
            *self = Self::uniform(value);
            return Ok(());
        }

        let mode = Mode::parse(name)
            .ok_or_else(|| Error::InvalidParameter(format!("cannot set unknown mode '{name}'")))?;
        self.set_mode(mode, value);
        Ok(())
    }

    /// Sets a mode from a textual value such as a CLI argument.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] for an unknown name or a
    /// non-boolean value. State is unchanged on error.
    pub fn set_str(&mut self, name: &str, value: &str) -> Result<()> {
        let value = parse_bool(value)?;
        self.set(name, value)
    }

    /// Applies a `NAME=BOOL` assignment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] if the assignment is malformed.
    pub fn apply_assignment(&mut self, assignment: &str) -> Result<()> {
        let (name, value) = assignment.split_once('=').ok_or_else(|| {
            Error::InvalidParameter(format!("expected NAME=BOOL, got '{assignment}'"))
        })?;
        self.set_str(name, value)
    }

    /// Queries a mode by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownMode`] for a name outside the fixed set.
    pub fn is_enabled(&self, name: &str) -> Result<bool> {
        Mode::parse(name)
            .map(|mode| self.enabled(mode))
            .ok_or_else(|| Error::UnknownMode(name.to_string()))
    }

    /// Returns `(mode, enabled)` pairs in declaration order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(Mode, bool)> {
        Mode::all().iter().map(|m| (*m, self.enabled(*m))).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_only_analyze() {
        let modes = ModeController::new();
        assert!(modes.enabled(Mode::Analyze));
        assert!(!modes.enabled(Mode::Clean));
        assert!(!modes.enabled(Mode::Restore));
        assert!(!modes.enabled(Mode::EmptyTrash));
    }

    #[test]
    fn test_set_all_fans_out() {
        let mut modes = ModeController::new();
        modes.set("all", true).unwrap();
        assert_eq!(modes, ModeController::uniform(true));

        modes.set("ALL", false).unwrap();
        assert_eq!(modes, ModeController::uniform(false));
    }

    #[test]
    fn test_set_unknown_mode_leaves_state() {
        let mut modes = ModeController::new();
        let err = modes.set("purge", true).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));
        assert_eq!(modes, ModeController::new());
    }

    #[test]
    fn test_set_non_boolean_leaves_state() {
        let mut modes = ModeController::new();
        let err = modes.set_str("clean", "yes").unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));
        assert!(!modes.enabled(Mode::Clean));

        modes.set_str("clean", "TRUE").unwrap();
        assert!(modes.enabled(Mode::Clean));
    }

    #[test]
    fn test_query_unknown_mode() {
        let modes = ModeController::new();
        assert!(matches!(
            modes.is_enabled("repair"),
            Err(Error::UnknownMode(name)) if name == "repair"
        ));
        assert!(modes.is_enabled("analyze").unwrap());
    }

    #[test]
    fn test_apply_assignment() {
        let mut modes = ModeController::new();
        modes.apply_assignment("empty-trash=1").unwrap();
        assert!(modes.enabled(Mode::EmptyTrash));
        assert!(modes.apply_assignment("restore").is_err());
    }
}
