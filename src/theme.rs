//! The theme store.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::storage::Storage;

const THEME_KEY: &str = "theme";

/// The widget's color scheme.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    /// Light text on a dark background.
    #[default]
    Dark,

    /// Dark text on a light background.
    Light,
}

impl Theme {
    /// Returns the other theme.
    pub fn toggled(self) -> Self {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }

    /// Returns the persisted name of the theme.
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Dark => "dark",
            Theme::Light => "light",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an invalid theme name.
#[derive(Debug)]
pub struct ThemeParseError {
    /// The invalid string value that could not be parsed.
    pub invalid_value: String,
}

impl fmt::Display for ThemeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown theme: {}", self.invalid_value)
    }
}

impl std::error::Error for ThemeParseError {}

impl FromStr for Theme {
    type Err = ThemeParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "dark" => Ok(Theme::Dark),
            "light" => Ok(Theme::Light),
            _ => Err(ThemeParseError {
                invalid_value: s.to_string(),
            }),
        }
    }
}

/// Process-wide theme state, persisted through [`Storage`].
pub struct ThemeStore {
    storage: Arc<dyn Storage>,
    current: Mutex<Theme>,
}

impl ThemeStore {
    /// Loads the persisted theme, falling back to the default when the stored
    /// value is missing, unreadable, or unknown.
    pub fn load(storage: Arc<dyn Storage>) -> Self {
        let current = match storage.get(THEME_KEY) {
            Ok(Some(value)) => value.parse().unwrap_or_default(),
            Ok(None) => Theme::default(),
            Err(err) => {
                log::warn!("could not read theme preference: {err}");
                Theme::default()
            }
        };
        Self {
            storage,
            current: Mutex::new(current),
        }
    }

    /// Returns the current theme.
    pub fn theme(&self) -> Theme {
        *self.current.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Sets and persists the theme.
    pub fn set(&self, theme: Theme) -> Result<()> {
        let mut current = self.current.lock().unwrap_or_else(|p| p.into_inner());
        self.storage.set(THEME_KEY, theme.as_str())?;
        *current = theme;
        Ok(())
    }

    /// Switches to the other theme and returns it.
    pub fn toggle(&self) -> Result<Theme> {
        let next = self.theme().toggled();
        self.set(next)?;
        Ok(next)
    }
}
