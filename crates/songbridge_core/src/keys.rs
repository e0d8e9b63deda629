//! Physical keys the dispatcher can press.
//!
//! Config files name keys as strings (`"down"`, `"page_down"`, `"f5"`, `"a"`);
//! [`KeyCode`] parses and prints that form so it round-trips through TOML.

use crate::error::ConfigError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    /// Lower-case ASCII letter or digit.
    Char(char),
    Up,
    Down,
    PageUp,
    PageDown,
    Home,
    End,
    Enter,
    Tab,
    Space,
    /// Function key `F1..=F24`.
    F(u8),
}

impl FromStr for KeyCode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let name = value.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        let key = match name.as_str() {
            "up" => KeyCode::Up,
            "down" => KeyCode::Down,
            "page_up" | "pageup" | "pgup" | "prior" => KeyCode::PageUp,
            "page_down" | "pagedown" | "pgdn" | "next" => KeyCode::PageDown,
            "home" => KeyCode::Home,
            "end" => KeyCode::End,
            "enter" | "return" => KeyCode::Enter,
            "tab" => KeyCode::Tab,
            "space" => KeyCode::Space,
            _ => {
                let mut chars = name.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) if c.is_ascii_alphanumeric() => KeyCode::Char(c),
                    (Some('f'), Some(_)) => match name[1..].parse::<u8>() {
                        Ok(n) if (1..=24).contains(&n) => KeyCode::F(n),
                        _ => return Err(ConfigError::InvalidKey(value.to_string())),
                    },
                    _ => return Err(ConfigError::InvalidKey(value.to_string())),
                }
            }
        };
        Ok(key)
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyCode::Char(c) => write!(f, "{}", c),
            KeyCode::Up => write!(f, "up"),
            KeyCode::Down => write!(f, "down"),
            KeyCode::PageUp => write!(f, "page_up"),
            KeyCode::PageDown => write!(f, "page_down"),
            KeyCode::Home => write!(f, "home"),
            KeyCode::End => write!(f, "end"),
            KeyCode::Enter => write!(f, "enter"),
            KeyCode::Tab => write!(f, "tab"),
            KeyCode::Space => write!(f, "space"),
            KeyCode::F(n) => write!(f, "f{}", n),
        }
    }
}

impl Serialize for KeyCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for KeyCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
