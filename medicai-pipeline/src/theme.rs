use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Result;
use crate::storage::KeyValueStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
}

impl Theme {
    /// Saved preference first, else the system preference.
    pub fn effective(saved: Option<Theme>, prefers_dark: bool) -> Theme {
        saved.unwrap_or(if prefers_dark { Theme::Dark } else { Theme::Light })
    }

    pub fn toggled(self) -> Theme {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Theme::Light => f.write_str("light"),
            Theme::Dark => f.write_str("dark"),
        }
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(format!("unknown theme: {}", other)),
        }
    }
}

pub async fn load_theme(store: &dyn KeyValueStore, key: &str) -> Result<Option<Theme>> {
    Ok(store.get(key).await?.and_then(|value| value.parse().ok()))
}

pub async fn save_theme(store: &dyn KeyValueStore, key: &str, theme: Theme) -> Result<()> {
    store.set(key, theme.to_string()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStore;

    #[test]
    fn saved_preference_beats_system() {
        assert_eq!(Theme::effective(Some(Theme::Light), true), Theme::Light);
        assert_eq!(Theme::effective(None, true), Theme::Dark);
        assert_eq!(Theme::effective(None, false), Theme::Light);
    }

    #[tokio::test]
    async fn theme_persists_as_plain_text() {
        let store = InMemoryStore::new();
        assert_eq!(load_theme(&store, "theme").await.unwrap(), None);

        save_theme(&store, "theme", Theme::Dark.toggled().toggled())
            .await
            .unwrap();
        assert_eq!(store.get("theme").await.unwrap().as_deref(), Some("dark"));
        assert_eq!(load_theme(&store, "theme").await.unwrap(), Some(Theme::Dark));
    }
}
