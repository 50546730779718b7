//! User preference types and static catalogs

use henry_core::Timestamp;
use serde::{Deserialize, Serialize};

pub const DEFAULT_THEME: &str = "light";
pub const DEFAULT_LANGUAGE: &str = "en";
pub const DEFAULT_TIMEZONE: &str = "UTC";
pub const DEFAULT_AI_MODEL: &str = "gpt-4";

/// Stored preferences for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    pub theme: String,
    pub language: String,
    pub timezone: String,
    pub notification_email: bool,
    pub notification_push: bool,
    pub ai_model_preference: String,
    pub created_at: Timestamp,
    pub updated_at: Option<Timestamp>,
}

/// Partial update; absent fields keep their stored value (or default on insert).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatePreferencesRequest {
    #[serde(default)]
    pub theme: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub notification_email: Option<bool>,
    #[serde(default)]
    pub notification_push: Option<bool>,
    #[serde(default)]
    pub ai_model_preference: Option<String>,
}

/// An AI model a user can choose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModelInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub tier: &'static str,
}

/// A UI theme a user can choose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ThemeInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

pub const AVAILABLE_MODELS: &[ModelInfo] = &[
    ModelInfo {
        id: "gpt-4",
        name: "GPT-4",
        description: "Most capable model, best for complex tasks",
        tier: "premium",
    },
    ModelInfo {
        id: "gpt-3.5-turbo",
        name: "GPT-3.5 Turbo",
        description: "Fast and efficient for most conversations",
        tier: "standard",
    },
    ModelInfo {
        id: "claude-3-sonnet",
        name: "Claude 3 Sonnet",
        description: "Excellent for analysis and reasoning",
        tier: "premium",
    },
];

pub const AVAILABLE_THEMES: &[ThemeInfo] = &[
    ThemeInfo {
        id: "light",
        name: "Light",
        description: "Clean light theme",
    },
    ThemeInfo {
        id: "dark",
        name: "Dark",
        description: "Easy on the eyes dark theme",
    },
    ThemeInfo {
        id: "auto",
        name: "Auto",
        description: "Follows system preference",
    },
];

#[derive(Debug, Clone, Serialize)]
pub struct ModelsResponse {
    pub models: &'static [ModelInfo],
}

#[derive(Debug, Clone, Serialize)]
pub struct ThemesResponse {
    pub themes: &'static [ThemeInfo],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_model_is_in_catalog() {
        assert!(AVAILABLE_MODELS.iter().any(|m| m.id == DEFAULT_AI_MODEL));
        assert!(AVAILABLE_THEMES.iter().any(|t| t.id == DEFAULT_THEME));
    }

    #[test]
    fn test_partial_update_parses() -> Result<(), serde_json::Error> {
        let req: UpdatePreferencesRequest =
            serde_json::from_str(r#"{"theme":"dark","notification_push":false}"#)?;
        assert_eq!(req.theme.as_deref(), Some("dark"));
        assert_eq!(req.notification_push, Some(false));
        assert!(req.language.is_none());
        Ok(())
    }
}
