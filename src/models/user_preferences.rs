use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};

use crate::error::AppError;

/// Criteria every user starts with until they edit it or a rejection adapts it
pub const DEFAULT_CRITERIA: &str = "Prefer educational, informative, or genuinely entertaining content. Avoid clickbait, drama, reaction content, and anything low-effort.";

/// Who last wrote a user's criteria text
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CriteriaSource {
    SystemDefault,
    UserEdit,
    Adaptation,
}

impl CriteriaSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CriteriaSource::SystemDefault => "system_default",
            CriteriaSource::UserEdit => "user_edit",
            CriteriaSource::Adaptation => "adaptation",
        }
    }
}

impl Display for CriteriaSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CriteriaSource {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system_default" => Ok(CriteriaSource::SystemDefault),
            "user_edit" => Ok(CriteriaSource::UserEdit),
            "adaptation" => Ok(CriteriaSource::Adaptation),
            other => Err(AppError::Internal(format!(
                "Unknown criteria source: {}",
                other
            ))),
        }
    }
}

/// Free-text curation preferences owned by a user.
///
/// Never deleted, only overwritten by a settings edit or by adaptation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserPreferences {
    pub user_id: String,
    pub criteria_text: String,
    pub updated_by: CriteriaSource,
}

impl UserPreferences {
    /// Preferences for a user with nothing stored yet
    pub fn system_default(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            criteria_text: DEFAULT_CRITERIA.to_string(),
            updated_by: CriteriaSource::SystemDefault,
        }
    }

    /// Validates criteria text supplied by a user and returns its trimmed form
    pub fn validate_criteria(text: &str) -> Result<String, AppError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(AppError::InvalidInput(
                "curationCriteria is required".to_string(),
            ));
        }
        Ok(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_default_preferences() {
        let prefs = UserPreferences::system_default("user-1");
        assert_eq!(prefs.user_id, "user-1");
        assert_eq!(prefs.criteria_text, DEFAULT_CRITERIA);
        assert_eq!(prefs.updated_by, CriteriaSource::SystemDefault);
    }

    #[test]
    fn test_validate_criteria_trims() {
        let text = UserPreferences::validate_criteria("  Long-form science talks  ").unwrap();
        assert_eq!(text, "Long-form science talks");
    }

    #[test]
    fn test_validate_criteria_rejects_blank() {
        assert!(matches!(
            UserPreferences::validate_criteria("   \n"),
            Err(AppError::InvalidInput(_))
        ));
        assert!(UserPreferences::validate_criteria("").is_err());
    }

    #[test]
    fn test_criteria_source_round_trips_through_text() {
        for source in [
            CriteriaSource::SystemDefault,
            CriteriaSource::UserEdit,
            CriteriaSource::Adaptation,
        ] {
            assert_eq!(source.as_str().parse::<CriteriaSource>().unwrap(), source);
        }
        assert!("admin".parse::<CriteriaSource>().is_err());
    }

    #[test]
    fn test_criteria_source_serde_matches_storage_text() {
        let json = serde_json::to_string(&CriteriaSource::UserEdit).unwrap();
        assert_eq!(json, r#""user_edit""#);
    }
}
