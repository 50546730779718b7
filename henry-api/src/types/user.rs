//! User-related API types

use henry_core::{PrincipalId, Role, Timestamp};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// User profile with usage aggregates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: PrincipalId,
    pub email: String,
    pub full_name: Option<String>,
    pub role: Option<Role>,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Option<Timestamp>,
    pub conversation_count: i64,
    /// Sum of estimated cost across all tracked usage
    pub total_cost_estimate: Option<f64>,
    /// Most recent usage event
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_activity: Option<Timestamp>,
}

/// Envelope for single-user responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserResponse {
    pub user: UserProfile,
}

/// Request to update the effective user's own profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl UpdateProfileRequest {
    /// Trimmed email, ignoring blank values.
    pub fn normalized_email(&self) -> Option<&str> {
        self.email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        if let Some(email) = self.normalized_email() {
            if !email.contains('@') {
                return Err("Invalid email address");
            }
        }
        Ok(())
    }
}

/// Request body of `POST /api/users`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateUserRequest {
    #[serde(default)]
    pub email: Option<String>,
    /// Directory (Azure AD) object id of the account.
    #[serde(default)]
    pub azure_id: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    /// Defaults to `user`.
    #[serde(default)]
    pub role: Option<Role>,
}

/// Validated fields of a user to insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub email: String,
    pub azure_id: Uuid,
    pub full_name: Option<String>,
    pub role: Role,
}

impl CreateUserRequest {
    pub fn validate(&self) -> Result<NewUser, &'static str> {
        let email = self.email.as_deref().map(str::trim).filter(|e| !e.is_empty());
        let azure_id = self.azure_id.as_deref().map(str::trim).filter(|a| !a.is_empty());
        let (Some(email), Some(azure_id)) = (email, azure_id) else {
            return Err("Email and Azure ID are required");
        };
        if !email.contains('@') {
            return Err("Invalid email address");
        }
        let azure_id = Uuid::parse_str(azure_id).map_err(|_| "Invalid Azure ID")?;

        Ok(NewUser {
            email: email.to_string(),
            azure_id,
            full_name: self.full_name.clone(),
            role: self.role.clone().unwrap_or(Role::User),
        })
    }
}

/// Response body of `POST /api/users`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedUser {
    pub id: PrincipalId,
    pub azure_id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub role: Role,
}

/// Request body of `PUT /api/users/:id`. Absent fields keep their value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl UpdateUserRequest {
    /// Trimmed email, ignoring blank values.
    pub fn normalized_email(&self) -> Option<&str> {
        self.email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        match self.normalized_email() {
            Some(email) if !email.contains('@') => Err("Invalid email address"),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_profile_email_validation() {
        let req = UpdateProfileRequest {
            full_name: None,
            email: Some("not-an-email".to_string()),
        };
        assert!(req.validate().is_err());

        let req = UpdateProfileRequest {
            full_name: Some("Bea".to_string()),
            email: Some("  ".to_string()),
        };
        assert_eq!(req.normalized_email(), None);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_update_profile_accepts_empty_body() -> Result<(), serde_json::Error> {
        let req: UpdateProfileRequest = serde_json::from_str("{}")?;
        assert_eq!(req, UpdateProfileRequest::default());
        Ok(())
    }

    #[test]
    fn test_create_user_requires_email_and_azure_id() {
        let missing_azure = CreateUserRequest {
            email: Some("new@henry.test".to_string()),
            ..Default::default()
        };
        assert_eq!(missing_azure.validate(), Err("Email and Azure ID are required"));

        let blank_email = CreateUserRequest {
            email: Some(" ".to_string()),
            azure_id: Some(Uuid::new_v4().to_string()),
            ..Default::default()
        };
        assert_eq!(blank_email.validate(), Err("Email and Azure ID are required"));

        let bad_azure = CreateUserRequest {
            email: Some("new@henry.test".to_string()),
            azure_id: Some("tenant-7".to_string()),
            ..Default::default()
        };
        assert_eq!(bad_azure.validate(), Err("Invalid Azure ID"));
    }

    #[test]
    fn test_create_user_defaults_role() -> Result<(), &'static str> {
        let azure_id = Uuid::new_v4();
        let req: CreateUserRequest = serde_json::from_value(serde_json::json!({
            "email": " new@henry.test ",
            "azure_id": azure_id.to_string(),
            "full_name": "New Person",
        }))
        .map_err(|_| "deserialize")?;

        let user = req.validate()?;
        assert_eq!(user.email, "new@henry.test");
        assert_eq!(user.azure_id, azure_id);
        assert_eq!(user.role, Role::User);
        Ok(())
    }

    #[test]
    fn test_update_user_from_admin_request() {
        let req = UpdateUserRequest::from(crate::types::AdminUpdateUserRequest {
            role: Some(Role::Admin),
            is_active: None,
        });
        assert_eq!(req.role, Some(Role::Admin));
        assert_eq!(req.normalized_email(), None);
        assert!(req.validate().is_ok());
    }
}
