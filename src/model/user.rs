// src/model/user.rs
//! Contact directory users.

use crate::api::{ApiRequest, LarkTransport, TransportExt};
use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which id space a user id belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserIdType {
    #[default]
    OpenId,
    UnionId,
    UserId,
}

impl fmt::Display for UserIdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::OpenId => "open_id",
            Self::UnionId => "union_id",
            Self::UserId => "user_id",
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub open_id: String,
    #[serde(default)]
    pub union_id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub en_name: String,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub enterprise_email: String,
    #[serde(default)]
    pub mobile: String,
}

fn non_empty(value: &str) -> Option<&str> {
    (!value.is_empty()).then_some(value)
}

impl User {
    /// Nickname when set, otherwise the directory name.
    pub fn display_name(&self) -> Option<&str> {
        non_empty(&self.nickname).or_else(|| non_empty(&self.name))
    }

    /// Enterprise mailbox when set, otherwise the personal one.
    pub fn preferred_email(&self) -> Option<&str> {
        non_empty(&self.enterprise_email).or_else(|| non_empty(&self.email))
    }

    pub fn mobile(&self) -> Option<&str> {
        non_empty(&self.mobile)
    }

    /// Where a mention of this user should point: mail first, phone second.
    pub fn contact_url(&self) -> Option<String> {
        self.preferred_email()
            .map(|email| format!("mailto:{}", email))
            .or_else(|| self.mobile().map(|mobile| format!("tel:{}", mobile)))
    }

    /// Visible text of a mention of this user.
    pub fn mention_text(&self) -> Option<String> {
        self.display_name()
            .map(|name| format!("@{}", name))
            .or_else(|| self.preferred_email().map(str::to_string))
            .or_else(|| self.mobile().map(str::to_string))
    }
}

/// Reads users from the contact directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct UserDirectory {
    pub id_type: UserIdType,
}

impl UserDirectory {
    pub async fn get_one(&self, transport: &dyn LarkTransport, user_id: &str) -> Result<User, AppError> {
        let request = ApiRequest::get(format!("contact/v3/users/{}", user_id))
            .with_param("user_id_type", self.id_type);
        transport.fetch_field(request, "user").await
    }
}
