use serde::{Deserialize, Serialize};

use crate::core::time::format_primitive;
use crate::db::models::User;

#[derive(Debug, Deserialize)]
pub(crate) struct LoginRequest {
    pub(crate) username: String,
    pub(crate) password: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct UserResponse {
    pub(crate) id: String,
    pub(crate) username: String,
    pub(crate) full_name: String,
    pub(crate) surname: String,
    pub(crate) is_active: bool,
    pub(crate) is_platform_admin: bool,
    pub(crate) created_at: String,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            full_name: user.full_name.clone(),
            surname: user.surname.clone(),
            is_active: user.is_active,
            is_platform_admin: user.is_platform_admin,
            created_at: format_primitive(user.created_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct TokenResponse {
    pub(crate) access_token: String,
    pub(crate) token_type: &'static str,
    pub(crate) user: UserResponse,
}
