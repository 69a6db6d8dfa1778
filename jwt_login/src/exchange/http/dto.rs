//! Bodies exchanged with the login and refresh endpoints

use serde::{Deserialize, Serialize};

use crate::AccessTokenRef;

#[derive(Debug, Serialize)]
pub(super) struct RefreshRequest<'a> {
    pub token: &'a AccessTokenRef,
}

#[derive(Debug, Deserialize)]
pub(super) struct TokenResponse<'a> {
    #[serde(borrow)]
    pub token: &'a AccessTokenRef,
}
