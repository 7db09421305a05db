//! Identity of the user a service call is made on behalf of.

use domain::UserId;

/// The authenticated caller. Services take it explicitly; there is no
/// ambient request context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: UserId,
    pub is_admin: bool,
}

impl Caller {
    pub fn user(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            is_admin: false,
        }
    }

    pub fn admin(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            is_admin: true,
        }
    }

    /// Actor label recorded in event metadata.
    pub(crate) fn actor(&self) -> Option<String> {
        Some(self.user_id.to_string())
    }
}
