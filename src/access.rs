use actix_web::http::Method;

use crate::auth::AuthUser;
use crate::error::AppError;

/// Per-endpoint access policy. Every handler resolves one of these and runs
/// [`AccessDecision::authorize`] before touching the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessDecision {
    Public,
    AuthenticatedRequired,
    /// Anyone may read; only the owning account may write.
    OwnerOnlyMutation { owner_id: i32 },
}

impl AccessDecision {
    pub fn authorize(&self, method: &Method, identity: Option<&AuthUser>) -> Result<(), AppError> {
        match self {
            Self::Public => Ok(()),
            Self::AuthenticatedRequired => identity.map(|_| ()).ok_or_else(AppError::need_login),
            Self::OwnerOnlyMutation { owner_id } => {
                if is_safe(method) {
                    return Ok(());
                }
                let identity = identity.ok_or_else(AppError::need_login)?;
                if identity.account_id != *owner_id {
                    return Err(AppError::Forbidden);
                }
                Ok(())
            }
        }
    }

    /// Like `authorize`, but hands back the identity for policies that need one.
    pub fn require<'a>(&self, method: &Method, identity: Option<&'a AuthUser>) -> Result<&'a AuthUser, AppError> {
        self.authorize(method, identity)?;
        identity.ok_or_else(AppError::need_login)
    }
}

fn is_safe(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}
