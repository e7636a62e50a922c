//! End user identity, as asserted by the platform's front end.

use crate::{
    proto,
    request::{
        USER_AUTH_DOMAIN, USER_EMAIL, USER_FEDERATED_IDENTITY, USER_FEDERATED_PROVIDER, USER_ID,
        USER_IS_ADMIN,
    },
    Context, PlatformError,
};
use std::fmt;

/// A signed in end user.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct User {
    /// The user's email address.
    pub email: String,
    /// The domain the user authenticated against.
    pub auth_domain: String,
    /// Whether the user administers the application.
    pub admin: bool,
    /// A stable, opaque id for the user.
    pub id: String,
    /// The federated identity, if the user signed in with one.
    pub federated_identity: String,
    /// The federated identity provider.
    pub federated_provider: String,
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.email.is_empty() {
            f.write_str(&self.federated_identity)
        } else {
            f.write_str(&self.email)
        }
    }
}

/// The signed in user, or `None` if nobody is signed in or the request wasn't
/// captured by the managed entry point.
pub fn current(ctx: &Context<'_>) -> Option<User> {
    let email = ctx.header(USER_EMAIL);
    if email.is_empty() {
        return None;
    }
    Some(User {
        email: email.to_string(),
        auth_domain: ctx.header(USER_AUTH_DOMAIN).to_string(),
        admin: is_admin(ctx),
        id: ctx.header(USER_ID).to_string(),
        federated_identity: ctx.header(USER_FEDERATED_IDENTITY).to_string(),
        federated_provider: ctx.header(USER_FEDERATED_PROVIDER).to_string(),
    })
}

/// Whether the signed in user administers the application.
pub fn is_admin(ctx: &Context<'_>) -> bool {
    ctx.header(USER_IS_ADMIN) == "1"
}

/// A URL that signs the user in and then sends them to `dest`.
///
/// # Errors
/// If the call through the service bridge fails.
pub async fn login_url(ctx: &Context<'_>, dest: &str) -> Result<String, PlatformError> {
    let request = proto::CreateLoginUrlRequest {
        destination_url: dest.to_string(),
        auth_domain: auth_domain(ctx),
        federated_identity: None,
    };
    let response: proto::CreateLoginUrlResponse =
        ctx.call("user", "CreateLoginURL", &request).await?;
    Ok(response.login_url)
}

/// A URL that signs the user out and then sends them to `dest`.
///
/// # Errors
/// If the call through the service bridge fails.
pub async fn logout_url(ctx: &Context<'_>, dest: &str) -> Result<String, PlatformError> {
    let request = proto::CreateLogoutUrlRequest {
        destination_url: dest.to_string(),
        auth_domain: auth_domain(ctx),
    };
    let response: proto::CreateLogoutUrlResponse =
        ctx.call("user", "CreateLogoutURL", &request).await?;
    Ok(response.logout_url)
}

/// The request's auth domain, if it named one.
fn auth_domain(ctx: &Context<'_>) -> Option<String> {
    Some(ctx.header(USER_AUTH_DOMAIN))
        .filter(|domain| !domain.is_empty())
        .map(ToString::to_string)
}
