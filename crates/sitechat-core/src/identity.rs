//! Who is chatting.
//!
//! The session only needs to know whether a user is present; signing up
//! happens elsewhere (a browser page), so prompting is fire-and-forget.

use crate::config::UserConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub name: String,
    pub email: Option<String>,
}

pub trait Identity: Send + Sync {
    fn current_user(&self) -> Option<User>;

    /// Starts the sign-up flow. Must not block.
    fn prompt_sign_up(&self);
}

/// Identity backed by the `[user]` table of the config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigIdentity {
    user: Option<User>,
    sign_up_url: Option<String>,
}

impl ConfigIdentity {
    pub fn new(user: &UserConfig, sign_up_url: Option<String>) -> Self {
        let user = user
            .name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(|name| User {
                name: name.to_string(),
                email: user.email.clone(),
            });
        Self {
            user,
            sign_up_url: sign_up_url.filter(|u| !u.trim().is_empty()),
        }
    }

    pub fn sign_up_url(&self) -> Option<&str> {
        self.sign_up_url.as_deref()
    }
}

impl Identity for ConfigIdentity {
    fn current_user(&self) -> Option<User> {
        self.user.clone()
    }

    fn prompt_sign_up(&self) {
        match &self.sign_up_url {
            Some(url) => {
                tracing::info!(%url, "opening sign-up page");
                if let Err(err) = open::that_detached(url) {
                    tracing::warn!(%url, "failed to open browser: {err}");
                }
            }
            None => tracing::info!("sign-up requested but no sign_up_url configured"),
        }
    }
}

/// Never signed in.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnonymousIdentity;

impl Identity for AnonymousIdentity {
    fn current_user(&self) -> Option<User> {
        None
    }

    fn prompt_sign_up(&self) {}
}

/// Always signed in as a fixed user.
#[derive(Debug, Clone)]
pub struct StaticIdentity(pub User);

impl StaticIdentity {
    pub fn named(name: impl Into<String>) -> Self {
        Self(User {
            name: name.into(),
            email: None,
        })
    }
}

impl Identity for StaticIdentity {
    fn current_user(&self) -> Option<User> {
        Some(self.0.clone())
    }

    fn prompt_sign_up(&self) {}
}
