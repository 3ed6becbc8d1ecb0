use crate::{
    backend::{
        database::{
            transaction,
            user::{OAuthAccountForm, SessionInsertForm, UserInsertForm},
            FolioContext,
            Repo,
        },
        utils::{
            config::FolioConfigAuth,
            error::{BackendError, BackendResult},
            generate_session_token,
        },
    },
    common::user::{OAuthUserInfo, Role, Session, User},
};
use chrono::{TimeDelta, Utc};
use log::info;

/// Logs in a user who was authenticated by an OAuth provider. The user is found by provider
/// account, then by email, and created if neither exists. Afterwards a new session is started.
pub fn login(context: &FolioContext, info: &OAuthUserInfo) -> BackendResult<(User, Session)> {
    let auth = &context.config.auth;
    let user = transaction(&*context.store, |repo| find_or_create_user(repo, info, auth))?;
    let session = create_session(context, &user)?;
    info!("User {} logged in with {}", user.id.0, info.provider);
    Ok((user, session))
}

fn find_or_create_user(
    repo: &dyn Repo,
    info: &OAuthUserInfo,
    auth: &FolioConfigAuth,
) -> BackendResult<User> {
    let user = match repo.read_user_by_provider(&info.provider, &info.provider_user_id)? {
        Some(user) => user,
        None => {
            let email = info
                .email
                .as_deref()
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .ok_or_else(|| {
                    BackendError::bad_request("Login provider did not share an email address")
                })?;
            match repo.read_user_by_email(email)? {
                Some(user) => user,
                None => create_user(repo, info, email)?,
            }
        }
    };

    repo.upsert_oauth_account(&OAuthAccountForm {
        user_id: user.id,
        provider: info.provider.clone(),
        provider_user_id: info.provider_user_id.clone(),
        access_token: Some(info.access_token.clone()),
        refresh_token: info.refresh_token.clone(),
        expires_at: info.expires_at,
    })?;

    if !user.is_admin() && auth.is_admin_email(&user.email) {
        info!("Granting admin role to user {}", user.id.0);
        return repo.set_user_role(user.id, Role::Admin);
    }
    Ok(user)
}

fn create_user(repo: &dyn Repo, info: &OAuthUserInfo, email: &str) -> BackendResult<User> {
    let name = if info.name.trim().is_empty() {
        email.split('@').next().unwrap_or(email).to_string()
    } else {
        info.name.trim().to_string()
    };
    let form = UserInsertForm {
        email: email.to_string(),
        name,
        avatar_url: info.avatar_url.clone(),
        role: Role::User,
    };
    match repo.create_user(&form) {
        Ok(user) => Ok(user),
        // created concurrently by another login
        Err(BackendError::Conflict(_)) => repo
            .read_user_by_email(email)?
            .ok_or_else(|| BackendError::not_found("User")),
        Err(e) => Err(e),
    }
}

pub fn create_session(context: &FolioContext, user: &User) -> BackendResult<Session> {
    let max_age = TimeDelta::hours(context.config.auth.session_max_age_hours);
    context.repo().create_session(&SessionInsertForm {
        user_id: user.id,
        token: generate_session_token(),
        expires_at: Utc::now() + max_age,
    })
}

/// Resolves a session token to its user, if the session is still valid.
pub fn validate_session(context: &FolioContext, token: &str) -> BackendResult<Option<User>> {
    let repo = context.repo();
    let Some(session) = repo.read_valid_session(token, Utc::now())? else {
        return Ok(None);
    };
    repo.read_user(session.user_id)
}

pub fn logout(context: &FolioContext, token: &str) -> BackendResult<()> {
    context.repo().delete_session(token)?;
    Ok(())
}
