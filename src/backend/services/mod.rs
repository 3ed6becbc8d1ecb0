use crate::{
    backend::utils::error::{BackendError, BackendResult},
    common::{newtypes::UserId, user::User},
};

pub mod auth;
pub mod comment;
pub mod like;
pub mod media;
pub mod post;
pub mod profile;

fn check_is_admin(user: &User) -> BackendResult<()> {
    if !user.is_admin() {
        return Err(BackendError::permission_denied("Admin role required"));
    }
    Ok(())
}

fn check_owner_or_admin(user: &User, owner: UserId, message: &str) -> BackendResult<()> {
    if user.id != owner && !user.is_admin() {
        return Err(BackendError::permission_denied(message));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod test {
    use crate::{
        backend::{
            database::{
                user::UserInsertForm,
                FolioContext,
            },
            utils::error::BackendResult,
        },
        common::user::{Role, User},
    };

    pub(crate) fn create_user(context: &FolioContext, name: &str, role: Role) -> BackendResult<User> {
        context.repo().create_user(&UserInsertForm {
            email: format!("{name}@example.com"),
            name: name.to_string(),
            avatar_url: Some(format!("https://example.com/{name}.png")),
            role,
        })
    }
}
