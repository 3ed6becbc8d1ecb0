use super::{
    memory::{Access, MemoryRepo},
    pg::{Connect, PgRepo},
    schema::{oauth_providers, sessions, users},
};
use crate::{
    backend::utils::error::{BackendError, BackendResult},
    common::{
        newtypes::{SessionId, UserId},
        user::{OAuthAccount, Role, Session, User},
    },
};
use chrono::{DateTime, Utc};
use diesel::{
    delete,
    insert_into,
    sql_query,
    update,
    AsChangeset,
    Connection,
    ExpressionMethods,
    Insertable,
    OptionalExtension,
    QueryDsl,
    RunQueryDsl,
    SelectableHelper,
};

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = users, check_for_backend(diesel::pg::Pg))]
pub struct UserInsertForm {
    pub email: String,
    pub name: String,
    pub avatar_url: Option<String>,
    pub role: Role,
}

#[derive(Insertable, AsChangeset, Debug, Clone)]
#[diesel(table_name = oauth_providers, check_for_backend(diesel::pg::Pg))]
#[diesel(treat_none_as_null = true)]
pub struct OAuthAccountForm {
    pub user_id: UserId,
    pub provider: String,
    pub provider_user_id: String,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = sessions, check_for_backend(diesel::pg::Pg))]
pub struct SessionInsertForm {
    pub user_id: UserId,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

pub trait UserRepo {
    fn read_user(&self, id: UserId) -> BackendResult<Option<User>>;

    fn read_user_by_email(&self, email: &str) -> BackendResult<Option<User>>;

    /// Finds the user linked to an account at the given OAuth provider.
    fn read_user_by_provider(
        &self,
        provider: &str,
        provider_user_id: &str,
    ) -> BackendResult<Option<User>>;

    /// Fails with a conflict if the email is taken.
    fn create_user(&self, form: &UserInsertForm) -> BackendResult<User>;

    fn set_user_role(&self, id: UserId, role: Role) -> BackendResult<User>;

    /// Links the provider account with a user, or refreshes the tokens of an existing link.
    fn upsert_oauth_account(&self, form: &OAuthAccountForm) -> BackendResult<OAuthAccount>;
}

pub trait SessionRepo {
    fn create_session(&self, form: &SessionInsertForm) -> BackendResult<Session>;

    /// Returns the session only if it has not expired at `now`.
    fn read_valid_session(&self, token: &str, now: DateTime<Utc>)
        -> BackendResult<Option<Session>>;

    /// Returns true if a session was removed.
    fn delete_session(&self, token: &str) -> BackendResult<bool>;

    /// Removes all sessions which expired before `now` and returns how many.
    fn delete_expired_sessions(&self, now: DateTime<Utc>) -> BackendResult<usize>;
}

impl<C: Connect> UserRepo for PgRepo<C> {
    fn read_user(&self, id: UserId) -> BackendResult<Option<User>> {
        self.0.with_conn(|conn| Ok(users::table.find(id).first(conn).optional()?))
    }

    fn read_user_by_email(&self, email: &str) -> BackendResult<Option<User>> {
        self.0.with_conn(|conn| {
            Ok(users::table
                .filter(users::email.eq(email))
                .first(conn)
                .optional()?)
        })
    }

    fn read_user_by_provider(
        &self,
        provider: &str,
        provider_user_id: &str,
    ) -> BackendResult<Option<User>> {
        self.0.with_conn(|conn| {
            Ok(users::table
                .inner_join(oauth_providers::table)
                .filter(oauth_providers::provider.eq(provider))
                .filter(oauth_providers::provider_user_id.eq(provider_user_id))
                .select(User::as_select())
                .first(conn)
                .optional()?)
        })
    }

    fn create_user(&self, form: &UserInsertForm) -> BackendResult<User> {
        self.0.with_conn(|conn| {
            insert_into(users::table)
                .values(form)
                .on_conflict(users::email)
                .do_nothing()
                .get_result(conn)
                .optional()?
                .ok_or_else(|| BackendError::conflict("Email is already registered"))
        })
    }

    fn set_user_role(&self, id: UserId, role: Role) -> BackendResult<User> {
        self.0.with_conn(|conn| {
            update(users::table.find(id))
                .set(users::role.eq(role))
                .get_result(conn)
                .optional()?
                .ok_or_else(|| BackendError::not_found("User"))
        })
    }

    fn upsert_oauth_account(&self, form: &OAuthAccountForm) -> BackendResult<OAuthAccount> {
        self.0.with_conn(|conn| {
            Ok(insert_into(oauth_providers::table)
                .values(form)
                .on_conflict((
                    oauth_providers::provider,
                    oauth_providers::provider_user_id,
                ))
                .do_update()
                .set((form, oauth_providers::updated_at.eq(Utc::now())))
                .get_result(conn)?)
        })
    }
}

impl<C: Connect> SessionRepo for PgRepo<C> {
    fn create_session(&self, form: &SessionInsertForm) -> BackendResult<Session> {
        self.0.with_conn(|conn| {
            Ok(insert_into(sessions::table)
                .values(form)
                .get_result(conn)?)
        })
    }

    fn read_valid_session(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> BackendResult<Option<Session>> {
        self.0.with_conn(|conn| {
            Ok(sessions::table
                .filter(sessions::token.eq(token))
                .filter(sessions::expires_at.gt(now))
                .first(conn)
                .optional()?)
        })
    }

    fn delete_session(&self, token: &str) -> BackendResult<bool> {
        self.0.with_conn(|conn| {
            let rows = delete(sessions::table.filter(sessions::token.eq(token))).execute(conn)?;
            Ok(rows > 0)
        })
    }

    fn delete_expired_sessions(&self, now: DateTime<Utc>) -> BackendResult<usize> {
        self.0.with_conn(|conn| {
            conn.transaction::<_, BackendError, _>(|conn| {
                sql_query("set local statement_timeout = '30s'").execute(conn)?;
                Ok(delete(sessions::table.filter(sessions::expires_at.le(now))).execute(conn)?)
            })
        })
    }
}

impl<A: Access> UserRepo for MemoryRepo<A> {
    fn read_user(&self, id: UserId) -> BackendResult<Option<User>> {
        self.0
            .with_state(|s| Ok(s.users.iter().find(|u| u.id == id).cloned()))
    }

    fn read_user_by_email(&self, email: &str) -> BackendResult<Option<User>> {
        self.0
            .with_state(|s| Ok(s.users.iter().find(|u| u.email == email).cloned()))
    }

    fn read_user_by_provider(
        &self,
        provider: &str,
        provider_user_id: &str,
    ) -> BackendResult<Option<User>> {
        self.0.with_state(|s| {
            let Some(account) = s
                .oauth_accounts
                .iter()
                .find(|a| a.provider == provider && a.provider_user_id == provider_user_id)
            else {
                return Ok(None);
            };
            Ok(s.users.iter().find(|u| u.id == account.user_id).cloned())
        })
    }

    fn create_user(&self, form: &UserInsertForm) -> BackendResult<User> {
        self.0.with_state(|s| {
            if s.users.iter().any(|u| u.email == form.email) {
                return Err(BackendError::conflict("Email is already registered"));
            }
            let user = User {
                id: UserId(s.next_id()),
                email: form.email.clone(),
                name: form.name.clone(),
                avatar_url: form.avatar_url.clone(),
                role: form.role,
                created_at: Utc::now(),
            };
            s.users.push(user.clone());
            Ok(user)
        })
    }

    fn set_user_role(&self, id: UserId, role: Role) -> BackendResult<User> {
        self.0.with_state(|s| {
            let user = s
                .users
                .iter_mut()
                .find(|u| u.id == id)
                .ok_or_else(|| BackendError::not_found("User"))?;
            user.role = role;
            Ok(user.clone())
        })
    }

    fn upsert_oauth_account(&self, form: &OAuthAccountForm) -> BackendResult<OAuthAccount> {
        self.0.with_state(|s| {
            let now = Utc::now();
            if let Some(account) = s.oauth_accounts.iter_mut().find(|a| {
                a.provider == form.provider && a.provider_user_id == form.provider_user_id
            }) {
                account.user_id = form.user_id;
                account.access_token = form.access_token.clone();
                account.refresh_token = form.refresh_token.clone();
                account.expires_at = form.expires_at;
                account.updated_at = now;
                return Ok(account.clone());
            }
            let account = OAuthAccount {
                id: s.next_id(),
                user_id: form.user_id,
                provider: form.provider.clone(),
                provider_user_id: form.provider_user_id.clone(),
                access_token: form.access_token.clone(),
                refresh_token: form.refresh_token.clone(),
                expires_at: form.expires_at,
                created_at: now,
                updated_at: now,
            };
            s.oauth_accounts.push(account.clone());
            Ok(account)
        })
    }
}

impl<A: Access> SessionRepo for MemoryRepo<A> {
    fn create_session(&self, form: &SessionInsertForm) -> BackendResult<Session> {
        self.0.with_state(|s| {
            if s.sessions.iter().any(|x| x.token == form.token) {
                return Err(BackendError::conflict("Session token already exists"));
            }
            let session = Session {
                id: SessionId(s.next_id()),
                user_id: form.user_id,
                token: form.token.clone(),
                expires_at: form.expires_at,
                created_at: Utc::now(),
            };
            s.sessions.push(session.clone());
            Ok(session)
        })
    }

    fn read_valid_session(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> BackendResult<Option<Session>> {
        self.0.with_state(|s| {
            Ok(s.sessions
                .iter()
                .find(|x| x.token == token && x.is_valid(now))
                .cloned())
        })
    }

    fn delete_session(&self, token: &str) -> BackendResult<bool> {
        self.0.with_state(|s| {
            let before = s.sessions.len();
            s.sessions.retain(|x| x.token != token);
            Ok(s.sessions.len() < before)
        })
    }

    fn delete_expired_sessions(&self, now: DateTime<Utc>) -> BackendResult<usize> {
        self.0.with_state(|s| {
            let before = s.sessions.len();
            s.sessions.retain(|x| x.is_valid(now));
            Ok(before - s.sessions.len())
        })
    }
}
