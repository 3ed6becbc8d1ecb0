use super::{Repo, Store};
use crate::{
    backend::utils::error::BackendResult,
    common::{
        comment::Comment,
        media::MediaFile,
        newtypes::{CommentId, PostId, ProfileId, UserId},
        post::Post,
        profile::{Contacts, Profile},
        user::{OAuthAccount, Session, User},
    },
};
use chrono::Utc;
use std::{cell::RefCell, sync::Mutex};

/// Contents of the in-memory store. Rows are kept in insertion order, ids come from a single
/// counter shared by all tables.
#[derive(Clone, Debug)]
pub struct MemoryState {
    pub(super) users: Vec<User>,
    pub(super) oauth_accounts: Vec<OAuthAccount>,
    pub(super) sessions: Vec<Session>,
    pub(super) posts: Vec<Post>,
    pub(super) comments: Vec<Comment>,
    pub(super) post_likes: Vec<(UserId, PostId)>,
    pub(super) comment_likes: Vec<(UserId, CommentId)>,
    pub(super) media: Vec<MediaFile>,
    pub(super) profile: Option<Profile>,
    last_id: i32,
}

impl MemoryState {
    pub(super) fn next_id(&mut self) -> i32 {
        self.last_id += 1;
        self.last_id
    }
}

impl Default for MemoryState {
    fn default() -> Self {
        MemoryState {
            users: vec![],
            oauth_accounts: vec![],
            sessions: vec![],
            posts: vec![],
            comments: vec![],
            post_likes: vec![],
            comment_likes: vec![],
            media: vec![],
            profile: Some(Profile {
                id: ProfileId(1),
                name: "Folio".to_string(),
                description: "Personal blog".to_string(),
                photo_url: None,
                activity: String::new(),
                contacts: Contacts::default(),
                updated_at: Utc::now(),
            }),
            last_id: 1,
        }
    }
}

/// Gives mutable access to the state, either by locking the store or through an open
/// transaction.
pub trait Access {
    fn with_state<T>(&self, f: impl FnOnce(&mut MemoryState) -> BackendResult<T>)
        -> BackendResult<T>;
}

impl Access for Mutex<MemoryState> {
    fn with_state<T>(
        &self,
        f: impl FnOnce(&mut MemoryState) -> BackendResult<T>,
    ) -> BackendResult<T> {
        let mut state = self.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut state)
    }
}

impl Access for RefCell<&mut MemoryState> {
    fn with_state<T>(
        &self,
        f: impl FnOnce(&mut MemoryState) -> BackendResult<T>,
    ) -> BackendResult<T> {
        let mut state = self.try_borrow_mut()?;
        f(&mut state)
    }
}

/// Repositories which keep everything in process memory. Used for tests and for running without
/// a database.
pub struct MemoryRepo<A>(pub(super) A);

pub type MemoryStore = MemoryRepo<Mutex<MemoryState>>;

impl MemoryStore {
    pub fn new() -> Self {
        MemoryRepo(Mutex::new(MemoryState::default()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for MemoryStore {
    /// Works on a copy of the state which replaces the original only if `f` succeeds. The lock is
    /// held throughout, so transactions are serialized.
    fn transaction(
        &self,
        f: &mut dyn FnMut(&dyn Repo) -> BackendResult<()>,
    ) -> BackendResult<()> {
        let mut state = self.0.lock().unwrap_or_else(|e| e.into_inner());
        let mut working = state.clone();
        f(&MemoryRepo(RefCell::new(&mut working)))?;
        *state = working;
        Ok(())
    }

    fn ping(&self) -> BackendResult<()> {
        Ok(())
    }

    fn repo(&self) -> &dyn Repo {
        self
    }
}
