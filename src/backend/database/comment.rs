use super::{
    greatest,
    memory::{Access, MemoryRepo},
    pg::{Connect, PgRepo},
    post::PostRepo,
    schema::{comment_likes, comments, users},
};
use crate::{
    backend::utils::error::{BackendError, BackendResult},
    common::{
        comment::{Comment, CommentView, DELETED_COMMENT_PLACEHOLDER},
        newtypes::{CommentId, PostId, UserId},
        user::Author,
    },
};
use chrono::{DateTime, Utc};
use diesel::{
    delete,
    insert_into,
    update,
    ExpressionMethods,
    Insertable,
    OptionalExtension,
    QueryDsl,
    RunQueryDsl,
    SelectableHelper,
};
use std::collections::HashSet;

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = comments, check_for_backend(diesel::pg::Pg))]
pub struct CommentInsertForm {
    pub post_id: PostId,
    pub user_id: UserId,
    pub parent_id: Option<CommentId>,
    pub content: String,
}

pub trait CommentRepo {
    fn create_comment(&self, form: &CommentInsertForm) -> BackendResult<Comment>;

    fn read_comment(&self, id: CommentId) -> BackendResult<Option<Comment>>;

    fn update_comment_content(&self, id: CommentId, content: &str) -> BackendResult<Comment>;

    /// Marks the comment as deleted and replaces its content with the placeholder. Returns false
    /// if there was no live comment with this id.
    fn soft_delete_comment(&self, id: CommentId, now: DateTime<Utc>) -> BackendResult<bool>;

    /// Removes the comment with all of its replies and recounts the comments of the post.
    fn hard_delete_comment(&self, id: CommentId) -> BackendResult<bool>;

    /// All comments of a post including soft-deleted ones, oldest first. Replies are not
    /// nested yet.
    fn comments_for_post(
        &self,
        post_id: PostId,
        viewer: Option<UserId>,
    ) -> BackendResult<Vec<CommentView>>;

    /// Adds `delta` to the like counter, never going below zero. Returns the new value.
    fn adjust_comment_likes_count(&self, id: CommentId, delta: i32) -> BackendResult<i32>;
}

fn flat_view(mut comment: Comment, user: Author, is_liked: bool) -> CommentView {
    if comment.is_deleted() {
        comment.content = DELETED_COMMENT_PLACEHOLDER.to_string();
    }
    CommentView {
        comment,
        user,
        is_liked,
        replies: vec![],
    }
}

impl<C: Connect> CommentRepo for PgRepo<C> {
    fn create_comment(&self, form: &CommentInsertForm) -> BackendResult<Comment> {
        self.0.with_conn(|conn| {
            Ok(insert_into(comments::table)
                .values(form)
                .get_result(conn)?)
        })
    }

    fn read_comment(&self, id: CommentId) -> BackendResult<Option<Comment>> {
        self.0
            .with_conn(|conn| Ok(comments::table.find(id).first(conn).optional()?))
    }

    fn update_comment_content(&self, id: CommentId, content: &str) -> BackendResult<Comment> {
        self.0.with_conn(|conn| {
            update(
                comments::table
                    .find(id)
                    .filter(comments::deleted_at.is_null()),
            )
            .set((
                comments::content.eq(content),
                comments::updated_at.eq(Utc::now()),
            ))
            .get_result(conn)
            .optional()?
            .ok_or_else(|| BackendError::not_found("Comment"))
        })
    }

    fn soft_delete_comment(&self, id: CommentId, now: DateTime<Utc>) -> BackendResult<bool> {
        self.0.with_conn(|conn| {
            let rows = update(
                comments::table
                    .find(id)
                    .filter(comments::deleted_at.is_null()),
            )
            .set((
                comments::deleted_at.eq(now),
                comments::content.eq(DELETED_COMMENT_PLACEHOLDER),
                comments::updated_at.eq(now),
            ))
            .execute(conn)?;
            Ok(rows > 0)
        })
    }

    fn hard_delete_comment(&self, id: CommentId) -> BackendResult<bool> {
        // replies are removed by the foreign key cascade
        let post_id = self.0.with_conn(|conn| {
            Ok(delete(comments::table.find(id))
                .returning(comments::post_id)
                .get_result::<PostId>(conn)
                .optional()?)
        })?;
        let Some(post_id) = post_id else {
            return Ok(false);
        };
        self.recount_post_comments(post_id)?;
        Ok(true)
    }

    fn comments_for_post(
        &self,
        post_id: PostId,
        viewer: Option<UserId>,
    ) -> BackendResult<Vec<CommentView>> {
        self.0.with_conn(|conn| {
            let rows: Vec<(Comment, Author)> = comments::table
                .inner_join(users::table)
                .filter(comments::post_id.eq(post_id))
                .select((Comment::as_select(), Author::as_select()))
                .order((comments::created_at.asc(), comments::id.asc()))
                .load(conn)?;
            let liked: HashSet<CommentId> = match viewer {
                Some(viewer) => {
                    let ids: Vec<CommentId> = rows.iter().map(|(c, _)| c.id).collect();
                    comment_likes::table
                        .filter(comment_likes::user_id.eq(viewer))
                        .filter(comment_likes::comment_id.eq_any(ids))
                        .select(comment_likes::comment_id)
                        .load::<CommentId>(conn)?
                        .into_iter()
                        .collect()
                }
                None => HashSet::new(),
            };
            Ok(rows
                .into_iter()
                .map(|(comment, user)| {
                    let is_liked = liked.contains(&comment.id);
                    flat_view(comment, user, is_liked)
                })
                .collect())
        })
    }

    fn adjust_comment_likes_count(&self, id: CommentId, delta: i32) -> BackendResult<i32> {
        self.0.with_conn(|conn| {
            update(comments::table.find(id))
                .set(comments::likes_count.eq(greatest(comments::likes_count + delta, 0)))
                .returning(comments::likes_count)
                .get_result(conn)
                .optional()?
                .ok_or_else(|| BackendError::not_found("Comment"))
        })
    }
}

impl<A: Access> CommentRepo for MemoryRepo<A> {
    fn create_comment(&self, form: &CommentInsertForm) -> BackendResult<Comment> {
        self.0.with_state(|s| {
            let now = Utc::now();
            let comment = Comment {
                id: CommentId(s.next_id()),
                post_id: form.post_id,
                user_id: form.user_id,
                parent_id: form.parent_id,
                content: form.content.clone(),
                likes_count: 0,
                created_at: now,
                updated_at: now,
                deleted_at: None,
            };
            s.comments.push(comment.clone());
            Ok(comment)
        })
    }

    fn read_comment(&self, id: CommentId) -> BackendResult<Option<Comment>> {
        self.0
            .with_state(|s| Ok(s.comments.iter().find(|c| c.id == id).cloned()))
    }

    fn update_comment_content(&self, id: CommentId, content: &str) -> BackendResult<Comment> {
        self.0.with_state(|s| {
            let comment = s
                .comments
                .iter_mut()
                .find(|c| c.id == id && !c.is_deleted())
                .ok_or_else(|| BackendError::not_found("Comment"))?;
            comment.content = content.to_string();
            comment.updated_at = Utc::now();
            Ok(comment.clone())
        })
    }

    fn soft_delete_comment(&self, id: CommentId, now: DateTime<Utc>) -> BackendResult<bool> {
        self.0.with_state(|s| {
            let Some(comment) = s
                .comments
                .iter_mut()
                .find(|c| c.id == id && !c.is_deleted())
            else {
                return Ok(false);
            };
            comment.deleted_at = Some(now);
            comment.content = DELETED_COMMENT_PLACEHOLDER.to_string();
            comment.updated_at = now;
            Ok(true)
        })
    }

    fn hard_delete_comment(&self, id: CommentId) -> BackendResult<bool> {
        let post_id = self.0.with_state(|s| {
            let Some(post_id) = s.comments.iter().find(|c| c.id == id).map(|c| c.post_id) else {
                return Ok(None);
            };
            let mut removed = HashSet::from([id]);
            loop {
                let before = removed.len();
                for c in &s.comments {
                    if c.parent_id.is_some_and(|p| removed.contains(&p)) {
                        removed.insert(c.id);
                    }
                }
                if removed.len() == before {
                    break;
                }
            }
            s.comments.retain(|c| !removed.contains(&c.id));
            s.comment_likes.retain(|(_, c)| !removed.contains(c));
            Ok(Some(post_id))
        })?;
        let Some(post_id) = post_id else {
            return Ok(false);
        };
        self.recount_post_comments(post_id)?;
        Ok(true)
    }

    fn comments_for_post(
        &self,
        post_id: PostId,
        viewer: Option<UserId>,
    ) -> BackendResult<Vec<CommentView>> {
        self.0.with_state(|s| {
            let mut comments: Vec<&Comment> =
                s.comments.iter().filter(|c| c.post_id == post_id).collect();
            comments.sort_by(|a, b| {
                a.created_at
                    .cmp(&b.created_at)
                    .then(a.id.0.cmp(&b.id.0))
            });
            comments
                .into_iter()
                .map(|c| {
                    let user = s
                        .users
                        .iter()
                        .find(|u| u.id == c.user_id)
                        .cloned()
                        .map(Author::from)
                        .ok_or_else(|| BackendError::not_found("Author"))?;
                    let is_liked = viewer.is_some_and(|v| s.comment_likes.contains(&(v, c.id)));
                    Ok(flat_view(c.clone(), user, is_liked))
                })
                .collect()
        })
    }

    fn adjust_comment_likes_count(&self, id: CommentId, delta: i32) -> BackendResult<i32> {
        self.0.with_state(|s| {
            let comment = s
                .comments
                .iter_mut()
                .find(|c| c.id == id)
                .ok_or_else(|| BackendError::not_found("Comment"))?;
            comment.likes_count = (comment.likes_count + delta).max(0);
            Ok(comment.likes_count)
        })
    }
}
