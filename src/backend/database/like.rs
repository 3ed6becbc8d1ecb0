use super::{
    memory::{Access, MemoryRepo},
    pg::{Connect, PgRepo},
    schema::{comment_likes, post_likes},
};
use crate::{
    backend::utils::error::BackendResult,
    common::newtypes::{CommentId, PostId, UserId},
};
use diesel::{
    delete,
    dsl::exists,
    insert_into,
    select,
    ExpressionMethods,
    QueryDsl,
    RunQueryDsl,
};

pub trait LikeRepo {
    fn post_like_exists(&self, user_id: UserId, post_id: PostId) -> BackendResult<bool>;

    /// Returns false if the like already existed.
    fn insert_post_like(&self, user_id: UserId, post_id: PostId) -> BackendResult<bool>;

    /// Returns false if there was no like to remove.
    fn delete_post_like(&self, user_id: UserId, post_id: PostId) -> BackendResult<bool>;

    fn count_post_likes(&self, post_id: PostId) -> BackendResult<i64>;

    fn comment_like_exists(&self, user_id: UserId, comment_id: CommentId) -> BackendResult<bool>;

    fn insert_comment_like(&self, user_id: UserId, comment_id: CommentId) -> BackendResult<bool>;

    fn delete_comment_like(&self, user_id: UserId, comment_id: CommentId) -> BackendResult<bool>;

    fn count_comment_likes(&self, comment_id: CommentId) -> BackendResult<i64>;
}

impl<C: Connect> LikeRepo for PgRepo<C> {
    fn post_like_exists(&self, user_id: UserId, post_id: PostId) -> BackendResult<bool> {
        self.0.with_conn(|conn| {
            Ok(select(exists(post_likes::table.find((user_id, post_id)))).get_result(conn)?)
        })
    }

    fn insert_post_like(&self, user_id: UserId, post_id: PostId) -> BackendResult<bool> {
        self.0.with_conn(|conn| {
            let rows = insert_into(post_likes::table)
                .values((
                    post_likes::user_id.eq(user_id),
                    post_likes::post_id.eq(post_id),
                ))
                .on_conflict_do_nothing()
                .execute(conn)?;
            Ok(rows > 0)
        })
    }

    fn delete_post_like(&self, user_id: UserId, post_id: PostId) -> BackendResult<bool> {
        self.0.with_conn(|conn| {
            let rows = delete(post_likes::table.find((user_id, post_id))).execute(conn)?;
            Ok(rows > 0)
        })
    }

    fn count_post_likes(&self, post_id: PostId) -> BackendResult<i64> {
        self.0.with_conn(|conn| {
            Ok(post_likes::table
                .filter(post_likes::post_id.eq(post_id))
                .count()
                .get_result(conn)?)
        })
    }

    fn comment_like_exists(&self, user_id: UserId, comment_id: CommentId) -> BackendResult<bool> {
        self.0.with_conn(|conn| {
            Ok(select(exists(comment_likes::table.find((user_id, comment_id))))
                .get_result(conn)?)
        })
    }

    fn insert_comment_like(&self, user_id: UserId, comment_id: CommentId) -> BackendResult<bool> {
        self.0.with_conn(|conn| {
            let rows = insert_into(comment_likes::table)
                .values((
                    comment_likes::user_id.eq(user_id),
                    comment_likes::comment_id.eq(comment_id),
                ))
                .on_conflict_do_nothing()
                .execute(conn)?;
            Ok(rows > 0)
        })
    }

    fn delete_comment_like(&self, user_id: UserId, comment_id: CommentId) -> BackendResult<bool> {
        self.0.with_conn(|conn| {
            let rows = delete(comment_likes::table.find((user_id, comment_id))).execute(conn)?;
            Ok(rows > 0)
        })
    }

    fn count_comment_likes(&self, comment_id: CommentId) -> BackendResult<i64> {
        self.0.with_conn(|conn| {
            Ok(comment_likes::table
                .filter(comment_likes::comment_id.eq(comment_id))
                .count()
                .get_result(conn)?)
        })
    }
}

impl<A: Access> LikeRepo for MemoryRepo<A> {
    fn post_like_exists(&self, user_id: UserId, post_id: PostId) -> BackendResult<bool> {
        self.0
            .with_state(|s| Ok(s.post_likes.contains(&(user_id, post_id))))
    }

    fn insert_post_like(&self, user_id: UserId, post_id: PostId) -> BackendResult<bool> {
        self.0.with_state(|s| {
            if s.post_likes.contains(&(user_id, post_id)) {
                return Ok(false);
            }
            s.post_likes.push((user_id, post_id));
            Ok(true)
        })
    }

    fn delete_post_like(&self, user_id: UserId, post_id: PostId) -> BackendResult<bool> {
        self.0.with_state(|s| {
            let before = s.post_likes.len();
            s.post_likes.retain(|l| *l != (user_id, post_id));
            Ok(s.post_likes.len() < before)
        })
    }

    fn count_post_likes(&self, post_id: PostId) -> BackendResult<i64> {
        self.0.with_state(|s| {
            let count = s.post_likes.iter().filter(|(_, p)| *p == post_id).count();
            Ok(i64::try_from(count)?)
        })
    }

    fn comment_like_exists(&self, user_id: UserId, comment_id: CommentId) -> BackendResult<bool> {
        self.0
            .with_state(|s| Ok(s.comment_likes.contains(&(user_id, comment_id))))
    }

    fn insert_comment_like(&self, user_id: UserId, comment_id: CommentId) -> BackendResult<bool> {
        self.0.with_state(|s| {
            if s.comment_likes.contains(&(user_id, comment_id)) {
                return Ok(false);
            }
            s.comment_likes.push((user_id, comment_id));
            Ok(true)
        })
    }

    fn delete_comment_like(&self, user_id: UserId, comment_id: CommentId) -> BackendResult<bool> {
        self.0.with_state(|s| {
            let before = s.comment_likes.len();
            s.comment_likes.retain(|l| *l != (user_id, comment_id));
            Ok(s.comment_likes.len() < before)
        })
    }

    fn count_comment_likes(&self, comment_id: CommentId) -> BackendResult<i64> {
        self.0.with_state(|s| {
            let count = s
                .comment_likes
                .iter()
                .filter(|(_, c)| *c == comment_id)
                .count();
            Ok(i64::try_from(count)?)
        })
    }
}
