use super::{
    newtypes::{CommentId, PostId, UserId},
    user::Author,
};
use crate::backend::database::schema::comments;
use chrono::{DateTime, Utc};
use diesel::{Identifiable, Queryable, Selectable};
use serde::{Deserialize, Serialize};

/// Content shown in place of a soft-deleted comment.
pub const DELETED_COMMENT_PLACEHOLDER: &str = "[deleted]";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Queryable, Selectable, Identifiable)]
#[diesel(table_name = comments, check_for_backend(diesel::pg::Pg))]
pub struct Comment {
    pub id: CommentId,
    pub post_id: PostId,
    pub user_id: UserId,
    pub parent_id: Option<CommentId>,
    pub content: String,
    pub likes_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Comment {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// A comment with its author, the viewer's like status and nested replies.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CommentView {
    #[serde(flatten)]
    pub comment: Comment,
    pub user: Author,
    pub is_liked: bool,
    pub replies: Vec<CommentView>,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct CreateCommentParams {
    pub content: String,
    pub parent_id: Option<CommentId>,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct UpdateCommentParams {
    pub content: String,
}
