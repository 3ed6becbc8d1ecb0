use super::{
    newtypes::{PostId, UserId},
    user::Author,
};
use crate::backend::database::schema::posts;
use chrono::{DateTime, Utc};
use diesel::{Identifiable, Queryable, Selectable};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Queryable, Selectable, Identifiable)]
#[diesel(table_name = posts, check_for_backend(diesel::pg::Pg))]
pub struct Post {
    pub id: PostId,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub preview: String,
    pub cover_image: Option<String>,
    pub read_time_minutes: i32,
    pub author_id: UserId,
    pub published: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub likes_count: i32,
    pub comments_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PostView {
    #[serde(flatten)]
    pub post: Post,
    pub author: Author,
    pub is_liked: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PostList {
    pub posts: Vec<PostView>,
    pub total_count: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct CreatePostParams {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub preview: String,
    pub cover_image: Option<String>,
    #[serde(default)]
    pub published: bool,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct UpdatePostParams {
    pub title: Option<String>,
    pub content: Option<String>,
    pub preview: Option<String>,
    pub cover_image: Option<String>,
    pub published: Option<bool>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct ListPostsParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub published: Option<bool>,
}
