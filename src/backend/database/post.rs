use super::{
    greatest,
    memory::{Access, MemoryRepo, MemoryState},
    pg::{map_unique_violation, Connect, PgRepo},
    schema::{comments, post_likes, posts, users},
};
use crate::{
    backend::utils::error::{BackendError, BackendResult},
    common::{
        newtypes::{PostId, UserId},
        post::{Post, PostView},
        user::Author,
    },
};
use chrono::{DateTime, Utc};
use diesel::{
    delete,
    insert_into,
    update,
    AsChangeset,
    ExpressionMethods,
    Insertable,
    OptionalExtension,
    PgConnection,
    PgSortExpressionMethods,
    QueryDsl,
    RunQueryDsl,
    SelectableHelper,
};
use std::{cmp::Ordering, collections::HashSet};

const SLUG_TAKEN: &str = "A post with this slug already exists";

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = posts, check_for_backend(diesel::pg::Pg))]
pub struct PostInsertForm {
    pub title: String,
    pub slug: String,
    pub content: String,
    pub preview: String,
    pub cover_image: Option<String>,
    pub read_time_minutes: i32,
    pub author_id: UserId,
    pub published: bool,
    pub published_at: Option<DateTime<Utc>>,
}

/// Replaces all editable fields of a post.
#[derive(AsChangeset, Debug, Clone)]
#[diesel(table_name = posts, check_for_backend(diesel::pg::Pg))]
#[diesel(treat_none_as_null = true)]
pub struct PostUpdateForm {
    pub title: String,
    pub slug: String,
    pub content: String,
    pub preview: String,
    pub cover_image: Option<String>,
    pub read_time_minutes: i32,
    pub published: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

pub trait PostRepo {
    /// Fails with a conflict if the slug is taken.
    fn create_post(&self, form: &PostInsertForm) -> BackendResult<Post>;

    fn update_post(&self, id: PostId, form: &PostUpdateForm) -> BackendResult<Post>;

    /// Removes the post together with its comments and likes. Returns false if it didnt exist.
    fn delete_post(&self, id: PostId) -> BackendResult<bool>;

    fn read_post(&self, id: PostId) -> BackendResult<Option<Post>>;

    fn read_post_by_slug(&self, slug: &str) -> BackendResult<Option<Post>>;

    fn read_post_view(&self, id: PostId, viewer: Option<UserId>)
        -> BackendResult<Option<PostView>>;

    /// Posts in feed order: newest publication first, unpublished last.
    fn list_post_views(
        &self,
        published: Option<bool>,
        limit: i64,
        offset: i64,
        viewer: Option<UserId>,
    ) -> BackendResult<Vec<PostView>>;

    fn count_posts(&self, published: Option<bool>) -> BackendResult<i64>;

    /// Adds `delta` to the comment counter, never going below zero.
    fn adjust_post_comments_count(&self, id: PostId, delta: i32) -> BackendResult<()>;

    /// Sets the comment counter to the number of comments which are not soft-deleted.
    fn recount_post_comments(&self, id: PostId) -> BackendResult<()>;

    /// Adds `delta` to the like counter, never going below zero. Returns the new value.
    fn adjust_post_likes_count(&self, id: PostId, delta: i32) -> BackendResult<i32>;
}

fn liked_posts(
    conn: &mut PgConnection,
    viewer: Option<UserId>,
    ids: Vec<PostId>,
) -> BackendResult<HashSet<PostId>> {
    let Some(viewer) = viewer else {
        return Ok(HashSet::new());
    };
    let liked: Vec<PostId> = post_likes::table
        .filter(post_likes::user_id.eq(viewer))
        .filter(post_likes::post_id.eq_any(ids))
        .select(post_likes::post_id)
        .load(conn)?;
    Ok(liked.into_iter().collect())
}

fn into_views(rows: Vec<(Post, Author)>, liked: &HashSet<PostId>) -> Vec<PostView> {
    rows.into_iter()
        .map(|(post, author)| PostView {
            is_liked: liked.contains(&post.id),
            post,
            author,
        })
        .collect()
}

impl<C: Connect> PostRepo for PgRepo<C> {
    fn create_post(&self, form: &PostInsertForm) -> BackendResult<Post> {
        self.0.with_conn(|conn| {
            insert_into(posts::table)
                .values(form)
                .get_result(conn)
                .map_err(|e| map_unique_violation(e, SLUG_TAKEN))
        })
    }

    fn update_post(&self, id: PostId, form: &PostUpdateForm) -> BackendResult<Post> {
        self.0.with_conn(|conn| {
            update(posts::table.find(id))
                .set(form)
                .get_result(conn)
                .optional()
                .map_err(|e| map_unique_violation(e, SLUG_TAKEN))?
                .ok_or_else(|| BackendError::not_found("Post"))
        })
    }

    fn delete_post(&self, id: PostId) -> BackendResult<bool> {
        self.0.with_conn(|conn| {
            let rows = delete(posts::table.find(id)).execute(conn)?;
            Ok(rows > 0)
        })
    }

    fn read_post(&self, id: PostId) -> BackendResult<Option<Post>> {
        self.0
            .with_conn(|conn| Ok(posts::table.find(id).first(conn).optional()?))
    }

    fn read_post_by_slug(&self, slug: &str) -> BackendResult<Option<Post>> {
        self.0.with_conn(|conn| {
            Ok(posts::table
                .filter(posts::slug.eq(slug))
                .first(conn)
                .optional()?)
        })
    }

    fn read_post_view(
        &self,
        id: PostId,
        viewer: Option<UserId>,
    ) -> BackendResult<Option<PostView>> {
        self.0.with_conn(|conn| {
            let row: Option<(Post, Author)> = posts::table
                .inner_join(users::table)
                .filter(posts::id.eq(id))
                .select((Post::as_select(), Author::as_select()))
                .first(conn)
                .optional()?;
            let Some(row) = row else {
                return Ok(None);
            };
            let liked = liked_posts(conn, viewer, vec![id])?;
            Ok(into_views(vec![row], &liked).pop())
        })
    }

    fn list_post_views(
        &self,
        published: Option<bool>,
        limit: i64,
        offset: i64,
        viewer: Option<UserId>,
    ) -> BackendResult<Vec<PostView>> {
        self.0.with_conn(|conn| {
            let mut query = posts::table
                .inner_join(users::table)
                .select((Post::as_select(), Author::as_select()))
                .into_boxed();
            if let Some(published) = published {
                query = query.filter(posts::published.eq(published));
            }
            let rows: Vec<(Post, Author)> = query
                .order((
                    posts::published_at.desc().nulls_last(),
                    posts::created_at.desc(),
                    posts::id.desc(),
                ))
                .limit(limit)
                .offset(offset)
                .load(conn)?;
            let ids = rows.iter().map(|(p, _)| p.id).collect();
            let liked = liked_posts(conn, viewer, ids)?;
            Ok(into_views(rows, &liked))
        })
    }

    fn count_posts(&self, published: Option<bool>) -> BackendResult<i64> {
        self.0.with_conn(|conn| {
            let mut query = posts::table.into_boxed();
            if let Some(published) = published {
                query = query.filter(posts::published.eq(published));
            }
            Ok(query.count().get_result(conn)?)
        })
    }

    fn adjust_post_comments_count(&self, id: PostId, delta: i32) -> BackendResult<()> {
        self.0.with_conn(|conn| {
            update(posts::table.find(id))
                .set(posts::comments_count.eq(greatest(posts::comments_count + delta, 0)))
                .execute(conn)?;
            Ok(())
        })
    }

    fn recount_post_comments(&self, id: PostId) -> BackendResult<()> {
        self.0.with_conn(|conn| {
            let live: i64 = comments::table
                .filter(comments::post_id.eq(id))
                .filter(comments::deleted_at.is_null())
                .count()
                .get_result(conn)?;
            update(posts::table.find(id))
                .set(posts::comments_count.eq(i32::try_from(live)?))
                .execute(conn)?;
            Ok(())
        })
    }

    fn adjust_post_likes_count(&self, id: PostId, delta: i32) -> BackendResult<i32> {
        self.0.with_conn(|conn| {
            update(posts::table.find(id))
                .set(posts::likes_count.eq(greatest(posts::likes_count + delta, 0)))
                .returning(posts::likes_count)
                .get_result(conn)
                .optional()?
                .ok_or_else(|| BackendError::not_found("Post"))
        })
    }
}

/// Feed order for the in-memory store, matching the SQL ordering.
fn feed_order(a: &Post, b: &Post) -> Ordering {
    match (a.published_at, b.published_at) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then(b.created_at.cmp(&a.created_at))
    .then(b.id.0.cmp(&a.id.0))
}

fn memory_view(s: &MemoryState, post: &Post, viewer: Option<UserId>) -> BackendResult<PostView> {
    let author = s
        .users
        .iter()
        .find(|u| u.id == post.author_id)
        .cloned()
        .map(Author::from)
        .ok_or_else(|| BackendError::not_found("Author"))?;
    Ok(PostView {
        post: post.clone(),
        author,
        is_liked: viewer.is_some_and(|v| s.post_likes.contains(&(v, post.id))),
    })
}

impl<A: Access> PostRepo for MemoryRepo<A> {
    fn create_post(&self, form: &PostInsertForm) -> BackendResult<Post> {
        self.0.with_state(|s| {
            if s.posts.iter().any(|p| p.slug == form.slug) {
                return Err(BackendError::conflict(SLUG_TAKEN));
            }
            let now = Utc::now();
            let post = Post {
                id: PostId(s.next_id()),
                title: form.title.clone(),
                slug: form.slug.clone(),
                content: form.content.clone(),
                preview: form.preview.clone(),
                cover_image: form.cover_image.clone(),
                read_time_minutes: form.read_time_minutes,
                author_id: form.author_id,
                published: form.published,
                published_at: form.published_at,
                likes_count: 0,
                comments_count: 0,
                created_at: now,
                updated_at: now,
            };
            s.posts.push(post.clone());
            Ok(post)
        })
    }

    fn update_post(&self, id: PostId, form: &PostUpdateForm) -> BackendResult<Post> {
        self.0.with_state(|s| {
            if s.posts.iter().any(|p| p.slug == form.slug && p.id != id) {
                return Err(BackendError::conflict(SLUG_TAKEN));
            }
            let post = s
                .posts
                .iter_mut()
                .find(|p| p.id == id)
                .ok_or_else(|| BackendError::not_found("Post"))?;
            post.title = form.title.clone();
            post.slug = form.slug.clone();
            post.content = form.content.clone();
            post.preview = form.preview.clone();
            post.cover_image = form.cover_image.clone();
            post.read_time_minutes = form.read_time_minutes;
            post.published = form.published;
            post.published_at = form.published_at;
            post.updated_at = form.updated_at;
            Ok(post.clone())
        })
    }

    fn delete_post(&self, id: PostId) -> BackendResult<bool> {
        self.0.with_state(|s| {
            let before = s.posts.len();
            s.posts.retain(|p| p.id != id);
            if s.posts.len() == before {
                return Ok(false);
            }
            let removed: HashSet<_> = s
                .comments
                .iter()
                .filter(|c| c.post_id == id)
                .map(|c| c.id)
                .collect();
            s.comments.retain(|c| c.post_id != id);
            s.comment_likes.retain(|(_, c)| !removed.contains(c));
            s.post_likes.retain(|(_, p)| *p != id);
            Ok(true)
        })
    }

    fn read_post(&self, id: PostId) -> BackendResult<Option<Post>> {
        self.0
            .with_state(|s| Ok(s.posts.iter().find(|p| p.id == id).cloned()))
    }

    fn read_post_by_slug(&self, slug: &str) -> BackendResult<Option<Post>> {
        self.0
            .with_state(|s| Ok(s.posts.iter().find(|p| p.slug == slug).cloned()))
    }

    fn read_post_view(
        &self,
        id: PostId,
        viewer: Option<UserId>,
    ) -> BackendResult<Option<PostView>> {
        self.0.with_state(|s| {
            s.posts
                .iter()
                .find(|p| p.id == id)
                .map(|p| memory_view(s, p, viewer))
                .transpose()
        })
    }

    fn list_post_views(
        &self,
        published: Option<bool>,
        limit: i64,
        offset: i64,
        viewer: Option<UserId>,
    ) -> BackendResult<Vec<PostView>> {
        self.0.with_state(|s| {
            let mut posts: Vec<&Post> = s
                .posts
                .iter()
                .filter(|p| published.is_none_or(|published| p.published == published))
                .collect();
            posts.sort_by(|a, b| feed_order(a, b));
            posts
                .into_iter()
                .skip(usize::try_from(offset)?)
                .take(usize::try_from(limit)?)
                .map(|p| memory_view(s, p, viewer))
                .collect()
        })
    }

    fn count_posts(&self, published: Option<bool>) -> BackendResult<i64> {
        self.0.with_state(|s| {
            let count = s
                .posts
                .iter()
                .filter(|p| published.is_none_or(|published| p.published == published))
                .count();
            Ok(i64::try_from(count)?)
        })
    }

    fn adjust_post_comments_count(&self, id: PostId, delta: i32) -> BackendResult<()> {
        self.0.with_state(|s| {
            if let Some(post) = s.posts.iter_mut().find(|p| p.id == id) {
                post.comments_count = (post.comments_count + delta).max(0);
            }
            Ok(())
        })
    }

    fn recount_post_comments(&self, id: PostId) -> BackendResult<()> {
        self.0.with_state(|s| {
            let live = s
                .comments
                .iter()
                .filter(|c| c.post_id == id && !c.is_deleted())
                .count();
            if let Some(post) = s.posts.iter_mut().find(|p| p.id == id) {
                post.comments_count = i32::try_from(live)?;
            }
            Ok(())
        })
    }

    fn adjust_post_likes_count(&self, id: PostId, delta: i32) -> BackendResult<i32> {
        self.0.with_state(|s| {
            let post = s
                .posts
                .iter_mut()
                .find(|p| p.id == id)
                .ok_or_else(|| BackendError::not_found("Post"))?;
            post.likes_count = (post.likes_count + delta).max(0);
            Ok(post.likes_count)
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use diesel::{debug_query, pg::Pg};

    #[test]
    fn test_likes_count_update_is_clamped() -> BackendResult<()> {
        let query = update(posts::table.find(PostId(1)))
            .set(posts::likes_count.eq(greatest(posts::likes_count + -1, 0)));
        let sql = debug_query::<Pg, _>(&query).to_string();
        assert!(sql.contains("greatest("), "{sql}");
        assert!(sql.contains("\"likes_count\" + $1"), "{sql}");
        Ok(())
    }
}
