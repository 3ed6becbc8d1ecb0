use super::{check_is_admin, check_owner_or_admin};
use crate::{
    backend::{
        database::{
            post::{PostInsertForm, PostUpdateForm},
            FolioContext,
        },
        utils::{
            error::{BackendError, BackendResult},
            read_time::markdown_read_time_minutes,
            slugify::slugify,
            validate::{
                validate_optional_url,
                validate_pagination,
                validate_post_content,
                validate_post_title,
                Validator,
            },
        },
    },
    common::{
        newtypes::PostId,
        post::{CreatePostParams, ListPostsParams, Post, PostList, PostView, UpdatePostParams},
        user::User,
    },
};
use chrono::Utc;
use log::info;

/// Non-admins only ever see published posts.
fn published_filter(requested: Option<bool>, viewer: Option<&User>) -> Option<bool> {
    match viewer {
        Some(user) if user.is_admin() => requested,
        _ => Some(true),
    }
}

fn slug_for_title(title: &str) -> BackendResult<String> {
    let slug = slugify(title);
    if slug.is_empty() {
        return Err(BackendError::validation(
            "title",
            "must contain at least one letter or digit",
        ));
    }
    Ok(slug)
}

fn check_slug_unused(context: &FolioContext, slug: &str, id: Option<PostId>) -> BackendResult<()> {
    match context.repo().read_post_by_slug(slug)? {
        Some(existing) if Some(existing.id) != id => Err(BackendError::conflict(
            "A post with this slug already exists",
        )),
        _ => Ok(()),
    }
}

fn empty_to_none(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

pub fn list_posts(
    context: &FolioContext,
    params: &ListPostsParams,
    viewer: Option<&User>,
) -> BackendResult<PostList> {
    let (page, limit) = validate_pagination(params.page, params.limit)?;
    let offset = (page - 1)
        .checked_mul(limit)
        .ok_or_else(|| BackendError::validation("page", "is too large"))?;
    let published = published_filter(params.published, viewer);
    let repo = context.repo();
    let total_count = repo.count_posts(published)?;
    let posts = repo.list_post_views(published, limit, offset, viewer.map(|u| u.id))?;
    Ok(PostList {
        posts,
        total_count,
        page,
        limit,
        total_pages: (total_count + limit - 1) / limit,
    })
}

/// Post with the given slug, if the viewer is allowed to see it.
pub fn read_visible_post(
    context: &FolioContext,
    slug: &str,
    viewer: Option<&User>,
) -> BackendResult<Post> {
    let post = context
        .repo()
        .read_post_by_slug(slug)?
        .ok_or_else(|| BackendError::not_found("Post"))?;
    if published_filter(None, viewer).is_some_and(|published| post.published != published) {
        return Err(BackendError::not_found("Post"));
    }
    Ok(post)
}

pub fn get_post(context: &FolioContext, slug: &str, viewer: Option<&User>) -> BackendResult<PostView> {
    let post = read_visible_post(context, slug, viewer)?;
    read_post_view(context, post.id, viewer)
}

fn read_post_view(
    context: &FolioContext,
    id: PostId,
    viewer: Option<&User>,
) -> BackendResult<PostView> {
    context
        .repo()
        .read_post_view(id, viewer.map(|u| u.id))?
        .ok_or_else(|| BackendError::not_found("Post"))
}

pub fn create_post(
    context: &FolioContext,
    params: CreatePostParams,
    user: &User,
) -> BackendResult<PostView> {
    check_is_admin(user)?;
    let mut validator = Validator::default();
    validate_post_title(&mut validator, &params.title);
    validate_post_content(&mut validator, &params.content);
    validate_optional_url(&mut validator, "cover_image", &params.cover_image);
    validator.finish()?;

    let title = params.title.trim().to_string();
    let slug = slug_for_title(&title)?;
    check_slug_unused(context, &slug, None)?;

    let form = PostInsertForm {
        read_time_minutes: markdown_read_time_minutes(&params.content),
        title,
        slug,
        content: params.content,
        preview: params.preview,
        cover_image: empty_to_none(params.cover_image),
        author_id: user.id,
        published: params.published,
        published_at: params.published.then(Utc::now),
    };
    let post = context.repo().create_post(&form)?;
    info!("Created post {} ({})", post.id.0, post.slug);
    read_post_view(context, post.id, Some(user))
}

pub fn update_post(
    context: &FolioContext,
    id: PostId,
    params: UpdatePostParams,
    user: &User,
) -> BackendResult<PostView> {
    let repo = context.repo();
    let post = repo
        .read_post(id)?
        .ok_or_else(|| BackendError::not_found("Post"))?;
    check_owner_or_admin(user, post.author_id, "Only the author can edit this post")?;

    let mut validator = Validator::default();
    if let Some(title) = &params.title {
        validate_post_title(&mut validator, title);
    }
    if let Some(content) = &params.content {
        validate_post_content(&mut validator, content);
    }
    validate_optional_url(&mut validator, "cover_image", &params.cover_image);
    validator.finish()?;

    let (title, slug) = match params.title {
        Some(title) => {
            let title = title.trim().to_string();
            let slug = slug_for_title(&title)?;
            if slug != post.slug {
                check_slug_unused(context, &slug, Some(post.id))?;
            }
            (title, slug)
        }
        None => (post.title, post.slug),
    };
    let content = params.content.unwrap_or(post.content);
    let published = params.published.unwrap_or(post.published);
    let published_at = match post.published_at {
        None if published => Some(Utc::now()),
        published_at => published_at,
    };
    let form = PostUpdateForm {
        title,
        slug,
        read_time_minutes: markdown_read_time_minutes(&content),
        content,
        preview: params.preview.unwrap_or(post.preview),
        cover_image: match params.cover_image {
            Some(cover_image) => empty_to_none(Some(cover_image)),
            None => post.cover_image,
        },
        published,
        published_at,
        updated_at: Utc::now(),
    };
    repo.update_post(id, &form)?;
    read_post_view(context, id, Some(user))
}

pub fn delete_post(context: &FolioContext, id: PostId, user: &User) -> BackendResult<()> {
    let repo = context.repo();
    let post = repo
        .read_post(id)?
        .ok_or_else(|| BackendError::not_found("Post"))?;
    check_owner_or_admin(user, post.author_id, "Only the author can delete this post")?;
    repo.delete_post(id)?;
    info!("Deleted post {} ({})", post.id.0, post.slug);
    Ok(())
}
