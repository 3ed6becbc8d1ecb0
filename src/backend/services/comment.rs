use super::{check_is_admin, check_owner_or_admin, post::read_visible_post, profile::get_profile};
use crate::{
    backend::{
        database::{
            comment::CommentInsertForm,
            transaction,
            FolioContext,
        },
        utils::{
            error::{BackendError, BackendResult},
            validate::validate_comment_content,
        },
    },
    common::{
        comment::{Comment, CommentView, CreateCommentParams, UpdateCommentParams},
        newtypes::CommentId,
        user::{Author, Role, User},
    },
};
use chrono::Utc;
use log::{info, warn};
use std::collections::HashMap;

/// Arranges comments, ordered by creation time, into a forest of root comments with nested
/// replies. Every list keeps the input order. Comments whose parent is missing are dropped.
pub fn build_comment_tree(comments: Vec<CommentView>) -> Vec<CommentView> {
    let index: HashMap<CommentId, usize> = comments
        .iter()
        .enumerate()
        .map(|(i, c)| (c.comment.id, i))
        .collect();
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); comments.len()];
    let mut roots = Vec::new();
    for (i, view) in comments.iter().enumerate() {
        match view.comment.parent_id {
            None => roots.push(i),
            Some(parent_id) => match index.get(&parent_id) {
                Some(&parent) => children[parent].push(i),
                None => warn!(
                    "Dropping comment {} with missing parent {}",
                    view.comment.id.0, parent_id.0
                ),
            },
        }
    }

    let mut slots: Vec<Option<CommentView>> = comments.into_iter().map(Some).collect();
    roots
        .into_iter()
        .filter_map(|i| attach_replies(i, &mut slots, &children))
        .collect()
}

fn attach_replies(
    i: usize,
    slots: &mut [Option<CommentView>],
    children: &[Vec<usize>],
) -> Option<CommentView> {
    let mut view = slots.get_mut(i)?.take()?;
    view.replies = children[i]
        .iter()
        .filter_map(|&child| attach_replies(child, slots, children))
        .collect();
    Some(view)
}

/// Comments by the blog owner are shown with the profile photo.
fn override_admin_avatar(author: &mut Author, photo_url: Option<&String>) {
    if let (Role::Admin, Some(photo_url)) = (author.role, photo_url) {
        author.avatar_url = Some(photo_url.clone());
    }
}

fn profile_photo(context: &FolioContext) -> Option<String> {
    match get_profile(context) {
        Ok(profile) => profile.photo_url,
        Err(e) => {
            warn!("Failed to read profile: {e}");
            None
        }
    }
}

pub fn list_comments(
    context: &FolioContext,
    slug: &str,
    viewer: Option<&User>,
) -> BackendResult<Vec<CommentView>> {
    let post = read_visible_post(context, slug, viewer)?;
    let mut comments = context
        .repo()
        .comments_for_post(post.id, viewer.map(|u| u.id))?;
    let photo_url = profile_photo(context);
    for view in &mut comments {
        override_admin_avatar(&mut view.user, photo_url.as_ref());
    }
    Ok(build_comment_tree(comments))
}

fn read_comment(context: &FolioContext, id: CommentId) -> BackendResult<Comment> {
    context
        .repo()
        .read_comment(id)?
        .ok_or_else(|| BackendError::not_found("Comment"))
}

pub fn create_comment(
    context: &FolioContext,
    slug: &str,
    params: CreateCommentParams,
    user: &User,
) -> BackendResult<CommentView> {
    validate_comment_content(&params.content)?;
    let post = read_visible_post(context, slug, Some(user))?;
    if let Some(parent_id) = params.parent_id {
        let parent = context
            .repo()
            .read_comment(parent_id)?
            .ok_or_else(|| BackendError::bad_request("Parent comment does not exist"))?;
        if parent.post_id != post.id {
            return Err(BackendError::bad_request(
                "Parent comment belongs to another post",
            ));
        }
        if parent.is_deleted() {
            return Err(BackendError::bad_request("Cannot reply to a deleted comment"));
        }
    }

    let form = CommentInsertForm {
        post_id: post.id,
        user_id: user.id,
        parent_id: params.parent_id,
        content: params.content.trim().to_string(),
    };
    let comment = transaction(&*context.store, |repo| {
        let comment = repo.create_comment(&form)?;
        repo.adjust_post_comments_count(post.id, 1)?;
        Ok(comment)
    })?;
    info!("User {} commented on post {}", user.id.0, post.id.0);

    let mut author = Author::from(user.clone());
    override_admin_avatar(&mut author, profile_photo(context).as_ref());
    Ok(CommentView {
        comment,
        user: author,
        is_liked: false,
        replies: vec![],
    })
}

/// Only the author may edit a comment, admins included.
pub fn update_comment(
    context: &FolioContext,
    id: CommentId,
    params: UpdateCommentParams,
    user: &User,
) -> BackendResult<Comment> {
    validate_comment_content(&params.content)?;
    let comment = read_comment(context, id)?;
    if comment.user_id != user.id {
        return Err(BackendError::permission_denied(
            "Only the author can edit this comment",
        ));
    }
    if comment.is_deleted() {
        return Err(BackendError::bad_request("Comment is deleted"));
    }
    context
        .repo()
        .update_comment_content(id, params.content.trim())
}

pub fn delete_comment(context: &FolioContext, id: CommentId, user: &User) -> BackendResult<()> {
    let comment = read_comment(context, id)?;
    check_owner_or_admin(user, comment.user_id, "Only the author can delete this comment")?;
    if comment.is_deleted() {
        return Err(BackendError::bad_request("Comment is already deleted"));
    }
    transaction(&*context.store, |repo| {
        if !repo.soft_delete_comment(id, Utc::now())? {
            return Err(BackendError::bad_request("Comment is already deleted"));
        }
        repo.adjust_post_comments_count(comment.post_id, -1)
    })?;
    info!("Comment {} deleted by user {}", id.0, user.id.0);
    Ok(())
}

/// Removes a comment together with its replies.
pub fn hard_delete_comment(context: &FolioContext, id: CommentId, user: &User) -> BackendResult<()> {
    check_is_admin(user)?;
    if !context.repo().hard_delete_comment(id)? {
        return Err(BackendError::not_found("Comment"));
    }
    info!("Comment {} removed by admin {}", id.0, user.id.0);
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        backend::{
            database::{
                profile::ProfileUpdateForm,
                test_context,
            },
            services::{post::create_post, test::create_user},
        },
        common::{
            comment::DELETED_COMMENT_PLACEHOLDER,
            newtypes::{PostId, UserId},
            post::CreatePostParams,
        },
    };
    use chrono::{DateTime, TimeDelta};
    use pretty_assertions::assert_eq;

    struct Data {
        context: FolioContext,
        admin: User,
        alice: User,
        bob: User,
        post_id: PostId,
    }

    fn setup() -> BackendResult<Data> {
        let context = test_context();
        let admin = create_user(&context, "admin", Role::Admin)?;
        let alice = create_user(&context, "alice", Role::User)?;
        let bob = create_user(&context, "bob", Role::User)?;
        let post = create_post(
            &context,
            CreatePostParams {
                title: "Hello World".to_string(),
                content: "Content of the first post".to_string(),
                published: true,
                ..Default::default()
            },
            &admin,
        )?;
        Ok(Data {
            context,
            admin,
            alice,
            bob,
            post_id: post.post.id,
        })
    }

    fn comment(
        data: &Data,
        content: &str,
        parent_id: Option<CommentId>,
        user: &User,
    ) -> BackendResult<CommentView> {
        create_comment(
            &data.context,
            "hello-world",
            CreateCommentParams {
                content: content.to_string(),
                parent_id,
            },
            user,
        )
    }

    fn comments_count(data: &Data) -> BackendResult<i32> {
        let post = data.context.repo().read_post(data.post_id)?;
        Ok(post.map(|p| p.comments_count).unwrap_or_default())
    }

    fn flat(id: i32, parent_id: Option<i32>) -> CommentView {
        let time = DateTime::from_timestamp(1_700_000_000, 0).unwrap_or_default()
            + TimeDelta::seconds(id.into());
        CommentView {
            comment: Comment {
                id: CommentId(id),
                post_id: PostId(1),
                user_id: UserId(1),
                parent_id: parent_id.map(CommentId),
                content: format!("comment {id}"),
                likes_count: 0,
                created_at: time,
                updated_at: time,
                deleted_at: None,
            },
            user: Author {
                id: UserId(1),
                name: "alice".to_string(),
                avatar_url: None,
                role: Role::User,
            },
            is_liked: false,
            replies: vec![],
        }
    }

    fn ids(views: &[CommentView]) -> Vec<i32> {
        views.iter().map(|v| v.comment.id.0).collect()
    }

    #[test]
    fn test_build_comment_tree() {
        let tree = build_comment_tree(vec![
            flat(1, None),
            flat(2, Some(1)),
            flat(3, None),
            flat(4, Some(2)),
            flat(5, Some(1)),
            // parent was removed
            flat(6, Some(99)),
        ]);
        assert_eq!(vec![1, 3], ids(&tree));
        assert_eq!(vec![2, 5], ids(&tree[0].replies));
        assert_eq!(vec![4], ids(&tree[0].replies[0].replies));
        assert!(tree[1].replies.is_empty());
        assert!(build_comment_tree(vec![]).is_empty());
    }

    #[test]
    fn test_create_and_list_comments() -> BackendResult<()> {
        let data = setup()?;
        let root = comment(&data, "First!", None, &data.alice)?;
        let reply = comment(&data, "Reply", Some(root.comment.id), &data.bob)?;
        comment(&data, "Second", None, &data.admin)?;
        assert_eq!(3, comments_count(&data)?);
        assert_eq!(Some(root.comment.id), reply.comment.parent_id);

        let tree = list_comments(&data.context, "hello-world", Some(&data.alice))?;
        assert_eq!(2, tree.len());
        assert_eq!("First!", tree[0].comment.content);
        assert_eq!(vec![reply.comment.id], tree[0].replies.iter().map(|r| r.comment.id).collect::<Vec<_>>());
        assert_eq!("Second", tree[1].comment.content);

        let res = comment(&data, "  ", None, &data.alice);
        assert!(matches!(res, Err(BackendError::Validation(_))));
        let res = create_comment(
            &data.context,
            "missing",
            CreateCommentParams {
                content: "Hi".to_string(),
                parent_id: None,
            },
            &data.alice,
        );
        assert!(matches!(res, Err(BackendError::NotFound(_))));
        Ok(())
    }

    #[test]
    fn test_reply_checks_parent() -> BackendResult<()> {
        let data = setup()?;
        let res = comment(&data, "Reply", Some(CommentId(999)), &data.alice);
        assert!(matches!(res, Err(BackendError::BadRequest(_))));

        let other = create_post(
            &data.context,
            CreatePostParams {
                title: "Other Post".to_string(),
                content: "Content of the other post".to_string(),
                published: true,
                ..Default::default()
            },
            &data.admin,
        )?;
        let foreign = create_comment(
            &data.context,
            &other.post.slug,
            CreateCommentParams {
                content: "Elsewhere".to_string(),
                parent_id: None,
            },
            &data.bob,
        )?;
        let res = comment(&data, "Reply", Some(foreign.comment.id), &data.alice);
        assert!(matches!(res, Err(BackendError::BadRequest(_))));

        let root = comment(&data, "Root", None, &data.bob)?;
        delete_comment(&data.context, root.comment.id, &data.bob)?;
        let res = comment(&data, "Reply", Some(root.comment.id), &data.alice);
        assert!(matches!(res, Err(BackendError::BadRequest(_))));
        Ok(())
    }

    #[test]
    fn test_update_comment_permissions() -> BackendResult<()> {
        let data = setup()?;
        let view = comment(&data, "Original", None, &data.alice)?;
        let edit = |content: &str| UpdateCommentParams {
            content: content.to_string(),
        };

        let res = update_comment(&data.context, view.comment.id, edit("By bob"), &data.bob);
        assert!(matches!(res, Err(BackendError::PermissionDenied(_))));
        // admins can not edit comments of other users
        let res = update_comment(&data.context, view.comment.id, edit("By admin"), &data.admin);
        assert!(matches!(res, Err(BackendError::PermissionDenied(_))));

        let updated = update_comment(&data.context, view.comment.id, edit("Edited"), &data.alice)?;
        assert_eq!("Edited", updated.content);

        delete_comment(&data.context, view.comment.id, &data.alice)?;
        let res = update_comment(&data.context, view.comment.id, edit("Again"), &data.alice);
        assert!(matches!(res, Err(BackendError::BadRequest(_))));
        Ok(())
    }

    #[test]
    fn test_soft_delete_comment() -> BackendResult<()> {
        let data = setup()?;
        let root = comment(&data, "Root", None, &data.alice)?;
        comment(&data, "Reply", Some(root.comment.id), &data.bob)?;
        assert_eq!(2, comments_count(&data)?);

        let res = delete_comment(&data.context, root.comment.id, &data.bob);
        assert!(matches!(res, Err(BackendError::PermissionDenied(_))));
        delete_comment(&data.context, root.comment.id, &data.admin)?;
        assert_eq!(1, comments_count(&data)?);

        let res = delete_comment(&data.context, root.comment.id, &data.alice);
        assert!(matches!(res, Err(BackendError::BadRequest(_))));
        assert_eq!(1, comments_count(&data)?);

        // tombstone stays in the tree with its replies
        let tree = list_comments(&data.context, "hello-world", None)?;
        assert_eq!(1, tree.len());
        assert_eq!(DELETED_COMMENT_PLACEHOLDER, tree[0].comment.content);
        assert!(tree[0].comment.deleted_at.is_some());
        assert_eq!(1, tree[0].replies.len());

        let res = delete_comment(&data.context, CommentId(999), &data.admin);
        assert!(matches!(res, Err(BackendError::NotFound(_))));
        Ok(())
    }

    #[test]
    fn test_hard_delete_comment() -> BackendResult<()> {
        let data = setup()?;
        let root = comment(&data, "Root", None, &data.alice)?;
        comment(&data, "Reply", Some(root.comment.id), &data.bob)?;
        comment(&data, "Other", None, &data.bob)?;

        let res = hard_delete_comment(&data.context, root.comment.id, &data.alice);
        assert!(matches!(res, Err(BackendError::PermissionDenied(_))));
        hard_delete_comment(&data.context, root.comment.id, &data.admin)?;
        assert_eq!(1, comments_count(&data)?);
        let tree = list_comments(&data.context, "hello-world", None)?;
        assert_eq!(vec!["Other"], tree.iter().map(|c| c.comment.content.as_str()).collect::<Vec<_>>());

        let res = hard_delete_comment(&data.context, root.comment.id, &data.admin);
        assert!(matches!(res, Err(BackendError::NotFound(_))));
        Ok(())
    }

    #[test]
    fn test_admin_avatar_uses_profile_photo() -> BackendResult<()> {
        let data = setup()?;
        let repo = data.context.repo();
        let Some(mut profile) = repo.read_profile()? else {
            panic!("missing profile");
        };
        profile.photo_url = Some("/uploads/me.png".to_string());
        repo.update_profile(&ProfileUpdateForm::new(&profile)?)?;

        let view = comment(&data, "From the owner", None, &data.admin)?;
        assert_eq!(Some("/uploads/me.png".to_string()), view.user.avatar_url);
        comment(&data, "From a reader", None, &data.alice)?;

        let tree = list_comments(&data.context, "hello-world", None)?;
        assert_eq!(Some("/uploads/me.png".to_string()), tree[0].user.avatar_url);
        assert_eq!(data.alice.avatar_url, tree[1].user.avatar_url);
        Ok(())
    }
}
