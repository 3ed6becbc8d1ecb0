use crate::{
    backend::{
        database::{transaction, FolioContext},
        utils::error::{BackendError, BackendResult},
    },
    common::{
        like::{LikeCount, LikeStatus},
        newtypes::{CommentId, PostId},
        user::User,
    },
};
use log::debug;

/// Counter change for a toggle. A like row which was already inserted or removed by a
/// concurrent request must not move the counter a second time.
fn like_delta(is_liked: bool, changed: bool) -> i32 {
    match (is_liked, changed) {
        (_, false) => 0,
        (true, true) => 1,
        (false, true) => -1,
    }
}

/// Likes the post, or removes the like if the user already liked it.
pub fn toggle_post_like(
    context: &FolioContext,
    post_id: PostId,
    user: &User,
) -> BackendResult<LikeStatus> {
    let status = transaction(&*context.store, |repo| {
        let post = repo
            .read_post(post_id)?
            .filter(|p| p.published || user.is_admin())
            .ok_or_else(|| BackendError::not_found("Post"))?;
        let (is_liked, changed) = if repo.post_like_exists(user.id, post.id)? {
            (false, repo.delete_post_like(user.id, post.id)?)
        } else {
            (true, repo.insert_post_like(user.id, post.id)?)
        };
        let likes_count = repo.adjust_post_likes_count(post.id, like_delta(is_liked, changed))?;
        Ok(LikeStatus {
            is_liked,
            likes_count,
        })
    })?;
    debug!(
        "User {} toggled like on post {}: {}",
        user.id.0, post_id.0, status.is_liked
    );
    Ok(status)
}

/// Likes the comment, or removes the like if the user already liked it. Deleted comments can
/// not be liked.
pub fn toggle_comment_like(
    context: &FolioContext,
    comment_id: CommentId,
    user: &User,
) -> BackendResult<LikeStatus> {
    transaction(&*context.store, |repo| {
        let comment = repo
            .read_comment(comment_id)?
            .ok_or_else(|| BackendError::not_found("Comment"))?;
        if comment.is_deleted() {
            return Err(BackendError::bad_request("Comment is deleted"));
        }
        let (is_liked, changed) = if repo.comment_like_exists(user.id, comment.id)? {
            (false, repo.delete_comment_like(user.id, comment.id)?)
        } else {
            (true, repo.insert_comment_like(user.id, comment.id)?)
        };
        let likes_count =
            repo.adjust_comment_likes_count(comment.id, like_delta(is_liked, changed))?;
        Ok(LikeStatus {
            is_liked,
            likes_count,
        })
    })
}

pub fn post_likes_count(context: &FolioContext, post_id: PostId) -> BackendResult<LikeCount> {
    let repo = context.repo();
    if repo.read_post(post_id)?.is_none() {
        return Err(BackendError::not_found("Post"));
    }
    Ok(LikeCount {
        count: repo.count_post_likes(post_id)?,
    })
}

pub fn comment_likes_count(
    context: &FolioContext,
    comment_id: CommentId,
) -> BackendResult<LikeCount> {
    let repo = context.repo();
    if repo.read_comment(comment_id)?.is_none() {
        return Err(BackendError::not_found("Comment"));
    }
    Ok(LikeCount {
        count: repo.count_comment_likes(comment_id)?,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        backend::{
            database::test_context,
            services::{
                comment::{create_comment, delete_comment},
                post::create_post,
                test::create_user,
            },
        },
        common::{comment::CreateCommentParams, post::CreatePostParams, user::Role},
    };
    use pretty_assertions::assert_eq;

    fn post_params(title: &str, published: bool) -> CreatePostParams {
        CreatePostParams {
            title: title.to_string(),
            content: "Content which is long enough".to_string(),
            published,
            ..Default::default()
        }
    }

    #[test]
    fn test_toggle_post_like() -> BackendResult<()> {
        let context = test_context();
        let admin = create_user(&context, "admin", Role::Admin)?;
        let alice = create_user(&context, "alice", Role::User)?;
        let bob = create_user(&context, "bob", Role::User)?;
        let post = create_post(&context, post_params("Hello", true), &admin)?;
        let id = post.post.id;

        let liked = toggle_post_like(&context, id, &alice)?;
        assert_eq!(LikeStatus { is_liked: true, likes_count: 1 }, liked);
        let liked = toggle_post_like(&context, id, &bob)?;
        assert_eq!(LikeStatus { is_liked: true, likes_count: 2 }, liked);
        assert_eq!(2, post_likes_count(&context, id)?.count);

        let unliked = toggle_post_like(&context, id, &alice)?;
        assert_eq!(LikeStatus { is_liked: false, likes_count: 1 }, unliked);
        assert_eq!(1, post_likes_count(&context, id)?.count);

        let res = toggle_post_like(&context, PostId(999), &alice);
        assert!(matches!(res, Err(BackendError::NotFound(_))));
        assert!(post_likes_count(&context, PostId(999)).is_err());

        let draft = create_post(&context, post_params("Draft", false), &admin)?;
        let res = toggle_post_like(&context, draft.post.id, &alice);
        assert!(matches!(res, Err(BackendError::NotFound(_))));
        Ok(())
    }

    #[test]
    fn test_like_delta() -> BackendResult<()> {
        assert_eq!(1, like_delta(true, true));
        assert_eq!(-1, like_delta(false, true));
        assert_eq!(0, like_delta(true, false));
        assert_eq!(0, like_delta(false, false));
        Ok(())
    }

    #[test]
    fn test_likes_count_matches_rows() -> BackendResult<()> {
        let context = test_context();
        let admin = create_user(&context, "admin", Role::Admin)?;
        let alice = create_user(&context, "alice", Role::User)?;
        let bob = create_user(&context, "bob", Role::User)?;
        let post = create_post(&context, post_params("Hello", true), &admin)?;
        let id = post.post.id;

        for user in [&alice, &bob, &alice, &alice, &bob, &bob, &alice] {
            let status = toggle_post_like(&context, id, user)?;
            let rows = context.repo().count_post_likes(id)?;
            assert_eq!(rows, i64::from(status.likes_count));
        }
        assert_eq!(1, post_likes_count(&context, id)?.count);
        Ok(())
    }

    #[test]
    fn test_toggle_comment_like() -> BackendResult<()> {
        let context = test_context();
        let admin = create_user(&context, "admin", Role::Admin)?;
        let alice = create_user(&context, "alice", Role::User)?;
        create_post(&context, post_params("Hello", true), &admin)?;
        let comment = create_comment(
            &context,
            "hello",
            CreateCommentParams {
                content: "Nice".to_string(),
                parent_id: None,
            },
            &admin,
        )?;
        let id = comment.comment.id;

        assert!(toggle_comment_like(&context, id, &alice)?.is_liked);
        assert_eq!(1, comment_likes_count(&context, id)?.count);
        let status = toggle_comment_like(&context, id, &alice)?;
        assert_eq!(LikeStatus { is_liked: false, likes_count: 0 }, status);
        assert_eq!(0, comment_likes_count(&context, id)?.count);

        delete_comment(&context, id, &admin)?;
        let res = toggle_comment_like(&context, id, &alice);
        assert!(matches!(res, Err(BackendError::BadRequest(_))));
        let res = toggle_comment_like(&context, CommentId(999), &alice);
        assert!(matches!(res, Err(BackendError::NotFound(_))));
        Ok(())
    }
}
