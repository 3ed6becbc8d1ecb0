mod common;

use anyhow::Result;
use common::{data, TestServer, ADMIN_EMAIL};
use folio::common::{
    comment::CommentView,
    like::{LikeCount, LikeStatus},
    post::{PostList, PostView},
    profile::Profile,
    user::{Role, User},
    ErrorResponse,
    HealthStatus,
};
use pretty_assertions::assert_eq;
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
async fn test_health() -> Result<()> {
    let server = TestServer::start().await;
    let client = TestServer::client();
    let res: HealthStatus = client.get(server.url("/health")).send().await?.json().await?;
    assert_eq!("ok", res.status);
    let res: HealthStatus = client.get(server.url("/ready")).send().await?.json().await?;
    assert_eq!("ready", res.status);
    server.stop();
    Ok(())
}

#[tokio::test]
async fn test_rate_limit() -> Result<()> {
    let server = TestServer::start_with(|config| {
        config.rate_limit.enabled = true;
        config.rate_limit.requests_limit = 2;
        config.rate_limit.window_secs = 3600;
    })
    .await;
    let client = TestServer::client();
    for _ in 0..2 {
        let res = client.get(server.url("/health")).send().await?;
        assert_eq!(StatusCode::OK, res.status());
    }

    let res = client.get(server.url("/api/v1/posts")).send().await?;
    assert_eq!(StatusCode::TOO_MANY_REQUESTS, res.status());
    let error: ErrorResponse = res.json().await?;
    assert!(!error.success);
    assert_eq!("TOO_MANY_REQUESTS", error.error.code);
    server.stop();
    Ok(())
}

#[tokio::test]
async fn test_login_and_logout() -> Result<()> {
    let server = TestServer::start().await;
    let client = TestServer::client();

    let res = client.get(server.url("/auth/me")).send().await?;
    assert_eq!(StatusCode::UNAUTHORIZED, res.status());
    let error: ErrorResponse = res.json().await?;
    assert!(!error.success);
    assert_eq!("UNAUTHORIZED", error.error.code);

    server.login(&client, "alice@example.com").await?;
    let me: User = data(
        client.get(server.url("/auth/me")).send().await?,
        StatusCode::OK,
    )
    .await?;
    assert_eq!("alice@example.com", me.email);
    assert_eq!(Role::User, me.role);

    // logging in again gives the same account
    server.login(&client, "alice@example.com").await?;
    let again: User = data(
        client.get(server.url("/auth/me")).send().await?,
        StatusCode::OK,
    )
    .await?;
    assert_eq!(me.id, again.id);

    let res = client.post(server.url("/auth/logout")).send().await?;
    assert_eq!(StatusCode::OK, res.status());
    let res = client.get(server.url("/auth/me")).send().await?;
    assert_eq!(StatusCode::UNAUTHORIZED, res.status());
    server.stop();
    Ok(())
}

#[tokio::test]
async fn test_callback_without_state_is_rejected() -> Result<()> {
    let server = TestServer::start().await;
    let client = TestServer::client();
    let res = client
        .get(server.url("/auth/fake/callback?state=abc&code=mallory@example.com"))
        .send()
        .await?;
    assert_eq!(StatusCode::BAD_REQUEST, res.status());

    let res = client.get(server.url("/auth/unknown")).send().await?;
    assert_eq!(StatusCode::NOT_FOUND, res.status());
    server.stop();
    Ok(())
}

#[tokio::test]
async fn test_blog_flow() -> Result<()> {
    let server = TestServer::start().await;
    let admin = TestServer::client();
    let reader = TestServer::client();
    let anonymous = TestServer::client();
    server.login(&admin, ADMIN_EMAIL).await?;
    server.login(&reader, "reader@example.com").await?;

    // only admins can write posts
    let params = json!({
        "title": "Hello World",
        "content": "The first post on this blog, with some text.",
        "preview": "The first post",
        "published": true,
    });
    let res = reader
        .post(server.url("/api/v1/admin/posts"))
        .json(&params)
        .send()
        .await?;
    assert_eq!(StatusCode::FORBIDDEN, res.status());
    let res = anonymous
        .post(server.url("/api/v1/admin/posts"))
        .json(&params)
        .send()
        .await?;
    assert_eq!(StatusCode::UNAUTHORIZED, res.status());

    let post: PostView = data(
        admin
            .post(server.url("/api/v1/admin/posts"))
            .json(&params)
            .send()
            .await?,
        StatusCode::CREATED,
    )
    .await?;
    assert_eq!("hello-world", post.post.slug);
    let res = admin
        .post(server.url("/api/v1/admin/posts"))
        .json(&params)
        .send()
        .await?;
    assert_eq!(StatusCode::CONFLICT, res.status());

    let draft = json!({"title": "Draft", "content": "Not ready for readers yet"});
    data::<PostView>(
        admin
            .post(server.url("/api/v1/admin/posts"))
            .json(&draft)
            .send()
            .await?,
        StatusCode::CREATED,
    )
    .await?;
    let list: PostList = data(
        anonymous.get(server.url("/api/v1/posts")).send().await?,
        StatusCode::OK,
    )
    .await?;
    assert_eq!(1, list.total_count);
    let list: PostList = data(
        admin.get(server.url("/api/v1/posts?limit=1")).send().await?,
        StatusCode::OK,
    )
    .await?;
    assert_eq!(2, list.total_count);
    assert_eq!(2, list.total_pages);
    let res = anonymous.get(server.url("/api/v1/posts/draft")).send().await?;
    assert_eq!(StatusCode::NOT_FOUND, res.status());

    // comments
    let comments_url = server.url("/api/v1/posts/hello-world/comments");
    let res = anonymous
        .post(&comments_url)
        .json(&json!({"content": "Hi"}))
        .send()
        .await?;
    assert_eq!(StatusCode::UNAUTHORIZED, res.status());
    let root: CommentView = data(
        reader
            .post(&comments_url)
            .json(&json!({"content": "Great post"}))
            .send()
            .await?,
        StatusCode::CREATED,
    )
    .await?;
    data::<CommentView>(
        admin
            .post(&comments_url)
            .json(&json!({"content": "Thanks", "parent_id": root.comment.id}))
            .send()
            .await?,
        StatusCode::CREATED,
    )
    .await?;
    let tree: Vec<CommentView> =
        data(anonymous.get(&comments_url).send().await?, StatusCode::OK).await?;
    assert_eq!(1, tree.len());
    assert_eq!("Thanks", tree[0].replies[0].comment.content);

    let comment_url = server.url(&format!("/api/v1/comments/{}", root.comment.id.0));
    let res = admin
        .put(&comment_url)
        .json(&json!({"content": "Edited by admin"}))
        .send()
        .await?;
    assert_eq!(StatusCode::FORBIDDEN, res.status());

    // likes
    let like_url = server.url(&format!("/api/v1/posts/{}/like", post.post.id.0));
    let status: LikeStatus = data(reader.post(&like_url).send().await?, StatusCode::OK).await?;
    assert!(status.is_liked);
    assert_eq!(1, status.likes_count);
    let count: LikeCount = data(
        anonymous
            .get(server.url(&format!("/api/v1/posts/{}/likes", post.post.id.0)))
            .send()
            .await?,
        StatusCode::OK,
    )
    .await?;
    assert_eq!(1, count.count);
    let status: LikeStatus = data(reader.post(&like_url).send().await?, StatusCode::OK).await?;
    assert!(!status.is_liked);

    // deleting a comment leaves a tombstone
    data::<serde_json::Value>(admin.delete(&comment_url).send().await?, StatusCode::OK).await?;
    let post: PostView = data(
        anonymous.get(server.url("/api/v1/posts/hello-world")).send().await?,
        StatusCode::OK,
    )
    .await?;
    assert_eq!(1, post.post.comments_count);
    let tree: Vec<CommentView> =
        data(anonymous.get(&comments_url).send().await?, StatusCode::OK).await?;
    assert!(tree[0].comment.deleted_at.is_some());
    server.stop();
    Ok(())
}

#[tokio::test]
async fn test_profile() -> Result<()> {
    let server = TestServer::start().await;
    let admin = TestServer::client();
    server.login(&admin, ADMIN_EMAIL).await?;

    let profile: Profile = data(
        admin.get(server.url("/api/v1/profile")).send().await?,
        StatusCode::OK,
    )
    .await?;
    assert_eq!("Folio", profile.name);

    let profile: Profile = data(
        admin
            .put(server.url("/api/v1/admin/profile"))
            .json(&json!({"name": "Jane", "github": "jane"}))
            .send()
            .await?,
        StatusCode::OK,
    )
    .await?;
    assert_eq!("Jane", profile.name);
    assert_eq!("jane", profile.contacts.github);

    let res = admin
        .put(server.url("/api/v1/admin/profile"))
        .json(&json!({"photo_url": "ftp://example.com/a.png"}))
        .send()
        .await?;
    assert_eq!(StatusCode::BAD_REQUEST, res.status());
    let error: ErrorResponse = res.json().await?;
    assert_eq!("VALIDATION_ERROR", error.error.code);
    assert!(error.error.details.contains_key("photo_url"));
    server.stop();
    Ok(())
}
