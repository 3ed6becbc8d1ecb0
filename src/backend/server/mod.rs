use crate::backend::{
    api::{admin_routes, api_routes, auth::auth_routes, health_routes},
    database::FolioContext,
    utils::{config::FolioConfigCors, error::BackendResult},
};
use anyhow::anyhow;
use axum::{
    http::{HeaderName, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    Router,
};
use log::info;
use middleware::{admin_middleware, auth_middleware, log_middleware, rate_limit_middleware};
use std::{net::SocketAddr, str::FromStr, time::Duration};
use tokio::{net::TcpListener, sync::oneshot};
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    services::ServeDir,
};

mod middleware;

pub(super) async fn start_server(
    context: FolioContext,
    override_hostname: Option<SocketAddr>,
    notify_start: Option<oneshot::Sender<()>>,
) -> BackendResult<()> {
    let addr = match override_hostname {
        Some(addr) => addr,
        None => context.config.bind_addr()?,
    };
    let app = router(context)?;

    info!("Listening on {}", &addr);
    let listener = TcpListener::bind(&addr).await?;
    if let Some(notify_start) = notify_start {
        notify_start
            .send(())
            .map_err(|_| anyhow!("Failed to notify server start"))?;
    }
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

fn router(context: FolioContext) -> BackendResult<Router> {
    let upload_path = &context.config.media.upload_path;
    let admin = admin_routes().route_layer(from_fn(admin_middleware));
    Ok(Router::new()
        .merge(health_routes())
        .nest("/auth", auth_routes())
        .nest("/api/v1", api_routes())
        .nest("/api/v1/admin", admin)
        .nest_service("/media", ServeDir::new(upload_path))
        .nest_service("/uploads", ServeDir::new(upload_path))
        .layer(from_fn_with_state(context.clone(), auth_middleware))
        .layer(from_fn_with_state(context.clone(), rate_limit_middleware))
        .layer(cors_layer(&context.config.cors)?)
        .layer(CompressionLayer::new())
        .layer(from_fn(log_middleware))
        .with_state(context))
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|v| !v.is_empty())
}

fn parse_list<T: FromStr>(value: &str) -> BackendResult<Vec<T>>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    Ok(split_list(value)
        .map(T::from_str)
        .collect::<Result<Vec<_>, _>>()?)
}

fn cors_layer(config: &FolioConfigCors) -> BackendResult<CorsLayer> {
    if !config.enabled {
        return Ok(CorsLayer::new());
    }
    let origin = if config.allowed_origins.trim() == "*" {
        // a literal wildcard can not be combined with credentials
        if config.allow_credentials {
            AllowOrigin::mirror_request()
        } else {
            AllowOrigin::any()
        }
    } else {
        AllowOrigin::list(parse_list::<HeaderValue>(&config.allowed_origins)?)
    };
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(parse_list::<Method>(&config.allowed_methods)?)
        .allow_headers(parse_list::<HeaderName>(&config.allowed_headers)?)
        .expose_headers(parse_list::<HeaderName>(&config.exposed_headers)?)
        .allow_credentials(config.allow_credentials)
        .max_age(Duration::from_secs(config.max_age_secs)))
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_list() -> BackendResult<()> {
        let methods = parse_list::<Method>("GET, POST,,DELETE ")?;
        assert_eq!(vec![Method::GET, Method::POST, Method::DELETE], methods);
        assert!(parse_list::<HeaderName>("Content-Type,bad header").is_err());
        Ok(())
    }

    #[test]
    fn test_cors_layer() -> BackendResult<()> {
        let mut config = FolioConfigCors::default();
        cors_layer(&config)?;
        config.allowed_origins = "https://blog.example.com, https://admin.example.com".to_string();
        cors_layer(&config)?;
        config.allow_credentials = false;
        config.allowed_origins = "*".to_string();
        cors_layer(&config)?;
        Ok(())
    }
}
