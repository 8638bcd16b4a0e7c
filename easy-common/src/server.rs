//! Router assembly and the HTTP server loop

use axum::body::Bytes;
use axum::extract::{Path, Query};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, on, MethodFilter, MethodRouter};
use axum::{Json, Router};
use futures::future::BoxFuture;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::app::{BoxedHandler, RouteEntry};
use crate::config::StaticConfig;
use crate::http::{ContentType, HttpMethod, HttpRequest};
use crate::{Error, Result};

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// GET /health
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Translate `/hello/to/{user}` into the router syntax `/hello/to/:user`
pub fn to_router_path(path: &str) -> Result<String> {
    if !path.starts_with('/') {
        return Err(Error::Config(format!("route path '{}' must start with '/'", path)));
    }
    let segments = path
        .split('/')
        .map(|segment| {
            match (segment.strip_prefix('{'), segment.ends_with('}')) {
                (Some(inner), true) => {
                    let name = &inner[..inner.len() - 1];
                    if name.is_empty() || name.contains(['{', '}']) {
                        Err(Error::Config(format!("bad placeholder in route path '{}'", path)))
                    } else {
                        Ok(format!(":{}", name))
                    }
                }
                _ if segment.contains(['{', '}']) => Err(Error::Config(format!(
                    "placeholders must span a whole segment in '{}'",
                    path
                ))),
                _ => Ok(segment.to_string()),
            }
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(segments.join("/"))
}

fn method_filter(method: HttpMethod) -> MethodFilter {
    match method {
        HttpMethod::Get => MethodFilter::GET,
        HttpMethod::Post => MethodFilter::POST,
        HttpMethod::Delete => MethodFilter::DELETE,
        HttpMethod::Put => MethodFilter::PUT,
        HttpMethod::Patch => MethodFilter::PATCH,
    }
}

type Dispatch = dyn Fn(
        Method,
        Uri,
        Option<Path<HashMap<String, String>>>,
        Query<HashMap<String, String>>,
        HeaderMap,
        Bytes,
    ) -> BoxFuture<'static, Response>
    + Send
    + Sync;

fn dispatcher<D: Send + Sync + 'static>(
    handler: BoxedHandler<D>,
    deps: Arc<D>,
    content_type: Option<ContentType>,
) -> Arc<Dispatch> {
    Arc::new(
        move |method: Method,
              uri: Uri,
              path_args: Option<Path<HashMap<String, String>>>,
              Query(args): Query<HashMap<String, String>>,
              headers: HeaderMap,
              body: Bytes|
              -> BoxFuture<'static, Response> {
            let handler = handler.clone();
            let deps = deps.clone();
            let content_type = content_type.clone();
            Box::pin(async move {
                // The router answers HEAD on every GET route
                let method = if method == Method::HEAD {
                    HttpMethod::Get
                } else {
                    match HttpMethod::try_from(&method) {
                        Ok(method) => method,
                        Err(err) => {
                            return (StatusCode::METHOD_NOT_ALLOWED, err.to_string())
                                .into_response()
                        }
                    }
                };
                let path_args = path_args.map(|Path(args)| args).unwrap_or_default();
                let request = HttpRequest::new(method, uri.path())
                    .with_path_args(path_args)
                    .with_args(args)
                    .with_headers(headers)
                    .with_body(body);

                match handler(request, deps).await {
                    Ok(response) => response.into_response_with(content_type.as_ref()),
                    Err(err) => err.into_response(),
                }
            })
        },
    )
}

const HEALTH_PATH: &str = "/health";

/// Handlers sharing one router path
struct MountedPath {
    router_path: String,
    method_router: MethodRouter,
    taken: Vec<HttpMethod>,
}

/// `/a/:x/b` and `/a/:y/b` both become `/a/:_/b`
fn route_shape(router_path: &str) -> String {
    router_path
        .split('/')
        .map(|segment| if segment.starts_with(':') { ":_" } else { segment })
        .collect::<Vec<_>>()
        .join("/")
}

/// Build the router: every handler component plus `/health`
///
/// Path and methods of each handler are read from its config section, so
/// the config a service is started with decides where a handler is mounted.
pub(crate) fn build_router<D: Send + Sync + 'static>(
    config: &StaticConfig,
    routes: Vec<RouteEntry<D>>,
    deps: Arc<D>,
    content_type: Option<ContentType>,
) -> Result<Router> {
    // Keyed by route shape; the router rejects two paths of the same shape
    let mut method_routers: BTreeMap<String, MountedPath> = BTreeMap::new();

    for route in routes {
        let section = config.component(&route.component);
        let path = section.get_str_or("path", &route.component)?;
        let methods = HttpMethod::parse_list(&section.get_str_or("method", "GET,POST")?)?;
        let router_path = to_router_path(&path)?;
        if route_shape(&router_path) == HEALTH_PATH {
            return Err(Error::Config(format!(
                "{}: path '{}' is reserved for the health check",
                route.component, path
            )));
        }
        debug!("Mounting {} [{}] at {}", route.component, HttpMethod::join(&methods), path);

        let dispatch = dispatcher(route.handler, deps.clone(), content_type.clone());
        let mounted = method_routers
            .entry(route_shape(&router_path))
            .or_insert_with(|| MountedPath {
                router_path: router_path.clone(),
                method_router: MethodRouter::new(),
                taken: Vec::new(),
            });
        if mounted.router_path != router_path {
            return Err(Error::Config(format!(
                "{}: path '{}' clashes with '{}' (placeholder names differ)",
                route.component, router_path, mounted.router_path
            )));
        }
        let MountedPath { method_router, taken, .. } = mounted;

        for method in methods {
            if taken.contains(&method) {
                return Err(Error::Config(format!(
                    "{} {} is handled twice",
                    method, path
                )));
            }
            taken.push(method);
            let dispatch = dispatch.clone();
            let handler = move |method: Method,
                                uri: Uri,
                                path_args: Option<Path<HashMap<String, String>>>,
                                args: Query<HashMap<String, String>>,
                                headers: HeaderMap,
                                body: Bytes| {
                dispatch(method, uri, path_args, args, headers, body)
            };
            let merged = std::mem::replace(method_router, MethodRouter::new());
            *method_router = merged.merge(on(method_filter(method), handler));
        }
    }

    let mut router = Router::new().route(HEALTH_PATH, get(health_check));
    for mounted in method_routers.into_values() {
        router = router.route(&mounted.router_path, mounted.method_router);
    }
    Ok(router.layer(TraceLayer::new_for_http()))
}

/// Serve until Ctrl+C or SIGTERM
pub async fn serve(router: Router, port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", listener.local_addr()?);
    info!("Health check: http://127.0.0.1:{}/health", port);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
