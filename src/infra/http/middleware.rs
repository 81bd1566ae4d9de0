use std::{sync::Arc, time::Instant};

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use tracing::{error, warn};
use uuid::Uuid;

use crate::{
    application::error::ErrorReport,
    domain::{
        locale::{Language, LocalePolicy},
        visitor::Visitor,
    },
};

#[derive(Clone)]
pub struct RequestContext {
    pub request_id: String,
}

/// Language chosen for the request from its first path segment.
#[derive(Debug, Clone)]
pub struct RequestLocale(pub Language);

/// Turns request headers (cookies, auth) into visibility flags.
pub trait SessionResolver: Send + Sync {
    fn resolve(&self, headers: &HeaderMap) -> Visitor;
}

/// Treats every request as an anonymous guest.
#[derive(Debug, Clone, Copy, Default)]
pub struct GuestSessions;

impl SessionResolver for GuestSessions {
    fn resolve(&self, _headers: &HeaderMap) -> Visitor {
        Visitor::guest()
    }
}

pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let ctx = RequestContext {
        request_id: request_id.clone(),
    };
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    response.extensions_mut().insert(ctx);
    response
}

pub async fn resolve_locale(
    State(locales): State<Arc<LocalePolicy>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let language = locales.resolve_path(request.uri().path()).clone();
    request.extensions_mut().insert(RequestLocale(language));
    next.run(request).await
}

pub async fn resolve_visitor(
    State(sessions): State<Arc<dyn SessionResolver>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let visitor = sessions.resolve(request.headers());
    request.extensions_mut().insert(visitor);
    next.run(request).await
}

pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();
    let language = request
        .extensions()
        .get::<RequestLocale>()
        .map(|locale| locale.0.code().to_string())
        .unwrap_or_default();

    let mut response = next.run(request).await;
    let status = response.status();

    if status.is_client_error() || status.is_server_error() {
        let elapsed_ms = start.elapsed().as_millis();
        let report = response.extensions_mut().remove::<ErrorReport>();
        let (source, messages) = match report {
            Some(report) => (report.source, report.messages),
            None => ("unknown", Vec::new()),
        };
        let detail = messages
            .first()
            .cloned()
            .unwrap_or_else(|| "no diagnostic available".to_string());

        if status.is_server_error() {
            error!(
                target = "galatea::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                language = language,
                "request failed",
            );
        } else {
            warn!(
                target = "galatea::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                language = language,
                "client request error",
            );
        }
    }

    response
}
