//! The managed entry point: capture the platform's request headers so that
//! request-scoped platform calls can see them.

use crate::errors::HandlerError;
use actix_web::{
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    Error as ActixError, HttpMessage,
};
use hellogae_platform::RequestInfo;
use std::{
    future::{ready, Future, Ready},
    pin::Pin,
    task::Context,
};

/// Factory for [`AppEngineEntryMiddleware`].
pub struct AppEngineEntry;

/// Middleware that attaches a [`RequestInfo`] to each request.
pub struct AppEngineEntryMiddleware<S> {
    /// The wrapped service.
    service: S,
}

impl<S, B> Transform<S, ServiceRequest> for AppEngineEntry
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = ActixError>,
    S::Future: 'static,
{
    type Response = ServiceResponse<B>;

    type Error = ActixError;

    type Transform = AppEngineEntryMiddleware<S>;

    type InitError = ();

    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AppEngineEntryMiddleware { service }))
    }
}

impl<S, B> Service<ServiceRequest> for AppEngineEntryMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = ActixError>,
    S::Future: 'static,
{
    type Response = ServiceResponse<B>;

    type Error = ActixError;

    #[allow(clippy::type_complexity)]
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&self, ctx: &mut Context<'_>) -> std::task::Poll<Result<(), Self::Error>> {
        self.service.poll_ready(ctx).map_err(|error| {
            tracing::error!(
                r#type = "web.app-engine.polling-error",
                %error,
                "Error polling service from app engine middleware"
            );
            HandlerError::internal().into()
        })
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let info = RequestInfo::from_headers(req.headers());
        if info.is_empty() {
            tracing::debug!(
                r#type = "web.app-engine.no-headers",
                "Request carries no platform headers"
            );
        }
        req.extensions_mut().insert(info);
        Box::pin(self.service.call(req))
    }
}

#[cfg(test)]
mod tests {
    use super::AppEngineEntry;
    use actix_web::{
        test::{call_and_read_body, init_service, TestRequest},
        web, App, HttpMessage, HttpRequest, HttpResponse,
    };
    use hellogae_platform::{request::REQUEST_LOG_ID, RequestInfo};
    use pretty_assertions::assert_eq;

    async fn echo_log_id(req: HttpRequest) -> HttpResponse {
        let body = match req.extensions().get::<RequestInfo>() {
            Some(info) => format!("captured:{}", info.header(REQUEST_LOG_ID)),
            None => "missing".to_string(),
        };
        HttpResponse::Ok().body(body)
    }

    #[actix_rt::test]
    async fn test_attaches_request_info() {
        let app = init_service(
            App::new()
                .wrap(AppEngineEntry)
                .route("/", web::get().to(echo_log_id)),
        )
        .await;
        let req = TestRequest::get()
            .uri("/")
            .insert_header((REQUEST_LOG_ID, "5f1a2b"))
            .to_request();

        let body = call_and_read_body(&app, req).await;
        assert_eq!(body, "captured:5f1a2b");
    }

    #[actix_rt::test]
    async fn test_bare_app_has_no_request_info() {
        let app = init_service(App::new().route("/", web::get().to(echo_log_id))).await;
        let req = TestRequest::get()
            .uri("/")
            .insert_header((REQUEST_LOG_ID, "5f1a2b"))
            .to_request();

        let body = call_and_read_body(&app, req).await;
        assert_eq!(body, "missing");
    }
}
