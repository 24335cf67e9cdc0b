use actix_web::{
    body::{EitherBody, MessageBody},
    dev::{ServiceRequest, ServiceResponse},
    http::header::{HeaderName, HeaderValue},
    http::Method,
    middleware::Next,
    web, Error, HttpResponse,
};

use crate::config::AppConfig;

const BASE_ALLOWED_HEADERS: &str = "Origin, X-Requested-With, Content-Type, Accept";

/// Answers preflight requests itself and stamps CORS and no-cache headers on
/// every response. The token header from the config is always allowed.
pub async fn cors_handler<B>(
    req: ServiceRequest,
    next: Next<B>,
) -> Result<ServiceResponse<EitherBody<B>>, Error>
where
    B: MessageBody,
{
    let token_header = req
        .app_data::<web::Data<AppConfig>>()
        .map(|c| c.token_header.clone())
        .unwrap_or_else(|| "authorization".to_string());
    let allow_headers = format!("{}, {}", BASE_ALLOWED_HEADERS, token_header);

    let mut res = if req.method() == Method::OPTIONS {
        let res = HttpResponse::Ok().finish().map_into_right_body();
        req.into_response(res)
    } else {
        next.call(req).await?.map_into_left_body()
    };

    let headers = res.headers_mut();
    headers.insert(
        HeaderName::from_static("access-control-allow-origin"),
        HeaderValue::from_static("*"),
    );
    headers.insert(
        HeaderName::from_static("access-control-allow-methods"),
        HeaderValue::from_static("GET, POST, PATCH, DELETE, OPTIONS"),
    );
    headers.insert(
        HeaderName::from_static("access-control-max-age"),
        HeaderValue::from_static("86400"),
    );
    if let Ok(value) = HeaderValue::from_str(&allow_headers) {
        headers.insert(HeaderName::from_static("access-control-allow-headers"), value);
    }
    headers.insert(
        HeaderName::from_static("cache-control"),
        HeaderValue::from_static("no-cache, no-store, must-revalidate"),
    );

    Ok(res)
}
