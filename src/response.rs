use actix_web::{
    error::{JsonPayloadError, PathError, QueryPayloadError},
    http::StatusCode,
    HttpRequest, HttpResponse, ResponseError,
};
use serde::Serialize;

use crate::error::AppError;

#[derive(Serialize)]
pub struct ResponseDto<T: Serialize> {
    pub data: Option<T>,
    pub code: i32,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl<T: Serialize> ResponseDto<T> {
    pub fn success(data: Option<T>) -> Self {
        Self {
            data,
            code: 0,
            msg: "".to_string(),
            field: None,
        }
    }
}

/// 200 with `data` in the envelope.
pub fn ok<T: Serialize>(data: T) -> HttpResponse {
    HttpResponse::Ok().json(ResponseDto::success(Some(data)))
}

/// 201 with the created record in the envelope.
pub fn created<T: Serialize>(data: T) -> HttpResponse {
    HttpResponse::Created().json(ResponseDto::success(Some(data)))
}

pub fn no_content() -> HttpResponse {
    HttpResponse::NoContent().finish()
}

pub fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    let app_err = match err {
        JsonPayloadError::ContentType => AppError::param_error("non_field_errors", "expected an application/json body"),
        JsonPayloadError::Deserialize(e) => AppError::param_error("non_field_errors", e.to_string()),
        _ => AppError::param_error("non_field_errors", "invalid request body"),
    };
    app_err.into()
}

pub fn query_error_handler(err: QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    AppError::param_error("query", err.to_string()).into()
}

pub fn path_error_handler(_err: PathError, _req: &HttpRequest) -> actix_web::Error {
    // a non-numeric id can never name a record
    AppError::not_found("resource").into()
}

pub fn response_from_error(err: &AppError) -> HttpResponse {
    let status = err.status_code();
    let msg = if status == StatusCode::INTERNAL_SERVER_ERROR {
        "system_exception".to_string()
    } else {
        err.to_string()
    };
    HttpResponse::build(status).json(ResponseDto::<()> {
        data: None,
        code: err.code(),
        msg,
        field: err.field().map(str::to_string),
    })
}
