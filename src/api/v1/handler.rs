use super::cookie::{ACCESS_COOKIE, REFRESH_COOKIE, clear_cookie, session_cookie};
use super::error::*;
use crate::application_port::*;
use crate::domain_model::Subject;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use warp::http::StatusCode;
use warp::http::header::{HeaderValue, SET_COOKIE};
use warp::{self, Reply, reject};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(code: ApiErrorCode, message: impl Into<String>) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(ApiError {
                code,
                message: message.into(),
            }),
        }
    }
}

/// Per-deployment cookie attributes, fixed at wiring time.
#[derive(Debug, Clone, Copy)]
pub struct CookieOptions {
    pub secure: bool,
}

/// Both halves of the pair travel as cookies; the body only reports the
/// session's shape.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub subject: Subject,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

impl From<&TokenPair> for SessionResponse {
    fn from(pair: &TokenPair) -> Self {
        SessionResponse {
            subject: pair.subject.clone(),
            access_expires_at: pair.access.expires_at,
            refresh_expires_at: pair.refresh.expires_at,
        }
    }
}

fn append_cookie(
    response: &mut warp::reply::Response,
    cookie: &str,
) -> Result<(), warp::Rejection> {
    let value = HeaderValue::from_str(cookie)
        .map_err(|e| reject::custom(ApiErrorCode::internal(e)))?;
    response.headers_mut().append(SET_COOKIE, value);
    Ok(())
}

fn with_pair_cookies(
    mut response: warp::reply::Response,
    pair: &TokenPair,
    cookies: CookieOptions,
) -> Result<warp::reply::Response, warp::Rejection> {
    append_cookie(
        &mut response,
        &session_cookie(
            ACCESS_COOKIE,
            &pair.access.token,
            pair.access.expires_at,
            cookies.secure,
        ),
    )?;
    append_cookie(
        &mut response,
        &session_cookie(
            REFRESH_COOKIE,
            &pair.refresh.token,
            pair.refresh.expires_at,
            cookies.secure,
        ),
    )?;
    Ok(response)
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse;

pub async fn register(
    body: RegisterRequest,
    session_service: Arc<dyn SessionService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    session_service
        .signup(SignupInput {
            email: body.email,
            password: body.password,
        })
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    let json = warp::reply::json(&ApiResponse::ok(RegisterResponse));
    Ok(warp::reply::with_status(json, StatusCode::CREATED))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub async fn login(
    body: LoginRequest,
    session_service: Arc<dyn SessionService>,
    cookies: CookieOptions,
) -> Result<impl warp::Reply, warp::Rejection> {
    let pair = session_service
        .login(LoginInput {
            email: body.email,
            password: body.password,
        })
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    let response =
        warp::reply::json(&ApiResponse::ok(SessionResponse::from(&pair))).into_response();
    with_pair_cookies(response, &pair, cookies)
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse;

pub async fn logout(
    access_cookie: Option<String>,
    refresh_cookie: Option<String>,
    session_service: Arc<dyn SessionService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    // Best-effort: whatever happens store-side, the client walks away with
    // both cookies cleared and a 200.
    session_service
        .logout(access_cookie.as_deref(), refresh_cookie.as_deref())
        .await;

    let mut response = warp::reply::json(&ApiResponse::ok(LogoutResponse)).into_response();
    append_cookie(&mut response, &clear_cookie(ACCESS_COOKIE))?;
    append_cookie(&mut response, &clear_cookie(REFRESH_COOKIE))?;
    Ok(response)
}

pub async fn refresh(
    refresh_token: String,
    session_service: Arc<dyn SessionService>,
    cookies: CookieOptions,
) -> Result<impl warp::Reply, warp::Rejection> {
    let pair = session_service
        .rotate(&refresh_token)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    let json = warp::reply::json(&ApiResponse::ok(SessionResponse::from(&pair)));
    let response = warp::reply::with_status(json, StatusCode::CREATED).into_response();
    with_pair_cookies(response, &pair, cookies)
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub subject: Subject,
}

pub async fn me(subject: Subject) -> Result<impl warp::Reply, warp::Rejection> {
    Ok(warp::reply::json(&ApiResponse::ok(MeResponse { subject })))
}
