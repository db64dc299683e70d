use super::cookie::{ACCESS_COOKIE, REFRESH_COOKIE};
use super::error::*;
use super::handler::{self, CookieOptions};
use crate::application_port::SessionService;
use crate::domain_model::Subject;
use crate::server::Server;
use std::convert::Infallible;
use std::sync::Arc;
use warp::{Filter, reject};

pub fn routes(
    server: Arc<Server>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let cookies = CookieOptions {
        secure: server.cookie_secure,
    };

    let register = warp::post()
        .and(warp::path("register"))
        .and(warp::path::end())
        .and(warp::body::json())
        .and(with(server.session_service.clone()))
        .and_then(handler::register);

    let login = warp::post()
        .and(warp::path("login"))
        .and(warp::path::end())
        .and(warp::body::json())
        .and(with(server.session_service.clone()))
        .and(with_cookie_options(cookies))
        .and_then(handler::login);

    let logout = warp::post()
        .and(warp::path("logout"))
        .and(warp::path::end())
        .and(warp::cookie::optional::<String>(ACCESS_COOKIE))
        .and(warp::cookie::optional::<String>(REFRESH_COOKIE))
        .and(with(server.session_service.clone()))
        .and_then(handler::logout);

    let refresh = warp::get()
        .and(warp::path("token"))
        .and(warp::path("refresh"))
        .and(warp::path::end())
        .and(with_presented_token(REFRESH_COOKIE))
        .and(with(server.session_service.clone()))
        .and(with_cookie_options(cookies))
        .and_then(handler::refresh);

    let me = warp::get()
        .and(warp::path("me"))
        .and(warp::path::end())
        .and(with_session(server.session_service.clone()))
        .and_then(handler::me);

    register.or(login).or(logout).or(refresh).or(me)
}

fn with<ServiceType>(
    service: Arc<ServiceType>,
) -> impl Filter<Extract = (Arc<ServiceType>,), Error = Infallible> + Clone
where
    ServiceType: Send + Sync + ?Sized,
{
    warp::any().map(move || service.clone())
}

fn with_cookie_options(
    cookies: CookieOptions,
) -> impl Filter<Extract = (CookieOptions,), Error = Infallible> + Clone {
    warp::any().map(move || cookies)
}

fn bearer(header: Option<String>) -> Option<String> {
    header.and_then(|h| h.strip_prefix("Bearer ").map(str::to_string))
}

/// Two-step token lookup: same-origin cookie first, `Authorization: Bearer`
/// second; the request is unauthenticated only when both are missing.
fn with_presented_token(
    cookie_name: &'static str,
) -> impl Filter<Extract = (String,), Error = warp::Rejection> + Clone {
    warp::cookie::optional::<String>(cookie_name)
        .and(warp::header::optional::<String>("authorization"))
        .and_then(|cookie: Option<String>, header: Option<String>| async move {
            cookie
                .or_else(|| bearer(header))
                .ok_or_else(|| reject::custom(ApiErrorCode::Unauthorized))
        })
}

/// Gate for protected routes. Runs the full validation (signature, expiry,
/// store liveness) on every request and extracts the authenticated subject.
fn with_session(
    session_service: Arc<dyn SessionService>,
) -> impl Filter<Extract = (Subject,), Error = warp::Rejection> + Clone {
    with_presented_token(ACCESS_COOKIE).and_then(move |token: String| {
        let session_service = session_service.clone();
        async move {
            session_service
                .validate_access(&token)
                .await
                .map_err(ApiErrorCode::from)
                .map_err(reject::custom)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application_impl::{Argon2PasswordHasher, JwtHs256Codec, RealSessionService};
    use crate::domain_model::SessionClaims;
    use crate::infra_memory::{MemoryRevocationStore, MemoryUserRepo};
    use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
    use serde_json::{Value, json};
    use warp::Reply;
    use warp::http::StatusCode;
    use warp::http::header::SET_COOKIE;

    const ACCESS_SECRET: &[u8] = b"test-access-secret";
    const REFRESH_SECRET: &[u8] = b"test-refresh-secret";
    const EMAIL: &str = "a@b.com";
    const PASSWORD: &str = "hunter22";

    fn test_server() -> Arc<Server> {
        let codec = JwtHs256Codec::new(ACCESS_SECRET, REFRESH_SECRET).unwrap();
        let session_service = RealSessionService::new(
            Arc::new(MemoryUserRepo::new()),
            Arc::new(Argon2PasswordHasher),
            Arc::new(codec),
            Arc::new(MemoryRevocationStore::new()),
        );
        Arc::new(Server {
            session_service: Arc::new(session_service),
            cookie_secure: false,
        })
    }

    fn app(
        server: Arc<Server>,
    ) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
        routes(server).recover(recover_error)
    }

    fn cookie_header<T>(res: &warp::http::Response<T>, name: &str) -> Option<String> {
        res.headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|c| c.starts_with(&format!("{}=", name)))
            .map(str::to_string)
    }

    fn cookie_value<T>(res: &warp::http::Response<T>, name: &str) -> Option<String> {
        let header = cookie_header(res, name)?;
        let pair = header.split(';').next()?;
        Some(pair.split_once('=')?.1.to_string())
    }

    fn cookie_max_age<T>(res: &warp::http::Response<T>, name: &str) -> Option<i64> {
        let header = cookie_header(res, name)?;
        header
            .split(';')
            .find_map(|attr| attr.trim().strip_prefix("Max-Age="))
            .and_then(|v| v.parse().ok())
    }

    fn body_json<T: AsRef<[u8]>>(res: &warp::http::Response<T>) -> Value {
        serde_json::from_slice(res.body().as_ref()).unwrap()
    }

    async fn register_user(
        api: &(impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone + 'static),
    ) {
        let res = warp::test::request()
            .method("POST")
            .path("/register")
            .json(&json!({"email": EMAIL, "password": PASSWORD}))
            .reply(api)
            .await;
        assert_eq!(res.status(), StatusCode::CREATED);
    }

    async fn login_user(
        api: &(impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone + 'static),
    ) -> warp::http::Response<impl AsRef<[u8]>> {
        warp::test::request()
            .method("POST")
            .path("/login")
            .json(&json!({"email": EMAIL, "password": PASSWORD}))
            .reply(api)
            .await
    }

    #[tokio::test]
    async fn full_session_lifecycle() {
        let api = app(test_server());
        register_user(&api).await;

        // Login sets both cookies with a positive remaining lifetime.
        let res = login_user(&api).await;
        assert_eq!(res.status(), StatusCode::OK);
        let access = cookie_value(&res, ACCESS_COOKIE).unwrap();
        let refresh = cookie_value(&res, REFRESH_COOKIE).unwrap();
        assert!(!access.is_empty() && !refresh.is_empty());
        assert!(cookie_max_age(&res, ACCESS_COOKIE).unwrap() > 0);
        assert!(cookie_max_age(&res, REFRESH_COOKIE).unwrap() > 0);

        // The access cookie opens the protected route and binds the subject.
        let res = warp::test::request()
            .method("GET")
            .path("/me")
            .header("cookie", format!("{}={}", ACCESS_COOKIE, access))
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_json(&res)["data"]["subject"], EMAIL);

        // Logout clears both cookies...
        let res = warp::test::request()
            .method("POST")
            .path("/logout")
            .header(
                "cookie",
                format!("{}={}; {}={}", ACCESS_COOKIE, access, REFRESH_COOKIE, refresh),
            )
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(cookie_value(&res, ACCESS_COOKIE).unwrap(), "");
        assert_eq!(cookie_max_age(&res, ACCESS_COOKIE).unwrap(), 0);
        assert_eq!(cookie_max_age(&res, REFRESH_COOKIE).unwrap(), 0);

        // ...and the old access token is dead even though it is unexpired.
        let res = warp::test::request()
            .method("GET")
            .path("/me")
            .header("cookie", format!("{}={}", ACCESS_COOKIE, access))
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn bearer_header_is_the_fallback_transport() {
        let api = app(test_server());
        register_user(&api).await;
        let res = login_user(&api).await;
        let access = cookie_value(&res, ACCESS_COOKIE).unwrap();

        let res = warp::test::request()
            .method("GET")
            .path("/me")
            .header("authorization", format!("Bearer {}", access))
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn refresh_rotates_and_old_token_replays_as_unauthorized() {
        let api = app(test_server());
        register_user(&api).await;
        let res = login_user(&api).await;
        let old_refresh = cookie_value(&res, REFRESH_COOKIE).unwrap();

        let res = warp::test::request()
            .method("GET")
            .path("/token/refresh")
            .header("cookie", format!("{}={}", REFRESH_COOKIE, old_refresh))
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::CREATED);
        let new_access = cookie_value(&res, ACCESS_COOKIE).unwrap();
        let new_refresh = cookie_value(&res, REFRESH_COOKIE).unwrap();
        assert_ne!(new_refresh, old_refresh);

        // The rotated-in access token works.
        let res = warp::test::request()
            .method("GET")
            .path("/me")
            .header("cookie", format!("{}={}", ACCESS_COOKIE, new_access))
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::OK);

        // Replaying the consumed refresh token fails.
        let res = warp::test::request()
            .method("GET")
            .path("/token/refresh")
            .header("cookie", format!("{}={}", REFRESH_COOKIE, old_refresh))
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn forged_refresh_token_is_unauthorized() {
        let api = app(test_server());

        // Correct shape, foreign key; its jti was never registered either.
        let claims = SessionClaims {
            sub: EMAIL.to_string(),
            jti: uuid::Uuid::new_v4().to_string(),
            iat: chrono::Utc::now().timestamp(),
            exp: (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp(),
        };
        let forged = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"some-other-deployment"),
        )
        .unwrap();

        let res = warp::test::request()
            .method("GET")
            .path("/token/refresh")
            .header("cookie", format!("{}={}", REFRESH_COOKIE, forged))
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn login_failures_map_to_404_and_401() {
        let api = app(test_server());
        register_user(&api).await;

        let res = warp::test::request()
            .method("POST")
            .path("/login")
            .json(&json!({"email": "nobody@b.com", "password": PASSWORD}))
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);

        let res = warp::test::request()
            .method("POST")
            .path("/login")
            .json(&json!({"email": EMAIL, "password": "not-it"}))
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn duplicate_registration_conflicts() {
        let api = app(test_server());
        register_user(&api).await;

        let res = warp::test::request()
            .method("POST")
            .path("/register")
            .json(&json!({"email": EMAIL, "password": PASSWORD}))
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn protected_route_rejects_missing_and_garbage_tokens() {
        let api = app(test_server());

        let res = warp::test::request().method("GET").path("/me").reply(&api).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let res = warp::test::request()
            .method("GET")
            .path("/me")
            .header("cookie", format!("{}=not-a-jwt", ACCESS_COOKIE))
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        // A bare Authorization header without the Bearer scheme is "absent".
        let res = warp::test::request()
            .method("GET")
            .path("/me")
            .header("authorization", "Token abc")
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }
}
