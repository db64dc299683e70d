use chrono::{DateTime, Utc};

pub const ACCESS_COOKIE: &str = "access_token";
pub const REFRESH_COOKIE: &str = "refresh_token";

/// Session cookie: HttpOnly, SameSite=Lax, whole-site path, no explicit
/// domain. `Secure` is deployment-dependent (off for plain-http local runs).
pub fn session_cookie(name: &str, token: &str, expires_at: DateTime<Utc>, secure: bool) -> String {
    let max_age = (expires_at - Utc::now()).num_seconds().max(0);
    let secure_attr = if secure { " Secure;" } else { "" };
    format!("{name}={token}; SameSite=Lax;{secure_attr} HttpOnly; Path=/; Max-Age={max_age}")
}

/// Clearing always marks the cookie Secure, whatever the issuing flag was.
pub fn clear_cookie(name: &str) -> String {
    format!("{name}=; SameSite=Lax; Secure; HttpOnly; Path=/; Max-Age=0")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn session_cookie_carries_remaining_lifetime() {
        let cookie = session_cookie(
            ACCESS_COOKIE,
            "tok",
            Utc::now() + Duration::minutes(15),
            false,
        );
        assert!(cookie.starts_with("access_token=tok;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(!cookie.contains("Secure"));
        let max_age: i64 = cookie
            .split("Max-Age=")
            .nth(1)
            .unwrap()
            .parse()
            .unwrap();
        assert!((890..=900).contains(&max_age));
    }

    #[test]
    fn expired_token_clamps_to_zero() {
        let cookie = session_cookie(
            REFRESH_COOKIE,
            "tok",
            Utc::now() - Duration::seconds(30),
            true,
        );
        assert!(cookie.contains("Secure"));
        assert!(cookie.ends_with("Max-Age=0"));
    }

    #[test]
    fn clear_cookie_empties_value_immediately() {
        let cookie = clear_cookie(ACCESS_COOKIE);
        assert!(cookie.starts_with("access_token=;"));
        assert!(cookie.contains("Secure"));
        assert!(cookie.ends_with("Max-Age=0"));
    }
}
