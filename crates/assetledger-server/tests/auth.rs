//! Re-registering an email must fail cleanly, and refresh-token rotation
//! must invalidate the token it replaced. Driven over HTTP so the cookie
//! jar does the real rotation dance exactly as a browser client would.

mod common;

use assetledger_server::config::RateLimitConfig;
use common::TestServer;
use serde_json::json;
use sqlx::PgPool;

#[sqlx::test]
async fn sixth_login_attempt_within_window_is_rate_limited(pool: PgPool) {
    let server = TestServer::spawn_with_rate_limit(
        pool,
        RateLimitConfig {
            auth_tier: 5,
            mutation_tier: 1_000,
            general_tier: 1_000,
        },
    )
    .await;

    server
        .client
        .post(server.url("/auth/register"))
        .json(&json!({ "email": "user@example.com", "password": "Correct-Horse-Battery9" }))
        .send()
        .await
        .unwrap();

    // One registration already consumed a slot in the shared auth-tier
    // budget (register and login share the same tier), so four more login
    // attempts are still within budget.
    for _ in 0..4 {
        let attempt = server
            .client
            .post(server.url("/auth/login"))
            .json(&json!({ "email": "user@example.com", "password": "wrong-password-1A!" }))
            .send()
            .await
            .unwrap();
        assert_eq!(attempt.status(), 401);
    }

    let sixth = server
        .client
        .post(server.url("/auth/login"))
        .json(&json!({ "email": "user@example.com", "password": "wrong-password-1A!" }))
        .send()
        .await
        .unwrap();
    assert_eq!(sixth.status(), 429, "the sixth request in the window must be rejected");
}

#[sqlx::test]
async fn duplicate_registration_is_rejected(pool: PgPool) {
    let server = TestServer::spawn(pool).await;

    let first = server
        .client
        .post(server.url("/auth/register"))
        .json(&json!({ "email": "dup@example.com", "password": "Correct-Horse-Battery9" }))
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), 200);

    let second = server
        .client
        .post(server.url("/auth/register"))
        .json(&json!({ "email": "dup@example.com", "password": "Correct-Horse-Battery9" }))
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), 409);
}

#[sqlx::test]
async fn wrong_password_is_unauthorized(pool: PgPool) {
    let server = TestServer::spawn(pool).await;

    server
        .client
        .post(server.url("/auth/register"))
        .json(&json!({ "email": "user@example.com", "password": "Correct-Horse-Battery9" }))
        .send()
        .await
        .unwrap();

    let login = server
        .client
        .post(server.url("/auth/login"))
        .json(&json!({ "email": "user@example.com", "password": "totally-wrong-password" }))
        .send()
        .await
        .unwrap();
    assert_eq!(login.status(), 401);
}

#[sqlx::test]
async fn refresh_rotates_and_revokes_the_old_refresh_token(pool: PgPool) {
    let server = TestServer::spawn(pool).await;

    // Drive this one with a plain (non-cookie-store) client so the exact
    // pre- and post-rotation cookie values can be captured and replayed by
    // hand, rather than letting reqwest's jar silently carry the rotated
    // value forward.
    let client = reqwest::Client::new();

    let register = client
        .post(server.url("/auth/register"))
        .json(&json!({ "email": "user@example.com", "password": "Correct-Horse-Battery9" }))
        .send()
        .await
        .unwrap();
    let original_cookie = extract_refresh_cookie(&register);

    let first_refresh = client
        .post(server.url("/auth/refresh"))
        .header(reqwest::header::COOKIE, &original_cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(first_refresh.status(), 200);
    let rotated_cookie = extract_refresh_cookie(&first_refresh);
    assert_ne!(original_cookie, rotated_cookie, "rotation must issue a new refresh token");

    // Replaying the pre-rotation cookie must now be rejected — it was
    // revoked the moment the rotated pair was issued.
    let replay = client
        .post(server.url("/auth/refresh"))
        .header(reqwest::header::COOKIE, &original_cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(replay.status(), 401, "a refresh token must not be usable twice");

    // The rotated cookie is still live.
    let second_refresh = client
        .post(server.url("/auth/refresh"))
        .header(reqwest::header::COOKIE, &rotated_cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(second_refresh.status(), 200);
}

fn extract_refresh_cookie(response: &reqwest::Response) -> String {
    let set_cookie = response
        .headers()
        .get(reqwest::header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .expect("response must set the refresh cookie");
    let (name_value, _attrs) = set_cookie.split_once(';').unwrap_or((set_cookie, ""));
    name_value.trim().to_owned()
}
