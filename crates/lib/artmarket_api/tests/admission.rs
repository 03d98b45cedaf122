//! Rate limiting, authentication and authorization of requests.

mod common;

use std::sync::Arc;

use artmarket_core::denylist::MemoryDenylist;
use artmarket_core::ownership::OwnedResource;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use common::{DownDenylist, TestApp};
use serde_json::json;

fn login_from(ip: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/auth/login")
        .header("content-type", "application/json")
        .header("x-forwarded-for", ip)
        .body(Body::from(
            json!({ "email": "alice@x.com", "password": "Wr0ng!pass" }).to_string(),
        ))
        .unwrap()
}

// ---------------------------------------------------------------------------
// Rate limiting
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sixth_login_in_a_minute_is_throttled() {
    let app = TestApp::with(&[], Arc::new(MemoryDenylist::new()));

    for attempt in 0..5u32 {
        let resp = common::into_test_response(app.send(login_from("1.2.3.4")).await).await;
        assert_eq!(resp.status, StatusCode::UNAUTHORIZED, "attempt {attempt}");
        assert_eq!(
            resp.headers["x-rate-limit-remaining"],
            (4 - attempt).to_string().as_str()
        );
        assert!(resp.headers.contains_key("x-rate-limit-reset"));
    }

    let throttled = common::into_test_response(app.send(login_from("1.2.3.4")).await).await;
    assert_eq!(throttled.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(throttled.json["status"], 429);
    assert_eq!(throttled.json["error"], "Too Many Requests");
    assert_eq!(
        throttled.json["message"],
        "Too many requests. Please try again later."
    );
    assert!(throttled.json["retryAfter"].as_u64().unwrap() >= 50);
    assert_eq!(throttled.headers["x-rate-limit-remaining"], "0");
    assert!(throttled.headers.contains_key(header::RETRY_AFTER));

    // a different client still gets through to the credential check
    let other = common::into_test_response(app.send(login_from("5.6.7.8")).await).await;
    assert_eq!(other.status, StatusCode::UNAUTHORIZED);

    assert_eq!(app.state.metrics.snapshot().rate_limited, 1);
}

#[tokio::test]
async fn routes_outside_auth_carry_no_rate_headers() {
    let app = TestApp::new();
    let resp = app.get("/health", None).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json["status"], "UP");
    assert!(!resp.headers.contains_key("x-rate-limit-remaining"));
}

// ---------------------------------------------------------------------------
// Roles
// ---------------------------------------------------------------------------

#[tokio::test]
async fn customer_reaches_cart_but_not_admin_or_artist_routes() {
    let app = TestApp::new();
    let c1 = app.session("c1@x.com", "CUSTOMER").await;

    assert_eq!(app.get("/api/cart", Some(&c1.access)).await.status, StatusCode::OK);

    let admin = app
        .get("/api/dashboard/admin/overview", Some(&c1.access))
        .await;
    assert_eq!(admin.status, StatusCode::FORBIDDEN);
    assert_eq!(
        admin.json["message"],
        "You don't have permission to access this resource"
    );

    let mine = app.get("/api/artworks/my-artworks", Some(&c1.access)).await;
    assert_eq!(mine.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn anonymous_gets_401_never_403() {
    let app = TestApp::new();
    for path in [
        "/api/cart",
        "/api/dashboard/admin/overview",
        "/api/artworks/my-artworks",
        "/api/users/profile",
        "/api/admin/users",
    ] {
        let resp = app.get(path, None).await;
        assert_eq!(resp.status, StatusCode::UNAUTHORIZED, "{path}");
        assert_eq!(resp.json["message"], "Authentication required");
        assert_eq!(resp.json["path"], path);
    }
}

#[tokio::test]
async fn unmatched_routes_require_authentication() {
    let app = TestApp::new();
    let anonymous = app.get("/api/unknown/thing", None).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    let s = app.session("nina@x.com", "CUSTOMER").await;
    let signed_in = app.get("/api/unknown/thing", Some(&s.access)).await;
    assert_eq!(signed_in.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn public_routes_admit_anonymous_callers() {
    let app = TestApp::new();
    // no collaborator serves these here, so admission passes through to 404
    for path in [
        "/api/artworks",
        "/api/artists/7/profile",
        "/api/v1/artwork-query/search",
    ] {
        let resp = app.get(path, None).await;
        assert_eq!(resp.status, StatusCode::NOT_FOUND, "{path}");
    }
}

// ---------------------------------------------------------------------------
// Ownership
// ---------------------------------------------------------------------------

#[tokio::test]
async fn only_the_owning_artist_or_an_admin_may_update_an_artwork() {
    let app = TestApp::new();
    let a1 = app.session("a1@x.com", "ARTIST").await;
    let a2 = app.session("a2@x.com", "ARTIST").await;
    let admin = app.admin_session().await;
    app.owners
        .register(OwnedResource::Artwork, "A", &a1.subject);

    let body = json!({ "title": "Nocturne" });
    let by_other = app.put("/api/artworks/A", Some(&a2.access), body.clone()).await;
    assert_eq!(by_other.status, StatusCode::FORBIDDEN);

    let by_owner = app.put("/api/artworks/A", Some(&a1.access), body.clone()).await;
    assert_eq!(by_owner.status, StatusCode::OK);
    assert_eq!(by_owner.json["id"], "A");

    let by_admin = app.put("/api/artworks/A", Some(&admin.access), body).await;
    assert_eq!(by_admin.status, StatusCode::OK);

    assert_eq!(app.state.metrics.snapshot().denied_ownership, 1);
}

#[tokio::test]
async fn orders_are_visible_to_their_customer_only() {
    let app = TestApp::new();
    let c1 = app.session("o1@x.com", "CUSTOMER").await;
    let c2 = app.session("o2@x.com", "CUSTOMER").await;
    app.owners.register(OwnedResource::Order, "42", &c1.subject);

    assert_eq!(app.get("/api/orders/42", Some(&c1.access)).await.status, StatusCode::OK);
    assert_eq!(
        app.get("/api/orders/42", Some(&c2.access)).await.status,
        StatusCode::FORBIDDEN
    );
}

#[tokio::test]
async fn users_may_only_write_their_own_account() {
    let app = TestApp::new();
    let u1 = app.session("u1@x.com", "CUSTOMER").await;
    let u2 = app.session("u2@x.com", "CUSTOMER").await;

    let own = app
        .put(&format!("/api/users/{}", u1.subject), Some(&u1.access), json!({}))
        .await;
    assert_eq!(own.status, StatusCode::OK);

    let other = app
        .put(&format!("/api/users/{}", u1.subject), Some(&u2.access), json!({}))
        .await;
    assert_eq!(other.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn percent_encoded_ids_are_owner_checked_like_plain_ones() {
    let app = TestApp::new();
    let a1 = app.session("e1@x.com", "ARTIST").await;
    let a2 = app.session("e2@x.com", "ARTIST").await;
    let c1 = app.session("e3@x.com", "CUSTOMER").await;
    let c2 = app.session("e4@x.com", "CUSTOMER").await;
    app.owners.register(OwnedResource::Artwork, "AB", &a1.subject);
    app.owners.register(OwnedResource::Order, "42", &c1.subject);

    let body = json!({ "title": "Nocturne" });
    let by_other = app.put("/api/artworks/A%42", Some(&a2.access), body.clone()).await;
    assert_eq!(by_other.status, StatusCode::FORBIDDEN);
    let by_customer = app.put("/api/artworks/A%42", Some(&c1.access), body.clone()).await;
    assert_eq!(by_customer.status, StatusCode::FORBIDDEN);
    let by_owner = app.put("/api/artworks/A%42", Some(&a1.access), body).await;
    assert_eq!(by_owner.status, StatusCode::OK);
    assert_eq!(by_owner.json["id"], "AB");

    assert_eq!(
        app.get("/api/orders/4%32", Some(&c2.access)).await.status,
        StatusCode::FORBIDDEN
    );
    assert_eq!(app.get("/api/orders/4%32", Some(&c1.access)).await.status, StatusCode::OK);
}

#[tokio::test]
async fn ids_outside_the_grammar_are_rejected_on_owner_checked_routes() {
    let app = TestApp::new();
    let a2 = app.session("g2@x.com", "ARTIST").await;
    let c2 = app.session("g3@x.com", "CUSTOMER").await;

    for path in ["/api/artworks/a.b", "/api/artworks/a%2Fb", "/api/artworks/%FF"] {
        let resp = app.put(path, Some(&a2.access), json!({})).await;
        assert_eq!(resp.status, StatusCode::BAD_REQUEST, "{path}");
        assert_eq!(resp.json["validationErrors"]["path"], "Malformed request path");
    }
    assert_eq!(
        app.get("/api/orders/4.2", Some(&c2.access)).await.status,
        StatusCode::BAD_REQUEST
    );
    assert_eq!(app.state.metrics.snapshot().denied_ownership, 0);
}

// ---------------------------------------------------------------------------
// CORS
// ---------------------------------------------------------------------------

#[tokio::test]
async fn preflight_is_answered_before_admission() {
    let app = TestApp::new();
    let request = Request::builder()
        .method("OPTIONS")
        .uri("/api/cart")
        .header(header::ORIGIN, "http://localhost:3000")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "authorization")
        .body(Body::empty())
        .unwrap();
    let resp = app.send(request).await;

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost:3000"
    );
    assert_eq!(resp.headers()[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
}

// ---------------------------------------------------------------------------
// Denylist outage
// ---------------------------------------------------------------------------

#[tokio::test]
async fn denylist_outage_fails_open_and_is_counted() {
    let app = TestApp::with(&common::relaxed_env(), Arc::new(DownDenylist));
    let s = app.session("zed@x.com", "CUSTOMER").await;

    let profile = app.get("/api/users/profile", Some(&s.access)).await;
    assert_eq!(profile.status, StatusCode::OK);

    let logout = app
        .post(
            "/api/auth/logout",
            Some(&s.access),
            json!({ "refreshToken": s.refresh }),
        )
        .await;
    assert_eq!(logout.status, StatusCode::OK);

    let snapshot = app.state.metrics.snapshot();
    assert!(snapshot.denylist_unavailable >= 1);
    assert_eq!(snapshot.revocation_unavailable, 2);
}
