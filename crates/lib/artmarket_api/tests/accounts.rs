//! Profile, password change and administrator moderation.

mod common;

use axum::http::StatusCode;
use common::{PASSWORD, TestApp};
use serde_json::json;

#[tokio::test]
async fn profile_can_be_read_and_renamed() {
    let app = TestApp::new();
    let s = app.session("pat@x.com", "CUSTOMER").await;

    let profile = app.get("/api/users/profile", Some(&s.access)).await;
    assert_eq!(profile.status, StatusCode::OK);
    assert_eq!(profile.json["data"]["firstName"], "Test");
    assert_eq!(profile.json["data"]["status"], "ACTIVE");
    assert_eq!(profile.json["data"]["isActive"], true);

    let renamed = app
        .put(
            "/api/users/profile",
            Some(&s.access),
            json!({ "firstName": "  Patricia " }),
        )
        .await;
    assert_eq!(renamed.status, StatusCode::OK);
    assert_eq!(renamed.json["data"]["firstName"], "Patricia");
    assert_eq!(renamed.json["data"]["lastName"], "User");

    let blank = app
        .put("/api/users/profile", Some(&s.access), json!({ "lastName": "" }))
        .await;
    assert_eq!(blank.status, StatusCode::BAD_REQUEST);
    assert_eq!(blank.json["validationErrors"]["lastName"], "Last name is required");
}

#[tokio::test]
async fn password_change_checks_the_current_password_and_policy() {
    let app = TestApp::new();
    let s = app.session("quinn@x.com", "CUSTOMER").await;

    let wrong_current = app
        .put(
            "/api/users/password",
            Some(&s.access),
            json!({ "currentPassword": "N0t-it!!", "newPassword": "N3w-P@ssword" }),
        )
        .await;
    assert_eq!(wrong_current.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_current.json["message"], "Invalid credentials");

    let weak = app
        .put(
            "/api/users/password",
            Some(&s.access),
            json!({ "currentPassword": PASSWORD, "newPassword": "short" }),
        )
        .await;
    assert_eq!(weak.status, StatusCode::BAD_REQUEST);
    assert!(
        weak.json["violations"]
            .as_array()
            .unwrap()
            .contains(&json!("Password must be at least 8 characters long"))
    );

    let changed = app
        .put(
            "/api/users/password",
            Some(&s.access),
            json!({ "currentPassword": PASSWORD, "newPassword": "N3w-P@ssword" }),
        )
        .await;
    assert_eq!(changed.status, StatusCode::OK);
    assert_eq!(changed.json["message"], "Password changed successfully");

    app.login("quinn@x.com", "N3w-P@ssword").await;
    let old = app
        .post(
            "/api/auth/login",
            None,
            json!({ "email": "quinn@x.com", "password": PASSWORD }),
        )
        .await;
    assert_eq!(old.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn suspended_users_are_locked_out_on_their_next_request() {
    let app = TestApp::new();
    let admin = app.admin_session().await;
    let s = app.session("rex@x.com", "CUSTOMER").await;

    let suspended = app
        .put(
            &format!("/api/admin/users/{}/status", s.subject),
            Some(&admin.access),
            json!({ "status": "SUSPENDED" }),
        )
        .await;
    assert_eq!(suspended.status, StatusCode::OK);
    assert_eq!(suspended.json["data"]["status"], "SUSPENDED");
    assert_eq!(suspended.json["data"]["isActive"], false);

    let next = app.get("/api/cart", Some(&s.access)).await;
    assert_eq!(next.status, StatusCode::UNAUTHORIZED);
    assert_eq!(next.json["message"], "User account is unavailable");

    let login = app
        .post(
            "/api/auth/login",
            None,
            json!({ "email": "rex@x.com", "password": PASSWORD }),
        )
        .await;
    assert_eq!(login.status, StatusCode::UNAUTHORIZED);

    let refresh = app
        .post("/api/auth/refresh", None, json!({ "refreshToken": s.refresh }))
        .await;
    assert_eq!(refresh.status, StatusCode::UNAUTHORIZED);

    // reinstated users get straight back in with the same token
    let reinstated = app
        .put(
            &format!("/api/admin/users/{}/status", s.subject),
            Some(&admin.access),
            json!({ "status": "ACTIVE" }),
        )
        .await;
    assert_eq!(reinstated.status, StatusCode::OK);
    assert_eq!(app.get("/api/cart", Some(&s.access)).await.status, StatusCode::OK);
}

#[tokio::test]
async fn role_changes_apply_from_the_next_login() {
    let app = TestApp::new();
    let admin = app.admin_session().await;
    let s = app.session("sam@x.com", "CUSTOMER").await;

    let promoted = app
        .put(
            &format!("/api/admin/users/{}/role", s.subject),
            Some(&admin.access),
            json!({ "role": "artist" }),
        )
        .await;
    assert_eq!(promoted.status, StatusCode::OK);
    assert_eq!(promoted.json["data"]["role"], "ARTIST");

    // the old token still carries CUSTOMER
    assert_eq!(app.get("/api/cart", Some(&s.access)).await.status, StatusCode::OK);
    assert_eq!(
        app.get("/api/artworks/my-artworks", Some(&s.access)).await.status,
        StatusCode::FORBIDDEN
    );

    let fresh = app.login("sam@x.com", PASSWORD).await;
    assert_eq!(
        app.get("/api/artworks/my-artworks", Some(&fresh.access)).await.status,
        StatusCode::OK
    );
}

#[tokio::test]
async fn admin_moderation_rejects_bad_input() {
    let app = TestApp::new();
    let admin = app.admin_session().await;

    let bad_status = app
        .put(
            "/api/admin/users/00000000-0000-0000-0000-000000000000/status",
            Some(&admin.access),
            json!({ "status": "BANNED" }),
        )
        .await;
    assert_eq!(bad_status.status, StatusCode::BAD_REQUEST);
    assert!(bad_status.json["validationErrors"]["status"].is_string());

    let missing = app
        .put(
            "/api/admin/users/00000000-0000-0000-0000-000000000000/role",
            Some(&admin.access),
            json!({ "role": "ARTIST" }),
        )
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(missing.json["message"], "User not found");
}

#[tokio::test]
async fn admin_lists_users_in_zero_based_pages() {
    let app = TestApp::new();
    let admin = app.admin_session().await;
    for email in ["p1@x.com", "p2@x.com", "p3@x.com"] {
        app.register(email, "CUSTOMER").await;
    }

    let first = app
        .get("/api/admin/users?page=0&size=2", Some(&admin.access))
        .await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.json["data"]["page"], 0);
    assert_eq!(first.json["data"]["size"], 2);
    assert_eq!(first.json["data"]["totalElements"], 4);
    assert_eq!(first.json["data"]["totalPages"], 2);
    assert_eq!(first.json["data"]["content"].as_array().unwrap().len(), 2);

    let last = app
        .get("/api/admin/users?page=1&size=2", Some(&admin.access))
        .await;
    assert_eq!(last.json["data"]["content"].as_array().unwrap().len(), 2);

    let too_big = app
        .get("/api/admin/users?size=500", Some(&admin.access))
        .await;
    assert_eq!(too_big.status, StatusCode::BAD_REQUEST);

    let customer = app.login("p1@x.com", PASSWORD).await;
    let denied = app.get("/api/admin/users", Some(&customer.access)).await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_list_filters_by_role_and_status() {
    let app = TestApp::new();
    let admin = app.admin_session().await;
    let artist = app.session("f1@x.com", "ARTIST").await;
    app.register("f2@x.com", "CUSTOMER").await;
    let suspended = app.session("f3@x.com", "CUSTOMER").await;
    app.put(
        &format!("/api/admin/users/{}/status", suspended.subject),
        Some(&admin.access),
        json!({ "status": "SUSPENDED" }),
    )
    .await;

    let artists = app
        .get("/api/admin/users?role=ARTIST", Some(&admin.access))
        .await;
    assert_eq!(artists.status, StatusCode::OK);
    assert_eq!(artists.json["data"]["totalElements"], 1);
    assert_eq!(artists.json["data"]["content"][0]["id"], artist.subject.as_str());

    let customers = app
        .get("/api/admin/users?role=customer&status=ACTIVE", Some(&admin.access))
        .await;
    assert_eq!(customers.json["data"]["totalElements"], 1);
    assert_eq!(customers.json["data"]["content"][0]["email"], "f2@x.com");

    let blocked = app
        .get("/api/admin/users?status=SUSPENDED", Some(&admin.access))
        .await;
    assert_eq!(blocked.json["data"]["totalElements"], 1);

    let everyone = app
        .get("/api/admin/users?role=&status=", Some(&admin.access))
        .await;
    assert_eq!(everyone.json["data"]["totalElements"], 4);

    let bad = app
        .get("/api/admin/users?role=CURATOR", Some(&admin.access))
        .await;
    assert_eq!(bad.status, StatusCode::BAD_REQUEST);
    assert!(bad.json["validationErrors"]["role"].is_string());
}

#[tokio::test]
async fn unparseable_paging_gets_the_error_envelope() {
    let app = TestApp::new();
    let admin = app.admin_session().await;

    let resp = app
        .get("/api/admin/users?page=-1", Some(&admin.access))
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.json["status"], 400);
    assert_eq!(resp.json["error"], "Validation Error");
    assert_eq!(resp.json["path"], "/api/admin/users");
    assert!(resp.json["validationErrors"]["query"].is_string());
}

#[tokio::test]
async fn access_metrics_are_admin_only() {
    let app = TestApp::new();
    let admin = app.admin_session().await;
    let s = app.session("tia@x.com", "CUSTOMER").await;

    assert_eq!(
        app.get("/api/admin/access-metrics", Some(&s.access)).await.status,
        StatusCode::FORBIDDEN
    );

    let resp = app.get("/api/admin/access-metrics", Some(&admin.access)).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json["data"]["deniedRole"], 1);
    assert_eq!(resp.json["data"]["rateLimited"], 0);
}
