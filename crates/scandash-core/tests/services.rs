mod common;

use common::{signed_in, valid_token};
use scandash_core::models::{NewUser, ScanKind, UserUpdate};
use scandash_core::{ApiError, AuthFailure, SessionKey, SessionStore};
use wiremock::matchers::{any, body_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_login_stores_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/auth/login"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains("username=ana%40example.com"))
        .and(body_string_contains("password=correct-horse"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "ACCESS",
            "refresh_token": "REFRESH",
            "token_type": "bearer",
            "user": { "user_id": "u-1", "username": "ana", "email": "ana@example.com", "role": "admin" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let api = signed_in(&server, None, None);
    let login = api.auth().login("ana@example.com", "correct-horse").await.unwrap();
    assert_eq!(login.user.user_id, "u-1");

    let session = api.session();
    assert_eq!(session.get(SessionKey::AccessToken).as_deref(), Some("ACCESS"));
    assert_eq!(session.get(SessionKey::RefreshToken).as_deref(), Some("REFRESH"));
    assert_eq!(session.get(SessionKey::Roles).as_deref(), Some(r#"["admin"]"#));

    let profile = api.auth().profile();
    assert_eq!(profile.email.as_deref(), Some("ana@example.com"));
    assert_eq!(profile.username.as_deref(), Some("ana"));
    assert!(api.auth().has_session());
}

#[tokio::test]
async fn test_login_failure_reports_detail() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/auth/login"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "detail": "Incorrect username or password"
        })))
        .mount(&server)
        .await;

    let api = signed_in(&server, None, None);
    let err = api.auth().login("ana@example.com", "wrong").await.unwrap_err();

    assert!(matches!(err, ApiError::BadRequest(ref m) if m == "Incorrect username or password"));
    assert!(!api.auth().has_session());
}

#[tokio::test]
async fn test_logout_revokes_then_clears() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/auth/logout"))
        .and(body_json(serde_json::json!({ "refresh_token": "REFRESH" })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let api = signed_in(&server, Some(&valid_token()), Some("REFRESH"));
    api.session().set(SessionKey::Email, "ana@example.com").unwrap();

    assert!(api.auth().logout().await.unwrap());
    for key in SessionKey::ALL {
        assert_eq!(api.session().get(key), None, "{} should be cleared", key);
    }
}

#[tokio::test]
async fn test_logout_clears_even_when_backend_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/auth/logout"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let api = signed_in(&server, Some(&valid_token()), Some("REFRESH"));
    assert!(!api.auth().logout().await.unwrap());
    assert_eq!(api.session().get(SessionKey::AccessToken), None);
}

#[tokio::test]
async fn test_logout_without_session_skips_backend() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let api = signed_in(&server, None, None);
    assert!(!api.auth().logout().await.unwrap());
}

#[tokio::test]
async fn test_list_users_with_roles() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/users/list-with-roles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            { "user_id": "u-1", "username": "ana", "email": "ana@example.com", "is_active": true, "roles": ["admin"] },
            { "user_id": "u-2", "username": "luis", "email": "luis@example.com", "is_active": false, "roles": [] }
        ])))
        .mount(&server)
        .await;

    let api = signed_in(&server, Some(&valid_token()), Some("REFRESH"));
    let users = api.users().list_with_roles().await.unwrap();

    assert_eq!(users.len(), 2);
    assert_eq!(users[0].roles, vec!["admin".to_string()]);
    assert!(!users[1].is_active);
}

#[tokio::test]
async fn test_create_user_validates_before_sending() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let api = signed_in(&server, Some(&valid_token()), Some("REFRESH"));
    let user = NewUser {
        username: "ana".into(),
        email: "ana@example.com".into(),
        password: String::new(),
        phone: String::new(),
    };
    let err = api.users().create(&user).await.unwrap_err();
    assert!(matches!(err, ApiError::InvalidRequest(ref m) if m == "password is required"));

    let err = api.users().update("u-1", &UserUpdate::default()).await.unwrap_err();
    assert!(matches!(err, ApiError::InvalidRequest(_)));

    let err = api.users().reset_password("u-1", "").await.unwrap_err();
    assert!(matches!(err, ApiError::InvalidRequest(_)));
}

#[tokio::test]
async fn test_create_and_update_user() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/users/"))
        .and(body_json(serde_json::json!({
            "username": "luis", "email": "luis@example.com", "password": "s3cret-pass", "phone": ""
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "user_id": "u-2", "username": "luis", "email": "luis@example.com", "is_active": true
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/v1/users/update/u-2"))
        .and(body_json(serde_json::json!({ "is_active": false })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "user_id": "u-2", "username": "luis", "email": "luis@example.com", "is_active": false,
            "created_at": "2025-05-01T10:00:00", "updated_at": "2025-05-02T09:00:00"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let api = signed_in(&server, Some(&valid_token()), Some("REFRESH"));
    let created = api
        .users()
        .create(&NewUser {
            username: "luis".into(),
            email: "luis@example.com".into(),
            password: "s3cret-pass".into(),
            phone: String::new(),
        })
        .await
        .unwrap();
    assert_eq!(created.user_id, "u-2");

    let update = UserUpdate {
        is_active: Some(false),
        ..UserUpdate::default()
    };
    let updated = api.users().update("u-2", &update).await.unwrap();
    assert!(!updated.is_active);
    assert_eq!(updated.updated_at.as_deref(), Some("2025-05-02T09:00:00"));
}

#[tokio::test]
async fn test_reset_password_and_delete() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/v1/users/reset-password/u-2"))
        .and(body_json(serde_json::json!({ "new_password": "n3w-pass" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "message": "Password updated" })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/v1/users/delete/u-2"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let api = signed_in(&server, Some(&valid_token()), Some("REFRESH"));
    assert_eq!(
        api.users().reset_password("u-2", "n3w-pass").await.unwrap(),
        "Password updated"
    );
    api.users().delete("u-2").await.unwrap();
}

#[tokio::test]
async fn test_forbidden_maps_to_access_denied() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/users/u-9"))
        .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({ "detail": "Admins only" })))
        .mount(&server)
        .await;

    let api = signed_in(&server, Some(&valid_token()), Some("REFRESH"));
    let err = api.users().get("u-9").await.unwrap_err();
    assert!(matches!(err, ApiError::AccessDenied(ref m) if m == "Admins only"));
}

#[tokio::test]
async fn test_roles_assign_and_remove() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/roles/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            { "role_id": "r-1", "role_name": "admin" },
            { "role_id": "r-2", "role_name": "auditor" }
        ])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/roles/assign"))
        .and(body_json(serde_json::json!({ "user_id": "u-1", "role_id": "r-2" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "user_id": "u-1", "role_id": "r-2" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/v1/roles/remove"))
        .and(header("content-type", "application/json"))
        .and(body_json(serde_json::json!({ "user_id": "u-1", "role_id": "r-2" })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let api = signed_in(&server, Some(&valid_token()), Some("REFRESH"));
    let role = api.roles().find_by_name("Auditor").await.unwrap().unwrap();
    assert_eq!(role.role_id, "r-2");

    let assignment = api.roles().assign("u-1", &role.role_id).await.unwrap();
    assert_eq!(assignment.role_id, "r-2");
    api.roles().remove("u-1", &role.role_id).await.unwrap();
}

#[tokio::test]
async fn test_scan_history_and_results() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/urlscan/detect-protocol"))
        .and(body_json(serde_json::json!({ "url": "https://shop.example.com" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "url_id": "s-1", "protocol": "https" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/urlscan/user-urls"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            { "url_id": "s-1", "url": "https://shop.example.com", "created_at": "2025-05-01T10:00:00" }
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/urlscan/dns-result/s-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "registros_a": ["203.0.113.10"] })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/v1/urlscan/user-urls/s-1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let api = signed_in(&server, Some(&valid_token()), Some("REFRESH"));
    let submitted = api.scans().detect_protocol("  https://shop.example.com ").await.unwrap();
    assert_eq!(submitted["url_id"], "s-1");

    let history = api.scans().history().await.unwrap();
    assert_eq!(history[0].url, "https://shop.example.com");

    let dns = api.scans().result(ScanKind::Dns, "s-1").await.unwrap();
    assert_eq!(dns["registros_a"][0], "203.0.113.10");

    api.scans().delete("s-1").await.unwrap();

    let err = api.scans().detect_protocol("   ").await.unwrap_err();
    assert!(matches!(err, ApiError::InvalidRequest(_)));
}

#[tokio::test]
async fn test_missing_result_maps_to_not_found() {
    let server = MockServer::start().await;
    let api = signed_in(&server, Some(&valid_token()), Some("REFRESH"));

    let err = api.scans().result(ScanKind::Vuln, "nope").await.unwrap_err();
    match err {
        ApiError::NotFound(message) => assert_eq!(
            message,
            format!("Endpoint not found: {}/v1/urlscan/vuln-result/nope", server.uri())
        ),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_services_surface_authentication_failure() {
    let server = MockServer::start().await;
    let api = signed_in(&server, None, None);

    let err = api.scans().history().await.unwrap_err();
    assert!(matches!(
        err,
        ApiError::NotAuthenticated(AuthFailure::MissingRefreshToken)
    ));
    assert!(err.requires_login());
}

#[tokio::test]
async fn test_report_from_consolidated_info() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/urlscan/consolidated-url-info/s-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": {
                "url_info": { "url": "https://shop.example.com" },
                "summary_recommendations": { "Resumen": "Good overall.", "Puntuacion": 91, "Clasificacion": "A" }
            }
        })))
        .mount(&server)
        .await;

    let api = signed_in(&server, Some(&valid_token()), Some("REFRESH"));
    api.session().set(SessionKey::Username, "ana").unwrap();

    let report = api.scans().report("s-1").await.unwrap();
    assert_eq!(report.user, "ana");
    assert_eq!(report.url, "https://shop.example.com");
    assert_eq!(report.score_display(), "91");

    let text = report.to_text(1000);
    assert!(text.contains("Overall score:             91 (excellent)"));
    assert!(text.ends_with("Page 1 of 1"));
}
