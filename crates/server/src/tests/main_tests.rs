use super::*;
use axum::{body, body::Body, http::Request, response::Response};
use serde_json::{json, Value};
use tower::ServiceExt;

async fn test_app() -> Router {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let store = LmsStore::open(Arc::new(storage.clone()), StoreOptions::default())
        .await
        .expect("store");
    let api = ApiContext {
        store,
        session: SessionConfig {
            secret: "s".to_string(),
            ttl_seconds: 60,
        },
    };
    build_router(Arc::new(AppState { api, storage }))
}

fn json_request(method: &str, uri: &str, token: Option<&str>, payload: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder
        .body(Body::from(payload.to_string()))
        .expect("request")
}

fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::get(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::empty()).expect("request")
}

async fn read_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

async fn login_token(app: &Router, email: &str, password: &str) -> String {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/login",
            None,
            json!({ "email": email, "password": password }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let dto: AuthResponse = serde_json::from_value(read_json(response).await).expect("auth");
    dto.token
}

#[tokio::test]
async fn healthz_reports_ok_when_storage_is_ready() {
    let app = test_app().await;
    let response = app
        .oneshot(get_request("/healthz", None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let body = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    assert_eq!(body.as_ref(), b"ok");
}

#[tokio::test]
async fn login_token_resolves_the_current_user() {
    let app = test_app().await;
    let token = login_token(&app, "ins@gmail.com", "ins@123").await;

    let response = app
        .oneshot(get_request("/auth/me", Some(&token)))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let me: UserProfile = serde_json::from_value(read_json(response).await).expect("profile");
    assert_eq!(me.email, "ins@gmail.com");
    assert_eq!(me.id, UserId(2));
}

#[tokio::test]
async fn protected_routes_require_a_bearer_token() {
    let app = test_app().await;
    let response = app
        .clone()
        .oneshot(get_request("/courses", None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(get_request("/courses", Some("not-a-token")))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let err: ApiError = serde_json::from_value(read_json(response).await).expect("error");
    assert_eq!(err.code, ErrorCode::Unauthorized);
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let app = test_app().await;
    let response = app
        .oneshot(json_request(
            "POST",
            "/auth/login",
            None,
            json!({ "email": "st@gmail.com", "password": "wrong" }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn students_cannot_create_courses() {
    let app = test_app().await;
    let token = login_token(&app, "st@gmail.com", "st@123").await;
    let response = app
        .oneshot(json_request(
            "POST",
            "/courses",
            Some(&token),
            json!({ "title": "Sneaky" }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn blank_course_title_is_a_bad_request() {
    let app = test_app().await;
    let token = login_token(&app, "ins@gmail.com", "ins@123").await;
    let response = app
        .oneshot(json_request(
            "POST",
            "/courses",
            Some(&token),
            json!({ "title": "   " }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let err: ApiError = serde_json::from_value(read_json(response).await).expect("error");
    assert_eq!(err.message, "Course title is required.");
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    let app = test_app().await;
    let response = app
        .oneshot(json_request(
            "POST",
            "/auth/register",
            None,
            json!({
                "name": "Second Kumar",
                "email": "st@gmail.com",
                "password": "Secret123",
                "confirm_password": "Secret123"
            }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn unknown_course_is_not_found() {
    let app = test_app().await;
    let token = login_token(&app, "st@gmail.com", "st@123").await;
    let response = app
        .oneshot(get_request("/courses/424242", Some(&token)))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn instructor_course_flow_over_http() {
    let app = test_app().await;
    let instructor = login_token(&app, "ins@gmail.com", "ins@123").await;
    let student = login_token(&app, "st@gmail.com", "st@123").await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/courses",
            Some(&instructor),
            json!({ "title": "Networks", "category": "Systems" }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CREATED);
    let course: Course = serde_json::from_value(read_json(response).await).expect("course");

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/courses/{}/enroll", course.id.0),
            Some(&student),
            json!({}),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["enrolled"], json!(true));

    let response = app
        .clone()
        .oneshot(get_request(
            &format!("/courses/{}/students", course.id.0),
            Some(&instructor),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let roster: Vec<UserProfile> =
        serde_json::from_value(read_json(response).await).expect("roster");
    assert_eq!(roster.len(), 1);

    let response = app
        .oneshot(
            Request::delete(format!("/courses/{}", course.id.0))
                .header("authorization", format!("Bearer {student}"))
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn platform_settings_are_public() {
    let app = test_app().await;
    let response = app
        .oneshot(get_request("/settings", None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let settings: PlatformSettings =
        serde_json::from_value(read_json(response).await).expect("settings");
    assert!(settings.certificates_enabled);
}

#[tokio::test]
async fn dashboard_views_are_scoped_to_the_caller() {
    let app = test_app().await;
    let admin = login_token(&app, "admin@gmail.com", "Admin@123").await;
    let student = login_token(&app, "st@gmail.com", "st@123").await;

    let response = app
        .clone()
        .oneshot(get_request("/dashboard/stats", Some(&student)))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["view"], json!("student"));
    let stats: DashboardStats = serde_json::from_value(body).expect("stats");
    assert!(matches!(stats, DashboardStats::Student(s) if s.average_score.is_none()));

    let response = app
        .clone()
        .oneshot(get_request("/dashboard/stats", Some(&admin)))
        .await
        .expect("response");
    let stats: DashboardStats = serde_json::from_value(read_json(response).await).expect("stats");
    match stats {
        DashboardStats::Staff(s) => assert!(s.platform.is_some()),
        other => panic!("unexpected stats: {other:?}"),
    }

    let response = app
        .clone()
        .oneshot(get_request("/deadlines", Some(&student)))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let deadlines: Vec<Deadline> =
        serde_json::from_value(read_json(response).await).expect("deadlines");
    assert!(deadlines.is_empty());

    let response = app
        .oneshot(get_request("/deadlines", None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
