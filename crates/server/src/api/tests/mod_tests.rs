use std::sync::Arc;

use super::*;
use lms_core::StoreOptions;
use shared::domain::UserStatus;
use storage::Storage;

const ADMIN: UserId = UserId(1);
const INSTRUCTOR: UserId = UserId(2);
const CREATOR: UserId = UserId(3);
const STUDENT: UserId = UserId(4);

async fn setup() -> ApiContext {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let store = LmsStore::open(Arc::new(storage), StoreOptions::default())
        .await
        .expect("store");
    ApiContext {
        store,
        session: SessionConfig {
            secret: "s".into(),
            ttl_seconds: 60,
        },
    }
}

fn login_req(email: &str, password: &str) -> LoginRequest {
    LoginRequest {
        email: email.into(),
        password: password.into(),
    }
}

#[tokio::test]
async fn login_issues_token_that_authenticates() {
    let ctx = setup().await;
    let auth = login(&ctx, &login_req("st@gmail.com", "st@123"))
        .await
        .expect("login");
    assert_eq!(auth.user.id, STUDENT);

    let profile = authenticate(&ctx, &auth.token).await.expect("authenticate");
    assert_eq!(profile.email, "st@gmail.com");
    assert_eq!(profile.role, Role::Student);
}

#[tokio::test]
async fn login_failures_are_unauthorized_with_specific_messages() {
    let ctx = setup().await;
    let err = login(&ctx, &login_req("ghost@gmail.com", "x"))
        .await
        .expect_err("should fail");
    assert!(matches!(err.code, ErrorCode::Unauthorized));
    assert_eq!(err.message, "No account found with that email address.");

    let err = login(&ctx, &login_req("st@gmail.com", "nope"))
        .await
        .expect_err("should fail");
    assert_eq!(err.message, "Incorrect password. Please try again.");
}

#[tokio::test]
async fn deactivated_accounts_lose_their_sessions() {
    let ctx = setup().await;
    let auth = login(&ctx, &login_req("ins@gmail.com", "ins@123"))
        .await
        .expect("login");
    update_user(
        &ctx,
        ADMIN,
        INSTRUCTOR,
        &UserPatch {
            status: Some(UserStatus::Inactive),
            ..UserPatch::default()
        },
    )
    .await
    .expect("deactivate");

    let err = authenticate(&ctx, &auth.token)
        .await
        .expect_err("should fail");
    assert!(matches!(err.code, ErrorCode::Unauthorized));
}

#[tokio::test]
async fn deleted_accounts_lose_their_sessions() {
    let ctx = setup().await;
    let auth = login(&ctx, &login_req("cc@gmail.com", "cc@123"))
        .await
        .expect("login");
    delete_user(&ctx, ADMIN, UserId(3)).await.expect("delete");

    let err = authenticate(&ctx, &auth.token)
        .await
        .expect_err("should fail");
    assert_eq!(err.message, "account no longer exists");
}

#[tokio::test]
async fn register_rejects_duplicates_as_conflict() {
    let ctx = setup().await;
    let req = RegisterRequest {
        name: "Copy Cat".into(),
        email: "St@Gmail.com".into(),
        password: "Secret123".into(),
        confirm_password: "Secret123".into(),
        role: None,
        staff_code: None,
    };
    let err = register(&ctx, &req).await.expect_err("should fail");
    assert!(matches!(err.code, ErrorCode::Conflict));
}

#[tokio::test]
async fn only_admins_list_users() {
    let ctx = setup().await;
    let student = authenticate(
        &ctx,
        &login(&ctx, &login_req("st@gmail.com", "st@123"))
            .await
            .expect("login")
            .token,
    )
    .await
    .expect("profile");
    let err = list_users(&ctx, &student).await.expect_err("should fail");
    assert!(matches!(err.code, ErrorCode::Forbidden));

    let admin = ctx
        .store
        .read(|s| s.user(ADMIN).map(UserProfile::from))
        .await
        .expect("admin");
    assert_eq!(list_users(&ctx, &admin).await.expect("users").len(), 4);
}

#[tokio::test]
async fn enroll_defaults_to_actor_and_is_idempotent() {
    let ctx = setup().await;
    let course = create_course(
        &ctx,
        INSTRUCTOR,
        &NewCourse {
            title: "Algebra".into(),
            ..NewCourse::default()
        },
    )
    .await
    .expect("course");

    assert!(enroll(&ctx, STUDENT, course.id, None).await.expect("enroll").enrolled);
    assert!(!enroll(&ctx, STUDENT, course.id, None).await.expect("again").enrolled);

    let instructor = ctx
        .store
        .read(|s| s.user(INSTRUCTOR).map(UserProfile::from))
        .await
        .expect("instructor");
    let roster = course_students(&ctx, &instructor, course.id)
        .await
        .expect("roster");
    assert_eq!(roster.len(), 1);
    assert_eq!(roster[0].id, STUDENT);

    let err = course_students(&ctx, &instructor, CourseId(12345))
        .await
        .expect_err("missing course");
    assert!(matches!(err.code, ErrorCode::NotFound));
}

#[tokio::test]
async fn events_are_filtered_per_user() {
    let ctx = setup().await;
    let profile = |id: UserId| {
        let store = ctx.store.clone();
        async move {
            store
                .read(|s| s.user(id).map(UserProfile::from))
                .await
                .expect("profile")
        }
    };
    let admin = profile(ADMIN).await;
    let student = profile(STUDENT).await;
    let mut rx = ctx.store.subscribe();

    create_course(
        &ctx,
        INSTRUCTOR,
        &NewCourse {
            title: "Geometry".into(),
            ..NewCourse::default()
        },
    )
    .await
    .expect("course");
    let event = rx.recv().await.expect("event");
    assert!(event_visible_to(&event, &admin));
    assert!(!event_visible_to(&event, &student));

    let graded_elsewhere = ServerEvent::SubmissionGraded {
        submission_id: shared::domain::SubmissionId(1),
        student_id: UserId(99),
        course_owner: INSTRUCTOR,
        score: 10,
    };
    assert!(!event_visible_to(&graded_elsewhere, &student));
    assert!(event_visible_to(&graded_elsewhere, &admin));
    assert!(event_visible_to(&graded_elsewhere, &profile(INSTRUCTOR).await));
    assert!(!event_visible_to(&graded_elsewhere, &profile(CREATOR).await));
}
