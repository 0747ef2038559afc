use std::{net::SocketAddr, sync::Arc};

use axum::{
    async_trait,
    extract::{FromRequestParts, Path, Query, State, WebSocketUpgrade},
    http::{header, request::Parts, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{delete, get, patch, post, put},
    Json, Router,
};
use lms_core::{CourseCascade, LmsStore, StoreOptions};
use serde::Deserialize;
use shared::{
    domain::{
        Announcement, Assignment, AssignmentId, Certificate, ContentId, ContentItem, Course,
        CourseId, Message, MessageId, Notification, NotificationId, PlatformSettings, Quiz,
        QuizAttempt, QuizId, Rating, Submission, UserId,
    },
    error::{ApiError, ErrorCode},
    protocol::{
        AssignmentPatch, AuthResponse, AvatarChange, ComposeMessage, ContentPatch, CoursePatch,
        CourseQuery, DashboardStats, Deadline, GradeRequest, LoginRequest, NameChange, NewAnnouncement, NewAssignment,
        NewContent, NewCourse, NewUser, QuizAnswers, QuizDraft, RateCourse, RegisterRequest,
        SettingsPatch, SubmitAnswer, UserPatch, UserProfile,
    },
};
use storage::Storage;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{debug, error, info, warn};

mod api;
mod app_state;
mod config;
mod session;

use api::{ApiContext, EnrollResponse, MarkedResponse, RemovedResponse, UnreadResponse};
use app_state::AppState;
use config::{load_settings, prepare_database_url};
use session::SessionConfig;

/// Avatars travel as data URLs, so bodies can be sizeable.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

#[derive(Debug, Deserialize)]
struct EnrollQuery {
    user_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct WsQuery {
    token: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let settings = load_settings()?;
    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;
    let store = LmsStore::open(
        Arc::new(storage.clone()),
        StoreOptions {
            staff_code: settings.staff_code.clone(),
        },
    )
    .await?;
    let api = ApiContext {
        store,
        session: SessionConfig {
            secret: settings.session_secret,
            ttl_seconds: settings.session_ttl_seconds,
        },
    };

    let app = build_router(Arc::new(AppState { api, storage }));

    let addr: SocketAddr = settings.bind_addr.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/auth/login", post(http_login))
        .route("/auth/register", post(http_register))
        .route("/auth/me", get(http_me))
        .route("/users", get(http_list_users).post(http_create_user))
        .route("/users/:id", patch(http_update_user).delete(http_delete_user))
        .route("/users/:id/avatar", put(http_change_avatar))
        .route("/profile/name", put(http_change_name))
        .route("/profile/avatar", put(http_change_own_avatar))
        .route("/courses", get(http_list_courses).post(http_create_course))
        .route(
            "/courses/:id",
            get(http_get_course)
                .patch(http_update_course)
                .delete(http_delete_course),
        )
        .route("/courses/:id/enroll", post(http_enroll))
        .route("/courses/:id/students", get(http_course_students))
        .route("/courses/:id/ratings", post(http_rate_course))
        .route("/courses/:id/certificate", post(http_claim_certificate))
        .route("/categories", get(http_course_categories))
        .route("/certificates", get(http_list_certificates))
        .route(
            "/assignments",
            get(http_list_assignments).post(http_create_assignment),
        )
        .route(
            "/assignments/:id",
            patch(http_update_assignment).delete(http_delete_assignment),
        )
        .route(
            "/submissions",
            get(http_list_submissions).post(http_submit_assignment),
        )
        .route("/submissions/grade", post(http_grade_submission))
        .route(
            "/announcements",
            get(http_list_announcements).post(http_create_announcement),
        )
        .route("/content", get(http_list_content).post(http_create_content))
        .route(
            "/content/:id",
            patch(http_update_content).delete(http_delete_content),
        )
        .route("/quizzes", get(http_list_quizzes).post(http_create_quiz))
        .route("/quizzes/:id", put(http_update_quiz).delete(http_delete_quiz))
        .route(
            "/quizzes/:id/attempts",
            get(http_quiz_attempts).post(http_submit_quiz),
        )
        .route("/messages", post(http_send_message))
        .route("/messages/inbox", get(http_inbox))
        .route("/messages/sent", get(http_sent_messages))
        .route("/messages/unread", get(http_unread_messages))
        .route("/messages/:id", delete(http_delete_message))
        .route("/messages/:id/read", post(http_mark_message_read))
        .route("/notifications", get(http_list_notifications))
        .route("/notifications/read_all", post(http_mark_all_read))
        .route("/notifications/:id/read", post(http_mark_notification_read))
        .route(
            "/settings",
            get(http_platform_settings).patch(http_update_settings),
        )
        .route("/dashboard/stats", get(http_dashboard_stats))
        .route("/deadlines", get(http_upcoming_deadlines))
        .route("/ws", get(ws_handler))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorCode::Forbidden => StatusCode::FORBIDDEN,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Conflict => StatusCode::CONFLICT,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn reject(err: ApiError) -> (StatusCode, Json<ApiError>) {
    if err.code == ErrorCode::Internal {
        error!(message = %err.message, "request failed");
    }
    (status_for(err.code), Json(err))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// The signed-in user, reloaded from the store on every request.
struct AuthUser(UserProfile);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = (StatusCode, Json<ApiError>);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or_else(|| {
            reject(ApiError::new(
                ErrorCode::Unauthorized,
                "missing bearer token",
            ))
        })?;
        let user = api::authenticate(&state.api, token).await.map_err(reject)?;
        Ok(AuthUser(user))
    }
}

async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.storage.health_check().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(error) => {
            warn!(%error, "health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
        }
    }
}

async fn http_login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let auth = api::login(&state.api, &req).await.map_err(reject)?;
    Ok(Json(auth))
}

async fn http_register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    let auth = api::register(&state.api, &req).await.map_err(reject)?;
    Ok((StatusCode::CREATED, Json(auth)))
}

async fn http_me(AuthUser(user): AuthUser) -> Json<UserProfile> {
    Json(user)
}

async fn http_list_users(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<Vec<UserProfile>>> {
    let users = api::list_users(&state.api, &user).await.map_err(reject)?;
    Ok(Json(users))
}

async fn http_create_user(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(req): Json<NewUser>,
) -> ApiResult<(StatusCode, Json<UserProfile>)> {
    let created = api::create_user(&state.api, user.id, &req)
        .await
        .map_err(reject)?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn http_update_user(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<UserPatch>,
) -> ApiResult<Json<UserProfile>> {
    let updated = api::update_user(&state.api, user.id, UserId(id), &req)
        .await
        .map_err(reject)?;
    Ok(Json(updated))
}

async fn http_delete_user(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    api::delete_user(&state.api, user.id, UserId(id))
        .await
        .map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn http_change_name(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(req): Json<NameChange>,
) -> ApiResult<Json<UserProfile>> {
    let updated = api::change_name(&state.api, user.id, &req.name)
        .await
        .map_err(reject)?;
    Ok(Json(updated))
}

async fn http_change_avatar(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<AvatarChange>,
) -> ApiResult<Json<UserProfile>> {
    let updated = api::change_avatar(&state.api, user.id, UserId(id), req.avatar)
        .await
        .map_err(reject)?;
    Ok(Json(updated))
}

async fn http_change_own_avatar(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(req): Json<AvatarChange>,
) -> ApiResult<Json<UserProfile>> {
    let updated = api::change_avatar(&state.api, user.id, user.id, req.avatar)
        .await
        .map_err(reject)?;
    Ok(Json(updated))
}

async fn http_list_courses(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Query(query): Query<CourseQuery>,
) -> ApiResult<Json<Vec<Course>>> {
    let courses = api::list_courses(&state.api, user.id, &query)
        .await
        .map_err(reject)?;
    Ok(Json(courses))
}

async fn http_course_categories(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<Vec<String>>> {
    let categories = api::course_categories(&state.api, user.id)
        .await
        .map_err(reject)?;
    Ok(Json(categories))
}

async fn http_get_course(
    State(state): State<Arc<AppState>>,
    AuthUser(_user): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Course>> {
    let course = api::get_course(&state.api, CourseId(id))
        .await
        .map_err(reject)?;
    Ok(Json(course))
}

async fn http_create_course(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(req): Json<NewCourse>,
) -> ApiResult<(StatusCode, Json<Course>)> {
    let course = api::create_course(&state.api, user.id, &req)
        .await
        .map_err(reject)?;
    Ok((StatusCode::CREATED, Json(course)))
}

async fn http_update_course(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<CoursePatch>,
) -> ApiResult<Json<Course>> {
    let course = api::update_course(&state.api, user.id, CourseId(id), &req)
        .await
        .map_err(reject)?;
    Ok(Json(course))
}

async fn http_delete_course(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<CourseCascade>> {
    let report = api::delete_course(&state.api, user.id, CourseId(id))
        .await
        .map_err(reject)?;
    Ok(Json(report))
}

async fn http_enroll(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
    Query(q): Query<EnrollQuery>,
) -> ApiResult<Json<EnrollResponse>> {
    let response = api::enroll(&state.api, user.id, CourseId(id), q.user_id.map(UserId))
        .await
        .map_err(reject)?;
    Ok(Json(response))
}

async fn http_course_students(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<UserProfile>>> {
    let roster = api::course_students(&state.api, &user, CourseId(id))
        .await
        .map_err(reject)?;
    Ok(Json(roster))
}

async fn http_rate_course(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<RateCourse>,
) -> ApiResult<Json<Rating>> {
    let rating = api::rate_course(&state.api, user.id, CourseId(id), &req)
        .await
        .map_err(reject)?;
    Ok(Json(rating))
}

async fn http_claim_certificate(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Certificate>> {
    let certificate = api::claim_certificate(&state.api, user.id, CourseId(id))
        .await
        .map_err(reject)?;
    Ok(Json(certificate))
}

async fn http_list_certificates(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<Vec<Certificate>>> {
    let certificates = api::list_certificates(&state.api, user.id)
        .await
        .map_err(reject)?;
    Ok(Json(certificates))
}

async fn http_list_assignments(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<Vec<Assignment>>> {
    let assignments = api::list_assignments(&state.api, user.id)
        .await
        .map_err(reject)?;
    Ok(Json(assignments))
}

async fn http_create_assignment(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(req): Json<NewAssignment>,
) -> ApiResult<(StatusCode, Json<Assignment>)> {
    let assignment = api::create_assignment(&state.api, user.id, &req)
        .await
        .map_err(reject)?;
    Ok((StatusCode::CREATED, Json(assignment)))
}

async fn http_update_assignment(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<AssignmentPatch>,
) -> ApiResult<Json<Assignment>> {
    let assignment = api::update_assignment(&state.api, user.id, AssignmentId(id), &req)
        .await
        .map_err(reject)?;
    Ok(Json(assignment))
}

async fn http_delete_assignment(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<RemovedResponse>> {
    let removed = api::delete_assignment(&state.api, user.id, AssignmentId(id))
        .await
        .map_err(reject)?;
    Ok(Json(removed))
}

async fn http_list_submissions(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<Vec<Submission>>> {
    let submissions = api::list_submissions(&state.api, user.id)
        .await
        .map_err(reject)?;
    Ok(Json(submissions))
}

async fn http_submit_assignment(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(req): Json<SubmitAnswer>,
) -> ApiResult<(StatusCode, Json<Submission>)> {
    let submission = api::submit_assignment(&state.api, user.id, &req)
        .await
        .map_err(reject)?;
    Ok((StatusCode::CREATED, Json(submission)))
}

async fn http_grade_submission(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(req): Json<GradeRequest>,
) -> ApiResult<Json<Submission>> {
    let graded = api::grade_submission(&state.api, user.id, &req)
        .await
        .map_err(reject)?;
    Ok(Json(graded))
}

async fn http_list_announcements(
    State(state): State<Arc<AppState>>,
    AuthUser(_user): AuthUser,
) -> ApiResult<Json<Vec<Announcement>>> {
    let announcements = api::list_announcements(&state.api).await.map_err(reject)?;
    Ok(Json(announcements))
}

async fn http_create_announcement(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(req): Json<NewAnnouncement>,
) -> ApiResult<(StatusCode, Json<Announcement>)> {
    let announcement = api::create_announcement(&state.api, user.id, &req)
        .await
        .map_err(reject)?;
    Ok((StatusCode::CREATED, Json(announcement)))
}

async fn http_list_content(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<Vec<ContentItem>>> {
    let items = api::list_content(&state.api, user.id)
        .await
        .map_err(reject)?;
    Ok(Json(items))
}

async fn http_create_content(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(req): Json<NewContent>,
) -> ApiResult<(StatusCode, Json<ContentItem>)> {
    let item = api::create_content(&state.api, user.id, &req)
        .await
        .map_err(reject)?;
    Ok((StatusCode::CREATED, Json(item)))
}

async fn http_update_content(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<ContentPatch>,
) -> ApiResult<Json<ContentItem>> {
    let item = api::update_content(&state.api, user.id, ContentId(id), &req)
        .await
        .map_err(reject)?;
    Ok(Json(item))
}

async fn http_delete_content(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    api::delete_content(&state.api, user.id, ContentId(id))
        .await
        .map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn http_dashboard_stats(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<DashboardStats>> {
    let stats = api::dashboard_stats(&state.api, user.id)
        .await
        .map_err(reject)?;
    Ok(Json(stats))
}

async fn http_upcoming_deadlines(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<Vec<Deadline>>> {
    let deadlines = api::upcoming_deadlines(&state.api, user.id)
        .await
        .map_err(reject)?;
    Ok(Json(deadlines))
}

async fn http_list_quizzes(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<Vec<Quiz>>> {
    let quizzes = api::list_quizzes(&state.api, user.id)
        .await
        .map_err(reject)?;
    Ok(Json(quizzes))
}

async fn http_create_quiz(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(req): Json<QuizDraft>,
) -> ApiResult<(StatusCode, Json<Quiz>)> {
    let quiz = api::create_quiz(&state.api, user.id, &req)
        .await
        .map_err(reject)?;
    Ok((StatusCode::CREATED, Json(quiz)))
}

async fn http_update_quiz(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<QuizDraft>,
) -> ApiResult<Json<Quiz>> {
    let quiz = api::update_quiz(&state.api, user.id, QuizId(id), &req)
        .await
        .map_err(reject)?;
    Ok(Json(quiz))
}

async fn http_delete_quiz(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<RemovedResponse>> {
    let removed = api::delete_quiz(&state.api, user.id, QuizId(id))
        .await
        .map_err(reject)?;
    Ok(Json(removed))
}

async fn http_submit_quiz(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<QuizAnswers>,
) -> ApiResult<(StatusCode, Json<QuizAttempt>)> {
    let attempt = api::submit_quiz(&state.api, user.id, QuizId(id), &req.answers)
        .await
        .map_err(reject)?;
    Ok((StatusCode::CREATED, Json(attempt)))
}

async fn http_quiz_attempts(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<QuizAttempt>>> {
    let attempts = api::quiz_attempts(&state.api, user.id, QuizId(id))
        .await
        .map_err(reject)?;
    Ok(Json(attempts))
}

async fn http_send_message(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(req): Json<ComposeMessage>,
) -> ApiResult<(StatusCode, Json<Message>)> {
    let message = api::send_message(&state.api, user.id, &req)
        .await
        .map_err(reject)?;
    Ok((StatusCode::CREATED, Json(message)))
}

async fn http_inbox(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<Vec<Message>>> {
    let messages = api::inbox(&state.api, user.id).await.map_err(reject)?;
    Ok(Json(messages))
}

async fn http_sent_messages(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<Vec<Message>>> {
    let messages = api::sent_messages(&state.api, user.id)
        .await
        .map_err(reject)?;
    Ok(Json(messages))
}

async fn http_unread_messages(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<UnreadResponse>> {
    let unread = api::unread_messages(&state.api, user.id)
        .await
        .map_err(reject)?;
    Ok(Json(unread))
}

async fn http_mark_message_read(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    api::mark_message_read(&state.api, user.id, MessageId(id))
        .await
        .map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn http_delete_message(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    api::delete_message(&state.api, user.id, MessageId(id))
        .await
        .map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn http_list_notifications(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<Vec<Notification>>> {
    let notifications = api::list_notifications(&state.api, &user)
        .await
        .map_err(reject)?;
    Ok(Json(notifications))
}

async fn http_mark_notification_read(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    api::mark_notification_read(&state.api, user.id, NotificationId(id))
        .await
        .map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn http_mark_all_read(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<MarkedResponse>> {
    let marked = api::mark_all_notifications_read(&state.api, user.id)
        .await
        .map_err(reject)?;
    Ok(Json(marked))
}

async fn http_platform_settings(State(state): State<Arc<AppState>>) -> Json<PlatformSettings> {
    Json(api::platform_settings(&state.api).await)
}

async fn http_update_settings(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(req): Json<SettingsPatch>,
) -> ApiResult<Json<PlatformSettings>> {
    let settings = api::update_platform_settings(&state.api, user.id, &req)
        .await
        .map_err(reject)?;
    Ok(Json(settings))
}

/// Browsers cannot set headers on websocket upgrades, so the session token
/// rides in the query string.
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(q): Query<WsQuery>,
) -> ApiResult<impl IntoResponse> {
    let user = api::authenticate(&state.api, &q.token)
        .await
        .map_err(reject)?;
    Ok(ws.on_upgrade(move |socket| ws_connection(state, socket, user)))
}

async fn ws_connection(
    state: Arc<AppState>,
    socket: axum::extract::ws::WebSocket,
    user: UserProfile,
) {
    use axum::extract::ws::Message;
    use futures::{SinkExt, StreamExt};
    use tokio::sync::broadcast::error::RecvError;

    let (mut sender, mut receiver) = socket.split();
    let mut events_rx = state.api.store.subscribe();
    debug!(user_id = user.id.0, "websocket connected");

    let send_task = tokio::spawn(async move {
        loop {
            let event = match events_rx.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(user_id = user.id.0, skipped, "websocket subscriber lagged");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            if !api::event_visible_to(&event, &user) {
                continue;
            }
            let text = match serde_json::to_string(&event) {
                Ok(v) => v,
                Err(_) => continue,
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(_msg)) = receiver.next().await {}

    send_task.abort();
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
