use lms_core::{CourseCascade, LmsError, LmsStore};
use serde::{Deserialize, Serialize};
use shared::{
    domain::{
        Announcement, Assignment, AssignmentId, Certificate, ContentId, ContentItem, Course,
        CourseId, Message, MessageId, Notification, NotificationId, PlatformSettings, Quiz,
        QuizAttempt, QuizId, Rating, Role, Submission, UserId,
    },
    error::{ApiError, ErrorCode},
    protocol::{
        AssignmentPatch, AuthResponse, ComposeMessage, ContentPatch, CoursePatch, CourseQuery,
        DashboardStats, Deadline, GradeRequest, LoginRequest, NewAnnouncement, NewAssignment, NewContent, NewCourse,
        NewUser, QuizDraft, RateCourse, RegisterRequest, ServerEvent, SettingsPatch, SubmitAnswer,
        UserPatch, UserProfile,
    },
};
use tracing::{info, warn};

use crate::session::{mint_token, verify_token, SessionConfig};

#[derive(Clone)]
pub struct ApiContext {
    pub store: LmsStore,
    pub session: SessionConfig,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct EnrollResponse {
    pub enrolled: bool,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct UnreadResponse {
    pub unread: usize,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct MarkedResponse {
    pub marked: usize,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RemovedResponse {
    pub removed: usize,
}

fn owned<T: Clone>(items: Vec<&T>) -> Vec<T> {
    items.into_iter().cloned().collect()
}

fn unauthorized(message: &str) -> ApiError {
    ApiError::new(ErrorCode::Unauthorized, message)
}

fn issue_session(ctx: &ApiContext, profile: UserProfile) -> Result<AuthResponse, ApiError> {
    let token = mint_token(&ctx.session, profile.id, profile.role)
        .map_err(|e| ApiError::new(ErrorCode::Internal, format!("token mint failed: {e}")))?;
    Ok(AuthResponse {
        token,
        user: profile,
    })
}

pub async fn login(ctx: &ApiContext, req: &LoginRequest) -> Result<AuthResponse, ApiError> {
    let result = ctx
        .store
        .read(|s| s.login(&req.email, &req.password).map(|u| UserProfile::from(&u)))
        .await;
    match result {
        Ok(profile) => {
            info!(user_id = profile.id.0, role = %profile.role, "login succeeded");
            issue_session(ctx, profile)
        }
        Err(err) => {
            warn!(email = %req.email.trim(), error = %err, "login rejected");
            Err(err.into())
        }
    }
}

pub async fn register(ctx: &ApiContext, req: &RegisterRequest) -> Result<AuthResponse, ApiError> {
    let staff_code = ctx.store.staff_code().to_string();
    let user = ctx.store.write(|s| s.register(req, &staff_code)).await?;
    issue_session(ctx, UserProfile::from(&user))
}

/// Resolves a bearer token to the current account; deleted or deactivated
/// accounts lose their sessions immediately.
pub async fn authenticate(ctx: &ApiContext, token: &str) -> Result<UserProfile, ApiError> {
    let user_id =
        verify_token(&ctx.session, token).ok_or_else(|| unauthorized("invalid or expired session"))?;
    let user = ctx
        .store
        .read(|s| s.user(user_id).cloned())
        .await
        .ok_or_else(|| unauthorized("account no longer exists"))?;
    if !user.is_active() {
        return Err(LmsError::AccountInactive.into());
    }
    Ok(UserProfile::from(&user))
}

pub async fn list_users(ctx: &ApiContext, actor: &UserProfile) -> Result<Vec<UserProfile>, ApiError> {
    if actor.role != Role::Admin {
        return Err(LmsError::forbidden("Only admins can manage users.").into());
    }
    Ok(ctx.store.read(|s| s.user_profiles()).await)
}

pub async fn create_user(ctx: &ApiContext, actor: UserId, input: &NewUser) -> Result<UserProfile, ApiError> {
    let user = ctx.store.write(|s| s.add_user(actor, input)).await?;
    info!(user_id = user.id.0, role = %user.role, "admin created account");
    Ok(UserProfile::from(&user))
}

pub async fn update_user(
    ctx: &ApiContext,
    actor: UserId,
    id: UserId,
    patch: &UserPatch,
) -> Result<UserProfile, ApiError> {
    let user = ctx.store.write(|s| s.update_user(actor, id, patch)).await?;
    Ok(UserProfile::from(&user))
}

pub async fn delete_user(ctx: &ApiContext, actor: UserId, id: UserId) -> Result<(), ApiError> {
    ctx.store.write(|s| s.delete_user(actor, id)).await?;
    info!(user_id = id.0, "deleted account");
    Ok(())
}

pub async fn change_name(ctx: &ApiContext, actor: UserId, name: &str) -> Result<UserProfile, ApiError> {
    let user = ctx.store.write(|s| s.update_profile_name(actor, name)).await?;
    Ok(UserProfile::from(&user))
}

pub async fn change_avatar(
    ctx: &ApiContext,
    actor: UserId,
    id: UserId,
    avatar: Option<String>,
) -> Result<UserProfile, ApiError> {
    let user = ctx
        .store
        .write(|s| s.update_user_avatar(actor, id, avatar))
        .await?;
    Ok(UserProfile::from(&user))
}

pub async fn list_courses(ctx: &ApiContext, actor: UserId, query: &CourseQuery) -> Result<Vec<Course>, ApiError> {
    Ok(ctx
        .store
        .read(|s| s.visible_courses(actor, query).map(owned))
        .await?)
}

pub async fn course_categories(ctx: &ApiContext, actor: UserId) -> Result<Vec<String>, ApiError> {
    Ok(ctx.store.read(|s| s.course_categories(actor)).await?)
}

pub async fn get_course(ctx: &ApiContext, id: CourseId) -> Result<Course, ApiError> {
    Ok(ctx
        .store
        .read(|s| s.course(id).cloned())
        .await
        .ok_or_else(|| LmsError::not_found("course", id.0))?)
}

pub async fn create_course(ctx: &ApiContext, actor: UserId, input: &NewCourse) -> Result<Course, ApiError> {
    Ok(ctx.store.write(|s| s.add_course(actor, input)).await?)
}

pub async fn update_course(
    ctx: &ApiContext,
    actor: UserId,
    id: CourseId,
    patch: &CoursePatch,
) -> Result<Course, ApiError> {
    Ok(ctx.store.write(|s| s.update_course(actor, id, patch)).await?)
}

pub async fn delete_course(ctx: &ApiContext, actor: UserId, id: CourseId) -> Result<CourseCascade, ApiError> {
    Ok(ctx.store.write(|s| s.delete_course(actor, id)).await?)
}

/// Enrolls `user` (defaulting to the actor) in the course.
pub async fn enroll(
    ctx: &ApiContext,
    actor: UserId,
    course: CourseId,
    user: Option<UserId>,
) -> Result<EnrollResponse, ApiError> {
    let target = user.unwrap_or(actor);
    let enrolled = ctx
        .store
        .write(|s| s.enroll_student(actor, target, course))
        .await?;
    Ok(EnrollResponse { enrolled })
}

/// Roster of a course, for staff.
pub async fn course_students(
    ctx: &ApiContext,
    actor: &UserProfile,
    course: CourseId,
) -> Result<Vec<UserProfile>, ApiError> {
    if !actor.role.is_staff() {
        return Err(LmsError::forbidden("Only staff can view course rosters.").into());
    }
    let roster = ctx
        .store
        .read(|s| {
            s.course(course).map(|_| {
                s.enrolled_students(course)
                    .iter()
                    .filter_map(|id| s.user(*id))
                    .map(UserProfile::from)
                    .collect::<Vec<_>>()
            })
        })
        .await;
    Ok(roster.ok_or_else(|| LmsError::not_found("course", course.0))?)
}

pub async fn rate_course(
    ctx: &ApiContext,
    actor: UserId,
    course: CourseId,
    input: &RateCourse,
) -> Result<Rating, ApiError> {
    Ok(ctx.store.write(|s| s.rate_course(actor, course, input)).await?)
}

pub async fn claim_certificate(ctx: &ApiContext, actor: UserId, course: CourseId) -> Result<Certificate, ApiError> {
    Ok(ctx.store.write(|s| s.issue_certificate(actor, course)).await?)
}

pub async fn list_certificates(ctx: &ApiContext, actor: UserId) -> Result<Vec<Certificate>, ApiError> {
    Ok(ctx.store.read(|s| owned(s.certificates_for(actor))).await)
}

pub async fn list_assignments(ctx: &ApiContext, actor: UserId) -> Result<Vec<Assignment>, ApiError> {
    Ok(ctx
        .store
        .read(|s| s.visible_assignments(actor).map(owned))
        .await?)
}

pub async fn create_assignment(
    ctx: &ApiContext,
    actor: UserId,
    input: &NewAssignment,
) -> Result<Assignment, ApiError> {
    Ok(ctx.store.write(|s| s.add_assignment(actor, input)).await?)
}

pub async fn update_assignment(
    ctx: &ApiContext,
    actor: UserId,
    id: AssignmentId,
    patch: &AssignmentPatch,
) -> Result<Assignment, ApiError> {
    Ok(ctx
        .store
        .write(|s| s.update_assignment(actor, id, patch))
        .await?)
}

pub async fn delete_assignment(
    ctx: &ApiContext,
    actor: UserId,
    id: AssignmentId,
) -> Result<RemovedResponse, ApiError> {
    let removed = ctx.store.write(|s| s.delete_assignment(actor, id)).await?;
    Ok(RemovedResponse { removed })
}

pub async fn list_submissions(ctx: &ApiContext, actor: UserId) -> Result<Vec<Submission>, ApiError> {
    Ok(ctx
        .store
        .read(|s| s.visible_submissions(actor).map(owned))
        .await?)
}

pub async fn submit_assignment(
    ctx: &ApiContext,
    actor: UserId,
    input: &SubmitAnswer,
) -> Result<Submission, ApiError> {
    Ok(ctx
        .store
        .write(|s| s.submit_assignment(actor, input.assignment_id, &input.answer))
        .await?)
}

pub async fn grade_submission(ctx: &ApiContext, actor: UserId, input: &GradeRequest) -> Result<Submission, ApiError> {
    Ok(ctx
        .store
        .write(|s| s.grade_submission(actor, input.submission_id, input.score, &input.feedback))
        .await?)
}

pub async fn list_announcements(ctx: &ApiContext) -> Result<Vec<Announcement>, ApiError> {
    Ok(ctx.store.read(|s| s.announcements().to_vec()).await)
}

pub async fn create_announcement(
    ctx: &ApiContext,
    actor: UserId,
    input: &NewAnnouncement,
) -> Result<Announcement, ApiError> {
    Ok(ctx.store.write(|s| s.add_announcement(actor, input)).await?)
}

pub async fn list_content(ctx: &ApiContext, actor: UserId) -> Result<Vec<ContentItem>, ApiError> {
    Ok(ctx
        .store
        .read(|s| s.visible_content(actor).map(owned))
        .await?)
}

pub async fn create_content(ctx: &ApiContext, actor: UserId, input: &NewContent) -> Result<ContentItem, ApiError> {
    Ok(ctx.store.write(|s| s.add_content(actor, input)).await?)
}

pub async fn update_content(
    ctx: &ApiContext,
    actor: UserId,
    id: ContentId,
    patch: &ContentPatch,
) -> Result<ContentItem, ApiError> {
    Ok(ctx.store.write(|s| s.update_content(actor, id, patch)).await?)
}

pub async fn delete_content(ctx: &ApiContext, actor: UserId, id: ContentId) -> Result<(), ApiError> {
    Ok(ctx.store.write(|s| s.delete_content(actor, id)).await?)
}

pub async fn list_quizzes(ctx: &ApiContext, actor: UserId) -> Result<Vec<Quiz>, ApiError> {
    Ok(ctx
        .store
        .read(|s| s.visible_quizzes(actor).map(owned))
        .await?)
}

pub async fn create_quiz(ctx: &ApiContext, actor: UserId, draft: &QuizDraft) -> Result<Quiz, ApiError> {
    Ok(ctx.store.write(|s| s.add_quiz(actor, draft)).await?)
}

pub async fn update_quiz(ctx: &ApiContext, actor: UserId, id: QuizId, draft: &QuizDraft) -> Result<Quiz, ApiError> {
    Ok(ctx.store.write(|s| s.update_quiz(actor, id, draft)).await?)
}

pub async fn delete_quiz(ctx: &ApiContext, actor: UserId, id: QuizId) -> Result<RemovedResponse, ApiError> {
    let removed = ctx.store.write(|s| s.delete_quiz(actor, id)).await?;
    Ok(RemovedResponse { removed })
}

pub async fn submit_quiz(
    ctx: &ApiContext,
    actor: UserId,
    id: QuizId,
    answers: &[Option<usize>],
) -> Result<QuizAttempt, ApiError> {
    Ok(ctx
        .store
        .write(|s| s.submit_quiz_attempt(actor, id, answers))
        .await?)
}

pub async fn quiz_attempts(ctx: &ApiContext, actor: UserId, id: QuizId) -> Result<Vec<QuizAttempt>, ApiError> {
    Ok(ctx
        .store
        .read(|s| s.attempts_for_quiz(actor, id).map(owned))
        .await?)
}

pub async fn inbox(ctx: &ApiContext, actor: UserId) -> Result<Vec<Message>, ApiError> {
    Ok(ctx.store.read(|s| owned(s.inbox(actor))).await)
}

pub async fn sent_messages(ctx: &ApiContext, actor: UserId) -> Result<Vec<Message>, ApiError> {
    Ok(ctx.store.read(|s| owned(s.sent(actor))).await)
}

pub async fn unread_messages(ctx: &ApiContext, actor: UserId) -> Result<UnreadResponse, ApiError> {
    let unread = ctx.store.read(|s| s.unread_count(actor)).await;
    Ok(UnreadResponse { unread })
}

pub async fn send_message(ctx: &ApiContext, actor: UserId, input: &ComposeMessage) -> Result<Message, ApiError> {
    Ok(ctx.store.write(|s| s.send_message(actor, input)).await?)
}

pub async fn mark_message_read(ctx: &ApiContext, actor: UserId, id: MessageId) -> Result<(), ApiError> {
    Ok(ctx.store.write(|s| s.mark_message_read(actor, id)).await?)
}

pub async fn delete_message(ctx: &ApiContext, actor: UserId, id: MessageId) -> Result<(), ApiError> {
    Ok(ctx.store.write(|s| s.delete_message(actor, id)).await?)
}

pub async fn list_notifications(ctx: &ApiContext, actor: &UserProfile) -> Result<Vec<Notification>, ApiError> {
    Ok(ctx
        .store
        .read(|s| owned(s.notifications_for(actor.role)))
        .await)
}

pub async fn mark_notification_read(ctx: &ApiContext, actor: UserId, id: NotificationId) -> Result<(), ApiError> {
    Ok(ctx
        .store
        .write(|s| s.mark_notification_read(actor, id))
        .await?)
}

pub async fn mark_all_notifications_read(ctx: &ApiContext, actor: UserId) -> Result<MarkedResponse, ApiError> {
    let marked = ctx.store.write(|s| s.mark_all_read(actor)).await?;
    Ok(MarkedResponse { marked })
}

pub async fn platform_settings(ctx: &ApiContext) -> PlatformSettings {
    ctx.store.read(|s| s.platform_settings().clone()).await
}

pub async fn update_platform_settings(
    ctx: &ApiContext,
    actor: UserId,
    patch: &SettingsPatch,
) -> Result<PlatformSettings, ApiError> {
    Ok(ctx
        .store
        .write(|s| s.update_platform_settings(actor, patch))
        .await?)
}

pub async fn upcoming_deadlines(ctx: &ApiContext, actor: UserId) -> Result<Vec<Deadline>, ApiError> {
    Ok(ctx.store.read(|s| s.upcoming_deadlines(actor)).await?)
}

pub async fn dashboard_stats(ctx: &ApiContext, actor: UserId) -> Result<DashboardStats, ApiError> {
    Ok(ctx.store.read(|s| s.dashboard_stats(actor)).await?)
}

/// Whether a pushed event concerns the connected user.
pub fn event_visible_to(event: &ServerEvent, user: &UserProfile) -> bool {
    match event {
        ServerEvent::NotificationPosted { notification } => notification.targets(user.role),
        ServerEvent::CourseDeleted { .. } => true,
        ServerEvent::SubmissionGraded {
            student_id,
            course_owner,
            ..
        } => *student_id == user.id || *course_owner == user.id || user.role == Role::Admin,
    }
}

#[cfg(test)]
#[path = "tests/mod_tests.rs"]
mod tests;
