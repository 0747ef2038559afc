use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{
    AnnouncementKind, AssignmentId, AssignmentStatus, ContentKind, ContentStatus, CourseId,
    CourseLevel, CourseStatus, Notification, QuizId, QuizQuestion, Role, SubmissionId, User,
    UserId, UserStatus,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub role: Option<Role>,
    #[serde(default)]
    pub staff_code: Option<String>,
}

/// A user as shown to clients; credentials never leave the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub initials: String,
    pub avatar: Option<String>,
    pub name_changed: bool,
    pub joined: NaiveDate,
    pub status: UserStatus,
    pub courses: u32,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            initials: user.initials.clone(),
            avatar: user.avatar.clone(),
            name_changed: user.name_changed,
            joined: user.joined,
            status: user.status,
            courses: user.courses,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserProfile,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    #[serde(default)]
    pub status: UserStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub status: Option<UserStatus>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NameChange {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvatarChange {
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewCourse {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub level: CourseLevel,
    #[serde(default)]
    pub duration: String,
    #[serde(default)]
    pub lessons: u32,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub status: CourseStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoursePatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub level: Option<CourseLevel>,
    pub duration: Option<String>,
    pub lessons: Option<u32>,
    pub tags: Option<Vec<String>>,
    pub status: Option<CourseStatus>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CourseScope {
    /// Own courses for staff, published courses for students.
    #[default]
    Visible,
    Enrolled,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CourseQuery {
    #[serde(default)]
    pub scope: CourseScope,
    pub search: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAssignment {
    pub title: String,
    pub course_id: CourseId,
    pub due_date: Option<NaiveDate>,
    /// Zero or absent falls back to 100.
    pub max_score: Option<u32>,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssignmentPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub max_score: Option<u32>,
    pub status: Option<AssignmentStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitAnswer {
    pub assignment_id: AssignmentId,
    #[serde(default)]
    pub answer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradeRequest {
    pub submission_id: SubmissionId,
    pub score: u32,
    #[serde(default)]
    pub feedback: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAnnouncement {
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub kind: AnnouncementKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewContent {
    pub title: String,
    #[serde(default)]
    pub kind: ContentKind,
    pub course_id: Option<CourseId>,
    #[serde(default)]
    pub status: ContentStatus,
    #[serde(default)]
    pub duration: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentPatch {
    pub title: Option<String>,
    pub kind: Option<ContentKind>,
    pub course_id: Option<CourseId>,
    pub status: Option<ContentStatus>,
    pub duration: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizDraft {
    pub title: String,
    pub course_id: Option<CourseId>,
    #[serde(default = "default_allow_retake")]
    pub allow_retake: bool,
    #[serde(default)]
    pub time_limit: u32,
    pub due_date: Option<NaiveDate>,
    pub questions: Vec<QuizQuestion>,
}

fn default_allow_retake() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizAnswers {
    pub answers: Vec<Option<usize>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateCourse {
    pub stars: u8,
    #[serde(default)]
    pub review: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposeMessage {
    pub to_id: UserId,
    #[serde(default)]
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsPatch {
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub about_text: Option<String>,
    pub certificates_enabled: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum DeadlineItem {
    Assignment(AssignmentId),
    Quiz(QuizId),
}

/// An assignment or quiz that is due today or later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deadline {
    pub item: DeadlineItem,
    pub title: String,
    pub course_name: Option<String>,
    pub due_date: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleCount {
    pub role: Role,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindCount {
    pub kind: ContentKind,
    pub count: usize,
}

/// Platform-wide totals, only computed for admins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformTotals {
    pub users_by_role: Vec<RoleCount>,
    pub content_by_kind: Vec<KindCount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffStats {
    pub courses: usize,
    pub published_courses: usize,
    pub assignments: usize,
    pub active_students: usize,
    pub pending_submissions: usize,
    pub graded_submissions: usize,
    pub platform: Option<PlatformTotals>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentStats {
    pub enrolled_courses: usize,
    pub assignments: usize,
    pub submitted: usize,
    pub graded: usize,
    /// Mean of the graded scores, rounded; `None` until something is graded.
    pub average_score: Option<u32>,
    pub not_submitted: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum DashboardStats {
    Staff(StaffStats),
    Student(StudentStats),
}

/// Pushed to websocket subscribers after state changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerEvent {
    NotificationPosted {
        notification: Notification,
    },
    CourseDeleted {
        course_id: CourseId,
    },
    SubmissionGraded {
        submission_id: SubmissionId,
        student_id: UserId,
        /// Creator of the course the assignment belongs to.
        course_owner: UserId,
        score: u32,
    },
}
