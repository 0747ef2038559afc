use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(pub i64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(UserId);
id_newtype!(CourseId);
id_newtype!(AssignmentId);
id_newtype!(SubmissionId);
id_newtype!(AnnouncementId);
id_newtype!(ContentId);
id_newtype!(RatingId);
id_newtype!(QuizId);
id_newtype!(AttemptId);
id_newtype!(CertificateId);
id_newtype!(MessageId);
id_newtype!(NotificationId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Instructor,
    Student,
    #[serde(rename = "Content Creator")]
    ContentCreator,
}

impl Role {
    pub const ALL: [Role; 4] = [
        Role::Admin,
        Role::Instructor,
        Role::Student,
        Role::ContentCreator,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Instructor => "Instructor",
            Role::Student => "Student",
            Role::ContentCreator => "Content Creator",
        }
    }

    /// Admins, instructors and content creators.
    pub fn is_staff(self) -> bool {
        !matches!(self, Role::Student)
    }

    pub fn from_label(raw: &str) -> Option<Self> {
        let normalized: String = raw
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "admin" => Some(Role::Admin),
            "instructor" => Some(Role::Instructor),
            "student" => Some(Role::Student),
            "contentcreator" | "cc" => Some(Role::ContentCreator),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    #[default]
    Active,
    Inactive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub password_salt: String,
    pub role: Role,
    pub initials: String,
    pub avatar: Option<String>,
    pub name_changed: bool,
    pub joined: NaiveDate,
    pub status: UserStatus,
    pub courses: u32,
}

impl User {
    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CourseStatus {
    #[default]
    Published,
    Draft,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CourseLevel {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

/// Number of thumbnail presets a course cycles through.
pub const COURSE_THUMB_COUNT: usize = 8;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    pub title: String,
    pub description: String,
    pub category: String,
    pub level: CourseLevel,
    pub duration: String,
    pub lessons: u32,
    pub tags: Vec<String>,
    pub status: CourseStatus,
    pub students: u32,
    pub rating: f32,
    pub created_by: UserId,
    pub created_by_name: String,
    pub thumb: u8,
    pub created_at: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    #[default]
    Active,
    Closed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub id: AssignmentId,
    pub title: String,
    pub course_id: CourseId,
    pub course_name: String,
    pub created_by: UserId,
    pub due_date: Option<NaiveDate>,
    pub max_score: u32,
    pub description: String,
    pub submissions: u32,
    pub graded: u32,
    pub status: AssignmentStatus,
    pub created_at: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    #[default]
    Pending,
    Graded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub id: SubmissionId,
    pub assignment_id: AssignmentId,
    pub student_id: UserId,
    pub student_name: String,
    pub student_initials: String,
    pub student_avatar: Option<String>,
    pub assignment_title: String,
    pub course_name: String,
    pub course_id: CourseId,
    pub answer: String,
    pub submitted_at: NaiveDate,
    pub score: Option<u32>,
    pub feedback: String,
    pub status: SubmissionStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnouncementKind {
    #[default]
    General,
    Course,
    Assignment,
    Maintenance,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Announcement {
    pub id: AnnouncementId,
    pub title: String,
    pub message: String,
    pub kind: AnnouncementKind,
    pub author: String,
    pub role: Role,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    #[default]
    Video,
    Article,
    Quiz,
    Resource,
}

impl ContentKind {
    pub const ALL: [ContentKind; 4] = [
        ContentKind::Video,
        ContentKind::Article,
        ContentKind::Quiz,
        ContentKind::Resource,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentStatus {
    #[default]
    Draft,
    Review,
    Published,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: ContentId,
    pub title: String,
    pub kind: ContentKind,
    pub course_id: Option<CourseId>,
    pub status: ContentStatus,
    pub duration: String,
    pub created_by: UserId,
    pub created_at: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rating {
    pub id: RatingId,
    pub course_id: CourseId,
    pub user_id: UserId,
    pub stars: u8,
    pub review: String,
    pub created_at: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub prompt: String,
    pub options: Vec<String>,
    pub answer: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quiz {
    pub id: QuizId,
    pub title: String,
    pub course_id: Option<CourseId>,
    pub allow_retake: bool,
    /// Minutes; zero means no limit.
    pub time_limit: u32,
    pub due_date: Option<NaiveDate>,
    pub questions: Vec<QuizQuestion>,
    pub created_by: UserId,
    pub created_at: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizAttempt {
    pub id: AttemptId,
    pub quiz_id: QuizId,
    pub user_id: UserId,
    pub answers: Vec<Option<usize>>,
    pub score: u32,
    pub total: u32,
    pub taken_at: DateTime<Utc>,
}

impl QuizAttempt {
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            f64::from(self.score) / f64::from(self.total)
        }
    }

    pub fn percent(&self) -> u32 {
        (self.ratio() * 100.0).round() as u32
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Certificate {
    pub id: CertificateId,
    pub course_id: CourseId,
    pub user_id: UserId,
    pub course_title: String,
    pub student_name: String,
    pub issued_at: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub from_id: UserId,
    pub to_id: UserId,
    pub from_name: String,
    pub to_name: String,
    pub subject: String,
    pub body: String,
    pub sent_at: DateTime<Utc>,
    pub read_by_to: bool,
    pub deleted_by_from: bool,
    pub deleted_by_to: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub text: String,
    /// `None` targets every role.
    pub target_roles: Option<Vec<Role>>,
    pub created_at: DateTime<Utc>,
    pub read: bool,
}

impl Notification {
    pub fn targets(&self, role: Role) -> bool {
        self.target_roles
            .as_ref()
            .map_or(true, |roles| roles.contains(&role))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformSettings {
    pub contact_email: String,
    pub contact_phone: String,
    pub about_text: String,
    pub certificates_enabled: bool,
}

impl Default for PlatformSettings {
    fn default() -> Self {
        Self {
            contact_email: "admin@gmail.com".into(),
            contact_phone: "9100260825".into(),
            about_text: "Welcome to Digital Black Board, the premier platform for modern learning management! Here, you can empower yourself with our extensive catalog of courses.".into(),
            certificates_enabled: true,
        }
    }
}
