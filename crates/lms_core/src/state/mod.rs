//! In-memory owner of every collection.
//!
//! `LmsState` is synchronous and knows nothing about persistence: every
//! mutator validates first and only then touches the collections, so a
//! returned `Err` never leaves partial changes behind. The acting user is
//! always passed explicitly.

use std::collections::BTreeMap;

use chrono::{NaiveDate, Utc};
use shared::{
    domain::{
        Announcement, Assignment, Certificate, ContentItem, Course, CourseId, Message,
        Notification, NotificationId, PlatformSettings, Quiz, QuizAttempt, Rating, Role,
        Submission, User, UserId,
    },
    protocol::ServerEvent,
};

use crate::error::LmsError;

mod auth;
mod content;
mod courses;
mod coursework;
mod dashboard;
mod messaging;
mod quizzes;
mod users;

pub use courses::CourseCascade;
pub use quizzes::score_answers;

#[derive(Debug, Clone, Default)]
pub struct LmsState {
    pub(crate) users: Vec<User>,
    pub(crate) courses: Vec<Course>,
    pub(crate) assignments: Vec<Assignment>,
    pub(crate) submissions: Vec<Submission>,
    pub(crate) announcements: Vec<Announcement>,
    pub(crate) enrollments: BTreeMap<CourseId, Vec<UserId>>,
    pub(crate) notifications: Vec<Notification>,
    pub(crate) content: Vec<ContentItem>,
    pub(crate) ratings: Vec<Rating>,
    pub(crate) quizzes: Vec<Quiz>,
    pub(crate) quiz_attempts: Vec<QuizAttempt>,
    pub(crate) certificates: Vec<Certificate>,
    pub(crate) messages: Vec<Message>,
    pub(crate) platform_settings: PlatformSettings,
    last_id: i64,
    pending_events: Vec<ServerEvent>,
}

impl LmsState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: Vec<User>) -> Self {
        let mut state = Self {
            users,
            ..Self::default()
        };
        state.sync_last_id();
        state
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn courses(&self) -> &[Course] {
        &self.courses
    }

    pub fn assignments(&self) -> &[Assignment] {
        &self.assignments
    }

    pub fn submissions(&self) -> &[Submission] {
        &self.submissions
    }

    pub fn announcements(&self) -> &[Announcement] {
        &self.announcements
    }

    pub fn enrollments(&self) -> &BTreeMap<CourseId, Vec<UserId>> {
        &self.enrollments
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    pub fn content_items(&self) -> &[ContentItem] {
        &self.content
    }

    pub fn ratings(&self) -> &[Rating] {
        &self.ratings
    }

    pub fn quizzes(&self) -> &[Quiz] {
        &self.quizzes
    }

    pub fn quiz_attempts(&self) -> &[QuizAttempt] {
        &self.quiz_attempts
    }

    pub fn certificates(&self) -> &[Certificate] {
        &self.certificates
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn platform_settings(&self) -> &PlatformSettings {
        &self.platform_settings
    }

    pub fn user(&self, id: UserId) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    pub fn course(&self, id: CourseId) -> Option<&Course> {
        self.courses.iter().find(|c| c.id == id)
    }

    /// Drains the events produced by mutations since the last call.
    pub fn take_events(&mut self) -> Vec<ServerEvent> {
        std::mem::take(&mut self.pending_events)
    }

    /// Timestamp-based ids: milliseconds since the epoch, bumped past the
    /// last issued id so two records created in one millisecond differ.
    pub(crate) fn next_id(&mut self) -> i64 {
        let now = Utc::now().timestamp_millis();
        self.last_id = now.max(self.last_id + 1);
        self.last_id
    }

    pub(crate) fn sync_last_id(&mut self) {
        let ids = self
            .users
            .iter()
            .map(|x| x.id.0)
            .chain(self.courses.iter().map(|x| x.id.0))
            .chain(self.assignments.iter().map(|x| x.id.0))
            .chain(self.submissions.iter().map(|x| x.id.0))
            .chain(self.announcements.iter().map(|x| x.id.0))
            .chain(self.notifications.iter().map(|x| x.id.0))
            .chain(self.content.iter().map(|x| x.id.0))
            .chain(self.ratings.iter().map(|x| x.id.0))
            .chain(self.quizzes.iter().map(|x| x.id.0))
            .chain(self.quiz_attempts.iter().map(|x| x.id.0))
            .chain(self.certificates.iter().map(|x| x.id.0))
            .chain(self.messages.iter().map(|x| x.id.0));
        self.last_id = ids.max().unwrap_or(0);
    }

    pub(crate) fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    /// Resolves the acting user; missing or deactivated accounts cannot act.
    pub(crate) fn actor(&self, id: UserId) -> Result<User, LmsError> {
        let user = self.user(id).ok_or(LmsError::Unauthorized)?;
        if !user.is_active() {
            return Err(LmsError::AccountInactive);
        }
        Ok(user.clone())
    }

    pub(crate) fn staff_actor(&self, id: UserId, action: &str) -> Result<User, LmsError> {
        let actor = self.actor(id)?;
        if !actor.role.is_staff() {
            return Err(LmsError::forbidden(format!("Only staff can {action}.")));
        }
        Ok(actor)
    }

    pub(crate) fn admin_actor(&self, id: UserId, action: &str) -> Result<User, LmsError> {
        let actor = self.actor(id)?;
        if actor.role != Role::Admin {
            return Err(LmsError::forbidden(format!("Only admins can {action}.")));
        }
        Ok(actor)
    }

    pub(crate) fn ensure_owner_or_admin(
        actor: &User,
        owner: UserId,
        action: &str,
    ) -> Result<(), LmsError> {
        if actor.role == Role::Admin || actor.id == owner {
            Ok(())
        } else {
            Err(LmsError::forbidden(format!(
                "You can only {action} items you created."
            )))
        }
    }

    /// Posts a notification; `None` reaches every role.
    pub fn notify_roles(&mut self, roles: Option<&[Role]>, text: impl Into<String>) -> NotificationId {
        let notification = Notification {
            id: NotificationId(self.next_id()),
            text: text.into(),
            target_roles: roles.map(<[Role]>::to_vec),
            created_at: Utc::now(),
            read: false,
        };
        let id = notification.id;
        self.pending_events.push(ServerEvent::NotificationPosted {
            notification: notification.clone(),
        });
        self.notifications.insert(0, notification);
        id
    }

    pub(crate) fn emit(&mut self, event: ServerEvent) {
        self.pending_events.push(event);
    }
}

pub(crate) fn required(value: &str, message: &str) -> Result<String, LmsError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(LmsError::validation(message));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
#[path = "../tests/state_tests.rs"]
mod tests;
