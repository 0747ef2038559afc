use std::collections::HashSet;

use shared::{
    domain::{Course, CourseId, CourseStatus, Role, UserId, COURSE_THUMB_COUNT},
    protocol::{CoursePatch, CourseQuery, CourseScope, NewCourse, ServerEvent},
};
use serde::Serialize;
use tracing::info;

use super::{required, LmsState};
use crate::error::LmsError;

/// Records removed by deleting a course.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CourseCascade {
    pub assignments: usize,
    pub submissions: usize,
    pub enrollments: usize,
    pub quizzes: usize,
    pub quiz_attempts: usize,
    pub ratings: usize,
    pub certificates: usize,
    pub detached_content: usize,
}

impl LmsState {
    pub fn add_course(&mut self, actor: UserId, input: &NewCourse) -> Result<Course, LmsError> {
        let actor = self.staff_actor(actor, "create courses")?;
        let title = required(&input.title, "Course title is required.")?;

        let course = Course {
            id: CourseId(self.next_id()),
            title,
            description: input.description.trim().to_string(),
            category: non_empty_or(&input.category, "General"),
            level: input.level,
            duration: input.duration.trim().to_string(),
            lessons: input.lessons,
            tags: clean_tags(&input.tags),
            status: input.status,
            students: 0,
            rating: 0.0,
            created_by: actor.id,
            created_by_name: actor.name.clone(),
            thumb: (self.courses.len() % COURSE_THUMB_COUNT) as u8,
            created_at: Self::today(),
        };
        self.courses.insert(0, course.clone());
        self.notify_roles(
            Some(&[Role::Admin]),
            format!("{} created a new course: {}", actor.name, course.title),
        );
        Ok(course)
    }

    /// Title changes are copied onto assignments and submissions.
    pub fn update_course(
        &mut self,
        actor: UserId,
        id: CourseId,
        patch: &CoursePatch,
    ) -> Result<Course, LmsError> {
        let actor = self.staff_actor(actor, "edit courses")?;
        let course = self
            .course(id)
            .ok_or_else(|| LmsError::not_found("course", id.0))?;
        Self::ensure_owner_or_admin(&actor, course.created_by, "edit")?;
        let title = patch
            .title
            .as_deref()
            .map(|t| required(t, "Course title is required."))
            .transpose()?;

        let course = self
            .courses
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| LmsError::not_found("course", id.0))?;
        if let Some(title) = &title {
            course.title = title.clone();
        }
        if let Some(description) = &patch.description {
            course.description = description.trim().to_string();
        }
        if let Some(category) = &patch.category {
            course.category = non_empty_or(category, "General");
        }
        if let Some(level) = patch.level {
            course.level = level;
        }
        if let Some(duration) = &patch.duration {
            course.duration = duration.trim().to_string();
        }
        if let Some(lessons) = patch.lessons {
            course.lessons = lessons;
        }
        if let Some(tags) = &patch.tags {
            course.tags = clean_tags(tags);
        }
        if let Some(status) = patch.status {
            course.status = status;
        }
        let updated = course.clone();

        if let Some(title) = title {
            for assignment in self.assignments.iter_mut().filter(|a| a.course_id == id) {
                assignment.course_name = title.clone();
            }
            for submission in self.submissions.iter_mut().filter(|s| s.course_id == id) {
                submission.course_name = title.clone();
            }
        }
        self.notify_roles(
            Some(&[Role::Admin]),
            format!("{} updated the course: {}", actor.name, updated.title),
        );
        Ok(updated)
    }

    /// Deletes the course and everything that hangs off it.
    pub fn delete_course(&mut self, actor: UserId, id: CourseId) -> Result<CourseCascade, LmsError> {
        let actor = self.staff_actor(actor, "delete courses")?;
        let course = self
            .course(id)
            .ok_or_else(|| LmsError::not_found("course", id.0))?;
        Self::ensure_owner_or_admin(&actor, course.created_by, "delete")?;

        let mut report = CourseCascade::default();
        self.courses.retain(|c| c.id != id);

        let assignment_ids: HashSet<_> = self
            .assignments
            .iter()
            .filter(|a| a.course_id == id)
            .map(|a| a.id)
            .collect();
        report.assignments = assignment_ids.len();
        self.assignments.retain(|a| a.course_id != id);
        let before = self.submissions.len();
        self.submissions
            .retain(|s| !assignment_ids.contains(&s.assignment_id));
        report.submissions = before - self.submissions.len();

        if let Some(members) = self.enrollments.remove(&id) {
            report.enrollments = members.len();
            for user in self.users.iter_mut().filter(|u| members.contains(&u.id)) {
                user.courses = user.courses.saturating_sub(1);
            }
        }

        let quiz_ids: HashSet<_> = self
            .quizzes
            .iter()
            .filter(|q| q.course_id == Some(id))
            .map(|q| q.id)
            .collect();
        report.quizzes = quiz_ids.len();
        self.quizzes.retain(|q| q.course_id != Some(id));
        let before = self.quiz_attempts.len();
        self.quiz_attempts.retain(|a| !quiz_ids.contains(&a.quiz_id));
        report.quiz_attempts = before - self.quiz_attempts.len();

        let before = self.ratings.len();
        self.ratings.retain(|r| r.course_id != id);
        report.ratings = before - self.ratings.len();
        let before = self.certificates.len();
        self.certificates.retain(|c| c.course_id != id);
        report.certificates = before - self.certificates.len();

        for item in self.content.iter_mut().filter(|c| c.course_id == Some(id)) {
            item.course_id = None;
            report.detached_content += 1;
        }

        info!(course_id = id.0, ?report, "deleted course");
        self.emit(ServerEvent::CourseDeleted { course_id: id });
        Ok(report)
    }

    /// Courses the given staff member created.
    pub fn admin_courses(&self, owner: UserId) -> Vec<&Course> {
        self.courses.iter().filter(|c| c.created_by == owner).collect()
    }

    pub fn published_courses(&self) -> Vec<&Course> {
        self.courses
            .iter()
            .filter(|c| c.status == CourseStatus::Published)
            .collect()
    }

    pub fn enrolled_courses(&self, student: UserId) -> Vec<&Course> {
        self.courses
            .iter()
            .filter(|c| self.is_enrolled(student, c.id))
            .collect()
    }

    /// Staff see what they created, students see the published catalog.
    pub fn visible_courses(&self, actor: UserId, query: &CourseQuery) -> Result<Vec<&Course>, LmsError> {
        let actor = self.actor(actor)?;
        let base = match (&query.scope, actor.role.is_staff()) {
            (CourseScope::Enrolled, _) => self.enrolled_courses(actor.id),
            (CourseScope::Visible, true) => self.admin_courses(actor.id),
            (CourseScope::Visible, false) => self.published_courses(),
        };
        let search = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);
        let category = query
            .category
            .as_deref()
            .filter(|c| !c.is_empty() && *c != "All");
        Ok(base
            .into_iter()
            .filter(|c| {
                search
                    .as_ref()
                    .map_or(true, |s| c.title.to_lowercase().contains(s))
            })
            .filter(|c| category.map_or(true, |cat| c.category == cat))
            .collect())
    }

    /// Distinct categories of the actor's visible courses, first-seen order.
    pub fn course_categories(&self, actor: UserId) -> Result<Vec<String>, LmsError> {
        let courses = self.visible_courses(actor, &CourseQuery::default())?;
        let mut seen = HashSet::new();
        Ok(courses
            .into_iter()
            .filter(|c| seen.insert(c.category.as_str()))
            .map(|c| c.category.clone())
            .collect())
    }

    pub fn is_enrolled(&self, user: UserId, course: CourseId) -> bool {
        self.enrollments
            .get(&course)
            .is_some_and(|members| members.contains(&user))
    }

    pub fn enrolled_students(&self, course: CourseId) -> &[UserId] {
        self.enrollments
            .get(&course)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Returns `false` when the user was already enrolled.
    pub fn enroll_student(
        &mut self,
        actor: UserId,
        user: UserId,
        course_id: CourseId,
    ) -> Result<bool, LmsError> {
        let actor = self.actor(actor)?;
        if actor.id != user && actor.role != Role::Admin {
            return Err(LmsError::forbidden("You can only enroll yourself."));
        }
        let student = self
            .user(user)
            .ok_or_else(|| LmsError::not_found("user", user.0))?;
        if student.role != Role::Student {
            return Err(LmsError::validation("Only students can enroll in courses."));
        }
        let course = self
            .course(course_id)
            .ok_or_else(|| LmsError::not_found("course", course_id.0))?;
        if course.status != CourseStatus::Published {
            return Err(LmsError::validation("This course is not open for enrollment."));
        }
        if self.is_enrolled(user, course_id) {
            return Ok(false);
        }

        self.enrollments.entry(course_id).or_default().push(user);
        if let Some(course) = self.courses.iter_mut().find(|c| c.id == course_id) {
            course.students += 1;
        }
        if let Some(student) = self.users.iter_mut().find(|u| u.id == user) {
            student.courses += 1;
        }
        Ok(true)
    }
}

fn non_empty_or(value: &str, fallback: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

fn clean_tags(tags: &[String]) -> Vec<String> {
    tags.iter()
        .flat_map(|t| t.split(','))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}
