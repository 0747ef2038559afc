use shared::{
    domain::{
        Announcement, AnnouncementId, Certificate, CertificateId, ContentId, ContentItem,
        ContentStatus, CourseId, Rating, RatingId, SubmissionStatus, UserId,
    },
    protocol::{ContentPatch, NewAnnouncement, NewContent, RateCourse},
};

use super::{required, LmsState};
use crate::error::LmsError;

impl LmsState {
    pub fn add_content(&mut self, actor: UserId, input: &NewContent) -> Result<ContentItem, LmsError> {
        let actor = self.staff_actor(actor, "create content")?;
        let title = required(&input.title, "Content title is required.")?;
        if let Some(course_id) = input.course_id {
            if self.course(course_id).is_none() {
                return Err(LmsError::not_found("course", course_id.0));
            }
        }
        let item = ContentItem {
            id: ContentId(self.next_id()),
            title,
            kind: input.kind,
            course_id: input.course_id,
            status: input.status,
            duration: input.duration.trim().to_string(),
            created_by: actor.id,
            created_at: Self::today(),
        };
        self.content.insert(0, item.clone());
        Ok(item)
    }

    pub fn update_content(
        &mut self,
        actor: UserId,
        id: ContentId,
        patch: &ContentPatch,
    ) -> Result<ContentItem, LmsError> {
        let actor = self.staff_actor(actor, "edit content")?;
        let existing = self
            .content
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| LmsError::not_found("content item", id.0))?;
        Self::ensure_owner_or_admin(&actor, existing.created_by, "edit")?;
        let title = patch
            .title
            .as_deref()
            .map(|t| required(t, "Content title is required."))
            .transpose()?;
        if let Some(course_id) = patch.course_id {
            if self.course(course_id).is_none() {
                return Err(LmsError::not_found("course", course_id.0));
            }
        }

        let item = self
            .content
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| LmsError::not_found("content item", id.0))?;
        if let Some(title) = title {
            item.title = title;
        }
        if let Some(kind) = patch.kind {
            item.kind = kind;
        }
        if let Some(course_id) = patch.course_id {
            item.course_id = Some(course_id);
        }
        if let Some(status) = patch.status {
            item.status = status;
        }
        if let Some(duration) = &patch.duration {
            item.duration = duration.trim().to_string();
        }
        Ok(item.clone())
    }

    pub fn delete_content(&mut self, actor: UserId, id: ContentId) -> Result<(), LmsError> {
        let actor = self.staff_actor(actor, "delete content")?;
        let existing = self
            .content
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| LmsError::not_found("content item", id.0))?;
        Self::ensure_owner_or_admin(&actor, existing.created_by, "delete")?;
        self.content.retain(|c| c.id != id);
        Ok(())
    }

    /// Staff see the whole library; students see published items of the
    /// courses they are enrolled in.
    pub fn visible_content(&self, actor: UserId) -> Result<Vec<&ContentItem>, LmsError> {
        let actor = self.actor(actor)?;
        if actor.role.is_staff() {
            return Ok(self.content.iter().collect());
        }
        Ok(self
            .content
            .iter()
            .filter(|c| c.status == ContentStatus::Published)
            .filter(|c| c.course_id.is_some_and(|id| self.is_enrolled(actor.id, id)))
            .collect())
    }

    pub fn add_announcement(
        &mut self,
        actor: UserId,
        input: &NewAnnouncement,
    ) -> Result<Announcement, LmsError> {
        let actor = self.staff_actor(actor, "post announcements")?;
        let title = required(&input.title, "Announcement title is required.")?;
        let message = required(&input.message, "Announcement message is required.")?;
        let announcement = Announcement {
            id: AnnouncementId(self.next_id()),
            title,
            message,
            kind: input.kind,
            author: actor.name.clone(),
            role: actor.role,
            date: Self::today(),
        };
        self.announcements.insert(0, announcement.clone());
        self.notify_roles(None, format!("New announcement: {}", announcement.title));
        Ok(announcement)
    }

    /// One rating per user and course; rating again replaces the stars.
    pub fn rate_course(
        &mut self,
        actor: UserId,
        course_id: CourseId,
        input: &RateCourse,
    ) -> Result<Rating, LmsError> {
        let actor = self.actor(actor)?;
        if self.course(course_id).is_none() {
            return Err(LmsError::not_found("course", course_id.0));
        }
        if !(1..=5).contains(&input.stars) {
            return Err(LmsError::validation("Ratings must be between 1 and 5 stars."));
        }
        if !self.is_enrolled(actor.id, course_id) {
            return Err(LmsError::forbidden("Only enrolled students can rate a course."));
        }

        let review = input.review.trim().to_string();
        let rating = match self
            .ratings
            .iter_mut()
            .find(|r| r.course_id == course_id && r.user_id == actor.id)
        {
            Some(existing) => {
                existing.stars = input.stars;
                existing.review = review;
                existing.clone()
            }
            None => {
                let rating = Rating {
                    id: RatingId(self.next_id()),
                    course_id,
                    user_id: actor.id,
                    stars: input.stars,
                    review,
                    created_at: Self::today(),
                };
                self.ratings.push(rating.clone());
                rating
            }
        };
        self.recompute_rating(course_id);
        Ok(rating)
    }

    /// Average stars rounded to one decimal; zero when unrated.
    pub(crate) fn recompute_rating(&mut self, course_id: CourseId) {
        let stars: Vec<f32> = self
            .ratings
            .iter()
            .filter(|r| r.course_id == course_id)
            .map(|r| f32::from(r.stars))
            .collect();
        let average = if stars.is_empty() {
            0.0
        } else {
            stars.iter().sum::<f32>() / stars.len() as f32
        };
        if let Some(course) = self.courses.iter_mut().find(|c| c.id == course_id) {
            course.rating = (average * 10.0).round() / 10.0;
        }
    }

    /// Issued once every assignment of the course has a graded submission
    /// from the student. Claiming again returns the same certificate.
    pub fn issue_certificate(&mut self, actor: UserId, course_id: CourseId) -> Result<Certificate, LmsError> {
        let student = self.actor(actor)?;
        if !self.platform_settings.certificates_enabled {
            return Err(LmsError::validation("Certificates are currently disabled."));
        }
        let course = self
            .course(course_id)
            .ok_or_else(|| LmsError::not_found("course", course_id.0))?;
        let course_title = course.title.clone();
        if !self.is_enrolled(student.id, course_id) {
            return Err(LmsError::forbidden(
                "Only enrolled students can earn a certificate.",
            ));
        }
        if let Some(existing) = self
            .certificates
            .iter()
            .find(|c| c.course_id == course_id && c.user_id == student.id)
        {
            return Ok(existing.clone());
        }
        let outstanding = self
            .assignments
            .iter()
            .filter(|a| a.course_id == course_id)
            .filter(|a| {
                !self.submissions.iter().any(|s| {
                    s.assignment_id == a.id
                        && s.student_id == student.id
                        && s.status == SubmissionStatus::Graded
                })
            })
            .count();
        if outstanding > 0 {
            return Err(LmsError::validation(format!(
                "{outstanding} assignment(s) still need a graded submission."
            )));
        }

        let certificate = Certificate {
            id: CertificateId(self.next_id()),
            course_id,
            user_id: student.id,
            course_title,
            student_name: student.name.clone(),
            issued_at: Self::today(),
        };
        self.certificates.push(certificate.clone());
        Ok(certificate)
    }

    pub fn certificates_for(&self, user: UserId) -> Vec<&Certificate> {
        self.certificates
            .iter()
            .filter(|c| c.user_id == user)
            .collect()
    }
}
