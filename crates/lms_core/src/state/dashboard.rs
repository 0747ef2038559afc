use std::collections::HashSet;

use shared::{
    domain::{ContentKind, CourseStatus, Role, SubmissionStatus, UserId},
    protocol::{
        DashboardStats, Deadline, DeadlineItem, KindCount, PlatformTotals, RoleCount, StaffStats,
        StudentStats,
    },
};

use super::LmsState;
use crate::error::LmsError;

const UPCOMING_LIMIT: usize = 10;

impl LmsState {
    /// Visible assignments and quizzes due today or later, soonest first.
    /// Assignments come before quizzes on the same day.
    pub fn upcoming_deadlines(&self, actor: UserId) -> Result<Vec<Deadline>, LmsError> {
        let today = Self::today();
        let assignments = self.visible_assignments(actor)?.into_iter().filter_map(|a| {
            let due_date = a.due_date.filter(|due| *due >= today)?;
            Some(Deadline {
                item: DeadlineItem::Assignment(a.id),
                title: a.title.clone(),
                course_name: Some(a.course_name.clone()),
                due_date,
            })
        });
        let quizzes = self.visible_quizzes(actor)?.into_iter().filter_map(|q| {
            let due_date = q.due_date.filter(|due| *due >= today)?;
            Some(Deadline {
                item: DeadlineItem::Quiz(q.id),
                title: q.title.clone(),
                course_name: q
                    .course_id
                    .and_then(|id| self.course(id))
                    .map(|c| c.title.clone()),
                due_date,
            })
        });

        let mut upcoming: Vec<_> = assignments.chain(quizzes).collect();
        upcoming.sort_by_key(|d| d.due_date);
        upcoming.truncate(UPCOMING_LIMIT);
        Ok(upcoming)
    }

    pub fn dashboard_stats(&self, actor: UserId) -> Result<DashboardStats, LmsError> {
        let actor = self.actor(actor)?;
        if !actor.role.is_staff() {
            return Ok(DashboardStats::Student(self.student_stats(actor.id)));
        }

        let courses = self.admin_courses(actor.id);
        let submissions = self.admin_submissions(actor.id);
        let pending = submissions
            .iter()
            .filter(|s| s.status == SubmissionStatus::Pending)
            .count();
        Ok(DashboardStats::Staff(StaffStats {
            courses: courses.len(),
            published_courses: courses
                .iter()
                .filter(|c| c.status == CourseStatus::Published)
                .count(),
            assignments: self.admin_assignments(actor.id).len(),
            active_students: self
                .users
                .iter()
                .filter(|u| u.role == Role::Student && u.is_active())
                .count(),
            pending_submissions: pending,
            graded_submissions: submissions.len() - pending,
            platform: (actor.role == Role::Admin).then(|| self.platform_totals()),
        }))
    }

    fn student_stats(&self, student: UserId) -> StudentStats {
        let assignments = self.student_assignments(student);
        let submissions = self.student_submissions(student);
        let scores: Vec<u32> = submissions
            .iter()
            .filter(|s| s.status == SubmissionStatus::Graded)
            .filter_map(|s| s.score)
            .collect();
        let average_score = (!scores.is_empty()).then(|| {
            let total: u32 = scores.iter().sum();
            (f64::from(total) / scores.len() as f64).round() as u32
        });
        let submitted: HashSet<_> = submissions.iter().map(|s| s.assignment_id).collect();

        StudentStats {
            enrolled_courses: self.enrolled_courses(student).len(),
            assignments: assignments.len(),
            submitted: submissions.len(),
            graded: scores.len(),
            average_score,
            not_submitted: assignments
                .iter()
                .filter(|a| !submitted.contains(&a.id))
                .count(),
        }
    }

    fn platform_totals(&self) -> PlatformTotals {
        PlatformTotals {
            users_by_role: Role::ALL
                .into_iter()
                .map(|role| RoleCount {
                    role,
                    count: self.users.iter().filter(|u| u.role == role).count(),
                })
                .collect(),
            content_by_kind: ContentKind::ALL
                .into_iter()
                .map(|kind| KindCount {
                    kind,
                    count: self.content.iter().filter(|c| c.kind == kind).count(),
                })
                .collect(),
        }
    }
}
