use std::collections::HashSet;

use shared::{
    domain::{
        Assignment, AssignmentId, AssignmentStatus, Role, Submission, SubmissionId,
        SubmissionStatus, UserId,
    },
    protocol::{AssignmentPatch, NewAssignment, ServerEvent},
};

use super::{required, LmsState};
use crate::error::LmsError;

const DEFAULT_MAX_SCORE: u32 = 100;

impl LmsState {
    pub fn assignment(&self, id: AssignmentId) -> Option<&Assignment> {
        self.assignments.iter().find(|a| a.id == id)
    }

    pub fn submission(&self, id: SubmissionId) -> Option<&Submission> {
        self.submissions.iter().find(|s| s.id == id)
    }

    pub fn add_assignment(&mut self, actor: UserId, input: &NewAssignment) -> Result<Assignment, LmsError> {
        let actor = self.staff_actor(actor, "create assignments")?;
        let title = required(&input.title, "Assignment title is required.")?;
        let course = self
            .course(input.course_id)
            .ok_or_else(|| LmsError::not_found("course", input.course_id.0))?;
        Self::ensure_owner_or_admin(&actor, course.created_by, "add assignments to")?;
        let course_name = course.title.clone();

        let assignment = Assignment {
            id: AssignmentId(self.next_id()),
            title,
            course_id: input.course_id,
            course_name,
            created_by: actor.id,
            due_date: input.due_date,
            max_score: input
                .max_score
                .filter(|s| *s > 0)
                .unwrap_or(DEFAULT_MAX_SCORE),
            description: input.description.trim().to_string(),
            submissions: 0,
            graded: 0,
            status: AssignmentStatus::Active,
            created_at: Self::today(),
        };
        self.assignments.insert(0, assignment.clone());
        Ok(assignment)
    }

    pub fn update_assignment(
        &mut self,
        actor: UserId,
        id: AssignmentId,
        patch: &AssignmentPatch,
    ) -> Result<Assignment, LmsError> {
        let actor = self.staff_actor(actor, "edit assignments")?;
        let existing = self
            .assignment(id)
            .ok_or_else(|| LmsError::not_found("assignment", id.0))?;
        Self::ensure_owner_or_admin(&actor, existing.created_by, "edit")?;
        let title = patch
            .title
            .as_deref()
            .map(|t| required(t, "Assignment title is required."))
            .transpose()?;
        if let Some(max_score) = patch.max_score {
            if max_score == 0 {
                return Err(LmsError::validation("Max score must be greater than zero."));
            }
            let highest_grade = self
                .submissions
                .iter()
                .filter(|s| s.assignment_id == id)
                .filter_map(|s| s.score)
                .max()
                .unwrap_or(0);
            if max_score < highest_grade {
                return Err(LmsError::validation(format!(
                    "Max score cannot be lower than an existing grade ({highest_grade})."
                )));
            }
        }

        let assignment = self
            .assignments
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| LmsError::not_found("assignment", id.0))?;
        if let Some(title) = &title {
            assignment.title = title.clone();
        }
        if let Some(description) = &patch.description {
            assignment.description = description.trim().to_string();
        }
        if let Some(due_date) = patch.due_date {
            assignment.due_date = Some(due_date);
        }
        if let Some(max_score) = patch.max_score {
            assignment.max_score = max_score;
        }
        if let Some(status) = patch.status {
            assignment.status = status;
        }
        let updated = assignment.clone();

        if let Some(title) = title {
            for submission in self.submissions.iter_mut().filter(|s| s.assignment_id == id) {
                submission.assignment_title = title.clone();
            }
        }
        Ok(updated)
    }

    /// Returns the number of submissions removed along with the assignment.
    pub fn delete_assignment(&mut self, actor: UserId, id: AssignmentId) -> Result<usize, LmsError> {
        let actor = self.staff_actor(actor, "delete assignments")?;
        let existing = self
            .assignment(id)
            .ok_or_else(|| LmsError::not_found("assignment", id.0))?;
        Self::ensure_owner_or_admin(&actor, existing.created_by, "delete")?;

        self.assignments.retain(|a| a.id != id);
        let before = self.submissions.len();
        self.submissions.retain(|s| s.assignment_id != id);
        Ok(before - self.submissions.len())
    }

    /// Assignments belonging to courses the owner created.
    pub fn admin_assignments(&self, owner: UserId) -> Vec<&Assignment> {
        let mine: HashSet<_> = self.admin_courses(owner).into_iter().map(|c| c.id).collect();
        self.assignments
            .iter()
            .filter(|a| mine.contains(&a.course_id))
            .collect()
    }

    /// Assignments of the courses the student is enrolled in.
    pub fn student_assignments(&self, student: UserId) -> Vec<&Assignment> {
        self.assignments
            .iter()
            .filter(|a| self.is_enrolled(student, a.course_id))
            .collect()
    }

    pub fn visible_assignments(&self, actor: UserId) -> Result<Vec<&Assignment>, LmsError> {
        let actor = self.actor(actor)?;
        Ok(if actor.role.is_staff() {
            self.admin_assignments(actor.id)
        } else {
            self.student_assignments(actor.id)
        })
    }

    pub fn submit_assignment(
        &mut self,
        actor: UserId,
        assignment_id: AssignmentId,
        answer: &str,
    ) -> Result<Submission, LmsError> {
        let student = self.actor(actor)?;
        if student.role != Role::Student {
            return Err(LmsError::forbidden("Only students can submit assignments."));
        }
        let assignment = self
            .assignment(assignment_id)
            .ok_or_else(|| LmsError::not_found("assignment", assignment_id.0))?
            .clone();
        if !self.is_enrolled(student.id, assignment.course_id) {
            return Err(LmsError::forbidden(
                "Enroll in the course before submitting its assignments.",
            ));
        }
        if self
            .submissions
            .iter()
            .any(|s| s.assignment_id == assignment_id && s.student_id == student.id)
        {
            return Err(LmsError::AlreadySubmitted);
        }
        if assignment.status == AssignmentStatus::Closed {
            return Err(LmsError::validation("This assignment is closed."));
        }

        let submission = Submission {
            id: SubmissionId(self.next_id()),
            assignment_id,
            student_id: student.id,
            student_name: student.name.clone(),
            student_initials: student.initials.clone(),
            student_avatar: student.avatar.clone(),
            assignment_title: assignment.title.clone(),
            course_name: assignment.course_name.clone(),
            course_id: assignment.course_id,
            answer: answer.trim().to_string(),
            submitted_at: Self::today(),
            score: None,
            feedback: String::new(),
            status: SubmissionStatus::Pending,
        };
        self.submissions.insert(0, submission.clone());
        if let Some(a) = self.assignments.iter_mut().find(|a| a.id == assignment_id) {
            a.submissions += 1;
        }
        self.notify_roles(
            Some(&[Role::Admin, Role::Instructor]),
            format!(
                "{} submitted an answer for \"{}\"",
                student.name, assignment.title
            ),
        );
        Ok(submission)
    }

    /// The graded counter moves only on the first pending → graded step.
    pub fn grade_submission(
        &mut self,
        actor: UserId,
        id: SubmissionId,
        score: u32,
        feedback: &str,
    ) -> Result<Submission, LmsError> {
        let grader = self.staff_actor(actor, "grade submissions")?;
        let submission = self
            .submission(id)
            .ok_or_else(|| LmsError::not_found("submission", id.0))?;
        let assignment = self
            .assignment(submission.assignment_id)
            .ok_or_else(|| LmsError::not_found("assignment", submission.assignment_id.0))?;
        let course_owner = self
            .course(assignment.course_id)
            .map(|c| c.created_by)
            .unwrap_or(assignment.created_by);
        if grader.role != Role::Admin && grader.id != course_owner && grader.id != assignment.created_by {
            return Err(LmsError::forbidden(
                "You can only grade submissions for your own courses.",
            ));
        }
        if score > assignment.max_score {
            return Err(LmsError::validation(format!(
                "Score cannot exceed the maximum of {}.",
                assignment.max_score
            )));
        }
        let first_grade = submission.status != SubmissionStatus::Graded;
        let assignment_id = assignment.id;

        let submission = self
            .submissions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| LmsError::not_found("submission", id.0))?;
        submission.score = Some(score);
        submission.feedback = feedback.trim().to_string();
        submission.status = SubmissionStatus::Graded;
        let graded = submission.clone();

        if first_grade {
            if let Some(a) = self.assignments.iter_mut().find(|a| a.id == assignment_id) {
                a.graded += 1;
            }
        }
        self.emit(ServerEvent::SubmissionGraded {
            submission_id: graded.id,
            student_id: graded.student_id,
            course_owner,
            score,
        });
        Ok(graded)
    }

    /// Submissions to assignments of courses the owner created.
    pub fn admin_submissions(&self, owner: UserId) -> Vec<&Submission> {
        let mine: HashSet<_> = self
            .admin_assignments(owner)
            .into_iter()
            .map(|a| a.id)
            .collect();
        self.submissions
            .iter()
            .filter(|s| mine.contains(&s.assignment_id))
            .collect()
    }

    pub fn student_submissions(&self, student: UserId) -> Vec<&Submission> {
        self.submissions
            .iter()
            .filter(|s| s.student_id == student)
            .collect()
    }

    pub fn visible_submissions(&self, actor: UserId) -> Result<Vec<&Submission>, LmsError> {
        let actor = self.actor(actor)?;
        Ok(if actor.role.is_staff() {
            self.admin_submissions(actor.id)
        } else {
            self.student_submissions(actor.id)
        })
    }
}
