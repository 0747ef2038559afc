use chrono::Utc;
use shared::{
    domain::{AttemptId, Quiz, QuizAttempt, QuizId, QuizQuestion, Role, UserId},
    protocol::QuizDraft,
};

use super::{required, LmsState};
use crate::error::LmsError;

/// Counts answers that pick exactly the correct option; missing answers
/// score nothing.
pub fn score_answers(questions: &[QuizQuestion], answers: &[Option<usize>]) -> u32 {
    questions
        .iter()
        .enumerate()
        .filter(|(i, q)| answers.get(*i).copied().flatten() == Some(q.answer))
        .count() as u32
}

fn validate_questions(questions: &[QuizQuestion]) -> Result<Vec<QuizQuestion>, LmsError> {
    if questions.is_empty() {
        return Err(LmsError::validation("A quiz needs at least one question."));
    }
    questions
        .iter()
        .enumerate()
        .map(|(i, q)| {
            let number = i + 1;
            let prompt = required(&q.prompt, &format!("Question {number} needs a prompt."))?;
            if q.options.len() < 2 {
                return Err(LmsError::validation(format!(
                    "Question {number} needs at least two options."
                )));
            }
            let options = q
                .options
                .iter()
                .map(|o| required(o, &format!("Every option of question {number} needs text.")))
                .collect::<Result<Vec<_>, _>>()?;
            if q.answer >= options.len() {
                return Err(LmsError::validation(format!(
                    "Question {number} marks an option that does not exist."
                )));
            }
            Ok(QuizQuestion {
                prompt,
                options,
                answer: q.answer,
            })
        })
        .collect()
}

impl LmsState {
    pub fn quiz(&self, id: QuizId) -> Option<&Quiz> {
        self.quizzes.iter().find(|q| q.id == id)
    }

    fn check_quiz_draft(&self, draft: &QuizDraft) -> Result<(String, Vec<QuizQuestion>), LmsError> {
        let title = required(&draft.title, "Quiz title is required.")?;
        if let Some(course_id) = draft.course_id {
            if self.course(course_id).is_none() {
                return Err(LmsError::not_found("course", course_id.0));
            }
        }
        Ok((title, validate_questions(&draft.questions)?))
    }

    pub fn add_quiz(&mut self, actor: UserId, draft: &QuizDraft) -> Result<Quiz, LmsError> {
        let actor = self.staff_actor(actor, "create quizzes")?;
        let (title, questions) = self.check_quiz_draft(draft)?;
        let quiz = Quiz {
            id: QuizId(self.next_id()),
            title,
            course_id: draft.course_id,
            allow_retake: draft.allow_retake,
            time_limit: draft.time_limit,
            due_date: draft.due_date,
            questions,
            created_by: actor.id,
            created_at: Self::today(),
        };
        self.quizzes.insert(0, quiz.clone());
        Ok(quiz)
    }

    pub fn update_quiz(&mut self, actor: UserId, id: QuizId, draft: &QuizDraft) -> Result<Quiz, LmsError> {
        let actor = self.staff_actor(actor, "edit quizzes")?;
        let existing = self
            .quiz(id)
            .ok_or_else(|| LmsError::not_found("quiz", id.0))?;
        Self::ensure_owner_or_admin(&actor, existing.created_by, "edit")?;
        let (title, questions) = self.check_quiz_draft(draft)?;

        let quiz = self
            .quizzes
            .iter_mut()
            .find(|q| q.id == id)
            .ok_or_else(|| LmsError::not_found("quiz", id.0))?;
        quiz.title = title;
        quiz.course_id = draft.course_id;
        quiz.allow_retake = draft.allow_retake;
        quiz.time_limit = draft.time_limit;
        quiz.due_date = draft.due_date;
        quiz.questions = questions;
        Ok(quiz.clone())
    }

    /// Returns the number of attempts removed with the quiz.
    pub fn delete_quiz(&mut self, actor: UserId, id: QuizId) -> Result<usize, LmsError> {
        let actor = self.staff_actor(actor, "delete quizzes")?;
        let existing = self
            .quiz(id)
            .ok_or_else(|| LmsError::not_found("quiz", id.0))?;
        Self::ensure_owner_or_admin(&actor, existing.created_by, "delete")?;

        self.quizzes.retain(|q| q.id != id);
        let before = self.quiz_attempts.len();
        self.quiz_attempts.retain(|a| a.quiz_id != id);
        Ok(before - self.quiz_attempts.len())
    }

    /// Students and admins see every quiz; other staff see their own.
    pub fn visible_quizzes(&self, actor: UserId) -> Result<Vec<&Quiz>, LmsError> {
        let actor = self.actor(actor)?;
        Ok(match actor.role {
            Role::Student | Role::Admin => self.quizzes.iter().collect(),
            _ => self
                .quizzes
                .iter()
                .filter(|q| q.created_by == actor.id)
                .collect(),
        })
    }

    pub fn submit_quiz_attempt(
        &mut self,
        actor: UserId,
        quiz_id: QuizId,
        answers: &[Option<usize>],
    ) -> Result<QuizAttempt, LmsError> {
        let student = self.actor(actor)?;
        if student.role != Role::Student {
            return Err(LmsError::forbidden("Only students can take quizzes."));
        }
        let quiz = self
            .quiz(quiz_id)
            .ok_or_else(|| LmsError::not_found("quiz", quiz_id.0))?;
        if quiz.due_date.is_some_and(|due| due < Self::today()) {
            return Err(LmsError::validation("This quiz is past its due date."));
        }
        if answers.len() > quiz.questions.len() {
            return Err(LmsError::validation("More answers than questions."));
        }
        if !quiz.allow_retake && !self.attempts_by(quiz_id, student.id).is_empty() {
            return Err(LmsError::RetakeNotAllowed);
        }

        let mut padded = answers.to_vec();
        padded.resize(quiz.questions.len(), None);
        let score = score_answers(&quiz.questions, &padded);
        let total = quiz.questions.len() as u32;

        let attempt = QuizAttempt {
            id: AttemptId(self.next_id()),
            quiz_id,
            user_id: student.id,
            answers: padded,
            score,
            total,
            taken_at: Utc::now(),
        };
        self.quiz_attempts.push(attempt.clone());
        Ok(attempt)
    }

    /// Attempts of one user at one quiz, oldest first.
    pub fn attempts_by(&self, quiz: QuizId, user: UserId) -> Vec<&QuizAttempt> {
        self.quiz_attempts
            .iter()
            .filter(|a| a.quiz_id == quiz && a.user_id == user)
            .collect()
    }

    /// Highest score ratio; the earliest attempt wins ties.
    pub fn best_attempt(&self, quiz: QuizId, user: UserId) -> Option<&QuizAttempt> {
        self.attempts_by(quiz, user)
            .into_iter()
            .fold(None, |best: Option<&QuizAttempt>, a| match best {
                Some(b) if a.ratio() <= b.ratio() => Some(b),
                _ => Some(a),
            })
    }

    /// Every attempt at a quiz; visible to its creator and admins.
    pub fn attempts_for_quiz(&self, actor: UserId, quiz: QuizId) -> Result<Vec<&QuizAttempt>, LmsError> {
        let actor = self.actor(actor)?;
        let existing = self
            .quiz(quiz)
            .ok_or_else(|| LmsError::not_found("quiz", quiz.0))?;
        if actor.role == Role::Student {
            return Ok(self.attempts_by(quiz, actor.id));
        }
        Self::ensure_owner_or_admin(&actor, existing.created_by, "review attempts of")?;
        Ok(self
            .quiz_attempts
            .iter()
            .filter(|a| a.quiz_id == quiz)
            .collect())
    }
}
