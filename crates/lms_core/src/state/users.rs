use shared::{
    domain::{Role, User, UserId, UserStatus},
    protocol::{NewUser, UserPatch, UserProfile},
};

use super::{required, LmsState};
use crate::{
    error::LmsError,
    password::new_credentials,
    validation::{initials, is_valid_email, normalize_email, validate_new_user, validate_password_reset},
};

impl LmsState {
    pub fn user_profiles(&self) -> Vec<UserProfile> {
        self.users.iter().map(UserProfile::from).collect()
    }

    pub fn add_user(&mut self, actor: UserId, input: &NewUser) -> Result<User, LmsError> {
        self.admin_actor(actor, "add users")?;
        validate_new_user(&input.name, &input.email, &input.password)
            .map_err(LmsError::Validation)?;
        if self.email_taken(&input.email, None) {
            return Err(LmsError::validation("A user with this email already exists."));
        }

        let name = input.name.trim().to_string();
        let creds = new_credentials(&input.password);
        let user = User {
            id: UserId(self.next_id()),
            initials: initials(&name),
            name,
            email: normalize_email(&input.email),
            password_hash: creds.hash,
            password_salt: creds.salt,
            role: input.role,
            avatar: None,
            name_changed: false,
            joined: Self::today(),
            status: input.status,
            courses: 0,
        };
        self.users.insert(0, user.clone());
        Ok(user)
    }

    pub fn update_user(&mut self, actor: UserId, id: UserId, patch: &UserPatch) -> Result<User, LmsError> {
        let admin = self.admin_actor(actor, "edit users")?;
        if self.user(id).is_none() {
            return Err(LmsError::not_found("user", id.0));
        }
        let name = patch
            .name
            .as_deref()
            .map(|n| required(n, "Name is required."))
            .transpose()?;
        if let Some(email) = &patch.email {
            if !is_valid_email(email.trim()) {
                return Err(LmsError::validation("Enter a valid email address."));
            }
            if self.email_taken(email, Some(id)) {
                return Err(LmsError::validation("A user with this email already exists."));
            }
        }
        if let Some(password) = &patch.password {
            validate_password_reset(password).map_err(LmsError::Validation)?;
        }
        if admin.id == id {
            if patch.status == Some(UserStatus::Inactive) {
                return Err(LmsError::validation("You cannot deactivate your own account."));
            }
            if patch.role.is_some_and(|r| r != Role::Admin) {
                return Err(LmsError::validation("You cannot remove your own admin role."));
            }
        }

        let user = self
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| LmsError::not_found("user", id.0))?;
        if let Some(name) = &name {
            user.initials = initials(name);
            user.name = name.clone();
        }
        if let Some(email) = &patch.email {
            user.email = normalize_email(email);
        }
        if let Some(role) = patch.role {
            user.role = role;
        }
        if let Some(status) = patch.status {
            user.status = status;
        }
        if let Some(password) = &patch.password {
            let creds = new_credentials(password);
            user.password_hash = creds.hash;
            user.password_salt = creds.salt;
        }
        let updated = user.clone();
        if name.is_some() {
            self.propagate_display_name(&updated);
        }
        Ok(updated)
    }

    /// Removes the account, its enrollments, ratings, attempts and
    /// certificates. Submissions keep their display copies.
    pub fn delete_user(&mut self, actor: UserId, id: UserId) -> Result<(), LmsError> {
        let admin = self.admin_actor(actor, "delete users")?;
        if admin.id == id {
            return Err(LmsError::validation("You cannot delete your own account."));
        }
        if self.user(id).is_none() {
            return Err(LmsError::not_found("user", id.0));
        }

        self.users.retain(|u| u.id != id);
        for (course_id, members) in self.enrollments.iter_mut() {
            let before = members.len();
            members.retain(|m| *m != id);
            if members.len() != before {
                if let Some(course) = self.courses.iter_mut().find(|c| c.id == *course_id) {
                    course.students = course.students.saturating_sub(1);
                }
            }
        }
        let rated: Vec<_> = self
            .ratings
            .iter()
            .filter(|r| r.user_id == id)
            .map(|r| r.course_id)
            .collect();
        self.ratings.retain(|r| r.user_id != id);
        for course_id in rated {
            self.recompute_rating(course_id);
        }
        self.quiz_attempts.retain(|a| a.user_id != id);
        self.certificates.retain(|c| c.user_id != id);
        for message in self.messages.iter_mut() {
            if message.from_id == id {
                message.deleted_by_from = true;
            }
            if message.to_id == id {
                message.deleted_by_to = true;
            }
        }
        self.messages.retain(|m| !(m.deleted_by_from && m.deleted_by_to));
        Ok(())
    }

    /// Students may rename themselves once; staff any number of times.
    pub fn update_profile_name(&mut self, actor: UserId, name: &str) -> Result<User, LmsError> {
        let current = self.actor(actor)?;
        let name = required(name, "Name is required.")?;
        if current.role == Role::Student && current.name_changed {
            return Err(LmsError::forbidden("Your name can only be changed once."));
        }

        let user = self
            .users
            .iter_mut()
            .find(|u| u.id == actor)
            .ok_or(LmsError::Unauthorized)?;
        user.initials = initials(&name);
        user.name = name;
        user.name_changed = true;
        let updated = user.clone();
        self.propagate_display_name(&updated);
        Ok(updated)
    }

    /// Refreshes the name copies held by the user's submissions and courses.
    fn propagate_display_name(&mut self, user: &User) {
        for submission in self.submissions.iter_mut().filter(|s| s.student_id == user.id) {
            submission.student_name = user.name.clone();
            submission.student_initials = user.initials.clone();
        }
        for course in self.courses.iter_mut().filter(|c| c.created_by == user.id) {
            course.created_by_name = user.name.clone();
        }
    }

    /// Also refreshes the avatar copied onto the user's submissions.
    pub fn update_user_avatar(
        &mut self,
        actor: UserId,
        id: UserId,
        avatar: Option<String>,
    ) -> Result<User, LmsError> {
        let current = self.actor(actor)?;
        if current.id != id && current.role != Role::Admin {
            return Err(LmsError::forbidden("You can only change your own avatar."));
        }
        let user = self
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| LmsError::not_found("user", id.0))?;
        user.avatar = avatar.clone();
        let updated = user.clone();
        for submission in self.submissions.iter_mut().filter(|s| s.student_id == id) {
            submission.student_avatar = avatar.clone();
        }
        Ok(updated)
    }
}
