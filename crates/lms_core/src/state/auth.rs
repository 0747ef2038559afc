use shared::{
    domain::{User, UserId, UserStatus},
    protocol::RegisterRequest,
};
use tracing::info;

use super::LmsState;
use crate::{
    error::LmsError,
    password::{new_credentials, verify_password},
    validation::{initials, normalize_email, validate_signup},
};

impl LmsState {
    pub fn find_user_by_email(&self, email: &str) -> Option<&User> {
        let email = normalize_email(email);
        self.users.iter().find(|u| u.email.to_lowercase() == email)
    }

    pub(crate) fn email_taken(&self, email: &str, except: Option<UserId>) -> bool {
        self.find_user_by_email(email)
            .is_some_and(|u| Some(u.id) != except)
    }

    /// Unknown email, then wrong password, then deactivated account.
    pub fn login(&self, email: &str, password: &str) -> Result<User, LmsError> {
        let user = self
            .find_user_by_email(email)
            .ok_or(LmsError::UnknownEmail)?;
        if !verify_password(&user.password_salt, &user.password_hash, password) {
            return Err(LmsError::WrongPassword);
        }
        if user.status == UserStatus::Inactive {
            return Err(LmsError::AccountInactive);
        }
        Ok(user.clone())
    }

    pub fn register(&mut self, req: &RegisterRequest, staff_code: &str) -> Result<User, LmsError> {
        let role = validate_signup(req, staff_code).map_err(LmsError::Validation)?;
        if self.email_taken(&req.email, None) {
            return Err(LmsError::DuplicateEmail);
        }

        let name = req.name.trim().to_string();
        let creds = new_credentials(&req.password);
        let user = User {
            id: UserId(self.next_id()),
            initials: initials(&name),
            name,
            email: normalize_email(&req.email),
            password_hash: creds.hash,
            password_salt: creds.salt,
            role,
            avatar: None,
            name_changed: false,
            joined: Self::today(),
            status: UserStatus::Active,
            courses: 0,
        };
        info!(user_id = user.id.0, role = %user.role, "registered account");
        self.users.push(user.clone());
        Ok(user)
    }
}
