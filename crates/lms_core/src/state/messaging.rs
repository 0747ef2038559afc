use chrono::Utc;
use shared::{
    domain::{Message, MessageId, Notification, NotificationId, PlatformSettings, Role, UserId},
    protocol::{ComposeMessage, SettingsPatch},
};

use super::{required, LmsState};
use crate::{error::LmsError, validation::is_valid_email};

impl LmsState {
    pub fn send_message(&mut self, actor: UserId, input: &ComposeMessage) -> Result<Message, LmsError> {
        let sender = self.actor(actor)?;
        let body = required(&input.body, "Message body is required.")?;
        if input.to_id == sender.id {
            return Err(LmsError::validation("You cannot message yourself."));
        }
        let recipient = self
            .user(input.to_id)
            .ok_or_else(|| LmsError::not_found("user", input.to_id.0))?;
        if !recipient.is_active() {
            return Err(LmsError::validation("That account is deactivated."));
        }
        let to_name = recipient.name.clone();
        let subject = match input.subject.trim() {
            "" => "(no subject)".to_string(),
            s => s.to_string(),
        };

        let message = Message {
            id: MessageId(self.next_id()),
            from_id: sender.id,
            to_id: input.to_id,
            from_name: sender.name.clone(),
            to_name,
            subject,
            body,
            sent_at: Utc::now(),
            read_by_to: false,
            deleted_by_from: false,
            deleted_by_to: false,
        };
        self.messages.insert(0, message.clone());
        Ok(message)
    }

    /// Newest first, hiding messages the recipient deleted.
    pub fn inbox(&self, user: UserId) -> Vec<&Message> {
        self.messages
            .iter()
            .filter(|m| m.to_id == user && !m.deleted_by_to)
            .collect()
    }

    pub fn sent(&self, user: UserId) -> Vec<&Message> {
        self.messages
            .iter()
            .filter(|m| m.from_id == user && !m.deleted_by_from)
            .collect()
    }

    pub fn unread_count(&self, user: UserId) -> usize {
        self.inbox(user).iter().filter(|m| !m.read_by_to).count()
    }

    pub fn mark_message_read(&mut self, actor: UserId, id: MessageId) -> Result<(), LmsError> {
        let reader = self.actor(actor)?;
        let message = self
            .messages
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| LmsError::not_found("message", id.0))?;
        if message.to_id != reader.id {
            return Err(LmsError::forbidden("Only the recipient can mark a message read."));
        }
        message.read_by_to = true;
        Ok(())
    }

    /// Hides the message for the deleting side; it is dropped once both
    /// sides have deleted it.
    pub fn delete_message(&mut self, actor: UserId, id: MessageId) -> Result<(), LmsError> {
        let user = self.actor(actor)?;
        let message = self
            .messages
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| LmsError::not_found("message", id.0))?;
        match (message.from_id == user.id, message.to_id == user.id) {
            (false, false) => {
                return Err(LmsError::forbidden("That message is not yours."));
            }
            (from, to) => {
                message.deleted_by_from |= from;
                message.deleted_by_to |= to;
            }
        }
        self.messages.retain(|m| !(m.deleted_by_from && m.deleted_by_to));
        Ok(())
    }

    /// Notifications targeted at the role or at everyone, newest first.
    pub fn notifications_for(&self, role: Role) -> Vec<&Notification> {
        self.notifications.iter().filter(|n| n.targets(role)).collect()
    }

    pub fn mark_notification_read(&mut self, actor: UserId, id: NotificationId) -> Result<(), LmsError> {
        let reader = self.actor(actor)?;
        let notification = self
            .notifications
            .iter_mut()
            .find(|n| n.id == id && n.targets(reader.role))
            .ok_or_else(|| LmsError::not_found("notification", id.0))?;
        notification.read = true;
        Ok(())
    }

    /// Returns how many notifications changed state.
    pub fn mark_all_read(&mut self, actor: UserId) -> Result<usize, LmsError> {
        let reader = self.actor(actor)?;
        let mut changed = 0;
        for n in self
            .notifications
            .iter_mut()
            .filter(|n| n.targets(reader.role) && !n.read)
        {
            n.read = true;
            changed += 1;
        }
        Ok(changed)
    }

    pub fn update_platform_settings(
        &mut self,
        actor: UserId,
        patch: &SettingsPatch,
    ) -> Result<PlatformSettings, LmsError> {
        let admin = self.admin_actor(actor, "change platform settings")?;
        if let Some(email) = &patch.contact_email {
            if !is_valid_email(email.trim()) {
                return Err(LmsError::validation("Enter a valid contact email address."));
            }
        }

        let settings = &mut self.platform_settings;
        if let Some(email) = &patch.contact_email {
            settings.contact_email = email.trim().to_string();
        }
        if let Some(phone) = &patch.contact_phone {
            settings.contact_phone = phone.trim().to_string();
        }
        if let Some(about) = &patch.about_text {
            settings.about_text = about.trim().to_string();
        }
        if let Some(enabled) = patch.certificates_enabled {
            settings.certificates_enabled = enabled;
        }
        let updated = settings.clone();
        self.notify_roles(
            Some(&[Role::Admin]),
            format!("{} updated the platform information.", admin.name),
        );
        Ok(updated)
    }
}
