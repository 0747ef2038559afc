use chrono::NaiveDate;
use shared::domain::{Role, User, UserId, UserStatus};

use crate::{password::new_credentials, state::LmsState};

/// Bump whenever the seed changes; a mismatch wipes every `dbb_` key.
pub const DB_VERSION: &str = "v4";
pub const KEY_PREFIX: &str = "dbb_";
pub const VERSION_KEY: &str = "dbb_version";

struct DemoAccount {
    id: i64,
    name: &'static str,
    initials: &'static str,
    email: &'static str,
    password: &'static str,
    role: Role,
}

const DEMO_ACCOUNTS: [DemoAccount; 4] = [
    DemoAccount {
        id: 1,
        name: "Admin User",
        initials: "AU",
        email: "admin@gmail.com",
        password: "Admin@123",
        role: Role::Admin,
    },
    DemoAccount {
        id: 2,
        name: "Bhargav",
        initials: "BH",
        email: "ins@gmail.com",
        password: "ins@123",
        role: Role::Instructor,
    },
    DemoAccount {
        id: 3,
        name: "Prasanth",
        initials: "PR",
        email: "cc@gmail.com",
        password: "cc@123",
        role: Role::ContentCreator,
    },
    DemoAccount {
        id: 4,
        name: "Kumar",
        initials: "KU",
        email: "st@gmail.com",
        password: "st@123",
        role: Role::Student,
    },
];

pub fn demo_users() -> Vec<User> {
    let joined = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap_or_default();
    DEMO_ACCOUNTS
        .iter()
        .map(|account| {
            let creds = new_credentials(account.password);
            User {
                id: UserId(account.id),
                name: account.name.to_string(),
                email: account.email.to_string(),
                password_hash: creds.hash,
                password_salt: creds.salt,
                role: account.role,
                initials: account.initials.to_string(),
                avatar: None,
                name_changed: false,
                joined,
                status: UserStatus::Active,
                courses: 0,
            }
        })
        .collect()
}

/// Demo accounts, default platform settings, everything else empty.
pub fn seed_state() -> LmsState {
    LmsState::with_users(demo_users())
}
