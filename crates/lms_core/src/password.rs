use sha2::{Digest, Sha256};
use uuid::Uuid;

pub struct Credentials {
    pub hash: String,
    pub salt: String,
}

pub fn new_credentials(password: &str) -> Credentials {
    let salt = Uuid::new_v4().simple().to_string();
    Credentials {
        hash: hash_password(&salt, password),
        salt,
    }
}

pub fn hash_password(salt: &str, password: &str) -> String {
    format!("{:x}", Sha256::digest(format!("{salt}:{password}").as_bytes()))
}

pub fn verify_password(salt: &str, expected_hash: &str, password: &str) -> bool {
    let candidate = hash_password(salt, password);
    if candidate.len() != expected_hash.len() {
        return false;
    }
    candidate
        .bytes()
        .zip(expected_hash.bytes())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifies_matching_password_only() {
        let creds = new_credentials("Admin@123");
        assert!(verify_password(&creds.salt, &creds.hash, "Admin@123"));
        assert!(!verify_password(&creds.salt, &creds.hash, "admin@123"));
    }

    #[test]
    fn salts_differ_between_accounts() {
        let a = new_credentials("same");
        let b = new_credentials("same");
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.hash, b.hash);
    }
}
