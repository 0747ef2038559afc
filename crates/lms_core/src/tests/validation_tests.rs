use super::*;

fn signup(password: &str, confirm: &str) -> RegisterRequest {
    RegisterRequest {
        name: "Asha Rao".into(),
        email: "asha@example.com".into(),
        password: password.into(),
        confirm_password: confirm.into(),
        role: None,
        staff_code: None,
    }
}

#[test]
fn accepts_reasonable_emails() {
    assert!(is_valid_email("st@gmail.com"));
    assert!(is_valid_email("first.last@school.co.in"));
}

#[test]
fn rejects_malformed_emails() {
    for bad in ["", "plain", "@gmail.com", "a@b", "a b@c.com", "a@@c.com", "a@.com", "a@com."] {
        assert!(!is_valid_email(bad), "{bad:?} should be rejected");
    }
}

#[test]
fn initials_use_first_two_words() {
    assert_eq!(initials("admin user"), "AU");
    assert_eq!(initials("Ravi Kumar Varma"), "RK");
    assert_eq!(initials("  kumar "), "K");
    assert_eq!(initials(""), "");
}

#[test]
fn password_checklist_counts_each_rule() {
    let checks = password_checks("abc");
    assert!(checks.lowercase);
    assert!(!checks.min_length);
    assert_eq!(checks.passed(), 1);

    let strong = password_checks("Strong#Pass1");
    assert!(strong.all_met());
}

#[test]
fn signup_defaults_to_student() {
    let role = validate_signup(&signup("Secret123", "Secret123"), DEFAULT_STAFF_CODE)
        .expect("valid signup");
    assert_eq!(role, Role::Student);
}

#[test]
fn signup_reports_first_failing_rule() {
    let short = validate_signup(&signup("Ab1", "Ab1"), DEFAULT_STAFF_CODE).unwrap_err();
    assert_eq!(short, "Password must be at least 8 characters.");

    let no_upper = validate_signup(&signup("secret123", "secret123"), DEFAULT_STAFF_CODE).unwrap_err();
    assert_eq!(no_upper, "Password needs at least one uppercase letter.");

    let no_digit = validate_signup(&signup("SecretPass", "SecretPass"), DEFAULT_STAFF_CODE).unwrap_err();
    assert_eq!(no_digit, "Password needs at least one number.");

    let mismatch = validate_signup(&signup("Secret123", "Secret124"), DEFAULT_STAFF_CODE).unwrap_err();
    assert_eq!(mismatch, "Passwords do not match.");

    let mut unnamed = signup("Secret123", "Secret123");
    unnamed.name = " A ".into();
    assert_eq!(
        validate_signup(&unnamed, DEFAULT_STAFF_CODE).unwrap_err(),
        "Full name must be at least 2 characters."
    );
}

#[test]
fn staff_signup_requires_matching_code() {
    let mut req = signup("Secret123", "Secret123");
    req.role = Some(Role::Instructor);
    assert_eq!(
        validate_signup(&req, DEFAULT_STAFF_CODE).unwrap_err(),
        "Invalid Staff Code."
    );

    req.staff_code = Some(" DBBLMS ".into());
    assert_eq!(
        validate_signup(&req, DEFAULT_STAFF_CODE).expect("code accepted"),
        Role::Instructor
    );
    assert!(validate_signup(&req, "OTHER").is_err());
}

#[test]
fn admin_created_users_need_six_character_passwords() {
    assert!(validate_new_user("Kiran", "kiran@example.com", "abc123").is_ok());
    assert_eq!(
        validate_new_user("", "kiran@example.com", "abc123").unwrap_err(),
        "Name is required."
    );
    assert_eq!(
        validate_new_user("Kiran", "kiran@example.com", "abc").unwrap_err(),
        "Password must be at least 6 characters."
    );
}
