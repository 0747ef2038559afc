use super::*;

fn cfg() -> SessionConfig {
    SessionConfig {
        secret: "test-secret".into(),
        ttl_seconds: 60,
    }
}

#[test]
fn token_claims_contain_subject_and_role() {
    let token = mint_token(&cfg(), UserId(7), Role::ContentCreator).expect("token");

    let decoded = decode::<serde_json::Value>(
        &token,
        &DecodingKey::from_secret(b"test-secret"),
        &Validation::new(Algorithm::HS256),
    )
    .expect("decode");

    assert_eq!(decoded.claims["sub"], "user:7");
    assert_eq!(decoded.claims["role"], "Content Creator");
    let iat = decoded.claims["iat"].as_i64().expect("iat");
    let exp = decoded.claims["exp"].as_i64().expect("exp");
    assert_eq!(exp - iat, 60);
}

#[test]
fn verify_round_trips_user_id() {
    let token = mint_token(&cfg(), UserId(42), Role::Student).expect("token");
    assert_eq!(verify_token(&cfg(), &token), Some(UserId(42)));
}

#[test]
fn verify_rejects_foreign_secret_and_garbage() {
    let token = mint_token(&cfg(), UserId(42), Role::Student).expect("token");
    let other = SessionConfig {
        secret: "other".into(),
        ttl_seconds: 60,
    };
    assert_eq!(verify_token(&other, &token), None);
    assert_eq!(verify_token(&cfg(), "not-a-token"), None);
}

#[test]
fn verify_rejects_expired_tokens() {
    let expired = SessionConfig {
        secret: "test-secret".into(),
        ttl_seconds: -3600,
    };
    let token = mint_token(&expired, UserId(1), Role::Admin).expect("token");
    assert_eq!(verify_token(&cfg(), &token), None);
}
