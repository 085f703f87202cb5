use super::*;

// =============================================================================
// normalize_email
// =============================================================================

#[test]
fn normalize_email_lowercases_and_trims() {
    assert_eq!(normalize_email("  User@Example.COM "), Some("user@example.com".into()));
}

#[test]
fn normalize_email_rejects_malformed() {
    for bad in ["", "user", "@example.com", "user@", "a@b@c", "us er@example.com"] {
        assert_eq!(normalize_email(bad), None, "expected rejection for {bad:?}");
    }
}

// =============================================================================
// names, passwords, roles
// =============================================================================

#[test]
fn normalize_name_trims() {
    assert_eq!(normalize_name("  Jane Doe ").unwrap(), "Jane Doe");
}

#[test]
fn normalize_name_rejects_blank_and_long() {
    assert!(matches!(normalize_name("   "), Err(AccountError::InvalidName)));
    let long = "x".repeat(MAX_NAME_LEN + 1);
    assert!(matches!(normalize_name(&long), Err(AccountError::InvalidName)));
}

#[test]
fn short_password_is_weak() {
    assert!(matches!(check_password("1234567"), Err(AccountError::WeakPassword)));
    assert!(check_password("12345678").is_ok());
}

#[test]
fn role_for_listed_email_is_admin() {
    let admins = vec!["admin@example.com".to_owned()];
    assert_eq!(role_for_email("admin@example.com", &admins), UserRole::Admin);
    assert_eq!(role_for_email("user@example.com", &admins), UserRole::User);
    assert_eq!(role_for_email("admin@example.com", &[]), UserRole::User);
}

#[test]
fn password_hash_round_trip() {
    let hash = hash_password("correct horse").unwrap();
    assert!(hash.starts_with("$argon2id$"));
    assert!(verify_password("correct horse", &hash));
    assert!(!verify_password("wrong horse", &hash));
}

#[test]
fn password_hashes_are_salted() {
    assert_ne!(hash_password("same-password").unwrap(), hash_password("same-password").unwrap());
}

#[test]
fn unknown_user_hash_is_a_real_argon2id_hash() {
    assert!(UNKNOWN_USER_HASH.starts_with("$argon2id$"));
    assert!(PasswordHash::new(&UNKNOWN_USER_HASH).is_ok());
    assert!(!verify_password("password123", &UNKNOWN_USER_HASH));
}

#[test]
fn malformed_hash_never_verifies() {
    assert!(!verify_password("anything", "not-a-phc-string"));
    assert!(!verify_password("anything", ""));
}

// =============================================================================
// enums
// =============================================================================

#[test]
fn enum_strings_round_trip() {
    for role in [UserRole::User, UserRole::Admin] {
        assert_eq!(UserRole::parse(role.as_str()), Some(role));
    }
    for gender in [Gender::Male, Gender::Female, Gender::Other] {
        assert_eq!(Gender::parse(gender.as_str()), Some(gender));
    }
    for category in [Category::General, Category::Obc, Category::Sc, Category::St] {
        assert_eq!(Category::parse(category.as_str()), Some(category));
    }
    assert_eq!(Category::parse("OBC"), None);
}

// =============================================================================
// ProfilePatch / Profile::apply
// =============================================================================

fn filled_profile() -> Profile {
    Profile {
        mother_name: Some("Jane Doe".into()),
        father_name: Some("Jack Doe".into()),
        age: Some(28),
        gender: Some(Gender::Male),
        domicile_state: Some("California".into()),
        domicile_certificate_number: Some("CA-12345-2023".into()),
        domicile_city: None,
        domicile_issue_date: None,
        category: Some(Category::General),
    }
}

#[test]
fn absent_keys_leave_profile_unchanged() {
    let patch: ProfilePatch = serde_json::from_str("{}").unwrap();
    let mut profile = filled_profile();
    profile.apply(patch).unwrap();
    assert_eq!(profile, filled_profile());
}

#[test]
fn null_clears_and_values_replace() {
    let patch: ProfilePatch = serde_json::from_str(
        r#"{"mother_name": null, "age": 30, "category": "obc", "domicile_issue_date": "2023-04-01"}"#,
    )
    .unwrap();
    let mut profile = filled_profile();
    profile.apply(patch).unwrap();

    assert_eq!(profile.mother_name, None);
    assert_eq!(profile.age, Some(30));
    assert_eq!(profile.category, Some(Category::Obc));
    assert_eq!(profile.domicile_issue_date, Some(time::macros::date!(2023 - 04 - 01)));
    assert_eq!(profile.father_name.as_deref(), Some("Jack Doe"));
}

#[test]
fn blank_text_is_treated_as_clear() {
    let patch: ProfilePatch = serde_json::from_str(r#"{"domicile_state": "   "}"#).unwrap();
    let mut profile = filled_profile();
    profile.apply(patch).unwrap();
    assert_eq!(profile.domicile_state, None);
}

#[test]
fn out_of_range_age_is_rejected_without_changes() {
    let patch: ProfilePatch = serde_json::from_str(r#"{"age": 0, "mother_name": "X"}"#).unwrap();
    let mut profile = filled_profile();
    assert!(matches!(profile.apply(patch), Err(AccountError::InvalidAge)));
    assert_eq!(profile, filled_profile());
}

#[test]
fn invalid_enum_value_fails_to_parse() {
    assert!(serde_json::from_str::<ProfilePatch>(r#"{"gender": "unknown"}"#).is_err());
    assert!(serde_json::from_str::<ProfilePatch>(r#"{"domicile_issue_date": "01/04/2023"}"#).is_err());
}

#[test]
fn profile_serializes_date_as_iso() {
    let profile = Profile { domicile_issue_date: Some(time::macros::date!(2021 - 12 - 31)), ..Profile::default() };
    let json = serde_json::to_value(&profile).unwrap();
    assert_eq!(json["domicile_issue_date"], "2021-12-31");
    assert!(json["category"].is_null());
}

#[test]
fn user_serializes_profile_flat() {
    let user = User {
        id: Uuid::nil(),
        name: "John Doe".into(),
        email: "user@example.com".into(),
        role: UserRole::User,
        profile: filled_profile(),
        created_at: OffsetDateTime::UNIX_EPOCH,
    };
    let json = serde_json::to_value(&user).unwrap();
    assert_eq!(json["role"], "user");
    assert_eq!(json["mother_name"], "Jane Doe");
    assert_eq!(json["created_at"], "1970-01-01T00:00:00Z");
}

// =============================================================================
// LIVE DB
// =============================================================================

#[cfg(feature = "live-db-tests")]
mod live_db {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    async fn integration_pool() -> PgPool {
        let url = std::env::var("TEST_DATABASE_URL")
            .or_else(|_| std::env::var("DATABASE_URL"))
            .expect("TEST_DATABASE_URL or DATABASE_URL required for live-db-tests");
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect(&url)
            .await
            .expect("connect");
        sqlx::migrate!("src/db/migrations").run(&pool).await.expect("migrate");
        pool
    }

    #[tokio::test]
    async fn signup_login_and_duplicate() {
        let pool = integration_pool().await;
        let email = format!("Acct-{}@Example.com", Uuid::new_v4());

        let user = signup(&pool, &email, "password123", "Acct", &[]).await.unwrap();
        assert_eq!(user.email, email.to_ascii_lowercase());
        assert_eq!(user.role, UserRole::User);

        let again = signup(&pool, &email.to_ascii_uppercase(), "password123", "Acct", &[]).await;
        assert!(matches!(again, Err(AccountError::EmailTaken)));

        let logged_in = login(&pool, &email, "password123").await.unwrap();
        assert_eq!(logged_in.id, user.id);
        assert!(matches!(login(&pool, &email, "nope-nope").await, Err(AccountError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn profile_update_persists() {
        let pool = integration_pool().await;
        let email = format!("profile-{}@example.com", Uuid::new_v4());
        let user = signup(&pool, &email, "password123", "Prof", &[email.clone()]).await.unwrap();
        assert_eq!(user.role, UserRole::Admin);

        let patch: ProfilePatch = serde_json::from_str(r#"{"name": "Renamed", "age": 41, "gender": "female"}"#).unwrap();
        let updated = update_profile(&pool, user.id, patch).await.unwrap();
        assert_eq!(updated.name, "Renamed");
        assert_eq!(updated.profile.age, Some(41));
        assert_eq!(updated.profile.gender, Some(Gender::Female));

        let listed = list_users_with_counts(&pool, None).await.unwrap();
        let mine = listed.iter().find(|u| u.user.id == user.id).unwrap();
        assert_eq!(mine.documents_total, 0);
    }

    #[tokio::test]
    async fn user_search_matches_name_or_email() {
        let pool = integration_pool().await;
        let tag = Uuid::new_v4().simple().to_string();
        let email = format!("search-{tag}@example.com");
        let user = signup(&pool, &email, "password123", &format!("Searchable {tag}"), &[]).await.unwrap();

        let by_email = list_users_with_counts(&pool, Some(&email.to_ascii_uppercase())).await.unwrap();
        assert_eq!(by_email.iter().map(|u| u.user.id).collect::<Vec<_>>(), vec![user.id]);

        let by_name = list_users_with_counts(&pool, Some(&format!("searchable {tag}"))).await.unwrap();
        assert_eq!(by_name.len(), 1);

        let none = list_users_with_counts(&pool, Some(&format!("absent-{tag}"))).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn unknown_email_login_is_rejected() {
        let pool = integration_pool().await;
        let email = format!("nobody-{}@example.com", Uuid::new_v4());
        assert!(matches!(login(&pool, &email, "password123").await, Err(AccountError::InvalidCredentials)));
    }
}
