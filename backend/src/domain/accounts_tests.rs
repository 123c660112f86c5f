//! Tests for the account service.

use std::sync::Arc;

use chrono::{DateTime, Local, TimeZone, Utc};
use rstest::rstest;

use super::*;
use crate::domain::ports::{MockPasswordHasher, MockUserRepository};
use crate::domain::{ErrorCode, PasswordHash, UserName};

struct FixtureClock {
    utc_now: DateTime<Utc>,
}

impl Clock for FixtureClock {
    fn local(&self) -> DateTime<Local> {
        self.utc_now.with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        self.utc_now
    }
}

fn fixture_timestamp() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 1, 8, 0, 0)
        .single()
        .expect("valid fixture timestamp")
}

type Service = AccountService<MockUserRepository, MockPasswordHasher>;

fn service(repo: MockUserRepository, hasher: MockPasswordHasher) -> Service {
    AccountService::new(
        Arc::new(repo),
        Arc::new(hasher),
        Arc::new(FixtureClock {
            utc_now: fixture_timestamp(),
        }),
    )
}

fn stored(active: bool) -> UserRecord {
    let created = Utc
        .with_ymd_and_hms(2026, 1, 1, 0, 0, 0)
        .single()
        .expect("valid timestamp");
    UserRecord {
        user: User::new(
            UserId::random(),
            EmailAddress::new("ada@example.com").expect("email"),
            UserName::new("Ada").expect("name"),
            active,
            created,
            created,
        ),
        password_hash: PasswordHash::new("hashed:secret"),
    }
}

fn verifying_hasher() -> MockPasswordHasher {
    let mut hasher = MockPasswordHasher::new();
    hasher
        .expect_verify()
        .returning(|password, hash| Ok(hash.as_str() == format!("hashed:{password}")));
    hasher
        .expect_hash()
        .returning(|password| Ok(PasswordHash::new(format!("hashed:{password}"))));
    hasher
}

#[rstest]
#[case("secret", true, Ok(()))]
#[case("wrong", true, Err(ErrorCode::Unauthorized))]
#[case("secret", false, Err(ErrorCode::Forbidden))]
#[tokio::test]
async fn authenticate_checks_password_then_active_flag(
    #[case] password: &str,
    #[case] active: bool,
    #[case] expected: Result<(), ErrorCode>,
) {
    let record = stored(active);
    let user_id = record.user.id().clone();
    let mut repo = MockUserRepository::new();
    repo.expect_find_by_email()
        .times(1)
        .return_once(move |_| Ok(Some(record)));

    let creds = LoginCredentials::try_from_parts("ADA@example.com", password).expect("creds");
    let result = service(repo, verifying_hasher()).authenticate(&creds).await;

    match expected {
        Ok(()) => assert_eq!(result.expect("login succeeds"), user_id),
        Err(code) => assert_eq!(result.expect_err("login fails").code(), code),
    }
}

#[tokio::test]
async fn authenticate_unknown_email_is_unauthorized_after_a_decoy_check() {
    let mut repo = MockUserRepository::new();
    repo.expect_find_by_email().times(2).returning(|_| Ok(None));
    let mut hasher = MockPasswordHasher::new();
    hasher
        .expect_hash()
        .times(1)
        .returning(|password| Ok(PasswordHash::new(format!("hashed:{password}"))));
    hasher
        .expect_verify()
        .withf(|password, hash| {
            password.to_string() == "pw" && hash.as_str() == format!("hashed:{DECOY_PASSWORD}")
        })
        .times(2)
        .returning(|_, _| Ok(false));
    let service = service(repo, hasher);

    let creds = LoginCredentials::try_from_parts("nobody@example.com", "pw").expect("creds");
    for _ in 0..2 {
        let err = service
            .authenticate(&creds)
            .await
            .expect_err("unknown email");
        assert_eq!(err.code(), ErrorCode::Unauthorized);
        assert_eq!(err.message(), INVALID_CREDENTIALS);
    }
}

#[tokio::test]
async fn decoy_hash_failures_still_read_as_invalid_credentials() {
    let mut repo = MockUserRepository::new();
    repo.expect_find_by_email().return_once(|_| Ok(None));
    let mut hasher = MockPasswordHasher::new();
    hasher
        .expect_hash()
        .return_once(|_| Err(PasswordHasherError::hashing("no entropy")));
    hasher.expect_verify().times(0);

    let creds = LoginCredentials::try_from_parts("nobody@example.com", "pw").expect("creds");
    let err = service(repo, hasher)
        .authenticate(&creds)
        .await
        .expect_err("unknown email");

    assert_eq!(err.code(), ErrorCode::Unauthorized);
}

#[tokio::test]
async fn register_hashes_password_and_forces_active() {
    let mut repo = MockUserRepository::new();
    repo.expect_insert()
        .withf(|record| {
            record.user.is_active() && record.password_hash.as_str() == "hashed:hunter2"
        })
        .times(1)
        .return_once(|_| Ok(()));

    let account =
        NewAccount::try_from_parts("grace@example.com", "Grace", "hunter2", false).expect("valid");
    let user = service(repo, verifying_hasher())
        .register(account)
        .await
        .expect("register");

    assert!(user.is_active());
    assert_eq!(user.created_at(), fixture_timestamp());
    assert_eq!(user.updated_at(), fixture_timestamp());
}

#[tokio::test]
async fn create_user_honours_active_flag() {
    let mut repo = MockUserRepository::new();
    repo.expect_insert().return_once(|_| Ok(()));

    let account =
        NewAccount::try_from_parts("grace@example.com", "Grace", "hunter2", false).expect("valid");
    let user = service(repo, verifying_hasher())
        .create_user(account)
        .await
        .expect("create");

    assert!(!user.is_active());
}

#[tokio::test]
async fn duplicate_email_is_a_conflict() {
    let mut repo = MockUserRepository::new();
    repo.expect_insert()
        .return_once(|_| Err(UserPersistenceError::duplicate_email()));

    let account =
        NewAccount::try_from_parts("ada@example.com", "Ada", "pw", true).expect("valid");
    let err = service(repo, verifying_hasher())
        .register(account)
        .await
        .expect_err("duplicate");

    assert_eq!(err.code(), ErrorCode::Conflict);
    assert_eq!(
        err.details().and_then(|d| d.get("field")),
        Some(&serde_json::json!("email"))
    );
}

#[tokio::test]
async fn update_user_rehashes_password_and_stamps_time() {
    let record = stored(true);
    let id = record.user.id().clone();
    let mut repo = MockUserRepository::new();
    repo.expect_find_by_id()
        .return_once(move |_| Ok(Some(record)));
    repo.expect_update()
        .withf(|record| {
            record.password_hash.as_str() == "hashed:new-secret"
                && record.user.name().as_ref() == "Countess"
        })
        .times(1)
        .return_once(|_| Ok(true));

    let changes = AccountChanges {
        name: Some(UserName::new("Countess").expect("name")),
        password: Some(zeroize::Zeroizing::new("new-secret".to_owned())),
        ..AccountChanges::default()
    };
    let user = service(repo, verifying_hasher())
        .update_user(&id, changes)
        .await
        .expect("update");

    assert_eq!(user.updated_at(), fixture_timestamp());
}

#[tokio::test]
async fn empty_update_is_a_no_op() {
    let record = stored(true);
    let id = record.user.id().clone();
    let original = record.user.clone();
    let mut repo = MockUserRepository::new();
    repo.expect_find_by_id()
        .return_once(move |_| Ok(Some(record)));
    repo.expect_update().times(0);

    let user = service(repo, MockPasswordHasher::new())
        .update_user(&id, AccountChanges::default())
        .await
        .expect("no-op update");

    assert_eq!(user, original);
}

#[rstest]
#[case(Ok(true), None)]
#[case(Ok(false), Some(ErrorCode::NotFound))]
#[case(Err(UserPersistenceError::has_votes()), Some(ErrorCode::Conflict))]
#[case(
    Err(UserPersistenceError::connection("refused")),
    Some(ErrorCode::ServiceUnavailable)
)]
#[tokio::test]
async fn delete_user_maps_outcomes(
    #[case] outcome: Result<bool, UserPersistenceError>,
    #[case] expected: Option<ErrorCode>,
) {
    let mut repo = MockUserRepository::new();
    repo.expect_delete().times(1).return_once(move |_| outcome);

    let result = service(repo, MockPasswordHasher::new())
        .delete_user(&UserId::random())
        .await;

    assert_eq!(result.err().map(|err| err.code()), expected);
}

#[tokio::test]
async fn profile_of_missing_user_is_not_found() {
    let mut repo = MockUserRepository::new();
    repo.expect_find_by_id().return_once(|_| Ok(None));

    let err = service(repo, MockPasswordHasher::new())
        .profile(&UserId::random())
        .await
        .expect_err("missing");

    assert_eq!(err.code(), ErrorCode::NotFound);
}
