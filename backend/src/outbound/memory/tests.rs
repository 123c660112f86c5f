//! Behavioural coverage for the in-memory store, including the ledger's
//! concurrency guarantees.

use chrono::{Duration, TimeZone, Utc};
use rstest::{fixture, rstest};

use uuid::Uuid;

use super::*;
use crate::domain::{NewPoll, PasswordHash, UserName};

fn at(minute: i64) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0)
        .single()
        .expect("valid timestamp")
        + Duration::minutes(minute)
}

fn poll(title: &str, created_minute: i64) -> Poll {
    let new_poll = NewPoll::try_from_parts(title, &["A", "B"]).expect("valid poll");
    Poll::open(new_poll, at(created_minute))
}

fn account(email: &str, created_minute: i64) -> UserRecord {
    UserRecord {
        user: User::new(
            UserId::random(),
            EmailAddress::new(email).expect("email"),
            UserName::new("Voter").expect("name"),
            true,
            at(created_minute),
            at(created_minute),
        ),
        password_hash: PasswordHash::new("$argon2id$stub"),
    }
}

fn ballot(poll: &Poll, option: usize, user: &UserId) -> Ballot {
    Ballot {
        poll_id: poll.id,
        option_id: poll.options[option].id,
        user_id: user.clone(),
    }
}

async fn registered_voter(store: &InMemoryStore) -> UserId {
    let record = account(&format!("{}@example.com", Uuid::new_v4().simple()), 0);
    store.insert(&record).await.expect("insert voter");
    record.user.id().clone()
}

#[fixture]
fn store() -> InMemoryStore {
    InMemoryStore::new()
}

async fn seeded(store: &InMemoryStore) -> Poll {
    let poll = poll("Lunch?", 0);
    store.create_poll(&poll).await.expect("create poll");
    poll
}

async fn count(store: &InMemoryStore, poll: &Poll, option: usize) -> u32 {
    let view = store
        .find_view(&poll.id, &UserId::random())
        .await
        .expect("lookup")
        .expect("poll exists");
    view.poll.options[option].votes_count
}

#[rstest]
#[tokio::test]
async fn second_vote_from_same_user_is_rejected_without_side_effects(store: InMemoryStore) {
    let poll = seeded(&store).await;
    let voter = registered_voter(&store).await;

    let first = store.cast_vote(&ballot(&poll, 0, &voter)).await;
    let second = store.cast_vote(&ballot(&poll, 1, &voter)).await;

    assert_eq!(first, Ok(1));
    assert_eq!(second, Err(VoteError::AlreadyVoted));
    assert_eq!(count(&store, &poll, 0).await, 1);
    assert_eq!(count(&store, &poll, 1).await, 0);
    let view = store
        .find_view(&poll.id, &voter)
        .await
        .expect("lookup")
        .expect("poll exists");
    assert_eq!(view.selected_option, Some(poll.options[0].id));
}

#[rstest]
#[tokio::test]
async fn closed_poll_rejects_votes_and_leaves_state_untouched(store: InMemoryStore) {
    let poll = seeded(&store).await;
    let close = PollUpdate::try_from_parts::<&str>("Lunch?", false, None).expect("update");
    store.update_poll(&poll.id, &close).await.expect("close");
    let before = store.tables.lock().await.clone();

    let result = store
        .cast_vote(&ballot(&poll, 0, &UserId::random()))
        .await;

    assert_eq!(result, Err(VoteError::PollClosed));
    let after = store.tables.lock().await.clone();
    assert_eq!(before.votes, after.votes);
    assert_eq!(before.options, after.options);
}

#[rstest]
#[tokio::test]
async fn option_from_another_poll_is_unknown(store: InMemoryStore) {
    let poll = seeded(&store).await;
    let other = self::poll("Dinner?", 1);
    store.create_poll(&other).await.expect("create other");

    let stray = Ballot {
        poll_id: poll.id,
        option_id: other.options[0].id,
        user_id: registered_voter(&store).await,
    };

    assert_eq!(
        store.cast_vote(&stray).await,
        Err(VoteError::UnknownOption)
    );
    assert_eq!(count(&store, &other, 0).await, 0);
}

#[rstest]
#[tokio::test]
async fn votes_need_an_existing_account(store: InMemoryStore) {
    let poll = seeded(&store).await;
    let voter = account("leaving@example.com", 0);
    store.insert(&voter).await.expect("insert user");
    assert_eq!(store.delete(voter.user.id()).await, Ok(true));

    for user in [voter.user.id().clone(), UserId::random()] {
        assert_eq!(
            store.cast_vote(&ballot(&poll, 0, &user)).await,
            Err(VoteError::UnknownVoter)
        );
    }
    assert_eq!(count(&store, &poll, 0).await, 0);
    assert_eq!(store.tables.lock().await.votes.get(&poll.id), None);
}

#[rstest]
#[tokio::test]
async fn failure_after_the_vote_row_rolls_the_vote_back(store: InMemoryStore) {
    let poll = seeded(&store).await;
    let voter = registered_voter(&store).await;
    store
        .tables
        .lock()
        .await
        .options
        .get_mut(&poll.id)
        .expect("options stored")[0]
        .votes_count = u32::MAX;

    let result = store.cast_vote(&ballot(&poll, 0, &voter)).await;

    assert_eq!(
        result,
        Err(VoteError::StorageFailure(PollPersistenceError::query(
            "vote counter overflow"
        )))
    );
    let view = store
        .find_view(&poll.id, &voter)
        .await
        .expect("lookup")
        .expect("poll exists");
    assert!(!view.voted());
    assert_eq!(view.poll.options[0].votes_count, u32::MAX);
}

#[rstest]
#[tokio::test]
async fn rejected_transactions_replay_their_journal() {
    let mut tables = Tables::default();
    let poll = poll("Draft", 0);

    let mut tx = MemoryTx::new(&mut tables);
    vote_ledger::create_poll(&mut tx, &poll)
        .await
        .expect("create inside the transaction");
    let outcome: Result<(), PollWriteError> = Err(PollWriteError::NotFound);
    assert_eq!(tx.finish(outcome), Err(PollWriteError::NotFound));

    assert!(tables.polls.is_empty());
    assert!(tables.options.is_empty());
}

#[rstest]
#[tokio::test]
async fn missing_poll_is_treated_as_closed(store: InMemoryStore) {
    let ghost = self::poll("Ghost", 0);
    assert_eq!(
        store
            .cast_vote(&ballot(&ghost, 0, &UserId::random()))
            .await,
        Err(VoteError::PollClosed)
    );
}

#[rstest]
#[case(2)]
#[case(16)]
#[case(64)]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_votes_from_one_user_count_once(#[case] attempts: usize) {
    let store = InMemoryStore::new();
    let poll = seeded(&store).await;
    let voter = registered_voter(&store).await;

    let handles: Vec<_> = (0..attempts)
        .map(|i| {
            let store = store.clone();
            let ballot = ballot(&poll, i % 2, &voter);
            tokio::spawn(async move { store.cast_vote(&ballot).await })
        })
        .collect();

    let mut accepted = 0;
    for handle in handles {
        match handle.await.expect("task completes") {
            Ok(_) => accepted += 1,
            Err(err) => assert_eq!(err, VoteError::AlreadyVoted),
        }
    }

    assert_eq!(accepted, 1);
    let total = count(&store, &poll, 0).await + count(&store, &poll, 1).await;
    assert_eq!(total, 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_voters_are_all_counted() {
    let store = InMemoryStore::new();
    let poll = seeded(&store).await;
    let voters = 50;
    let mut ids = Vec::with_capacity(voters);
    for _ in 0..voters {
        ids.push(registered_voter(&store).await);
    }

    let handles: Vec<_> = ids
        .iter()
        .map(|voter| {
            let store = store.clone();
            let ballot = ballot(&poll, 0, voter);
            tokio::spawn(async move { store.cast_vote(&ballot).await })
        })
        .collect();

    let mut counts = Vec::with_capacity(voters);
    for handle in handles {
        counts.push(handle.await.expect("task completes").expect("vote accepted"));
    }
    counts.sort_unstable();

    let expected: Vec<u32> = (1..=voters as u32).collect();
    assert_eq!(counts, expected);
    assert_eq!(count(&store, &poll, 0).await, voters as u32);
}

#[rstest]
#[tokio::test]
async fn replacing_options_is_refused_once_votes_exist(store: InMemoryStore) {
    let poll = seeded(&store).await;
    let replace =
        PollUpdate::try_from_parts("Lunch?", true, Some(&["X", "Y", "Z"][..])).expect("update");

    let updated = store
        .update_poll(&poll.id, &replace)
        .await
        .expect("no votes yet");
    assert_eq!(updated.options.len(), 3);

    store
        .cast_vote(&Ballot {
            poll_id: poll.id,
            option_id: updated.options[0].id,
            user_id: registered_voter(&store).await,
        })
        .await
        .expect("vote");

    let err = store
        .update_poll(&poll.id, &replace)
        .await
        .expect_err("locked");
    assert_eq!(err, PollWriteError::OptionsLocked { votes: 1 });
    assert_eq!(count(&store, &updated, 0).await, 1);
}

#[rstest]
#[tokio::test]
async fn updating_missing_poll_is_not_found(store: InMemoryStore) {
    let update = PollUpdate::try_from_parts::<&str>("Nope", true, None).expect("update");
    assert_eq!(
        store.update_poll(&PollId::random(), &update).await,
        Err(PollWriteError::NotFound)
    );
}

#[rstest]
#[tokio::test]
async fn polls_are_listed_newest_first(store: InMemoryStore) {
    for (title, minute) in [("old", 0), ("newest", 10), ("middle", 5)] {
        store
            .create_poll(&poll(title, minute))
            .await
            .expect("create");
    }

    let titles: Vec<String> = store
        .list_views(&UserId::random())
        .await
        .expect("list")
        .into_iter()
        .map(|view| view.poll.title.as_ref().to_owned())
        .collect();

    assert_eq!(titles, ["newest", "middle", "old"]);
}

#[rstest]
#[tokio::test]
async fn deleting_a_poll_cascades_to_votes(store: InMemoryStore) {
    let poll = seeded(&store).await;
    let voter = account("voter@example.com", 0);
    store.insert(&voter).await.expect("insert user");
    store
        .cast_vote(&ballot(&poll, 0, voter.user.id()))
        .await
        .expect("vote");

    assert_eq!(
        store.delete(voter.user.id()).await,
        Err(UserPersistenceError::HasVotes)
    );
    assert_eq!(store.delete_poll(&poll.id).await, Ok(true));
    assert_eq!(store.delete_poll(&poll.id).await, Ok(false));
    assert_eq!(store.delete(voter.user.id()).await, Ok(true));
}

#[rstest]
#[tokio::test]
async fn emails_are_unique_across_insert_and_update(store: InMemoryStore) {
    let ada = account("ada@example.com", 0);
    let grace = account("grace@example.com", 1);
    store.insert(&ada).await.expect("insert ada");
    store.insert(&grace).await.expect("insert grace");

    assert_eq!(
        store.insert(&account("ada@example.com", 2)).await,
        Err(UserPersistenceError::DuplicateEmail)
    );

    let mut renamed = grace.clone();
    renamed.user = User::new(
        grace.user.id().clone(),
        ada.user.email().clone(),
        grace.user.name().clone(),
        true,
        grace.user.created_at(),
        at(3),
    );
    assert_eq!(
        store.update(&renamed).await,
        Err(UserPersistenceError::DuplicateEmail)
    );
    assert_eq!(store.update(&grace).await, Ok(true));
}

#[rstest]
#[tokio::test]
async fn users_are_listed_oldest_first_and_found_by_email(store: InMemoryStore) {
    let late = account("late@example.com", 9);
    let early = account("early@example.com", 1);
    store.insert(&late).await.expect("insert");
    store.insert(&early).await.expect("insert");

    let emails: Vec<String> = store
        .list()
        .await
        .expect("list")
        .iter()
        .map(|user| user.email().to_string())
        .collect();
    assert_eq!(emails, ["early@example.com", "late@example.com"]);

    let found = store
        .find_by_email(early.user.email())
        .await
        .expect("lookup");
    assert_eq!(found, Some(early));
    assert_eq!(store.find_by_id(&UserId::random()).await, Ok(None));
}
