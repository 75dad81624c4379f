//! Integration tests for reconciliation and population.

mod helpers;

use helpers::mock_directory::MockDirectory;
use helpers::test_data::{scim_group_json, scim_user_json, seeded_store, user_record};
use scim_mediator::error::MediatorError;
use scim_mediator::reconciler::Reconciler;
use scim_mediator::records::UserStatus;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_diff_completeness_and_mirror_overwrite() {
    let mock = MockDirectory::start().await;
    mock.mock_list_users(vec![
        scim_user_json("b@example.edu", "u-b", true),
        scim_user_json("c@example.edu", "u-c", true),
    ])
    .await;
    mock.mock_list_groups(vec![]).await;
    let (_dir, store) = seeded_store(
        &[
            ("a@example.edu", user_record("a@example.edu", "u-a")),
            ("b@example.edu", user_record("b@example.edu", "u-b")),
        ],
        &[],
    );

    let client = mock.client();
    let stats = Reconciler::new(&client, &store)
        .reconcile_users(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(stats.created, 1);
    assert_eq!(stats.deleted, 1);
    assert_eq!(stats.changed, 0);

    let keys: Vec<String> = store.load_users().unwrap().into_keys().collect();
    assert_eq!(keys, vec!["b@example.edu", "c@example.edu"]);

    let audit = store.read_audit().unwrap();
    assert_eq!(audit.len(), 2);
    assert!(audit.iter().all(|e| e.use_case == "Refresh"));
    assert!(audit
        .iter()
        .any(|e| e.target == "c@example.edu" && e.details.contains("created")));
    assert!(audit
        .iter()
        .any(|e| e.target == "a@example.edu" && e.details.contains("deleted")));
}

#[tokio::test]
async fn test_status_drift_keeps_local_deactivation_time() {
    let mock = MockDirectory::start().await;
    mock.mock_list_users(vec![scim_user_json("a@example.edu", "u-a", false)])
        .await;
    let mut inactive = user_record("a@example.edu", "u-a");
    inactive.status = UserStatus::Inactive;
    let stamp = chrono::Utc::now() - chrono::Duration::days(3);
    inactive.deactivated_at = Some(stamp);
    let (_dir, store) = seeded_store(&[("a@example.edu", inactive)], &[]);

    let client = mock.client();
    let stats = Reconciler::new(&client, &store)
        .reconcile_users(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(stats.drift_count(), 0);
    let record = &store.load_users().unwrap()["a@example.edu"];
    assert_eq!(record.deactivated_at, Some(stamp));
}

#[tokio::test]
async fn test_user_fetch_failure_leaves_mirror_and_still_reconciles_groups() {
    let mock = MockDirectory::start().await;
    mock.mock_status("GET", "/Users", 503).await;
    mock.mock_list_groups(vec![scim_group_json("Staff", "g-1")]).await;
    let (_dir, store) = seeded_store(
        &[("a@example.edu", user_record("a@example.edu", "u-a"))],
        &[("Old", "g-0")],
    );
    let users_before = std::fs::read_to_string(store.users_path()).unwrap();

    let client = mock.client();
    let report = Reconciler::new(&client, &store)
        .run(&CancellationToken::new())
        .await;

    assert!(matches!(report.users, Err(MediatorError::Exhausted { .. })));
    let groups = report.groups.as_ref().unwrap();
    assert_eq!((groups.created, groups.deleted), (1, 1));
    assert!(!report.is_success());

    assert_eq!(std::fs::read_to_string(store.users_path()).unwrap(), users_before);
    let group_keys: Vec<String> = store.load_groups().unwrap().into_keys().collect();
    assert_eq!(group_keys, vec!["Staff"]);
}

#[tokio::test]
async fn test_cancelled_users_pass_skips_groups() {
    let mock = MockDirectory::start().await;
    let (_dir, store) = seeded_store(&[], &[]);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let client = mock.client();
    let report = Reconciler::new(&client, &store).run(&cancel).await;

    assert!(report.is_cancelled());
    assert!(matches!(report.groups, Err(MediatorError::Cancelled)));
    assert_eq!(mock.request_count().await, 0);
}

#[tokio::test]
async fn test_populate_overwrites_without_diffing() {
    let mock = MockDirectory::start().await;
    mock.mock_list_users(vec![
        scim_user_json("a@example.edu", "u-a", true),
        scim_user_json("b@example.edu", "u-b", false),
    ])
    .await;
    mock.mock_list_groups(vec![
        scim_group_json("Staff", "g-1"),
        scim_group_json("", "g-2"),
    ])
    .await;
    let (_dir, store) = seeded_store(&[("stale@example.edu", user_record("stale@example.edu", "u-z"))], &[]);

    let client = mock.client();
    let summary = Reconciler::new(&client, &store)
        .populate(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!((summary.users, summary.groups), (2, 1));
    let users = store.load_users().unwrap();
    assert!(!users.contains_key("stale@example.edu"));
    assert_eq!(users["b@example.edu"].status, UserStatus::Inactive);
    assert_eq!(store.load_groups().unwrap()["Staff"].external_id, "g-1");

    // Only the completion line is audited; no drift events.
    let audit = store.read_audit().unwrap();
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].use_case, "Populate");
}
