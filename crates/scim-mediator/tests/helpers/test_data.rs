//! Test data generators for mediator integration tests.

#![allow(dead_code)]

use std::path::Path;

use serde_json::{json, Value};
use tempfile::TempDir;

use scim_mediator::models::ScimName;
use scim_mediator::records::{GroupRecord, JobTask, UserRecord, UserStatus};
use scim_mediator::store::{GroupMap, MirrorStore, UserMap};

/// Directory user JSON as the remote directory returns it.
pub fn scim_user_json(user_name: &str, id: &str, active: bool) -> Value {
    let given = user_name.split('@').next().unwrap_or("user");
    json!({
        "schemas": ["urn:ietf:params:scim:schemas:core:2.0:User"],
        "id": id,
        "userName": user_name,
        "name": { "givenName": given, "familyName": "User" },
        "emails": [{ "value": user_name, "type": "work", "primary": true }],
        "active": active
    })
}

pub fn scim_group_json(display_name: &str, id: &str) -> Value {
    json!({
        "schemas": ["urn:ietf:params:scim:schemas:core:2.0:Group"],
        "id": id,
        "displayName": display_name
    })
}

/// Mirror record matching [`scim_user_json`] for an active user.
pub fn user_record(user_name: &str, id: &str) -> UserRecord {
    let given = user_name.split('@').next().unwrap_or("user");
    UserRecord {
        external_id: id.to_string(),
        email: user_name.to_string(),
        status: UserStatus::Active,
        name: ScimName {
            given_name: Some(given.to_string()),
            family_name: Some("User".to_string()),
            formatted: None,
        },
        title: None,
        organization: None,
        deactivated_at: None,
    }
}

pub fn group_record(id: &str) -> GroupRecord {
    GroupRecord {
        external_id: id.to_string(),
    }
}

/// A temp data directory with a store seeded with the given mirrors.
pub fn seeded_store(users: &[(&str, UserRecord)], groups: &[(&str, &str)]) -> (TempDir, MirrorStore) {
    let temp_dir = TempDir::new().unwrap();
    let store = MirrorStore::open(temp_dir.path()).unwrap();

    let user_map: UserMap = users
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect();
    store.save_users(&user_map).unwrap();

    let group_map: GroupMap = groups
        .iter()
        .map(|(name, id)| ((*name).to_string(), group_record(id)))
        .collect();
    store.save_groups(&group_map).unwrap();

    (temp_dir, store)
}

/// Write a fresh task file and return its path.
pub fn write_task_file(dir: &Path, tasks: Value) -> std::path::PathBuf {
    let path = dir.join("tasks.json");
    std::fs::write(&path, tasks.to_string()).unwrap();
    path
}

pub fn task(kind: &str, target: &str, data: Value) -> JobTask {
    JobTask::new(kind, target, data)
}
