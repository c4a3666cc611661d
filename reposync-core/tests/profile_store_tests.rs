//! Profile store error-message, atomic-write-safety and selection tests.
//! Storage: ~/.reposync/profiles.yaml

use assert_fs::prelude::*;
use predicates::prelude::predicate;
use reposync_core::{profiles, SettingsError};
use rstest::rstest;
use std::fs;

fn write_store(home: &assert_fs::TempDir, yaml: &[u8]) {
    let dir = home.path().join(".reposync");
    fs::create_dir_all(&dir).expect("mkdir");
    fs::write(dir.join("profiles.yaml"), yaml).expect("write");
}

// ---------------------------------------------------------------------------
// 1. Load error messages
// ---------------------------------------------------------------------------

#[test]
fn load_corrupt_yaml_returns_parse_error_with_path() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    write_store(&home, b": : corrupt : yaml : !!!\n  - broken: [unclosed");

    let err = profiles::load_at(home.path()).unwrap_err();
    assert!(matches!(err, SettingsError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("profiles.yaml"), "got: {err}");
}

#[test]
fn load_wrong_type_yaml_returns_parse_error() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    write_store(&home, b"- this is a list, not a mapping\n");

    let err = profiles::load_at(home.path()).unwrap_err();
    assert!(matches!(err, SettingsError::Parse { .. }), "got: {err}");
}

// ---------------------------------------------------------------------------
// 2. Add / update / remove
// ---------------------------------------------------------------------------

#[test]
fn add_persists_and_reloads() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let rec = profiles::add_at(home.path(), "prod", "https://github.com/o/r.git", "ghp_1")
        .expect("add");

    home.child(".reposync/profiles.yaml")
        .assert(predicate::path::is_file());
    home.child(".reposync/profiles.yaml.tmp")
        .assert(predicate::path::missing());

    let store = profiles::load_at(home.path()).expect("load");
    assert_eq!(store.profiles.len(), 1);
    assert_eq!(store.profiles[0], rec);
}

#[test]
#[cfg(unix)]
fn store_file_is_owner_only() {
    use std::os::unix::fs::PermissionsExt;

    let home = assert_fs::TempDir::new().expect("tempdir");
    profiles::add_at(home.path(), "prod", "https://h/r.git", "ghp_1").expect("add");
    let mode = fs::metadata(profiles::profiles_path_at(home.path()))
        .unwrap()
        .permissions()
        .mode()
        & 0o777;
    assert_eq!(mode, 0o600);
}

#[test]
fn duplicate_name_is_rejected() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    profiles::add_at(home.path(), "prod", "https://h/a.git", "t").expect("add");
    let err = profiles::add_at(home.path(), "prod", "https://h/b.git", "t").unwrap_err();
    assert!(matches!(err, SettingsError::DuplicateProfile(ref n) if n == "prod"));
    assert_eq!(profiles::load_at(home.path()).unwrap().profiles.len(), 1);
}

#[rstest]
#[case::by_name(false)]
#[case::by_id(true)]
fn remove_by_name_or_id(#[case] use_id: bool) {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let a = profiles::add_at(home.path(), "a", "https://h/a.git", "t").expect("add a");
    profiles::add_at(home.path(), "b", "https://h/b.git", "t").expect("add b");

    let key = if use_id { a.id.0.clone() } else { a.name.clone() };
    let removed = profiles::remove_at(home.path(), &key).expect("remove");
    assert_eq!(removed.id, a.id);

    let names: Vec<_> = profiles::load_at(home.path())
        .unwrap()
        .profiles
        .into_iter()
        .map(|p| p.name)
        .collect();
    assert_eq!(names, vec!["b".to_string()]);
}

#[test]
fn remove_unknown_returns_not_found() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let err = profiles::remove_at(home.path(), "ghost").unwrap_err();
    assert!(matches!(err, SettingsError::ProfileNotFound(_)));
    assert!(err.to_string().contains("ghost"));
}

#[test]
fn update_changes_fields_and_bumps_updated_at() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let original = profiles::add_at(home.path(), "prod", "https://h/a.git", "ghp_old").expect("add");
    std::thread::sleep(std::time::Duration::from_millis(10));

    let edited = profiles::update_at(
        home.path(),
        &original.id.0,
        profiles::ProfileUpdate {
            name: Some("  primary "),
            token: Some("ghp_new"),
            ..Default::default()
        },
    )
    .expect("update");

    assert_eq!(edited.id, original.id);
    assert_eq!(edited.name, "primary");
    assert_eq!(edited.repository_url, "https://h/a.git");
    assert_eq!(edited.token, "ghp_new");
    assert_eq!(edited.created_at, original.created_at);
    assert!(edited.updated_at > original.updated_at);

    let stored = profiles::load_at(home.path()).unwrap();
    assert_eq!(stored.profiles, vec![edited]);
}

#[test]
fn update_rename_to_taken_name_is_rejected() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    profiles::add_at(home.path(), "a", "https://h/a.git", "t").expect("add a");
    profiles::add_at(home.path(), "b", "https://h/b.git", "t").expect("add b");
    let before = profiles::load_at(home.path()).unwrap();

    let rename = |name| profiles::ProfileUpdate {
        name: Some(name),
        ..Default::default()
    };
    let err = profiles::update_at(home.path(), "b", rename("a")).unwrap_err();
    assert!(matches!(err, SettingsError::DuplicateProfile(ref n) if n == "a"), "got: {err}");
    assert_eq!(profiles::load_at(home.path()).unwrap(), before);

    // Keeping its own name is not a collision.
    profiles::update_at(home.path(), "b", rename("b")).expect("same name");
}

#[rstest]
#[case::blank_name(Some(" "), None, None)]
#[case::blank_url(None, Some(""), None)]
#[case::empty_token(None, None, Some(""))]
#[case::no_changes(None, None, None)]
fn update_rejects_invalid_input(
    #[case] name: Option<&str>,
    #[case] repository_url: Option<&str>,
    #[case] token: Option<&str>,
) {
    let home = assert_fs::TempDir::new().expect("tempdir");
    profiles::add_at(home.path(), "a", "https://h/a.git", "t").expect("add");
    let update = profiles::ProfileUpdate {
        name,
        repository_url,
        token,
    };
    let err = profiles::update_at(home.path(), "a", update).unwrap_err();
    assert!(matches!(err, SettingsError::InvalidProfile(_)), "got: {err}");
}

#[test]
fn update_unknown_returns_not_found() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let update = profiles::ProfileUpdate {
        token: Some("t"),
        ..Default::default()
    };
    let err = profiles::update_at(home.path(), "ghost", update).unwrap_err();
    assert!(matches!(err, SettingsError::ProfileNotFound(ref k) if k == "ghost"));
}

// ---------------------------------------------------------------------------
// 3. Selection
// ---------------------------------------------------------------------------

#[test]
fn select_preserves_requested_order() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    for name in ["one", "two", "three"] {
        profiles::add_at(home.path(), name, &format!("https://h/{name}.git"), "t").expect("add");
    }
    let store = profiles::load_at(home.path()).unwrap();

    let all: Vec<_> = store.select(&[]).unwrap().iter().map(|p| p.name.as_str()).collect();
    assert_eq!(all, ["one", "two", "three"]);

    let picked: Vec<_> = store
        .select(&["three".to_string(), "one".to_string()])
        .unwrap()
        .iter()
        .map(|p| p.name.as_str())
        .collect();
    assert_eq!(picked, ["three", "one"]);

    let err = store.select(&["missing".to_string()]).unwrap_err();
    assert!(matches!(err, SettingsError::ProfileNotFound(_)));
}

#[test]
fn serialized_sync_profile_never_includes_token() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let rec = profiles::add_at(home.path(), "prod", "https://h/r.git", "ghp_zzz").expect("add");
    let profile = rec.to_sync_profile();
    let outcome = reposync_core::SyncOutcome::success(&profile, "done", std::time::Duration::ZERO);
    let json = serde_json::to_string(&outcome).unwrap();
    assert!(!json.contains("ghp_zzz"));
    assert!(json.contains("https://h/r.git"));
}
