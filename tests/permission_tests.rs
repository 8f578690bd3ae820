//! Permission store and resolver tests against real permission files

use orion_host::permission::{
    ActorContext, FileBackend, Namespace, PermissionBackend, PermissionResolver, PermissionStore,
};
use std::sync::Arc;
use tempfile::TempDir;

fn open(path: &std::path::Path) -> Arc<PermissionStore> {
    let backend = FileBackend::new(path).unwrap();
    Arc::new(PermissionStore::open(Arc::new(backend)).unwrap())
}

#[test]
fn test_open_creates_missing_file() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("permissions").join("permissions.toml");
    let store = open(&path);
    assert!(path.exists());
    assert!(store.list_actors(Namespace::User).is_empty());
}

#[test]
fn test_grants_survive_reopen_in_both_formats() {
    let tmp = TempDir::new().unwrap();
    for name in ["permissions.toml", "permissions.json"] {
        let path = tmp.path().join(name);
        {
            let store = open(&path);
            store.add_permission(Namespace::User, "1001", "moderation.kick").unwrap();
            store.add_permission(Namespace::User, "1001", "Modules.*").unwrap();
            store.add_permission(Namespace::Role, "42", "*").unwrap();
        }
        let reopened = open(&path);
        let user = reopened.get(Namespace::User, "1001");
        assert_eq!(
            user.into_iter().collect::<Vec<_>>(),
            vec!["moderation.kick", "modules.*"]
        );
        assert!(reopened.get(Namespace::Role, "42").contains("*"));
        // namespaces stay apart
        assert!(reopened.get(Namespace::Role, "1001").is_empty());
    }
}

#[test]
fn test_add_twice_and_remove_absent_do_not_change_state() {
    let tmp = TempDir::new().unwrap();
    let store = open(&tmp.path().join("p.toml"));
    store.add_permission(Namespace::Role, "mods", "moderation.*").unwrap();
    let once = store.snapshot();

    store.add_permission(Namespace::Role, "mods", "moderation.*").unwrap();
    assert_eq!(store.snapshot(), once);

    store.remove_permission(Namespace::Role, "mods", "not.there").unwrap();
    store.remove_permission(Namespace::Role, "nobody", "moderation.*").unwrap();
    assert_eq!(store.snapshot(), once);
}

#[test]
fn test_hand_edited_file_is_normalized_on_reload() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("permissions.toml");
    let store = open(&path);

    std::fs::write(
        &path,
        r#"
[users]
"7" = ["Moderation.Kick", "moderation.kick"]
"8" = []

[roles]
"mods" = ["MODULES.VIEW"]
"#,
    )
    .unwrap();
    store.reload().unwrap();

    assert_eq!(store.get(Namespace::User, "7").len(), 1);
    assert!(store.get(Namespace::User, "7").contains("moderation.kick"));
    assert_eq!(store.list_actors(Namespace::User).len(), 1);
    assert!(store.get(Namespace::Role, "mods").contains("modules.view"));
}

#[test]
fn test_corrupt_file_on_reload_keeps_memory_state() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("permissions.toml");
    let store = open(&path);
    store.add_permission(Namespace::User, "1", "a.b").unwrap();

    std::fs::write(&path, "[users\n").unwrap();
    assert!(store.reload().is_err());
    assert!(store.get(Namespace::User, "1").contains("a.b"));

    // the next mutation rewrites a valid file
    store.add_permission(Namespace::User, "1", "c.d").unwrap();
    let backend = FileBackend::new(&path).unwrap();
    assert_eq!(backend.load().unwrap().users["1"], vec!["a.b", "c.d"]);
}

#[test]
fn test_corrupt_file_fails_open() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("permissions.json");
    std::fs::write(&path, "{\"users\": 3}").unwrap();
    let backend = FileBackend::new(&path).unwrap();
    assert!(PermissionStore::open(Arc::new(backend)).is_err());
    // left untouched for the operator to fix
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "{\"users\": 3}");
}

#[test]
fn test_role_grant_authorizes_and_revocation_applies_on_next_check() {
    let tmp = TempDir::new().unwrap();
    let store = open(&tmp.path().join("p.toml"));
    let resolver = PermissionResolver::new(Arc::clone(&store));
    let member = ActorContext::new("1001").with_roles(["everyone", "mods"]);

    store.add_permission(Namespace::Role, "mods", "moderation.*").unwrap();
    assert!(resolver.check(&member, "moderation.kick"));
    assert!(resolver.check(&member, "moderation.kick.temporary"));
    assert!(!resolver.check(&member, "moderationx.kick"));
    assert!(!resolver.check(&ActorContext::new("1001"), "moderation.kick"));

    store.remove_permission(Namespace::Role, "mods", "moderation.*").unwrap();
    assert!(!resolver.check(&member, "moderation.kick"));
}

#[test]
fn test_effective_permissions_union() {
    let tmp = TempDir::new().unwrap();
    let store = open(&tmp.path().join("p.toml"));
    let resolver = PermissionResolver::new(Arc::clone(&store));
    store.add_permission(Namespace::User, "u", "a").unwrap();
    store.add_permission(Namespace::Role, "r", "a").unwrap();
    store.add_permission(Namespace::Role, "r", "b.*").unwrap();

    let roles = vec!["r".to_string()];
    let effective = resolver.effective_permissions("u", &roles);
    assert_eq!(effective.len(), 2);
    assert!(resolver.authorize("u", &roles, "b.c"));
    assert!(!resolver.authorize("u", &[], "b.c"));
}

#[test]
fn test_concurrent_mutations_and_checks() {
    let tmp = TempDir::new().unwrap();
    let store = open(&tmp.path().join("p.toml"));
    let resolver = PermissionResolver::new(Arc::clone(&store));

    let writers: Vec<_> = (0..4)
        .map(|t| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for i in 0..25 {
                    store
                        .add_permission(Namespace::User, &format!("u{}", t), &format!("p.{}", i))
                        .unwrap();
                }
            })
        })
        .collect();
    let reader = {
        let resolver = resolver.clone();
        std::thread::spawn(move || {
            for _ in 0..200 {
                let _ = resolver.authorize("u0", &[], "p.3");
            }
        })
    };
    for writer in writers {
        writer.join().unwrap();
    }
    reader.join().unwrap();

    assert_eq!(store.stats().users, 4);
    for t in 0..4 {
        assert_eq!(store.get(Namespace::User, &format!("u{}", t)).len(), 25);
    }
    let reopened = open(&tmp.path().join("p.toml"));
    assert_eq!(reopened.snapshot(), store.snapshot());
}
