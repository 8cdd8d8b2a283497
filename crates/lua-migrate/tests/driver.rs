//! Versioned access to a script directory.

mod common;

use common::{context, locator, script_dir, session_pool, ADD_INDEX, CREATE_USER};
use lua_migrate::prelude::*;

fn driver() -> LuaScriptDriver {
    LuaScriptDriver::new(session_pool(), Arc::new(FsPool::new()))
}

#[test]
fn test_indexes_versioned_scripts() {
    let dir = script_dir(&[
        ("1_create_user.lua", CREATE_USER),
        ("2_add_index.lua", ADD_INDEX),
        ("10_later.lua", "return {}"),
        ("README.md", "not a migration"),
        ("helpers.lua", "return {}"),
    ]);
    let driver = driver().open_url(&locator(dir.path())).unwrap();

    let versions: Vec<u64> = driver.migrations().into_iter().map(|(v, _)| v).collect();
    assert_eq!(versions, [1, 2, 10]);
    assert_eq!(driver.first().unwrap(), 1);
    assert_eq!(driver.next(1).unwrap(), 2);
    assert_eq!(driver.next(2).unwrap(), 10);
    assert_eq!(driver.prev(10).unwrap(), 2);
    assert!(matches!(driver.prev(1), Err(MigrateError::VersionNotFound(1))));
    assert!(matches!(driver.next(10), Err(MigrateError::VersionNotFound(10))));
    assert!(matches!(driver.next(3), Err(MigrateError::VersionNotFound(3))));
}

#[test]
fn test_reads_up_and_down() {
    let dir = script_dir(&[
        ("1_create_user.lua", CREATE_USER),
        ("2_add_index.lua", ADD_INDEX),
    ]);
    let driver = driver().open_url(&locator(dir.path())).unwrap();

    let up = driver.read_up(1).unwrap();
    assert_eq!(up.identifier, "1_create_user");
    assert!(up.sql.starts_with("CREATE TABLE `user`"));

    let down = driver.read_down(2).unwrap();
    assert_eq!(down.sql, "DROP INDEX `idx_user_name` ON `user`;\n");

    let seed = driver.read(1, "seed").unwrap();
    assert!(seed.sql.starts_with("INSERT INTO `user`"));

    assert!(matches!(driver.read_up(7), Err(MigrateError::VersionNotFound(7))));
}

#[test]
fn test_adapters_are_cached_per_version() {
    let dir = script_dir(&[("1_create_user.lua", CREATE_USER)]);
    let driver = driver().open_url(&locator(dir.path())).unwrap();
    let a = driver.source(1).unwrap();
    let b = driver.source(1).unwrap();
    assert!(Arc::ptr_eq(&a, &b));
}

#[test]
fn test_session_key_comes_from_the_locator() {
    let dir = script_dir(&[("1_create_user.lua", CREATE_USER)]);
    let sessions = session_pool();
    let driver = LuaScriptDriver::new(Arc::clone(&sessions), Arc::new(FsPool::new()))
        .open_url(&format!("{}?vm=main", locator(dir.path())))
        .unwrap();
    driver.read_up(1).unwrap();
    assert!(sessions.get("main").is_some());
    assert!(sessions.get("default").is_none());
}

#[test]
fn test_table_prefix_applies_to_rendered_sql() {
    let dir = script_dir(&[("1_create_user.lua", CREATE_USER)]);
    let sessions = Arc::new(SessionPool::new(context(&[("DEFAULT_TABLE_PREFIX", "wp_")])));
    let driver = LuaScriptDriver::new(sessions, Arc::new(FsPool::new()))
        .open_url(&locator(dir.path()))
        .unwrap();
    assert_eq!(driver.read_down(1).unwrap().sql, "DROP TABLE `wp_user`;\n");
}

#[test]
fn test_duplicate_versions_are_rejected() {
    let dir = script_dir(&[("1_a.lua", "return {}"), ("1_b.lua", "return {}")]);
    assert!(matches!(
        driver().open_url(&locator(dir.path())),
        Err(MigrateError::Configuration(_))
    ));
}

#[test]
fn test_invalid_locators_are_rejected() {
    for url in ["", "file:///tmp", "lua://", "lua:///definitely/not/here"] {
        assert!(
            matches!(driver().open_url(url), Err(MigrateError::Configuration(_))),
            "{url} should be rejected"
        );
    }
}

#[test]
fn test_unopened_driver_refuses_reads() {
    assert!(matches!(driver().first(), Err(MigrateError::Configuration(_))));
}

#[test]
fn test_close_releases_adapters_and_store() {
    let dir = script_dir(&[("1_create_user.lua", CREATE_USER)]);
    let stores = Arc::new(FsPool::new());
    let driver = LuaScriptDriver::new(session_pool(), Arc::clone(&stores))
        .open_url(&locator(dir.path()))
        .unwrap();
    let source = driver.source(1).unwrap();
    source.read("up").unwrap();
    assert!(stores.get(&locator(dir.path())).is_some());

    driver.close().unwrap();
    driver.close().unwrap();
    assert_eq!(source.status(), SourceStatus::Closed);
    assert!(stores.get(&locator(dir.path())).is_none());
}

#[test]
fn test_opens_through_the_trait() {
    let dir = script_dir(&[("1_create_user.lua", CREATE_USER)]);
    let factory: Box<dyn SourceDriver> = Box::new(driver());
    let opened = factory.open(&locator(dir.path())).unwrap();
    assert_eq!(opened.first().unwrap(), 1);
    assert_eq!(opened.read_down(1).unwrap().sql, "DROP TABLE `user`;\n");
    opened.close().unwrap();
}

#[test]
fn test_sources_on_the_default_session_stay_separate() {
    let dir_a = script_dir(&[("1_init.lua", "return { safeDown = function() require('migrate').dropTable('a') end }")]);
    let dir_b = script_dir(&[("1_init.lua", "return { safeDown = function() require('migrate').dropTable('b') end }")]);
    let sessions = session_pool();
    let stores = Arc::new(FsPool::new());
    let factory = LuaScriptDriver::new(Arc::clone(&sessions), stores);
    let a = factory.open_url(&locator(dir_a.path())).unwrap();
    let b = factory.open_url(&locator(dir_b.path())).unwrap();

    assert_eq!(a.read_down(1).unwrap().sql, "DROP TABLE `a`;\n");
    assert_eq!(b.read_down(1).unwrap().sql, "DROP TABLE `b`;\n");
    assert_eq!(a.read_down(1).unwrap().sql, "DROP TABLE `a`;\n");
    assert_eq!(sessions.created(), 1);
}
