use std::sync::Arc;

use decoy_core::{DecoyConfig, ProfileSelection, SessionManager};

// These exercise a real Chromium; run with `cargo test -- --ignored` on a
// machine with a local install.

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires a local Chromium install"]
async fn acquire_always_rotates_and_closes_the_previous_session() {
    let mut mgr = SessionManager::new(Arc::new(DecoyConfig::default()));

    let first_page = mgr
        .acquire(true, ProfileSelection::RoundRobin)
        .await
        .expect("first session")
        .page()
        .clone();
    let second_page = mgr
        .acquire(true, ProfileSelection::RoundRobin)
        .await
        .expect("second session")
        .page()
        .clone();

    assert!(
        first_page.evaluate("1 + 1").await.is_err(),
        "first session should be closed before the second acquire returns"
    );
    assert!(second_page.evaluate("1 + 1").await.is_ok());

    let metrics = mgr.metrics();
    assert_eq!(metrics.sessions_opened, 2);
    assert_eq!(metrics.sessions_closed, 1);

    mgr.close().await;
    assert!(!mgr.has_session());
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires a local Chromium install"]
async fn round_robin_rotation_changes_the_fingerprint() {
    let mut mgr = SessionManager::new(Arc::new(DecoyConfig::default()));

    let first = mgr
        .acquire(true, ProfileSelection::RoundRobin)
        .await
        .expect("first session")
        .profile()
        .name;
    let second = mgr
        .acquire(true, ProfileSelection::RoundRobin)
        .await
        .expect("second session")
        .profile()
        .name;

    assert_ne!(first, second);
    mgr.close().await;
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires a local Chromium install"]
async fn spoofed_identity_is_visible_to_page_scripts() {
    let mut mgr = SessionManager::new(Arc::new(DecoyConfig::default()));

    let session = mgr
        .acquire(true, ProfileSelection::RoundRobin)
        .await
        .expect("session");
    let profile = session.profile();
    let page = session.page().clone();

    let platform: String = page
        .evaluate("navigator.platform")
        .await
        .expect("evaluate")
        .into_value()
        .expect("string result");
    assert_eq!(platform, profile.platform);

    let webdriver: Option<bool> = page
        .evaluate("navigator.webdriver === undefined")
        .await
        .expect("evaluate")
        .into_value()
        .ok();
    assert_eq!(webdriver, Some(true));

    mgr.close().await;
}
