use mnemos_rs_core::{JsonlSessionIndex, MnemosCoreError, SessionResolver};
use mnemos_rs_test_utils::{
    FailingSessionIndex, InMemorySessionIndex, InsertFailingSessionIndex, RacingSessionIndex,
};
use pretty_assertions::assert_eq;
use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::tempdir;
use uuid::Uuid;

#[tokio::test]
async fn lost_insert_race_adopts_the_winner() {
    let winner = Uuid::new_v4();
    let resolver = SessionResolver::new(Arc::new(RacingSessionIndex::new("beta", winner)));
    let resolved = resolver
        .resolve_or_create(Some("beta"))
        .await
        .expect("resolve");
    assert_eq!(resolved, winner);
    assert_eq!(
        resolver.resolve_or_create(Some("beta")).await.expect("cached"),
        winner
    );
}

#[tokio::test]
async fn store_failures_surface_as_state_errors() {
    let resolver = SessionResolver::new(Arc::new(FailingSessionIndex));
    let err = resolver
        .resolve_or_create(Some("alpha"))
        .await
        .expect_err("failing store");
    assert!(matches!(err, MnemosCoreError::State(_)));

    let anonymous = resolver.resolve_or_create(None).await;
    assert!(anonymous.is_ok());
}

#[test]
fn separate_indexes_on_one_root_agree_on_one_id() {
    let temp = tempdir().expect("tempdir");
    for round in 0..50 {
        let name = format!("beta{round}");
        let barrier = Barrier::new(4);
        let ids: HashSet<Uuid> = thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let (barrier, name, root) = (&barrier, name.as_str(), temp.path());
                    scope.spawn(move || {
                        let resolver = SessionResolver::new(Arc::new(
                            JsonlSessionIndex::new(root).expect("index"),
                        ));
                        let runtime = tokio::runtime::Builder::new_current_thread()
                            .build()
                            .expect("runtime");
                        barrier.wait();
                        runtime
                            .block_on(resolver.resolve_or_create(Some(name)))
                            .expect("resolve")
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().expect("join"))
                .collect()
        });
        assert_eq!(ids.len(), 1, "round {round} produced {ids:?}");
    }
}

#[tokio::test]
async fn failed_insert_is_not_cached() {
    let index = Arc::new(InsertFailingSessionIndex::new());
    let resolver = SessionResolver::new(index.clone());

    let err = resolver
        .resolve_or_create(Some("gamma"))
        .await
        .expect_err("insert fails");
    assert!(matches!(err, MnemosCoreError::State(_)));

    let err = resolver
        .resolve_or_create(Some("gamma"))
        .await
        .expect_err("still fails");
    assert!(matches!(err, MnemosCoreError::State(_)));
    assert_eq!(index.lookups(), 2);
    assert_eq!(index.insert_attempts(), 2);
}

#[tokio::test]
async fn anonymous_sessions_are_never_persisted() {
    let index = Arc::new(InMemorySessionIndex::new());
    let resolver = SessionResolver::new(index.clone());
    for _ in 0..3 {
        resolver.resolve_or_create(None).await.expect("anonymous");
    }
    resolver
        .resolve_or_create(Some("named"))
        .await
        .expect("named");
    resolver
        .resolve_or_create(Some("named"))
        .await
        .expect("named again");
    assert_eq!(index.len(), 1);
    assert_eq!(index.insert_count(), 1);
}
