//! Tests for tokio spawner utilities

use fetch_lot::core::Spawn;
use fetch_lot::runtime::TokioSpawner;
use futures::FutureExt;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tokio_spawner_spawn() {
    let spawner = TokioSpawner::new(tokio::runtime::Handle::current());

    let (tx, rx) = tokio::sync::oneshot::channel();
    spawner.spawn(
        async move {
            tx.send(123).unwrap();
        }
        .boxed(),
    );

    let result = rx.await.expect("oneshot result");
    assert_eq!(result, 123);
}

#[tokio::test]
async fn test_tokio_spawner_current() {
    assert!(TokioSpawner::current().is_ok());
}

#[test]
fn test_tokio_spawner_current_outside_runtime() {
    assert!(TokioSpawner::current().is_err());
}
