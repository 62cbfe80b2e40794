mod common;

use std::time::Duration;

#[tokio::test]
async fn boot_noise_then_handshake_resolves_start() {
    let sup = common::spawn_supervisor(&common::fake_backend_script(18080));

    let port = sup.start().await.expect("start should resolve");
    assert_eq!(port, 18080);
    assert_eq!(sup.current_port(), 18080);

    sup.shutdown().await;
    assert!(sup.wait_idle(Duration::from_secs(10)).await);
    assert_eq!(sup.current_port(), 0);
}

#[cfg(unix)]
#[tokio::test]
async fn restart_renegotiates_the_port() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("runs");
    // Each run binds "a new port", as the real service does with port 0.
    let script = format!(
        "echo run >> '{m}'; c=$(wc -l < '{m}'); echo PORT=1900$c; sleep 30",
        m = marker.display()
    );
    let sup = common::spawn_supervisor(&script);

    assert_eq!(sup.start().await.unwrap(), 19001);

    let outcome = sup.restart().await;
    assert!(outcome.success, "restart failed: {:?}", outcome.error);
    assert_eq!(outcome.port, Some(19002));
    assert_eq!(sup.current_port(), 19002);

    sup.shutdown().await;
    assert!(sup.wait_idle(Duration::from_secs(10)).await);
}
