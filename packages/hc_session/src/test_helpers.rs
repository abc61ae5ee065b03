//! Throwaway teamserver pieces shared by the network tests.

use axum::Router;
use tokio::sync::oneshot;

use crate::profile::Credentials;

/// Serve `app` on an ephemeral localhost port. The server shuts down
/// gracefully when the returned sender fires or is dropped.
pub(crate) async fn serve(app: Router) -> (u16, oneshot::Sender<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (tx, rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = rx.await;
            })
            .await
            .unwrap();
    });
    (port, tx)
}

/// Credentials pointing at a local test server.
pub(crate) fn credentials(port: u16) -> Credentials {
    Credentials {
        name: "lab".to_string(),
        host: "127.0.0.1".to_string(),
        port,
        username: "operator".to_string(),
        password: "hunter2".to_string(),
    }
}
