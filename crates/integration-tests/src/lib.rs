//! Integration tests for Stride.
//!
//! These tests exercise the HTTP clients (OAuth exchange, email
//! transport) against in-process stub servers on ephemeral ports. No
//! external network access or live database is required.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p stride-integration-tests
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use axum::Router;

/// Serve `router` on an ephemeral localhost port and return its base URL.
///
/// The server task runs until the test process exits.
///
/// # Panics
///
/// Panics if the listener cannot be bound.
pub async fn spawn_stub(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub listener");
    let addr = listener.local_addr().expect("stub local addr");

    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("stub server");
    });

    format!("http://{addr}")
}
