use std::net::SocketAddr;

use axum::{Router, routing::get};
use time::Duration;
use tower_cookie_session_handler::{
    CookieSessionConfig, CookieSessionManagerLayer, SameSite, Session,
};

async fn index(session: Session) -> String {
    let n: usize = session
        .get("n")
        .await
        .expect("session get succeeds")
        .unwrap_or(0);
    session
        .insert("n", n + 1)
        .await
        .expect("session insert succeeds");
    format!("n={n}")
}

async fn logout(session: Session) -> &'static str {
    session.flush().await.expect("session flush succeeds");
    "bye"
}

#[tokio::main]
async fn main() {
    let session_config = CookieSessionConfig::default()
        // Default: "s"
        .with_name("s")
        // Default: none (expire=0, cookie lives for the browser session)
        .with_lifetime(Duration::hours(1))
        // Default: "/"
        .with_path("/")
        // Default: none
        .without_domain()
        // Default: false
        .with_secure(false)
        // Default: true
        .with_http_only(true)
        // Default: not set
        .with_same_site(SameSite::Lax)
        // Default: 4096
        .with_max_cookie_bytes(4096);
    let session_layer = CookieSessionManagerLayer::new().with_config(session_config);

    let app = Router::new()
        .route("/", get(index))
        .route("/logout", get(logout))
        .layer(session_layer);

    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("tcp listener binds successfully");
    let local_addr = listener.local_addr().expect("local address is available");
    println!("listening at http://{local_addr}");

    axum::serve(listener, app)
        .await
        .expect("server runs successfully");
}
