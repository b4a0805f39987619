//! Local HTTP server for exercising the update client.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::extract::Request;
use axum::http::StatusCode;
use axum::response::Response;
use tokio::net::TcpListener;

/// Serves every request with `handler(method, path_and_query)`. Returns the
/// base URL.
pub(crate) async fn serve<F>(handler: F) -> String
where
    F: Fn(&str, &str) -> Response + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handler = Arc::new(handler);

    let app = Router::new().fallback(move |req: Request| {
        let handler = handler.clone();
        async move { handler(req.method().as_str(), &req.uri().to_string()) }
    });
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{addr}")
}

pub(crate) fn response(status: StatusCode, headers: &[(&str, &str)], body: &str) -> Response {
    let mut builder = Response::builder().status(status);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}
