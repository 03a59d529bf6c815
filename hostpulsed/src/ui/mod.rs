//! Embedded dashboard: one page polling the JSON history and process
//! endpoints.
use axum::response::{Html, IntoResponse};

const DASHBOARD_HTML: &str = include_str!("dashboard.html");

pub async fn dashboard_handler() -> impl IntoResponse {
    Html(DASHBOARD_HTML)
}
