//! Fallback route feeding unclaimed traffic into the dispatch chain.

use std::collections::HashMap;

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::response::Response;

use crate::dispatch::SiteRequest;
use crate::domain::security::Principal;

use super::state::HttpState;

/// Everything the API routers did not claim is site content.
pub async fn serve_site(State(state): State<HttpState>, request: Request<Body>) -> Response {
    let params: HashMap<String, String> = request
        .uri()
        .query()
        .map(|query| {
            url::form_urlencoded::parse(query.as_bytes())
                .into_owned()
                .collect()
        })
        .unwrap_or_default();
    let principal = request
        .extensions()
        .get::<Principal>()
        .cloned()
        .unwrap_or_else(Principal::anonymous);

    let site_request = SiteRequest::new(
        state.site.clone(),
        request.method().clone(),
        request.uri().path().to_string(),
        params,
        request.headers().clone(),
        principal,
    );
    state.dispatcher.dispatch(&site_request).await
}
