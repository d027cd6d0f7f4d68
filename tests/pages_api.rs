//! REST lifecycle tests for the pages API: create, update, lock, publish,
//! unpublish, and the status contract around entity tags and roles.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use pressroom::application::files::FileService;
use pressroom::application::feeds::FeedService;
use pressroom::application::pages::PageService;
use pressroom::application::previews::PreviewService;
use pressroom::application::repos::ContentRepository;
use pressroom::application::search::SearchService;
use pressroom::cache::{CacheConfig, ResponseCache};
use pressroom::config::AccountSettings;
use pressroom::dispatch::handlers::{
    ActionRequestHandler, FeedRequestHandler, FileRequestHandler, ImageRequestHandler,
    PageRequestHandler, StaticRequestHandler,
};
use pressroom::dispatch::{ActionRegistry, RequestHandler, SiteDispatcher};
use pressroom::infra::content_store::ContentStore;
use pressroom::infra::http::{HttpState, UserDirectory, build_router};
use pressroom::infra::repository::FsContentRepository;
use pressroom_api_types::{ErrorBody, ResourceDocument, SearchResultDocument, VersionView};
use serde_json::json;
use tower::ServiceExt;

const EDITOR_TOKEN: &str = "editor-token";
const PUBLISHER_TOKEN: &str = "publisher-token";
const ADMIN_TOKEN: &str = "admin-token";

fn test_router() -> Router {
    let repository: Arc<dyn ContentRepository> = Arc::new(FsContentRepository::in_memory());
    let cache = Arc::new(ResponseCache::new(&CacheConfig::default()));
    let content_store = Arc::new(ContentStore::in_memory());
    let previews = Arc::new(PreviewService::new(repository.clone()));
    let pages = Arc::new(PageService::new(
        repository.clone(),
        cache.clone(),
        previews.clone(),
    ));
    let files = Arc::new(FileService::new(
        repository.clone(),
        content_store,
        cache.clone(),
    ));
    let search = Arc::new(SearchService::new(repository.clone()));
    let feeds = Arc::new(FeedService::new(
        repository.clone(),
        "Test Site",
        "http://test.local",
    ));

    let handlers: Vec<Box<dyn RequestHandler>> = vec![
        Box::new(ActionRequestHandler::new(
            Arc::new(ActionRegistry::new()),
            cache.clone(),
        )),
        Box::new(PageRequestHandler::new(
            repository.clone(),
            cache.clone(),
            Duration::from_secs(60),
            Duration::from_secs(10),
        )),
        Box::new(FileRequestHandler::new(files.clone())),
        Box::new(ImageRequestHandler::new(files.clone(), vec![])),
        Box::new(FeedRequestHandler::new(
            feeds,
            cache.clone(),
            Duration::from_secs(60),
            Duration::from_secs(10),
        )),
        Box::new(StaticRequestHandler::new(None)),
    ];

    let directory = Arc::new(UserDirectory::from_settings(&[
        AccountSettings {
            login: "jdoe".into(),
            realm: None,
            name: Some("John Doe".into()),
            token: EDITOR_TOKEN.into(),
            roles: vec!["editor".into()],
        },
        AccountSettings {
            login: "amelie".into(),
            realm: None,
            name: None,
            token: PUBLISHER_TOKEN.into(),
            roles: vec!["publisher".into()],
        },
        AccountSettings {
            login: "root".into(),
            realm: None,
            name: None,
            token: ADMIN_TOKEN.into(),
            roles: vec!["site_admin".into()],
        },
    ]));

    build_router(HttpState {
        site: String::from("main"),
        pages,
        files,
        search,
        previews,
        dispatcher: Arc::new(SiteDispatcher::new(handlers)),
        directory,
    })
}

fn request(method: &str, uri: &str, token: Option<&str>, body: Option<serde_json::Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    }
}

async fn json_body<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("json body")
}

fn page_body(path: &str) -> serde_json::Value {
    json!({
        "path": path,
        "title": "A page",
        "template": "default",
        "composers": [{
            "id": "#stage#",
            "pagelets": [{
                "module": "text",
                "id": "paragraph",
                "elements": { "body": "Hello world" }
            }]
        }]
    })
}

async fn create_page(router: &Router, path: &str) -> ResourceDocument {
    let response = router
        .clone()
        .oneshot(request(
            "POST",
            "/api/pages",
            Some(EDITOR_TOKEN),
            Some(page_body(path)),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CREATED);
    json_body(response).await
}

#[tokio::test]
async fn anonymous_creation_is_unauthorized() {
    let router = test_router();
    let response = router
        .oneshot(request("POST", "/api/pages", None, Some(page_body("/a"))))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_tokens_are_rejected_outright() {
    let router = test_router();
    let response = router
        .oneshot(request(
            "GET",
            "/api/pages",
            Some("wrong-token"),
            None,
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn created_pages_come_back_with_an_etag() {
    let router = test_router();
    let document = create_page(&router, "/news/launch").await;
    assert_eq!(document.path, "/news/launch");
    assert_eq!(document.version, VersionView::Work);
    assert!(document.etag.starts_with("W/\""));
}

#[tokio::test]
async fn creating_twice_at_the_same_path_conflicts() {
    let router = test_router();
    create_page(&router, "/a").await;
    let response = router
        .oneshot(request(
            "POST",
            "/api/pages",
            Some(EDITOR_TOKEN),
            Some(page_body("/a")),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body: ErrorBody = json_body(response).await;
    assert_eq!(body.error.code, "conflict");
}

#[tokio::test]
async fn updates_without_a_fresh_etag_fail_the_precondition() {
    let router = test_router();
    let document = create_page(&router, "/a").await;

    // Missing If-Match.
    let response = router
        .clone()
        .oneshot(request(
            "PUT",
            &format!("/api/pages/{}", document.id),
            Some(EDITOR_TOKEN),
            Some(page_body("/a")),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::PRECONDITION_FAILED);

    // Stale If-Match.
    let mut stale = request(
        "PUT",
        &format!("/api/pages/{}", document.id),
        Some(EDITOR_TOKEN),
        Some(page_body("/a")),
    );
    stale
        .headers_mut()
        .insert(header::IF_MATCH, "W/\"1\"".parse().expect("etag"));
    let response = router.clone().oneshot(stale).await.expect("response");
    assert_eq!(response.status(), StatusCode::PRECONDITION_FAILED);

    // Fresh If-Match succeeds.
    let mut fresh = request(
        "PUT",
        &format!("/api/pages/{}", document.id),
        Some(EDITOR_TOKEN),
        Some(page_body("/a")),
    );
    fresh
        .headers_mut()
        .insert(header::IF_MATCH, document.etag.parse().expect("etag"));
    let response = router.oneshot(fresh).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn foreign_locks_block_updates_with_forbidden() {
    let router = test_router();
    let document = create_page(&router, "/a").await;

    // The publisher takes the lock.
    let response = router
        .clone()
        .oneshot(request(
            "POST",
            &format!("/api/pages/{}/lock", document.id),
            Some(PUBLISHER_TOKEN),
            None,
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let locked: ResourceDocument = json_body(response).await;
    assert_eq!(locked.locked_by.map(|u| u.id), Some("amelie".into()));

    // The editor's update bounces off the lock.
    let mut update = request(
        "PUT",
        &format!("/api/pages/{}", document.id),
        Some(EDITOR_TOKEN),
        Some(page_body("/a")),
    );
    update
        .headers_mut()
        .insert(header::IF_MATCH, locked.etag.parse().expect("etag"));
    let response = router.clone().oneshot(update).await.expect("response");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // A site admin may break the lock.
    let response = router
        .clone()
        .oneshot(request(
            "DELETE",
            &format!("/api/pages/{}/lock", document.id),
            Some(ADMIN_TOKEN),
            None,
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn publish_requires_the_publisher_role() {
    let router = test_router();
    let document = create_page(&router, "/a").await;

    let mut publish = request(
        "POST",
        &format!("/api/pages/{}/publish", document.id),
        Some(EDITOR_TOKEN),
        Some(json!({})),
    );
    publish
        .headers_mut()
        .insert(header::IF_MATCH, document.etag.parse().expect("etag"));
    let response = router.clone().oneshot(publish).await.expect("response");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn publish_lifecycle_round_trip() {
    let router = test_router();
    let document = create_page(&router, "/a").await;

    let mut publish = request(
        "POST",
        &format!("/api/pages/{}/publish", document.id),
        Some(PUBLISHER_TOKEN),
        Some(json!({})),
    );
    publish
        .headers_mut()
        .insert(header::IF_MATCH, document.etag.parse().expect("etag"));
    let response = router.clone().oneshot(publish).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let live: ResourceDocument = json_body(response).await;
    assert_eq!(live.version, VersionView::Live);
    assert_eq!(
        live.published.as_ref().map(|p| p.user.id.as_str()),
        Some("amelie")
    );

    // The work slot is gone.
    let response = router
        .clone()
        .oneshot(request(
            "GET",
            &format!("/api/pages/{}?version=work", document.id),
            None,
            None,
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Unpublish restores a draft without publication metadata.
    let mut unpublish = request(
        "DELETE",
        &format!("/api/pages/{}/publish", document.id),
        Some(PUBLISHER_TOKEN),
        None,
    );
    unpublish
        .headers_mut()
        .insert(header::IF_MATCH, live.etag.parse().expect("etag"));
    let response = router.clone().oneshot(unpublish).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let work: ResourceDocument = json_body(response).await;
    assert_eq!(work.version, VersionView::Work);
    assert!(work.published.is_none());
}

#[tokio::test]
async fn publish_with_dangling_reference_fails_the_precondition() {
    let router = test_router();
    let body = json!({
        "path": "/a",
        "title": "Broken",
        "composers": [{
            "id": "#stage#",
            "pagelets": [{
                "module": "content",
                "id": "teaser",
                "properties": { "resourceid": "00000000-0000-0000-0000-00000000beef" }
            }]
        }]
    });
    let response = router
        .clone()
        .oneshot(request("POST", "/api/pages", Some(EDITOR_TOKEN), Some(body)))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CREATED);
    let document: ResourceDocument = json_body(response).await;

    let mut publish = request(
        "POST",
        &format!("/api/pages/{}/publish", document.id),
        Some(PUBLISHER_TOKEN),
        Some(json!({})),
    );
    publish
        .headers_mut()
        .insert(header::IF_MATCH, document.etag.parse().expect("etag"));
    let response = router.oneshot(publish).await.expect("response");
    assert_eq!(response.status(), StatusCode::PRECONDITION_FAILED);
    let body: ErrorBody = json_body(response).await;
    assert!(body.error.message.contains("unresolved"));
}

#[tokio::test]
async fn search_finds_the_draft_by_path() {
    let router = test_router();
    create_page(&router, "/a/b").await;

    let response = router
        .oneshot(request(
            "GET",
            "/api/search?path=/a/b&version=work&limit=10&offset=0",
            None,
            None,
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let result: SearchResultDocument = json_body(response).await;
    assert_eq!(result.hit_count, 1);
    assert_eq!(result.hits[0].path, "/a/b");
}

#[tokio::test]
async fn missing_pages_are_not_found() {
    let router = test_router();
    let response = router
        .oneshot(request(
            "GET",
            "/api/pages/00000000-0000-0000-0000-000000000001",
            None,
            None,
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn previews_render_drafts_for_editors_only() {
    let router = test_router();
    let document = create_page(&router, "/a").await;

    let response = router
        .clone()
        .oneshot(request(
            "GET",
            &format!("/api/previews/{}?version=work", document.id),
            None,
            None,
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = router
        .oneshot(request(
            "GET",
            &format!("/api/previews/{}?version=work", document.id),
            Some(EDITOR_TOKEN),
            None,
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    let html = String::from_utf8(bytes.to_vec()).expect("utf8");
    assert!(html.contains("Hello world"));
}
