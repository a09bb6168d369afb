//! MediaWikiClient against a mock api.php

use refjanitor::error::SaveError;
use refjanitor::wiki::{AuditLog, Criterion, MediaWikiClient, PageStore, Worklist};
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const API: &str = "/w/api.php";

fn client(server: &MockServer) -> MediaWikiClient {
    MediaWikiClient::new(&format!("{}{}", server.uri(), API), "refjanitor-test").unwrap()
}

async fn mount_csrf_token(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(API))
        .and(query_param("meta", "tokens"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "query": { "tokens": { "csrftoken": "token+\\", "logintoken": "login+\\" } }
        })))
        .mount(server)
        .await;
}

async fn mount_page(server: &MockServer, title: &str, content: &str) {
    Mock::given(method("GET"))
        .and(path(API))
        .and(query_param("prop", "revisions"))
        .and(query_param("titles", title))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "query": { "pages": [{
                "pageid": 1,
                "ns": 0,
                "title": title,
                "revisions": [{
                    "timestamp": "2024-01-01T00:00:00Z",
                    "slots": { "main": { "contentmodel": "wikitext", "content": content } }
                }]
            }] }
        })))
        .mount(server)
        .await;
}

async fn mount_missing(server: &MockServer, title: &str) {
    Mock::given(method("GET"))
        .and(path(API))
        .and(query_param("prop", "revisions"))
        .and(query_param("titles", title))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "query": { "pages": [{ "ns": 0, "title": title, "missing": true }] }
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_get_text_existing_page() {
    let server = MockServer::start().await;
    mount_page(&server, "Foo", "Hello <ref>A</ref>").await;

    let text = client(&server).get_text("Foo").await.unwrap();
    assert_eq!(text.as_deref(), Some("Hello <ref>A</ref>"));
}

#[tokio::test]
async fn test_get_text_missing_page() {
    let server = MockServer::start().await;
    mount_missing(&server, "Nope").await;

    let text = client(&server).get_text("Nope").await.unwrap();
    assert_eq!(text, None);
}

#[tokio::test]
async fn test_api_error_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(API))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": { "code": "readapidenied", "info": "You need read permission" }
        })))
        .mount(&server)
        .await;

    let err = client(&server).get_text("Foo").await.unwrap_err();
    assert!(err.to_string().contains("readapidenied"));
}

#[tokio::test]
async fn test_put_text_returns_new_revision() {
    let server = MockServer::start().await;
    mount_page(&server, "Foo", "old").await;
    mount_csrf_token(&server).await;
    Mock::given(method("POST"))
        .and(path(API))
        .and(body_string_contains("action=edit"))
        .and(body_string_contains("title=Foo"))
        .and(body_string_contains("basetimestamp=2024-01-01T00%3A00%3A00Z"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "edit": { "result": "Success", "pageid": 1, "title": "Foo", "newrevid": 42 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let wiki = client(&server);
    wiki.get_text("Foo").await.unwrap();
    let revision = wiki.put_text("Foo", "new", "Bot: test").await.unwrap();
    assert_eq!(revision, 42);
}

#[tokio::test]
async fn test_put_text_protected_page_is_not_permitted() {
    let server = MockServer::start().await;
    mount_csrf_token(&server).await;
    Mock::given(method("POST"))
        .and(path(API))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": { "code": "protectedpage", "info": "This page has been protected" }
        })))
        .mount(&server)
        .await;

    let err = client(&server).put_text("Foo", "new", "Bot: test").await.unwrap_err();
    assert!(matches!(err, SaveError::NotPermitted { .. }));
    assert!(err.is_skippable());
}

#[tokio::test]
async fn test_put_text_edit_conflict() {
    let server = MockServer::start().await;
    mount_csrf_token(&server).await;
    Mock::given(method("POST"))
        .and(path(API))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": { "code": "editconflict", "info": "Edit conflict" }
        })))
        .mount(&server)
        .await;

    let err = client(&server).put_text("Foo", "new", "Bot: test").await.unwrap_err();
    assert!(matches!(err, SaveError::EditConflict { .. }));
}

#[tokio::test]
async fn test_put_text_nochange() {
    let server = MockServer::start().await;
    mount_csrf_token(&server).await;
    Mock::given(method("POST"))
        .and(path(API))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "edit": { "result": "Success", "pageid": 1, "title": "Foo", "nochange": true }
        })))
        .mount(&server)
        .await;

    let err = client(&server).put_text("Foo", "same", "Bot: test").await.unwrap_err();
    assert!(matches!(err, SaveError::NoChange { .. }));
}

#[tokio::test]
async fn test_put_text_respects_nobots() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let err = client(&server)
        .put_text("Foo", "{{nobots}}\nText", "Bot: test")
        .await
        .unwrap_err();
    assert!(matches!(err, SaveError::NotPermitted { .. }));
}

#[tokio::test]
async fn test_category_members_follow_continuation() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(API))
        .and(query_param("list", "categorymembers"))
        .and(query_param("cmcontinue", "page|B|2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "batchcomplete": true,
            "query": { "categorymembers": [{ "ns": 0, "title": "C" }] }
        })))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(API))
        .and(query_param("list", "categorymembers"))
        .and(query_param("cmtitle", "Category:Bare URLs"))
        .and(query_param("cmnamespace", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "continue": { "cmcontinue": "page|B|2", "continue": "-||" },
            "query": { "categorymembers": [
                { "ns": 0, "title": "A" },
                { "ns": 0, "title": "B" }
            ] }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let pages = client(&server)
        .list_candidate_pages(&Criterion::Category("Bare URLs".to_string()))
        .await
        .unwrap();
    assert_eq!(pages, vec!["A", "B", "C"]);
}

#[tokio::test]
async fn test_explicit_pages_need_no_request() {
    let server = MockServer::start().await;
    let pages = client(&server)
        .list_candidate_pages(&Criterion::Pages(vec!["Foo".to_string()]))
        .await
        .unwrap();
    assert_eq!(pages, vec!["Foo"]);
}

#[tokio::test]
async fn test_append_log_appends_to_existing_page() {
    let server = MockServer::start().await;
    mount_page(&server, "User:Bot/Log", "== Log ==\n").await;
    mount_csrf_token(&server).await;
    Mock::given(method("POST"))
        .and(path(API))
        .and(body_string_contains("appendtext="))
        .and(body_string_contains("title=User%3ABot%2FLog"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "edit": { "result": "Success", "newrevid": 7 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    client(&server)
        .with_log_page(Some("User:Bot/Log".to_string()))
        .append_log("Foo", "Bot: test", 42)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_append_log_creates_missing_page() {
    let server = MockServer::start().await;
    mount_missing(&server, "User:Bot/Log").await;
    mount_csrf_token(&server).await;
    Mock::given(method("POST"))
        .and(path(API))
        .and(body_string_contains("createonly=1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "edit": { "result": "Success", "newrevid": 1 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    client(&server)
        .with_log_page(Some("User:Bot/Log".to_string()))
        .append_log("Foo", "Bot: test", 42)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_append_log_without_log_page_is_noop() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    client(&server).append_log("Foo", "Bot: test", 42).await.unwrap();
}

#[tokio::test]
async fn test_login_failure() {
    let server = MockServer::start().await;
    mount_csrf_token(&server).await;
    Mock::given(method("POST"))
        .and(path(API))
        .and(body_string_contains("action=login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "login": { "result": "Failed", "reason": "Incorrect username or password entered." }
        })))
        .mount(&server)
        .await;

    let mut wiki = client(&server);
    let err = wiki.login("Bot@janitor", "wrong").await.unwrap_err();
    assert!(err.to_string().contains("Incorrect username"));
    assert_eq!(wiki.username(), None);
}

#[tokio::test]
async fn test_login_success_sets_username() {
    let server = MockServer::start().await;
    mount_csrf_token(&server).await;
    Mock::given(method("POST"))
        .and(path(API))
        .and(body_string_contains("action=login"))
        .and(body_string_contains("lgname=Bot%40janitor"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "login": { "result": "Success", "lgusername": "Bot" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut wiki = client(&server);
    wiki.login("Bot@janitor", "secret").await.unwrap();
    assert_eq!(wiki.username(), Some("Bot@janitor"));
}
