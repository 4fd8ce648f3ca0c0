use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cigate::config::GitLabConfig;
use cigate::error::AppError;
use cigate::platform::gitlab::GitLabPlatform;
use cigate::platform::types::ReviewTarget;
use cigate::platform::{ApprovalSource, CommentSink, MergeRequestSource};

async fn setup() -> (MockServer, GitLabPlatform) {
    let server = MockServer::start().await;
    let platform = GitLabPlatform::new(&GitLabConfig {
        url: format!("{}/api/v4", server.uri()),
        token: "glpat-test".to_string(),
    })
    .expect("Failed to build platform");
    (server, platform)
}

fn target() -> ReviewTarget {
    ReviewTarget {
        project_id: "42".to_string(),
        merge_request_iid: 7,
    }
}

#[tokio::test]
async fn test_approval_rules_are_mapped() {
    let (server, platform) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v4/projects/42/merge_requests/7/approval_state"))
        .and(header("PRIVATE-TOKEN", "glpat-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "approval_rules_overwritten": false,
            "rules": [
                {
                    "id": 1,
                    "name": "maintainers",
                    "approvals_required": 2,
                    "approved_by": [{"id": 1, "username": "alice"}]
                }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let rules = platform.approval_rules(&target()).await.unwrap();

    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].name, "maintainers");
    assert_eq!(rules[0].approvals_required, 2);
    assert_eq!(rules[0].approved_by, vec!["alice".to_string()]);
}

#[tokio::test]
async fn test_open_merge_requests_follow_pagination() {
    let (server, platform) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v4/projects/group%2Finfra/merge_requests"))
        .and(query_param("state", "opened"))
        .and(query_param("page", "1"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-Next-Page", "2")
                .set_body_json(json!([{"iid": 9, "title": "b"}, {"iid": 7, "title": "a"}])),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v4/projects/group%2Finfra/merge_requests"))
        .and(query_param("page", "2"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-Next-Page", "")
                .set_body_json(json!([{"iid": 3, "title": "c"}])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let open = platform.open_merge_requests("group/infra").await.unwrap();
    let iids: Vec<u64> = open.iter().map(|mr| mr.iid).collect();

    assert_eq!(iids, vec![9, 7, 3]);
}

#[tokio::test]
async fn test_create_comment_posts_body() {
    let (server, platform) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/v4/projects/42/merge_requests/7/notes"))
        .and(header("PRIVATE-TOKEN", "glpat-test"))
        .and(body_json(json!({"body": "hello"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 1, "body": "hello"})))
        .expect(1)
        .mount(&server)
        .await;

    platform.create_comment(&target(), "hello").await.unwrap();
}

#[tokio::test]
async fn test_error_status_is_review_api_error() {
    let (server, platform) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/v4/projects/42/merge_requests/7/notes"))
        .respond_with(ResponseTemplate::new(401).set_body_string("401 Unauthorized"))
        .mount(&server)
        .await;

    let err = platform.create_comment(&target(), "hello").await.unwrap_err();

    match err {
        AppError::ReviewApi(msg) => {
            assert!(msg.contains("401"));
            assert!(msg.contains("create merge request comment"));
        }
        other => panic!("unexpected error: {other}"),
    }
}
