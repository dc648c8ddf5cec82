use jamf_provider::client::HttpClient;
use jamf_provider::reconciler::{Action, Provider};
use jamf_provider::resources::{ApiRole, ApiRoleClient, MatchPolicy};
use jamf_provider::state::{DesiredState, Ensure, Observed, ResourceId};
use jamf_provider::Error;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ROLES: &str = "/api/v1/api-roles";

fn client(server: &MockServer, policy: MatchPolicy) -> ApiRoleClient {
    let http = HttpClient::builder()
        .bearer_token("token-123")
        .build()
        .unwrap();
    ApiRoleClient::new(http, &Url::parse(&server.uri()).unwrap(), policy).unwrap()
}

fn desired(ensure: Ensure, privileges: &[&str]) -> DesiredState<ApiRole> {
    DesiredState {
        name: "Editors".into(),
        ensure,
        attributes: ApiRole {
            privileges: privileges.iter().map(|s| s.to_string()).collect(),
        },
    }
}

async fn mutating_methods(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| r.method.to_string())
        .filter(|m| m != "GET")
        .collect()
}

#[tokio::test]
async fn test_update_changed_privileges() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ROLES))
        .and(header("Accept", "application/json"))
        .and(header("Authorization", "Bearer token-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "totalCount": 2,
            "results": [
                {"id": "1", "displayName": "Auditors", "privileges": ["Read Computers"]},
                {"id": "5", "displayName": "Editors", "privileges": ["Read Computers"]},
            ]
        })))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{ROLES}/5")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "5", "displayName": "Editors", "privileges": ["Read Computers"]
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{ROLES}/5")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "5", "displayName": "Editors",
            "privileges": ["Read Computers", "Update Computers"]
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!("{ROLES}/5")))
        .and(header("Content-Type", "application/json"))
        .and(body_json(json!({
            "displayName": "Editors",
            "privileges": ["Read Computers", "Update Computers"],
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let mut provider = Provider::new(
        client(&server, MatchPolicy::First),
        desired(Ensure::Present, &["Read Computers", "Update Computers"]),
    );
    let report = provider.converge().await.unwrap();

    assert_eq!(report.action, Action::Update);
    assert_eq!(report.changed, vec!["privileges"]);
    assert_eq!(
        report.state,
        Observed::Present {
            id: ResourceId::new("5"),
            attributes: ApiRole {
                privileges: vec!["Read Computers".into(), "Update Computers".into()],
            },
        }
    );
    assert_eq!(mutating_methods(&server).await, vec!["PUT"]);
    server.verify().await;
}

#[tokio::test]
async fn test_create_missing_role() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ROLES))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(ROLES))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{"id": "9", "displayName": "Editors"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{ROLES}/9")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "9", "displayName": "Editors", "privileges": ["Read Computers"]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(ROLES))
        .and(body_json(json!({
            "displayName": "Editors",
            "privileges": ["Read Computers"],
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "9"})))
        .expect(1)
        .mount(&server)
        .await;

    let report = Provider::new(
        client(&server, MatchPolicy::First),
        desired(Ensure::Present, &["Read Computers"]),
    )
    .converge()
    .await
    .unwrap();

    assert_eq!(report.action, Action::Create);
    assert_eq!(report.state.id(), Some(&ResourceId::new("9")));
    assert_eq!(mutating_methods(&server).await, vec!["POST"]);
    server.verify().await;
}

#[tokio::test]
async fn test_delete_existing_role() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ROLES))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{"id": "5", "displayName": "Editors"}]
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(ROLES))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{ROLES}/5")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "5", "displayName": "Editors", "privileges": []
        })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(format!("{ROLES}/5")))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let report = Provider::new(
        client(&server, MatchPolicy::First),
        desired(Ensure::Absent, &[]),
    )
    .converge()
    .await
    .unwrap();

    assert_eq!(report.action, Action::Delete);
    assert_eq!(report.state, Observed::Absent);
    server.verify().await;
}

#[tokio::test]
async fn test_delete_of_missing_role_is_noop() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ROLES))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{"id": "1", "displayName": "Auditors"}]
        })))
        .mount(&server)
        .await;

    let mut provider = Provider::new(
        client(&server, MatchPolicy::First),
        desired(Ensure::Absent, &[]),
    );
    assert!(!provider.exists().await.unwrap());
    provider.destroy();
    provider.flush().await.unwrap();

    assert!(mutating_methods(&server).await.is_empty());
    assert_eq!(provider.cached(), Some(&Observed::Absent));
}

#[tokio::test]
async fn test_in_sync_role_is_left_alone() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ROLES))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{"id": "5", "displayName": "Editors"}]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{ROLES}/5")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "5", "displayName": "Editors",
            "privileges": ["Update Computers", "Read Computers"]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let report = Provider::new(
        client(&server, MatchPolicy::First),
        desired(Ensure::Present, &["Read Computers", "Update Computers"]),
    )
    .converge()
    .await
    .unwrap();

    assert_eq!(report.action, Action::None);
    server.verify().await;
}

#[tokio::test]
async fn test_duplicate_names_with_unique_policy() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ROLES))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {"id": "5", "displayName": "Editors"},
                {"id": "6", "displayName": "Editors"},
            ]
        })))
        .mount(&server)
        .await;

    let result = Provider::new(
        client(&server, MatchPolicy::Unique),
        desired(Ensure::Absent, &[]),
    )
    .converge()
    .await;

    assert!(matches!(
        result,
        Err(Error::AmbiguousMatch { count: 2, ref name, .. }) if name == "Editors"
    ));
    assert!(mutating_methods(&server).await.is_empty());
}

#[tokio::test]
async fn test_failed_update_surfaces_status() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ROLES))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{"id": "5", "displayName": "Editors"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{ROLES}/5")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "5", "displayName": "Editors", "privileges": []
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!("{ROLES}/5")))
        .respond_with(ResponseTemplate::new(400).set_body_string("unknown privilege"))
        .expect(1)
        .mount(&server)
        .await;

    let mut provider = Provider::new(
        client(&server, MatchPolicy::First),
        desired(Ensure::Present, &["Bogus"]),
    );
    let err = provider.converge().await.unwrap_err();

    assert!(matches!(&err, Error::HttpStatus { body, .. } if body == "unknown privilege"));
    // still the state of the one completed read
    assert_eq!(
        provider.cached(),
        Some(&Observed::Present {
            id: ResourceId::new("5"),
            attributes: ApiRole { privileges: vec![] },
        })
    );
    server.verify().await;
}
