use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use dealdesk_auth::config::MicrosoftConfig;
use dealdesk_auth::domain::repository::{IdentityProvider, SigningKeySource};
use dealdesk_auth::error::AuthServiceError;
use dealdesk_auth::infra::microsoft::MicrosoftClient;
use dealdesk_auth::usecase::id_token::IdTokenVerifier;
use dealdesk_testing::idp::{TEST_CLIENT_ID, TEST_KID, TEST_TENANT_ID, TestIdToken, jwks_json};

fn config() -> MicrosoftConfig {
    MicrosoftConfig {
        client_id: TEST_CLIENT_ID.to_owned(),
        client_secret: "client-secret".to_owned(),
        tenant_id: TEST_TENANT_ID.to_owned(),
        redirect_uri: "https://crm.example.com/auth/microsoft/callback".to_owned(),
    }
}

fn client_for(server: &MockServer, timeout: Duration) -> MicrosoftClient {
    MicrosoftClient::new(config(), timeout)
        .unwrap()
        .with_endpoints(&server.uri(), &server.uri())
}

fn keys_path() -> String {
    format!("/{TEST_TENANT_ID}/discovery/v2.0/keys")
}

#[tokio::test]
async fn should_build_authorize_url_for_configured_tenant() {
    let client = MicrosoftClient::new(config(), Duration::from_secs(5)).unwrap();

    let url = url::Url::parse(&client.authorize_url("state-xyz").unwrap()).unwrap();

    assert_eq!(url.host_str(), Some("login.microsoftonline.com"));
    assert_eq!(
        url.path(),
        format!("/{TEST_TENANT_ID}/oauth2/v2.0/authorize")
    );
    let params: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    assert!(params.contains(&("state".to_owned(), "state-xyz".to_owned())));
    assert!(params.contains(&("client_id".to_owned(), TEST_CLIENT_ID.to_owned())));
    assert!(params.contains(&("response_type".to_owned(), "code".to_owned())));
}

#[tokio::test]
async fn should_exchange_code_for_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/{TEST_TENANT_ID}/oauth2/v2.0/token")))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=the-code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token_type": "Bearer",
            "id_token": "id.token.value",
            "access_token": "access-value",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let tokens = client_for(&server, Duration::from_secs(5))
        .exchange_code("the-code")
        .await
        .unwrap();

    assert_eq!(tokens.id_token, "id.token.value");
    assert_eq!(tokens.access_token, "access-value");
}

#[tokio::test]
async fn should_map_rejected_exchange_to_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/{TEST_TENANT_ID}/oauth2/v2.0/token")))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
        })))
        .mount(&server)
        .await;

    let result = client_for(&server, Duration::from_secs(5))
        .exchange_code("stale-code")
        .await;
    assert!(
        matches!(result, Err(AuthServiceError::FederationUnavailable)),
        "expected FederationUnavailable, got {result:?}"
    );
}

#[tokio::test]
async fn should_fetch_profile_with_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1.0/me"))
        .and(header("authorization", "Bearer access-value"))
        .and(query_param(
            "$select",
            "id,mail,userPrincipalName,givenName,surname,displayName",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "graph-id",
            "mail": null,
            "userPrincipalName": "alice@acme.com",
            "givenName": "Alice",
            "surname": "Doe",
        })))
        .mount(&server)
        .await;

    let profile = client_for(&server, Duration::from_secs(5))
        .fetch_profile("access-value")
        .await
        .unwrap();

    assert_eq!(profile.email(), Some("alice@acme.com"));
    assert_eq!(profile.given_name.as_deref(), Some("Alice"));
}

#[tokio::test]
async fn should_read_organization_tenant() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1.0/organization"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{ "id": "org-tenant" }],
        })))
        .mount(&server)
        .await;

    let tenant = client_for(&server, Duration::from_secs(5))
        .fetch_organization_tenant("access-value")
        .await
        .unwrap();
    assert_eq!(tenant.as_deref(), Some("org-tenant"));
}

#[tokio::test]
async fn should_skip_unusable_published_keys() {
    let rsa_key = jwks_json()["keys"][0].clone();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(keys_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "keys": [
                { "kty": "EC", "kid": "ec-key", "crv": "P-256", "x": "abc", "y": "def" },
                rsa_key,
            ]
        })))
        .mount(&server)
        .await;

    let keys = client_for(&server, Duration::from_secs(5))
        .fetch_signing_keys(TEST_TENANT_ID)
        .await
        .unwrap();

    assert_eq!(keys.len(), 1);
    assert_eq!(keys[0].kid, TEST_KID);
}

#[tokio::test]
async fn should_time_out_slow_provider() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(keys_path()))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(jwks_json())
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let result = client_for(&server, Duration::from_millis(200))
        .fetch_signing_keys(TEST_TENANT_ID)
        .await;
    assert!(matches!(result, Err(AuthServiceError::FederationUnavailable)));
}

#[tokio::test]
async fn should_verify_tokens_against_cached_published_keys() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(keys_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(jwks_json()))
        .expect(1)
        .mount(&server)
        .await;

    let verifier = IdTokenVerifier::new(
        client_for(&server, Duration::from_secs(5)),
        TEST_CLIENT_ID,
        TEST_TENANT_ID,
    );

    for email in ["alice@acme.com", "bob@acme.com"] {
        let claims = verifier
            .verify(&TestIdToken::for_email(email).sign())
            .await
            .unwrap();
        assert_eq!(claims.email(), Some(email));
        assert_eq!(claims.tid.as_deref(), Some(TEST_TENANT_ID));
    }
}
