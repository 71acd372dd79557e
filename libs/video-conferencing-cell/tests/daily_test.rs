use assert_matches::assert_matches;
use chrono::{TimeZone, Utc};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shared_utils::test_utils::TestConfig;
use video_conferencing_cell::{DailyRoomProvisioner, RoomProvisioner, RoomProvisioningError};

async fn provisioner_for(mock_server: &MockServer) -> DailyRoomProvisioner {
    let mut config = TestConfig::default().to_app_config();
    config.daily_api_base_url = mock_server.uri();
    DailyRoomProvisioner::new(&config).unwrap()
}

#[tokio::test]
async fn test_create_room_sends_expiry_and_returns_url() {
    let mock_server = MockServer::start().await;
    let expires_at = Utc.with_ymd_and_hms(2030, 3, 4, 10, 0, 0).unwrap();

    Mock::given(method("POST"))
        .and(path("/rooms"))
        .and(header("authorization", "Bearer test-daily-key"))
        .and(body_json(json!({"properties": {"exp": expires_at.timestamp()}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "5e3cf703-5547-47d6-a371-37b1f0b4427f",
            "name": "w2pp2cf4kltgFACPKXmX",
            "url": "https://clinic.daily.co/w2pp2cf4kltgFACPKXmX"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let provisioner = provisioner_for(&mock_server).await;
    let handle = provisioner.create(expires_at).await.unwrap();

    assert_eq!(handle.as_str(), "https://clinic.daily.co/w2pp2cf4kltgFACPKXmX");
}

#[tokio::test]
async fn test_create_room_without_url_fails() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rooms"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "orphan"})))
        .mount(&mock_server)
        .await;

    let provisioner = provisioner_for(&mock_server).await;
    let result = provisioner.create(Utc::now()).await;

    assert_matches!(result, Err(RoomProvisioningError::MissingRoomUrl));
}

#[tokio::test]
async fn test_create_room_provider_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rooms"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&mock_server)
        .await;

    let provisioner = provisioner_for(&mock_server).await;
    let result = provisioner.create(Utc::now()).await;

    assert_matches!(result, Err(RoomProvisioningError::ProviderApiError { message }) if message.contains("500"));
}

#[test]
fn test_provisioner_requires_configuration() {
    let mut config = TestConfig::default().to_app_config();
    config.daily_api_key = String::new();

    assert_matches!(DailyRoomProvisioner::new(&config).err(), Some(RoomProvisioningError::NotConfigured));
}
