//! Integration tests for the dashboard API client methods

use chrono::{Duration, NaiveDate, Utc};
use kcc_core::CredentialPair;
use kcc_http::types::{AnalyticsRange, EventRequest, RegisterRequest, UpdateCafeRequest};
use kcc_http::{ClientConfig, ClientError, DashboardClient};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn signed_in_client(server: &MockServer) -> DashboardClient {
    let client = DashboardClient::new(server.uri()).unwrap();
    client
        .session()
        .establish(CredentialPair::new("a0", "r0"))
        .await
        .unwrap();
    client
}

#[tokio::test]
async fn test_client_builder() {
    let client = DashboardClient::builder()
        .base_url("http://localhost:8080/")
        .build();

    assert!(client.is_ok());
    let client = client.unwrap();
    assert_eq!(client.base_url(), "http://localhost:8080");
}

#[tokio::test]
async fn test_client_builder_rejects_invalid_config() {
    let result = DashboardClient::builder().base_url("not a url").build();
    assert!(matches!(result, Err(ClientError::Configuration(_))));

    let config = ClientConfig {
        login_route: "login".to_string(),
        ..Default::default()
    };
    let result = DashboardClient::builder().config(config).build();
    assert!(matches!(result, Err(ClientError::Configuration(_))));
}

#[tokio::test]
async fn test_login_establishes_session() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_json(json!({ "email": "owner@cafe.pk", "password": "s3cret" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "accessToken": "a1",
            "refreshToken": "r1",
            "user": { "id": "u1", "email": "owner@cafe.pk", "name": "Ayesha" }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .and(header("authorization", "Bearer a1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "u1", "email": "owner@cafe.pk", "name": "Ayesha"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = DashboardClient::new(mock_server.uri()).unwrap();
    let user = client.login("owner@cafe.pk", "s3cret").await.unwrap();
    assert_eq!(user.name, "Ayesha");
    assert!(client.can_resume().await.unwrap());

    let me = client.me().await.unwrap();
    assert_eq!(me, user);
}

#[tokio::test]
async fn test_login_rejects_malformed_email_without_request() {
    let mock_server = MockServer::start().await;
    let client = DashboardClient::new(mock_server.uri()).unwrap();

    let result = client.login("owner", "s3cret").await;
    assert!(matches!(result, Err(ClientError::InvalidInput(_))));
    assert!(mock_server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_register_establishes_session() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/register"))
        .and(body_json(json!({
            "name": "Ayesha",
            "email": "owner@cafe.pk",
            "password": "s3cret",
            "cafeName": "Chai Wala Corner"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "accessToken": "a1",
            "refreshToken": "r1",
            "user": { "id": "u1", "email": "owner@cafe.pk", "name": "Ayesha", "cafeId": "c1" }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = DashboardClient::new(mock_server.uri()).unwrap();
    let user = client
        .register(RegisterRequest {
            name: "Ayesha".to_string(),
            email: "owner@cafe.pk".to_string(),
            password: "s3cret".to_string(),
            cafe_name: "Chai Wala Corner".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(user.cafe_id.as_deref(), Some("c1"));
    assert_eq!(
        client.session().credentials().await.unwrap(),
        Some(CredentialPair::new("a1", "r1"))
    );
}

#[tokio::test]
async fn test_logout_clears_session_even_when_server_fails() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .and(body_json(json!({ "refreshToken": "r0" })))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = signed_in_client(&mock_server).await;
    client.logout().await.unwrap();

    assert!(client.session().credentials().await.unwrap().is_none());
    assert!(!client.can_resume().await.unwrap());
}

#[tokio::test]
async fn test_update_cafe_sends_only_changed_fields() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/cafes/me"))
        .and(body_json(json!({ "openingHours": "8am - 11pm" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "c1",
            "name": "Chai Wala Corner",
            "address": "Zamzama Blvd",
            "city": "Karachi",
            "openingHours": "8am - 11pm"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = signed_in_client(&mock_server).await;
    let cafe = client
        .update_cafe(&UpdateCafeRequest {
            opening_hours: Some("8am - 11pm".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(cafe.opening_hours.as_deref(), Some("8am - 11pm"));
}

#[tokio::test]
async fn test_onboarding_and_subscription() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/cafes/me/onboarding"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "profileComplete": true,
            "verificationComplete": true,
            "subscriptionActive": false
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/subscriptions/activate"))
        .and(body_json(json!({ "plan": "monthly" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "plan": "monthly",
            "status": "active"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = signed_in_client(&mock_server).await;
    let status = client.onboarding_status().await.unwrap();
    assert_eq!(
        status.next_step(),
        Some(kcc_http::types::OnboardingStep::Subscription)
    );

    let subscription = client.activate_subscription("monthly").await.unwrap();
    assert_eq!(subscription.status, "active");
    assert!(subscription.current_period_end.is_none());
}

#[tokio::test]
async fn test_set_staff_pin() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/cafes/me/verification/pin"))
        .and(header("authorization", "Bearer a0"))
        .and(body_json(json!({ "pin": "4821" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "qrCodeUrl": "https://cdn.kcc.pk/qr/c1.png",
            "qrToken": "qr-1",
            "pinSet": true
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = signed_in_client(&mock_server).await;
    let settings = client.set_staff_pin("4821").await.unwrap();
    assert!(settings.pin_set);

    let result = client.set_staff_pin("48a1").await;
    assert!(matches!(result, Err(ClientError::InvalidInput(_))));
}

#[tokio::test]
async fn test_regenerate_qr_code() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/cafes/me/verification/qr/regenerate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "qrCodeUrl": "https://cdn.kcc.pk/qr/c1-v2.png",
            "qrToken": "qr-2",
            "pinSet": true,
            "updatedAt": "2026-10-01T09:30:00Z"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = signed_in_client(&mock_server).await;
    let settings = client.regenerate_qr_code().await.unwrap();
    assert_eq!(settings.qr_token, "qr-2");
    assert!(settings.updated_at.is_some());
}

#[tokio::test]
async fn test_analytics_endpoints() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/analytics/overview"))
        .and(query_param("range", "30d"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "totalVisits": 1240,
            "totalStamps": 980,
            "redemptions": 85,
            "uniqueCustomers": 412
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/analytics/visits"))
        .and(query_param("range", "7d"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "date": "2026-10-03", "visits": 40, "stamps": 31 },
            { "date": "2026-10-01", "visits": 52, "stamps": 47 },
            { "date": "2026-10-02", "visits": 38, "stamps": 30 }
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = signed_in_client(&mock_server).await;
    let overview = client.analytics_overview(AnalyticsRange::Month).await.unwrap();
    assert_eq!(overview.total_visits, 1240);
    assert_eq!(overview.unique_customers, 412);

    let days = client.daily_visits(AnalyticsRange::Week).await.unwrap();
    let dates: Vec<_> = days.iter().map(|day| day.date).collect();
    assert_eq!(
        dates,
        vec![
            NaiveDate::from_ymd_opt(2026, 10, 1).unwrap(),
            NaiveDate::from_ymd_opt(2026, 10, 2).unwrap(),
            NaiveDate::from_ymd_opt(2026, 10, 3).unwrap(),
        ]
    );
}

#[tokio::test]
async fn test_event_lifecycle() {
    let mock_server = MockServer::start().await;
    let starts_at = Utc::now();
    let ends_at = starts_at + Duration::hours(2);

    let event_json = json!({
        "id": "e1",
        "title": "Latte art workshop",
        "startsAt": starts_at,
        "endsAt": ends_at
    });

    Mock::given(method("POST"))
        .and(path("/events"))
        .respond_with(ResponseTemplate::new(201).set_body_json(&event_json))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/events/e1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/events/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("event not found"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = signed_in_client(&mock_server).await;
    let created = client
        .create_event(&EventRequest {
            title: "Latte art workshop".to_string(),
            description: None,
            starts_at,
            ends_at,
            image_url: None,
        })
        .await
        .unwrap();
    assert_eq!(created.id, "e1");

    client.delete_event("e1").await.unwrap();

    let result = client.delete_event("missing").await;
    assert!(matches!(result, Err(ClientError::NotFound(_))));
}

#[tokio::test]
async fn test_ids_are_escaped_in_paths() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/events/e1%2F..%3Fforce%3D1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/notifications/n%231/read"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = signed_in_client(&mock_server).await;
    client.delete_event("e1/..?force=1").await.unwrap();
    client.mark_notification_read("n#1").await.unwrap();

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    assert!(requests.iter().all(|request| request.url.query().is_none()));
}

#[tokio::test]
async fn test_notifications() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/notifications"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": "n1",
                "title": "Subscription renewed",
                "body": "Your monthly plan renews on 1 Nov",
                "createdAt": "2026-10-18T12:00:00Z"
            }
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/notifications/n1/read"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = signed_in_client(&mock_server).await;
    let notifications = client.list_notifications().await.unwrap();
    assert_eq!(notifications.len(), 1);
    assert!(!notifications[0].read);

    client.mark_notification_read("n1").await.unwrap();
}
