use serde_json::{json, Value};
use std::time::{SystemTime, UNIX_EPOCH};

mod common;
use common::*;

fn services_fixture(count: usize) -> Vec<kitchen_cloud::models::Document> {
    (0..count)
        .map(|i| doc(json!({"name": format!("Kitchen {}", i), "rank": i})))
        .collect()
}

#[tokio::test]
async fn test_root_liveness() {
    let env = TestEnvironment::new().await;

    let response = env.client.get(env.url("/")).send().await.unwrap();

    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(
        response.text().await.unwrap(),
        "Kitchen-Cloud server is running"
    );
}

#[tokio::test]
async fn test_health_and_metrics_endpoints() {
    let env = TestEnvironment::new().await;

    let response = env.client.get(env.url("/health/status")).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["collections"]["reviews"], "ok");

    let response = env.client.get(env.url("/metrics")).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let text = response.text().await.unwrap();
    assert!(text.contains("http_requests_total"));
    assert!(text.contains("database_operations_total"));
}

#[tokio::test]
async fn test_jwt_issue_then_verify_keeps_email() {
    let env = TestEnvironment::new().await;

    let response = env
        .client
        .post(env.url("/jwt"))
        .json(&json!({"email": "chef@kitchen.io", "name": "Chef"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let body: Value = response.json().await.unwrap();
    let token = body["token"].as_str().expect("token must be a string");

    let claims = env.tokens.verify(token).unwrap();
    assert_eq!(claims.email(), Some("chef@kitchen.io"));
    assert_eq!(claims.exp - claims.iat, 3600);
}

#[tokio::test]
async fn test_services_pagination() {
    let env = TestEnvironment::with_services(services_fixture(5)).await;

    let response = env
        .client
        .get(env.url("/services?page=0&size=2"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["count"], 5);
    assert_eq!(body["services"].as_array().unwrap().len(), 2);
    assert_eq!(body["services"][0]["name"], "Kitchen 0");

    let body: Value = env
        .client
        .get(env.url("/services?page=2&size=2"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let services = body["services"].as_array().unwrap();
    assert_eq!(services.len(), 1);
    assert_eq!(services[0]["name"], "Kitchen 4");
}

#[tokio::test]
async fn test_services_without_size_returns_everything() {
    let env = TestEnvironment::with_services(services_fixture(4)).await;

    for path in ["/services", "/services?page=3", "/services?size=abc", "/services?size=0"] {
        let body: Value = env
            .client
            .get(env.url(path))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["services"].as_array().unwrap().len(), 4, "path {}", path);
        assert_eq!(body["count"], 4);
    }
}

#[tokio::test]
async fn test_foodlist_returns_full_collection() {
    let env = TestEnvironment::new().await;

    let response = env.client.get(env.url("/foodlist")).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let food: Vec<Value> = response.json().await.unwrap();
    assert_eq!(food.len(), 3);
    assert!(food.iter().all(|item| item["_id"].is_string()));
}

#[tokio::test]
async fn test_add_service_then_get_it() {
    let env = TestEnvironment::new().await;

    let response = env
        .client
        .post(env.url("/addservice"))
        .json(&json!({"name": "Pizza Place"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["acknowledged"], true);
    let id = body["insertedId"].as_str().unwrap().to_string();

    let service: Value = env
        .client
        .get(env.url(&format!("/services/{}", id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(service["name"], "Pizza Place");
    assert_eq!(service["_id"], id);
}

#[tokio::test]
async fn test_absent_service_is_null() {
    let env = TestEnvironment::new().await;

    let response = env
        .client
        .get(env.url("/services/0123456789abcdef0123456789abcdef"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.text().await.unwrap(), "null");
}

#[tokio::test]
async fn test_malformed_id_is_server_error() {
    let env = TestEnvironment::new().await;

    for path in ["/services/not-an-id", "/review/not-an-id"] {
        let response = env.client.get(env.url(path)).send().await.unwrap();
        assert_eq!(response.status().as_u16(), 500, "path {}", path);
    }

    let response = env
        .client
        .delete(env.url("/review/not-an-id"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 500);
}

#[tokio::test]
async fn test_get_review_by_id_reads_services_collection() {
    let env = TestEnvironment::new().await;

    let review_id = env
        .add_review(json!({"email": "a@kitchen.io", "message": "Great"}))
        .await;
    let response = env
        .client
        .get(env.url(&format!("/review/{}", review_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.text().await.unwrap(), "null");

    let body: Value = env
        .client
        .post(env.url("/addservice"))
        .json(&json!({"name": "Noodle Bar"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let service_id = body["insertedId"].as_str().unwrap();

    let found: Value = env
        .client
        .get(env.url(&format!("/review/{}", service_id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(found["name"], "Noodle Bar");
}

#[tokio::test]
async fn test_reviews_requires_token() {
    let env = TestEnvironment::new().await;

    let response = env
        .client
        .get(env.url("/reviews?email=a@kitchen.io"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"message": "unauthorized access"}));

    let response = env.list_reviews("a@kitchen.io", "garbage").await;
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn test_expired_token_is_unauthorized() {
    let env = TestEnvironment::new().await;

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs();
    let token = env
        .tokens
        .issue_at(doc(json!({"email": "a@kitchen.io"})), now - 7200)
        .unwrap();

    let response = env.list_reviews("a@kitchen.io", &token).await;
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn test_reviews_with_other_email_is_forbidden() {
    let env = TestEnvironment::new().await;
    env.add_review(json!({"email": "b@kitchen.io", "message": "Mine"}))
        .await;

    let token = env.token_for("a@kitchen.io");
    let response = env.list_reviews("b@kitchen.io", &token).await;

    assert_eq!(response.status().as_u16(), 403);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"message": "Forbidden access"}));
}

#[tokio::test]
async fn test_inserted_review_is_listed_for_owner() {
    let env = TestEnvironment::new().await;

    let mine = env
        .add_review(json!({"email": "a@kitchen.io", "message": "Loved the curry"}))
        .await;
    env.add_review(json!({"email": "b@kitchen.io", "message": "Too salty"}))
        .await;

    let token = env.token_for("a@kitchen.io");
    let response = env.list_reviews("a@kitchen.io", &token).await;
    assert_eq!(response.status().as_u16(), 200);

    let reviews: Vec<Value> = response.json().await.unwrap();
    assert_eq!(reviews.len(), 1);
    assert_eq!(reviews[0]["_id"], mine);
    assert_eq!(reviews[0]["message"], "Loved the curry");
}

#[tokio::test]
async fn test_update_review_changes_only_message() {
    let env = TestEnvironment::new().await;

    let id = env
        .add_review(json!({
            "email": "a@kitchen.io",
            "message": "Cold fries",
            "rating": 2,
            "service": "Burger Hut"
        }))
        .await;

    let response = env
        .client
        .put(env.url(&format!("/myreview/{}", id)))
        .json(&json!({"message": "Fries were hot this time", "rating": 5}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let result: Value = response.json().await.unwrap();
    assert_eq!(result["matchedCount"], 1);
    assert_eq!(result["modifiedCount"], 1);

    let token = env.token_for("a@kitchen.io");
    let reviews: Vec<Value> = env
        .list_reviews("a@kitchen.io", &token)
        .await
        .json()
        .await
        .unwrap();

    assert_eq!(
        reviews[0],
        json!({
            "_id": id,
            "email": "a@kitchen.io",
            "message": "Fries were hot this time",
            "rating": 2,
            "service": "Burger Hut"
        })
    );
}

#[tokio::test]
async fn test_update_missing_review_matches_nothing() {
    let env = TestEnvironment::new().await;

    let response = env
        .client
        .put(env.url("/myreview/0123456789abcdef0123456789abcdef"))
        .json(&json!({"message": "hello"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let result: Value = response.json().await.unwrap();
    assert_eq!(result["matchedCount"], 0);
    assert_eq!(result["modifiedCount"], 0);
}

#[tokio::test]
async fn test_delete_review_removes_it() {
    let env = TestEnvironment::new().await;

    let id = env
        .add_review(json!({"email": "a@kitchen.io", "message": "Bye"}))
        .await;

    let response = env
        .client
        .delete(env.url(&format!("/review/{}", id)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let result: Value = response.json().await.unwrap();
    assert_eq!(result, json!({"acknowledged": true, "deletedCount": 1}));

    let token = env.token_for("a@kitchen.io");
    let reviews: Vec<Value> = env
        .list_reviews("a@kitchen.io", &token)
        .await
        .json()
        .await
        .unwrap();
    assert!(reviews.is_empty());

    // Deleting again is not an error
    let result: Value = env
        .client
        .delete(env.url(&format!("/review/{}", id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(result["deletedCount"], 0);
}

#[tokio::test]
async fn test_non_json_body_rejected() {
    let env = TestEnvironment::new().await;

    let response = env
        .client
        .post(env.url("/review"))
        .header("content-type", "text/plain")
        .body("hello")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 415);
}

#[tokio::test]
async fn test_mixed_case_json_content_type_accepted() {
    let env = TestEnvironment::new().await;

    let response = env
        .client
        .post(env.url("/addservice"))
        .header("content-type", "Application/JSON")
        .body(r#"{"name": "Taco Truck"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["acknowledged"], true);
}

#[tokio::test]
async fn test_fractional_page_scales_skip() {
    let env = TestEnvironment::with_services(services_fixture(20)).await;

    let body: Value = env
        .client
        .get(env.url("/services?page=1.5&size=10"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let services = body["services"].as_array().unwrap();
    assert_eq!(services.len(), 5);
    assert_eq!(services[0]["name"], "Kitchen 15");
}

#[tokio::test]
async fn test_cors_allows_any_origin() {
    let env = TestEnvironment::new().await;

    let response = env
        .client
        .get(env.url("/foodlist"))
        .header("origin", "https://kitchen.example")
        .send()
        .await
        .unwrap();

    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "*"
    );
}
