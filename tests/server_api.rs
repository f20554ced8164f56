//! End-to-end tests for the HTTP API.
//!
//! Each test starts the real server on a free port against a fresh SQLite
//! database, with an in-process axum server standing in for the
//! chat-completions endpoint.

use arcana::auth::{self, sign_token, Claims};
use arcana::config::Config;
use arcana::payments::signature_header;
use arcana::{db, migrate, server};
use axum::{routing::post, Json, Router};
use chrono::Utc;
use reqwest::StatusCode;
use serde_json::{json, Value};
use tempfile::TempDir;

const JWT_SECRET: &str = "test-jwt-secret";
const WEBHOOK_SECRET: &str = "whsec_test";

const MODEL_REPLY: &str = r#"Here you go:
{"overall": "Mock overall", "cards": {"The Card": "Mock card"}, "synthesis": "Mock synthesis"}"#;

// ─── Helpers ────────────────────────────────────────────────────────

fn find_free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

async fn wait_for_server(port: u16) {
    let client = reqwest::Client::new();
    let url = format!("http://127.0.0.1:{}/health", port);
    for _ in 0..50 {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        if let Ok(resp) = client.get(&url).send().await {
            if resp.status().is_success() {
                return;
            }
        }
    }
    panic!("Server did not become ready within 5 seconds");
}

/// Serve `POST /chat/completions` answering every call with `reply`.
async fn start_mock_llm(reply: &'static str) -> String {
    let app = Router::new().route(
        "/chat/completions",
        post(move |Json(_body): Json<Value>| async move {
            Json(json!({
                "choices": [{ "message": { "role": "assistant", "content": reply } }]
            }))
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

struct TestApp {
    _tmp: TempDir,
    base: String,
    client: reqwest::Client,
}

impl TestApp {
    async fn start(llm_reply: &'static str, with_webhook_secret: bool) -> TestApp {
        let tmp = TempDir::new().unwrap();
        let port = find_free_port();
        let llm_url = start_mock_llm(llm_reply).await;
        let payments = if with_webhook_secret {
            format!("[payments]\nwebhook_secret = \"{}\"\n", WEBHOOK_SECRET)
        } else {
            String::new()
        };

        let config_content = format!(
            r#"
[db]
path = "{}"

[server]
bind = "127.0.0.1:{}"

[llm]
provider = "openai"
base_url = "{}"
api_key = "sk-test"
timeout_secs = 5

[auth]
jwt_secret = "{}"

{}
"#,
            tmp.path().join("arcana.sqlite").display(),
            port,
            llm_url,
            JWT_SECRET,
            payments
        );
        let config: Config = toml::from_str(&config_content).unwrap();

        migrate::run_migrations(&config).await.unwrap();
        let pool = db::connect(&config).await.unwrap();
        auth::grant_admin(&pool, "admin").await.unwrap();
        pool.close().await;

        tokio::spawn(async move {
            server::run_server(&config).await.unwrap();
        });
        wait_for_server(port).await;

        TestApp {
            _tmp: tmp,
            base: format!("http://127.0.0.1:{}", port),
            client: reqwest::Client::new(),
        }
    }

    fn token(&self, user_id: &str) -> String {
        let claims = Claims {
            sub: user_id.to_string(),
            exp: Utc::now().timestamp() + 3600,
            email: None,
        };
        sign_token(JWT_SECRET.as_bytes(), &claims).unwrap()
    }

    async fn send(
        &self,
        method: reqwest::Method,
        path: &str,
        user: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = self.client.request(method, format!("{}{}", self.base, path));
        if let Some(user) = user {
            req = req.bearer_auth(self.token(user));
        }
        if let Some(body) = body {
            req = req.json(&body);
        }
        let resp = req.send().await.unwrap();
        let status = resp.status();
        let json = resp.json::<Value>().await.unwrap_or(Value::Null);
        (status, json)
    }

    async fn get(&self, path: &str, user: Option<&str>) -> (StatusCode, Value) {
        self.send(reqwest::Method::GET, path, user, None).await
    }

    async fn post(&self, path: &str, user: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(reqwest::Method::POST, path, user, Some(body)).await
    }

    async fn put(&self, path: &str, user: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(reqwest::Method::PUT, path, user, Some(body)).await
    }

    async fn delete(&self, path: &str, user: Option<&str>) -> (StatusCode, Value) {
        self.send(reqwest::Method::DELETE, path, user, None).await
    }

    async fn post_webhook(&self, payload: &str, signature: Option<String>) -> (StatusCode, Value) {
        let mut req = self
            .client
            .post(format!("{}/payments/webhook", self.base))
            .header("content-type", "application/json")
            .body(payload.to_string());
        if let Some(sig) = signature {
            req = req.header("stripe-signature", sig);
        }
        let resp = req.send().await.unwrap();
        let status = resp.status();
        (status, resp.json::<Value>().await.unwrap_or(Value::Null))
    }
}

fn single_card_reading(question: &str) -> Value {
    json!({
        "question": question,
        "spreadType": "single",
        "language": "EN",
        "cards": [{ "cardName": "The Star", "positionName": "The Card", "isReversed": false }]
    })
}

fn interpretation_body(question: &str) -> Value {
    json!({
        "question": question,
        "spreadType": "single",
        "drawnCards": [{
            "cardName": "The Hermit",
            "positionName": "The Card",
            "isReversed": true,
            "meaning": "Looking inward for answers",
            "keywords": ["introspection", "solitude", "guidance"]
        }],
        "tone": "direct",
        "language": "EN",
        "focusAreas": ["career"]
    })
}

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_health() {
    let app = TestApp::start(MODEL_REPLY, true).await;
    let (status, body) = app.get("/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_auth_required_and_admin_gating() {
    let app = TestApp::start(MODEL_REPLY, true).await;

    let (status, body) = app.get("/credits", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "No authorization header");
    assert_eq!(body["code"], "unauthorized");

    let resp = app
        .client
        .get(format!("{}/credits", app.base))
        .bearer_auth("not.a.token")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .post(
            "/knowledge/ingest",
            Some("user-1"),
            json!({"name": "Notes", "content": "Some text."}),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Admin access required");

    let (status, _) = app.get("/admin/stats", Some("user-1")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_ingest_query_and_admin_knowledge() {
    let app = TestApp::start(MODEL_REPLY, true).await;

    let (status, body) = app
        .post(
            "/knowledge/ingest",
            Some("admin"),
            json!({"name": "  ", "content": "text"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Name and content are required");

    let (status, body) = app
        .post(
            "/knowledge/ingest",
            Some("admin"),
            json!({
                "name": "Major Arcana",
                "description": "Card notes",
                "content": "The Hermit represents introspection and solitude. The Star brings renewed hope.",
                "sourceType": "manual"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["chunksCreated"], 1);
    let source_id = body["sourceId"].as_str().unwrap().to_string();

    let (status, body) = app
        .post(
            "/knowledge/query",
            Some("user-1"),
            json!({"query": "what about solitude", "cardNames": ["The Hermit"]}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let chunks = body["chunks"].as_array().unwrap();
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0]["source_name"], "Major Arcana");
    assert!(chunks[0].get("similarity").map_or(true, Value::is_null));
    assert_eq!(body["query"], "what about solitude The Hermit");

    let (status, _) = app
        .post("/knowledge/query", Some("user-1"), json!({"query": " "}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, sources) = app.get("/admin/knowledge", Some("admin")).await;
    assert_eq!(sources[0]["chunk_count"], 1);
    assert_eq!(sources[0]["embedded_count"], 0);

    let (status, chunks) = app
        .get(&format!("/admin/knowledge/{}/chunks", source_id), Some("admin"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(chunks[0]["chunk_index"], 0);

    let (status, body) = app
        .delete(&format!("/admin/knowledge/{}", source_id), Some("admin"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], true);

    let (status, _) = app
        .delete(&format!("/admin/knowledge/{}", source_id), Some("admin"))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_interpretation_from_model() {
    let app = TestApp::start(MODEL_REPLY, true).await;

    let (status, body) = app
        .post(
            "/interpretation",
            Some("user-1"),
            interpretation_body("Should I change jobs?"),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["overall"], "Mock overall");
    assert_eq!(body["cards"]["The Card"], "Mock card");
    assert_eq!(body["synthesis"], "Mock synthesis");
    assert_eq!(body["tone"], "direct");
    assert!(body["generatedAt"].is_string());
}

#[tokio::test]
async fn test_interpretation_falls_back_on_unparseable_reply() {
    let app = TestApp::start("I cannot answer in JSON today.", true).await;

    let (status, body) = app
        .post(
            "/interpretation",
            Some("user-1"),
            interpretation_body("Should I change jobs?"),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let overall = body["overall"].as_str().unwrap();
    assert!(overall.starts_with("The cards clearly point to"));
    assert!(overall.contains("Should I change jobs?"));
    assert!(body["cards"]["The Card"].is_string());
    assert!(!body["synthesis"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_interpretation_validation() {
    let app = TestApp::start(MODEL_REPLY, true).await;

    let mut bad_spread = interpretation_body("Q?");
    bad_spread["spreadType"] = json!("horseshoe");
    let (status, body) = app.post("/interpretation", Some("user-1"), bad_spread).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Unknown spread type: horseshoe");

    let mut no_cards = interpretation_body("Q?");
    no_cards["drawnCards"] = json!([]);
    let (status, _) = app.post("/interpretation", Some("user-1"), no_cards).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_credits_gate_saved_readings() {
    let app = TestApp::start(MODEL_REPLY, true).await;

    let (status, body) = app.get("/credits", Some("user-1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["balance"], 3);
    assert_eq!(body["entries"][0]["transaction_type"], "signup");
    assert_eq!(body["entries"][0]["description"], "Welcome bonus credits");

    // Wrong card count is rejected before anything is charged.
    let mut wrong = single_card_reading("Q?");
    wrong["spreadType"] = json!("three_card");
    let (status, _) = app.post("/readings", Some("user-1"), wrong).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    for i in 0..3 {
        let (status, reading) = app
            .post("/readings", Some("user-1"), single_card_reading(&format!("Q{}?", i)))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(reading["cards"][0]["cardName"], "The Star");
    }

    let (status, body) = app
        .post("/readings", Some("user-1"), single_card_reading("One more?"))
        .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["code"], "insufficient_credits");

    let (_, readings) = app.get("/readings", Some("user-1")).await;
    assert_eq!(readings.as_array().unwrap().len(), 3);

    let (_, credits) = app.get("/credits", Some("user-1")).await;
    assert_eq!(credits["balance"], 0);
    assert_eq!(credits["entries"][0]["transaction_type"], "usage");
    assert_eq!(credits["entries"][0]["amount"], -1);
}

#[tokio::test]
async fn test_reading_ownership_and_journal() {
    let app = TestApp::start(MODEL_REPLY, true).await;

    let (_, reading) = app
        .post("/readings", Some("alice"), single_card_reading("What now?"))
        .await;
    let id = reading["id"].as_str().unwrap().to_string();
    let path = format!("/readings/{}", id);

    let (status, _) = app.get(&path, Some("bob")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.delete(&path, Some("bob")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .put(
            &format!("{}/journal", path),
            Some("alice"),
            json!({"notes": "Felt hopeful", "mood": 9}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Mood must be between 1 and 5");

    let (status, updated) = app
        .put(
            &format!("{}/journal", path),
            Some("alice"),
            json!({"notes": "Felt hopeful", "mood": 4}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["notes"], "Felt hopeful");
    assert_eq!(updated["mood"], 4);

    let (_, interpretation) = app
        .post("/interpretation", Some("alice"), interpretation_body("What now?"))
        .await;
    let (status, replaced) = app
        .put(&format!("{}/interpretation", path), Some("alice"), interpretation)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(replaced["interpretation"]["overall"], "Mock overall");

    let (_, all) = app.get("/admin/readings", Some("admin")).await;
    assert_eq!(all.as_array().unwrap().len(), 1);

    let (status, body) = app.delete(&path, Some("alice")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], true);
}

#[tokio::test]
async fn test_webhook_credits_purchase_once() {
    let app = TestApp::start(MODEL_REPLY, true).await;
    let payload = json!({
        "id": "evt_1",
        "type": "checkout.session.completed",
        "data": { "object": {
            "id": "cs_test_1",
            "metadata": { "user_id": "buyer", "credits": "10" }
        }}
    })
    .to_string();
    let now = Utc::now().timestamp();

    let (status, body) = app.post_webhook(&payload, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No signature");

    let forged = signature_header("wrong-secret", now, payload.as_bytes()).unwrap();
    let (status, body) = app.post_webhook(&payload, Some(forged)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("Webhook signature verification failed"));

    let signed = signature_header(WEBHOOK_SECRET, now, payload.as_bytes()).unwrap();
    let (status, body) = app.post_webhook(&payload, Some(signed.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["received"], true);

    // Redelivery is acknowledged but not credited again.
    let (status, _) = app.post_webhook(&payload, Some(signed)).await;
    assert_eq!(status, StatusCode::OK);

    let (_, credits) = app.get("/credits", Some("buyer")).await;
    // 10 purchased + 3 signup bonus on first authenticated request.
    assert_eq!(credits["balance"], 13);
    let purchases: Vec<&Value> = credits["entries"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|e| e["transaction_type"] == "purchase")
        .collect();
    assert_eq!(purchases.len(), 1);
    assert_eq!(purchases[0]["description"], "Purchased 10 credits");
    assert_eq!(purchases[0]["reference_id"], "cs_test_1");

    let other = json!({"id": "evt_2", "type": "invoice.paid", "data": {"object": {}}}).to_string();
    let signed = signature_header(WEBHOOK_SECRET, now, other.as_bytes()).unwrap();
    let (status, body) = app.post_webhook(&other, Some(signed)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["received"], true);
}

#[tokio::test]
async fn test_webhook_unconfigured() {
    let app = TestApp::start(MODEL_REPLY, false).await;
    let (status, body) = app.post_webhook("{}", Some("t=1,v1=00".to_string())).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "Stripe not configured");
}

#[tokio::test]
async fn test_admin_grant_users_and_stats() {
    let app = TestApp::start(MODEL_REPLY, true).await;

    let (status, entry) = app
        .post("/admin/users/u-42/credits", Some("admin"), json!({"amount": 5}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(entry["transaction_type"], "bonus");
    assert_eq!(entry["description"], "Admin granted credits");
    assert_eq!(entry["balance_after"], 5);

    let (status, _) = app
        .post("/admin/users/u-42/credits", Some("admin"), json!({"amount": 0}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, users) = app.get("/admin/users", Some("admin")).await;
    assert_eq!(status, StatusCode::OK);
    let u42 = users
        .as_array()
        .unwrap()
        .iter()
        .find(|u| u["userId"] == "u-42")
        .unwrap();
    assert_eq!(u42["balance"], 5);
    assert_eq!(u42["isAdmin"], false);

    let (status, stats) = app.get("/admin/stats", Some("admin")).await;
    assert_eq!(status, StatusCode::OK);
    // "admin" (signup bonus on first request) and "u-42".
    assert_eq!(stats["totalUsers"], 2);
    assert_eq!(stats["totalReadings"], 0);
    assert_eq!(stats["creditsUsed"], 0);
}

#[tokio::test]
async fn test_card_catalog() {
    let app = TestApp::start(MODEL_REPLY, true).await;

    let (status, cards) = app.get("/cards", None).await;
    assert_eq!(status, StatusCode::OK);
    let cards = cards.as_array().unwrap();
    assert_eq!(cards.len(), 78);
    assert_eq!(cards[0]["name_en"], "The Fool");
    assert_eq!(cards[0]["arcana"], "major");

    let (status, tower) = app.get("/cards/16", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tower["name_it"], "La Torre");
    assert!(tower["suit"].is_null());

    let (status, body) = app.get("/cards/78", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Card not found");
}

#[tokio::test]
async fn test_saved_reading_uses_catalog_card() {
    let app = TestApp::start(MODEL_REPLY, true).await;

    let mut body = single_card_reading("Quale strada?");
    body["language"] = json!("IT");
    body["cards"][0]["cardName"] = json!("the star");
    let (status, reading) = app.post("/readings", Some("user-1"), body).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(reading["cards"][0]["cardName"], "La Stella");
    assert_eq!(reading["cards"][0]["cardId"], 17);
}

#[tokio::test]
async fn test_unknown_card_is_rejected() {
    let app = TestApp::start(MODEL_REPLY, true).await;

    let mut interpretation = interpretation_body("Q?");
    interpretation["drawnCards"][0]["cardName"] = json!("The Jester");
    let (status, body) = app.post("/interpretation", Some("user-1"), interpretation).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Unknown card: The Jester");

    let mut reading = single_card_reading("Q?");
    reading["cards"][0]["cardName"] = json!("The Jester");
    let (status, _) = app.post("/readings", Some("user-1"), reading).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Nothing was charged.
    let (_, credits) = app.get("/credits", Some("user-1")).await;
    assert_eq!(credits["balance"], 3);
}

#[tokio::test]
async fn test_preferences_default_interpretation_tone() {
    let app = TestApp::start(MODEL_REPLY, true).await;

    let (status, prefs) = app.get("/preferences", Some("user-1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(prefs["language"], "EN");
    assert_eq!(prefs["readingTone"], "soft");
    assert_eq!(prefs["focusAreas"], json!([]));
    assert_eq!(prefs["experienceLevel"], "beginner");

    let (status, _) = app
        .put("/preferences", Some("user-1"), json!({"focusAreas": ["wealth"]}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, prefs) = app
        .put(
            "/preferences",
            Some("user-1"),
            json!({"readingTone": "pragmatic", "focusAreas": ["career", "health"]}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(prefs["readingTone"], "pragmatic");
    assert_eq!(prefs["language"], "EN");

    let mut body = interpretation_body("Should I change jobs?");
    body.as_object_mut().unwrap().remove("tone");
    let (status, interpretation) = app.post("/interpretation", Some("user-1"), body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(interpretation["tone"], "pragmatic");

    // Another user still gets the defaults.
    let (_, other) = app.get("/preferences", Some("user-2")).await;
    assert_eq!(other["readingTone"], "soft");
}

#[tokio::test]
async fn test_malformed_json_body() {
    let app = TestApp::start(MODEL_REPLY, true).await;

    let resp = app
        .client
        .post(format!("{}/interpretation", app.base))
        .bearer_auth(app.token("user-1"))
        .header("content-type", "application/json")
        .body("{\"question\": ")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "bad_request");

    let (status, body) = app
        .post("/admin/users/u-1/credits", Some("admin"), json!({"amount": "ten"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "bad_request");
}

#[tokio::test]
async fn test_openai_embeddings_without_key_start_without_vectors() {
    let tmp = TempDir::new().unwrap();
    let mut config: Config = toml::from_str(&format!(
        r#"
[db]
path = "{}"

[server]
bind = "127.0.0.1:0"

[embedding]
provider = "openai"
api_key_env = "ARCANA_TEST_EMBEDDING_KEY_NEVER_SET"

[llm]
provider = "disabled"

[auth]
jwt_secret = "{}"
"#,
        tmp.path().join("arcana.sqlite").display(),
        JWT_SECRET
    ))
    .unwrap();
    config.resolve_secrets();
    assert!(config.embedding.api_key.is_none());

    let state = server::build_state(&config).await.unwrap();
    assert!(state.embedder.is_none());
    assert_eq!(state.deck.cards().len(), 78);
}
