use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::{json, Value};

use splitfund_api::app::{build_app, services::AppServices};
use splitfund_core::ExpenseId;
use splitfund_infra::config::AppConfig;
use splitfund_observability::LogFormat;

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        Self::spawn_with(AppServices::in_memory()).await
    }

    // Same router as prod, ephemeral port.
    async fn spawn_with(services: AppServices) -> Self {
        let app = build_app(Arc::new(services));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            client: reqwest::Client::new(),
            handle,
        }
    }

    async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        let res = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = res.status();
        (status, res.json().await.unwrap())
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        let res = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .unwrap();
        let status = res.status();
        (status, res.json().await.unwrap_or(Value::Null))
    }

    async fn create_group(&self, group_id: &str, members: Value) {
        let (status, body) = self
            .post("/group/create", json!({"group_id": group_id, "members": members}))
            .await;
        assert_eq!(status, StatusCode::OK, "create failed: {body}");
    }

    async fn deposit(&self, group_id: &str, name: &str, amount: Value) -> Value {
        let (status, body) = self
            .post(
                "/wallet/add",
                json!({"group_id": group_id, "name": name, "amount": amount}),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "deposit failed: {body}");
        body
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn deduction_of<'a>(expense: &'a Value, member: &str) -> &'a Value {
    expense["deductions"]
        .as_array()
        .unwrap()
        .iter()
        .find(|d| d["member"] == member)
        .map(|d| &d["amount"])
        .unwrap_or_else(|| panic!("no deduction for {member} in {expense}"))
}

#[tokio::test]
async fn health_and_banner_respond() {
    let server = TestServer::spawn().await;

    let (status, _) = server.get("/health").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = server.get("/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["endpoints"]["split_expense"], "POST /expense/split");
}

#[tokio::test]
async fn create_group_assigns_wallets_and_rejects_duplicates() {
    let server = TestServer::spawn().await;

    let (status, body) = server
        .post(
            "/group/create",
            json!({
                "group_id": 42,
                "members": ["Ann", {"name": "Bo", "type": "couple"}, {"name": "Cid", "type": "family", "head_count": 4}]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Group created successfully!");
    let members = body["group"]["members"].as_array().unwrap();
    assert_eq!(members.len(), 3);
    assert_eq!(members[2]["type"], "family");
    assert_eq!(members[2]["head_count"], 4);
    assert_eq!(members[0]["balance"], "0.00");
    assert_ne!(members[0]["wallet_id"], members[1]["wallet_id"]);

    let (status, body) = server
        .post("/group/create", json!({"group_id": "42", "members": ["Zed"]}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "duplicate_group");

    let (status, body) = server
        .post("/group/create", json!({"group_id": "empty", "members": []}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_input");
}

#[tokio::test]
async fn deposits_by_name_and_by_wallet_id() {
    let server = TestServer::spawn().await;
    server.create_group("trip", json!(["Ann", "Bo"])).await;

    let body = server.deposit("trip", "ann", json!("12.50")).await;
    assert_eq!(body["message"], "Balance added successfully!");
    assert_eq!(body["name"], "Ann");
    assert_eq!(body["balance"], "12.50");

    let wallet_id = body["wallet_id"].as_str().unwrap().to_string();
    let (status, body) = server
        .post("/wallet/add", json!({"wallet_id": wallet_id, "amount": 2.5}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["balance"], "15.00");
    assert_eq!(body["group_id"], "trip");

    let (status, body) = server
        .post(
            "/wallet/add",
            json!({"wallet_id": "0190c5a4-0000-7000-8000-000000000000", "amount": 1}),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "wallet_not_found");

    let (status, body) = server
        .post("/wallet/add", json!({"group_id": "trip", "name": "Ann", "amount": "-1.00"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_input");
}

#[tokio::test]
async fn unknown_member_lists_existing_members() {
    let server = TestServer::spawn().await;
    server.create_group("trip", json!(["Ann", "Bo"])).await;

    let (status, body) = server
        .post("/wallet/add", json!({"group_id": "trip", "name": "Zed", "amount": 5}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "member_not_found");
    assert_eq!(body["hint"], "No wallet found for user 'Zed' in group trip");
    assert_eq!(body["existing_members_in_group"], json!(["Ann", "Bo"]));
}

#[tokio::test]
async fn equal_split_distributes_leftover_cents() {
    let server = TestServer::spawn().await;
    server.create_group("flat", json!(["Cid", "Ann", "Bo"])).await;
    server.deposit("flat", "Ann", json!(30)).await;

    let (status, body) = server
        .post(
            "/expense/split",
            json!({
                "group_id": "flat",
                "payer": "Ann",
                "participants": "Ann, Bo, Cid",
                "amount": "10.00",
                "split_type": "equal",
                "category": "Groceries"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["message"], "Expense split successfully!");
    let expense = &body["expense"];
    assert_eq!(expense["split_type"], "equal");
    assert_eq!(deduction_of(expense, "Ann"), "3.34");
    assert_eq!(deduction_of(expense, "Bo"), "3.33");
    assert_eq!(deduction_of(expense, "Cid"), "3.33");

    let (status, sheet) = server.get("/group/summary/flat").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(sheet["summary"]["Ann"], "26.66");
    assert_eq!(sheet["summary"]["Bo"], "-3.33");
    assert_eq!(sheet["summary"]["Cid"], "-3.33");
}

#[tokio::test]
async fn ratio_split_accepts_named_weights() {
    let server = TestServer::spawn().await;
    server.create_group("trip", json!(["Ann", "Bo", "Cid"])).await;

    let (status, body) = server
        .post(
            "/expense/split",
            json!({
                "group_id": "trip",
                "payer": "Bo",
                "participants": ["Ann", "Bo", "Cid"],
                "amount": 100,
                "split_type": "ratio",
                "ratio": {"Ann": 1, "Bo": 1, "Cid": 2}
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let expense = &body["expense"];
    assert_eq!(deduction_of(expense, "Ann"), "25.00");
    assert_eq!(deduction_of(expense, "Bo"), "25.00");
    assert_eq!(deduction_of(expense, "Cid"), "50.00");
}

#[tokio::test]
async fn bad_split_requests_are_rejected_without_side_effects() {
    let server = TestServer::spawn().await;
    server.create_group("trip", json!(["Ann", "Bo"])).await;

    let (status, body) = server
        .post(
            "/expense/split",
            json!({
                "group_id": "trip", "payer": "Ann", "participants": ["Ann", "Bo"],
                "amount": 10, "split_type": "shares"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "unsupported_split_type");

    let (status, body) = server
        .post(
            "/expense/split",
            json!({
                "group_id": "trip", "payer": "Ann", "participants": ["Ann", "Zed"],
                "amount": 10, "split_type": "equal"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "member_not_found");

    let (_, state) = server.get("/group/trip").await;
    assert_eq!(state["ledger"], json!([]));
}

#[tokio::test]
async fn malformed_json_is_invalid_input() {
    let server = TestServer::spawn().await;

    let res = server
        .client
        .post(format!("{}/group/create", server.base_url))
        .header("content-type", "application/json")
        .body("{\"group_id\": ")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_input");
}

#[tokio::test]
async fn detailed_summary_tracks_deposits_and_spending() {
    let server = TestServer::spawn().await;
    server.create_group("trip", json!(["Ann", "Bo"])).await;
    server.deposit("trip", "Ann", json!(50)).await;
    server
        .post(
            "/expense/split",
            json!({
                "group_id": "trip", "payer": "Ann", "participants": ["Ann", "Bo"],
                "amount": "20.00", "split_type": "equal", "category": "Taxi"
            }),
        )
        .await;
    server.deposit("trip", "Bo", json!(5)).await;

    let (status, detail) = server.get("/group/summary/detailed/trip").await;
    assert_eq!(status, StatusCode::OK);

    let ann = &detail["Ann"];
    assert_eq!(ann["initial_balance_estimate"], "50.00");
    assert_eq!(ann["total_deposited"], "50.00");
    assert_eq!(ann["total_spent"], "10.00");
    assert_eq!(ann["present_balance"], "40.00");
    assert_eq!(ann["paid_for"][0]["category"], "Taxi");

    let bo = &detail["Bo"];
    assert_eq!(bo["initial_balance_estimate"], "0.00");
    assert_eq!(bo["total_deposited"], "5.00");
    assert_eq!(bo["present_balance"], "-5.00");
    assert_eq!(bo["spent_where"][0]["deduction"], "10.00");
    assert_eq!(bo["spent_where"][0]["payer"], "Ann");
}

#[tokio::test]
async fn missing_group_is_not_found() {
    let server = TestServer::spawn().await;

    for path in ["/group/summary/nope", "/group/summary/detailed/nope", "/group/nope"] {
        let (status, body) = server.get(path).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{path}");
        assert_eq!(body["error"], "group_not_found");
    }
}

#[tokio::test]
async fn journal_backed_ledger_survives_a_restart() {
    let dir = std::env::temp_dir().join(format!("splitfund-api-{}", ExpenseId::new()));
    let config = AppConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        journal_path: Some(dir.join("journal.jsonl")),
        log_format: LogFormat::default(),
    };

    let wallet_id = {
        let server = TestServer::spawn_with(AppServices::from_config(&config).unwrap()).await;
        server.create_group("trip", json!(["Ann", "Bo"])).await;
        let body = server.deposit("trip", "Bo", json!("20.00")).await;
        let (status, _) = server
            .post(
                "/expense/split",
                json!({
                    "group_id": "trip", "payer": "Bo", "participants": ["Ann", "Bo"],
                    "amount": "10.01", "split_type": "equal"
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        body["wallet_id"].as_str().unwrap().to_string()
    };

    let server = TestServer::spawn_with(AppServices::from_config(&config).unwrap()).await;
    let (status, sheet) = server.get("/group/summary/trip").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(sheet["summary"]["Ann"], "-5.01");
    assert_eq!(sheet["summary"]["Bo"], "15.00");

    // The wallet directory is rebuilt from the journal.
    let (status, body) = server
        .post("/wallet/add", json!({"wallet_id": wallet_id, "amount": 1}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["balance"], "16.00");

    drop(server);
    std::fs::remove_dir_all(dir).ok();
}
