use std::io::Cursor;

use chrono::{Days, NaiveDate, Utc};
use reqwest::StatusCode;
use serde_json::{json, Value};

use invoicely_api::config::AppConfig;

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        Self::spawn_with(AppConfig::default()).await
    }

    async fn spawn_with(config: AppConfig) -> Self {
        // Same router as prod, bound to an ephemeral port.
        let app = invoicely_api::app::build_app(&config).expect("failed to build app");
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

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, path: &str) -> reqwest::Response {
        self.client.get(self.url(path)).send().await.unwrap()
    }

    async fn post(&self, path: &str, body: Value) -> reqwest::Response {
        self.client.post(self.url(path)).json(&body).send().await.unwrap()
    }

    async fn put(&self, path: &str, body: Value) -> reqwest::Response {
        self.client.put(self.url(path)).json(&body).send().await.unwrap()
    }

    async fn delete(&self, path: &str) -> reqwest::Response {
        self.client.delete(self.url(path)).send().await.unwrap()
    }

    async fn create(&self, body: Value) -> Value {
        let res = self.post("/invoices", body).await;
        assert_eq!(res.status(), StatusCode::CREATED);
        res.json().await.unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn days_ago(n: u64) -> String {
    today().checked_sub_days(Days::new(n)).unwrap().to_string()
}

fn days_ahead(n: u64) -> String {
    today().checked_add_days(Days::new(n)).unwrap().to_string()
}

fn invoice_body(client: &str) -> Value {
    json!({
        "client": {
            "name": client,
            "address": "12 Harbour Road, Springfield",
            "email": "billing@example.com"
        },
        "line_items": [
            { "description": "Website redesign", "quantity": "2", "unit_price": "150.00" },
            { "description": "Hosting", "quantity": "1", "unit_price": "49.99" }
        ],
        "tax_rate": "10",
        "notes": "Payment within 30 days"
    })
}

fn amount(v: &Value) -> f64 {
    v.as_str().expect("amounts serialize as strings").parse().unwrap()
}

fn header<'a>(res: &'a reqwest::Response, name: &str) -> &'a str {
    res.headers()
        .get(name)
        .unwrap_or_else(|| panic!("missing header {name}"))
        .to_str()
        .unwrap()
}

async fn expect_error(res: reqwest::Response, status: StatusCode, field: Option<&str>) -> Value {
    assert_eq!(res.status(), status);
    let body: Value = res.json().await.unwrap();
    assert!(body["error"].is_string(), "error code missing: {body}");
    assert!(body["message"].is_string(), "message missing: {body}");
    if let Some(field) = field {
        assert_eq!(body["field"], field, "unexpected field in {body}");
    }
    body
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn().await;
    let res = srv.get("/health").await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn create_computes_totals_and_defaults() {
    let srv = TestServer::spawn().await;
    let created = srv.create(invoice_body("Acme Corp")).await;

    assert_eq!(created["invoice_number"], "INV-0001");
    assert_eq!(created["status"], "draft");
    assert_eq!(created["date"], today().to_string());
    assert_eq!(created["due_date"], days_ahead(30));
    assert_eq!(created["due"]["state"], "not_issued");
    assert_eq!(created["version"], 1);
    assert_eq!(amount(&created["line_items"][0]["line_total"]), 300.0);
    assert_eq!(amount(&created["subtotal"]), 349.99);
    assert_eq!(amount(&created["tax_amount"]), 35.0);
    assert_eq!(amount(&created["total"]), 384.99);

    let id = created["id"].as_str().unwrap();
    let res = srv.get(&format!("/invoices/{id}")).await;
    assert_eq!(res.status(), StatusCode::OK);
    let fetched: Value = res.json().await.unwrap();
    assert_eq!(fetched["invoice_number"], "INV-0001");
    assert_eq!(fetched["client"]["name"], "Acme Corp");

    let second = srv.create(invoice_body("Globex")).await;
    assert_eq!(second["invoice_number"], "INV-0002");
}

#[tokio::test]
async fn validation_errors_name_the_field() {
    let srv = TestServer::spawn().await;

    let mut bad_email = invoice_body("Acme");
    bad_email["client"]["email"] = json!("not-an-email");
    expect_error(srv.post("/invoices", bad_email).await, StatusCode::BAD_REQUEST, Some("client.email")).await;

    let mut no_items = invoice_body("Acme");
    no_items["line_items"] = json!([]);
    expect_error(srv.post("/invoices", no_items).await, StatusCode::BAD_REQUEST, Some("line_items")).await;

    let mut negative = invoice_body("Acme");
    negative["line_items"][1]["quantity"] = json!("-1");
    expect_error(
        srv.post("/invoices", negative).await,
        StatusCode::BAD_REQUEST,
        Some("line_items[1].quantity"),
    )
    .await;

    let mut backwards = invoice_body("Acme");
    backwards["date"] = json!(days_ago(1));
    backwards["due_date"] = json!(days_ago(5));
    expect_error(srv.post("/invoices", backwards).await, StatusCode::BAD_REQUEST, Some("due_date")).await;

    let mut overdue_start = invoice_body("Acme");
    overdue_start["status"] = json!("overdue");
    expect_error(srv.post("/invoices", overdue_start).await, StatusCode::BAD_REQUEST, Some("status")).await;

    let res = srv
        .client
        .post(srv.url("/invoices"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    let body = expect_error(res, StatusCode::BAD_REQUEST, None).await;
    assert_eq!(body["error"], "invalid_body");

    // Nothing above was stored and no number was consumed.
    let created = srv.create(invoice_body("Acme")).await;
    assert_eq!(created["invoice_number"], "INV-0001");
}

#[tokio::test]
async fn duplicate_numbers_are_rejected() {
    let srv = TestServer::spawn().await;
    let mut custom = invoice_body("Acme");
    custom["invoice_number"] = json!("INV-0001");
    srv.create(custom.clone()).await;

    custom["invoice_number"] = json!("inv-0001");
    let body = expect_error(srv.post("/invoices", custom).await, StatusCode::CONFLICT, None).await;
    assert_eq!(body["error"], "conflict");

    // The generator skips the number that is already taken.
    let generated = srv.create(invoice_body("Globex")).await;
    assert_eq!(generated["invoice_number"], "INV-0002");
}

#[tokio::test]
async fn list_filters_sorts_and_paginates() {
    let srv = TestServer::spawn().await;
    for (client, date) in [
        ("Acme Corp", days_ago(3)),
        ("Globex", days_ago(2)),
        ("Acme Labs", days_ago(1)),
        ("Initech", days_ago(4)),
    ] {
        let mut body = invoice_body(client);
        body["date"] = json!(date);
        srv.create(body).await;
    }

    let res = srv.get("/invoices").await;
    assert_eq!(res.status(), StatusCode::OK);
    let page: Value = res.json().await.unwrap();
    assert_eq!(page["total"], 4);
    assert_eq!(page["page"], 1);
    let clients: Vec<&str> = page["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["client"]["name"].as_str().unwrap())
        .collect();
    assert_eq!(clients, vec!["Acme Labs", "Globex", "Acme Corp", "Initech"]);

    let acme: Value = srv.get("/invoices?client=acme&sort=date&order=asc").await.json().await.unwrap();
    assert_eq!(acme["total"], 2);
    assert_eq!(acme["items"][0]["client"]["name"], "Acme Corp");

    let second: Value = srv.get("/invoices?per_page=3&page=2").await.json().await.unwrap();
    assert_eq!(second["total_pages"], 2);
    assert_eq!(second["items"].as_array().unwrap().len(), 1);

    let searched: Value = srv.get("/invoices?search=INV-0002").await.json().await.unwrap();
    assert_eq!(searched["total"], 1);
    assert_eq!(searched["items"][0]["client"]["name"], "Globex");

    expect_error(srv.get("/invoices?page=0").await, StatusCode::BAD_REQUEST, Some("page")).await;
    expect_error(srv.get("/invoices?status=void").await, StatusCode::BAD_REQUEST, Some("status")).await;
    expect_error(srv.get("/invoices?sort=amount").await, StatusCode::BAD_REQUEST, Some("sort")).await;
}

#[tokio::test]
async fn status_lifecycle_is_enforced() {
    let srv = TestServer::spawn().await;
    let created = srv.create(invoice_body("Acme")).await;
    let id = created["id"].as_str().unwrap();
    let status_url = format!("/invoices/{id}/status");

    let res = srv.post(&status_url, json!({"status": "sent"})).await;
    assert_eq!(res.status(), StatusCode::OK);
    let sent: Value = res.json().await.unwrap();
    assert_eq!(sent["status"], "sent");
    assert_eq!(sent["due"]["state"], "upcoming");

    expect_error(srv.post(&status_url, json!({"status": "sent"})).await, StatusCode::CONFLICT, None).await;
    expect_error(
        srv.post(&status_url, json!({"status": "draft"})).await,
        StatusCode::UNPROCESSABLE_ENTITY,
        None,
    )
    .await;
    expect_error(srv.post(&status_url, json!({"status": "void"})).await, StatusCode::BAD_REQUEST, Some("status")).await;

    let res = srv.post(&status_url, json!({"status": "paid"})).await;
    assert_eq!(res.status(), StatusCode::OK);

    // Paid invoices are frozen.
    expect_error(
        srv.put(&format!("/invoices/{id}"), invoice_body("Acme")).await,
        StatusCode::UNPROCESSABLE_ENTITY,
        None,
    )
    .await;
}

#[tokio::test]
async fn update_replaces_content_with_optimistic_concurrency() {
    let srv = TestServer::spawn().await;
    let created = srv.create(invoice_body("Acme")).await;
    let id = created["id"].as_str().unwrap();
    let url = format!("/invoices/{id}");

    let mut edit = invoice_body("Acme Corporation");
    edit["line_items"] = json!([{ "description": "Audit", "quantity": "3", "unit_price": "100" }]);
    edit["tax_rate"] = json!("0");
    edit["expected_version"] = json!(1);
    let res = srv.put(&url, edit.clone()).await;
    assert_eq!(res.status(), StatusCode::OK);
    let updated: Value = res.json().await.unwrap();
    assert_eq!(updated["invoice_number"], "INV-0001");
    assert_eq!(updated["client"]["name"], "Acme Corporation");
    assert_eq!(amount(&updated["total"]), 300.0);
    assert_eq!(updated["version"], 2);

    expect_error(srv.put(&url, edit).await, StatusCode::CONFLICT, None).await;

    let missing = format!("/invoices/{}", "0190a4a6-0000-7000-8000-000000000000");
    expect_error(srv.put(&missing, invoice_body("Acme")).await, StatusCode::NOT_FOUND, None).await;
    expect_error(srv.get("/invoices/not-a-uuid").await, StatusCode::BAD_REQUEST, None).await;
}

#[tokio::test]
async fn delete_removes_invoice_but_keeps_history() {
    let srv = TestServer::spawn().await;
    let created = srv.create(invoice_body("Acme")).await;
    let id = created["id"].as_str().unwrap();
    let url = format!("/invoices/{id}");

    let res = srv.delete(&url).await;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    expect_error(srv.get(&url).await, StatusCode::NOT_FOUND, None).await;
    expect_error(srv.delete(&url).await, StatusCode::NOT_FOUND, None).await;

    let history: Value = srv.get(&format!("{url}/history")).await.json().await.unwrap();
    let types: Vec<&str> = history
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["event_type"].as_str().unwrap())
        .collect();
    assert_eq!(types, vec!["invoicing.invoice.created", "invoicing.invoice.deleted"]);

    let page: Value = srv.get("/invoices").await.json().await.unwrap();
    assert_eq!(page["total"], 0);
}

#[tokio::test]
async fn exports_csv_and_json_listings() {
    let srv = TestServer::spawn().await;
    srv.create(invoice_body("Acme")).await;
    let mut sent = invoice_body("=HYPERLINK(\"x\")");
    sent["status"] = json!("sent");
    srv.create(sent).await;

    let res = srv.get("/invoices/export?format=csv").await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(header(&res, "content-type").starts_with("text/csv"));
    assert_eq!(
        header(&res, "content-disposition"),
        format!("attachment; filename=\"invoices-{}.csv\"", today())
    );
    let csv = res.text().await.unwrap();
    let mut lines = csv.lines();
    assert!(lines.next().unwrap().starts_with("Invoice Number,Date,Due Date,Status"));
    assert_eq!(lines.count(), 2);
    assert!(!csv.contains(",=HYPERLINK"));

    let res = srv.get("/invoices/export?format=json&status=sent").await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(header(&res, "content-type"), "application/json");
    let listed: Value = res.json().await.unwrap();
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["invoice_number"], "INV-0002");

    expect_error(srv.get("/invoices/export?format=xlsx").await, StatusCode::BAD_REQUEST, Some("format")).await;
}

#[tokio::test]
async fn renders_single_invoice_pdf() {
    let srv = TestServer::spawn().await;
    let created = srv.create(invoice_body("Acme")).await;
    let id = created["id"].as_str().unwrap();

    let res = srv.get(&format!("/invoices/{id}/pdf")).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(header(&res, "content-type"), "application/pdf");
    assert_eq!(
        header(&res, "content-disposition"),
        "attachment; filename=\"invoice-INV-0001.pdf\""
    );
    let bytes = res.bytes().await.unwrap();
    assert!(bytes.starts_with(b"%PDF-1.4"));
    assert!(bytes.ends_with(b"%%EOF\n"));
}

#[tokio::test]
async fn bulk_pdf_zip_skips_missing_invoices() {
    let srv = TestServer::spawn().await;
    let a = srv.create(invoice_body("Acme")).await;
    let b = srv.create(invoice_body("Globex")).await;

    let res = srv
        .post(
            "/invoices/pdf/bulk",
            json!({ "ids": [a["id"], b["id"], "0190a4a6-0000-7000-8000-000000000000", "garbage"] }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(header(&res, "content-type"), "application/zip");
    assert_eq!(header(&res, "x-bulk-archived"), "2");
    assert_eq!(header(&res, "x-bulk-failed"), "2");

    let bytes = res.bytes().await.unwrap();
    let archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
    let mut names: Vec<&str> = archive.file_names().collect();
    names.sort();
    assert_eq!(names, vec!["INV-0001.pdf", "INV-0002.pdf"]);

    expect_error(srv.post("/invoices/pdf/bulk", json!({ "ids": [] })).await, StatusCode::BAD_REQUEST, Some("ids")).await;
    expect_error(
        srv.post("/invoices/pdf/bulk", json!({ "ids": ["garbage"] })).await,
        StatusCode::NOT_FOUND,
        None,
    )
    .await;
}

#[tokio::test]
async fn numbering_can_be_reconfigured() {
    let srv = TestServer::spawn().await;

    let cfg: Value = srv.get("/numbering/config").await.json().await.unwrap();
    assert_eq!(cfg["prefix"], "INV");
    assert_eq!(cfg["next_number"], 1);

    let res = srv
        .put(
            "/numbering/config",
            json!({ "prefix": "AC", "separator": "/", "include_year": true, "padding": 3, "next_number": 7 }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);

    let year = today().format("%Y").to_string();
    let preview: Value = srv.get("/numbering/preview").await.json().await.unwrap();
    assert_eq!(preview["next"], format!("AC/{year}/007"));

    let created = srv.create(invoice_body("Acme")).await;
    assert_eq!(created["invoice_number"], format!("AC/{year}/007"));
    let preview: Value = srv.get("/numbering/preview").await.json().await.unwrap();
    assert_eq!(preview["next"], format!("AC/{year}/008"));

    expect_error(
        srv.put("/numbering/config", json!({ "padding": 0 })).await,
        StatusCode::BAD_REQUEST,
        Some("padding"),
    )
    .await;
}

#[tokio::test]
async fn due_report_and_overdue_sweep() {
    let srv = TestServer::spawn().await;

    let mut late = invoice_body("Late Payer");
    late["status"] = json!("sent");
    late["date"] = json!(days_ago(40));
    late["due_date"] = json!(days_ago(10));
    let late = srv.create(late).await;
    assert_eq!(late["due"]["state"], "overdue");
    assert_eq!(late["due"]["days_overdue"], 10);

    let mut soon = invoice_body("Prompt Payer");
    soon["status"] = json!("sent");
    soon["due_date"] = json!(days_ahead(2));
    srv.create(soon).await;

    let mut paid = invoice_body("Paid Up");
    paid["status"] = json!("paid");
    paid["date"] = json!(days_ago(40));
    paid["due_date"] = json!(days_ago(10));
    srv.create(paid).await;

    let report: Value = srv.get("/invoices/due").await.json().await.unwrap();
    assert_eq!(report["overdue"].as_array().unwrap().len(), 1);
    assert_eq!(report["overdue"][0]["client"]["name"], "Late Payer");
    assert_eq!(report["due_soon"].as_array().unwrap().len(), 1);
    assert_eq!(report["due_soon"][0]["due"]["days_left"], 2);

    let swept: Value = srv.post("/invoices/overdue/sweep", json!({})).await.json().await.unwrap();
    assert_eq!(swept["flagged"], 1);
    assert_eq!(swept["ids"][0], late["id"]);

    let id = late["id"].as_str().unwrap();
    let after: Value = srv.get(&format!("/invoices/{id}")).await.json().await.unwrap();
    assert_eq!(after["status"], "overdue");

    let overdue_only: Value = srv.get("/invoices?overdue=true").await.json().await.unwrap();
    assert_eq!(overdue_only["total"], 1);
}

#[tokio::test]
async fn due_date_settings_drive_defaults() {
    let srv = TestServer::spawn().await;

    let res = srv
        .put("/due-dates/config", json!({ "payment_terms_days": 14, "due_soon_days": 3 }))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let cfg: Value = srv.get("/due-dates/config").await.json().await.unwrap();
    assert_eq!(cfg["payment_terms_days"], 14);

    let created = srv.create(invoice_body("Acme")).await;
    assert_eq!(created["due_date"], days_ahead(14));

    expect_error(
        srv.put("/due-dates/config", json!({ "payment_terms_days": 9999 })).await,
        StatusCode::BAD_REQUEST,
        Some("payment_terms_days"),
    )
    .await;
}

#[tokio::test]
async fn invoice_counter_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = AppConfig {
        numbering_state_path: Some(dir.path().join("state").join("numbering.json")),
        ..AppConfig::default()
    };

    {
        let srv = TestServer::spawn_with(config.clone()).await;
        srv.create(invoice_body("Acme")).await;
        srv.create(invoice_body("Globex")).await;
    }

    let srv = TestServer::spawn_with(config).await;
    let preview: Value = srv.get("/numbering/preview").await.json().await.unwrap();
    assert_eq!(preview["next"], "INV-0003");
    let cfg: Value = srv.get("/numbering/config").await.json().await.unwrap();
    assert_eq!(cfg["next_number"], 3);
}
