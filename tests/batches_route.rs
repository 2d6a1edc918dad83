use dispatch_server::dispatch::{
    BatchDispatcher, BatchStore, DispatchConfig, InMemoryBatchStore, ProviderClient,
};
use dispatch_server::routes::batches::{SubmitBatchResponse, get_batch_status, submit_batch};
use dispatch_server::test_support::provider::AcceptingProvider;
use dispatch_server::test_support::{TestRocketBuilder, recipients, test_dispatch_config};
use rocket::http::{ContentType, Status};
use rocket::local::blocking::Client;
use rocket::routes;
use rocket::serde::json::json;
use std::sync::Arc;

fn dispatch_client(config: DispatchConfig) -> Client {
    let provider: Arc<dyn ProviderClient> = Arc::new(AcceptingProvider::new());
    let store: Arc<dyn BatchStore> = Arc::new(InMemoryBatchStore::new());
    let dispatcher = Arc::new(BatchDispatcher::new(Arc::clone(&store), provider, config));

    TestRocketBuilder::new()
        .mount_api_routes(routes![submit_batch, get_batch_status])
        .manage_dispatch(store, dispatcher)
        .blocking_client()
}

#[test]
fn submit_rejects_empty_recipient_list() {
    let client = dispatch_client(test_dispatch_config());

    let payload = json!({
        "recipients": [],
        "subject": "Hello",
        "htmlBody": "<p>Hello</p>"
    });

    let response = client
        .post("/api/v1/batches")
        .header(ContentType::JSON)
        .body(payload.to_string())
        .dispatch();

    assert_eq!(response.status(), Status::BadRequest);
}

#[test]
fn submit_rejects_oversized_recipient_list() {
    let client = dispatch_client(test_dispatch_config());

    let payload = json!({
        "recipients": recipients(1001),
        "subject": "Hello",
        "htmlBody": "<p>Hello</p>"
    });

    let response = client
        .post("/api/v1/batches")
        .header(ContentType::JSON)
        .body(payload.to_string())
        .dispatch();

    assert_eq!(response.status(), Status::BadRequest);
}

#[test]
fn submit_rejects_blank_subject_and_body() {
    let client = dispatch_client(test_dispatch_config());

    for payload in [
        json!({
            "recipients": recipients(2),
            "subject": "",
            "htmlBody": "<p>Hello</p>"
        }),
        json!({
            "recipients": recipients(2),
            "subject": "Hello",
            "htmlBody": "   "
        }),
    ] {
        let response = client
            .post("/api/v1/batches")
            .header(ContentType::JSON)
            .body(payload.to_string())
            .dispatch();

        assert_eq!(response.status(), Status::BadRequest);
    }
}

#[test]
fn submit_rejects_when_no_sender_is_configured() {
    let mut config = test_dispatch_config();
    config.from_email = None;
    let client = dispatch_client(config);

    let payload = json!({
        "recipients": recipients(2),
        "subject": "Hello",
        "htmlBody": "<p>Hello</p>"
    });

    let response = client
        .post("/api/v1/batches")
        .header(ContentType::JSON)
        .body(payload.to_string())
        .dispatch();

    assert_eq!(response.status(), Status::BadRequest);
}

#[test]
fn submit_accepts_valid_batch_and_issues_id() {
    let client = dispatch_client(test_dispatch_config());

    let payload = json!({
        "recipients": recipients(3),
        "subject": "Hello {{name}}",
        "htmlBody": "<p>Hi {{name}}</p>",
        "textBody": "Hi {{name}}"
    });

    let response = client
        .post("/api/v1/batches")
        .header(ContentType::JSON)
        .body(payload.to_string())
        .dispatch();

    assert_eq!(response.status(), Status::Accepted);
    let body: SubmitBatchResponse = response.into_json().expect("submit payload");
    assert!(!body.batch_id.is_empty());

    // The id is immediately queryable even though delivery is still
    // running in the background.
    let status_response = client
        .get(format!("/api/v1/batches/{}", body.batch_id))
        .dispatch();
    assert_eq!(status_response.status(), Status::Ok);
}

#[test]
fn unknown_batch_id_reports_not_found() {
    let client = dispatch_client(test_dispatch_config());

    let response = client.get("/api/v1/batches/no-such-batch").dispatch();
    assert_eq!(response.status(), Status::NotFound);
}
