//! JSON-RPC over HTTP against a live server with a real `sh` worker

mod common;

use common::Engine;
use jsonrpsee::core::client::{ClientT, Error as ClientError};
use jsonrpsee::core::params::ObjectParams;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::rpc_params;
use jsonrpsee::server::ServerHandle;
use restyle_api_rpc::error::code;
use restyle_api_rpc::{RpcServer, RpcServerConfig};
use serde_json::Value;
use std::time::Duration;

async fn serve(engine: &Engine) -> (HttpClient, ServerHandle) {
    let config = RpcServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
    };
    let (addr, handle) = RpcServer::new(config, engine.orchestrator.clone(), engine.repo.clone())
        .start()
        .await
        .unwrap();
    let client = HttpClientBuilder::default()
        .build(format!("http://{}", addr))
        .unwrap();
    (client, handle)
}

fn job_id_params(id: &str) -> ObjectParams {
    let mut params = ObjectParams::new();
    params.insert("job_id", id).unwrap();
    params
}

async fn poll_until_terminal(client: &HttpClient, id: &str) -> Value {
    for _ in 0..500 {
        let job: Value = client
            .request("job.get.v1", job_id_params(id))
            .await
            .unwrap();
        if job["status"] == "COMPLETED" || job["status"] == "FAILED" {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("job {} never reached a terminal state", id);
}

fn error_code(result: Result<Value, ClientError>) -> i32 {
    match result {
        Err(ClientError::Call(err)) => err.code(),
        other => panic!("expected call error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_create_poll_and_list() {
    let engine = Engine::with_worker(
        r#"
echo "PROGRESS:50"
echo 'METRICS:{"processing_time":"0:03","style_match":88.5,"colors_analyzed":900,"output_size":"4MB"}'
"#,
    )
    .await;
    let (client, handle) = serve(&engine).await;

    let mut params = ObjectParams::new();
    params.insert("input_path", "clips/park.mp4").unwrap();
    params.insert("style_template", "minimal").unwrap();
    params
        .insert("options", serde_json::json!({"soundEffects": true}))
        .unwrap();
    let created: Value = client.request("job.create.v1", params).await.unwrap();
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["input_path"], "clips/park.mp4");
    assert_eq!(created["options"]["soundEffects"], true);

    let done = poll_until_terminal(&client, &id).await;
    assert_eq!(done["status"], "COMPLETED");
    assert_eq!(done["progress"], 100);
    assert_eq!(done["metrics"]["style_match"], 88.5);
    assert_eq!(
        done["output_path"],
        engine.orchestrator.output_path_for(&id).as_str()
    );

    let listed: Value = client.request("job.list.v1", rpc_params![]).await.unwrap();
    assert_eq!(listed["jobs"].as_array().unwrap().len(), 1);

    let mut filter = ObjectParams::new();
    filter.insert("status", "FAILED").unwrap();
    let failed: Value = client.request("job.list.v1", filter).await.unwrap();
    assert!(failed["jobs"].as_array().unwrap().is_empty());

    let stats: Value = client.request("admin.stats.v1", rpc_params![]).await.unwrap();
    assert_eq!(stats["total_jobs"], 1);
    assert_eq!(stats["completed_jobs"], 1);

    handle.stop().unwrap();
}

#[tokio::test]
async fn test_deferred_start_and_cancel() {
    let engine = Engine::with_worker("exec sleep 30\n").await;
    let (client, handle) = serve(&engine).await;

    let mut params = ObjectParams::new();
    params.insert("input_path", "clips/harbor.mp4").unwrap();
    params.insert("reference_path", "refs/noir.mp4").unwrap();
    params.insert("start", false).unwrap();
    let created: Value = client.request("job.create.v1", params).await.unwrap();
    assert_eq!(created["status"], "PENDING");
    let id = created["id"].as_str().unwrap().to_string();

    let started: Value = client
        .request("job.start.v1", job_id_params(&id))
        .await
        .unwrap();
    assert_eq!(started["started"], true);

    let cancelled: Value = client
        .request("job.cancel.v1", job_id_params(&id))
        .await
        .unwrap();
    assert_eq!(cancelled["cancelled"], true);

    let done = poll_until_terminal(&client, &id).await;
    assert_eq!(done["status"], "FAILED");
    assert_eq!(done["error_message"], "Job cancelled by user");

    handle.stop().unwrap();
}

#[tokio::test]
async fn test_error_codes() {
    let engine = Engine::with_worker("").await;
    let (client, handle) = serve(&engine).await;

    // Neither reference nor template
    let mut params = ObjectParams::new();
    params.insert("input_path", "clips/park.mp4").unwrap();
    assert_eq!(
        error_code(client.request("job.create.v1", params).await),
        code::VALIDATION_ERROR
    );

    let mut params = ObjectParams::new();
    params.insert("input_path", "clips/park.mp4").unwrap();
    params.insert("style_template", "watercolor").unwrap();
    assert_eq!(
        error_code(client.request("job.create.v1", params).await),
        code::VALIDATION_ERROR
    );

    assert_eq!(
        error_code(client.request("job.get.v1", job_id_params("missing")).await),
        code::NOT_FOUND
    );

    let templates: Value = client
        .request("templates.list.v1", rpc_params![])
        .await
        .unwrap();
    assert_eq!(templates["templates"].as_array().unwrap().len(), 4);

    handle.stop().unwrap();
}
