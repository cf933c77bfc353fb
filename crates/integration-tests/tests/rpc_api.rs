//! JSON-RPC surface over HTTP, backed by SQLite and scripted scanners

mod common;

use common::{memory_store, orchestrator};
use jsonrpsee::core::client::{ClientT, Error as ClientError};
use jsonrpsee::core::params::ObjectParams;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::server::ServerHandle;
use scanhive_api_rpc::error::code;
use scanhive_api_rpc::{RpcServer, RpcServerConfig};
use scanhive_core::domain::ScanReportBuilder;
use scanhive_core::port::scan_launcher::mocks::{Script, ScriptedLauncher};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

async fn serve(launcher: ScriptedLauncher) -> (HttpClient, ServerHandle) {
    let orchestrator = Arc::new(orchestrator(memory_store().await, Arc::new(launcher)));
    let server = RpcServer::new(
        RpcServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        orchestrator,
    );
    let (addr, handle) = server.start().await.unwrap();
    let client = HttpClientBuilder::default()
        .build(format!("http://{}", addr))
        .unwrap();
    (client, handle)
}

fn params(pairs: &[(&str, Value)]) -> ObjectParams {
    let mut params = ObjectParams::new();
    for (key, value) in pairs {
        params.insert(key, value.clone()).unwrap();
    }
    params
}

async fn get(client: &HttpClient, job_id: &str) -> Value {
    client
        .request("scan.get.v1", params(&[("job_id", job_id.into())]))
        .await
        .unwrap()
}

async fn wait_for(client: &HttpClient, job_id: &str, status: &str) -> Value {
    for _ in 0..500 {
        let job = get(client, job_id).await;
        if job["status"] == status {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {} never reached {}", job_id, status);
}

fn error_code(err: ClientError) -> i32 {
    match err {
        ClientError::Call(obj) => obj.code(),
        other => panic!("expected a call error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_create_get_list() {
    let mut builder = ScanReportBuilder::default();
    builder.add_open_port("127.0.0.1", "22");
    let (client, _handle) = serve(ScriptedLauncher::completing_with(builder.build())).await;

    let created: Value = client
        .request(
            "scan.create.v1",
            params(&[("target", "127.0.0.1".into()), ("scanType", "quick".into())]),
        )
        .await
        .unwrap();
    assert_eq!(created["status"], "submitted");
    let job_id = created["jobId"].as_str().unwrap().to_string();

    let job = wait_for(&client, &job_id, "completed").await;
    assert_eq!(job["tool"], "nmap");
    assert_eq!(job["scanType"], "quick");
    assert_eq!(job["progress"], 100);
    assert_eq!(job["result"]["hosts"][0]["host"], "127.0.0.1");
    assert_eq!(job["result"]["hosts"][0]["ports"][0]["portid"], "22");
    assert!(job["createdAt"].as_str().unwrap().ends_with('Z'));

    let listed: Vec<Value> = client
        .request("scan.list.v1", ObjectParams::new())
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["jobId"], job_id.as_str());
}

#[tokio::test]
async fn test_error_codes() {
    let (client, _handle) = serve(ScriptedLauncher::new(Script::RunUntilTerminated {
        progress: vec![],
    }))
    .await;

    let err = client
        .request::<Value, _>("scan.create.v1", params(&[("tool", "zmap".into())]))
        .await
        .unwrap_err();
    assert_eq!(error_code(err), code::VALIDATION_ERROR);

    let err = client
        .request::<Value, _>(
            "scan.create.v1",
            params(&[("target", "10.0.0.1".into()), ("tool", "nessus".into())]),
        )
        .await
        .unwrap_err();
    assert_eq!(error_code(err), code::UNKNOWN_TOOL);

    for method in ["scan.get.v1", "scan.stop.v1", "scan.delete.v1"] {
        let err = client
            .request::<Value, _>(method, params(&[("job_id", "missing".into())]))
            .await
            .unwrap_err();
        assert_eq!(error_code(err), code::NOT_FOUND, "{}", method);
    }
}

#[tokio::test]
async fn test_stop_and_delete() {
    let (client, _handle) = serve(ScriptedLauncher::new(Script::RunUntilTerminated {
        progress: vec![12],
    }))
    .await;

    let created: Value = client
        .request(
            "scan.create.v1",
            params(&[
                ("target", "10.0.0.0/24".into()),
                ("tool", "masscan".into()),
                ("scan_type", "tcp_scan".into()),
                ("port", 8080.into()),
            ]),
        )
        .await
        .unwrap();
    let job_id = created["jobId"].as_str().unwrap().to_string();
    wait_for(&client, &job_id, "running").await;

    let stopped: Value = client
        .request("scan.stop.v1", params(&[("jobId", job_id.as_str().into())]))
        .await
        .unwrap();
    assert_eq!(stopped["stopped"], true);
    let job = wait_for(&client, &job_id, "stopped").await;
    assert!(job["result"].is_null());

    let deleted: Value = client
        .request("scan.delete.v1", params(&[("job_id", job_id.as_str().into())]))
        .await
        .unwrap();
    assert_eq!(deleted["deleted"], true);

    let listed: Vec<Value> = client
        .request("scan.list.v1", ObjectParams::new())
        .await
        .unwrap();
    assert!(listed.is_empty());
}

#[tokio::test]
async fn test_health_and_ping() {
    let (client, _handle) = serve(ScriptedLauncher::new(Script::RunUntilTerminated {
        progress: vec![],
    }))
    .await;

    let pong: String = client
        .request("system.ping.v1", ObjectParams::new())
        .await
        .unwrap();
    assert_eq!(pong, "pong");

    let created: Value = client
        .request("scan.create.v1", params(&[("target", "10.0.0.9".into())]))
        .await
        .unwrap();
    let job_id = created["jobId"].as_str().unwrap().to_string();
    wait_for(&client, &job_id, "running").await;

    let health: Value = client
        .request("system.health.v1", ObjectParams::new())
        .await
        .unwrap();
    assert_eq!(health["status"], "healthy");
    assert!(health["version"].is_string());
    assert_eq!(health["activeJobs"], 1);
    assert_eq!(health["totalJobs"], 1);
}
