/// Integration tests for writing matches to the output directory
/// Uses a mocked render endpoint and a temporary directory per test
use legion_van::image::ImageFormat;
use legion_van::models::{Candidate, TraitRecord};
use legion_van::monkey_client::MonkeyApiClient;
use legion_van::persistence::{prepare_output_dir, PersistQueue, PersistenceWorker};
use legion_van::wallet::Wallet;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="200" height="100"><rect width="200" height="100" fill="#fbdd11"/></svg>"##;

fn candidate() -> Candidate {
    let wallet = Wallet::generate().unwrap();
    let record = match json!({"hat": "crown", "misc": "flamethrower", "rarity": 0.02}) {
        Value::Object(map) => TraitRecord::try_from(map).unwrap(),
        _ => unreachable!(),
    };
    Candidate::new(
        wallet.address.clone(),
        wallet.secret.clone(),
        "Waffleburp".to_string(),
        record,
    )
}

async fn render_server(template: ResponseTemplate) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/api/v1/monkey/ban_"))
        .respond_with(template)
        .mount(&server)
        .await;
    server
}

fn client_for(server: &MockServer) -> MonkeyApiClient {
    MonkeyApiClient::new(&server.uri(), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_persist_writes_metadata_and_png() {
    let server = render_server(ResponseTemplate::new(200).set_body_string(SVG)).await;
    let root = tempfile::tempdir().unwrap();
    let dir = prepare_output_dir(&root.path().join("found")).unwrap();

    let worker = PersistenceWorker::new(client_for(&server), dir.clone(), ImageFormat::Png, 100);
    let candidate = candidate();
    let paths = worker.persist(&candidate).await.unwrap();

    assert_eq!(
        paths.metadata.file_name().unwrap().to_str().unwrap(),
        format!("Waffleburp_{}.json", candidate.address)
    );
    assert_eq!(paths.image.extension().unwrap(), "png");

    let saved: Value = serde_json::from_slice(&std::fs::read(&paths.metadata).unwrap()).unwrap();
    assert_eq!(saved["public_address"], candidate.address.as_str());
    assert_eq!(saved["private_key"], candidate.secret.as_str());
    assert_eq!(saved["rarity"], 0.02);

    let png = std::fs::read(&paths.image).unwrap();
    assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        for file in [&paths.metadata, &paths.image] {
            let mode = std::fs::metadata(file).unwrap().permissions().mode() & 0o777;
            assert_eq!(mode, 0o600, "{}", file.display());
        }
    }
}

#[tokio::test]
async fn test_persist_keeps_svg_untouched() {
    let server = render_server(ResponseTemplate::new(200).set_body_string(SVG)).await;
    let root = tempfile::tempdir().unwrap();
    let dir = prepare_output_dir(&root.path().join("found")).unwrap();

    let worker = PersistenceWorker::new(client_for(&server), dir, ImageFormat::Svg, 250);
    let paths = worker.persist(&candidate()).await.unwrap();
    assert_eq!(std::fs::read(&paths.image).unwrap(), SVG.as_bytes());
}

#[tokio::test]
async fn test_unreadable_render_fails_after_metadata() {
    let server = render_server(ResponseTemplate::new(200).set_body_string("<not-svg")).await;
    let root = tempfile::tempdir().unwrap();
    let dir = prepare_output_dir(&root.path().join("found")).unwrap();

    let worker = PersistenceWorker::new(client_for(&server), dir, ImageFormat::Png, 250);
    let candidate = candidate();
    let paths = worker.paths_for(&candidate);

    assert!(worker.persist(&candidate).await.is_err());
    assert!(paths.metadata.exists());
    assert!(!paths.image.exists());
}

#[tokio::test]
async fn test_workers_drain_queue_after_cancellation() {
    let server = render_server(ResponseTemplate::new(200).set_body_string(SVG)).await;
    let root = tempfile::tempdir().unwrap();
    let dir = prepare_output_dir(&root.path().join("found")).unwrap();

    let (tx, rx) = mpsc::channel(16);
    for _ in 0..6 {
        tx.send(candidate()).await.unwrap();
    }
    drop(tx);

    let token = CancellationToken::new();
    token.cancel();

    let queue: PersistQueue = Arc::new(Mutex::new(rx));
    let worker = PersistenceWorker::new(client_for(&server), dir.clone(), ImageFormat::Svg, 250);
    let a = tokio::spawn(worker.clone().run(0, queue.clone(), token.clone()));
    let b = tokio::spawn(worker.run(1, queue, token));

    let written = a.await.unwrap().unwrap() + b.await.unwrap().unwrap();
    assert_eq!(written, 6);
    assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 12);
}

#[tokio::test]
async fn test_worker_failure_cancels_run() {
    let server = render_server(ResponseTemplate::new(404)).await;
    let root = tempfile::tempdir().unwrap();
    let dir = prepare_output_dir(&root.path().join("found")).unwrap();

    let (tx, rx) = mpsc::channel(4);
    tx.send(candidate()).await.unwrap();
    drop(tx);

    let token = CancellationToken::new();
    let worker = PersistenceWorker::new(client_for(&server), dir, ImageFormat::Svg, 250);
    let result = worker.run(0, Arc::new(Mutex::new(rx)), token.clone()).await;

    assert!(result.is_err());
    assert!(token.is_cancelled());
}

#[tokio::test]
async fn test_failed_writers_keep_saving_metadata() {
    let server = render_server(ResponseTemplate::new(500)).await;
    let root = tempfile::tempdir().unwrap();
    let dir = prepare_output_dir(&root.path().join("found")).unwrap();

    let (tx, rx) = mpsc::channel(16);
    let mut accepted = Vec::new();
    for _ in 0..5 {
        let candidate = candidate();
        accepted.push((candidate.address.clone(), candidate.secret.clone()));
        tx.send(candidate).await.unwrap();
    }
    drop(tx);

    let token = CancellationToken::new();
    let queue: PersistQueue = Arc::new(Mutex::new(rx));
    let worker = PersistenceWorker::new(client_for(&server), dir.clone(), ImageFormat::Svg, 250);
    let a = tokio::spawn(worker.clone().run(0, queue.clone(), token.clone()));
    let b = tokio::spawn(worker.run(1, queue, token.clone()));

    let results = [a.await.unwrap(), b.await.unwrap()];
    assert!(results.iter().any(|r| r.is_err()));
    assert!(token.is_cancelled());

    let metadata: Vec<Value> = std::fs::read_dir(&dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("json"))
        .map(|p| serde_json::from_slice(&std::fs::read(p).unwrap()).unwrap())
        .collect();
    assert_eq!(metadata.len(), 5);
    for (address, secret) in &accepted {
        assert!(metadata
            .iter()
            .any(|m| m["public_address"] == address.as_str() && m["private_key"] == secret.as_str()));
    }
}
