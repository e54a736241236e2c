use assert_cmd::Command;
use httpmock::prelude::*;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// The binary with every connection variable scrubbed from the environment.
fn cwms_cli() -> Command {
    let mut cmd = Command::cargo_bin("cwms-cli").expect("Binary exists");
    cmd.env_remove("CDA_API_ROOT")
        .env_remove("CDA_API_KEY")
        .env_remove("OFFICE")
        .env_remove("RUST_LOG")
        .arg("--no-color");
    cmd
}

fn fixture_dir(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().expect("temp dir");
    for (rel, content) in files {
        let path = dir.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(path, content).expect("write fixture");
    }
    dir
}

#[test]
fn help_lists_blob_commands() {
    cwms_cli()
        .args(["blob", "--help"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("upload")
                .and(predicate::str::contains("download"))
                .and(predicate::str::contains("list"))
                .and(predicate::str::contains("delete"))
                .and(predicate::str::contains("update")),
        );
}

#[test]
fn help_lists_clob_commands() {
    cwms_cli()
        .args(["clob", "--help"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("upload")
                .and(predicate::str::contains("download"))
                .and(predicate::str::contains("list"))
                .and(predicate::str::contains("delete"))
                .and(predicate::str::contains("update")),
        );
}

#[test]
fn invalid_regex_fails_before_any_request() {
    let dir = fixture_dir(&[("a.txt", "a")]);
    let server = MockServer::start();
    let any_request = server.mock(|_when, then| {
        then.status(200);
    });

    cwms_cli()
        .args(["blob", "upload", "--input-dir"])
        .arg(dir.path())
        .args(["--file-regex", "([unclosed", "--office", "SWT"])
        .args(["--api-root", &server.url("/cwms-data"), "--api-key", "k"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid --file-regex"));

    any_request.assert_hits(0);
}

#[test]
fn files_sharing_a_blob_id_fail_before_any_request() {
    let dir = fixture_dir(&[("report.txt", "t"), ("report.csv", "c")]);
    let server = MockServer::start();
    let any_request = server.mock(|_when, then| {
        then.status(200);
    });

    cwms_cli()
        .args(["blob", "upload", "--input-dir"])
        .arg(dir.path())
        .args(["--office", "SWT"])
        .args(["--api-root", &server.url("/cwms-data"), "--api-key", "k"])
        .assert()
        .failure()
        .stderr(
            predicate::str::contains("blob id REPORT would be shared by")
                .and(predicate::str::contains("report.csv, report.txt")),
        );

    any_request.assert_hits(0);
}

#[test]
fn directory_flags_are_refused_with_a_single_file() {
    let dir = fixture_dir(&[("a.txt", "a")]);

    cwms_cli()
        .args(["blob", "upload", "--dry-run", "--recursive", "--input-file"])
        .arg(dir.path().join("a.txt"))
        .args(["--blob-id", "A", "--office", "SWT"])
        .args(["--api-root", "http://127.0.0.1:9/cwms-data"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn zero_matches_exit_cleanly_without_connection_settings() {
    let dir = fixture_dir(&[("a.txt", "a")]);

    cwms_cli()
        .args(["blob", "upload", "--input-dir"])
        .arg(dir.path())
        .args(["--file-regex", r"\.csv$", "--office", "SWT"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn one_failing_file_does_not_stop_the_others() {
    let dir = fixture_dir(&[("a.txt", "a"), ("b.txt", "b"), ("c.txt", "c")]);
    let server = MockServer::start();
    let ok_a = server.mock(|when, then| {
        when.method(POST)
            .path("/cwms-data/blobs")
            .body_includes(r#""id":"A""#);
        then.status(200);
    });
    let fail_b = server.mock(|when, then| {
        when.method(POST)
            .path("/cwms-data/blobs")
            .body_includes(r#""id":"B""#);
        then.status(500).body("database unavailable");
    });
    let ok_c = server.mock(|when, then| {
        when.method(POST)
            .path("/cwms-data/blobs")
            .body_includes(r#""id":"C""#);
        then.status(200);
    });

    cwms_cli()
        .args(["blob", "upload", "--input-dir"])
        .arg(dir.path())
        .args(["--office", "SWT"])
        .args(["--api-root", &server.url("/cwms-data"), "--api-key", "k"])
        .assert()
        .failure()
        .code(1)
        .stdout(
            predicate::str::contains("/cwms-data/blobs/A?office=SWT")
                .and(predicate::str::contains("/cwms-data/blobs/C?office=SWT"))
                .and(predicate::str::contains("/cwms-data/blobs/B?").not()),
        )
        .stderr(
            predicate::str::contains("b.txt: ")
                .and(predicate::str::contains("database unavailable"))
                .and(predicate::str::contains("1/3 files failed")),
        );

    ok_a.assert_hits(1);
    fail_b.assert_hits(1);
    ok_c.assert_hits(1);
}

#[test]
fn non_recursive_dry_run_skips_subdirectories() {
    let dir = fixture_dir(&[("top.txt", "t"), ("sub/deep.txt", "d")]);

    cwms_cli()
        .args(["blob", "upload", "--dry-run", "--input-dir"])
        .arg(dir.path())
        .args(["--office", "SWT", "--blob-id-prefix", "OPS_"])
        .args(["--api-root", "http://127.0.0.1:9/cwms-data"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("blobs/OPS_TOP?office=SWT")
                .and(predicate::str::contains("SUB_DEEP").not()),
        );
}

#[test]
fn recursive_dry_run_includes_subdirectories() {
    let dir = fixture_dir(&[("top.txt", "t"), ("sub/deep.txt", "d")]);

    cwms_cli()
        .args(["blob", "upload", "--dry-run", "--recursive", "--input-dir"])
        .arg(dir.path())
        .args(["--office", "SWT"])
        .args(["--api-root", "http://127.0.0.1:9/cwms-data"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("blobs/SUB_DEEP?office=SWT")
                .and(predicate::str::contains("blobs/TOP?office=SWT")),
        );
}

#[test]
fn single_file_upload_uppercases_blob_id() {
    let dir = fixture_dir(&[("notes.md", "# notes")]);
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/cwms-data/blobs")
            .query_param("fail-if-exists", "false")
            .header("authorization", "apikey k")
            .body_includes(r#""id":"MY_NOTES""#);
        then.status(201);
    });

    cwms_cli()
        .args(["blob", "upload", "--overwrite", "--input-file"])
        .arg(dir.path().join("notes.md"))
        .args(["--blob-id", "my_notes", "--office", "SWT"])
        .args(["--api-root", &server.url("/cwms-data"), "--api-key", "k"])
        .assert()
        .success()
        .stdout(predicate::str::contains("/cwms-data/blobs/MY_NOTES?office=SWT"));

    mock.assert();
}

#[test]
fn upload_without_api_key_is_rejected() {
    let dir = fixture_dir(&[("a.txt", "a")]);

    cwms_cli()
        .args(["blob", "upload", "--input-dir"])
        .arg(dir.path())
        .args(["--office", "SWT", "--api-root", "http://127.0.0.1:9/cwms-data"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("api key is required"));
}

#[test]
fn download_writes_decoded_data_url() {
    let out = TempDir::new().expect("temp dir");
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET)
            .path("/cwms-data/blobs/GREETING")
            .query_param("office", "SWT");
        then.status(200)
            .header("content-type", "text/plain")
            .body("data:text/plain;base64,aGVsbG8=");
    });

    let dest = out.path().join("nested").join("greeting");
    cwms_cli()
        .args(["blob", "download", "--blob-id", "greeting", "--office", "SWT"])
        .args(["--api-root", &server.url("/cwms-data")])
        .arg("--dest")
        .arg(&dest)
        .assert()
        .success();

    let written = fs::read(dest.with_extension("txt")).expect("downloaded file exists");
    assert_eq!(written, b"hello");
}

#[test]
fn download_keeps_data_url_without_base64_marker() {
    let out = TempDir::new().expect("temp dir");
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/cwms-data/blobs/RAW");
        then.status(200)
            .header("content-type", "text/plain")
            .body("data:text/plain,hello");
    });

    let dest = out.path().join("raw.txt");
    cwms_cli()
        .args(["blob", "download", "--blob-id", "RAW", "--office", "SWT"])
        .args(["--api-root", &server.url("/cwms-data")])
        .arg("--dest")
        .arg(&dest)
        .assert()
        .success();

    assert_eq!(fs::read(&dest).expect("file written"), b"data:text/plain,hello");
}

#[test]
fn delete_uppercases_blob_id() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(DELETE)
            .path("/cwms-data/blobs/NOTES")
            .query_param("office", "SWT");
        then.status(204);
    });

    cwms_cli()
        .args(["blob", "delete", "--blob-id", "notes", "--office", "SWT"])
        .args(["--api-root", &server.url("/cwms-data"), "--api-key", "k"])
        .assert()
        .success();

    mock.assert();
}

#[test]
fn blob_update_patches_description() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(PATCH)
            .path("/cwms-data/blobs/NOTES")
            .query_param("office", "SWT")
            .query_param("ignore-nulls", "true")
            .body_includes(r#""description":"shift log""#);
        then.status(200);
    });

    cwms_cli()
        .args(["blob", "update", "--blob-id", "notes", "--description", "shift log"])
        .args(["--office", "SWT"])
        .args(["--api-root", &server.url("/cwms-data"), "--api-key", "k"])
        .assert()
        .success()
        .stdout(predicate::str::contains("/cwms-data/blobs/NOTES?office=SWT"));

    mock.assert();
}

#[test]
fn clob_upload_sends_file_text() {
    let dir = fixture_dir(&[("log.txt", "gate 3 opened")]);
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/cwms-data/clobs")
            .query_param("fail-if-exists", "true")
            .header("authorization", "apikey k")
            .body_includes(r#""id":"SHIFT_LOG""#)
            .body_includes(r#""value":"gate 3 opened""#);
        then.status(201);
    });

    cwms_cli()
        .args(["clob", "upload", "--input-file"])
        .arg(dir.path().join("log.txt"))
        .args(["--clob-id", "shift_log", "--office", "SWT"])
        .args(["--api-root", &server.url("/cwms-data"), "--api-key", "k"])
        .assert()
        .success()
        .stdout(predicate::str::contains("/cwms-data/clobs/SHIFT_LOG?office=SWT"));

    mock.assert();
}

#[test]
fn clob_download_writes_value() {
    let out = TempDir::new().expect("temp dir");
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET)
            .path("/cwms-data/clobs/SHIFT_LOG")
            .query_param("office", "SWT");
        then.status(200).json_body(serde_json::json!({
            "office-id": "SWT",
            "id": "SHIFT_LOG",
            "value": "gate 3 opened"
        }));
    });

    let dest = out.path().join("logs").join("shift.txt");
    cwms_cli()
        .args(["clob", "download", "--clob-id", "shift_log", "--office", "SWT"])
        .args(["--api-root", &server.url("/cwms-data")])
        .arg("--dest")
        .arg(&dest)
        .assert()
        .success();

    assert_eq!(fs::read_to_string(&dest).expect("file written"), "gate 3 opened");
}

#[test]
fn clob_list_prints_sorted_rows() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET)
            .path("/cwms-data/clobs")
            .query_param("office", "SWT");
        then.status(200).json_body(serde_json::json!({
            "clobs": [
                { "office-id": "SWT", "id": "ZULU", "description": "last" },
                { "office-id": "SWT", "id": "ALPHA", "description": "first" }
            ]
        }));
    });

    cwms_cli()
        .args(["clob", "list", "--office", "SWT", "--desc", "--limit", "1"])
        .args(["--api-root", &server.url("/cwms-data")])
        .assert()
        .success()
        .stdout(predicate::str::contains("ZULU").and(predicate::str::contains("ALPHA").not()));
}

#[test]
fn list_prints_sorted_rows() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET)
            .path("/cwms-data/blobs")
            .query_param("office", "SWT");
        then.status(200).json_body(serde_json::json!({
            "blobs": [
                { "office": "SWT", "id": "ZULU", "media-type-id": "text/plain" },
                { "office": "SWT", "id": "ALPHA", "media-type-id": "application/pdf" }
            ]
        }));
    });

    cwms_cli()
        .args(["blob", "list", "--office", "SWT", "--limit", "1"])
        .args(["--api-root", &server.url("/cwms-data")])
        .assert()
        .success()
        .stdout(predicate::str::contains("ALPHA").and(predicate::str::contains("ZULU").not()));
}

use std::sync::{Arc, Mutex};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{layer::Context, Layer, Registry};

/// Custom Layer to collect emitted event messages.
struct EventCollector {
    events: Arc<Mutex<Vec<String>>>,
}

impl<S> Layer<S> for EventCollector
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        self.events.lock().unwrap().push(format!("{:?}", event));
    }
}

#[tokio::test]
async fn emits_trace_initialised_event() {
    use clap::Parser;
    use cwms_cli::cli::{run, Cli};

    let events = Arc::new(Mutex::new(Vec::new()));
    let collector = EventCollector {
        events: events.clone(),
    };
    let subscriber = Registry::default().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    let dir = fixture_dir(&[]);
    let cli = Cli::parse_from([
        "cwms-cli",
        "blob",
        "upload",
        "--dry-run",
        "--office",
        "SWT",
        "--input-dir",
        dir.path().to_str().expect("utf-8 temp path"),
    ]);

    let result = run(cli).await;
    assert!(result.is_ok(), "empty directory should succeed: {result:?}");

    let event_msgs = events.lock().unwrap();
    assert!(
        event_msgs.iter().any(|msg| msg.contains("trace_initialised")),
        "Expected a 'trace_initialised' trace event, got: {:?}",
        event_msgs
    );
}
