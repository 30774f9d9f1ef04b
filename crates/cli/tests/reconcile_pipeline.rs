// Integration tests for the reconcile pipeline.
// Run with: cargo test -p porchlight-cli --test reconcile_pipeline

use std::io::Write;
use std::process::Command;

use httpmock::prelude::*;

fn porchlight() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_porchlight"));
    // Clear env so a real deployment never leaks into tests
    cmd.env_remove("PORCHLIGHT_API_KEY");
    cmd.env_remove("PORCHLIGHT_STORE_URL");
    cmd
}

fn page(records: serde_json::Value) -> serde_json::Value {
    serde_json::json!({ "data": records, "next_token": null })
}

/// Mock a store holding two records for the same address (one with an
/// occupant and an assignment, one bare), a deny-listed occupant, and a
/// property with a stale absentee flag.
fn mock_dirty_store(server: &MockServer) {
    server.mock(|when, then| {
        when.method(GET).path("/api/properties");
        then.status(200).json_body(page(serde_json::json!([
            {
                "id": "h-keep",
                "street": "42927 Cloverleaf Ct",
                "city": "Broadlands",
                "state": "VA",
                "createdAt": "2025-08-01T00:00:00Z"
            },
            {
                "id": "h-dup",
                "street": "42927 CLOVERLEAF CT",
                "city": "Broadlands",
                "state": "VA",
                "createdAt": "2025-08-02T00:00:00Z"
            },
            {
                "id": "h-absent",
                "street": "100 Main St",
                "city": "Broadlands",
                "state": "VA",
                "mailingStreet": "200 Oak Ave",
                "absenteeOwner": false,
                "createdAt": "2025-08-03T00:00:00Z"
            }
        ])));
    });
    server.mock(|when, then| {
        when.method(GET).path("/api/occupants");
        then.status(200).json_body(page(serde_json::json!([
            {
                "id": "p-real",
                "propertyId": "h-keep",
                "firstName": "Michael",
                "lastName": "Simpson",
                "role": "PRIMARY_OWNER",
                "createdAt": "2025-08-01T00:00:00Z"
            },
            {
                "id": "p-fake",
                "propertyId": "h-dup",
                "firstName": "Jane",
                "lastName": "Doe",
                "role": "OTHER",
                "createdAt": "2025-08-02T00:00:00Z"
            }
        ])));
    });
    server.mock(|when, then| {
        when.method(GET).path("/api/assignments");
        then.status(200).json_body(page(serde_json::json!([
            {
                "id": "a-1",
                "propertyId": "h-keep",
                "volunteerId": "v-1",
                "status": "NOT_STARTED",
                "createdAt": "2025-08-01T00:00:00Z"
            }
        ])));
    });
    server.mock(|when, then| {
        when.method(GET).path("/api/volunteers");
        then.status(200).json_body(page(serde_json::json!([
            { "id": "v-1", "displayName": "Sam" }
        ])));
    });
}

#[test]
fn missing_api_key_exits_10() {
    let output = porchlight()
        .args(["analyze", "--base-url", "http://127.0.0.1:9", "--quiet"])
        .output()
        .expect("failed to run porchlight");

    assert_eq!(
        output.status.code(),
        Some(10),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr),
    );
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("missing store API key"), "stderr: {}", stderr);
}

#[test]
fn dry_run_plans_but_never_mutates() {
    let server = MockServer::start();
    mock_dirty_store(&server);
    let delete_dup = server.mock(|when, then| {
        when.method(DELETE).path("/api/properties/h-dup");
        then.status(200);
    });

    let output = porchlight()
        .args([
            "reconcile", "run",
            "--dry-run", "--json", "--quiet",
            "--base-url", &server.base_url(),
            "--api-key", "test-token",
        ])
        .output()
        .expect("failed to run porchlight");

    assert_eq!(
        output.status.code(),
        Some(0),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr),
    );
    delete_dup.assert_hits(0);

    let report: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout is not JSON");
    assert_eq!(report["meta"]["dry_run"], true);
    assert_eq!(report["summary"]["properties_deleted"], 1);
    assert_eq!(report["summary"]["synthetic_occupants_removed"], 1);
    assert_eq!(report["summary"]["absentee_corrections"], 1);
    assert_eq!(report["summary"]["clusters"]["duplicate_clusters"], 1);
    assert!(report.get("execution").is_none());
    assert!(report.get("verification").is_none());
}

#[test]
fn live_run_issues_the_planned_mutations() {
    let server = MockServer::start();
    mock_dirty_store(&server);
    let delete_dup = server.mock(|when, then| {
        when.method(DELETE).path("/api/properties/h-dup");
        then.status(200);
    });
    let delete_fake = server.mock(|when, then| {
        when.method(DELETE).path("/api/occupants/p-fake");
        then.status(200);
    });
    let set_absentee = server.mock(|when, then| {
        when.method(PATCH)
            .path("/api/properties/h-absent")
            .json_body(serde_json::json!({"absenteeOwner": true}));
        then.status(200).json_body(serde_json::json!({"id": "h-absent"}));
    });

    let output = porchlight()
        .args([
            "reconcile", "run",
            "--json", "--quiet", "--skip-verify",
            "--base-url", &server.base_url(),
            "--api-key", "test-token",
        ])
        .output()
        .expect("failed to run porchlight");

    assert_eq!(
        output.status.code(),
        Some(0),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr),
    );
    delete_dup.assert();
    delete_fake.assert();
    set_absentee.assert();

    let report: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout is not JSON");
    assert_eq!(report["execution"]["attempted"], 3);
    assert_eq!(report["execution"]["succeeded"], 3);
    assert_eq!(report["execution"]["skipped"], serde_json::json!([]));
}

#[test]
fn analyze_is_read_only() {
    let server = MockServer::start();
    mock_dirty_store(&server);

    let output = porchlight()
        .args([
            "analyze", "--json", "--quiet",
            "--base-url", &server.base_url(),
            "--api-key", "test-token",
        ])
        .output()
        .expect("failed to run porchlight");

    assert_eq!(output.status.code(), Some(0));
    let report: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout is not JSON");
    assert_eq!(report["stats"]["duplicate_clusters"], 1);
    assert_eq!(
        report["clusters"][0]["member_ids"],
        serde_json::json!(["h-keep", "h-dup"])
    );
}

#[test]
fn verify_reports_violations_with_exit_22() {
    let server = MockServer::start();
    mock_dirty_store(&server);

    // One read round so the test doesn't sit in the backoff loop.
    let mut config = tempfile::NamedTempFile::new().unwrap();
    writeln!(config, "[verify]\nrounds = 1\nbackoff_ms = 1").unwrap();

    let output = porchlight()
        .args([
            "verify", "--json", "--quiet",
            "--config", config.path().to_str().unwrap(),
            "--base-url", &server.base_url(),
            "--api-key", "test-token",
        ])
        .output()
        .expect("failed to run porchlight");

    assert_eq!(
        output.status.code(),
        Some(22),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr),
    );
    let report: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout is not JSON");
    assert_eq!(report["violations"][0]["kind"], "duplicate_property");
}

#[test]
fn scrub_dry_run_lists_matches() {
    let server = MockServer::start();
    mock_dirty_store(&server);
    let delete_fake = server.mock(|when, then| {
        when.method(DELETE).path("/api/occupants/p-fake");
        then.status(200);
    });

    let output = porchlight()
        .args([
            "scrub", "--dry-run", "--json", "--quiet",
            "--base-url", &server.base_url(),
            "--api-key", "test-token",
        ])
        .output()
        .expect("failed to run porchlight");

    assert_eq!(output.status.code(), Some(0));
    delete_fake.assert_hits(0);
    let report: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout is not JSON");
    assert_eq!(report["matches"][0]["occupant_id"], "p-fake");
    assert_eq!(report["matches"][0]["full_name"], "jane doe");
}

#[test]
fn absentee_fix_patches_stale_flags() {
    let server = MockServer::start();
    mock_dirty_store(&server);
    let set_absentee = server.mock(|when, then| {
        when.method(PATCH)
            .path("/api/properties/h-absent")
            .json_body(serde_json::json!({"absenteeOwner": true}));
        then.status(200).json_body(serde_json::json!({"id": "h-absent"}));
    });

    let output = porchlight()
        .args([
            "absentee", "--fix", "--json", "--quiet",
            "--base-url", &server.base_url(),
            "--api-key", "test-token",
        ])
        .output()
        .expect("failed to run porchlight");

    assert_eq!(
        output.status.code(),
        Some(0),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr),
    );
    set_absentee.assert();
    let report: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout is not JSON");
    assert_eq!(report["corrections"][0]["property_id"], "h-absent");
    assert_eq!(report["corrections"][0]["absentee"], true);
}

#[test]
fn malformed_config_exits_20() {
    let mut config = tempfile::NamedTempFile::new().unwrap();
    writeln!(config, "[store\npage_size = ").unwrap();

    let output = porchlight()
        .args(["reconcile", "validate", "--config", config.path().to_str().unwrap()])
        .output()
        .expect("failed to run porchlight");

    assert_eq!(
        output.status.code(),
        Some(20),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr),
    );
}

#[test]
fn valid_config_validates() {
    let mut config = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        config,
        "[store]\npage_size = 500\n\n[deny_list]\nversion = 2\nexact = [\"jane doe\"]\nmarkers = [\"test\"]\n"
    )
    .unwrap();

    let output = porchlight()
        .args(["reconcile", "validate", "--config", config.path().to_str().unwrap()])
        .output()
        .expect("failed to run porchlight");

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("deny-list v2"), "stdout: {}", stdout);
}
