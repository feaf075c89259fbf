use assert_cmd::Command;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;
use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn cli() -> Command {
    Command::new(env!("CARGO_BIN_EXE_speccat"))
}

fn write(root: &Path, relative: &str, body: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, body).unwrap();
}

fn quotes_root() -> Result<TempDir, Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;
    write(
        temp.path(),
        "openapi/quotes.yaml",
        "paths:\n  /quotes:\n    post:\n      tags: [quotes]\n  /health:\n    get: {}\nwebhooks:\n  order.filled:\n    post: {}\n",
    );
    Ok(temp)
}

#[test]
fn discover_empty_root_reports_fallback() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;

    cli()
        .arg("--root")
        .arg(temp.path())
        .arg("discover")
        .assert()
        .success()
        .stdout(contains("using fallback"))
        .stdout(contains("./openapi/speccat-default.yaml"));
    Ok(())
}

#[test]
fn catalog_defaults_to_first_identifier() -> Result<(), Box<dyn std::error::Error>> {
    let temp = quotes_root()?;

    cli()
        .current_dir(temp.path())
        .arg("catalog")
        .assert()
        .success()
        .stdout(contains("Catalog for ./openapi/quotes.yaml"))
        .stdout(contains("POST /quotes [quotes]"))
        .stdout(contains("GET /health"))
        .stdout(contains("POST order.filled"));
    Ok(())
}

#[test]
fn catalog_json_output_is_tagged() -> Result<(), Box<dyn std::error::Error>> {
    let temp = quotes_root()?;

    let output = cli()
        .current_dir(temp.path())
        .args(["--json", "catalog", "./openapi/quotes.yaml"])
        .output()?;
    assert!(output.status.success());

    let payload: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(payload["type"], "catalog");
    assert_eq!(
        payload["operations"],
        serde_json::json!([
            {"method": "post", "path": "/quotes", "tags": ["quotes"]},
            {"method": "get", "path": "/health"}
        ])
    );
    assert_eq!(
        payload["webhooks"],
        serde_json::json!([{"method": "post", "name": "order.filled"}])
    );
    Ok(())
}

#[test]
fn catalog_groups_by_tag() -> Result<(), Box<dyn std::error::Error>> {
    let temp = quotes_root()?;

    cli()
        .current_dir(temp.path())
        .args(["catalog", "--by-tag"])
        .assert()
        .success()
        .stdout(contains("quotes (1):"))
        .stdout(contains("(untagged) (1):"));
    Ok(())
}

#[test]
fn resolve_prints_expanded_document() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;
    write(
        temp.path(),
        "openapi/pets.json",
        r##"{
            "paths": {"/pets": {"get": {"responses": {"200": {"$ref": "#/components/responses/Pets"}}}}},
            "components": {"responses": {"Pets": {"description": "all pets"}}}
        }"##,
    );

    let output = cli()
        .current_dir(temp.path())
        .args(["resolve", "./openapi/pets.json"])
        .output()?;
    assert!(output.status.success());

    let document: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(
        document["paths"]["/pets"]["get"]["responses"]["200"],
        serde_json::json!({"description": "all pets"})
    );
    Ok(())
}

#[test]
fn resolve_unknown_identifier_is_usage_error() -> Result<(), Box<dyn std::error::Error>> {
    let temp = quotes_root()?;

    cli()
        .current_dir(temp.path())
        .args(["resolve", "./openapi/missing.yaml"])
        .assert()
        .failure()
        .code(64)
        .stderr(contains("specification not found"));
    Ok(())
}

#[test]
fn local_flag_refuses_remote_references() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;
    write(
        temp.path(),
        "openapi/remote.json",
        r#"{"paths": {"/x": {"$ref": "https://specs.example.com/x.json#/item"}}}"#,
    );

    cli()
        .current_dir(temp.path())
        .args(["--local", "resolve", "./openapi/remote.json"])
        .assert()
        .failure()
        .code(65)
        .stderr(contains("disabled"));
    Ok(())
}

#[test]
fn check_reports_each_specification() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;
    write(temp.path(), "openapi/good.json", r#"{"paths": {"/a": {"get": {}}}}"#);
    write(temp.path(), "openapi/broken.json", "{ not json");
    write(
        temp.path(),
        "openapi/dangling.yaml",
        "paths:\n  /b:\n    $ref: '#/components/pathItems/Missing'\n",
    );

    cli()
        .current_dir(temp.path())
        .args(["--local", "check"])
        .assert()
        .failure()
        .code(65)
        .stdout(contains("Catalog check: FAIL (3 specifications)"))
        .stdout(contains("[ERR] ./openapi/broken.json"))
        .stdout(contains("[ERR] ./openapi/dangling.yaml"))
        .stdout(contains("[OK] ./openapi/good.json (1 operations, 0 webhooks)"));
    Ok(())
}

#[test]
fn check_healthy_root_succeeds() -> Result<(), Box<dyn std::error::Error>> {
    let temp = quotes_root()?;

    cli()
        .current_dir(temp.path())
        .arg("check")
        .assert()
        .success()
        .stdout(contains("Catalog check: OK (1 specifications)"));
    Ok(())
}

#[test]
fn spec_dir_flag_overrides_default_folder() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;
    write(temp.path(), "openapi/ignored.json", "{}");
    write(temp.path(), "contracts/billing.yml", "paths: {}\n");

    cli()
        .current_dir(temp.path())
        .args(["--spec-dir", "contracts", "discover"])
        .assert()
        .success()
        .stdout(contains("./contracts/billing.yml"))
        .stdout(contains("ignored.json").not());
    Ok(())
}

#[test]
fn malformed_configuration_exits_with_config_status() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;
    write(temp.path(), "speccat.yaml", "spec_dirs: typo\n");

    cli()
        .current_dir(temp.path())
        .arg("discover")
        .assert()
        .failure()
        .code(78)
        .stderr(contains("configuration error"));
    Ok(())
}

#[test]
fn zero_timeout_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;

    cli()
        .current_dir(temp.path())
        .args(["--timeout", "0", "discover"])
        .assert()
        .failure()
        .code(64);
    Ok(())
}

#[test]
fn schema_describes_catalog_payload() -> Result<(), Box<dyn std::error::Error>> {
    cli()
        .arg("schema")
        .assert()
        .success()
        .stdout(contains("\"operations\""))
        .stdout(contains("\"webhooks\""));
    Ok(())
}

fn doubling_spec(levels: usize) -> String {
    let mut schemas = serde_json::Map::new();
    for level in 0..levels {
        let next = format!("#/components/schemas/L{}", level + 1);
        schemas.insert(
            format!("L{level}"),
            serde_json::json!({"properties": {"a": {"$ref": next}, "b": {"$ref": next}}}),
        );
    }
    schemas.insert(format!("L{levels}"), serde_json::json!({"type": "string"}));
    serde_json::json!({
        "paths": {"/x": {"get": {"x": {"$ref": "#/components/schemas/L0"}}}},
        "components": {"schemas": schemas}
    })
    .to_string()
}

#[test]
fn timeout_bounds_the_whole_command() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;
    write(temp.path(), "speccat.yaml", "max_nodes: 1000000000000\n");
    write(temp.path(), "openapi/doubling.json", &doubling_spec(64));

    let started = Instant::now();
    cli()
        .current_dir(temp.path())
        .args(["--timeout", "1", "catalog"])
        .assert()
        .failure()
        .code(71)
        .stderr(contains("timed out after 1s"));
    assert!(started.elapsed() < Duration::from_secs(10));
    Ok(())
}

#[test]
fn node_budget_failure_is_data_error() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;
    write(temp.path(), "speccat.yaml", "max_nodes: 10000\n");
    write(temp.path(), "openapi/doubling.json", &doubling_spec(40));

    cli()
        .current_dir(temp.path())
        .arg("catalog")
        .assert()
        .failure()
        .code(65)
        .stderr(contains("node budget 10000"));
    Ok(())
}
