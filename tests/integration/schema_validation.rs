use std::path::Path;

use jsonschema::validator_for;
use test_support::{fixture_path, read_json, report_cmd, tempdir};

fn compile_schema(name: &str) -> jsonschema::Validator {
  let manifest_dir = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"));
  let schema = read_json(&manifest_dir.join("tests").join("schemas").join(name));
  validator_for(&schema).expect("compile schema")
}

fn page_documents(dir: &Path) -> Vec<(String, serde_json::Value)> {
  let manifest = read_json(&dir.join("manifest.json"));
  let mut docs = Vec::new();
  for page in manifest["pages"].as_array().unwrap() {
    for f in page["files"].as_array().unwrap() {
      if f["kind"] == "report" {
        let name = f["file"].as_str().unwrap().to_string();
        let doc = read_json(&dir.join(&name));
        docs.push((name, doc));
      }
    }
  }
  docs
}

fn assert_conforms(dir: &Path) {
  let validator = compile_schema("page.schema.json");
  let docs = page_documents(dir);
  assert!(!docs.is_empty());
  for (name, doc) in docs {
    if let Err(e) = validator.validate(&doc) {
      panic!("{name} does not conform to page.schema.json: {e}");
    }
  }
}

#[test]
fn every_page_document_conforms() {
  let out = tempdir();
  report_cmd()
    .args(["--input", fixture_path("records.csv").to_str().unwrap(), "--month", "2025-01"])
    .args(["--out", out.path().to_str().unwrap()])
    .assert()
    .success();
  assert_conforms(out.path());
}

#[test]
fn comparison_and_adjustments_conform() {
  let out = tempdir();
  report_cmd()
    .args(["--input", fixture_path("records.csv").to_str().unwrap(), "--preset", "Last Month"])
    .args(["--config", fixture_path("adjustments.json").to_str().unwrap()])
    .args(["--compare-previous", "--out", out.path().to_str().unwrap()])
    .assert()
    .success();
  assert_conforms(out.path());
}
