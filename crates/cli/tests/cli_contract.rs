use assert_cmd::cargo::cargo_bin_cmd;
use pdf_engine::{blank_pdf, LopdfEngine, OpenSource, PdfDocument, PdfEngine, Rotation, DEFAULT_PAGE_SIZE};
use predicates::prelude::*;
use serde_json::Value;
use std::path::{Path, PathBuf};

fn blank_fixture(dir: &Path, pages: u32) -> PathBuf {
    let path = dir.join("blank.pdf");
    std::fs::write(&path, blank_pdf(pages, DEFAULT_PAGE_SIZE).expect("blank pdf"))
        .expect("fixture should be written");
    path
}

fn script_fixture(dir: &Path, json: &str) -> PathBuf {
    let path = dir.join("script.json");
    std::fs::write(&path, json).expect("script should be written");
    path
}

const STAMP_AND_ROTATE: &str = r#"{
    "rotations": { "1": 90 },
    "annotations": [
        { "page": 0, "type": "stamp", "anchor": { "x": 100, "y": 100 }, "stamp": "draft" },
        { "page": 0, "type": "text", "anchor": { "x": 72, "y": 72 }, "text": "Reviewed by QA" }
    ]
}"#;

#[test]
fn info_emits_stable_json_contract() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let pdf = blank_fixture(temp.path(), 2);

    let output = cargo_bin_cmd!("annotator")
        .arg("info")
        .arg(&pdf)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let value: Value = serde_json::from_slice(&output).expect("stdout should contain valid json");
    assert_eq!(value["page_count"], 2);
    assert_eq!(value["encrypted"], false);
    assert_eq!(value["pages"][1]["index"], 1);
    assert_eq!(value["pages"][1]["width"], 612.0);
    assert_eq!(value["pages"][1]["height"], 792.0);
    assert_eq!(value["pages"][0]["rotation"], 0);
}

#[test]
fn info_fails_for_missing_file() {
    let temp = tempfile::tempdir().expect("temp dir should be created");

    cargo_bin_cmd!("annotator")
        .arg("info")
        .arg(temp.path().join("missing.pdf"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("file does not exist"));
}

#[test]
fn info_fails_for_invalid_pdf() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let invalid = temp.path().join("invalid.pdf");
    std::fs::write(&invalid, b"this is not a pdf").expect("fixture should be written");

    cargo_bin_cmd!("annotator")
        .arg("info")
        .arg(&invalid)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to open PDF"));
}

#[test]
fn render_writes_png_at_requested_zoom() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let pdf = blank_fixture(temp.path(), 2);
    let script = script_fixture(temp.path(), STAMP_AND_ROTATE);
    let output_path = temp.path().join("out/page.png");

    cargo_bin_cmd!("annotator")
        .arg("render")
        .arg(&pdf)
        .arg("--page")
        .arg("1")
        .arg("--zoom")
        .arg("2")
        .arg("--script")
        .arg(&script)
        .arg("--output")
        .arg(&output_path)
        .assert()
        .success();

    let image = image::open(&output_path).expect("render should be a readable image").to_rgba8();
    assert_eq!((image.width(), image.height()), (1224, 1584));
    assert_ne!(image.get_pixel(300, 201).0, [255, 255, 255, 255], "stamp border should be drawn");
}

#[test]
fn render_warns_about_undecodable_signature_and_draws_the_rest() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let pdf = blank_fixture(temp.path(), 1);
    let script = script_fixture(
        temp.path(),
        r#"{
            "annotations": [
                { "page": 0, "type": "signature", "top_left": { "x": 10, "y": 10 },
                  "width": 50, "height": 20, "image": "AAEC" },
                { "page": 0, "type": "shape", "start": { "x": 100, "y": 100 },
                  "end": { "x": 140, "y": 140 }, "shape": "rectangle", "fill": true }
            ]
        }"#,
    );
    let output_path = temp.path().join("page.png");

    cargo_bin_cmd!("annotator")
        .arg("render")
        .arg(&pdf)
        .arg("--script")
        .arg(&script)
        .arg("--output")
        .arg(&output_path)
        .assert()
        .success()
        .stderr(predicate::str::contains("could not be decoded"));

    let image = image::open(&output_path).expect("render should be a readable image").to_rgba8();
    assert_eq!(image.get_pixel(120, 120).0, [255, 0, 0, 255]);
}

#[test]
fn render_rejects_page_zero() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let pdf = blank_fixture(temp.path(), 1);

    cargo_bin_cmd!("annotator")
        .arg("render")
        .arg(&pdf)
        .arg("--page")
        .arg("0")
        .assert()
        .failure()
        .stderr(predicate::str::contains("1-based"));
}

#[test]
fn flatten_writes_rotations_into_output() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let pdf = blank_fixture(temp.path(), 2);
    let script = script_fixture(temp.path(), STAMP_AND_ROTATE);
    let output_path = temp.path().join("flattened.pdf");

    cargo_bin_cmd!("annotator")
        .arg("flatten")
        .arg(&pdf)
        .arg("--script")
        .arg(&script)
        .arg("--output")
        .arg(&output_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("flattened.pdf"));

    let reopened = LopdfEngine::new()
        .open(OpenSource::from(output_path.as_path()), None)
        .expect("flattened output should reopen");
    assert_eq!(reopened.page_count(), 2);
    assert_eq!(reopened.page_rotation(1).expect("rotation"), Rotation::Deg90);
}

#[test]
fn flatten_dry_run_prints_primitives_without_writing() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let pdf = blank_fixture(temp.path(), 2);
    let before = std::fs::read(&pdf).expect("fixture");
    let script = script_fixture(temp.path(), STAMP_AND_ROTATE);

    cargo_bin_cmd!("annotator")
        .arg("flatten")
        .arg(&pdf)
        .arg("--script")
        .arg(&script)
        .arg("--dry-run")
        .assert()
        .success()
        .stdout(predicate::str::contains("Rotation { page: 1, rotation: Deg90 }"))
        .stdout(predicate::str::contains("\"DRAFT\""))
        .stdout(predicate::str::contains("\"Reviewed by QA\""));

    assert_eq!(std::fs::read(&pdf).expect("fixture"), before);
}

#[test]
fn flatten_reports_bad_script() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let pdf = blank_fixture(temp.path(), 1);
    let script = script_fixture(temp.path(), r#"{ "rotations": { "0": 45 } }"#);

    cargo_bin_cmd!("annotator")
        .arg("flatten")
        .arg(&pdf)
        .arg("--script")
        .arg(&script)
        .assert()
        .failure()
        .stderr(predicate::str::contains("multiple of 90"));
}

#[test]
fn unlock_reports_unencrypted_input() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let pdf = blank_fixture(temp.path(), 1);

    cargo_bin_cmd!("annotator")
        .arg("unlock")
        .arg(&pdf)
        .arg("--password")
        .arg("secret")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not password protected"))
        .stderr(predicate::str::contains("1 of 1 files"));
}

#[test]
fn signature_library_round_trip() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let vault = temp.path().join("sigs.vault");
    let scan = temp.path().join("scan.png");
    let mut ink = image::RgbaImage::from_pixel(300, 100, image::Rgba([255, 255, 255, 255]));
    for x in 20..280 {
        ink.put_pixel(x, 50, image::Rgba([0, 0, 0, 255]));
    }
    ink.save(&scan).expect("scan should be written");

    cargo_bin_cmd!("annotator")
        .args(["signatures", "add", "alice"])
        .arg(&scan)
        .arg("--vault")
        .arg(&vault)
        .args(["--vault-password", "pw"])
        .assert()
        .success();

    cargo_bin_cmd!("annotator")
        .args(["signatures", "list", "--vault"])
        .arg(&vault)
        .env("ANNOTATOR_VAULT_PASSWORD", "pw")
        .assert()
        .success()
        .stdout(predicate::str::contains("alice\tsignature\t150x50"));

    let exported = temp.path().join("alice.png");
    cargo_bin_cmd!("annotator")
        .args(["signatures", "export", "alice", "--output"])
        .arg(&exported)
        .arg("--vault")
        .arg(&vault)
        .args(["--vault-password", "pw"])
        .assert()
        .success();
    let png = image::open(&exported).expect("export should be a PNG");
    assert_eq!((png.width(), png.height()), (150, 50));

    cargo_bin_cmd!("annotator")
        .args(["signatures", "remove", "alice", "--vault"])
        .arg(&vault)
        .args(["--vault-password", "pw"])
        .assert()
        .success();
    cargo_bin_cmd!("annotator")
        .args(["signatures", "remove", "alice", "--vault"])
        .arg(&vault)
        .args(["--vault-password", "pw"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no signature named alice"));
}

#[test]
fn drawn_signature_is_stored_as_pad_png() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let vault = temp.path().join("sigs.vault");
    let strokes = temp.path().join("strokes.json");
    std::fs::write(&strokes, "[[[20, 100], [120, 60], [240, 140]], [[300, 100], [400, 100]]]")
        .expect("strokes should be written");

    cargo_bin_cmd!("annotator")
        .args(["signatures", "draw", "JD"])
        .arg(&strokes)
        .arg("--initials")
        .arg("--vault")
        .arg(&vault)
        .args(["--vault-password", "pw"])
        .assert()
        .success();

    cargo_bin_cmd!("annotator")
        .args(["signatures", "list", "--vault"])
        .arg(&vault)
        .args(["--vault-password", "pw"])
        .assert()
        .success()
        .stdout(predicate::str::contains("JD\tinitials\t60x30"));

    let exported = temp.path().join("jd.png");
    cargo_bin_cmd!("annotator")
        .args(["signatures", "export", "JD", "--output"])
        .arg(&exported)
        .arg("--vault")
        .arg(&vault)
        .args(["--vault-password", "pw"])
        .assert()
        .success();
    let png = image::open(&exported).expect("export should be a PNG").to_rgba8();
    assert_eq!(png.dimensions(), (480, 200));
    assert_eq!(png.get_pixel(350, 100).0, [0, 0, 0, 255]);
    assert_eq!(png.get_pixel(5, 5).0[3], 0);
}

#[test]
fn empty_drawing_is_rejected() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let strokes = temp.path().join("strokes.json");
    std::fs::write(&strokes, "[[[20, 100]]]").expect("strokes should be written");

    cargo_bin_cmd!("annotator")
        .args(["signatures", "draw", "JD"])
        .arg(&strokes)
        .arg("--vault")
        .arg(temp.path().join("sigs.vault"))
        .args(["--vault-password", "pw"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("drawing has no strokes"));
}

#[test]
fn signature_library_rejects_wrong_password() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let vault = temp.path().join("sigs.vault");
    signature_vault::SignatureVault::create(&vault, "right").expect("vault should be created");

    cargo_bin_cmd!("annotator")
        .args(["signatures", "list", "--vault"])
        .arg(&vault)
        .args(["--vault-password", "wrong"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("incorrect password"));
}

#[test]
fn version_prints_package_version() {
    cargo_bin_cmd!("annotator")
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}
