//! CLI end-to-end tests
//!
//! Tests for the shiftfile command-line interface.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::tempdir;

/// Get a command for the shiftfile binary
#[allow(deprecated)]
fn shiftfile_cmd() -> Command {
    Command::cargo_bin("shiftfile").unwrap()
}

#[test]
fn test_cli_no_args_shows_help() {
    shiftfile_cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_help_flag() {
    shiftfile_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("shiftfile"))
        .stdout(predicate::str::contains("convert"));
}

#[test]
fn test_cli_convert_help() {
    shiftfile_cmd()
        .args(["convert", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Convert a single image or audio file"))
        .stdout(predicate::str::contains("--fade-out"));
}

#[test]
fn test_cli_formats_json() {
    let output = shiftfile_cmd().args(["formats", "--json"]).output().unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let image = json["image"].as_array().unwrap();
    assert!(image.iter().any(|v| v == "ico"));
    let audio = json["audio"].as_array().unwrap();
    assert!(audio.iter().any(|v| v == "flac"));
}

#[test]
fn test_cli_formats_text() {
    shiftfile_cmd()
        .arg("formats")
        .assert()
        .success()
        .stdout(predicate::str::contains("Image:"))
        .stdout(predicate::str::contains("Audio:"));
}

#[test]
fn test_cli_check_tools_command() {
    shiftfile_cmd()
        .arg("check-tools")
        .assert()
        .success()
        .stdout(predicate::str::contains("ffmpeg"))
        .stdout(predicate::str::contains("ffprobe"));
}

#[test]
fn test_cli_convert_nonexistent_file() {
    shiftfile_cmd()
        .args(["convert", "/nonexistent/path/photo.png", "--format", "jpg"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_cli_convert_unsupported_extension() {
    let temp = tempdir().unwrap();
    let input = temp.path().join("data.xyz");
    fs::write(&input, b"whatever").unwrap();

    shiftfile_cmd()
        .arg("convert")
        .arg(&input)
        .args(["--format", "png"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported_format"));
}

#[test]
fn test_cli_convert_wrong_target_kind() {
    let temp = tempdir().unwrap();
    let input = temp.path().join("photo.png");
    image::RgbImage::new(4, 4).save(&input).unwrap();

    shiftfile_cmd()
        .arg("convert")
        .arg(&input)
        .args(["--format", "mp3"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid_target_format"));
}

#[test]
fn test_cli_convert_json_error_body() {
    let temp = tempdir().unwrap();
    let input = temp.path().join("song.mp3");
    fs::write(&input, b"not really mp3").unwrap();

    let output = shiftfile_cmd()
        .arg("convert")
        .arg(&input)
        .args(["--format", "bmp", "--json"])
        .output()
        .unwrap();
    assert!(!output.status.success());

    let body: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(body["kind"], "invalid_target_format");
    assert!(body["message"].as_str().unwrap().contains("bmp"));
}

#[test]
fn test_cli_convert_bmp_to_ico() {
    let temp = tempdir().unwrap();
    let input = temp.path().join("red.bmp");
    image::RgbImage::from_pixel(100, 100, image::Rgb([255, 0, 0]))
        .save(&input)
        .unwrap();

    shiftfile_cmd()
        .arg("convert")
        .arg(&input)
        .args(["--format", "ico"])
        .assert()
        .success()
        .stdout(predicate::str::contains("converted_red.ico"));

    let output = temp.path().join("converted_red.ico");
    let img = image::open(&output).unwrap();
    assert_eq!((img.width(), img.height()), (32, 32));
}

#[test]
fn test_cli_convert_with_explicit_output_and_scratch_dir() {
    let temp = tempdir().unwrap();
    let scratch = temp.path().join("scratch");
    let config_file = temp.path().join("config.json");
    fs::write(
        &config_file,
        format!(r#"{{"scratch": {{"dir": {:?}}}}}"#, scratch.to_string_lossy()),
    )
    .unwrap();

    let input = temp.path().join("photo.png");
    image::RgbaImage::from_pixel(16, 16, image::Rgba([0, 0, 255, 0]))
        .save(&input)
        .unwrap();
    let dest = temp.path().join("out").with_extension("jpg");

    shiftfile_cmd()
        .arg("--config")
        .arg(&config_file)
        .arg("convert")
        .arg(&input)
        .args(["--format", "jpeg", "--output"])
        .arg(&dest)
        .assert()
        .success();

    let img = image::open(&dest).unwrap().to_rgb8();
    assert!(img.pixels().all(|p| p.0.iter().all(|&c| c >= 250)));
    assert_eq!(fs::read_dir(&scratch).unwrap().count(), 0);
}

#[test]
fn test_cli_validate_config() {
    let temp = tempdir().unwrap();
    let config_file = temp.path().join("config.json");
    fs::write(&config_file, r#"{"image": {"max_dimension": 10}}"#).unwrap();

    shiftfile_cmd()
        .args(["validate"])
        .arg(&config_file)
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"))
        .stdout(predicate::str::contains("smaller than an icon"));
}

#[test]
fn test_cli_validate_invalid_config() {
    let temp = tempdir().unwrap();
    let config_file = temp.path().join("config.json");
    fs::write(&config_file, "{not json").unwrap();

    shiftfile_cmd()
        .args(["validate"])
        .arg(&config_file)
        .assert()
        .failure();
}

#[test]
fn test_cli_convert_negative_speed_is_effect_parameter_error() {
    let temp = tempdir().unwrap();
    let input = temp.path().join("song.wav");
    fs::write(&input, b"RIFF").unwrap();

    let output = shiftfile_cmd()
        .arg("convert")
        .arg(&input)
        .args(["--format", "mp3", "--speed", "-1", "--json"])
        .output()
        .unwrap();
    assert!(!output.status.success());

    let body: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(body["kind"], "effect_parameter_error");
    assert!(body["message"].as_str().unwrap().contains("speed"));
}

#[test]
fn test_cli_convert_negative_fade_is_effect_parameter_error() {
    let temp = tempdir().unwrap();
    let input = temp.path().join("song.wav");
    fs::write(&input, b"RIFF").unwrap();

    shiftfile_cmd()
        .arg("convert")
        .arg(&input)
        .args(["--format", "flac", "--fade-out", "-2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("effect_parameter_error"));
}
