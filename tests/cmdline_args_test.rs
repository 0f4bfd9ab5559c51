//! Tests for command-line argument parsing
//!
//! Note: These tests verify the argument parser configuration by creating
//! a test parser with the same structure as the main application.

use clap::{Arg, ArgAction, Command as ClapCommand};

/// Create a command with the same argument structure as the main binary
fn create_test_command() -> ClapCommand {
    ClapCommand::new("cornea-tracker")
        .version("0.1.0")
        .about("Eye feature capture and cursor regression")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .short('C')
                .long("config")
                .value_name("PATH")
                .global(true)
                .help("Configuration file path"),
        )
        .arg(
            Arg::new("debug")
                .short('d')
                .long("debug")
                .action(ArgAction::SetTrue)
                .global(true)
                .help("Enable debug output"),
        )
        .subcommand(
            ClapCommand::new("capture")
                .arg(Arg::new("cam").long("cam").value_name("INDEX").help("Camera index"))
                .arg(Arg::new("frames").long("frames").value_name("DIR").help("Image directory"))
                .arg(
                    Arg::new("session")
                        .short('s')
                        .long("session")
                        .value_name("NAME")
                        .help("Session name"),
                )
                .arg(Arg::new("data-dir").long("data-dir").value_name("DIR"))
                .arg(Arg::new("face-model").long("face-model").value_name("PATH"))
                .arg(Arg::new("model").long("model").value_name("PATH"))
                .arg(
                    Arg::new("iris-center")
                        .long("iris-center")
                        .value_name("MODE")
                        .value_parser(["landmark", "cluster"]),
                )
                .arg(Arg::new("cursor").long("cursor").value_name("X,Y"))
                .arg(Arg::new("history").long("history").value_name("ROWS"))
                .arg(Arg::new("no-preview").long("no-preview").action(ArgAction::SetTrue))
                .arg(Arg::new("max-frames").long("max-frames").value_name("N")),
        )
        .subcommand(
            ClapCommand::new("export")
                .arg(Arg::new("session").required(true))
                .arg(Arg::new("output").short('o').long("output").value_name("PATH"))
                .arg(Arg::new("data-dir").long("data-dir").value_name("DIR")),
        )
        .subcommand(
            ClapCommand::new("train")
                .arg(Arg::new("input").short('i').long("input").value_name("PATH"))
                .arg(Arg::new("output").short('o').long("output").value_name("PATH")),
        )
        .subcommand(ClapCommand::new("config"))
}

#[test]
fn test_help_argument() {
    let cmd = create_test_command();
    let result = cmd.try_get_matches_from(vec!["cornea-tracker", "--help"]);

    // Help should cause an error (but a specific help error)
    assert!(result.is_err());
    let err = result.unwrap_err();
    assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
}

#[test]
fn test_subcommand_required() {
    let cmd = create_test_command();
    let result = cmd.try_get_matches_from(vec!["cornea-tracker"]);
    assert!(result.is_err());
}

#[test]
fn test_capture_arguments() {
    let cmd = create_test_command();
    let matches = cmd
        .try_get_matches_from(vec![
            "cornea-tracker",
            "capture",
            "--cam",
            "1",
            "--session",
            "trial3",
            "--cursor",
            "100,200",
            "--no-preview",
        ])
        .unwrap();

    let (name, capture) = matches.subcommand().unwrap();
    assert_eq!(name, "capture");
    assert_eq!(capture.get_one::<String>("cam").map(String::as_str), Some("1"));
    assert_eq!(capture.get_one::<String>("session").map(String::as_str), Some("trial3"));
    assert_eq!(capture.get_one::<String>("cursor").map(String::as_str), Some("100,200"));
    assert!(capture.get_flag("no-preview"));
}

#[test]
fn test_capture_model_and_iris_options() {
    let cmd = create_test_command();
    let matches = cmd
        .try_get_matches_from(vec![
            "cornea-tracker",
            "capture",
            "--face-model",
            "assets/face_detector.onnx",
            "--model",
            "assets/face_mesh.onnx",
            "--iris-center",
            "cluster",
        ])
        .unwrap();

    let capture = matches.subcommand_matches("capture").unwrap();
    assert_eq!(
        capture.get_one::<String>("face-model").map(String::as_str),
        Some("assets/face_detector.onnx")
    );
    assert_eq!(capture.get_one::<String>("iris-center").map(String::as_str), Some("cluster"));

    let cmd = create_test_command();
    assert!(cmd
        .try_get_matches_from(vec!["cornea-tracker", "capture", "--iris-center", "circle"])
        .is_err());
}

#[test]
fn test_export_requires_session() {
    let cmd = create_test_command();
    assert!(cmd.try_get_matches_from(vec!["cornea-tracker", "export"]).is_err());

    let cmd = create_test_command();
    let matches = cmd
        .try_get_matches_from(vec!["cornea-tracker", "export", "trial3", "-o", "out.npy"])
        .unwrap();
    let export = matches.subcommand_matches("export").unwrap();
    assert_eq!(export.get_one::<String>("session").map(String::as_str), Some("trial3"));
    assert_eq!(export.get_one::<String>("output").map(String::as_str), Some("out.npy"));
}

#[test]
fn test_global_flags_after_subcommand() {
    let cmd = create_test_command();
    let matches = cmd
        .try_get_matches_from(vec!["cornea-tracker", "train", "--debug", "-C", "config.yaml"])
        .unwrap();

    assert!(matches.get_flag("debug"));
    assert_eq!(matches.get_one::<String>("config").map(String::as_str), Some("config.yaml"));
}

#[test]
fn test_unknown_subcommand() {
    let cmd = create_test_command();
    assert!(cmd.try_get_matches_from(vec!["cornea-tracker", "pose"]).is_err());
}

#[test]
fn test_unparsable_config_file_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.yaml");
    std::fs::write(&path, "capture: [not, a, map]").unwrap();

    let output = std::process::Command::new(env!("CARGO_BIN_EXE_cornea-tracker"))
        .arg("-C")
        .arg(&path)
        .arg("config")
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to load config file"));
    assert!(output.stdout.is_empty());
}

#[test]
fn test_valid_config_file_is_accepted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, "capture:\n  camera: 1\n").unwrap();

    let output = std::process::Command::new(env!("CARGO_BIN_EXE_cornea-tracker"))
        .arg("-C")
        .arg(&path)
        .arg("config")
        .output()
        .unwrap();

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("face_detector"));
}
