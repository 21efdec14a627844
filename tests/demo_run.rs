//! Integration tests for the `demo run` command.
use bern::cli::RunOpts;
use bern::cli::demo::handle_demo_run_command;
use bern::settings::Settings;
use tempfile::tempdir;

/// An integration test for the `demo run` command.
#[test]
fn test_handle_demo_run_command() {
    unsafe { std::env::set_var("BERN_LOG_LEVEL", "off") };

    let tempdir = tempdir().unwrap();
    let opts = RunOpts {
        output_dir: Some(tempdir.path().to_path_buf()),
        overwrite: false,
    };
    handle_demo_run_command("simple", &opts, Some(Settings::default())).unwrap();
    assert!(tempdir.path().join("trajectories.csv").is_file());
}
