use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

mod common;

/// Config isolating the run from the user's plugins and ranking data.
fn write_config(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("config.toml");
    let data_dir = dir.join("data");
    fs::write(
        &path,
        format!(
            "[launcher]\nplugin_directories = []\n\n[storage]\ndata_dir = {:?}\n",
            data_dir.display().to_string()
        ),
    )
    .unwrap();
    path
}

fn rflaunch(config: &Path) -> Command {
    let mut cmd = Command::cargo_bin("rflaunch").unwrap();
    cmd.arg("--config").arg(config);
    cmd
}

#[test]
fn help_lists_subcommands() {
    Command::cargo_bin("rflaunch")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("query"))
        .stdout(predicate::str::contains("plugins"))
        .stdout(predicate::str::contains("repl"));
}

#[test]
fn blank_query_reports_empty() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;
    let config = write_config(temp.path());

    rflaunch(&config)
        .args(["query", "   "])
        .assert()
        .success()
        .stdout(predicate::str::contains("Empty query"));
    Ok(())
}

#[test]
fn invalid_config_fails() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;
    let config = temp.path().join("bad.toml");
    fs::write(&config, "[launcher]\nmax_results = 0\n")?;

    rflaunch(&config)
        .args(["plugins"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("max_results"));
    Ok(())
}

#[cfg(unix)]
#[test]
fn lists_and_queries_process_plugin() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;
    let config = write_config(temp.path());
    let plugins = temp.path().join("plugins");
    common::write_plugin(
        &plugins,
        "stub",
        r#"{"id":"stub","name":"Stub","language":"executable","executeFileName":"run.sh","icoPath":"icon.png"}"#,
        Some((
            "run.sh",
            "#!/bin/sh\nprintf '%s' '{\"result\":[{\"Title\":\"T\",\"SubTitle\":\"S\",\"Score\":7}]}'\n",
        )),
    );

    rflaunch(&config)
        .arg("--plugin-dir")
        .arg(&plugins)
        .args(["plugins", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"id\": \"stub\""))
        .stdout(predicate::str::contains("\"language\": \"executable\""));

    rflaunch(&config)
        .arg("--plugin-dir")
        .arg(&plugins)
        .args(["query", "--json", "anything"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"title\": \"T\""))
        .stdout(predicate::str::contains("\"plugin_id\": \"stub\""));
    Ok(())
}

#[cfg(unix)]
#[test]
fn running_a_result_records_the_selection() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;
    let config = write_config(temp.path());
    let plugins = temp.path().join("plugins");
    common::write_plugin(
        &plugins,
        "msg",
        r#"{"id":"msg","language":"executable","executeFileName":"run.sh","actionKeyword":"m"}"#,
        Some((
            "run.sh",
            "#!/bin/sh\nprintf '%s' '{\"result\":[{\"Title\":\"Say\",\"JsonRPCAction\":{\"method\":\"Wox.ShowMsg\",\"parameters\":[\"hello from plugin\"]}}]}'\n",
        )),
    );

    rflaunch(&config)
        .arg("--plugin-dir")
        .arg(&plugins)
        .args(["query", "m", "x", "--run", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("hello from plugin"));

    let selections = fs::read_to_string(temp.path().join("data").join("selections.json"))?;
    assert!(selections.contains("\"Say\""));
    Ok(())
}

#[test]
fn repl_quits_on_command() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;
    let config = write_config(temp.path());

    rflaunch(&config)
        .arg("repl")
        .write_stdin(":help\n:quit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains(":pin N"));
    Ok(())
}
