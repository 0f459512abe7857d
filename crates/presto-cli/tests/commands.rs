// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Command-level smoke tests.

use presto_cli::commands;
use tempfile::TempDir;

fn write(root: &std::path::Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

#[tokio::test]
async fn build_then_clean_roundtrip() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(root, "lib/a.js", "exports.a = 1;");
    write(root, "client/site.css", "body {}");

    let dir_str = root.to_str().unwrap();
    commands::build::run(dir_str, false, true).await.unwrap();

    let build = root.join(".presto");
    assert!(build.join("client.js").is_file());
    assert!(build.join("client.css").is_file());
    assert!(build.join("server.js").is_file());

    commands::clean::run(dir_str, false).await.unwrap();
    assert!(build.is_dir());
    assert!(!build.join("client.js").exists());

    commands::clean::run(dir_str, true).await.unwrap();
    assert!(!build.exists());
}

#[tokio::test]
async fn pack_writes_a_tarball() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(
        root,
        "package.json",
        r#"{ "name": "smoke", "version": "0.1.0" }"#,
    );
    write(root, "main.js", "exports.m = 1;");
    let out = TempDir::new().unwrap();

    commands::pack::run(
        root.to_str().unwrap(),
        Some(out.path().to_str().unwrap()),
        true,
    )
    .await
    .unwrap();

    assert!(out.path().join("smoke-0-1-0.tar.gz").is_file());
}
