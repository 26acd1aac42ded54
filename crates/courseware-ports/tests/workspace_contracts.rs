//! Contract tests for WorkspaceClient.
//!
//! The same checks run against the in-memory fake and the local filesystem
//! workspace so both behave identically for the publisher.

use courseware_ports::fakes::MemoryWorkspace;
use courseware_ports::{FsWorkspace, NotebookArchive, PortError, WorkspaceClient};

async fn check_write_read_exists(ws: &dyn WorkspaceClient) {
    assert!(!ws.exists("/Repos/Temp/course").await.unwrap());
    ws.write("/Repos/Temp/course/Version Info", "v1").await.unwrap();

    assert!(ws.exists("/Repos/Temp/course").await.unwrap());
    assert_eq!(
        ws.read("/Repos/Temp/course/Version Info").await.unwrap().as_deref(),
        Some("v1")
    );

    ws.write("/Repos/Temp/course/Version Info", "v2").await.unwrap();
    assert_eq!(
        ws.read("/Repos/Temp/course/Version Info").await.unwrap().as_deref(),
        Some("v2")
    );
}

async fn check_clear_then_export(ws: &dyn WorkspaceClient) {
    ws.write("/t/LICENSE", "license").await.unwrap();
    ws.write("/t/Old Lesson", "old").await.unwrap();
    ws.write("/t/Labs/Old Lab", "old").await.unwrap();

    ws.clear("/t", &[".gitignore", "README.md", "LICENSE", "docs"])
        .await
        .unwrap();
    ws.write("/t/New Lesson", "new").await.unwrap();

    let archive = NotebookArchive::from_bytes(&ws.export_archive("/t").await.unwrap()).unwrap();
    let names: Vec<&str> = archive.entries.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["LICENSE", "New Lesson"]);
}

async fn check_clear_keeps_repo_metadata(ws: &dyn WorkspaceClient) {
    ws.write("/Repos/Temp/ec/.git/HEAD", "ref: refs/heads/published").await.unwrap();
    ws.write("/Repos/Temp/ec/Lesson", "old").await.unwrap();

    ws.clear("/Repos/Temp/ec", &["docs"]).await.unwrap();

    assert!(ws.exists("/Repos/Temp/ec/.git/HEAD").await.unwrap());
    assert!(!ws.exists("/Repos/Temp/ec/Lesson").await.unwrap());

    ws.write("/Repos/Temp/ec/Lesson", "new").await.unwrap();
    let archive =
        NotebookArchive::from_bytes(&ws.export_archive("/Repos/Temp/ec").await.unwrap()).unwrap();
    let names: Vec<&str> = archive.entries.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["Lesson"]);
}

async fn check_put_file_overwrite(ws: &dyn WorkspaceClient) {
    let target = "dbfs:/distributions/course/v1.0.0/course-v1.0.0-notebooks.dbc";
    ws.put_file(target, b"first", false).await.unwrap();

    let err = ws.put_file(target, b"second", false).await.unwrap_err();
    assert!(matches!(err, PortError::AlreadyExists { .. }));

    ws.put_file(target, b"third", true).await.unwrap();
}

async fn check_copy_tree_missing_source(ws: &dyn WorkspaceClient) {
    let err = ws.copy_tree("/nowhere/docs", "/t/docs/v1").await.unwrap_err();
    assert!(matches!(err, PortError::NotFound { .. }));
}

#[tokio::test]
async fn memory_workspace_contract() {
    let ws = MemoryWorkspace::new();
    check_write_read_exists(&ws).await;
    check_clear_then_export(&ws).await;
    check_clear_keeps_repo_metadata(&ws).await;
    check_put_file_overwrite(&ws).await;
    check_copy_tree_missing_source(&ws).await;
}

#[tokio::test]
async fn fs_workspace_contract() {
    let dir = tempfile::tempdir().unwrap();
    let ws = FsWorkspace::new(dir.path()).unwrap();
    check_write_read_exists(&ws).await;
    check_clear_then_export(&ws).await;
    check_clear_keeps_repo_metadata(&ws).await;
    check_put_file_overwrite(&ws).await;
    check_copy_tree_missing_source(&ws).await;
}

#[tokio::test]
async fn fs_workspace_exports_binary_docs() {
    let dir = tempfile::tempdir().unwrap();
    let ws = FsWorkspace::new(dir.path()).unwrap();
    let png = [0x89, 0x50, 0x4e, 0x47, 0xff, 0xfe, 0x00];
    ws.put_file("/t/docs/v1/slide.png", &png, false).await.unwrap();
    ws.write("/t/Lesson", "# Databricks notebook source").await.unwrap();

    let archive = NotebookArchive::from_bytes(&ws.export_archive("/t").await.unwrap()).unwrap();
    assert_eq!(archive.binary_file("docs/v1/slide.png"), Some(png.to_vec()));
    assert_eq!(
        archive.entries.get("Lesson").map(String::as_str),
        Some("# Databricks notebook source")
    );
}
