use clap::Parser;
use plenodoc_cli::{Cli, execute};

fn cli(root: &std::path::Path, args: &[&str]) -> Cli {
    let docs = root.join("docs");
    let index = root.join("index");
    let mut argv = vec![
        "plenodoc".to_string(),
        "--docs-dir".to_string(),
        docs.display().to_string(),
        "--index-dir".to_string(),
        index.display().to_string(),
    ];
    argv.extend(args.iter().map(|arg| arg.to_string()));
    Cli::try_parse_from(argv).unwrap()
}

#[tokio::test]
async fn upload_then_remove_round_trip() {
    let root = tempfile::tempdir().unwrap();
    let file = root.path().join("notes.txt");
    std::fs::write(&file, "The sky is blue. The grass is green.").unwrap();

    execute(cli(root.path(), &["upload", file.to_str().unwrap()])).await.unwrap();
    assert!(root.path().join("docs").join("notes.txt").exists());
    assert!(root.path().join("index").join("index.json").exists());

    execute(cli(root.path(), &["list"])).await.unwrap();
    execute(cli(root.path(), &["status", "--json"])).await.unwrap();

    execute(cli(root.path(), &["remove", "notes.txt"])).await.unwrap();
    assert!(!root.path().join("docs").join("notes.txt").exists());
    assert!(!root.path().join("index").join("index.json").exists());
}

#[tokio::test]
async fn removing_unknown_document_fails() {
    let root = tempfile::tempdir().unwrap();
    let err = execute(cli(root.path(), &["remove", "missing.txt"])).await.unwrap_err();
    assert!(err.to_string().contains("missing.txt"));
}

#[tokio::test]
async fn rebuild_of_empty_knowledge_base_succeeds() {
    let root = tempfile::tempdir().unwrap();
    execute(cli(root.path(), &["rebuild"])).await.unwrap();
    execute(cli(root.path(), &["status"])).await.unwrap();
}
