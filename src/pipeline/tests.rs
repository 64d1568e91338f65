use super::*;

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use serial_test::serial;
use std::path::Path;
use tempfile::TempDir;

use crate::config::Provider;

/// Write a minimal single-font PDF with one text run per page
fn write_pdf(path: &Path, page_texts: &[&str]) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in page_texts {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![50.into(), 750.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("content encodes"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        });
        kids.push(page_id.into());
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_texts.len() as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();
    doc.save(path).expect("save pdf");
}

fn config_in(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.storage.persist_dir = dir.path().join("store");
    config
}

#[tokio::test]
async fn invalid_config_is_rejected_before_loading() {
    let dir = TempDir::new().expect("tempdir");
    let mut config = config_in(&dir);
    config.retrieval.top_k = 0;

    // Deliberately pass a path that does not exist: validation must win.
    let missing = dir.path().join("never.pdf");
    let err = RagPipeline::initialize(&config, &[missing], false)
        .await
        .expect_err("zero top_k should be rejected");
    assert!(matches!(err, PdfChatError::Config(_)), "got {err}");
}

#[tokio::test]
async fn missing_input_path_fails_with_not_found() {
    let dir = TempDir::new().expect("tempdir");
    let config = config_in(&dir);
    let missing = dir.path().join("nope.pdf");

    let err = RagPipeline::initialize(&config, &[missing.clone()], false)
        .await
        .expect_err("missing input should fail");
    match err {
        PdfChatError::NotFound(path) => assert_eq!(path, missing),
        other => panic!("expected NotFound, got {other}"),
    }
}

#[tokio::test]
async fn whitespace_only_corpus_is_empty() {
    let dir = TempDir::new().expect("tempdir");
    let config = config_in(&dir);
    let path = dir.path().join("blank.pdf");
    write_pdf(&path, &["   ", "\t  "]);

    let err = RagPipeline::initialize(&config, &[path], false)
        .await
        .expect_err("blank corpus should fail");
    assert!(matches!(err, PdfChatError::EmptyCorpus), "got {err}");
}

#[tokio::test]
#[serial(openai_key)]
async fn missing_api_key_fails_before_indexing() {
    // SAFETY: tests touching OPENAI_API_KEY are serialized
    unsafe { std::env::remove_var("OPENAI_API_KEY") };

    let dir = TempDir::new().expect("tempdir");
    let mut config = config_in(&dir);
    config.llm.provider = Provider::OpenAi;
    config.llm.model = "gpt-4o-mini".to_string();

    let path = dir.path().join("people.pdf");
    write_pdf(&path, &["Alice is 30 years old."]);

    let err = RagPipeline::initialize(&config, &[path], false)
        .await
        .expect_err("missing key should fail");
    match err {
        PdfChatError::Config(message) => assert!(
            message.contains("OPENAI_API_KEY"),
            "message should name the variable: {message}"
        ),
        other => panic!("expected Config, got {other}"),
    }
    // The key failure must come before any index build touches disk.
    assert!(!config.storage.persist_dir.exists());
}
