use crate::commands::{commit, compute_plan, health, start_watch};
use crate::config::Config;
use crate::core::test_support::{CountingSummarizer, ScriptedClassifier};
use crate::core::CommitRequest;
use crate::error::AppError;
use crate::services::PlanUpdate;
use crate::state::AppState;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn fake_state(summarizer: Arc<CountingSummarizer>, classifier: Arc<ScriptedClassifier>) -> AppState {
    let config = Config {
        debounce_ms: 100,
        ..Config::default()
    };
    AppState::with_collaborators(config, summarizer, classifier)
}

fn tree_with(files: &[(&str, &str)]) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    for (name, content) in files {
        let path = root.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }
    (dir, root)
}

#[tokio::test]
async fn test_compute_plan_summarizes_every_visible_file() {
    let (_dir, root) = tree_with(&[
        ("a.txt", "alpha"),
        ("deep/b.txt", "beta"),
        (".hidden/c.txt", "gamma"),
    ]);
    let summarizer = CountingSummarizer::new();
    let classifier = ScriptedClassifier::into_folder("notes");
    let state = fake_state(summarizer.clone(), classifier.clone());

    let plan = compute_plan(&state, &root).await.unwrap();

    assert_eq!(plan.root, root);
    assert_eq!(plan.len(), 2);
    assert_eq!(plan.entry_for(&root.join("a.txt")).unwrap().summary, "alpha");
    assert_eq!(
        plan.entry_for(&root.join("deep/b.txt")).unwrap().dst_path,
        Path::new("notes/b.txt")
    );
    assert_eq!(summarizer.total_calls(), 2);
    assert_eq!(classifier.call_count(), 1);
}

#[tokio::test]
async fn test_compute_plan_skips_files_that_fail_to_summarize() {
    let (_dir, root) = tree_with(&[("a.txt", "alpha"), ("b.txt", "beta")]);
    let summarizer = CountingSummarizer::new();
    summarizer.fail_on(&root.join("b.txt"));
    let state = fake_state(summarizer, ScriptedClassifier::into_folder("notes"));

    let plan = compute_plan(&state, &root).await.unwrap();

    assert_eq!(plan.len(), 1);
    assert!(plan.entry_for(&root.join("b.txt")).is_none());
}

#[tokio::test]
async fn test_compute_plan_on_empty_directory_skips_classifier() {
    let (_dir, root) = tree_with(&[]);
    let classifier = ScriptedClassifier::into_folder("notes");
    let state = fake_state(CountingSummarizer::new(), classifier.clone());

    let plan = compute_plan(&state, &root).await.unwrap();

    assert!(plan.is_empty());
    assert_eq!(classifier.call_count(), 0);
}

#[tokio::test]
async fn test_compute_plan_rejects_bad_roots() {
    let (_dir, root) = tree_with(&[("a.txt", "alpha")]);
    let state = fake_state(CountingSummarizer::new(), ScriptedClassifier::into_folder("notes"));

    let missing = compute_plan(&state, &root.join("missing")).await;
    assert!(matches!(missing, Err(AppError::FileNotFound { .. })));

    let file = compute_plan(&state, &root.join("a.txt")).await;
    assert!(matches!(file, Err(AppError::InvalidPath { .. })));
}

#[tokio::test]
async fn test_compute_plan_surfaces_classifier_failure() {
    let (_dir, root) = tree_with(&[("a.txt", "alpha")]);
    let classifier = ScriptedClassifier::into_folder("notes");
    classifier.push_failure();
    let state = fake_state(CountingSummarizer::new(), classifier);

    let result = compute_plan(&state, &root).await;
    assert!(matches!(result, Err(AppError::AiError { .. })));
}

#[tokio::test]
async fn test_commit_moves_file_under_base() {
    let (_dir, root) = tree_with(&[("a.txt", "alpha")]);
    let state = fake_state(CountingSummarizer::new(), ScriptedClassifier::into_folder("notes"));

    let outcome = commit(
        &state,
        CommitRequest {
            base_path: root.clone(),
            src_path: PathBuf::from("a.txt"),
            dst_path: PathBuf::from("notes/a.txt"),
        },
    )
    .await
    .unwrap();

    assert_eq!(outcome.destination, root.join("notes/a.txt"));
    assert!(!root.join("a.txt").exists());
    assert_eq!(std::fs::read_to_string(root.join("notes/a.txt")).unwrap(), "alpha");
}

#[tokio::test]
async fn test_health_reports_custom_collaborators() {
    let state = fake_state(CountingSummarizer::new(), ScriptedClassifier::into_folder("notes"));

    let status = health(&state).await;
    assert_eq!(status.provider, "custom");
    assert!(status.ai_available);
    assert!(status.ollama_host.is_none());
}

#[tokio::test]
async fn test_health_reports_fallback_provider() {
    let config = Config {
        ai_provider: "fallback".to_string(),
        ..Config::default()
    };
    let state = AppState::new(config).await.unwrap();

    let status = health(&state).await;
    assert_eq!(status.provider, "fallback");
    assert_eq!(status.status, "ok");
    assert_eq!(status.model.as_deref(), Some("fallback"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_watch_publishes_refreshed_plan_after_edit() {
    let (_dir, root) = tree_with(&[("a.txt", "alpha"), ("b.txt", "beta")]);
    let summarizer = CountingSummarizer::new();
    let classifier = ScriptedClassifier::into_folder("notes");
    let state = fake_state(summarizer, classifier.clone());

    let mut handle = start_watch(&state, &root).await.unwrap();
    assert_eq!(handle.context().root, root);

    let first = tokio::time::timeout(Duration::from_secs(10), handle.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.plan().unwrap().len(), 2);

    std::fs::write(root.join("a.txt"), "alpha, rewritten at length").unwrap();

    let refreshed = tokio::time::timeout(Duration::from_secs(10), async {
        while let Some(update) = handle.recv().await {
            if let PlanUpdate::Plan { plan, .. } = update {
                let summary = plan.entry_for(&root.join("a.txt")).map(|e| e.summary.clone());
                if summary.as_deref() == Some("alpha, rewritten at length") {
                    return Some(plan);
                }
            }
        }
        None
    })
    .await
    .unwrap()
    .expect("session ended before the edit was seen");

    assert_eq!(refreshed.len(), 2);
    assert!(refreshed
        .entries
        .iter()
        .all(|entry| entry.dst_path.starts_with("notes")));
    assert_eq!(classifier.last_call().unwrap().len(), 2);

    handle.stop().await;
}

#[tokio::test]
async fn test_start_watch_rejects_missing_root() {
    let (_dir, root) = tree_with(&[]);
    let state = fake_state(CountingSummarizer::new(), ScriptedClassifier::into_folder("notes"));

    let result = start_watch(&state, &root.join("missing")).await;
    assert!(matches!(result, Err(AppError::FileNotFound { .. })));
}
