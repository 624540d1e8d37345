use crate::ai::{Classifier, PlanEntry};
use crate::core::summary_store::SummaryStore;
use crate::error::{AppError, Result};
use crate::utils::security::{relative_to, validate_relative_path};
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Proposed destination for every known file under `root`.
///
/// Entry `src_path`s are absolute; they serialize relative to `root`.
#[derive(Debug, Clone, PartialEq)]
pub struct ReorganizationPlan {
    pub root: PathBuf,
    pub generated_at: DateTime<Utc>,
    pub entries: Vec<PlanEntry>,
}

impl ReorganizationPlan {
    pub fn empty(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            generated_at: Utc::now(),
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry_for(&self, src: &Path) -> Option<&PlanEntry> {
        self.entries.iter().find(|entry| entry.src_path == src)
    }

    /// Entries with `src_path` relative to the root
    pub fn relative_entries(&self) -> Vec<PlanEntry> {
        self.entries
            .iter()
            .map(|entry| PlanEntry {
                src_path: relative_to(&self.root, &entry.src_path)
                    .unwrap_or_else(|| entry.src_path.clone()),
                dst_path: entry.dst_path.clone(),
                summary: entry.summary.clone(),
            })
            .collect()
    }
}

impl Serialize for ReorganizationPlan {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        #[derive(Serialize)]
        struct SerializedPlan<'a> {
            root: &'a Path,
            generated_at: &'a DateTime<Utc>,
            files: Vec<PlanEntry>,
        }

        SerializedPlan {
            root: &self.root,
            generated_at: &self.generated_at,
            files: self.relative_entries(),
        }
        .serialize(serializer)
    }
}

/// Turns a store snapshot into a plan through the classifier
pub struct PlanBuilder {
    classifier: Arc<dyn Classifier>,
    timeout: Duration,
    last_plan: Option<ReorganizationPlan>,
}

impl PlanBuilder {
    pub fn new(classifier: Arc<dyn Classifier>, timeout: Duration) -> Self {
        Self {
            classifier,
            timeout,
            last_plan: None,
        }
    }

    /// Last successfully built plan
    pub fn last_plan(&self) -> Option<&ReorganizationPlan> {
        self.last_plan.as_ref()
    }

    /// Classifies the whole store. On failure the last plan is kept.
    pub async fn build(&mut self, store: &SummaryStore) -> Result<ReorganizationPlan> {
        let snapshot = store.snapshot();
        if snapshot.is_empty() {
            debug!("No summaries for {}, plan is empty", store.root().display());
            let plan = ReorganizationPlan::empty(store.root());
            self.last_plan = Some(plan.clone());
            return Ok(plan);
        }

        let proposed = tokio::time::timeout(self.timeout, self.classifier.classify(&snapshot))
            .await
            .map_err(|_| AppError::Timeout {
                message: format!("Classifier did not answer within {:?}", self.timeout),
            })??;

        let known: BTreeMap<PathBuf, String> = snapshot
            .into_iter()
            .map(|summary| (summary.path, summary.summary))
            .collect();

        let mut entries = Vec::with_capacity(known.len());
        let mut seen = HashSet::new();

        for entry in proposed {
            let src = match validate_relative_path(&entry.src_path) {
                Ok(src) if known.contains_key(&src) => src,
                _ => {
                    warn!(
                        "Classifier returned unknown source {}, ignoring",
                        entry.src_path.display()
                    );
                    continue;
                }
            };

            let dst = match validate_relative_path(&entry.dst_path) {
                Ok(dst) => dst,
                Err(e) => {
                    warn!(
                        "Rejected destination {:?} for {}: {}",
                        entry.dst_path,
                        src.display(),
                        e
                    );
                    continue;
                }
            };

            if !seen.insert(src.clone()) {
                debug!("Duplicate classifier entry for {}, keeping the first", src.display());
                continue;
            }

            entries.push(PlanEntry {
                src_path: store.root().join(&src),
                dst_path: dst,
                summary: known[&src].clone(),
            });
        }

        for (src, summary) in &known {
            if !seen.contains(src) {
                warn!("Classifier omitted {}, leaving it in place", src.display());
                entries.push(PlanEntry {
                    src_path: store.root().join(src),
                    dst_path: src.clone(),
                    summary: summary.clone(),
                });
            }
        }

        entries.sort_by(|a, b| a.src_path.cmp(&b.src_path));

        let plan = ReorganizationPlan {
            root: store.root().to_path_buf(),
            generated_at: Utc::now(),
            entries,
        };
        info!(
            "Built plan with {} entries for {}",
            plan.len(),
            plan.root.display()
        );

        self.last_plan = Some(plan.clone());
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::FileSummary;
    use crate::core::test_support::ScriptedClassifier;

    fn store_with(paths: &[&str]) -> SummaryStore {
        let mut store = SummaryStore::new("/docs");
        for path in paths {
            store.upsert(
                FileSummary {
                    path: Path::new("/docs").join(path),
                    summary: format!("about {}", path),
                },
                None,
            );
        }
        store
    }

    fn entry(src: &str, dst: &str) -> PlanEntry {
        PlanEntry {
            src_path: PathBuf::from(src),
            dst_path: PathBuf::from(dst),
            summary: String::new(),
        }
    }

    #[tokio::test]
    async fn test_builds_plan_from_full_snapshot() {
        let classifier = ScriptedClassifier::into_folder("notes");
        let mut builder = PlanBuilder::new(classifier.clone(), Duration::from_secs(5));
        let store = store_with(&["b.txt", "a.txt"]);

        let plan = builder.build(&store).await.unwrap();

        assert_eq!(plan.len(), 2);
        assert_eq!(plan.entries[0].src_path, PathBuf::from("/docs/a.txt"));
        assert_eq!(plan.entries[0].dst_path, PathBuf::from("notes/a.txt"));
        assert_eq!(plan.entries[0].summary, "about a.txt");
        assert_eq!(classifier.last_call().unwrap().len(), 2);
        assert_eq!(builder.last_plan(), Some(&plan));
    }

    #[tokio::test]
    async fn test_empty_store_skips_classifier() {
        let classifier = ScriptedClassifier::into_folder("notes");
        let mut builder = PlanBuilder::new(classifier.clone(), Duration::from_secs(5));

        let plan = builder.build(&SummaryStore::new("/docs")).await.unwrap();
        assert!(plan.is_empty());
        assert_eq!(classifier.call_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_destinations_are_rejected() {
        let classifier = ScriptedClassifier::into_folder("unused");
        classifier.push_response(Ok(vec![
            entry("a.txt", "../outside/a.txt"),
            entry("b.txt", "/etc/b.txt"),
            entry("c.txt", ""),
            entry("d.txt", "./sorted/d.txt"),
            entry("ghost.txt", "sorted/ghost.txt"),
            entry("d.txt", "again/d.txt"),
        ]));
        let mut builder = PlanBuilder::new(classifier, Duration::from_secs(5));
        let store = store_with(&["a.txt", "b.txt", "c.txt", "d.txt"]);

        let plan = builder.build(&store).await.unwrap();

        assert_eq!(plan.len(), 4);
        let d = plan.entry_for(Path::new("/docs/d.txt")).unwrap();
        assert_eq!(d.dst_path, PathBuf::from("sorted/d.txt"));
        // Rejected proposals fall back to the current location
        let a = plan.entry_for(Path::new("/docs/a.txt")).unwrap();
        assert_eq!(a.dst_path, PathBuf::from("a.txt"));
        assert!(plan.entry_for(Path::new("/docs/ghost.txt")).is_none());
        for entry in &plan.entries {
            assert!(validate_relative_path(&entry.dst_path).is_ok());
        }
    }

    #[tokio::test]
    async fn test_failure_keeps_last_plan() {
        let classifier = ScriptedClassifier::into_folder("notes");
        let mut builder = PlanBuilder::new(classifier.clone(), Duration::from_secs(5));
        let store = store_with(&["a.txt"]);

        let first = builder.build(&store).await.unwrap();
        classifier.push_failure();
        let err = builder.build(&store).await.unwrap_err();

        assert_eq!(err.error_type(), "AI_ERROR");
        assert_eq!(builder.last_plan(), Some(&first));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_classifier_times_out() {
        let classifier = Arc::new(ScriptedClassifier::with_delay(
            "notes",
            Some(Duration::from_secs(120)),
        ));
        let mut builder = PlanBuilder::new(classifier, Duration::from_secs(60));

        let err = builder.build(&store_with(&["a.txt"])).await.unwrap_err();
        assert!(matches!(err, AppError::Timeout { .. }));
        assert!(builder.last_plan().is_none());
    }

    #[test]
    fn test_plan_serializes_relative_sources() {
        let plan = ReorganizationPlan {
            root: PathBuf::from("/docs"),
            generated_at: Utc::now(),
            entries: vec![PlanEntry {
                src_path: PathBuf::from("/docs/inbox/a.txt"),
                dst_path: PathBuf::from("notes/a.txt"),
                summary: "a".to_string(),
            }],
        };

        let value = serde_json::to_value(&plan).unwrap();
        assert_eq!(value["files"][0]["src_path"], "inbox/a.txt");
        assert_eq!(value["files"][0]["dst_path"], "notes/a.txt");
        assert_eq!(value["root"], "/docs");
    }
}
