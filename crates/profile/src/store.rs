//! Durable profile storage.
//!
//! The profile lives in memory as an immutable snapshot and on disk as one
//! flat JSON object. Readers clone the current `Arc` and never wait on a
//! merge; writers serialize their read-modify-write cycles through a single
//! writer lock, so concurrent merges never interleave.

use crate::reconcile::{MergeReport, Reconciler};
use quill_core::error::ProfileError;
use quill_core::profile::{FactSet, FieldValue, Profile, pointer_location};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// The result of one merge.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub profile: Arc<Profile>,
    pub report: MergeReport,
}

pub struct ProfileStore {
    path: PathBuf,
    snapshot: RwLock<Arc<Profile>>,
    writer: Mutex<()>,
}

impl ProfileStore {
    /// Open the profile at `path`. A missing file is an empty profile.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ProfileError> {
        let path = path.into();
        let profile = load(&path)?;
        debug!(path = %path.display(), fields = profile.len(), "Profile store opened");
        Ok(Self {
            path,
            snapshot: RwLock::new(Arc::new(profile)),
            writer: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The most recently committed profile.
    pub async fn snapshot(&self) -> Arc<Profile> {
        self.snapshot.read().await.clone()
    }

    /// Reconcile `candidates` into the profile and persist the result.
    ///
    /// The whole read-reconcile-write cycle runs under the writer lock.
    pub async fn merge(
        &self,
        reconciler: &Reconciler,
        candidates: &FactSet,
    ) -> Result<MergeOutcome, ProfileError> {
        let _guard = self.writer.lock().await;
        let current = self.snapshot().await;

        if candidates.is_empty() {
            return Ok(MergeOutcome {
                profile: current,
                report: MergeReport::default(),
            });
        }

        let (merged, report) = reconciler.reconcile(&current, candidates).await;
        if merged == *current {
            debug!(path = %self.path.display(), "Merge changed nothing, skipping write");
            return Ok(MergeOutcome {
                profile: current,
                report,
            });
        }
        let merged = self.commit(merged).await?;
        info!(
            path = %self.path.display(),
            fields = merged.len(),
            merged = report.decisions.len(),
            "Profile updated"
        );
        Ok(MergeOutcome {
            profile: merged,
            report,
        })
    }

    /// Record a pointer entry for a semantic index collection.
    ///
    /// The entry is keyed by the collection id unless an ordinary fact already
    /// owns that key, in which case `<collection>_db` is used. Returns the key.
    pub async fn register_pointer(&self, collection: &str) -> Result<String, ProfileError> {
        let _guard = self.writer.lock().await;
        let current = self.snapshot().await;
        let location = pointer_location(collection);

        let mut key = collection.to_string();
        while current.get(&key).is_some_and(|v| !v.is_pointer()) {
            key.push_str("_db");
        }
        if current.get(&key).is_some_and(|v| v.to_string() == location) {
            return Ok(key);
        }

        let mut updated = (*current).clone();
        updated.insert(key.clone(), FieldValue::from(location));
        self.commit(updated).await?;
        info!(collection, key = %key, "Registered index pointer");
        Ok(key)
    }

    /// Persist `profile` and make it the visible snapshot.
    async fn commit(&self, profile: Profile) -> Result<Arc<Profile>, ProfileError> {
        save(&self.path, &profile)?;
        let profile = Arc::new(profile);
        *self.snapshot.write().await = profile.clone();
        Ok(profile)
    }
}

fn load(path: &Path) -> Result<Profile, ProfileError> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Profile::new()),
        Err(e) => {
            return Err(ProfileError::Read {
                path: path.to_path_buf(),
                reason: e.to_string(),
            });
        }
    };

    if content.trim().is_empty() {
        return Ok(Profile::new());
    }

    let value: serde_json::Value =
        serde_json::from_str(&content).map_err(|_| ProfileError::Corrupt(path.to_path_buf()))?;
    let serde_json::Value::Object(map) = value else {
        return Err(ProfileError::Corrupt(path.to_path_buf()));
    };

    // Older files may hold nested values; the store is always flat.
    Ok(quill_ingest::flatten(&map).into_iter().collect())
}

/// Write to a sibling temp file, then rename over the target.
fn save(path: &Path, profile: &Profile) -> Result<(), ProfileError> {
    let write_err = |e: std::io::Error| ProfileError::Write {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }

    let json = serde_json::to_string_pretty(profile).map_err(|e| ProfileError::Write {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).map_err(write_err)?;
    std::fs::rename(&tmp, path).map_err(write_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn facts(pairs: &[(&str, &str)]) -> FactSet {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), FieldValue::from(*v)))
            .collect()
    }

    #[tokio::test]
    async fn missing_file_is_empty_profile() {
        let dir = TempDir::new().unwrap();
        let store = ProfileStore::open(dir.path().join("uploads/user_info.json")).unwrap();
        assert!(store.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn merge_persists_and_reloads() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("uploads/user_info.json");
        let store = ProfileStore::open(&path).unwrap();

        let outcome = store
            .merge(
                &Reconciler::deterministic(),
                &facts(&[("fullName", "Jane Doe"), ("mobile", "555-0100")]),
            )
            .await
            .unwrap();
        assert_eq!(outcome.profile.len(), 2);

        let reopened = ProfileStore::open(&path).unwrap();
        assert_eq!(*reopened.snapshot().await, *outcome.profile);

        let on_disk: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk["fullName"], "Jane Doe");
    }

    #[tokio::test]
    async fn empty_candidates_do_not_touch_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("user_info.json");
        let store = ProfileStore::open(&path).unwrap();
        store
            .merge(&Reconciler::deterministic(), &FactSet::new())
            .await
            .unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn unchanged_merge_does_not_rewrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("user_info.json");
        std::fs::write(&path, r#"{"fullName": "Jane Doe"}"#).unwrap();
        let store = ProfileStore::open(&path).unwrap();

        let outcome = store
            .merge(&Reconciler::deterministic(), &facts(&[("full_name", "Jane Doe")]))
            .await
            .unwrap();
        assert_eq!(outcome.report.target_of("full_name"), Some("fullName"));
        // Still the hand-written file, not the pretty-printed one
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            r#"{"fullName": "Jane Doe"}"#
        );
    }

    #[tokio::test]
    async fn non_object_file_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("user_info.json");
        std::fs::write(&path, "[1, 2, 3]").unwrap();
        assert!(matches!(
            ProfileStore::open(&path),
            Err(ProfileError::Corrupt(_))
        ));
    }

    #[tokio::test]
    async fn nested_file_is_flattened_on_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("user_info.json");
        std::fs::write(&path, r#"{"address": {"city": "Austin"}, "age": 41}"#).unwrap();
        let store = ProfileStore::open(&path).unwrap();
        let profile = store.snapshot().await;
        assert_eq!(profile.get("address_city"), Some(&FieldValue::from("Austin")));
        assert_eq!(profile.get("age"), Some(&FieldValue::from(41_i64)));
    }

    #[tokio::test]
    async fn pointer_registration() {
        let dir = TempDir::new().unwrap();
        let store = ProfileStore::open(dir.path().join("user_info.json")).unwrap();

        let key = store.register_pointer("w2_2023").await.unwrap();
        assert_eq!(key, "w2_2023");
        assert!(store.snapshot().await.is_pointer_field("w2_2023"));

        // Registering again is a no-op
        assert_eq!(store.register_pointer("w2_2023").await.unwrap(), "w2_2023");
        assert_eq!(store.snapshot().await.len(), 1);
    }

    #[tokio::test]
    async fn pointer_does_not_clobber_fact() {
        let dir = TempDir::new().unwrap();
        let store = ProfileStore::open(dir.path().join("user_info.json")).unwrap();
        store
            .merge(&Reconciler::deterministic(), &facts(&[("resume", "see attached")]))
            .await
            .unwrap();

        let key = store.register_pointer("resume").await.unwrap();
        assert_eq!(key, "resume_db");
        let profile = store.snapshot().await;
        assert_eq!(profile.get("resume"), Some(&FieldValue::from("see attached")));
        assert_eq!(
            profile.get("resume_db"),
            Some(&FieldValue::from("vector_db/resume"))
        );
    }

    #[tokio::test]
    async fn concurrent_merges_do_not_lose_fields() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(ProfileStore::open(dir.path().join("user_info.json")).unwrap());
        let reconciler = Arc::new(Reconciler::deterministic());

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = store.clone();
                let reconciler = reconciler.clone();
                tokio::spawn(async move {
                    let key = format!("field{i}");
                    store
                        .merge(&reconciler, &facts(&[(key.as_str(), "x")]))
                        .await
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.snapshot().await.len(), 16);
    }
}
