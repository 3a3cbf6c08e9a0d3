use std::path::{Path, PathBuf};
use std::time::Duration;

use rustc_hash::FxHashMap;
use slotmap::{SlotMap, new_key_type};
use web_time::Instant;

use crate::constants::{NO_ELEMENTS_MESSAGE, NO_ELEMENTS_TITLE};
use crate::graphics::mesh::DisplayMesh;
use crate::host::Notifier;
use crate::model::{builder::MeshBuilder, document::ModelDocument};
use crate::resources::normalize_path;

new_key_type! {
    /// For referencing built meshes in the cache.
    pub struct CachedMeshId;
}

/// A mesh built from one source file.
pub struct CachedMesh {
    pub source: PathBuf,
    pub mesh: DisplayMesh,
    pub built_at: Instant,
}

/// What a build needs from the host.
pub struct BuildContext<'a> {
    /// The host project's save file, for relative texture paths.
    pub save_path: Option<&'a Path>,
    pub notifier: &'a dyn Notifier,
}

/// Built meshes, at most one per normalized source path.
///
/// Entries are never edited in place; a rebuild drops the old slot and inserts a new one.
/// Everything handed out is a deep clone.
#[derive(Default)]
pub struct ModelCache {
    meshes: SlotMap<CachedMeshId, CachedMesh>,
    by_path: FxHashMap<PathBuf, CachedMeshId>,
    builds: usize,
}

impl ModelCache {
    /// Initialize an empty cache.
    pub fn new() -> Self {
        Self {
            meshes: SlotMap::with_key(),
            by_path: FxHashMap::default(),
            builds: 0,
        }
    }

    /// Get a clone of the mesh built from `path`.
    pub fn get(&self, path: &Path) -> Option<DisplayMesh> {
        let id = self.by_path.get(&normalize_path(path))?;
        let cached = self.meshes.get(*id)?;
        log::debug!(
            "cache hit for {}, built {:?} ago",
            cached.source.display(),
            cached.built_at.elapsed()
        );
        Some(cached.mesh.clone())
    }

    /// Build the document, replace whatever was cached for `path` and return a clone.
    ///
    /// If the document has nothing to display, the old entry is dropped too and the user is told.
    pub fn build(
        &mut self,
        path: &Path,
        document: &ModelDocument,
        ctx: &BuildContext,
    ) -> Option<DisplayMesh> {
        let source = normalize_path(path);
        self.remove_entry(&source);
        self.builds += 1;

        let name = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let Some(mesh) = MeshBuilder::new(ctx.save_path).build(&name, document) else {
            log::warn!("{} has no supported elements", source.display());
            ctx.notifier
                .show_warning(NO_ELEMENTS_TITLE, NO_ELEMENTS_MESSAGE);
            return None;
        };

        let clone = mesh.clone();
        let id = self.meshes.insert(CachedMesh {
            source: source.clone(),
            mesh,
            built_at: Instant::now(),
        });
        self.by_path.insert(source, id);
        Some(clone)
    }

    /// Get the cached mesh, building it if there is none.
    pub fn build_or_get(
        &mut self,
        path: &Path,
        document: &ModelDocument,
        ctx: &BuildContext,
    ) -> Option<DisplayMesh> {
        self.get(path).or_else(|| self.build(path, document, ctx))
    }

    /// Drop the entry for `path`. Returns whether there was one.
    pub fn invalidate(&mut self, path: &Path) -> bool {
        let removed = self.remove_entry(&normalize_path(path));
        if removed {
            log::debug!("invalidated {}", path.display());
        }
        removed
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.by_path.contains_key(&normalize_path(path))
    }

    /// How long ago the mesh for `path` was built.
    pub fn age(&self, path: &Path) -> Option<Duration> {
        let id = self.by_path.get(&normalize_path(path))?;
        Some(self.meshes.get(*id)?.built_at.elapsed())
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    /// How many builds ran since the cache was created.
    pub fn build_count(&self) -> usize {
        self.builds
    }

    fn remove_entry(&mut self, source: &Path) -> bool {
        match self.by_path.remove(source) {
            Some(id) => self.meshes.remove(id).is_some(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    #[derive(Default)]
    struct Recorder(RefCell<Vec<String>>);

    impl Notifier for Recorder {
        fn show_warning(&self, title: &str, _message: &str) {
            self.0.borrow_mut().push(title.to_string());
        }
    }

    fn cube_doc() -> ModelDocument {
        ModelDocument::from_json(r#"{"textures":[],"elements":[{"type":"cube","faces":{}}],"meta":{}}"#)
            .unwrap()
    }

    #[test]
    fn hits_return_equal_but_separate_clones() {
        let notifier = Recorder::default();
        let ctx = BuildContext {
            save_path: None,
            notifier: &notifier,
        };
        let mut cache = ModelCache::new();
        let built = cache.build_or_get(Path::new("a.model"), &cube_doc(), &ctx).unwrap();
        let a = cache.get(Path::new("a.model")).unwrap();
        let b = cache.get(Path::new("./a.model")).unwrap();
        assert_eq!(a, b);
        assert_eq!(built, a);
        assert!(!a.shares_storage_with(&b));
        assert!(!built.shares_storage_with(&a));
        assert_eq!(cache.build_count(), 1);
    }

    #[test]
    fn build_or_get_only_builds_on_miss() {
        let notifier = Recorder::default();
        let ctx = BuildContext {
            save_path: None,
            notifier: &notifier,
        };
        let mut cache = ModelCache::new();
        cache.build_or_get(Path::new("a.model"), &cube_doc(), &ctx);
        let first_age = cache.age(Path::new("a.model")).unwrap();
        cache.build_or_get(Path::new("a.model"), &cube_doc(), &ctx);
        assert_eq!(cache.build_count(), 1);
        assert!(cache.age(Path::new("a.model")).unwrap() >= first_age);
        assert!(cache.invalidate(Path::new("a.model")));
        assert!(!cache.invalidate(Path::new("a.model")));
        assert!(cache.age(Path::new("a.model")).is_none());
        cache.build_or_get(Path::new("a.model"), &cube_doc(), &ctx);
        assert_eq!(cache.build_count(), 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn empty_rebuild_drops_the_old_entry() {
        let notifier = Recorder::default();
        let ctx = BuildContext {
            save_path: None,
            notifier: &notifier,
        };
        let mut cache = ModelCache::new();
        cache.build(Path::new("a.model"), &cube_doc(), &ctx);
        let empty = ModelDocument::from_json(r#"{"elements":[]}"#).unwrap();
        assert!(cache.build(Path::new("a.model"), &empty, &ctx).is_none());
        assert!(!cache.contains(Path::new("a.model")));
        assert_eq!(notifier.0.borrow().as_slice(), [NO_ELEMENTS_TITLE]);
    }
}
