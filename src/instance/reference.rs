use std::path::{Path, PathBuf};

use thiserror::Error;
use uuid::Uuid;

use crate::core::outliner::ElementId;
use crate::graphics::scene::Scene;
use crate::instance::{InstanceId, schedule::FrameScheduler, watch::WatchRegistry};
use crate::model::{
    cache::{BuildContext, ModelCache},
    document::{DocumentError, ModelDocument},
};
use crate::resources;

/// Where an instance is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstanceState {
    NoPath,
    /// A path is set but hasn't been loaded yet, or the file changed.
    Pending,
    Ready,
    /// The last load had nothing to display; the previous mesh (if any) stays.
    Empty,
}

/// What an [`InstanceReference::update`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateOutcome {
    NoPath,
    Failed,
    Empty,
    Ready,
}

/// Everything an update touches outside the reference.
pub struct UpdateContext<'a> {
    pub element: ElementId,
    /// The instance element's uuid, which the display mesh is named after.
    pub element_uuid: Uuid,
    pub selected: bool,
    pub highlighted: bool,
    pub scene: &'a mut Scene,
    pub cache: &'a mut ModelCache,
    pub build: BuildContext<'a>,
}

/// The link from an instance to the project file it displays.
#[derive(Clone, Debug)]
pub struct InstanceReference {
    path: PathBuf,
    dirty: bool,
    retained: Option<ModelDocument>,
    state: InstanceState,
}

impl Default for InstanceReference {
    fn default() -> Self {
        Self::new()
    }
}

impl InstanceReference {
    pub fn new() -> Self {
        Self {
            path: PathBuf::new(),
            dirty: true,
            retained: None,
            state: InstanceState::NoPath,
        }
    }

    /// The referenced file. Empty if none was chosen.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn has_path(&self) -> bool {
        !self.path.as_os_str().is_empty()
    }

    /// Whether the displayed mesh is out of date.
    pub fn needs_update(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
        if self.has_path() {
            self.state = InstanceState::Pending;
        }
    }

    pub fn state(&self) -> InstanceState {
        self.state
    }

    /// The document of the last successful load, kept for export.
    pub fn retained(&self) -> Option<&ModelDocument> {
        self.retained.as_ref()
    }

    /// Point the reference at a new file.
    ///
    /// An empty path is ignored. Otherwise the old watch is released, the new one
    /// acquired and a rebuild scheduled for the next frame.
    ///
    /// Returns true if nothing was watching the new path, ie anything cached for it may
    /// predate changes on disk.
    pub fn set_path(
        &mut self,
        id: InstanceId,
        path: &Path,
        watches: &mut WatchRegistry,
        scheduler: &mut FrameScheduler,
    ) -> bool {
        if path.as_os_str().is_empty() {
            return false;
        }
        if self.has_path() {
            watches.release(&self.path);
        }
        log::info!("instance now references {}", path.display());
        self.path = path.to_path_buf();
        let unwatched = !watches.is_watched(&self.path);
        if let Err(e) = watches.acquire(&self.path) {
            log::warn!("{e}: {}", self.path.display());
        }
        self.mark_dirty();
        scheduler.schedule(id);
        unwatched
    }

    /// Forget the referenced file entirely, ie when undoing the first path assignment.
    pub fn clear_path(&mut self, watches: &mut WatchRegistry) {
        self.release(watches);
        self.path = PathBuf::new();
        self.retained = None;
        self.dirty = true;
        self.state = InstanceState::NoPath;
    }

    /// Drop the watch held for the current path. Used when the instance goes away.
    pub fn release(&mut self, watches: &mut WatchRegistry) {
        if self.has_path() {
            watches.release(&self.path);
        }
    }

    /// Reload the file and install a fresh clone of its mesh in the scene.
    ///
    /// A read or parse failure is logged and leaves everything as it was.
    pub fn update(&mut self, mut ctx: UpdateContext) -> UpdateOutcome {
        if !self.has_path() {
            log::debug!("instance has no project to load");
            return UpdateOutcome::NoPath;
        }

        let document = match load_document(&self.path) {
            Ok(document) => document,
            Err(e) => {
                log::error!("Couldn't load {}: {e}", self.path.display());
                return UpdateOutcome::Failed;
            }
        };

        self.dirty = false;
        let built = ctx.cache.build_or_get(&self.path, &document, &ctx.build);
        self.retained = Some(document);

        let Some(mut mesh) = built else {
            self.state = InstanceState::Empty;
            return UpdateOutcome::Empty;
        };
        mesh.name = ctx.element_uuid.to_string();
        mesh.no_export = true;
        mesh.outline_visible = ctx.selected;
        mesh.set_highlighted(ctx.highlighted);

        // the old mesh leaves the scene before the new one is added
        ctx.scene.clear_mesh(ctx.element);
        if let Err(e) = ctx.scene.replace_mesh(ctx.element, mesh) {
            log::error!("{e}");
            return UpdateOutcome::Failed;
        }
        self.state = InstanceState::Ready;
        UpdateOutcome::Ready
    }
}

/// Read and parse a project file.
pub fn load_document(path: &Path) -> Result<ModelDocument, InstanceError> {
    let text = resources::load_string(path).map_err(|source| InstanceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(ModelDocument::from_json(&text)?)
}

#[derive(Debug, Error)]
pub enum InstanceError {
    #[error("Couldn't read {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Couldn't parse project: {0}")]
    Parse(#[from] DocumentError),
}
