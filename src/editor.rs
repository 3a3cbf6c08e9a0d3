use std::path::{Path, PathBuf};

use rustc_hash::FxHashSet;
use slotmap::{SlotMap, new_key_type};
use thiserror::Error;
use uuid::Uuid;

use crate::constants::{DEFAULT_INSTANCE_NAME, PROJECT_FORMAT};
use crate::core::{
    entity::{Element, ElementKind, InstanceData},
    outliner::{ElementId, Outliner, OutlinerError},
    schema,
};
use crate::export::{
    codec::{CodecError, CodecPipeline, CompileContext},
    formats::{self, ModelCodec, ProjectCodec, ProjectError},
    merge::ExportMergeCoordinator,
};
use crate::graphics::{scene::Scene, texture::TextureRegistry};
use crate::host::{FileFilter, FilePicker, LogNotifier, Notifier};
use crate::instance::{
    InstanceId, InstanceNode, InstanceProperties,
    reference::{UpdateContext, UpdateOutcome},
    schedule::FrameScheduler,
    watch::{ManualWatcher, NotifyBackend, WatchBackend, WatchRegistry},
};
use crate::model::cache::{BuildContext, ModelCache};
use crate::resources::normalize_path;
use crate::undo::{InstanceCopy, UndoLog};

new_key_type! {
    /// For referencing open projects.
    pub struct ProjectId;
}

/// An open project: its element tree, textures and preview scene.
pub struct Project {
    pub uuid: Uuid,
    pub name: String,
    /// The file the project was loaded from or last saved to.
    pub save_path: Option<PathBuf>,
    pub outliner: Outliner,
    pub textures: TextureRegistry,
    pub scene: Scene,
    /// The project's instances while another project is active.
    instance_elements: Vec<InstanceId>,
}

impl Project {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: name.into(),
            save_path: None,
            outliner: Outliner::new(),
            textures: TextureRegistry::new(),
            scene: Scene::new(),
            instance_elements: Vec::new(),
        }
    }

    /// The instances kept aside while the project is inactive.
    pub fn instance_elements(&self) -> &[InstanceId] {
        &self.instance_elements
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EditorMode {
    #[default]
    Edit,
    Animate,
}

/// Tunables of the editor.
#[derive(Clone, Debug)]
pub struct EditorConfig {
    /// Install OS file watches. When off, files are only reloaded on request.
    pub watch_files: bool,
    pub mode: EditorMode,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            watch_files: true,
            mode: EditorMode::Edit,
        }
    }
}

/// Owns the open projects and every instance in them, and drives them frame by frame.
pub struct Editor {
    projects: SlotMap<ProjectId, Project>,
    active: Option<ProjectId>,
    instances: SlotMap<InstanceId, InstanceNode>,
    /// The active project's instances.
    live: Vec<InstanceId>,
    cache: ModelCache,
    watches: WatchRegistry,
    scheduler: FrameScheduler,
    codecs: CodecPipeline,
    notifier: Box<dyn Notifier>,
    undo: UndoLog,
    mode: EditorMode,
}

impl Editor {
    /// Create an editor from its config.
    ///
    /// If OS file watches can't be set up, files are only reloaded on request.
    pub fn new(config: EditorConfig) -> Self {
        let backend: Box<dyn WatchBackend> = if config.watch_files {
            match NotifyBackend::new() {
                Ok(backend) => Box::new(backend),
                Err(e) => {
                    log::warn!("{e}; instances won't reload on file changes");
                    Box::new(ManualWatcher::new())
                }
            }
        } else {
            Box::new(ManualWatcher::new())
        };
        Self::with_services(config, backend, Box::new(LogNotifier))
    }

    /// Create an editor with the given watch backend and notifier.
    pub fn with_services(
        config: EditorConfig,
        backend: Box<dyn WatchBackend>,
        notifier: Box<dyn Notifier>,
    ) -> Self {
        let mut codecs = CodecPipeline::new();
        codecs.register_codec(Box::new(ProjectCodec));
        codecs.register_codec(Box::new(ModelCodec));
        codecs.register_middleware(Box::new(ExportMergeCoordinator));

        Self {
            projects: SlotMap::with_key(),
            active: None,
            instances: SlotMap::with_key(),
            live: Vec::new(),
            cache: ModelCache::new(),
            watches: WatchRegistry::new(backend),
            scheduler: FrameScheduler::new(),
            codecs,
            notifier,
            undo: UndoLog::new(),
            mode: config.mode,
        }
    }

    // --- projects ---

    /// Add an empty project and make it the active one.
    pub fn new_project(&mut self, name: &str) -> ProjectId {
        let id = self.projects.insert(Project::new(name));
        self.activate_project(id);
        id
    }

    /// Load a project file, set up its instances and make it the active one.
    pub fn open_project(&mut self, path: &Path) -> Result<ProjectId, EditorError> {
        let loaded = formats::load_project(path)?;
        let project_id = self.projects.insert(loaded.project);
        log::info!("opened {}", path.display());

        for (element, properties) in loaded.instances {
            let id = self.attach_instance(project_id, element)?;
            self.set_instance_path(id, &properties.project_path);
            if let Some(project) = self.projects.get_mut(project_id) {
                project.instance_elements.push(id);
            }
        }
        self.activate_project(project_id);
        Ok(project_id)
    }

    /// Write the active project to `path` and remember it as the save path.
    pub fn save_project(&mut self, path: &Path) -> Result<(), EditorError> {
        let text = self.export(PROJECT_FORMAT)?;
        std::fs::write(path, text).map_err(|source| EditorError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if let Some(project) = self.active_project_mut() {
            project.save_path = Some(path.to_path_buf());
        }
        Ok(())
    }

    /// Close a project, dropping its instances and their watches.
    pub fn close_project(&mut self, id: ProjectId) -> Option<Project> {
        if self.active == Some(id) {
            self.deactivate_project();
        }
        let owned: Vec<InstanceId> = self.projects.get(id)?.instance_elements.clone();
        for instance in owned {
            self.remove_instance(instance);
        }
        self.projects.remove(id)
    }

    /// Make `id` the active project. Its instances become the live list and
    /// any of them still waiting for a load get one.
    pub fn activate_project(&mut self, id: ProjectId) {
        if self.active == Some(id) || !self.projects.contains_key(id) {
            return;
        }
        self.deactivate_project();
        let Some(project) = self.projects.get_mut(id) else {
            return;
        };
        self.live = std::mem::take(&mut project.instance_elements);
        self.active = Some(id);
        log::info!("activated project '{}'", project.name);

        let waiting: Vec<InstanceId> = self
            .live
            .iter()
            .copied()
            .filter(|&i| {
                self.instances
                    .get(i)
                    .is_some_and(|n| n.reference.has_path() && n.reference.needs_update())
            })
            .collect();
        for instance in waiting {
            if self.update_instance(instance).is_some() {
                self.scheduler.cancel(instance);
            }
        }
    }

    /// Park the active project's instances with it. Nothing is live afterwards.
    pub fn deactivate_project(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        if let Some(project) = self.projects.get_mut(active) {
            project.instance_elements = std::mem::take(&mut self.live);
            log::info!("deactivated project '{}'", project.name);
        }
    }

    pub fn active_project_id(&self) -> Option<ProjectId> {
        self.active
    }

    pub fn active_project(&self) -> Option<&Project> {
        self.projects.get(self.active?)
    }

    pub fn active_project_mut(&mut self) -> Option<&mut Project> {
        self.projects.get_mut(self.active?)
    }

    pub fn project(&self, id: ProjectId) -> Option<&Project> {
        self.projects.get(id)
    }

    pub fn project_mut(&mut self, id: ProjectId) -> Option<&mut Project> {
        self.projects.get_mut(id)
    }

    // --- instances ---

    /// Add a new instance under `parent` (a group, or the root) of the active project.
    ///
    /// The instance starts at the parent's origin and gets selected.
    pub fn create_instance(
        &mut self,
        parent: Option<ElementId>,
    ) -> Result<InstanceId, EditorError> {
        let project_id = self.active.ok_or(EditorError::NoActiveProject)?;
        self.undo.begin_edit(Vec::new());

        let project = self
            .projects
            .get_mut(project_id)
            .ok_or(EditorError::NoActiveProject)?;
        let position = parent
            .and_then(|p| project.outliner.get(p))
            .map(|p| p.origin())
            .unwrap_or_default();
        let element = Element::new(
            DEFAULT_INSTANCE_NAME,
            ElementKind::Instance(InstanceData {
                instance: InstanceId::default(),
                position,
                rotation: [0.0; 3],
            }),
        );
        let element = match project.outliner.add(element, parent) {
            Ok(element) => element,
            Err(e) => {
                self.undo.cancel_edit();
                return Err(e.into());
            }
        };
        let id = match self.attach_instance(project_id, element) {
            Ok(id) => id,
            Err(e) => {
                self.undo.cancel_edit();
                return Err(e);
            }
        };
        self.live.push(id);

        if let Some(project) = self.projects.get_mut(project_id) {
            project.outliner.select(element, false);
        }
        self.refresh_selection();

        let after = self.instance_copies(&[id]);
        self.undo.commit_edit("Add Project Instance", after);
        Ok(id)
    }

    /// Create the arena entry and scene node for an instance element.
    fn attach_instance(
        &mut self,
        project_id: ProjectId,
        element: ElementId,
    ) -> Result<InstanceId, EditorError> {
        let project = self
            .projects
            .get_mut(project_id)
            .ok_or(EditorError::NoActiveProject)?;
        let id = self.instances.insert(InstanceNode::new(element, project_id));
        match project.outliner.get_mut(element).and_then(|e| e.instance_mut()) {
            Some(data) => data.instance = id,
            None => {
                self.instances.remove(id);
                return Err(OutlinerError::ElementNotFound(element).into());
            }
        }
        let transform = project.outliner.world_transform(element).unwrap_or_default();
        project.scene.setup(element, transform);
        Ok(id)
    }

    /// Delete an instance: its watch, its scene node and its element.
    pub fn remove_instance(&mut self, id: InstanceId) -> bool {
        let Some(mut node) = self.instances.remove(id) else {
            return false;
        };
        node.reference.release(&mut self.watches);
        self.scheduler.cancel(id);
        self.live.retain(|&i| i != id);
        if let Some(project) = self.projects.get_mut(node.project) {
            project.instance_elements.retain(|&i| i != id);
            project.scene.clear_mesh(node.element);
            project.scene.remove(node.element);
            project.outliner.remove(node.element);
        }
        true
    }

    pub fn instance(&self, id: InstanceId) -> Option<&InstanceNode> {
        self.instances.get(id)
    }

    /// The instance whose element has this uuid.
    pub fn find_instance(&self, uuid: Uuid) -> Option<InstanceId> {
        self.instances
            .iter()
            .find(|(_, node)| {
                self.projects
                    .get(node.project)
                    .and_then(|p| p.outliner.get(node.element))
                    .is_some_and(|e| e.uuid() == uuid)
            })
            .map(|(id, _)| id)
    }

    /// The active project's instances.
    pub fn live_instances(&self) -> &[InstanceId] {
        &self.live
    }

    /// The instance's persisted properties.
    pub fn instance_properties(&self, id: InstanceId) -> Option<InstanceProperties> {
        let node = self.instances.get(id)?;
        let element = self.projects.get(node.project)?.outliner.get(node.element)?;
        InstanceProperties::capture(element, &node.reference)
    }

    /// Write properties back onto an instance. A changed path is set like any other path change.
    pub fn set_instance_properties(&mut self, id: InstanceId, properties: &InstanceProperties) {
        let Some(node) = self.instances.get_mut(id) else {
            return;
        };
        let Some(project) = self.projects.get_mut(node.project) else {
            return;
        };
        if let Some(element) = project.outliner.get_mut(node.element) {
            properties.apply_to_element(element);
        }
        if let Some(transform) = project.outliner.world_transform(node.element) {
            if let Err(e) = project.scene.update_transform(node.element, transform) {
                log::error!("{e}");
            }
        }
        if properties.project_path.as_os_str().is_empty() {
            if node.reference.has_path() {
                node.reference.clear_path(&mut self.watches);
                project.scene.clear_mesh(node.element);
            }
        } else if properties.project_path != node.reference.path()
            && node.reference.set_path(
                id,
                &properties.project_path,
                &mut self.watches,
                &mut self.scheduler,
            )
        {
            self.cache.invalidate(&properties.project_path);
        }
    }

    /// Point an instance at a project file. The load happens on the next tick.
    ///
    /// A cached mesh for a file nobody was watching is dropped, since the file may have
    /// changed unseen.
    pub fn set_instance_path(&mut self, id: InstanceId, path: &Path) {
        let Some(node) = self.instances.get_mut(id) else {
            return;
        };
        if node
            .reference
            .set_path(id, path, &mut self.watches, &mut self.scheduler)
        {
            self.cache.invalidate(path);
        }
    }

    /// Load the instance's file now and show its mesh.
    pub fn update_instance(&mut self, id: InstanceId) -> Option<UpdateOutcome> {
        let node = self.instances.get_mut(id)?;
        let project = self.projects.get_mut(node.project)?;
        let element_uuid = project.outliner.get(node.element)?.uuid();
        let selected = project.outliner.is_selected(node.element);
        let outcome = node.reference.update(UpdateContext {
            element: node.element,
            element_uuid,
            selected,
            highlighted: self.mode == EditorMode::Edit && selected,
            scene: &mut project.scene,
            cache: &mut self.cache,
            build: BuildContext {
                save_path: project.save_path.as_deref(),
                notifier: self.notifier.as_ref(),
            },
        });
        Some(outcome)
    }

    /// Ask for a project file and point every selected instance at it, as one undoable edit.
    ///
    /// Does nothing without selected instances. Returns the chosen path.
    pub async fn select_project_to_instance<P: FilePicker>(
        &mut self,
        picker: &P,
    ) -> Option<PathBuf> {
        let selected = self.selected_instances();
        if selected.is_empty() {
            return None;
        }
        let path = picker
            .pick_file("Select Project", &FileFilter::project_filters())
            .await?;

        let before = self.instance_copies(&selected);
        self.undo.begin_edit(before);
        for &id in &selected {
            self.set_instance_path(id, &path);
            if self.update_instance(id).is_some() {
                self.scheduler.cancel(id);
            }
        }
        let after = self.instance_copies(&selected);
        self.undo.commit_edit("Select Project", after);
        Some(path)
    }

    /// Live instances whose elements are selected.
    pub fn selected_instances(&self) -> Vec<InstanceId> {
        let Some(project) = self.active_project() else {
            return Vec::new();
        };
        self.live
            .iter()
            .copied()
            .filter(|&id| {
                self.instances
                    .get(id)
                    .is_some_and(|n| project.outliner.is_selected(n.element))
            })
            .collect()
    }

    // --- selection and mode ---

    /// Select an element of the active project.
    pub fn select(&mut self, element: ElementId, additive: bool) -> bool {
        let Some(project) = self.active_project_mut() else {
            return false;
        };
        let selected = project.outliner.select(element, additive);
        self.refresh_selection();
        selected
    }

    pub fn unselect(&mut self, element: ElementId) -> bool {
        let Some(project) = self.active_project_mut() else {
            return false;
        };
        let unselected = project.outliner.unselect(element);
        self.refresh_selection();
        unselected
    }

    pub fn unselect_all(&mut self) {
        if let Some(project) = self.active_project_mut() {
            project.outliner.unselect_all();
        }
        self.refresh_selection();
    }

    pub fn mode(&self) -> EditorMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: EditorMode) {
        self.mode = mode;
        self.refresh_selection();
    }

    /// Sync outline visibility and highlight of every live instance with the selection.
    fn refresh_selection(&mut self) {
        let Some(project) = self.active.and_then(|a| self.projects.get_mut(a)) else {
            return;
        };
        for node in self.live.iter().filter_map(|&id| self.instances.get(id)) {
            let selected = project.outliner.is_selected(node.element);
            if let Some(mesh) = project.scene.mesh_mut(node.element) {
                mesh.outline_visible = selected;
                mesh.set_highlighted(self.mode == EditorMode::Edit && selected);
            }
        }
    }

    // --- frame ---

    /// Run one frame: pick up file changes, run deferred loads, then load any live
    /// instance that is still out of date. Returns how many loads ran.
    pub fn tick(&mut self) -> usize {
        let changed = self.watches.drain_changes();
        for path in &changed {
            self.cache.invalidate(path);
        }
        if !changed.is_empty() {
            for node in self.instances.values_mut() {
                if node.reference.has_path()
                    && changed.contains(&normalize_path(node.reference.path()))
                {
                    log::debug!("{} changed", node.reference.path().display());
                    node.reference.mark_dirty();
                }
            }
        }

        let mut done = FxHashSet::default();
        for id in self.scheduler.take_due() {
            if done.insert(id) {
                self.update_instance(id);
            }
        }

        let dirty: Vec<InstanceId> = self
            .live
            .iter()
            .copied()
            .filter(|id| !done.contains(id))
            .filter(|&id| {
                self.instances
                    .get(id)
                    .is_some_and(|n| n.reference.has_path() && n.reference.needs_update())
            })
            .collect();
        for &id in &dirty {
            self.update_instance(id);
        }
        done.len() + dirty.len()
    }

    // --- export ---

    /// Compile the active project into `format`.
    pub fn export(&mut self, format: &str) -> Result<String, EditorError> {
        let active = self.active.ok_or(EditorError::NoActiveProject)?;
        let project = self
            .projects
            .get_mut(active)
            .ok_or(EditorError::NoActiveProject)?;
        let mut ctx = CompileContext {
            project,
            instances: &self.instances,
            live: &self.live,
        };
        Ok(self.codecs.compile(format, &mut ctx)?)
    }

    pub fn codecs(&self) -> &CodecPipeline {
        &self.codecs
    }

    /// Register or unregister codecs and middleware.
    pub fn codecs_mut(&mut self) -> &mut CodecPipeline {
        &mut self.codecs
    }

    // --- undo ---

    fn instance_copies(&self, ids: &[InstanceId]) -> Vec<InstanceCopy> {
        ids.iter()
            .filter_map(|&id| {
                let node = self.instances.get(id)?;
                let element = self.projects.get(node.project)?.outliner.get(node.element)?;
                let properties = InstanceProperties::capture(element, &node.reference)?;
                Some(InstanceCopy {
                    uuid: element.uuid(),
                    data: schema::save_copy(&properties),
                })
            })
            .collect()
    }

    /// Revert the most recent edit. Returns its label.
    pub fn undo(&mut self) -> Option<String> {
        let entry = self.undo.pop()?;
        let created: Vec<Uuid> = entry.created().map(|c| c.uuid).collect();
        for uuid in created {
            if let Some(id) = self.find_instance(uuid) {
                self.remove_instance(id);
            }
        }
        for copy in &entry.before {
            let Some(id) = self.find_instance(copy.uuid) else {
                continue;
            };
            let Some(mut properties) = self.instance_properties(id) else {
                continue;
            };
            schema::merge(&mut properties, &copy.data);
            self.set_instance_properties(id, &properties);
        }
        self.refresh_selection();
        log::info!("undid '{}'", entry.label);
        Some(entry.label)
    }

    pub fn undo_log(&self) -> &UndoLog {
        &self.undo
    }

    // --- shared services ---

    pub fn cache(&self) -> &ModelCache {
        &self.cache
    }

    pub fn watches(&self) -> &WatchRegistry {
        &self.watches
    }

    pub fn scheduler(&self) -> &FrameScheduler {
        &self.scheduler
    }
}

#[derive(Debug, Error)]
pub enum EditorError {
    #[error("No project is active")]
    NoActiveProject,
    #[error("Couldn't write {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Project(#[from] ProjectError),
    #[error(transparent)]
    Outliner(#[from] OutlinerError),
    #[error(transparent)]
    Codec(#[from] CodecError),
}
