//! Splices referenced projects into the host for the length of one compile call.

use uuid::Uuid;

use crate::constants::IMPORTED_GROUP_NAME;
use crate::core::{
    entity::{Element, ElementKind, GroupData},
    outliner::OutlinerError,
};
use crate::editor::Project;
use crate::export::codec::{CodecError, CompileContext, CompileMiddleware, Next};
use crate::graphics::texture::Texture;
use crate::instance::{InstanceId, InstanceNode};

/// Reverts one graft.
type Undo = Box<dyn FnOnce(&mut Project)>;

/// Compile middleware that turns every live instance into real cubes while the codec runs,
/// then removes everything it added, whether the codec succeeded or not.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExportMergeCoordinator;

impl ExportMergeCoordinator {
    pub const ID: &'static str = "project_instancing:export_merge";
}

impl CompileMiddleware for ExportMergeCoordinator {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn compile(&self, ctx: &mut CompileContext, next: Next<'_>) -> Result<String, CodecError> {
        let instances = ctx.instances;
        let live: Vec<InstanceId> = ctx.live.to_vec();
        let mut undo: Vec<Undo> = Vec::with_capacity(live.len());

        for id in live {
            let Some(node) = instances.get(id) else {
                continue;
            };
            match graft(ctx.project, node) {
                Ok(Some(revert)) => undo.push(revert),
                Ok(None) => {}
                Err(e) => log::error!("Couldn't merge instance into export: {e}"),
            }
        }

        let result = next.run(ctx);
        for revert in undo {
            revert(ctx.project);
        }
        result
    }
}

/// Add the instance's retained document to the project as an "Imported Model" group.
fn graft(project: &mut Project, node: &InstanceNode) -> Result<Option<Undo>, OutlinerError> {
    let Some(document) = node.reference.retained() else {
        log::error!(
            "Instance of {} has no loaded project to export",
            node.reference.path().display()
        );
        return Ok(None);
    };
    let Some(instance) = project.outliner.get(node.element).and_then(|e| e.instance()) else {
        return Ok(None);
    };
    let position = instance.position;
    let rotation = instance.rotation;
    let parent = project.outliner.parent_group(node.element);

    let mut texture_ids = Vec::with_capacity(document.textures.len());
    let mut texture_uuids = Vec::with_capacity(document.textures.len());
    for reference in &document.textures {
        let texture = Texture::resolve(
            reference,
            Uuid::new_v4(),
            project.save_path.as_deref(),
            document.meta.backup,
        );
        texture_uuids.push(texture.uuid);
        texture_ids.push(project.textures.add(texture));
    }

    let group = Element::new(
        IMPORTED_GROUP_NAME,
        ElementKind::Group(GroupData {
            origin: position,
            rotation,
        }),
    );
    let group_id = match project.outliner.add(group, parent) {
        Ok(id) => id,
        Err(e) => {
            for id in texture_ids {
                project.textures.remove(id);
            }
            return Err(e);
        }
    };

    let revert: Undo = Box::new(move |project: &mut Project| {
        project.outliner.remove(group_id);
        for id in texture_ids {
            project.textures.remove(id);
        }
    });

    for cube in document.supported_cubes() {
        let mut data = cube.to_cube_data(
            |index| texture_uuids.get(index).copied(),
            texture_uuids.first().copied(),
        );
        data.translate(position);
        let element = Element::new(cube.name.clone(), ElementKind::Cube(data));
        if let Err(e) = project.outliner.add(element, Some(group_id)) {
            revert(project);
            return Err(e);
        }
    }
    log::debug!("merged {} into export", node.reference.path().display());
    Ok(Some(revert))
}
