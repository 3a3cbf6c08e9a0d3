use std::cell::RefCell;
use std::rc::Rc;

use project_instancing::{
    constants::{IMPORTED_GROUP_NAME, INSTANCE_ELEMENT_TYPE, MODEL_FORMAT, PROJECT_FORMAT},
    core::entity::{CubeData, Element, ElementKind},
    editor::EditorError,
    export::{
        codec::{Codec, CodecError, CompileContext, CompileMiddleware, Next},
        merge::ExportMergeCoordinator,
    },
    instance::InstanceId,
    model::document::{ElementSpec, ModelDocument},
};

use crate::common::test_utils::{Harness, cubes_doc};

mod common;

/// What the inspecting codec saw while compiling.
#[derive(Default)]
struct Seen {
    cubes: usize,
    textures: usize,
    imported_froms: Vec<[f32; 3]>,
}

struct InspectCodec {
    seen: Rc<RefCell<Seen>>,
    fail: bool,
}

impl Codec for InspectCodec {
    fn id(&self) -> &'static str {
        "inspect"
    }

    fn compile(&self, ctx: &CompileContext) -> Result<String, CodecError> {
        let outliner = &ctx.project.outliner;
        let mut seen = self.seen.borrow_mut();
        seen.cubes = 0;
        seen.imported_froms.clear();
        for id in outliner.walk() {
            let Some(element) = outliner.get(id) else {
                continue;
            };
            if let ElementKind::Cube(cube) = &element.kind {
                seen.cubes += 1;
                let imported = element
                    .parent()
                    .and_then(|p| outliner.get(p))
                    .is_some_and(|p| p.name == IMPORTED_GROUP_NAME);
                if imported {
                    seen.imported_froms.push(cube.from);
                }
            }
        }
        seen.textures = ctx.project.textures.len();
        if self.fail {
            return Err(CodecError::Other(anyhow::anyhow!("disk full")));
        }
        Ok(seen.cubes.to_string())
    }
}

struct CountingMiddleware(Rc<RefCell<usize>>);

impl CompileMiddleware for CountingMiddleware {
    fn id(&self) -> &'static str {
        "counting"
    }

    fn compile(&self, ctx: &mut CompileContext, next: Next<'_>) -> Result<String, CodecError> {
        *self.0.borrow_mut() += 1;
        next.run(ctx)
    }
}

const TEXTURED_PAIR: &str = r#"{
    "textures": [{"name": "skin"}],
    "elements": [
        {"type": "cube", "name": "a", "from": [0,0,0], "to": [1,1,1]},
        {"type": "cube", "name": "b", "from": [1,0,0], "to": [2,1,1]}
    ],
    "meta": {}
}"#;

/// A host with one cube of its own and one loaded instance at x = 10.
fn host_with_instance(doc: &str) -> (Harness, InstanceId) {
    let mut harness = Harness::new();
    let project = harness.editor.active_project_mut().unwrap();
    project
        .outliner
        .add(
            Element::new("own", ElementKind::Cube(CubeData::default())),
            None,
        )
        .unwrap();

    let path = harness.write("referenced.bbmodel", doc);
    let id = harness.editor.create_instance(None).unwrap();
    let mut properties = harness.editor.instance_properties(id).unwrap();
    properties.position = [10.0, 0.0, 0.0];
    properties.project_path = path;
    harness.editor.set_instance_properties(id, &properties);
    harness.settle();
    (harness, id)
}

fn install_inspector(harness: &mut Harness, fail: bool) -> Rc<RefCell<Seen>> {
    let seen = Rc::new(RefCell::new(Seen::default()));
    harness.editor.codecs_mut().register_codec(Box::new(InspectCodec {
        seen: seen.clone(),
        fail,
    }));
    seen
}

#[test]
fn referenced_cubes_exist_only_during_compile() {
    let (mut harness, _) = host_with_instance(TEXTURED_PAIR);
    let seen = install_inspector(&mut harness, false);
    let snapshot = harness.editor.export(PROJECT_FORMAT).unwrap();
    let elements_before = harness.editor.active_project().unwrap().outliner.len();

    assert_eq!(harness.editor.export("inspect").unwrap(), "3");
    {
        let seen = seen.borrow();
        assert_eq!(seen.textures, 1);
        assert_eq!(seen.imported_froms, vec![[10.0, 0.0, 0.0], [11.0, 0.0, 0.0]]);
    }

    let project = harness.editor.active_project().unwrap();
    assert_eq!(project.outliner.len(), elements_before);
    assert!(project.textures.is_empty());
    assert_eq!(harness.editor.export(PROJECT_FORMAT).unwrap(), snapshot);
}

#[test]
fn model_export_contains_grafted_content() {
    let (mut harness, _) = host_with_instance(&cubes_doc(2));
    let text = harness.editor.export(MODEL_FORMAT).unwrap();
    let document = ModelDocument::from_json(&text).unwrap();
    assert_eq!(document.supported_cubes().len(), 3);
    assert!(!text.contains(INSTANCE_ELEMENT_TYPE));

    let outliner = document.extra["outliner"].as_array().unwrap();
    let group = outliner
        .iter()
        .find(|entry| entry["name"] == IMPORTED_GROUP_NAME)
        .unwrap();
    assert_eq!(group["origin"], serde_json::json!([10.0, 0.0, 0.0]));
    assert_eq!(group["children"].as_array().unwrap().len(), 2);
}

#[test]
fn failed_compile_still_reverts() {
    let (mut harness, _) = host_with_instance(TEXTURED_PAIR);
    let seen = install_inspector(&mut harness, true);
    let snapshot = harness.editor.export(PROJECT_FORMAT).unwrap();

    let err = harness.editor.export("inspect").unwrap_err();
    assert!(matches!(err, EditorError::Codec(CodecError::Other(_))));
    assert_eq!(err.to_string(), "disk full");
    assert_eq!(seen.borrow().cubes, 3);

    assert!(harness.editor.active_project().unwrap().textures.is_empty());
    assert_eq!(harness.editor.export(PROJECT_FORMAT).unwrap(), snapshot);
}

#[test]
fn project_format_skips_middleware() {
    let (mut harness, _) = host_with_instance(&cubes_doc(2));
    let calls = Rc::new(RefCell::new(0));
    harness
        .editor
        .codecs_mut()
        .register_middleware(Box::new(CountingMiddleware(calls.clone())));

    let text = harness.editor.export(PROJECT_FORMAT).unwrap();
    assert_eq!(*calls.borrow(), 0);
    let document = ModelDocument::from_json(&text).unwrap();
    let cubes = document
        .elements
        .iter()
        .filter(|e| matches!(e, ElementSpec::Cube(_)))
        .count();
    assert_eq!(cubes, 1);
    assert!(text.contains(INSTANCE_ELEMENT_TYPE));

    harness.editor.export(MODEL_FORMAT).unwrap();
    assert_eq!(*calls.borrow(), 1);
}

#[test]
fn nested_instances_are_not_followed() {
    let nested = r#"{
        "elements": [
            {"type": "cube", "name": "a"},
            {"type": "project_instancing:instance", "project_path": "elsewhere.bbmodel"}
        ]
    }"#;
    let (mut harness, id) = host_with_instance(nested);
    let seen = install_inspector(&mut harness, false);

    let element = harness.editor.instance(id).unwrap().element;
    let project = harness.editor.active_project().unwrap();
    assert_eq!(project.scene.mesh(element).unwrap().geometry.vertex_count(), 24);

    assert_eq!(harness.editor.export("inspect").unwrap(), "2");
    assert_eq!(seen.borrow().imported_froms.len(), 1);
}

#[test]
fn instances_without_a_loaded_project_are_skipped() {
    let mut harness = Harness::new();
    let seen = install_inspector(&mut harness, false);
    let id = harness.editor.create_instance(None).unwrap();
    harness
        .editor
        .set_instance_path(id, &harness.dir.path().join("missing.bbmodel"));
    harness.editor.tick();
    assert!(harness.editor.instance(id).unwrap().reference.retained().is_none());

    assert_eq!(harness.editor.export("inspect").unwrap(), "0");
    assert!(seen.borrow().imported_froms.is_empty());
}

#[test]
fn unregistered_coordinator_exports_host_only() {
    let (mut harness, _) = host_with_instance(&cubes_doc(2));
    assert!(
        harness
            .editor
            .codecs_mut()
            .unregister_middleware(ExportMergeCoordinator::ID)
    );
    let seen = install_inspector(&mut harness, false);
    assert_eq!(harness.editor.export("inspect").unwrap(), "1");
    assert!(seen.borrow().imported_froms.is_empty());
}
