use std::path::Path;

use project_instancing::{
    constants::NO_ELEMENTS_TITLE,
    host::LogNotifier,
    instance::reference::{InstanceState, load_document},
    model::cache::{BuildContext, ModelCache},
};

use crate::common::test_utils::{CUBE_DOC, EMPTY_DOC, Harness, cubes_doc};

mod common;

#[test]
fn single_cube_document_is_cached_once() {
    let harness = Harness::new();
    let path = harness.write("a.model", CUBE_DOC);
    let document = load_document(&path).unwrap();

    let mut cache = ModelCache::new();
    let ctx = BuildContext {
        save_path: None,
        notifier: &LogNotifier,
    };
    let built = cache.build_or_get(&path, &document, &ctx).unwrap();
    assert_eq!(built.geometry.vertex_count(), 24);
    assert_eq!(built.geometry.indices().len(), 36);
    assert_eq!(built.outline.segment_count(), 12);

    let first = cache.get(&path).unwrap();
    let second = cache.get(&path).unwrap();
    assert_eq!(first, second);
    assert!(!first.shares_storage_with(&second));
    assert_eq!(cache.build_count(), 1);
}

#[test]
fn file_change_rebuilds_on_next_tick() {
    let mut harness = Harness::new();
    let path = harness.write("a.model", CUBE_DOC);
    let id = harness.editor.create_instance(None).unwrap();
    harness.editor.set_instance_path(id, &path);
    harness.settle();

    let element = harness.editor.instance(id).unwrap().element;
    let vertices = |h: &Harness| {
        h.editor
            .active_project()
            .and_then(|p| p.scene.mesh(element))
            .map(|m| m.geometry.vertex_count())
    };
    assert_eq!(vertices(&harness), Some(24));
    assert_eq!(harness.editor.cache().build_count(), 1);

    std::fs::write(&path, cubes_doc(3)).unwrap();
    harness.touch(&path);
    harness.settle();
    assert_eq!(vertices(&harness), Some(72));
    assert_eq!(harness.editor.cache().build_count(), 2);
    assert_eq!(
        harness.editor.instance(id).unwrap().reference.state(),
        InstanceState::Ready
    );
}

#[test]
fn untouched_files_are_not_rebuilt() {
    let mut harness = Harness::new();
    let path = harness.write("a.model", CUBE_DOC);
    let a = harness.editor.create_instance(None).unwrap();
    let b = harness.editor.create_instance(None).unwrap();
    harness.editor.set_instance_path(a, &path);
    harness.editor.set_instance_path(b, &path);
    harness.settle();
    harness.settle();
    assert_eq!(harness.editor.cache().build_count(), 1);
    assert!(harness.editor.cache().contains(&path));
}

#[test]
fn empty_document_warns_and_shows_nothing() {
    let mut harness = Harness::new();
    let path = harness.write("empty.model", EMPTY_DOC);
    let id = harness.editor.create_instance(None).unwrap();
    harness.editor.set_instance_path(id, &path);
    harness.settle();

    let node = harness.editor.instance(id).unwrap();
    assert_eq!(node.reference.state(), InstanceState::Empty);
    assert!(!node.reference.needs_update());
    let project = harness.editor.active_project().unwrap();
    assert!(project.scene.mesh(node.element).is_none());
    assert_eq!(harness.notifier.titles(), vec![NO_ELEMENTS_TITLE.to_string()]);
    assert!(!harness.editor.cache().contains(Path::new(&path)));
}

#[test]
fn broken_file_keeps_the_last_good_mesh() {
    let mut harness = Harness::new();
    let path = harness.write("a.model", CUBE_DOC);
    let id = harness.editor.create_instance(None).unwrap();
    harness.editor.set_instance_path(id, &path);
    harness.settle();

    std::fs::write(&path, "{ \"elements\": [").unwrap();
    harness.touch(&path);
    harness.editor.tick();

    let node = harness.editor.instance(id).unwrap();
    assert_eq!(node.reference.state(), InstanceState::Pending);
    assert!(node.reference.needs_update());
    assert!(node.reference.retained().is_some());
    let project = harness.editor.active_project().unwrap();
    assert_eq!(
        project.scene.mesh(node.element).map(|m| m.geometry.vertex_count()),
        Some(24)
    );
}

#[test]
fn file_edited_while_unwatched_is_rebuilt_when_referenced_again() {
    let mut harness = Harness::new();
    let x = harness.write("x.model", CUBE_DOC);
    let y = harness.write("y.model", CUBE_DOC);
    let id = harness.editor.create_instance(None).unwrap();
    harness.editor.set_instance_path(id, &x);
    harness.settle();
    harness.editor.set_instance_path(id, &y);
    harness.settle();
    assert!(!harness.watcher.is_watching(&x));

    std::fs::write(&x, cubes_doc(3)).unwrap();
    harness.editor.set_instance_path(id, &x);
    harness.settle();

    let node = harness.editor.instance(id).unwrap();
    assert_eq!(
        node.reference.retained().map(|d| d.supported_cubes().len()),
        Some(3)
    );
    let project = harness.editor.active_project().unwrap();
    assert_eq!(
        project.scene.mesh(node.element).map(|m| m.geometry.vertex_count()),
        Some(72)
    );
}

#[test]
fn second_reference_to_a_watched_file_reuses_the_cache() {
    let mut harness = Harness::new();
    let path = harness.write("a.model", CUBE_DOC);
    let a = harness.editor.create_instance(None).unwrap();
    harness.editor.set_instance_path(a, &path);
    harness.settle();

    let b = harness.editor.create_instance(None).unwrap();
    harness.editor.set_instance_path(b, &path);
    harness.settle();
    assert_eq!(harness.editor.cache().build_count(), 1);
}

#[test]
fn emptied_file_keeps_the_displayed_mesh() {
    let mut harness = Harness::new();
    let path = harness.write("a.model", CUBE_DOC);
    let id = harness.editor.create_instance(None).unwrap();
    harness.editor.set_instance_path(id, &path);
    harness.settle();
    assert_eq!(
        harness.editor.instance(id).unwrap().reference.state(),
        InstanceState::Ready
    );

    std::fs::write(&path, EMPTY_DOC).unwrap();
    harness.touch(&path);
    harness.settle();

    let node = harness.editor.instance(id).unwrap();
    assert_eq!(node.reference.state(), InstanceState::Empty);
    assert!(!node.reference.needs_update());
    let project = harness.editor.active_project().unwrap();
    assert_eq!(
        project.scene.mesh(node.element).map(|m| m.geometry.vertex_count()),
        Some(24)
    );
    assert_eq!(harness.notifier.titles(), vec![NO_ELEMENTS_TITLE.to_string()]);
    assert!(!harness.editor.cache().contains(&path));
}
