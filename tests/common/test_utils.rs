use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use project_instancing::{
    editor::{Editor, EditorConfig},
    host::{FileFilter, FilePicker, Notifier},
    instance::watch::ManualWatcher,
};

pub const CUBE_DOC: &str = r#"{"textures":[],"elements":[{"type":"cube","faces":{}}],"meta":{}}"#;
pub const EMPTY_DOC: &str = r#"{"textures":[],"elements":[],"meta":{}}"#;

/// Keeps every warning it was asked to show. Clones share the list.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    warnings: Rc<RefCell<Vec<(String, String)>>>,
}

impl RecordingNotifier {
    pub fn titles(&self) -> Vec<String> {
        self.warnings.borrow().iter().map(|(t, _)| t.clone()).collect()
    }
}

impl Notifier for RecordingNotifier {
    fn show_warning(&self, title: &str, message: &str) {
        self.warnings
            .borrow_mut()
            .push((title.to_string(), message.to_string()));
    }
}

/// Answers every dialog with the same path, and counts how often it was asked.
pub struct ScriptedPicker {
    pub answer: Option<PathBuf>,
    pub asked: RefCell<usize>,
}

impl ScriptedPicker {
    pub fn new(answer: Option<PathBuf>) -> Self {
        Self {
            answer,
            asked: RefCell::new(0),
        }
    }
}

impl FilePicker for ScriptedPicker {
    async fn pick_file(&self, _title: &str, _filters: &[FileFilter]) -> Option<PathBuf> {
        *self.asked.borrow_mut() += 1;
        self.answer.clone()
    }
}

pub struct Harness {
    pub editor: Editor,
    pub watcher: ManualWatcher,
    pub notifier: RecordingNotifier,
    pub dir: tempfile::TempDir,
}

impl Harness {
    /// An editor with an active empty project, a manual watcher and a recording notifier.
    pub fn new() -> Self {
        let watcher = ManualWatcher::new();
        let notifier = RecordingNotifier::default();
        let mut editor = Editor::with_services(
            EditorConfig::default(),
            Box::new(watcher.clone()),
            Box::new(notifier.clone()),
        );
        editor.new_project("host");
        Self {
            editor,
            watcher,
            notifier,
            dir: tempfile::tempdir().unwrap(),
        }
    }

    /// Write a file into the harness' temp dir and return its path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    /// Tick until nothing is left to do.
    pub fn settle(&mut self) {
        for _ in 0..4 {
            if self.editor.tick() == 0 && self.editor.scheduler().is_empty() {
                return;
            }
        }
    }

    pub fn touch(&self, path: &Path) {
        self.watcher.touch(path);
    }
}

/// A document with `n` unit cubes side by side.
pub fn cubes_doc(n: usize) -> String {
    let elements: Vec<String> = (0..n)
        .map(|i| {
            format!(
                r#"{{"type":"cube","name":"c{i}","from":[{i},0,0],"to":[{},1,1]}}"#,
                i + 1
            )
        })
        .collect();
    format!(r#"{{"textures":[],"elements":[{}],"meta":{{}}}}"#, elements.join(","))
}
