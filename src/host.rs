//! Services the surrounding editor provides to the instancing code.

use std::path::PathBuf;

use crate::constants::{AJBLUEPRINT_EXTENSIONS, ALL_PROJECT_EXTENSIONS, BBMODEL_EXTENSIONS};

/// Shows modal messages to the user.
pub trait Notifier {
    fn show_warning(&self, title: &str, message: &str);
}

/// Forwards messages to the log. Used when nothing can show a dialog.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn show_warning(&self, title: &str, message: &str) {
        log::warn!("{title}: {message}");
    }
}

/// A named extension filter of a file dialog.
#[derive(Clone, Debug, PartialEq)]
pub struct FileFilter {
    pub name: &'static str,
    pub extensions: &'static [&'static str],
}

impl FileFilter {
    /// The filters offered when choosing a project to instance.
    pub fn project_filters() -> Vec<FileFilter> {
        vec![
            FileFilter {
                name: "All Supported Project Files",
                extensions: &ALL_PROJECT_EXTENSIONS,
            },
            FileFilter {
                name: "Blockbench Model",
                extensions: &BBMODEL_EXTENSIONS,
            },
            FileFilter {
                name: "Animated Java Blueprint",
                extensions: &AJBLUEPRINT_EXTENSIONS,
            },
        ]
    }

    pub fn matches(&self, path: &std::path::Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| self.extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
    }
}

/// Asks the user for a file.
///
/// Resolves to `None` when the dialog was cancelled.
pub trait FilePicker {
    fn pick_file(
        &self,
        title: &str,
        filters: &[FileFilter],
    ) -> impl std::future::Future<Output = Option<PathBuf>>;
}

/// Picks a fixed path without asking. The binary uses it to drive the select action.
#[derive(Clone, Debug, Default)]
pub struct FixedPicker(pub Option<PathBuf>);

impl FilePicker for FixedPicker {
    async fn pick_file(&self, _title: &str, filters: &[FileFilter]) -> Option<PathBuf> {
        let path = self.0.clone()?;
        if filters.iter().any(|f| f.matches(&path)) {
            Some(path)
        } else {
            log::warn!("'{}' isn't a supported project file", path.display());
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_accept_project_extensions() {
        let filters = FileFilter::project_filters();
        assert!(filters[0].matches("a/b.bbmodel".as_ref()));
        assert!(filters[0].matches("a/b.AJBLUEPRINT".as_ref()));
        assert!(!filters[1].matches("a/b.ajblueprint".as_ref()));
        assert!(!filters[0].matches("a/b.json".as_ref()));
    }

    #[test]
    fn fixed_picker_respects_filters() {
        let picker = FixedPicker(Some("x.bbmodel".into()));
        let filters = FileFilter::project_filters();
        assert!(pollster::block_on(picker.pick_file("t", &filters)).is_some());
        let picker = FixedPicker(Some("x.txt".into()));
        assert!(pollster::block_on(picker.pick_file("t", &filters)).is_none());
    }
}
