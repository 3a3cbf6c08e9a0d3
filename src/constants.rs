/// Element type tag of an instance node, as written into saved projects.
pub const INSTANCE_ELEMENT_TYPE: &str = "project_instancing:instance";
/// Element type tag of the only primitive supported inside referenced documents.
pub const CUBE_ELEMENT_TYPE: &str = "cube";

pub const DEFAULT_INSTANCE_NAME: &str = "Project Instance";
pub const IMPORTED_GROUP_NAME: &str = "Imported Model";

/// Format id of the raw project codec. Compile middleware never wraps it.
pub const PROJECT_FORMAT: &str = "project";
/// Format id of the plain model export codec.
pub const MODEL_FORMAT: &str = "model";
pub const PROJECT_FORMAT_VERSION: &str = "4.10";

pub const ALL_PROJECT_EXTENSIONS: [&str; 2] = ["bbmodel", "ajblueprint"];
pub const BBMODEL_EXTENSIONS: [&str; 1] = ["bbmodel"];
pub const AJBLUEPRINT_EXTENSIONS: [&str; 1] = ["ajblueprint"];

pub const NO_ELEMENTS_TITLE: &str = "No elements found";
pub const NO_ELEMENTS_MESSAGE: &str =
    "The selected project does not contain any supported elements to instance.";

/// Faces whose normals differ by more than this many degrees keep their shared edge in the outline.
pub const OUTLINE_THRESHOLD_DEGREES: f32 = 1.0;
