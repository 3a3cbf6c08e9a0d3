use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::Parser as _;
use project_instancing::{
    constants::MODEL_FORMAT,
    editor::{Editor, EditorConfig},
    host::FixedPicker,
};

const MAX_SETTLE_FRAMES: usize = 8;

/// Open a project, load its instances and print the project compiled into the given format.
#[derive(Debug, clap::Parser)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// The project file to open.
    project: PathBuf,

    /// The format to compile to.
    #[arg(default_value = MODEL_FORMAT)]
    format: String,

    /// Reference another project file through a new instance before compiling.
    #[arg(long)]
    instance: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Args::parse();

    let mut editor = Editor::new(EditorConfig {
        watch_files: false,
        ..EditorConfig::default()
    });
    editor
        .open_project(&args.project)
        .with_context(|| format!("couldn't open {}", args.project.display()))?;

    if let Some(reference) = args.instance {
        editor.create_instance(None)?;
        let picker = FixedPicker(Some(reference));
        if pollster::block_on(editor.select_project_to_instance(&picker)).is_none() {
            bail!("couldn't reference the given project");
        }
    }

    for _ in 0..MAX_SETTLE_FRAMES {
        if editor.tick() == 0 && editor.scheduler().is_empty() {
            break;
        }
    }
    log::info!("{} live instances", editor.live_instances().len());

    let output = editor.export(&args.format)?;
    println!("{output}");
    Ok(())
}
