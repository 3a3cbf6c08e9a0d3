use slotmap::SlotMap;
use thiserror::Error;

use crate::constants::PROJECT_FORMAT;
use crate::editor::Project;
use crate::instance::{InstanceId, InstanceNode};

/// What a compile call sees: the project being written and the instances in it.
pub struct CompileContext<'a> {
    pub project: &'a mut Project,
    pub instances: &'a SlotMap<InstanceId, InstanceNode>,
    /// The live instances of the project, in creation order.
    pub live: &'a [InstanceId],
}

/// Writes a project into one file format.
pub trait Codec {
    /// The format id, ie what `CodecPipeline::compile` is called with.
    fn id(&self) -> &'static str;

    fn compile(&self, ctx: &CompileContext) -> Result<String, CodecError>;
}

/// Wraps every compile call of the formats it applies to.
pub trait CompileMiddleware {
    fn id(&self) -> &'static str;

    fn applies_to(&self, _format: &str) -> bool {
        true
    }

    /// Do the work around `next`, which runs the rest of the chain and the codec.
    fn compile(&self, ctx: &mut CompileContext, next: Next<'_>) -> Result<String, CodecError>;
}

/// The rest of a middleware chain. Consumed when run, so it runs at most once.
pub struct Next<'a> {
    codec: &'a dyn Codec,
    rest: &'a [Box<dyn CompileMiddleware>],
}

impl<'a> Next<'a> {
    pub fn run(self, ctx: &mut CompileContext) -> Result<String, CodecError> {
        let mut rest = self.rest;
        while let Some((first, tail)) = rest.split_first() {
            if first.applies_to(self.codec.id()) {
                return first.compile(
                    ctx,
                    Next {
                        codec: self.codec,
                        rest: tail,
                    },
                );
            }
            rest = tail;
        }
        self.codec.compile(ctx)
    }
}

/// The registered codecs and the middleware wrapped around them.
#[derive(Default)]
pub struct CodecPipeline {
    codecs: Vec<Box<dyn Codec>>,
    middleware: Vec<Box<dyn CompileMiddleware>>,
}

impl CodecPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a codec, replacing any codec with the same id.
    pub fn register_codec(&mut self, codec: Box<dyn Codec>) {
        self.codecs.retain(|c| c.id() != codec.id());
        self.codecs.push(codec);
    }

    pub fn codec(&self, format: &str) -> Option<&dyn Codec> {
        self.codecs
            .iter()
            .find(|c| c.id() == format)
            .map(|c| c.as_ref())
    }

    /// Add middleware at the outside of the chain. Ids are unique; a second
    /// registration under the same id replaces the first.
    pub fn register_middleware(&mut self, middleware: Box<dyn CompileMiddleware>) {
        self.unregister_middleware(middleware.id());
        self.middleware.insert(0, middleware);
    }

    /// Remove middleware by id. Returns whether it was registered.
    pub fn unregister_middleware(&mut self, id: &str) -> bool {
        let before = self.middleware.len();
        self.middleware.retain(|m| m.id() != id);
        before != self.middleware.len()
    }

    pub fn has_middleware(&self, id: &str) -> bool {
        self.middleware.iter().any(|m| m.id() == id)
    }

    /// Compile the project into `format`.
    ///
    /// The raw project format is written as is; middleware never sees it.
    pub fn compile(&self, format: &str, ctx: &mut CompileContext) -> Result<String, CodecError> {
        let codec = self
            .codec(format)
            .ok_or_else(|| CodecError::UnknownFormat(format.to_string()))?;
        if format == PROJECT_FORMAT {
            return codec.compile(ctx);
        }
        Next {
            codec,
            rest: &self.middleware,
        }
        .run(ctx)
    }
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("No codec registered for format '{0}'")]
    UnknownFormat(String),
    #[error("Couldn't serialize: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
