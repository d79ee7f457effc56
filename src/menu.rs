pub mod editor;
pub mod engine;
pub mod module;
pub mod route;

pub use engine::MenuEngine;
pub use module::{EngineRequest, Module, ModuleCtx, ModuleFrame};
pub use route::InputRoute;
