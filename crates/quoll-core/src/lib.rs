//! PBS configuration and site facilities for quoll.

pub mod conf;
pub mod modules;

pub use conf::{ConfError, PbsConf};
pub use modules::{ModuleError, ModuleLoader, NullModuleLoader};
