//! Seam for the environment-modules subsystem.
//!
//! On HPC systems the PBS client tools often live behind an environment
//! module that must be loaded before submission. Loading is a site facility
//! this crate depends on but does not implement; callers supply a
//! `ModuleLoader`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModuleError {
    #[error("Failed to load environment module {module}: {reason}")]
    LoadFailed { module: String, reason: String },
}

pub trait ModuleLoader {
    fn load(&self, module: &str) -> Result<(), ModuleError>;
}

/// No-op loader for sites without environment modules.
#[derive(Debug, Default)]
pub struct NullModuleLoader;

impl ModuleLoader for NullModuleLoader {
    fn load(&self, _module: &str) -> Result<(), ModuleError> {
        Ok(())
    }
}
