//! Concrete analyzers dispatched by the pipeline.
//!
//! Priorities stagger the built-in set into dependency order: the crash
//! header is extracted first (and publishes the detected game), the plugin
//! list second, then the crash-generator settings scan, then the analyzers
//! that consume those published facts.

pub mod crash_header;
pub mod fcx;
pub mod memory;
pub mod plugins;
pub mod settings;

use std::sync::Arc;

use crate::core::analyzer::Analyzer;

pub use crash_header::{CrashHeader, CrashHeaderAnalyzer};
pub use fcx::FcxAnalyzer;
pub use memory::MemoryConflictAnalyzer;
pub use plugins::{PluginEntry, PluginList, PluginListAnalyzer};
pub use settings::CrashGenSettingsAnalyzer;

/// The default analyzer set, in registration order.
pub fn default_analyzers() -> Vec<Arc<dyn Analyzer>> {
    vec![
        Arc::new(CrashHeaderAnalyzer::default()),
        Arc::new(PluginListAnalyzer::default()),
        Arc::new(CrashGenSettingsAnalyzer::default()),
        Arc::new(MemoryConflictAnalyzer::default()),
        Arc::new(FcxAnalyzer::default()),
    ]
}
