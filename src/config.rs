//! Compiler options consumed by the try-construct engine.
//!
//! The options value is immutable and passed explicitly down the
//! analyzer/generator call chain; nothing in this crate reads ambient
//! process-wide state.

/// Source level feature gates relevant to the try construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SourceLevel {
    /// No try-with-resources.
    Java6,
    /// Resources must be fresh declarations.
    Java7,
    /// An effectively-final existing reference may be used as a resource.
    Java9,
}

/// Immutable configuration for one compilation.
#[derive(Debug, Clone)]
pub struct Config {
    pub source_level: SourceLevel,
    /// Enables the null lattice; when off, nullness facts stay `Unknown`.
    pub null_analysis: bool,
    /// Enables close-obligation tracking for expression resources.
    pub resource_leak_analysis: bool,
    /// When off, a catch of a broad checked type (`Exception`, `Throwable`)
    /// is tolerated even if no site in the try region throws it.
    pub report_unused_declared_throwable_catch: bool,
    /// Report empty blocks that carry no comment.
    pub report_undocumented_empty_block: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_level: SourceLevel::Java9,
            null_analysis: true,
            resource_leak_analysis: false,
            report_unused_declared_throwable_catch: true,
            report_undocumented_empty_block: true,
        }
    }
}

impl Config {
    /// True if an existing effectively-final reference is allowed in the
    /// resource position.
    pub fn allows_reference_resources(&self) -> bool {
        self.source_level >= SourceLevel::Java9
    }

    /// True if try-with-resources is available at all.
    pub fn allows_resources(&self) -> bool {
        self.source_level >= SourceLevel::Java7
    }
}
