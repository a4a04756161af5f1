//! Path validation and game-installation discovery.

pub mod discovery;
pub mod validation;

pub use discovery::{
    DiscoveryMethod, GamePathDiscovery, GamePaths, PathDiscoveryResult, RegistryAccess,
};
pub use validation::{
    is_path_safe, normalize_path, PathValidationResult, PathValidationService,
};
