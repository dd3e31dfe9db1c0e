// ============================================================================
// Core Actor Abstractions
// ============================================================================
//
// Generic, reusable actor pieces shared by the device actors:
// termination notices, health reporting and reply forwarding.
//
// ============================================================================

pub mod health;
pub mod lifecycle;
pub mod reply;

// Re-export core types
pub use health::*;
pub use lifecycle::*;
pub use reply::*;
