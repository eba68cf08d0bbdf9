//! Collaborators behind the gate
//!
//! Page rendering, file storage, and subsystem process control. Each sits
//! behind a trait so the router can be assembled with other implementations.

pub mod files;
pub mod renderer;
pub mod subsystems;

pub use files::{FileEntry, FileStorage, LocalFileStorage};
pub use renderer::{Page, PageContext, PageRenderer, TemplatePageRenderer};
pub use subsystems::{ProcessSupervisor, SubsystemState, SubsystemStatus, SubsystemSupervisor};
