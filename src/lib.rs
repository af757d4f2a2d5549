#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod ir;
pub mod layout;
pub mod layout_dump;

#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{
    Config, LayoutConfig, LayoutRequest, SelectionOptions, SolverConfig, SolverPhase, load_config,
};
pub use ir::{Partnership, Person, StromData};
pub use layout::{LayoutResult, compute_layout};
pub use layout_dump::{PipelineSnapshot, debug_layout};
