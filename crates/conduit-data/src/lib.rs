pub mod config;
pub mod fluids;
pub mod loader;

pub use config::{find_config, load_config, load_config_dir};
pub use fluids::{AmountRange, FluidContainerDef, FluidOutputDef, FluidRegistry};
pub use loader::{DataLoadError, Format};
