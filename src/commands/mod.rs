pub mod export;
pub mod process;

pub use export::ExportCommand;
pub use process::ProcessCommand;
