pub mod config;
pub mod history;
pub mod locate;
pub mod scan;

pub use config::*;
pub use history::*;
pub use locate::*;
pub use scan::*;
