pub mod catalog;
pub mod enums;
pub mod filters;
pub mod lab;
pub mod patient;
pub mod procedure;

pub use catalog::*;
pub use filters::*;
pub use lab::*;
pub use patient::*;
pub use procedure::*;
