pub mod command;
pub mod execution;
pub mod interpret;
pub mod policy;
pub mod response;
