pub mod executor;
pub mod indicators;
pub mod scanner;
pub mod signals;
