pub mod candle;
pub mod config;
pub mod result;
pub mod script;
pub mod trade;
