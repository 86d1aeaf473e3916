pub mod codegen;
pub mod export;
