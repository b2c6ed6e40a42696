pub mod assembler;
pub mod desk;
pub mod dispatcher;
pub mod parser;
