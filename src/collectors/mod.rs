pub mod probe;
pub mod system;
pub mod thermal;
