pub mod bbox;
pub mod crop;
pub mod mask;
