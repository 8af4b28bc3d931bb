pub mod classify;
pub mod detect;
pub mod model;
pub mod registry;
