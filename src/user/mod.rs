pub mod directory;
pub mod model;
pub mod service;
pub mod source;
