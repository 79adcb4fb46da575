pub mod authority;
pub mod broadcaster;
pub mod controller;
pub mod handlers;
pub mod history;
pub mod index;
pub mod model;
pub mod router;
pub mod server;
pub mod session;
