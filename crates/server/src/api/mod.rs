pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod verify;

pub use routes::create_router;
