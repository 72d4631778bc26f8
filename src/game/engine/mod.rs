pub mod registry;
pub mod repository;
pub mod service;

pub use registry::GameRegistry;
pub use repository::GameRepository;
pub use service::GameService;
