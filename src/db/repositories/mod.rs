pub mod channel_repository;
pub mod option_repository;
pub mod subscription_repository;
pub mod vote_repository;

pub use channel_repository::*;
pub use option_repository::*;
pub use subscription_repository::*;
pub use vote_repository::*;
