// Market data: comparable resolution over stored market statistics.
// resolver.rs and normalize.rs are pure; repository.rs and cache.rs fetch candidates.

pub mod cache;
pub mod handlers;
pub mod normalize;
pub mod repository;
pub mod resolver;
