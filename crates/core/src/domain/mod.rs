pub mod account;
pub mod contract;
pub mod post;
pub mod stats;
pub mod summary;
