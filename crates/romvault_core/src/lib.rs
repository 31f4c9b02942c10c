pub mod config;
pub mod error;
pub mod keys;
pub mod models;
pub mod systems;
pub mod traits;

pub mod prelude {
    pub use super::config::*;
    pub use super::error::*;
    pub use super::keys::*;
    pub use super::models::*;
    pub use super::systems::*;
    pub use super::traits::*;
}
