// HTTP routes
pub mod health;
pub mod jobs;
pub mod searches;
pub mod sources;

pub use health::*;
pub use jobs::*;
pub use searches::*;
pub use sources::*;
