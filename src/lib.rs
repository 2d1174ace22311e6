// Library surface for the walktrack binary, headless drivers and tests.
pub mod config;
pub mod error;
pub mod geo;
pub mod runtime;
pub mod session;
pub mod trace;
pub mod util;
pub mod walk_type;

pub use geo::GeoPoint;
pub use session::{SessionEnded, WalkSession, WalkSnapshot};
pub use walk_type::WalkType;
