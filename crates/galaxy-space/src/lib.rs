//! Procedural galaxy content: star types, placement, level of detail and the
//! render layer each object draws on.

mod error;
pub mod galaxy;
mod layer;
pub mod lod;
pub mod object;
pub mod placement;
pub mod star_types;

pub use error::ConfigurationError;
pub use galaxy::{Galaxy, HAZE_COLOR, MAX_HAZE_RATIO, MAX_STAR_COUNT};
pub use lod::{LodParams, LodSample, LodScaler};
pub use object::{CelestialObject, ObjectId, ObjectKind};
pub use placement::{PositionLaw, Recipe, SpiralGalaxyLaw, gaussian, law_fn, place};
pub use star_types::{StarType, StarTypeTable};
