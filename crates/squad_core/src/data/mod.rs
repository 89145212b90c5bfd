//! Content data: unit templates, weapons and the obstacle table.
//!
//! Everything here is plain data that can be written in RON. The
//! [`ContentRegistry`] turns it into entities; it performs no IO, callers
//! hand it the RON text.

mod obstacle_data;
mod registry;
mod unit_data;
mod weapon_data;

pub use obstacle_data::{Footprint, ObstacleData};
pub use registry::{ContentData, ContentRegistry};
pub use unit_data::UnitData;
pub use weapon_data::WeaponData;

/// RON options for every data file: optional fields may be written bare,
/// `facing: 3.14` rather than `facing: Some(3.14)`.
#[must_use]
pub fn ron_options() -> ron::Options {
    ron::Options::default().with_default_extension(ron::extensions::Extensions::IMPLICIT_SOME)
}
