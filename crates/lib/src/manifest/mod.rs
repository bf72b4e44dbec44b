//! Build results and their published form.
//!
//! - [`ProductHashMap`] - platform → artifact file name and hash
//! - [`ManifestScript`] - the `build.lua` rendering of a product hash map

mod script;
mod types;

pub use script::ManifestScript;
pub use types::{ProductEntry, ProductHashMap};
