// Card rendering collaborators: markup templating and the rasterization driver.
// Neither participates in pagination decisions beyond producing measurable markup.

pub mod markup;
pub mod raster;

pub use markup::{CardMarkup, CardTemplate};
pub use raster::render_document;
