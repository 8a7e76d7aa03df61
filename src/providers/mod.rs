pub mod fred;
pub mod multinational_weights;
pub mod national_weights;
pub mod price_index;
pub mod sdmx;
pub mod util;

pub use multinational_weights::MultinationalWeightsLoader;
pub use national_weights::NationalWeightsLoader;
pub use price_index::PriceIndexLoader;
pub use util::{RetryPolicy, with_retry};
