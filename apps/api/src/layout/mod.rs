// Pagination core: cost model, estimation, segmentation, packing, refinement.
// Everything up to refinement is synchronous and side-effect-free; the oracle
// call inside `refine` is the only suspension point.

pub mod cost_model;
pub mod estimator;
pub mod packer;
pub mod pipeline;
pub mod refine;
pub mod segmenter;

pub use cost_model::{default_budget, default_cost_model, CardBudget};
pub use pipeline::{Pagination, Paginator, PipelineError};
