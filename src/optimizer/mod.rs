//! Search strategies
//!
//! Every strategy implements [`SearchStrategy`]: given the rounds persisted so
//! far, it proposes the next parameter set or reports that it is done. The
//! harness only ever talks to that trait.
//!
//! - [`GridSearch`]: exhaustive Cartesian product, feedback ignored
//! - [`BayesianSearch`]: Gaussian-process surrogate with expected improvement
//!   (default) or lower confidence bound acquisition
//!
//! # Examples
//!
//! ```ignore
//! // Grid: 3 x 2 x 2 = 12 rounds
//! --mode grid --grid "work_mem=4MB,16MB,64MB" --grid "effective_cache_size=100MB,200MB" \
//!     --grid "random_page_cost=2.0,3.0"
//!
//! // Model-based: 20 proposals over two bounded parameters
//! --mode optimize --tune "work_mem:4MB:256MB" --tune "random_page_cost:1.0:4.0" --rounds 20
//! ```

pub mod grid;
mod optimizer;
pub mod space;
pub mod strategy;
mod surrogate;

pub use grid::{GridAxis, GridSearch};
pub use optimizer::{Acquisition, BayesianSearch, Measurement, OptimizationResult, OptimizerConfig};
pub use space::{Dimension, ParameterSpace};
pub use strategy::{best_round, RoundRecord, SearchStrategy};
