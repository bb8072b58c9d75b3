pub mod error;
pub mod facts;
pub mod metrics;
pub mod numeric;
pub mod period;
pub mod results;
pub mod traits;

pub use error::*;
pub use facts::*;
pub use metrics::*;
pub use period::*;
pub use results::*;
pub use traits::*;
