// Domain-layer modules and shared errors/models
pub mod estimator {
    pub use crate::estimator::*;
}

pub mod validation {
    pub use crate::validation::*;
}

pub mod models {
    pub use crate::models::*;
}

pub mod errors {
    pub use crate::errors::*;
}
