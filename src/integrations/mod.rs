//! External service integrations.

pub mod services {
    pub use crate::services::*;
}

pub mod storage {
    pub use crate::db_storage::*;
}
