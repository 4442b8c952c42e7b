// Domain-layer modules and shared errors/models
pub mod consultation {
    pub use crate::consultation::*;
}

pub mod clustering {
    pub use crate::clustering::*;
}

pub mod normalizer {
    pub use crate::normalizer::*;
}

pub mod progress {
    pub use crate::progress::*;
}

pub mod models {
    pub use crate::models::*;
}

pub mod errors {
    pub use crate::errors::*;
}
