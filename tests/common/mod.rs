#![allow(dead_code)] // Each test binary uses a different subset

pub mod builders;
pub mod mock_backend;
pub mod mock_worker;

pub use builders::*;
pub use mock_backend::*;
pub use mock_worker::*;
