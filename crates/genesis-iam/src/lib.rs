pub mod error;
pub mod kernel;

pub use error::IamError;
pub use kernel::IamKernel;
