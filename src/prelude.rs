pub use crate::error::{Error, Result};

pub use crate::json::DeserializeJsonWithPath as _;
