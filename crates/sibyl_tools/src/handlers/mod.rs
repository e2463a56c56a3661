//! Tool handler implementations. Each handler takes the toolkit plus typed
//! arguments and returns the string the model will see. Handlers render
//! expected failures (bad SQL, missing sheets) as readable tool output
//! rather than propagating them, so the model can correct course.

pub mod discovery;
pub mod email;
pub mod query;
pub mod sheets;
