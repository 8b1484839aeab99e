#![forbid(unsafe_code)]

pub mod dates;
pub mod error;
pub mod export;
pub mod geo;
pub mod gpx_writer;
pub mod model;
pub mod read;
pub mod registry;
pub mod session;

pub use error::TrackfixError;
