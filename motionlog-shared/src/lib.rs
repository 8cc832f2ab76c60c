pub mod decoder;
pub mod error;
pub mod framer;
pub mod link;
pub mod protocol;

pub use decoder::{parse, parse_file, ParseOutcome, Sample, SampleSeries};
pub use error::ConnectionError;
pub use link::ByteSource;
#[cfg(feature = "utils")]
pub use link::SerialLink;
