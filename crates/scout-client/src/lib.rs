pub mod extractor;
pub mod language;
pub mod markup;
pub mod transport;

pub use extractor::ScraperExtractor;
pub use language::WhatlangDetector;
pub use transport::ReqwestTransport;
