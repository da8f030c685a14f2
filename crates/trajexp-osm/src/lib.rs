//! Trajexp OSM - Building footprint retrieval from the Overpass API
//!
//! Builds bounding-box queries, talks to the endpoint with a retry policy,
//! parses the response into footprints, and caches results per grid cell.

pub mod cache;
pub mod fetcher;
pub mod parse;
pub mod query;
pub mod transport;

pub use cache::{CacheKey, FetchCache};
pub use fetcher::FootprintFetcher;
pub use transport::{OverpassTransport, ReqwestTransport, TransportError};
