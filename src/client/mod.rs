//! Consumer side: transports to a publisher and the cached fetcher.

pub mod fetcher;
pub mod transport;

pub use fetcher::{
    CacheEntry, CachePayload, CacheStatus, CachedFetcher, FetchError, FetchedData, Freshness,
    CACHE_FILE, DEFAULT_TTL,
};
pub use transport::{
    fetch_payload, FileTransport, HttpTransport, RemotePayload, Transport, TransportError,
};
