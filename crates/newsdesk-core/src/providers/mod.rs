// RemoteSource implementations backed by real APIs
pub mod newsapi;

pub use newsapi::NewsApiSource;
