/// Message published when the connectivity check fails
pub const NO_CONNECTION: &str = "No internet connection";
/// Message published for timeouts and other I/O failures
pub const NETWORK_FAILURE: &str = "Network Failure";
/// Message published when a response can't be decoded
pub const CONVERSION_ERROR: &str = "Conversion error";

/// Tri-state result handed to subscribers in place of errors
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Loading,
    Success(T),
    Error(String),
}

impl<T> Outcome<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, Outcome::Loading)
    }

    /// Success or Error - the end of one fetch
    pub fn is_terminal(&self) -> bool {
        !self.is_loading()
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            Outcome::Success(data) => Some(data),
            _ => None,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Outcome::Error(message) => Some(message),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Loading => Outcome::Loading,
            Outcome::Success(data) => Outcome::Success(f(data)),
            Outcome::Error(message) => Outcome::Error(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors() {
        let loading: Outcome<u32> = Outcome::Loading;
        assert!(loading.is_loading());
        assert!(loading.data().is_none());

        let ok = Outcome::Success(3);
        assert!(ok.is_terminal());
        assert_eq!(ok.data(), Some(&3));
        assert_eq!(ok.map(|n| n * 2), Outcome::Success(6));

        let err: Outcome<u32> = Outcome::Error(NETWORK_FAILURE.to_string());
        assert_eq!(err.message(), Some("Network Failure"));
        assert_eq!(err.map(|n| n + 1), Outcome::Error("Network Failure".into()));
    }
}
