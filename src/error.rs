use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by the cache engine, the node loader and the master.
///
/// The enum is `Clone` so a single-flight leader can hand the same outcome to
/// every waiter attached to its flight.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The key does not exist in any database. Surfaced verbatim to clients
    /// as 404 and never cached.
    #[error("data not found")]
    DataNotFound,

    /// The fastest-database race exhausted its deadline without a winner.
    #[error("database query timed out")]
    DatabaseQueryTimeout,

    /// A miss reached the loader while the node knows of no databases.
    #[error("databases not available")]
    NoDatabases,

    /// Network-level failure talking to a peer, database or node.
    #[error("transport: {0}")]
    Transport(String),

    /// The remote answered, but outside the protocol: unexpected status or an
    /// empty success body.
    #[error("unexpected response: {0}")]
    Protocol(String),

    /// A request body or RPC parameter failed validation.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The metadata store rejected a roster read or write.
    #[error("metadata store: {0}")]
    Persistence(String),
}

impl Error {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Error::Transport(err.to_string())
    }

    pub fn persistence(err: impl std::fmt::Display) -> Self {
        Error::Persistence(err.to_string())
    }
}
