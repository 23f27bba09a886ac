use tower_sessions_core::session_store;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// `open` or `read` was called before the dispatcher handed over a main request.
    #[error("cannot access the session without an active request")]
    NoActiveRequest,

    #[error("malformed session cookie: {0}")]
    Decode(String),

    #[error("cannot encode session cookie: {0}")]
    Encode(String),

    #[error("cookie session handler lock is poisoned")]
    Poisoned,
}

impl From<Error> for session_store::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Decode(msg) => session_store::Error::Decode(msg),
            Error::Encode(msg) => session_store::Error::Encode(msg),
            err @ (Error::NoActiveRequest | Error::Poisoned) => {
                session_store::Error::Backend(err.to_string())
            }
        }
    }
}
