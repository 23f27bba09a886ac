use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use time::OffsetDateTime;
use tower_sessions_core::{
    SessionStore,
    session::{Id, Record},
    session_store,
};

use crate::{
    error::Error,
    format,
    handler::{CookieSessionHandler, SessionRequest},
};

/// Session id argument passed to the handler. The handler keeps a single session per cycle, so
/// the value is only informational.
const SESSION_ID: &str = "cookie";

/// [`SessionStore`] that persists `tower-sessions` records through a [`CookieSessionHandler`].
///
/// Records are JSON encoded and carried in the `data` field of the session cookie.
#[derive(Debug)]
pub struct HandlerStore<R> {
    handler: Arc<Mutex<CookieSessionHandler<R>>>,
}

impl<R> Clone for HandlerStore<R> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
        }
    }
}

impl<R: SessionRequest> HandlerStore<R> {
    pub fn new(handler: Arc<Mutex<CookieSessionHandler<R>>>) -> Self {
        Self { handler }
    }

    pub fn handler(&self) -> &Arc<Mutex<CookieSessionHandler<R>>> {
        &self.handler
    }

    fn lock(&self) -> Result<MutexGuard<'_, CookieSessionHandler<R>>, Error> {
        self.handler.lock().map_err(|_| Error::Poisoned)
    }

    fn persist_record(&self, record: &Record) -> session_store::Result<()> {
        let data = serde_json::to_string(record)
            .map_err(|err| session_store::Error::Encode(err.to_string()))?;
        self.lock()?.write(&record.id.to_string(), &data)?;
        Ok(())
    }
}

fn record_is_active(record: &Record) -> bool {
    record.expiry_date > OffsetDateTime::now_utc()
}

fn decode_record(data: &str) -> Option<Record> {
    if data.is_empty() {
        return None;
    }
    match serde_json::from_str::<Record>(data) {
        Ok(record) => Some(record),
        Err(err) => {
            tracing::debug!(err = %err, "session cookie data is not a session record");
            None
        }
    }
}

/// Decode a raw session cookie value into an active session [`Record`].
pub fn record_from_cookie(value: &str) -> Option<Record> {
    let payload = format::decode_payload(value).ok()?;
    let now = OffsetDateTime::now_utc().unix_timestamp();
    if payload.is_expired_at(now) {
        return None;
    }
    decode_record(&payload.data).filter(record_is_active)
}

#[async_trait]
impl<R> SessionStore for HandlerStore<R>
where
    R: SessionRequest + std::fmt::Debug + Send + Sync + 'static,
{
    async fn create(&self, record: &mut Record) -> session_store::Result<()> {
        self.persist_record(record)
    }

    async fn save(&self, record: &Record) -> session_store::Result<()> {
        self.persist_record(record)
    }

    async fn load(&self, session_id: &Id) -> session_store::Result<Option<Record>> {
        let data = {
            let mut handler = self.lock()?;
            if !handler.is_opened() {
                handler.open("", SESSION_ID)?;
            }
            handler.read(&session_id.to_string())?
        };

        Ok(decode_record(&data)
            .filter(|record| record.id == *session_id)
            .filter(record_is_active))
    }

    async fn delete(&self, session_id: &Id) -> session_store::Result<()> {
        self.lock()?.destroy(&session_id.to_string());
        Ok(())
    }
}
