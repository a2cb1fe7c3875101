//! Session store trait.

use crate::error::Result;
use crate::session::{PersistedFlow, SessionId};

/// Caller-supplied persistence for flow state.
///
/// One [`PersistedFlow`] is kept per `(session id, flow namespace)` pair.
///
/// # Implementation Notes
///
/// - Writes are last-write-wins; the engine takes no locks
/// - The engine never clears state on its own, only through [`SessionStore::clear`]
pub trait SessionStore: Send + Sync {
    /// Load the persisted state of one flow.
    ///
    /// # Returns
    ///
    /// `None` if nothing was saved for this session and namespace yet.
    ///
    /// # Errors
    ///
    /// Returns error if the backing store fails or holds undecodable data.
    fn load(
        &self,
        session_id: &SessionId,
        namespace: &str,
    ) -> impl std::future::Future<Output = Result<Option<PersistedFlow>>> + Send;

    /// Save the state of one flow, replacing what was there.
    ///
    /// # Errors
    ///
    /// Returns error if the backing store fails.
    fn save(
        &self,
        session_id: &SessionId,
        namespace: &str,
        flow: &PersistedFlow,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Forget the state of one flow.
    ///
    /// # Errors
    ///
    /// Returns error if the backing store fails.
    fn clear(
        &self,
        session_id: &SessionId,
        namespace: &str,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}
