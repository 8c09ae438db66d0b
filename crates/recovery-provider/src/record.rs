//! Records of issued recovery tokens.

use parking_lot::Mutex;

/// Lifecycle state of an issued token.
///
/// A record starts `Provisional` at issuance, becomes `Confirmed` when the
/// recovery provider reports a successful save, and `Invalid` on explicit
/// invalidation or repudiation. Failed saves delete the record outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRecordStatus {
    Provisional,
    Confirmed,
    Invalid,
}

/// What the account provider remembers about an issued token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRecord {
    /// Token id as 32 hex characters.
    pub id: String,
    /// Origin of the recovery provider the token was deposited with.
    pub issuer: String,
    /// Account the token recovers.
    pub username: String,
    /// Hex SHA-256 of the serialized token bytes.
    pub hash: String,
    pub status: TokenRecordStatus,
}

/// Storage for token records.
///
/// Injected so hosts can back it with real persistence and tests with the
/// in-memory implementation.
pub trait TokenRecordStore: Send + Sync {
    fn insert(&self, record: TokenRecord);

    fn get_by_id(&self, id: &str) -> Option<TokenRecord>;

    fn get_by_hash(&self, hash: &str) -> Option<TokenRecord>;

    /// Records for a user, optionally filtered by status.
    fn for_user(&self, username: &str, status: Option<TokenRecordStatus>) -> Vec<TokenRecord>;

    /// Returns `false` when no record has that id.
    fn set_status(&self, id: &str, status: TokenRecordStatus) -> bool;

    /// Confirm a renewed token and invalidate the record it obsoletes as one
    /// transition, so no reader observes the new token confirmed while the
    /// old one is still live.
    fn confirm_replacing(&self, new_id: &str, obsoleted_id: Option<&str>) -> bool;

    /// Returns `false` when no record has that id.
    fn delete(&self, id: &str) -> bool;
}

/// In-memory, process-lifetime record store.
#[derive(Debug, Default)]
pub struct MemoryTokenRecordStore {
    records: Mutex<Vec<TokenRecord>>,
}

impl MemoryTokenRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenRecordStore for MemoryTokenRecordStore {
    fn insert(&self, record: TokenRecord) {
        self.records.lock().push(record);
    }

    fn get_by_id(&self, id: &str) -> Option<TokenRecord> {
        self.records.lock().iter().find(|r| r.id == id).cloned()
    }

    fn get_by_hash(&self, hash: &str) -> Option<TokenRecord> {
        self.records.lock().iter().find(|r| r.hash == hash).cloned()
    }

    fn for_user(&self, username: &str, status: Option<TokenRecordStatus>) -> Vec<TokenRecord> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.username == username && status.map_or(true, |s| r.status == s))
            .cloned()
            .collect()
    }

    fn set_status(&self, id: &str, status: TokenRecordStatus) -> bool {
        let mut records = self.records.lock();
        match records.iter_mut().find(|r| r.id == id) {
            Some(record) => {
                record.status = status;
                true
            }
            None => false,
        }
    }

    fn confirm_replacing(&self, new_id: &str, obsoleted_id: Option<&str>) -> bool {
        let mut records = self.records.lock();
        let confirmed = match records.iter_mut().find(|r| r.id == new_id) {
            Some(record) => {
                record.status = TokenRecordStatus::Confirmed;
                true
            }
            None => false,
        };
        if confirmed {
            if let Some(old_id) = obsoleted_id {
                if let Some(record) = records.iter_mut().find(|r| r.id == old_id) {
                    record.status = TokenRecordStatus::Invalid;
                }
            }
        }
        confirmed
    }

    fn delete(&self, id: &str) -> bool {
        let mut records = self.records.lock();
        let before = records.len();
        records.retain(|r| r.id != id);
        records.len() < before
    }
}
