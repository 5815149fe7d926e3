//! Typed access to [`GeoRecord`]s kept in a [`Store`].

use tracing::debug;

use crate::record::{zip_from_key, zip_key, DecodeError, GeoRecord};
use crate::{Result, Store};

impl Store {
    /// Stores `record` under the key for its ZIP code.
    pub fn insert_record(&self, record: &GeoRecord) -> Result<()> {
        let value = record.encode()?;
        debug!(zip = record.zip_code, "Inserting record");
        self.insert(&record.key(), &value)
    }

    pub fn lookup_record(&self, zip_code: u64) -> Result<GeoRecord> {
        let value = self.lookup(&zip_key(zip_code))?;
        Ok(GeoRecord::decode(&value)?)
    }

    pub fn remove_record(&self, zip_code: u64) -> Result<()> {
        debug!(zip = zip_code, "Removing record");
        self.remove(&zip_key(zip_code))
    }

    /// Every stored record, ordered by ZIP code. An entry whose key or value doesn't decode, or
    /// whose record belongs to another ZIP code than its key, is yielded as an error.
    pub fn records(&self) -> impl Iterator<Item = Result<GeoRecord>> + '_ {
        self.dump().map(|entry| -> Result<GeoRecord> {
            let (key, value) = entry?;
            let zip_code = zip_from_key(&key)?;
            let record = GeoRecord::decode(&value)?;
            if record.zip_code != zip_code {
                return Err(DecodeError::KeyMismatch {
                    key: zip_code,
                    record: record.zip_code,
                }
                .into());
            }
            Ok(record)
        })
    }
}
