//! UUID helpers.

use uuid::Uuid;

/// Generate a new time-ordered UUIDv7.
#[inline]
pub fn new_v7() -> Uuid {
    Uuid::now_v7()
}

/// Short unique key for records that do not have an id yet.
///
/// Time-ordered so temporary objects sort by creation in the durable store.
pub fn temporary_key() -> String {
    new_v7().simple().to_string()
}
