// Helper for generating UUIDv7 (timestamp-sortable UUIDs)
//
// Refresh tokens, claim tokens and API keys are keyed by UUIDv7 generated
// app-side so that rows sort by issuance time. Users keep PG's
// gen_random_uuid() (v4).

use uuid::Uuid;

/// Generate a new UUIDv7 (timestamp-sortable).
pub fn uuidv7() -> Uuid {
    Uuid::now_v7()
}

/// Generate a new UUIDv7 rendered as a hyphenated string id.
pub fn new_id() -> String {
    uuidv7().to_string()
}
