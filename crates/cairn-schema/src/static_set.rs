use std::sync::Mutex;

use cairn_types::BlobRef;
use serde_json::Value;

use crate::builder::new_camli_map;
use crate::map::SchemaMap;

/// Append-only, concurrency-safe list of member references.
///
/// Used to build the `static-set` blob behind a directory. Parallel upload
/// workers may call [`add`](Self::add) as children complete; the resulting
/// order is whatever interleaving the mutex produced, so callers that need
/// a deterministic order must serialize their own additions. Duplicates are
/// kept.
#[derive(Debug, Default)]
pub struct StaticSet {
    members: Mutex<Vec<BlobRef>>,
}

impl StaticSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a member.
    pub fn add(&self, member: BlobRef) {
        self.members.lock().expect("lock poisoned").push(member);
    }

    pub fn len(&self) -> usize {
        self.members.lock().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.lock().expect("lock poisoned").is_empty()
    }

    /// Snapshot of the current members.
    pub fn members(&self) -> Vec<BlobRef> {
        self.members.lock().expect("lock poisoned").clone()
    }

    /// The `static-set` schema map for the current members.
    pub fn map(&self) -> SchemaMap {
        let members: Vec<Value> = {
            let members = self.members.lock().expect("lock poisoned");
            members.iter().map(|r| Value::from(r.to_string())).collect()
        };
        let mut m = new_camli_map("static-set");
        m.insert("members", members);
        m
    }
}

impl FromIterator<BlobRef> for StaticSet {
    fn from_iter<I: IntoIterator<Item = BlobRef>>(iter: I) -> Self {
        Self {
            members: Mutex::new(iter.into_iter().collect()),
        }
    }
}
