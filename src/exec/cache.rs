//! Output cache for idempotent read commands.
//!
//! Only installed into a tool context by end-to-end helpers; production
//! contexts run without one and the CommandBuilder caching toggle is then a
//! no-op.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::executor::Invocation;

type CacheKey = (String, Vec<String>, Vec<(String, String)>);

#[derive(Default)]
pub struct OutputCache {
    entries: Mutex<HashMap<CacheKey, (Instant, String)>>,
}

fn key_of(invocation: &Invocation) -> CacheKey {
    (
        invocation.command.clone(),
        invocation.args.clone(),
        invocation.env.clone(),
    )
}

impl OutputCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached output for the invocation if it is younger than `ttl`.
    pub fn get(&self, invocation: &Invocation, ttl: Duration) -> Option<String> {
        let mut entries = self.entries.lock().unwrap();
        let key = key_of(invocation);
        match entries.get(&key) {
            Some((stored_at, output)) if stored_at.elapsed() < ttl => Some(output.clone()),
            Some(_) => {
                entries.remove(&key);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, invocation: &Invocation, output: String) {
        self.entries
            .lock()
            .unwrap()
            .insert(key_of(invocation), (Instant::now(), output));
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
