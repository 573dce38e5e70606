// src/system/lookup.rs

//! Name → id resolution caches for file ownership.
//!
//! Lookups go through the [`System`] trait and are cached for the duration
//! of one apply run. Misses are cached too: a catalog referencing a missing
//! user fails every resource that names it without re-querying the host.
//! Shared across workers behind mutexes.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{anyhow, Result};

use crate::system::System;

#[derive(Debug, Default)]
pub struct OwnerLookup {
    users: Mutex<HashMap<String, Result<u32, String>>>,
    groups: Mutex<HashMap<String, Result<u32, String>>>,
}

impl OwnerLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user(&self, sys: &dyn System, name: &str) -> Result<u32> {
        let mut users = self.users.lock().expect("user cache poisoned");
        let entry = users
            .entry(name.to_string())
            .or_insert_with(|| sys.lookup_user(name).map_err(|err| format!("{err:#}")));
        entry.clone().map_err(|msg| anyhow!(msg))
    }

    pub fn group(&self, sys: &dyn System, name: &str) -> Result<u32> {
        let mut groups = self.groups.lock().expect("group cache poisoned");
        let entry = groups
            .entry(name.to_string())
            .or_insert_with(|| sys.lookup_group(name).map_err(|err| format!("{err:#}")));
        entry.clone().map_err(|msg| anyhow!(msg))
    }
}
