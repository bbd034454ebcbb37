//! Cache entries.

use std::sync::Arc;
use std::time::Instant;

use crate::contract::ContractDescriptor;
use crate::module::LoadedModule;
use crate::resolver::{ResolutionWarning, ResolvedBinding};

/// The installed instance for one contract type and what it was built from.
///
/// Entries are immutable; a reload swaps in a whole new entry.
#[derive(Debug)]
pub struct CacheEntry {
    pub descriptor: Arc<ContractDescriptor>,
    pub instance: Arc<LoadedModule>,
    pub fingerprint: String,
    pub watchable: bool,
    pub warnings: Vec<ResolutionWarning>,
    pub built_at: Instant,
}

impl CacheEntry {
    pub fn new(descriptor: Arc<ContractDescriptor>, instance: Arc<LoadedModule>, binding: ResolvedBinding) -> Self {
        Self {
            descriptor,
            instance,
            fingerprint: binding.fingerprint,
            watchable: binding.watchable,
            warnings: binding.warnings,
            built_at: Instant::now(),
        }
    }

    pub fn contract(&self) -> &str {
        &self.descriptor.type_name
    }
}
