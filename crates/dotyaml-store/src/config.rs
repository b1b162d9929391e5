//! Per-store and per-init options

use crate::templates::Template;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Options applied to every operation of a [`crate::ConfigStore`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreOptions {
    /// Treat a missing file as an empty document when writing
    pub create: bool,
    /// Compute results without touching the filesystem
    pub dry_run: bool,
    /// Give up waiting for the lock after this long (`None` waits forever)
    pub lock_timeout: Option<Duration>,
}

impl StoreOptions {
    /// Create default options
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With create-if-missing
    #[inline]
    #[must_use]
    pub fn with_create(mut self, create: bool) -> Self {
        self.create = create;
        self
    }

    /// With dry-run
    #[inline]
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// With lock timeout
    #[inline]
    #[must_use]
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = Some(timeout);
        self
    }
}

/// Options for [`crate::ConfigStore::init`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitOptions {
    /// Initial contents
    pub template: Template,
    /// Overwrite an existing file
    pub force: bool,
}

impl InitOptions {
    /// Create default options (planning template, no overwrite)
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With template
    #[inline]
    #[must_use]
    pub fn with_template(mut self, template: Template) -> Self {
        self.template = template;
        self
    }

    /// With overwrite
    #[inline]
    #[must_use]
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}
