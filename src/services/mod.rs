mod lifecycle_admin;

use std::sync::Arc;

pub use lifecycle_admin::{ActionOutcome, AdminAction, BulkActionReport, LifecycleAdminService};

use crate::db::DbPool;

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub lifecycle_admin: LifecycleAdminService,
}

impl Services {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self {
            lifecycle_admin: LifecycleAdminService::new(db),
        }
    }
}
