use std::time::Duration;

use cvr_ledger::Page;
use cvr_types::Bump;

/// Tuning for [`DeploymentService`](crate::DeploymentService).
#[derive(Clone, Debug, PartialEq)]
pub struct ServiceConfig {
    /// Upper bound on every record store and payload store call.
    pub io_timeout: Duration,
    /// How many times a deployment that lost a race is re-run before the
    /// conflict is reported.
    pub conflict_retries: u32,
    /// Pin payloads after storing them (content-addressed mode only).
    pub pin_payloads: bool,
    /// Component incremented for each accepted deployment.
    pub default_bump: Bump,
    pub default_page_limit: usize,
    pub max_page_limit: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            io_timeout: Duration::from_secs(5),
            conflict_retries: 3,
            pin_payloads: true,
            default_bump: Bump::Patch,
            default_page_limit: 20,
            max_page_limit: 100,
        }
    }
}

impl ServiceConfig {
    /// Pagination window from optional query values. The limit is clamped
    /// to `1..=max_page_limit`.
    pub fn page(&self, limit: Option<usize>, offset: Option<usize>) -> Page {
        let max = self.max_page_limit.max(1);
        let limit = limit.unwrap_or(self.default_page_limit).clamp(1, max);
        Page::new(limit, offset.unwrap_or(0))
    }
}
