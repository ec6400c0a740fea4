//! Shared types for the tollgated API

use serde::{Deserialize, Serialize};

/// 1-based page request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageQuery {
    pub page: u32,
    /// `0` means "use the service default"
    pub page_size: u32,
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 0,
        }
    }
}

impl PageQuery {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self { page, page_size }
    }

    /// Normalise against service limits: page at least 1, size defaulted
    /// when zero and capped at `max_page_size`.
    pub fn clamped(self, default_page_size: u32, max_page_size: u32) -> Self {
        let page_size = match self.page_size {
            0 => default_page_size,
            n => n.min(max_page_size),
        };
        Self {
            page: self.page.max(1),
            page_size,
        }
    }

    /// Row offset of the first item on this page
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }
}

/// Role for authorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientRole {
    /// Local admin - can read and change tokens
    Admin,
    /// Read-only client
    Viewer,
}

impl ClientRole {
    pub fn can_read(&self) -> bool {
        matches!(self, ClientRole::Admin | ClientRole::Viewer)
    }

    pub fn can_write(&self) -> bool {
        matches!(self, ClientRole::Admin)
    }
}

/// Health status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub live: bool,
    pub ready: bool,
    pub store_ok: bool,
    pub mock_time: bool,
}
