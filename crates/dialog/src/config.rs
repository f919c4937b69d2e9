use std::{collections::HashSet, num::NonZeroUsize};

use serde::Deserialize;
use shared::domain::UserId;

pub const DEFAULT_PAGE_SIZE: usize = 4;

/// Options fixed at construction time and shared by every dialog.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DialogConfig {
    pub admin_ids: HashSet<UserId>,
    pub page_size: NonZeroUsize,
    /// Drop actions coming from group chats and channels.
    pub private_chats_only: bool,
}

impl DialogConfig {
    pub fn is_admin(&self, user_id: UserId) -> bool {
        self.admin_ids.contains(&user_id)
    }

    pub fn with_admins(mut self, admins: impl IntoIterator<Item = UserId>) -> Self {
        self.admin_ids.extend(admins);
        self
    }

    pub fn with_page_size(mut self, page_size: NonZeroUsize) -> Self {
        self.page_size = page_size;
        self
    }
}

impl Default for DialogConfig {
    fn default() -> Self {
        Self {
            admin_ids: HashSet::new(),
            page_size: NonZeroUsize::new(DEFAULT_PAGE_SIZE).unwrap_or(NonZeroUsize::MIN),
            private_chats_only: true,
        }
    }
}
