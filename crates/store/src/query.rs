use common::UserId;
use domain::{Order, OrderStatus};

/// Ordering of listed orders by creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

/// Builder for order listings.
///
/// An empty query lists every order, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderQuery {
    /// Only orders owned by this user.
    pub user_id: Option<UserId>,

    /// Only orders in this status.
    pub status: Option<OrderStatus>,

    /// Only orders without a process handle.
    pub awaiting_process: bool,

    pub sort: SortOrder,

    /// Maximum number of orders to return.
    pub limit: Option<usize>,
}

impl OrderQuery {
    /// Creates a query matching every order.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query for one owner's orders.
    pub fn for_user(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
            ..Default::default()
        }
    }

    /// Creates a query for orders whose process never started, oldest first.
    pub fn awaiting_process() -> Self {
        Self {
            awaiting_process: true,
            sort: SortOrder::OldestFirst,
            ..Default::default()
        }
    }

    /// Filters by status.
    pub fn status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Filters by an optional status; `None` leaves the query unchanged.
    pub fn maybe_status(mut self, status: Option<OrderStatus>) -> Self {
        if status.is_some() {
            self.status = status;
        }
        self
    }

    /// Lists oldest orders first.
    pub fn oldest_first(mut self) -> Self {
        self.sort = SortOrder::OldestFirst;
        self
    }

    /// Limits the number of orders returned.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Returns true if the order passes every filter of this query.
    pub fn matches(&self, order: &Order) -> bool {
        if let Some(user_id) = self.user_id
            && !order.is_owned_by(user_id)
        {
            return false;
        }
        if let Some(status) = self.status
            && order.status() != status
        {
            return false;
        }
        if self.awaiting_process && order.process_handle().is_some() {
            return false;
        }
        true
    }
}
