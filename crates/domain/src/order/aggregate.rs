//! Order aggregate implementation.

use chrono::{DateTime, Utc};
use common::{OrderId, UserId};
use serde::{Deserialize, Serialize};

use super::{Money, OrderLine, OrderStatus, ShippingAddress};
use crate::error::OrderError;

/// Order aggregate root.
///
/// Lines, total and shipping address are captured when the order is placed
/// and never change afterwards. Status, tracking number and process handle
/// are the only mutable parts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    user_id: UserId,
    lines: Vec<OrderLine>,
    total: Money,
    status: OrderStatus,
    shipping_address: ShippingAddress,
    tracking_number: Option<String>,
    process_handle: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Raw fields of a persisted order, used by storage to rebuild an [`Order`].
#[derive(Debug, Clone)]
pub struct OrderParts {
    pub id: OrderId,
    pub user_id: UserId,
    pub lines: Vec<OrderLine>,
    pub total: Money,
    pub status: OrderStatus,
    pub shipping_address: ShippingAddress,
    pub tracking_number: Option<String>,
    pub process_handle: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Places a new pending order from already-priced lines.
    ///
    /// The total is the sum of the line subtotals at this moment.
    pub fn place(
        user_id: UserId,
        lines: Vec<OrderLine>,
        shipping_address: ShippingAddress,
    ) -> Result<Self, OrderError> {
        if lines.is_empty() {
            return Err(OrderError::NoItems);
        }
        if let Some(line) = lines.iter().find(|line| line.quantity == 0) {
            return Err(OrderError::InvalidQuantity {
                quantity: line.quantity,
            });
        }
        shipping_address.validate()?;

        let total = OrderLine::checked_total(&lines)?;
        let now = Utc::now();

        Ok(Self {
            id: OrderId::new(),
            user_id,
            lines,
            total,
            status: OrderStatus::Pending,
            shipping_address,
            tracking_number: None,
            process_handle: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Rebuilds an order from storage, checking the stored total against
    /// its lines.
    pub fn from_parts(parts: OrderParts) -> Result<Self, OrderError> {
        let computed = OrderLine::checked_total(&parts.lines)?;
        if computed != parts.total {
            return Err(OrderError::TotalMismatch {
                stored: parts.total.cents(),
                computed: computed.cents(),
            });
        }

        Ok(Self {
            id: parts.id,
            user_id: parts.user_id,
            lines: parts.lines,
            total: parts.total,
            status: parts.status,
            shipping_address: parts.shipping_address,
            tracking_number: parts.tracking_number,
            process_handle: parts.process_handle,
            created_at: parts.created_at,
            updated_at: parts.updated_at,
        })
    }
}

// Query methods
impl Order {
    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Returns the lines in the order they were requested.
    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    /// Returns the total captured at creation.
    pub fn total(&self) -> Money {
        self.total
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn shipping_address(&self) -> &ShippingAddress {
        &self.shipping_address
    }

    pub fn tracking_number(&self) -> Option<&str> {
        self.tracking_number.as_deref()
    }

    /// Returns the external fulfillment process handle, if the process
    /// engine acknowledged a start.
    pub fn process_handle(&self) -> Option<&str> {
        self.process_handle.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns the sum of all line quantities.
    pub fn total_quantity(&self) -> u64 {
        self.lines.iter().map(|line| u64::from(line.quantity)).sum()
    }

    /// Returns true if the order belongs to the given user.
    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.user_id == user_id
    }
}

// Mutations
impl Order {
    /// Sets the status unconditionally.
    pub fn set_status(&mut self, status: OrderStatus) {
        self.status = status;
        self.touch();
    }

    /// Records a tracking number and moves the order to `Shipped`,
    /// whatever its previous status.
    pub fn assign_tracking_number(
        &mut self,
        tracking_number: impl Into<String>,
    ) -> Result<(), OrderError> {
        let tracking_number = tracking_number.into();
        if tracking_number.trim().is_empty() {
            return Err(OrderError::BlankTrackingNumber);
        }

        self.tracking_number = Some(tracking_number);
        self.status = OrderStatus::Shipped;
        self.touch();
        Ok(())
    }

    /// Links the order to its process instance.
    ///
    /// Returns false and leaves the order untouched when a handle is
    /// already present.
    pub fn attach_process_handle(&mut self, handle: impl Into<String>) -> bool {
        if self.process_handle.is_some() {
            return false;
        }
        self.process_handle = Some(handle.into());
        self.touch();
        true
    }

    fn touch(&mut self) {
        let now = Utc::now();
        // Keep updated_at monotonic even if the clock steps backwards.
        self.updated_at = now.max(self.updated_at);
    }
}
