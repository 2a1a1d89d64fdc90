//! Order creation requests.

use common::ProductId;
use serde::{Deserialize, Serialize};

use crate::error::OrderError;

use super::ShippingAddress;

/// One requested product/quantity pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedItem {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl RequestedItem {
    /// Creates a new requested item.
    pub fn new(product_id: ProductId, quantity: u32) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}

/// Request to place an order: the items in the order given plus the
/// shipping address snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub items: Vec<RequestedItem>,
    pub shipping_address: ShippingAddress,
}

impl OrderRequest {
    /// Creates a new order request.
    pub fn new(items: Vec<RequestedItem>, shipping_address: ShippingAddress) -> Self {
        Self {
            items,
            shipping_address,
        }
    }

    /// Checks the request shape before any catalog lookup.
    pub fn validate(&self) -> Result<(), OrderError> {
        if self.items.is_empty() {
            return Err(OrderError::NoItems);
        }

        if let Some(item) = self.items.iter().find(|item| item.quantity == 0) {
            return Err(OrderError::InvalidQuantity {
                quantity: item.quantity,
            });
        }

        self.shipping_address.validate()
    }

    /// Returns the total requested quantity per product, in order of first
    /// appearance.
    ///
    /// A product named on several lines must have stock for the sum.
    pub fn requested_quantities(&self) -> Vec<(ProductId, u32)> {
        let mut totals: Vec<(ProductId, u32)> = Vec::with_capacity(self.items.len());
        for item in &self.items {
            match totals.iter_mut().find(|(id, _)| *id == item.product_id) {
                Some((_, quantity)) => *quantity = quantity.saturating_add(item.quantity),
                None => totals.push((item.product_id, item.quantity)),
            }
        }
        totals
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address() -> ShippingAddress {
        ShippingAddress {
            first_name: "John".to_string(),
            last_name: "Doe".to_string(),
            address: "123 Main St".to_string(),
            city: "New York".to_string(),
            state: "NY".to_string(),
            zip: "10001".to_string(),
            country: "United States".to_string(),
        }
    }

    #[test]
    fn test_empty_request_is_rejected() {
        let request = OrderRequest::new(vec![], address());
        assert_eq!(request.validate(), Err(OrderError::NoItems));
    }

    #[test]
    fn test_zero_quantity_is_rejected() {
        let request = OrderRequest::new(
            vec![
                RequestedItem::new(ProductId::new(), 1),
                RequestedItem::new(ProductId::new(), 0),
            ],
            address(),
        );
        assert_eq!(
            request.validate(),
            Err(OrderError::InvalidQuantity { quantity: 0 })
        );
    }

    #[test]
    fn test_blank_address_is_rejected() {
        let mut shipping = address();
        shipping.country = String::new();
        let request = OrderRequest::new(vec![RequestedItem::new(ProductId::new(), 1)], shipping);
        assert_eq!(
            request.validate(),
            Err(OrderError::BlankAddressField { field: "country" })
        );
    }

    #[test]
    fn test_requested_quantities_merge_duplicates_in_order() {
        let a = ProductId::new();
        let b = ProductId::new();
        let request = OrderRequest::new(
            vec![
                RequestedItem::new(a, 2),
                RequestedItem::new(b, 1),
                RequestedItem::new(a, 3),
            ],
            address(),
        );

        assert_eq!(request.requested_quantities(), vec![(a, 5), (b, 1)]);
    }
}
