//! Order fulfillment orchestration.
//!
//! This crate ties the store to the external collaborators of an order:
//!
//! 1. [`OrderOrchestrator`] creates orders against live inventory and links
//!    each one to a fulfillment process in the external engine
//! 2. [`PaymentService`] opens checkout sessions and tracks payment records
//!
//! The engine and the payment provider sit behind the traits in
//! [`services`], each with an in-memory implementation for tests and local
//! runs, plus a REST adapter for a Camunda-style process engine.

pub mod error;
pub mod orchestrator;
pub mod payments;
pub mod services;

pub use error::{FulfillmentError, Result};
pub use orchestrator::{DEFAULT_CURRENCY, OrderOrchestrator, ProcessUpdate};
pub use payments::{Checkout, PaymentOutcome, PaymentService};
pub use services::{
    CamundaConfig, CamundaProcessEngine, CheckoutSession, EngineError, InMemoryPaymentGateway,
    InMemoryProcessEngine, OrderProcessContext, PaymentError, PaymentGateway, ProcessEngine,
    ProcessState, ProcessStatus,
};
