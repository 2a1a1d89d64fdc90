//! External collaborators of the orchestrator, with in-memory
//! implementations.

pub mod camunda;
pub mod payment;
pub mod process_engine;

pub use camunda::{CamundaConfig, CamundaProcessEngine};
pub use payment::{
    CheckoutSession, InMemoryPaymentGateway, PaymentError, PaymentGateway, validate_redirect_url,
};
pub use process_engine::{
    EngineError, InMemoryProcessEngine, OrderProcessContext, ProcessEngine, ProcessState,
    ProcessStatus,
};
