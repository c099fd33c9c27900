pub mod lifecycle;
pub mod receipt;

pub use lifecycle::{hosted_response_url, LifecycleOptions, PaymentService, HOSTED_RESPONSE_PATH};
pub use receipt::ReceiptService;
