pub mod payer;
pub mod recurring;
pub mod transaction;

pub use payer::Payer;
pub use recurring::RecurringProfile;
pub use transaction::{PaymentStatus, Transaction, TxnType};
