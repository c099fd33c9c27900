pub mod memory;
pub mod notify;
pub mod postgres;

pub use memory::{CallLog, MemoryPayerDirectory, MemoryRecurringProfileStore, MemoryTransactionStore};
pub use notify::LogNotifier;
pub use postgres::{
    create_pool, PostgresPayerDirectory, PostgresRecurringProfileStore, PostgresTransactionStore,
};
