mod lock_pg_repository;
mod property_pg_repository;
mod session_pg_repository;
mod transaction_utils;
mod user_pg_repository;

pub use lock_pg_repository::LockPgRepository;
pub use property_pg_repository::PropertyPgRepository;
pub use session_pg_repository::SessionPgRepository;
pub use user_pg_repository::UserPgRepository;
