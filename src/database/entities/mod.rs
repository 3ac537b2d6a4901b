pub mod users;

pub use users::Model as UserRecord;
