pub mod handlers;
pub mod mail;
pub mod resolver;
pub mod sheets;
pub mod toolkit;
pub mod warehouse;

pub use mail::{Mailer, SmtpMailer};
pub use resolver::{resolve_table, Resolution};
pub use sheets::{GoogleSheetStore, SheetStore};
pub use toolkit::Toolkit;
pub use warehouse::{HttpWarehouse, Warehouse};
