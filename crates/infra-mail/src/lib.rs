// Reservo Infrastructure - Email delivery
// Implements: NotificationSender

mod http_sender;
mod log_sender;

pub use http_sender::{HttpMailConfig, HttpMailSender};
pub use log_sender::LogMailSender;
