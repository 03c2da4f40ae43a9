pub mod bootstrap;
pub mod mailer;
pub mod scheduling;
pub mod store_actor;
