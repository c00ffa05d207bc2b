pub mod ari;
pub mod twilio;

pub use ari::AriProvider;
pub use twilio::TwilioProvider;
