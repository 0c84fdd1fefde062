pub mod chat;
pub mod doctor;
pub mod onboard;
pub mod run;
pub mod runtime;
pub mod status;
