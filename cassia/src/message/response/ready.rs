//! `READY`: an empty-body reply to `STARTUP` indicating no authentication is needed.
pub struct Ready;
