pub mod mailer;
pub mod snapshots;
pub mod storage;
