pub mod player;
pub mod protocol;
pub mod question;
pub mod room;
pub mod scoring;
