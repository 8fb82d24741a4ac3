pub mod web;

pub use web::{SlackClient, SlackError, TeamInfo, DEFAULT_BASE_URL};
