pub mod message;
pub mod time;
pub mod value;

pub use message::BagMessage;
pub use time::VirtualTime;
pub use value::{Value, COMBINED_TIME_KEY};
