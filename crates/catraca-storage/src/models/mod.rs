pub mod access_event;
pub mod class_schedule;
pub mod tag;

pub use access_event::{AccessEvent, AccessStatus};
pub use class_schedule::{ClassSchedule, NewClassSchedule};
pub use tag::{NewTag, Tag};
