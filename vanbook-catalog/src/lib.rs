pub mod timetable;

pub use timetable::{departure_slots, ScheduleGenerator, VirtualSchedule};
