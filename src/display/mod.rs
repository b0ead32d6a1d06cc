mod ui;

pub use ui::{Display, RoomActivity};
