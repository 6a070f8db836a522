pub mod local_state;
pub mod tracked_tabs;
