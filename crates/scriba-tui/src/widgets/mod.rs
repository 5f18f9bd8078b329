pub mod confirm;
pub mod pane_chrome;
pub mod toast;
