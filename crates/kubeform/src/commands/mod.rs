pub mod down;
pub mod output;
pub mod preview;
pub mod up;
pub mod validate;
