pub mod errno;
pub mod stdio;
pub mod stdlib;
pub mod string;
