pub mod gui;
pub mod layout;
pub mod persistence;
pub mod tree;
