pub mod css;
pub mod dom;
pub mod events;
pub mod layout;
