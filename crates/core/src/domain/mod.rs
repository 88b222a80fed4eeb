pub mod customer;
pub mod merchant;
pub mod order;
pub mod product;
pub mod session;
